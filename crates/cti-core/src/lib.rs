//! CTI Proxy Core Library
//!
//! This crate provides the foundational types and error handling for the
//! CTI proxy. It includes:
//!
//! - Domain models (Extension, Trunk, Conversation, Queue, Parking, Meetme)
//! - Unified error handling with HTTP response mapping
//! - Application configuration, including the static PBX tables
//! - Privacy masking of phone numbers in serialized projections

pub mod config;
pub mod error;
pub mod models;
pub mod privacy;

pub use config::AppConfig;
pub use error::AppError;
pub use privacy::Privacy;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
