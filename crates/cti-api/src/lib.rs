//! API layer for the CTI proxy
//!
//! HTTP handlers exposing the live telephony model and the command
//! interface, plus a WebSocket stream of model notifications.

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;

pub use dto::{ApiResponse, ViewParams};
pub use handlers::{configure_api, ws_handler};
