//! Unified error handling for the CTI proxy
//!
//! This module provides the error type shared by the engine and the HTTP
//! layer, with automatic HTTP response mapping.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Main application error type
///
/// Engine and API errors are converted to this type at the crate edges.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Model Errors ====================
    #[error("Extension not found: {0}")]
    ExtensionNotFound(String),

    #[error("Trunk not found: {0}")]
    TrunkNotFound(String),

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Parking not found: {0}")]
    ParkingNotFound(String),

    #[error("Conference not found: {0}")]
    ConferenceNotFound(String),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Not ready: model is {0}")]
    NotReady(String),

    // ==================== Command Errors ====================
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Command timed out: {0}")]
    CommandTimeout(String),

    // ==================== Validation Errors ====================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ==================== External Service Errors ====================
    #[error("AMI connection error: {0}")]
    AmiConnection(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::InvalidInput(_) | AppError::MissingField(_) => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::ExtensionNotFound(_)
            | AppError::TrunkNotFound(_)
            | AppError::QueueNotFound(_)
            | AppError::ParkingNotFound(_)
            | AppError::ConferenceNotFound(_)
            | AppError::ConversationNotFound(_)
            | AppError::UnknownCommand(_) => StatusCode::NOT_FOUND,

            // 502 Bad Gateway - the PBX refused or never answered
            AppError::CommandFailed(_) | AppError::AmiConnection(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            AppError::CommandTimeout(_) => StatusCode::GATEWAY_TIMEOUT,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::ExtensionNotFound(_) => "extension_not_found",
            AppError::TrunkNotFound(_) => "trunk_not_found",
            AppError::QueueNotFound(_) => "queue_not_found",
            AppError::ParkingNotFound(_) => "parking_not_found",
            AppError::ConferenceNotFound(_) => "conference_not_found",
            AppError::ConversationNotFound(_) => "conversation_not_found",
            AppError::NotReady(_) => "not_ready",
            AppError::UnknownCommand(_) => "unknown_command",
            AppError::CommandFailed(_) => "command_failed",
            AppError::CommandTimeout(_) => "command_timeout",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::MissingField(_) => "missing_field",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
            AppError::AmiConnection(_) => "ami_connection_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Config(err.to_string())
    }
}
