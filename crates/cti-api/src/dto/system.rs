//! Lifecycle and health DTOs

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Response of `GET /api/v1/health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Lifecycle state of the model
    pub model: String,
    /// Commands awaiting a PBX response
    pub in_flight: usize,
    pub timestamp: DateTime<Utc>,
}
