//! Session abstraction consumed by the engine

use async_trait::async_trait;

use crate::action::AmiAction;
use crate::error::AmiError;
use crate::record::AmiRecord;

/// Something that can deliver actions to the PBX
///
/// Implemented by [`crate::AmiClient`]; tests substitute a mock.
#[async_trait]
pub trait AmiSession: Send + Sync {
    async fn send(&self, action: AmiAction) -> Result<(), AmiError>;
}

/// Session lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// Logged in and subscribed to events
    Connected,
    /// Remote end closed the socket
    Closed,
    Errored(String),
    /// No traffic for the idle interval
    Idle,
}

/// Everything the session produces, in arrival order
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Record(AmiRecord),
    Signal(SessionSignal),
}
