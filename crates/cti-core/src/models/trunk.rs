//! Trunk model
//!
//! Same shape as an extension without the per-user features, plus the
//! outbound registration state and the channel limit.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::conversation::Conversations;
use super::extension::{DeviceDetails, ExtensionStatus};
use crate::privacy::Privacy;

/// Outbound registration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationState {
    Sent,
    #[default]
    Unregistered,
    Registered,
    Rejected,
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationState::Sent => write!(f, "sent"),
            RegistrationState::Unregistered => write!(f, "unregistered"),
            RegistrationState::Registered => write!(f, "registered"),
            RegistrationState::Rejected => write!(f, "rejected"),
        }
    }
}

impl RegistrationState {
    /// Parse the status text of registry events and registration lists
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "registered" => Some(RegistrationState::Registered),
            "unregistered" | "unregistering" | "timeout" | "no authentication" => {
                Some(RegistrationState::Unregistered)
            }
            "rejected" | "failed" => Some(RegistrationState::Rejected),
            "request sent" | "sent" | "auth. sent" | "registering" => {
                Some(RegistrationState::Sent)
            }
            _ => None,
        }
    }
}

/// Trunk entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trunk {
    pub id: String,
    pub name: String,
    pub channel_tech: String,
    pub status: ExtensionStatus,
    pub registration: RegistrationState,
    pub max_channels: u32,
    pub device: DeviceDetails,
    pub conversations: Conversations,
}

impl Trunk {
    pub fn new(id: &str, name: &str, channel_tech: &str, max_channels: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            channel_tech: channel_tech.to_lowercase(),
            status: ExtensionStatus::Offline,
            registration: RegistrationState::Unregistered,
            max_channels,
            device: DeviceDetails::default(),
            conversations: Conversations::default(),
        }
    }

    /// Returns true on change
    pub fn set_registration(&mut self, state: RegistrationState) -> bool {
        let changed = self.registration != state;
        self.registration = state;
        changed
    }

    pub fn set_status(&mut self, status: ExtensionStatus) -> bool {
        let changed = self.status != status;
        self.status = status;
        changed
    }

    /// Channels currently busy on this trunk
    pub fn busy_channels(&self) -> usize {
        self.conversations.len()
    }

    pub fn snapshot(&self, privacy: Option<&Privacy>) -> serde_json::Value {
        let mut view = self.clone();
        if let Some(privacy) = privacy {
            view.conversations = self.conversations.masked(privacy);
        }
        serde_json::to_value(view).unwrap_or(serde_json::Value::Null)
    }
}
