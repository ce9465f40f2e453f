//! Extension model
//!
//! Represents a user endpoint of the PBX, built from static configuration
//! plus one discovery round-trip, then kept up to date by events.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::conversation::Conversations;
use crate::privacy::Privacy;

/// Extension status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionStatus {
    Online,
    Busy,
    Ringing,
    BusyRinging,
    OnHold,
    Dnd,
    #[default]
    Offline,
}

impl fmt::Display for ExtensionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExtensionStatus::Online => "online",
            ExtensionStatus::Busy => "busy",
            ExtensionStatus::Ringing => "ringing",
            ExtensionStatus::BusyRinging => "busy_ringing",
            ExtensionStatus::OnHold => "on_hold",
            ExtensionStatus::Dnd => "dnd",
            ExtensionStatus::Offline => "offline",
        };
        write!(f, "{}", s)
    }
}

impl ExtensionStatus {
    /// Map the numeric hint state reported by the PBX
    pub fn from_hint_code(code: i32) -> Self {
        match code {
            0 => ExtensionStatus::Online,
            1 | 2 => ExtensionStatus::Busy,
            8 => ExtensionStatus::Ringing,
            9 => ExtensionStatus::BusyRinging,
            16 | 17 => ExtensionStatus::OnHold,
            _ => ExtensionStatus::Offline,
        }
    }
}

/// Network and device details discovered from the PBX
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDetails {
    pub ip: String,
    pub port: String,
    pub mac_address: String,
    pub codecs: Vec<String>,
    pub username: String,
    pub user_agent: String,
}

/// Call-forward condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardKind {
    /// Always
    Unconditional,
    /// When busy
    Busy,
    /// When unavailable
    Unavailable,
}

impl ForwardKind {
    pub const ALL: [ForwardKind; 3] = [
        ForwardKind::Unconditional,
        ForwardKind::Busy,
        ForwardKind::Unavailable,
    ];

    /// AstDB family holding this forward
    pub fn db_family(&self) -> &'static str {
        match self {
            ForwardKind::Unconditional => "CF",
            ForwardKind::Busy => "CFB",
            ForwardKind::Unavailable => "CFU",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cf" | "unconditional" => Some(ForwardKind::Unconditional),
            "cfb" | "busy" => Some(ForwardKind::Busy),
            "cfu" | "unavailable" => Some(ForwardKind::Unavailable),
            _ => None,
        }
    }
}

/// Prefix marking a forward to voicemail in the PBX database
pub const VOICEMAIL_PREFIX: &str = "vmu";

/// Forward destination as stored by the PBX
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "to", rename_all = "snake_case")]
pub enum ForwardTarget {
    Off,
    Number(String),
    Voicemail(String),
}

impl ForwardTarget {
    /// Decode a raw database value (`vmu214` is voicemail of 214)
    pub fn from_db_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => ForwardTarget::Off,
            Some(v) => match v.strip_prefix(VOICEMAIL_PREFIX) {
                Some(mailbox) => ForwardTarget::Voicemail(mailbox.to_string()),
                None => ForwardTarget::Number(v.to_string()),
            },
        }
    }

    /// Encode to the raw database value, `None` meaning delete the key
    pub fn to_db_value(&self) -> Option<String> {
        match self {
            ForwardTarget::Off => None,
            ForwardTarget::Number(n) => Some(n.clone()),
            ForwardTarget::Voicemail(m) => Some(format!("{}{}", VOICEMAIL_PREFIX, m)),
        }
    }
}

/// Number and voicemail variants of one forward condition
///
/// At most one of the two is enabled: enabling one clears the other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallForward {
    pub number: Option<String>,
    pub voicemail: Option<String>,
}

impl CallForward {
    /// Apply a target; returns true when something changed
    pub fn apply(&mut self, target: &ForwardTarget) -> bool {
        let (number, voicemail) = match target {
            ForwardTarget::Off => (None, None),
            ForwardTarget::Number(n) => (Some(n.clone()), None),
            ForwardTarget::Voicemail(m) => (None, Some(m.clone())),
        };
        let changed = self.number != number || self.voicemail != voicemail;
        self.number = number;
        self.voicemail = voicemail;
        changed
    }
}

/// Extension entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub id: String,
    pub name: String,

    /// Channel technology (pjsip, iax, ...)
    pub channel_tech: String,

    pub status: ExtensionStatus,

    /// Do-not-disturb flag; while set, status reads `dnd`
    pub dnd: bool,

    pub device: DeviceDetails,

    pub cf: CallForward,
    pub cfb: CallForward,
    pub cfu: CallForward,

    pub conversations: Conversations,
}

impl Extension {
    pub fn new(id: &str, name: &str, channel_tech: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            channel_tech: channel_tech.to_lowercase(),
            status: ExtensionStatus::Offline,
            dnd: false,
            device: DeviceDetails::default(),
            cf: CallForward::default(),
            cfb: CallForward::default(),
            cfu: CallForward::default(),
            conversations: Conversations::default(),
        }
    }

    /// Update the hint status; returns true when the visible status changed
    pub fn set_status(&mut self, status: ExtensionStatus) -> bool {
        let before = self.visible_status();
        self.status = status;
        before != self.visible_status()
    }

    /// Update do-not-disturb; returns true on change
    pub fn set_dnd(&mut self, dnd: bool) -> bool {
        let changed = self.dnd != dnd;
        self.dnd = dnd;
        changed
    }

    /// Status as exposed to consumers
    pub fn visible_status(&self) -> ExtensionStatus {
        if self.dnd && self.status != ExtensionStatus::Offline {
            ExtensionStatus::Dnd
        } else {
            self.status
        }
    }

    pub fn forward(&self, kind: ForwardKind) -> &CallForward {
        match kind {
            ForwardKind::Unconditional => &self.cf,
            ForwardKind::Busy => &self.cfb,
            ForwardKind::Unavailable => &self.cfu,
        }
    }

    /// Set a call forward; the voicemail/number variant not chosen is disabled
    pub fn set_forward(&mut self, kind: ForwardKind, target: &ForwardTarget) -> bool {
        let forward = match kind {
            ForwardKind::Unconditional => &mut self.cf,
            ForwardKind::Busy => &mut self.cfb,
            ForwardKind::Unavailable => &mut self.cfu,
        };
        forward.apply(target)
    }

    /// Serializable snapshot, optionally with masked numbers
    pub fn snapshot(&self, privacy: Option<&Privacy>) -> serde_json::Value {
        let mut view = self.clone();
        view.status = self.visible_status();
        if let Some(privacy) = privacy {
            view.conversations = self.conversations.masked(privacy);
        }
        serde_json::to_value(view).unwrap_or(serde_json::Value::Null)
    }
}
