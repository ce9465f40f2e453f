//! Notification bus
//!
//! Typed publish/subscribe channel telling consumers that something in the
//! model changed. Entity notifications carry a copy of the entity; consumers
//! turn it into JSON with [`Notification::to_json`], optionally masked.

use cti_core::models::{Extension, MeetmeConference, Parking, Queue, QueueMember, Trunk};
use cti_core::Privacy;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the broadcast ring; slow subscribers lag and skip
pub const BUS_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum Notification {
    ExtensionChanged(Box<Extension>),
    TrunkChanged(Box<Trunk>),
    QueueChanged(Box<Queue>),
    ParkingChanged(Box<Parking>),
    ConferenceChanged(Box<MeetmeConference>),
    ExtensionDialing {
        extension: String,
        channel: String,
        destination: String,
    },
    ExtensionConnected {
        extension: String,
        channel: String,
        counterpart: String,
    },
    ExtensionHangup {
        extension: String,
        channel: String,
        cause: String,
    },
    NewCdr(Value),
    VoicemailCount {
        extension: String,
        new_messages: u32,
        old_messages: u32,
    },
    QueueMemberChanged(QueueMember),
    ConferenceEnded {
        conference: String,
    },
    Ready,
    Reloaded,
    InboundCallByTrunk {
        trunk: String,
        conversation: String,
        caller_num: String,
        dest: String,
    },
}

impl Notification {
    /// Wire name used in the `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::ExtensionChanged(_) => "extension_changed",
            Notification::TrunkChanged(_) => "trunk_changed",
            Notification::QueueChanged(_) => "queue_changed",
            Notification::ParkingChanged(_) => "parking_changed",
            Notification::ConferenceChanged(_) => "conference_changed",
            Notification::ExtensionDialing { .. } => "extension_dialing",
            Notification::ExtensionConnected { .. } => "extension_connected",
            Notification::ExtensionHangup { .. } => "extension_hangup",
            Notification::NewCdr(_) => "new_cdr",
            Notification::VoicemailCount { .. } => "voicemail_count",
            Notification::QueueMemberChanged(_) => "queue_member_changed",
            Notification::ConferenceEnded { .. } => "conference_ended",
            Notification::Ready => "ready",
            Notification::Reloaded => "reloaded",
            Notification::InboundCallByTrunk { .. } => "inbound_call_by_trunk",
        }
    }

    /// `{"type": ..., "data": ...}` projection
    pub fn to_json(&self, privacy: Option<&Privacy>) -> Value {
        let mask = |number: &str, through_queue: bool| match privacy {
            Some(p) => p.mask_number(number, through_queue),
            None => number.to_string(),
        };

        let data = match self {
            Notification::ExtensionChanged(ext) => ext.snapshot(privacy),
            Notification::TrunkChanged(trunk) => trunk.snapshot(privacy),
            Notification::QueueChanged(queue) => queue.snapshot(privacy),
            Notification::ParkingChanged(parking) => parking.snapshot(privacy),
            Notification::ConferenceChanged(conf) => {
                serde_json::to_value(conf.as_ref()).unwrap_or(Value::Null)
            }
            Notification::ExtensionDialing {
                extension,
                channel,
                destination,
            } => json!({
                "extension": extension,
                "channel": channel,
                "destination": mask(destination, false),
            }),
            Notification::ExtensionConnected {
                extension,
                channel,
                counterpart,
            } => json!({
                "extension": extension,
                "channel": channel,
                "counterpart": mask(counterpart, false),
            }),
            Notification::ExtensionHangup {
                extension,
                channel,
                cause,
            } => json!({ "extension": extension, "channel": channel, "cause": cause }),
            Notification::NewCdr(cdr) => cdr.clone(),
            Notification::VoicemailCount {
                extension,
                new_messages,
                old_messages,
            } => json!({
                "extension": extension,
                "new": new_messages,
                "old": old_messages,
            }),
            Notification::QueueMemberChanged(member) => {
                serde_json::to_value(member).unwrap_or(Value::Null)
            }
            Notification::ConferenceEnded { conference } => json!({ "conference": conference }),
            Notification::Ready | Notification::Reloaded => Value::Null,
            Notification::InboundCallByTrunk {
                trunk,
                conversation,
                caller_num,
                dest,
            } => json!({
                "trunk": trunk,
                "conversation": conversation,
                "caller_num": mask(caller_num, false),
                "dest": dest,
            }),
        };

        json!({ "type": self.kind(), "data": data })
    }
}

/// Broadcast sender wrapper; cheap to clone
#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<Notification>,
}

impl NotificationBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, notification: Notification) {
        let kind = notification.kind();
        // no subscribers is fine
        if self.tx.send(notification).is_err() {
            trace!("No subscribers for {}", kind);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}
