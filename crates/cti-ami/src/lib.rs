//! Asterisk Manager Interface (AMI) integration for the CTI proxy
//!
//! This crate owns everything that touches the manager socket: framing,
//! record parsing, outgoing actions, correlation tokens and the reconnecting
//! client.
//!
//! # Architecture
//!
//! ```text
//! Asterisk manager port
//!         |
//!         v
//!  AmiConnection (TCP + AmiCodec)
//!         |
//!         v
//!    AmiRecord (Parser)
//!         |
//!         v
//!  AmiClient  --SessionEvent-->  engine dispatcher
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use cti_ami::{AmiClient, SessionEvent};
//! use tokio::sync::mpsc;
//!
//! let client = AmiClient::new(config.ami.clone());
//! let (tx, mut rx) = mpsc::channel(1024);
//! tokio::spawn(client.clone().run(tx));
//!
//! while let Some(event) = rx.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

pub mod action;
pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod record;
pub mod session;
pub mod token;

pub use action::AmiAction;
pub use client::AmiClient;
pub use codec::{AmiCodec, AmiFrame};
pub use connection::AmiConnection;
pub use error::AmiError;
pub use record::AmiRecord;
pub use session::{AmiSession, SessionEvent, SessionSignal};
pub use token::{command_of, new_token};

/// Manager protocol constants
pub mod constants {
    /// Every manager banner starts with this
    pub const BANNER_PREFIX: &str = "Asterisk Call Manager";

    /// Token prefix used for the login action
    pub const LOGIN_ACTION: &str = "login";

    /// Seconds to wait for banner and login response
    pub const LOGIN_TIMEOUT_SECS: u64 = 10;

    /// Silence after which an idle signal is emitted
    pub const IDLE_TIMEOUT_SECS: u64 = 60;

    /// Capacity of the record channel between client and dispatcher
    pub const EVENT_CHANNEL_CAPACITY: usize = 4096;
}

/// Manager event names the proxy reacts to
pub mod events {
    pub const NEWCHANNEL: &str = "Newchannel";
    pub const NEWSTATE: &str = "Newstate";
    pub const HANGUP: &str = "Hangup";
    pub const DIAL_BEGIN: &str = "DialBegin";
    pub const DIAL_END: &str = "DialEnd";
    pub const BRIDGE_ENTER: &str = "BridgeEnter";
    pub const BRIDGE_LEAVE: &str = "BridgeLeave";
    pub const HOLD: &str = "Hold";
    pub const UNHOLD: &str = "Unhold";
    pub const RENAME: &str = "Rename";
    pub const ATTENDED_TRANSFER: &str = "AttendedTransfer";
    pub const BLIND_TRANSFER: &str = "BlindTransfer";
    pub const EXTENSION_STATUS: &str = "ExtensionStatus";
    pub const PEER_STATUS: &str = "PeerStatus";
    pub const CONTACT_STATUS: &str = "ContactStatus";
    pub const REGISTRY: &str = "Registry";
    pub const CDR: &str = "Cdr";
    pub const MESSAGE_WAITING: &str = "MessageWaiting";
    pub const QUEUE_MEMBER_ADDED: &str = "QueueMemberAdded";
    pub const QUEUE_MEMBER_REMOVED: &str = "QueueMemberRemoved";
    pub const QUEUE_MEMBER_PAUSE: &str = "QueueMemberPause";
    pub const QUEUE_MEMBER_STATUS: &str = "QueueMemberStatus";
    pub const QUEUE_CALLER_JOIN: &str = "QueueCallerJoin";
    pub const QUEUE_CALLER_LEAVE: &str = "QueueCallerLeave";
    pub const QUEUE_CALLER_ABANDON: &str = "QueueCallerAbandon";
    pub const PARKED_CALL: &str = "ParkedCall";
    pub const UNPARKED_CALL: &str = "UnParkedCall";
    pub const PARKED_CALL_TIMEOUT: &str = "ParkedCallTimeOut";
    pub const PARKED_CALL_GIVE_UP: &str = "ParkedCallGiveUp";
    pub const MEETME_JOIN: &str = "MeetmeJoin";
    pub const MEETME_LEAVE: &str = "MeetmeLeave";
    pub const MEETME_MUTE: &str = "MeetmeMute";
    pub const MEETME_END: &str = "MeetmeEnd";
    pub const MIX_MONITOR_START: &str = "MixMonitorStart";
    pub const MIX_MONITOR_STOP: &str = "MixMonitorStop";
    pub const MIX_MONITOR_MUTE: &str = "MixMonitorMute";
    pub const FULLY_BOOTED: &str = "FullyBooted";
    pub const RELOAD: &str = "Reload";
    pub const PARKED_CALLS_COMPLETE: &str = "ParkedCallsComplete";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert!(constants::LOGIN_TIMEOUT_SECS < constants::IDLE_TIMEOUT_SECS);
        assert!(constants::EVENT_CHANNEL_CAPACITY > 0);
    }

    #[test]
    fn test_login_token_is_correlatable() {
        let token = new_token(constants::LOGIN_ACTION);
        assert_eq!(command_of(&token), Some(constants::LOGIN_ACTION));
    }
}
