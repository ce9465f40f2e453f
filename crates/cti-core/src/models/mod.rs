//! Domain models for the CTI proxy
//!
//! Every entity here is owned by the engine's store; consumers only ever see
//! serialized snapshots.

pub mod conversation;
pub mod extension;
pub mod meetme;
pub mod parking;
pub mod queue;
pub mod trunk;

pub use conversation::{Channel, Conversation, Conversations, Direction, RecordingState};
pub use extension::{
    CallForward, DeviceDetails, Extension, ExtensionStatus, ForwardKind, ForwardTarget,
};
pub use meetme::{MeetmeConfUser, MeetmeConference};
pub use parking::{ParkedCaller, Parking};
pub use queue::{MemberType, Queue, QueueMember, QueueStats, QueueWaitingCaller};
pub use trunk::{RegistrationState, Trunk};
