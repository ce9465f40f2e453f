//! Event-driven state synchronization for the CTI proxy
//!
//! This crate turns the asynchronous manager record stream into a
//! consistent model of extensions, trunks, queues, parkings and
//! conferences, and offers a correlated command interface on top of it.
//!
//! # Architecture
//!
//! ```text
//! SessionEvent stream
//!         |
//!         v
//!   Engine (record loop) ----> Orchestrator (bootstrap / reload)
//!         |
//!         v
//!     Dispatcher
//!      |       \
//!      v        v
//! Correlator   EventRegistry
//!      |        |
//!      v        v
//!   StoreHandle (single owner of DomainStore) --> NotificationBus
//! ```
//!
//! - Records tagged with a command token complete that command through the
//!   [`correlator::Correlator`]
//! - Untagged events are routed by name to an [`events::EventPlugin`]
//! - Every model mutation runs on the store worker, one at a time
//! - Bridging-relevant events trigger a full channel list reconciliation

pub mod bus;
pub mod channel;
pub mod commands;
pub mod correlator;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod handle;
pub mod orchestrator;
pub mod queues;
pub mod reconciler;
pub mod store;

#[cfg(test)]
mod testing;

pub use bus::{Notification, NotificationBus};
pub use commands::{names, CommandArgs, CommandOutput, CommandPlugin, CommandRegistry};
pub use correlator::Correlator;
pub use dispatcher::Dispatcher;
pub use engine::{Engine, EngineCommand, EngineContext};
pub use error::CommandError;
pub use handle::StoreHandle;
pub use store::{DomainStore, LifecycleState, Milestone, Scope};
