//! Event plugins
//!
//! Unsolicited PBX events are routed by lower-cased event name to one
//! [`EventPlugin`]. Handlers mutate the live model through the store handle
//! and may schedule commands, but never wait for a command's response: the
//! response travels through the same record loop that is running them.

use async_trait::async_trait;
use cti_ami::AmiRecord;
use cti_core::AppResult;
use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::EngineContext;

pub mod channels;
pub mod extensions;
pub mod meetme;
pub mod parkings;
pub mod queues;
pub mod system;
pub mod trunks;

#[async_trait]
pub trait EventPlugin: Send + Sync {
    /// Event names handled, in PBX spelling
    fn events(&self) -> &'static [&'static str];

    async fn on_record(&self, ctx: &EngineContext, record: &AmiRecord) -> AppResult<()>;
}

/// Compile-time table of event handlers, keyed by lower-cased event name
pub struct EventRegistry {
    plugins: HashMap<String, Arc<dyn EventPlugin>>,
}

impl EventRegistry {
    pub fn empty() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(channels::ChannelEvents));
        registry.register(Arc::new(channels::RecordingEvents));
        registry.register(Arc::new(extensions::ExtensionStatusEvent));
        registry.register(Arc::new(extensions::ContactEvents));
        registry.register(Arc::new(extensions::MessageWaiting));
        registry.register(Arc::new(extensions::Cdr));
        registry.register(Arc::new(queues::MemberEvents));
        registry.register(Arc::new(queues::CallerEvents));
        registry.register(Arc::new(parkings::ParkingEvents));
        registry.register(Arc::new(meetme::MeetmeEvents));
        registry.register(Arc::new(trunks::RegistryEvent));
        registry.register(Arc::new(system::SystemEvents));
        registry
    }

    pub fn register(&mut self, plugin: Arc<dyn EventPlugin>) {
        for name in plugin.events() {
            self.plugins.insert(name.to_lowercase(), Arc::clone(&plugin));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn EventPlugin>> {
        self.plugins.get(key)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}
