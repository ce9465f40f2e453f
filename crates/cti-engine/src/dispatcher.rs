//! Record routing
//!
//! A record carrying an `ActionID` minted for a registered command goes to
//! the correlator. Anything else is an unsolicited event and is routed by
//! lower-cased event name. The one exception is `ParkedCallsComplete`, which
//! the PBX emits without a tag: it is handed to the oldest in-flight parked
//! call listing.

use cti_ami::{command_of, events, AmiRecord};
use tracing::{debug, trace, warn};

use crate::commands::names;
use crate::engine::EngineContext;
use crate::events::EventRegistry;

pub struct Dispatcher {
    events: EventRegistry,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_registry(EventRegistry::new())
    }

    pub fn with_registry(events: EventRegistry) -> Self {
        Self { events }
    }

    pub async fn dispatch(&self, ctx: &EngineContext, record: AmiRecord) {
        if let Some(token) = record.action_id().map(str::to_string) {
            let correlator = ctx.correlator();
            match command_of(&token) {
                Some(command) if correlator.registry().contains(command) => {
                    correlator.on_record(&token, record);
                }
                _ => trace!(token = %token, "Record for foreign token ignored"),
            }
            return;
        }

        let Some(key) = record.event_key() else {
            warn!("Untagged record without event name dropped: {}", record);
            return;
        };

        if key == events::PARKED_CALLS_COMPLETE.to_lowercase()
            && ctx.correlator().route_untagged(names::LIST_PARKED_CALLS, record.clone())
        {
            return;
        }

        match self.events.get(&key) {
            Some(plugin) => {
                if let Err(e) = plugin.on_record(ctx, &record).await {
                    warn!("Handling {} failed: {}", key, e);
                }
            }
            None => debug!("No handler for event {}", key),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
