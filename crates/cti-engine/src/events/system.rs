//! PBX lifecycle events

use async_trait::async_trait;
use cti_ami::{events, AmiRecord};
use cti_core::AppResult;
use tracing::info;

use super::EventPlugin;
use crate::engine::EngineContext;

/// A PBX configuration reload invalidates the whole model
pub struct SystemEvents;

#[async_trait]
impl EventPlugin for SystemEvents {
    fn events(&self) -> &'static [&'static str] {
        &[events::RELOAD, events::FULLY_BOOTED]
    }

    async fn on_record(&self, ctx: &EngineContext, record: &AmiRecord) -> AppResult<()> {
        match record.event_key().as_deref() {
            Some("reload") => {
                info!(module = ?record.get("module"), "PBX reloaded, scheduling model reload");
                ctx.request_reload();
            }
            _ => info!("PBX fully booted"),
        }
        Ok(())
    }
}
