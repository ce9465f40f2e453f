//! Trunk registration events

use async_trait::async_trait;
use cti_ami::{events, AmiRecord};
use cti_core::models::RegistrationState;
use cti_core::AppResult;
use tracing::debug;

use super::EventPlugin;
use crate::commands::trunks::trunk_id;
use crate::engine::EngineContext;
use crate::store::Scope;

pub struct RegistryEvent;

#[async_trait]
impl EventPlugin for RegistryEvent {
    fn events(&self) -> &'static [&'static str] {
        &[events::REGISTRY]
    }

    async fn on_record(&self, ctx: &EngineContext, record: &AmiRecord) -> AppResult<()> {
        let Some(state) = record.get("status").and_then(RegistrationState::from_str) else {
            debug!("Registry event with unknown status {:?}", record.get("status"));
            return Ok(());
        };
        let candidates = [record.get("username"), record.get("domain")];
        let Some(id) = trunk_id(ctx.config(), &candidates).filter(|id| ctx.config().pbx.is_trunk(id)) else {
            return Ok(());
        };

        ctx.store()
            .update(move |s| s.update_trunk(Scope::Live, &id, |t| t.set_registration(state)))
            .await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEngine;

    #[tokio::test]
    async fn test_registry_sets_trunk_registration() {
        let engine = TestEngine::start();

        let registered = AmiRecord::from_pairs(&[
            ("Event", "Registry"),
            ("ChannelType", "PJSIP"),
            ("Username", "sip:4000@sip.example.net"),
            ("Domain", "provider"),
            ("Status", "Registered"),
        ]);
        RegistryEvent.on_record(&engine.ctx, &registered).await.unwrap();

        let state = engine
            .ctx
            .store()
            .read(|s| s.trunk("provider").map(|t| t.registration))
            .await
            .unwrap();
        assert_eq!(state, Some(RegistrationState::Registered));
    }

    #[tokio::test]
    async fn test_unknown_trunk_is_ignored() {
        let engine = TestEngine::start();

        let other = AmiRecord::from_pairs(&[("Event", "Registry"), ("Domain", "elsewhere"), ("Status", "Rejected")]);
        assert!(RegistryEvent.on_record(&engine.ctx, &other).await.is_ok());
    }
}
