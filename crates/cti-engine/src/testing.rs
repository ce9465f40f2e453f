//! Shared fixtures for unit tests

use async_trait::async_trait;
use cti_ami::{AmiAction, AmiError, AmiSession};
use cti_core::config::{
    AmiConfig, AppConfig, ExtensionConfig, PbxConfig, QueueConfig, ServerConfig, TrunkConfig,
};
use cti_core::Privacy;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::bus::{Notification, NotificationBus};
use crate::engine::{EngineCommand, EngineContext};

pub(crate) fn test_config() -> Arc<AppConfig> {
    Arc::new(AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8182,
            workers: 1,
        },
        ami: AmiConfig {
            host: "127.0.0.1".to_string(),
            port: 5038,
            username: "cti".to_string(),
            secret: "secret".to_string(),
            reconnect_delay_secs: 5,
            bootstrap_retry_delay_ms: 10,
            command_timeout_secs: 5,
        },
        pbx: PbxConfig {
            extensions: ["214", "221", "300"]
                .iter()
                .map(|id| ExtensionConfig {
                    id: id.to_string(),
                    name: format!("Ext {}", id),
                    tech: "pjsip".to_string(),
                })
                .collect(),
            trunks: vec![TrunkConfig {
                id: "provider".to_string(),
                name: "Provider".to_string(),
                tech: "pjsip".to_string(),
                max_channels: 30,
            }],
            queues: vec![QueueConfig {
                id: "401".to_string(),
                name: "Support".to_string(),
                dynamic_members: vec!["221".to_string()],
            }],
            ..PbxConfig::default()
        },
        privacy: Privacy::default(),
    })
}

/// Session that records every action and never answers
#[derive(Default)]
pub(crate) struct FakeSession {
    sent: Mutex<Vec<AmiAction>>,
}

impl FakeSession {
    pub(crate) fn sent(&self) -> Vec<AmiAction> {
        self.sent.lock().clone()
    }

    /// Token of the `index`-th sent action, waiting for it to be sent
    pub(crate) async fn wait_token(&self, index: usize) -> String {
        for _ in 0..2000 {
            let token = self
                .sent
                .lock()
                .get(index)
                .and_then(|a| a.action_id().map(str::to_string));
            if let Some(token) = token {
                return token;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("action #{} was never sent", index);
    }
}

#[async_trait]
impl AmiSession for FakeSession {
    async fn send(&self, action: AmiAction) -> Result<(), AmiError> {
        self.sent.lock().push(action);
        Ok(())
    }
}

/// Engine context wired to a [`FakeSession`], with its bus and control ends
pub(crate) struct TestEngine {
    pub ctx: EngineContext,
    pub session: Arc<FakeSession>,
    pub notifications: broadcast::Receiver<Notification>,
    pub control: mpsc::UnboundedReceiver<EngineCommand>,
}

impl TestEngine {
    pub(crate) fn start() -> Self {
        let session = Arc::new(FakeSession::default());
        let bus = NotificationBus::new();
        let notifications = bus.subscribe();
        let (ctx, control) = EngineContext::new(test_config(), session.clone(), bus);
        Self {
            ctx,
            session,
            notifications,
            control,
        }
    }

    pub(crate) async fn next_notification(&mut self) -> Notification {
        tokio::time::timeout(Duration::from_secs(1), self.notifications.recv())
            .await
            .expect("no notification within a second")
            .expect("bus closed")
    }

    pub(crate) fn try_notification(&mut self) -> Option<Notification> {
        self.notifications.try_recv().ok()
    }
}
