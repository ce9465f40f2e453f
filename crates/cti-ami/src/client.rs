use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{sleep, timeout, Duration};
use tracing::{error, info, warn};

use cti_core::config::AmiConfig;

use crate::action::AmiAction;
use crate::codec::AmiFrame;
use crate::connection::{AmiConnection, AmiReader};
use crate::constants;
use crate::error::AmiError;
use crate::session::{AmiSession, SessionEvent, SessionSignal};

/// Long-lived manager client
///
/// Owns the reconnect loop. Records and lifecycle signals are forwarded in
/// arrival order over a single channel; actions are written through the
/// current connection.
pub struct AmiClient {
    config: AmiConfig,
    current: RwLock<Option<Arc<AmiConnection>>>,
}

impl AmiClient {
    pub fn new(config: AmiConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            current: RwLock::new(None),
        })
    }

    pub async fn is_connected(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Run until the receiving side of `events` is dropped
    pub async fn run(self: Arc<Self>, events: mpsc::Sender<SessionEvent>) {
        let server_id = self.config.addr();
        let delay = Duration::from_secs(self.config.reconnect_delay_secs.max(1));

        loop {
            let signal = match self.connect_and_listen(&events).await {
                Ok(()) => {
                    info!("Manager connection closed: {}", server_id);
                    SessionSignal::Closed
                }
                Err(e) => {
                    error!("Manager session error for {}: {}", server_id, e);
                    SessionSignal::Errored(e.to_string())
                }
            };

            *self.current.write().await = None;

            if events.send(SessionEvent::Signal(signal)).await.is_err() {
                info!("Session consumer gone, stopping manager client");
                return;
            }

            warn!("Reconnecting to {} in {} seconds...", server_id, delay.as_secs());
            sleep(delay).await;

            if events.is_closed() {
                return;
            }
        }
    }

    async fn connect_and_listen(&self, events: &mpsc::Sender<SessionEvent>) -> Result<(), AmiError> {
        let (connection, reader) = AmiConnection::connect(
            &self.config.host,
            self.config.port,
            &self.config.username,
            &self.config.secret,
        )
        .await?;

        *self.current.write().await = Some(Arc::new(connection));

        events
            .send(SessionEvent::Signal(SessionSignal::Connected))
            .await
            .map_err(|_| AmiError::Closed)?;

        Self::pump(reader, events).await
    }

    async fn pump(mut reader: AmiReader, events: &mpsc::Sender<SessionEvent>) -> Result<(), AmiError> {
        let idle = Duration::from_secs(constants::IDLE_TIMEOUT_SECS);

        loop {
            let next = match timeout(idle, reader.next()).await {
                Ok(next) => next,
                Err(_) => {
                    events
                        .send(SessionEvent::Signal(SessionSignal::Idle))
                        .await
                        .map_err(|_| AmiError::Closed)?;
                    continue;
                }
            };

            match next {
                Some(Ok(AmiFrame::Record(record))) => {
                    events
                        .send(SessionEvent::Record(record))
                        .await
                        .map_err(|_| AmiError::Closed)?;
                }
                Some(Ok(AmiFrame::Greeting(_))) => {}
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            }
        }
    }
}

#[async_trait]
impl AmiSession for AmiClient {
    async fn send(&self, action: AmiAction) -> Result<(), AmiError> {
        let connection = self.current.read().await.clone().ok_or(AmiError::Closed)?;
        connection.send(action).await
    }
}
