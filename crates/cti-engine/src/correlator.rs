//! Command correlation
//!
//! Every outgoing command gets a fresh token carried as its `ActionID`. The
//! correlator keeps one pending entry per token (the plugin, its scratch
//! buffer and the reply channel) and completes the awaiting caller exactly
//! once: on the terminal record, on an error response, on timeout, or when
//! the session goes away. Records for unknown tokens are ignored.

use cti_ami::{new_token, AmiRecord, AmiSession};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::commands::{CommandArgs, CommandOutput, CommandPlugin, CommandRegistry, Progress};
use crate::error::CommandError;

type Reply = oneshot::Sender<Result<CommandOutput, CommandError>>;

struct Pending {
    plugin: Arc<dyn CommandPlugin>,
    scratch: Vec<AmiRecord>,
    reply: Reply,
    created: Instant,
}

pub struct Correlator {
    session: Arc<dyn AmiSession>,
    registry: Arc<CommandRegistry>,
    pending: Mutex<HashMap<String, Pending>>,
    timeout: Option<Duration>,
}

/// Drops the pending entry if the awaiting future goes away first
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<String, Pending>>,
    token: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(self.token);
    }
}

impl Correlator {
    /// `timeout` of `None` waits forever
    pub fn new(session: Arc<dyn AmiSession>, registry: Arc<CommandRegistry>, timeout: Option<Duration>) -> Self {
        Self {
            session,
            registry,
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Send a command and wait for its correlated result
    pub async fn execute(&self, name: &str, args: &CommandArgs) -> Result<CommandOutput, CommandError> {
        let plugin = self
            .registry
            .get(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;

        let token = new_token(name);
        let action = plugin.action(args)?.with_action_id(token.clone());
        let (reply, rx) = oneshot::channel();

        self.pending.lock().insert(
            token.clone(),
            Pending {
                plugin,
                scratch: Vec::new(),
                reply,
                created: Instant::now(),
            },
        );
        let _guard = PendingGuard {
            pending: &self.pending,
            token: &token,
        };

        trace!(token = %token, "Sending {}", action.name());
        self.session.send(action).await?;

        let received = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    warn!(token = %token, "Command {} timed out after {:?}", name, limit);
                    return Err(CommandError::Timeout(name.to_string()));
                }
            },
            None => rx.await,
        };

        received.unwrap_or_else(|_| Err(CommandError::closed()))
    }

    /// Feed a correlated record; returns false when the token is unknown
    pub fn on_record(&self, token: &str, record: AmiRecord) -> bool {
        let mut pending = self.pending.lock();
        let Some(entry) = pending.get_mut(token) else {
            debug!(token = %token, "Record for unknown token ignored");
            return false;
        };

        let result = match entry.plugin.on_record(&mut entry.scratch, record) {
            Progress::Pending => return true,
            Progress::Done(output) => Ok(output),
            Progress::Failed(err) => Err(err),
        };

        if let Some(entry) = pending.remove(token) {
            if let Err(err) = &result {
                debug!(token = %token, "Command {} failed: {}", entry.plugin.name(), err);
            }
            let _ = entry.reply.send(result);
        }
        true
    }

    /// Feed an untagged record to the oldest in-flight `command`
    pub fn route_untagged(&self, command: &str, record: AmiRecord) -> bool {
        let token = {
            let pending = self.pending.lock();
            pending
                .iter()
                .filter(|(_, p)| p.plugin.name() == command)
                .min_by_key(|(_, p)| p.created)
                .map(|(token, _)| token.clone())
        };

        match token {
            Some(token) => self.on_record(&token, record),
            None => false,
        }
    }

    /// Fail every in-flight command, e.g. when the session dropped
    pub fn fail_all(&self, err: CommandError) {
        let drained: Vec<Pending> = self.pending.lock().drain().map(|(_, p)| p).collect();
        if !drained.is_empty() {
            warn!("Failing {} in-flight commands: {}", drained.len(), err);
        }
        for entry in drained {
            let _ = entry.reply.send(Err(err.clone()));
        }
    }

    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }
}
