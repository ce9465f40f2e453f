//! Engine wiring and the record loop
//!
//! [`EngineContext`] is the cheap, cloneable handle every collaborator gets:
//! configuration, store handle, correlator and the control channel.
//! [`Engine`] owns the record loop: it consumes session events strictly in
//! arrival order, hands them to the dispatcher and drives discovery on
//! (re)connect and on reload requests.

use cti_ami::{AmiSession, SessionEvent, SessionSignal};
use cti_core::config::AppConfig;
use cti_core::AppResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bus::NotificationBus;
use crate::commands::{names, CommandArgs, CommandOutput, CommandRegistry};
use crate::correlator::Correlator;
use crate::dispatcher::Dispatcher;
use crate::error::CommandError;
use crate::handle::StoreHandle;
use crate::orchestrator;
use crate::store::{DomainStore, Scope};

/// Requests to the record loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Reload,
}

struct ContextInner {
    config: Arc<AppConfig>,
    store: StoreHandle,
    correlator: Correlator,
    control: mpsc::UnboundedSender<EngineCommand>,
    refresh_running: AtomicBool,
    channels_dirty: AtomicBool,
}

#[derive(Clone)]
pub struct EngineContext {
    inner: Arc<ContextInner>,
}

impl EngineContext {
    pub fn new(
        config: Arc<AppConfig>,
        session: Arc<dyn AmiSession>,
        bus: NotificationBus,
    ) -> (Self, mpsc::UnboundedReceiver<EngineCommand>) {
        let registry = Arc::new(CommandRegistry::new(Arc::clone(&config)));
        let timeout = match config.ami.command_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let correlator = Correlator::new(session, registry, timeout);
        let store = StoreHandle::spawn(DomainStore::new(Arc::clone(&config), bus));
        let (control, control_rx) = mpsc::unbounded_channel();

        let ctx = Self {
            inner: Arc::new(ContextInner {
                config,
                store,
                correlator,
                control,
                refresh_running: AtomicBool::new(false),
                channels_dirty: AtomicBool::new(false),
            }),
        };
        (ctx, control_rx)
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &StoreHandle {
        &self.inner.store
    }

    pub fn correlator(&self) -> &Correlator {
        &self.inner.correlator
    }

    /// Run a command without touching the model
    pub async fn execute(&self, name: &str, args: &CommandArgs) -> Result<CommandOutput, CommandError> {
        self.inner.correlator.execute(name, args).await
    }

    /// Run a command and write its outcome into the live model
    pub async fn run(&self, name: &str, args: CommandArgs) -> AppResult<CommandOutput> {
        let output = self.execute(name, &args).await?;

        if let Some(plugin) = self.inner.correlator.registry().get(name) {
            let applied = output.clone();
            self.inner
                .store
                .update(move |store| plugin.apply(&args, &applied, store))
                .await??;
        }
        Ok(output)
    }

    /// [`EngineContext::run`] in the background; failures are logged
    pub fn spawn_run(&self, name: &'static str, args: CommandArgs) {
        let ctx = self.clone();
        tokio::spawn(async move {
            if let Err(e) = ctx.run(name, args).await {
                warn!("Background {} failed: {}", name, e);
            }
        });
    }

    /// Fetch the channel list and rebuild conversations in `scope`
    pub async fn reconcile_channels(&self, scope: Scope) -> AppResult<Vec<String>> {
        let channels = self
            .execute(names::LIST_CHANNELS, &CommandArgs::new())
            .await?
            .into_channels()?;
        debug!("Reconciling {} channels", channels.len());
        self.inner
            .store
            .update(move |store| store.apply_channels(scope, &channels))
            .await
    }

    /// Schedule a live channel reconciliation
    ///
    /// Requests arriving while one is running collapse into a single rerun.
    pub fn refresh_channels(&self) {
        let inner = &self.inner;
        inner.channels_dirty.store(true, Ordering::SeqCst);
        if inner.refresh_running.swap(true, Ordering::SeqCst) {
            return;
        }

        let ctx = self.clone();
        tokio::spawn(async move {
            let inner = &ctx.inner;
            loop {
                inner.channels_dirty.store(false, Ordering::SeqCst);
                if let Err(e) = ctx.reconcile_channels(Scope::Live).await {
                    warn!("Channel reconciliation failed: {}", e);
                }
                if inner.channels_dirty.load(Ordering::SeqCst) {
                    continue;
                }
                inner.refresh_running.store(false, Ordering::SeqCst);
                // a request may have landed between the check and the release
                if inner.channels_dirty.load(Ordering::SeqCst)
                    && !inner.refresh_running.swap(true, Ordering::SeqCst)
                {
                    continue;
                }
                break;
            }
        });
    }

    pub fn request_reload(&self) {
        if self.inner.control.send(EngineCommand::Reload).is_err() {
            warn!("Reload requested but the engine loop is gone");
        }
    }
}

pub struct Engine {
    ctx: EngineContext,
    dispatcher: Dispatcher,
    control: mpsc::UnboundedReceiver<EngineCommand>,
    discovery: Option<JoinHandle<()>>,
    connected_once: bool,
}

impl Engine {
    pub fn new(config: Arc<AppConfig>, session: Arc<dyn AmiSession>, bus: NotificationBus) -> Self {
        let (ctx, control) = EngineContext::new(config, session, bus);
        Self {
            ctx,
            dispatcher: Dispatcher::new(),
            control,
            discovery: None,
            connected_once: false,
        }
    }

    pub fn context(&self) -> EngineContext {
        self.ctx.clone()
    }

    /// Process session events until the session side hangs up
    pub async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) {
        info!("Engine started");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(SessionEvent::Record(record)) => self.dispatcher.dispatch(&self.ctx, record).await,
                    Some(SessionEvent::Signal(signal)) => self.on_signal(signal),
                    None => break,
                },
                Some(command) = self.control.recv() => match command {
                    EngineCommand::Reload => self.start_discovery(true),
                },
            }
        }

        if let Some(task) = self.discovery.take() {
            task.abort();
        }
        self.ctx.correlator().fail_all(CommandError::closed());
        info!("Engine stopped");
    }

    fn on_signal(&mut self, signal: SessionSignal) {
        match signal {
            SessionSignal::Connected => {
                info!("Session connected");
                let reload = self.connected_once;
                self.connected_once = true;
                self.start_discovery(reload);
            }
            SessionSignal::Closed => {
                warn!("Session closed");
                self.ctx.correlator().fail_all(CommandError::closed());
            }
            SessionSignal::Errored(e) => {
                error!("Session error: {}", e);
                self.ctx.correlator().fail_all(CommandError::closed());
            }
            SessionSignal::Idle => debug!("Session idle"),
        }
    }

    /// Start bootstrap or reload, cancelling a discovery still in progress
    fn start_discovery(&mut self, reload: bool) {
        if let Some(task) = self.discovery.take() {
            if !task.is_finished() {
                info!("Cancelling discovery in progress");
                task.abort();
            }
        }

        let ctx = self.ctx.clone();
        self.discovery = Some(tokio::spawn(async move {
            orchestrator::run(ctx, reload).await;
        }));
    }
}
