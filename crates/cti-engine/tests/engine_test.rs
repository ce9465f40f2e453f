//! End-to-end engine tests against a scripted PBX
//!
//! The scripted session answers every action by pushing the records a PBX
//! would send back into the engine's record stream.

use async_trait::async_trait;
use cti_ami::{AmiAction, AmiError, AmiRecord, AmiSession, SessionEvent, SessionSignal};
use cti_core::config::{
    AmiConfig, AppConfig, ExtensionConfig, PbxConfig, QueueConfig, ServerConfig, TrunkConfig,
};
use cti_core::models::{ExtensionStatus, RegistrationState};
use cti_core::Privacy;
use cti_engine::{
    names, CommandArgs, CommandError, Engine, EngineContext, LifecycleState, Notification,
    NotificationBus,
};
use mockall::mock;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

fn config() -> Arc<AppConfig> {
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
            reconnect_delay_secs: 1,
            bootstrap_retry_delay_ms: 10,
            command_timeout_secs: 5,
        },
        pbx: PbxConfig {
            extensions: ["214", "221"]
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

fn record(token: &str, pairs: &[(&str, &str)]) -> AmiRecord {
    let mut record = AmiRecord::from_pairs(pairs);
    record.set("ActionID", token);
    record
}

fn success(token: &str) -> AmiRecord {
    record(token, &[("Response", "Success")])
}

fn event(token: &str, name: &str, fields: &[(&str, &str)]) -> AmiRecord {
    let mut pairs = vec![("Event", name)];
    pairs.extend_from_slice(fields);
    record(token, &pairs)
}

/// Answers actions the way a small PBX would
struct ScriptedPbx {
    tx: mpsc::Sender<SessionEvent>,
    sent: Mutex<Vec<AmiAction>>,
    dnd_214: AtomicBool,
    hold_status: AtomicBool,
    held: Mutex<Vec<AmiRecord>>,
    /// Number of upcoming QueueStatus queries answered with an error
    queue_status_failures: AtomicUsize,
}

impl ScriptedPbx {
    fn new(tx: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            tx,
            sent: Mutex::new(Vec::new()),
            dnd_214: AtomicBool::new(true),
            hold_status: AtomicBool::new(false),
            held: Mutex::new(Vec::new()),
            queue_status_failures: AtomicUsize::new(0),
        }
    }

    fn fail_queue_status(&self) -> bool {
        self.queue_status_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn sent_count(&self, name: &str) -> usize {
        self.sent.lock().iter().filter(|a| a.name() == name).count()
    }

    fn reply(&self, action: &AmiAction) -> Vec<AmiRecord> {
        let token = action.action_id().unwrap_or_default();
        match action.name() {
            "PJSIPShowEndpoint" => {
                let exten = action.get("Endpoint").unwrap_or_default();
                let uri = format!("sip:{}@10.0.0.{}:5060", exten, &exten[1..]);
                vec![
                    success(token),
                    event(token, "EndpointDetail", &[("Allow", "(ulaw|alaw)")]),
                    event(token, "ContactStatusDetail", &[("URI", uri.as_str()), ("UserAgent", "Yealink")]),
                    event(token, "EndpointDetailComplete", &[]),
                ]
            }
            "ExtensionState" => vec![record(token, &[("Response", "Success"), ("Status", "0")])],
            "DBGet" => {
                let is_dnd = action.get("Family") == Some("DND") && action.get("Key") == Some("214");
                if is_dnd && self.dnd_214.load(Ordering::SeqCst) {
                    vec![
                        success(token),
                        event(token, "DBGetResponse", &[("Family", "DND"), ("Key", "214"), ("Val", "YES")]),
                    ]
                } else {
                    vec![record(token, &[("Response", "Error"), ("Message", "Database entry not found")])]
                }
            }
            "CoreShowChannels" => vec![success(token), event(token, "CoreShowChannelsComplete", &[])],
            "QueueSummary" => vec![
                success(token),
                event(token, "QueueSummary", &[("Queue", "401")]),
                event(token, "QueueSummaryComplete", &[]),
            ],
            "QueueStatus" if self.fail_queue_status() => {
                vec![record(token, &[("Response", "Error"), ("Message", "Queue status unavailable")])]
            }
            "QueueStatus" => vec![
                success(token),
                event(token, "QueueParams", &[("Queue", "401"), ("Completed", "3")]),
                event(
                    token,
                    "QueueMember",
                    &[("Queue", "401"), ("Location", "PJSIP/214"), ("Membership", "static")],
                ),
                event(token, "QueueStatusComplete", &[]),
            ],
            "Parkinglots" => vec![
                success(token),
                event(
                    token,
                    "Parkinglot",
                    &[("Name", "default"), ("StartSpace", "71"), ("StopSpace", "72"), ("Timeout", "45")],
                ),
                event(token, "ParkinglotsComplete", &[]),
            ],
            "ParkedCalls" => vec![success(token), event(token, "ParkedCallsComplete", &[])],
            "PJSIPShowRegistrationsOutbound" => vec![
                success(token),
                event(
                    token,
                    "OutboundRegistrationDetail",
                    &[("ObjectName", "provider"), ("Status", "Registered")],
                ),
                event(token, "OutboundRegistrationDetailComplete", &[]),
            ],
            "MeetmeList" => vec![record(token, &[("Response", "Error"), ("Message", "No active conferences.")])],
            _ => vec![success(token)],
        }
    }

    async fn release_held(&self) {
        let held: Vec<AmiRecord> = self.held.lock().drain(..).collect();
        for record in held {
            let _ = self.tx.send(SessionEvent::Record(record)).await;
        }
    }
}

#[async_trait]
impl AmiSession for ScriptedPbx {
    async fn send(&self, action: AmiAction) -> Result<(), AmiError> {
        self.sent.lock().push(action.clone());
        let replies = self.reply(&action);

        if action.name() == "ExtensionState" && self.hold_status.load(Ordering::SeqCst) {
            self.held.lock().extend(replies);
            return Ok(());
        }
        for reply in replies {
            self.tx
                .send(SessionEvent::Record(reply))
                .await
                .map_err(|_| AmiError::Closed)?;
        }
        Ok(())
    }
}

struct Harness {
    ctx: EngineContext,
    pbx: Arc<ScriptedPbx>,
    tx: mpsc::Sender<SessionEvent>,
    notifications: broadcast::Receiver<Notification>,
}

fn start() -> Harness {
    let (tx, rx) = mpsc::channel(4096);
    let pbx = Arc::new(ScriptedPbx::new(tx.clone()));
    let bus = NotificationBus::new();
    let notifications = bus.subscribe();

    let engine = Engine::new(config(), pbx.clone(), bus);
    let ctx = engine.context();
    tokio::spawn(engine.run(rx));

    Harness {
        ctx,
        pbx,
        tx,
        notifications,
    }
}

async fn wait_for<F>(notifications: &mut broadcast::Receiver<Notification>, mut wanted: F)
where
    F: FnMut(&Notification) -> bool,
{
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match notifications.recv().await {
                Ok(n) if wanted(&n) => return,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("bus closed"),
            }
        }
    })
    .await;
    assert!(found.is_ok(), "notification not seen in time");
}

#[tokio::test]
async fn test_bootstrap_reaches_ready() {
    let mut h = start();
    h.tx.send(SessionEvent::Signal(SessionSignal::Connected)).await.unwrap();

    wait_for(&mut h.notifications, |n| matches!(n, Notification::Ready)).await;

    let state = h.ctx.store().read(|s| s.state()).await.unwrap();
    assert_eq!(state, LifecycleState::Ready);

    let ext = h
        .ctx
        .store()
        .read(|s| s.extension("214").cloned())
        .await
        .unwrap()
        .unwrap();
    assert!(ext.dnd);
    assert_eq!(ext.status, ExtensionStatus::Online);
    assert_eq!(ext.device.ip, "10.0.0.14");
    assert_eq!(ext.device.user_agent, "Yealink");
    assert!(ext.cf.number.is_none());

    let (registration, spaces, members) = h
        .ctx
        .store()
        .read(|s| {
            (
                s.trunk("provider").map(|t| t.registration),
                s.live().parkings.len(),
                s.queue("401").map(|q| q.members.len()),
            )
        })
        .await
        .unwrap();
    assert_eq!(registration, Some(RegistrationState::Registered));
    assert_eq!(spaces, 2);
    // 214 reported, 221 configured dynamic but logged out
    assert_eq!(members, Some(2));
}

#[tokio::test]
async fn test_failed_discovery_step_is_retried_once() {
    let mut h = start();
    h.pbx.queue_status_failures.store(1, Ordering::SeqCst);
    h.tx.send(SessionEvent::Signal(SessionSignal::Connected)).await.unwrap();

    wait_for(&mut h.notifications, |n| matches!(n, Notification::Ready)).await;

    assert_eq!(h.pbx.sent_count("QueueStatus"), 2);
    let members = h
        .ctx
        .store()
        .read(|s| s.queue("401").map(|q| q.members.len()))
        .await
        .unwrap();
    assert_eq!(members, Some(2));
}

#[tokio::test]
async fn test_discovery_failing_twice_never_gets_ready() {
    let mut h = start();
    h.pbx.queue_status_failures.store(usize::MAX, Ordering::SeqCst);
    h.tx.send(SessionEvent::Signal(SessionSignal::Connected)).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.pbx.sent_count("QueueStatus") < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("queue status never retried");
    // let the other categories settle
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(h.pbx.sent_count("QueueStatus"), 2);
    let (state, milestones) = h
        .ctx
        .store()
        .read(|s| (s.state(), s.milestones().clone()))
        .await
        .unwrap();
    assert_eq!(state, LifecycleState::Booting);
    assert!(!milestones.queues);
    assert!(milestones.extensions);
    assert!(milestones.parkings);

    loop {
        match h.notifications.try_recv() {
            Ok(Notification::Ready) => panic!("ready published after a failed category"),
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

#[tokio::test]
async fn test_reload_swaps_model_atomically() {
    let mut h = start();
    h.tx.send(SessionEvent::Signal(SessionSignal::Connected)).await.unwrap();
    wait_for(&mut h.notifications, |n| matches!(n, Notification::Ready)).await;

    h.pbx.dnd_214.store(false, Ordering::SeqCst);
    h.pbx.hold_status.store(true, Ordering::SeqCst);
    h.ctx.request_reload();

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.pbx.held.lock().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("status queries never sent");

    // mid-reload readers still see the previous model
    let (state, dnd) = h
        .ctx
        .store()
        .read(|s| (s.state(), s.extension("214").map(|e| e.dnd)))
        .await
        .unwrap();
    assert_eq!(state, LifecycleState::Reloading);
    assert_eq!(dnd, Some(true));

    h.pbx.hold_status.store(false, Ordering::SeqCst);
    h.pbx.release_held().await;
    wait_for(&mut h.notifications, |n| matches!(n, Notification::Reloaded)).await;

    let (state, dnd) = h
        .ctx
        .store()
        .read(|s| (s.state(), s.extension("214").map(|e| e.dnd)))
        .await
        .unwrap();
    assert_eq!(state, LifecycleState::Ready);
    assert_eq!(dnd, Some(false));
}

#[tokio::test]
async fn test_commands_apply_to_live_model() {
    let mut h = start();
    h.tx.send(SessionEvent::Signal(SessionSignal::Connected)).await.unwrap();
    wait_for(&mut h.notifications, |n| matches!(n, Notification::Ready)).await;

    let args = CommandArgs::new()
        .with("exten", "221")
        .with("kind", "CF")
        .with("to", "0612345678");
    h.ctx.run(names::SET_CALL_FORWARD, args).await.unwrap();

    let ext = h
        .ctx
        .store()
        .read(|s| s.extension("221").cloned())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ext.cf.number.as_deref(), Some("0612345678"));
    assert!(ext.cf.voicemail.is_none());

    let put = h
        .pbx
        .sent
        .lock()
        .iter()
        .find(|a| a.name() == "DBPut")
        .cloned()
        .unwrap();
    assert_eq!(put.get("Family"), Some("CF"));
    assert_eq!(put.get("Val"), Some("0612345678"));
}

mock! {
    pub Session {}

    #[async_trait]
    impl AmiSession for Session {
        async fn send(&self, action: AmiAction) -> Result<(), AmiError>;
    }
}

#[tokio::test]
async fn test_closed_session_fails_in_flight_commands() {
    let mut session = MockSession::new();
    session.expect_send().times(1).returning(|_| Ok(()));

    let (tx, rx) = mpsc::channel(16);
    let engine = Engine::new(config(), Arc::new(session), NotificationBus::new());
    let ctx = engine.context();
    tokio::spawn(engine.run(rx));

    let pending = {
        let ctx = ctx.clone();
        tokio::spawn(async move { ctx.execute(names::LIST_CHANNELS, &CommandArgs::new()).await })
    };
    while ctx.correlator().in_flight() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    tx.send(SessionEvent::Signal(SessionSignal::Closed)).await.unwrap();
    assert!(matches!(pending.await.unwrap(), Err(CommandError::SessionClosed(_))));
}

#[tokio::test]
async fn test_send_failure_reaches_caller() {
    let mut session = MockSession::new();
    session.expect_send().returning(|_| Err(AmiError::Closed));

    let (_tx, rx) = mpsc::channel(16);
    let engine = Engine::new(config(), Arc::new(session), NotificationBus::new());
    let ctx = engine.context();
    tokio::spawn(engine.run(rx));

    let result = ctx
        .execute(names::HANGUP, &CommandArgs::new().with("channel", "PJSIP/214-00000001"))
        .await;
    assert!(matches!(result, Err(CommandError::SessionClosed(_))));
    assert_eq!(ctx.correlator().in_flight(), 0);
}
