//! HTTP API tests against an engine driven by a scripted PBX

use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use cti_ami::{AmiAction, AmiError, AmiRecord, AmiSession, SessionEvent, SessionSignal};
use cti_api::configure_api;
use cti_core::config::{AmiConfig, AppConfig, ExtensionConfig, PbxConfig, ServerConfig};
use cti_core::Privacy;
use cti_engine::{Engine, EngineContext, Notification, NotificationBus};
use serde_json::{json, Value};
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
            extensions: vec![ExtensionConfig {
                id: "214".to_string(),
                name: "Reception".to_string(),
                tech: "pjsip".to_string(),
            }],
            ..PbxConfig::default()
        },
        privacy: Privacy::default(),
    })
}

fn reply(token: &str, pairs: &[(&str, &str)]) -> AmiRecord {
    let mut record = AmiRecord::from_pairs(pairs);
    record.set("ActionID", token);
    record
}

fn complete(token: &str, name: &str) -> Vec<AmiRecord> {
    vec![
        reply(token, &[("Response", "Success")]),
        reply(token, &[("Event", name)]),
    ]
}

/// Single extension PBX with nothing going on
struct QuietPbx {
    tx: mpsc::Sender<SessionEvent>,
}

impl QuietPbx {
    fn replies(&self, action: &AmiAction) -> Vec<AmiRecord> {
        let token = action.action_id().unwrap_or_default();
        match action.name() {
            "PJSIPShowEndpoint" => complete(token, "EndpointDetailComplete"),
            "ExtensionState" => vec![reply(token, &[("Response", "Success"), ("Status", "0")])],
            "DBGet" => vec![reply(token, &[("Response", "Error"), ("Message", "Database entry not found")])],
            "CoreShowChannels" => complete(token, "CoreShowChannelsComplete"),
            "QueueSummary" => complete(token, "QueueSummaryComplete"),
            "QueueStatus" => complete(token, "QueueStatusComplete"),
            "Parkinglots" => complete(token, "ParkinglotsComplete"),
            "ParkedCalls" => complete(token, "ParkedCallsComplete"),
            "PJSIPShowRegistrationsOutbound" => complete(token, "OutboundRegistrationDetailComplete"),
            "MeetmeList" => vec![reply(token, &[("Response", "Error"), ("Message", "No active conferences.")])],
            "Hangup" if action.get("Channel") == Some("PJSIP/gone-00000001") => {
                vec![reply(token, &[("Response", "Error"), ("Message", "No such channel")])]
            }
            _ => vec![reply(token, &[("Response", "Success")])],
        }
    }
}

#[async_trait]
impl AmiSession for QuietPbx {
    async fn send(&self, action: AmiAction) -> Result<(), AmiError> {
        for record in self.replies(&action) {
            self.tx
                .send(SessionEvent::Record(record))
                .await
                .map_err(|_| AmiError::Closed)?;
        }
        Ok(())
    }
}

struct Backend {
    ctx: EngineContext,
    bus: NotificationBus,
    tx: mpsc::Sender<SessionEvent>,
}

fn backend() -> Backend {
    let (tx, rx) = mpsc::channel(1024);
    let bus = NotificationBus::new();
    let engine = Engine::new(config(), Arc::new(QuietPbx { tx: tx.clone() }), bus.clone());
    let ctx = engine.context();
    tokio::spawn(engine.run(rx));
    Backend { ctx, bus, tx }
}

async fn ready_backend() -> Backend {
    let backend = backend();
    let mut notifications = backend.bus.subscribe();
    backend
        .tx
        .send(SessionEvent::Signal(SessionSignal::Connected))
        .await
        .unwrap();

    let ready = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match notifications.recv().await {
                Ok(Notification::Ready) => return,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("bus closed"),
            }
        }
    })
    .await;
    assert!(ready.is_ok(), "engine never became ready");
    backend
}

macro_rules! app {
    ($backend:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($backend.ctx.clone()))
                .app_data(web::Data::new($backend.bus.clone()))
                .configure(configure_api),
        )
        .await
    };
}

#[actix_web::test]
async fn test_queries_refused_while_booting() {
    let backend = backend();
    let app = app!(backend);

    let req = test::TestRequest::get().uri("/api/v1/extensions").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model"], "booting");
}

#[actix_web::test]
async fn test_model_queries_after_bootstrap() {
    let backend = ready_backend().await;
    let app = app!(backend);

    let req = test::TestRequest::get().uri("/api/v1/extensions").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let extensions = body["data"].as_array().unwrap();
    assert_eq!(extensions.len(), 1);
    assert_eq!(extensions[0]["id"], "214");
    assert_eq!(extensions[0]["status"], "online");

    let req = test::TestRequest::get()
        .uri("/api/v1/extensions/214?privacy=1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/v1/extensions/999").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/api/v1/state").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["state"], "ready");
    assert_eq!(body["data"]["extensions"], 1);
}

#[actix_web::test]
async fn test_command_catalog() {
    let backend = backend();
    let app = app!(backend);

    let req = test::TestRequest::get().uri("/api/v1/commands").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let commands = body["data"]["commands"].as_array().unwrap();
    assert!(commands.iter().any(|c| c == "hangup"));
    assert!(commands.iter().any(|c| c == "setCallForward"));
}

#[actix_web::test]
async fn test_run_command_outcomes() {
    let backend = ready_backend().await;
    let app = app!(backend);

    let req = test::TestRequest::post()
        .uri("/api/v1/commands/hangup")
        .set_json(json!({ "args": { "channel": "PJSIP/214-00000001" } }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["command"], "hangup");
    assert_eq!(body["data"]["output"]["type"], "done");

    let req = test::TestRequest::post()
        .uri("/api/v1/commands/hangup")
        .set_json(json!({ "args": { "channel": "PJSIP/gone-00000001" } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let req = test::TestRequest::post()
        .uri("/api/v1/commands/hangup")
        .set_json(json!({ "args": {} }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/v1/commands/hangup")
        .set_json(json!({ "args": { "channel": ["PJSIP/214"] } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/v1/commands/selfDestruct")
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_reload_is_accepted() {
    let backend = ready_backend().await;
    let mut notifications = backend.bus.subscribe();
    let app = app!(backend);

    let req = test::TestRequest::post().uri("/api/v1/reload").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let reloaded = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match notifications.recv().await {
                Ok(Notification::Reloaded) => return,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("bus closed"),
            }
        }
    })
    .await;
    assert!(reloaded.is_ok(), "reload never completed");
}
