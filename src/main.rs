//! CTI Proxy Server
//!
//! Keeps a live model of a PBX from its manager interface and exposes it to
//! clients over HTTP and WebSocket.

use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use cti_ami::{constants::EVENT_CHANNEL_CAPACITY, AmiClient, AmiSession};
use cti_api::{configure_api, ws_handler};
use cti_core::AppConfig;
use cti_engine::{Engine, NotificationBus};
use std::env;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "cti_proxy={},cti_api={},cti_engine={},cti_ami={},actix_web=info",
            log_level, log_level, log_level, log_level
        ))
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    if env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match env::var("CTI_CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path),
        Err(_) => AppConfig::load(),
    };
    config.context("invalid configuration")
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting CTI proxy v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(load_config()?);
    info!(
        extensions = config.pbx.extensions.len(),
        trunks = config.pbx.trunks.len(),
        queues = config.pbx.queues.len(),
        "PBX tables loaded"
    );

    let client = AmiClient::new(config.ami.clone());
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(client.clone().run(tx));

    let bus = NotificationBus::new();
    let session: Arc<dyn AmiSession> = client;
    let engine = Engine::new(config.clone(), session, bus.clone());
    let ctx = engine.context();
    tokio::spawn(engine.run(rx));

    let cors_origins = env::var("CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string());

    let bind_addr = config.server_addr();
    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, config.server.workers
    );

    HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                origin
                    .to_str()
                    .map(|o| cors_origins_inner.split(',').any(|allowed| allowed.trim() == o))
                    .unwrap_or(false)
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(ctx.clone()))
            .app_data(web::Data::new(bus.clone()))
            .app_data(web::JsonConfig::default().limit(64 * 1024))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .configure(configure_api)
            .route("/ws", web::get().to(ws_handler))
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(config.server.workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
