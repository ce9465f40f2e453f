//! Lifecycle and health handlers

use crate::dto::{ApiResponse, HealthResponse};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use cti_core::AppError;
use cti_engine::EngineContext;

/// Lifecycle summary: state, milestones and collection sizes
///
/// GET /api/v1/state
pub async fn get_state(ctx: web::Data<EngineContext>) -> Result<HttpResponse, AppError> {
    let summary = ctx.store().read(|s| s.summary()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}

/// GET /api/v1/health
pub async fn health(ctx: web::Data<EngineContext>) -> Result<HttpResponse, AppError> {
    let state = ctx.store().read(|s| s.state()).await?;
    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model: format!("{:?}", state).to_lowercase(),
        in_flight: ctx.correlator().in_flight(),
        timestamp: Utc::now(),
    }))
}

/// Configure system routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/state", web::get().to(get_state))
        .route("/health", web::get().to(health));
}
