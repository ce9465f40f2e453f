//! Model query handlers
//!
//! Read-only projections of the live model. Every query is answered by the
//! store worker, so a response never mixes two model states.

use crate::dto::{ApiResponse, ViewParams};
use actix_web::{web, HttpResponse};
use cti_core::{AppError, AppResult};
use cti_engine::{EngineContext, LifecycleState};
use tracing::{debug, instrument};

/// Queries are refused until the first discovery round completes
async fn ensure_ready(ctx: &EngineContext) -> AppResult<()> {
    let state = ctx.store().read(|s| s.state()).await?;
    if state == LifecycleState::Booting {
        return Err(AppError::NotReady("model is still booting".to_string()));
    }
    Ok(())
}

/// List extensions
///
/// GET /api/v1/extensions
#[instrument(skip(ctx))]
pub async fn list_extensions(
    ctx: web::Data<EngineContext>,
    query: web::Query<ViewParams>,
) -> Result<HttpResponse, AppError> {
    ensure_ready(&ctx).await?;
    let privacy = query.privacy(ctx.config()).cloned();

    let extensions = ctx
        .store()
        .read(move |s| s.extensions_snapshot(privacy.as_ref()))
        .await?;
    debug!("Listing {} extensions", extensions.len());

    Ok(HttpResponse::Ok().json(ApiResponse::success(extensions)))
}

/// Get one extension
///
/// GET /api/v1/extensions/{id}
#[instrument(skip(ctx))]
pub async fn get_extension(
    ctx: web::Data<EngineContext>,
    path: web::Path<String>,
    query: web::Query<ViewParams>,
) -> Result<HttpResponse, AppError> {
    ensure_ready(&ctx).await?;
    let id = path.into_inner();
    let privacy = query.privacy(ctx.config()).cloned();

    let extension = ctx
        .store()
        .read(move |s| s.extension_snapshot(&id, privacy.as_ref()))
        .await??;

    Ok(HttpResponse::Ok().json(ApiResponse::success(extension)))
}

/// GET /api/v1/trunks
#[instrument(skip(ctx))]
pub async fn list_trunks(
    ctx: web::Data<EngineContext>,
    query: web::Query<ViewParams>,
) -> Result<HttpResponse, AppError> {
    ensure_ready(&ctx).await?;
    let privacy = query.privacy(ctx.config()).cloned();

    let trunks = ctx
        .store()
        .read(move |s| s.trunks_snapshot(privacy.as_ref()))
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(trunks)))
}

/// GET /api/v1/queues
#[instrument(skip(ctx))]
pub async fn list_queues(
    ctx: web::Data<EngineContext>,
    query: web::Query<ViewParams>,
) -> Result<HttpResponse, AppError> {
    ensure_ready(&ctx).await?;
    let privacy = query.privacy(ctx.config()).cloned();

    let queues = ctx
        .store()
        .read(move |s| s.queues_snapshot(privacy.as_ref()))
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(queues)))
}

/// GET /api/v1/queues/{id}
#[instrument(skip(ctx))]
pub async fn get_queue(
    ctx: web::Data<EngineContext>,
    path: web::Path<String>,
    query: web::Query<ViewParams>,
) -> Result<HttpResponse, AppError> {
    ensure_ready(&ctx).await?;
    let id = path.into_inner();
    let privacy = query.privacy(ctx.config()).cloned();

    let queue = ctx
        .store()
        .read(move |s| s.queue_snapshot(&id, privacy.as_ref()))
        .await??;

    Ok(HttpResponse::Ok().json(ApiResponse::success(queue)))
}

/// GET /api/v1/parkings
#[instrument(skip(ctx))]
pub async fn list_parkings(
    ctx: web::Data<EngineContext>,
    query: web::Query<ViewParams>,
) -> Result<HttpResponse, AppError> {
    ensure_ready(&ctx).await?;
    let privacy = query.privacy(ctx.config()).cloned();

    let parkings = ctx
        .store()
        .read(move |s| s.parkings_snapshot(privacy.as_ref()))
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(parkings)))
}

/// GET /api/v1/conferences
#[instrument(skip(ctx))]
pub async fn list_conferences(ctx: web::Data<EngineContext>) -> Result<HttpResponse, AppError> {
    ensure_ready(&ctx).await?;
    let conferences = ctx.store().read(|s| s.conferences_snapshot()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(conferences)))
}

/// Configure model query routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/extensions", web::get().to(list_extensions))
        .route("/extensions/{id}", web::get().to(get_extension))
        .route("/trunks", web::get().to(list_trunks))
        .route("/queues", web::get().to(list_queues))
        .route("/queues/{id}", web::get().to(get_queue))
        .route("/parkings", web::get().to(list_parkings))
        .route("/conferences", web::get().to(list_conferences));
}
