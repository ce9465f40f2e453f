//! Command handlers
//!
//! Commands go through the correlator like any engine-issued command, and
//! their outcome is written back into the live model before the response.

use crate::dto::{ApiResponse, CommandCatalog, CommandRequest, CommandResponse};
use actix_web::{web, HttpResponse};
use cti_core::AppError;
use cti_engine::EngineContext;
use tracing::{info, instrument, warn};
use validator::Validate;

/// List supported commands
///
/// GET /api/v1/commands
pub async fn list_commands(ctx: web::Data<EngineContext>) -> HttpResponse {
    let commands = ctx
        .correlator()
        .registry()
        .names()
        .into_iter()
        .map(str::to_string)
        .collect();
    HttpResponse::Ok().json(ApiResponse::success(CommandCatalog { commands }))
}

/// Run a command
///
/// POST /api/v1/commands/{name}
#[instrument(skip(ctx, req))]
pub async fn run_command(
    ctx: web::Data<EngineContext>,
    path: web::Path<String>,
    req: web::Json<CommandRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Command validation failed: {}", e);
        AppError::from(e)
    })?;

    let command = path.into_inner();
    let output = ctx.run(&command, req.into_inner().args).await?;
    info!(command = %command, "Command completed");

    Ok(HttpResponse::Ok().json(ApiResponse::success(CommandResponse { command, output })))
}

/// Request a full model reload
///
/// POST /api/v1/reload
pub async fn reload(ctx: web::Data<EngineContext>) -> HttpResponse {
    info!("Model reload requested over HTTP");
    ctx.request_reload();
    HttpResponse::Accepted().json(ApiResponse::with_message((), "reload scheduled"))
}

/// Configure command routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/commands")
            .route("", web::get().to(list_commands))
            .route("/{name}", web::post().to(run_command)),
    )
    .route("/reload", web::post().to(reload));
}
