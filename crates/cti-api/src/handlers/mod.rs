//! HTTP request handlers

pub mod commands;
pub mod model;
pub mod system;
pub mod ws;

use actix_web::web;

pub use ws::ws_handler;

/// Mount every REST route under `/api/v1`
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(model::configure)
            .configure(commands::configure)
            .configure(system::configure),
    );
}
