//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: token/user stores, issuer, gate and account flows
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs with boundary validation, JSON mapping helpers
//! - `extract.rs`: JSON body extractor with structured rejections
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/v1", routes::router(services.clone()))
        .layer(ServiceBuilder::new().layer(Extension(services)))
}

pub use services::{AppServices, build_services};
