use std::sync::Arc;

use axum::Router;

use crate::app::services::AppServices;

pub mod auth;
pub mod system;
pub mod users;

/// Versioned API. Gated routes carry their own auth layer.
pub fn router(services: Arc<AppServices>) -> Router {
    Router::new()
        .nest("/auth", auth::router(services.clone()))
        .nest("/users", users::router(services))
}
