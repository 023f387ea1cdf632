use axum::{Extension, Json, http::StatusCode, response::IntoResponse};

use crate::app::dto;
use crate::context::RequestContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<RequestContext>) -> impl IntoResponse {
    Json(serde_json::json!({ "user": dto::user_to_json(ctx.identity()) }))
}
