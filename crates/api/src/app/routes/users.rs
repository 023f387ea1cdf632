use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{delete, get},
};

use clinic_auth::permissions::{GET_USERS, MANAGE_USERS};
use clinic_core::UserId;
use clinic_infra::{TokenFilter, TokenStore, UserStore};

use crate::app::errors::{self, messages};
use crate::app::{dto, services::AppServices};
use crate::context::RequestContext;
use crate::middleware::{GateState, auth_middleware};

pub fn router(services: Arc<AppServices>) -> Router {
    let read = GateState::new(services.clone(), [GET_USERS]);
    let manage = GateState::new(services, [MANAGE_USERS]);

    Router::new().route(
        "/:id",
        get(get_user)
            .route_layer(from_fn_with_state(read, auth_middleware))
            .merge(delete(delete_user).route_layer(from_fn_with_state(manage, auth_middleware))),
    )
}

fn parse_user_id(raw: &str) -> Result<UserId, axum::response::Response> {
    raw.parse::<UserId>().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "id must be a valid user id")
    })
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.users.find_by_id(id).await {
        Ok(Some(user)) => (StatusCode::OK, Json(serde_json::json!({ "data": dto::user_to_json(&user) })))
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", messages::USER_NOT_FOUND),
        Err(e) => errors::auth_error_to_response(e.into()),
    }
}

/// Deleting a user also drops every token record they hold.
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.users.delete(id).await {
        Ok(true) => {}
        Ok(false) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", messages::USER_NOT_FOUND);
        }
        Err(e) => return errors::auth_error_to_response(e.into()),
    }

    if let Err(e) = services.tokens.delete_many(&TokenFilter::new().user(id)).await {
        return errors::auth_error_to_response(e.into());
    }

    tracing::info!(user_id = %id, actor = %ctx.user_id(), "user deleted");
    (
        StatusCode::OK,
        Json(serde_json::json!({ "message": "User deleted successfully." })),
    )
        .into_response()
}
