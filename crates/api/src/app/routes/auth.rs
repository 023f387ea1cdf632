use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;

use clinic_auth::{AuthError, Right};

use crate::app::{dto, errors, extract::JsonBody, routes::system, services::AppServices};
use crate::context::RequestContext;
use crate::cookies::{REFRESH_COOKIE, append_cleared_cookies, append_session_cookies, parse_cookie};
use crate::middleware::{GateState, auth_middleware, client_binding};

pub fn router(services: Arc<AppServices>) -> Router {
    let signed_in = GateState::new(services, std::iter::empty::<Right>());

    let gated = Router::new()
        .route("/send-verification-email", post(send_verification_email))
        .route("/me", get(system::whoami))
        .route_layer(from_fn_with_state(signed_in, auth_middleware));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh-tokens", post(refresh_tokens))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/verify-email", post(verify_email))
        .merge(gated)
}

fn peer(connect: Option<ConnectInfo<SocketAddr>>) -> Option<SocketAddr> {
    connect.map(|ConnectInfo(addr)| addr)
}

fn message(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Body `refreshToken` first, then the `refresh` cookie.
fn presented_refresh(
    body: Option<Json<dto::RefreshTokenRequest>>,
    headers: &HeaderMap,
) -> Result<String, AuthError> {
    body.and_then(|Json(b)| b.refresh_token)
        .filter(|t| !t.is_empty())
        .or_else(|| parse_cookie(headers, REFRESH_COOKIE))
        .ok_or(AuthError::Unauthenticated)
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<dto::RegisterRequest>,
) -> axum::response::Response {
    if let Err(e) = body.validate() {
        return errors::auth_error_to_response(e);
    }

    let binding = client_binding(&headers, peer(connect));
    match services
        .auth
        .register(&body.name, &body.email, &body.password, &binding, Utc::now())
        .await
    {
        Ok(reg) => {
            let mut response = (
                StatusCode::CREATED,
                Json(dto::session_to_json(
                    &reg.identity,
                    &reg.tokens,
                    "Account created successfully.",
                )),
            )
                .into_response();
            append_session_cookies(response.headers_mut(), &reg.tokens, services.cookie_secure());
            response
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<dto::LoginRequest>,
) -> axum::response::Response {
    if let Err(e) = body.validate() {
        return errors::auth_error_to_response(e);
    }

    let binding = client_binding(&headers, peer(connect));
    match services
        .auth
        .login(&body.email, &body.password, &binding, Utc::now())
        .await
    {
        Ok((identity, tokens)) => {
            let mut response = (
                StatusCode::OK,
                Json(dto::session_to_json(&identity, &tokens, "Logged in successfully.")),
            )
                .into_response();
            append_session_cookies(response.headers_mut(), &tokens, services.cookie_secure());
            response
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Option<Json<dto::RefreshTokenRequest>>,
) -> axum::response::Response {
    let result = match presented_refresh(body, &headers) {
        Ok(refresh) => services.auth.logout(&refresh, Utc::now()).await,
        Err(e) => Err(e),
    };

    let mut response = match result {
        Ok(()) => message(StatusCode::OK, "Logout successfully"),
        Err(e) => errors::auth_error_to_response(e),
    };
    append_cleared_cookies(response.headers_mut(), services.cookie_secure());
    response
}

pub async fn refresh_tokens(
    Extension(services): Extension<Arc<AppServices>>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Option<Json<dto::RefreshTokenRequest>>,
) -> axum::response::Response {
    let binding = client_binding(&headers, peer(connect));
    let refresh = match presented_refresh(body, &headers) {
        Ok(refresh) => refresh,
        Err(e) => return errors::auth_error_to_response(e),
    };

    match services.auth.refresh(&refresh, &binding, Utc::now()).await {
        Ok(tokens) => {
            let mut response = (
                StatusCode::OK,
                Json(json!({
                    "tokens": tokens,
                    "message": "Token refreshed successfully.",
                })),
            )
                .into_response();
            append_session_cookies(response.headers_mut(), &tokens, services.cookie_secure());
            response
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn forgot_password(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::ForgotPasswordRequest>,
) -> axum::response::Response {
    if let Err(e) = body.validate() {
        return errors::auth_error_to_response(e);
    }

    match services.auth.forgot_password(&body.email, Utc::now()).await {
        Ok(()) => message(StatusCode::OK, "Password reset email sent successfully."),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::ResetPasswordRequest>,
) -> axum::response::Response {
    if let Err(e) = body.validate() {
        return errors::auth_error_to_response(e);
    }

    match services
        .auth
        .reset_password(&body.token, &body.password, Utc::now())
        .await
    {
        Ok(()) => message(StatusCode::OK, "Password reset successfully."),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn send_verification_email(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    match services
        .auth
        .send_verification_email(ctx.identity(), Utc::now())
        .await
    {
        Ok(()) => message(StatusCode::OK, "Verification email sent successfully."),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn verify_email(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::VerifyEmailRequest>,
) -> axum::response::Response {
    if let Err(e) = body.validate() {
        return errors::auth_error_to_response(e);
    }

    match services.auth.verify_email(&body.token, Utc::now()).await {
        Ok(()) => message(StatusCode::OK, "Email verified successfully."),
        Err(e) => errors::auth_error_to_response(e),
    }
}
