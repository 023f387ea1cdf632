use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use clinic_auth::AuthError;

pub mod messages {
    pub const UNAUTHORIZED: &str = "Unauthorized: Please authenticate.";
    pub const SESSION_EXPIRED: &str = "Session has expired. Please log in again.";
    pub const FORBIDDEN: &str = "Forbidden: You do not have permission to access this resource.";
    pub const INVALID_TOKEN: &str = "Invalid Token.";
    pub const USER_NOT_FOUND: &str = "User not found.";
    pub const USER_IS_DISABLED: &str = "User is disabled.";
    pub const EMAIL_ALREADY_REGISTERED: &str = "Email is already registered.";
    pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";
    pub const INTERNAL: &str = "Something went wrong.";
}

/// Map an auth failure to a status and a fixed client message.
///
/// Store and signing details are logged, never returned.
pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::Unauthenticated | AuthError::MalformedToken => {
            json_error(StatusCode::UNAUTHORIZED, "unauthorized", messages::UNAUTHORIZED)
        }
        AuthError::ExpiredToken | AuthError::SessionExpired => json_error(
            StatusCode::UNAUTHORIZED,
            "session_expired",
            messages::SESSION_EXPIRED,
        ),
        AuthError::InvalidToken => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_token", messages::INVALID_TOKEN)
        }
        AuthError::IdentityNotFound => {
            json_error(StatusCode::UNAUTHORIZED, "unauthorized", messages::USER_NOT_FOUND)
        }
        AuthError::IdentityDisabled => {
            json_error(StatusCode::UNAUTHORIZED, "user_disabled", messages::USER_IS_DISABLED)
        }
        AuthError::PolicyDenied => json_error(StatusCode::FORBIDDEN, "forbidden", messages::FORBIDDEN),
        AuthError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            messages::INVALID_CREDENTIALS,
        ),
        AuthError::SubjectNotFound => {
            json_error(StatusCode::NOT_FOUND, "not_found", messages::USER_NOT_FOUND)
        }
        AuthError::EmailTaken => json_error(
            StatusCode::BAD_REQUEST,
            "email_taken",
            messages::EMAIL_ALREADY_REGISTERED,
        ),
        AuthError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        AuthError::Store(detail) => {
            tracing::error!(error = %detail, "token or user store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", messages::INTERNAL)
        }
        AuthError::Signing(detail) => {
            tracing::error!(error = %detail, "token signing failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "signing_error", messages::INTERNAL)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
