use thiserror::Error;

/// Every way an authentication or authorization step can fail.
///
/// Transport-agnostic: the HTTP layer decides status codes and the message
/// shown to clients. `Store` and `Signing` carry internal detail for logs only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Neither an access nor a refresh credential was presented.
    #[error("no credentials presented")]
    Unauthenticated,

    /// Signature or structure is invalid.
    #[error("malformed token")]
    MalformedToken,

    /// The token's validity window has elapsed.
    #[error("token has expired")]
    ExpiredToken,

    /// The access token expired and no usable refresh token was presented.
    #[error("session has expired")]
    SessionExpired,

    /// Signature is valid but the token is of the wrong type or has no live record.
    #[error("invalid token")]
    InvalidToken,

    /// The token's subject no longer exists.
    #[error("identity not found")]
    IdentityNotFound,

    #[error("identity is disabled")]
    IdentityDisabled,

    /// The identity lacks the required rights and does not own the resource.
    #[error("forbidden")]
    PolicyDenied,

    #[error("invalid email or password")]
    InvalidCredentials,

    /// A lookup by email or a consumed token's subject found no user.
    #[error("user not found")]
    SubjectNotFound,

    #[error("email is already registered")]
    EmailTaken,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("token store failure: {0}")]
    Store(String),

    #[error("token signing failure: {0}")]
    Signing(String),
}
