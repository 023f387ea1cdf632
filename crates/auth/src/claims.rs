use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use clinic_core::UserId;

/// Kind of bearer token. The wire name doubles as the cookie name for the
/// access and refresh tokens.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenType {
    Access,
    Refresh,
    ResetPassword,
    VerifyEmail,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
            TokenType::ResetPassword => "reset-password",
            TokenType::VerifyEmail => "verify-email",
        }
    }
}

impl core::fmt::Display for TokenType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(TokenType::Access),
            "refresh" => Ok(TokenType::Refresh),
            "reset-password" => Ok(TokenType::ResetPassword),
            "verify-email" => Ok(TokenType::VerifyEmail),
            other => Err(format!("unknown token type '{other}'")),
        }
    }
}

/// Request-origin data embedded in a token to narrow its replay surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingMeta {
    pub ip: Option<String>,
}

impl BindingMeta {
    pub fn from_ip(ip: impl Into<String>) -> Self {
        Self { ip: Some(ip.into()) }
    }
}

/// Signed token payload.
///
/// Times are whole epoch seconds. `jti` keeps two tokens minted for the same
/// subject within the same second distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user id).
    pub sub: UserId,

    /// Origin IP of the request that caused the token to be minted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Issued-at, epoch seconds.
    pub iat: i64,

    /// Expiry, epoch seconds (exclusive).
    pub exp: i64,

    #[serde(rename = "type")]
    pub token_type: TokenType,

    pub jti: Uuid,
}

impl TokenClaims {
    pub fn new(
        sub: UserId,
        token_type: TokenType,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        binding: &BindingMeta,
    ) -> Self {
        Self {
            sub,
            ip: binding.ip.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            token_type,
            jti: Uuid::new_v4(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("token type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: TokenType, found: TokenType },
}

/// Deterministically validate decoded claims against the expected type and
/// the current time.
///
/// Comparison is in whole seconds and expiry is exclusive: a token is no
/// longer valid at `exp`. The type is checked before the clock so that a
/// token of the wrong kind is never reported as merely expired.
pub fn validate_claims(
    claims: &TokenClaims,
    expected: TokenType,
    now: DateTime<Utc>,
) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if claims.token_type != expected {
        return Err(TokenValidationError::TypeMismatch {
            expected,
            found: claims.token_type,
        });
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
