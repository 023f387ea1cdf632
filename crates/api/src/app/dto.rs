use serde::Deserialize;
use serde_json::{Value, json};

use clinic_auth::{AuthError, Identity};
use clinic_infra::AuthTokens;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Logout and refresh accept the token in the body or fall back to the
/// `refresh` cookie.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.name.trim().is_empty() {
            return Err(AuthError::Validation("name is required".to_string()));
        }
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(AuthError::Validation("password is required".to_string()));
        }
        Ok(())
    }
}

impl ForgotPasswordRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        validate_email(&self.email)
    }
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        require_token(&self.token)?;
        validate_password(&self.password)
    }
}

impl VerifyEmailRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        require_token(&self.token)
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    });
    if valid {
        Ok(())
    } else {
        Err(AuthError::Validation("email must be a valid email".to_string()))
    }
}

/// At least 8 characters with at least one letter and one digit.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < 8 {
        return Err(AuthError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_letter && has_digit) {
        return Err(AuthError::Validation(
            "password must contain at least 1 letter and 1 number".to_string(),
        ));
    }
    Ok(())
}

fn require_token(token: &str) -> Result<(), AuthError> {
    if token.trim().is_empty() {
        return Err(AuthError::Validation("token is required".to_string()));
    }
    Ok(())
}

// -------------------------
// Response mapping
// -------------------------

pub fn user_to_json(identity: &Identity) -> Value {
    json!({
        "id": identity.id.to_string(),
        "name": identity.name,
        "email": identity.email,
        "role": identity.role.as_str(),
        "isEmailVerified": identity.is_email_verified,
        "disabled": identity.disabled,
    })
}

pub fn session_to_json(identity: &Identity, tokens: &AuthTokens, message: &str) -> Value {
    json!({
        "user": user_to_json(identity),
        "tokens": tokens,
        "message": message,
    })
}
