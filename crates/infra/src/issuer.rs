//! Token issuance, rotation and single-use consumption.
//!
//! The issuer is the only component that writes to the token store. Every
//! operation takes `now` explicitly so that verification is deterministic.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use clinic_auth::{AuthError, BindingMeta, Identity, TokenClaims, TokenCodec, TokenType};
use clinic_core::UserId;

use crate::token_store::{TokenFilter, TokenRecord, TokenStore};
use crate::user_store::UserStore;

/// Lifetimes per token type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtls {
    pub access: Duration,
    pub refresh: Duration,
    pub reset_password: Duration,
    pub verify_email: Duration,
}

impl TokenTtls {
    pub fn of(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.access,
            TokenType::Refresh => self.refresh,
            TokenType::ResetPassword => self.reset_password,
            TokenType::VerifyEmail => self.verify_email,
        }
    }
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            access: Duration::minutes(30),
            refresh: Duration::days(30),
            reset_password: Duration::minutes(10),
            verify_email: Duration::minutes(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires: DateTime<Utc>,
}

/// Credentials handed to a client. `refresh` is absent only when the caller
/// asked for an access token alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthTokens {
    pub access: IssuedToken,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<IssuedToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleUsePurpose {
    ResetPassword,
    VerifyEmail,
}

impl SingleUsePurpose {
    pub fn token_type(&self) -> TokenType {
        match self {
            SingleUsePurpose::ResetPassword => TokenType::ResetPassword,
            SingleUsePurpose::VerifyEmail => TokenType::VerifyEmail,
        }
    }
}

pub struct TokenIssuer {
    codec: Arc<dyn TokenCodec>,
    store: Arc<dyn TokenStore>,
    users: Arc<dyn UserStore>,
    ttls: TokenTtls,
}

impl TokenIssuer {
    pub fn new(
        codec: Arc<dyn TokenCodec>,
        store: Arc<dyn TokenStore>,
        users: Arc<dyn UserStore>,
        ttls: TokenTtls,
    ) -> Self {
        Self {
            codec,
            store,
            users,
            ttls,
        }
    }

    pub fn codec(&self) -> &dyn TokenCodec {
        self.codec.as_ref()
    }

    pub fn ttls(&self) -> TokenTtls {
        self.ttls
    }

    fn mint(
        &self,
        sub: UserId,
        token_type: TokenType,
        binding: &BindingMeta,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let expires = now + self.ttls.of(token_type);
        let claims = TokenClaims::new(sub, token_type, now, expires, binding);
        let token = self.codec.sign(&claims)?;
        Ok(IssuedToken { token, expires })
    }

    async fn persist(
        &self,
        issued: &IssuedToken,
        user: UserId,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let record = TokenRecord::new(issued.token.clone(), user, token_type, issued.expires, now);
        self.store.create(record).await?;
        Ok(())
    }

    /// Mint an access token and, optionally, a persisted refresh token.
    ///
    /// Both are signed before anything is written, so a signing failure
    /// leaves no record behind.
    pub async fn issue_auth_tokens(
        &self,
        identity: &Identity,
        binding: &BindingMeta,
        include_refresh: bool,
        now: DateTime<Utc>,
    ) -> Result<AuthTokens, AuthError> {
        let access = self.mint(identity.id, TokenType::Access, binding, now)?;
        let refresh = if include_refresh {
            let refresh = self.mint(identity.id, TokenType::Refresh, binding, now)?;
            self.persist(&refresh, identity.id, TokenType::Refresh, now)
                .await?;
            Some(refresh)
        } else {
            None
        };

        Ok(AuthTokens { access, refresh })
    }

    /// Exchange a refresh token for a new pair and return the identity it
    /// belongs to.
    ///
    /// The old record is removed with a single atomic find-and-delete, so of
    /// two concurrent rotations of the same token exactly one succeeds.
    pub async fn rotate(
        &self,
        refresh: &str,
        binding: &BindingMeta,
        now: DateTime<Utc>,
    ) -> Result<(Identity, AuthTokens), AuthError> {
        let claims = self.codec.verify(refresh, TokenType::Refresh, now)?;

        let filter = TokenFilter::live(refresh, TokenType::Refresh, claims.sub);
        if self.store.find_one_and_delete(&filter).await?.is_none() {
            tracing::warn!(user_id = %claims.sub, "refresh token reuse or revoked token presented");
            return Err(AuthError::InvalidToken);
        }

        let identity = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::IdentityNotFound)?;
        if identity.disabled {
            return Err(AuthError::IdentityDisabled);
        }

        let tokens = self.issue_auth_tokens(&identity, binding, true, now).await?;
        tracing::info!(user_id = %identity.id, "refresh token rotated");
        Ok((identity, tokens))
    }

    pub async fn rotate_refresh(
        &self,
        refresh: &str,
        binding: &BindingMeta,
        now: DateTime<Utc>,
    ) -> Result<AuthTokens, AuthError> {
        self.rotate(refresh, binding, now)
            .await
            .map(|(_, tokens)| tokens)
    }

    pub async fn issue_single_use(
        &self,
        identity: &Identity,
        purpose: SingleUsePurpose,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let token_type = purpose.token_type();
        let issued = self.mint(identity.id, token_type, &BindingMeta::default(), now)?;
        self.persist(&issued, identity.id, token_type, now).await?;
        Ok(issued.token)
    }

    /// Spend a reset-password or verify-email token.
    ///
    /// Forged, expired and already-spent tokens are indistinguishable to the
    /// caller. On success every other token of the same purpose for the
    /// subject is deleted too.
    pub async fn consume_single_use(
        &self,
        token: &str,
        purpose: SingleUsePurpose,
        now: DateTime<Utc>,
    ) -> Result<UserId, AuthError> {
        let token_type = purpose.token_type();
        let claims = match self.codec.verify(token, token_type, now) {
            Ok(claims) => claims,
            Err(AuthError::Signing(e)) => return Err(AuthError::Signing(e)),
            Err(_) => return Err(AuthError::InvalidToken),
        };

        let filter = TokenFilter::live(token, token_type, claims.sub);
        if self.store.find_one_and_delete(&filter).await?.is_none() {
            tracing::warn!(user_id = %claims.sub, purpose = %token_type, "single-use token without live record");
            return Err(AuthError::InvalidToken);
        }

        let siblings = TokenFilter::new().user(claims.sub).token_type(token_type);
        let removed = self.store.delete_many(&siblings).await?;
        tracing::debug!(user_id = %claims.sub, purpose = %token_type, removed, "single-use token consumed");

        Ok(claims.sub)
    }

    /// Revoke a refresh token (logout).
    ///
    /// The signature is not checked: holding the exact token string is enough
    /// to throw it away. The owner's already-expired refresh records are
    /// purged in the same call.
    pub async fn revoke(&self, refresh: &str, now: DateTime<Utc>) -> Result<UserId, AuthError> {
        let filter = TokenFilter::new()
            .token(refresh)
            .token_type(TokenType::Refresh)
            .blacklisted(false);
        let record = self
            .store
            .find_one_and_delete(&filter)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let expired = TokenFilter::new()
            .user(record.user)
            .token_type(TokenType::Refresh)
            .expires_before(now);
        let purged = self.store.delete_many(&expired).await?;
        tracing::info!(user_id = %record.user, purged, "refresh token revoked");

        Ok(record.user)
    }
}

impl core::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}
