//! Transport-free request gate: turns presented credentials into an
//! authorized identity, rotating the session when the access token lapsed.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use clinic_auth::{AuthError, BindingMeta, Identity, Right, RolePolicy, TokenType};
use clinic_core::UserId;

use crate::issuer::{AuthTokens, TokenIssuer};
use crate::user_store::UserStore;

/// Bearer credentials as presented by the client. Empty strings count as
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl Credentials {
    pub fn new(access: Option<String>, refresh: Option<String>) -> Self {
        Self {
            access: access.filter(|t| !t.is_empty()),
            refresh: refresh.filter(|t| !t.is_empty()),
        }
    }
}

/// Outcome of a successful authentication. `rotated` carries the new pair
/// when the session had to be refreshed; the transport must hand it back to
/// the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub identity: Identity,
    pub rotated: Option<AuthTokens>,
}

pub struct AuthGate {
    issuer: Arc<TokenIssuer>,
    users: Arc<dyn UserStore>,
    policy: Arc<RolePolicy>,
}

impl AuthGate {
    pub fn new(issuer: Arc<TokenIssuer>, users: Arc<dyn UserStore>, policy: Arc<RolePolicy>) -> Self {
        Self {
            issuer,
            users,
            policy,
        }
    }

    /// Resolve credentials to an identity.
    ///
    /// A valid access token wins. An expired one falls through to rotation
    /// when a refresh token is present and to `SessionExpired` otherwise.
    /// Any other access-token failure is final.
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        binding: &BindingMeta,
        now: DateTime<Utc>,
    ) -> Result<Authenticated, AuthError> {
        let refresh = credentials.refresh.as_deref();

        let Some(access) = credentials.access.as_deref() else {
            return match refresh {
                Some(refresh) => self.rotate(refresh, binding, now).await,
                None => Err(AuthError::Unauthenticated),
            };
        };

        match self.issuer.codec().verify(access, TokenType::Access, now) {
            Ok(claims) => {
                let identity = self.load_identity(claims.sub).await?;
                Ok(Authenticated {
                    identity,
                    rotated: None,
                })
            }
            Err(AuthError::ExpiredToken) => match refresh {
                Some(refresh) => self.rotate(refresh, binding, now).await,
                None => Err(AuthError::SessionExpired),
            },
            Err(e) => Err(e),
        }
    }

    /// Role check against the route's required rights and the path-addressed
    /// resource id.
    pub fn authorize(
        &self,
        identity: &Identity,
        required: &[Right],
        target: Option<&str>,
    ) -> Result<(), AuthError> {
        self.policy.authorize(identity, required, target)
    }

    async fn rotate(
        &self,
        refresh: &str,
        binding: &BindingMeta,
        now: DateTime<Utc>,
    ) -> Result<Authenticated, AuthError> {
        match self.issuer.rotate(refresh, binding, now).await {
            Ok((identity, tokens)) => Ok(Authenticated {
                identity,
                rotated: Some(tokens),
            }),
            Err(AuthError::ExpiredToken) => Err(AuthError::SessionExpired),
            Err(e) => Err(e),
        }
    }

    async fn load_identity(&self, id: UserId) -> Result<Identity, AuthError> {
        let identity = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(AuthError::IdentityNotFound)?;
        if identity.disabled {
            return Err(AuthError::IdentityDisabled);
        }
        Ok(identity)
    }
}

impl core::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthGate")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}
