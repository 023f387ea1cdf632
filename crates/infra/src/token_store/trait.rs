use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use clinic_auth::{AuthError, TokenType};
use clinic_core::UserId;

/// A persisted stateful token.
///
/// A signed refresh/reset/verify token is only honoured while a matching,
/// non-blacklisted record exists. Deleting the record revokes the token
/// before its natural expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token: String,
    pub user: UserId,
    pub token_type: TokenType,
    pub expires: DateTime<Utc>,
    pub blacklisted: bool,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(
        token: impl Into<String>,
        user: UserId,
        token_type: TokenType,
        expires: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            user,
            token_type,
            expires,
            blacklisted: false,
            created_at,
        }
    }
}

/// Conjunctive match over record fields. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenFilter {
    pub token: Option<String>,
    pub user: Option<UserId>,
    pub token_type: Option<TokenType>,
    pub blacklisted: Option<bool>,
    /// Matches records whose `expires` is strictly before this instant.
    pub expires_before: Option<DateTime<Utc>>,
}

impl TokenFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lookup that decides whether a presented token is still live.
    pub fn live(token: impl Into<String>, token_type: TokenType, user: UserId) -> Self {
        Self::new()
            .token(token)
            .token_type(token_type)
            .user(user)
            .blacklisted(false)
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    pub fn token_type(mut self, token_type: TokenType) -> Self {
        self.token_type = Some(token_type);
        self
    }

    pub fn blacklisted(mut self, blacklisted: bool) -> Self {
        self.blacklisted = Some(blacklisted);
        self
    }

    pub fn expires_before(mut self, at: DateTime<Utc>) -> Self {
        self.expires_before = Some(at);
        self
    }

    /// A filter that constrains neither the token nor the user would match
    /// every subject's records.
    pub fn is_unscoped(&self) -> bool {
        self.token.is_none() && self.user.is_none()
    }

    pub fn matches(&self, record: &TokenRecord) -> bool {
        self.token.as_deref().is_none_or(|t| t == record.token)
            && self.user.is_none_or(|u| u == record.user)
            && self.token_type.is_none_or(|t| t == record.token_type)
            && self.blacklisted.is_none_or(|b| b == record.blacklisted)
            && self.expires_before.is_none_or(|at| record.expires < at)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenStoreError {
    #[error("a record for this token already exists")]
    Duplicate,

    #[error("refusing bulk delete without a token or user scope")]
    UnscopedDelete,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<TokenStoreError> for AuthError {
    fn from(value: TokenStoreError) -> Self {
        AuthError::Store(value.to_string())
    }
}

/// Durable store for [`TokenRecord`]s.
///
/// Implementations must be safe under concurrent use for the same subject.
/// In particular `find_one_and_delete` is atomic per record: when two callers
/// race on the same filter, at most one of them receives the record.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a new record. Token strings are unique.
    async fn create(&self, record: TokenRecord) -> Result<(), TokenStoreError>;

    async fn find_one(&self, filter: &TokenFilter) -> Result<Option<TokenRecord>, TokenStoreError>;

    /// Remove and return one matching record, atomically.
    async fn find_one_and_delete(
        &self,
        filter: &TokenFilter,
    ) -> Result<Option<TokenRecord>, TokenStoreError>;

    /// Remove every matching record and return how many were removed.
    ///
    /// Unscoped filters are rejected with [`TokenStoreError::UnscopedDelete`].
    async fn delete_many(&self, filter: &TokenFilter) -> Result<u64, TokenStoreError>;
}

#[async_trait::async_trait]
impl<S> TokenStore for Arc<S>
where
    S: TokenStore + ?Sized,
{
    async fn create(&self, record: TokenRecord) -> Result<(), TokenStoreError> {
        (**self).create(record).await
    }

    async fn find_one(&self, filter: &TokenFilter) -> Result<Option<TokenRecord>, TokenStoreError> {
        (**self).find_one(filter).await
    }

    async fn find_one_and_delete(
        &self,
        filter: &TokenFilter,
    ) -> Result<Option<TokenRecord>, TokenStoreError> {
        (**self).find_one_and_delete(filter).await
    }

    async fn delete_many(&self, filter: &TokenFilter) -> Result<u64, TokenStoreError> {
        (**self).delete_many(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(user: UserId, token_type: TokenType, expires: DateTime<Utc>) -> TokenRecord {
        TokenRecord::new("tok", user, token_type, expires, Utc::now())
    }

    #[test]
    fn live_filter_requires_every_key() {
        let user = UserId::new();
        let now = Utc::now();
        let r = record(user, TokenType::Refresh, now + Duration::days(1));

        assert!(TokenFilter::live("tok", TokenType::Refresh, user).matches(&r));
        assert!(!TokenFilter::live("other", TokenType::Refresh, user).matches(&r));
        assert!(!TokenFilter::live("tok", TokenType::ResetPassword, user).matches(&r));
        assert!(!TokenFilter::live("tok", TokenType::Refresh, UserId::new()).matches(&r));

        let mut blacklisted = r.clone();
        blacklisted.blacklisted = true;
        assert!(!TokenFilter::live("tok", TokenType::Refresh, user).matches(&blacklisted));
    }

    #[test]
    fn expires_before_is_strict() {
        let user = UserId::new();
        let now = Utc::now();
        let r = record(user, TokenType::Refresh, now);
        assert!(!TokenFilter::new().user(user).expires_before(now).matches(&r));
        assert!(
            TokenFilter::new()
                .user(user)
                .expires_before(now + Duration::seconds(1))
                .matches(&r)
        );
    }

    #[test]
    fn unscoped_detection() {
        assert!(TokenFilter::new().token_type(TokenType::Refresh).is_unscoped());
        assert!(!TokenFilter::new().user(UserId::new()).is_unscoped());
        assert!(!TokenFilter::new().token("t").is_unscoped());
    }
}
