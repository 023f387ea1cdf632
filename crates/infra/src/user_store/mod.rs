//! Adapter boundary to the user store the auth layer reads identities from.

pub mod in_memory;

pub use in_memory::InMemoryUserStore;

use std::sync::Arc;

use thiserror::Error;

use clinic_auth::{AuthError, Identity, Role};
use clinic_core::UserId;

/// Input for creating a user. The password is plain text; stores hash it.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserStoreError {
    #[error("user not found")]
    NotFound,

    #[error("email is already registered")]
    EmailTaken,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<UserStoreError> for AuthError {
    fn from(value: UserStoreError) -> Self {
        match value {
            UserStoreError::NotFound => AuthError::SubjectNotFound,
            UserStoreError::EmailTaken => AuthError::EmailTaken,
            other => AuthError::Store(other.to_string()),
        }
    }
}

/// The subset of user persistence the auth layer depends on.
///
/// Email comparisons are case-insensitive.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, UserStoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, UserStoreError>;

    /// Whether `email` belongs to a user other than `excluding`.
    async fn is_email_taken(
        &self,
        email: &str,
        excluding: Option<UserId>,
    ) -> Result<bool, UserStoreError>;

    async fn create(&self, user: NewUser) -> Result<Identity, UserStoreError>;

    /// Identity for `email` if `password` matches, `None` otherwise.
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Identity>, UserStoreError>;

    async fn update_password(&self, id: UserId, password: &str) -> Result<(), UserStoreError>;

    async fn mark_email_verified(&self, id: UserId) -> Result<(), UserStoreError>;

    /// Returns whether a user was removed.
    async fn delete(&self, id: UserId) -> Result<bool, UserStoreError>;
}

#[async_trait::async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, UserStoreError> {
        (**self).find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, UserStoreError> {
        (**self).find_by_email(email).await
    }

    async fn is_email_taken(
        &self,
        email: &str,
        excluding: Option<UserId>,
    ) -> Result<bool, UserStoreError> {
        (**self).is_email_taken(email, excluding).await
    }

    async fn create(&self, user: NewUser) -> Result<Identity, UserStoreError> {
        (**self).create(user).await
    }

    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Identity>, UserStoreError> {
        (**self).verify_credentials(email, password).await
    }

    async fn update_password(&self, id: UserId, password: &str) -> Result<(), UserStoreError> {
        (**self).update_password(id, password).await
    }

    async fn mark_email_verified(&self, id: UserId) -> Result<(), UserStoreError> {
        (**self).mark_email_verified(id).await
    }

    async fn delete(&self, id: UserId) -> Result<bool, UserStoreError> {
        (**self).delete(id).await
    }
}
