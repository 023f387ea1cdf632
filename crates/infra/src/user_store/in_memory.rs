use std::collections::HashMap;
use std::sync::RwLock;

use clinic_auth::Identity;
use clinic_core::UserId;

use super::{NewUser, UserStore, UserStoreError};
use crate::password::{hash_password_async, verify_password_async};

#[derive(Debug, Clone)]
struct StoredUser {
    identity: Identity,
    password_hash: String,
}

/// In-memory user store with argon2-hashed passwords.
///
/// Intended for tests/dev and as the default when no database is configured.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, StoredUser>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the disabled flag (admin/test helper).
    pub fn set_disabled(&self, id: UserId, disabled: bool) -> Result<(), UserStoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let user = users.get_mut(&id).ok_or(UserStoreError::NotFound)?;
        user.identity.disabled = disabled;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find_where(
        &self,
        pred: impl Fn(&StoredUser) -> bool,
    ) -> Result<Option<StoredUser>, UserStoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.values().find(|u| pred(u)).cloned())
    }
}

fn poisoned() -> UserStoreError {
    UserStoreError::Storage("user store lock poisoned".to_string())
}

fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, UserStoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(&id).map(|u| u.identity.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, UserStoreError> {
        Ok(self
            .find_where(|u| same_email(&u.identity.email, email))?
            .map(|u| u.identity))
    }

    async fn is_email_taken(
        &self,
        email: &str,
        excluding: Option<UserId>,
    ) -> Result<bool, UserStoreError> {
        Ok(self
            .find_where(|u| {
                same_email(&u.identity.email, email) && Some(u.identity.id) != excluding
            })?
            .is_some())
    }

    async fn create(&self, user: NewUser) -> Result<Identity, UserStoreError> {
        // Hash outside the lock.
        let password_hash = hash_password_async(user.password).await?;

        let mut users = self.users.write().map_err(|_| poisoned())?;
        if users
            .values()
            .any(|u| same_email(&u.identity.email, &user.email))
        {
            return Err(UserStoreError::EmailTaken);
        }

        let identity = Identity::new(UserId::new(), user.name, user.email.trim(), user.role);
        users.insert(
            identity.id,
            StoredUser {
                identity: identity.clone(),
                password_hash,
            },
        );
        Ok(identity)
    }

    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Identity>, UserStoreError> {
        let Some(user) = self.find_where(|u| same_email(&u.identity.email, email))? else {
            return Ok(None);
        };
        let matches = verify_password_async(user.password_hash, password.to_string()).await?;
        Ok(matches.then_some(user.identity))
    }

    async fn update_password(&self, id: UserId, password: &str) -> Result<(), UserStoreError> {
        let password_hash = hash_password_async(password.to_string()).await?;
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let user = users.get_mut(&id).ok_or(UserStoreError::NotFound)?;
        user.password_hash = password_hash;
        Ok(())
    }

    async fn mark_email_verified(&self, id: UserId) -> Result<(), UserStoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let user = users.get_mut(&id).ok_or(UserStoreError::NotFound)?;
        user.identity.is_email_verified = true;
        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<bool, UserStoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        Ok(users.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_auth::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Dana".to_string(),
            email: email.to_string(),
            password: "password1".to_string(),
            role: Role::Patient,
        }
    }

    #[tokio::test]
    async fn create_then_find_by_id_and_email() {
        let store = InMemoryUserStore::new();
        let created = store.create(new_user("dana@example.com")).await.unwrap();

        assert_eq!(store.find_by_id(created.id).await.unwrap(), Some(created.clone()));
        assert_eq!(
            store.find_by_email("DANA@example.com").await.unwrap(),
            Some(created.clone())
        );
        assert!(!created.disabled);
        assert!(!created.is_email_verified);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let store = InMemoryUserStore::new();
        store.create(new_user("dana@example.com")).await.unwrap();
        let err = store.create(new_user("Dana@Example.com")).await.unwrap_err();
        assert_eq!(err, UserStoreError::EmailTaken);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn is_email_taken_honours_exclusion() {
        let store = InMemoryUserStore::new();
        let dana = store.create(new_user("dana@example.com")).await.unwrap();

        assert!(store.is_email_taken("dana@example.com", None).await.unwrap());
        assert!(!store.is_email_taken("dana@example.com", Some(dana.id)).await.unwrap());
        assert!(!store.is_email_taken("eve@example.com", None).await.unwrap());
    }

    #[tokio::test]
    async fn credentials_and_password_update() {
        let store = InMemoryUserStore::new();
        let dana = store.create(new_user("dana@example.com")).await.unwrap();

        assert!(store.verify_credentials("dana@example.com", "password1").await.unwrap().is_some());
        assert!(store.verify_credentials("dana@example.com", "nope").await.unwrap().is_none());
        assert!(store.verify_credentials("eve@example.com", "password1").await.unwrap().is_none());

        store.update_password(dana.id, "newpassword2").await.unwrap();
        assert!(store.verify_credentials("dana@example.com", "password1").await.unwrap().is_none());
        assert!(store.verify_credentials("dana@example.com", "newpassword2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn flags_and_delete() {
        let store = InMemoryUserStore::new();
        let dana = store.create(new_user("dana@example.com")).await.unwrap();

        store.mark_email_verified(dana.id).await.unwrap();
        store.set_disabled(dana.id, true).unwrap();
        let loaded = store.find_by_id(dana.id).await.unwrap().unwrap();
        assert!(loaded.is_email_verified);
        assert!(loaded.disabled);

        assert!(store.delete(dana.id).await.unwrap());
        assert!(!store.delete(dana.id).await.unwrap());
        assert_eq!(store.find_by_id(dana.id).await.unwrap(), None);
        assert_eq!(
            store.mark_email_verified(dana.id).await.unwrap_err(),
            UserStoreError::NotFound
        );
    }
}
