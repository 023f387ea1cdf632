//! Startup seeding of the configured admin account.

use clinic_auth::{AuthError, Identity, Role};

use crate::config::DefaultAdmin;
use crate::user_store::{NewUser, UserStore};

/// Create the admin unless a user with that email already exists.
///
/// Returns the created identity, or `None` when nothing was written.
pub async fn seed_default_admin(
    users: &dyn UserStore,
    admin: &DefaultAdmin,
) -> Result<Option<Identity>, AuthError> {
    if users.is_email_taken(&admin.email, None).await? {
        tracing::debug!("default admin already present");
        return Ok(None);
    }

    let identity = users
        .create(NewUser {
            name: admin.name.clone(),
            email: admin.email.clone(),
            password: admin.password.clone(),
            role: Role::Admin,
        })
        .await?;
    tracing::info!(user_id = %identity.id, "default admin created");
    Ok(Some(identity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_store::InMemoryUserStore;

    #[tokio::test]
    async fn seeds_once() {
        let users = InMemoryUserStore::new();
        let admin = DefaultAdmin {
            name: "Root".to_string(),
            email: "root@example.com".to_string(),
            password: "password1".to_string(),
        };

        let created = seed_default_admin(&users, &admin).await.unwrap().unwrap();
        assert_eq!(created.role, Role::Admin);
        assert!(seed_default_admin(&users, &admin).await.unwrap().is_none());
        assert_eq!(users.len(), 1);
    }
}
