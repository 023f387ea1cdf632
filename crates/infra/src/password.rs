//! Argon2 password hashing for the bundled user store.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

use crate::user_store::UserStoreError;

pub fn hash_password(password: &str) -> Result<String, UserStoreError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| UserStoreError::Hashing(e.to_string()))?;
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| UserStoreError::Hashing(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| UserStoreError::Hashing(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// A malformed stored hash verifies as `false`, never as an error.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// [`hash_password`] on the blocking pool, keeping argon2 off the async workers.
pub async fn hash_password_async(password: String) -> Result<String, UserStoreError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| UserStoreError::Hashing(e.to_string()))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_async(hash: String, password: String) -> Result<bool, UserStoreError> {
    tokio::task::spawn_blocking(move || verify_password(&hash, &password))
        .await
        .map_err(|e| UserStoreError::Hashing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse"));
        assert!(!verify_password(&hash, "battery staple"));
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash_password("pw").unwrap(), hash_password("pw").unwrap());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn async_variants_agree_with_sync_ones() {
        let hash = hash_password_async("correct horse".to_string()).await.unwrap();
        assert!(verify_password_async(hash.clone(), "correct horse".to_string()).await.unwrap());
        assert!(!verify_password_async(hash, "battery staple".to_string()).await.unwrap());
    }

    #[test]
    fn junk_hash_is_false() {
        assert!(!verify_password("not-a-phc-string", "pw"));
    }
}
