//! Account flows built on the issuer: registration, login, logout, session
//! refresh, password reset and email verification.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use clinic_auth::{AuthError, BindingMeta, Identity, Role};

use crate::email::EmailSender;
use crate::issuer::{AuthTokens, SingleUsePurpose, TokenIssuer};
use crate::user_store::{NewUser, UserStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub identity: Identity,
    pub tokens: AuthTokens,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    issuer: Arc<TokenIssuer>,
    email: Arc<dyn EmailSender>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        issuer: Arc<TokenIssuer>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            users,
            issuer,
            email,
        }
    }

    /// Self-registration always yields a patient account.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        binding: &BindingMeta,
        now: DateTime<Utc>,
    ) -> Result<Registration, AuthError> {
        if self.users.is_email_taken(email, None).await? {
            return Err(AuthError::EmailTaken);
        }
        let identity = self
            .users
            .create(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                role: Role::Patient,
            })
            .await?;
        let tokens = self
            .issuer
            .issue_auth_tokens(&identity, binding, true, now)
            .await?;

        tracing::info!(user_id = %identity.id, "user registered");
        Ok(Registration { identity, tokens })
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        binding: &BindingMeta,
        now: DateTime<Utc>,
    ) -> Result<(Identity, AuthTokens), AuthError> {
        let identity = self
            .users
            .verify_credentials(email, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if identity.disabled {
            return Err(AuthError::IdentityDisabled);
        }

        let tokens = self
            .issuer
            .issue_auth_tokens(&identity, binding, true, now)
            .await?;
        tracing::info!(user_id = %identity.id, "user logged in");
        Ok((identity, tokens))
    }

    pub async fn logout(&self, refresh: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        self.issuer.revoke(refresh, now).await.map(|_| ())
    }

    pub async fn refresh(
        &self,
        refresh: &str,
        binding: &BindingMeta,
        now: DateTime<Utc>,
    ) -> Result<AuthTokens, AuthError> {
        self.issuer.rotate_refresh(refresh, binding, now).await
    }

    pub async fn forgot_password(&self, email: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        let identity = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::SubjectNotFound)?;
        let token = self
            .issuer
            .issue_single_use(&identity, SingleUsePurpose::ResetPassword, now)
            .await?;
        self.email.send_reset_password_email(&identity, &token).await;
        Ok(())
    }

    pub async fn reset_password(
        &self,
        token: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let id = self
            .issuer
            .consume_single_use(token, SingleUsePurpose::ResetPassword, now)
            .await?;
        if self.users.find_by_id(id).await?.is_none() {
            return Err(AuthError::SubjectNotFound);
        }
        self.users.update_password(id, password).await?;

        tracing::info!(user_id = %id, "password reset");
        Ok(())
    }

    pub async fn send_verification_email(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let token = self
            .issuer
            .issue_single_use(identity, SingleUsePurpose::VerifyEmail, now)
            .await?;
        self.email.send_verification_email(identity, &token).await;
        Ok(())
    }

    pub async fn verify_email(&self, token: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        let id = self
            .issuer
            .consume_single_use(token, SingleUsePurpose::VerifyEmail, now)
            .await?;
        if self.users.find_by_id(id).await?.is_none() {
            return Err(AuthError::SubjectNotFound);
        }
        self.users.mark_email_verified(id).await?;

        tracing::info!(user_id = %id, "email verified");
        Ok(())
    }
}

impl core::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::RecordingEmailSender;
    use crate::issuer::tests::{Fixture, fixture, t0};
    use chrono::Duration;

    struct Harness {
        fx: Fixture,
        email: Arc<RecordingEmailSender>,
        service: AuthService,
    }

    fn harness() -> Harness {
        let fx = fixture();
        let email = Arc::new(RecordingEmailSender::new());
        let service = AuthService::new(fx.users.clone(), fx.issuer.clone(), email.clone());
        Harness { fx, email, service }
    }

    async fn register(h: &Harness, email: &str) -> Registration {
        h.service
            .register("Pat", email, "password1", &BindingMeta::default(), t0())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn register_creates_patient_with_session() {
        let h = harness();
        let reg = register(&h, "pat@example.com").await;
        assert_eq!(reg.identity.role, Role::Patient);
        assert!(reg.tokens.refresh.is_some());

        let dup = h
            .service
            .register("Pat", "PAT@example.com", "password1", &BindingMeta::default(), t0())
            .await;
        assert_eq!(dup.unwrap_err(), AuthError::EmailTaken);
    }

    #[tokio::test]
    async fn login_checks_password_and_disabled_flag() {
        let h = harness();
        let reg = register(&h, "pat@example.com").await;

        let bad = h
            .service
            .login("pat@example.com", "wrong-pass1", &BindingMeta::default(), t0())
            .await;
        assert_eq!(bad.unwrap_err(), AuthError::InvalidCredentials);

        let (identity, tokens) = h
            .service
            .login("pat@example.com", "password1", &BindingMeta::default(), t0())
            .await
            .unwrap();
        assert_eq!(identity.id, reg.identity.id);
        assert!(tokens.refresh.is_some());

        h.fx.users.set_disabled(identity.id, true).unwrap();
        let disabled = h
            .service
            .login("pat@example.com", "password1", &BindingMeta::default(), t0())
            .await;
        assert_eq!(disabled.unwrap_err(), AuthError::IdentityDisabled);
    }

    #[tokio::test]
    async fn logout_then_refresh_fails() {
        let h = harness();
        let refresh = register(&h, "pat@example.com").await.tokens.refresh.unwrap().token;

        h.service.logout(&refresh, t0()).await.unwrap();
        let err = h
            .service
            .refresh(&refresh, &BindingMeta::default(), t0())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidToken);
        assert_eq!(h.service.logout(&refresh, t0()).await.unwrap_err(), AuthError::InvalidToken);
    }

    #[tokio::test]
    async fn password_reset_flow() {
        let h = harness();
        register(&h, "pat@example.com").await;

        assert_eq!(
            h.service.forgot_password("nobody@example.com", t0()).await.unwrap_err(),
            AuthError::SubjectNotFound
        );

        h.service.forgot_password("pat@example.com", t0()).await.unwrap();
        let token = h.email.last_token("pat@example.com", "reset-password").unwrap();

        let later = t0() + Duration::minutes(5);
        h.service.reset_password(&token, "newpassword9", later).await.unwrap();
        assert_eq!(
            h.service.reset_password(&token, "other1234", later).await.unwrap_err(),
            AuthError::InvalidToken
        );

        assert!(
            h.service
                .login("pat@example.com", "newpassword9", &BindingMeta::default(), later)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn reset_for_deleted_user_is_subject_not_found() {
        let h = harness();
        let reg = register(&h, "pat@example.com").await;
        h.service.forgot_password("pat@example.com", t0()).await.unwrap();
        let token = h.email.last_token("pat@example.com", "reset-password").unwrap();
        h.fx.users.delete(reg.identity.id).await.unwrap();

        let err = h
            .service
            .reset_password(&token, "newpassword9", t0())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::SubjectNotFound);
    }

    #[tokio::test]
    async fn email_verification_flow() {
        let h = harness();
        let reg = register(&h, "pat@example.com").await;

        h.service.send_verification_email(&reg.identity, t0()).await.unwrap();
        let token = h.email.last_token("pat@example.com", "verify-email").unwrap();

        h.service.verify_email(&token, t0()).await.unwrap();
        let loaded = h.fx.users.find_by_id(reg.identity.id).await.unwrap().unwrap();
        assert!(loaded.is_email_verified);

        assert_eq!(
            h.service.verify_email(&token, t0()).await.unwrap_err(),
            AuthError::InvalidToken
        );
    }
}
