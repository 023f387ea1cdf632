use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use clinic_auth::{AuthError, Hs256TokenCodec, Role, RolePolicy, permissions};
use clinic_infra::{
    AuthConfig, AuthGate, AuthService, EmailSender, InMemoryTokenStore, InMemoryUserStore,
    LoggingEmailSender, TokenIssuer, TokenStore, TokenStoreError, UserStore,
    seed::seed_default_admin, token_store::PostgresTokenStore,
};

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("failed to connect to Postgres: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("failed to prepare token schema: {0}")]
    Schema(#[from] TokenStoreError),

    #[error("failed to seed default admin: {0}")]
    Seed(#[from] AuthError),
}

/// Role table the clinic deployment runs with: admins manage users, clinical
/// and front-desk staff read them, patients rely on the ownership override.
pub fn clinic_policy() -> RolePolicy {
    RolePolicy::builder()
        .grant(Role::Admin, [permissions::GET_USERS, permissions::MANAGE_USERS])
        .grant(Role::Doctor, [permissions::GET_USERS])
        .grant(Role::Receptionist, [permissions::GET_USERS])
        .grant(Role::Therapist, [permissions::GET_USERS])
        .build()
}

/// Everything the handlers and the auth middleware share.
pub struct AppServices {
    pub config: AuthConfig,
    pub tokens: Arc<dyn TokenStore>,
    pub users: Arc<dyn UserStore>,
    pub issuer: Arc<TokenIssuer>,
    pub gate: Arc<AuthGate>,
    pub auth: AuthService,
}

impl AppServices {
    pub fn assemble(
        config: AuthConfig,
        tokens: Arc<dyn TokenStore>,
        users: Arc<dyn UserStore>,
        email: Arc<dyn EmailSender>,
        policy: RolePolicy,
    ) -> Self {
        let codec = Arc::new(Hs256TokenCodec::new(config.jwt_secret.as_bytes()));
        let issuer = Arc::new(TokenIssuer::new(
            codec,
            tokens.clone(),
            users.clone(),
            config.ttls(),
        ));
        for role in Role::ALL {
            let rights: Vec<&str> = policy.rights_of(role).into_iter().map(|r| r.as_str()).collect();
            tracing::debug!(%role, ?rights, "role policy entry");
        }
        let gate = Arc::new(AuthGate::new(issuer.clone(), users.clone(), Arc::new(policy)));
        let auth = AuthService::new(users.clone(), issuer.clone(), email);

        Self {
            config,
            tokens,
            users,
            issuer,
            gate,
            auth,
        }
    }

    /// In-memory stores and the clinic role table.
    pub fn in_memory(config: AuthConfig, email: Arc<dyn EmailSender>) -> Self {
        Self::assemble(
            config,
            Arc::new(InMemoryTokenStore::new()),
            Arc::new(InMemoryUserStore::new()),
            email,
            clinic_policy(),
        )
    }

    pub fn cookie_secure(&self) -> bool {
        self.config.cookie_secure
    }
}

/// Wire services from configuration: Postgres token store when
/// `DATABASE_URL` is set, in-memory otherwise; seeds the default admin.
pub async fn build_services(config: AuthConfig) -> Result<AppServices, ServicesError> {
    let tokens: Arc<dyn TokenStore> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = PgPool::connect(url).await?;
            let store = PostgresTokenStore::new(pool);
            store.ensure_schema().await?;
            tracing::info!("using Postgres token store");
            Arc::new(store)
        }
        None => {
            tracing::info!("using in-memory token store");
            Arc::new(InMemoryTokenStore::new())
        }
    };

    let services = AppServices::assemble(
        config,
        tokens,
        Arc::new(InMemoryUserStore::new()),
        Arc::new(LoggingEmailSender),
        clinic_policy(),
    );

    if let Some(admin) = &services.config.default_admin {
        seed_default_admin(services.users.as_ref(), admin).await?;
    }

    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_auth::Right;

    #[test]
    fn clinic_policy_grants_staff_reads_and_admin_management() {
        let policy = clinic_policy();
        let get = [permissions::GET_USERS];
        let manage = [permissions::MANAGE_USERS];

        assert!(policy.role_grants_any(Role::Admin, &manage));
        for staff in [Role::Doctor, Role::Receptionist, Role::Therapist] {
            assert!(policy.role_grants_any(staff, &get));
            assert!(!policy.role_grants_any(staff, &manage));
        }
        assert_eq!(policy.rights_of(Role::Patient), Vec::<&Right>::new());
        assert_ne!(policy, RolePolicy::default());
    }
}
