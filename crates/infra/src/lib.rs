//! Infrastructure layer: token persistence, user store adapter, token
//! issuance and the transport-free auth gate.

pub mod config;
pub mod email;
pub mod gate;
pub mod issuer;
pub mod password;
pub mod seed;
pub mod service;
pub mod token_store;
pub mod user_store;

pub use config::{AuthConfig, ConfigError, DefaultAdmin};
pub use email::{EmailSender, LoggingEmailSender, RecordingEmailSender, SentEmail};
pub use gate::{Authenticated, AuthGate, Credentials};
pub use issuer::{AuthTokens, IssuedToken, SingleUsePurpose, TokenIssuer, TokenTtls};
pub use service::{AuthService, Registration};
pub use token_store::{InMemoryTokenStore, TokenFilter, TokenRecord, TokenStore, TokenStoreError};
pub use user_store::{InMemoryUserStore, NewUser, UserStore, UserStoreError};
