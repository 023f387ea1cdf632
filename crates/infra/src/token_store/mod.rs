//! Persistence boundary for stateful tokens (refresh, reset-password,
//! verify-email).

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryTokenStore;
pub use postgres::PostgresTokenStore;
pub use r#trait::{TokenFilter, TokenRecord, TokenStore, TokenStoreError};
