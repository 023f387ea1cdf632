//! `clinic-auth`: token model, signing codec and role policy.
//!
//! No HTTP or storage here: the crate knows how
//! to mint and check bearer tokens and how to decide whether an identity may
//! act, nothing more.

pub mod claims;
pub mod codec;
pub mod error;
pub mod identity;
pub mod permissions;
pub mod policy;
pub mod roles;

pub use claims::{BindingMeta, TokenClaims, TokenType, TokenValidationError, validate_claims};
pub use codec::{Hs256TokenCodec, TokenCodec};
pub use error::AuthError;
pub use identity::Identity;
pub use permissions::Right;
pub use policy::{RolePolicy, RolePolicyBuilder};
pub use roles::{Role, UnknownRole};
