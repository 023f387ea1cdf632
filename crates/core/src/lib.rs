//! `clinic-core`: identifiers and the domain error shared by every crate.
//!
//! No infrastructure concerns live here.

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::UserId;
