use serde::{Deserialize, Serialize};

use clinic_core::UserId;

use crate::Role;

/// A resolved identity, as read from the user store.
///
/// The auth layer never mutates an identity; it only loads one by id and
/// attaches it to the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub disabled: bool,
    pub is_email_verified: bool,
}

impl Identity {
    pub fn new(id: UserId, name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            role,
            disabled: false,
            is_email_verified: false,
        }
    }
}
