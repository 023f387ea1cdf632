use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Right identifier (e.g. "getUsers").
///
/// Rights are opaque strings. Routes declare the rights they require and the
/// role policy says which roles carry them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Right(Cow<'static, str>);

impl Right {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Right {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read any user record.
pub const GET_USERS: Right = Right::from_static("getUsers");

/// Create, update or delete any user record.
pub const MANAGE_USERS: Right = Right::from_static("manageUsers");
