use clinic_auth::Identity;
use clinic_core::UserId;

/// Request-scoped view of the authenticated caller.
///
/// Inserted by the auth middleware; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    identity: Identity,
}

impl RequestContext {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn user_id(&self) -> UserId {
        self.identity.id
    }
}
