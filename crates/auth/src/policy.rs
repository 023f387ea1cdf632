//! Role-based access policy with a self-service ownership override.

use std::collections::{HashMap, HashSet};

use clinic_core::UserId;

use crate::{AuthError, Identity, Right, Role};

/// Immutable role → rights table.
///
/// Built once at startup and shared by reference; there is no way to mutate
/// a policy after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    grants: HashMap<Role, HashSet<Right>>,
}

impl RolePolicy {
    pub fn builder() -> RolePolicyBuilder {
        RolePolicyBuilder::default()
    }

    /// Rights granted to `role`, sorted for display.
    pub fn rights_of(&self, role: Role) -> Vec<&Right> {
        let mut rights: Vec<&Right> = self
            .grants
            .get(&role)
            .map(|set| set.iter().collect())
            .unwrap_or_default();
        rights.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        rights
    }

    /// Whether `role` carries at least one of `required`.
    pub fn role_grants_any(&self, role: Role, required: &[Right]) -> bool {
        let Some(granted) = self.grants.get(&role) else {
            return false;
        };
        required.iter().any(|r| granted.contains(r))
    }

    /// Pure access predicate.
    ///
    /// Passes when nothing is required, when the role carries any required
    /// right, or when the actor is the path-addressed resource (`target`).
    /// The ownership check runs even after the role check fails.
    pub fn has_right(
        &self,
        role: Role,
        required: &[Right],
        actor: UserId,
        target: Option<&str>,
    ) -> bool {
        if required.is_empty() {
            return true;
        }
        if self.role_grants_any(role, required) {
            return true;
        }
        target
            .and_then(|t| t.parse::<UserId>().ok())
            .is_some_and(|t| t == actor)
    }

    pub fn authorize(
        &self,
        identity: &Identity,
        required: &[Right],
        target: Option<&str>,
    ) -> Result<(), AuthError> {
        if self.has_right(identity.role, required, identity.id, target) {
            Ok(())
        } else {
            tracing::info!(
                user_id = %identity.id,
                role = %identity.role,
                required = ?required.iter().map(Right::as_str).collect::<Vec<_>>(),
                "access denied by role policy"
            );
            Err(AuthError::PolicyDenied)
        }
    }
}

impl Default for RolePolicy {
    /// Every role present with no rights: guarded routes are reachable only
    /// through the ownership override until a deployment grants rights.
    fn default() -> Self {
        RolePolicy::builder().build()
    }
}

#[derive(Debug, Default)]
pub struct RolePolicyBuilder {
    grants: HashMap<Role, HashSet<Right>>,
}

impl RolePolicyBuilder {
    pub fn grant(mut self, role: Role, rights: impl IntoIterator<Item = Right>) -> Self {
        self.grants.entry(role).or_default().extend(rights);
        self
    }

    pub fn build(self) -> RolePolicy {
        let mut grants = self.grants;
        for role in Role::ALL {
            grants.entry(role).or_default();
        }
        RolePolicy { grants }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{GET_USERS, MANAGE_USERS};
    use proptest::prelude::*;

    fn identity(role: Role) -> Identity {
        Identity::new(UserId::new(), "Test", "test@example.com", role)
    }

    fn staff_policy() -> RolePolicy {
        RolePolicy::builder()
            .grant(Role::Admin, [GET_USERS, MANAGE_USERS])
            .grant(Role::Doctor, [GET_USERS])
            .build()
    }

    #[test]
    fn default_table_lists_every_role_without_rights() {
        let policy = RolePolicy::default();
        for role in Role::ALL {
            assert!(policy.rights_of(role).is_empty(), "{role} should hold nothing");
            assert!(!policy.role_grants_any(role, &[GET_USERS, MANAGE_USERS]));
        }
    }

    #[test]
    fn empty_requirement_always_passes() {
        let policy = RolePolicy::default();
        let patient = identity(Role::Patient);
        assert!(policy.has_right(Role::Patient, &[], patient.id, None));
        assert!(policy.authorize(&patient, &[], Some(&UserId::new().to_string())).is_ok());
    }

    #[test]
    fn matching_right_passes() {
        let policy = staff_policy();
        let admin = identity(Role::Admin);
        let other = UserId::new().to_string();
        assert!(policy.authorize(&admin, &[MANAGE_USERS], Some(&other)).is_ok());
    }

    #[test]
    fn any_of_required_is_enough() {
        let policy = staff_policy();
        let doctor = identity(Role::Doctor);
        assert!(policy.authorize(&doctor, &[MANAGE_USERS, GET_USERS], None).is_ok());
    }

    #[test]
    fn non_matching_role_is_denied() {
        let policy = staff_policy();
        let patient = identity(Role::Patient);
        let other = UserId::new().to_string();
        assert_eq!(
            policy.authorize(&patient, &[GET_USERS], Some(&other)),
            Err(AuthError::PolicyDenied)
        );
        assert_eq!(policy.authorize(&patient, &[GET_USERS], None), Err(AuthError::PolicyDenied));
    }

    #[test]
    fn owner_may_act_on_self_without_the_right() {
        let policy = RolePolicy::default();
        let patient = identity(Role::Patient);
        let own = patient.id.to_string();
        assert!(policy.authorize(&patient, &[MANAGE_USERS], Some(&own)).is_ok());
    }

    #[test]
    fn unparseable_target_never_matches() {
        let policy = RolePolicy::default();
        let patient = identity(Role::Patient);
        assert!(!policy.has_right(Role::Patient, &[GET_USERS], patient.id, Some("me")));
    }

    #[test]
    fn builder_fills_unlisted_roles_with_nothing() {
        let policy = RolePolicy::builder().grant(Role::Admin, [GET_USERS]).build();
        assert!(policy.rights_of(Role::Therapist).is_empty());
        assert_eq!(policy.rights_of(Role::Admin), vec![&GET_USERS]);
    }

    #[test]
    fn custom_rights_are_honoured() {
        let billing = Right::new("viewBilling");
        let policy = RolePolicy::builder()
            .grant(Role::Receptionist, [billing.clone()])
            .build();
        assert!(policy.has_right(Role::Receptionist, &[billing.clone()], UserId::new(), None));
        assert!(!policy.has_right(Role::Doctor, &[billing], UserId::new(), None));
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: with no rights granted anywhere, access to a guarded
        /// resource is exactly "the actor is the target".
        #[test]
        fn ownership_is_the_only_way_in_without_grants(
            role in any_role(),
            actor_bits in any::<u128>(),
            target_bits in any::<u128>(),
            same in any::<bool>(),
        ) {
            let policy = RolePolicy::builder().build();
            let actor = UserId::from_uuid(uuid::Uuid::from_u128(actor_bits));
            let target = if same {
                actor
            } else {
                UserId::from_uuid(uuid::Uuid::from_u128(target_bits))
            };
            let allowed = policy.has_right(role, &[GET_USERS], actor, Some(&target.to_string()));
            prop_assert_eq!(allowed, actor == target);
        }

        /// Property: an empty requirement never denies, whatever the target.
        #[test]
        fn empty_requirement_never_denies(role in any_role(), target in "[a-z0-9-]{0,40}") {
            let policy = RolePolicy::builder().build();
            prop_assert!(policy.has_right(role, &[], UserId::new(), Some(&target)));
        }
    }
}
