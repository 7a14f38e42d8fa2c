//! Role-based access guard for protected views.

use std::collections::BTreeSet;

use tracing::debug;

use crate::models::{Identity, Role};
use crate::session::SessionStore;

/// Set of roles allowed to view an area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedRoles(BTreeSet<Role>);

impl AllowedRoles {
    pub fn only(role: Role) -> Self {
        Self(BTreeSet::from([role]))
    }

    /// Every role; any authenticated user passes.
    pub fn any() -> Self {
        Self(Role::ALL.into_iter().collect())
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }
}

impl FromIterator<Role> for AllowedRoles {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still resolving: show a neutral placeholder, don't redirect
    Loading,
    /// No session, or the wrong role
    RedirectToLogin,
    Render,
}

/// Gate evaluated before rendering a protected view.
///
/// A wrong role is not an error: it gets the same silent redirect to login
/// as no session at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGuard {
    allowed: AllowedRoles,
}

impl AccessGuard {
    pub fn new(allowed: AllowedRoles) -> Self {
        Self { allowed }
    }

    /// Apply the decision table.
    pub fn evaluate(&self, loading: bool, identity: Option<&Identity>) -> GuardDecision {
        if loading {
            return GuardDecision::Loading;
        }
        match identity {
            Some(identity) if self.allowed.contains(identity.role) => GuardDecision::Render,
            _ => GuardDecision::RedirectToLogin,
        }
    }

    /// Evaluate against the live session store.
    pub fn check(&self, session: &SessionStore) -> GuardDecision {
        let loading = session.is_loading();
        let identity = session.current_identity();
        let decision = self.evaluate(loading, identity.as_ref());
        debug!(
            ?decision,
            role = identity.as_ref().map(|i| i.role.as_str()),
            "access guard"
        );
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use proptest::prelude::*;

    fn identity(role: Role) -> Identity {
        Identity::new("user@clinic.lk", role)
    }

    fn role_strategy() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::Doctor), Just(Role::Pharmacist)]
    }

    #[test]
    fn test_decision_table() {
        let guard = AccessGuard::new(AllowedRoles::only(Role::Doctor));
        let doctor = identity(Role::Doctor);
        let pharmacist = identity(Role::Pharmacist);

        assert_eq!(guard.evaluate(true, None), GuardDecision::Loading);
        assert_eq!(guard.evaluate(true, Some(&doctor)), GuardDecision::Loading);
        assert_eq!(guard.evaluate(true, Some(&pharmacist)), GuardDecision::Loading);
        assert_eq!(guard.evaluate(false, None), GuardDecision::RedirectToLogin);
        assert_eq!(
            guard.evaluate(false, Some(&pharmacist)),
            GuardDecision::RedirectToLogin
        );
        assert_eq!(guard.evaluate(false, Some(&doctor)), GuardDecision::Render);
    }

    #[test]
    fn test_any_role() {
        let guard = AccessGuard::new(AllowedRoles::any());
        for role in Role::ALL {
            assert_eq!(guard.evaluate(false, Some(&identity(role))), GuardDecision::Render);
        }
        assert_eq!(guard.evaluate(false, None), GuardDecision::RedirectToLogin);
    }

    #[test]
    fn test_check_against_store() {
        let store = SessionStore::new(Database::open_in_memory().unwrap());
        let guard = AccessGuard::new(AllowedRoles::only(Role::Pharmacist));

        assert_eq!(guard.check(&store), GuardDecision::Loading);

        store.restore().unwrap();
        assert_eq!(guard.check(&store), GuardDecision::RedirectToLogin);

        store.login(identity(Role::Pharmacist), "tok").unwrap();
        assert_eq!(guard.check(&store), GuardDecision::Render);

        store.logout().unwrap();
        assert_eq!(guard.check(&store), GuardDecision::RedirectToLogin);
    }

    proptest! {
        #[test]
        fn loading_always_shows_placeholder(
            role in role_strategy(),
            present in any::<bool>(),
            allowed in proptest::collection::btree_set(role_strategy(), 0..=2),
        ) {
            let guard = AccessGuard::new(allowed.into_iter().collect());
            let id = identity(role);
            let identity = if present { Some(&id) } else { None };
            prop_assert_eq!(guard.evaluate(true, identity), GuardDecision::Loading);
        }

        #[test]
        fn disallowed_role_never_renders(
            role in role_strategy(),
            allowed in proptest::collection::btree_set(role_strategy(), 0..=2),
        ) {
            prop_assume!(!allowed.contains(&role));
            let guard = AccessGuard::new(allowed.into_iter().collect());
            prop_assert_eq!(
                guard.evaluate(false, Some(&identity(role))),
                GuardDecision::RedirectToLogin
            );
        }
    }
}
