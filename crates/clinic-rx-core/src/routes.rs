//! Route table and navigation decisions.

use crate::guard::{AccessGuard, AllowedRoles, GuardDecision};
use crate::models::Role;
use crate::session::SessionStore;

/// Known client routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    SignupDoctor,
    SignupPharmacist,
    DoctorDashboard,
    PharmacistDashboard,
}

impl Route {
    pub const ALL: [Route; 5] = [
        Route::Login,
        Route::SignupDoctor,
        Route::SignupPharmacist,
        Route::DoctorDashboard,
        Route::PharmacistDashboard,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::SignupDoctor => "/signup/doctor",
            Route::SignupPharmacist => "/signup/pharmacist",
            Route::DoctorDashboard => "/doctor/dashboard",
            Route::PharmacistDashboard => "/pharmacist/dashboard",
        }
    }

    /// Exact path match, ignoring one trailing slash.
    pub fn parse(path: &str) -> Option<Route> {
        let path = match path.strip_suffix('/') {
            Some(stripped) if !stripped.is_empty() => stripped,
            _ => path,
        };
        Route::ALL.into_iter().find(|r| r.path() == path)
    }

    /// Guard for protected routes; `None` for public ones.
    pub fn guard(&self) -> Option<AccessGuard> {
        match self {
            Route::DoctorDashboard => Some(AccessGuard::new(AllowedRoles::only(Role::Doctor))),
            Route::PharmacistDashboard => {
                Some(AccessGuard::new(AllowedRoles::only(Role::Pharmacist)))
            }
            Route::Login | Route::SignupDoctor | Route::SignupPharmacist => None,
        }
    }
}

impl Role {
    /// Dashboard a role lands on after login.
    pub fn home(&self) -> Route {
        match self {
            Role::Doctor => Route::DoctorDashboard,
            Role::Pharmacist => Route::PharmacistDashboard,
        }
    }
}

/// Result of navigating to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    /// Session still resolving
    Loading,
    Redirect(Route),
}

/// Decide what to show for `path`. `/` and unknown paths go to login.
pub fn navigate(path: &str, session: &SessionStore) -> Navigation {
    let Some(route) = Route::parse(path) else {
        return Navigation::Redirect(Route::Login);
    };

    match route.guard().map(|g| g.check(session)) {
        None | Some(GuardDecision::Render) => Navigation::Render(route),
        Some(GuardDecision::Loading) => Navigation::Loading,
        Some(GuardDecision::RedirectToLogin) => Navigation::Redirect(Route::Login),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Identity;

    fn store_with(role: Option<Role>) -> SessionStore {
        let store = SessionStore::open(Database::open_in_memory().unwrap()).unwrap();
        if let Some(role) = role {
            store.login(Identity::new("u@clinic.lk", role), "tok").unwrap();
        }
        store
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!(Route::parse("/login"), Some(Route::Login));
        assert_eq!(Route::parse("/doctor/dashboard/"), Some(Route::DoctorDashboard));
        assert_eq!(Route::parse("/"), None);
        assert_eq!(Route::parse("/admin"), None);
        for route in Route::ALL {
            assert_eq!(Route::parse(route.path()), Some(route));
        }
    }

    #[test]
    fn test_unknown_and_root_redirect_to_login() {
        let store = store_with(Some(Role::Doctor));
        assert_eq!(navigate("/", &store), Navigation::Redirect(Route::Login));
        assert_eq!(navigate("/nowhere", &store), Navigation::Redirect(Route::Login));
    }

    #[test]
    fn test_public_routes_render_without_session() {
        let store = store_with(None);
        assert_eq!(navigate("/login", &store), Navigation::Render(Route::Login));
        assert_eq!(
            navigate("/signup/pharmacist", &store),
            Navigation::Render(Route::SignupPharmacist)
        );
    }

    #[test]
    fn test_doctor_routes() {
        let store = store_with(Some(Role::Doctor));
        assert_eq!(
            navigate("/doctor/dashboard", &store),
            Navigation::Render(Route::DoctorDashboard)
        );
        assert_eq!(
            navigate("/pharmacist/dashboard", &store),
            Navigation::Redirect(Route::Login)
        );
    }

    #[test]
    fn test_loading_before_restore() {
        let store = SessionStore::new(Database::open_in_memory().unwrap());
        assert_eq!(navigate("/doctor/dashboard", &store), Navigation::Loading);
        assert_eq!(navigate("/login", &store), Navigation::Render(Route::Login));
    }

    #[test]
    fn test_role_home() {
        assert_eq!(Role::Doctor.home(), Route::DoctorDashboard);
        assert_eq!(Role::Pharmacist.home().path(), "/pharmacist/dashboard");
    }
}
