//! Process-wide session store.
//!
//! Holds the current identity and bearer token, persists them to durable
//! storage, and tracks whether the persisted session has been read yet. The
//! store never validates tokens itself: the remote client's 401 handling is
//! the only thing that invalidates a session.

use std::sync::{Mutex, PoisonError};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::db::{Database, DbError};
use crate::models::Identity;

/// Session errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid session: {0}")]
    Invalid(String),

    #[error("Session storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

impl<T> From<PoisonError<T>> for SessionError {
    fn from(e: PoisonError<T>) -> Self {
        SessionError::Poisoned(e.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Storage(DbError::Json(e))
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// An identity paired with its bearer token. Neither half can be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    identity: Identity,
    token: String,
}

impl Session {
    pub fn new(identity: Identity, token: impl Into<String>) -> SessionResult<Self> {
        let token = token.into();
        if identity.email.trim().is_empty() {
            return Err(SessionError::Invalid("identity email is empty".into()));
        }
        if token.trim().is_empty() {
            return Err(SessionError::Invalid("token is empty".into()));
        }
        Ok(Self { identity, token })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Short, non-reversible token identifier for logs.
    pub fn fingerprint(&self) -> String {
        token_fingerprint(&self.token)
    }
}

/// First 12 hex chars of the token's SHA-256.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)[..12].to_string()
}

#[derive(Debug, Clone, PartialEq)]
enum SessionState {
    /// Durable storage not read yet
    Loading,
    Resolved(Option<Session>),
}

/// Session store shared by the access guard, the remote client and the UI.
pub struct SessionStore {
    db: Mutex<Database>,
    state: Mutex<SessionState>,
}

impl SessionStore {
    /// Wrap a database. The store starts out loading; call
    /// [`restore`](Self::restore) to resolve it.
    pub fn new(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            state: Mutex::new(SessionState::Loading),
        }
    }

    /// Wrap a database and immediately restore the persisted session.
    pub fn open(db: Database) -> SessionResult<Self> {
        let store = Self::new(db);
        store.restore()?;
        Ok(store)
    }

    /// Resolve the loading state from durable storage. Only the first call
    /// reads storage; later calls return the current identity.
    ///
    /// A half-written pair or an undecodable identity counts as no session
    /// and is wiped.
    pub fn restore(&self) -> SessionResult<Option<Identity>> {
        let mut state = self.state.lock()?;
        if let SessionState::Resolved(session) = &*state {
            return Ok(session.as_ref().map(|s| s.identity.clone()));
        }

        let mut db = self.db.lock()?;
        let stored = db.load_session()?;
        let session = match (stored.token, stored.user_json) {
            (None, None) => None,
            (Some(token), Some(user_json)) => {
                match serde_json::from_str::<Identity>(&user_json)
                    .map_err(SessionError::from)
                    .and_then(|identity| Session::new(identity, token))
                {
                    Ok(session) => Some(session),
                    Err(e) => {
                        warn!(error = %e, "discarding unreadable stored session");
                        db.clear_session()?;
                        None
                    }
                }
            }
            _ => {
                warn!("discarding half-written stored session");
                db.clear_session()?;
                None
            }
        };

        match &session {
            Some(s) => info!(
                email = %s.identity.email,
                role = %s.identity.role,
                token = %s.fingerprint(),
                "restored session"
            ),
            None => info!("no stored session"),
        }

        let identity = session.as_ref().map(|s| s.identity.clone());
        *state = SessionState::Resolved(session);
        Ok(identity)
    }

    /// Store identity and token, durably and in memory.
    pub fn login(&self, identity: Identity, token: impl Into<String>) -> SessionResult<()> {
        let session = Session::new(identity, token)?;
        let user_json = serde_json::to_string(&session.identity)?;

        let mut state = self.state.lock()?;
        self.db.lock()?.save_session(&session.token, &user_json)?;
        info!(
            email = %session.identity.email,
            role = %session.identity.role,
            token = %session.fingerprint(),
            "logged in"
        );
        *state = SessionState::Resolved(Some(session));
        Ok(())
    }

    /// Clear identity and token. Idempotent. Durable storage is cleared
    /// first; the in-memory session is dropped even if that fails, and the
    /// storage error is returned.
    pub fn logout(&self) -> SessionResult<()> {
        let mut state = self.state.lock()?;
        let was_logged_in = matches!(&*state, SessionState::Resolved(Some(_)));

        let cleared = self.db.lock()?.clear_session();
        *state = SessionState::Resolved(None);
        drop(state);

        if let Err(e) = cleared {
            error!(error = %e, "failed to clear stored session on logout");
            return Err(e.into());
        }
        if was_logged_in {
            info!("logged out");
        }
        Ok(())
    }

    /// True until durable storage has been read.
    pub fn is_loading(&self) -> bool {
        self.state
            .lock()
            .map(|s| matches!(&*s, SessionState::Loading))
            .unwrap_or(false)
    }

    /// The current identity, if any.
    pub fn current_identity(&self) -> Option<Identity> {
        self.current().map(|s| s.identity)
    }

    /// The current bearer token, if any.
    pub fn token(&self) -> Option<String> {
        self.current().map(|s| s.token)
    }

    /// The current session, if any.
    pub fn current(&self) -> Option<Session> {
        match self.state.lock() {
            Ok(state) => match &*state {
                SessionState::Resolved(Some(session)) => Some(session.clone()),
                _ => None,
            },
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn doctor() -> Identity {
        Identity::new("doc@clinic.lk", Role::Doctor)
    }

    #[test]
    fn test_starts_loading_until_restore() {
        let store = SessionStore::new(Database::open_in_memory().unwrap());
        assert!(store.is_loading());
        assert!(store.current_identity().is_none());

        assert_eq!(store.restore().unwrap(), None);
        assert!(!store.is_loading());
    }

    #[test]
    fn test_login_and_logout() {
        let store = SessionStore::open(Database::open_in_memory().unwrap()).unwrap();

        store.login(doctor(), "tok-123").unwrap();
        assert_eq!(store.current_identity(), Some(doctor()));
        assert_eq!(store.token().as_deref(), Some("tok-123"));

        store.logout().unwrap();
        assert!(store.current_identity().is_none());
        assert!(store.token().is_none());

        // idempotent
        store.logout().unwrap();
        assert!(store.current().is_none());
    }

    #[test]
    fn test_logout_storage_failure_still_drops_memory() {
        let store = SessionStore::open(Database::open_in_memory().unwrap()).unwrap();
        store.login(doctor(), "tok-123").unwrap();
        store
            .db
            .lock()
            .unwrap()
            .conn()
            .execute("DROP TABLE session_entries", [])
            .unwrap();

        assert!(matches!(store.logout(), Err(SessionError::Storage(_))));
        assert!(store.current().is_none());
        assert!(!store.is_loading());
    }

    #[test]
    fn test_logout_clears_storage_before_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.db");

        let store = SessionStore::open(Database::open(&path).unwrap()).unwrap();
        store.login(doctor(), "tok-123").unwrap();
        store.logout().unwrap();
        drop(store);

        let store = SessionStore::open(Database::open(&path).unwrap()).unwrap();
        assert!(store.current().is_none());
        assert!(store.db.lock().unwrap().load_session().unwrap().token.is_none());
    }

    #[test]
    fn test_login_rejects_empty_halves() {
        let store = SessionStore::open(Database::open_in_memory().unwrap()).unwrap();

        assert!(matches!(
            store.login(doctor(), ""),
            Err(SessionError::Invalid(_))
        ));
        assert!(matches!(
            store.login(Identity::new(" ", Role::Pharmacist), "tok"),
            Err(SessionError::Invalid(_))
        ));
        assert!(store.current().is_none());
    }

    #[test]
    fn test_login_resolves_loading() {
        let store = SessionStore::new(Database::open_in_memory().unwrap());
        store.login(doctor(), "tok").unwrap();
        assert!(!store.is_loading());
        assert_eq!(store.restore().unwrap(), Some(doctor()));
    }

    #[test]
    fn test_unreadable_session_is_discarded() {
        let mut db = Database::open_in_memory().unwrap();
        db.save_session("tok", "not json").unwrap();

        let store = SessionStore::open(db).unwrap();
        assert!(store.current().is_none());
        assert!(store.db.lock().unwrap().load_session().unwrap().token.is_none());
    }

    #[test]
    fn test_half_written_session_is_discarded() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO session_entries (key, value) VALUES ('token', 'orphan')",
                [],
            )
            .unwrap();

        let store = SessionStore::open(db).unwrap();
        assert!(store.current().is_none());
        assert!(!store.is_loading());
        assert!(store.db.lock().unwrap().load_session().unwrap().token.is_none());
    }

    #[test]
    fn test_fingerprint_hides_token() {
        let session = Session::new(doctor(), "secret-token").unwrap();
        let fp = session.fingerprint();
        assert_eq!(fp.len(), 12);
        assert!(!fp.contains("secret"));
        assert_eq!(fp, token_fingerprint("secret-token"));
    }
}
