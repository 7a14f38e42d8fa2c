//! Typed remote client for the clinic REST API.
//!
//! Every call goes through [`RemoteClient::execute`], which attaches the
//! bearer token whenever a session exists (login excepted) and applies the
//! global 401 policy:
//! clear the session, notify every [`AuthFailureObserver`], fail with
//! [`ClientError::Unauthorized`].

use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use clinic_rx_transport::{ApiRequest, Transport, TransportError};

use crate::models::{
    Credentials, Identity, LoginResponse, NewPatient, Patient, Prescription,
    PrescriptionPayload, StaffSignup,
};
use crate::routes::Route;
use crate::session::{SessionError, SessionStore};

/// API paths.
pub mod endpoints {
    pub const LOGIN: &str = "/api/auth/login";
    pub const SIGNUP_DOCTOR: &str = "/api/auth/signup/doctor";
    pub const SIGNUP_PHARMACIST: &str = "/api/auth/signup/pharmacist";
    pub const ALL_PATIENTS: &str = "/api/patient/all";
    pub const REGISTER_PATIENT: &str = "/api/patient/register";
    pub const ALL_PRESCRIPTIONS: &str = "/pharmacist/prescriptions";

    pub fn patient_prescriptions(patient_id: i64) -> String {
        format!("/api/patient/{}/prescriptions", patient_id)
    }
}

/// Remote client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    /// 401 from any endpoint; the session has already been cleared
    #[error("Not authenticated")]
    Unauthorized,

    /// `message` is the JSON `message` field; `text` is a plain-text body
    #[error("Server error {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server {
        status: u16,
        message: Option<String>,
        text: Option<String>,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl ClientError {
    /// Text to show the user, or `None` for authentication failures, which
    /// are handled globally and never shown as form messages.
    pub fn user_message(&self, fallback: &str) -> Option<String> {
        match self {
            ClientError::Unauthorized => None,
            ClientError::Server {
                message: Some(message),
                ..
            } => Some(message.clone()),
            _ => Some(fallback.to_string()),
        }
    }

    /// Like [`user_message`](Self::user_message), but a plain-text error
    /// body is shown before falling back.
    pub fn detailed_message(&self, fallback: &str) -> Option<String> {
        match self {
            ClientError::Server {
                message: None,
                text: Some(text),
                ..
            } => Some(text.clone()),
            _ => self.user_message(fallback),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Notified after a 401 has torn the session down.
pub trait AuthFailureObserver: Send + Sync {
    /// `redirect` is where the UI must navigate (the login route).
    fn on_auth_failure(&self, redirect: Route);
}

impl<F: Fn(Route) + Send + Sync> AuthFailureObserver for F {
    fn on_auth_failure(&self, redirect: Route) {
        self(redirect)
    }
}

/// Remote client bound to a transport and the session store.
pub struct RemoteClient {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    observers: Mutex<Vec<Arc<dyn AuthFailureObserver>>>,
}

impl RemoteClient {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionStore>) -> Self {
        Self {
            transport,
            session,
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Register an observer for authentication failures.
    pub fn on_auth_failure(&self, observer: Arc<dyn AuthFailureObserver>) {
        match self.observers.lock() {
            Ok(mut observers) => observers.push(observer),
            Err(poisoned) => poisoned.into_inner().push(observer),
        }
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Log in and store the resulting session.
    pub fn login(&self, credentials: &Credentials) -> ClientResult<Identity> {
        let request = ApiRequest::post(endpoints::LOGIN, credentials)?;
        let response: LoginResponse = self.execute(request, false)?;

        let identity = Identity::new(credentials.email.clone(), response.role);
        self.session.login(identity.clone(), response.token)?;
        Ok(identity)
    }

    pub fn signup_doctor(&self, signup: &StaffSignup) -> ClientResult<serde_json::Value> {
        let request = ApiRequest::post(endpoints::SIGNUP_DOCTOR, signup)?;
        self.execute(request, true)
    }

    pub fn signup_pharmacist(&self, signup: &StaffSignup) -> ClientResult<serde_json::Value> {
        let request = ApiRequest::post(endpoints::SIGNUP_PHARMACIST, signup)?;
        self.execute(request, true)
    }

    // =========================================================================
    // Patients
    // =========================================================================

    pub fn list_patients(&self) -> ClientResult<Vec<Patient>> {
        self.execute(ApiRequest::get(endpoints::ALL_PATIENTS), true)
    }

    pub fn register_patient(&self, patient: &NewPatient) -> ClientResult<Patient> {
        let request = ApiRequest::post(endpoints::REGISTER_PATIENT, patient)?;
        self.execute(request, true)
    }

    // =========================================================================
    // Prescriptions
    // =========================================================================

    pub fn create_prescription(
        &self,
        patient_id: i64,
        payload: &PrescriptionPayload,
    ) -> ClientResult<Prescription> {
        let request = ApiRequest::post(endpoints::patient_prescriptions(patient_id), payload)?;
        let created: Prescription = self.execute(request, true)?;
        info!(patient_id, prescription_id = created.id, "prescription created");
        Ok(created)
    }

    pub fn list_prescriptions(&self, patient_id: i64) -> ClientResult<Vec<Prescription>> {
        self.execute(
            ApiRequest::get(endpoints::patient_prescriptions(patient_id)),
            true,
        )
    }

    /// Consolidated feed for pharmacists, each entry with its patient.
    pub fn list_all_prescriptions(&self) -> ClientResult<Vec<Prescription>> {
        self.execute(ApiRequest::get(endpoints::ALL_PRESCRIPTIONS), true)
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    fn execute<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        authenticated: bool,
    ) -> ClientResult<T> {
        let request = if authenticated {
            request.with_bearer(self.session.token())
        } else {
            request
        };
        debug!(
            method = %request.method,
            path = %request.path,
            bearer = request.bearer.is_some(),
            "api request"
        );

        let response = self.transport.send(&request)?;

        if response.is_unauthorized() {
            warn!(path = %request.path, "authentication failure, clearing session");
            self.handle_auth_failure();
            return Err(ClientError::Unauthorized);
        }
        if !response.is_success() {
            return Err(ClientError::Server {
                status: response.status,
                message: response.server_message(),
                text: response.plain_text(),
            });
        }

        Ok(serde_json::from_str(&response.body)?)
    }

    fn handle_auth_failure(&self) {
        if let Err(e) = self.session.logout() {
            error!(error = %e, "failed to clear session after 401");
        }

        let observers = match self.observers.lock() {
            Ok(observers) => observers.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for observer in observers {
            observer.on_auth_failure(Route::Login);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Role;
    use clinic_rx_transport::{Method, MockTransport};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (Arc<MockTransport>, RemoteClient) {
        let mock = Arc::new(MockTransport::new());
        let session =
            Arc::new(SessionStore::open(Database::open_in_memory().unwrap()).unwrap());
        let client = RemoteClient::new(mock.clone(), session);
        (mock, client)
    }

    fn credentials() -> Credentials {
        Credentials {
            email: "doc@clinic.lk".into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn test_login_stores_session() {
        let (mock, client) = setup();
        mock.respond_json(
            Method::Post,
            endpoints::LOGIN,
            200,
            json!({"token": "jwt-1", "role": "DOCTOR"}),
        );

        let identity = client.login(&credentials()).unwrap();
        assert_eq!(identity, Identity::new("doc@clinic.lk", Role::Doctor));
        assert_eq!(client.session().token().as_deref(), Some("jwt-1"));

        let sent = &mock.requests()[0];
        assert!(sent.bearer.is_none());
        assert_eq!(sent.body.as_ref().unwrap()["password"], "secret");
    }

    #[test]
    fn test_bearer_attached_once_logged_in() {
        let (mock, client) = setup();
        mock.respond_json(
            Method::Post,
            endpoints::LOGIN,
            200,
            json!({"token": "jwt-1", "role": "DOCTOR"}),
        )
        .respond_json(Method::Get, endpoints::ALL_PATIENTS, 200, json!([]));

        client.login(&credentials()).unwrap();
        client.list_patients().unwrap();

        let sent = mock.requests_to(Method::Get, endpoints::ALL_PATIENTS);
        assert_eq!(sent[0].bearer.as_deref(), Some("jwt-1"));
    }

    fn staff() -> StaffSignup {
        StaffSignup {
            nic: "901234567V".into(),
            first_name: "Nimal".into(),
            last_name: "Silva".into(),
            email: "ph@clinic.lk".into(),
            password: "secret".into(),
            contact: "0711234567".into(),
        }
    }

    #[test]
    fn test_signup_carries_session_bearer() {
        let (mock, client) = setup();
        mock.respond_json(Method::Post, endpoints::SIGNUP_PHARMACIST, 200, json!({}))
            .respond_json(Method::Post, endpoints::SIGNUP_DOCTOR, 200, json!({}));

        client.signup_pharmacist(&staff()).unwrap();
        assert!(mock.requests()[0].bearer.is_none());

        client
            .session()
            .login(Identity::new("doc@clinic.lk", Role::Doctor), "jwt-doc")
            .unwrap();
        client.signup_pharmacist(&staff()).unwrap();
        client.signup_doctor(&staff()).unwrap();

        let sent = mock.requests_to(Method::Post, endpoints::SIGNUP_PHARMACIST);
        assert_eq!(sent[1].bearer.as_deref(), Some("jwt-doc"));
        let sent = mock.requests_to(Method::Post, endpoints::SIGNUP_DOCTOR);
        assert_eq!(sent[0].bearer.as_deref(), Some("jwt-doc"));
    }

    #[test]
    fn test_plain_text_error_body() {
        let (mock, client) = setup();
        mock.respond(
            Method::Post,
            endpoints::SIGNUP_PHARMACIST,
            clinic_rx_transport::ApiResponse::new(400, "Email already in use"),
        );

        let err = client.signup_pharmacist(&staff()).unwrap_err();
        assert_eq!(
            err.detailed_message("Registration failed").as_deref(),
            Some("Email already in use")
        );
        assert_eq!(
            err.user_message("Registration failed").as_deref(),
            Some("Registration failed")
        );
    }

    #[test]
    fn test_unauthorized_clears_session_and_notifies() {
        let (mock, client) = setup();
        client
            .session()
            .login(Identity::new("ph@clinic.lk", Role::Pharmacist), "stale")
            .unwrap();
        mock.respond_json(
            Method::Get,
            endpoints::ALL_PRESCRIPTIONS,
            401,
            json!({"message": "Token expired"}),
        );

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        client.on_auth_failure(Arc::new(move |redirect: Route| {
            assert_eq!(redirect, Route::Login);
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let err = client.list_all_prescriptions().unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.user_message("fallback"), None);
        assert!(client.session().token().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_server_error_message() {
        let (mock, client) = setup();
        mock.respond_json(
            Method::Post,
            endpoints::REGISTER_PATIENT,
            409,
            json!({"message": "NIC already registered"}),
        )
        .respond(
            Method::Get,
            endpoints::ALL_PATIENTS,
            clinic_rx_transport::ApiResponse::new(500, "Internal Server Error"),
        );

        let patient = NewPatient {
            nic: Some("801234567V".into()),
            first_name: "Kamal".into(),
            last_name: "Perera".into(),
            contact_number: "0771234567".into(),
            living_area: "Kandy".into(),
            date_of_birth: "1980-02-14".into(),
            email: None,
        };
        let err = client.register_patient(&patient).unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 409, .. }));
        assert_eq!(
            err.user_message("Failed to register patient").as_deref(),
            Some("NIC already registered")
        );

        let err = client.list_patients().unwrap_err();
        assert_eq!(
            err.user_message("Failed to load patients").as_deref(),
            Some("Failed to load patients")
        );
    }

    #[test]
    fn test_network_failure_uses_fallback() {
        let (mock, client) = setup();
        mock.fail(Method::Get, "/api/patient/4/prescriptions", "connection refused");

        let err = client.list_prescriptions(4).unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(err.user_message("oops").as_deref(), Some("oops"));
    }

    #[test]
    fn test_unknown_role_is_decode_error() {
        let (mock, client) = setup();
        mock.respond_json(
            Method::Post,
            endpoints::LOGIN,
            200,
            json!({"token": "t", "role": "ADMIN"}),
        );

        let err = client.login(&credentials()).unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
        assert!(client.session().current().is_none());
    }
}
