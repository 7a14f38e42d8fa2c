//! Clinic-Rx Core Library
//!
//! Headless client core for a small clinical workflow: doctors register
//! patients and issue prescriptions, pharmacists read a consolidated
//! prescription feed. A UI shell drives this crate; the REST API is remote.
//!
//! # Architecture
//!
//! ```text
//!   Durable storage (SQLite)
//!            │ restore / login / logout
//!            ▼
//!     ┌──────────────┐   identity    ┌──────────────┐
//!     │ SessionStore │──────────────▶│ AccessGuard  │──▶ Render / Loading / → /login
//!     └──────┬───────┘               └──────────────┘
//!            │ bearer token                ▲
//!            ▼                             │ routes
//!     ┌──────────────┐  401 → logout + AuthFailureObserver(/login)
//!     │ RemoteClient │─────────────────────────────────────────────┐
//!     └──────┬───────┘                                             │
//!            │ create / list                                       ▼
//!     ┌──────┴──────────────┐   onPrescriptionCreated     UI redirect
//!     │ PrescriptionComposer│──────────────▶ PatientListView refresh
//!     └─────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite-backed durable session storage
//! - [`models`]: Domain types (Identity, Patient, Prescription, MedicationEntry)
//! - [`session`]: Process-wide session store with loading state
//! - [`guard`]: Role-based access guard
//! - [`routes`]: Route table and navigation decisions
//! - [`client`]: Typed remote client with the global 401 policy
//! - [`composer`]: Prescription composer
//! - [`views`]: Dashboard list state and registration forms
//! - [`config`]: Client configuration

pub mod client;
pub mod composer;
pub mod config;
pub mod db;
pub mod guard;
pub mod models;
pub mod routes;
pub mod session;
pub mod views;

// Re-export commonly used types
pub use client::{AuthFailureObserver, ClientError, RemoteClient};
pub use composer::{ComposerError, ComposerPhase, FormField, PrescriptionComposer};
pub use config::ClientConfig;
pub use db::Database;
pub use guard::{AccessGuard, AllowedRoles, GuardDecision};
pub use models::{
    Credentials, Identity, MedicationEntry, MedicationField, NewPatient, Patient, Prescription,
    PrescriptionPayload, Role, StaffSignup,
};
pub use routes::{navigate, Navigation, Route};
pub use session::{Session, SessionStore};
pub use views::{PatientListView, PatientRegistration, PrescriptionFeed, StaffRegistration};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use clinic_rx_transport::Transport;

/// Shown when login fails without a server message.
pub const LOGIN_FALLBACK_MESSAGE: &str = "Login failed. Please check your credentials.";

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ClinicError {
    /// Map a client error, using `fallback` when the server gave no message.
    fn from_client(e: ClientError, fallback: &str) -> Self {
        match e.user_message(fallback) {
            None => ClinicError::Unauthorized(e.to_string()),
            Some(message) => ClinicError::RequestFailed(message),
        }
    }
}

impl From<session::SessionError> for ClinicError {
    fn from(e: session::SessionError) -> Self {
        ClinicError::StorageError(e.to_string())
    }
}

impl From<db::DbError> for ClinicError {
    fn from(e: db::DbError) -> Self {
        ClinicError::StorageError(e.to_string())
    }
}

impl From<config::ConfigError> for ClinicError {
    fn from(e: config::ConfigError) -> Self {
        ClinicError::ConfigError(e.to_string())
    }
}

impl From<clinic_rx_transport::TransportError> for ClinicError {
    fn from(e: clinic_rx_transport::TransportError) -> Self {
        ClinicError::ConfigError(e.to_string())
    }
}

impl From<views::FormError> for ClinicError {
    fn from(e: views::FormError) -> Self {
        match e {
            views::FormError::MissingField(field) => {
                ClinicError::InvalidInput(format!("{} is required", field))
            }
            views::FormError::Client(e) => ClinicError::from_client(e, "Request failed"),
        }
    }
}

impl From<ComposerError> for ClinicError {
    fn from(e: ComposerError) -> Self {
        match e {
            ComposerError::MissingField(field) => {
                ClinicError::InvalidInput(format!("{} is required", field))
            }
            ComposerError::AlreadySubmitting => ClinicError::Busy(e.to_string()),
            ComposerError::NotOpen => ClinicError::InvalidInput(e.to_string()),
            ComposerError::Client(e) => {
                ClinicError::from_client(e, composer::SUBMIT_FALLBACK_MESSAGE)
            }
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicError::StorageError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open a client against `base_url`, keeping the session in
/// `session_db_path`. The stored session is restored before returning.
#[cfg(feature = "http")]
#[uniffi::export]
pub fn open_client(
    base_url: String,
    session_db_path: String,
) -> Result<Arc<ClinicClient>, ClinicError> {
    let config = ClientConfig {
        api_base_url: base_url,
        session_db_path: session_db_path.into(),
        ..ClientConfig::default()
    };
    open_client_with_config(config)
}

/// Open a client from a JSON config file (environment overrides apply).
#[cfg(feature = "http")]
#[uniffi::export]
pub fn open_client_from_config(path: String) -> Result<Arc<ClinicClient>, ClinicError> {
    open_client_with_config(ClientConfig::load(path)?)
}

#[cfg(feature = "http")]
fn open_client_with_config(config: ClientConfig) -> Result<Arc<ClinicClient>, ClinicError> {
    let config = config.validated()?;
    let transport =
        clinic_rx_transport::HttpTransport::new(&config.api_base_url, config.request_timeout())?;
    let db = Database::open(&config.session_db_path)?;
    ClinicClient::with_transport(Arc::new(transport), db)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe client facade for FFI.
///
/// The create-prescription call runs without holding the composer lock, so
/// a second submit while one is in flight fails with `Busy` instead of
/// queuing.
#[derive(uniffi::Object)]
pub struct ClinicClient {
    client: RemoteClient,
    patients: Mutex<PatientListView>,
    feed: Mutex<PrescriptionFeed>,
    auth_redirect: Arc<AtomicBool>,
}

impl ClinicClient {
    /// Build a facade over any transport. The stored session is restored
    /// before returning.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        db: Database,
    ) -> Result<Arc<Self>, ClinicError> {
        let session = Arc::new(SessionStore::new(db));
        session.restore()?;

        let client = RemoteClient::new(transport, session);
        let auth_redirect = Arc::new(AtomicBool::new(false));
        let flag = auth_redirect.clone();
        client.on_auth_failure(Arc::new(move |_redirect: Route| {
            flag.store(true, Ordering::SeqCst);
        }));

        Ok(Arc::new(Self {
            client,
            patients: Mutex::new(PatientListView::new()),
            feed: Mutex::new(PrescriptionFeed::new()),
            auth_redirect,
        }))
    }
}

#[uniffi::export]
impl ClinicClient {
    // =========================================================================
    // Session
    // =========================================================================

    /// Log in. On success the identity carries the dashboard path to open.
    pub fn login(&self, email: String, password: String) -> Result<FfiIdentity, ClinicError> {
        let credentials = Credentials { email, password };
        match self.client.login(&credentials) {
            Ok(identity) => {
                self.auth_redirect.store(false, Ordering::SeqCst);
                Ok(identity.into())
            }
            Err(e) => {
                // already on the login screen
                self.auth_redirect.store(false, Ordering::SeqCst);
                Err(ClinicError::LoginFailed(
                    e.user_message(LOGIN_FALLBACK_MESSAGE)
                        .unwrap_or_else(|| LOGIN_FALLBACK_MESSAGE.to_string()),
                ))
            }
        }
    }

    pub fn logout(&self) -> Result<(), ClinicError> {
        self.client.session().logout()?;
        Ok(())
    }

    pub fn current_identity(&self) -> Option<FfiIdentity> {
        self.client.session().current_identity().map(Into::into)
    }

    pub fn is_loading(&self) -> bool {
        self.client.session().is_loading()
    }

    /// Decide what to show for `path`.
    pub fn navigate(&self, path: String) -> FfiNavigation {
        routes::navigate(&path, self.client.session()).into()
    }

    /// Login path if a 401 tore the session down since the last call.
    pub fn take_auth_redirect(&self) -> Option<String> {
        self.auth_redirect
            .swap(false, Ordering::SeqCst)
            .then(|| Route::Login.path().to_string())
    }

    // =========================================================================
    // Staff registration
    // =========================================================================

    pub fn signup_doctor(&self, form: FfiStaffForm) -> Result<(), ClinicError> {
        let mut form: StaffRegistration = form.into();
        form.submit_doctor(&self.client)
            .map_err(|e| form_error(e, "Signup failed"))
    }

    /// Register a pharmacist. A plain-text error body is shown when the
    /// server sends no JSON message.
    pub fn signup_pharmacist(&self, form: FfiStaffForm) -> Result<(), ClinicError> {
        let mut form: StaffRegistration = form.into();
        form.submit_pharmacist(&self.client).map_err(|e| match e {
            views::FormError::Client(e) => {
                match e.detailed_message(views::REGISTER_PHARMACIST_FALLBACK) {
                    Some(message) => ClinicError::RequestFailed(message),
                    None => ClinicError::Unauthorized(e.to_string()),
                }
            }
            other => other.into(),
        })
    }

    // =========================================================================
    // Patients
    // =========================================================================

    pub fn load_patients(&self) -> Result<Vec<FfiPatient>, ClinicError> {
        let mut view = self.patients.lock()?;
        view.load_patients(&self.client)
            .map_err(|e| ClinicError::from_client(e, views::LOAD_PATIENTS_FALLBACK))?;
        Ok(view.patients().iter().cloned().map(Into::into).collect())
    }

    pub fn register_patient(&self, form: FfiPatientForm) -> Result<FfiPatient, ClinicError> {
        let mut form: PatientRegistration = form.into();
        let patient = form
            .submit(&self.client)
            .map_err(|e| form_error(e, views::REGISTER_PATIENT_FALLBACK))?;
        Ok(patient.into())
    }

    /// Select a loaded patient and fetch their prescriptions.
    pub fn view_prescriptions(
        &self,
        patient_id: i64,
    ) -> Result<Vec<FfiPrescription>, ClinicError> {
        let mut view = self.patients.lock()?;
        let patient = find_patient(&view, patient_id)?;
        view.view_prescriptions(&self.client, &patient)
            .map_err(|e| ClinicError::from_client(e, views::LOAD_PRESCRIPTIONS_FALLBACK))?;
        Ok(view.prescriptions().iter().map(Into::into).collect())
    }

    /// Flip a prescription row; returns whether it is now expanded.
    pub fn toggle_prescription_details(
        &self,
        prescription_id: i64,
    ) -> Result<bool, ClinicError> {
        Ok(self.patients.lock()?.toggle_details(prescription_id))
    }

    // =========================================================================
    // Composer
    // =========================================================================

    /// Open a fresh composer. Fails with `Busy` while a submission is in
    /// flight.
    pub fn open_composer(&self, patient_id: i64) -> Result<FfiComposerState, ClinicError> {
        let mut view = self.patients.lock()?;
        let patient = find_patient(&view, patient_id)?;
        view.open_composer(&patient)?;
        composer_state(&view)
    }

    pub fn close_composer(&self) -> Result<(), ClinicError> {
        self.patients.lock()?.close_composer()?;
        Ok(())
    }

    pub fn composer_state(&self) -> Result<FfiComposerState, ClinicError> {
        composer_state(&*self.patients.lock()?)
    }

    /// Set a form field by wire name (`note`, `heartRate`, ...).
    pub fn set_prescription_field(
        &self,
        field: String,
        value: String,
    ) -> Result<(), ClinicError> {
        let field = FormField::parse(&field)
            .ok_or_else(|| ClinicError::InvalidInput(format!("Unknown field: {}", field)))?;
        with_composer(&self.patients, |c| {
            c.set_field(field, value);
        })
    }

    pub fn add_medication(&self) -> Result<String, ClinicError> {
        with_composer(&self.patients, |c| c.add_medication())
    }

    pub fn remove_medication(&self, local_id: String) -> Result<bool, ClinicError> {
        with_composer(&self.patients, |c| c.remove_medication(&local_id))
    }

    /// Update `name`, `dosage` or `frequency` of one row.
    pub fn update_medication(
        &self,
        local_id: String,
        field: String,
        value: String,
    ) -> Result<bool, ClinicError> {
        let field = match field.as_str() {
            "name" => MedicationField::Name,
            "dosage" => MedicationField::Dosage,
            "frequency" => MedicationField::Frequency,
            other => {
                return Err(ClinicError::InvalidInput(format!(
                    "Unknown medication field: {}",
                    other
                )))
            }
        };
        with_composer(&self.patients, |c| c.update_medication(&local_id, field, value))
    }

    /// Submit the open composer. On success the composer closes and the
    /// patient's prescriptions and the patient list are refreshed.
    pub fn submit_prescription(&self) -> Result<FfiPrescription, ClinicError> {
        let (patient_id, payload) = self.patients.lock()?.begin_submit()?;

        let result = self.client.create_prescription(patient_id, &payload);

        let created = self
            .patients
            .lock()?
            .finish_submit(&self.client, patient_id, result)?;
        Ok((&created).into())
    }

    // =========================================================================
    // Pharmacist feed
    // =========================================================================

    pub fn load_prescription_feed(&self) -> Result<Vec<FfiPrescription>, ClinicError> {
        let mut feed = self.feed.lock()?;
        feed.load(&self.client).map_err(|e| match feed.error() {
            Some(message) => ClinicError::RequestFailed(message.to_string()),
            None => ClinicError::Unauthorized(e.to_string()),
        })?;
        Ok(feed.prescriptions().iter().map(Into::into).collect())
    }

    /// Filter the last loaded feed by name, NIC or medicine.
    pub fn search_prescription_feed(
        &self,
        term: String,
    ) -> Result<Vec<FfiPrescription>, ClinicError> {
        let feed = self.feed.lock()?;
        Ok(feed.filter(&term).into_iter().map(Into::into).collect())
    }
}

fn form_error(e: views::FormError, fallback: &str) -> ClinicError {
    match e {
        views::FormError::Client(e) => ClinicError::from_client(e, fallback),
        other => other.into(),
    }
}

fn no_composer() -> ClinicError {
    ComposerError::NotOpen.into()
}

fn find_patient(view: &PatientListView, patient_id: i64) -> Result<Patient, ClinicError> {
    view.patients()
        .iter()
        .find(|p| p.id == patient_id)
        .cloned()
        .ok_or_else(|| ClinicError::InvalidInput(format!("Unknown patient: {}", patient_id)))
}

fn with_composer<T>(
    patients: &Mutex<PatientListView>,
    f: impl FnOnce(&mut PrescriptionComposer) -> T,
) -> Result<T, ClinicError> {
    let mut view = patients.lock()?;
    let composer = view.composer_mut().ok_or_else(no_composer)?;
    if composer.is_submitting() {
        return Err(ComposerError::AlreadySubmitting.into());
    }
    Ok(f(composer))
}

fn composer_state(view: &PatientListView) -> Result<FfiComposerState, ClinicError> {
    let composer = view.composer().ok_or_else(no_composer)?;
    Ok(composer.into())
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe identity.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiIdentity {
    pub email: String,
    pub role: String,
    /// Dashboard path for this role
    pub home_path: String,
}

impl From<Identity> for FfiIdentity {
    fn from(identity: Identity) -> Self {
        Self {
            home_path: identity.role.home().path().to_string(),
            role: identity.role.as_str().to_string(),
            email: identity.email,
        }
    }
}

/// FFI-safe navigation outcome.
#[derive(Debug, Clone, PartialEq, uniffi::Enum)]
pub enum FfiNavigation {
    Render { path: String },
    Loading,
    Redirect { path: String },
}

impl From<Navigation> for FfiNavigation {
    fn from(nav: Navigation) -> Self {
        match nav {
            Navigation::Render(route) => FfiNavigation::Render {
                path: route.path().to_string(),
            },
            Navigation::Loading => FfiNavigation::Loading,
            Navigation::Redirect(route) => FfiNavigation::Redirect {
                path: route.path().to_string(),
            },
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub nic: Option<String>,
    pub contact_number: String,
    pub living_area: String,
    pub date_of_birth: String,
    pub email: Option<String>,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            first_name: patient.first_name,
            last_name: patient.last_name,
            nic: patient.nic,
            contact_number: patient.contact_number,
            living_area: patient.living_area,
            date_of_birth: patient.date_of_birth,
            email: patient.email,
        }
    }
}

/// FFI-safe patient registration form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientForm {
    pub nic: String,
    pub first_name: String,
    pub last_name: String,
    pub contact_number: String,
    pub living_area: String,
    pub date_of_birth: String,
    pub email: String,
}

impl From<FfiPatientForm> for PatientRegistration {
    fn from(form: FfiPatientForm) -> Self {
        PatientRegistration {
            nic: form.nic,
            first_name: form.first_name,
            last_name: form.last_name,
            contact_number: form.contact_number,
            living_area: form.living_area,
            date_of_birth: form.date_of_birth,
            email: form.email,
        }
    }
}

/// FFI-safe staff signup form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStaffForm {
    pub nic: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub contact: String,
}

impl From<FfiStaffForm> for StaffRegistration {
    fn from(form: FfiStaffForm) -> Self {
        StaffRegistration {
            nic: form.nic,
            first_name: form.first_name,
            last_name: form.last_name,
            email: form.email,
            password: form.password,
            contact: form.contact,
        }
    }
}

/// FFI-safe prescription.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPrescription {
    pub id: i64,
    pub patient_id: Option<i64>,
    pub patient_name: Option<String>,
    pub patient_nic: Option<String>,
    pub note: String,
    pub bp_level: Option<String>,
    pub fbs_level: Option<String>,
    pub test_need: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub body_temperature: Option<f64>,
    pub heart_rate: Option<i64>,
    pub allergies: Option<String>,
    pub medicine_issue: Option<String>,
    pub medicine_to_get: String,
    pub other_note: Option<String>,
    /// Long US date, e.g. `January 5, 2025`
    pub created_on: Option<String>,
}

impl From<&Prescription> for FfiPrescription {
    fn from(p: &Prescription) -> Self {
        let patient = p.patient.as_ref();
        let patient_name = patient.and_then(|s| {
            let name = [s.first_name.as_deref(), s.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            Some(name).filter(|n| !n.is_empty())
        });

        Self {
            id: p.id,
            patient_id: p.owner_id(),
            patient_name,
            patient_nic: patient.and_then(|s| s.nic.clone()),
            note: p.note.clone(),
            bp_level: p.bp_level.clone(),
            fbs_level: p.fbs_level.clone(),
            test_need: p.test_need.clone(),
            height: p.height,
            weight: p.weight,
            body_temperature: p.body_temperature,
            heart_rate: p.heart_rate,
            allergies: p.allergies.clone(),
            medicine_issue: p.medicine_issue.clone(),
            medicine_to_get: p.medicine_to_get.clone(),
            other_note: p.other_note.clone(),
            created_on: p.created_on(),
        }
    }
}

/// FFI-safe medication row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedication {
    pub local_id: String,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
}

impl From<&MedicationEntry> for FfiMedication {
    fn from(entry: &MedicationEntry) -> Self {
        Self {
            local_id: entry.local_id.clone(),
            name: entry.name.clone(),
            dosage: entry.dosage.clone(),
            frequency: entry.frequency.clone(),
        }
    }
}

/// FFI-safe composer snapshot.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiComposerState {
    pub patient_id: i64,
    pub medications: Vec<FfiMedication>,
    /// Summary the medication rows currently serialize to
    pub medicine_issue: String,
    pub submitting: bool,
    /// Whether the remove button should be offered
    pub can_remove_medication: bool,
    pub error: Option<String>,
}

impl From<&PrescriptionComposer> for FfiComposerState {
    fn from(composer: &PrescriptionComposer) -> Self {
        Self {
            patient_id: composer.patient_id(),
            medications: composer.medications().iter().map(Into::into).collect(),
            medicine_issue: composer.medicine_issue(),
            submitting: composer.is_submitting(),
            can_remove_medication: composer.medications().len() > 1,
            error: composer.error().map(String::from),
        }
    }
}
