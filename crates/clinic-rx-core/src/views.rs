//! List-view and registration-form state for the dashboards.
//!
//! These hold no business invariant of their own. They sequence remote
//! calls and keep the last fetched lists plus display-only state such as
//! expanded prescription rows.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::client::{ClientError, ClientResult, RemoteClient};
use crate::composer::{ComposerError, ComposerResult, PrescriptionComposer};
use crate::models::{NewPatient, Patient, Prescription, PrescriptionPayload, StaffSignup};

pub const LOAD_PRESCRIPTIONS_FALLBACK: &str = "Failed to load prescriptions";
pub const LOAD_PATIENTS_FALLBACK: &str = "Failed to load patients";
pub const REGISTER_PATIENT_FALLBACK: &str = "Failed to register patient";
pub const REGISTER_PHARMACIST_FALLBACK: &str = "Failed to register pharmacist";

// =========================================================================
// Doctor dashboard: patient list
// =========================================================================

/// Patient list with per-patient prescription history and composer.
#[derive(Debug, Default)]
pub struct PatientListView {
    patients: Vec<Patient>,
    selected: Option<Patient>,
    prescriptions: Vec<Prescription>,
    expanded: HashSet<i64>,
    composer: Option<PrescriptionComposer>,
    error: Option<String>,
}

impl PatientListView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    pub fn selected(&self) -> Option<&Patient> {
        self.selected.as_ref()
    }

    /// Prescriptions of the selected patient.
    pub fn prescriptions(&self) -> &[Prescription] {
        &self.prescriptions
    }

    pub fn composer(&self) -> Option<&PrescriptionComposer> {
        self.composer.as_ref()
    }

    pub fn composer_mut(&mut self) -> Option<&mut PrescriptionComposer> {
        self.composer.as_mut()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn load_patients(&mut self, client: &RemoteClient) -> ClientResult<()> {
        match client.list_patients() {
            Ok(patients) => {
                debug!(count = patients.len(), "loaded patients");
                self.patients = patients;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to load patients");
                self.error = e.user_message(LOAD_PATIENTS_FALLBACK);
                Err(e)
            }
        }
    }

    /// Select a patient and fetch their prescriptions. Closes the composer
    /// unless a submission is in flight.
    pub fn view_prescriptions(
        &mut self,
        client: &RemoteClient,
        patient: &Patient,
    ) -> ClientResult<()> {
        match client.list_prescriptions(patient.id) {
            Ok(prescriptions) => {
                self.prescriptions = prescriptions;
                self.selected = Some(patient.clone());
                if !self.is_submitting() {
                    self.composer = None;
                }
                self.error = None;
                Ok(())
            }
            Err(e) => {
                self.error = e.user_message(LOAD_PRESCRIPTIONS_FALLBACK);
                Err(e)
            }
        }
    }

    /// Whether the open composer has a create call in flight.
    pub fn is_submitting(&self) -> bool {
        self.composer.as_ref().is_some_and(|c| c.is_submitting())
    }

    /// Open a fresh composer for `patient`, hiding the history list.
    pub fn open_composer(&mut self, patient: &Patient) -> ComposerResult<()> {
        self.ensure_idle()?;
        self.collapse_patient(patient.id);
        self.selected = Some(patient.clone());
        self.prescriptions.clear();
        self.composer = Some(PrescriptionComposer::new(patient.id));
        Ok(())
    }

    /// Cancel. Entered data is discarded.
    pub fn close_composer(&mut self) -> ComposerResult<()> {
        self.ensure_idle()?;
        self.composer = None;
        Ok(())
    }

    /// Validate the open composer and mark it submitting. Returns the
    /// patient ID and payload for the create call, which the caller makes
    /// without holding this view.
    pub fn begin_submit(&mut self) -> ComposerResult<(i64, PrescriptionPayload)> {
        let composer = self.composer.as_mut().ok_or(ComposerError::NotOpen)?;
        let payload = composer.begin_submit()?;
        Ok((composer.patient_id(), payload))
    }

    /// Settle the in-flight composer with the create outcome. On success
    /// runs [`on_prescription_created`](Self::on_prescription_created); a
    /// failed refresh is logged, not returned.
    pub fn finish_submit(
        &mut self,
        client: &RemoteClient,
        patient_id: i64,
        result: ClientResult<Prescription>,
    ) -> ComposerResult<Prescription> {
        let created = match self.composer.as_mut() {
            Some(composer) => composer.finish_submit(result)?,
            None => result?,
        };
        if let Err(e) = self.on_prescription_created(client, patient_id) {
            warn!(error = %e, "refresh after prescription create failed");
        }
        Ok(created)
    }

    fn ensure_idle(&self) -> ComposerResult<()> {
        if self.is_submitting() {
            return Err(ComposerError::AlreadySubmitting);
        }
        Ok(())
    }

    /// Success callback for a created prescription: close the composer,
    /// collapse that patient's rows, then refresh their prescriptions and
    /// the patient list, in that order.
    pub fn on_prescription_created(
        &mut self,
        client: &RemoteClient,
        patient_id: i64,
    ) -> ClientResult<()> {
        self.composer = None;
        self.collapse_patient(patient_id);

        let selected = self.selected.clone().filter(|p| p.id == patient_id);
        if let Some(patient) = selected {
            self.view_prescriptions(client, &patient)?;
        }
        self.load_patients(client)
    }

    /// Flip the expanded state of one prescription row.
    pub fn toggle_details(&mut self, prescription_id: i64) -> bool {
        if !self.expanded.remove(&prescription_id) {
            self.expanded.insert(prescription_id);
            return true;
        }
        false
    }

    pub fn is_expanded(&self, prescription_id: i64) -> bool {
        self.expanded.contains(&prescription_id)
    }

    fn collapse_patient(&mut self, patient_id: i64) {
        let ids: Vec<i64> = self
            .prescriptions
            .iter()
            .filter(|p| p.owner_id().map_or(true, |id| id == patient_id))
            .map(|p| p.id)
            .collect();
        for id in ids {
            self.expanded.remove(&id);
        }
    }
}

// =========================================================================
// Pharmacist dashboard: prescription feed
// =========================================================================

/// Consolidated prescription feed with client-side search.
#[derive(Debug, Default)]
pub struct PrescriptionFeed {
    prescriptions: Vec<Prescription>,
    error: Option<String>,
}

impl PrescriptionFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prescriptions(&self) -> &[Prescription] {
        &self.prescriptions
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Fetch the feed. Any failure other than 401 sets a fixed message.
    pub fn load(&mut self, client: &RemoteClient) -> ClientResult<()> {
        self.error = None;
        match client.list_all_prescriptions() {
            Ok(prescriptions) => {
                self.prescriptions = prescriptions;
                Ok(())
            }
            Err(e) => {
                if !e.is_unauthorized() {
                    self.error = Some(LOAD_PRESCRIPTIONS_FALLBACK.to_string());
                }
                Err(e)
            }
        }
    }

    /// Entries whose patient name, NIC, `medicineToGet` or `medicineIssue`
    /// contains `term`, case-insensitively.
    pub fn filter(&self, term: &str) -> Vec<&Prescription> {
        let needle = term.to_lowercase();
        self.prescriptions
            .iter()
            .filter(|p| matches_search(p, &needle))
            .collect()
    }
}

fn matches_search(prescription: &Prescription, needle: &str) -> bool {
    let patient = prescription.patient.as_ref();
    [
        patient.and_then(|p| p.first_name.as_deref()),
        patient.and_then(|p| p.last_name.as_deref()),
        patient.and_then(|p| p.nic.as_deref()),
        Some(prescription.medicine_to_get.as_str()),
        prescription.medicine_issue.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(needle))
}

// =========================================================================
// Registration forms
// =========================================================================

/// Registration form failure.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("Required field is empty: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl FormError {
    /// Text to show under the form; `None` for authentication failures.
    pub fn user_message(&self, fallback: &str) -> Option<String> {
        match self {
            FormError::MissingField(field) => Some(format!("{} is required", field)),
            FormError::Client(e) => e.user_message(fallback),
        }
    }
}

fn require(name: &'static str, value: &str) -> Result<String, FormError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FormError::MissingField(name));
    }
    Ok(trimmed.to_string())
}

/// Passwords are sent exactly as typed.
fn require_untrimmed(name: &'static str, value: &str) -> Result<String, FormError> {
    if value.is_empty() {
        return Err(FormError::MissingField(name));
    }
    Ok(value.to_string())
}

fn optional(value: &str) -> Option<String> {
    Some(value.trim().to_string()).filter(|v| !v.is_empty())
}

/// Doctor-side patient registration form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientRegistration {
    pub nic: String,
    pub first_name: String,
    pub last_name: String,
    pub contact_number: String,
    pub living_area: String,
    pub date_of_birth: String,
    pub email: String,
}

impl PatientRegistration {
    pub fn to_payload(&self) -> Result<NewPatient, FormError> {
        Ok(NewPatient {
            first_name: require("firstName", &self.first_name)?,
            last_name: require("lastName", &self.last_name)?,
            contact_number: require("contactNumber", &self.contact_number)?,
            living_area: require("livingArea", &self.living_area)?,
            date_of_birth: require("dateOfBirth", &self.date_of_birth)?,
            nic: optional(&self.nic),
            email: optional(&self.email),
        })
    }

    /// Register and clear the form on success. On failure the form is kept.
    pub fn submit(&mut self, client: &RemoteClient) -> Result<Patient, FormError> {
        let payload = self.to_payload()?;
        let patient = client.register_patient(&payload)?;
        *self = Self::default();
        Ok(patient)
    }
}

/// Staff signup form, used for doctor-side pharmacist registration and the
/// public signup pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaffRegistration {
    pub nic: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub contact: String,
}

impl StaffRegistration {
    pub fn to_payload(&self) -> Result<StaffSignup, FormError> {
        Ok(StaffSignup {
            nic: require("nic", &self.nic)?,
            first_name: require("firstName", &self.first_name)?,
            last_name: require("lastName", &self.last_name)?,
            email: require("email", &self.email)?,
            password: require_untrimmed("password", &self.password)?,
            contact: require("contact", &self.contact)?,
        })
    }

    pub fn submit_pharmacist(&mut self, client: &RemoteClient) -> Result<(), FormError> {
        let payload = self.to_payload()?;
        client.signup_pharmacist(&payload)?;
        *self = Self::default();
        Ok(())
    }

    pub fn submit_doctor(&mut self, client: &RemoteClient) -> Result<(), FormError> {
        let payload = self.to_payload()?;
        client.signup_doctor(&payload)?;
        *self = Self::default();
        Ok(())
    }
}
