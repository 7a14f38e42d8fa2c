//! Prescription composer.
//!
//! Collects vitals, notes and a variable-length medication list for one
//! patient, and turns them into a single [`PrescriptionPayload`].
//!
//! ```text
//!            begin_submit (valid)
//!   Editing ─────────────────────────▶ Submitting
//!      ▲                                   │
//!      └──── finish_submit (ok / error) ───┘
//! ```
//!
//! Submission is split in two so that a caller sharing the composer can run
//! the remote call without holding a lock. While submitting, a second
//! [`begin_submit`](PrescriptionComposer::begin_submit) is rejected rather
//! than queued.

use thiserror::Error;
use tracing::{info, warn};

use crate::client::{ClientError, RemoteClient};
use crate::models::{
    summarize_medications, MedicationEntry, MedicationField, Prescription, PrescriptionPayload,
};

/// Shown when a failed submission carries no server message.
pub const SUBMIT_FALLBACK_MESSAGE: &str = "Failed to create prescription";

/// Composer errors.
#[derive(Error, Debug)]
pub enum ComposerError {
    #[error("Required field is empty: {0}")]
    MissingField(FormField),

    #[error("A submission is already in flight")]
    AlreadySubmitting,

    #[error("No prescription composer is open")]
    NotOpen,

    #[error(transparent)]
    Client(#[from] ClientError),
}

pub type ComposerResult<T> = Result<T, ComposerError>;

/// Free-text form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Note,
    BpLevel,
    FbsLevel,
    TestNeed,
    Height,
    Weight,
    BodyTemperature,
    HeartRate,
    Allergies,
    MedicineToGet,
    OtherNote,
}

impl FormField {
    /// Wire name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Note => "note",
            FormField::BpLevel => "bpLevel",
            FormField::FbsLevel => "fbsLevel",
            FormField::TestNeed => "testNeed",
            FormField::Height => "height",
            FormField::Weight => "weight",
            FormField::BodyTemperature => "bodyTemperature",
            FormField::HeartRate => "heartRate",
            FormField::Allergies => "allergies",
            FormField::MedicineToGet => "medicineToGet",
            FormField::OtherNote => "otherNote",
        }
    }

    pub fn parse(s: &str) -> Option<FormField> {
        use FormField::*;
        [
            Note, BpLevel, FbsLevel, TestNeed, Height, Weight, BodyTemperature, HeartRate,
            Allergies, MedicineToGet, OtherNote,
        ]
        .into_iter()
        .find(|f| f.as_str() == s)
    }
}

impl std::fmt::Display for FormField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw text as typed into the form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrescriptionForm {
    pub note: String,
    pub bp_level: String,
    pub fbs_level: String,
    pub test_need: String,
    pub height: String,
    pub weight: String,
    pub body_temperature: String,
    pub heart_rate: String,
    pub allergies: String,
    pub medicine_to_get: String,
    pub other_note: String,
}

impl PrescriptionForm {
    fn slot(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::Note => &mut self.note,
            FormField::BpLevel => &mut self.bp_level,
            FormField::FbsLevel => &mut self.fbs_level,
            FormField::TestNeed => &mut self.test_need,
            FormField::Height => &mut self.height,
            FormField::Weight => &mut self.weight,
            FormField::BodyTemperature => &mut self.body_temperature,
            FormField::HeartRate => &mut self.heart_rate,
            FormField::Allergies => &mut self.allergies,
            FormField::MedicineToGet => &mut self.medicine_to_get,
            FormField::OtherNote => &mut self.other_note,
        }
    }
}

/// Composer phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerPhase {
    Editing,
    /// Remote call in flight; the form is disabled
    Submitting,
}

/// Stateful prescription form for one patient.
#[derive(Debug, Clone)]
pub struct PrescriptionComposer {
    patient_id: i64,
    form: PrescriptionForm,
    medications: Vec<MedicationEntry>,
    phase: ComposerPhase,
    error: Option<String>,
}

impl PrescriptionComposer {
    /// Fresh composer with one empty medication row.
    pub fn new(patient_id: i64) -> Self {
        Self {
            patient_id,
            form: PrescriptionForm::default(),
            medications: vec![MedicationEntry::new()],
            phase: ComposerPhase::Editing,
            error: None,
        }
    }

    pub fn patient_id(&self) -> i64 {
        self.patient_id
    }

    pub fn form(&self) -> &PrescriptionForm {
        &self.form
    }

    pub fn medications(&self) -> &[MedicationEntry] {
        &self.medications
    }

    pub fn phase(&self) -> ComposerPhase {
        self.phase
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == ComposerPhase::Submitting
    }

    /// Message from the last failed submission.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    // =========================================================================
    // Editing
    // =========================================================================

    pub fn set_field(&mut self, field: FormField, value: impl Into<String>) {
        *self.form.slot(field) = value.into();
    }

    /// Append an empty medication row and return its local ID.
    pub fn add_medication(&mut self) -> String {
        let entry = MedicationEntry::new();
        let id = entry.local_id.clone();
        self.medications.push(entry);
        id
    }

    /// Remove a row. No-op on the last remaining row or an unknown ID.
    pub fn remove_medication(&mut self, local_id: &str) -> bool {
        if self.medications.len() <= 1 {
            return false;
        }
        let before = self.medications.len();
        self.medications.retain(|m| m.local_id != local_id);
        self.medications.len() != before
    }

    /// Update one field of a row in place. Returns false for an unknown ID.
    pub fn update_medication(
        &mut self,
        local_id: &str,
        field: MedicationField,
        value: impl Into<String>,
    ) -> bool {
        match self.medications.iter_mut().find(|m| m.local_id == local_id) {
            Some(entry) => {
                entry.set(field, value.into());
                true
            }
            None => false,
        }
    }

    /// Current `medicineIssue` summary.
    pub fn medicine_issue(&self) -> String {
        summarize_medications(&self.medications)
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Validate required fields and assemble the payload. Does not change
    /// state.
    pub fn build_payload(&self) -> ComposerResult<PrescriptionPayload> {
        for (field, value) in [
            (FormField::Note, &self.form.note),
            (FormField::MedicineToGet, &self.form.medicine_to_get),
        ] {
            if value.trim().is_empty() {
                return Err(ComposerError::MissingField(field));
            }
        }

        Ok(PrescriptionPayload {
            patient_id: self.patient_id,
            note: self.form.note.clone(),
            bp_level: self.form.bp_level.clone(),
            fbs_level: self.form.fbs_level.clone(),
            test_need: self.form.test_need.clone(),
            height: parse_decimal(FormField::Height, &self.form.height),
            weight: parse_decimal(FormField::Weight, &self.form.weight),
            body_temperature: parse_decimal(
                FormField::BodyTemperature,
                &self.form.body_temperature,
            ),
            heart_rate: parse_integer(FormField::HeartRate, &self.form.heart_rate),
            allergies: self.form.allergies.clone(),
            medicine_issue: self.medicine_issue(),
            medicine_to_get: self.form.medicine_to_get.clone(),
            other_note: self.form.other_note.clone(),
        })
    }

    /// Enter `Submitting` and hand out the payload to send.
    ///
    /// Validation failures leave the composer in `Editing` and never reach
    /// the network.
    pub fn begin_submit(&mut self) -> ComposerResult<PrescriptionPayload> {
        if self.is_submitting() {
            return Err(ComposerError::AlreadySubmitting);
        }
        let payload = self.build_payload()?;
        self.error = None;
        self.phase = ComposerPhase::Submitting;
        Ok(payload)
    }

    /// Leave `Submitting` with the outcome of the remote call.
    ///
    /// On failure the entered data is kept and the error message is set,
    /// except for authentication failures, which are handled globally.
    pub fn finish_submit(
        &mut self,
        result: Result<Prescription, ClientError>,
    ) -> ComposerResult<Prescription> {
        self.phase = ComposerPhase::Editing;
        match result {
            Ok(created) => {
                info!(
                    patient_id = self.patient_id,
                    prescription_id = created.id,
                    "prescription submitted"
                );
                self.error = None;
                Ok(created)
            }
            Err(e) => {
                warn!(patient_id = self.patient_id, error = %e, "prescription submission failed");
                self.error = e.user_message(SUBMIT_FALLBACK_MESSAGE);
                Err(e.into())
            }
        }
    }

    /// Validate, send through `client`, and settle.
    pub fn submit(&mut self, client: &RemoteClient) -> ComposerResult<Prescription> {
        let payload = self.begin_submit()?;
        let result = client.create_prescription(self.patient_id, &payload);
        self.finish_submit(result)
    }
}

/// Blank → absent. Unparseable input is also absent, never zero.
fn parse_decimal(field: FormField, raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            warn!(%field, input = raw, "ignoring unparseable vital");
            None
        }
    }
}

/// Blank → absent. Decimal input is truncated toward zero.
fn parse_integer(field: FormField, raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value.trunc() as i64),
        _ => {
            warn!(%field, input = raw, "ignoring unparseable vital");
            None
        }
    }
}
