//! Prescription models.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::patient::PatientSummary;

/// A prescription as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: i64,
    #[serde(default)]
    pub patient_id: Option<i64>,
    pub note: String,
    #[serde(default)]
    pub bp_level: Option<String>,
    #[serde(default)]
    pub fbs_level: Option<String>,
    #[serde(default)]
    pub test_need: Option<String>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub body_temperature: Option<f64>,
    #[serde(default)]
    pub heart_rate: Option<i64>,
    #[serde(default)]
    pub allergies: Option<String>,
    /// Free-text summary of current medications
    #[serde(default)]
    pub medicine_issue: Option<String>,
    pub medicine_to_get: String,
    #[serde(default)]
    pub other_note: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Embedded patient (pharmacist feed only)
    #[serde(default)]
    pub patient: Option<PatientSummary>,
}

impl Prescription {
    /// Creation date as a long US date, e.g. `January 5, 2025`.
    pub fn created_on(&self) -> Option<String> {
        let raw = self.created_at.as_deref()?;
        parse_created_date(raw).map(|d| d.format("%B %-d, %Y").to_string())
    }

    /// Patient ID, from the field or the embedded patient.
    pub fn owner_id(&self) -> Option<i64> {
        self.patient_id
            .or_else(|| self.patient.as_ref().and_then(|p| p.id))
    }
}

/// Accepts RFC 3339, zone-less ISO datetimes (with or without fractional
/// seconds) and plain dates.
fn parse_created_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Create-prescription payload.
///
/// Absent vitals serialize as explicit `null`, never as `0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionPayload {
    pub patient_id: i64,
    pub note: String,
    pub bp_level: String,
    pub fbs_level: String,
    pub test_need: String,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub body_temperature: Option<f64>,
    pub heart_rate: Option<i64>,
    pub allergies: String,
    pub medicine_issue: String,
    pub medicine_to_get: String,
    pub other_note: String,
}
