//! Patient models.

use serde::{Deserialize, Serialize};

/// A patient as returned by the API. Only the server mutates patients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Server ID
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    /// National identity card number
    #[serde(default)]
    pub nic: Option<String>,
    pub contact_number: String,
    /// Address
    pub living_area: String,
    /// ISO date (`YYYY-MM-DD`)
    pub date_of_birth: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Patient registration payload (no ID).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub nic: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub contact_number: String,
    pub living_area: String,
    pub date_of_birth: String,
    pub email: Option<String>,
}

/// Patient as embedded in the pharmacist prescription feed. The feed is
/// permissive about which fields the server includes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub nic: Option<String>,
}
