//! Composer-local medication entries.

use serde::{Deserialize, Serialize};

/// Separator between medications in the `medicineIssue` summary.
pub const MEDICATION_SEPARATOR: &str = " | ";

/// One row of the "current medications" list. Never sent on its own; the
/// list is flattened into `medicineIssue`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationEntry {
    /// Local UUID, unique within the composer
    pub local_id: String,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
}

/// Editable fields of a [`MedicationEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MedicationField {
    Name,
    Dosage,
    Frequency,
}

impl MedicationEntry {
    /// Empty entry with a fresh local ID.
    pub fn new() -> Self {
        Self {
            local_id: uuid::Uuid::new_v4().to_string(),
            name: String::new(),
            dosage: String::new(),
            frequency: String::new(),
        }
    }

    pub fn set(&mut self, field: MedicationField, value: String) {
        match field {
            MedicationField::Name => self.name = value,
            MedicationField::Dosage => self.dosage = value,
            MedicationField::Frequency => self.frequency = value,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
    }

    /// `name[ - Dosage: dosage][ - Frequency: frequency]`, or `None` for a
    /// nameless entry.
    pub fn fragment(&self) -> Option<String> {
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }

        let mut parts = vec![name.to_string()];
        let dosage = self.dosage.trim();
        if !dosage.is_empty() {
            parts.push(format!("Dosage: {}", dosage));
        }
        let frequency = self.frequency.trim();
        if !frequency.is_empty() {
            parts.push(format!("Frequency: {}", frequency));
        }
        Some(parts.join(" - "))
    }
}

impl Default for MedicationEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten a medication list into the `medicineIssue` summary, dropping
/// nameless entries.
pub fn summarize_medications(entries: &[MedicationEntry]) -> String {
    entries
        .iter()
        .filter_map(MedicationEntry::fragment)
        .collect::<Vec<_>>()
        .join(MEDICATION_SEPARATOR)
}
