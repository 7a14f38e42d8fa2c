//! Identity, role and authentication payloads.

use serde::{Deserialize, Serialize};

/// Staff role. Determines which dashboard and API operations are permitted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Doctor,
    Pharmacist,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Doctor, Role::Pharmacist];

    /// Wire name (`"DOCTOR"` / `"PHARMACIST"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Doctor => "DOCTOR",
            Role::Pharmacist => "PHARMACIST",
        }
    }

    /// Parse a wire name. Role names are case-sensitive on the wire.
    pub fn parse(s: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|r| r.as_str() == s)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
        }
    }
}

/// Login request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Login response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
}

/// Staff signup body, shared by the doctor and pharmacist signup endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaffSignup {
    pub nic: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub contact: String,
}
