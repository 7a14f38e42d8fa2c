//! Request and response types shared by every transport.

use serde::Serialize;
use thiserror::Error;

/// Transport errors.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No scripted response for {method} {path}")]
    Unscripted { method: Method, path: String },
}

pub type TransportResult<T> = Result<T, TransportError>;

/// HTTP method subset used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// An API request relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path beginning with `/`, e.g. `/api/patient/all`
    pub path: String,
    /// JSON body for POST requests
    pub body: Option<serde_json::Value>,
    /// Bearer credential, attached as `Authorization: Bearer <token>`
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    /// Build a POST request with a JSON-serialized body.
    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> TransportResult<Self> {
        Ok(Self {
            method: Method::Post,
            path: path.into(),
            body: Some(serde_json::to_value(body)?),
            bearer: None,
        })
    }

    /// Attach a bearer token.
    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

/// A raw API response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// The server-supplied `message` field of an error body, if any.
    pub fn server_message(&self) -> Option<String> {
        parse_server_message(&self.body)
    }

    /// The body itself when it is non-empty plain text rather than JSON.
    pub fn plain_text(&self) -> Option<String> {
        let text = self.body.trim();
        if text.is_empty() || serde_json::from_str::<serde_json::Value>(text).is_ok() {
            return None;
        }
        Some(text.to_string())
    }
}

/// Extract a non-empty `message` string from a JSON error body.
pub fn parse_server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
}

/// Validate a base URL (http or https) and strip any trailing slash.
pub fn normalize_base_url(base_url: &str) -> TransportResult<String> {
    let cleaned = base_url.trim().trim_end_matches('/');
    let parsed = url::Url::parse(cleaned)
        .map_err(|e| TransportError::InvalidUrl(format!("Invalid URL '{}': {}", cleaned, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(TransportError::InvalidUrl(format!(
            "URL must use http or https scheme, got: {}",
            parsed.scheme()
        )));
    }

    Ok(cleaned.to_string())
}

/// Executes API requests.
///
/// Implementations must not interpret status codes; authentication handling
/// belongs to the caller.
pub trait Transport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> TransportResult<ApiResponse>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, request: &ApiRequest) -> TransportResult<ApiResponse> {
        (**self).send(request)
    }
}
