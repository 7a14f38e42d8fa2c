//! Blocking HTTP transport backed by reqwest.

use std::time::Duration;

use tracing::{debug, info};

use crate::wire::{
    normalize_base_url, ApiRequest, ApiResponse, Method, Transport, TransportError,
    TransportResult,
};

/// Default API server URL (local development).
pub const DEFAULT_API_URL: &str = "http://localhost:9090";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport against a fixed base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `base_url` (http or https).
    pub fn new(base_url: &str, timeout: Duration) -> TransportResult<Self> {
        let base_url = normalize_base_url(base_url)?;
        info!("Creating HttpTransport with base_url: {}", base_url);

        let client = reqwest::blocking::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> TransportResult<ApiResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, %url, "sending request");

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        builder = builder.header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        debug!(status, "received response");
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        let transport = HttpTransport::new(DEFAULT_API_URL, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:9090");
    }
}
