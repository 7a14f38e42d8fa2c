//! Scripted transport for testing without a running API server.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::wire::{ApiRequest, ApiResponse, Method, Transport, TransportError, TransportResult};

enum Scripted {
    Response(ApiResponse),
    NetworkFailure(String),
}

/// Transport that replays scripted responses per `(method, path)`.
///
/// Responses for the same route are returned in the order they were scripted;
/// the last one is repeated once the queue would otherwise run dry. Every
/// request is recorded, including ones that had no script.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a raw response.
    pub fn respond(&self, method: Method, path: &str, response: ApiResponse) -> &Self {
        self.push(method, path, Scripted::Response(response));
        self
    }

    /// Script a JSON response.
    pub fn respond_json(
        &self,
        method: Method,
        path: &str,
        status: u16,
        body: serde_json::Value,
    ) -> &Self {
        self.push(
            method,
            path,
            Scripted::Response(ApiResponse::new(status, body.to_string())),
        );
        self
    }

    /// Script a network failure (no response at all).
    pub fn fail(&self, method: Method, path: &str, reason: &str) -> &Self {
        self.push(method, path, Scripted::NetworkFailure(reason.to_string()));
        self
    }

    /// All requests seen so far, in order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Requests seen for one route.
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    fn push(&self, method: Method, path: &str, scripted: Scripted) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts
                .entry((method, path.to_string()))
                .or_default()
                .push_back(scripted);
        }
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &ApiRequest) -> TransportResult<ApiResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let mut scripts = self
            .scripts
            .lock()
            .map_err(|e| TransportError::Network(format!("Lock poisoned: {}", e)))?;
        let queue = scripts
            .get_mut(&(request.method, request.path.clone()))
            .filter(|q| !q.is_empty())
            .ok_or_else(|| TransportError::Unscripted {
                method: request.method,
                path: request.path.clone(),
            })?;

        let scripted = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().map(|s| match s {
                Scripted::Response(r) => Scripted::Response(r.clone()),
                Scripted::NetworkFailure(m) => Scripted::NetworkFailure(m.clone()),
            })
        };

        match scripted {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::NetworkFailure(reason)) => Err(TransportError::Network(reason)),
            None => Err(TransportError::Unscripted {
                method: request.method,
                path: request.path.clone(),
            }),
        }
    }
}
