use crate::config::Config;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Transport faults are folded into synthetic status codes so callers only
/// ever see a (status, body) pair.
#[derive(Debug, Error)]
enum TransportError {
    #[error("API service unavailable")]
    Unavailable,
    #[error("API request timed out")]
    TimedOut,
    #[error("API request error: {0}")]
    Other(String),
}

impl TransportError {
    fn classify(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::TimedOut
        } else if e.is_connect() {
            TransportError::Unavailable
        } else {
            TransportError::Other(e.to_string())
        }
    }

    fn status(&self) -> u16 {
        match self {
            TransportError::Unavailable => 503,
            TransportError::TimedOut => 408,
            TransportError::Other(_) => 500,
        }
    }

    fn into_response(self) -> ApiResponse {
        ApiResponse {
            status: self.status(),
            body: json!({ "message": self.to_string() }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Backend error message, or the agreed fallback when the body has none.
    pub fn message(&self) -> String {
        self.body
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown error")
            .to_string()
    }

    pub fn error_code(&self) -> &'static str {
        match self.status {
            409 => "conflict",
            404 => "not_found",
            503 => "api_unavailable",
            408 => "api_timeout",
            _ => "api_error",
        }
    }
}

pub struct ApiClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl ApiClient {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: cfg.api_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// One backend call. Never panics and never returns an error type: every
    /// failure mode is represented in the returned (status, body) pair.
    pub fn call(&self, method: Method, endpoint: &str, payload: Option<&Value>) -> ApiResponse {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(method = method.as_str(), endpoint, payload = ?payload, "api call");

        let mut request = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Put => self.http.put(&url),
            Method::Delete => self.http.delete(&url),
        };
        if matches!(method, Method::Post | Method::Put) {
            let empty = json!({});
            request = request.json(payload.unwrap_or(&empty));
        }

        let response = match request.send() {
            Ok(r) => r,
            Err(e) => {
                let fault = TransportError::classify(&e);
                debug!(method = method.as_str(), endpoint, error = %e, "api transport failure");
                return fault.into_response();
            }
        };

        let status = response.status().as_u16();
        if status == 204 {
            debug!(method = method.as_str(), endpoint, status, "api response");
            return ApiResponse {
                status,
                body: json!({}),
            };
        }

        let raw = match response.text() {
            Ok(t) => t,
            Err(e) => return TransportError::classify(&e).into_response(),
        };
        let body = match serde_json::from_str::<Value>(&raw) {
            Ok(v) => v,
            Err(_) => json!({ "message": format!("Invalid JSON response from API: {raw}") }),
        };
        debug!(method = method.as_str(), endpoint, status, "api response");
        ApiResponse { status, body }
    }

    pub fn get(&self, endpoint: &str) -> ApiResponse {
        self.call(Method::Get, endpoint, None)
    }

    pub fn post(&self, endpoint: &str, payload: &Value) -> ApiResponse {
        self.call(Method::Post, endpoint, Some(payload))
    }

    pub fn put(&self, endpoint: &str, payload: &Value) -> ApiResponse {
        self.call(Method::Put, endpoint, Some(payload))
    }

    pub fn delete(&self, endpoint: &str) -> ApiResponse {
        self.call(Method::Delete, endpoint, None)
    }
}
