// system-tests/src/client.rs
// ============================================================================
// Module: API Client
// Description: HTTP client for the land-grants API.
// Purpose: Send authenticated JSON requests and capture responses as data.
// Dependencies: reqwest, serde, serde_json, thiserror, url
// ============================================================================

//! ## Overview
//! [`ApiClient`] wraps a `reqwest` client bound to the configured base URL.
//! Every request carries `Accept: application/json` plus the optional bearer
//! token and API key. Non-success statuses are not errors here: they are
//! captured in [`ApiResponse`] so case handlers can assert on them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use case_harness::CaseError;
use reqwest::RequestBuilder;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::SystemTestConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-api-key";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Transport-level client failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(String),
    /// The endpoint path could not be joined onto the base URL.
    #[error("invalid endpoint '{path}': {message}")]
    Endpoint {
        /// Offending endpoint path.
        path: String,
        /// Parser error message.
        message: String,
    },
    /// The request failed before a response was received.
    #[error("request to {url} failed: {message}")]
    Request {
        /// Request URL.
        url: String,
        /// Transport error message.
        message: String,
    },
    /// The response body could not be read.
    #[error("failed to read response from {url}: {message}")]
    Body {
        /// Request URL.
        url: String,
        /// Read error message.
        message: String,
    },
}

impl From<ClientError> for CaseError {
    fn from(err: ClientError) -> Self {
        Self::Transport(err.to_string())
    }
}

// ============================================================================
// SECTION: Response
// ============================================================================

/// Captured API response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, when present.
    pub content_type: Option<String>,
    /// Parsed JSON body; `Null` when empty, a string when not JSON.
    pub body: Value,
}

impl ApiResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Returns the top-level `message` field of the body.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }

    /// Returns a top-level body field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }
}

/// Decodes a response body: JSON when possible, otherwise the raw text.
fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// HTTP client bound to one API base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Underlying HTTP client.
    http: reqwest::Client,
    /// Base URL endpoints are appended to.
    base_url: Url,
    /// Optional bearer token.
    bearer_token: Option<String>,
    /// Optional API key.
    api_key: Option<String>,
}

impl ApiClient {
    /// Builds a client from suite configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Build`] when the HTTP client cannot be built.
    pub fn new(config: &SystemTestConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|err| ClientError::Build(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            bearer_token: config.bearer_token.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an endpoint path against the base URL, keeping any base path.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Endpoint`] when the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|err| ClientError::Endpoint {
            path: path.to_string(),
            message: err.to_string(),
        })
    }

    /// Sends a GET request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport failures.
    pub async fn get(&self, path: &str) -> Result<ApiResponse, ClientError> {
        let url = self.endpoint(path)?;
        let builder = self.http.get(url.clone());
        self.send(&url, builder).await
    }

    /// Sends a POST request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport failures.
    pub async fn post_json<T>(&self, path: &str, body: &T) -> Result<ApiResponse, ClientError>
    where
        T: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        let builder = self.http.post(url.clone()).json(body);
        self.send(&url, builder).await
    }

    /// Applies the shared headers, sends, and captures the response.
    async fn send(&self, url: &Url, builder: RequestBuilder) -> Result<ApiResponse, ClientError> {
        let mut builder = builder.header(ACCEPT, "application/json");
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        let response = builder.send().await.map_err(|err| ClientError::Request {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        let text = response.text().await.map_err(|err| ClientError::Body {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        Ok(ApiResponse {
            status,
            content_type,
            body: decode_body(&text),
        })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
