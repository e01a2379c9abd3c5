//! Transport collaborator.
//!
//! The orchestrator never talks to the network directly. It builds an
//! [`ApiRequest`] and hands it to a [`Transport`], which resolves with either
//! a [`TransportResponse`] (2xx) or a [`NetworkError`]. Connectivity is a
//! separate capability so that an offline host can be detected before a leg
//! starts.
//!
//! # Examples
//!
//! ```rust,no_run
//! use xendit_bridge::transport::{ApiRequest, HttpTransport, Transport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new()?;
//! let request = ApiRequest::get("https://api.xendit.co/credit_card_tokenization_configuration")
//!     .header("Authorization", "Basic eG5kXzo=");
//!
//! let response = transport.execute(request).await?;
//! println!("Status: {}", response.status);
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::{Result, XenditError};

pub mod config;
pub mod http;

pub use config::{HttpConfig, HttpVersion};
pub use http::HttpTransport;

/// HTTP method of an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`.
    Get,
    /// `POST`.
    Post,
}

impl Method {
    /// Method name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A single API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL including any query string.
    pub url: String,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Creates a `GET` request.
    #[must_use]
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for builders")]
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: Method::Get, url: url.into(), headers: Vec::new(), body: None }
    }

    /// Creates a `POST` request with a JSON body.
    #[must_use]
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for builders")]
    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self { method: Method::Post, url: url.into(), headers: Vec::new(), body: Some(body) }
    }

    /// Adds a header.
    #[must_use]
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for builders")]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the value of the first header named `name` (case-insensitive).
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Successful (2xx) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body bytes.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Decodes the body into the expected model.
    ///
    /// # Errors
    ///
    /// Returns a server error if the body does not match the model.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| XenditError::server(format!("unexpected response payload: {e}")))
    }
}

/// Failure of a single leg at the transport or API level.
///
/// `body` keeps the raw response text so it can be classified by shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NetworkError {
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Transport-level description.
    pub message: String,
    /// Raw response body, when a response was received.
    pub body: Option<String>,
}

impl NetworkError {
    /// Failure before any response was received.
    #[must_use]
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for constructors")]
    pub fn transport(message: impl Into<String>) -> Self {
        Self { status: None, message: message.into(), body: None }
    }

    /// Non-success response.
    #[must_use]
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for constructors")]
    pub fn response(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: format!("server returned status {status}"),
            body: Some(body.into()),
        }
    }
}

/// Issues API calls on its own schedule.
///
/// Implementations may complete on any thread; the orchestrator awaits each
/// call before starting the next leg.
pub trait Transport: Send + Sync {
    /// Executes one request.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] for connection failures and non-2xx responses.
    fn execute(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = std::result::Result<TransportResponse, NetworkError>> + Send + '_;

    /// Returns the protocol name for logging.
    fn protocol_name(&self) -> &'static str;
}

/// Reports whether the host currently has network connectivity.
pub trait Connectivity: Send + Sync {
    /// Returns `true` when a request may be attempted.
    fn is_connected(&self) -> bool;
}

/// Connectivity check for hosts without a connectivity signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConnected;

impl Connectivity for AlwaysConnected {
    fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{error::ErrorKind, models::TokenConfiguration};

    #[test]
    fn test_api_request_builders() {
        let request = ApiRequest::post("https://api.xendit.co/credit_card_tokens", json!({"a": 1}))
            .header("Authorization", "Basic abc");

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.header_value("authorization"), Some("Basic abc"));
        assert_eq!(request.body, Some(json!({"a": 1})));
        assert_eq!(ApiRequest::get("https://x").body, None);
    }

    #[test]
    fn test_response_json_decodes_model() {
        let response = TransportResponse {
            status: 200,
            body: br#"{"flex_production_url":"a","flex_development_url":"b","flex_api_key":"c","tokenization_auth_key_id":"d"}"#.to_vec(),
        };
        let config: TokenConfiguration = response.json().unwrap();
        assert_eq!(config.tokenization_auth_key_id, "d");
    }

    #[test]
    fn test_response_json_malformed_is_server_error() {
        let response = TransportResponse { status: 200, body: b"not json".to_vec() };
        let err = response.json::<TokenConfiguration>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
    }

    #[test]
    fn test_network_error_constructors() {
        let err = NetworkError::response(404, "Not Found");
        assert_eq!(err.status, Some(404));
        assert_eq!(err.body.as_deref(), Some("Not Found"));
        assert_eq!(err.to_string(), "server returned status 404");

        let err = NetworkError::transport("connection reset");
        assert_eq!(err.status, None);
        assert!(err.body.is_none());
    }

    #[test]
    fn test_always_connected() {
        assert!(AlwaysConnected.is_connected());
    }
}
