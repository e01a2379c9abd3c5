//! Error types for the Xendit bridge.
//!
//! Every failure a caller can observe is normalized into a single
//! [`XenditError`]. The [`ErrorKind`] tag carries the taxonomy, the `code`
//! carries a stable machine-readable string, and the `message` is meant for
//! humans.
//!
//! # Error Categories
//!
//! - **Validation** ([`ErrorKind::Validation`]): bad card number, expiry, CVN, or a CVN that does
//!   not match the card brand. Raised before any network call.
//! - **Connection** ([`ErrorKind::Connection`]): the host reports no connectivity.
//! - **Network** ([`ErrorKind::Network`]): the transport or the API rejected a leg.
//! - **Tokenization** ([`ErrorKind::Tokenization`]): the card tokenizer signaled a failure.
//! - **Server** ([`ErrorKind::Server`]): malformed or unexpected payloads.
//! - **Authentication failed** ([`ErrorKind::AuthenticationFailed`]): the step-up finished
//!   with a `failure_reason`.
//!
//! # Examples
//!
//! ```
//! use xendit_bridge::error::{ErrorKind, XenditError};
//!
//! let err = XenditError::validation("Card number is invalid");
//! assert_eq!(err.kind(), ErrorKind::Validation);
//! assert_eq!(err.code(), "VALIDATION_ERROR");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{models::Authentication, transport::NetworkError};

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, XenditError>;

/// Message delivered when card data fails validation on the interactive surface.
///
/// The surface reports this exact string as its completion payload.
pub const VALIDATION_ERROR_MESSAGE: &str = "Card data is invalid, please check and try again";

/// Message delivered when the tokenizer could not process the card.
///
/// The surface reports this exact string as its completion payload.
pub const TOKENIZATION_ERROR_MESSAGE: &str = "We encountered an issue processing your card";

/// Taxonomy of failures surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Card data failed a local validity check.
    Validation,
    /// No network connectivity was available for a leg.
    Connection,
    /// A network leg failed at the transport or API level.
    Network,
    /// The third-party card tokenizer rejected the card.
    Tokenization,
    /// The server answered with something that could not be understood.
    Server,
    /// The step-up authentication finished without being verified.
    AuthenticationFailed,
    /// The step-up authentication was not completed in time.
    Timeout,
    /// The step-up authentication was cancelled by the host.
    Cancelled,
    /// The client configuration is invalid.
    Configuration,
}

impl ErrorKind {
    /// Default machine code for this kind.
    #[must_use]
    pub const fn default_code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Connection => "CONNECTION_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::Tokenization => "TOKENIZATION_ERROR",
            Self::Server => "SERVER_ERROR",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::Timeout => "AUTHENTICATION_TIMEOUT",
            Self::Cancelled => "AUTHENTICATION_CANCELLED",
            Self::Configuration => "CONFIGURATION_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_code())
    }
}

/// The single error type delivered to callers.
///
/// `authentication` is populated when a step-up finished unverified, so the
/// caller can inspect the partial record that triggered the failure.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct XenditError {
    kind: ErrorKind,
    code: String,
    message: String,
    status: Option<u16>,
    authentication: Option<Box<Authentication>>,
}

impl XenditError {
    /// Creates an error with the default code for `kind`.
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for constructors"
    )]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.default_code().to_owned(),
            message: message.into(),
            status: None,
            authentication: None,
        }
    }

    /// Card data failed validation.
    #[allow(clippy::impl_trait_in_params, reason = "builder-style constructor")]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// No connectivity before a network leg.
    pub fn connection() -> Self {
        Self::new(ErrorKind::Connection, "No network connection is available")
    }

    /// The tokenizer signaled a failure.
    #[allow(clippy::impl_trait_in_params, reason = "builder-style constructor")]
    pub fn tokenization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Tokenization, message)
    }

    /// Malformed or unexpected server payload.
    #[allow(clippy::impl_trait_in_params, reason = "builder-style constructor")]
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, message)
    }

    /// The step-up finished unverified with a server-reported reason.
    #[allow(clippy::impl_trait_in_params, reason = "builder-style constructor")]
    pub fn authentication_failed(reason: impl Into<String>, authentication: Authentication) -> Self {
        Self::new(ErrorKind::AuthenticationFailed, reason).with_authentication(authentication)
    }

    /// The step-up wait expired.
    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, "Authentication was not completed in time")
    }

    /// The step-up wait was cancelled.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Authentication was cancelled")
    }

    /// Invalid client configuration.
    #[allow(clippy::impl_trait_in_params, reason = "builder-style constructor")]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Overrides the machine code.
    #[allow(clippy::impl_trait_in_params, reason = "builder-style setter")]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Attaches the HTTP status that produced this error.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches the partial authentication that produced this error.
    pub fn with_authentication(mut self, authentication: Authentication) -> Self {
        self.authentication = Some(Box::new(authentication));
        self
    }

    /// Error category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Machine-readable code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, when the error came from an API response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    /// Partial authentication attached to the error, if any.
    #[must_use]
    pub fn authentication(&self) -> Option<&Authentication> {
        self.authentication.as_deref()
    }
}

/// Xendit API error body: `{"error_code": "...", "message": "..."}`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error_code: Option<String>,
    message: Option<String>,
}

/// Card tokenizer error body: `{"responseStatus": {"reason": "...", "message": "..."}}`.
#[derive(Debug, Deserialize)]
struct TokenizerErrorBody {
    #[serde(rename = "responseStatus")]
    response_status: TokenizerStatus,
}

#[derive(Debug, Deserialize)]
struct TokenizerStatus {
    reason: Option<String>,
    message: Option<String>,
}

impl From<NetworkError> for XenditError {
    /// Classifies a failed leg by the shape of its response body.
    ///
    /// Plain text, JSON carrying an API `message`, JSON carrying a tokenizer
    /// `reason`, and malformed JSON each map to a distinct outcome.
    fn from(error: NetworkError) -> Self {
        let NetworkError { status, message, body } = error;

        let classified = match body.as_deref().map(str::trim) {
            None | Some("") => Self::new(ErrorKind::Network, message),
            Some(text) if text.starts_with('{') || text.starts_with('[') => classify_json(text),
            Some(text) => Self::new(ErrorKind::Network, text),
        };

        match status {
            Some(status) => classified.with_status(status),
            None => classified,
        }
    }
}

fn classify_json(text: &str) -> XenditError {
    if let Ok(body) = serde_json::from_str::<TokenizerErrorBody>(text) {
        let TokenizerStatus { reason, message } = body.response_status;
        if let Some(reason) = reason.or(message) {
            return XenditError::tokenization(reason);
        }
    }

    match serde_json::from_str::<ApiErrorBody>(text) {
        Ok(ApiErrorBody { error_code, message: Some(message) }) => {
            let err = XenditError::new(ErrorKind::Network, message);
            match error_code {
                Some(code) => err.with_code(code),
                None => err,
            }
        }
        Ok(_) => XenditError::server("server returned an error without a message"),
        Err(e) => XenditError::server(format!("malformed error payload: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthenticationStatus;

    fn network(status: Option<u16>, body: Option<&str>) -> NetworkError {
        NetworkError {
            status,
            message: "request failed".to_owned(),
            body: body.map(str::to_owned),
        }
    }

    #[test]
    fn test_error_display() {
        let error = XenditError::validation("Card number is invalid");
        assert_eq!(error.to_string(), "VALIDATION_ERROR: Card number is invalid");
    }

    #[test]
    fn test_default_codes() {
        assert_eq!(XenditError::connection().code(), "CONNECTION_ERROR");
        assert_eq!(XenditError::timeout().code(), "AUTHENTICATION_TIMEOUT");
        assert_eq!(XenditError::cancelled().kind(), ErrorKind::Cancelled);
        assert_eq!(XenditError::server("x").code(), "SERVER_ERROR");
    }

    #[test]
    fn test_authentication_failed_keeps_partial_record() {
        let auth = Authentication::new("auth_1", AuthenticationStatus::Failed);
        let error = XenditError::authentication_failed("insufficient_funds", auth.clone());
        assert_eq!(error.message(), "insufficient_funds");
        assert_eq!(error.authentication(), Some(&auth));
    }

    #[test]
    fn test_transport_failure_without_body() {
        let error = XenditError::from(network(None, None));
        assert_eq!(error.kind(), ErrorKind::Network);
        assert_eq!(error.message(), "request failed");
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_api_json_error_keeps_server_code() {
        let body = r#"{"error_code":"API_VALIDATION_ERROR","message":"amount is required"}"#;
        let error = XenditError::from(network(Some(400), Some(body)));
        assert_eq!(error.kind(), ErrorKind::Network);
        assert_eq!(error.code(), "API_VALIDATION_ERROR");
        assert_eq!(error.message(), "amount is required");
        assert_eq!(error.status(), Some(400));
    }

    #[test]
    fn test_tokenizer_reason_is_tokenization_error() {
        let body = r#"{"responseStatus":{"status":400,"reason":"VALIDATION_ERROR","message":"bad"}}"#;
        let error = XenditError::from(network(Some(400), Some(body)));
        assert_eq!(error.kind(), ErrorKind::Tokenization);
        assert_eq!(error.message(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_plain_text_body() {
        let error = XenditError::from(network(Some(502), Some("Bad Gateway")));
        assert_eq!(error.kind(), ErrorKind::Network);
        assert_eq!(error.message(), "Bad Gateway");
    }

    #[test]
    fn test_malformed_json_is_server_error() {
        let error = XenditError::from(network(Some(500), Some("{\"error_code\": ")));
        assert_eq!(error.kind(), ErrorKind::Server);
        assert_eq!(error.status(), Some(500));
    }

    #[test]
    fn test_json_without_message_is_server_error() {
        let error = XenditError::from(network(Some(500), Some(r#"{"unexpected":true}"#)));
        assert_eq!(error.kind(), ErrorKind::Server);
    }
}
