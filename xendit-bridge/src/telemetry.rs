//! Injected audit telemetry for the tokenization flow.
//!
//! Every component that reports progress receives an [`AuditSink`] at
//! construction; there is no process-wide logger. [`TracingAuditSink`] writes
//! events to `tracing` under the `audit` target, and [`MemoryAuditSink`]
//! keeps them in memory for assertions.
//!
//! # Examples
//!
//! ```
//! use xendit_bridge::telemetry::{AuditEvent, AuditEventType, AuditSink, MemoryAuditSink};
//! use uuid::Uuid;
//!
//! let sink = MemoryAuditSink::new();
//! sink.record(&AuditEvent::new(AuditEventType::TokenRequested, Uuid::new_v4()).with_card_suffix("1111"));
//! assert_eq!(sink.events().len(), 1);
//! ```

use std::{
    fmt,
    sync::{Mutex, PoisonError},
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::XenditError;

/// Types of auditable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// A token request passed validation and is about to hit the network.
    TokenRequested,
    /// An authentication for an existing token was requested.
    AuthenticationRequested,
    /// Card data was rejected locally.
    ValidationFailed,
    /// Tokenization configuration was fetched.
    ConfigurationFetched,
    /// The card tokenizer issued a card token.
    CardTokenized,
    /// The server created an authentication record.
    AuthenticationCreated,
    /// The interactive step-up surface was launched.
    StepUpLaunched,
    /// The step-up wait finished, successfully or not.
    StepUpCompleted,
    /// The request finished with a result.
    RequestSucceeded,
    /// The request finished with an error.
    RequestFailed,
}

/// Contextual details of an audit event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDetails {
    /// Last four digits of the card, never the full number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_suffix: Option<String>,
    /// Step-up correlation id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    /// Authentication status reported by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Error message, redacted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Duration of the leg in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred.
    pub timestamp: SystemTime,
    /// What happened.
    pub event_type: AuditEventType,
    /// Id of the logical request the event belongs to.
    pub request_id: Uuid,
    /// Event details.
    pub details: AuditDetails,
}

impl AuditEvent {
    /// Creates a new audit event with empty details.
    #[must_use]
    pub fn new(event_type: AuditEventType, request_id: Uuid) -> Self {
        Self { timestamp: SystemTime::now(), event_type, request_id, details: AuditDetails::default() }
    }

    /// Adds the masked card suffix.
    #[must_use]
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for builder methods")]
    pub fn with_card_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.details.card_suffix = Some(suffix.into());
        self
    }

    /// Adds the step-up correlation id.
    #[must_use]
    pub const fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.details.correlation_id = Some(correlation_id);
        self
    }

    /// Adds the authentication status.
    #[must_use]
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for builder methods")]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.details.status = Some(status.into());
        self
    }

    /// Adds the code and redacted message of an error.
    #[must_use]
    pub fn with_error(mut self, error: &XenditError) -> Self {
        self.details.error_code = Some(error.code().to_owned());
        self.details.error = Some(redact_sensitive(error.message()));
        self
    }

    /// Adds the leg duration.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "duration in ms fits u64 for practical values"
    )]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.details.duration_ms = Some(duration.as_millis() as u64);
        self
    }
}

/// Receives audit events.
///
/// Implementations must not block; events are recorded inline on the
/// request path.
pub trait AuditSink: Send + Sync + fmt::Debug {
    /// Records one event.
    fn record(&self, event: &AuditEvent);
}

/// Writes events to `tracing` with target `audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        audit_log(event);
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events in order.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Recorded event types in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<AuditEventType> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|event| event.event_type)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
    }
}

/// Logs an audit event to tracing with target `audit`.
///
/// Audit logs use a dedicated target so they can be filtered and routed
/// separately from diagnostics.
pub fn audit_log(event: &AuditEvent) {
    tracing::info!(
        target: "audit",
        timestamp = ?event.timestamp,
        event_type = ?event.event_type,
        request_id = %event.request_id,
        details = ?event.details,
        "AUDIT"
    );
}

/// Redacts card data from free text.
///
/// - Runs of 13 to 19 digits, optionally grouped by single spaces or
///   dashes, become `****` followed by the last four digits.
/// - 3 or 4 digits following a `cvn`, `cvv` or `cvc` keyword become `XXX`.
///
/// # Examples
///
/// ```
/// use xendit_bridge::telemetry::redact_sensitive;
///
/// assert_eq!(redact_sensitive("card 4111 1111 1111 1111 declined"), "card ****1111 declined");
/// assert_eq!(redact_sensitive("card_cvn: 123"), "card_cvn: XXX");
/// ```
#[must_use]
pub fn redact_sensitive(input: &str) -> String {
    redact_cvn(&redact_pan(input))
}

fn redact_pan(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        // Extend over digits separated by at most one space or dash.
        let start = i;
        let mut end = i;
        let mut digits = Vec::new();
        while end < chars.len() {
            if chars[end].is_ascii_digit() {
                digits.push(chars[end]);
                end += 1;
            } else if matches!(chars[end], ' ' | '-')
                && chars.get(end + 1).is_some_and(char::is_ascii_digit)
            {
                end += 1;
            } else {
                break;
            }
        }

        if (13..=19).contains(&digits.len()) {
            out.push_str("****");
            out.extend(&digits[digits.len() - 4..]);
        } else {
            out.extend(&chars[start..end]);
        }
        i = end;
    }
    out
}

#[allow(
    clippy::string_slice,
    reason = "indices come from ASCII keyword and digit matches"
)]
fn redact_cvn(input: &str) -> String {
    const KEYWORDS: [&str; 3] = ["cvn", "cvv", "cvc"];

    let lower = input.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    let mut copied = 0;
    let mut search = 0;

    while let Some(offset) = KEYWORDS
        .iter()
        .filter_map(|keyword| lower[search..].find(keyword))
        .min()
    {
        let keyword_end = search + offset + 3;
        let separator_len = lower[keyword_end..]
            .bytes()
            .take_while(|b| matches!(b, b':' | b'=' | b' ' | b'"' | b'\''))
            .count();
        let digits_start = keyword_end + separator_len;
        let digit_len = lower[digits_start..].bytes().take_while(u8::is_ascii_digit).count();

        if (3..=4).contains(&digit_len) {
            out.push_str(&input[copied..digits_start]);
            out.push_str("XXX");
            copied = digits_start + digit_len;
        }
        search = (digits_start + digit_len).max(keyword_end);
    }

    out.push_str(&input[copied..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::XenditError;

    #[test]
    fn test_redact_pan_variants() {
        assert_eq!(redact_sensitive("4111111111111111"), "****1111");
        assert_eq!(redact_sensitive("Card: 4111-1111-1111-1111."), "Card: ****1111.");
        assert_eq!(redact_sensitive("amex 378282246310005 ok"), "amex ****0005 ok");
    }

    #[test]
    fn test_redact_preserves_safe_numbers() {
        let input = "Order 12345, amount 1000, date 2026-10-19";
        assert_eq!(redact_sensitive(input), input);
    }

    #[test]
    fn test_redact_cvn_variants() {
        assert_eq!(redact_sensitive(r#"{"card_cvn":"123"}"#), r#"{"card_cvn":"XXX"}"#);
        assert_eq!(redact_sensitive("CVV=4567 rejected"), "CVV=XXX rejected");
        assert_eq!(redact_sensitive("cvc 12"), "cvc 12");
    }

    #[test]
    fn test_redact_empty_and_unicode() {
        assert_eq!(redact_sensitive(""), "");
        assert_eq!(redact_sensitive("kartu ditolak ✓"), "kartu ditolak ✓");
    }

    #[test]
    fn test_event_with_error_is_redacted() {
        let error = XenditError::server("bad card 4111111111111111");
        let event = AuditEvent::new(AuditEventType::RequestFailed, Uuid::new_v4()).with_error(&error);
        assert_eq!(event.details.error_code.as_deref(), Some("SERVER_ERROR"));
        assert_eq!(event.details.error.as_deref(), Some("bad card ****1111"));
    }

    #[test]
    fn test_event_builder() {
        let request_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let event = AuditEvent::new(AuditEventType::StepUpLaunched, request_id)
            .with_card_suffix("1111")
            .with_correlation_id(correlation_id)
            .with_status("PENDING")
            .with_duration(Duration::from_millis(1500));

        assert_eq!(event.request_id, request_id);
        assert_eq!(event.details.correlation_id, Some(correlation_id));
        assert_eq!(event.details.duration_ms, Some(1500));
    }

    #[test]
    fn test_event_serialization() {
        let event = AuditEvent::new(AuditEventType::CardTokenized, Uuid::new_v4()).with_card_suffix("1111");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("card_tokenized"));
        assert!(json.contains("1111"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemoryAuditSink::new();
        let id = Uuid::new_v4();
        sink.record(&AuditEvent::new(AuditEventType::TokenRequested, id));
        sink.record(&AuditEvent::new(AuditEventType::RequestSucceeded, id));
        assert_eq!(
            sink.event_types(),
            vec![AuditEventType::TokenRequested, AuditEventType::RequestSucceeded]
        );
    }
}
