//! The `[http]` table of the client configuration.
//!
//! Governs how [`HttpTransport`](super::HttpTransport) talks to the Xendit
//! API and the card tokenizer. Every key is optional:
//!
//! ```toml
//! [http]
//! pool_max_idle_per_host = 10
//! timeout_secs = 30
//! connect_timeout_secs = 10
//! http_version = "auto"
//! ```

use std::{ops::RangeInclusive, time::Duration};

use serde::Deserialize;

use crate::error::{Result, XenditError};

pub(crate) const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const TIMEOUT_RANGE: RangeInclusive<u64> = 1..=300;
const CONNECT_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=60;

/// Connection settings shared by every leg of a token request.
///
/// A single request covers up to three calls, so `timeout_secs` bounds each
/// call on its own, not the whole flow. The step-up wait has its own bound
/// in `[step_up]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Idle keep-alive connections kept per host (API and tokenizer).
    pub pool_max_idle_per_host: usize,
    /// Per-call deadline, 1 to 300 seconds.
    pub timeout_secs: u64,
    /// TCP and TLS handshake deadline, 1 to 60 seconds.
    pub connect_timeout_secs: u64,
    /// Protocol negotiation.
    pub http_version: HttpVersion,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            http_version: HttpVersion::Auto,
        }
    }
}

impl HttpConfig {
    /// Checks both deadlines against their ranges.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending key.
    pub fn validate(&self) -> Result<()> {
        check_range("http.timeout_secs", self.timeout_secs, &TIMEOUT_RANGE)?;
        check_range("http.connect_timeout_secs", self.connect_timeout_secs, &CONNECT_TIMEOUT_RANGE)
    }

    /// Per-call deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Handshake deadline.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn check_range(key: &str, value: u64, range: &RangeInclusive<u64>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(XenditError::configuration(format!(
            "{key} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

/// Which HTTP protocol the transport speaks.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HttpVersion {
    /// HTTP/1.1 only.
    Http1,
    /// HTTP/2 with prior knowledge.
    Http2,
    /// Let TLS ALPN decide.
    #[default]
    Auto,
}

impl HttpVersion {
    /// Name reported in request logs.
    #[must_use]
    pub const fn protocol_name(self) -> &'static str {
        match self {
            Self::Http1 => "http/1.1",
            Self::Http2 => "http/2",
            Self::Auto => "http",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_partial_table_keeps_other_defaults() {
        let config: HttpConfig = toml::from_str("timeout_secs = 45\nhttp_version = \"http2\"").unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(45));
        assert_eq!(config.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.pool_max_idle_per_host, DEFAULT_POOL_MAX_IDLE_PER_HOST);
        assert_eq!(config.http_version.protocol_name(), "http/2");
    }

    #[test]
    fn test_unknown_keys_and_versions_are_rejected() {
        assert!(toml::from_str::<HttpConfig>("retries = 3").is_err());
        assert!(toml::from_str::<HttpConfig>("http_version = \"http3\"").is_err());
    }

    #[test]
    fn test_deadline_bounds() {
        let at_limits = HttpConfig { timeout_secs: 300, connect_timeout_secs: 60, ..Default::default() };
        assert!(at_limits.validate().is_ok());

        for (config, key) in [
            (HttpConfig { timeout_secs: 0, ..Default::default() }, "http.timeout_secs"),
            (HttpConfig { timeout_secs: 301, ..Default::default() }, "http.timeout_secs"),
            (HttpConfig { connect_timeout_secs: 61, ..Default::default() }, "http.connect_timeout_secs"),
        ] {
            let err = config.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
            assert!(err.message().starts_with(key), "{}", err.message());
        }
    }
}
