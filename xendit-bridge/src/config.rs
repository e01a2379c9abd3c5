//! Client configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! publishable_key_env = "XENDIT_PUBLISHABLE_KEY"
//! api_base_url = "https://api.xendit.co"
//!
//! [http]
//! timeout_secs = 30
//!
//! [step_up]
//! timeout_secs = 600
//! ```

use std::{fmt, path::Path, time::Duration};

use serde::Deserialize;
use url::Url;

use crate::{
    error::{Result, XenditError},
    transport::HttpConfig,
};

/// Default Xendit API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.xendit.co";

/// Environment variable consulted when no inline key is configured.
pub const DEFAULT_PUBLISHABLE_KEY_ENV: &str = "XENDIT_PUBLISHABLE_KEY";

/// Top-level client configuration.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Inline publishable key. Prefer the environment variable.
    #[serde(default)]
    pub publishable_key: Option<String>,

    /// Environment variable holding the publishable key.
    #[serde(default = "default_publishable_key_env")]
    pub publishable_key_env: String,

    /// Xendit API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// HTTP transport settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Step-up settings.
    #[serde(default)]
    pub step_up: StepUpConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            publishable_key: None,
            publishable_key_env: default_publishable_key_env(),
            api_base_url: default_api_base_url(),
            http: HttpConfig::default(),
            step_up: StepUpConfig::default(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("publishable_key", &self.publishable_key.as_ref().map(|_| "[REDACTED]"))
            .field("publishable_key_env", &self.publishable_key_env)
            .field("api_base_url", &self.api_base_url)
            .field("http", &self.http)
            .field("step_up", &self.step_up)
            .finish()
    }
}

impl ClientConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the TOML is malformed or fails
    /// [`validate`](Self::validate).
    ///
    /// # Examples
    ///
    /// ```
    /// use xendit_bridge::config::ClientConfig;
    ///
    /// let config = ClientConfig::from_toml("[step_up]\ntimeout_secs = 120").unwrap();
    /// assert_eq!(config.step_up.timeout().as_secs(), 120);
    /// assert_eq!(config.api_base_url, "https://api.xendit.co");
    /// ```
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| XenditError::configuration(format!("invalid TOML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| XenditError::configuration(format!("cannot read config file: {e}")))?;
        Self::from_toml(&content)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_base_url)
            .map_err(|e| XenditError::configuration(format!("invalid api_base_url: {e}")))?;
        if url.scheme() != "https" {
            return Err(XenditError::configuration("api_base_url must use https"));
        }
        if let Some(key) = &self.publishable_key
            && key.trim().is_empty()
        {
            return Err(XenditError::configuration("publishable_key must not be empty"));
        }
        validate_env_var_name(&self.publishable_key_env)?;
        self.http.validate()?;
        self.step_up.validate()
    }

    /// Returns the publishable key, falling back to the environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if neither source provides a key.
    pub fn resolve_publishable_key(&self) -> Result<String> {
        self.resolve_publishable_key_with(|name| std::env::var(name).ok())
    }

    /// Like [`resolve_publishable_key`](Self::resolve_publishable_key) with
    /// a custom variable lookup.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if neither source provides a key.
    pub fn resolve_publishable_key_with<F>(&self, lookup: F) -> Result<String>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        if let Some(key) = &self.publishable_key {
            return Ok(key.clone());
        }
        match lookup(&self.publishable_key_env) {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(XenditError::configuration(format!(
                "no publishable key configured and {} is not set",
                self.publishable_key_env
            ))),
        }
    }
}

/// Step-up wait settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepUpConfig {
    /// Seconds to wait for the step-up notification.
    #[serde(default = "default_step_up_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StepUpConfig {
    fn default() -> Self {
        Self { timeout_secs: default_step_up_timeout_secs() }
    }
}

impl StepUpConfig {
    /// Validates the timeout.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `timeout_secs` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(XenditError::configuration("step_up.timeout_secs must be at least 1"));
        }
        Ok(())
    }

    /// Timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_publishable_key_env() -> String {
    DEFAULT_PUBLISHABLE_KEY_ENV.to_owned()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_owned()
}

const fn default_step_up_timeout_secs() -> u64 {
    600
}

/// Validates an environment variable name.
fn validate_env_var_name(name: &str) -> Result<()> {
    let Some(first) = name.chars().next() else {
        return Err(XenditError::configuration("environment variable name cannot be empty"));
    };
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(XenditError::configuration(format!(
            "environment variable name must start with letter or underscore: {name}"
        )));
    }
    if let Some(ch) = name.chars().find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_') {
        return Err(XenditError::configuration(format!(
            "environment variable name contains invalid character '{ch}': {name}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, transport::HttpVersion};

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_toml("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.publishable_key_env, "XENDIT_PUBLISHABLE_KEY");
        assert_eq!(config.step_up.timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_full_document() {
        let toml = r#"
            publishable_key = "xnd_public_development_abc"
            api_base_url = "https://api.example.com/v2"

            [http]
            timeout_secs = 45
            http_version = "http1"

            [step_up]
            timeout_secs = 90
        "#;
        let config = ClientConfig::from_toml(toml).unwrap();
        assert_eq!(config.http.timeout_secs, 45);
        assert_eq!(config.http.http_version, HttpVersion::Http1);
        assert_eq!(config.step_up.timeout_secs, 90);
        assert_eq!(config.resolve_publishable_key_with(|_| None).unwrap(), "xnd_public_development_abc");
    }

    #[test]
    fn test_invalid_values() {
        for toml in [
            "api_base_url = \"http://api.xendit.co\"",
            "api_base_url = \"nope\"",
            "publishable_key = \"  \"",
            "publishable_key_env = \"1BAD\"",
            "publishable_key_env = \"BAD-NAME\"",
            "[step_up]\ntimeout_secs = 0",
            "[http]\ntimeout_secs = 0",
            "unknown = 1",
            "invalid toml {{{",
        ] {
            let err = ClientConfig::from_toml(toml).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{toml}");
        }
    }

    #[test]
    fn test_resolve_from_environment() {
        let config = ClientConfig { publishable_key_env: "MY_KEY".to_owned(), ..Default::default() };
        let key = config
            .resolve_publishable_key_with(|name| (name == "MY_KEY").then(|| "xnd_public_x".to_owned()))
            .unwrap();
        assert_eq!(key, "xnd_public_x");

        let err = config.resolve_publishable_key_with(|_| Some(String::new())).unwrap_err();
        assert!(err.message().contains("MY_KEY"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ClientConfig { publishable_key: Some("xnd_secret".to_owned()), ..Default::default() };
        assert!(!format!("{config:?}").contains("xnd_secret"));
    }

    #[test]
    fn test_from_file_missing() {
        let err = ClientConfig::from_file("/nonexistent/xendit.toml").unwrap_err();
        assert!(err.message().contains("cannot read config file"));
    }
}
