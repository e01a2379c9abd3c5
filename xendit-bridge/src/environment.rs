//! Environment selection and credential encoding.
//!
//! Both functions here depend only on the publishable key string.

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::models::TokenConfiguration;

/// Target environment of a publishable key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    /// Live keys.
    Production,
    /// Development keys.
    Sandbox,
}

impl Environment {
    /// Selects the environment from the publishable key.
    ///
    /// A key containing `PRODUCTION` in any letter case is a production key;
    /// every other key is treated as sandbox.
    ///
    /// # Examples
    ///
    /// ```
    /// use xendit_bridge::environment::Environment;
    ///
    /// assert_eq!(
    ///     Environment::from_publishable_key("xnd_public_production_abc"),
    ///     Environment::Production
    /// );
    /// assert_eq!(
    ///     Environment::from_publishable_key("xnd_public_development_abc"),
    ///     Environment::Sandbox
    /// );
    /// ```
    #[must_use]
    pub fn from_publishable_key(publishable_key: &str) -> Self {
        if publishable_key.to_ascii_uppercase().contains("PRODUCTION") {
            Self::Production
        } else {
            Self::Sandbox
        }
    }

    /// Tokenizer base URL for this environment.
    #[must_use]
    pub fn flex_base_url(self, config: &TokenConfiguration) -> &str {
        match self {
            Self::Production => &config.flex_production_url,
            Self::Sandbox => &config.flex_development_url,
        }
    }
}

/// Builds the `Authorization` header value for a publishable key.
///
/// The key is used as the Basic username with an empty password.
///
/// # Examples
///
/// ```
/// use xendit_bridge::environment::basic_authorization;
///
/// assert_eq!(basic_authorization("key"), "Basic a2V5Og==");
/// ```
#[must_use]
pub fn basic_authorization(publishable_key: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{publishable_key}:")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_is_case_insensitive() {
        assert_eq!(Environment::from_publishable_key("XND_PUBLIC_PRODUCTION_x"), Environment::Production);
        assert_eq!(Environment::from_publishable_key("xnd_public_Production_x"), Environment::Production);
        assert_eq!(Environment::from_publishable_key("xnd_public_development_x"), Environment::Sandbox);
        assert_eq!(Environment::from_publishable_key(""), Environment::Sandbox);
    }

    #[test]
    fn test_flex_base_url_selection() {
        let config = TokenConfiguration {
            flex_production_url: "https://flex.example.com".to_owned(),
            flex_development_url: "https://testflex.example.com".to_owned(),
            flex_api_key: "key".to_owned(),
            tokenization_auth_key_id: "kid".to_owned(),
        };
        assert_eq!(Environment::Production.flex_base_url(&config), "https://flex.example.com");
        assert_eq!(Environment::Sandbox.flex_base_url(&config), "https://testflex.example.com");
    }

    #[test]
    fn test_basic_authorization_has_no_newlines() {
        let header = basic_authorization("xnd_public_development_a_rather_long_key_that_would_wrap");
        assert!(header.starts_with("Basic "));
        assert!(!header.contains('\n'));
    }
}
