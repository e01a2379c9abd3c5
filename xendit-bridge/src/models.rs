//! Data model shared by every leg of the tokenization flow.
//!
//! [`Card`] holds raw card data and wipes it on drop. The remaining types are
//! the wire shapes exchanged with the configuration endpoint, the card
//! tokenizer, and the token/authentication endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Raw payment card submitted by the caller.
///
/// Never log the number or CVN. The `Debug` implementation masks both, and
/// the sensitive fields are zeroized when the card is dropped.
///
/// # Examples
///
/// ```
/// use xendit_bridge::models::Card;
///
/// let card = Card::new("4111111111111111", "12", "2030").with_cvn("123");
/// assert_eq!(card.last_four(), "1111");
/// assert!(!format!("{card:?}").contains("4111111111111111"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Card {
    number: String,
    exp_month: String,
    exp_year: String,
    cvn: Option<String>,
    cardholder_name: Option<String>,
}

impl Card {
    /// Creates a card without CVN or cardholder name.
    ///
    /// Spaces and dashes in `number` are removed, so the digits that are
    /// validated are the digits sent to the tokenizer.
    #[must_use]
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for builders")]
    pub fn new(
        number: impl Into<String>,
        exp_month: impl Into<String>,
        exp_year: impl Into<String>,
    ) -> Self {
        let mut raw: String = number.into();
        let number = raw.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
        raw.zeroize();

        Self {
            number,
            exp_month: exp_month.into(),
            exp_year: exp_year.into(),
            cvn: None,
            cardholder_name: None,
        }
    }

    /// Sets the card verification number.
    #[must_use]
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for builders")]
    pub fn with_cvn(mut self, cvn: impl Into<String>) -> Self {
        self.cvn = Some(cvn.into());
        self
    }

    /// Sets the cardholder name.
    #[must_use]
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for builders")]
    pub fn with_cardholder_name(mut self, name: impl Into<String>) -> Self {
        self.cardholder_name = Some(name.into());
        self
    }

    /// Card number (PAN).
    #[must_use]
    pub fn number(&self) -> &str {
        &self.number
    }

    /// Expiry month as entered (e.g. `"12"`).
    #[must_use]
    pub fn exp_month(&self) -> &str {
        &self.exp_month
    }

    /// Expiry year as entered (e.g. `"2030"`).
    #[must_use]
    pub fn exp_year(&self) -> &str {
        &self.exp_year
    }

    /// Card verification number, if supplied.
    #[must_use]
    pub fn cvn(&self) -> Option<&str> {
        self.cvn.as_deref()
    }

    /// Cardholder name, if supplied.
    #[must_use]
    pub fn cardholder_name(&self) -> Option<&str> {
        self.cardholder_name.as_deref()
    }

    /// Last four digits of the card number for display and logging.
    #[must_use]
    #[allow(clippy::string_slice, reason = "card numbers are ASCII digits")]
    pub fn last_four(&self) -> &str {
        if self.number.len() >= 4 && self.number.is_ascii() {
            &self.number[self.number.len() - 4..]
        } else {
            &self.number
        }
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Card")
            .field("number", &format_args!("****{}", self.last_four()))
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cvn", &self.cvn.as_ref().map(|_| "***"))
            .field("cardholder_name", &self.cardholder_name)
            .finish()
    }
}

impl Drop for Card {
    fn drop(&mut self) {
        self.number.zeroize();
        if let Some(cvn) = self.cvn.as_mut() {
            cvn.zeroize();
        }
    }
}

/// Environment-specific tokenization configuration.
///
/// Fetched fresh for every token creation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfiguration {
    /// Tokenizer base URL for production credentials.
    pub flex_production_url: String,
    /// Tokenizer base URL for development credentials.
    pub flex_development_url: String,
    /// API key appended to the tokenizer URL.
    pub flex_api_key: String,
    /// Key id sent in the tokenize body.
    pub tokenization_auth_key_id: String,
}

/// Opaque single-use token issued by the card tokenizer.
///
/// Consumed by value when exchanged for an [`Authentication`], so it cannot
/// be reused afterwards.
#[derive(Debug, PartialEq, Eq, Deserialize)]
pub struct TokenCreditCard {
    /// Tokenizer key id echoed back.
    #[serde(rename = "keyId", default)]
    pub key_id: Option<String>,
    /// The opaque card token.
    pub token: String,
    /// Masked PAN returned by the tokenizer.
    #[serde(rename = "maskedPan", default)]
    pub masked_pan: Option<String>,
    /// Tokenizer brand code.
    #[serde(rename = "cardType", default)]
    pub card_type: Option<String>,
}

/// Status of a server-side authentication.
///
/// Only [`AuthenticationStatus::Verified`] lets a flow finish without step-up.
/// Unknown statuses are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthenticationStatus {
    /// The card was authenticated.
    Verified,
    /// The authentication awaits the cardholder.
    InReview,
    /// The authentication is still being processed.
    Pending,
    /// The authentication failed.
    Failed,
    /// Any other status reported by the server.
    Other(String),
}

impl AuthenticationStatus {
    /// Returns `true` for [`AuthenticationStatus::Verified`].
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }

    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Verified => "VERIFIED",
            Self::InReview => "IN_REVIEW",
            Self::Pending => "PENDING",
            Self::Failed => "FAILED",
            Self::Other(status) => status,
        }
    }
}

impl From<String> for AuthenticationStatus {
    fn from(status: String) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "VERIFIED" => Self::Verified,
            "IN_REVIEW" => Self::InReview,
            "PENDING" => Self::Pending,
            "FAILED" => Self::Failed,
            _ => Self::Other(status),
        }
    }
}

impl From<AuthenticationStatus> for String {
    fn from(status: AuthenticationStatus) -> Self {
        match status {
            AuthenticationStatus::Other(status) => status,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for AuthenticationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side authentication record.
///
/// Returned by token creation and by authentication creation for an existing
/// token. When not verified, `payer_authentication_url` is the payload the
/// interactive surface needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    /// Server-assigned id.
    pub id: String,
    /// Current status.
    pub status: AuthenticationStatus,
    /// Id of the authentication bundled with a token, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_id: Option<String>,
    /// Multiple-use token the authentication belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_card_token_id: Option<String>,
    /// URL of the step-up challenge for the interactive surface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_authentication_url: Option<String>,
    /// Masked card number echoed by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked_card_number: Option<String>,
}

impl Authentication {
    /// Creates a bare authentication record.
    #[must_use]
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for builders")]
    pub fn new(id: impl Into<String>, status: AuthenticationStatus) -> Self {
        Self {
            id: id.into(),
            status,
            authentication_id: None,
            credit_card_token_id: None,
            payer_authentication_url: None,
            masked_card_number: None,
        }
    }

    /// Sets the step-up URL.
    #[must_use]
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for builders")]
    pub fn with_payer_authentication_url(mut self, url: impl Into<String>) -> Self {
        self.payer_authentication_url = Some(url.into());
        self
    }

    /// Returns `true` when no step-up is required.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.status.is_verified()
    }
}

/// Terminal success artifact of a token request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Token id to charge against.
    pub id: String,
    /// Final authentication status.
    pub status: AuthenticationStatus,
    /// Bundled authentication id, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_id: Option<String>,
    /// Masked card number, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked_card_number: Option<String>,
}

impl From<Authentication> for Token {
    fn from(authentication: Authentication) -> Self {
        Self {
            id: authentication.id,
            status: authentication.status,
            authentication_id: authentication.authentication_id,
            masked_card_number: authentication.masked_card_number,
        }
    }
}
