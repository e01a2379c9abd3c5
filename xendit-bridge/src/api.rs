//! REST legs of the tokenization flow.
//!
//! [`XenditApi`] issues the four calls the flow needs:
//!
//! | Leg | Call |
//! |---|---|
//! | configuration | `GET {api}/credit_card_tokenization_configuration` |
//! | tokenize | `POST {flex}/cybersource/flex/v1/tokens?apikey={key}` |
//! | token | `POST {api}/credit_card_tokens` |
//! | authentication | `POST {api}/credit_card_tokens/{id}/authentications` |
//!
//! Calls to the Xendit API carry `Authorization: Basic base64(key + ":")`;
//! the tokenizer call is authenticated by its query key. Connectivity is
//! checked before every leg, and a failed leg is never retried.

use std::{fmt, sync::Arc};

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    environment::{Environment, basic_authorization},
    error::{Result, XenditError},
    models::{Authentication, Card, TokenConfiguration, TokenCreditCard},
    transport::{ApiRequest, Connectivity, Transport},
    validator::CardType,
};

/// Client for the Xendit and tokenizer endpoints.
pub struct XenditApi<T> {
    transport: T,
    connectivity: Arc<dyn Connectivity>,
    api_base_url: Url,
    authorization: String,
    environment: Environment,
}

impl<T: Transport> XenditApi<T> {
    /// Creates an API client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `api_base_url` is not an absolute
    /// HTTPS URL or the publishable key is empty.
    pub fn new(
        transport: T,
        connectivity: Arc<dyn Connectivity>,
        api_base_url: &str,
        publishable_key: &str,
    ) -> Result<Self> {
        if publishable_key.trim().is_empty() {
            return Err(XenditError::configuration("publishable key must not be empty"));
        }
        let api_base_url = Url::parse(api_base_url)
            .map_err(|e| XenditError::configuration(format!("invalid api_base_url: {e}")))?;
        if api_base_url.scheme() != "https" || api_base_url.cannot_be_a_base() {
            return Err(XenditError::configuration("api_base_url must be an https URL"));
        }

        Ok(Self {
            transport,
            connectivity,
            api_base_url,
            authorization: basic_authorization(publishable_key),
            environment: Environment::from_publishable_key(publishable_key),
        })
    }

    /// Environment selected from the publishable key.
    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.environment
    }

    /// Underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches the tokenization configuration for this key.
    ///
    /// # Errors
    ///
    /// Returns a connection error when offline, or the classified error of
    /// the failed call.
    #[instrument(skip(self), fields(leg = "configuration"))]
    pub async fn fetch_configuration(&self) -> Result<TokenConfiguration> {
        let url = self.endpoint(&["credit_card_tokenization_configuration"])?;
        let request = ApiRequest::get(url).header("Authorization", &self.authorization);
        self.send(request).await
    }

    /// Exchanges raw card data for a single-use card token.
    ///
    /// `card_type` is omitted from the request when `None`.
    ///
    /// # Errors
    ///
    /// Returns a connection error when offline, a server error if the
    /// configuration holds an unusable tokenizer URL, or the classified error
    /// of the failed call.
    #[instrument(skip(self, config, card), fields(leg = "tokenize", environment = ?self.environment))]
    pub async fn tokenize_card(
        &self,
        config: &TokenConfiguration,
        card: &Card,
        card_type: Option<CardType>,
    ) -> Result<TokenCreditCard> {
        let url = tokenizer_url(self.environment.flex_base_url(config), &config.flex_api_key)?;

        let mut card_info = json!({
            "cardNumber": card.number(),
            "cardExpirationMonth": card.exp_month(),
            "cardExpirationYear": card.exp_year(),
        });
        if let Some(card_type) = card_type {
            card_info["cardType"] = json!(card_type.card_type_key());
        }
        let body = json!({
            "keyId": config.tokenization_auth_key_id,
            "cardInfo": card_info,
        });

        self.send(ApiRequest::post(url, body)).await
    }

    /// Exchanges a card token for a token with its authentication.
    ///
    /// The card token is consumed. `amount` is only sent for single-use
    /// tokens, and `card_cvn` only when a CVN is given.
    ///
    /// # Errors
    ///
    /// Returns a connection error when offline, or the classified error of
    /// the failed call.
    #[instrument(skip(self, card_token, cvn), fields(leg = "token"))]
    pub async fn create_credit_card_token(
        &self,
        card_token: TokenCreditCard,
        cvn: Option<&str>,
        amount: u64,
        should_authenticate: bool,
        is_multiple_use: bool,
    ) -> Result<Authentication> {
        let url = self.endpoint(&["credit_card_tokens"])?;

        let mut body = json!({
            "is_authentication_bundled": !is_multiple_use,
            "should_authenticate": should_authenticate,
            "credit_card_token": card_token.token,
        });
        if let Some(cvn) = cvn {
            body["card_cvn"] = json!(cvn);
        }
        if !is_multiple_use {
            body["amount"] = json!(amount);
        }

        let request = ApiRequest::post(url, body).header("Authorization", &self.authorization);
        self.send(request).await
    }

    /// Creates an authentication for an existing multiple-use token.
    ///
    /// # Errors
    ///
    /// Returns a connection error when offline, or the classified error of
    /// the failed call.
    #[instrument(skip(self), fields(leg = "authentication"))]
    pub async fn create_authentication(&self, token_id: &str, amount: u64) -> Result<Authentication> {
        let url = self.endpoint(&["credit_card_tokens", token_id, "authentications"])?;
        let request = ApiRequest::post(url, json!({ "amount": amount }))
            .header("Authorization", &self.authorization);
        self.send(request).await
    }

    async fn send<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R> {
        if !self.connectivity.is_connected() {
            debug!("no connectivity, request not sent");
            return Err(XenditError::connection());
        }

        let response = self.transport.execute(request).await?;
        debug!(status = response.status, protocol = self.transport.protocol_name(), "leg completed");
        response.json()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<String> {
        let mut url = self.api_base_url.clone();
        url.path_segments_mut()
            .map_err(|()| XenditError::configuration("api_base_url cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }
}

fn tokenizer_url(flex_base_url: &str, api_key: &str) -> Result<String> {
    let mut url = Url::parse(flex_base_url)
        .map_err(|e| XenditError::server(format!("invalid tokenizer url in configuration: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| XenditError::server("invalid tokenizer url in configuration"))?
        .pop_if_empty()
        .extend(["cybersource", "flex", "v1", "tokens"]);
    url.query_pairs_mut().append_pair("apikey", api_key);
    Ok(url.into())
}

impl<T: fmt::Debug> fmt::Debug for XenditApi<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XenditApi")
            .field("transport", &self.transport)
            .field("api_base_url", &self.api_base_url.as_str())
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}
