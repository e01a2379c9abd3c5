//! Token and authentication orchestration.
//!
//! [`XenditClient`] sequences validation, configuration fetch, card
//! tokenization and token creation, then either finishes with a verified
//! authentication or hands off to the step-up bridge. Every public flow comes
//! in two flavours: an `async fn` returning [`Result`], and a `*_with_callback`
//! variant that runs on the tokio runtime and reports through a
//! [`TokenCallback`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use xendit_bridge::{
//!     ClientConfig, XenditClientBuilder,
//!     models::Card,
//!     step_up::{StepUpLaunch, StepUpSurface},
//! };
//!
//! struct Browser;
//!
//! impl StepUpSurface for Browser {
//!     fn launch(&self, launch: StepUpLaunch) -> xendit_bridge::error::Result<()> {
//!         println!("open {:?}", launch.authentication.payer_authentication_url);
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> xendit_bridge::error::Result<()> {
//! let config = ClientConfig::from_file("xendit.toml")?;
//! let client = XenditClientBuilder::from_config(&config)?.surface(Arc::new(Browser)).build()?;
//!
//! let card = Card::new("4111111111111111", "12", "2030").with_cvn("123");
//! let token = client.create_single_use_token(card, 1000, true).await?;
//! println!("token {}", token.id);
//! # Ok(())
//! # }
//! ```

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    api::XenditApi,
    completion::{Completion, TokenCallback},
    config::{ClientConfig, DEFAULT_API_BASE_URL},
    error::{ErrorKind, Result, VALIDATION_ERROR_MESSAGE, XenditError},
    models::{Authentication, Card, Token},
    step_up::{DEFAULT_STEP_UP_TIMEOUT, PendingStepUp, StepUpBridge, StepUpNotifier, StepUpSurface},
    telemetry::{AuditEvent, AuditEventType, AuditSink, TracingAuditSink},
    transport::{AlwaysConnected, Connectivity, HttpTransport, Transport},
    validator::{CardType, CardValidator, StandardCardValidator},
};

/// Parameters of a token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    /// Card to tokenize. A request without a card is rejected.
    pub card: Option<Card>,
    /// Amount shown to the cardholder and bound to single-use tokens.
    pub amount: u64,
    /// Whether the server should run a 3-D Secure authentication.
    pub should_authenticate: bool,
    /// Multiple-use tokens carry no amount and no bundled authentication.
    pub is_multiple_use: bool,
}

impl TokenRequest {
    /// Single-use token bound to `amount`.
    #[must_use]
    pub const fn single_use(card: Card, amount: u64, should_authenticate: bool) -> Self {
        Self { card: Some(card), amount, should_authenticate, is_multiple_use: false }
    }

    /// Multiple-use token.
    #[must_use]
    pub const fn multiple_use(card: Card) -> Self {
        Self { card: Some(card), amount: 0, should_authenticate: false, is_multiple_use: true }
    }
}

/// Result of the network legs, before any step-up.
#[derive(Debug)]
pub enum AuthenticationOutcome {
    /// The server verified the authentication; no step-up needed.
    Verified(Authentication),
    /// The cardholder must complete a step-up challenge.
    StepUpRequired(PendingAuthentication),
}

impl AuthenticationOutcome {
    /// Correlation id of the step-up, if one was launched.
    #[must_use]
    pub fn correlation_id(&self) -> Option<Uuid> {
        match self {
            Self::Verified(_) => None,
            Self::StepUpRequired(pending) => Some(pending.correlation_id()),
        }
    }

    /// Waits for the step-up, if any, and returns the verified authentication.
    ///
    /// # Errors
    ///
    /// See [`PendingAuthentication::wait`].
    pub async fn resolve(self) -> Result<Authentication> {
        match self {
            Self::Verified(authentication) => Ok(authentication),
            Self::StepUpRequired(pending) => pending.wait().await,
        }
    }
}

/// An outstanding step-up together with its audit context.
pub struct PendingAuthentication {
    step_up: PendingStepUp,
    request_id: Uuid,
    audit: Arc<dyn AuditSink>,
    started: Instant,
}

impl PendingAuthentication {
    /// Correlation id the surface was launched with.
    #[must_use]
    pub const fn correlation_id(&self) -> Uuid {
        self.step_up.correlation_id()
    }

    /// Cancels the step-up. Returns `false` if it already finished.
    pub fn cancel(&self) -> bool {
        self.step_up.cancel()
    }

    /// Waits for the step-up notification.
    ///
    /// # Errors
    ///
    /// Returns the classified notification error, or a timeout or
    /// cancellation error.
    pub async fn wait(self) -> Result<Authentication> {
        let Self { step_up, request_id, audit, started } = self;
        let correlation_id = step_up.correlation_id();
        let result = step_up.wait().await;

        let mut event = AuditEvent::new(AuditEventType::StepUpCompleted, request_id)
            .with_correlation_id(correlation_id)
            .with_duration(started.elapsed());
        if let Err(error) = &result {
            event = event.with_error(error);
        }
        audit.record(&event);
        record_outcome(audit.as_ref(), request_id, &result);
        result
    }
}

impl fmt::Debug for PendingAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAuthentication")
            .field("step_up", &self.step_up)
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

/// Card tokenization client.
pub struct XenditClient<T> {
    api: XenditApi<T>,
    validator: Arc<dyn CardValidator>,
    audit: Arc<dyn AuditSink>,
    step_up: StepUpBridge,
}

impl<T: Transport> XenditClient<T> {
    /// Starts building a client over `transport`.
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for builders")]
    pub fn builder(transport: T, publishable_key: impl Into<String>) -> XenditClientBuilder<T> {
        XenditClientBuilder::new(transport, publishable_key)
    }

    /// Card validity checks used by every token request.
    #[must_use]
    pub fn validator(&self) -> &dyn CardValidator {
        self.validator.as_ref()
    }

    /// Notification entry point for the step-up surface.
    #[must_use]
    pub const fn notifier(&self) -> &StepUpNotifier {
        self.step_up.notifier()
    }

    /// Cancels an outstanding step-up. Returns `false` if it is not pending.
    pub fn cancel_step_up(&self, correlation_id: Uuid) -> bool {
        self.notifier().cancel(correlation_id)
    }

    /// Underlying API client.
    #[must_use]
    pub const fn api(&self) -> &XenditApi<T> {
        &self.api
    }

    /// Creates a token and waits for any step-up.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any network call, a connection
    /// error when offline, the classified error of a failed leg, or the
    /// step-up error.
    pub async fn create_token(&self, request: TokenRequest) -> Result<Token> {
        self.start_token(request).await?.resolve().await.map(Token::from)
    }

    /// Creates a single-use token bound to `amount`.
    ///
    /// # Errors
    ///
    /// See [`create_token`](Self::create_token).
    pub async fn create_single_use_token(
        &self,
        card: Card,
        amount: u64,
        should_authenticate: bool,
    ) -> Result<Token> {
        self.create_token(TokenRequest::single_use(card, amount, should_authenticate)).await
    }

    /// Creates a multiple-use token.
    ///
    /// # Errors
    ///
    /// See [`create_token`](Self::create_token).
    pub async fn create_multiple_use_token(&self, card: Card) -> Result<Token> {
        self.create_token(TokenRequest::multiple_use(card)).await
    }

    /// Runs the network legs of a token request and launches the step-up
    /// surface if the result is not verified.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any network call, a connection
    /// error when offline, or the classified error of a failed leg.
    #[instrument(skip_all, fields(request_id, amount = request.amount, multiple_use = request.is_multiple_use))]
    pub async fn start_token(&self, request: TokenRequest) -> Result<AuthenticationOutcome> {
        let request_id = Uuid::new_v4();
        tracing::Span::current().record("request_id", tracing::field::display(request_id));

        let Some(card) = request.card.as_ref() else {
            return Err(XenditError::validation("Card is required"));
        };

        let result = self.run_token_legs(request_id, card, &request).await;
        if !matches!(result, Ok(AuthenticationOutcome::StepUpRequired(_))) {
            record_outcome(self.audit.as_ref(), request_id, &result);
        }
        result
    }

    /// Creates an authentication for an existing multiple-use token and
    /// waits for any step-up.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty token id or zero amount, a
    /// connection error when offline, the classified error of the failed
    /// call, or the step-up error.
    pub async fn create_authentication(&self, token_id: &str, amount: u64) -> Result<Authentication> {
        self.start_authentication(token_id, amount).await?.resolve().await
    }

    /// Creates an authentication for an existing token and launches the
    /// step-up surface if it is not verified.
    ///
    /// # Errors
    ///
    /// See [`create_authentication`](Self::create_authentication).
    #[instrument(skip(self), fields(request_id))]
    pub async fn start_authentication(&self, token_id: &str, amount: u64) -> Result<AuthenticationOutcome> {
        let request_id = Uuid::new_v4();
        tracing::Span::current().record("request_id", tracing::field::display(request_id));

        if token_id.trim().is_empty() || amount == 0 {
            let error = XenditError::validation(VALIDATION_ERROR_MESSAGE);
            self.record(AuditEvent::new(AuditEventType::ValidationFailed, request_id).with_error(&error));
            return Err(error);
        }
        self.record(AuditEvent::new(AuditEventType::AuthenticationRequested, request_id));

        let started = Instant::now();
        let result = match self.api.create_authentication(token_id, amount).await {
            Ok(authentication) => {
                self.record_created(request_id, &authentication, started.elapsed());
                self.branch(request_id, authentication, started)
            }
            Err(error) => Err(error),
        };
        if !matches!(result, Ok(AuthenticationOutcome::StepUpRequired(_))) {
            record_outcome(self.audit.as_ref(), request_id, &result);
        }
        result
    }

    async fn run_token_legs(
        &self,
        request_id: Uuid,
        card: &Card,
        request: &TokenRequest,
    ) -> Result<AuthenticationOutcome> {
        let card_type = self.validate_card(card).inspect_err(|error| {
            self.record(AuditEvent::new(AuditEventType::ValidationFailed, request_id).with_error(error));
        })?;
        self.record(AuditEvent::new(AuditEventType::TokenRequested, request_id).with_card_suffix(card.last_four()));

        let started = Instant::now();
        let config = self.api.fetch_configuration().await?;
        self.record(
            AuditEvent::new(AuditEventType::ConfigurationFetched, request_id).with_duration(started.elapsed()),
        );

        let leg_started = Instant::now();
        let tokenized = self.api.tokenize_card(&config, card, card_type).await;
        let card_token = match (tokenized, card_type) {
            (Err(error), _) if error.kind() == ErrorKind::Connection => return Err(error),
            (_, None) => {
                warn!("card brand not recognized, tokenizer result discarded");
                return Err(XenditError::server("unrecognized card type"));
            }
            (result, Some(_)) => result?,
        };
        self.record(
            AuditEvent::new(AuditEventType::CardTokenized, request_id)
                .with_card_suffix(card.last_four())
                .with_duration(leg_started.elapsed()),
        );

        let leg_started = Instant::now();
        let authentication = self
            .api
            .create_credit_card_token(
                card_token,
                card.cvn(),
                request.amount,
                request.should_authenticate,
                request.is_multiple_use,
            )
            .await?;
        self.record_created(request_id, &authentication, leg_started.elapsed());

        self.branch(request_id, authentication, started)
    }

    /// Checks the card in a fixed order and returns its brand.
    fn validate_card(&self, card: &Card) -> Result<Option<CardType>> {
        let validator = self.validator.as_ref();
        if !validator.is_card_number_valid(card.number()) {
            return Err(XenditError::validation("Card number is invalid"));
        }
        if !validator.is_expiry_valid(card.exp_month(), card.exp_year()) {
            return Err(XenditError::validation("Card expiration date is invalid"));
        }
        if let Some(cvn) = card.cvn() {
            if !validator.is_cvn_valid(cvn) {
                return Err(XenditError::validation("Card CVN is invalid"));
            }
            if !validator.is_cvn_valid_for_card_type(cvn, card.number()) {
                return Err(XenditError::validation("Card CVN is invalid for this card type"));
            }
        }
        Ok(validator.card_type(card.number()))
    }

    fn branch(
        &self,
        request_id: Uuid,
        authentication: Authentication,
        started: Instant,
    ) -> Result<AuthenticationOutcome> {
        if authentication.is_verified() {
            debug!(authentication_id = %authentication.id, "verified without step-up");
            return Ok(AuthenticationOutcome::Verified(authentication));
        }

        info!(authentication_id = %authentication.id, status = %authentication.status, "step-up required");
        let step_up = self.step_up.launch(authentication)?;
        self.record(
            AuditEvent::new(AuditEventType::StepUpLaunched, request_id)
                .with_correlation_id(step_up.correlation_id()),
        );

        Ok(AuthenticationOutcome::StepUpRequired(PendingAuthentication {
            step_up,
            request_id,
            audit: Arc::clone(&self.audit),
            started,
        }))
    }

    fn record_created(&self, request_id: Uuid, authentication: &Authentication, elapsed: Duration) {
        self.record(
            AuditEvent::new(AuditEventType::AuthenticationCreated, request_id)
                .with_status(authentication.status.as_str())
                .with_duration(elapsed),
        );
    }

    fn record(&self, event: AuditEvent) {
        self.audit.record(&event);
    }
}

impl<T: Transport + 'static> XenditClient<T> {
    /// Callback flavour of [`create_token`](Self::create_token).
    ///
    /// # Errors
    ///
    /// Returns an error without touching `callback` if the request has no
    /// card or no tokio runtime is running.
    pub fn create_token_with_callback<C>(self: &Arc<Self>, request: TokenRequest, callback: C) -> Result<()>
    where
        C: TokenCallback<Token> + 'static,
    {
        if request.card.is_none() {
            return Err(XenditError::validation("Card is required"));
        }
        let client = Arc::clone(self);
        spawn_with_callback(async move { client.create_token(request).await }, callback)
    }

    /// Callback flavour of [`create_single_use_token`](Self::create_single_use_token).
    ///
    /// # Errors
    ///
    /// Returns an error without touching `callback` if no tokio runtime is
    /// running.
    pub fn create_single_use_token_with_callback<C>(
        self: &Arc<Self>,
        card: Card,
        amount: u64,
        should_authenticate: bool,
        callback: C,
    ) -> Result<()>
    where
        C: TokenCallback<Token> + 'static,
    {
        self.create_token_with_callback(TokenRequest::single_use(card, amount, should_authenticate), callback)
    }

    /// Callback flavour of [`create_multiple_use_token`](Self::create_multiple_use_token).
    ///
    /// # Errors
    ///
    /// Returns an error without touching `callback` if no tokio runtime is
    /// running.
    pub fn create_multiple_use_token_with_callback<C>(self: &Arc<Self>, card: Card, callback: C) -> Result<()>
    where
        C: TokenCallback<Token> + 'static,
    {
        self.create_token_with_callback(TokenRequest::multiple_use(card), callback)
    }

    /// Callback flavour of [`create_authentication`](Self::create_authentication).
    ///
    /// # Errors
    ///
    /// Returns an error without touching `callback` if no tokio runtime is
    /// running.
    pub fn create_authentication_with_callback<C>(
        self: &Arc<Self>,
        token_id: &str,
        amount: u64,
        callback: C,
    ) -> Result<()>
    where
        C: TokenCallback<Authentication> + 'static,
    {
        let client = Arc::clone(self);
        let token_id = token_id.to_owned();
        spawn_with_callback(async move { client.create_authentication(&token_id, amount).await }, callback)
    }
}

fn spawn_with_callback<R, F, C>(future: F, callback: C) -> Result<()>
where
    R: Send + 'static,
    F: Future<Output = Result<R>> + Send + 'static,
    C: TokenCallback<R> + 'static,
{
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| XenditError::configuration(format!("callback APIs need a tokio runtime: {e}")))?;
    let completion = Completion::new(callback);
    runtime.spawn(async move {
        completion.complete(future.await);
    });
    Ok(())
}

fn record_outcome<R>(audit: &dyn AuditSink, request_id: Uuid, result: &Result<R>) {
    let event = match result {
        Ok(_) => AuditEvent::new(AuditEventType::RequestSucceeded, request_id),
        Err(error) => AuditEvent::new(AuditEventType::RequestFailed, request_id).with_error(error),
    };
    audit.record(&event);
}

impl<T: fmt::Debug> fmt::Debug for XenditClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XenditClient")
            .field("api", &self.api)
            .field("audit", &self.audit)
            .field("step_up", &self.step_up)
            .finish_non_exhaustive()
    }
}

/// Builder for [`XenditClient`].
pub struct XenditClientBuilder<T> {
    transport: T,
    publishable_key: String,
    api_base_url: String,
    validator: Arc<dyn CardValidator>,
    connectivity: Arc<dyn Connectivity>,
    audit: Arc<dyn AuditSink>,
    surface: Option<Arc<dyn StepUpSurface>>,
    notifier: StepUpNotifier,
    step_up_timeout: Duration,
}

impl XenditClientBuilder<HttpTransport> {
    /// Builder with an HTTP transport, key, base URL and step-up timeout
    /// taken from `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid, no publishable
    /// key can be resolved, or the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let publishable_key = config.resolve_publishable_key()?;
        let transport = HttpTransport::with_config(&config.http)?;
        Ok(Self::new(transport, publishable_key)
            .api_base_url(config.api_base_url.clone())
            .step_up_timeout(config.step_up.timeout()))
    }
}

impl<T: Transport> XenditClientBuilder<T> {
    /// Builder with default collaborators.
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for builders")]
    pub fn new(transport: T, publishable_key: impl Into<String>) -> Self {
        Self {
            transport,
            publishable_key: publishable_key.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            validator: Arc::new(StandardCardValidator::new()),
            connectivity: Arc::new(AlwaysConnected),
            audit: Arc::new(TracingAuditSink),
            surface: None,
            notifier: StepUpNotifier::new(),
            step_up_timeout: DEFAULT_STEP_UP_TIMEOUT,
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic for builders")]
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Overrides the card validator.
    #[must_use]
    pub fn validator(mut self, validator: Arc<dyn CardValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Overrides the connectivity check.
    #[must_use]
    pub fn connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Overrides the audit sink.
    #[must_use]
    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Sets the step-up surface. Required.
    #[must_use]
    pub fn surface(mut self, surface: Arc<dyn StepUpSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Shares an existing notifier, so the surface can be built before the
    /// client.
    #[must_use]
    pub fn notifier(mut self, notifier: StepUpNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Overrides the step-up wait bound.
    #[must_use]
    pub const fn step_up_timeout(mut self, timeout: Duration) -> Self {
        self.step_up_timeout = timeout;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no surface is set, the timeout is
    /// zero, the key is empty or the base URL is not HTTPS.
    pub fn build(self) -> Result<XenditClient<T>> {
        let surface = self
            .surface
            .ok_or_else(|| XenditError::configuration("a step-up surface is required"))?;
        if self.step_up_timeout.is_zero() {
            return Err(XenditError::configuration("step-up timeout must be positive"));
        }

        let api = XenditApi::new(self.transport, self.connectivity, &self.api_base_url, &self.publishable_key)?;
        info!(
            environment = ?api.environment(),
            protocol = api.transport().protocol_name(),
            "xendit client ready"
        );

        Ok(XenditClient {
            api,
            validator: self.validator,
            audit: self.audit,
            step_up: StepUpBridge::new(self.notifier, surface, self.step_up_timeout),
        })
    }
}

impl<T: fmt::Debug> fmt::Debug for XenditClientBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XenditClientBuilder")
            .field("transport", &self.transport)
            .field("api_base_url", &self.api_base_url)
            .field("step_up_timeout", &self.step_up_timeout)
            .finish_non_exhaustive()
    }
}
