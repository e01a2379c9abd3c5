//! Xendit Bridge: card tokenization with 3-D Secure step-up
//!
//! A Rust client that turns raw card details into Xendit credit-card tokens
//! and authentications, driving the cardholder through a 3-D Secure
//! challenge when the issuer asks for one.
//!
//! # Flow
//!
//! ```text
//! card ──► validate ──► GET credit_card_tokenization_configuration
//!                              │
//!                              ▼
//!                       POST tokenizer (flex)
//!                              │
//!                              ▼
//!                       POST credit_card_tokens ──► VERIFIED ──► Token
//!                              │
//!                              ▼ not verified
//!                       StepUpSurface::launch
//!                              │
//!                              ▼
//!                       StepUpNotifier::notify ──► classify ──► Token / error
//! ```
//!
//! Each leg starts only after the previous one finished. Validation errors
//! are raised before any network call, and a connectivity check is checked
//! before every request.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use xendit_bridge::{
//!     XenditClient,
//!     models::Card,
//!     step_up::{StepUpLaunch, StepUpSurface},
//!     transport::HttpTransport,
//! };
//!
//! struct Browser;
//!
//! impl StepUpSurface for Browser {
//!     fn launch(&self, launch: StepUpLaunch) -> xendit_bridge::error::Result<()> {
//!         println!("complete 3DS at {:?}", launch.authentication.payer_authentication_url);
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> xendit_bridge::error::Result<()> {
//! let client = XenditClient::builder(HttpTransport::new()?, "xnd_public_development_...")
//!     .surface(Arc::new(Browser))
//!     .build()?;
//!
//! let card = Card::new("4000000000000002", "12", "2030").with_cvn("123");
//! let token = client.create_single_use_token(card, 10_000, true).await?;
//! println!("token {} is {}", token.id, token.status);
//! # Ok(())
//! # }
//! ```
//!
//! The surface owns the challenge UI. When the challenge page posts its
//! result, hand the raw message to [`XenditClient::notifier`] with the
//! correlation id from [`step_up::StepUpLaunch`].
//!
//! # Module Organization
//!
//! - [`client`]: the orchestrator and its builder
//! - [`api`]: one method per API call
//! - [`step_up`]: surface launch, notification routing, classification
//! - [`completion`]: exactly-once callback delivery
//! - [`validator`]: card number, expiry and CVN checks
//! - [`models`]: cards, tokens, authentications
//! - [`transport`]: the HTTP seam and its reqwest implementation
//! - [`telemetry`]: audit events and log redaction
//! - [`config`]: TOML configuration
//! - [`error`]: the error taxonomy
//!
//! # Security Considerations
//!
//! - Card numbers and CVNs are zeroized on drop and never appear in `Debug`
//!   output or audit events; only the last four digits are logged.
//! - The publishable key is sent as HTTP Basic authorization and redacted
//!   from configuration `Debug` output.
//! - Only HTTPS endpoints are accepted.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(clippy::multiple_crate_versions, reason = "transitive dependencies from reqwest")]

pub mod api;
pub mod client;
pub mod completion;
pub mod config;
pub mod environment;
pub mod error;
pub mod models;
pub mod step_up;
pub mod telemetry;
pub mod transport;
pub mod validator;

pub use client::{AuthenticationOutcome, TokenRequest, XenditClient, XenditClientBuilder};
pub use config::ClientConfig;
pub use error::{ErrorKind, Result, XenditError};
