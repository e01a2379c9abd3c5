//! Interactive step-up bridge.
//!
//! When the server does not verify an authentication outright, the
//! cardholder completes a challenge on an external surface (a browser, a
//! web view, a terminal prompt). The bridge:
//!
//! 1. registers a one-shot listener under a fresh correlation id,
//! 2. launches the [`StepUpSurface`] with that id and the authentication,
//! 3. waits for the host to call [`StepUpNotifier::notify`] with the same
//!    id, bounded by a timeout and open to cancellation,
//! 4. classifies the notification payload into an [`Authentication`] or an
//!    [`XenditError`].
//!
//! Each registration is removed on the first notification, cancellation,
//! timeout, or when the [`PendingStepUp`] handle is dropped. Removing it
//! again is a no-op.
//!
//! # Examples
//!
//! ```
//! use xendit_bridge::step_up::classify_notification;
//!
//! let authentication = classify_notification(r#"{"id":"auth_1","status":"VERIFIED"}"#).unwrap();
//! assert_eq!(authentication.id, "auth_1");
//!
//! let error = classify_notification("").unwrap_err();
//! assert_eq!(error.code(), "SERVER_ERROR");
//! ```

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{Result, TOKENIZATION_ERROR_MESSAGE, VALIDATION_ERROR_MESSAGE, XenditError},
    models::Authentication,
};

/// Default bound on the step-up wait.
pub const DEFAULT_STEP_UP_TIMEOUT: Duration = Duration::from_secs(600);

/// What the surface needs to run a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepUpLaunch {
    /// Id the host must pass back to [`StepUpNotifier::notify`].
    pub correlation_id: Uuid,
    /// The unverified authentication, including the challenge URL.
    pub authentication: Authentication,
}

/// External interactive surface.
///
/// `launch` must return promptly; the outcome of the challenge is reported
/// later through [`StepUpNotifier::notify`].
pub trait StepUpSurface: Send + Sync {
    /// Presents the challenge to the cardholder.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface cannot be shown. The registration is
    /// released and the error is delivered to the caller.
    fn launch(&self, launch: StepUpLaunch) -> Result<()>;
}

#[derive(Debug)]
enum StepUpSignal {
    Notification(String),
    Cancelled,
}

type Registry = HashMap<Uuid, oneshot::Sender<StepUpSignal>>;

/// Entry point for step-up completion notifications.
///
/// Cheap to clone; all clones share the same registry. Hosts receive one
/// from [`crate::XenditClient::notifier`] and call [`notify`](Self::notify)
/// when their surface reports back.
#[derive(Clone, Default)]
pub struct StepUpNotifier {
    pending: Arc<Mutex<Registry>>,
}

impl StepUpNotifier {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self) -> (Uuid, oneshot::Receiver<StepUpSignal>) {
        let (sender, receiver) = oneshot::channel();
        let correlation_id = Uuid::new_v4();
        self.registry().insert(correlation_id, sender);
        (correlation_id, receiver)
    }

    fn take(&self, correlation_id: Uuid) -> Option<oneshot::Sender<StepUpSignal>> {
        self.registry().remove(&correlation_id)
    }

    /// Delivers the surface's completion payload.
    ///
    /// Returns `true` only for the first notification of a registered id.
    /// Notifications for unknown, completed, cancelled or expired ids are
    /// ignored.
    #[allow(clippy::impl_trait_in_params, reason = "impl Into<String> is idiomatic here")]
    pub fn notify(&self, correlation_id: Uuid, message: impl Into<String>) -> bool {
        let Some(sender) = self.take(correlation_id) else {
            debug!(%correlation_id, "ignoring notification for unknown step-up");
            return false;
        };
        sender.send(StepUpSignal::Notification(message.into())).is_ok()
    }

    /// Cancels a pending step-up; its waiter receives a cancellation error.
    ///
    /// Returns `false` if the id is not pending.
    pub fn cancel(&self, correlation_id: Uuid) -> bool {
        let Some(sender) = self.take(correlation_id) else {
            return false;
        };
        sender.send(StepUpSignal::Cancelled).is_ok()
    }

    /// Releases a registration without signalling the waiter.
    ///
    /// Returns `false` if it was already released.
    fn deregister(&self, correlation_id: Uuid) -> bool {
        self.take(correlation_id).is_some()
    }

    /// Returns `true` while `correlation_id` awaits a notification.
    #[must_use]
    pub fn is_pending(&self, correlation_id: Uuid) -> bool {
        self.registry().contains_key(&correlation_id)
    }

    /// Number of outstanding step-ups.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.registry().len()
    }
}

impl fmt::Debug for StepUpNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepUpNotifier").field("pending", &self.pending_count()).finish()
    }
}

/// Launches surfaces and hands out [`PendingStepUp`] handles.
#[derive(Clone)]
pub struct StepUpBridge {
    notifier: StepUpNotifier,
    surface: Arc<dyn StepUpSurface>,
    timeout: Duration,
}

impl StepUpBridge {
    /// Creates a bridge over `surface`, sharing `notifier`'s registry.
    pub fn new(notifier: StepUpNotifier, surface: Arc<dyn StepUpSurface>, timeout: Duration) -> Self {
        Self { notifier, surface, timeout }
    }

    /// Notifier sharing this bridge's registry.
    #[must_use]
    pub const fn notifier(&self) -> &StepUpNotifier {
        &self.notifier
    }

    /// Registers a listener and launches the surface.
    ///
    /// # Errors
    ///
    /// Returns the surface's error if it fails to launch; the listener is
    /// released before returning.
    #[instrument(skip_all, fields(authentication_id = %authentication.id, correlation_id = tracing::field::Empty))]
    pub fn launch(&self, authentication: Authentication) -> Result<PendingStepUp> {
        let (correlation_id, receiver) = self.notifier.register();
        tracing::Span::current().record("correlation_id", tracing::field::display(correlation_id));

        let pending = PendingStepUp {
            correlation_id,
            receiver,
            notifier: self.notifier.clone(),
            timeout: self.timeout,
        };

        if authentication.payer_authentication_url.is_none() {
            warn!("launching step-up without a payer authentication url");
        }

        // On error `pending` drops here and releases the registration.
        self.surface.launch(StepUpLaunch { correlation_id, authentication })?;
        debug!("step-up surface launched");
        Ok(pending)
    }
}

impl fmt::Debug for StepUpBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepUpBridge")
            .field("notifier", &self.notifier)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Handle to one outstanding step-up.
///
/// Dropping the handle releases the registration, so a late notification
/// for it is ignored.
#[derive(Debug)]
pub struct PendingStepUp {
    correlation_id: Uuid,
    receiver: oneshot::Receiver<StepUpSignal>,
    notifier: StepUpNotifier,
    timeout: Duration,
}

impl PendingStepUp {
    /// Correlation id the surface was launched with.
    #[must_use]
    pub const fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Cancels the wait. Returns `false` if it already finished.
    pub fn cancel(&self) -> bool {
        self.notifier.cancel(self.correlation_id)
    }

    /// Waits for the notification and classifies it.
    ///
    /// # Errors
    ///
    /// - [`crate::error::ErrorKind::Timeout`] when no notification arrives in time
    /// - [`crate::error::ErrorKind::Cancelled`] when the step-up is cancelled
    /// - any error produced by [`classify_notification`]
    #[instrument(skip(self), fields(correlation_id = %self.correlation_id, timeout = ?self.timeout))]
    pub async fn wait(mut self) -> Result<Authentication> {
        let signal = tokio::time::timeout(self.timeout, &mut self.receiver).await;
        match signal {
            Ok(Ok(StepUpSignal::Notification(message))) => classify_notification(&message),
            Ok(Ok(StepUpSignal::Cancelled) | Err(_)) => Err(XenditError::cancelled()),
            Err(_) => {
                warn!("step-up notification did not arrive in time");
                Err(XenditError::timeout())
            }
        }
    }
}

impl Drop for PendingStepUp {
    fn drop(&mut self) {
        if self.notifier.deregister(self.correlation_id) {
            debug!(correlation_id = %self.correlation_id, "released step-up registration");
        }
    }
}

/// Interprets a completion payload from the interactive surface.
///
/// | Payload | Result |
/// |---|---|
/// | empty | server error |
/// | the validation sentinel | validation error |
/// | the tokenization sentinel | tokenization error |
/// | authentication JSON with status exactly `VERIFIED` | the authentication |
/// | other authentication JSON with a string or numeric `failure_reason` | authentication failed, carrying the record |
/// | anything else | server error |
///
/// Never panics.
///
/// # Errors
///
/// See the table above.
pub fn classify_notification(message: &str) -> Result<Authentication> {
    let message = message.trim();
    if message.is_empty() {
        return Err(XenditError::server("Step-up finished without a result"));
    }
    if message == VALIDATION_ERROR_MESSAGE {
        return Err(XenditError::validation(VALIDATION_ERROR_MESSAGE));
    }
    if message == TOKENIZATION_ERROR_MESSAGE {
        return Err(XenditError::tokenization(TOKENIZATION_ERROR_MESSAGE));
    }

    let value: serde_json::Value = serde_json::from_str(message)
        .map_err(|e| XenditError::server(format!("unexpected step-up payload: {e}")))?;
    // Only the exact wire status counts as verified here.
    let verified = value.get("status").and_then(serde_json::Value::as_str) == Some("VERIFIED");
    let reason = match value.get("failure_reason") {
        Some(serde_json::Value::String(reason)) => Some(reason.clone()),
        Some(serde_json::Value::Number(code)) => Some(code.to_string()),
        _ => None,
    };

    let authentication: Authentication = serde_json::from_value(value)
        .map_err(|e| XenditError::server(format!("unexpected step-up payload: {e}")))?;
    if verified {
        return Ok(authentication);
    }

    match reason {
        Some(reason) => Err(XenditError::authentication_failed(reason, authentication)),
        None => Err(XenditError::server(TOKENIZATION_ERROR_MESSAGE)),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{error::ErrorKind, models::AuthenticationStatus};

    #[derive(Default)]
    struct RecordingSurface {
        launches: Mutex<Vec<StepUpLaunch>>,
        fail: bool,
    }

    impl StepUpSurface for RecordingSurface {
        fn launch(&self, launch: StepUpLaunch) -> Result<()> {
            if self.fail {
                return Err(XenditError::server("surface unavailable"));
            }
            self.launches.lock().unwrap().push(launch);
            Ok(())
        }
    }

    fn pending_auth() -> Authentication {
        Authentication::new("auth_1", AuthenticationStatus::Pending)
            .with_payer_authentication_url("https://3ds.example.com/auth_1")
    }

    fn bridge(surface: Arc<RecordingSurface>, timeout: Duration) -> StepUpBridge {
        StepUpBridge::new(StepUpNotifier::new(), surface, timeout)
    }

    #[test]
    fn test_classify_sentinels() {
        assert_eq!(classify_notification(VALIDATION_ERROR_MESSAGE).unwrap_err().kind(), ErrorKind::Validation);
        let err = classify_notification(TOKENIZATION_ERROR_MESSAGE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Tokenization);
        assert_eq!(err.code(), "TOKENIZATION_ERROR");
    }

    #[test]
    fn test_classify_empty_is_server_error() {
        assert_eq!(classify_notification("").unwrap_err().kind(), ErrorKind::Server);
        assert_eq!(classify_notification("   ").unwrap_err().kind(), ErrorKind::Server);
    }

    #[test]
    fn test_classify_verified_roundtrip() {
        let auth = Authentication::new("auth_1", AuthenticationStatus::Verified);
        let payload = serde_json::to_string(&auth).unwrap();
        assert_eq!(classify_notification(&payload).unwrap(), auth);
    }

    #[test]
    fn test_classify_failure_reason() {
        let payload = r#"{"id":"auth_2","status":"FAILED","failure_reason":"insufficient_funds"}"#;
        let err = classify_notification(payload).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert_eq!(err.message(), "insufficient_funds");
        let partial = err.authentication().unwrap();
        assert_eq!(partial.id, "auth_2");
        assert_eq!(partial.status, AuthenticationStatus::Failed);
    }

    #[test]
    fn test_classify_numeric_failure_reason() {
        let err = classify_notification(r#"{"id":"auth_4","status":"FAILED","failure_reason":51}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert_eq!(err.message(), "51");
        assert_eq!(err.authentication().unwrap().id, "auth_4");
    }

    #[test]
    fn test_classify_status_must_match_exactly() {
        for status in ["verified", "Verified"] {
            let payload = format!(r#"{{"id":"a","status":"{status}"}}"#);
            assert_eq!(classify_notification(&payload).unwrap_err().kind(), ErrorKind::Server, "{status}");
        }

        let err = classify_notification(r#"{"id":"a","status":"verified","failure_reason":"x"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    }

    #[test]
    fn test_classify_unverified_without_reason() {
        let err = classify_notification(r#"{"id":"auth_3","status":"FAILED"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        assert!(err.authentication().is_none());
    }

    #[test]
    fn test_classify_missing_fields_and_garbage() {
        assert_eq!(classify_notification(r#"{"status":"VERIFIED"}"#).unwrap_err().kind(), ErrorKind::Server);
        assert_eq!(classify_notification(r#"{"id":null,"status":"VERIFIED"}"#).unwrap_err().kind(), ErrorKind::Server);
        assert_eq!(classify_notification("not json").unwrap_err().kind(), ErrorKind::Server);
    }

    #[tokio::test]
    async fn test_notification_resolves_pending() {
        let surface = Arc::new(RecordingSurface::default());
        let bridge = bridge(Arc::clone(&surface), DEFAULT_STEP_UP_TIMEOUT);

        let pending = bridge.launch(pending_auth()).unwrap();
        let id = pending.correlation_id();
        assert_eq!(surface.launches.lock().unwrap()[0].correlation_id, id);
        assert!(bridge.notifier().is_pending(id));

        assert!(bridge.notifier().notify(id, r#"{"id":"auth_1","status":"VERIFIED"}"#));
        assert!(!bridge.notifier().notify(id, r#"{"id":"auth_1","status":"VERIFIED"}"#));
        assert!(!bridge.notifier().is_pending(id));

        let auth = pending.wait().await.unwrap();
        assert!(auth.is_verified());
    }

    #[tokio::test]
    async fn test_concurrent_step_ups_are_isolated() {
        let surface = Arc::new(RecordingSurface::default());
        let bridge = bridge(surface, DEFAULT_STEP_UP_TIMEOUT);

        let first = bridge.launch(pending_auth()).unwrap();
        let second = bridge.launch(pending_auth()).unwrap();
        assert_ne!(first.correlation_id(), second.correlation_id());

        bridge.notifier().notify(second.correlation_id(), r#"{"id":"second","status":"VERIFIED"}"#);
        bridge.notifier().notify(first.correlation_id(), r#"{"id":"first","status":"VERIFIED"}"#);

        assert_eq!(first.wait().await.unwrap().id, "first");
        assert_eq!(second.wait().await.unwrap().id, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_releases_registration() {
        let surface = Arc::new(RecordingSurface::default());
        let bridge = bridge(surface, Duration::from_secs(5));
        let notifier = bridge.notifier().clone();

        let pending = bridge.launch(pending_auth()).unwrap();
        let id = pending.correlation_id();

        let err = pending.wait().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(!notifier.is_pending(id));
        assert!(!notifier.notify(id, r#"{"id":"auth_1","status":"VERIFIED"}"#));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let surface = Arc::new(RecordingSurface::default());
        let bridge = bridge(surface, DEFAULT_STEP_UP_TIMEOUT);

        let pending = bridge.launch(pending_auth()).unwrap();
        assert!(pending.cancel());
        assert!(!pending.cancel());
        assert!(!bridge.notifier().cancel(pending.correlation_id()));

        assert_eq!(pending.wait().await.unwrap_err().kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_drop_releases_registration() {
        let surface = Arc::new(RecordingSurface::default());
        let bridge = bridge(surface, DEFAULT_STEP_UP_TIMEOUT);

        let pending = bridge.launch(pending_auth()).unwrap();
        let id = pending.correlation_id();
        drop(pending);

        assert_eq!(bridge.notifier().pending_count(), 0);
        assert!(!bridge.notifier().notify(id, "late"));
        assert!(!bridge.notifier().deregister(id));
    }

    #[test]
    fn test_failed_launch_releases_registration() {
        let surface = Arc::new(RecordingSurface { fail: true, ..Default::default() });
        let bridge = bridge(surface, DEFAULT_STEP_UP_TIMEOUT);

        let err = bridge.launch(pending_auth()).unwrap_err();
        assert_eq!(err.message(), "surface unavailable");
        assert_eq!(bridge.notifier().pending_count(), 0);
    }

    #[test]
    fn test_notify_unknown_id() {
        let notifier = StepUpNotifier::new();
        assert!(!notifier.notify(Uuid::new_v4(), "payload"));
        assert!(!notifier.cancel(Uuid::new_v4()));
    }

    proptest! {
        #[test]
        fn test_classify_never_panics(message in ".*") {
            let _ = classify_notification(&message);
        }

        #[test]
        fn test_classify_json_like_never_panics(
            id in "[a-z0-9_]{0,12}",
            status in "(VERIFIED|PENDING|FAILED|IN_REVIEW|[A-Z]{0,8})",
            reason in proptest::option::of("[a-z_]{1,20}"),
        ) {
            let mut value = serde_json::json!({"id": id, "status": status});
            if let Some(reason) = &reason {
                value["failure_reason"] = serde_json::Value::String(reason.clone());
            }
            let result = classify_notification(&value.to_string());
            if status == "VERIFIED" {
                prop_assert!(result.is_ok());
            } else if reason.is_some() {
                prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::AuthenticationFailed);
            } else {
                prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::Server);
            }
        }
    }
}
