//! Result delivery.
//!
//! A logical request can finish from two places: the network leg that
//! returns a verified authentication, or the step-up notification that
//! arrives later. Both go through a [`Completion`], which hands the result
//! to the caller's [`TokenCallback`] the first time and ignores every later
//! attempt.

use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use crate::error::{Result, XenditError};

/// Caller-supplied completion handlers.
///
/// Exactly one of the two methods is called, exactly once. Both consume the
/// boxed callback, so a second call is impossible.
pub trait TokenCallback<T>: Send {
    /// The request produced a result.
    fn on_success(self: Box<Self>, value: T);

    /// The request failed.
    fn on_error(self: Box<Self>, error: XenditError);
}

/// Adapter turning a pair of closures into a [`TokenCallback`].
///
/// # Examples
///
/// ```
/// use xendit_bridge::{
///     completion::{Callbacks, Completion},
///     error::XenditError,
/// };
///
/// let completion = Completion::new(Callbacks::new(
///     |token: String| println!("token {token}"),
///     |error: XenditError| eprintln!("failed: {error}"),
/// ));
/// assert!(completion.complete(Ok("tok_1".to_owned())));
/// assert!(!completion.complete(Ok("tok_2".to_owned())));
/// ```
pub struct Callbacks<S, E> {
    on_success: S,
    on_error: E,
}

impl<S, E> Callbacks<S, E> {
    /// Wraps the two handlers.
    pub const fn new(on_success: S, on_error: E) -> Self {
        Self { on_success, on_error }
    }
}

impl<S, E> fmt::Debug for Callbacks<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks").finish_non_exhaustive()
    }
}

impl<T, S, E> TokenCallback<T> for Callbacks<S, E>
where
    S: FnOnce(T) + Send,
    E: FnOnce(XenditError) + Send,
{
    fn on_success(self: Box<Self>, value: T) {
        (self.on_success)(value);
    }

    fn on_error(self: Box<Self>, error: XenditError) {
        (self.on_error)(error);
    }
}

/// Single-assignment result cell.
///
/// Holds the callback until the first [`complete`](Self::complete) call,
/// which takes it out and invokes it. Later calls find the slot empty and
/// return `false`.
pub struct Completion<T> {
    callback: Mutex<Option<Box<dyn TokenCallback<T>>>>,
}

impl<T> Completion<T> {
    /// Creates a cell owning `callback`.
    #[allow(clippy::impl_trait_in_params, reason = "accepts any callback implementation")]
    pub fn new(callback: impl TokenCallback<T> + 'static) -> Self {
        Self::from_boxed(Box::new(callback))
    }

    /// Creates a cell owning an already boxed callback.
    #[must_use]
    pub fn from_boxed(callback: Box<dyn TokenCallback<T>>) -> Self {
        Self { callback: Mutex::new(Some(callback)) }
    }

    /// Delivers `result` if the cell has not been completed yet.
    ///
    /// Returns `true` when this call delivered the result.
    pub fn complete(&self, result: Result<T>) -> bool {
        // Take under the lock, call outside it.
        let callback = self.callback.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(callback) = callback else {
            tracing::debug!("dropping result for an already completed request");
            return false;
        };

        match result {
            Ok(value) => callback.on_success(value),
            Err(error) => callback.on_error(error),
        }
        true
    }

    /// Returns `true` once a result has been delivered.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.callback.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").field("completed", &self.is_completed()).finish()
    }
}
