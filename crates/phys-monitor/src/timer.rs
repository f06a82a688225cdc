//! One-shot retry timers.
//!
//! A monitor arms at most one timer at a time through a [`TimerSource`] and
//! keeps the returned [`TimerToken`]. Presence of the token is the only record
//! of a pending retry; cancelling it is idempotent.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Deferred work run when a timer expires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Schedules one-shot callbacks.
pub trait TimerSource: Send + Sync {
    /// Runs `callback` once after `delay` unless the returned token is
    /// cancelled first.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerToken;
}

struct TokenInner {
    cancelled: AtomicBool,
    abort: Mutex<Option<AbortHandle>>,
}

/// Cancellation handle for a scheduled timer.
///
/// Clones share the same cancellation flag. Timer sources keep one clone and
/// must check [`is_cancelled`](TimerToken::is_cancelled) before running the
/// callback.
#[derive(Clone)]
pub struct TimerToken {
    inner: Arc<TokenInner>,
}

impl TimerToken {
    /// Creates a live, uncancelled token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                abort: Mutex::new(None),
            }),
        }
    }

    /// Cancels the timer. Safe to call any number of times, including after
    /// the callback already ran.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let handle = self
            .inner
            .abort
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Returns `true` once [`cancel`](TimerToken::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Ties a spawned task to this token so cancelling also aborts the task.
    pub fn attach(&self, handle: AbortHandle) {
        let mut slot = self
            .inner
            .abort
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_cancelled() {
            handle.abort();
        } else {
            *slot = Some(handle);
        }
    }
}

impl Default for TimerToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// [`TimerSource`] backed by `tokio::time::sleep` on a runtime handle.
#[derive(Debug, Clone)]
pub struct TokioTimerSource {
    handle: Handle,
}

impl TokioTimerSource {
    /// Creates a timer source spawning onto `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Creates a timer source on the runtime of the calling context.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl TimerSource for TokioTimerSource {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerToken {
        let token = TimerToken::new();
        let guard = token.clone();
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !guard.is_cancelled() {
                callback();
            }
        });
        token.attach(task.abort_handle());
        token
    }
}
