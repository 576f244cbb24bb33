//! Cancellation and deadline signal threaded through every engine call.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CancelCause;

/// Caller-supplied signal that bounds a single harness call.
///
/// A context fires when its cancellation token is canceled or its deadline
/// passes, whichever comes first. Cloning a context shares the same token, so
/// canceling any clone cancels them all.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tfharness::engine::CallContext;
///
/// let ctx = CallContext::background().with_timeout(Duration::from_secs(600));
/// assert!(!ctx.is_done());
/// ctx.cancel();
/// assert!(ctx.is_done());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that never fires on its own.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// A context driven by an existing cancellation token.
    #[must_use]
    pub const fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Bound the context by `timeout` from now.
    ///
    /// An earlier existing deadline is kept.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now()
            .checked_add(timeout)
            .unwrap_or_else(far_future);
        self.with_deadline(deadline)
    }

    /// Bound the context by an absolute deadline.
    ///
    /// An earlier existing deadline is kept.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(
            self.deadline
                .map_or(deadline, |existing| existing.min(deadline)),
        );
        self
    }

    /// Cancel the context and every clone of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The underlying cancellation token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The deadline, if one was set.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context has fired, or `None` while it is still live.
    #[must_use]
    pub fn cause(&self) -> Option<CancelCause> {
        if self.token.is_cancelled() {
            return Some(CancelCause::Canceled);
        }
        self.deadline
            .filter(|deadline| *deadline <= Instant::now())
            .map(|_| CancelCause::DeadlineExceeded)
    }

    /// Whether the context has already fired.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.cause().is_some()
    }

    /// Resolve once the context fires.
    pub async fn done(&self) -> CancelCause {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                () = self.token.cancelled() => CancelCause::Canceled,
                () = tokio::time::sleep_until(deadline) => CancelCause::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelCause::Canceled
            }
        }
    }
}

// Roughly thirty years; used when `now + timeout` overflows.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365 * 30)
}
