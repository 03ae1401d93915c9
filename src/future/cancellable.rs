//! The cancellable future.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::FsError;
use crate::future::{Promise, Step, WaitError};
use crate::runtime::EventLoop;

struct CancelCtl {
    cancelled: bool,
    /// User-installed cancel handler (set at most once).
    handler: Option<Box<dyn FnOnce() + Send>>,
    /// Internal propagation hook: deregisters the backing operation on a
    /// root future, forwards to the parent on a chained one.
    upstream: Option<Box<dyn FnOnce() + Send>>,
}

impl CancelCtl {
    fn new() -> Self {
        Self {
            cancelled: false,
            handler: None,
            upstream: None,
        }
    }
}

/// A [`Promise`] with a cancel capability.
///
/// `cancel()` moves a pending future to the cancelled terminal state,
/// runs the installed cancel handler, and propagates upstream through
/// the chain. Cancelled is terminal: later resolutions are suppressed,
/// and continuations registered before cancellation inherit the
/// cancelled state without their handlers running. Repeat cancels are
/// no-ops.
pub struct Cancellable<T> {
    promise: Promise<T>,
    ctl: Arc<Mutex<CancelCtl>>,
}

impl<T> Clone for Cancellable<T> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            ctl: Arc::clone(&self.ctl),
        }
    }
}

impl<T> fmt::Debug for Cancellable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellable")
            .field("cancelled", &self.ctl.lock().cancelled)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> Cancellable<T> {
    /// Creates a pending cancellable future.
    #[must_use]
    pub fn pending(event_loop: &EventLoop) -> Self {
        Self {
            promise: Promise::pending(event_loop),
            ctl: Arc::new(Mutex::new(CancelCtl::new())),
        }
    }

    /// The underlying promise, for interop with combinators.
    #[must_use]
    pub fn promise(&self) -> &Promise<T> {
        &self.promise
    }

    /// Fulfills the future. A no-op once cancelled.
    pub fn resolve(&self, value: T) {
        self.promise.resolve(value);
    }

    /// Rejects the future. A no-op once cancelled.
    pub fn reject(&self, error: FsError) {
        self.promise.reject(error);
    }

    /// True once [`cancel`](Self::cancel) has run.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.ctl.lock().cancelled
    }

    /// True while unsettled and uncancelled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.promise.is_pending()
    }

    /// Returns the settlement if there is one, without blocking.
    #[must_use]
    pub fn try_result(&self) -> Option<Result<T, FsError>> {
        self.promise.try_result()
    }

    /// Cancels the future: marks the terminal state, then runs the cancel
    /// handler and the upstream propagation hook. Safe to call multiple
    /// times; anything after the first is a no-op. Cancelling an
    /// already-settled future is also a no-op.
    pub fn cancel(&self) {
        if !self.promise.is_pending() && !self.promise.is_cancelled_state() {
            return;
        }
        let (handler, upstream) = {
            let mut ctl = self.ctl.lock();
            if ctl.cancelled {
                return;
            }
            ctl.cancelled = true;
            (ctl.handler.take(), ctl.upstream.take())
        };
        tracing::debug!("future cancelled");
        self.promise.cancel_silent();
        if let Some(handler) = handler {
            handler();
        }
        if let Some(upstream) = upstream {
            upstream();
        }
    }

    /// Installs the cancel handler. If the future is already cancelled
    /// the handler runs immediately.
    pub fn on_cancel(&self, f: impl FnOnce() + Send + 'static) {
        let mut ctl = self.ctl.lock();
        if ctl.cancelled {
            drop(ctl);
            f();
        } else {
            ctl.handler = Some(Box::new(f));
        }
    }

    /// Installs the internal propagation hook (operation deregistration
    /// on roots, parent forwarding on chained futures).
    pub(crate) fn set_upstream(&self, f: impl FnOnce() + Send + 'static) {
        let mut ctl = self.ctl.lock();
        if ctl.cancelled {
            drop(ctl);
            f();
        } else {
            ctl.upstream = Some(Box::new(f));
        }
    }

    /// Chains a continuation pair. The chained future is itself
    /// cancellable; cancelling it propagates to this future.
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Cancellable<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Step<U> + Send + 'static,
        R: FnOnce(FsError) -> Step<U> + Send + 'static,
    {
        let child = Cancellable {
            promise: self.promise.then(on_fulfilled, on_rejected),
            ctl: Arc::new(Mutex::new(CancelCtl::new())),
        };
        if self.is_cancelled() {
            child.cancel();
        } else {
            let parent = self.clone();
            child.set_upstream(move || parent.cancel());
        }
        child
    }

    /// Maps the fulfilled value; rejections pass through.
    pub fn map<U, F>(&self, f: F) -> Cancellable<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |v| Step::Value(f(v)), Step::Reject)
    }

    /// Observes settlement on both paths without altering the outcome.
    pub fn finally<F>(&self, f: F) -> Cancellable<T>
    where
        F: FnOnce() + Send + 'static,
    {
        let child = Cancellable {
            promise: self.promise.finally(f),
            ctl: Arc::new(Mutex::new(CancelCtl::new())),
        };
        if self.is_cancelled() {
            child.cancel();
        } else {
            let parent = self.clone();
            child.set_upstream(move || parent.cancel());
        }
        child
    }

    /// Blocks the caller, driving the event loop until settlement or
    /// cancellation.
    pub fn wait(&self) -> Result<T, WaitError> {
        self.promise.wait()
    }
}
