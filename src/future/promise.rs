//! The atomic future.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::error::FsError;
use crate::future::WaitError;
use crate::runtime::EventLoop;

/// What a continuation handler does next: settle the chained future with
/// a value, reject it, or adopt another future (flat-map).
pub enum Step<T> {
    /// Fulfill the chained future with this value.
    Value(T),
    /// Reject the chained future with this error.
    Reject(FsError),
    /// Adopt the given future's eventual settlement.
    Chain(Promise<T>),
}

enum State<T> {
    Pending,
    Fulfilled(T),
    Rejected(FsError),
    Cancelled,
}

impl<T> State<T> {
    const fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled(_) => "fulfilled",
            Self::Rejected(_) => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

struct Continuation<T> {
    run: Box<dyn FnOnce(Result<T, FsError>) + Send>,
    /// Invoked instead of `run` when the parent is cancelled, so the
    /// cancelled state propagates to already-chained children.
    on_parent_cancel: Box<dyn FnOnce() + Send>,
}

struct Inner<T> {
    state: State<T>,
    continuations: SmallVec<[Continuation<T>; 2]>,
}

/// A deferred result with single-assignment settlement.
///
/// Continuations registered while pending fire synchronously, in
/// registration order, when the promise settles; a continuation
/// registered after settlement is dispatched as an event-loop microtask.
/// `resolve` and `reject` from a terminal state are silently ignored.
pub struct Promise<T> {
    inner: Arc<Mutex<Inner<T>>>,
    event_loop: EventLoop,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            event_loop: self.event_loop.clone(),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.inner.lock().state.name())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Creates a pending promise bound to `event_loop`.
    #[must_use]
    pub fn pending(event_loop: &EventLoop) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: State::Pending,
                continuations: SmallVec::new(),
            })),
            event_loop: event_loop.clone(),
        }
    }

    /// Creates an already-fulfilled promise.
    #[must_use]
    pub fn fulfilled(event_loop: &EventLoop, value: T) -> Self {
        let p = Self::pending(event_loop);
        p.resolve(value);
        p
    }

    /// Creates an already-rejected promise.
    #[must_use]
    pub fn rejected(event_loop: &EventLoop, error: FsError) -> Self {
        let p = Self::pending(event_loop);
        p.reject(error);
        p
    }

    /// The loop this promise dispatches on.
    #[must_use]
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// Fulfills the promise. Ignored from any terminal state.
    pub fn resolve(&self, value: T) {
        let continuations = {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, State::Pending) {
                return;
            }
            inner.state = State::Fulfilled(value.clone());
            std::mem::take(&mut inner.continuations)
        };
        for c in continuations {
            (c.run)(Ok(value.clone()));
        }
    }

    /// Rejects the promise. Ignored from any terminal state.
    pub fn reject(&self, error: FsError) {
        let continuations = {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, State::Pending) {
                return;
            }
            inner.state = State::Rejected(error.clone());
            std::mem::take(&mut inner.continuations)
        };
        for c in continuations {
            (c.run)(Err(error.clone()));
        }
    }

    /// Moves a pending promise to the cancelled terminal state.
    ///
    /// Continuations registered before cancellation inherit the cancelled
    /// state (recursively, through their own children); none of their
    /// success or failure handlers run. Continuations registered after
    /// stay pending forever.
    pub(crate) fn cancel_silent(&self) {
        let continuations = {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, State::Pending) {
                return;
            }
            inner.state = State::Cancelled;
            std::mem::take(&mut inner.continuations)
        };
        for c in continuations {
            (c.on_parent_cancel)();
        }
    }

    /// True while unsettled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.inner.lock().state, State::Pending)
    }

    pub(crate) fn is_cancelled_state(&self) -> bool {
        matches!(self.inner.lock().state, State::Cancelled)
    }

    /// Returns the settlement if the promise has one, without blocking.
    #[must_use]
    pub fn try_result(&self) -> Option<Result<T, FsError>> {
        match &self.inner.lock().state {
            State::Fulfilled(v) => Some(Ok(v.clone())),
            State::Rejected(e) => Some(Err(e.clone())),
            State::Pending | State::Cancelled => None,
        }
    }

    fn register(&self, continuation: Continuation<T>) {
        let outcome = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            match &inner.state {
                State::Pending => {
                    inner.continuations.push(continuation);
                    return;
                }
                State::Fulfilled(v) => Some(Ok(v.clone())),
                State::Rejected(e) => Some(Err(e.clone())),
                State::Cancelled => None,
            }
        };
        match outcome {
            Some(result) => {
                // Settled before registration: dispatch via the loop so
                // the caller's stack unwinds first.
                let run = continuation.run;
                self.event_loop.enqueue(move || run(result));
            }
            // Attached after cancellation: the handler never runs and its
            // chained future stays pending forever.
            None => drop(continuation),
        }
    }

    /// Registers a bare observer; used by combinators.
    pub(crate) fn subscribe(&self, f: impl FnOnce(Result<T, FsError>) + Send + 'static) {
        self.register(Continuation {
            run: Box::new(f),
            on_parent_cancel: Box::new(|| {}),
        });
    }

    /// Forwards this promise's settlement into `target`.
    pub(crate) fn pipe_into(&self, target: Promise<T>) {
        let settle = target.clone();
        self.register(Continuation {
            run: Box::new(move |outcome| match outcome {
                Ok(v) => settle.resolve(v),
                Err(e) => settle.reject(e),
            }),
            on_parent_cancel: Box::new(move || target.cancel_silent()),
        });
    }

    /// Chains a continuation pair, returning the chained future.
    ///
    /// Exactly one handler runs, at most once. A handler returning
    /// [`Step::Chain`] makes the chained future adopt the inner one.
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Step<U> + Send + 'static,
        R: FnOnce(FsError) -> Step<U> + Send + 'static,
    {
        let child = Promise::pending(&self.event_loop);
        let settle = child.clone();
        let cancel_target = child.clone();
        self.register(Continuation {
            run: Box::new(move |outcome| {
                let step = match outcome {
                    Ok(v) => on_fulfilled(v),
                    Err(e) => on_rejected(e),
                };
                apply_step(step, &settle);
            }),
            on_parent_cancel: Box::new(move || cancel_target.cancel_silent()),
        });
        child
    }

    /// Maps the fulfilled value; rejections pass through.
    pub fn map<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |v| Step::Value(f(v)), Step::Reject)
    }

    /// Chains into another future on fulfillment; rejections pass through.
    pub fn and_then<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Promise<U> + Send + 'static,
    {
        self.then(move |v| Step::Chain(f(v)), Step::Reject)
    }

    /// Handles a rejection; fulfillments pass through.
    pub fn catch_err<R>(&self, f: R) -> Promise<T>
    where
        R: FnOnce(FsError) -> Step<T> + Send + 'static,
    {
        self.then(Step::Value, f)
    }

    /// Observes settlement on both paths without altering the outcome.
    pub fn finally<F>(&self, f: F) -> Promise<T>
    where
        F: FnOnce() + Send + 'static,
    {
        let hook = Arc::new(Mutex::new(Some(f)));
        let on_reject = Arc::clone(&hook);
        self.then(
            move |v| {
                if let Some(f) = hook.lock().take() {
                    f();
                }
                Step::Value(v)
            },
            move |e| {
                if let Some(f) = on_reject.lock().take() {
                    f();
                }
                Step::Reject(e)
            },
        )
    }

    /// Blocks the caller, driving the event loop until this promise
    /// settles. Nested waits re-enter the loop.
    pub fn wait(&self) -> Result<T, WaitError> {
        loop {
            {
                let inner = self.inner.lock();
                match &inner.state {
                    State::Fulfilled(v) => return Ok(v.clone()),
                    State::Rejected(e) => return Err(WaitError::Failed(e.clone())),
                    State::Cancelled => return Err(WaitError::Cancelled),
                    State::Pending => {}
                }
            }
            if !self.event_loop.turn() {
                return Err(WaitError::Stalled);
            }
        }
    }
}

fn apply_step<U: Clone + Send + 'static>(step: Step<U>, target: &Promise<U>) {
    match step {
        Step::Value(v) => target.resolve(v),
        Step::Reject(e) => target.reject(e),
        Step::Chain(inner) => inner.pipe_into(target.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FsErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_test(name: &str) -> EventLoop {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
        EventLoop::new()
    }

    fn test_error() -> FsError {
        FsError::new(FsErrorKind::Other, "test", "/test")
    }

    #[test]
    fn resolve_is_single_assignment() {
        let el = init_test("resolve_is_single_assignment");
        let p: Promise<u32> = Promise::pending(&el);
        p.resolve(1);
        p.resolve(2);
        p.reject(test_error());
        let got = p.wait().unwrap();
        crate::assert_with_log!(got == 1, "first settlement wins", 1u32, got);
        crate::test_complete!("resolve_is_single_assignment");
    }

    #[test]
    fn continuations_fire_in_registration_order() {
        let el = init_test("continuations_fire_in_registration_order");
        let p: Promise<u32> = Promise::pending(&el);
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            let _ = p.map(move |v| {
                order.lock().push((i, v));
                v
            });
        }
        p.resolve(7);
        let got = order.lock().clone();
        crate::assert_with_log!(
            got == vec![(0, 7), (1, 7), (2, 7)],
            "registration order",
            vec![(0, 7), (1, 7), (2, 7)],
            got
        );
        crate::test_complete!("continuations_fire_in_registration_order");
    }

    #[test]
    fn then_after_settlement_dispatches_via_loop() {
        let el = init_test("then_after_settlement_dispatches_via_loop");
        let p = Promise::fulfilled(&el, 5u32);
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let child = p.map(move |v| {
            sink.store(v as usize, Ordering::SeqCst);
            v
        });
        crate::assert_with_log!(
            seen.load(Ordering::SeqCst) == 0,
            "not yet dispatched",
            0usize,
            seen.load(Ordering::SeqCst)
        );
        let got = child.wait().unwrap();
        crate::assert_with_log!(got == 5, "value propagated", 5u32, got);
        crate::assert_with_log!(
            seen.load(Ordering::SeqCst) == 5,
            "handler ran during wait",
            5usize,
            seen.load(Ordering::SeqCst)
        );
        crate::test_complete!("then_after_settlement_dispatches_via_loop");
    }

    #[test]
    fn chain_step_adopts_inner_future() {
        let el = init_test("chain_step_adopts_inner_future");
        let p: Promise<u32> = Promise::pending(&el);
        let inner: Promise<u32> = Promise::pending(&el);
        let inner2 = inner.clone();
        let chained = p.then(move |_| Step::Chain(inner2), Step::Reject);

        p.resolve(1);
        crate::assert_with_log!(chained.is_pending(), "adopting, still pending", true, chained.is_pending());
        inner.resolve(42);
        let got = chained.wait().unwrap();
        crate::assert_with_log!(got == 42, "adopted value", 42u32, got);
        crate::test_complete!("chain_step_adopts_inner_future");
    }

    #[test]
    fn rejection_propagates_through_map_chains() {
        let el = init_test("rejection_propagates_through_map_chains");
        let p: Promise<u32> = Promise::pending(&el);
        let chained = p.map(|v| v + 1).map(|v| v * 2);
        p.reject(test_error());
        let err = chained.wait().unwrap_err();
        let rejected = matches!(err, WaitError::Failed(_));
        crate::assert_with_log!(rejected, "rejection reaches tail", true, rejected);
        crate::test_complete!("rejection_propagates_through_map_chains");
    }

    #[test]
    fn catch_recovers_from_rejection() {
        let el = init_test("catch_recovers_from_rejection");
        let p: Promise<u32> = Promise::rejected(&el, test_error());
        let recovered = p.catch_err(|_| Step::Value(99));
        let got = recovered.wait().unwrap();
        crate::assert_with_log!(got == 99, "recovery value", 99u32, got);
        crate::test_complete!("catch_recovers_from_rejection");
    }

    #[test]
    fn finally_runs_on_both_paths_without_altering_outcome() {
        let el = init_test("finally_runs_on_both_paths_without_altering_outcome");
        let runs = Arc::new(AtomicUsize::new(0));

        let ok: Promise<u32> = Promise::fulfilled(&el, 3);
        let r1 = Arc::clone(&runs);
        let got = ok
            .finally(move || {
                r1.fetch_add(1, Ordering::SeqCst);
            })
            .wait()
            .unwrap();
        crate::assert_with_log!(got == 3, "value unchanged", 3u32, got);

        let bad: Promise<u32> = Promise::rejected(&el, test_error());
        let r2 = Arc::clone(&runs);
        let err = bad
            .finally(move || {
                r2.fetch_add(1, Ordering::SeqCst);
            })
            .wait()
            .unwrap_err();
        let still_rejected = matches!(err, WaitError::Failed(_));
        crate::assert_with_log!(still_rejected, "rejection unchanged", true, still_rejected);
        crate::assert_with_log!(
            runs.load(Ordering::SeqCst) == 2,
            "ran on both paths",
            2usize,
            runs.load(Ordering::SeqCst)
        );
        crate::test_complete!("finally_runs_on_both_paths_without_altering_outcome");
    }

    #[test]
    fn cancellation_severs_pre_registered_continuations() {
        let el = init_test("cancellation_severs_pre_registered_continuations");
        let p: Promise<u32> = Promise::pending(&el);
        let fired = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&fired);
        let child = p.then(
            move |_| {
                sink.fetch_add(1, Ordering::SeqCst);
                Step::Value(0u32)
            },
            Step::Reject,
        );
        let grandchild = child.map(|v| v);

        p.cancel_silent();
        p.resolve(1);

        crate::assert_with_log!(
            fired.load(Ordering::SeqCst) == 0,
            "no handler ran",
            0usize,
            fired.load(Ordering::SeqCst)
        );
        let child_err = child.wait().unwrap_err();
        crate::assert_with_log!(child_err.is_cancelled(), "child inherits cancellation", true, child_err.is_cancelled());
        let grandchild_err = grandchild.wait().unwrap_err();
        crate::assert_with_log!(
            grandchild_err.is_cancelled(),
            "cancellation cascades downstream",
            true,
            grandchild_err.is_cancelled()
        );
        crate::test_complete!("cancellation_severs_pre_registered_continuations");
    }

    #[test]
    fn then_after_cancellation_stays_pending_forever() {
        let el = init_test("then_after_cancellation_stays_pending_forever");
        let p: Promise<u32> = Promise::pending(&el);
        p.cancel_silent();
        let late = p.map(|v| v);
        crate::assert_with_log!(late.is_pending(), "late child pending", true, late.is_pending());
        let err = late.wait().unwrap_err();
        let stalled = matches!(err, WaitError::Stalled);
        crate::assert_with_log!(stalled, "wait reports a drained loop", true, stalled);
        crate::test_complete!("then_after_cancellation_stays_pending_forever");
    }

    #[test]
    fn handler_rejecting_via_step_rejects_child() {
        let el = init_test("handler_rejecting_via_step_rejects_child");
        let p: Promise<u32> = Promise::fulfilled(&el, 1);
        let child: Promise<u32> = p.then(
            |_| Step::Reject(test_error()),
            Step::Reject,
        );
        let err = child.wait().unwrap_err();
        let rejected = matches!(err, WaitError::Failed(_));
        crate::assert_with_log!(rejected, "handler-raised rejection", true, rejected);
        crate::test_complete!("handler_rejecting_via_step_rejects_child");
    }

    #[test]
    fn nested_wait_reenters_the_loop() {
        let el = init_test("nested_wait_reenters_the_loop");
        let outer: Promise<u32> = Promise::pending(&el);
        let inner = Promise::fulfilled(&el, 10u32);
        let outer2 = outer.clone();
        let el2 = el.clone();
        el.enqueue(move || {
            // Waiting inside a microtask drives the loop re-entrantly.
            let v = Promise::fulfilled(&el2, 32u32).wait().unwrap();
            outer2.resolve(v);
        });
        let total = outer.wait().unwrap() + inner.wait().unwrap();
        crate::assert_with_log!(total == 42, "nested waits compose", 42u32, total);
        crate::test_complete!("nested_wait_reenters_the_loop");
    }
}
