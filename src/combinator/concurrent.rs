//! Bounded-concurrency task execution.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::future::Promise;
use crate::runtime::EventLoop;

/// A deferred unit of work: invoking the thunk starts it and yields its
/// future.
pub type Task<T> = Box<dyn FnOnce() -> Promise<T> + Send>;

struct ConcurrentState<T> {
    tasks: Vec<Option<Task<T>>>,
    next: usize,
    values: Vec<Option<T>>,
    remaining: usize,
    rejected: bool,
}

/// Runs `tasks` with at most `limit` in flight at once.
///
/// Results come back in task order, not completion order. The first
/// rejection rejects the combinator and prevents unstarted tasks from
/// launching; tasks already in flight run to completion but their
/// outcomes are discarded.
///
/// # Panics
///
/// Panics if `limit` is zero.
pub fn concurrent<T: Clone + Send + 'static>(
    event_loop: &EventLoop,
    tasks: Vec<Task<T>>,
    limit: usize,
) -> Promise<Vec<T>> {
    assert!(limit > 0, "concurrency limit must be non-zero");
    let result = Promise::pending(event_loop);
    let total = tasks.len();
    if total == 0 {
        result.resolve(Vec::new());
        return result;
    }
    let state = Arc::new(Mutex::new(ConcurrentState {
        tasks: tasks.into_iter().map(Some).collect(),
        next: 0,
        values: (0..total).map(|_| None).collect(),
        remaining: total,
        rejected: false,
    }));
    for _ in 0..limit.min(total) {
        launch_next(&state, &result);
    }
    result
}

fn launch_next<T: Clone + Send + 'static>(
    state: &Arc<Mutex<ConcurrentState<T>>>,
    result: &Promise<Vec<T>>,
) {
    let (index, task) = {
        let mut s = state.lock();
        if s.rejected || s.next >= s.tasks.len() {
            return;
        }
        let index = s.next;
        s.next += 1;
        match s.tasks[index].take() {
            Some(task) => (index, task),
            None => return,
        }
    };
    let promise = task();
    let state = Arc::clone(state);
    let result = result.clone();
    promise.subscribe(move |outcome| match outcome {
        Ok(value) => {
            let finished = {
                let mut s = state.lock();
                if s.rejected {
                    return;
                }
                if s.values[index].is_none() {
                    s.values[index] = Some(value);
                    s.remaining -= 1;
                }
                if s.remaining == 0 {
                    s.values.iter_mut().map(Option::take).collect::<Option<Vec<T>>>()
                } else {
                    None
                }
            };
            match finished {
                Some(values) => result.resolve(values),
                None => launch_next(&state, &result),
            }
        }
        Err(error) => {
            let first = {
                let mut s = state.lock();
                if s.rejected {
                    false
                } else {
                    s.rejected = true;
                    true
                }
            };
            if first {
                result.reject(error);
            }
        }
    });
}
