//! Positional join.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::future::Promise;
use crate::runtime::EventLoop;

struct AllState<T> {
    values: Vec<Option<T>>,
    remaining: usize,
    rejected: bool,
}

/// Fulfills with every value, positionally, once all fulfill; rejects
/// with the first rejection and discards the remaining outcomes.
///
/// An empty input fulfills immediately with an empty vector.
pub fn all<T: Clone + Send + 'static>(
    event_loop: &EventLoop,
    promises: Vec<Promise<T>>,
) -> Promise<Vec<T>> {
    let result = Promise::pending(event_loop);
    let total = promises.len();
    if total == 0 {
        result.resolve(Vec::new());
        return result;
    }
    let state = Arc::new(Mutex::new(AllState {
        values: (0..total).map(|_| None).collect(),
        remaining: total,
        rejected: false,
    }));
    for (index, promise) in promises.into_iter().enumerate() {
        let state = Arc::clone(&state);
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
                if let Some(values) = finished {
                    result.resolve(values);
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
    result
}
