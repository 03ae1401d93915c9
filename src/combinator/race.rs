//! First settlement wins.

use crate::future::Promise;
use crate::runtime::EventLoop;

/// Settles with the first settlement among `promises`, fulfillment or
/// rejection alike. Later settlements are ignored by single-assignment.
///
/// An empty input never settles.
pub fn race<T: Clone + Send + 'static>(
    event_loop: &EventLoop,
    promises: Vec<Promise<T>>,
) -> Promise<T> {
    let result = Promise::pending(event_loop);
    for promise in promises {
        let result = result.clone();
        promise.subscribe(move |outcome| match outcome {
            Ok(value) => result.resolve(value),
            Err(error) => result.reject(error),
        });
    }
    result
}
