//! Collect every outcome.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::FsError;
use crate::future::Promise;
use crate::runtime::EventLoop;

/// The settlement of one member of an [`all_settled`] join.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The member fulfilled with this value.
    Fulfilled(T),
    /// The member rejected with this error.
    Rejected(FsError),
}

impl<T> Outcome<T> {
    /// True if the member fulfilled.
    #[must_use]
    pub const fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    /// True if the member rejected.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// The fulfilled value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Fulfilled(v) => Some(v),
            Self::Rejected(_) => None,
        }
    }

    /// The rejection reason, if any.
    #[must_use]
    pub const fn reason(&self) -> Option<&FsError> {
        match self {
            Self::Fulfilled(_) => None,
            Self::Rejected(e) => Some(e),
        }
    }
}

struct SettledState<T> {
    outcomes: Vec<Option<Outcome<T>>>,
    remaining: usize,
}

/// Fulfills with one [`Outcome`] per input, positionally, once every
/// member settles. Never rejects; output length always equals input
/// length.
pub fn all_settled<T: Clone + Send + 'static>(
    event_loop: &EventLoop,
    promises: Vec<Promise<T>>,
) -> Promise<Vec<Outcome<T>>> {
    let result = Promise::pending(event_loop);
    let total = promises.len();
    if total == 0 {
        result.resolve(Vec::new());
        return result;
    }
    let state = Arc::new(Mutex::new(SettledState {
        outcomes: (0..total).map(|_| None).collect(),
        remaining: total,
    }));
    for (index, promise) in promises.into_iter().enumerate() {
        let state = Arc::clone(&state);
        let result = result.clone();
        promise.subscribe(move |settlement| {
            let finished = {
                let mut s = state.lock();
                if s.outcomes[index].is_none() {
                    s.outcomes[index] = Some(match settlement {
                        Ok(v) => Outcome::Fulfilled(v),
                        Err(e) => Outcome::Rejected(e),
                    });
                    s.remaining -= 1;
                }
                if s.remaining == 0 {
                    s.outcomes
                        .iter_mut()
                        .map(Option::take)
                        .collect::<Option<Vec<Outcome<T>>>>()
                } else {
                    None
                }
            };
            if let Some(outcomes) = finished {
                result.resolve(outcomes);
            }
        });
    }
    result
}
