//! Deferred results: the future core.
//!
//! Two tiers of future run through this module:
//!
//! - [`Promise`]: the atomic future. States are Pending, Fulfilled,
//!   Rejected, and (internally) Cancelled; the state is single-assignment
//!   and continuations fire in registration order.
//! - [`Cancellable`]: a promise plus a cancel capability — a cancel
//!   handler slot and a public [`cancel`](Cancellable::cancel). Chaining
//!   a cancellable future yields another cancellable future whose cancel
//!   propagates upstream.
//!
//! The distinction is deliberate API surface: an operation handing back a
//! plain [`Promise`] is indivisible, one handing back a [`Cancellable`]
//! can be abandoned mid-flight with its partial effects cleaned up.

mod cancellable;
mod promise;

pub use cancellable::Cancellable;
pub use promise::{Promise, Step};

use crate::error::FsError;

/// Failure surfaced by blocking on a future.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WaitError {
    /// The future was cancelled; it will never settle.
    #[error("future was cancelled before settling")]
    Cancelled,
    /// The event loop drained with the future still pending.
    #[error("event loop ran out of work before the future settled")]
    Stalled,
    /// The future rejected.
    #[error(transparent)]
    Failed(#[from] FsError),
}

impl WaitError {
    /// Returns the rejection error, if that is what this is.
    #[must_use]
    pub fn into_rejection(self) -> Option<FsError> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Cancelled | Self::Stalled => None,
        }
    }

    /// True if the wait ended because of cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
