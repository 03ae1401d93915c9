//! Combinators over futures.
//!
//! - [`all`]: positional join, first rejection wins
//! - [`race`]: first settlement wins
//! - [`all_settled`]: collect every outcome, never rejects
//! - [`concurrent`]: bounded-concurrency execution of task thunks
//! - [`batch`]: consecutive groups of task thunks, groups in order
//!
//! There is no built-in timeout; callers compose [`race`] with a
//! timer-resolved promise and cancel the loser.

mod all;
mod all_settled;
mod batch;
mod concurrent;
mod race;

pub use all::all;
pub use all_settled::{all_settled, Outcome};
pub use batch::batch;
pub use concurrent::{concurrent, Task};
pub use race::race;
