//! tidefs: an asynchronous filesystem operations engine.
//!
//! A non-blocking facade that exposes file and directory operations as
//! deferred, composable, selectively-cancellable computations driven by a
//! cooperative event loop.
//!
//! # Architecture
//!
//! - [`error`]: the closed error taxonomy and the one place raw OS errors
//!   are classified.
//! - [`future`]: the two-tier future core — atomic [`Promise`] and
//!   [`Cancellable`] with cancel-handler propagation.
//! - [`combinator`]: `all` / `race` / `all_settled` / bounded-concurrency
//!   / batched execution over futures.
//! - [`runtime`]: the cooperative [`EventLoop`] owning microtasks,
//!   timers, file operations, and watcher polls.
//! - [`stream`]: pull-producers, the coalescing buffer, the line
//!   splitter, and the lazy chunk/line sequences.
//! - [`watch`]: the polling watcher engine.
//! - [`fs`]: OS primitives plus the [`FsHandler`] facade that binds
//!   operations to futures.
//!
//! # Example
//!
//! ```no_run
//! use tidefs::fs::{FsHandler, ReadOptions, WriteOptions};
//! use tidefs::runtime::EventLoop;
//!
//! let handler = FsHandler::new(EventLoop::new());
//! handler
//!     .write("/tmp/greeting", "Hello, World!", WriteOptions::default())
//!     .wait()
//!     .unwrap();
//! let bytes = handler
//!     .read("/tmp/greeting", ReadOptions::range(7, 5))
//!     .wait()
//!     .unwrap();
//! assert_eq!(bytes, b"World");
//! ```
//!
//! # Cancellation
//!
//! Streaming operations return a [`Cancellable`] future. Cancelling one
//! stops the operation at the next chunk boundary and, for
//! output-producing operations, removes the partial output file. Atomic
//! operations are indivisible and expose no cancel.

pub mod combinator;
pub mod error;
pub mod fs;
pub mod future;
pub mod runtime;
pub mod stream;
pub mod watch;

#[cfg(test)]
pub mod test_utils;

pub use error::{FsError, FsErrorKind};
pub use fs::{FileStats, FsHandler};
pub use future::{Cancellable, Promise, Step, WaitError};
pub use runtime::EventLoop;
pub use stream::{ChunkProducer, ChunkSeq, LineSeq, PullError};
pub use watch::{WatchEvent, WatcherId};
