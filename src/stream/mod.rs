//! Streaming producer/consumer plumbing.
//!
//! This module provides the two halves of the streaming engine:
//!
//! - [`ChunkProducer`]: a pull-producer feeding chunked writes. Each call
//!   returns the next byte chunk or `None` at end of stream.
//! - [`ChunkSeq`] / [`LineSeq`]: lazy sequences handed to callers by
//!   chunked reads. Chunks are materialized by the event loop; pulling
//!   from an empty sequence drives the loop until the next chunk arrives.
//!
//! [`Coalescer`] adapts producer to producer, concatenating small yields
//! until a configured threshold; it is pure glue with no I/O of its own.

mod buffered;
mod lazy;
mod line_split;
mod producer;

pub use buffered::Coalescer;
pub use lazy::{ChunkSeq, LineSeq, PullError};
pub(crate) use lazy::{SeqHandle, SeqShared};
pub use line_split::LineSplitter;
pub use producer::{
    producer_from_fn, producer_from_iter, ChunkProducer, FnProducer, IterProducer, WriteSource,
};

/// Default chunk size for streaming reads, in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Chunk size used by streaming copies, in bytes.
pub(crate) const COPY_CHUNK_SIZE: usize = 64 * 1024;
