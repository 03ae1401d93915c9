//! Lazy chunk and line sequences.
//!
//! A chunked read fulfills its future with a [`ChunkSeq`]: an iterable
//! whose chunks are materialized by the event loop. Pulling from an empty
//! sequence re-enters the loop until the next chunk arrives, the producer
//! side finishes, or the loop runs dry. Cancelling the originating future
//! invalidates the sequence; every later pull yields
//! [`PullError::Cancelled`].

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{FsError, FsErrorKind};
use crate::runtime::{EventLoop, OpId};
use crate::stream::LineSplitter;

/// Failure surfaced by pulling on a lazy sequence.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PullError {
    /// The originating operation was cancelled; the sequence is invalid.
    #[error("chunk sequence invalidated by cancellation")]
    Cancelled,
    /// The event loop ran out of work before the next chunk arrived.
    #[error("event loop ran out of work before the next chunk")]
    Stalled,
    /// The underlying operation failed.
    #[error(transparent)]
    Failed(#[from] FsError),
}

/// Producer-side state shared between an in-flight read operation and the
/// sequence handed to the caller.
#[derive(Debug, Default)]
pub(crate) struct SeqShared {
    queue: VecDeque<Vec<u8>>,
    produced: u64,
    done: bool,
    cancelled: bool,
    failed: Option<FsError>,
}

/// Shared handle to [`SeqShared`].
pub(crate) type SeqHandle = Arc<Mutex<SeqShared>>;

impl SeqShared {
    pub(crate) fn new_handle() -> SeqHandle {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Appends a materialized chunk.
    pub(crate) fn push(&mut self, chunk: Vec<u8>) {
        self.produced += chunk.len() as u64;
        self.queue.push_back(chunk);
    }

    /// Marks the producer side complete.
    pub(crate) fn finish(&mut self) {
        self.done = true;
    }

    /// Records a producer-side failure; later pulls yield it once and then
    /// behave as exhausted.
    pub(crate) fn fail(&mut self, error: FsError) {
        self.failed = Some(error);
        self.done = true;
    }

    /// Invalidates the sequence after cancellation.
    pub(crate) fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Total bytes pushed so far.
    pub(crate) fn bytes_produced(&self) -> u64 {
        self.produced
    }

    #[cfg(test)]
    pub(crate) fn pop_for_test(&mut self) -> Option<Vec<u8>> {
        self.queue.pop_front()
    }
}

/// A lazy sequence of byte chunks produced by a chunked read.
///
/// Iterable at least once; clones share the same underlying queue, so the
/// sequence as a whole is consumed once. Pulling may drive the event loop
/// until the next chunk is available.
#[derive(Debug, Clone)]
pub struct ChunkSeq {
    shared: SeqHandle,
    event_loop: EventLoop,
    op_id: OpId,
    path: PathBuf,
}

impl ChunkSeq {
    pub(crate) fn new(shared: SeqHandle, event_loop: EventLoop, op_id: OpId, path: PathBuf) -> Self {
        Self {
            shared,
            event_loop,
            op_id,
            path,
        }
    }

    /// The id of the operation producing this sequence.
    #[must_use]
    pub fn operation_id(&self) -> OpId {
        self.op_id
    }

    /// The path the sequence reads from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pulls the next chunk, driving the event loop while the queue is
    /// empty and the producer side is still live.
    pub fn next_chunk(&mut self) -> Option<Result<Vec<u8>, PullError>> {
        loop {
            {
                let mut shared = self.shared.lock();
                if shared.cancelled {
                    return Some(Err(PullError::Cancelled));
                }
                if let Some(chunk) = shared.queue.pop_front() {
                    return Some(Ok(chunk));
                }
                if let Some(error) = shared.failed.take() {
                    return Some(Err(PullError::Failed(error)));
                }
                if shared.done {
                    return None;
                }
            }
            if !self.event_loop.turn() {
                return Some(Err(PullError::Stalled));
            }
        }
    }
}

impl Iterator for ChunkSeq {
    type Item = Result<Vec<u8>, PullError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk()
    }
}

/// A lazy sequence of lines layered over a [`ChunkSeq`].
///
/// Splits on `\n`, `\r\n`, and bare `\r`, reassembling lines across chunk
/// boundaries. The `trim` option strips leading and trailing whitespace
/// per line; `skip_empty` drops lines that are empty after any requested
/// trim.
#[derive(Debug, Clone)]
pub struct LineSeq {
    chunks: ChunkSeq,
    splitter: LineSplitter,
    pending: VecDeque<Vec<u8>>,
    finished: bool,
    trim: bool,
    skip_empty: bool,
}

impl LineSeq {
    pub(crate) fn new(chunks: ChunkSeq, trim: bool, skip_empty: bool) -> Self {
        Self {
            chunks,
            splitter: LineSplitter::new(),
            pending: VecDeque::new(),
            finished: false,
            trim,
            skip_empty,
        }
    }

    /// The id of the operation producing this sequence.
    #[must_use]
    pub fn operation_id(&self) -> OpId {
        self.chunks.operation_id()
    }

    fn decode(&self, raw: Vec<u8>) -> Result<String, PullError> {
        String::from_utf8(raw).map_err(|e| {
            PullError::Failed(
                FsError::new(FsErrorKind::ReadFailed, "read_lines", self.chunks.path())
                    .with_message(format!("invalid utf-8 in line: {e}")),
            )
        })
    }

    /// Pulls the next line.
    pub fn next_line(&mut self) -> Option<Result<String, PullError>> {
        loop {
            while let Some(raw) = self.pending.pop_front() {
                let mut line = match self.decode(raw) {
                    Ok(line) => line,
                    Err(e) => return Some(Err(e)),
                };
                if self.trim {
                    line = line.trim().to_string();
                }
                if self.skip_empty && line.is_empty() {
                    continue;
                }
                return Some(Ok(line));
            }
            if self.finished {
                return None;
            }
            match self.chunks.next_chunk() {
                Some(Ok(chunk)) => {
                    self.pending.extend(self.splitter.push(&chunk));
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    if let Some(last) = self.splitter.finish() {
                        self.pending.push_back(last);
                    }
                }
            }
        }
    }
}

impl Iterator for LineSeq {
    type Item = Result<String, PullError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line()
    }
}
