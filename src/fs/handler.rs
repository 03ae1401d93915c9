//! The filesystem handler facade.
//!
//! Pairs every public operation with a future and registers the matching
//! operation record with the event loop. The split between the two future
//! tiers is part of the contract:
//!
//! - atomic (indivisible, non-cancellable): `read`, `write`, `append`,
//!   `delete`, `exists`, `stats`, `create_directory`, `remove_directory`,
//!   `copy`, `rename`;
//! - cancellable (chunked, cancellation honoured at chunk boundaries):
//!   `read_stream`, `read_chunks`, `read_lines`, `write_stream`,
//!   `write_chunks`, `copy_stream`.
//!
//! Cancel handlers deregister the operation and, for output-producing
//! operations, schedule a fire-and-forget deletion of the partial output.
//! Raw OS errors are classified into the taxonomy exactly once, here.

use std::path::PathBuf;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{classify, classify_copy, classify_stream, FsError, FsErrorKind};
use crate::future::{Cancellable, Promise};
use crate::runtime::{
    AtomicOp, CompleteFn, CopyChunksState, EventLoop, OpKind, OpOutput, OpSpec, OpState,
    ReadAllState, ReadChunksState, ReadyFn, WriteProducerState,
};
use crate::stream::{
    ChunkProducer, ChunkSeq, Coalescer, LineSeq, SeqShared, WriteSource, DEFAULT_CHUNK_SIZE,
};
use crate::watch::{WatchEvent, WatcherId};

use super::options::{
    ChunkOptions, ChunkWriteOptions, LineOptions, MkdirOptions, ReadOptions, RmdirOptions,
    WatchOptions, WriteOptions,
};
use super::primitives;
use super::stats::FileStats;

/// The filesystem operations facade.
///
/// Cheap to clone; clones share the same event loop.
#[derive(Debug, Clone)]
pub struct FsHandler {
    event_loop: EventLoop,
}

fn unexpected(op: &'static str, path: &std::path::Path) -> FsError {
    FsError::new(FsErrorKind::Other, op, path)
        .with_message("operation produced an unexpected result shape")
}

impl FsHandler {
    /// Creates a handler driving operations on `event_loop`.
    #[must_use]
    pub fn new(event_loop: EventLoop) -> Self {
        Self { event_loop }
    }

    /// The loop this handler schedules on.
    #[must_use]
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Reads a file (optionally a byte range) as a single unit.
    pub fn read(&self, path: impl Into<PathBuf>, opts: ReadOptions) -> Promise<Vec<u8>> {
        self.atomic_op(
            OpKind::Read,
            path.into(),
            None,
            OpState::Atomic(AtomicOp::Read {
                offset: opts.offset,
                length: opts.length,
            }),
            |out| match out {
                OpOutput::Bytes(b) => Some(b),
                _ => None,
            },
        )
    }

    /// Reads a file chunk by chunk, fulfilling with the concatenated
    /// bytes. Behaviourally identical to [`read`](Self::read) except that
    /// it can be cancelled between chunks.
    pub fn read_stream(&self, path: impl Into<PathBuf>, opts: ReadOptions) -> Cancellable<Vec<u8>> {
        self.cancellable_op(
            OpKind::ReadStream,
            path.into(),
            None,
            OpState::ReadAll(ReadAllState::new(opts.offset, opts.length, DEFAULT_CHUNK_SIZE)),
            None,
            |out| match out {
                OpOutput::Bytes(b) => Some(b),
                _ => None,
            },
        )
    }

    /// Reads a file as a lazy sequence of chunks.
    ///
    /// The future fulfills once the file is open; chunks materialize one
    /// per tick. Cancelling invalidates the sequence and stops the
    /// reader.
    pub fn read_chunks(&self, path: impl Into<PathBuf>, opts: ChunkOptions) -> Cancellable<ChunkSeq> {
        self.chunk_read_future(
            OpKind::ReadChunks,
            path.into(),
            opts.offset,
            opts.length,
            opts.chunk_size,
            |seq| seq,
        )
    }

    /// Reads a file as a lazy sequence of lines, splitting on `\n`,
    /// `\r\n`, and bare `\r`.
    pub fn read_lines(&self, path: impl Into<PathBuf>, opts: LineOptions) -> Cancellable<LineSeq> {
        let LineOptions {
            chunk_size,
            trim,
            skip_empty,
        } = opts;
        self.chunk_read_future(OpKind::ReadLines, path.into(), 0, None, chunk_size, move |seq| {
            LineSeq::new(seq, trim, skip_empty)
        })
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Writes a buffer whole, fulfilling with the byte count.
    pub fn write(
        &self,
        path: impl Into<PathBuf>,
        data: impl Into<Vec<u8>>,
        opts: WriteOptions,
    ) -> Promise<u64> {
        self.atomic_op(
            OpKind::Write,
            path.into(),
            None,
            OpState::Atomic(AtomicOp::Write {
                data: data.into(),
                opts,
            }),
            |out| match out {
                OpOutput::Written(n) => Some(n),
                _ => None,
            },
        )
    }

    /// Writes from a byte string or pull-producer, cancellable between
    /// chunks. Cancellation removes the partial output.
    pub fn write_stream(
        &self,
        path: impl Into<PathBuf>,
        data: impl Into<WriteSource>,
        opts: WriteOptions,
    ) -> Cancellable<u64> {
        let path = path.into();
        self.cancellable_op(
            OpKind::WriteStream,
            path.clone(),
            None,
            OpState::WriteProducer(WriteProducerState::new(data.into().into_producer(), opts)),
            Some(path),
            |out| match out {
                OpOutput::Written(n) => Some(n),
                _ => None,
            },
        )
    }

    /// Writes every chunk a producer yields, cancellable between chunks.
    ///
    /// With a positive `buffer_size` the producer is transparently
    /// wrapped in a coalescing buffer so small yields become writes of at
    /// least that size. Cancellation removes the partial output.
    pub fn write_chunks(
        &self,
        path: impl Into<PathBuf>,
        producer: impl ChunkProducer + 'static,
        opts: ChunkWriteOptions,
    ) -> Cancellable<u64> {
        let path = path.into();
        let producer: Box<dyn ChunkProducer> = if opts.buffer_size > 0 {
            Box::new(Coalescer::new(producer, opts.buffer_size))
        } else {
            Box::new(producer)
        };
        self.cancellable_op(
            OpKind::WriteChunks,
            path.clone(),
            None,
            OpState::WriteProducer(WriteProducerState::new(producer, opts.write_options())),
            Some(path),
            |out| match out {
                OpOutput::Written(n) => Some(n),
                _ => None,
            },
        )
    }

    /// Appends a buffer, fulfilling with the byte count appended.
    pub fn append(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) -> Promise<u64> {
        self.atomic_op(
            OpKind::Append,
            path.into(),
            None,
            OpState::Atomic(AtomicOp::Append { data: data.into() }),
            |out| match out {
                OpOutput::Written(n) => Some(n),
                _ => None,
            },
        )
    }

    // ------------------------------------------------------------------
    // Metadata and structure
    // ------------------------------------------------------------------

    /// Reports whether a path exists. The empty path fulfills with
    /// `false` rather than rejecting.
    pub fn exists(&self, path: impl Into<PathBuf>) -> Promise<bool> {
        self.atomic_op(
            OpKind::Exists,
            path.into(),
            None,
            OpState::Atomic(AtomicOp::Exists),
            |out| match out {
                OpOutput::Flag(b) => Some(b),
                _ => None,
            },
        )
    }

    /// Stats a path.
    pub fn stats(&self, path: impl Into<PathBuf>) -> Promise<FileStats> {
        self.atomic_op(
            OpKind::Stat,
            path.into(),
            None,
            OpState::Atomic(AtomicOp::Stat),
            |out| match out {
                OpOutput::Stats(s) => Some(s),
                _ => None,
            },
        )
    }

    /// Deletes a file.
    pub fn delete(&self, path: impl Into<PathBuf>) -> Promise<()> {
        self.atomic_op(
            OpKind::Delete,
            path.into(),
            None,
            OpState::Atomic(AtomicOp::Delete),
            unit_output,
        )
    }

    /// Copies a file whole.
    pub fn copy(&self, src: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Promise<()> {
        self.atomic_op(
            OpKind::Copy,
            src.into(),
            Some(dest.into()),
            OpState::Atomic(AtomicOp::Copy),
            unit_output,
        )
    }

    /// Copies a file chunk by chunk, cancellable between chunks.
    /// Cancellation removes the partial destination.
    pub fn copy_stream(&self, src: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Cancellable<()> {
        let dest = dest.into();
        self.cancellable_op(
            OpKind::CopyStream,
            src.into(),
            Some(dest.clone()),
            OpState::CopyChunks(CopyChunksState::new()),
            Some(dest),
            unit_output,
        )
    }

    /// Renames a path.
    pub fn rename(&self, old: impl Into<PathBuf>, new: impl Into<PathBuf>) -> Promise<()> {
        self.atomic_op(
            OpKind::Rename,
            old.into(),
            Some(new.into()),
            OpState::Atomic(AtomicOp::Rename),
            unit_output,
        )
    }

    /// Creates a directory.
    pub fn create_directory(&self, path: impl Into<PathBuf>, opts: MkdirOptions) -> Promise<()> {
        self.atomic_op(
            OpKind::Mkdir,
            path.into(),
            None,
            OpState::Atomic(AtomicOp::Mkdir { opts }),
            unit_output,
        )
    }

    /// Removes a directory, recursively by default.
    pub fn remove_directory(&self, path: impl Into<PathBuf>, opts: RmdirOptions) -> Promise<()> {
        self.atomic_op(
            OpKind::Rmdir,
            path.into(),
            None,
            OpState::Atomic(AtomicOp::Rmdir {
                recursive: opts.recursive,
            }),
            unit_output,
        )
    }

    // ------------------------------------------------------------------
    // Watching and timing
    // ------------------------------------------------------------------

    /// Watches a path, invoking `callback` with each detected event.
    pub fn watch(
        &self,
        path: impl Into<PathBuf>,
        callback: impl FnMut(WatchEvent, &std::path::Path) + Send + 'static,
        opts: WatchOptions,
    ) -> WatcherId {
        self.event_loop.add_watcher(path.into(), Box::new(callback), opts)
    }

    /// Stops a watcher. Returns whether it was still registered.
    pub fn unwatch(&self, id: &WatcherId) -> bool {
        self.event_loop.remove_watcher(id)
    }

    /// A promise that fulfills after `duration`; the building block for
    /// caller-composed timeouts via [`crate::combinator::race`].
    pub fn delay(&self, duration: Duration) -> Promise<()> {
        let promise = Promise::pending(&self.event_loop);
        let settle = promise.clone();
        self.event_loop.add_timer(duration, move || settle.resolve(()));
        promise
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn atomic_op<T: Clone + Send + 'static>(
        &self,
        kind: OpKind,
        path: PathBuf,
        dest: Option<PathBuf>,
        state: OpState,
        extract: impl FnOnce(OpOutput) -> Option<T> + Send + 'static,
    ) -> Promise<T> {
        let promise = Promise::pending(&self.event_loop);
        let settle = promise.clone();
        let err_path = path.clone();
        let err_dest = dest.clone();
        let complete: CompleteFn = Box::new(move |res| match res {
            Ok(out) => match extract(out) {
                Some(v) => settle.resolve(v),
                None => settle.reject(unexpected(kind.name(), &err_path)),
            },
            Err(failure) => {
                let error = match (kind, err_dest.as_deref()) {
                    (OpKind::Copy, Some(d)) => {
                        classify_copy(kind.name(), &err_path, d, failure.error)
                    }
                    (OpKind::Rename, Some(d)) => {
                        classify(kind.name(), kind.direction(), &err_path, failure.error)
                            .with_dest(d)
                    }
                    _ => classify(kind.name(), kind.direction(), &err_path, failure.error),
                };
                settle.reject(error);
            }
        });
        let aborted = promise.clone();
        self.event_loop.add_file_operation(OpSpec {
            kind,
            path,
            dest,
            state,
            complete,
            on_ready: None,
            abort: Some(Box::new(move || aborted.cancel_silent())),
        });
        promise
    }

    fn cancellable_op<T: Clone + Send + 'static>(
        &self,
        kind: OpKind,
        path: PathBuf,
        dest: Option<PathBuf>,
        state: OpState,
        cleanup: Option<PathBuf>,
        extract: impl FnOnce(OpOutput) -> Option<T> + Send + 'static,
    ) -> Cancellable<T> {
        let fut = Cancellable::pending(&self.event_loop);
        let settle = fut.clone();
        let err_path = path.clone();
        let err_dest = dest.clone();
        let complete: CompleteFn = Box::new(move |res| match res {
            Ok(out) => match extract(out) {
                Some(v) => settle.resolve(v),
                None => settle.reject(unexpected(kind.name(), &err_path)),
            },
            Err(failure) => {
                let error = match (kind, err_dest.as_deref()) {
                    (OpKind::CopyStream, Some(d)) => {
                        classify_copy(kind.name(), &err_path, d, failure.error)
                            .with_bytes_processed(failure.processed)
                    }
                    _ => classify_stream(
                        kind.name(),
                        kind.direction(),
                        &err_path,
                        failure.processed,
                        failure.error,
                    ),
                };
                settle.reject(error);
            }
        });
        let aborted = fut.clone();
        let abort_cleanup = cleanup.clone();
        let abort_loop = self.event_loop.clone();
        let op_id = self.event_loop.allocate_op_id();
        self.event_loop.submit_op(
            op_id,
            OpSpec {
                kind,
                path,
                dest,
                state,
                complete,
                on_ready: None,
                // Reset drains the record before the upstream hook can see
                // it, so the partial-output cleanup is scheduled here too.
                abort: Some(Box::new(move || {
                    aborted.cancel();
                    if let Some(partial) = abort_cleanup {
                        abort_loop.enqueue(move || primitives::remove_partial_output(&partial));
                    }
                })),
            },
        );
        let el = self.event_loop.clone();
        fut.set_upstream(move || {
            let was_live = el.cancel_file_operation(op_id);
            if was_live {
                if let Some(partial) = cleanup {
                    // Fire-and-forget: the partial output vanishes on the
                    // next tick, after the record drop has closed its handle.
                    el.enqueue(move || primitives::remove_partial_output(&partial));
                }
            }
        });
        fut
    }

    fn chunk_read_future<S, F>(
        &self,
        kind: OpKind,
        path: PathBuf,
        offset: u64,
        length: Option<u64>,
        chunk_size: usize,
        wrap: F,
    ) -> Cancellable<S>
    where
        S: Clone + Send + 'static,
        F: FnOnce(ChunkSeq) -> S + Send + 'static,
    {
        let shared = SeqShared::new_handle();
        let fut: Cancellable<S> = Cancellable::pending(&self.event_loop);
        let op_id = self.event_loop.allocate_op_id();

        let settle = fut.clone();
        let seq_shared = shared.clone();
        let seq_loop = self.event_loop.clone();
        let seq_path = path.clone();
        let on_ready: ReadyFn = Box::new(move |res| match res {
            Ok(()) => settle.resolve(wrap(ChunkSeq::new(seq_shared, seq_loop, op_id, seq_path))),
            Err(e) => settle.reject(classify(kind.name(), kind.direction(), &seq_path, e)),
        });

        let fail_shared = shared.clone();
        let fail_path = path.clone();
        let complete: CompleteFn = Box::new(move |res| {
            if let Err(failure) = res {
                fail_shared.lock().fail(classify_stream(
                    kind.name(),
                    kind.direction(),
                    &fail_path,
                    failure.processed,
                    failure.error,
                ));
            }
        });

        let aborted = fut.clone();
        self.event_loop.submit_op(
            op_id,
            OpSpec {
                kind,
                path,
                dest: None,
                state: OpState::ReadChunks(ReadChunksState::new(
                    offset,
                    length,
                    chunk_size,
                    shared.clone(),
                )),
                complete,
                on_ready: Some(on_ready),
                abort: Some(Box::new(move || aborted.cancel())),
            },
        );

        let el = self.event_loop.clone();
        fut.set_upstream(move || {
            el.cancel_file_operation(op_id);
            shared.lock().cancel();
        });
        fut
    }
}

fn unit_output(out: OpOutput) -> Option<()> {
    match out {
        OpOutput::Unit => Some(()),
        _ => None,
    }
}

// ----------------------------------------------------------------------
// Process-wide handler
// ----------------------------------------------------------------------

static GLOBAL: Mutex<Option<FsHandler>> = Mutex::new(None);

/// Returns the process-wide handler, lazily creating it (and its event
/// loop) on first use.
#[must_use]
pub fn global() -> FsHandler {
    GLOBAL
        .lock()
        .get_or_insert_with(|| FsHandler::new(EventLoop::new()))
        .clone()
}

/// Tears down the process-wide handler: resets its event loop (aborting
/// in-flight operations and stopping every watcher) and drops the
/// instance so the next [`global`] call starts fresh. Intended for
/// tests.
pub fn reset_global() {
    let previous = GLOBAL.lock().take();
    if let Some(handler) = previous {
        handler.event_loop().reset();
    }
}
