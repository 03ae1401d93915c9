//! Filesystem operation records and their per-tick state machines.
//!
//! An operation registered with the event loop is an [`OpRecord`]: the
//! operation id, kind, paths, a state machine, and the completion hooks.
//! Atomic operations run to completion in a single step; streaming
//! operations advance one chunk per step, making every chunk boundary a
//! cancellation checkpoint.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::OpDirection;
use crate::fs::options::{MkdirOptions, WriteOptions};
use crate::fs::primitives;
use crate::fs::FileStats;
use crate::stream::{ChunkProducer, SeqHandle, COPY_CHUNK_SIZE};

/// Identifier for a registered file operation.
///
/// Monotonically increasing; never reused while a record is live.
pub type OpId = u64;

/// The kind of a file operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Whole-file read.
    Read,
    /// Cancellable whole-file read, chunked internally.
    ReadStream,
    /// Chunked read fulfilling with a lazy chunk sequence.
    ReadChunks,
    /// Chunked read fulfilling with a lazy line sequence.
    ReadLines,
    /// Whole-buffer write.
    Write,
    /// Cancellable chunked write.
    WriteStream,
    /// Producer-driven chunked write.
    WriteChunks,
    /// Append to a file.
    Append,
    /// Delete a file.
    Delete,
    /// Existence check.
    Exists,
    /// Stat a path.
    Stat,
    /// Create a directory.
    Mkdir,
    /// Remove a directory.
    Rmdir,
    /// Whole-file copy.
    Copy,
    /// Cancellable chunked copy.
    CopyStream,
    /// Rename a path.
    Rename,
}

impl OpKind {
    /// Returns the operation name used in error context and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::ReadStream => "read_stream",
            Self::ReadChunks => "read_chunks",
            Self::ReadLines => "read_lines",
            Self::Write => "write",
            Self::WriteStream => "write_stream",
            Self::WriteChunks => "write_chunks",
            Self::Append => "append",
            Self::Delete => "delete",
            Self::Exists => "exists",
            Self::Stat => "stat",
            Self::Mkdir => "create_directory",
            Self::Rmdir => "remove_directory",
            Self::Copy => "copy",
            Self::CopyStream => "copy_stream",
            Self::Rename => "rename",
        }
    }

    /// Returns the direction used by error classification.
    #[must_use]
    pub const fn direction(&self) -> OpDirection {
        match self {
            Self::Read | Self::ReadStream | Self::ReadChunks | Self::ReadLines => OpDirection::Read,
            Self::Write | Self::WriteStream | Self::WriteChunks | Self::Append => OpDirection::Write,
            Self::Delete
            | Self::Exists
            | Self::Stat
            | Self::Mkdir
            | Self::Rmdir
            | Self::Copy
            | Self::CopyStream
            | Self::Rename => OpDirection::Neutral,
        }
    }

    /// Returns true for operations that mutate the filesystem.
    ///
    /// The loop serializes mutating operations per path; reads on a path
    /// only wait for earlier mutations of that path.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        match self {
            Self::Write
            | Self::WriteStream
            | Self::WriteChunks
            | Self::Append
            | Self::Delete
            | Self::Mkdir
            | Self::Rmdir
            | Self::Copy
            | Self::CopyStream
            | Self::Rename => true,
            Self::Read | Self::ReadStream | Self::ReadChunks | Self::ReadLines | Self::Exists | Self::Stat => {
                false
            }
        }
    }
}

/// The successful result of a file operation.
#[derive(Debug)]
pub enum OpOutput {
    /// Bytes read.
    Bytes(Vec<u8>),
    /// Bytes written or appended.
    Written(u64),
    /// A boolean result (existence checks).
    Flag(bool),
    /// File statistics.
    Stats(FileStats),
    /// Completion with no payload.
    Unit,
}

/// A failed file operation: the raw OS error plus how many bytes were
/// processed before the failure.
#[derive(Debug)]
pub struct OpFailure {
    /// The raw OS error, not yet classified.
    pub error: io::Error,
    /// Bytes processed before the failure (zero for atomic operations
    /// that failed outright).
    pub processed: u64,
}

impl OpFailure {
    pub(crate) fn at(error: io::Error, processed: u64) -> Self {
        Self { error, processed }
    }
}

/// Completion callback: invoked exactly once unless the operation is
/// cancelled first.
pub type CompleteFn = Box<dyn FnOnce(Result<OpOutput, OpFailure>) + Send>;

/// Early-readiness callback used by chunked reads: fires once the source
/// is open, before any chunks are produced.
pub type ReadyFn = Box<dyn FnOnce(Result<(), io::Error>) + Send>;

/// Abort hook run when the loop is reset with the operation in flight.
pub type AbortFn = Box<dyn FnOnce() + Send>;

/// Everything the facade provides when registering an operation.
pub struct OpSpec {
    /// The operation kind.
    pub kind: OpKind,
    /// Primary path.
    pub path: PathBuf,
    /// Destination path for copy and rename.
    pub dest: Option<PathBuf>,
    /// The state machine to drive.
    pub state: OpState,
    /// Completion callback.
    pub complete: CompleteFn,
    /// Early-readiness callback for chunked reads.
    pub on_ready: Option<ReadyFn>,
    /// Abort hook for loop reset.
    pub abort: Option<AbortFn>,
}

/// A live operation record inside the loop registry.
pub(crate) struct OpRecord {
    pub(crate) kind: OpKind,
    pub(crate) path: PathBuf,
    pub(crate) dest: Option<PathBuf>,
    /// `None` while a step executes outside the registry lock.
    pub(crate) state: Option<OpState>,
    pub(crate) complete: Option<CompleteFn>,
    pub(crate) on_ready: Option<ReadyFn>,
    pub(crate) abort: Option<AbortFn>,
}

impl OpRecord {
    pub(crate) fn from_spec(spec: OpSpec) -> Self {
        Self {
            kind: spec.kind,
            path: spec.path,
            dest: spec.dest,
            state: Some(spec.state),
            complete: Some(spec.complete),
            on_ready: spec.on_ready,
            abort: spec.abort,
        }
    }

    fn touches(&self, path: &Path) -> bool {
        self.path == path || self.dest.as_deref() == Some(path)
    }

    /// Whether two records contend on a path such that the later one must
    /// wait. Reads may run concurrently; anything involving a mutation of
    /// a shared path is serialized in submission order.
    pub(crate) fn conflicts_with(&self, other: &Self) -> bool {
        let shared = other.touches(&self.path)
            || self
                .dest
                .as_deref()
                .is_some_and(|d| other.touches(d));
        shared && (self.kind.is_mutating() || other.kind.is_mutating())
    }
}

/// Result of advancing a state machine by one step.
pub(crate) enum StepOutcome {
    /// More steps remain.
    Continue,
    /// The source is open; fire the readiness hook and keep going.
    Ready,
    /// The operation finished.
    Done(OpOutput),
    /// The operation failed.
    Failed(OpFailure),
}

/// Per-operation state machine.
pub enum OpState {
    /// Runs to completion in one step.
    Atomic(AtomicOp),
    /// Chunked read accumulating the full contents.
    ReadAll(ReadAllState),
    /// Chunked read feeding a lazy sequence.
    ReadChunks(ReadChunksState),
    /// Producer-driven chunked write.
    WriteProducer(WriteProducerState),
    /// Chunked copy.
    CopyChunks(CopyChunksState),
}

impl OpState {
    pub(crate) fn step(&mut self, path: &Path, dest: Option<&Path>) -> StepOutcome {
        match self {
            Self::Atomic(op) => match op.run(path, dest) {
                Ok(out) => StepOutcome::Done(out),
                Err(e) => StepOutcome::Failed(OpFailure::at(e, 0)),
            },
            Self::ReadAll(state) => state.step(path),
            Self::ReadChunks(state) => state.step(path),
            Self::WriteProducer(state) => state.step(path),
            Self::CopyChunks(state) => state.step(path, dest),
        }
    }
}

fn require_dest<'p>(dest: Option<&'p Path>) -> io::Result<&'p Path> {
    dest.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "missing destination path"))
}

/// An operation that runs as a single indivisible unit.
pub enum AtomicOp {
    /// Ranged read.
    Read {
        /// Starting byte offset.
        offset: u64,
        /// Byte budget; `None` reads to EOF.
        length: Option<u64>,
    },
    /// Whole-buffer write.
    Write {
        /// The bytes to write.
        data: Vec<u8>,
        /// Write options.
        opts: WriteOptions,
    },
    /// Append.
    Append {
        /// The bytes to append.
        data: Vec<u8>,
    },
    /// File deletion.
    Delete,
    /// Existence check.
    Exists,
    /// Stat.
    Stat,
    /// Directory creation.
    Mkdir {
        /// Creation options.
        opts: MkdirOptions,
    },
    /// Directory removal.
    Rmdir {
        /// Remove contents recursively.
        recursive: bool,
    },
    /// Whole-file copy to the record's destination.
    Copy,
    /// Rename to the record's destination.
    Rename,
}

impl AtomicOp {
    fn run(&mut self, path: &Path, dest: Option<&Path>) -> io::Result<OpOutput> {
        match self {
            Self::Read { offset, length } => {
                primitives::read_range(path, *offset, *length).map(OpOutput::Bytes)
            }
            Self::Write { data, opts } => {
                let data = std::mem::take(data);
                primitives::write_bytes(path, &data, *opts).map(OpOutput::Written)
            }
            Self::Append { data } => {
                let data = std::mem::take(data);
                primitives::append_bytes(path, &data).map(OpOutput::Written)
            }
            Self::Delete => primitives::remove(path).map(|()| OpOutput::Unit),
            Self::Exists => Ok(OpOutput::Flag(primitives::exists(path))),
            Self::Stat => primitives::stat(path).map(OpOutput::Stats),
            Self::Mkdir { opts } => primitives::make_dir(path, *opts).map(|()| OpOutput::Unit),
            Self::Rmdir { recursive } => {
                primitives::remove_dir(path, *recursive).map(|()| OpOutput::Unit)
            }
            Self::Copy => primitives::copy_file(path, require_dest(dest)?).map(|()| OpOutput::Unit),
            Self::Rename => primitives::rename(path, require_dest(dest)?).map(|()| OpOutput::Unit),
        }
    }
}

/// Chunked read that accumulates the whole contents before completing.
pub struct ReadAllState {
    file: Option<File>,
    offset: u64,
    remaining: Option<u64>,
    chunk_size: usize,
    buf: Vec<u8>,
}

impl ReadAllState {
    /// Creates the state for a ranged, chunked read-all.
    #[must_use]
    pub fn new(offset: u64, length: Option<u64>, chunk_size: usize) -> Self {
        Self {
            file: None,
            offset,
            remaining: length,
            chunk_size,
            buf: Vec::new(),
        }
    }

    fn step(&mut self, path: &Path) -> StepOutcome {
        let Some(file) = self.file.as_mut() else {
            return match primitives::open_read(path, self.offset) {
                Ok(f) => {
                    self.file = Some(f);
                    StepOutcome::Continue
                }
                Err(e) => StepOutcome::Failed(OpFailure::at(e, 0)),
            };
        };
        match primitives::read_chunk(file, self.chunk_size, self.remaining) {
            Ok(chunk) if chunk.is_empty() => {
                self.file = None;
                StepOutcome::Done(OpOutput::Bytes(std::mem::take(&mut self.buf)))
            }
            Ok(chunk) => {
                if let Some(remaining) = &mut self.remaining {
                    *remaining -= chunk.len() as u64;
                }
                self.buf.extend_from_slice(&chunk);
                StepOutcome::Continue
            }
            Err(e) => StepOutcome::Failed(OpFailure::at(e, self.buf.len() as u64)),
        }
    }
}

/// Chunked read feeding a shared lazy-sequence queue.
pub struct ReadChunksState {
    file: Option<File>,
    offset: u64,
    remaining: Option<u64>,
    chunk_size: usize,
    shared: SeqHandle,
}

impl ReadChunksState {
    pub(crate) fn new(offset: u64, length: Option<u64>, chunk_size: usize, shared: SeqHandle) -> Self {
        Self {
            file: None,
            offset,
            remaining: length,
            chunk_size,
            shared,
        }
    }

    fn step(&mut self, path: &Path) -> StepOutcome {
        let Some(file) = self.file.as_mut() else {
            return match primitives::open_read(path, self.offset) {
                Ok(f) => {
                    self.file = Some(f);
                    StepOutcome::Ready
                }
                Err(e) => StepOutcome::Failed(OpFailure::at(e, 0)),
            };
        };
        match primitives::read_chunk(file, self.chunk_size, self.remaining) {
            Ok(chunk) if chunk.is_empty() => {
                self.file = None;
                self.shared.lock().finish();
                StepOutcome::Done(OpOutput::Unit)
            }
            Ok(chunk) => {
                if let Some(remaining) = &mut self.remaining {
                    *remaining -= chunk.len() as u64;
                }
                self.shared.lock().push(chunk);
                StepOutcome::Continue
            }
            Err(e) => {
                let processed = self.shared.lock().bytes_produced();
                StepOutcome::Failed(OpFailure::at(e, processed))
            }
        }
    }
}

/// Producer-driven chunked write.
pub struct WriteProducerState {
    file: Option<File>,
    producer: Box<dyn ChunkProducer>,
    opts: WriteOptions,
    written: u64,
}

impl WriteProducerState {
    /// Creates the state for a producer-driven write.
    #[must_use]
    pub fn new(producer: Box<dyn ChunkProducer>, opts: WriteOptions) -> Self {
        Self {
            file: None,
            producer,
            opts,
            written: 0,
        }
    }

    fn step(&mut self, path: &Path) -> StepOutcome {
        let Some(file) = self.file.as_mut() else {
            return match primitives::open_write(path, self.opts) {
                Ok(f) => {
                    self.file = Some(f);
                    StepOutcome::Continue
                }
                Err(e) => StepOutcome::Failed(OpFailure::at(e, 0)),
            };
        };
        match self.producer.next_chunk() {
            Some(chunk) => match file.write_all(&chunk) {
                Ok(()) => {
                    self.written += chunk.len() as u64;
                    StepOutcome::Continue
                }
                Err(e) => StepOutcome::Failed(OpFailure::at(e, self.written)),
            },
            None => match file.sync_all() {
                Ok(()) => {
                    self.file = None;
                    StepOutcome::Done(OpOutput::Written(self.written))
                }
                Err(e) => StepOutcome::Failed(OpFailure::at(e, self.written)),
            },
        }
    }
}

/// Chunked copy between two paths.
pub struct CopyChunksState {
    src: Option<File>,
    dst: Option<File>,
    copied: u64,
}

impl CopyChunksState {
    /// Creates the state for a chunked copy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            src: None,
            dst: None,
            copied: 0,
        }
    }

    fn step(&mut self, path: &Path, dest: Option<&Path>) -> StepOutcome {
        if self.src.is_none() {
            let dest = match require_dest(dest) {
                Ok(d) => d,
                Err(e) => return StepOutcome::Failed(OpFailure::at(e, 0)),
            };
            let src = match primitives::open_read(path, 0) {
                Ok(f) => f,
                Err(e) => return StepOutcome::Failed(OpFailure::at(e, 0)),
            };
            let dst = match primitives::open_write(dest, WriteOptions::default()) {
                Ok(f) => f,
                Err(e) => return StepOutcome::Failed(OpFailure::at(e, 0)),
            };
            self.src = Some(src);
            self.dst = Some(dst);
            return StepOutcome::Continue;
        }
        let (Some(src), Some(dst)) = (self.src.as_mut(), self.dst.as_mut()) else {
            let e = io::Error::other("copy state lost a handle");
            return StepOutcome::Failed(OpFailure::at(e, self.copied));
        };
        match primitives::read_chunk(src, COPY_CHUNK_SIZE, None) {
            Ok(chunk) if chunk.is_empty() => match dst.sync_all() {
                Ok(()) => {
                    self.src = None;
                    self.dst = None;
                    StepOutcome::Done(OpOutput::Unit)
                }
                Err(e) => StepOutcome::Failed(OpFailure::at(e, self.copied)),
            },
            Ok(chunk) => match dst.write_all(&chunk) {
                Ok(()) => {
                    self.copied += chunk.len() as u64;
                    StepOutcome::Continue
                }
                Err(e) => StepOutcome::Failed(OpFailure::at(e, self.copied)),
            },
            Err(e) => StepOutcome::Failed(OpFailure::at(e, self.copied)),
        }
    }
}

impl Default for CopyChunksState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{producer_from_iter, SeqShared};
    use std::path::PathBuf;

    fn init_test(name: &str) -> tempfile::TempDir {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
        tempfile::tempdir().unwrap()
    }

    fn drive_to_end(state: &mut OpState, path: &Path, dest: Option<&Path>) -> StepOutcome {
        loop {
            match state.step(path, dest) {
                StepOutcome::Continue | StepOutcome::Ready => {}
                terminal => return terminal,
            }
        }
    }

    #[test]
    fn read_all_accumulates_across_chunks() {
        let dir = init_test("read_all_accumulates_across_chunks");
        let path = dir.path().join("f");
        std::fs::write(&path, b"abcdefghij").unwrap();

        let mut state = OpState::ReadAll(ReadAllState::new(0, None, 4));
        let out = drive_to_end(&mut state, &path, None);
        let ok = matches!(&out, StepOutcome::Done(OpOutput::Bytes(b)) if b == b"abcdefghij");
        crate::assert_with_log!(ok, "all chunks accumulated", true, ok);
        crate::test_complete!("read_all_accumulates_across_chunks");
    }

    #[test]
    fn read_all_honours_offset_and_budget() {
        let dir = init_test("read_all_honours_offset_and_budget");
        let path = dir.path().join("f");
        std::fs::write(&path, b"Hello, World!").unwrap();

        let mut state = OpState::ReadAll(ReadAllState::new(7, Some(5), 2));
        let out = drive_to_end(&mut state, &path, None);
        let ok = matches!(&out, StepOutcome::Done(OpOutput::Bytes(b)) if b == b"World");
        crate::assert_with_log!(ok, "window honoured", true, ok);
        crate::test_complete!("read_all_honours_offset_and_budget");
    }

    #[test]
    fn read_chunks_signals_ready_then_feeds_queue() {
        let dir = init_test("read_chunks_signals_ready_then_feeds_queue");
        let path = dir.path().join("f");
        std::fs::write(&path, b"0123456789").unwrap();

        let shared = SeqShared::new_handle();
        let mut state = OpState::ReadChunks(ReadChunksState::new(0, None, 4, shared.clone()));

        let first = state.step(&path, None);
        let ready = matches!(first, StepOutcome::Ready);
        crate::assert_with_log!(ready, "first step opens and signals ready", true, ready);

        let out = drive_to_end(&mut state, &path, None);
        let done = matches!(out, StepOutcome::Done(OpOutput::Unit));
        crate::assert_with_log!(done, "completes after EOF", true, done);
        crate::assert_with_log!(
            shared.lock().bytes_produced() == 10,
            "all bytes queued",
            10u64,
            shared.lock().bytes_produced()
        );
        crate::test_complete!("read_chunks_signals_ready_then_feeds_queue");
    }

    #[test]
    fn small_file_yields_exactly_one_chunk() {
        let dir = init_test("small_file_yields_exactly_one_chunk");
        let path = dir.path().join("small");
        std::fs::write(&path, b"tiny").unwrap();

        let shared = SeqShared::new_handle();
        let mut state = OpState::ReadChunks(ReadChunksState::new(0, None, 8192, shared.clone()));
        let _ = drive_to_end(&mut state, &path, None);

        let mut chunks = Vec::new();
        {
            let mut s = shared.lock();
            while let Some(c) = s.pop_for_test() {
                chunks.push(c);
            }
        }
        crate::assert_with_log!(chunks.len() == 1, "one chunk", 1usize, chunks.len());
        crate::assert_with_log!(chunks[0] == b"tiny".to_vec(), "chunk equals file", "tiny", "?");
        crate::test_complete!("small_file_yields_exactly_one_chunk");
    }

    #[test]
    fn write_producer_writes_all_chunks_and_counts() {
        let dir = init_test("write_producer_writes_all_chunks_and_counts");
        let path = dir.path().join("out");

        let producer = Box::new(producer_from_iter((0..10).map(|i| format!("chunk{i}\n"))));
        let mut state =
            OpState::WriteProducer(WriteProducerState::new(producer, WriteOptions::default()));
        let out = drive_to_end(&mut state, &path, None);

        let expected: String = (0..10).map(|i| format!("chunk{i}\n")).collect();
        let ok = matches!(out, StepOutcome::Done(OpOutput::Written(n)) if n == expected.len() as u64);
        crate::assert_with_log!(ok, "byte count matches", true, ok);
        let got = std::fs::read_to_string(&path).unwrap();
        crate::assert_with_log!(got == expected, "content matches", expected, got);
        crate::test_complete!("write_producer_writes_all_chunks_and_counts");
    }

    #[test]
    fn copy_chunks_duplicates_content() {
        let dir = init_test("copy_chunks_duplicates_content");
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        let payload = vec![7u8; 200_000];
        std::fs::write(&src, &payload).unwrap();

        let mut state = OpState::CopyChunks(CopyChunksState::new());
        let out = drive_to_end(&mut state, &src, Some(&dst));
        let done = matches!(out, StepOutcome::Done(OpOutput::Unit));
        crate::assert_with_log!(done, "copy completed", true, done);
        let got = std::fs::read(&dst).unwrap();
        crate::assert_with_log!(got == payload, "bytes identical", payload.len(), got.len());
        crate::test_complete!("copy_chunks_duplicates_content");
    }

    #[test]
    fn missing_source_fails_before_any_progress() {
        let dir = init_test("missing_source_fails_before_any_progress");
        let path = dir.path().join("absent");
        let mut state = OpState::ReadAll(ReadAllState::new(0, None, 4));
        let out = state.step(&path, None);
        let ok = matches!(out, StepOutcome::Failed(f) if f.processed == 0);
        crate::assert_with_log!(ok, "open failure reports zero progress", true, ok);
        crate::test_complete!("missing_source_fails_before_any_progress");
    }

    #[test]
    fn conflicting_records_detected_per_path() {
        let _dir = init_test("conflicting_records_detected_per_path");
        let write = OpRecord::from_spec(OpSpec {
            kind: OpKind::Write,
            path: PathBuf::from("/p"),
            dest: None,
            state: OpState::Atomic(AtomicOp::Delete),
            complete: Box::new(|_| {}),
            on_ready: None,
            abort: None,
        });
        let read_same = OpRecord::from_spec(OpSpec {
            kind: OpKind::Read,
            path: PathBuf::from("/p"),
            dest: None,
            state: OpState::Atomic(AtomicOp::Exists),
            complete: Box::new(|_| {}),
            on_ready: None,
            abort: None,
        });
        let read_other = OpRecord::from_spec(OpSpec {
            kind: OpKind::Read,
            path: PathBuf::from("/q"),
            dest: None,
            state: OpState::Atomic(AtomicOp::Exists),
            complete: Box::new(|_| {}),
            on_ready: None,
            abort: None,
        });
        crate::assert_with_log!(
            write.conflicts_with(&read_same),
            "mutation vs read on one path conflicts",
            true,
            write.conflicts_with(&read_same)
        );
        crate::assert_with_log!(
            !read_same.conflicts_with(&read_other),
            "different paths never conflict",
            false,
            read_same.conflicts_with(&read_other)
        );
        crate::assert_with_log!(
            !read_same.conflicts_with(&read_same),
            "reads on one path run concurrently",
            false,
            read_same.conflicts_with(&read_same)
        );
        crate::test_complete!("conflicting_records_detected_per_path");
    }
}
