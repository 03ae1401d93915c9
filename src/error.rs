//! Error types and classification for tidefs.
//!
//! Every failure that crosses the public boundary is a typed [`FsError`]
//! drawn from a closed set of kinds. Raw OS errors are classified exactly
//! once, at the facade boundary, and never escape as bare strings.
//!
//! # Classification strategy
//!
//! Classification prefers structured [`io::ErrorKind`] codes; the
//! case-insensitive substring table is a fallback for errors the OS layer
//! surfaces without a useful code. Write-direction operations fold
//! path-related failures into [`FsErrorKind::WriteFailed`] so a caller
//! always sees a write failure for a failed write, with the underlying
//! hint preserved in the message.
//!
//! Cancellation is not an error: cancelled futures neither fulfill nor
//! reject. The cancellation-adjacent conditions that *are* observable
//! (waiting on a cancelled future, pulling from an invalidated sequence)
//! live in [`crate::future::WaitError`] and [`crate::stream::PullError`].

use core::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The kind of filesystem error.
///
/// This is a closed taxonomy: new failure modes map onto one of these
/// kinds rather than extending the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsErrorKind {
    /// A source path required by the operation is missing.
    NotFound,
    /// A creation target already exists.
    AlreadyExists,
    /// OS-level access was refused.
    PermissionDenied,
    /// I/O failure during a read not caused by a missing path or permissions.
    ReadFailed,
    /// I/O failure during a write or append, including invalid path bytes.
    WriteFailed,
    /// A copy failed; carries both source and destination context.
    CopyFailed,
    /// A non-empty directory was rejected by a non-recursive removal.
    DirectoryNotEmpty,
    /// No space left on the device.
    DiskFull,
    /// The path itself is malformed.
    InvalidPath,
    /// A streaming operation failed partway through.
    StreamFailed,
    /// The long tail of filesystem failures.
    Other,
}

impl FsErrorKind {
    /// Returns a short human-readable name for the kind.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::PermissionDenied => "permission denied",
            Self::ReadFailed => "read failed",
            Self::WriteFailed => "write failed",
            Self::CopyFailed => "copy failed",
            Self::DirectoryNotEmpty => "directory not empty",
            Self::DiskFull => "disk full",
            Self::InvalidPath => "invalid path",
            Self::StreamFailed => "stream failed",
            Self::Other => "filesystem error",
        }
    }
}

impl fmt::Display for FsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The direction of an operation, used to steer classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpDirection {
    /// Data flows out of the filesystem (read, read_chunks, read_lines).
    Read,
    /// Data flows into the filesystem (write, append, write_chunks).
    Write,
    /// Neither direction dominates (delete, stat, mkdir, rename, ...).
    Neutral,
}

/// The main error type for tidefs operations.
///
/// Always records the operation name and offending path. Copy errors add
/// the destination; streaming errors add the bytes processed before the
/// failure. Cloneable so a single settlement can fan out to every
/// registered continuation.
#[derive(Debug, Clone)]
pub struct FsError {
    kind: FsErrorKind,
    op: &'static str,
    path: PathBuf,
    dest: Option<PathBuf>,
    bytes_processed: Option<u64>,
    message: Option<String>,
    source: Option<Arc<io::Error>>,
}

impl FsError {
    /// Creates a new error with the given kind, operation name, and path.
    #[must_use]
    pub fn new(kind: FsErrorKind, op: &'static str, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            op,
            path: path.into(),
            dest: None,
            bytes_processed: None,
            message: None,
            source: None,
        }
    }

    /// Attaches the destination path (copy and rename context).
    #[must_use]
    pub fn with_dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    /// Attaches the number of bytes processed before a streaming failure.
    #[must_use]
    pub const fn with_bytes_processed(mut self, bytes: u64) -> Self {
        self.bytes_processed = Some(bytes);
        self
    }

    /// Attaches a message describing the underlying failure.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Attaches the raw OS error as the source of this error.
    #[must_use]
    pub fn with_source(mut self, source: io::Error) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> FsErrorKind {
        self.kind
    }

    /// Returns the name of the operation that failed.
    #[must_use]
    pub const fn op(&self) -> &'static str {
        self.op
    }

    /// Returns the offending path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the destination path, if this error carries one.
    #[must_use]
    pub fn dest(&self) -> Option<&Path> {
        self.dest.as_deref()
    }

    /// Returns the bytes processed before a streaming failure, if known.
    #[must_use]
    pub const fn bytes_processed(&self) -> Option<u64> {
        self.bytes_processed
    }

    /// Returns the underlying failure message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns true if the error represents a missing source path.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, FsErrorKind::NotFound)
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} during {} on {}", self.kind, self.op, self.path.display())?;
        if let Some(dest) = &self.dest {
            write!(f, " -> {}", dest.display())?;
        }
        if let Some(bytes) = self.bytes_processed {
            write!(f, " after {bytes} bytes")?;
        }
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Classifies a raw OS error into the taxonomy.
///
/// Structured [`io::ErrorKind`] codes take precedence; the substring table
/// handles errors the OS layer reports without a typed code.
#[must_use]
pub fn classify(op: &'static str, direction: OpDirection, path: &Path, err: io::Error) -> FsError {
    let kind = match err.kind() {
        io::ErrorKind::NotFound => match direction {
            // A write into a missing directory is still a write failure;
            // the message keeps the missing-path hint.
            OpDirection::Write => FsErrorKind::WriteFailed,
            _ => FsErrorKind::NotFound,
        },
        io::ErrorKind::AlreadyExists => FsErrorKind::AlreadyExists,
        io::ErrorKind::PermissionDenied => FsErrorKind::PermissionDenied,
        io::ErrorKind::DirectoryNotEmpty => FsErrorKind::DirectoryNotEmpty,
        io::ErrorKind::StorageFull => FsErrorKind::DiskFull,
        io::ErrorKind::InvalidInput => match direction {
            OpDirection::Write => FsErrorKind::WriteFailed,
            _ => FsErrorKind::InvalidPath,
        },
        _ => classify_message(&err.to_string(), direction),
    };
    FsError::new(kind, op, path)
        .with_message(err.to_string())
        .with_source(err)
}

/// Classifies a raw OS error from a copy operation.
///
/// Copy has its own ladder: missing source, then refused access, then
/// everything else as [`FsErrorKind::CopyFailed`] with destination context.
#[must_use]
pub fn classify_copy(op: &'static str, src: &Path, dest: &Path, err: io::Error) -> FsError {
    let msg = err.to_string();
    let lowered = msg.to_ascii_lowercase();
    let kind = match err.kind() {
        io::ErrorKind::NotFound => FsErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => FsErrorKind::PermissionDenied,
        _ if mentions_missing(&lowered) => FsErrorKind::NotFound,
        _ if mentions_permission(&lowered) => FsErrorKind::PermissionDenied,
        _ => FsErrorKind::CopyFailed,
    };
    FsError::new(kind, op, src)
        .with_dest(dest)
        .with_message(msg)
        .with_source(err)
}

/// Classifies a failure from a streaming operation.
///
/// Runs the ordinary classifier first; generic read/write failures that
/// happen after some progress become [`FsErrorKind::StreamFailed`]. The
/// bytes-processed count is attached either way.
#[must_use]
pub fn classify_stream(
    op: &'static str,
    direction: OpDirection,
    path: &Path,
    processed: u64,
    err: io::Error,
) -> FsError {
    let mut error = classify(op, direction, path, err).with_bytes_processed(processed);
    if processed > 0
        && matches!(
            error.kind,
            FsErrorKind::ReadFailed | FsErrorKind::WriteFailed | FsErrorKind::Other
        )
    {
        error.kind = FsErrorKind::StreamFailed;
    }
    error
}

fn classify_message(msg: &str, direction: OpDirection) -> FsErrorKind {
    let m = msg.to_ascii_lowercase();
    if m.contains("already exists") || m.contains("file exists") {
        return FsErrorKind::AlreadyExists;
    }
    if mentions_permission(&m) {
        return FsErrorKind::PermissionDenied;
    }
    if m.contains("no space") {
        return FsErrorKind::DiskFull;
    }
    if m.contains("directory not empty") {
        return FsErrorKind::DirectoryNotEmpty;
    }
    match direction {
        OpDirection::Write => FsErrorKind::WriteFailed,
        OpDirection::Read => {
            if mentions_missing(&m) {
                FsErrorKind::NotFound
            } else {
                FsErrorKind::ReadFailed
            }
        }
        OpDirection::Neutral => {
            if mentions_missing(&m) {
                FsErrorKind::NotFound
            } else {
                FsErrorKind::Other
            }
        }
    }
}

fn mentions_missing(lowered: &str) -> bool {
    lowered.contains("not found")
        || lowered.contains("no such file")
        || lowered.contains("does not exist")
}

fn mentions_permission(lowered: &str) -> bool {
    lowered.contains("permission") || lowered.contains("denied") || lowered.contains("forbidden")
}
