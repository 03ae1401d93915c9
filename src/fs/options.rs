//! Option structs for filesystem operations.
//!
//! All options are plain structs with `Default` impls matching the
//! documented defaults, so call sites read as
//! `handler.read(path, ReadOptions::default())` or construct the one or
//! two fields they care about.

use std::time::Duration;

use crate::stream::DEFAULT_CHUNK_SIZE;

/// Options for whole-file reads (`read`, `read_stream`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Starting byte offset.
    pub offset: u64,
    /// Maximum number of bytes to read; `None` reads to EOF.
    pub length: Option<u64>,
}

impl ReadOptions {
    /// Reads `length` bytes starting at `offset`.
    #[must_use]
    pub const fn range(offset: u64, length: u64) -> Self {
        Self {
            offset,
            length: Some(length),
        }
    }
}

/// Options for chunked reads (`read_chunks`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    /// Size of each yielded chunk.
    pub chunk_size: usize,
    /// Starting byte offset.
    pub offset: u64,
    /// Maximum number of bytes to read; `None` reads to EOF.
    pub length: Option<u64>,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            offset: 0,
            length: None,
        }
    }
}

/// Options for line reads (`read_lines`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineOptions {
    /// Size of the underlying read chunks.
    pub chunk_size: usize,
    /// Strip leading and trailing whitespace from each line.
    pub trim: bool,
    /// Drop lines that are empty after any requested trim.
    pub skip_empty: bool,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            trim: false,
            skip_empty: false,
        }
    }
}

/// Options for writes (`write`, `write_stream`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Create missing ancestor directories before opening.
    pub create_directories: bool,
    /// Fail with `AlreadyExists` if the target is already present.
    pub create_new: bool,
}

/// Options for producer-driven writes (`write_chunks`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkWriteOptions {
    /// Coalesce producer yields to at least this many bytes before each
    /// write; zero disables coalescing.
    pub buffer_size: usize,
    /// Create missing ancestor directories before opening.
    pub create_directories: bool,
    /// Fail with `AlreadyExists` if the target is already present.
    pub create_new: bool,
}

impl ChunkWriteOptions {
    pub(crate) const fn write_options(self) -> WriteOptions {
        WriteOptions {
            create_directories: self.create_directories,
            create_new: self.create_new,
        }
    }
}

/// Options for directory creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MkdirOptions {
    /// Permission bits for created directories (unix).
    pub mode: u32,
    /// Create missing ancestors too.
    pub recursive: bool,
}

impl Default for MkdirOptions {
    fn default() -> Self {
        Self {
            mode: 0o755,
            recursive: false,
        }
    }
}

/// Options for directory removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RmdirOptions {
    /// Remove contents recursively. When false, a non-empty directory is
    /// rejected with `DirectoryNotEmpty`.
    pub recursive: bool,
}

impl Default for RmdirOptions {
    fn default() -> Self {
        Self { recursive: true }
    }
}

/// Options for path watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Interval between polls.
    pub polling_interval: Duration,
    /// Treat size changes as modifications.
    pub watch_size: bool,
    /// Hash file contents and treat hash changes as modifications.
    pub watch_content: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_millis(100),
            watch_size: true,
            watch_content: false,
        }
    }
}
