//! Filesystem operations: options, stats, OS primitives, and the facade.

pub mod handler;
pub mod options;
pub(crate) mod primitives;
mod stats;

pub use handler::{global, reset_global, FsHandler};
pub use options::{
    ChunkOptions, ChunkWriteOptions, LineOptions, MkdirOptions, ReadOptions, RmdirOptions,
    WatchOptions, WriteOptions,
};
pub use stats::FileStats;
