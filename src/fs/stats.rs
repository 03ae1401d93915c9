//! File statistics reported by stat operations.

/// A snapshot of a path's metadata.
///
/// Timestamps are UNIX seconds. On unix the native access/modify/change
/// times and mode bits are reported; elsewhere the nearest portable
/// equivalents are used and `mode` is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    /// Size in bytes.
    pub size: u64,
    /// Last access time, UNIX seconds.
    pub atime: i64,
    /// Last modification time, UNIX seconds.
    pub mtime: i64,
    /// Last status change time, UNIX seconds.
    pub ctime: i64,
    /// True for regular files.
    pub is_file: bool,
    /// True for directories.
    pub is_dir: bool,
    /// Permission bits (unix), zero elsewhere.
    pub mode: u32,
}

impl FileStats {
    /// Builds stats from OS metadata.
    #[must_use]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Self {
                size: meta.len(),
                atime: meta.atime(),
                mtime: meta.mtime(),
                ctime: meta.ctime(),
                is_file: meta.is_file(),
                is_dir: meta.is_dir(),
                mode: meta.mode(),
            }
        }
        #[cfg(not(unix))]
        {
            Self {
                size: meta.len(),
                atime: meta.accessed().map_or(0, unix_seconds),
                mtime: meta.modified().map_or(0, unix_seconds),
                ctime: meta.created().map_or(0, unix_seconds),
                is_file: meta.is_file(),
                is_dir: meta.is_dir(),
                mode: 0,
            }
        }
    }
}

#[cfg(not(unix))]
#[allow(clippy::cast_possible_wrap)]
fn unix_seconds(t: std::time::SystemTime) -> i64 {
    match t.duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}
