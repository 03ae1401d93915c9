//! Thin OS wrappers driven by the event loop.
//!
//! These functions do blocking syscalls and return raw [`io::Result`]s;
//! classification into the error taxonomy happens once, at the facade
//! boundary. Every handle is opened per operation and closed on all exit
//! paths by scope.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::options::{MkdirOptions, WriteOptions};
use super::stats::FileStats;

/// Reads up to `length` bytes starting at `offset`.
pub fn read_range(path: &Path, offset: u64, length: Option<u64>) -> io::Result<Vec<u8>> {
    let mut file = open_read(path, offset)?;
    let mut buf = Vec::new();
    match length {
        Some(n) => {
            file.take(n).read_to_end(&mut buf)?;
        }
        None => {
            file.read_to_end(&mut buf)?;
        }
    }
    Ok(buf)
}

/// Opens a file for reading, positioned at `offset`.
pub fn open_read(path: &Path, offset: u64) -> io::Result<File> {
    let mut file = File::open(path)?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset))?;
    }
    Ok(file)
}

/// Opens a file for writing, optionally creating ancestors first.
pub fn open_write(path: &Path, opts: WriteOptions) -> io::Result<File> {
    if opts.create_directories {
        create_parents(path)?;
    }
    let mut open = OpenOptions::new();
    open.write(true);
    if opts.create_new {
        open.create_new(true);
    } else {
        open.create(true).truncate(true);
    }
    open.open(path)
}

/// Opens a file for appending, creating it if missing.
pub fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().append(true).create(true).open(path)
}

/// Creates the missing ancestors of `path`.
pub fn create_parents(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Writes `data` whole, flushing and syncing before returning the count.
pub fn write_bytes(path: &Path, data: &[u8], opts: WriteOptions) -> io::Result<u64> {
    let mut file = open_write(path, opts)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(data.len() as u64)
}

/// Appends `data`, returning the count appended.
pub fn append_bytes(path: &Path, data: &[u8]) -> io::Result<u64> {
    let mut file = open_append(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(data.len() as u64)
}

/// Reads one chunk of at most `chunk_size` bytes, bounded by `remaining`.
///
/// Returns an empty vector at EOF or once the budget is exhausted.
pub fn read_chunk(file: &mut File, chunk_size: usize, remaining: Option<u64>) -> io::Result<Vec<u8>> {
    #[allow(clippy::cast_possible_truncation)]
    let want = match remaining {
        Some(0) => return Ok(Vec::new()),
        Some(budget) => chunk_size.min(budget.min(usize::MAX as u64) as usize),
        None => chunk_size,
    };
    let mut buf = vec![0u8; want];
    let mut filled = 0;
    while filled < want {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Deletes a file.
pub fn remove(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

/// Returns whether `path` exists. The empty path is reported absent
/// rather than raising.
#[must_use]
pub fn exists(path: &Path) -> bool {
    if path.as_os_str().is_empty() {
        return false;
    }
    fs::metadata(path).is_ok()
}

/// Stats a path.
pub fn stat(path: &Path) -> io::Result<FileStats> {
    Ok(FileStats::from_metadata(&fs::metadata(path)?))
}

/// Creates a directory with the requested mode.
pub fn make_dir(path: &Path, opts: MkdirOptions) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(opts.recursive);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(opts.mode);
    }
    builder.create(path)
}

/// Removes a directory, recursively when asked.
pub fn remove_dir(path: &Path, recursive: bool) -> io::Result<()> {
    if recursive {
        fs::remove_dir_all(path)
    } else {
        fs::remove_dir(path)
    }
}

/// Copies a file whole.
pub fn copy_file(src: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(src, dest).map(|_| ())
}

/// Renames a path.
pub fn rename(old: &Path, new: &Path) -> io::Result<()> {
    fs::rename(old, new)
}

/// Best-effort removal of a partial output, used by cancellation cleanup.
pub fn remove_partial_output(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove partial output");
        }
    }
}
