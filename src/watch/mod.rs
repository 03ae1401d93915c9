//! Polling file watcher.
//!
//! Each watcher tracks one path independently: a snapshot of `{size,
//! mtime, optional content hash}` is captured at registration and
//! refreshed at every poll interval. A change in the snapshot emits a
//! [`WatchEvent`] to the watcher's callback. Watchers do not perturb each
//! other; several watchers on the same path each receive events.
//!
//! Rapid successive changes inside one poll interval may coalesce into a
//! single event; at least one event is emitted per observable change
//! window.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use sha2::{Digest, Sha256};

use crate::fs::WatchOptions;

/// Opaque identifier for a registered watcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId(String);

impl WatcherId {
    pub(crate) fn new(seq: u64) -> Self {
        Self(format!("watcher-{seq}"))
    }

    /// The identifier as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A detected filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEvent {
    /// The path appeared after being absent.
    Created,
    /// The path's size, mtime, or content hash changed.
    Modified,
    /// The path vanished.
    Deleted,
}

impl WatchEvent {
    /// Returns a short name for the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Callback invoked with each detected event.
pub type WatchCallback = Box<dyn FnMut(WatchEvent, &Path) + Send>;

/// Observed state of a watched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Snapshot {
    size: u64,
    mtime: Option<SystemTime>,
    hash: Option<[u8; 32]>,
}

/// Captures the current snapshot of `path`, or `None` if it is absent.
pub(crate) fn take_snapshot(path: &Path, want_hash: bool) -> Option<Snapshot> {
    let meta = std::fs::metadata(path).ok()?;
    let hash = if want_hash { hash_contents(path) } else { None };
    Some(Snapshot {
        size: meta.len(),
        mtime: meta.modified().ok(),
        hash,
    })
}

fn hash_contents(path: &Path) -> Option<[u8; 32]> {
    let mut file = std::fs::File::open(path).ok()?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(_) => return None,
        }
    }
    Some(hasher.finalize().into())
}

/// Compares two snapshots and names the observable change, if any.
pub(crate) fn detect_change(
    prev: Option<&Snapshot>,
    next: Option<&Snapshot>,
    watch_size: bool,
) -> Option<WatchEvent> {
    match (prev, next) {
        (None, Some(_)) => Some(WatchEvent::Created),
        (Some(_), None) => Some(WatchEvent::Deleted),
        (None, None) => None,
        (Some(a), Some(b)) => {
            let size_changed = watch_size && a.size != b.size;
            if size_changed || a.mtime != b.mtime || a.hash != b.hash {
                Some(WatchEvent::Modified)
            } else {
                None
            }
        }
    }
}

/// A registered watcher: path, callback, options, and the last snapshot.
pub(crate) struct WatcherRecord {
    pub(crate) path: PathBuf,
    pub(crate) callback: WatchCallback,
    pub(crate) options: WatchOptions,
    pub(crate) last: Option<Snapshot>,
    pub(crate) next_poll: Instant,
}

impl WatcherRecord {
    /// Registers a watcher, capturing the initial snapshot now.
    pub(crate) fn register(path: PathBuf, callback: WatchCallback, options: WatchOptions) -> Self {
        let last = take_snapshot(&path, options.watch_content);
        let next_poll = Instant::now() + options.polling_interval;
        Self {
            path,
            callback,
            options,
            last,
            next_poll,
        }
    }

    /// Re-stats the path and fires the callback if something changed.
    pub(crate) fn poll(&mut self) {
        let next = take_snapshot(&self.path, self.options.watch_content);
        if let Some(event) = detect_change(self.last.as_ref(), next.as_ref(), self.options.watch_size)
        {
            tracing::debug!(path = %self.path.display(), event = %event, "watcher event");
            (self.callback)(event, &self.path);
        }
        self.last = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    fn init_test(name: &str) -> tempfile::TempDir {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
        tempfile::tempdir().unwrap()
    }

    fn collecting_record(path: PathBuf, options: WatchOptions) -> (WatcherRecord, Arc<Mutex<Vec<WatchEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let record = WatcherRecord::register(
            path,
            Box::new(move |event, _path: &Path| sink.lock().push(event)),
            options,
        );
        (record, events)
    }

    #[test]
    fn modification_detected_by_snapshot_change() {
        let dir = init_test("modification_detected_by_snapshot_change");
        let path = dir.path().join("w");
        std::fs::write(&path, b"initial").unwrap();

        let (mut record, events) = collecting_record(path.clone(), WatchOptions::default());
        std::fs::write(&path, b"initial plus more").unwrap();
        record.poll();

        let got = events.lock().clone();
        crate::assert_with_log!(
            got == vec![WatchEvent::Modified],
            "size change emits modification",
            vec![WatchEvent::Modified],
            got
        );
        crate::test_complete!("modification_detected_by_snapshot_change");
    }

    #[test]
    fn creation_and_deletion_detected() {
        let dir = init_test("creation_and_deletion_detected");
        let path = dir.path().join("appears");

        let (mut record, events) = collecting_record(path.clone(), WatchOptions::default());
        std::fs::write(&path, b"now exists").unwrap();
        record.poll();
        std::fs::remove_file(&path).unwrap();
        record.poll();

        let got = events.lock().clone();
        crate::assert_with_log!(
            got == vec![WatchEvent::Created, WatchEvent::Deleted],
            "absent->present->absent",
            vec![WatchEvent::Created, WatchEvent::Deleted],
            got
        );
        crate::test_complete!("creation_and_deletion_detected");
    }

    #[test]
    fn quiet_path_emits_nothing() {
        let dir = init_test("quiet_path_emits_nothing");
        let path = dir.path().join("calm");
        std::fs::write(&path, b"steady").unwrap();

        let (mut record, events) = collecting_record(path, WatchOptions::default());
        record.poll();
        record.poll();

        let quiet = events.lock().is_empty();
        crate::assert_with_log!(quiet, "no change, no events", true, quiet);
        crate::test_complete!("quiet_path_emits_nothing");
    }

    #[test]
    fn content_hash_catches_same_size_rewrite() {
        let dir = init_test("content_hash_catches_same_size_rewrite");
        let path = dir.path().join("h");
        std::fs::write(&path, b"aaaa").unwrap();

        let options = WatchOptions {
            watch_content: true,
            polling_interval: Duration::from_millis(10),
            ..WatchOptions::default()
        };
        let (mut record, events) = collecting_record(path.clone(), options);
        // Same length, same mtime granularity risk; the hash still differs.
        std::fs::write(&path, b"bbbb").unwrap();
        record.poll();

        let got = events.lock().clone();
        crate::assert_with_log!(
            got == vec![WatchEvent::Modified],
            "hash change emits modification",
            vec![WatchEvent::Modified],
            got
        );
        crate::test_complete!("content_hash_catches_same_size_rewrite");
    }
}
