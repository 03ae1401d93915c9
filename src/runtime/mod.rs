//! The cooperative event loop.
//!
//! A single-threaded scheduler that owns four kinds of work:
//!
//! 1. a FIFO queue of microtasks (continuation firings, cleanup chores),
//! 2. a min-heap of timers (one-shot and periodic),
//! 3. a registry of file operations keyed by [`OpId`],
//! 4. a registry of watchers keyed by [`crate::watch::WatcherId`].
//!
//! Each [`tick`](EventLoop::tick) drains microtasks, fires due timers,
//! polls due watchers, then advances file operations: atomic operations
//! run to completion in submission order, streaming operations advance
//! one chunk so every chunk boundary is a cancellation checkpoint.
//! Mutating operations that share a path are serialized in submission
//! order; reads only wait for earlier mutations of their path.
//!
//! The loop itself is a cloneable handle over shared state; whichever
//! thread calls [`run`](EventLoop::run), [`turn`](EventLoop::turn), or a
//! future's `wait` drives the work. The registry lock is never held while
//! user callbacks execute, so callbacks may freely register more work or
//! drive the loop re-entrantly.

mod op;
mod timer;

pub use op::{
    AbortFn, AtomicOp, CompleteFn, CopyChunksState, OpFailure, OpId, OpKind, OpOutput, OpSpec,
    OpState, ReadAllState, ReadyFn, ReadChunksState, WriteProducerState,
};
pub(crate) use op::{OpRecord, StepOutcome};
pub use timer::TimerId;
use timer::TimerHeap;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::fs::WatchOptions;
use crate::watch::{WatchCallback, WatcherId, WatcherRecord};

type Microtask = Box<dyn FnOnce() + Send>;

enum TimerTask {
    Once(Box<dyn FnOnce() + Send>),
    Periodic {
        period: Duration,
        remaining: Option<u32>,
        tick: Box<dyn FnMut() + Send>,
    },
}

struct LoopCore {
    ready: VecDeque<Microtask>,
    timer_heap: TimerHeap,
    timer_tasks: HashMap<TimerId, TimerTask>,
    claimed_timers: HashSet<TimerId>,
    cancelled_timers: HashSet<TimerId>,
    next_timer_id: TimerId,
    ops: BTreeMap<OpId, OpRecord>,
    next_op_id: OpId,
    watchers: BTreeMap<WatcherId, WatcherRecord>,
    polling_watchers: HashSet<WatcherId>,
    unwatched_while_polling: HashSet<WatcherId>,
    next_watcher_seq: u64,
    stop_requested: bool,
    /// Bumped by reset so in-flight claims do not resurrect state.
    epoch: u64,
}

impl LoopCore {
    fn new() -> Self {
        Self {
            ready: VecDeque::new(),
            timer_heap: TimerHeap::new(),
            timer_tasks: HashMap::new(),
            claimed_timers: HashSet::new(),
            cancelled_timers: HashSet::new(),
            next_timer_id: 0,
            ops: BTreeMap::new(),
            next_op_id: 0,
            watchers: BTreeMap::new(),
            polling_watchers: HashSet::new(),
            unwatched_while_polling: HashSet::new(),
            next_watcher_seq: 0,
            stop_requested: false,
            epoch: 0,
        }
    }

    /// Finds the earliest runnable operation: not yet stepped this tick,
    /// not mid-step, and not blocked by an earlier conflicting operation.
    fn claim_next_op(
        &mut self,
        stepped: &HashSet<OpId>,
    ) -> Option<(OpId, OpState, PathBuf, Option<PathBuf>)> {
        let mut candidate = None;
        'scan: for (&id, rec) in &self.ops {
            if stepped.contains(&id) || rec.state.is_none() {
                continue;
            }
            for (_, earlier) in self.ops.range(..id) {
                if earlier.conflicts_with(rec) {
                    continue 'scan;
                }
            }
            candidate = Some(id);
            break;
        }
        let id = candidate?;
        let rec = self.ops.get_mut(&id)?;
        let state = rec.state.take()?;
        Some((id, state, rec.path.clone(), rec.dest.clone()))
    }

    fn next_deadline(&self) -> Option<Instant> {
        let timer = self.timer_heap.peek_deadline();
        let watcher = self.watchers.values().map(|w| w.next_poll).min();
        match (timer, watcher) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (deadline, None) => deadline,
            (None, deadline) => deadline,
        }
    }
}

/// Cloneable handle to the cooperative event loop.
#[derive(Clone)]
pub struct EventLoop {
    core: Arc<Mutex<LoopCore>>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop").finish_non_exhaustive()
    }
}

impl EventLoop {
    /// Creates an empty loop.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Arc::new(Mutex::new(LoopCore::new())),
        }
    }

    // ------------------------------------------------------------------
    // Microtasks
    // ------------------------------------------------------------------

    /// Enqueues a microtask for the next drain.
    pub fn enqueue(&self, task: impl FnOnce() + Send + 'static) {
        self.core.lock().ready.push_back(Box::new(task));
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Schedules `f` to run once after `delay`.
    pub fn add_timer(&self, delay: Duration, f: impl FnOnce() + Send + 'static) -> TimerId {
        let mut core = self.core.lock();
        core.next_timer_id += 1;
        let id = core.next_timer_id;
        core.timer_tasks.insert(id, TimerTask::Once(Box::new(f)));
        core.timer_heap.insert(id, Instant::now() + delay);
        id
    }

    /// Schedules `f` to run every `period`, optionally stopping after
    /// `max_fires` invocations.
    pub fn add_periodic_timer(
        &self,
        period: Duration,
        f: impl FnMut() + Send + 'static,
        max_fires: Option<u32>,
    ) -> TimerId {
        let period = period.max(Duration::from_millis(1));
        let mut core = self.core.lock();
        core.next_timer_id += 1;
        let id = core.next_timer_id;
        if max_fires == Some(0) {
            return id;
        }
        core.timer_tasks.insert(
            id,
            TimerTask::Periodic {
                period,
                remaining: max_fires,
                tick: Box::new(f),
            },
        );
        core.timer_heap.insert(id, Instant::now() + period);
        id
    }

    /// Removes a timer. Returns whether it was still scheduled.
    pub fn remove_timer(&self, id: TimerId) -> bool {
        let mut core = self.core.lock();
        if core.timer_tasks.remove(&id).is_some() {
            return true;
        }
        if core.claimed_timers.contains(&id) {
            core.cancelled_timers.insert(id);
            return true;
        }
        false
    }

    // ------------------------------------------------------------------
    // File operations
    // ------------------------------------------------------------------

    /// Reserves the next operation id without registering a record.
    ///
    /// Ids are monotonically increasing and never reused while a record
    /// is live; reserving first lets completion hooks capture their own
    /// id before submission.
    pub fn allocate_op_id(&self) -> OpId {
        let mut core = self.core.lock();
        core.next_op_id += 1;
        core.next_op_id
    }

    /// Registers an operation under a previously reserved id.
    pub fn submit_op(&self, id: OpId, spec: OpSpec) {
        tracing::trace!(op = spec.kind.name(), id, path = %spec.path.display(), "file operation registered");
        self.core.lock().ops.insert(id, OpRecord::from_spec(spec));
    }

    /// Registers an operation, returning its id.
    pub fn add_file_operation(&self, spec: OpSpec) -> OpId {
        let id = self.allocate_op_id();
        self.submit_op(id, spec);
        id
    }

    /// Cancels a registered operation, removing it from scheduling.
    ///
    /// Returns whether the record existed and had not already completed.
    /// Dropping the record closes any handles the operation held.
    pub fn cancel_file_operation(&self, id: OpId) -> bool {
        let removed = { self.core.lock().ops.remove(&id) };
        match removed {
            Some(rec) => {
                tracing::debug!(op = rec.kind.name(), id, "file operation cancelled");
                true
            }
            None => false,
        }
    }

    /// Number of live operation records.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.core.lock().ops.len()
    }

    // ------------------------------------------------------------------
    // Watchers
    // ------------------------------------------------------------------

    /// Registers a watcher, capturing its initial snapshot immediately.
    pub fn add_watcher(
        &self,
        path: PathBuf,
        callback: WatchCallback,
        mut options: WatchOptions,
    ) -> WatcherId {
        options.polling_interval = options.polling_interval.max(Duration::from_millis(1));
        let record = WatcherRecord::register(path, callback, options);
        let mut core = self.core.lock();
        core.next_watcher_seq += 1;
        let id = WatcherId::new(core.next_watcher_seq);
        tracing::debug!(%id, path = %record.path.display(), "watcher registered");
        core.watchers.insert(id.clone(), record);
        id
    }

    /// Removes a watcher. No further callbacks fire for it; a poll
    /// already in flight is honoured.
    pub fn remove_watcher(&self, id: &WatcherId) -> bool {
        let mut core = self.core.lock();
        if core.watchers.remove(id).is_some() {
            tracing::debug!(%id, "watcher removed");
            return true;
        }
        if core.polling_watchers.contains(id) {
            core.unwatched_while_polling.insert(id.clone());
            return true;
        }
        false
    }

    /// Number of registered watchers.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.core.lock().watchers.len()
    }

    // ------------------------------------------------------------------
    // Driving
    // ------------------------------------------------------------------

    /// Runs one tick: drain microtasks, fire due timers, poll due
    /// watchers, advance file operations.
    pub fn tick(&self) {
        self.drain_microtasks();
        self.fire_due_timers();
        self.poll_due_watchers();
        self.advance_file_operations();
    }

    /// Runs one tick if any work exists, sleeping first when only timed
    /// work remains. Returns false once the loop is drained.
    pub fn turn(&self) -> bool {
        let (immediate, deadline) = {
            let core = self.core.lock();
            (
                !core.ready.is_empty() || !core.ops.is_empty(),
                core.next_deadline(),
            )
        };
        if immediate {
            self.tick();
            return true;
        }
        if let Some(deadline) = deadline {
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
            self.tick();
            return true;
        }
        false
    }

    /// Drives ticks until no work remains or [`stop`](Self::stop) is
    /// called.
    pub fn run(&self) {
        self.core.lock().stop_requested = false;
        loop {
            if self.core.lock().stop_requested {
                break;
            }
            if !self.turn() {
                break;
            }
        }
    }

    /// Requests that [`run`](Self::run) return after the current tick.
    pub fn stop(&self) {
        self.core.lock().stop_requested = true;
    }

    /// Tears down all queues, aborts in-flight operations (running their
    /// abort hooks), and clears every watcher and timer.
    pub fn reset(&self) {
        let (ops, watchers) = {
            let mut core = self.core.lock();
            core.epoch += 1;
            core.ready.clear();
            core.timer_heap.clear();
            core.timer_tasks.clear();
            core.claimed_timers.clear();
            core.cancelled_timers.clear();
            core.polling_watchers.clear();
            core.unwatched_while_polling.clear();
            core.stop_requested = false;
            (
                std::mem::take(&mut core.ops),
                std::mem::take(&mut core.watchers),
            )
        };
        for (_, mut rec) in ops {
            if let Some(abort) = rec.abort.take() {
                abort();
            }
        }
        drop(watchers);
        // Abort hooks schedule their cleanup as microtasks; run them now
        // so reset leaves nothing half-written behind.
        self.drain_microtasks();
        tracing::debug!("event loop reset");
    }

    // ------------------------------------------------------------------
    // Tick phases
    // ------------------------------------------------------------------

    fn drain_microtasks(&self) {
        loop {
            let task = self.core.lock().ready.pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    fn fire_due_timers(&self) {
        let now = Instant::now();
        loop {
            let claimed = {
                let mut core = self.core.lock();
                match core.timer_heap.pop_due(now) {
                    Some(id) => match core.timer_tasks.remove(&id) {
                        Some(task) => {
                            core.claimed_timers.insert(id);
                            Some((id, task))
                        }
                        // Stale heap entry for a removed timer.
                        None => None,
                    },
                    None => break,
                }
            };
            let Some((id, task)) = claimed else { continue };
            match task {
                TimerTask::Once(f) => {
                    f();
                    let mut core = self.core.lock();
                    core.claimed_timers.remove(&id);
                    core.cancelled_timers.remove(&id);
                }
                TimerTask::Periodic {
                    period,
                    remaining,
                    mut tick,
                } => {
                    tick();
                    let remaining = remaining.map(|r| r.saturating_sub(1));
                    let mut core = self.core.lock();
                    core.claimed_timers.remove(&id);
                    let removed = core.cancelled_timers.remove(&id);
                    if !removed && remaining != Some(0) {
                        core.timer_tasks.insert(
                            id,
                            TimerTask::Periodic {
                                period,
                                remaining,
                                tick,
                            },
                        );
                        core.timer_heap.insert(id, Instant::now() + period);
                    }
                }
            }
        }
    }

    fn poll_due_watchers(&self) {
        let now = Instant::now();
        loop {
            let claimed = {
                let mut core = self.core.lock();
                let due = core
                    .watchers
                    .iter()
                    .find(|(_, w)| w.next_poll <= now)
                    .map(|(id, _)| id.clone());
                match due {
                    Some(id) => match core.watchers.remove(&id) {
                        Some(mut rec) => {
                            rec.next_poll = now + rec.options.polling_interval;
                            core.polling_watchers.insert(id.clone());
                            Some((id, rec, core.epoch))
                        }
                        None => None,
                    },
                    None => break,
                }
            };
            let Some((id, mut rec, epoch)) = claimed else {
                continue;
            };
            rec.poll();
            let mut core = self.core.lock();
            core.polling_watchers.remove(&id);
            let unwatched = core.unwatched_while_polling.remove(&id);
            if !unwatched && core.epoch == epoch {
                core.watchers.insert(id, rec);
            }
        }
    }

    fn advance_file_operations(&self) {
        let mut stepped: HashSet<OpId> = HashSet::new();
        loop {
            let claimed = { self.core.lock().claim_next_op(&stepped) };
            let Some((id, mut state, path, dest)) = claimed else {
                break;
            };
            stepped.insert(id);
            let outcome = state.step(&path, dest.as_deref());
            match outcome {
                StepOutcome::Continue => {
                    let mut core = self.core.lock();
                    if let Some(rec) = core.ops.get_mut(&id) {
                        rec.state = Some(state);
                    } else {
                        // Cancelled mid-step; close handles immediately.
                        drop(core);
                        drop(state);
                    }
                }
                StepOutcome::Ready => {
                    let ready = {
                        let mut core = self.core.lock();
                        if let Some(rec) = core.ops.get_mut(&id) {
                            rec.state = Some(state);
                            rec.on_ready.take()
                        } else {
                            None
                        }
                    };
                    if let Some(f) = ready {
                        f(Ok(()));
                    }
                }
                StepOutcome::Done(out) => {
                    let complete = {
                        let mut core = self.core.lock();
                        core.ops.remove(&id).and_then(|mut r| r.complete.take())
                    };
                    // Handles close before the completion observes the result.
                    drop(state);
                    if let Some(f) = complete {
                        f(Ok(out));
                    }
                }
                StepOutcome::Failed(failure) => {
                    let rec = { self.core.lock().ops.remove(&id) };
                    drop(state);
                    if let Some(mut rec) = rec {
                        tracing::trace!(
                            op = rec.kind.name(),
                            id,
                            error = %failure.error,
                            "file operation failed"
                        );
                        match rec.on_ready.take() {
                            Some(ready) => ready(Err(failure.error)),
                            None => {
                                if let Some(f) = rec.complete.take() {
                                    f(Err(failure));
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    fn counter() -> (StdArc<AtomicUsize>, impl Fn() -> usize) {
        let c = StdArc::new(AtomicUsize::new(0));
        let c2 = StdArc::clone(&c);
        (c, move || c2.load(Ordering::SeqCst))
    }

    #[test]
    fn microtasks_drain_in_fifo_order() {
        init_test("microtasks_drain_in_fifo_order");
        let el = EventLoop::new();
        let order = StdArc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = StdArc::clone(&order);
            el.enqueue(move || order.lock().push(i));
        }
        el.tick();
        let got = order.lock().clone();
        crate::assert_with_log!(got == vec![0, 1, 2], "fifo order", vec![0, 1, 2], got);
        crate::test_complete!("microtasks_drain_in_fifo_order");
    }

    #[test]
    fn one_shot_timer_fires_once_after_delay() {
        init_test("one_shot_timer_fires_once_after_delay");
        let el = EventLoop::new();
        let (fired, count) = counter();
        el.add_timer(Duration::from_millis(50), move || {
            fired.fetch_add(1, Ordering::SeqCst);
        });

        crate::test_section!("before deadline");
        el.tick();
        crate::assert_with_log!(count() == 0, "not yet due", 0usize, count());

        crate::test_section!("after deadline");
        std::thread::sleep(Duration::from_millis(60));
        el.tick();
        crate::assert_with_log!(count() == 1, "fired once", 1usize, count());
        el.tick();
        crate::assert_with_log!(count() == 1, "does not refire", 1usize, count());
        crate::test_complete!("one_shot_timer_fires_once_after_delay");
    }

    #[test]
    fn periodic_timer_respects_max_fires() {
        init_test("periodic_timer_respects_max_fires");
        let el = EventLoop::new();
        let (fired, count) = counter();
        el.add_periodic_timer(
            Duration::from_millis(1),
            move || {
                fired.fetch_add(1, Ordering::SeqCst);
            },
            Some(3),
        );
        for _ in 0..10 {
            std::thread::sleep(Duration::from_millis(2));
            el.tick();
        }
        crate::assert_with_log!(count() == 3, "fires exactly max times", 3usize, count());
        crate::test_complete!("periodic_timer_respects_max_fires");
    }

    #[test]
    fn removed_timer_never_fires() {
        init_test("removed_timer_never_fires");
        let el = EventLoop::new();
        let (fired, count) = counter();
        let id = el.add_timer(Duration::from_millis(1), move || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
        let removed = el.remove_timer(id);
        crate::assert_with_log!(removed, "removal reported", true, removed);
        std::thread::sleep(Duration::from_millis(5));
        el.tick();
        crate::assert_with_log!(count() == 0, "never fires", 0usize, count());
        let again = el.remove_timer(id);
        crate::assert_with_log!(!again, "second removal is a no-op", false, again);
        crate::test_complete!("removed_timer_never_fires");
    }

    #[test]
    fn atomic_op_completes_with_output() {
        init_test("atomic_op_completes_with_output");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"payload").unwrap();

        let el = EventLoop::new();
        let result = StdArc::new(Mutex::new(None));
        let sink = StdArc::clone(&result);
        el.add_file_operation(OpSpec {
            kind: OpKind::Read,
            path,
            dest: None,
            state: OpState::Atomic(AtomicOp::Read {
                offset: 0,
                length: None,
            }),
            complete: Box::new(move |res| {
                *sink.lock() = Some(res);
            }),
            on_ready: None,
            abort: None,
        });
        el.tick();
        let got = result.lock().take();
        let ok = matches!(&got, Some(Ok(OpOutput::Bytes(b))) if b == b"payload");
        crate::assert_with_log!(ok, "completion carries bytes", true, ok);
        crate::assert_with_log!(
            el.pending_operations() == 0,
            "registry drained",
            0usize,
            el.pending_operations()
        );
        crate::test_complete!("atomic_op_completes_with_output");
    }

    #[test]
    fn cancelled_op_never_completes() {
        init_test("cancelled_op_never_completes");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"payload").unwrap();

        let el = EventLoop::new();
        let (fired, count) = counter();
        let id = el.add_file_operation(OpSpec {
            kind: OpKind::Read,
            path,
            dest: None,
            state: OpState::Atomic(AtomicOp::Read {
                offset: 0,
                length: None,
            }),
            complete: Box::new(move |_| {
                fired.fetch_add(1, Ordering::SeqCst);
            }),
            on_ready: None,
            abort: None,
        });
        let cancelled = el.cancel_file_operation(id);
        crate::assert_with_log!(cancelled, "live op cancels", true, cancelled);
        el.tick();
        crate::assert_with_log!(count() == 0, "completion suppressed", 0usize, count());
        let again = el.cancel_file_operation(id);
        crate::assert_with_log!(!again, "cancel after removal is false", false, again);
        crate::test_complete!("cancelled_op_never_completes");
    }

    #[test]
    fn mutating_ops_on_one_path_complete_in_submission_order() {
        init_test("mutating_ops_on_one_path_complete_in_submission_order");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serial");

        let el = EventLoop::new();
        let order = StdArc::new(Mutex::new(Vec::new()));
        for (label, data) in [(1u32, b"one".to_vec()), (2, b"two".to_vec())] {
            let order = StdArc::clone(&order);
            el.add_file_operation(OpSpec {
                kind: OpKind::Write,
                path: path.clone(),
                dest: None,
                state: OpState::Atomic(AtomicOp::Write {
                    data,
                    opts: crate::fs::WriteOptions::default(),
                }),
                complete: Box::new(move |_| order.lock().push(label)),
                on_ready: None,
                abort: None,
            });
        }
        el.tick();
        let got = order.lock().clone();
        crate::assert_with_log!(got == vec![1, 2], "submission order", vec![1, 2], got);
        let content = std::fs::read(&path).unwrap();
        crate::assert_with_log!(content == b"two".to_vec(), "last write wins", "two", "?");
        crate::test_complete!("mutating_ops_on_one_path_complete_in_submission_order");
    }

    #[test]
    fn reset_runs_abort_hooks_and_clears_everything() {
        init_test("reset_runs_abort_hooks_and_clears_everything");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"payload").unwrap();

        let el = EventLoop::new();
        let (aborted, count) = counter();
        el.add_file_operation(OpSpec {
            kind: OpKind::Read,
            path: path.clone(),
            dest: None,
            state: OpState::Atomic(AtomicOp::Read {
                offset: 0,
                length: None,
            }),
            complete: Box::new(|_| {}),
            on_ready: None,
            abort: Some(Box::new(move || {
                aborted.fetch_add(1, Ordering::SeqCst);
            })),
        });
        el.add_timer(Duration::from_secs(3600), || {});
        el.add_watcher(
            path,
            Box::new(|_event, _path: &std::path::Path| {}),
            WatchOptions::default(),
        );

        el.reset();
        crate::assert_with_log!(count() == 1, "abort hook ran", 1usize, count());
        crate::assert_with_log!(el.pending_operations() == 0, "ops cleared", 0usize, el.pending_operations());
        crate::assert_with_log!(el.watcher_count() == 0, "watchers cleared", 0usize, el.watcher_count());
        let idle = !el.turn();
        crate::assert_with_log!(idle, "loop drained after reset", true, idle);
        crate::test_complete!("reset_runs_abort_hooks_and_clears_everything");
    }

    #[test]
    fn turn_sleeps_until_timer_deadline() {
        init_test("turn_sleeps_until_timer_deadline");
        let el = EventLoop::new();
        let (fired, count) = counter();
        el.add_timer(Duration::from_millis(5), move || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
        let worked = el.turn();
        crate::assert_with_log!(worked, "turn did work", true, worked);
        crate::assert_with_log!(count() == 1, "timer fired during turn", 1usize, count());
        let idle = !el.turn();
        crate::assert_with_log!(idle, "loop drained", true, idle);
        crate::test_complete!("turn_sleeps_until_timer_deadline");
    }

    #[test]
    fn op_ids_are_unique_and_monotonic() {
        init_test("op_ids_are_unique_and_monotonic");
        let el = EventLoop::new();
        let a = el.allocate_op_id();
        let b = el.allocate_op_id();
        let c = el.allocate_op_id();
        crate::assert_with_log!(a < b && b < c, "monotonic ids", true, (a, b, c));
        crate::test_complete!("op_ids_are_unique_and_monotonic");
    }
}
