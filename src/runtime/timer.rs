//! Timer heap for deadline management.
//!
//! A small min-heap of `(deadline, timer)` pairs. Entries for removed
//! timers are discarded lazily when popped; same-deadline entries pop in
//! insertion order via a monotone generation counter.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

/// Identifier for a scheduled timer.
pub type TimerId = u64;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct TimerEntry {
    due: Instant,
    id: TimerId,
    generation: u64,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first).
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of timers ordered by deadline.
#[derive(Debug, Default)]
pub(crate) struct TimerHeap {
    heap: BinaryHeap<TimerEntry>,
    next_generation: u64,
}

impl TimerHeap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Schedules `id` for `due`.
    pub(crate) fn insert(&mut self, id: TimerId, due: Instant) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.heap.push(TimerEntry { due, id, generation });
    }

    /// Returns the earliest deadline, if any.
    pub(crate) fn peek_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|e| e.due)
    }

    /// Pops the earliest timer whose deadline is `<= now`.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Option<TimerId> {
        match self.heap.peek() {
            Some(entry) if entry.due <= now => self.heap.pop().map(|e| e.id),
            _ => None,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
    }
}
