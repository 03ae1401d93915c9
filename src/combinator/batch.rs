//! Batched task execution.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::combinator::Task;
use crate::future::Promise;
use crate::runtime::EventLoop;

struct BatchState<T> {
    tasks: Vec<Option<Task<T>>>,
    values: Vec<Option<T>>,
    group_start: usize,
    group_remaining: usize,
    size: usize,
    rejected: bool,
}

enum GroupAction {
    Wait,
    NextGroup,
    Resolve,
}

/// Partitions `tasks` into consecutive groups of `size`; groups run in
/// order, members of a group in parallel. Results aggregate in task
/// order. The first rejection rejects the combinator and stops later
/// groups from starting.
///
/// # Panics
///
/// Panics if `size` is zero.
pub fn batch<T: Clone + Send + 'static>(
    event_loop: &EventLoop,
    tasks: Vec<Task<T>>,
    size: usize,
) -> Promise<Vec<T>> {
    assert!(size > 0, "batch size must be non-zero");
    let result = Promise::pending(event_loop);
    let total = tasks.len();
    if total == 0 {
        result.resolve(Vec::new());
        return result;
    }
    let state = Arc::new(Mutex::new(BatchState {
        tasks: tasks.into_iter().map(Some).collect(),
        values: (0..total).map(|_| None).collect(),
        group_start: 0,
        group_remaining: 0,
        size,
        rejected: false,
    }));
    run_group(&state, &result);
    result
}

fn run_group<T: Clone + Send + 'static>(
    state: &Arc<Mutex<BatchState<T>>>,
    result: &Promise<Vec<T>>,
) {
    let group: Vec<(usize, Task<T>)> = {
        let mut s = state.lock();
        if s.rejected || s.group_start >= s.tasks.len() {
            return;
        }
        let start = s.group_start;
        let end = (start + s.size).min(s.tasks.len());
        s.group_start = end;
        s.group_remaining = end - start;
        (start..end)
            .filter_map(|i| s.tasks[i].take().map(|t| (i, t)))
            .collect()
    };
    for (index, task) in group {
        let promise = task();
        let state = Arc::clone(state);
        let result = result.clone();
        promise.subscribe(move |outcome| match outcome {
            Ok(value) => {
                let action = {
                    let mut s = state.lock();
                    if s.rejected {
                        return;
                    }
                    if s.values[index].is_none() {
                        s.values[index] = Some(value);
                        s.group_remaining -= 1;
                    }
                    if s.group_remaining > 0 {
                        GroupAction::Wait
                    } else if s.group_start >= s.tasks.len() {
                        GroupAction::Resolve
                    } else {
                        GroupAction::NextGroup
                    }
                };
                match action {
                    GroupAction::Wait => {}
                    GroupAction::NextGroup => run_group(&state, &result),
                    GroupAction::Resolve => {
                        let values = {
                            let mut s = state.lock();
                            s.values.iter_mut().map(Option::take).collect::<Option<Vec<T>>>()
                        };
                        if let Some(values) = values {
                            result.resolve(values);
                        }
                    }
                }
            }
            Err(error) => {
                let first = {
                    let mut s = state.lock();
                    if s.rejected {
                        false
                    } else {
                        s.rejected = true;
                        true
                    }
                };
                if first {
                    result.reject(error);
                }
            }
        });
    }
}
