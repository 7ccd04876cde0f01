//! Thread-safe task queue for the worker event loop.
//!
//! Two containers behind one mutex: a FIFO of immediate tasks and a
//! min-heap of delayed tasks keyed by run time. Selection follows web
//! event-loop semantics: immediate tasks (messages, zero-delay timers)
//! take precedence over delayed tasks even when a delayed task is
//! overdue. Cancellation is by id and resolved at dequeue; the task
//! stays in its container until then.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use hornet_core::ScriptError;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashSet;

use crate::engine::ScriptEngine;

/// A task body. Runs under the worker's engine mutex; an `Err` is
/// surfaced through the error callback, never out of the event loop.
pub type TaskFn = Box<dyn FnOnce(&mut dyn ScriptEngine) -> Result<(), ScriptError> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    /// `postMessage` from the host.
    Message,
    /// A timer firing.
    Timer,
    /// `setImmediate`-style work.
    Immediate,
    /// Loop-exit request.
    Close,
}

/// One unit of event-loop work. `id` is unique within the owning
/// worker; `run_at` is assigned by the queue on enqueue.
pub struct Task {
    pub task_type: TaskType,
    pub id: u64,
    pub run_at: Instant,
    pub cancelled: bool,
    execute: TaskFn,
}

impl Task {
    pub fn new(task_type: TaskType, id: u64, execute: TaskFn) -> Self {
        Self {
            task_type,
            id,
            run_at: Instant::now(),
            cancelled: false,
            execute,
        }
    }

    /// Consume the task, running its body.
    pub fn run(self, engine: &mut dyn ScriptEngine) -> Result<(), ScriptError> {
        (self.execute)(engine)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("task_type", &self.task_type)
            .field("id", &self.id)
            .field("run_at", &self.run_at)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

/// Heap entry: earlier `run_at` first, insertion order breaking ties so
/// equal timestamps keep FIFO semantics.
struct DelayedEntry {
    task: Task,
    seq: u64,
}

impl PartialEq for DelayedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DelayedEntry {}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the earliest.
        other
            .task
            .run_at
            .cmp(&self.task.run_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    immediate: VecDeque<Task>,
    delayed: BinaryHeap<DelayedEntry>,
    cancelled: FxHashSet<u64>,
    shutting_down: bool,
    next_seq: u64,
}

#[derive(Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue for immediate execution.
    pub fn enqueue(&self, mut task: Task) {
        {
            let mut state = self.state.lock();
            task.run_at = Instant::now();
            state.immediate.push_back(task);
        }
        self.available.notify_one();
    }

    /// Enqueue to run once `delay` has elapsed.
    pub fn enqueue_delayed(&self, mut task: Task, delay: Duration) {
        {
            let mut state = self.state.lock();
            task.run_at = Instant::now() + delay;
            let seq = state.next_seq;
            state.next_seq += 1;
            state.delayed.push(DelayedEntry { task, seq });
        }
        self.available.notify_one();
    }

    /// Mark a task cancelled. Idempotent; the task is discarded when it
    /// reaches the front of whichever container holds it.
    pub fn cancel(&self, task_id: u64) {
        self.state.lock().cancelled.insert(task_id);
    }

    /// Next runnable task, or `None` once `max_wait` elapses or the
    /// queue shuts down.
    pub fn dequeue(&self, max_wait: Duration) -> Option<Task> {
        let mut state = self.state.lock();
        let deadline = Instant::now()
            .checked_add(max_wait)
            .unwrap_or_else(far_future);

        loop {
            if state.shutting_down {
                return None;
            }

            let now = Instant::now();

            // Immediate tasks first, skipping cancelled ones.
            while let Some(task) = state.immediate.pop_front() {
                if state.cancelled.remove(&task.id) {
                    continue;
                }
                return Some(task);
            }

            // Discard cancelled delayed tasks from the top of the heap.
            loop {
                let top_cancelled = state
                    .delayed
                    .peek()
                    .is_some_and(|entry| state.cancelled.contains(&entry.task.id));
                if !top_cancelled {
                    break;
                }
                if let Some(entry) = state.delayed.pop() {
                    state.cancelled.remove(&entry.task.id);
                }
            }

            let due = state
                .delayed
                .peek()
                .is_some_and(|entry| entry.task.run_at <= now);
            if due {
                return Some(state.delayed.pop().expect("peeked entry").task);
            }

            if now >= deadline {
                return None;
            }

            let mut wait_until = deadline;
            if let Some(entry) = state.delayed.peek() {
                if entry.task.run_at < wait_until {
                    wait_until = entry.task.run_at;
                }
            }
            let _ = self.available.wait_until(&mut state, wait_until);
        }
    }

    /// Zero if anything is runnable now, the delay until the next
    /// delayed task otherwise, `Duration::MAX` when idle.
    pub fn time_until_next(&self) -> Duration {
        let state = self.state.lock();
        if !state.immediate.is_empty() {
            return Duration::ZERO;
        }
        match state.delayed.peek() {
            Some(entry) => entry.task.run_at.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }

    pub fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.immediate.is_empty() && state.delayed.is_empty()
    }

    /// Stop the queue. Pending tasks are dropped, not drained; every
    /// blocked `dequeue` returns `None`.
    pub fn shutdown(&self) {
        self.state.lock().shutting_down = true;
        self.available.notify_all();
    }
}

fn far_future() -> Instant {
    // Only reached for callers waiting "forever"; one year is past any
    // plausible test or shutdown horizon.
    Instant::now() + Duration::from_secs(365 * 24 * 60 * 60)
}
