//! Task and delayed-task queue management.
//!
//! This module provides the queues used by the event loop. Immediate tasks run
//! in FIFO order; delayed tasks are kept ordered by due time and promoted into
//! the FIFO queue once they are due.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Instant;

/// A task to be executed by a scheduler.
///
/// Tasks represent work to be done on the scheduler's thread: producer
/// invocations, continuation dispatch and settlement requests marshaled from
/// other threads.
pub struct Task {
    callback: Box<dyn FnOnce() + Send>,
}

impl Task {
    /// Creates a new Task from a closure.
    ///
    /// # Arguments
    ///
    /// * `f` - The function to execute when the task runs
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the task.
    pub fn run(self) {
        (self.callback)()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task {{ ... }}")
    }
}

/// Identifies a delayed task so it can be removed before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
    /// Creates a handle from a raw id.
    pub fn from_raw(id: u64) -> Self {
        TaskHandle(id)
    }

    /// Returns the raw id of this handle.
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// A queue for tasks.
///
/// Tasks are processed in FIFO order, one at a time.
#[derive(Debug, Default)]
pub struct TaskQueue {
    queue: VecDeque<Task>,
}

impl TaskQueue {
    /// Creates a new empty TaskQueue.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Adds a task to the end of the queue.
    pub fn enqueue(&mut self, task: Task) {
        self.queue.push_back(task);
    }

    /// Removes and returns the next task from the queue.
    pub fn dequeue(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of tasks in the queue.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

/// A queue for tasks that become runnable at a later time.
///
/// Ordering is by due time, then by insertion; removal by handle is
/// best-effort and only affects tasks that have not been promoted yet.
#[derive(Debug, Default)]
pub struct DelayedQueue {
    entries: BTreeMap<(Instant, TaskHandle), Task>,
    index: HashMap<TaskHandle, Instant>,
}

impl DelayedQueue {
    /// Creates a new empty DelayedQueue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `task` to become runnable at `due`.
    pub fn insert(&mut self, handle: TaskHandle, due: Instant, task: Task) {
        self.index.insert(handle, due);
        self.entries.insert((due, handle), task);
    }

    /// Removes the task registered under `handle`.
    ///
    /// Returns true if the task was still waiting.
    pub fn remove(&mut self, handle: TaskHandle) -> bool {
        match self.index.remove(&handle) {
            Some(due) => self.entries.remove(&(due, handle)).is_some(),
            None => false,
        }
    }

    /// Returns the earliest due time, if any task is waiting.
    pub fn next_due(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(due, _)| *due)
    }

    /// Removes and returns the earliest task whose due time is at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<Task> {
        let key = *self.entries.keys().next()?;
        if key.0 > now {
            return None;
        }
        self.index.remove(&key.1);
        self.entries.remove(&key)
    }

    /// Returns true if no task is waiting.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of waiting tasks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
