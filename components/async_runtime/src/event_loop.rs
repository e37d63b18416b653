//! Event loop implementation.
//!
//! This module provides the run loop that promises are confined to. It owns a
//! FIFO task queue and a delayed-task queue, and receives work from any thread
//! through a channel so that every state change happens on the loop's thread.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use promise_types::PromiseResult;
use tracing::{debug, trace};

use crate::config::EventLoopConfig;
use crate::promise::Promise;
use crate::scheduler::{Scheduler, SharedScheduler};
use crate::task_queue::{DelayedQueue, Task, TaskHandle, TaskQueue};

/// Cap for delays too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

enum Message {
    Post(Task),
    PostDelayed {
        handle: TaskHandle,
        due: Instant,
        task: Task,
    },
    Remove(TaskHandle),
    Quit,
}

struct LoopShared {
    name: String,
    owner: ThreadId,
    sender: Sender<Message>,
    next_handle: AtomicU64,
}

/// A cloneable, thread-safe handle to an [`EventLoop`].
///
/// This is the loop's [`Scheduler`] implementation: posting through it is the
/// only way other threads reach the loop. Messages sent after the loop has
/// been dropped are discarded.
#[derive(Clone)]
pub struct LoopHandle {
    shared: Arc<LoopShared>,
}

impl LoopHandle {
    /// Returns the name of the loop.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Asks [`EventLoop::run`] to return after the current turn.
    pub fn quit(&self) {
        self.send(Message::Quit);
    }

    fn send(&self, message: Message) {
        if self.shared.sender.send(message).is_err() {
            trace!(event_loop = %self.shared.name, "event loop dropped, discarding message");
        }
    }
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle")
            .field("name", &self.shared.name)
            .finish()
    }
}

impl Scheduler for LoopHandle {
    fn post(&self, task: Task) {
        self.send(Message::Post(task));
    }

    fn post_delayed(&self, task: Task, delay: Duration) -> TaskHandle {
        let handle = TaskHandle::from_raw(self.shared.next_handle.fetch_add(1, Ordering::Relaxed));
        let now = Instant::now();
        let due = now
            .checked_add(delay)
            .unwrap_or_else(|| now + FAR_FUTURE);
        self.send(Message::PostDelayed { handle, due, task });
        handle
    }

    fn remove(&self, handle: TaskHandle) {
        self.send(Message::Remove(handle));
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.shared.owner
    }
}

/// A single-threaded run loop.
///
/// The loop is bound to the thread that creates it and is driven explicitly
/// by that thread. Each turn:
/// 1. Moves everything posted so far (from any thread) into the task queue
/// 2. Promotes delayed tasks that are due
/// 3. Runs queued tasks in FIFO order, up to the configured budget
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Promise};
///
/// let mut event_loop = EventLoop::new();
/// let scheduler = event_loop.scheduler();
///
/// let doubled = Promise::fulfilled(&scheduler, 21).map(|v| v * 2);
/// assert_eq!(event_loop.run_until_settled(&doubled).unwrap(), 42);
/// ```
pub struct EventLoop {
    config: EventLoopConfig,
    handle: LoopHandle,
    scheduler: SharedScheduler,
    inbox: Receiver<Message>,
    task_queue: TaskQueue,
    delayed_queue: DelayedQueue,
    quit_requested: bool,
    // Tasks must run on the thread recorded as owner.
    _thread_bound: PhantomData<*const ()>,
}

impl EventLoop {
    /// Creates a new EventLoop with the default configuration, owned by the
    /// calling thread.
    pub fn new() -> Self {
        Self::with_config(EventLoopConfig::default())
    }

    /// Creates a new EventLoop owned by the calling thread.
    pub fn with_config(mut config: EventLoopConfig) -> Self {
        config.max_tasks_per_turn = config.max_tasks_per_turn.max(1);
        let (sender, inbox) = channel::unbounded();
        let handle = LoopHandle {
            shared: Arc::new(LoopShared {
                name: config.name.clone(),
                owner: thread::current().id(),
                sender,
                next_handle: AtomicU64::new(1),
            }),
        };
        debug!(event_loop = %config.name, "event loop created");

        Self {
            config,
            scheduler: Arc::new(handle.clone()),
            handle,
            inbox,
            task_queue: TaskQueue::new(),
            delayed_queue: DelayedQueue::new(),
            quit_requested: false,
            _thread_bound: PhantomData,
        }
    }

    /// Returns a handle for posting to this loop.
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Returns the loop as a shared scheduler for constructing promises.
    pub fn scheduler(&self) -> SharedScheduler {
        self.scheduler.clone()
    }

    /// Returns the loop configuration.
    pub fn config(&self) -> &EventLoopConfig {
        &self.config
    }

    /// Returns the number of immediate tasks waiting to run.
    pub fn pending_tasks(&self) -> usize {
        self.task_queue.len() + self.inbox.len()
    }

    /// Returns the number of delayed tasks that have not been promoted yet.
    pub fn pending_delayed(&self) -> usize {
        self.delayed_queue.len()
    }

    /// Runs one turn without blocking.
    ///
    /// # Returns
    ///
    /// The number of tasks that ran.
    pub fn run_pending(&mut self) -> usize {
        self.drain_inbox();
        self.promote_due();

        let mut ran = 0;
        while ran < self.config.max_tasks_per_turn {
            match self.task_queue.dequeue() {
                Some(task) => {
                    task.run();
                    ran += 1;
                }
                None => break,
            }
        }
        if ran > 0 {
            trace!(event_loop = %self.config.name, ran, "turn complete");
        }
        ran
    }

    /// Runs until no immediate or delayed task is left.
    ///
    /// Sleeps until the next delayed task is due when only delayed work
    /// remains. Work that other threads have not posted yet is not waited for;
    /// use [`run_until`](Self::run_until) for that.
    pub fn run_until_idle(&mut self) {
        loop {
            self.run_pending();
            if !self.task_queue.is_empty() || !self.inbox.is_empty() {
                continue;
            }
            if self.delayed_queue.is_empty() {
                break;
            }
            self.wait_for_work();
        }
    }

    /// Runs until `done` returns true, blocking for new work in between.
    ///
    /// Blocks forever if `done` never holds and nothing is ever posted.
    pub fn run_until<F>(&mut self, mut done: F)
    where
        F: FnMut() -> bool,
    {
        while !done() {
            self.step();
        }
    }

    /// Runs until `promise` settles and returns its outcome.
    ///
    /// The promise must be settled by this loop or by a thread posting to it;
    /// otherwise this blocks forever.
    pub fn run_until_settled<T>(&mut self, promise: &Promise<T>) -> PromiseResult<T>
    where
        T: Clone + Send + 'static,
    {
        loop {
            if let Some(outcome) = promise.outcome() {
                return outcome.into_result();
            }
            self.step();
        }
    }

    /// Runs until [`LoopHandle::quit`] is called.
    pub fn run(&mut self) {
        debug!(event_loop = %self.config.name, "event loop running");
        self.quit_requested = false;
        while !self.quit_requested {
            self.step();
        }
        debug!(event_loop = %self.config.name, "event loop stopped");
    }

    fn step(&mut self) {
        if self.run_pending() == 0 && self.task_queue.is_empty() && !self.quit_requested {
            self.wait_for_work();
        }
    }

    fn drain_inbox(&mut self) {
        while let Ok(message) = self.inbox.try_recv() {
            self.accept(message);
        }
    }

    fn promote_due(&mut self) {
        let now = Instant::now();
        while let Some(task) = self.delayed_queue.pop_due(now) {
            self.task_queue.enqueue(task);
        }
    }

    // Blocks until a message arrives or the next delayed task is due.
    fn wait_for_work(&mut self) {
        let message = match self.delayed_queue.next_due() {
            Some(due) => self.inbox.recv_deadline(due).ok(),
            None => self.inbox.recv().ok(),
        };
        if let Some(message) = message {
            self.accept(message);
        }
    }

    fn accept(&mut self, message: Message) {
        match message {
            Message::Post(task) => self.task_queue.enqueue(task),
            Message::PostDelayed { handle, due, task } => {
                trace!(event_loop = %self.config.name, handle = handle.as_raw(), "delayed task scheduled");
                self.delayed_queue.insert(handle, due, task);
            }
            Message::Remove(handle) => {
                let removed = self.delayed_queue.remove(handle);
                trace!(event_loop = %self.config.name, handle = handle.as_raw(), removed, "delayed task removal");
            }
            Message::Quit => self.quit_requested = true,
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("name", &self.config.name)
            .field("pending_tasks", &self.pending_tasks())
            .field("pending_delayed", &self.pending_delayed())
            .finish()
    }
}
