//! Execution contexts and thread-affine state.
//!
//! The filter lives on two fixed threads: the main thread, where clients are
//! notified, and the I/O thread, where the channel to the peer is read and
//! written. Work crosses between them as one-shot [`Task`]s posted to a
//! [`TaskRunner`]. State owned by one side sits in a [`ThreadBound`] cell that
//! checks the owning thread on every access.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::cell::RefCell;
use std::thread::{self, ThreadId};
use std::time::Duration;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A queue of tasks serviced by exactly one thread.
pub trait TaskRunner: Send + Sync {
    /// Queue `task` for execution. Never blocks.
    ///
    /// Returns `false` if the context has shut down; the task is dropped.
    fn post_task(&self, task: Task) -> bool;

    /// The thread that runs posted tasks.
    fn thread_id(&self) -> ThreadId;

    fn belongs_to_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id()
    }
}

/// Task queue pumped by the thread that created it.
///
/// Hosts use this for the main thread: post from anywhere through a
/// [`LoopHandle`], then drain with [`run_until_idle`](Self::run_until_idle)
/// from their own event loop.
pub struct TaskLoop {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    thread_id: ThreadId,
}

impl TaskLoop {
    /// Bind a new loop to the calling thread.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            thread_id: thread::current().id(),
        }
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            sender: self.sender.clone(),
            thread_id: self.thread_id,
        }
    }

    /// Run tasks until the queue is empty, including tasks posted while running.
    ///
    /// Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        self.assert_owner();
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Run only the tasks queued at the time of the call.
    pub fn run_pending(&self) -> usize {
        self.assert_owner();
        let pending = self.receiver.len();
        let mut ran = 0;
        while ran < pending {
            match self.receiver.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// Wait up to `timeout` for one task and run it.
    pub fn run_one_timeout(&self, timeout: Duration) -> bool {
        self.assert_owner();
        match self.receiver.recv_timeout(timeout) {
            Ok(task) => {
                task();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    pub fn pending_tasks(&self) -> usize {
        self.receiver.len()
    }

    fn assert_owner(&self) {
        assert_eq!(
            thread::current().id(),
            self.thread_id,
            "TaskLoop pumped off its owning thread"
        );
    }
}

impl Default for TaskLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLoop")
            .field("thread_id", &self.thread_id)
            .field("pending", &self.receiver.len())
            .finish()
    }
}

/// Posting side of a [`TaskLoop`]. Clone is cheap.
#[derive(Clone)]
pub struct LoopHandle {
    sender: Sender<Task>,
    thread_id: ThreadId,
}

impl TaskRunner for LoopHandle {
    fn post_task(&self, task: Task) -> bool {
        self.sender.send(task).is_ok()
    }

    fn thread_id(&self) -> ThreadId {
        self.thread_id
    }
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

/// Value that may only be touched from one thread.
///
/// Every access checks the calling thread and panics on a mismatch. Borrows
/// are scoped to the closure passed to [`with`](Self::with), so callbacks that
/// re-enter the owner must be made after the closure returns.
pub(crate) struct ThreadBound<T> {
    owner: ThreadId,
    label: &'static str,
    value: RefCell<T>,
}

// SAFETY: the RefCell is only borrowed through `with`, which asserts that the
// caller is the owning thread, so it is never accessed concurrently. `T: Send`
// covers the value being dropped on whichever thread releases the last Arc.
unsafe impl<T: Send> Sync for ThreadBound<T> {}

impl<T> ThreadBound<T> {
    pub(crate) fn new(owner: ThreadId, label: &'static str, value: T) -> Self {
        Self {
            owner,
            label,
            value: RefCell::new(value),
        }
    }

    #[track_caller]
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        assert!(
            thread::current().id() == self.owner,
            "{} state touched off its owning thread",
            self.label
        );
        f(&mut self.value.borrow_mut())
    }
}
