//! Dedicated I/O thread.
//!
//! A named OS thread running a tokio current-thread runtime. Posted tasks run
//! one at a time in posting order; socket reader and writer futures are
//! spawned onto the same runtime, so everything touching the channel happens
//! on this one thread.

use crate::{IpcError, Result};
use midibridge_core::{Task, TaskRunner};
use std::future::Future;
use std::thread::{self, ThreadId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Posting side of an [`IoThread`]. Clone is cheap.
#[derive(Clone)]
pub struct IoHandle {
    tasks: mpsc::UnboundedSender<Task>,
    runtime: tokio::runtime::Handle,
    thread_id: ThreadId,
}

impl IoHandle {
    /// Spawn a future onto the I/O runtime.
    pub fn spawn<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(future)
    }

    pub fn is_closed(&self) -> bool {
        self.tasks.is_closed()
    }
}

impl TaskRunner for IoHandle {
    fn post_task(&self, task: Task) -> bool {
        self.tasks.send(task).is_ok()
    }

    fn thread_id(&self) -> ThreadId {
        self.thread_id
    }
}

impl std::fmt::Debug for IoHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoHandle")
            .field("thread_id", &self.thread_id)
            .field("closed", &self.tasks.is_closed())
            .finish()
    }
}

/// Owns the I/O thread. Shuts it down when dropped.
pub struct IoThread {
    handle: IoHandle,
    shutdown: Option<oneshot::Sender<()>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl IoThread {
    /// Start the thread and wait until its runtime is up.
    pub fn spawn(name: &str) -> Result<Self> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (task_tx, task_rx) = mpsc::unbounded_channel::<Task>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok((runtime.handle().clone(), thread::current().id())));

                runtime.block_on(Self::run(task_rx, shutdown_rx));
                debug!("I/O thread stopped");
            })?;

        let (runtime, thread_id) = match ready_rx.recv() {
            Ok(Ok(ready)) => ready,
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                return Err(IpcError::RuntimeStart(e));
            }
            Err(_) => {
                let _ = thread_handle.join();
                return Err(IpcError::RuntimeStart(
                    "I/O thread exited during startup".to_string(),
                ));
            }
        };

        debug!("I/O thread '{}' started", name);
        Ok(Self {
            handle: IoHandle {
                tasks: task_tx,
                runtime,
                thread_id,
            },
            shutdown: Some(shutdown_tx),
            thread_handle: Some(thread_handle),
        })
    }

    async fn run(mut tasks: mpsc::UnboundedReceiver<Task>, mut shutdown: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                biased;
                task = tasks.recv() => match task {
                    Some(task) => task(),
                    None => break,
                },
                _ = &mut shutdown => break,
            }
        }
    }

    pub fn handle(&self) -> IoHandle {
        self.handle.clone()
    }

    /// Stop the runtime and join the thread.
    ///
    /// Tasks already queued still run; spawned futures are dropped.
    pub fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(handle) = self.thread_handle.take() {
            if handle.thread().id() == thread::current().id() {
                warn!("IoThread shut down from its own thread; not joining");
                return;
            }
            let _ = handle.join();
        }
    }
}

impl TaskRunner for IoThread {
    fn post_task(&self, task: Task) -> bool {
        self.handle.post_task(task)
    }

    fn thread_id(&self) -> ThreadId {
        self.handle.thread_id
    }
}

impl Drop for IoThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for IoThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoThread")
            .field("thread_id", &self.handle.thread_id)
            .field("running", &self.thread_handle.is_some())
            .finish()
    }
}
