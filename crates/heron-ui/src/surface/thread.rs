use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};
use tracing::trace;

/// Posting to a worker whose thread has exited or been shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerClosed;

enum Task {
    Run(Box<dyn FnOnce() + Send>),
    Exit,
}

/// A dedicated worker thread standing in for one window's UI-toolkit
/// dispatcher.
///
/// All thread-affine work for a surface is funneled through `post` and
/// `run_sync`; the worker drains tasks in FIFO order until shut down.
/// Two surfaces never share a worker.
pub struct SurfaceThread {
    tx: Sender<Task>,
    id: ThreadId,
    closed: AtomicBool,
}

impl SurfaceThread {
    pub fn spawn(name: String) -> std::io::Result<Self> {
        let (tx, rx) = unbounded::<Task>();
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || run_worker(rx))?;
        Ok(Self {
            tx,
            id: handle.thread().id(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn thread_id(&self) -> ThreadId {
        self.id
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.id
    }

    /// Queue a task for the worker. Never blocks the caller.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> Result<(), WorkerClosed> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WorkerClosed);
        }
        self.tx
            .send(Task::Run(Box::new(task)))
            .map_err(|_| WorkerClosed)
    }

    /// Run a task on the worker and wait for its result.
    ///
    /// Runs inline when already called from the worker, so lifecycle
    /// broadcasts originating on a surface thread cannot deadlock against
    /// their own processor.
    pub fn run_sync<T, F>(&self, task: F) -> Result<T, WorkerClosed>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if self.is_current() {
            return Ok(task());
        }
        let (done_tx, done_rx) = bounded(1);
        self.post(move || {
            let _ = done_tx.send(task());
        })?;
        // The sender drops unfired if the worker exits mid-queue.
        done_rx.recv().map_err(|_| WorkerClosed)
    }

    /// Stop accepting tasks; the worker exits once everything queued ahead
    /// of the exit marker has drained.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(Task::Exit);
    }
}

fn run_worker(rx: Receiver<Task>) {
    while let Ok(task) = rx.recv() {
        match task {
            Task::Run(run) => run(),
            Task::Exit => break,
        }
    }
    trace!("surface worker exiting");
}
