//! Execution contexts and serial work queues.
//!
//! # Responsibility
//! - Identify the execution context a handle is confined to.
//! - Provide named serial queues backed by a dedicated worker thread.
//!
//! # Invariants
//! - Jobs on one queue run one at a time, in submission order.
//! - A panicking job is logged and does not stop the queue.
//! - The worker thread exits once every `WorkQueue` clone is dropped.

use log::{debug, error};
use once_cell::sync::Lazy;
use std::fmt::{Debug, Formatter};
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread::{self, ThreadId};

type Job = Box<dyn FnOnce() + Send + 'static>;

const BACKGROUND_LABEL: &str = "basement.background";

static BACKGROUND: Lazy<Result<WorkQueue, (io::ErrorKind, String)>> = Lazy::new(|| {
    WorkQueue::new(BACKGROUND_LABEL).map_err(|err| {
        error!("event=queue_start module=queue status=error queue={BACKGROUND_LABEL} error={err}");
        (err.kind(), err.to_string())
    })
});

/// Identity of an execution context (the thread that runs it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(ThreadId);

impl ContextId {
    pub fn current() -> Self {
        Self(thread::current().id())
    }
}

/// Diagnostic name of the current execution context.
pub fn current_label() -> String {
    let current = thread::current();
    match current.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", current.id()),
    }
}

/// Named serial execution context.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    label: String,
    context: ContextId,
    sender: mpsc::Sender<Job>,
}

impl WorkQueue {
    /// Spawns the worker thread for a new queue.
    pub fn new(label: impl Into<String>) -> io::Result<Self> {
        let label = label.into();
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker_label = label.clone();
        let worker = thread::Builder::new()
            .name(label.clone())
            .spawn(move || run_worker(&worker_label, receiver))?;
        let context = ContextId(worker.thread().id());
        debug!("event=queue_start module=queue status=ok queue={label}");

        Ok(Self {
            inner: Arc::new(QueueInner {
                label,
                context,
                sender,
            }),
        })
    }

    /// Shared implicit background queue, spawned on first use.
    ///
    /// # Errors
    /// - Returns the spawn failure when the worker thread could not be started.
    pub fn background() -> io::Result<&'static WorkQueue> {
        BACKGROUND
            .as_ref()
            .map_err(|(kind, message)| io::Error::new(*kind, message.clone()))
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn context(&self) -> ContextId {
        self.inner.context
    }

    /// Returns whether the caller is running on this queue.
    pub fn is_current(&self) -> bool {
        ContextId::current() == self.inner.context
    }

    /// Schedules `job` after every job already submitted.
    ///
    /// Never runs `job` on the calling context, even when called from the
    /// queue itself.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.inner.sender.send(Box::new(job)).is_err() {
            error!(
                "event=queue_dispatch module=queue status=error queue={} error_code=worker_gone",
                self.inner.label
            );
        }
    }

    /// Runs `job` on the queue and waits for its result.
    ///
    /// Runs inline when called from the queue itself. Returns `None` when the
    /// job panicked.
    pub fn sync<T, F>(&self, job: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if self.is_current() {
            return Some(job());
        }
        let (result_tx, result_rx) = mpsc::channel();
        self.dispatch(move || {
            let _ = result_tx.send(job());
        });
        result_rx.recv().ok()
    }
}

impl Debug for WorkQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("label", &self.inner.label)
            .field("context", &self.inner.context)
            .finish()
    }
}

impl PartialEq for WorkQueue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for WorkQueue {}

fn run_worker(label: &str, receiver: mpsc::Receiver<Job>) {
    for job in receiver {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
            let message = payload
                .downcast_ref::<&str>()
                .map(|message| (*message).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(
                "event=queue_job module=queue status=panic queue={label} payload={}",
                message.replace(['\n', '\r'], " ")
            );
        }
    }
    debug!("event=queue_stop module=queue status=ok queue={label}");
}
