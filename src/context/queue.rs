//! Context queues
//!
//! Every context owns one worker thread draining a FIFO channel of jobs. The
//! worker records which context it serves in a thread-local, so calls made from
//! inside a job on the same context can run inline instead of queueing behind
//! themselves.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, error};

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static CURRENT_CONTEXT: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Serial job queue bound to one context
pub(crate) struct ContextQueue {
    context_id: u64,
    tx: mpsc::UnboundedSender<Job>,
}

impl ContextQueue {
    /// Start the worker thread. It exits once the queue handle is dropped and
    /// the remaining jobs have run.
    pub(crate) fn spawn(context_id: u64, label: &str) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let thread_label = label.to_string();
        thread::Builder::new()
            .name(format!("ctxstore-{}", label))
            .spawn(move || {
                CURRENT_CONTEXT.with(|current| current.set(Some(context_id)));
                while let Some(job) = rx.blocking_recv() {
                    // Jobs forward their own panics to the caller; this only keeps
                    // the worker alive for fire-and-forget submissions.
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!(context = %thread_label, "context job panicked");
                    }
                }
                debug!(context = %thread_label, "context queue drained");
            })?;
        Ok(Self { context_id, tx })
    }

    /// Enqueue a job. Returns false if the worker is gone.
    pub(crate) fn submit(&self, job: Job) -> bool {
        self.tx.send(job).is_ok()
    }

    /// Whether the calling thread is this queue's worker
    pub(crate) fn is_current(&self) -> bool {
        CURRENT_CONTEXT.with(|current| current.get() == Some(self.context_id))
    }
}
