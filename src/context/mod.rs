//! Context hierarchy
//!
//! A [`Context`] is an isolated, serially-executed scratch space over the
//! engine. The main context sits directly on the engine; background contexts
//! are children of main (or of another background context). Each context runs
//! its work on a dedicated worker thread, so everything that touches its
//! working set happens in FIFO order.
//!
//! Reads see the parent's view overlaid with this context's own pending
//! changes. Saves cascade upward one level at a time (see [`save`]).

pub mod save;

mod queue;
mod view;
mod working_set;

pub use save::SaveOutcome;

use crate::error::{fatal, FatalConfiguration};
use crate::schema::Schema;
use crate::store::Engine;
use futures::FutureExt;
use parking_lot::Mutex;
use queue::{ContextQueue, Job};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;
use working_set::WorkingSet;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Role of a context in the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Root context bound to the engine
    Main,
    /// Child context for off-main work
    Background,
}

/// State shared by every context of one open store
pub(crate) struct ContextShared {
    pub(crate) schema: Arc<Schema>,
    pub(crate) engine: Arc<Engine>,
    pub(crate) default_identity_key: String,
}

struct ContextInner {
    label: String,
    kind: ContextKind,
    parent: Option<Context>,
    shared: Arc<ContextShared>,
    queue: ContextQueue,
    working: Mutex<WorkingSet>,
}

/// Handle to a context. Cloning yields another handle to the same context.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    pub(crate) fn new_main(shared: Arc<ContextShared>) -> Context {
        Self::spawn(ContextKind::Main, None, shared)
    }

    /// Create a background context whose parent is this context
    pub fn new_child(&self) -> Context {
        let child = Self::spawn(
            ContextKind::Background,
            Some(self.clone()),
            self.inner.shared.clone(),
        );
        debug!(context = %child.label(), parent = %self.label(), "created child context");
        child
    }

    fn spawn(
        kind: ContextKind,
        parent: Option<Context>,
        shared: Arc<ContextShared>,
    ) -> Context {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let label = match kind {
            ContextKind::Main => "main".to_string(),
            ContextKind::Background => format!("background-{}", id),
        };
        let queue = ContextQueue::spawn(id, &label).unwrap_or_else(|e| {
            fatal(FatalConfiguration::QueueSpawn {
                label: label.clone(),
                message: e.to_string(),
            })
        });
        Context {
            inner: Arc::new(ContextInner {
                label,
                kind,
                parent,
                shared,
                queue,
                working: Mutex::new(WorkingSet::default()),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn kind(&self) -> ContextKind {
        self.inner.kind
    }

    pub fn parent(&self) -> Option<&Context> {
        self.inner.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// Number of ancestors between this context and the engine
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent();
        while let Some(ctx) = current {
            depth += 1;
            current = ctx.parent();
        }
        depth
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.shared.schema
    }

    /// Identity key used by imports that do not name one
    pub fn default_identity_key(&self) -> &str {
        &self.inner.shared.default_identity_key
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.inner.shared.engine
    }

    pub(crate) fn working(&self) -> parking_lot::MutexGuard<'_, WorkingSet> {
        self.inner.working.lock()
    }

    /// Whether the calling thread is this context's worker
    pub fn is_current(&self) -> bool {
        self.inner.queue.is_current()
    }

    /// Whether this context holds unsaved inserts, updates or deletes
    pub fn has_changes(&self) -> bool {
        self.perform_and_wait(|ctx| ctx.working().has_changes())
    }

    /// Discard every pending change in this context
    pub fn rollback(&self) {
        self.perform_and_wait(|ctx| {
            ctx.working().clear();
            debug!(context = %ctx.label(), "rolled back pending changes");
        })
    }

    pub(crate) fn submit(&self, job: Job) {
        if !self.inner.queue.submit(job) {
            fatal(FatalConfiguration::QueueStopped(self.label().to_string()));
        }
    }

    /// Run `work` on this context's queue and block until it finishes.
    ///
    /// Called from this context's own worker, `work` runs inline. A panic inside
    /// `work` is resumed on the calling thread.
    ///
    /// Blocking on a context from inside an async runtime thread, or from an
    /// ancestor's worker, is not supported; use [`Context::perform`] there.
    pub fn perform_and_wait<T, F>(&self, work: F) -> T
    where
        F: FnOnce(&Context) -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_current() {
            return work(self);
        }
        let (tx, rx) = oneshot::channel();
        let ctx = self.clone();
        self.submit(Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&ctx)));
            let _ = tx.send(outcome);
        }));
        match rx.blocking_recv() {
            Ok(Ok(value)) => value,
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => fatal(FatalConfiguration::QueueStopped(self.label().to_string())),
        }
    }

    /// Enqueue `work` on this context's queue, resolving once it has run.
    ///
    /// The work is queued even when called from this context's own worker.
    pub fn perform<T, F>(&self, work: F) -> impl Future<Output = T> + Send + 'static
    where
        F: FnOnce(&Context) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let ctx = self.clone();
        self.submit(Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&ctx)));
            let _ = tx.send(outcome);
        }));
        let label = self.label().to_string();
        rx.map(move |outcome| match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => fatal(FatalConfiguration::QueueStopped(label)),
        })
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("label", &self.inner.label)
            .field("kind", &self.inner.kind)
            .field("parent", &self.parent().map(Context::label))
            .finish()
    }
}
