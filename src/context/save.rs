//! Cascading save
//!
//! Saving a context commits its changes into its parent, then saves the parent,
//! and so on until the root commits to the engine. Each step runs on the queue
//! of the context it commits, so a level never blocks on another level's
//! worker. The cascade stops early at the first context with nothing to save.
//!
//! A failure at any level is reported once, through the completion, as
//! [`StoreError::SaveFailed`]. Levels already committed stay committed; the
//! failing level keeps its pending changes.

use super::Context;
use crate::entity::ObjectId;
use crate::error::{StoreError, StoreResult};
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Result of a successful save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The saved context had no pending changes
    NothingToSave,
    /// Changes were committed through `levels` contexts
    Saved { levels: usize },
}

pub(crate) type Completion = Box<dyn FnOnce(StoreResult<SaveOutcome>) + Send + 'static>;

impl Context {
    /// Save and block until the cascade completes or fails
    pub fn save_to_store(&self) -> StoreResult<SaveOutcome> {
        let (tx, rx) = oneshot::channel();
        self.start_save(Box::new(move |result| {
            let _ = tx.send(result);
        }));
        rx.blocking_recv()
            .unwrap_or_else(|_| Err(StoreError::Aborted(format!("save of {}", self.label()))))
    }

    /// Save, resolving once the cascade completes or fails
    pub fn save_to_store_async(&self) -> impl Future<Output = StoreResult<SaveOutcome>> + Send {
        let (tx, rx) = oneshot::channel();
        let label = self.label().to_string();
        self.start_save(Box::new(move |result| {
            let _ = tx.send(result);
        }));
        rx.map(move |result| {
            result.unwrap_or_else(|_| Err(StoreError::Aborted(format!("save of {}", label))))
        })
    }

    /// Save without waiting; `completion` runs exactly once on the worker of
    /// the level where the cascade ended.
    pub fn save_to_store_then<F>(&self, completion: F)
    where
        F: FnOnce(StoreResult<SaveOutcome>) + Send + 'static,
    {
        self.start_save(Box::new(completion));
    }

    fn start_save(&self, completion: Completion) {
        if self.is_current() {
            cascade(self.clone(), 0, completion);
        } else {
            let ctx = self.clone();
            self.submit(Box::new(move || cascade(ctx, 0, completion)));
        }
    }

    /// Fold a child's committed changes into this context's working set
    fn absorb(&self, changes: crate::store::ChangeSet) {
        let missing = self.working().missing_bases(&changes);
        let mut bases = HashMap::new();
        for (kind, id) in missing {
            match self.parent_view_get(&kind, id) {
                Ok(Some(base)) => {
                    bases.insert(id, base);
                }
                Ok(None) => warn_missing_base(self, &kind, id, None),
                Err(e) => warn_missing_base(self, &kind, id, Some(&e)),
            }
        }
        self.working().merge_child(changes, bases);
    }

    /// Write this root context's changes to the engine
    fn commit_to_engine(&self) -> Result<usize, crate::error::StorageError> {
        let backend = self.engine().backend()?;
        let changes = self.working().snapshot();
        backend.apply(&changes, self.engine().allocated_watermark())?;
        self.working().clear();
        Ok(changes.len())
    }
}

fn warn_missing_base(ctx: &Context, kind: &str, id: ObjectId, err: Option<&StoreError>) {
    warn!(
        context = %ctx.label(),
        kind,
        object = %id,
        error = err.map(|e| e.to_string()),
        "updated record not visible in parent; merging the child's copy"
    );
}

/// One level of the cascade, running on `ctx`'s worker
fn cascade(ctx: Context, level: usize, completion: Completion) {
    if !ctx.working().has_changes() {
        if level == 0 {
            debug!(context = %ctx.label(), "Context has no changes to be saved");
            completion(Ok(SaveOutcome::NothingToSave));
        } else {
            completion(Ok(SaveOutcome::Saved { levels: level }));
        }
        return;
    }

    match ctx.parent().cloned() {
        Some(parent) => {
            let changes = ctx.working().take();
            info!(
                context = %ctx.label(),
                parent = %parent.label(),
                level,
                changes = changes.len(),
                "committed changes into parent"
            );
            let next = parent.clone();
            parent.submit(Box::new(move || {
                next.absorb(changes);
                cascade(next, level + 1, completion);
            }));
        }
        None => match ctx.commit_to_engine() {
            Ok(count) => {
                info!(context = %ctx.label(), level, changes = count, "saved changes to store");
                completion(Ok(SaveOutcome::Saved { levels: level + 1 }));
            }
            Err(source) => {
                error!(
                    context = %ctx.label(),
                    level,
                    error = %source,
                    "failed to save changes to store"
                );
                completion(Err(StoreError::SaveFailed {
                    level,
                    context: ctx.label().to_string(),
                    source,
                }));
            }
        },
    }
}
