//! Staging edits to existing records

use crate::context::Context;
use crate::entity::Record;
use crate::error::{StoreError, StoreResult};

impl Context {
    /// Stage the attributes of `record` that differ from this context's view.
    ///
    /// Unchanged records are a no-op. A record no longer visible here (never
    /// existed, or deleted) is `ObjectNotFound`.
    pub fn update(&self, record: &Record) -> StoreResult<()> {
        self.schema().require_kind(record.kind());
        let record = record.clone();
        self.perform_and_wait(move |ctx| ctx.stage_update(record))
    }

    pub(crate) fn stage_update(&self, record: Record) -> StoreResult<()> {
        let current = self
            .view_get(record.kind(), record.id())?
            .ok_or(StoreError::ObjectNotFound(record.id()))?;
        let changed = record.changed_attributes(&current);
        if !changed.is_empty() {
            self.working().stage_update(record, changed);
        }
        Ok(())
    }
}
