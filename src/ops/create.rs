//! Creating records

use crate::context::Context;
use crate::entity::{EntityKind, Record};
use crate::error::StoreResult;
use tracing::debug;

impl Context {
    /// Insert a new, empty record of `kind` into this context.
    ///
    /// With `save_immediately` the context is saved right away, cascading up to
    /// the engine; a failed save is returned after the record was staged.
    pub fn create<K: EntityKind>(&self, kind: &K, save_immediately: bool) -> StoreResult<Record> {
        self.schema().require_kind(kind.name());
        let kind = kind.name().to_string();
        self.perform_and_wait(move |ctx| {
            let record = ctx.insert_new(&kind);
            if save_immediately {
                ctx.save_to_store()?;
            }
            Ok(record)
        })
    }

    /// Allocate an id and stage an empty record. Must run on this context's queue.
    pub(crate) fn insert_new(&self, kind: &str) -> Record {
        let record = Record::new(kind, self.engine().allocate_id());
        debug!(context = %self.label(), kind, object = %record.id(), "inserted record");
        self.working().insert(record.clone());
        record
    }
}
