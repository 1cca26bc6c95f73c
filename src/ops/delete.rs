//! Deleting records
//!
//! Deletes are staged in the context like any other change; none of these
//! operations save.

use crate::context::Context;
use crate::entity::{EntityKind, ObjectId, Record};
use crate::error::{StoreError, StoreResult};
use crate::ops::FetchRequest;
use crate::predicate::Predicate;
use std::future::Future;
use tracing::{debug, info};

impl Context {
    /// Stage the deletion of `record`
    pub fn delete(&self, record: &Record) -> StoreResult<()> {
        self.delete_objects(std::slice::from_ref(record))
    }

    /// Stage the deletion of every record in `records`.
    ///
    /// Stops at the first record this context cannot see.
    pub fn delete_objects(&self, records: &[Record]) -> StoreResult<()> {
        for record in records {
            self.schema().require_kind(record.kind());
        }
        let targets: Vec<(String, ObjectId)> = records
            .iter()
            .map(|record| (record.kind().to_string(), record.id()))
            .collect();
        self.perform_and_wait(move |ctx| {
            for (kind, id) in targets {
                if ctx.view_get(&kind, id)?.is_none() {
                    return Err(StoreError::ObjectNotFound(id));
                }
                ctx.working().stage_delete(&kind, id);
                debug!(context = %ctx.label(), kind = %kind, object = %id, "deleted record");
            }
            Ok(())
        })
    }

    /// Stage the deletion of every record of `kind` (sub-kinds included),
    /// except those listed in `except`. Returns how many were deleted.
    pub fn delete_all<K: EntityKind>(
        &self,
        kind: &K,
        except: Option<&[Record]>,
    ) -> StoreResult<usize> {
        self.schema().require_kind(kind.name());
        let kind = kind.name().to_string();
        let keep: Vec<_> = except
            .unwrap_or_default()
            .iter()
            .map(Record::id)
            .collect();
        self.perform_and_wait(move |ctx| ctx.delete_all_on_queue(&kind, keep))
    }

    /// Async form of [`Context::delete_all`]
    pub fn delete_all_async<K: EntityKind>(
        &self,
        kind: &K,
        except: Option<Vec<Record>>,
    ) -> impl Future<Output = StoreResult<usize>> + Send + 'static {
        self.schema().require_kind(kind.name());
        let kind = kind.name().to_string();
        let keep: Vec<ObjectId> = except
            .unwrap_or_default()
            .iter()
            .map(Record::id)
            .collect();
        self.perform(move |ctx| ctx.delete_all_on_queue(&kind, keep))
    }

    fn delete_all_on_queue(
        &self,
        kind: &str,
        keep: Vec<ObjectId>,
    ) -> StoreResult<usize> {
        let predicate = if keep.is_empty() {
            None
        } else {
            Some(Predicate::not(Predicate::self_in(keep)))
        };
        let request = FetchRequest::new().with_predicate(predicate);
        let doomed = self.fetch_on_queue(kind, request)?;
        self.stage_deletes(kind, &doomed);
        Ok(doomed.len())
    }

    /// Stage the deletion of every record of `kind` whose `attribute`, rendered
    /// as text, is not one of `keep_values`. Records lacking the attribute are
    /// deleted.
    pub fn delete_all_by_attribute<K: EntityKind>(
        &self,
        kind: &K,
        attribute: &str,
        keep_values: &[String],
    ) -> StoreResult<usize> {
        self.schema().require_kind(kind.name());
        let kind = kind.name().to_string();
        let attribute = attribute.to_string();
        let keep_values = keep_values.to_vec();
        self.perform_and_wait(move |ctx| {
            let doomed: Vec<Record> = ctx
                .fetch_on_queue(&kind, FetchRequest::new())?
                .into_iter()
                .filter(|record| {
                    record
                        .get(&attribute)
                        .map_or(true, |value| !keep_values.contains(&value.render()))
                })
                .collect();
            ctx.stage_deletes(&kind, &doomed);
            Ok(doomed.len())
        })
    }

    fn stage_deletes(&self, kind: &str, records: &[Record]) {
        info!(
            context = %self.label(),
            "Attempting to delete a list of {} objects of type {}",
            records.len(),
            kind
        );
        let mut working = self.working();
        for record in records {
            working.stage_delete(record.kind(), record.id());
        }
    }
}
