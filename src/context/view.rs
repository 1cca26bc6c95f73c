//! Layered reads
//!
//! A context's view is its parent's view (or the engine, for the root) minus
//! every id it has touched, plus its own pending records. Parent views are
//! resolved on the parent's queue, so a read never observes a parent halfway
//! through a merge.

use super::Context;
use crate::entity::{ObjectId, Record};
use crate::error::StoreResult;
use crate::predicate::Predicate;
use std::collections::{BTreeMap, BTreeSet};

impl Context {
    /// The record with `id` as this context sees it
    pub(crate) fn view_get(&self, kind: &str, id: ObjectId) -> StoreResult<Option<Record>> {
        {
            let working = self.working();
            if working.is_deleted(id) {
                return Ok(None);
            }
            if let Some(record) = working.object(id) {
                return Ok((record.kind() == kind).then(|| record.clone()));
            }
        }
        self.parent_view_get(kind, id)
    }

    /// The record with `id` as the parent (or the engine) sees it
    pub(crate) fn parent_view_get(
        &self,
        kind: &str,
        id: ObjectId,
    ) -> StoreResult<Option<Record>> {
        match self.parent() {
            Some(parent) => {
                let kind = kind.to_string();
                parent.perform_and_wait(move |ctx| ctx.view_get(&kind, id))
            }
            None => Ok(self.engine().backend()?.get(kind, id)?),
        }
    }

    /// Records of any of `kinds` matching `predicate`, ascending by id.
    ///
    /// With a limit, only the first `limit` records of the view are returned.
    pub(crate) fn view_fetch(
        &self,
        kinds: Vec<String>,
        predicate: Option<Predicate>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Record>> {
        let (touched, local): (BTreeSet<ObjectId>, Vec<Record>) = {
            let working = self.working();
            let local = working
                .pending_of(&kinds)
                .filter(|record| predicate.as_ref().map_or(true, |p| p.matches(record)))
                .cloned()
                .collect();
            (working.touched(), local)
        };

        // Touched ids are dropped from the parent's answer, so ask for enough
        // extra rows that the limit still holds after filtering.
        let parent_limit = limit.map(|limit| limit.saturating_add(touched.len()));
        let inherited = match self.parent() {
            Some(parent) => {
                let kinds = kinds.clone();
                let predicate = predicate.clone();
                parent.perform_and_wait(move |ctx| ctx.view_fetch(kinds, predicate, parent_limit))?
            }
            None => {
                let backend = self.engine().backend()?;
                let mut records = Vec::new();
                for kind in &kinds {
                    records.extend(backend.scan(kind, predicate.as_ref(), parent_limit)?);
                }
                records
            }
        };

        let mut merged: BTreeMap<ObjectId, Record> = inherited
            .into_iter()
            .filter(|record| !touched.contains(&record.id()))
            .map(|record| (record.id(), record))
            .collect();
        merged.extend(local.into_iter().map(|record| (record.id(), record)));

        let mut records: Vec<Record> = merged.into_values().collect();
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    /// Ids of records of any of `kinds` matching `predicate`
    pub(crate) fn view_ids(
        &self,
        kinds: Vec<String>,
        predicate: Option<Predicate>,
    ) -> StoreResult<BTreeSet<ObjectId>> {
        let (touched, local): (BTreeSet<ObjectId>, Vec<ObjectId>) = {
            let working = self.working();
            let local = working
                .pending_of(&kinds)
                .filter(|record| predicate.as_ref().map_or(true, |p| p.matches(record)))
                .map(Record::id)
                .collect();
            (working.touched(), local)
        };

        let inherited: BTreeSet<ObjectId> = match self.parent() {
            Some(parent) => {
                let kinds = kinds.clone();
                let predicate = predicate.clone();
                parent.perform_and_wait(move |ctx| ctx.view_ids(kinds, predicate))?
            }
            None => {
                let backend = self.engine().backend()?;
                let mut ids = BTreeSet::new();
                for kind in &kinds {
                    ids.extend(backend.scan_ids(kind, predicate.as_ref())?);
                }
                ids
            }
        };

        let mut ids: BTreeSet<ObjectId> = inherited.difference(&touched).copied().collect();
        ids.extend(local);
        Ok(ids)
    }
}
