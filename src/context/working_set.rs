//! Per-context pending changes
//!
//! A working set holds the records a context has inserted or updated (full
//! copies) together with the ids it has deleted. Everything else a context sees
//! comes from its parent's view, so [`WorkingSet::touched`] is the set of ids
//! whose parent value must be ignored.

use crate::entity::{ObjectId, Record};
use crate::store::ChangeSet;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Default)]
pub(crate) struct WorkingSet {
    /// Pending inserted and updated records
    objects: BTreeMap<ObjectId, Record>,
    inserted: BTreeSet<ObjectId>,
    /// Changed attribute names of updated (not inserted) records
    changed: BTreeMap<ObjectId, BTreeSet<String>>,
    /// Deleted ids and their kinds
    deleted: BTreeMap<ObjectId, String>,
}

impl WorkingSet {
    pub(crate) fn has_changes(&self) -> bool {
        !self.objects.is_empty() || !self.deleted.is_empty()
    }

    pub(crate) fn object(&self, id: ObjectId) -> Option<&Record> {
        self.objects.get(&id)
    }

    pub(crate) fn is_deleted(&self, id: ObjectId) -> bool {
        self.deleted.contains_key(&id)
    }

    pub(crate) fn touched(&self) -> BTreeSet<ObjectId> {
        self.objects
            .keys()
            .chain(self.deleted.keys())
            .copied()
            .collect()
    }

    /// Pending records of any of `kinds`, in id order
    pub(crate) fn pending_of<'a>(
        &'a self,
        kinds: &'a [String],
    ) -> impl Iterator<Item = &'a Record> + 'a {
        self.objects
            .values()
            .filter(move |record| kinds.iter().any(|kind| kind == record.kind()))
    }

    pub(crate) fn insert(&mut self, record: Record) {
        self.inserted.insert(record.id());
        self.objects.insert(record.id(), record);
    }

    /// Stage a new value for a record visible in this context.
    ///
    /// `changed` lists the attributes that differ from the value seen before.
    pub(crate) fn stage_update(&mut self, record: Record, changed: Vec<String>) {
        let id = record.id();
        if !self.inserted.contains(&id) {
            self.changed.entry(id).or_default().extend(changed);
        }
        self.objects.insert(id, record);
    }

    pub(crate) fn stage_delete(&mut self, kind: &str, id: ObjectId) {
        self.objects.remove(&id);
        self.changed.remove(&id);
        // Deleting something inserted here cancels the insert outright
        if !self.inserted.remove(&id) {
            self.deleted.insert(id, kind.to_string());
        }
    }

    /// Copy of the pending changes, leaving the working set intact
    pub(crate) fn snapshot(&self) -> ChangeSet {
        let mut changes = ChangeSet::default();
        for (id, record) in &self.objects {
            if self.inserted.contains(id) {
                changes.inserted.push(record.clone());
            } else {
                let keys = self
                    .changed
                    .get(id)
                    .map(|keys| keys.iter().cloned().collect())
                    .unwrap_or_default();
                changes.updated.push((record.clone(), keys));
            }
        }
        changes.deleted = self
            .deleted
            .iter()
            .map(|(id, kind)| (kind.clone(), *id))
            .collect();
        changes
    }

    /// Drain the pending changes
    pub(crate) fn take(&mut self) -> ChangeSet {
        let changes = self.snapshot();
        self.clear();
        changes
    }

    pub(crate) fn clear(&mut self) {
        self.objects.clear();
        self.inserted.clear();
        self.changed.clear();
        self.deleted.clear();
    }

    /// Ids of updated records this set holds no copy of and has not deleted.
    ///
    /// Merging such an update needs the record as this context currently sees
    /// it, which the caller resolves through the parent view.
    pub(crate) fn missing_bases(&self, changes: &ChangeSet) -> Vec<(String, ObjectId)> {
        changes
            .updated
            .iter()
            .map(|(record, _)| (record.kind().to_string(), record.id()))
            .filter(|(_, id)| !self.objects.contains_key(id) && !self.deleted.contains_key(id))
            .collect()
    }

    /// Merge a child's committed changes into this set.
    ///
    /// Updates are applied attribute by attribute: only the keys the child
    /// changed are copied, so edits this context made to other attributes
    /// survive. Where the child and this context both touched an attribute the
    /// child's value wins.
    pub(crate) fn merge_child(&mut self, changes: ChangeSet, mut bases: HashMap<ObjectId, Record>) {
        for record in changes.inserted {
            self.insert(record);
        }

        for (record, keys) in changes.updated {
            let id = record.id();
            if let Some(existing) = self.objects.get_mut(&id) {
                for key in &keys {
                    existing.take_attribute_from(&record, key);
                }
                if !self.inserted.contains(&id) {
                    self.changed.entry(id).or_default().extend(keys);
                }
            } else if self.deleted.remove(&id).is_some() {
                self.changed.entry(id).or_default().extend(keys);
                self.objects.insert(id, record);
            } else {
                let merged = match bases.remove(&id) {
                    Some(mut base) => {
                        for key in &keys {
                            base.take_attribute_from(&record, key);
                        }
                        base
                    }
                    None => record,
                };
                self.changed.entry(id).or_default().extend(keys);
                self.objects.insert(id, merged);
            }
        }

        for (kind, id) in changes.deleted {
            self.stage_delete(&kind, id);
        }
    }
}
