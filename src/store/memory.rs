//! In-memory storage engine for ephemeral stores and tests

use crate::entity::{ObjectId, Record};
use crate::error::StorageError;
use crate::predicate::Predicate;
use crate::store::{Backend, ChangeSet};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct MemoryState {
    kinds: HashMap<String, BTreeMap<ObjectId, Record>>,
    watermark: u64,
    schema: Option<String>,
}

/// Backend keeping committed records in process memory
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn get(&self, kind: &str, id: ObjectId) -> Result<Option<Record>, StorageError> {
        let state = self.state.read();
        Ok(state.kinds.get(kind).and_then(|records| records.get(&id)).cloned())
    }

    fn scan(
        &self,
        kind: &str,
        predicate: Option<&Predicate>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, StorageError> {
        let state = self.state.read();
        let Some(records) = state.kinds.get(kind) else {
            return Ok(Vec::new());
        };
        let matching = records
            .values()
            .filter(|record| predicate.map_or(true, |p| p.matches(record)))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matching)
    }

    fn scan_ids(
        &self,
        kind: &str,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<ObjectId>, StorageError> {
        let state = self.state.read();
        let Some(records) = state.kinds.get(kind) else {
            return Ok(Vec::new());
        };
        Ok(records
            .iter()
            .filter(|(_, record)| predicate.map_or(true, |p| p.matches(record)))
            .map(|(id, _)| *id)
            .collect())
    }

    fn apply(&self, changes: &ChangeSet, id_watermark: u64) -> Result<(), StorageError> {
        let mut state = self.state.write();
        for record in changes
            .inserted
            .iter()
            .chain(changes.updated.iter().map(|(record, _)| record))
        {
            state
                .kinds
                .entry(record.kind().to_string())
                .or_default()
                .insert(record.id(), record.clone());
        }
        for (kind, id) in &changes.deleted {
            if let Some(records) = state.kinds.get_mut(kind) {
                records.remove(id);
            }
        }
        state.watermark = state.watermark.max(id_watermark);
        Ok(())
    }

    fn id_watermark(&self) -> Result<u64, StorageError> {
        Ok(self.state.read().watermark)
    }

    fn stored_schema(&self) -> Result<Option<String>, StorageError> {
        Ok(self.state.read().schema.clone())
    }

    fn record_schema(&self, schema: &str) -> Result<(), StorageError> {
        self.state.write().schema = Some(schema.to_string());
        Ok(())
    }

    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
