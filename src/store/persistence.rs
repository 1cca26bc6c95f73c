//! Persistence layer: sled-backed storage engine
//!
//! Key layout in a single sled tree:
//! - `r/{kind}\0{id:be64}` -> bincode-encoded [`Record`]
//! - `m/schema` -> schema name the store was created with
//! - `m/next_id` -> highest committed object id (be64)
//!
//! Keeping everything in one tree lets a commit go through one atomic
//! `sled::Batch`.

use crate::entity::{ObjectId, Record};
use crate::error::StorageError;
use crate::predicate::Predicate;
use crate::store::{Backend, ChangeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

const SCHEMA_KEY: &[u8] = b"m/schema";
const WATERMARK_KEY: &[u8] = b"m/next_id";

fn engine_err(context: &str, e: impl std::fmt::Display) -> StorageError {
    StorageError::Engine(format!("{}: {}", context, e))
}

fn kind_prefix(kind: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(kind.len() + 3);
    prefix.extend_from_slice(b"r/");
    prefix.extend_from_slice(kind.as_bytes());
    prefix.push(0);
    prefix
}

fn record_key(kind: &str, id: ObjectId) -> Vec<u8> {
    let mut key = kind_prefix(kind);
    key.extend_from_slice(&id.to_key());
    key
}

/// Sled-based storage engine
pub struct SledBackend {
    db: sled::Db,
    path: PathBuf,
    flush_on_commit: bool,
}

impl SledBackend {
    /// Open (or create) a sled database at the given directory
    pub fn open<P: AsRef<Path>>(path: P, flush_on_commit: bool) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path).map_err(|e| engine_err("Failed to open sled database", e))?;
        debug!(path = %path.display(), "opened sled store");
        Ok(Self {
            db,
            path,
            flush_on_commit,
        })
    }

    fn decode(bytes: &[u8]) -> Result<Record, StorageError> {
        bincode::deserialize(bytes)
            .map_err(|e| StorageError::Codec(format!("Failed to deserialize record: {}", e)))
    }

    fn encode(record: &Record) -> Result<Vec<u8>, StorageError> {
        bincode::serialize(record)
            .map_err(|e| StorageError::Codec(format!("Failed to serialize record: {}", e)))
    }
}

impl Backend for SledBackend {
    fn get(&self, kind: &str, id: ObjectId) -> Result<Option<Record>, StorageError> {
        match self
            .db
            .get(record_key(kind, id))
            .map_err(|e| engine_err("Failed to get record", e))?
        {
            Some(value) => Ok(Some(Self::decode(&value)?)),
            None => Ok(None),
        }
    }

    fn scan(
        &self,
        kind: &str,
        predicate: Option<&Predicate>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, StorageError> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut records = Vec::new();
        if limit == 0 {
            return Ok(records);
        }
        for item in self.db.scan_prefix(kind_prefix(kind)) {
            let (_, value) = item.map_err(|e| engine_err("Failed to iterate store", e))?;
            let record = Self::decode(&value)?;
            if predicate.map_or(true, |p| p.matches(&record)) {
                records.push(record);
                if records.len() >= limit {
                    break;
                }
            }
        }
        Ok(records)
    }

    fn scan_ids(
        &self,
        kind: &str,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<ObjectId>, StorageError> {
        let prefix = kind_prefix(kind);
        let mut ids = Vec::new();
        for item in self.db.scan_prefix(&prefix) {
            let (key, value) = item.map_err(|e| engine_err("Failed to iterate store", e))?;
            let Some(id) = ObjectId::from_key(&key[prefix.len()..]) else {
                return Err(StorageError::Codec(format!(
                    "Malformed record key under kind '{}'",
                    kind
                )));
            };
            match predicate {
                None => ids.push(id),
                Some(p) => {
                    if p.matches(&Self::decode(&value)?) {
                        ids.push(id);
                    }
                }
            }
        }
        Ok(ids)
    }

    fn apply(&self, changes: &ChangeSet, id_watermark: u64) -> Result<(), StorageError> {
        let mut batch = sled::Batch::default();

        for record in changes
            .inserted
            .iter()
            .chain(changes.updated.iter().map(|(record, _)| record))
        {
            batch.insert(record_key(record.kind(), record.id()), Self::encode(record)?);
        }
        for (kind, id) in &changes.deleted {
            batch.remove(record_key(kind, *id));
        }

        let watermark = id_watermark.max(self.id_watermark()?);
        batch.insert(WATERMARK_KEY, watermark.to_be_bytes().to_vec());

        self.db
            .apply_batch(batch)
            .map_err(|e| engine_err("Failed to apply batch", e))?;

        if self.flush_on_commit {
            self.flush()?;
        }
        Ok(())
    }

    fn id_watermark(&self) -> Result<u64, StorageError> {
        match self
            .db
            .get(WATERMARK_KEY)
            .map_err(|e| engine_err("Failed to read id watermark", e))?
        {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    StorageError::Codec("Malformed id watermark".to_string())
                })?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    fn stored_schema(&self) -> Result<Option<String>, StorageError> {
        match self
            .db
            .get(SCHEMA_KEY)
            .map_err(|e| engine_err("Failed to read schema marker", e))?
        {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    fn record_schema(&self, schema: &str) -> Result<(), StorageError> {
        self.db
            .insert(SCHEMA_KEY, schema.as_bytes())
            .map_err(|e| engine_err("Failed to write schema marker", e))?;
        Ok(())
    }

    /// Flush all pending writes to disk
    fn flush(&self) -> Result<(), StorageError> {
        self.db
            .flush()
            .map_err(|e| engine_err("Failed to flush database", e))?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
