//! Record Store
//!
//! The storage engine seen by the context layer: a [`Backend`] trait with an
//! on-disk sled implementation and an in-memory one, the [`ChangeSet`] a root
//! context commits, and the [`StoreHandle`] that owns the engine lifecycle.

pub mod handle;
pub mod memory;
pub mod persistence;

pub use handle::{shared, StoreHandle};
pub use memory::MemoryBackend;
pub use persistence::SledBackend;

use crate::entity::{ObjectId, Record};
use crate::error::StorageError;
use crate::predicate::Predicate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Where the engine keeps committed records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// sled database under the configured data directory
    Persistent,
    /// Process memory; gone when the handle closes
    InMemory,
}

/// Pending mutations committed in one step
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub inserted: Vec<Record>,
    /// Full record plus the attributes that changed
    pub updated: Vec<(Record, Vec<String>)>,
    pub deleted: Vec<(String, ObjectId)>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }
}

/// Storage engine interface
pub trait Backend: Send + Sync {
    fn get(&self, kind: &str, id: ObjectId) -> Result<Option<Record>, StorageError>;

    /// Records of exactly `kind` matching `predicate`, in ascending id order.
    ///
    /// Scanning stops once `limit` matches have been collected.
    fn scan(
        &self,
        kind: &str,
        predicate: Option<&Predicate>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, StorageError>;

    /// Ids of records of exactly `kind` matching `predicate`.
    ///
    /// Without a predicate, implementations must not decode records.
    fn scan_ids(
        &self,
        kind: &str,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<ObjectId>, StorageError>;

    /// Apply a change set atomically, persisting the id watermark with it
    fn apply(&self, changes: &ChangeSet, id_watermark: u64) -> Result<(), StorageError>;

    /// Highest object id ever committed
    fn id_watermark(&self) -> Result<u64, StorageError>;

    fn stored_schema(&self) -> Result<Option<String>, StorageError>;

    fn record_schema(&self, schema: &str) -> Result<(), StorageError>;

    fn flush(&self) -> Result<(), StorageError>;

    /// Short human-readable location, used in logs and diagnostics
    fn describe(&self) -> String;
}

/// Engine binding shared by every context of one open store.
///
/// Holds the backend (taken away on close) and the object id allocator.
pub struct Engine {
    backend: RwLock<Option<Arc<dyn Backend>>>,
    next_id: AtomicU64,
}

impl Engine {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Result<Self, StorageError> {
        let watermark = backend.id_watermark()?;
        Ok(Self {
            backend: RwLock::new(Some(backend)),
            next_id: AtomicU64::new(watermark + 1),
        })
    }

    /// The live backend, or `StorageError::Closed` after close
    pub fn backend(&self) -> Result<Arc<dyn Backend>, StorageError> {
        self.backend.read().clone().ok_or(StorageError::Closed)
    }

    pub fn allocate_id(&self) -> ObjectId {
        ObjectId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Highest id handed out so far
    pub fn allocated_watermark(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed).saturating_sub(1)
    }

    pub fn is_closed(&self) -> bool {
        self.backend.read().is_none()
    }

    /// Flush and detach the backend
    pub(crate) fn shutdown(&self) -> Result<(), StorageError> {
        let backend = self.backend.write().take();
        match backend {
            Some(backend) => backend.flush(),
            None => Ok(()),
        }
    }
}
