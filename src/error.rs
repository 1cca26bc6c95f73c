//! Error types for the ctxstore context/store layer.

use crate::entity::ObjectId;
use thiserror::Error;

/// Engine-level errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Store is closed")]
    Closed,

    #[error("Storage engine error: {0}")]
    Engine(String),

    #[error("Record codec error: {0}")]
    Codec(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Recoverable errors returned by context operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Import payload is empty")]
    EmptyPayload,

    #[error("Import payload is malformed: {0}")]
    MalformedPayload(String),

    #[error("Identity key '{key}' is missing from the payload or is not an integer or string")]
    InvalidIdentityKey { key: String },

    #[error("Get-or-create of {kind} by '{attribute}' failed: {source}")]
    ReconciliationFailed {
        kind: String,
        attribute: String,
        #[source]
        source: StorageError,
    },

    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Populating {kind} failed: {message}")]
    Populate { kind: String, message: String },

    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    #[error("Save failed at level {level} ({context}): {source}")]
    SaveFailed {
        level: usize,
        context: String,
        #[source]
        source: StorageError,
    },

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Operation aborted before completion: {0}")]
    Aborted(String),
}

impl StoreError {
    /// Convenience constructor for population hook failures
    pub fn populate(kind: &str, message: impl Into<String>) -> Self {
        StoreError::Populate {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for StoreError {
    fn from(err: config::ConfigError) -> Self {
        StoreError::ConfigError(err.to_string())
    }
}

/// Integration mistakes that cannot be recovered from at runtime.
///
/// These are never returned; they are raised through [`fatal`], which logs the
/// diagnostic and panics.
#[derive(Debug, Error)]
pub enum FatalConfiguration {
    #[error(
        "The store handle is not open. Call `open(schema, mode)` before using contexts, \
         e.g. `handle.open(\"Model\", StorageMode::InMemory)`"
    )]
    StoreNotOpened,

    #[error("Unknown schema '{0}'. Register it with `register_schema` or declare it under [schemas] in config")]
    UnknownSchema(String),

    #[error("Store at {path} was created with schema '{stored}' but was opened with '{requested}'")]
    SchemaMismatch {
        path: String,
        stored: String,
        requested: String,
    },

    #[error("Kind '{kind}' is not part of schema '{schema}'")]
    UnknownKind { schema: String, kind: String },

    #[error("Failed to set up storage engine: {0}")]
    EngineSetup(String),

    #[error("Failed to start context queue '{label}': {message}")]
    QueueSpawn { label: String, message: String },

    #[error("Context queue '{0}' stopped while a caller was waiting on it")]
    QueueStopped(String),
}

/// Halt the current task with a fatal configuration diagnostic.
#[track_caller]
pub fn fatal(err: FatalConfiguration) -> ! {
    tracing::error!(error = %err, "fatal configuration error");
    panic!("[ctxstore] FATAL: {}", err)
}

/// Result alias used across the operation surface
pub type StoreResult<T> = Result<T, StoreError>;
