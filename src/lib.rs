//! ctxstore: Context Hierarchy over an Embedded Object Store
//!
//! Records live in an embedded store and are worked on through contexts: a
//! main context bound to the engine and background contexts stacked on top of
//! it. Each context runs its work on its own queue, saves cascade from child to
//! parent to engine, and JSON payloads are imported by reconciling them with
//! existing records on an identity attribute.

pub mod cli;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod logging;
pub mod ops;
pub mod predicate;
pub mod schema;
pub mod store;

pub use context::{Context, ContextKind, SaveOutcome};
pub use entity::{AttrValue, EntityKind, JsonKind, ObjectId, Record};
pub use error::{StorageError, StoreError, StoreResult};
pub use ops::{FetchRequest, IdentityValue, ImportOptions, SortDescriptor};
pub use predicate::Predicate;
pub use schema::{KindDescriptor, Schema};
pub use store::{StorageMode, StoreHandle};
