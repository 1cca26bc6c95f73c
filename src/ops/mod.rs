//! Entity access operations
//!
//! Create, read, update, delete and import, all as methods on [`Context`].
//! Every operation validates its kind against the open schema on the calling
//! thread, then runs on the context's queue through `perform_and_wait`.
//!
//! [`Context`]: crate::context::Context

pub mod create;
pub mod delete;
pub mod import;
pub mod read;
pub mod update;

pub use import::{IdentityValue, ImportOptions};
pub use read::{FetchRequest, SortDescriptor};
