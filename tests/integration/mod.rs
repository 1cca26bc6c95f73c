//! Integration tests for the ctxstore context hierarchy and store

mod async_ops;
mod create;
mod delete;
mod import;
mod read;
mod save_cascade;
mod store_handle;
