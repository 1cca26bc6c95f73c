//! Property-based tests for reconciliation and layered views

mod import_idempotence;
mod view_limits;
