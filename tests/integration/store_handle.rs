//! Integration tests for opening stores and creating contexts

use super::test_utils::{handle_at, open_in_memory, Article, SCHEMA};
use ctxstore::{ContextKind, SaveOutcome, StorageMode};
use tempfile::TempDir;

#[test]
fn test_main_context_is_root() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    assert!(main.is_root());
    assert_eq!(main.kind(), ContextKind::Main);
    assert_eq!(main.depth(), 0);
    assert_eq!(main.schema().name(), SCHEMA);
}

#[test]
fn test_background_contexts_are_distinct_children_of_main() {
    let (_temp, handle) = open_in_memory();
    let first = handle.new_background_context();
    let second = handle.new_background_context();

    assert_eq!(first.kind(), ContextKind::Background);
    assert_ne!(first.label(), second.label());
    assert_eq!(first.parent().unwrap().label(), handle.main_context().label());
    assert_eq!(second.parent().unwrap().label(), "main");
}

#[test]
fn test_contexts_do_not_see_each_others_pending_changes() {
    let (_temp, handle) = open_in_memory();
    let first = handle.new_background_context();
    let second = handle.new_background_context();

    first.create(&Article, false).unwrap();
    assert_eq!(first.count(&Article, None).unwrap(), 1);
    assert_eq!(second.count(&Article, None).unwrap(), 0);
    assert_eq!(handle.main_context().count(&Article, None).unwrap(), 0);
}

#[test]
fn test_background_create_reaches_main_only_on_save() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    main.create(&Article, true).unwrap();
    let before = main.count(&Article, None).unwrap();

    let background = handle.new_background_context();
    background.create(&Article, false).unwrap();
    assert_eq!(main.count(&Article, None).unwrap(), before);

    assert_eq!(
        background.save_to_store().unwrap(),
        SaveOutcome::Saved { levels: 2 }
    );
    assert_eq!(main.count(&Article, None).unwrap(), before + 1);
    assert!(!main.has_changes());
}

#[test]
fn test_open_uses_configured_default_mode() {
    let temp = TempDir::new().unwrap();
    let handle = handle_at(temp.path());
    handle.open_default(SCHEMA);
    assert_eq!(handle.mode(), StorageMode::Persistent);
    assert!(handle.store_path(SCHEMA).exists());
    handle.close().unwrap();
}

#[test]
fn test_schema_names_are_sorted() {
    let temp = TempDir::new().unwrap();
    let handle = handle_at(temp.path());
    handle.register_schema(ctxstore::Schema::new("Archive"));
    assert_eq!(handle.schema_names(), vec!["Archive".to_string(), SCHEMA.to_string()]);
}

#[test]
#[should_panic(expected = "is not part of schema")]
fn test_unknown_kind_is_fatal() {
    let (_temp, handle) = open_in_memory();
    handle
        .main_context()
        .count(&ctxstore::JsonKind::new("Comment"), None)
        .unwrap();
}

#[test]
fn test_operations_after_close_report_closed_store() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    handle.close().unwrap();
    let err = main.count(&Article, None).unwrap_err();
    assert!(matches!(
        err,
        ctxstore::StoreError::StorageError(ctxstore::StorageError::Closed)
    ));
}
