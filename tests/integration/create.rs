//! Integration tests for creating and updating records

use super::test_utils::{open_in_memory, Article, Tag};
use ctxstore::{SaveOutcome, StoreError};

#[test]
fn test_create_without_save_stays_in_context() {
    let (_temp, handle) = open_in_memory();
    let background = handle.new_background_context();

    let record = background.create(&Article, false).unwrap();
    assert_eq!(record.kind(), "Article");
    assert!(record.attributes().is_empty());
    assert!(background.has_changes());
    assert!(background.existing_object(&Article, record.id()).unwrap().is_some());
    assert!(handle
        .main_context()
        .existing_object(&Article, record.id())
        .unwrap()
        .is_none());
}

#[test]
fn test_create_with_save_reaches_the_store() {
    let (_temp, handle) = open_in_memory();
    let background = handle.new_background_context();

    let record = background.create(&Tag, true).unwrap();
    assert!(!background.has_changes());
    assert!(!handle.main_context().has_changes());

    let fresh = handle.new_background_context();
    let found = fresh.existing_object(&Tag, record.id()).unwrap();
    assert_eq!(found.map(|r| r.id()), Some(record.id()));
}

#[test]
fn test_object_ids_increase_across_contexts() {
    let (_temp, handle) = open_in_memory();
    let a = handle.main_context().create(&Tag, false).unwrap();
    let b = handle.new_background_context().create(&Tag, false).unwrap();
    let c = handle.main_context().create(&Tag, false).unwrap();
    assert!(a.id() < b.id());
    assert!(b.id() < c.id());
}

#[test]
fn test_update_stages_changed_attributes() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let mut record = main.create(&Article, true).unwrap();

    record.set("title", "Draft");
    main.update(&record).unwrap();
    assert!(main.has_changes());
    assert_eq!(main.save_to_store().unwrap(), SaveOutcome::Saved { levels: 1 });

    let stored = main.existing_object(&Article, record.id()).unwrap().unwrap();
    assert_eq!(stored.get_str("title"), Some("Draft"));
}

#[test]
fn test_update_without_changes_is_a_no_op() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let record = main.create(&Article, true).unwrap();
    main.update(&record).unwrap();
    assert!(!main.has_changes());
}

#[test]
fn test_update_of_deleted_record_is_not_found() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let mut record = main.create(&Article, true).unwrap();
    main.delete(&record).unwrap();

    record.set("title", "Ghost");
    let err = main.update(&record).unwrap_err();
    assert!(matches!(err, StoreError::ObjectNotFound(id) if id == record.id()));
}

#[test]
fn test_rollback_discards_pending_changes() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let record = main.create(&Article, false).unwrap();
    main.rollback();
    assert!(!main.has_changes());
    assert!(main.existing_object(&Article, record.id()).unwrap().is_none());
    assert_eq!(main.save_to_store().unwrap(), SaveOutcome::NothingToSave);
}
