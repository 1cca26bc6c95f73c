//! Integration tests for cascading saves and merging into parents

use super::test_utils::{open_in_memory, seed_articles, Article, Tag};
use ctxstore::{SaveOutcome, StorageError, StoreError};
use std::sync::mpsc;
use std::time::Duration;

#[test]
fn test_nothing_to_save() {
    let (_temp, handle) = open_in_memory();
    assert_eq!(
        handle.new_background_context().save_to_store().unwrap(),
        SaveOutcome::NothingToSave
    );
    assert_eq!(
        handle.main_context().save_to_store().unwrap(),
        SaveOutcome::NothingToSave
    );
}

#[test]
fn test_save_cascades_through_every_level() {
    let (_temp, handle) = open_in_memory();
    let background = handle.new_background_context();
    let nested = background.new_child();

    let record = nested.create(&Tag, false).unwrap();
    assert_eq!(nested.save_to_store().unwrap(), SaveOutcome::Saved { levels: 3 });
    assert!(!nested.has_changes());
    assert!(!background.has_changes());
    assert!(!handle.main_context().has_changes());

    // a context created afterwards reads it back from the engine
    let fresh = handle.new_background_context();
    assert!(fresh.existing_object(&Tag, record.id()).unwrap().is_some());
}

#[test]
fn test_parent_changes_ride_along() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    main.create(&Tag, false).unwrap();

    let background = handle.new_background_context();
    background.create(&Tag, false).unwrap();
    assert_eq!(background.save_to_store().unwrap(), SaveOutcome::Saved { levels: 2 });

    // main's own pending insert was written by the same commit
    assert!(!main.has_changes());
    assert_eq!(main.count(&Tag, None).unwrap(), 2);
}

#[test]
fn test_merge_keeps_parent_edits_to_other_attributes() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    seed_articles(&main);

    let mut in_main = main.read_first_by_attribute(&Article, "id", 1).unwrap().unwrap();
    in_main.set("views", 121);
    main.update(&in_main).unwrap();

    let child = handle.new_background_context();
    let mut in_child = child.read_first_by_attribute(&Article, "id", 1).unwrap().unwrap();
    assert_eq!(in_child.get_int("views"), Some(121));
    in_child.set("title", "The Art of Code, 2nd ed");
    child.update(&in_child).unwrap();
    child.save_to_store().unwrap();

    let merged = main.existing_object(&Article, in_main.id()).unwrap().unwrap();
    assert_eq!(merged.get_str("title"), Some("The Art of Code, 2nd ed"));
    assert_eq!(merged.get_int("views"), Some(121));
    assert!(!main.has_changes());
}

#[test]
fn test_child_wins_on_conflicting_attribute() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    seed_articles(&main);

    let child = handle.new_background_context();
    let mut in_child = child.read_first_by_attribute(&Article, "id", 2).unwrap().unwrap();
    in_child.set("title", "From child");
    child.update(&in_child).unwrap();

    let mut in_main = main.read_first_by_attribute(&Article, "id", 2).unwrap().unwrap();
    in_main.set("title", "From main");
    main.update(&in_main).unwrap();

    // main has unsaved edits; the child's cascade commits them together
    assert_eq!(child.save_to_store().unwrap(), SaveOutcome::Saved { levels: 2 });
    let stored = main.existing_object(&Article, in_main.id()).unwrap().unwrap();
    assert_eq!(stored.get_str("title"), Some("From child"));
}

#[test]
fn test_child_delete_wins_over_parent_edit() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let seeded = seed_articles(&main);

    let mut edited = seeded[0].clone();
    edited.set("views", 1);
    main.update(&edited).unwrap();

    let child = handle.new_background_context();
    child.delete(&seeded[0]).unwrap();
    child.save_to_store().unwrap();
    assert!(main.existing_object(&Article, seeded[0].id()).unwrap().is_none());
    assert_eq!(main.count(&Article, None).unwrap(), 5);
}

#[test]
fn test_save_failure_reports_level_and_keeps_changes() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let child = handle.new_background_context();
    child.create(&Tag, false).unwrap();

    handle.close().unwrap();
    let err = child.save_to_store().unwrap_err();
    match err {
        StoreError::SaveFailed {
            level,
            context,
            source,
        } => {
            assert_eq!(level, 1);
            assert_eq!(context, "main");
            assert!(matches!(source, StorageError::Closed));
        }
        other => panic!("expected SaveFailed, got {other:?}"),
    }
    // the child committed into main; main kept what it could not write
    assert!(!child.has_changes());
    assert!(main.has_changes());
}

#[test]
fn test_completion_runs_once() {
    let (_temp, handle) = open_in_memory();
    let child = handle.new_background_context();
    child.create(&Tag, false).unwrap();

    let (tx, rx) = mpsc::channel();
    child.save_to_store_then(move |result| {
        tx.send(result.map_err(|e| e.to_string())).unwrap();
    });
    let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(outcome, Ok(SaveOutcome::Saved { levels: 2 }));
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn test_perform_and_wait_runs_on_the_context_queue() {
    let (_temp, handle) = open_in_memory();
    let child = handle.new_background_context();
    assert!(!child.is_current());
    let inside = child.perform_and_wait(|ctx| ctx.is_current());
    assert!(inside);
}
