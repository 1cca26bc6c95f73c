//! Integration tests for deleting records

use super::test_utils::{article_ids, open_in_memory, seed_articles, Article, Tag};
use ctxstore::{Predicate, SaveOutcome, StoreError};

#[test]
fn test_delete_is_staged_until_saved() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let seeded = seed_articles(&main);

    let child = handle.new_background_context();
    child.delete(&seeded[0]).unwrap();
    assert_eq!(child.count(&Article, None).unwrap(), 5);
    assert_eq!(main.count(&Article, None).unwrap(), 6);

    assert_eq!(child.save_to_store().unwrap(), SaveOutcome::Saved { levels: 2 });
    assert_eq!(main.count(&Article, None).unwrap(), 5);
    assert!(main.existing_object(&Article, seeded[0].id()).unwrap().is_none());
}

#[test]
fn test_delete_all_except() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let seeded = seed_articles(&main);

    let keep = vec![seeded[1].clone(), seeded[4].clone()];
    let deleted = main.delete_all(&Article, Some(&keep)).unwrap();
    assert_eq!(deleted, 4);
    let left = main.read_all(&Article, None, Vec::new()).unwrap();
    assert_eq!(article_ids(&left), vec![2, 5]);
}

#[test]
fn test_delete_all_except_low_ids_then_save() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    seed_articles(&main);
    assert_eq!(main.count(&Article, None).unwrap(), 6);

    let keep = main
        .read_all(&Article, Some(Predicate::lt("id", 3)), Vec::new())
        .unwrap();
    assert_eq!(main.delete_all(&Article, Some(&keep)).unwrap(), 4);
    assert_eq!(main.save_to_store().unwrap(), SaveOutcome::Saved { levels: 1 });

    assert!(!main.has_changes());
    assert_eq!(main.count(&Article, None).unwrap(), 2);
    let fresh = handle.new_background_context();
    let left = fresh.read_all(&Article, None, Vec::new()).unwrap();
    assert_eq!(article_ids(&left), vec![1, 2]);
}

#[test]
fn test_delete_all_leaves_other_kinds_alone() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    seed_articles(&main);

    assert_eq!(main.delete_all(&Article, None).unwrap(), 6);
    main.save_to_store().unwrap();
    assert_eq!(main.count(&Article, None).unwrap(), 0);
    assert_eq!(main.count(&Tag, None).unwrap(), 5);
}

#[test]
fn test_delete_all_by_attribute_keeps_listed_values() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    seed_articles(&main);
    let bare = main.create(&Article, false).unwrap();

    let keep = vec!["1".to_string(), "3".to_string()];
    let deleted = main.delete_all_by_attribute(&Article, "id", &keep).unwrap();
    // the bare record has no id attribute and goes too
    assert_eq!(deleted, 5);
    assert!(main.existing_object(&Article, bare.id()).unwrap().is_none());
    assert_eq!(
        article_ids(&main.read_all(&Article, None, Vec::new()).unwrap()),
        vec![1, 3]
    );
}

#[test]
fn test_delete_of_invisible_record_is_not_found() {
    let (_temp, handle) = open_in_memory();
    let other = handle.new_background_context();
    let record = other.create(&Tag, false).unwrap();

    let err = handle.main_context().delete(&record).unwrap_err();
    assert!(matches!(err, StoreError::ObjectNotFound(id) if id == record.id()));
}

#[test]
fn test_deleting_a_new_record_cancels_it() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let record = main.create(&Tag, false).unwrap();
    main.delete(&record).unwrap();
    assert!(!main.has_changes());
    assert_eq!(main.save_to_store().unwrap(), SaveOutcome::NothingToSave);
}
