//! Integration tests for JSON import and identity reconciliation

use super::test_utils::{article_ids, mock_articles, open_in_memory, seed_articles, Article, Tag};
use ctxstore::{ImportOptions, JsonKind, StoreError};
use serde_json::json;

#[test]
fn test_import_list_saves_the_batch() {
    let (_temp, handle) = open_in_memory();
    let background = handle.new_background_context();

    let imported = background
        .import_list(&Article, &mock_articles(), "id")
        .unwrap();
    assert_eq!(imported.len(), 6);
    assert!(!background.has_changes());
    assert!(!handle.main_context().has_changes());
    assert_eq!(handle.main_context().count(&Article, None).unwrap(), 6);
}

#[test]
fn test_reimport_updates_instead_of_duplicating() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let first = seed_articles(&main);

    let again = main
        .import_list(
            &Article,
            &json!([{"id": 2, "title": "Rust Basics, revised"}, {"id": 9, "title": "New"}]),
            "id",
        )
        .unwrap();
    assert_eq!(again[0].id(), first[1].id());
    assert_eq!(main.count(&Article, None).unwrap(), 7);

    let revised = main.read_first_by_attribute(&Article, "id", 2).unwrap().unwrap();
    assert_eq!(revised.get_str("title"), Some("Rust Basics, revised"));
    // attributes missing from the payload are left as they were
    assert_eq!(revised.get_int("views"), Some(80));
}

#[test]
fn test_duplicates_within_one_batch_reconcile() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();

    let imported = main
        .import_list(
            &Article,
            &json!([{"id": 1, "title": "a"}, {"id": 1, "title": "b"}]),
            "id",
        )
        .unwrap();
    assert_eq!(imported[0].id(), imported[1].id());
    let stored = main.read_all(&Article, None, Vec::new()).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get_str("title"), Some("b"));
}

#[test]
fn test_string_and_integer_identities_are_distinct() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();

    main.import_list(
        &Article,
        &json!([{"id": 7, "title": "int"}, {"id": "7", "title": "str"}]),
        "id",
    )
    .unwrap();
    assert_eq!(main.count(&Article, None).unwrap(), 2);
}

#[test]
fn test_related_records_are_got_or_created() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let articles = seed_articles(&main);

    let rust = main.read_first_by_attribute(&Tag, "name", "rust").unwrap().unwrap();
    let basics = main.existing_object(&Article, articles[1].id()).unwrap().unwrap();
    let concurrency = main.existing_object(&Article, articles[3].id()).unwrap().unwrap();
    assert_eq!(basics.get("tags").and_then(|v| v.as_refs()), Some(&[rust.id()][..]));
    assert!(concurrency
        .get("tags")
        .and_then(|v| v.as_refs())
        .unwrap()
        .contains(&rust.id()));
}

#[test]
fn test_import_object_does_not_save() {
    let (_temp, handle) = open_in_memory();
    let background = handle.new_background_context();

    let record = background
        .import_object(&Article, &json!({"id": 11, "title": "Draft"}), "id")
        .unwrap();
    assert!(background.has_changes());
    assert!(handle
        .main_context()
        .existing_object(&Article, record.id())
        .unwrap()
        .is_none());

    background.save_to_store().unwrap();
    assert_eq!(handle.main_context().count(&Article, None).unwrap(), 1);
}

#[test]
fn test_default_identity_key_comes_from_config() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    assert_eq!(main.default_identity_key(), "id");

    let options = ImportOptions::new();
    main.import_list_with(&Article, &json!([{"id": 1}, {"id": 1}]), options)
        .unwrap();
    assert_eq!(main.count(&Article, None).unwrap(), 1);
}

#[test]
fn test_always_create_skips_reconciliation() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();

    let options = ImportOptions::new().always_create();
    main.import_list_with(&Article, &json!([{"title": "x"}, {"title": "x"}]), options)
        .unwrap();
    assert_eq!(main.count(&Article, None).unwrap(), 2);
}

#[test]
fn test_missing_identity_value_is_rejected() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();

    let err = main
        .import_object(&Article, &json!({"title": "no id"}), "id")
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidIdentityKey { ref key } if key == "id"));

    let err = main
        .import_object(&Article, &json!({"id": 1.5}), "id")
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidIdentityKey { .. }));
    assert!(!main.has_changes());
}

#[test]
fn test_empty_and_malformed_payloads() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();

    assert!(matches!(
        main.import_object(&Article, &json!({}), "id"),
        Err(StoreError::EmptyPayload)
    ));
    assert!(matches!(
        main.import_list(&Article, &json!([]), "id"),
        Err(StoreError::EmptyPayload)
    ));
    assert!(matches!(
        main.import_list(&Article, &json!("nope"), "id"),
        Err(StoreError::MalformedPayload(_))
    ));
    assert!(matches!(
        main.import_list(&Article, &json!([{"id": 1}, 5]), "id"),
        Err(StoreError::MalformedPayload(_))
    ));
}

#[test]
fn test_list_import_stops_at_first_failure_without_saving() {
    let (_temp, handle) = open_in_memory();
    let background = handle.new_background_context();

    let err = background
        .import_list(
            &Article,
            &json!([{"id": 1, "title": "ok"}, {"id": 2, "title": 42}, {"id": 3, "title": "never"}]),
            "id",
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Populate { ref kind, .. } if kind == "Article"));

    let staged = background.read_all(&Article, None, Vec::new()).unwrap();
    assert_eq!(article_ids(&staged), vec![1]);
    assert_eq!(handle.main_context().count(&Article, None).unwrap(), 0);

    // Saving afterwards stores only the fully populated element
    background.save_to_store().unwrap();
    let stored = handle.main_context().read_all(&Article, None, Vec::new()).unwrap();
    assert_eq!(article_ids(&stored), vec![1]);
    assert!(stored.iter().all(|record| record.get_str("title").is_some()));
}

#[test]
fn test_failed_populate_of_existing_record_keeps_it() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    main.import_object(&Article, &json!({"id": 7, "title": "kept"}), "id").unwrap();
    main.save_to_store().unwrap();

    let err = main
        .import_object(&Article, &json!({"id": 7, "title": false}), "id")
        .unwrap_err();
    assert!(matches!(err, StoreError::Populate { .. }));
    assert!(!main.has_changes());

    let stored = main.read_all(&Article, None, Vec::new()).unwrap();
    assert_eq!(article_ids(&stored), vec![7]);
    assert_eq!(stored[0].get_str("title"), Some("kept"));
}

#[test]
fn test_json_kind_copies_scalar_fields() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let tags = JsonKind::new("Tag");

    let record = main
        .import_object(&tags, &json!({"name": "rust", "weight": 2.5, "nested": {"x": 1}}), "name")
        .unwrap();
    assert_eq!(record.get_str("name"), Some("rust"));
    assert!(record.get("weight").is_some());
    assert!(record.get("nested").is_none());
}

#[test]
fn test_get_or_create_matches_exact_kind() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();

    let created = main.get_or_create(&Tag, "name", "swift").unwrap();
    let again = main.get_or_create(&Tag, "name", "swift").unwrap();
    assert_eq!(created.id(), again.id());
    assert_eq!(created.get_str("name"), Some("swift"));
    assert_eq!(main.count(&Tag, None).unwrap(), 1);
}
