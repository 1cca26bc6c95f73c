//! Integration tests for fetching, counting and sorting

use super::test_utils::{
    article_ids, ids, open_in_memory, seed_articles, Article, FeaturedArticle, Tag,
};
use ctxstore::{AttrValue, FetchRequest, JsonKind, Predicate, SortDescriptor};
use serde_json::json;

#[test]
fn test_fetch_returns_natural_order() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let seeded = seed_articles(&main);

    let all = main.read_all(&Article, None, Vec::new()).unwrap();
    assert_eq!(ids(&all), ids(&seeded));
    assert_eq!(article_ids(&all), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_read_all_by_attribute_is_case_insensitive() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    seed_articles(&main);

    let matches = main
        .read_all_by_attribute(&Article, "title", "ART", Vec::new())
        .unwrap();
    assert_eq!(article_ids(&matches), vec![1, 6]);
}

#[test]
fn test_sorted_and_limited_fetch() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    seed_articles(&main);

    let request = FetchRequest::new()
        .sorted_by(vec![SortDescriptor::desc("views")])
        .limit(3);
    let top = main.fetch(&Article, request).unwrap();
    assert_eq!(article_ids(&top), vec![3, 1, 6]);

    let first = main
        .read_first_sorted(&Article, None, vec![SortDescriptor::asc("title")])
        .unwrap()
        .unwrap();
    assert_eq!(first.get_str("title"), Some("Cartography"));
}

#[test]
fn test_limit_applies_to_the_merged_view() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let seeded = seed_articles(&main);

    let child = main.new_child();
    child.delete_objects(&seeded[..2]).unwrap();
    let request = FetchRequest::new().limit(2);
    let visible = child.fetch(&Article, request).unwrap();
    assert_eq!(article_ids(&visible), vec![3, 4]);
}

#[test]
fn test_predicate_parsed_from_text() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    seed_articles(&main);

    let predicate: Predicate = r#"views >= 80 AND NOT (title CONTAINS[c] "art")"#.parse().unwrap();
    let matches = main.read_all(&Article, Some(predicate), Vec::new()).unwrap();
    assert_eq!(article_ids(&matches), vec![2, 3]);
}

#[test]
fn test_read_first_by_attribute() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    seed_articles(&main);

    let found = main.read_first_by_attribute(&Article, "id", 4).unwrap().unwrap();
    assert_eq!(found.get_str("title"), Some("Fearless Concurrency"));
    assert!(main.read_first_by_attribute(&Article, "id", 40).unwrap().is_none());
    // "4" is a string and does not match the integer 4
    assert!(main.read_first_by_attribute(&Article, "id", "4").unwrap().is_none());
}

#[test]
fn test_fetch_includes_sub_kinds_but_count_does_not() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    seed_articles(&main);
    main.import_object(&FeaturedArticle, &json!({"id": 7, "title": "Featured"}), "id")
        .unwrap();

    assert_eq!(main.read_all(&Article, None, Vec::new()).unwrap().len(), 7);
    assert_eq!(
        main.fetch(&Article, FetchRequest::new().exact_kind()).unwrap().len(),
        6
    );
    assert_eq!(main.count(&Article, None).unwrap(), 6);
    assert_eq!(main.count(&FeaturedArticle, None).unwrap(), 1);
}

#[test]
fn test_count_with_predicate() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    seed_articles(&main);

    assert_eq!(main.count(&Tag, None).unwrap(), 5);
    assert_eq!(
        main.count(&Article, Some(Predicate::lt("views", 100))).unwrap(),
        4
    );
}

#[test]
fn test_child_sees_parent_pending_changes() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let unsaved = main.create(&Tag, false).unwrap();

    let child = main.new_child();
    let seen = child.existing_object(&Tag, unsaved.id()).unwrap();
    assert_eq!(seen.map(|r| r.id()), Some(unsaved.id()));
    assert_eq!(child.count(&Tag, None).unwrap(), 1);
}

#[test]
fn test_child_pending_changes_shadow_the_parent() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    seed_articles(&main);

    let child = handle.new_background_context();
    let mut first = child.read_first_by_attribute(&Article, "id", 1).unwrap().unwrap();
    first.set("title", "Renamed");
    child.update(&first).unwrap();

    let in_child = child.existing_object(&Article, first.id()).unwrap().unwrap();
    let in_main = main.existing_object(&Article, first.id()).unwrap().unwrap();
    assert_eq!(in_child.get_str("title"), Some("Renamed"));
    assert_eq!(in_main.get_str("title"), Some("The Art of Code"));
    assert_eq!(
        article_ids(&child.read_all_by_attribute(&Article, "title", "art", Vec::new()).unwrap()),
        vec![6]
    );
}

#[test]
fn test_sort_on_attribute_with_mixed_types() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    let tags = JsonKind::new("Tag");

    let payload: Vec<_> = (0..200)
        .map(|i| {
            let n = i * 37 % 101;
            if i % 4 == 0 {
                json!({"name": format!("t{}", i), "v": format!("s{:03}", n)})
            } else {
                json!({"name": format!("t{}", i), "v": n})
            }
        })
        .collect();
    main.import_list(&tags, &json!(payload), "name").unwrap();

    let sorted = main
        .read_all(&tags, None, vec![SortDescriptor::asc("v")])
        .unwrap();
    let ints: Vec<i64> = sorted
        .iter()
        .filter_map(|r| r.get("v").and_then(AttrValue::as_int))
        .collect();
    let strs: Vec<&str> = sorted.iter().filter_map(|r| r.get_str("v")).collect();
    assert_eq!(ints.len(), 150);
    assert!(ints.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(strs.windows(2).all(|pair| pair[0] <= pair[1]));
    // Numbers sort before strings
    assert!(sorted[..150].iter().all(|r| r.get_str("v").is_none()));
}
