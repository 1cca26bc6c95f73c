//! Integration tests for the async entry points

use super::test_utils::{article_ids, mock_articles, open_in_memory, Article, Tag};
use ctxstore::{SaveOutcome, SortDescriptor};
use futures::future::join_all;

#[tokio::test(flavor = "multi_thread")]
async fn test_import_list_async_saves() {
    let (_temp, handle) = open_in_memory();
    let background = handle.new_background_context();

    let imported = background
        .import_list_async(&Article, mock_articles(), "id")
        .await
        .unwrap();
    assert_eq!(imported.len(), 6);

    let stored = handle
        .main_context()
        .read_all_async(&Article, None, vec![SortDescriptor::desc("id")])
        .await
        .unwrap();
    assert_eq!(article_ids(&stored), vec![6, 5, 4, 3, 2, 1]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_save_to_store_async() {
    let (_temp, handle) = open_in_memory();
    let background = handle.new_background_context();
    background
        .perform(|ctx| ctx.create(&Tag, false))
        .await
        .unwrap();

    let outcome = background.save_to_store_async().await.unwrap();
    assert_eq!(outcome, SaveOutcome::Saved { levels: 2 });
    assert_eq!(
        background.save_to_store_async().await.unwrap(),
        SaveOutcome::NothingToSave
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_background_imports() {
    let (_temp, handle) = open_in_memory();
    let imports = (0..4).map(|batch| {
        let context = handle.new_background_context();
        let payload = serde_json::json!([
            {"id": batch * 10 + 1, "title": "a"},
            {"id": batch * 10 + 2, "title": "b"}
        ]);
        context.import_list_async(&Article, payload, "id")
    });
    let results = join_all(imports).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let total = handle
        .main_context()
        .perform(|ctx| ctx.count(&Article, None))
        .await
        .unwrap();
    assert_eq!(total, 8);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_all_async() {
    let (_temp, handle) = open_in_memory();
    let main = handle.main_context();
    main.import_list_async(&Article, mock_articles(), "id")
        .await
        .unwrap();

    let deleted = main.delete_all_async(&Article, None).await.unwrap();
    assert_eq!(deleted, 6);
    main.save_to_store_async().await.unwrap();
    let left = main.read_all_async(&Article, None, Vec::new()).await.unwrap();
    assert!(left.is_empty());
}
