//! A limited fetch is always a prefix of the unlimited one, whatever a child
//! context has deleted or added on top of its parent

use ctxstore::config::StoreConfig;
use ctxstore::{FetchRequest, JsonKind, KindDescriptor, Schema, StorageMode, StoreHandle};
use proptest::prelude::*;
use serde_json::json;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_limited_fetch_is_prefix(
        stored in 1usize..20,
        deleted in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
        added in 0usize..5,
        limit in 0usize..25,
    ) {
        let temp = tempfile::TempDir::new().unwrap();
        let mut config = StoreConfig::default();
        config.storage.data_dir = temp.path().to_path_buf();
        let handle = StoreHandle::new(config);
        handle.register_schema(Schema::new("Model").with_kind(KindDescriptor::new("Item")));
        handle.open("Model", StorageMode::InMemory);

        let item = JsonKind::new("Item");
        let main = handle.main_context();
        let items: Vec<_> = (0..stored).map(|i| json!({"id": i})).collect();
        let records = main.import_list(&item, &json!(items), "id").unwrap();

        let child = main.new_child();
        let mut doomed: Vec<_> = deleted
            .iter()
            .map(|ix| records[ix.index(records.len())].clone())
            .collect();
        doomed.sort_by_key(|r| r.id());
        doomed.dedup_by_key(|r| r.id());
        child.delete_objects(&doomed).unwrap();
        for _ in 0..added {
            child.create(&item, false).unwrap();
        }

        let all = child.fetch(&item, FetchRequest::new()).unwrap();
        let limited = child.fetch(&item, FetchRequest::new().limit(limit)).unwrap();
        prop_assert_eq!(all.len(), stored - doomed.len() + added);
        let expected: Vec<_> = all.iter().take(limit).map(|r| r.id()).collect();
        let actual: Vec<_> = limited.iter().map(|r| r.id()).collect();
        prop_assert_eq!(actual, expected);
    }
}
