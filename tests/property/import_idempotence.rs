//! Importing the same payload any number of times leaves one record per identity

use ctxstore::config::StoreConfig;
use ctxstore::{JsonKind, KindDescriptor, Schema, StorageMode, StoreHandle};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeSet;

fn open() -> (tempfile::TempDir, StoreHandle) {
    let temp = tempfile::TempDir::new().unwrap();
    let mut config = StoreConfig::default();
    config.storage.data_dir = temp.path().to_path_buf();
    let handle = StoreHandle::new(config);
    handle.register_schema(Schema::new("Model").with_kind(KindDescriptor::new("Item")));
    handle.open("Model", StorageMode::InMemory);
    (temp, handle)
}

fn payload(ids: &[i64]) -> Value {
    Value::Array(
        ids.iter()
            .map(|id| json!({"id": id, "label": format!("item-{}", id)}))
            .collect(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_reimport_is_idempotent(
        ids in prop::collection::vec(0i64..40, 1..25),
        repeats in 1usize..4,
    ) {
        let (_temp, handle) = open();
        let item = JsonKind::new("Item");
        let background = handle.new_background_context();
        for _ in 0..repeats {
            background.import_list(&item, &payload(&ids), "id").unwrap();
        }

        let distinct: BTreeSet<i64> = ids.iter().copied().collect();
        let main = handle.main_context();
        prop_assert_eq!(main.count(&item, None).unwrap(), distinct.len());

        let stored: BTreeSet<i64> = main
            .read_all(&item, None, Vec::new())
            .unwrap()
            .iter()
            .filter_map(|r| r.get_int("id"))
            .collect();
        prop_assert_eq!(stored, distinct);
    }

    #[test]
    fn test_identity_resolves_to_one_object(ids in prop::collection::vec(0i64..10, 2..15)) {
        let (_temp, handle) = open();
        let item = JsonKind::new("Item");
        let main = handle.main_context();
        let imported = main.import_list(&item, &payload(&ids), "id").unwrap();

        for (a, ra) in ids.iter().zip(&imported) {
            for (b, rb) in ids.iter().zip(&imported) {
                prop_assert_eq!(a == b, ra.id() == rb.id());
            }
        }
    }
}
