use nmcd_storage::memory::MemoryStore;
use nmcd_storage::{ChainStore, Column, StoreError, WriteBatch};

fn collect(store: &MemoryStore, column: Column, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut rows = Vec::new();
    store
        .scan_prefix(column, prefix, &mut |key, value| {
            rows.push((key.to_vec(), value.to_vec()));
            Ok(())
        })
        .expect("scan");
    rows
}

#[test]
fn column_indexes_are_dense() {
    for (position, column) in Column::all().into_iter().enumerate() {
        assert_eq!(column.index(), position);
    }
}

#[test]
fn column_names_are_unique() {
    let all = Column::all();
    for (i, a) in all.iter().enumerate() {
        for b in all.iter().skip(i + 1) {
            assert_ne!(a.name(), b.name());
        }
    }
}

#[test]
fn get_put_delete_round_trip() {
    let store = MemoryStore::new();
    assert_eq!(store.get(Column::Coins, b"k").expect("get"), None);

    store.put(Column::Coins, b"k", b"v").expect("put");
    assert_eq!(
        store.get(Column::Coins, b"k").expect("get"),
        Some(b"v".to_vec())
    );

    // Same key in a different column is a different entry.
    assert_eq!(store.get(Column::Name, b"k").expect("get"), None);

    store.delete(Column::Coins, b"k").expect("delete");
    assert_eq!(store.get(Column::Coins, b"k").expect("get"), None);
}

#[test]
fn scan_prefix_is_ordered_and_column_scoped() {
    let store = MemoryStore::new();
    store.put(Column::Name, b"a/one", b"1").expect("put");
    store.put(Column::Name, b"a/two", b"2").expect("put");
    store.put(Column::Name, b"b/one", b"3").expect("put");
    // An entry in another column sharing the prefix must not leak in.
    store.put(Column::NameHistory, b"a/one", b"x").expect("put");

    assert_eq!(
        collect(&store, Column::Name, b"a/"),
        vec![
            (b"a/one".to_vec(), b"1".to_vec()),
            (b"a/two".to_vec(), b"2".to_vec()),
        ]
    );

    let all = collect(&store, Column::Name, b"");
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].0 < w[1].0));
}

#[test]
fn scan_stops_when_the_visitor_fails() {
    let store = MemoryStore::new();
    store.put(Column::Name, b"a", b"1").expect("put");
    store.put(Column::Name, b"b", b"2").expect("put");
    store.put(Column::Name, b"c", b"3").expect("put");

    let mut seen = 0;
    let result = store.scan_prefix(Column::Name, b"", &mut |_, _| {
        seen += 1;
        if seen == 2 {
            Err(StoreError::new("enough"))
        } else {
            Ok(())
        }
    });
    assert!(result.is_err());
    assert_eq!(seen, 2);
}

#[test]
fn commit_applies_all_ops() {
    let store = MemoryStore::new();
    store.put(Column::Meta, b"stale", b"old").expect("put");

    let mut batch = WriteBatch::new();
    batch.put(Column::Meta, b"best", b"tip");
    batch.delete(Column::Meta, b"stale");
    store.commit(&batch).expect("commit");

    assert_eq!(
        store.get(Column::Meta, b"best").expect("get"),
        Some(b"tip".to_vec())
    );
    assert_eq!(store.get(Column::Meta, b"stale").expect("get"), None);
}
