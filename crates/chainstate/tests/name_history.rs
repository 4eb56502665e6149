//! History-stack behavior. These tests flip the process-wide history
//! toggle, so they live in their own test binary and all run with it on.

use nmcd_chainstate::{
    set_name_history_enabled, CoinsView, CoinsViewCache, CoinsViewDb, NameData,
};
use nmcd_consensus::params::{consensus_params, Network};
use nmcd_primitives::outpoint::OutPoint;
use nmcd_storage::memory::MemoryStore;
use nmcd_storage::{ChainStore, Column};

fn test_db() -> CoinsViewDb<MemoryStore> {
    set_name_history_enabled(true);
    CoinsViewDb::new(MemoryStore::new(), consensus_params(Network::Regtest))
}

fn name_data(height: u32, tag: u8) -> NameData {
    NameData {
        value: vec![tag],
        height,
        prevout: OutPoint {
            hash: [tag; 32],
            index: 0,
        },
        address: vec![0x76, 0xa9, tag],
    }
}

#[test]
fn forward_updates_stack_history() {
    let mut db = test_db();

    {
        let mut cache = CoinsViewCache::new(&mut db);
        // First registration: nothing gets pushed.
        cache.set_name(b"d/n", name_data(100, 1), false);
        assert!(cache.get_name_history(b"d/n").is_none());
        assert!(cache.flush());
    }

    let mut cache = CoinsViewCache::new(&mut db);
    cache.set_name(b"d/n", name_data(200, 2), false);
    let history = cache.get_name_history(b"d/n").expect("one overwrite");
    assert_eq!(history.entries(), &[name_data(100, 1)]);

    cache.set_name(b"d/n", name_data(300, 3), false);
    let history = cache.get_name_history(b"d/n").expect("two overwrites");
    assert_eq!(history.entries(), &[name_data(100, 1), name_data(200, 2)]);
}

#[test]
fn undo_pops_the_matching_state() {
    let mut db = test_db();
    let mut cache = CoinsViewCache::new(&mut db);

    cache.set_name(b"d/n", name_data(100, 1), false);
    cache.set_name(b"d/n", name_data(200, 2), false);
    cache.set_name(b"d/n", name_data(300, 3), false);

    // Disconnecting the last update restores data@200, which must sit on
    // top of the stack.
    cache.set_name(b"d/n", name_data(200, 2), true);
    let history = cache.get_name_history(b"d/n").expect("history");
    assert_eq!(history.entries(), &[name_data(100, 1)]);
    assert_eq!(cache.get_name(b"d/n"), Some(name_data(200, 2)));
}

#[test]
#[should_panic(expected = "does not match")]
fn undo_with_diverged_history_is_fatal() {
    let mut db = test_db();
    let mut cache = CoinsViewCache::new(&mut db);

    cache.set_name(b"d/n", name_data(100, 1), false);
    cache.set_name(b"d/n", name_data(200, 2), false);

    // The stack top is data@100; restoring something else is corruption.
    cache.set_name(b"d/n", name_data(150, 9), true);
}

#[test]
fn history_round_trips_through_the_store() {
    let mut db = test_db();

    {
        let mut cache = CoinsViewCache::new(&mut db);
        cache.set_name(b"d/n", name_data(100, 1), false);
        cache.set_name(b"d/n", name_data(200, 2), false);
        assert!(cache.flush());
    }

    let history = db.get_name_history(b"d/n").expect("stored history");
    assert_eq!(history.entries(), &[name_data(100, 1)]);

    // A fresh cache reads through and keeps stacking on top.
    let mut cache = CoinsViewCache::new(&mut db);
    cache.set_name(b"d/n", name_data(300, 3), false);
    let history = cache.get_name_history(b"d/n").expect("history");
    assert_eq!(history.entries(), &[name_data(100, 1), name_data(200, 2)]);
}

#[test]
fn unwound_history_is_erased_from_the_store() {
    let mut db = test_db();

    {
        let mut cache = CoinsViewCache::new(&mut db);
        cache.set_name(b"d/n", name_data(100, 1), false);
        cache.set_name(b"d/n", name_data(200, 2), false);
        assert!(cache.flush());
    }
    assert!(db
        .store()
        .get(Column::NameHistory, b"d/n")
        .expect("get")
        .is_some());

    {
        let mut cache = CoinsViewCache::new(&mut db);
        // Disconnect the second update, then delete the registration.
        cache.set_name(b"d/n", name_data(100, 1), true);
        cache.delete_name(b"d/n");
        assert!(cache.flush());
    }

    assert!(db
        .store()
        .get(Column::NameHistory, b"d/n")
        .expect("get")
        .is_none());
    assert_eq!(db.get_name(b"d/n"), None);
}

#[test]
#[should_panic(expected = "non-empty history")]
fn delete_with_pending_history_is_fatal() {
    let mut db = test_db();
    let mut cache = CoinsViewCache::new(&mut db);

    cache.set_name(b"d/n", name_data(100, 1), false);
    cache.set_name(b"d/n", name_data(200, 2), false);
    cache.delete_name(b"d/n");
}
