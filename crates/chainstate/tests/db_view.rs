use nmcd_chainstate::{Coins, CoinsView, CoinsViewBacked, CoinsViewCache, CoinsViewDb};
use nmcd_consensus::params::{consensus_params, Network};
use nmcd_consensus::NULL_HASH;
use nmcd_primitives::transaction::TxOut;
use nmcd_storage::memory::MemoryStore;

fn txout(value: i64, tag: u8) -> TxOut {
    TxOut {
        value,
        script_pubkey: vec![0x76, 0xa9, tag],
    }
}

#[test]
fn state_survives_reopening_the_view() {
    let params = consensus_params(Network::Regtest);

    let record = Coins {
        coinbase: true,
        outputs: vec![Some(txout(50, 1)), None, Some(txout(25, 2))],
        height: 42,
        version: 1,
    };
    let txid = [0x21u8; 32];

    let mut db = CoinsViewDb::new(MemoryStore::new(), params.clone());
    {
        let mut cache = CoinsViewCache::new(&mut db);
        {
            let mut staged = cache.modify(&txid);
            *staged = record.clone();
        }
        cache.set_best_block([0xbb; 32]);
        assert!(cache.flush());
    }

    // A brand-new view over the same store sees identical state.
    let mut reopened = CoinsViewDb::new(db.into_store(), params);
    assert_eq!(reopened.get_coins(&txid), Some(record));
    assert!(reopened.have_coins(&txid));
    assert_eq!(reopened.get_best_block(), [0xbb; 32]);
}

#[test]
fn stats_aggregate_the_coins_column() {
    let mut db = CoinsViewDb::new(MemoryStore::new(), consensus_params(Network::Regtest));

    {
        let mut cache = CoinsViewCache::new(&mut db);
        {
            let mut staged = cache.modify(&[1u8; 32]);
            staged.outputs = vec![Some(txout(10, 1)), Some(txout(20, 2))];
            staged.height = 1;
            staged.version = 1;
        }
        {
            let mut staged = cache.modify(&[2u8; 32]);
            staged.outputs = vec![None, Some(txout(30, 3))];
            staged.height = 2;
            staged.version = 1;
        }
        cache.set_best_block([0xcc; 32]);
        assert!(cache.flush());
    }

    let stats = db.get_stats().expect("stats");
    assert_eq!(stats.best_block, [0xcc; 32]);
    assert_eq!(stats.transactions, 2);
    assert_eq!(stats.transaction_outputs, 3);
    assert_eq!(stats.total_amount, 60);
    assert!(stats.serialized_size > 0);
    assert_ne!(stats.hash_serialized, NULL_HASH);

    // The rolling hash pins the exact contents.
    let again = db.get_stats().expect("stats");
    assert_eq!(again.hash_serialized, stats.hash_serialized);
}

#[test]
fn stats_pass_through_cache_layers() {
    let mut db = CoinsViewDb::new(MemoryStore::new(), consensus_params(Network::Regtest));
    {
        let mut cache = CoinsViewCache::new(&mut db);
        {
            let mut staged = cache.modify(&[3u8; 32]);
            staged.outputs = vec![Some(txout(5, 1))];
            staged.height = 1;
            staged.version = 1;
        }
        assert!(cache.flush());

        // The cache has no stats of its own; the request reaches the store.
        let stats = cache.get_stats().expect("stats");
        assert_eq!(stats.transactions, 1);
    }
}

#[test]
fn backed_view_can_swap_stores() {
    let params = consensus_params(Network::Regtest);
    let mut first = CoinsViewDb::new(MemoryStore::new(), params.clone());
    let mut second = CoinsViewDb::new(MemoryStore::new(), params);

    let txid = [0x44u8; 32];
    {
        let mut cache = CoinsViewCache::new(&mut first);
        {
            let mut staged = cache.modify(&txid);
            staged.outputs = vec![Some(txout(1, 1))];
            staged.height = 1;
            staged.version = 1;
        }
        assert!(cache.flush());
    }

    let mut backed = CoinsViewBacked::new(&mut first);
    assert!(backed.get_coins(&txid).is_some());

    backed.set_backend(&mut second);
    assert!(backed.get_coins(&txid).is_none());
}
