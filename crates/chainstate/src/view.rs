//! Read/write view abstraction over the joined coin and name stores.

use std::collections::BTreeSet;

use nmcd_consensus::{Amount, Hash256, NULL_HASH};

use crate::coins::{Coins, CoinsMap};
use crate::names::{Name, NameCache, NameData, NameHistory, NameIterator};

/// Aggregate statistics over the whole UTXO set.
#[derive(Clone, Debug, Default)]
pub struct CoinsStats {
    pub best_block: Hash256,
    pub transactions: u64,
    pub transaction_outputs: u64,
    pub serialized_size: u64,
    pub hash_serialized: Hash256,
    pub total_amount: Amount,
}

/// A view over the chainstate. The defaults answer nothing, so an
/// implementation overrides what it can serve; `iterate_names` has no
/// meaningful empty answer and is fatal unless overridden.
pub trait CoinsView {
    fn get_coins(&mut self, _txid: &Hash256) -> Option<Coins> {
        None
    }

    /// May be cheaper than `get_coins` for existence checks.
    fn have_coins(&mut self, _txid: &Hash256) -> bool {
        false
    }

    /// The all-zero hash means "unknown".
    fn get_best_block(&mut self) -> Hash256 {
        NULL_HASH
    }

    fn get_name(&mut self, _name: &[u8]) -> Option<NameData> {
        None
    }

    fn get_name_history(&mut self, _name: &[u8]) -> Option<NameHistory> {
        None
    }

    /// Fill `names` with the names scheduled to expire at `height`.
    fn get_names_for_height(&mut self, _height: u32, _names: &mut BTreeSet<Name>) -> bool {
        false
    }

    fn iterate_names(&mut self) -> Box<dyn NameIterator + '_> {
        panic!("this view cannot iterate names");
    }

    /// Absorb a child layer's staged state. The coin map and name cache are
    /// consumed; returns false only on a backing-store failure.
    fn batch_write(&mut self, _coins: CoinsMap, _best_block: Hash256, _names: NameCache) -> bool {
        false
    }

    fn get_stats(&mut self) -> Option<CoinsStats> {
        None
    }

    fn validate_name_db(&mut self) -> bool {
        false
    }
}

/// Forwarding view. Lets a layer rebind its backend (say, from the on-disk
/// store to an in-memory one) without being rewritten.
pub struct CoinsViewBacked<'a> {
    base: &'a mut dyn CoinsView,
}

impl<'a> CoinsViewBacked<'a> {
    pub fn new(base: &'a mut dyn CoinsView) -> Self {
        Self { base }
    }

    pub fn set_backend(&mut self, base: &'a mut dyn CoinsView) {
        self.base = base;
    }
}

impl CoinsView for CoinsViewBacked<'_> {
    fn get_coins(&mut self, txid: &Hash256) -> Option<Coins> {
        self.base.get_coins(txid)
    }

    fn have_coins(&mut self, txid: &Hash256) -> bool {
        self.base.have_coins(txid)
    }

    fn get_best_block(&mut self) -> Hash256 {
        self.base.get_best_block()
    }

    fn get_name(&mut self, name: &[u8]) -> Option<NameData> {
        self.base.get_name(name)
    }

    fn get_name_history(&mut self, name: &[u8]) -> Option<NameHistory> {
        self.base.get_name_history(name)
    }

    fn get_names_for_height(&mut self, height: u32, names: &mut BTreeSet<Name>) -> bool {
        self.base.get_names_for_height(height, names)
    }

    fn iterate_names(&mut self) -> Box<dyn NameIterator + '_> {
        self.base.iterate_names()
    }

    fn batch_write(&mut self, coins: CoinsMap, best_block: Hash256, names: NameCache) -> bool {
        self.base.batch_write(coins, best_block, names)
    }

    fn get_stats(&mut self) -> Option<CoinsStats> {
        self.base.get_stats()
    }

    fn validate_name_db(&mut self) -> bool {
        self.base.validate_name_db()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DefaultView;
    impl CoinsView for DefaultView {}

    #[test]
    fn defaults_answer_nothing() {
        let mut view = DefaultView;
        assert_eq!(view.get_coins(&[1u8; 32]), None);
        assert!(!view.have_coins(&[1u8; 32]));
        assert_eq!(view.get_best_block(), NULL_HASH);
        assert_eq!(view.get_name(b"d/x"), None);
        assert!(!view.batch_write(CoinsMap::default(), NULL_HASH, NameCache::default()));
        assert!(view.get_stats().is_none());
        assert!(!view.validate_name_db());
    }

    #[test]
    #[should_panic(expected = "cannot iterate names")]
    fn default_name_iteration_is_fatal() {
        let mut view = DefaultView;
        let _ = view.iterate_names();
    }

    #[test]
    fn backed_view_forwards_and_rebinds() {
        struct FixedView(Hash256);
        impl CoinsView for FixedView {
            fn get_best_block(&mut self) -> Hash256 {
                self.0
            }
        }

        let mut first = FixedView([1u8; 32]);
        let mut second = FixedView([2u8; 32]);

        let mut backed = CoinsViewBacked::new(&mut first);
        assert_eq!(backed.get_best_block(), [1u8; 32]);

        backed.set_backend(&mut second);
        assert_eq!(backed.get_best_block(), [2u8; 32]);
    }
}
