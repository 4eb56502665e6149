//! In-memory cache layer over a backing view.
//!
//! A cache only remembers differences from its parent: coin records are
//! pulled in lazily and flagged `DIRTY`/`FRESH`, name changes are staged as
//! deltas, and the whole layer collapses into the parent on `flush`. Layers
//! nest arbitrarily.

use std::collections::hash_map::Entry;
use std::collections::BTreeSet;
use std::mem;
use std::ops::{Deref, DerefMut};

use nmcd_consensus::{Amount, Hash256, NULL_HASH};
use nmcd_primitives::transaction::{Transaction, TxIn, TxOut};

use crate::coins::{Coins, CoinsCacheEntry, CoinsMap};
use crate::memusage;
use crate::names::{self, Name, NameCache, NameData, NameHistory, NameIterator};
use crate::view::{CoinsStats, CoinsView};

pub struct CoinsViewCache<'a> {
    base: &'a mut dyn CoinsView,
    coins: CoinsMap,
    /// `None` until written or inherited from the parent on first read.
    best_block: Option<Hash256>,
    names: NameCache,
    /// Heap bytes held by the cached coin records; the caller watches this
    /// to decide when to flush.
    cached_coins_usage: usize,
}

impl<'a> CoinsViewCache<'a> {
    pub fn new(base: &'a mut dyn CoinsView) -> Self {
        Self {
            base,
            coins: CoinsMap::default(),
            best_block: None,
            names: NameCache::default(),
            cached_coins_usage: 0,
        }
    }

    pub fn dynamic_memory_usage(&self) -> usize {
        self.cached_coins_usage
    }

    /// Number of cached coin records. Name operations are not counted.
    pub fn cache_size(&self) -> usize {
        self.coins.len()
    }

    /// Make sure `txid` is cached if the parent knows it. A miss must stay
    /// a miss: inserting nothing is what lets a later `modify` still claim
    /// the entry as fresh.
    fn fetch(&mut self, txid: &Hash256) -> bool {
        if self.coins.contains_key(txid) {
            return true;
        }
        let Some(coins) = self.base.get_coins(txid) else {
            return false;
        };
        let mut entry = CoinsCacheEntry { coins, flags: 0 };
        if entry.coins.is_pruned() {
            // The parent only has an empty stub; our copy is authoritative.
            entry.flags = CoinsCacheEntry::FRESH;
        }
        self.cached_coins_usage += memusage::coins_usage(&entry.coins);
        self.coins.insert(*txid, entry);
        true
    }

    /// Borrow the cached record; `None` on a miss.
    pub fn access_coins(&mut self, txid: &Hash256) -> Option<&Coins> {
        if !self.fetch(txid) {
            return None;
        }
        self.coins.get(txid).map(|entry| &entry.coins)
    }

    /// Open the record for mutation, creating it if the parent has nothing.
    /// The entry is flagged `DIRTY` up front; the returned handle restores
    /// the record invariants when it goes out of scope.
    pub fn modify(&mut self, txid: &Hash256) -> CoinsModifier<'_, 'a> {
        let mut cached_usage = 0;
        match self.coins.entry(*txid) {
            Entry::Occupied(occupied) => {
                cached_usage = memusage::coins_usage(&occupied.get().coins);
            }
            Entry::Vacant(vacant) => {
                let mut entry = CoinsCacheEntry::default();
                match self.base.get_coins(txid) {
                    Some(coins) => {
                        entry.coins = coins;
                        if entry.coins.is_pruned() {
                            // Only a pruned stub below; ours counts as new.
                            entry.flags = CoinsCacheEntry::FRESH;
                        }
                    }
                    None => {
                        // The parent has no entry at all.
                        entry.flags = CoinsCacheEntry::FRESH;
                    }
                }
                vacant.insert(entry);
            }
        }
        let entry = self.coins.get_mut(txid).expect("entry just ensured");
        // The premise of modify() is that the caller will mutate.
        entry.flags |= CoinsCacheEntry::DIRTY;
        CoinsModifier {
            cache: self,
            txid: *txid,
            cached_usage,
        }
    }

    pub fn set_best_block(&mut self, hash: Hash256) {
        self.best_block = if hash == NULL_HASH { None } else { Some(hash) };
    }

    /// Update a name going forward (`undo == false`) or while disconnecting
    /// blocks (`undo == true`); the distinction drives the history stack.
    /// Setting a nonexistent name with `undo` is a protocol violation.
    pub fn set_name(&mut self, name: &[u8], data: NameData, undo: bool) {
        match self.get_name(name) {
            Some(old) => {
                self.names.remove_expire_index(name, old.height);

                // Only a pre-existing name has history to maintain.
                if names::name_history_enabled() {
                    let mut history = self.get_name_history(name).unwrap_or_default();
                    if undo {
                        history.pop(&data);
                    } else {
                        history.push(old);
                    }
                    self.names.set_history(name, history);
                }
            }
            None => {
                assert!(!undo, "undoing an update of a nonexistent name");
            }
        }

        let new_height = data.height;
        self.names.set(name, data);
        self.names.add_expire_index(name, new_height);
    }

    /// Remove a name. It must exist, and (with history enabled) its history
    /// must already have been unwound.
    pub fn delete_name(&mut self, name: &[u8]) {
        let old = match self.get_name(name) {
            Some(old) => old,
            None => panic!(
                "deleting nonexistent name '{}'",
                String::from_utf8_lossy(name)
            ),
        };
        self.names.remove_expire_index(name, old.height);

        if names::name_history_enabled() {
            let clean = self
                .get_name_history(name)
                .map_or(true, |history| history.is_empty());
            assert!(clean, "deleting a name with non-empty history");
        }

        self.names.remove(name);
    }

    /// Collapse this layer into the parent and start over empty.
    pub fn flush(&mut self) -> bool {
        let coins = mem::take(&mut self.coins);
        let names = mem::take(&mut self.names);
        let best_block = self.best_block.unwrap_or(NULL_HASH);
        let ok = self.base.batch_write(coins, best_block, names);
        self.cached_coins_usage = 0;
        ok
    }

    /// Resolve an input to the output it spends. The validator only calls
    /// this for inputs it has already checked, so a miss is fatal.
    pub fn get_output_for(&mut self, input: &TxIn) -> &TxOut {
        let index = input.prevout.index;
        let coins = self
            .access_coins(&input.prevout.hash)
            .expect("input refers to missing coins");
        assert!(coins.is_available(index), "input output already spent");
        coins.outputs[index as usize]
            .as_ref()
            .expect("available output")
    }

    /// Total value consumed by a transaction; zero for a coinbase.
    pub fn get_value_in(&mut self, tx: &Transaction) -> Amount {
        if tx.is_coinbase() {
            return 0;
        }
        let mut total = 0;
        for input in &tx.vin {
            total += self.get_output_for(input).value;
        }
        total
    }

    /// Whether every input of a non-coinbase transaction is spendable here.
    pub fn have_inputs(&mut self, tx: &Transaction) -> bool {
        if tx.is_coinbase() {
            return true;
        }
        for input in &tx.vin {
            let available = self
                .access_coins(&input.prevout.hash)
                .is_some_and(|coins| coins.is_available(input.prevout.index));
            if !available {
                return false;
            }
        }
        true
    }

    /// Age-weighted input value, compressed by the transaction's modified
    /// size. Coinbases have no inputs and yield zero.
    pub fn get_priority(&mut self, tx: &Transaction, height: u32) -> f64 {
        if tx.is_coinbase() {
            return 0.0;
        }
        let mut input_priority = 0.0;
        for input in &tx.vin {
            let coins = self
                .access_coins(&input.prevout.hash)
                .expect("input refers to missing coins");
            if !coins.is_available(input.prevout.index) {
                continue;
            }
            if coins.height < height {
                let value = coins.outputs[input.prevout.index as usize]
                    .as_ref()
                    .expect("available output")
                    .value;
                input_priority += value as f64 * (height - coins.height) as f64;
            }
        }
        tx.compute_priority(input_priority)
    }
}

impl CoinsView for CoinsViewCache<'_> {
    fn get_coins(&mut self, txid: &Hash256) -> Option<Coins> {
        self.access_coins(txid).cloned()
    }

    fn have_coins(&mut self, txid: &Hash256) -> bool {
        // The emptiness test stands in for is_pruned: only a reorg replaces
        // outputs wholesale, spending just blanks individual slots.
        self.fetch(txid)
            && self
                .coins
                .get(txid)
                .is_some_and(|entry| !entry.coins.outputs.is_empty())
    }

    fn get_best_block(&mut self) -> Hash256 {
        match self.best_block {
            Some(hash) => hash,
            None => {
                let inherited = self.base.get_best_block();
                if inherited != NULL_HASH {
                    self.best_block = Some(inherited);
                }
                inherited
            }
        }
    }

    fn get_name(&mut self, name: &[u8]) -> Option<NameData> {
        if self.names.is_deleted(name) {
            return None;
        }
        if let Some(data) = self.names.get(name) {
            return Some(data.clone());
        }

        // The cache only keeps track of changes; clean reads always go to
        // the parent and are not memoized.
        self.base.get_name(name)
    }

    fn get_name_history(&mut self, name: &[u8]) -> Option<NameHistory> {
        if let Some(history) = self.names.get_history(name) {
            return Some(history.clone());
        }
        self.base.get_name_history(name)
    }

    fn get_names_for_height(&mut self, height: u32, names: &mut BTreeSet<Name>) -> bool {
        // The parent set first, then this layer's delta on top.
        if !self.base.get_names_for_height(height, names) {
            return false;
        }
        self.names.update_names_for_height(height, names);
        true
    }

    fn iterate_names(&mut self) -> Box<dyn NameIterator + '_> {
        let CoinsViewCache { base, names, .. } = self;
        Box::new(names.iterate(base.iterate_names()))
    }

    fn batch_write(&mut self, mut coins: CoinsMap, best_block: Hash256, names: NameCache) -> bool {
        for (txid, child) in coins.drain() {
            // Clean entries carry no information.
            if !child.is_dirty() {
                continue;
            }
            match self.coins.entry(txid) {
                Entry::Vacant(vacant) => {
                    if !child.coins.is_pruned() {
                        // We have no entry while the child has a live one;
                        // move it up. Had the grandparent known this txid,
                        // the child's first fetch would have cached it here.
                        assert!(child.is_fresh(), "non-fresh child entry missing in parent");
                        self.cached_coins_usage += memusage::coins_usage(&child.coins);
                        vacant.insert(CoinsCacheEntry {
                            coins: child.coins,
                            flags: CoinsCacheEntry::DIRTY | CoinsCacheEntry::FRESH,
                        });
                    }
                    // A pruned child entry over an absent parent entry is
                    // dropped: nothing below needs deleting.
                }
                Entry::Occupied(mut occupied) => {
                    if occupied.get().is_fresh() && child.coins.is_pruned() {
                        // Our FRESH claim says the grandparent has nothing,
                        // and the child confirms the deletion; just erase.
                        self.cached_coins_usage -= memusage::coins_usage(&occupied.get().coins);
                        occupied.remove();
                    } else {
                        let ours = occupied.get_mut();
                        self.cached_coins_usage -= memusage::coins_usage(&ours.coins);
                        ours.coins = child.coins;
                        self.cached_coins_usage += memusage::coins_usage(&ours.coins);
                        ours.flags |= CoinsCacheEntry::DIRTY;
                    }
                }
            }
        }

        self.best_block = if best_block == NULL_HASH {
            None
        } else {
            Some(best_block)
        };
        self.names.apply(names);
        true
    }

    fn get_stats(&mut self) -> Option<CoinsStats> {
        self.base.get_stats()
    }

    fn validate_name_db(&mut self) -> bool {
        self.base.validate_name_db()
    }
}

/// Exclusive, scoped mutation handle for one coin record. Holding it
/// borrows the cache mutably, so a second modifier (or a batch write or
/// flush under a live one) is rejected at compile time. Dropping it
/// re-trims the record, erases a fresh record that pruned itself away, and
/// reconciles the usage counter on every exit path.
pub struct CoinsModifier<'c, 'a> {
    cache: &'c mut CoinsViewCache<'a>,
    txid: Hash256,
    cached_usage: usize,
}

impl Deref for CoinsModifier<'_, '_> {
    type Target = Coins;

    fn deref(&self) -> &Coins {
        &self.cache.coins.get(&self.txid).expect("modified entry").coins
    }
}

impl DerefMut for CoinsModifier<'_, '_> {
    fn deref_mut(&mut self) -> &mut Coins {
        &mut self
            .cache
            .coins
            .get_mut(&self.txid)
            .expect("modified entry")
            .coins
    }
}

impl Drop for CoinsModifier<'_, '_> {
    fn drop(&mut self) {
        let cache = &mut *self.cache;
        let entry = cache.coins.get_mut(&self.txid).expect("modified entry");
        entry.coins.cleanup();
        cache.cached_coins_usage -= self.cached_usage;
        if entry.is_fresh() && entry.coins.is_pruned() {
            // Never existed below and no longer exists here.
            cache.coins.remove(&self.txid);
        } else {
            cache.cached_coins_usage += memusage::coins_usage(&entry.coins);
        }
    }
}
