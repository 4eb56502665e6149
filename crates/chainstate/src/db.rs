//! Persistent chainstate view over the storage backend.

use std::collections::{BTreeMap, BTreeSet};

use nmcd_consensus::{ConsensusParams, Hash256, NULL_HASH};
use nmcd_log::{log_debug, log_error, log_info};
use nmcd_primitives::encoding::{Deserialize, Serialize};
use nmcd_primitives::hash::sha256;
use nmcd_primitives::namescript::NameScript;
use nmcd_storage::{ChainStore, Column, StoreError, WriteBatch};
use sha2::{Digest, Sha256};

use crate::coins::{Coins, CoinsMap};
use crate::names::{
    self, ExpireEntry, Name, NameCache, NameData, NameHistory, NameIterator,
};
use crate::view::{CoinsStats, CoinsView};

const META_BEST_BLOCK_KEY: &[u8] = b"best_block";

/// The leaf of a view stack: reads and writes go straight to the
/// key-value store. Store failures are logged and reported as absence,
/// except for `batch_write`, whose boolean the cache propagates.
pub struct CoinsViewDb<S> {
    store: S,
    params: ConsensusParams,
    /// Height of the current tip, maintained by the host (the block index
    /// lives outside this crate). Only the name-db validation uses it.
    tip_height: u32,
}

impl<S: ChainStore> CoinsViewDb<S> {
    pub fn new(store: S, params: ConsensusParams) -> Self {
        Self {
            store,
            params,
            tip_height: 0,
        }
    }

    pub fn set_tip_height(&mut self, height: u32) {
        self.tip_height = height;
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn read(&self, column: Column, key: &[u8]) -> Option<Vec<u8>> {
        match self.store.get(column, key) {
            Ok(value) => value,
            Err(err) => {
                log_error!("chainstate read failed in {}: {err}", column.name());
                None
            }
        }
    }
}

fn write_name_batch(batch: &mut WriteBatch, names: &NameCache) {
    for (name, data) in names.iter_entries() {
        batch.put(Column::Name, name, data.to_bytes());
    }
    for name in names.iter_deleted() {
        batch.delete(Column::Name, name);
    }

    assert!(
        names::name_history_enabled() || names.iter_history().next().is_none(),
        "name history staged while disabled"
    );
    for (name, history) in names.iter_history() {
        if history.is_empty() {
            batch.delete(Column::NameHistory, name);
        } else {
            batch.put(Column::NameHistory, name, history.to_bytes());
        }
    }

    for (entry, add) in names.iter_expire_index() {
        if add {
            batch.put(Column::NameExpiry, entry.to_key(), b"");
        } else {
            batch.delete(Column::NameExpiry, entry.to_key());
        }
    }
}

impl<S: ChainStore> CoinsView for CoinsViewDb<S> {
    fn get_coins(&mut self, txid: &Hash256) -> Option<Coins> {
        let bytes = self.read(Column::Coins, txid)?;
        match Coins::decode(&bytes) {
            Ok(coins) => Some(coins),
            Err(err) => {
                log_error!("corrupt coin record: {err}");
                None
            }
        }
    }

    fn have_coins(&mut self, txid: &Hash256) -> bool {
        self.read(Column::Coins, txid).is_some()
    }

    fn get_best_block(&mut self) -> Hash256 {
        let Some(bytes) = self.read(Column::Meta, META_BEST_BLOCK_KEY) else {
            return NULL_HASH;
        };
        match <[u8; 32]>::try_from(bytes.as_slice()) {
            Ok(hash) => hash,
            Err(_) => {
                log_error!("corrupt best-block record ({} bytes)", bytes.len());
                NULL_HASH
            }
        }
    }

    fn get_name(&mut self, name: &[u8]) -> Option<NameData> {
        let bytes = self.read(Column::Name, name)?;
        match NameData::from_bytes(&bytes) {
            Ok(data) => Some(data),
            Err(err) => {
                log_error!(
                    "corrupt name record '{}': {err}",
                    String::from_utf8_lossy(name)
                );
                None
            }
        }
    }

    fn get_name_history(&mut self, name: &[u8]) -> Option<NameHistory> {
        assert!(names::name_history_enabled(), "name history is disabled");
        let bytes = self.read(Column::NameHistory, name)?;
        match NameHistory::from_bytes(&bytes) {
            Ok(history) => Some(history),
            Err(err) => {
                log_error!(
                    "corrupt name history '{}': {err}",
                    String::from_utf8_lossy(name)
                );
                None
            }
        }
    }

    fn get_names_for_height(&mut self, height: u32, names: &mut BTreeSet<Name>) -> bool {
        names.clear();
        let scan = self
            .store
            .scan_prefix(Column::NameExpiry, &height.to_be_bytes(), &mut |key, _| {
                match ExpireEntry::from_key(key) {
                    Some(entry) => {
                        names.insert(entry.name);
                        Ok(())
                    }
                    None => Err(StoreError::new(format!(
                        "corrupt expire index key ({} bytes)",
                        key.len()
                    ))),
                }
            });
        if let Err(err) = scan {
            log_error!("expire index scan failed at height {height}: {err}");
            names.clear();
            return false;
        }
        true
    }

    fn iterate_names(&mut self) -> Box<dyn NameIterator + '_> {
        Box::new(DbNameIterator::new(&self.store))
    }

    fn batch_write(&mut self, mut coins: CoinsMap, best_block: Hash256, names: NameCache) -> bool {
        let mut batch = WriteBatch::new();
        let mut count = 0usize;
        let mut changed = 0usize;
        for (txid, entry) in coins.drain() {
            count += 1;
            if !entry.is_dirty() {
                continue;
            }
            changed += 1;
            if entry.coins.is_pruned() {
                batch.delete(Column::Coins, txid);
            } else {
                batch.put(Column::Coins, txid, entry.coins.encode());
            }
        }
        if best_block != NULL_HASH {
            batch.put(Column::Meta, META_BEST_BLOCK_KEY, best_block);
        }
        write_name_batch(&mut batch, &names);

        log_debug!("committing {changed} changed transactions (out of {count}) to coin database");
        match self.store.commit(&batch) {
            Ok(()) => true,
            Err(err) => {
                log_error!("chainstate commit failed: {err}");
                false
            }
        }
    }

    fn get_stats(&mut self) -> Option<CoinsStats> {
        let best_block = self.get_best_block();
        let mut stats = CoinsStats {
            best_block,
            ..Default::default()
        };
        let mut hasher = Sha256::new();
        hasher.update(best_block);

        let scan = self
            .store
            .scan_prefix(Column::Coins, &[], &mut |key, value| {
                let coins = Coins::decode(value)
                    .map_err(|err| StoreError::new(format!("corrupt coin record: {err}")))?;
                stats.transactions += 1;
                stats.serialized_size += (32 + value.len()) as u64;
                hasher.update(key);
                hasher.update(value);
                for output in coins.outputs.iter().flatten() {
                    stats.transaction_outputs += 1;
                    stats.total_amount += output.value;
                }
                Ok(())
            });
        if let Err(err) = scan {
            log_error!("chainstate stats scan failed: {err}");
            return None;
        }

        stats.hash_serialized = sha256(&hasher.finalize());
        Some(stats)
    }

    fn validate_name_db(&mut self) -> bool {
        // Read the interesting slices of the database into memory, then
        // cross-check them against each other.
        let mut name_heights_data: BTreeMap<Name, u32> = BTreeMap::new();
        let mut names_unexpired: BTreeSet<Name> = BTreeSet::new();
        let params = self.params.clone();
        // Expiration is checked at tip + 1, matching how the UTXO set is
        // cleared when names expire.
        let check_height = self.tip_height.saturating_add(1);

        let scan = self
            .store
            .scan_prefix(Column::Name, &[], &mut |key, value| {
                let data = NameData::from_bytes(value)
                    .map_err(|err| StoreError::new(format!("corrupt name record: {err}")))?;
                name_heights_data.insert(key.to_vec(), data.height);
                if !data.is_expired(&params, check_height) {
                    names_unexpired.insert(key.to_vec());
                }
                Ok(())
            });
        if let Err(err) = scan {
            log_error!("name db scan failed: {err}");
            return false;
        }

        let mut name_heights_index: BTreeMap<Name, u32> = BTreeMap::new();
        let mut index_ok = true;
        let scan = self
            .store
            .scan_prefix(Column::NameExpiry, &[], &mut |key, _| {
                let Some(entry) = ExpireEntry::from_key(key) else {
                    return Err(StoreError::new("corrupt expire index key"));
                };
                if name_heights_index
                    .insert(entry.name.clone(), entry.height)
                    .is_some()
                {
                    log_error!(
                        "name '{}' duplicated in expire index",
                        String::from_utf8_lossy(&entry.name)
                    );
                    index_ok = false;
                }
                Ok(())
            });
        if let Err(err) = scan {
            log_error!("expire index scan failed: {err}");
            return false;
        }
        if !index_ok {
            return false;
        }

        let mut names_with_history: BTreeSet<Name> = BTreeSet::new();
        let scan = self
            .store
            .scan_prefix(Column::NameHistory, &[], &mut |key, _| {
                names_with_history.insert(key.to_vec());
                Ok(())
            });
        if let Err(err) = scan {
            log_error!("name history scan failed: {err}");
            return false;
        }

        let mut names_in_utxo: BTreeSet<Name> = BTreeSet::new();
        let mut utxo_ok = true;
        let scan = self
            .store
            .scan_prefix(Column::Coins, &[], &mut |_, value| {
                let coins = Coins::decode(value)
                    .map_err(|err| StoreError::new(format!("corrupt coin record: {err}")))?;
                for output in coins.outputs.iter().flatten() {
                    let script = NameScript::parse(&output.script_pubkey);
                    if script.is_any_update() {
                        let name = script.op_name().expect("update carries a name");
                        if !names_in_utxo.insert(name.to_vec()) {
                            log_error!(
                                "name '{}' duplicated in UTXO set",
                                String::from_utf8_lossy(name)
                            );
                            utxo_ok = false;
                        }
                    }
                }
                Ok(())
            });
        if let Err(err) = scan {
            log_error!("UTXO scan failed: {err}");
            return false;
        }
        if !utxo_ok {
            return false;
        }

        if name_heights_index != name_heights_data {
            log_error!("expire index does not match the name database");
            return false;
        }

        for name in &names_unexpired {
            if !names_in_utxo.contains(name) {
                log_error!(
                    "name '{}' in name db but not in UTXO set",
                    String::from_utf8_lossy(name)
                );
                return false;
            }
        }
        for name in &names_in_utxo {
            if !names_unexpired.contains(name) {
                log_error!(
                    "name '{}' in UTXO set but not in name db",
                    String::from_utf8_lossy(name)
                );
                return false;
            }
        }

        if names::name_history_enabled() {
            for name in &names_with_history {
                if !name_heights_data.contains_key(name) {
                    log_error!(
                        "history entry for name '{}' not in name db",
                        String::from_utf8_lossy(name)
                    );
                    return false;
                }
            }
        } else if !names_with_history.is_empty() {
            log_error!("name history entries present but history is disabled");
            return false;
        }

        log_info!(
            "checked name database: {} unexpired names, {} total, {} with history",
            names_unexpired.len(),
            name_heights_data.len(),
            names_with_history.len()
        );
        true
    }
}

/// Snapshot iterator over the name column, in name order.
struct DbNameIterator {
    items: Vec<(Name, NameData)>,
    pos: usize,
}

impl DbNameIterator {
    fn new<S: ChainStore>(store: &S) -> Self {
        let mut items = Vec::new();
        let scan = store.scan_prefix(Column::Name, &[], &mut |key, value| {
            match NameData::from_bytes(value) {
                Ok(data) => items.push((key.to_vec(), data)),
                Err(err) => {
                    log_error!(
                        "corrupt name record '{}': {err}",
                        String::from_utf8_lossy(key)
                    );
                }
            }
            Ok(())
        });
        if let Err(err) = scan {
            log_error!("name db scan failed: {err}");
        }
        Self { items, pos: 0 }
    }
}

impl NameIterator for DbNameIterator {
    fn seek(&mut self, start: &[u8]) {
        self.pos = self
            .items
            .partition_point(|(name, _)| name.as_slice() < start);
    }

    fn next(&mut self) -> Option<(Name, NameData)> {
        let item = self.items.get(self.pos).cloned();
        self.pos += 1;
        item
    }
}
