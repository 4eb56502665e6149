//! Name database records and the staged name-change set.

use std::collections::{btree_map, BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use nmcd_consensus::ConsensusParams;
use nmcd_primitives::encoding::{ByteReader, ByteWriter, CodecError, Deserialize, Serialize};
use nmcd_primitives::outpoint::OutPoint;

pub type Name = Vec<u8>;

static NAME_HISTORY_ENABLED: AtomicBool = AtomicBool::new(false);

/// Turn per-name history stacks on or off. Set once at process init;
/// only unit tests rebind it afterwards.
pub fn set_name_history_enabled(enabled: bool) {
    NAME_HISTORY_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn name_history_enabled() -> bool {
    NAME_HISTORY_ENABLED.load(Ordering::Relaxed)
}

/// Current state of a registered name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NameData {
    pub value: Vec<u8>,
    /// Height of the last update; expiration counts from here.
    pub height: u32,
    /// The name output that last updated this name.
    pub prevout: OutPoint,
    /// Locking script that owns the name.
    pub address: Vec<u8>,
}

impl NameData {
    pub fn is_expired(&self, params: &ConsensusParams, height: u32) -> bool {
        let depth = params.name_expiration_depth(height) as u64;
        self.height as u64 + depth <= height as u64
    }
}

impl Serialize for NameData {
    fn serialize(&self, out: &mut Vec<u8>) {
        out.put_blob(&self.value);
        out.put_u32_le(self.height);
        self.prevout.serialize(out);
        out.put_blob(&self.address);
    }
}

impl Deserialize for NameData {
    fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let value = reader.take_blob()?;
        let height = reader.take_u32_le()?;
        let prevout = OutPoint::deserialize(reader)?;
        let address = reader.take_blob()?;
        Ok(Self {
            value,
            height,
            prevout,
            address,
        })
    }
}

/// Stack of overwritten states for one name, oldest first. Only maintained
/// while the history toggle is on.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NameHistory {
    entries: Vec<NameData>,
}

impl NameHistory {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[NameData] {
        &self.entries
    }

    pub fn push(&mut self, data: NameData) {
        self.entries.push(data);
    }

    /// Undo one update: the stack top must be exactly the state being
    /// restored, otherwise the undo data and the history diverged.
    pub fn pop(&mut self, expected: &NameData) {
        let top = self
            .entries
            .pop()
            .unwrap_or_else(|| panic!("popping from empty name history"));
        assert!(
            top == *expected,
            "name history top does not match the state being restored"
        );
    }
}

impl Serialize for NameHistory {
    fn serialize(&self, out: &mut Vec<u8>) {
        out.put_compact_size(self.entries.len() as u64);
        for entry in &self.entries {
            entry.serialize(out);
        }
    }
}

impl Deserialize for NameHistory {
    fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let len = reader.take_compact_size()? as usize;
        let mut entries = Vec::with_capacity(len);
        for _ in 0..len {
            entries.push(NameData::deserialize(reader)?);
        }
        Ok(Self { entries })
    }
}

/// Position of a name in the expiration index: names are grouped by the
/// height of their last update, which is what expiration processing
/// queries.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct ExpireEntry {
    pub height: u32,
    pub name: Name,
}

impl ExpireEntry {
    /// Storage key: big-endian height so lexicographic order matches
    /// numeric order, then the raw name.
    pub fn to_key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(4 + self.name.len());
        key.extend_from_slice(&self.height.to_be_bytes());
        key.extend_from_slice(&self.name);
        key
    }

    pub fn from_key(key: &[u8]) -> Option<Self> {
        if key.len() < 4 {
            return None;
        }
        let height = u32::from_be_bytes([key[0], key[1], key[2], key[3]]);
        Some(Self {
            height,
            name: key[4..].to_vec(),
        })
    }
}

/// Ordered iteration over names and their current data.
pub trait NameIterator {
    fn seek(&mut self, start: &[u8]);
    fn next(&mut self) -> Option<(Name, NameData)>;
}

/// Staged per-name changes relative to a backing view. Only differences
/// are held: updated entries, deletions, touched history stacks, and
/// expire-index deltas (`true` = add, `false` = remove).
#[derive(Clone, Debug, Default)]
pub struct NameCache {
    entries: BTreeMap<Name, NameData>,
    deleted: BTreeSet<Name>,
    history: BTreeMap<Name, NameHistory>,
    expire_index: BTreeMap<ExpireEntry, bool>,
}

impl NameCache {
    pub fn clear(&mut self) {
        self.entries.clear();
        self.deleted.clear();
        self.history.clear();
        self.expire_index.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
            && self.deleted.is_empty()
            && self.history.is_empty()
            && self.expire_index.is_empty()
    }

    pub fn get(&self, name: &[u8]) -> Option<&NameData> {
        self.entries.get(name)
    }

    pub fn is_deleted(&self, name: &[u8]) -> bool {
        self.deleted.contains(name)
    }

    pub fn set(&mut self, name: &[u8], data: NameData) {
        self.deleted.remove(name);
        self.entries.insert(name.to_vec(), data);
    }

    pub fn remove(&mut self, name: &[u8]) {
        self.entries.remove(name);
        self.deleted.insert(name.to_vec());
    }

    pub fn get_history(&self, name: &[u8]) -> Option<&NameHistory> {
        assert!(name_history_enabled(), "name history is disabled");
        self.history.get(name)
    }

    pub fn set_history(&mut self, name: &[u8], history: NameHistory) {
        assert!(name_history_enabled(), "name history is disabled");
        self.history.insert(name.to_vec(), history);
    }

    pub fn add_expire_index(&mut self, name: &[u8], height: u32) {
        let entry = ExpireEntry {
            height,
            name: name.to_vec(),
        };
        self.expire_index.insert(entry, true);
    }

    pub fn remove_expire_index(&mut self, name: &[u8], height: u32) {
        let entry = ExpireEntry {
            height,
            name: name.to_vec(),
        };
        self.expire_index.insert(entry, false);
    }

    /// Apply this cache's expire-index delta for one height onto a set read
    /// from the backing view.
    pub fn update_names_for_height(&self, height: u32, names: &mut BTreeSet<Name>) {
        let start = ExpireEntry {
            height,
            name: Vec::new(),
        };
        for (entry, add) in self.expire_index.range(start..) {
            if entry.height != height {
                break;
            }
            if *add {
                names.insert(entry.name.clone());
            } else {
                names.remove(&entry.name);
            }
        }
    }

    /// Fold a child cache's staged changes into this one. Set, delete and
    /// expire-index deltas combine associatively.
    pub fn apply(&mut self, other: NameCache) {
        for (name, data) in other.entries {
            self.set(&name, data);
        }
        for name in other.deleted {
            self.remove(&name);
        }
        for (name, history) in other.history {
            self.history.insert(name, history);
        }
        for (entry, add) in other.expire_index {
            self.expire_index.insert(entry, add);
        }
    }

    pub fn iterate<'a>(&'a self, base: Box<dyn NameIterator + 'a>) -> CacheNameIterator<'a> {
        CacheNameIterator::new(self, base)
    }

    pub fn iter_entries(&self) -> impl Iterator<Item = (&Name, &NameData)> {
        self.entries.iter()
    }

    pub fn iter_deleted(&self) -> impl Iterator<Item = &Name> {
        self.deleted.iter()
    }

    pub fn iter_history(&self) -> impl Iterator<Item = (&Name, &NameHistory)> {
        self.history.iter()
    }

    pub fn iter_expire_index(&self) -> impl Iterator<Item = (&ExpireEntry, bool)> {
        self.expire_index.iter().map(|(entry, add)| (entry, *add))
    }
}

/// Merges a backing iterator with the staged changes, in name order.
/// Staged entries override the backing view; deleted names are skipped.
pub struct CacheNameIterator<'a> {
    cache: &'a NameCache,
    base: Box<dyn NameIterator + 'a>,
    entry_range: btree_map::Range<'a, Name, NameData>,
    next_entry: Option<(&'a Name, &'a NameData)>,
    next_base: Option<(Name, NameData)>,
}

impl<'a> CacheNameIterator<'a> {
    fn new(cache: &'a NameCache, base: Box<dyn NameIterator + 'a>) -> Self {
        let mut iter = Self {
            cache,
            base,
            entry_range: cache.entries.range(Vec::new()..),
            next_entry: None,
            next_base: None,
        };
        iter.next_entry = iter.entry_range.next();
        iter.advance_base();
        iter
    }

    fn advance_base(&mut self) {
        loop {
            match self.base.next() {
                Some((name, data)) => {
                    if self.cache.deleted.contains(&name) {
                        continue;
                    }
                    self.next_base = Some((name, data));
                    return;
                }
                None => {
                    self.next_base = None;
                    return;
                }
            }
        }
    }
}

impl NameIterator for CacheNameIterator<'_> {
    fn seek(&mut self, start: &[u8]) {
        self.entry_range = self.cache.entries.range(start.to_vec()..);
        self.next_entry = self.entry_range.next();
        self.base.seek(start);
        self.advance_base();
    }

    fn next(&mut self) -> Option<(Name, NameData)> {
        let entry_key = self.next_entry.map(|(name, _)| name.as_slice());
        let base_key = self.next_base.as_ref().map(|(name, _)| name.as_slice());

        // Smaller key first; on a tie the staged entry wins and the stale
        // backing item is consumed alongside it.
        let take_entry = match (entry_key, base_key) {
            (Some(entry), Some(base)) => entry <= base,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };

        if take_entry {
            let (name, data) = self.next_entry.take().expect("peeked cache entry");
            let base_matches = self
                .next_base
                .as_ref()
                .is_some_and(|(base_name, _)| base_name == name);
            if base_matches {
                self.advance_base();
            }
            self.next_entry = self.entry_range.next();
            Some((name.clone(), data.clone()))
        } else {
            let item = self.next_base.take().expect("peeked base entry");
            self.advance_base();
            Some(item)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(height: u32, tag: u8) -> NameData {
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

    struct VecNameIterator {
        items: Vec<(Name, NameData)>,
        pos: usize,
    }

    impl VecNameIterator {
        fn new(mut items: Vec<(Name, NameData)>) -> Self {
            items.sort_by(|a, b| a.0.cmp(&b.0));
            Self { items, pos: 0 }
        }
    }

    impl NameIterator for VecNameIterator {
        fn seek(&mut self, start: &[u8]) {
            self.pos = self.items.partition_point(|(name, _)| name.as_slice() < start);
        }

        fn next(&mut self) -> Option<(Name, NameData)> {
            let item = self.items.get(self.pos).cloned();
            self.pos += 1;
            item
        }
    }

    #[test]
    fn name_data_codec_round_trip() {
        let original = data(42, 7);
        let decoded = NameData::from_bytes(&original.to_bytes()).expect("decode");
        assert_eq!(decoded, original);
    }

    #[test]
    fn history_codec_round_trip() {
        let mut history = NameHistory::default();
        history.push(data(1, 1));
        history.push(data(2, 2));
        let decoded = NameHistory::from_bytes(&history.to_bytes()).expect("decode");
        assert_eq!(decoded, history);
    }

    #[test]
    fn history_pop_verifies_top() {
        let mut history = NameHistory::default();
        history.push(data(1, 1));
        history.pop(&data(1, 1));
        assert!(history.is_empty());
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn history_pop_mismatch_is_fatal() {
        let mut history = NameHistory::default();
        history.push(data(1, 1));
        history.pop(&data(2, 2));
    }

    #[test]
    #[should_panic(expected = "empty name history")]
    fn history_pop_empty_is_fatal() {
        let mut history = NameHistory::default();
        history.pop(&data(1, 1));
    }

    #[test]
    fn expire_entry_orders_by_height_then_name() {
        let a = ExpireEntry {
            height: 5,
            name: b"zz".to_vec(),
        };
        let b = ExpireEntry {
            height: 6,
            name: b"aa".to_vec(),
        };
        assert!(a < b);

        let c = ExpireEntry {
            height: 5,
            name: b"za".to_vec(),
        };
        assert!(c < a);
    }

    #[test]
    fn expire_entry_key_round_trip() {
        let entry = ExpireEntry {
            height: 0x0102_0304,
            name: b"d/name".to_vec(),
        };
        let key = entry.to_key();
        assert_eq!(&key[..4], &[1, 2, 3, 4]);
        assert_eq!(ExpireEntry::from_key(&key), Some(entry));
        assert_eq!(ExpireEntry::from_key(&[0, 0]), None);
    }

    #[test]
    fn set_after_delete_revives_name() {
        let mut cache = NameCache::default();
        cache.remove(b"d/x");
        assert!(cache.is_deleted(b"d/x"));
        cache.set(b"d/x", data(9, 9));
        assert!(!cache.is_deleted(b"d/x"));
        assert_eq!(cache.get(b"d/x"), Some(&data(9, 9)));
    }

    #[test]
    fn update_names_for_height_applies_delta() {
        let mut cache = NameCache::default();
        cache.add_expire_index(b"d/new", 100);
        cache.remove_expire_index(b"d/moved", 100);
        cache.add_expire_index(b"d/other", 101);

        let mut names: BTreeSet<Name> = [b"d/moved".to_vec(), b"d/kept".to_vec()].into();
        cache.update_names_for_height(100, &mut names);
        assert_eq!(
            names,
            [b"d/kept".to_vec(), b"d/new".to_vec()].into()
        );
    }

    #[test]
    fn apply_is_associative() {
        let base = || {
            let mut cache = NameCache::default();
            cache.set(b"d/a", data(1, 1));
            cache.remove(b"d/b");
            cache.add_expire_index(b"d/a", 1);
            cache
        };

        let mut first = NameCache::default();
        first.set(b"d/b", data(2, 2));
        first.remove(b"d/a");
        first.remove_expire_index(b"d/a", 1);

        let mut second = NameCache::default();
        second.set(b"d/a", data(3, 3));
        second.add_expire_index(b"d/a", 3);

        // (base + first) + second
        let mut left = base();
        left.apply(first.clone());
        left.apply(second.clone());

        // base + (first + second)
        let mut merged = first;
        merged.apply(second);
        let mut right = base();
        right.apply(merged);

        assert_eq!(left.get(b"d/a"), right.get(b"d/a"));
        assert_eq!(left.get(b"d/b"), right.get(b"d/b"));
        assert_eq!(left.is_deleted(b"d/a"), right.is_deleted(b"d/a"));
        assert_eq!(left.is_deleted(b"d/b"), right.is_deleted(b"d/b"));
        let left_index: Vec<_> = left.iter_expire_index().map(|(e, a)| (e.clone(), a)).collect();
        let right_index: Vec<_> =
            right.iter_expire_index().map(|(e, a)| (e.clone(), a)).collect();
        assert_eq!(left_index, right_index);
    }

    #[test]
    fn iterator_merges_in_name_order() {
        let mut cache = NameCache::default();
        cache.set(b"d/b", data(2, 2));
        cache.set(b"d/d", data(4, 4));
        cache.remove(b"d/c");

        let base = VecNameIterator::new(vec![
            (b"d/a".to_vec(), data(1, 1)),
            (b"d/b".to_vec(), data(99, 99)), // overridden by the cache
            (b"d/c".to_vec(), data(3, 3)),   // deleted in the cache
            (b"d/e".to_vec(), data(5, 5)),
        ]);

        let mut iter = cache.iterate(Box::new(base));
        let mut seen = Vec::new();
        while let Some((name, data)) = iter.next() {
            seen.push((name, data.height));
        }
        assert_eq!(
            seen,
            vec![
                (b"d/a".to_vec(), 1),
                (b"d/b".to_vec(), 2),
                (b"d/d".to_vec(), 4),
                (b"d/e".to_vec(), 5),
            ]
        );
    }

    #[test]
    fn iterator_seek_restarts_midway() {
        let mut cache = NameCache::default();
        cache.set(b"d/b", data(2, 2));

        let base = VecNameIterator::new(vec![
            (b"d/a".to_vec(), data(1, 1)),
            (b"d/c".to_vec(), data(3, 3)),
        ]);

        let mut iter = cache.iterate(Box::new(base));
        iter.seek(b"d/b");
        assert_eq!(iter.next().map(|(n, _)| n), Some(b"d/b".to_vec()));
        assert_eq!(iter.next().map(|(n, _)| n), Some(b"d/c".to_vec()));
        assert_eq!(iter.next(), None);
    }
}
