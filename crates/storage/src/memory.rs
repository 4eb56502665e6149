use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::{BatchOp, ChainStore, Column, StoreError, WriteBatch};

type ColumnMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// Ordered in-memory backend, one map per column; the reference store for
/// tests.
#[derive(Default)]
pub struct MemoryStore {
    columns: RwLock<[ColumnMap; Column::COUNT]>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChainStore for MemoryStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let columns = self.columns.read().expect("memory store lock");
        Ok(columns[column.index()].get(key).cloned())
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut columns = self.columns.write().expect("memory store lock");
        columns[column.index()].insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StoreError> {
        let mut columns = self.columns.write().expect("memory store lock");
        columns[column.index()].remove(key);
        Ok(())
    }

    fn scan_prefix(
        &self,
        column: Column,
        prefix: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let columns = self.columns.read().expect("memory store lock");
        for (key, value) in columns[column.index()].range(prefix.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            visit(key, value)?;
        }
        Ok(())
    }

    fn commit(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        let mut columns = self.columns.write().expect("memory store lock");
        for op in batch.ops() {
            match op {
                BatchOp::Put { column, key, value } => {
                    columns[column.index()].insert(key.to_vec(), value.to_vec());
                }
                BatchOp::Delete { column, key } => {
                    columns[column.index()].remove(key.as_slice());
                }
            }
        }
        Ok(())
    }
}
