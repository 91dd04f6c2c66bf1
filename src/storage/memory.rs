//! In-memory ordered store
//!
//! A `BTreeMap` behind a mutex. Transactions run one at a time, which
//! makes them trivially serializable; writes go straight to the map and
//! an undo log puts them back if the closure fails.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::{is_empty_range, KeySelector, KeyValue, KvStore, Transaction};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Mutex;

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// Volatile ordered key-value store
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Map>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored
    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.data.lock()?.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl KvStore for MemoryStore {
    fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut guard = self.data.lock().map_err(StorageError::from)?;
        let mut tx = MemoryTransaction {
            data: &mut *guard,
            undo: Vec::new(),
        };

        match f(&mut tx) {
            Ok(value) => Ok(value),
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }
}

struct MemoryTransaction<'a> {
    data: &'a mut Map,
    /// Prior value of every key touched, oldest first
    undo: Vec<(Vec<u8>, Option<Vec<u8>>)>,
}

impl MemoryTransaction<'_> {
    fn rollback(self) {
        for (key, previous) in self.undo.into_iter().rev() {
            match previous {
                Some(value) => {
                    self.data.insert(key, value);
                }
                None => {
                    self.data.remove(&key);
                }
            }
        }
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn get(&mut self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn get_key(&mut self, selector: &KeySelector) -> StorageResult<Option<Vec<u8>>> {
        let found = match selector {
            KeySelector::FirstGreaterOrEqual(k) => self
                .data
                .range::<[u8], _>((Bound::Included(k.as_slice()), Bound::Unbounded))
                .next(),
            KeySelector::FirstGreaterThan(k) => self
                .data
                .range::<[u8], _>((Bound::Excluded(k.as_slice()), Bound::Unbounded))
                .next(),
            KeySelector::LastLessOrEqual(k) => self
                .data
                .range::<[u8], _>((Bound::Unbounded, Bound::Included(k.as_slice())))
                .next_back(),
            KeySelector::LastLessThan(k) => self
                .data
                .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(k.as_slice())))
                .next_back(),
        };
        Ok(found.map(|(k, _)| k.clone()))
    }

    fn scan(
        &mut self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<KeyValue>> {
        if is_empty_range(lower, upper) {
            return Ok(Vec::new());
        }

        Ok(self
            .data
            .range::<[u8], _>((lower, upper))
            .take(limit.unwrap_or(usize::MAX))
            .map(|(k, v)| KeyValue {
                key: k.clone(),
                value: v.clone(),
            })
            .collect())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let previous = self.data.insert(key.to_vec(), value.to_vec());
        self.undo.push((key.to_vec(), previous));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StorageResult<()> {
        if let Some(previous) = self.data.remove(key) {
            self.undo.push((key.to_vec(), Some(previous)));
        }
        Ok(())
    }

    fn delete_range(&mut self, begin: &[u8], end: &[u8]) -> StorageResult<()> {
        if begin >= end {
            return Ok(());
        }

        let doomed: Vec<Vec<u8>> = self
            .data
            .range::<[u8], _>((Bound::Included(begin), Bound::Excluded(end)))
            .map(|(k, _)| k.clone())
            .collect();

        for key in doomed {
            if let Some(previous) = self.data.remove(&key) {
                self.undo.push((key, Some(previous)));
            }
        }
        Ok(())
    }
}
