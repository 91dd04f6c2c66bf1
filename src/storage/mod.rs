//! Ordered Key-Value Storage
//!
//! The spatial index never touches a backend directly; it talks to the
//! [`KvStore`] / [`Transaction`] contract defined here:
//!
//! - **error**: Error types
//! - **tuple**: Order-preserving key packing and subspaces
//! - **memory**: In-memory `BTreeMap` backend (tests, benchmarks)
//! - **sqlite**: SQLite B-tree backend (durable)
//!
//! # Contract
//!
//! ```text
//! transact(f):  BEGIN -> f(tx) -> Ok  => COMMIT   (all writes visible)
//!                              -> Err => ROLLBACK (no write visible)
//! ```
//!
//! Keys and values are raw bytes compared bytewise. Range reads take
//! [`KeySelector`]s so a caller can ask for "the last key at or before
//! X" without knowing which keys exist.

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod tuple;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use tuple::{Element, Subspace};

use std::ops::Bound;

/// One stored entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Locates an existing key relative to an arbitrary one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelector {
    FirstGreaterOrEqual(Vec<u8>),
    FirstGreaterThan(Vec<u8>),
    LastLessOrEqual(Vec<u8>),
    LastLessThan(Vec<u8>),
}

impl KeySelector {
    pub fn first_greater_or_equal(key: impl Into<Vec<u8>>) -> Self {
        KeySelector::FirstGreaterOrEqual(key.into())
    }

    pub fn first_greater_than(key: impl Into<Vec<u8>>) -> Self {
        KeySelector::FirstGreaterThan(key.into())
    }

    pub fn last_less_or_equal(key: impl Into<Vec<u8>>) -> Self {
        KeySelector::LastLessOrEqual(key.into())
    }

    pub fn last_less_than(key: impl Into<Vec<u8>>) -> Self {
        KeySelector::LastLessThan(key.into())
    }
}

/// Operations available inside one atomic unit of work
pub trait Transaction {
    fn get(&mut self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Resolve a selector to the existing key it designates
    fn get_key(&mut self, selector: &KeySelector) -> StorageResult<Option<Vec<u8>>>;

    /// Entries between two bounds in ascending key order
    fn scan(
        &mut self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<KeyValue>>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    fn delete(&mut self, key: &[u8]) -> StorageResult<()>;

    /// Delete every key in `[begin, end)`
    fn delete_range(&mut self, begin: &[u8], end: &[u8]) -> StorageResult<()>;

    /// Entries from the key `begin` resolves to, up to but excluding the
    /// key `end` resolves to
    fn get_range(
        &mut self,
        begin: &KeySelector,
        end: &KeySelector,
        limit: Option<usize>,
    ) -> StorageResult<Vec<KeyValue>> {
        let lower = match begin {
            KeySelector::FirstGreaterOrEqual(k) => Bound::Included(k.clone()),
            KeySelector::FirstGreaterThan(k) => Bound::Excluded(k.clone()),
            KeySelector::LastLessOrEqual(_) | KeySelector::LastLessThan(_) => {
                match self.get_key(begin)? {
                    Some(k) => Bound::Included(k),
                    None => Bound::Unbounded,
                }
            }
        };

        let upper = match end {
            KeySelector::FirstGreaterOrEqual(k) => Bound::Excluded(k.clone()),
            KeySelector::FirstGreaterThan(k) => Bound::Included(k.clone()),
            KeySelector::LastLessOrEqual(_) | KeySelector::LastLessThan(_) => {
                match self.get_key(end)? {
                    Some(k) => Bound::Excluded(k),
                    None => return Ok(Vec::new()),
                }
            }
        };

        self.scan(borrow_bound(&lower), borrow_bound(&upper), limit)
    }
}

/// A store that runs closures as atomic transactions
///
/// No retries happen here: a conflict is returned to the caller as
/// [`StorageError::Conflict`].
pub trait KvStore: Send + Sync {
    fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, E>,
        E: From<StorageError>;
}

impl<S: KvStore> KvStore for std::sync::Arc<S> {
    fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, E>,
        E: From<StorageError>,
    {
        (**self).transact(f)
    }
}

fn borrow_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// True when no key can satisfy both bounds
pub(crate) fn is_empty_range(lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u))
        | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
        _ => false,
    }
}
