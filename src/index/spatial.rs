//! Spatial Index Store - key ↔ location mapping over an ordered store
//!
//! Every public operation runs in exactly one store transaction. The
//! `*_in` variants take an open [`Transaction`] instead, so a caller can
//! fold index updates into a larger unit of work of its own.
//!
//! # Performance
//! - set/get/remove: O(1) store round trips
//! - rectangle query: one range read per batch plus one per jump, and
//!   each jump costs O(bits) geometry steps regardless of the gap size

use crate::curve::{decode, encode, Point, Rect, ZCurve};
use crate::index::{IndexConfig, IndexError, IndexResult, LocatedKey, QueryStats};
use crate::storage::{Element, KeySelector, KvStore, StorageError, Subspace, Transaction};
use std::ops::Bound;

/// Two-dimensional index of keys by Z-order curve position
#[derive(Debug)]
pub struct SpatialIndex<S> {
    store: S,
    curve: ZCurve,
    config: IndexConfig,
    /// `(z, key)` entries
    z_key: Subspace,
    /// `(key, z)` entries
    key_z: Subspace,
}

impl<S: KvStore> SpatialIndex<S> {
    pub fn new(store: S, config: IndexConfig) -> IndexResult<Self> {
        config.validate()?;
        let curve = ZCurve::new(config.bits).map_err(|e| IndexError::Config(e.to_string()))?;
        let space = Subspace::named(&config.prefix);

        Ok(Self {
            store,
            curve,
            z_key: space.child(&[config.z_discriminator]),
            key_z: space.child(&[config.key_discriminator]),
            config,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn curve(&self) -> ZCurve {
        self.curve
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    // ==================== Transactional Operations ====================

    /// Place `key` at `point`, replacing any previous location
    pub fn set_location(&self, key: &[u8], point: Point) -> IndexResult<()> {
        self.validate(point)?;
        self.store
            .transact(|tx| self.set_location_in(tx, key, point))
    }

    /// Current location of `key`, or `None` if it has none
    pub fn get_location(&self, key: &[u8]) -> IndexResult<Option<Point>> {
        self.store.transact(|tx| self.get_location_in(tx, key))
    }

    /// Drop `key`'s location; returns whether it had one
    pub fn remove_location(&self, key: &[u8]) -> IndexResult<bool> {
        self.store.transact(|tx| self.remove_location_in(tx, key))
    }

    /// Remove every entry this index owns
    pub fn clear(&self) -> IndexResult<()> {
        self.store.transact(|tx| self.clear_in(tx))?;
        tracing::info!(prefix = %self.config.prefix, "Cleared spatial index");
        Ok(())
    }

    /// Number of keys with a location
    pub fn len(&self) -> IndexResult<u64> {
        self.store.transact(|tx| self.len_in(tx))
    }

    pub fn is_empty(&self) -> IndexResult<bool> {
        Ok(self.len()? == 0)
    }

    /// All keys whose location lies inside `rect`, in ascending Z order
    pub fn get_in_rectangle(&self, rect: &Rect) -> IndexResult<Vec<LocatedKey>> {
        Ok(self.get_in_rectangle_with_stats(rect)?.0)
    }

    /// [`Self::get_in_rectangle`] plus a count of the work it took
    pub fn get_in_rectangle_with_stats(
        &self,
        rect: &Rect,
    ) -> IndexResult<(Vec<LocatedKey>, QueryStats)> {
        self.store
            .transact(|tx| self.get_in_rectangle_in(tx, rect))
    }

    /// Lowest and highest Z-index a query over `rect` can visit
    pub fn z_range(&self, rect: &Rect) -> Option<(u64, u64)> {
        self.curve.z_range(rect)
    }

    // ==================== Operations on an open transaction ====================

    pub fn set_location_in(
        &self,
        tx: &mut dyn Transaction,
        key: &[u8],
        point: Point,
    ) -> IndexResult<()> {
        self.validate(point)?;
        let z = encode(point);

        for old in self.existing_z(tx, key)? {
            if old != z {
                tx.delete(&self.key_entry(key, old))?;
                tx.delete(&self.z_entry(old, key))?;
                tracing::debug!(old_z = old, new_z = z, %point, "Relocated key");
            }
        }

        tx.set(&self.z_entry(z, key), b"")?;
        tx.set(&self.key_entry(key, z), b"")?;
        Ok(())
    }

    pub fn get_location_in(
        &self,
        tx: &mut dyn Transaction,
        key: &[u8],
    ) -> IndexResult<Option<Point>> {
        Ok(self.existing_z(tx, key)?.first().map(|&z| decode(z)))
    }

    pub fn remove_location_in(&self, tx: &mut dyn Transaction, key: &[u8]) -> IndexResult<bool> {
        let existing = self.existing_z(tx, key)?;
        for &z in &existing {
            tx.delete(&self.key_entry(key, z))?;
            tx.delete(&self.z_entry(z, key))?;
        }
        Ok(!existing.is_empty())
    }

    pub fn clear_in(&self, tx: &mut dyn Transaction) -> IndexResult<()> {
        for space in [&self.z_key, &self.key_z] {
            let (begin, end) = space.range();
            tx.delete_range(&begin, &end)?;
        }
        Ok(())
    }

    pub fn len_in(&self, tx: &mut dyn Transaction) -> IndexResult<u64> {
        let batch_size = self.config.scan_batch_size;
        let (first, last) = self.key_z.range();
        let end = KeySelector::first_greater_or_equal(last);
        let mut begin = KeySelector::first_greater_or_equal(first);
        let mut count = 0u64;

        loop {
            let batch = tx.get_range(&begin, &end, Some(batch_size))?;
            count += batch.len() as u64;
            match batch.last() {
                Some(entry) if batch.len() == batch_size => {
                    begin = KeySelector::first_greater_than(entry.key.clone());
                }
                _ => return Ok(count),
            }
        }
    }

    pub fn get_in_rectangle_in(
        &self,
        tx: &mut dyn Transaction,
        rect: &Rect,
    ) -> IndexResult<(Vec<LocatedKey>, QueryStats)> {
        let mut results = Vec::new();
        let mut stats = QueryStats::default();

        let Some((_, last_z)) = self.z_range(rect) else {
            return Ok((results, stats));
        };
        let Some(first) = self.curve.next_intersecting(rect, 0)? else {
            return Ok((results, stats));
        };

        // No entry past the far corner's Z-index can be inside
        let batch_size = self.config.scan_batch_size;
        let end = match last_z.checked_add(1) {
            Some(past) => KeySelector::first_greater_or_equal(self.z_seek(past)),
            None => KeySelector::first_greater_or_equal(self.z_key.range().1),
        };
        let mut begin = KeySelector::first_greater_or_equal(self.z_seek(first));

        'scan: loop {
            let batch = tx.get_range(&begin, &end, Some(batch_size))?;
            stats.scans += 1;

            let Some(last) = batch.last() else {
                break;
            };
            let exhausted = batch.len() < batch_size;
            begin = KeySelector::first_greater_than(last.key.clone());

            for entry in &batch {
                stats.examined += 1;
                let (z, key) = self.unpack_z_entry(&entry.key)?;
                let point = decode(z);

                if rect.contains_point(point) {
                    results.push(LocatedKey { key, point, z });
                    continue;
                }

                match self.curve.next_intersecting(rect, z)? {
                    Some(next) => {
                        stats.jumps += 1;
                        begin = KeySelector::first_greater_or_equal(self.z_seek(next));
                        continue 'scan;
                    }
                    None => break 'scan,
                }
            }

            if exhausted {
                break;
            }
        }

        tracing::debug!(
            %rect,
            hits = results.len(),
            scans = stats.scans,
            examined = stats.examined,
            jumps = stats.jumps,
            "Rectangle query complete"
        );
        Ok((results, stats))
    }

    // ==================== Key layout ====================

    fn validate(&self, point: Point) -> IndexResult<()> {
        self.curve
            .check(point)
            .map_err(|e| IndexError::InvalidArgument(e.to_string()))
    }

    fn z_entry(&self, z: u64, key: &[u8]) -> Vec<u8> {
        self.z_key.pack(&[Element::Int(z), Element::from(key)])
    }

    fn key_entry(&self, key: &[u8], z: u64) -> Vec<u8> {
        self.key_z.pack(&[Element::from(key), Element::Int(z)])
    }

    /// Sorts before every `(z, key)` entry with this `z`
    fn z_seek(&self, z: u64) -> Vec<u8> {
        self.z_key.pack(&[Element::Int(z)])
    }

    fn existing_z(&self, tx: &mut dyn Transaction, key: &[u8]) -> IndexResult<Vec<u64>> {
        let (begin, end) = self.key_z.range_of(&[Element::from(key)]);
        let entries = tx.scan(
            Bound::Included(begin.as_slice()),
            Bound::Excluded(end.as_slice()),
            None,
        )?;

        entries
            .iter()
            .map(|entry| match self.key_z.unpack(&entry.key)?.as_slice() {
                [Element::Bytes(_), Element::Int(z)] => Ok(*z),
                other => Err(corrupt("key -> z", other)),
            })
            .collect()
    }

    fn unpack_z_entry(&self, raw: &[u8]) -> IndexResult<(u64, Vec<u8>)> {
        match self.z_key.unpack(raw)?.as_slice() {
            [Element::Int(z), Element::Bytes(key)] => Ok((*z, key.clone())),
            other => Err(corrupt("z -> key", other)),
        }
    }
}

fn corrupt(kind: &str, elements: &[Element]) -> IndexError {
    IndexError::Storage(StorageError::Corruption(format!(
        "malformed {} entry: {:?}",
        kind, elements
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, SqliteStore, StorageResult};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn memory_index(bits: u32) -> SpatialIndex<MemoryStore> {
        SpatialIndex::new(MemoryStore::new(), IndexConfig::default().bits(bits)).unwrap()
    }

    fn keys_of(found: &[LocatedKey]) -> BTreeSet<Vec<u8>> {
        found.iter().map(|f| f.key.clone()).collect()
    }

    fn place_sample<S: KvStore>(index: &SpatialIndex<S>) {
        for (key, x, y) in [
            ("a", 3, 2),
            ("b", 1, 4),
            ("c", 5, 3),
            ("d", 2, 3),
            ("e", 0, 0),
        ] {
            index.set_location(key.as_bytes(), Point::new(x, y)).unwrap();
        }
    }

    #[test]
    fn test_sample_rectangle() {
        let index = memory_index(8);
        assert_eq!(index.get_location(b"d").unwrap(), None);
        place_sample(&index);
        assert_eq!(index.get_location(b"d").unwrap(), Some(Point::new(2, 3)));

        let found = index.get_in_rectangle(&Rect::new((1, 1), (5, 5))).unwrap();
        let expected: BTreeSet<Vec<u8>> =
            ["a", "b", "d"].iter().map(|k| k.as_bytes().to_vec()).collect();
        // c sits at x = 5, on the exclusive edge
        assert_eq!(keys_of(&found), expected);
        assert!(found.windows(2).all(|w| w[0].z < w[1].z));

        let wider = index.get_in_rectangle(&Rect::new((1, 1), (6, 5))).unwrap();
        assert_eq!(wider.len(), 4);
        assert!(!keys_of(&wider).contains(b"e".as_slice()));
    }

    #[test]
    fn test_sample_rectangle_sqlite() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        let index = SpatialIndex::new(store, IndexConfig::default()).unwrap();
        place_sample(&index);

        let found = index.get_in_rectangle(&Rect::new((1, 1), (6, 5))).unwrap();
        let expected: BTreeSet<Vec<u8>> =
            ["a", "b", "c", "d"].iter().map(|k| k.as_bytes().to_vec()).collect();
        assert_eq!(keys_of(&found), expected);
        assert_eq!(index.len().unwrap(), 5);
    }

    #[test]
    fn test_relocation_removes_old_entries() {
        let index = memory_index(8);
        index.set_location(b"k", Point::new(1, 1)).unwrap();
        index.set_location(b"k", Point::new(6, 6)).unwrap();

        assert_eq!(index.get_location(b"k").unwrap(), Some(Point::new(6, 6)));
        assert!(index.get_in_rectangle(&Rect::new((1, 1), (2, 2))).unwrap().is_empty());
        assert_eq!(index.get_in_rectangle(&Rect::new((6, 6), (7, 7))).unwrap().len(), 1);
        // One z -> key and one key -> z entry
        assert_eq!(index.store().len().unwrap(), 2);

        // Same location again is a harmless overwrite
        index.set_location(b"k", Point::new(6, 6)).unwrap();
        assert_eq!(index.store().len().unwrap(), 2);
    }

    #[test]
    fn test_out_of_domain_rejected_without_mutation() {
        let index = memory_index(4);
        index.set_location(b"k", Point::new(3, 3)).unwrap();

        let err = index.set_location(b"k", Point::new(16, 0)).unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument(_)));
        assert_eq!(index.get_location(b"k").unwrap(), Some(Point::new(3, 3)));
    }

    #[test]
    fn test_degenerate_rectangles_are_empty() {
        let index = memory_index(8);
        place_sample(&index);
        assert!(index.get_in_rectangle(&Rect::new((0, 0), (0, 8))).unwrap().is_empty());
        assert!(index.get_in_rectangle(&Rect::new((0, 0), (8, 0))).unwrap().is_empty());
        assert!(index.get_in_rectangle(&Rect::new((5, 5), (1, 1))).unwrap().is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let index = memory_index(8);
        place_sample(&index);

        assert!(index.remove_location(b"a").unwrap());
        assert!(!index.remove_location(b"a").unwrap());
        assert_eq!(index.get_location(b"a").unwrap(), None);
        assert_eq!(index.len().unwrap(), 4);

        index.clear().unwrap();
        assert!(index.is_empty().unwrap());
        assert!(index.store().is_empty().unwrap());
        assert!(index.get_in_rectangle(&Rect::new((0, 0), (8, 8))).unwrap().is_empty());
    }

    #[test]
    fn test_clear_leaves_other_indexes_alone() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let first = SpatialIndex::new(store.clone(), IndexConfig::new("first")).unwrap();
        let second = SpatialIndex::new(store.clone(), IndexConfig::new("second")).unwrap();

        first.set_location(b"k", Point::new(1, 1)).unwrap();
        second.set_location(b"k", Point::new(2, 2)).unwrap();
        first.clear().unwrap();

        assert_eq!(first.get_location(b"k").unwrap(), None);
        assert_eq!(second.get_location(b"k").unwrap(), Some(Point::new(2, 2)));
    }

    #[test]
    fn test_keys_with_shared_prefixes_and_nul_bytes() {
        let index = memory_index(8);
        index.set_location(b"a", Point::new(1, 1)).unwrap();
        index.set_location(b"ab", Point::new(2, 2)).unwrap();
        index.set_location(b"a\x00", Point::new(3, 3)).unwrap();

        assert_eq!(index.get_location(b"a").unwrap(), Some(Point::new(1, 1)));
        assert_eq!(index.get_location(b"ab").unwrap(), Some(Point::new(2, 2)));
        assert_eq!(index.get_location(b"a\x00").unwrap(), Some(Point::new(3, 3)));

        index.set_location(b"a", Point::new(4, 4)).unwrap();
        assert_eq!(index.get_location(b"ab").unwrap(), Some(Point::new(2, 2)));
        assert_eq!(index.len().unwrap(), 3);
    }

    #[test]
    fn test_failed_transaction_leaves_no_half_entries() {
        let index = memory_index(8);
        index.set_location(b"k", Point::new(1, 1)).unwrap();

        let result = index.store().transact(|tx| -> IndexResult<()> {
            index.set_location_in(tx, b"k", Point::new(5, 5))?;
            index.set_location_in(tx, b"other", Point::new(2, 2))?;
            Err(IndexError::Storage(StorageError::Conflict("forced".to_string())))
        });
        assert!(result.is_err());

        assert_eq!(index.get_location(b"k").unwrap(), Some(Point::new(1, 1)));
        assert_eq!(index.get_location(b"other").unwrap(), None);
        assert_eq!(index.store().len().unwrap(), 2);
    }

    #[test]
    fn test_random_points_match_brute_force() {
        let mut rng = StdRng::seed_from_u64(1234);
        for batch_size in [1, 3, 256] {
            let index = SpatialIndex::new(
                MemoryStore::new(),
                IndexConfig::default().bits(6).scan_batch_size(batch_size),
            )
            .unwrap();

            let mut placed = std::collections::HashMap::new();
            for i in 0..300u32 {
                let key = format!("k{}", i % 200).into_bytes();
                let p = Point::new(rng.random_range(0..64), rng.random_range(0..64));
                index.set_location(&key, p).unwrap();
                placed.insert(key, p);
            }

            for _ in 0..50 {
                // Up to 80 so some rectangles reach past the 64-wide domain
                let (a, b) = (rng.random_range(0..=80u64), rng.random_range(0..=80u64));
                let (c, d) = (rng.random_range(0..=80u64), rng.random_range(0..=80u64));
                let rect = Rect::new((a.min(b), c.min(d)), (a.max(b), c.max(d)));

                let found = index.get_in_rectangle(&rect).unwrap();
                let expected: BTreeSet<Vec<u8>> = placed
                    .iter()
                    .filter(|(_, p)| rect.contains_point(**p))
                    .map(|(k, _)| k.clone())
                    .collect();

                assert_eq!(found.len(), expected.len(), "duplicates for {rect}");
                assert_eq!(keys_of(&found), expected, "rect {rect}");
                for hit in &found {
                    assert_eq!(placed[&hit.key], hit.point);
                }
            }
        }
    }

    #[test]
    fn test_query_skips_dead_regions() {
        let index = memory_index(16);
        // Dense rows outside the query, before and after it in Z order
        for x in 0..200u32 {
            index
                .set_location(format!("low{x}").as_bytes(), Point::new(x, 1000))
                .unwrap();
            index
                .set_location(format!("high{x}").as_bytes(), Point::new(x, 60000))
                .unwrap();
        }
        index.set_location(b"target", Point::new(5000, 5000)).unwrap();

        let (found, stats) = index
            .get_in_rectangle_with_stats(&Rect::new((4990, 4990), (5010, 5010)))
            .unwrap();
        assert_eq!(keys_of(&found), BTreeSet::from([b"target".to_vec()]));
        assert!(stats.examined < 10, "examined {} entries", stats.examined);
    }

    #[test]
    fn test_scan_stops_at_far_corner() {
        let index = memory_index(16);
        index.set_location(b"target", Point::new(5, 5)).unwrap();
        for x in 0..50u32 {
            index
                .set_location(format!("after{x}").as_bytes(), Point::new(x, 40000))
                .unwrap();
        }

        let rect = Rect::new((0, 0), (10, 10));
        assert_eq!(
            index.z_range(&rect),
            Some((0, crate::curve::encode(Point::new(9, 9))))
        );

        let (found, stats) = index.get_in_rectangle_with_stats(&rect).unwrap();
        assert_eq!(keys_of(&found), BTreeSet::from([b"target".to_vec()]));
        assert_eq!(stats.examined, 1);
        assert_eq!(stats.jumps, 0);
    }

    #[test]
    fn test_far_corner_of_full_domain() {
        let index = SpatialIndex::new(MemoryStore::new(), IndexConfig::default()).unwrap();
        let far = u64::from(u32::MAX);
        index.set_location(b"corner", Point::new(u32::MAX, u32::MAX)).unwrap();
        index.set_location(b"near", Point::new(u32::MAX - 1, u32::MAX)).unwrap();

        // Extends past the domain; clipped to it
        let rect = Rect::new((far - 1, far - 1), (far + 10, far + 10));
        assert_eq!(index.z_range(&rect).map(|r| r.1), Some(u64::MAX));
        let found = index.get_in_rectangle(&rect).unwrap();
        assert_eq!(keys_of(&found).len(), 2);
        assert_eq!(found.last().map(|f| f.z), Some(u64::MAX));
    }

    #[test]
    fn test_len_counts_across_batches() {
        let index = SpatialIndex::new(
            MemoryStore::new(),
            IndexConfig::new("counted").bits(8).scan_batch_size(2),
        )
        .unwrap();
        assert_eq!(index.config().prefix, "counted");
        assert_eq!(index.curve().bits(), 8);
        assert_eq!(index.len().unwrap(), 0);

        for i in 0..4u32 {
            index.set_location(format!("k{i}").as_bytes(), Point::new(i, i)).unwrap();
        }
        assert_eq!(index.len().unwrap(), 4);

        index.set_location(b"k4", Point::new(9, 9)).unwrap();
        assert_eq!(index.len().unwrap(), 5);

        // Relocation does not change the count
        index.set_location(b"k0", Point::new(7, 1)).unwrap();
        assert_eq!(index.len().unwrap(), 5);
    }

    #[test]
    fn test_jumps_are_counted() {
        let index = SpatialIndex::new(
            MemoryStore::new(),
            IndexConfig::default().bits(4).scan_batch_size(2),
        )
        .unwrap();
        // Inside, outside, inside along the curve
        index.set_location(b"in1", Point::new(1, 1)).unwrap();
        index.set_location(b"out", Point::new(2, 0)).unwrap();
        index.set_location(b"in2", Point::new(2, 1)).unwrap();

        let (found, stats) = index
            .get_in_rectangle_with_stats(&Rect::new((0, 1), (4, 2)))
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(stats.jumps, 1);
        assert!(stats.scans >= 2);
    }

    #[test]
    fn test_corrupt_entry_surfaces() {
        let index = memory_index(8);
        let bogus = index.z_key.pack(&[Element::Int(5), Element::Int(7)]);
        index
            .store()
            .transact(|tx| -> StorageResult<()> { tx.set(&bogus, b"") })
            .unwrap();

        let err = index.get_in_rectangle(&Rect::new((0, 0), (8, 8))).unwrap_err();
        assert!(matches!(err, IndexError::Storage(StorageError::Corruption(_))));
    }
}
