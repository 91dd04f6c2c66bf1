//! Spatial Index
//!
//! Associates opaque byte-string keys with grid points and finds every
//! key inside a rectangle without scanning the whole key space.
//!
//! Two mappings are kept in the store, always written together:
//!
//! ```text
//! prefix Z (z, key) -> ""     ordered by Z-index, drives range queries
//! prefix K (key, z) -> ""     point lookup / relocation by key
//! ```
//!
//! # Query
//!
//! ```text
//! rect (1,1)-(5,5)
//!    ↓
//! next_intersecting(rect, 0) = z0
//!    ↓
//! scan Z from z0 ──► inside?  yes → emit, keep scanning
//!                     no  → next_intersecting(rect, z) → rescan from there
//! ```

mod error;
mod spatial;

pub use error::{IndexError, IndexResult};
pub use spatial::SpatialIndex;

use crate::config::IndexSettings;
use crate::curve::{Point, ZCurve, MAX_BITS};

/// Runtime configuration of one index instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Namespace every key of this index lives under
    pub prefix: String,
    /// Coordinate bit-width; points must satisfy `x, y < 2^bits`
    pub bits: u32,
    /// Byte tagging `z -> key` entries
    pub z_discriminator: u8,
    /// Byte tagging `key -> z` entries
    pub key_discriminator: u8,
    /// Entries fetched per range-scan round trip
    pub scan_batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            prefix: "s_index".to_string(),
            bits: MAX_BITS,
            z_discriminator: b'Z',
            key_discriminator: b'K',
            scan_batch_size: 256,
        }
    }
}

impl IndexConfig {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Builder method: set the coordinate bit-width
    pub fn bits(mut self, bits: u32) -> Self {
        self.bits = bits;
        self
    }

    /// Builder method: set the range-scan batch size
    pub fn scan_batch_size(mut self, size: usize) -> Self {
        self.scan_batch_size = size;
        self
    }

    /// Build from the `[index]` section of a config file
    pub fn from_settings(settings: &IndexSettings) -> IndexResult<Self> {
        let config = Self {
            prefix: settings.prefix.clone(),
            bits: settings.bits,
            z_discriminator: single_byte("z_discriminator", &settings.z_discriminator)?,
            key_discriminator: single_byte("key_discriminator", &settings.key_discriminator)?,
            scan_batch_size: settings.scan_batch_size,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IndexResult<()> {
        ZCurve::new(self.bits).map_err(|e| IndexError::Config(e.to_string()))?;

        if self.z_discriminator == self.key_discriminator {
            return Err(IndexError::Config(format!(
                "z and key discriminators must differ (both 0x{:02X})",
                self.z_discriminator
            )));
        }
        if self.scan_batch_size == 0 {
            return Err(IndexError::Config(
                "scan_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn single_byte(field: &str, value: &str) -> IndexResult<u8> {
    match value.as_bytes() {
        [b] => Ok(*b),
        _ => Err(IndexError::Config(format!(
            "{} must be exactly one byte, got {:?}",
            field, value
        ))),
    }
}

/// A key found by a rectangle query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedKey {
    pub key: Vec<u8>,
    pub point: Point,
    /// Z-index of `point`; query results ascend by this
    pub z: u64,
}

/// Work done by one rectangle query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Range reads issued against the store
    pub scans: u64,
    /// Entries read from the store
    pub examined: u64,
    /// Skip searches that restarted the scan further along the curve
    pub jumps: u64,
}
