//! # zspatial
//!
//! Two-dimensional spatial index over an ordered key-value store.
//!
//! Each key is stored at a grid point. Points are linearised with a
//! Z-order (Morton) curve, so a rectangle query becomes a few range
//! scans over a sorted key space plus a skip search that jumps over
//! curve runs lying outside the rectangle.
//!
//! ## Modules
//!
//! - [`curve`]: Morton codec, rectangle geometry, next-intersection search
//! - [`storage`]: Ordered key-value contract with memory and SQLite backends
//! - [`index`]: The spatial index itself
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zspatial::{IndexConfig, MemoryStore, Point, Rect, SpatialIndex};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let index = SpatialIndex::new(MemoryStore::new(), IndexConfig::default())?;
//!
//!     index.set_location(b"a", Point::new(3, 2))?;
//!     index.set_location(b"b", Point::new(1, 4))?;
//!     index.set_location(b"c", Point::new(9, 9))?;
//!
//!     // Half-open: x in [0, 5), y in [0, 5)
//!     let hits = index.get_in_rectangle(&Rect::new((0, 0), (5, 5)))?;
//!     println!("Found {} keys", hits.len());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod curve;
pub mod index;
pub mod storage;

// Re-export top-level types for convenience
pub use curve::{decode, encode, CurveError, GridView, Point, Rect, ZCurve};

pub use index::{IndexConfig, IndexError, IndexResult, LocatedKey, QueryStats, SpatialIndex};

pub use storage::{
    KeySelector, KeyValue, KvStore, MemoryStore, SqliteStore, StorageError, StorageResult,
    Transaction,
};

pub use config::{Backend, Config, ConfigError, IndexSettings, LoggingConfig, StorageSettings};
