//! Z-order Curve
//!
//! Maps 2D non-negative coordinates onto a single `u64` Z-index by
//! interleaving bits (x in the even bits, y in the odd bits) and finds
//! the next Z-index that lands inside a rectangle without scanning.
//!
//! - **codec**: [`encode`] / [`decode`] between [`Point`] and Z-index
//! - **rect**: half-open [`Rect`] and aligned-square subdivision
//! - **search**: [`ZCurve::next_intersecting`], the skip search
//!
//! # Layout
//!
//! ```text
//!  y\x   0   1   2   3
//!   0    0   1   4   5
//!   1    2   3   6   7
//!   2    8   9  12  13
//!   3   10  11  14  15
//! ```

mod rect;
mod search;

pub use rect::Rect;
pub use search::GridView;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Largest supported coordinate bit-width (two of them fill a `u64`)
pub const MAX_BITS: u32 = 32;

/// Errors raised by the curve domain and the skip search
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurveError {
    /// Descending from an intersecting square found no qualifying child
    #[error("Search invariant violated: no child of size-{size} square after z={z} intersects")]
    Invariant { z: u64, size: u64 },

    /// Signed input with a negative component
    #[error("Coordinate ({x}, {y}) has a negative component")]
    Negative { x: i64, y: i64 },

    /// Coordinate does not fit the configured bit-width
    #[error("Coordinate ({x}, {y}) outside the {bits}-bit domain")]
    OutOfDomain { x: u64, y: u64, bits: u32 },

    /// Bit-width is zero or wider than [`MAX_BITS`]
    #[error("Invalid bit-width {0}: expected 1..=32")]
    InvalidBits(u32),
}

/// A located position on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Z-index of this point
    pub fn z(self) -> u64 {
        encode(self)
    }
}

impl From<(u32, u32)> for Point {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

impl TryFrom<(i64, i64)> for Point {
    type Error = CurveError;

    /// Rejects negative components and anything wider than 32 bits
    fn try_from((x, y): (i64, i64)) -> Result<Self, Self::Error> {
        if x < 0 || y < 0 {
            return Err(CurveError::Negative { x, y });
        }
        match (u32::try_from(x), u32::try_from(y)) {
            (Ok(x), Ok(y)) => Ok(Self { x, y }),
            _ => Err(CurveError::OutOfDomain {
                x: x.unsigned_abs(),
                y: y.unsigned_abs(),
                bits: MAX_BITS,
            }),
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Spread the low 32 bits of `v` into the even bits of a `u64`
#[inline]
fn spread(v: u64) -> u64 {
    let v = v & 0x0000_0000_FFFF_FFFF;
    let v = (v | (v << 16)) & 0x0000_FFFF_0000_FFFF;
    let v = (v | (v << 8)) & 0x00FF_00FF_00FF_00FF;
    let v = (v | (v << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    let v = (v | (v << 2)) & 0x3333_3333_3333_3333;
    (v | (v << 1)) & 0x5555_5555_5555_5555
}

/// Gather the even bits of `v` back into the low 32 bits
#[inline]
fn compact(v: u64) -> u64 {
    let v = v & 0x5555_5555_5555_5555;
    let v = (v | (v >> 1)) & 0x3333_3333_3333_3333;
    let v = (v | (v >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    let v = (v | (v >> 4)) & 0x00FF_00FF_00FF_00FF;
    let v = (v | (v >> 8)) & 0x0000_FFFF_0000_FFFF;
    (v | (v >> 16)) & 0x0000_0000_FFFF_FFFF
}

/// Interleave two coordinates given as `u64`; only the low 32 bits count
#[inline]
pub(crate) fn interleave(x: u64, y: u64) -> u64 {
    spread(x) | (spread(y) << 1)
}

/// Morton code of a point
#[inline]
pub fn encode(p: Point) -> u64 {
    interleave(u64::from(p.x), u64::from(p.y))
}

/// Inverse of [`encode`]
#[inline]
pub fn decode(z: u64) -> Point {
    // compact() masks to 32 bits, so the casts are lossless
    Point {
        x: compact(z) as u32,
        y: compact(z >> 1) as u32,
    }
}

/// A square coordinate domain of side `2^bits`
///
/// Every bound the index enforces comes from here rather than from a
/// global constant, so two indexes with different widths can coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZCurve {
    bits: u32,
}

impl ZCurve {
    pub fn new(bits: u32) -> Result<Self, CurveError> {
        if bits == 0 || bits > MAX_BITS {
            return Err(CurveError::InvalidBits(bits));
        }
        Ok(Self { bits })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Side length of the domain
    pub fn side(&self) -> u64 {
        1u64 << self.bits
    }

    /// Largest Z-index of any point in the domain
    pub fn max_z(&self) -> u64 {
        let side = self.side() - 1;
        interleave(side, side)
    }

    pub fn contains(&self, p: Point) -> bool {
        u64::from(p.x) < self.side() && u64::from(p.y) < self.side()
    }

    /// Reject points outside the domain
    pub fn check(&self, p: Point) -> Result<(), CurveError> {
        if self.contains(p) {
            Ok(())
        } else {
            Err(CurveError::OutOfDomain {
                x: u64::from(p.x),
                y: u64::from(p.y),
                bits: self.bits,
            })
        }
    }
}

impl Default for ZCurve {
    fn default() -> Self {
        Self { bits: MAX_BITS }
    }
}
