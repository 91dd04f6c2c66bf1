//! Half-open axis-aligned rectangles
//!
//! `ul` is inclusive and `lr` is exclusive on both axes. Corners are
//! `u64` so that a rectangle can reach the far edge of a full 32-bit
//! domain (`lr == 2^32`).
//!
//! The aligned-square helpers are the quad-tree moves used by the skip
//! search: quadrant `n` of a square has x offset `n & 1` and y offset
//! `n >> 1`, the same order the codec visits children in.

use crate::curve::{interleave, Point};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned rectangle `[ul.0, lr.0) x [ul.1, lr.1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// Upper-left corner (inclusive)
    pub ul: (u64, u64),
    /// Lower-right corner (exclusive)
    pub lr: (u64, u64),
}

impl Rect {
    pub fn new(ul: (u64, u64), lr: (u64, u64)) -> Self {
        Self { ul, lr }
    }

    /// The 1x1 square holding a single point
    pub fn unit(p: Point) -> Self {
        let (x, y) = (u64::from(p.x), u64::from(p.y));
        Self::new((x, y), (x + 1, y + 1))
    }

    pub fn width(&self) -> u64 {
        self.lr.0.saturating_sub(self.ul.0)
    }

    pub fn height(&self) -> u64 {
        self.lr.1.saturating_sub(self.ul.1)
    }

    /// True when either axis has zero (or negative) extent
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Side length; only meaningful for squares
    pub fn size(&self) -> u64 {
        self.width()
    }

    pub fn contains_point(&self, p: Point) -> bool {
        let (x, y) = (u64::from(p.x), u64::from(p.y));
        self.ul.0 <= x && x < self.lr.0 && self.ul.1 <= y && y < self.lr.1
    }

    /// Overlap test; rectangles sharing only an edge do not intersect
    pub fn intersects(&self, other: &Rect) -> bool {
        self.ul.0 < other.lr.0
            && other.ul.0 < self.lr.0
            && self.ul.1 < other.lr.1
            && other.ul.1 < self.lr.1
    }

    /// Intersection with `[0, side) x [0, side)`
    #[must_use]
    pub fn clip(&self, side: u64) -> Self {
        Self::new(
            (self.ul.0.min(side), self.ul.1.min(side)),
            (self.lr.0.min(side), self.lr.1.min(side)),
        )
    }

    /// Z-index of the upper-left corner
    pub fn ul_z(&self) -> u64 {
        interleave(self.ul.0, self.ul.1)
    }

    /// Parent aligned square and the quadrant `self` occupies in it
    ///
    /// Precondition: `self` is an aligned square.
    pub fn enlarge_aligned(&self) -> (Self, u8) {
        let size = self.size();
        debug_assert!(size.is_power_of_two(), "enlarge_aligned on non-square {self:?}");
        let mask = !(size * 2 - 1);
        let ul = (self.ul.0 & mask, self.ul.1 & mask);
        let quadrant = u8::from(ul.0 != self.ul.0) | (u8::from(ul.1 != self.ul.1) << 1);
        (Self::new(ul, (ul.0 + size * 2, ul.1 + size * 2)), quadrant)
    }

    /// Child quadrant `n` (0..4, Z order) of an aligned square
    ///
    /// Precondition: `self` is an aligned square larger than 1.
    pub fn shrink_aligned(&self, n: u8) -> Self {
        debug_assert!(n < 4, "quadrant {n} out of range");
        let half = self.size() / 2;
        debug_assert!(half > 0, "shrink_aligned on a unit square");
        let x = self.ul.0 + u64::from(n & 1) * half;
        let y = self.ul.1 + u64::from(n >> 1) * half;
        Self::new((x, y), (x + half, y + half))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) -> ({}, {})",
            self.ul.0, self.ul.1, self.lr.0, self.lr.1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::encode;

    #[test]
    fn test_contains_point_half_open() {
        let r = Rect::new((1, 1), (5, 5));
        assert!(r.contains_point(Point::new(1, 1)));
        assert!(r.contains_point(Point::new(4, 4)));
        assert!(!r.contains_point(Point::new(5, 4)));
        assert!(!r.contains_point(Point::new(4, 5)));
        assert!(!r.contains_point(Point::new(0, 2)));
    }

    #[test]
    fn test_intersects() {
        let a = Rect::new((0, 0), (4, 4));
        assert!(a.intersects(&Rect::new((3, 3), (6, 6))));
        assert!(a.intersects(&Rect::new((1, 1), (2, 2))));
        // Shared edge only
        assert!(!a.intersects(&Rect::new((4, 0), (8, 4))));
        assert!(!a.intersects(&Rect::new((0, 4), (4, 8))));
        assert!(!a.intersects(&Rect::new((5, 5), (6, 6))));
    }

    #[test]
    fn test_empty_and_clip() {
        assert!(Rect::new((2, 2), (2, 9)).is_empty());
        assert!(Rect::new((2, 2), (9, 2)).is_empty());
        assert!(Rect::new((5, 5), (1, 9)).is_empty());
        assert!(!Rect::new((0, 0), (1, 1)).is_empty());

        let clipped = Rect::new((3, 10), (20, 20)).clip(8);
        assert_eq!(clipped, Rect::new((3, 8), (8, 8)));
        assert!(clipped.is_empty());
    }

    #[test]
    fn test_enlarge_aligned_quadrants() {
        let (parent, q) = Rect::unit(Point::new(0, 0)).enlarge_aligned();
        assert_eq!(parent, Rect::new((0, 0), (2, 2)));
        assert_eq!(q, 0);

        let (parent, q) = Rect::unit(Point::new(3, 2)).enlarge_aligned();
        assert_eq!(parent, Rect::new((2, 2), (4, 4)));
        assert_eq!(q, 1);

        let (parent, q) = Rect::new((4, 4), (6, 6)).enlarge_aligned();
        assert_eq!(parent, Rect::new((4, 4), (8, 8)));
        assert_eq!(q, 0);

        let (parent, q) = Rect::new((4, 4), (8, 8)).enlarge_aligned();
        assert_eq!(parent, Rect::new((0, 0), (8, 8)));
        assert_eq!(q, 3);
    }

    #[test]
    fn test_shrink_inverts_enlarge() {
        for x in 0..8u32 {
            for y in 0..8u32 {
                let mut square = Rect::unit(Point::new(x, y));
                for _ in 0..3 {
                    let (parent, q) = square.enlarge_aligned();
                    assert_eq!(parent.shrink_aligned(q), square);
                    square = parent;
                }
            }
        }
    }

    #[test]
    fn test_quadrants_follow_curve_order() {
        let square = Rect::new((4, 0), (8, 4));
        let zs: Vec<u64> = (0..4).map(|n| square.shrink_aligned(n).ul_z()).collect();
        assert!(zs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(square.shrink_aligned(1).ul, (6, 0));
        assert_eq!(square.shrink_aligned(2).ul, (4, 2));
        assert_eq!(zs[0], encode(Point::new(4, 0)));
    }
}
