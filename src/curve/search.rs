//! Next-intersection skip search
//!
//! The Z-order curve is a linearised quad-tree, so "the next Z-index
//! inside the rectangle" is the first descendant of the nearest later
//! sibling of some ancestor of the current cell whose square overlaps
//! the rectangle. Finding it takes at most `bits` steps up and `bits`
//! steps down, however far apart the two indices are on the curve.
//!
//! ```text
//! ascend:  cell -> parent -> parent ... until a later sibling overlaps
//! descend: sibling -> first overlapping child ... until size == 1
//! ```

use crate::curve::{decode, interleave, CurveError, Rect, ZCurve};
use std::fmt;

impl ZCurve {
    /// Smallest Z-index `>= z` whose point lies inside `rect`
    ///
    /// Returns `z` itself when its point is already inside, so a caller
    /// that needs a strictly larger index should use [`Self::next_after`].
    /// `rect` is clipped to the domain first; an empty rectangle, or a
    /// `z` past every point of `rect`, yields `None`.
    pub fn next_intersecting(&self, rect: &Rect, z: u64) -> Result<Option<u64>, CurveError> {
        let side = self.side();
        let rect = rect.clip(side);
        if rect.is_empty() || z > self.max_z() {
            return Ok(None);
        }

        let p = decode(z);
        if rect.contains_point(p) {
            return Ok(Some(z));
        }

        // Z order is monotone per axis: nothing inside lies past the far corner
        let max_z = interleave(rect.lr.0 - 1, rect.lr.1 - 1);
        if z >= max_z {
            return Ok(None);
        }

        let mut square = Rect::unit(p);
        let mut found = loop {
            if square.size() >= side {
                return Ok(None);
            }
            let (parent, quadrant) = square.enlarge_aligned();
            let half = square.size();
            // Every later sibling from here up starts at or beyond half^2
            if quadrant == 0 && half.saturating_mul(half) > max_z {
                return Ok(None);
            }
            if let Some(sibling) = (quadrant + 1..4)
                .map(|n| parent.shrink_aligned(n))
                .find(|s| s.intersects(&rect))
            {
                break sibling;
            }
            square = parent;
        };

        while found.size() > 1 {
            let current = found;
            found = (0..4)
                .map(|n| current.shrink_aligned(n))
                .find(|child| child.ul_z() > z && child.intersects(&rect))
                .ok_or(CurveError::Invariant {
                    z,
                    size: current.size(),
                })?;
        }

        Ok(Some(found.ul_z()))
    }

    /// Smallest Z-index strictly greater than `z` inside `rect`
    pub fn next_after(&self, rect: &Rect, z: u64) -> Result<Option<u64>, CurveError> {
        match z.checked_add(1) {
            Some(next) => self.next_intersecting(rect, next),
            None => Ok(None),
        }
    }

    /// Lowest and highest Z-index any point of `rect` can have
    pub fn z_range(&self, rect: &Rect) -> Option<(u64, u64)> {
        let rect = rect.clip(self.side());
        if rect.is_empty() {
            return None;
        }
        Some((rect.ul_z(), interleave(rect.lr.0 - 1, rect.lr.1 - 1)))
    }
}

/// Text rendering of the Z-index of every cell in a `2^levels` grid
///
/// Cells outside `highlight` (when set) print as `.`.
#[derive(Debug, Clone, Copy)]
pub struct GridView {
    pub levels: u32,
    pub highlight: Option<Rect>,
}

impl GridView {
    pub fn new(levels: u32) -> Self {
        Self {
            levels,
            highlight: None,
        }
    }

    #[must_use]
    pub fn highlight(mut self, rect: Rect) -> Self {
        self.highlight = Some(rect);
        self
    }
}

impl fmt::Display for GridView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = 1u64 << self.levels.min(8);
        let width = interleave(side - 1, side - 1).to_string().len() + 1;
        for y in 0..side {
            for x in 0..side {
                let inside = self.highlight.map_or(true, |r| {
                    r.ul.0 <= x && x < r.lr.0 && r.ul.1 <= y && y < r.lr.1
                });
                if inside {
                    write!(f, "{:>width$}", interleave(x, y))?;
                } else {
                    write!(f, "{:>width$}", ".")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
