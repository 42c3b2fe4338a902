//! Axis-aligned bounding boxes.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in 3D; lower-dimensional data is padded with zeros.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BBox {
    /// An empty box: merging anything into it yields that thing's box.
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    /// Smallest box enclosing all `points`.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = [f64; 3]>,
    {
        let mut bbox = Self::empty();
        for p in points {
            bbox.extend(&p);
        }
        bbox
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|k| self.min[k] > self.max[k])
    }

    /// Grow the box to include `p`.
    pub fn extend(&mut self, p: &[f64; 3]) {
        for k in 0..3 {
            self.min[k] = self.min[k].min(p[k]);
            self.max[k] = self.max[k].max(p[k]);
        }
    }

    /// Union of two boxes.
    pub fn merge(&self, other: &BBox) -> BBox {
        let mut out = *self;
        for k in 0..3 {
            out.min[k] = out.min[k].min(other.min[k]);
            out.max[k] = out.max[k].max(other.max[k]);
        }
        out
    }

    /// Point containment with every face pushed outwards by `pad`.
    pub fn contains_point(&self, p: &[f64; 3], pad: f64) -> bool {
        (0..3).all(|k| p[k] >= self.min[k] - pad && p[k] <= self.max[k] + pad)
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        (0..3).all(|k| self.min[k] <= other.max[k] && other.min[k] <= self.max[k])
    }

    /// Longest edge of the box (0 for empty boxes).
    pub fn extent(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        (0..3)
            .map(|k| self.max[k] - self.min[k])
            .fold(0.0, f64::max)
    }
}

impl Default for BBox {
    fn default() -> Self {
        Self::empty()
    }
}
