//! Tolerance-aware comparisons for floorplan coordinates.
//!
//! Coordinates are sums of block dimensions, so exact equality is fragile.
//! All geometric predicates in Mosaic go through these helpers.

use serde::{Deserialize, Serialize};

/// Default absolute tolerance for coordinate comparisons.
pub const EPSILON: f64 = 1e-6;

/// An absolute tolerance used when comparing coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tolerance(pub f64);

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance(EPSILON)
    }
}

impl Tolerance {
    /// Returns `true` if `a` and `b` differ by at most the tolerance.
    pub fn same(self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.0
    }

    /// Returns `true` if `a <= b` up to the tolerance.
    pub fn at_most(self, a: f64, b: f64) -> bool {
        a <= b + self.0
    }

    /// Returns `true` if `a < b` by more than the tolerance.
    pub fn below(self, a: f64, b: f64) -> bool {
        a + self.0 < b
    }
}

/// `a == b` within [`EPSILON`].
pub fn approx_eq(a: f64, b: f64) -> bool {
    Tolerance::default().same(a, b)
}

/// `a <= b` within [`EPSILON`].
pub fn less_or_equal(a: f64, b: f64) -> bool {
    Tolerance::default().at_most(a, b)
}

/// `a < b` by more than [`EPSILON`].
pub fn definitely_less(a: f64, b: f64) -> bool {
    Tolerance::default().below(a, b)
}
