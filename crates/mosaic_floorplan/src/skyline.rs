//! A one-dimensional skyline: a piecewise constant level over an axis.
//!
//! Used by the slack evaluator and the compactor (levels are the far edges
//! of already-swept blocks) and by the wasted-area metric.

use mosaic_common::EPSILON;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Segment {
    start: f64,
    level: f64,
    owner: Option<usize>,
}

/// Piecewise constant level over the real line, starting at a ground level.
#[derive(Clone, Debug)]
pub(crate) struct Skyline {
    // segment i covers [segs[i].start, segs[i + 1].start)
    segs: Vec<Segment>,
}

impl Skyline {
    pub(crate) fn new(ground: f64) -> Self {
        Self {
            segs: vec![Segment {
                start: f64::NEG_INFINITY,
                level: ground,
                owner: None,
            }],
        }
    }

    fn end_of(&self, i: usize) -> f64 {
        self.segs.get(i + 1).map_or(f64::INFINITY, |s| s.start)
    }

    /// Highest level over the open interval `(lo, hi)` and the owner of the
    /// first segment reaching it.
    pub(crate) fn max_over(&self, lo: f64, hi: f64) -> (f64, Option<usize>) {
        let first = self
            .segs
            .partition_point(|s| s.start <= lo + EPSILON)
            .saturating_sub(1);
        let mut best = (f64::NEG_INFINITY, None);
        for i in first..self.segs.len() {
            let seg = self.segs[i];
            if seg.start >= hi - EPSILON {
                break;
            }
            if self.end_of(i) <= lo + EPSILON {
                continue;
            }
            if seg.level > best.0 {
                best = (seg.level, seg.owner);
            }
        }
        best
    }

    // Index of the segment starting at `at`, splitting the covering segment
    // when needed.
    fn split_at(&mut self, at: f64) -> usize {
        let idx = self.segs.partition_point(|s| s.start < at - EPSILON);
        if idx < self.segs.len() && (self.segs[idx].start - at).abs() <= EPSILON {
            return idx;
        }
        let covering = self.segs[idx - 1];
        self.segs.insert(
            idx,
            Segment {
                start: at,
                ..covering
            },
        );
        idx
    }

    /// Sets the level of `[lo, hi)`.
    pub(crate) fn raise(&mut self, lo: f64, hi: f64, level: f64, owner: Option<usize>) {
        if hi - lo <= EPSILON {
            return;
        }
        let first = self.split_at(lo);
        let end = self.split_at(hi);
        let start = self.segs[first].start;
        self.segs.splice(
            first..end,
            std::iter::once(Segment {
                start,
                level,
                owner,
            }),
        );
    }

    /// Integral of the level over `[lo, hi)`.
    pub(crate) fn area_between(&self, lo: f64, hi: f64) -> f64 {
        let mut area = 0.0;
        for i in 0..self.segs.len() {
            let a = self.segs[i].start.max(lo);
            let b = self.end_of(i).min(hi);
            if b > a {
                area += (b - a) * self.segs[i].level;
            }
        }
        area
    }
}
