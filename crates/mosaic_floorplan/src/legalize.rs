//! Directional overlap resolution for placements built outside the packing
//! encodings.
//!
//! A block that overlaps fixed rectangles is pushed in the one compass
//! direction that clears every overlap with the least movement while staying
//! inside the bounds. If no direction works the block is tried again turned
//! by a quarter about its lower-left corner, and otherwise left unresolved.

use crate::geom::{Direction, Rect};
use crate::solution::Placement;
use mosaic_common::{definitely_less, less_or_equal};
use serde::{Deserialize, Serialize};

/// What happened to one rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LegalizeResult {
    /// Already clear of every fixed rectangle and inside the bounds.
    Unchanged,
    /// Moved to `rect`.
    Moved {
        /// The new footprint.
        rect: Rect,
        /// Direction of the final push, `None` when clamping into the bounds
        /// was enough.
        direction: Option<Direction>,
        /// Whether the footprint was turned by a quarter.
        rotated: bool,
    },
    /// No push clears the overlaps inside the bounds.
    Unresolved,
}

/// Blocks changed by [`Legalizer::legalize_placement`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegalizeReport {
    /// Blocks that moved (possibly rotated).
    pub moved: Vec<usize>,
    /// Blocks left overlapping.
    pub unresolved: Vec<usize>,
}

impl LegalizeReport {
    /// Returns `true` if every block ended up legal.
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Pushes rectangles out of fixed rectangles inside a bounding box.
#[derive(Debug, Clone, Copy)]
pub struct Legalizer {
    bounds: Rect,
}

impl Legalizer {
    /// A legalizer confined to `bounds`.
    pub fn new(bounds: Rect) -> Self {
        Self { bounds }
    }

    /// The bounding box.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Resolves the overlaps of `target` with `fixed`.
    pub fn legalize_rect(&self, target: Rect, fixed: &[Rect]) -> LegalizeResult {
        if self.bounds.contains(&target) && !fixed.iter().any(|f| f.overlaps(&target)) {
            return LegalizeResult::Unchanged;
        }
        if let Some((rect, direction)) = self.resolve(target, fixed) {
            return LegalizeResult::Moved {
                rect,
                direction,
                rotated: false,
            };
        }
        let turned = Rect::new(target.x, target.y, target.height, target.width);
        match self.resolve(turned, fixed) {
            Some((rect, direction)) => LegalizeResult::Moved {
                rect,
                direction,
                rotated: true,
            },
            None => LegalizeResult::Unresolved,
        }
    }

    /// Legalizes the blocks of `placement` in index order. Each block is
    /// resolved against the blocks before it and the obstacles; `rotatable`
    /// tells which blocks may be turned.
    pub fn legalize_placement(
        &self,
        placement: &mut Placement,
        obstacles: &[Rect],
        rotatable: &[bool],
    ) -> LegalizeReport {
        let mut report = LegalizeReport::default();
        let mut fixed: Vec<Rect> = obstacles.to_vec();
        for i in 0..placement.blocks.len() {
            let block = &mut placement.blocks[i];
            let mut result = self.legalize_rect(block.rect(), &fixed);
            if let LegalizeResult::Moved { rotated: true, .. } = result {
                if !rotatable.get(i).copied().unwrap_or(false) {
                    result = LegalizeResult::Unresolved;
                }
            }
            match result {
                LegalizeResult::Unchanged => {}
                LegalizeResult::Moved { rect, rotated, .. } => {
                    block.x = rect.x;
                    block.y = rect.y;
                    if rotated {
                        block.width = rect.width;
                        block.height = rect.height;
                        block.orient = block.orient.rotated_quarter();
                    }
                    report.moved.push(i);
                }
                LegalizeResult::Unresolved => report.unresolved.push(i),
            }
            fixed.push(block.rect());
        }
        placement.recompute_extent();
        report
    }

    /// The cheapest legal position of `target` reachable by one clamp into
    /// the bounds followed by at most one directional push.
    fn resolve(&self, target: Rect, fixed: &[Rect]) -> Option<(Rect, Option<Direction>)> {
        let start = self.clamp(target)?;
        if !fixed.iter().any(|f| f.overlaps(&start)) {
            return Some((start, None));
        }
        let mut best: Option<(f64, Direction)> = None;
        for direction in Direction::ALL {
            let Some(shift) = self.push(start, fixed, direction) else {
                continue;
            };
            if best.map_or(true, |(b, _)| definitely_less(shift, b)) {
                best = Some((shift, direction));
            }
        }
        best.map(|(shift, direction)| {
            let (ux, uy) = direction.unit();
            (start.translated(ux * shift, uy * shift), Some(direction))
        })
    }

    /// Moves `target` inside the bounds with the smallest translation.
    fn clamp(&self, target: Rect) -> Option<Rect> {
        let b = &self.bounds;
        if !less_or_equal(target.width, b.width) || !less_or_equal(target.height, b.height) {
            return None;
        }
        let x = target.x.max(b.x).min(b.x_max() - target.width);
        let y = target.y.max(b.y).min(b.y_max() - target.height);
        Some(Rect::new(x, y, target.width, target.height))
    }

    /// Smallest push of `target` in `direction` that clears every fixed
    /// rectangle, if it stays inside the bounds.
    fn push(&self, target: Rect, fixed: &[Rect], direction: Direction) -> Option<f64> {
        let room = match direction {
            Direction::Right => self.bounds.x_max() - target.x_max(),
            Direction::Up => self.bounds.y_max() - target.y_max(),
            Direction::Left => target.x - self.bounds.x,
            Direction::Down => target.y - self.bounds.y,
        };
        let (ux, uy) = direction.unit();
        let mut shift = 0.0;
        // every round clears at least one more rectangle
        for _ in 0..=fixed.len() {
            let moved = target.translated(ux * shift, uy * shift);
            let needed = fixed
                .iter()
                .filter(|f| f.overlaps(&moved))
                .map(|f| match direction {
                    Direction::Right => f.x_max() - target.x,
                    Direction::Up => f.y_max() - target.y,
                    Direction::Left => target.x_max() - f.x,
                    Direction::Down => target.y_max() - f.y,
                })
                .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))));
            match needed {
                None => return less_or_equal(shift, room).then_some(shift),
                Some(s) => {
                    if !less_or_equal(s, room) {
                        return None;
                    }
                    shift = s;
                }
            }
        }
        None
    }
}
