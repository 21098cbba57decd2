//! Placement solutions shared by both representations.
//!
//! A [`Placement`] is what every evaluator produces and every consumer reads:
//! one [`PlacedBlock`] per block index plus the extent of the packing,
//! measured from the origin of the packing frame.

use crate::geom::{Orientation, Point, Rect};
use mosaic_common::{less_or_equal, EPSILON};
use serde::{Deserialize, Serialize};

/// The location, size, and orientation of one block.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct PlacedBlock {
    /// Left edge.
    pub x: f64,
    /// Bottom edge.
    pub y: f64,
    /// Width in the chosen orientation.
    pub width: f64,
    /// Height in the chosen orientation.
    pub height: f64,
    /// Chosen orientation.
    pub orient: Orientation,
}

impl PlacedBlock {
    /// Creates a placed block.
    pub fn new(x: f64, y: f64, width: f64, height: f64, orient: Orientation) -> Self {
        Self {
            x,
            y,
            width,
            height,
            orient,
        }
    }

    /// The footprint of the block.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// The block center.
    pub fn center(&self) -> Point {
        self.rect().center()
    }

    /// Absolute position of a pin given by its normalized offset in the
    /// block's own (`N`) frame.
    pub fn pin_position(&self, offset: Point) -> Point {
        let (dx, dy) = self.orient.map_offset(offset.x, offset.y);
        let c = self.center();
        Point::new(c.x + dx * self.width, c.y + dy * self.height)
    }
}

/// A fixed outline the packing must fit into.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct OutlineTarget {
    /// Required maximum width.
    pub width: f64,
    /// Required maximum height.
    pub height: f64,
}

impl OutlineTarget {
    /// Outline from an aspect ratio (width / height) and a whitespace budget
    /// in percent of `block_area`.
    pub fn from_aspect_ratio(block_area: f64, aspect_ratio: f64, max_whitespace: f64) -> Self {
        let area = block_area * (1.0 + max_whitespace / 100.0);
        let width = (area * aspect_ratio).sqrt();
        Self {
            width,
            height: width / aspect_ratio,
        }
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    /// Area of the outline.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// A complete placement of every block of a problem instance.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Placement {
    /// One entry per block index.
    pub blocks: Vec<PlacedBlock>,
    /// Largest right edge.
    pub width: f64,
    /// Largest top edge.
    pub height: f64,
}

impl Placement {
    /// Builds a placement and computes its extent.
    pub fn new(blocks: Vec<PlacedBlock>) -> Self {
        let mut placement = Self {
            blocks,
            width: 0.0,
            height: 0.0,
        };
        placement.recompute_extent();
        placement
    }

    /// Recomputes `width` and `height` from the blocks.
    pub fn recompute_extent(&mut self) {
        self.width = self.blocks.iter().map(|b| b.x + b.width).fold(0.0, f64::max);
        self.height = self.blocks.iter().map(|b| b.y + b.height).fold(0.0, f64::max);
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if no block is placed.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Bounding-box area.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Sum of the block areas.
    pub fn block_area(&self) -> f64 {
        self.blocks.iter().map(|b| b.width * b.height).sum()
    }

    /// Whitespace as a fraction of the block area.
    pub fn whitespace(&self) -> f64 {
        let blocks = self.block_area();
        if blocks <= 0.0 {
            return 0.0;
        }
        (self.area() - blocks) / blocks
    }

    /// Width divided by height, or zero for an empty placement.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height <= 0.0 {
            0.0
        } else {
            self.width / self.height
        }
    }

    /// Returns `true` if the packing lies within the outline.
    pub fn fits(&self, outline: &OutlineTarget) -> bool {
        less_or_equal(self.width, outline.width) && less_or_equal(self.height, outline.height)
    }

    /// Summed excess of width and height over the outline.
    pub fn violation(&self, outline: &OutlineTarget) -> f64 {
        (self.width - outline.width).max(0.0) + (self.height - outline.height).max(0.0)
    }

    /// Index pairs of blocks whose interiors intersect.
    pub fn overlapping_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..self.blocks.len() {
            let ri = self.blocks[i].rect();
            for j in (i + 1)..self.blocks.len() {
                if ri.overlaps(&self.blocks[j].rect()) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// Returns `true` if any two blocks overlap.
    pub fn has_overlap(&self) -> bool {
        !self.overlapping_pairs().is_empty()
    }

    /// Returns `true` if some block overlaps one of the given rectangles.
    pub fn overlaps_any(&self, obstacles: &[Rect]) -> bool {
        self.blocks
            .iter()
            .any(|b| obstacles.iter().any(|o| b.rect().overlaps(o)))
    }

    /// Returns `true` if both placements put every block at the same spot.
    pub fn same_coordinates(&self, other: &Placement) -> bool {
        self.blocks.len() == other.blocks.len()
            && self.blocks.iter().zip(&other.blocks).all(|(a, b)| {
                (a.x - b.x).abs() <= EPSILON
                    && (a.y - b.y).abs() <= EPSILON
                    && (a.width - b.width).abs() <= EPSILON
                    && (a.height - b.height).abs() <= EPSILON
            })
    }

    /// Moves every block by `(dx, dy)`; the extent still starts at the origin.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        for b in &mut self.blocks {
            b.x += dx;
            b.y += dy;
        }
        self.recompute_extent();
    }

    /// Mirrors the placement left-right inside a frame of the given width.
    pub fn mirror_x(&mut self, frame_width: f64) {
        for b in &mut self.blocks {
            b.x = frame_width - (b.x + b.width);
            b.orient = b.orient.flip_x();
        }
        self.recompute_extent();
    }

    /// Mirrors the placement top-bottom inside a frame of the given height.
    pub fn mirror_y(&mut self, frame_height: f64) {
        for b in &mut self.blocks {
            b.y = frame_height - (b.y + b.height);
            b.orient = b.orient.flip_y();
        }
        self.recompute_extent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64) -> PlacedBlock {
        PlacedBlock::new(x, y, 10.0, 10.0, Orientation::N)
    }

    #[test]
    fn extent_and_area() {
        let p = Placement::new(vec![square(0.0, 0.0), square(10.0, 0.0), square(0.0, 10.0)]);
        assert_eq!(p.width, 20.0);
        assert_eq!(p.height, 20.0);
        assert_eq!(p.area(), 400.0);
        assert_eq!(p.block_area(), 300.0);
        assert!((p.whitespace() - 1.0 / 3.0).abs() < 1e-12);
        assert!(!p.has_overlap());
    }

    #[test]
    fn detects_overlap() {
        let p = Placement::new(vec![square(0.0, 0.0), square(5.0, 5.0)]);
        assert_eq!(p.overlapping_pairs(), vec![(0, 1)]);
    }

    #[test]
    fn outline_from_aspect_ratio() {
        let o = OutlineTarget::from_aspect_ratio(400.0, 1.0, 0.0);
        assert!((o.width - 20.0).abs() < 1e-9);
        assert!((o.height - 20.0).abs() < 1e-9);

        let o = OutlineTarget::from_aspect_ratio(200.0, 2.0, 100.0);
        assert!((o.width - 40.0).abs() < 1e-9);
        assert!((o.height - 10.0).abs() < 1e-9);
        assert!((o.aspect_ratio() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn fit_and_violation() {
        let p = Placement::new(vec![square(0.0, 0.0), square(10.0, 0.0)]);
        let ok = OutlineTarget {
            width: 20.0,
            height: 10.0,
        };
        let tight = OutlineTarget {
            width: 15.0,
            height: 8.0,
        };
        assert!(p.fits(&ok));
        assert_eq!(p.violation(&ok), 0.0);
        assert!(!p.fits(&tight));
        assert!((p.violation(&tight) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn pin_position_follows_orientation() {
        let b = PlacedBlock::new(0.0, 0.0, 20.0, 10.0, Orientation::N);
        let p = b.pin_position(Point::new(0.5, 0.0));
        assert_eq!((p.x, p.y), (20.0, 5.0));

        // rotated block: the pin on the right edge moves to the bottom edge
        let r = PlacedBlock::new(0.0, 0.0, 10.0, 20.0, Orientation::E);
        let p = r.pin_position(Point::new(0.5, 0.0));
        assert_eq!((p.x, p.y), (5.0, 0.0));
    }

    #[test]
    fn mirroring_keeps_blocks_in_frame() {
        let mut p = Placement::new(vec![square(0.0, 0.0), square(10.0, 0.0)]);
        p.mirror_x(30.0);
        assert_eq!(p.blocks[0].x, 20.0);
        assert_eq!(p.blocks[1].x, 10.0);
        assert_eq!(p.blocks[0].orient, Orientation::FN);
        p.mirror_y(10.0);
        assert_eq!(p.blocks[0].y, 0.0);
        assert_eq!(p.blocks[0].orient, Orientation::S);
        assert!(!p.has_overlap());
    }

    #[test]
    fn serde_roundtrip() {
        let p = Placement::new(vec![square(0.0, 0.0), square(10.0, 0.0)]);
        let json = serde_json::to_string(&p).unwrap();
        let back: Placement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
