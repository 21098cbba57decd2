//! Per-block dimensions as seen by the evaluators.
//!
//! The annealer reshapes soft blocks without touching the database, so each
//! solution state carries its own [`ShapeTable`].

use crate::data::FloorplanDb;
use crate::geom::Orientation;
use crate::solution::PlacedBlock;

/// The shape of one block in its `N` orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    /// Width in the `N` orientation.
    pub width: f64,
    /// Height in the `N` orientation.
    pub height: f64,
    /// Area (constant for soft blocks).
    pub area: f64,
    /// Smallest width/height ratio.
    pub min_ar: f64,
    /// Largest width/height ratio.
    pub max_ar: f64,
    /// Whether the orientation must stay as given.
    pub orient_fixed: bool,
}

impl Shape {
    /// A hard shape.
    pub fn hard(width: f64, height: f64) -> Self {
        let ar = width / height;
        Self {
            width,
            height,
            area: width * height,
            min_ar: ar,
            max_ar: ar,
            orient_fixed: false,
        }
    }

    /// Returns `true` if the shape may change.
    pub fn is_soft(&self) -> bool {
        self.max_ar - self.min_ar > mosaic_common::EPSILON
    }
}

/// Shapes of every block of an instance, indexed by block index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapeTable {
    shapes: Vec<Shape>,
}

impl ShapeTable {
    /// Shapes of the database blocks.
    ///
    /// With `no_rotation`, every block keeps the orientation it has.
    pub fn from_db(db: &FloorplanDb, no_rotation: bool) -> Self {
        let shapes = db
            .blocks
            .iter()
            .map(|b| {
                let (width, height) = b.base_dims();
                Shape {
                    width,
                    height,
                    area: if b.is_soft() { b.area } else { width * height },
                    min_ar: b.min_ar,
                    max_ar: b.max_ar,
                    orient_fixed: b.orient_fixed || no_rotation,
                }
            })
            .collect();
        Self { shapes }
    }

    /// Hard shapes from `(width, height)` pairs.
    pub fn from_dims(dims: &[(f64, f64)]) -> Self {
        Self {
            shapes: dims.iter().map(|&(w, h)| Shape::hard(w, h)).collect(),
        }
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Returns `true` if there are no blocks.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// The shape of block `i`.
    pub fn shape(&self, i: usize) -> &Shape {
        &self.shapes[i]
    }

    /// Width and height of block `i` in the given orientation.
    pub fn dims(&self, i: usize, orient: Orientation) -> (f64, f64) {
        let s = &self.shapes[i];
        if orient.swaps_dimensions() {
            (s.height, s.width)
        } else {
            (s.width, s.height)
        }
    }

    /// Returns `true` if block `i` may change orientation.
    pub fn can_rotate(&self, i: usize) -> bool {
        !self.shapes[i].orient_fixed
    }

    /// Returns `true` if block `i` may be reshaped.
    pub fn is_soft(&self, i: usize) -> bool {
        self.shapes[i].is_soft()
    }

    /// Returns `true` if any block may be reshaped.
    pub fn has_soft(&self) -> bool {
        self.shapes.iter().any(Shape::is_soft)
    }

    /// Aspect ratio bounds of block `i` as seen in the given orientation.
    pub fn ar_bounds(&self, i: usize, orient: Orientation) -> (f64, f64) {
        let s = &self.shapes[i];
        if orient.swaps_dimensions() {
            (1.0 / s.max_ar, 1.0 / s.min_ar)
        } else {
            (s.min_ar, s.max_ar)
        }
    }

    /// Reshapes soft block `i` so that its width in `orient` becomes `width`.
    pub fn resize(&mut self, i: usize, orient: Orientation, width: f64) {
        let s = &mut self.shapes[i];
        let height = s.area / width;
        if orient.swaps_dimensions() {
            s.width = height;
            s.height = width;
        } else {
            s.width = width;
            s.height = height;
        }
    }

    /// Pins every soft block to its current shape.
    pub fn freeze_soft(&mut self) {
        for s in &mut self.shapes {
            let ar = s.width / s.height;
            s.min_ar = ar;
            s.max_ar = ar;
        }
    }

    /// Sum of the block areas.
    pub fn block_area(&self) -> f64 {
        self.shapes.iter().map(|s| s.width * s.height).sum()
    }

    /// A placed block at `(x, y)` in the given orientation.
    pub fn place(&self, i: usize, x: f64, y: f64, orient: Orientation) -> PlacedBlock {
        let (w, h) = self.dims(i, orient);
        PlacedBlock::new(x, y, w, h, orient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Block;

    #[test]
    fn dims_follow_orientation() {
        let table = ShapeTable::from_dims(&[(10.0, 4.0)]);
        assert_eq!(table.dims(0, Orientation::N), (10.0, 4.0));
        assert_eq!(table.dims(0, Orientation::W), (4.0, 10.0));
        assert!(!table.is_soft(0));
    }

    #[test]
    fn from_db_uses_base_dims() {
        let mut db = FloorplanDb::new();
        let id = db.add_block(Block::hard("a", 10.0, 4.0).with_fixed_orientation());
        db.block_mut(id).orient = Orientation::E;
        db.block_mut(id).width = 4.0;
        db.block_mut(id).height = 10.0;
        db.add_block(Block::soft("s", 64.0, 0.25, 4.0));

        let table = ShapeTable::from_db(&db, false);
        assert_eq!(table.dims(0, Orientation::N), (10.0, 4.0));
        assert!(!table.can_rotate(0));
        assert!(table.can_rotate(1));
        assert!(table.has_soft());

        let frozen = ShapeTable::from_db(&db, true);
        assert!(!frozen.can_rotate(1));
    }

    #[test]
    fn resize_keeps_area() {
        let mut db = FloorplanDb::new();
        db.add_block(Block::soft("s", 64.0, 0.25, 4.0));
        let mut table = ShapeTable::from_db(&db, false);
        table.resize(0, Orientation::N, 16.0);
        assert_eq!(table.dims(0, Orientation::N), (16.0, 4.0));
        table.resize(0, Orientation::E, 16.0);
        assert_eq!(table.dims(0, Orientation::E), (16.0, 4.0));
        assert_eq!(table.dims(0, Orientation::N), (4.0, 16.0));
        assert!((table.block_area() - 64.0).abs() < 1e-9);
    }

    #[test]
    fn frozen_tables_have_no_soft_blocks() {
        let mut db = FloorplanDb::new();
        db.add_block(Block::soft("s", 64.0, 0.25, 4.0));
        let mut table = ShapeTable::from_db(&db, false);
        table.freeze_soft();
        assert!(!table.has_soft());
        assert_eq!(table.dims(0, Orientation::N), (8.0, 8.0));
    }

    #[test]
    fn ar_bounds_invert_when_rotated() {
        let mut db = FloorplanDb::new();
        db.add_block(Block::soft("s", 64.0, 0.5, 4.0));
        let table = ShapeTable::from_db(&db, false);
        assert_eq!(table.ar_bounds(0, Orientation::N), (0.5, 4.0));
        assert_eq!(table.ar_bounds(0, Orientation::E), (0.25, 2.0));
    }
}
