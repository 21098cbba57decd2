//! Left and bottom compaction of placements and packing trees.

use crate::geom::Rect;
use crate::packing::{BTree, ContourEvaluator};
use crate::seqpair::{placement_to_tree, ConversionAlgo};
use crate::shape::ShapeTable;
use crate::skyline::Skyline;
use crate::solution::Placement;
use mosaic_common::{definitely_less, EPSILON};

/// Default round limit of [`Compactor::compact_to_fixed_point`].
pub const DEFAULT_COMPACTION_ROUNDS: usize = 16;

/// The outcome of one left-then-bottom compaction round.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct CompactionRound {
    /// Number of blocks that moved.
    pub moved: usize,
    /// For each block, the block it rests against on its left after the
    /// left sweep (`None` for the frame edge or an obstacle).
    pub left_support: Vec<Option<usize>>,
    /// For each block, the block it rests on after the bottom sweep.
    pub bottom_support: Vec<Option<usize>>,
}

/// Slides blocks left, then down, around fixed obstacles.
#[derive(Clone, Debug, Default)]
pub struct Compactor {
    obstacles: Vec<Rect>,
}

impl Compactor {
    /// A compactor without obstacles.
    pub fn new() -> Self {
        Self::default()
    }

    /// A compactor that keeps blocks clear of `obstacles`.
    pub fn with_obstacles(obstacles: Vec<Rect>) -> Self {
        Self { obstacles }
    }

    /// One left sweep followed by one bottom sweep.
    pub fn compact(&self, placement: &mut Placement) -> CompactionRound {
        let n = placement.len();
        let before: Vec<(f64, f64)> = placement.blocks.iter().map(|b| (b.x, b.y)).collect();
        let left_support = self.sweep(placement, true);
        let bottom_support = self.sweep(placement, false);
        placement.recompute_extent();

        let moved = (0..n)
            .filter(|&i| {
                let b = &placement.blocks[i];
                (b.x - before[i].0).abs() > EPSILON || (b.y - before[i].1).abs() > EPSILON
            })
            .count();
        CompactionRound {
            moved,
            left_support,
            bottom_support,
        }
    }

    /// Repeats [`Compactor::compact`] until nothing moves or `max_rounds`
    /// rounds ran. Returns the total number of block moves.
    pub fn compact_to_fixed_point(&self, placement: &mut Placement, max_rounds: usize) -> usize {
        let mut total = 0;
        for _ in 0..max_rounds {
            let round = self.compact(placement);
            if round.moved == 0 {
                break;
            }
            total += round.moved;
        }
        total
    }

    /// Compacts the packing of `tree` and rebuilds the tree from the result,
    /// keeping the new tree only when its packing is smaller.
    ///
    /// Returns the number of blocks the round moved, or zero when the tree
    /// was left unchanged.
    pub fn compact_tree(
        &self,
        tree: &mut BTree,
        shapes: &ShapeTable,
        evaluator: &mut ContourEvaluator,
    ) -> usize {
        let mut placement = evaluator.evaluate(tree, shapes).placement;
        let area = placement.area();
        let round = self.compact(&mut placement);
        if round.moved == 0 {
            return 0;
        }
        let rebuilt = placement_to_tree(&placement, ConversionAlgo::Heuristic);
        let packed = evaluator.evaluate(&rebuilt, shapes).placement;
        if definitely_less(packed.area(), area) {
            *tree = rebuilt;
            round.moved
        } else {
            0
        }
    }

    // Slides every block towards the origin along one axis. Returns the
    // support of each block.
    fn sweep(&self, placement: &mut Placement, horizontal: bool) -> Vec<Option<usize>> {
        let n = placement.len();
        let lead = |r: &Rect| if horizontal { r.x } else { r.y };

        // blocks first on ties so an obstacle never lands under a block that
        // starts at the same coordinate
        let mut items: Vec<(f64, usize)> = placement
            .blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (lead(&b.rect()), i))
            .chain(
                self.obstacles
                    .iter()
                    .enumerate()
                    .map(|(k, o)| (lead(o), n + k)),
            )
            .collect();
        items.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut support = vec![None; n];
        let mut skyline = Skyline::new(0.0);
        for (_, item) in items {
            let rect = if item < n {
                placement.blocks[item].rect()
            } else {
                self.obstacles[item - n]
            };
            let (lo, hi, size) = if horizontal {
                (rect.y, rect.y_max(), rect.width)
            } else {
                (rect.x, rect.x_max(), rect.height)
            };
            if item < n {
                let (level, owner) = skyline.max_over(lo, hi);
                let block = &mut placement.blocks[item];
                if horizontal {
                    block.x = level;
                } else {
                    block.y = level;
                }
                support[item] = owner.filter(|&o| o < n);
                skyline.raise(lo, hi, level + size, Some(item));
            } else {
                let far = if horizontal { rect.x_max() } else { rect.y_max() };
                skyline.raise(lo, hi, far, Some(item));
            }
        }
        support
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Orientation;
    use crate::solution::PlacedBlock;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn placed(x: f64, y: f64, w: f64, h: f64) -> PlacedBlock {
        PlacedBlock::new(x, y, w, h, Orientation::N)
    }

    #[test]
    fn slides_to_the_origin() {
        let mut p = Placement::new(vec![placed(5.0, 7.0, 10.0, 10.0), placed(30.0, 2.0, 10.0, 10.0)]);
        let round = Compactor::new().compact(&mut p);
        assert_eq!(round.moved, 2);
        assert_eq!((p.blocks[0].x, p.blocks[0].y), (0.0, 0.0));
        assert_eq!((p.blocks[1].x, p.blocks[1].y), (10.0, 0.0));
        assert_eq!(round.left_support, vec![None, Some(0)]);
        assert_eq!((p.width, p.height), (20.0, 10.0));
    }

    #[test]
    fn stops_at_obstacles() {
        let compactor = Compactor::with_obstacles(vec![Rect::new(0.0, 0.0, 5.0, 20.0)]);
        let mut p = Placement::new(vec![placed(12.0, 3.0, 10.0, 10.0)]);
        compactor.compact(&mut p);
        assert_eq!((p.blocks[0].x, p.blocks[0].y), (5.0, 0.0));
        assert!(!p.overlaps_any(&[Rect::new(0.0, 0.0, 5.0, 20.0)]));
    }

    #[test]
    fn compaction_is_idempotent_at_fixed_point() {
        let mut rng = StdRng::seed_from_u64(23);
        let compactor = Compactor::new();
        for _ in 0..10 {
            // scatter squares on a coarse grid, then compact
            let blocks: Vec<PlacedBlock> = (0..12)
                .map(|i| {
                    let (gx, gy) = ((i % 4) as f64, (i / 4) as f64);
                    placed(
                        gx * 20.0 + rng.gen_range(0.0..5.0),
                        gy * 20.0 + rng.gen_range(0.0..5.0),
                        rng.gen_range(5.0..15.0),
                        rng.gen_range(5.0..15.0),
                    )
                })
                .collect();
            let mut p = Placement::new(blocks);
            compactor.compact_to_fixed_point(&mut p, DEFAULT_COMPACTION_ROUNDS);
            assert!(!p.has_overlap());
            let snapshot = p.clone();
            assert_eq!(compactor.compact(&mut p).moved, 0);
            assert!(p.same_coordinates(&snapshot));
        }
    }

    #[test]
    fn compact_tree_never_grows_the_packing() {
        let mut rng = StdRng::seed_from_u64(8);
        let dims: Vec<(f64, f64)> = (0..15)
            .map(|_| (rng.gen_range(2.0..12.0), rng.gen_range(2.0..12.0)))
            .collect();
        let shapes = ShapeTable::from_dims(&dims);
        let mut evaluator = ContourEvaluator::new();
        let compactor = Compactor::new();
        for _ in 0..10 {
            let mut tree = BTree::random(15, &mut rng);
            let before = evaluator.evaluate(&tree, &shapes).placement.area();
            compactor.compact_tree(&mut tree, &shapes, &mut evaluator);
            tree.validate().unwrap();
            let after = evaluator.evaluate(&tree, &shapes).placement.area();
            assert!(after <= before + 1e-9);
        }
    }
}
