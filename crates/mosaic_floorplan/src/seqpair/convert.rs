//! Conversions between placements, sequence pairs and B*-trees.

use crate::geom::{Orientation, Rect};
use crate::packing::{BTree, ContourEvaluator};
use crate::seqpair::SeqPair;
use crate::shape::ShapeTable;
use crate::solution::{PlacedBlock, Placement};
use mosaic_common::{approx_eq, EPSILON};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};

/// How a placement is turned into a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConversionAlgo {
    /// Normalize through the sequence pair first, then build the tree.
    #[default]
    Tcg,
    /// Build the tree directly from adjacency in the placement.
    Heuristic,
}

// How two rectangles are separated. A diagonal pair is separated along
// both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Separation {
    left: bool,
    right: bool,
    below: bool,
    above: bool,
}

impl Separation {
    fn of(a: &Rect, b: &Rect) -> Self {
        Self {
            left: b.x - a.x_max() >= -EPSILON,
            right: a.x - b.x_max() >= -EPSILON,
            below: b.y - a.y_max() >= -EPSILON,
            above: a.y - b.y_max() >= -EPSILON,
        }
    }

    fn is_overlap(self) -> bool {
        !(self.left || self.right || self.below || self.above)
    }
}

// Whether `a` must precede `b` in X. Lower-left diagonal pairs are left free:
// either order yields a relation that holds.
fn forced_x(a: usize, b: usize, rects: &[Rect]) -> bool {
    let s = Separation::of(&rects[a], &rects[b]);
    if s.is_overlap() {
        return match overlap_relation(a, b, rects) {
            (true, first) => first,
            (false, below) => !below,
        };
    }
    (s.left && !s.below) || (s.above && !s.right)
}

// Whether `a` must precede `b` in Y. Upper-left diagonal pairs are left free.
fn forced_y(a: usize, b: usize, rects: &[Rect]) -> bool {
    let s = Separation::of(&rects[a], &rects[b]);
    if s.is_overlap() {
        return overlap_relation(a, b, rects).1;
    }
    (s.left && !s.above) || (s.below && !s.right)
}

// Relation assigned to an overlapping pair from the centers:
// (horizontal, a left of b) or (vertical, a below b).
fn overlap_relation(a: usize, b: usize, rects: &[Rect]) -> (bool, bool) {
    let (ca, cb) = (rects[a].center(), rects[b].center());
    let horizontal = (ca.x - cb.x).abs() >= (ca.y - cb.y).abs();
    let first = if horizontal {
        (ca.x, a) < (cb.x, b)
    } else {
        (ca.y, a) < (cb.y, b)
    };
    (horizontal, first)
}

fn ordered(n: usize, before: impl Fn(usize, usize) -> bool, key: impl Fn(usize) -> f64) -> Vec<usize> {
    let mut graph = DiGraph::<usize, ()>::with_capacity(n, n * n.saturating_sub(1) / 2);
    let nodes: Vec<_> = (0..n).map(|i| graph.add_node(i)).collect();
    for a in 0..n {
        for b in 0..n {
            if a != b && before(a, b) {
                graph.add_edge(nodes[a], nodes[b], ());
            }
        }
    }
    match toposort(&graph, None) {
        Ok(sorted) => sorted.into_iter().map(|node| graph[node]).collect(),
        Err(_) => {
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| key(a).total_cmp(&key(b)).then(a.cmp(&b)));
            order
        }
    }
}

/// Derives a sequence pair whose relations hold in `placement`.
///
/// For an overlap-free placement, evaluating the result never makes the
/// packing wider or taller.
pub fn placement_to_seqpair(placement: &Placement) -> SeqPair {
    let n = placement.len();
    let rects: Vec<Rect> = placement.blocks.iter().map(PlacedBlock::rect).collect();
    let x = ordered(
        n,
        |a, b| forced_x(a, b, &rects),
        |i| rects[i].center().x - rects[i].center().y,
    );
    let y = ordered(
        n,
        |a, b| forced_y(a, b, &rects),
        |i| rects[i].center().x + rects[i].center().y,
    );
    SeqPair { x, y }
}

/// Builds a B*-tree reproducing `placement` as closely as possible.
///
/// On a bottom-left compacted placement the tree packs to the same
/// coordinates. Blocks the tree cannot reach at their own x are attached to
/// the free slot nearest to it.
pub fn placement_to_tree(placement: &Placement, algo: ConversionAlgo) -> BTree {
    match algo {
        ConversionAlgo::Heuristic => tree_from_adjacency(placement),
        ConversionAlgo::Tcg => {
            let sp = placement_to_seqpair(placement);
            let dims: Vec<(f64, f64)> = placement
                .blocks
                .iter()
                .map(|b| (b.width, b.height))
                .collect();
            let coords = sp.coordinates(&dims);
            let normalized = Placement::new(
                placement
                    .blocks
                    .iter()
                    .zip(coords)
                    .map(|(b, (x, y))| PlacedBlock::new(x, y, b.width, b.height, b.orient))
                    .collect(),
            );
            tree_from_adjacency(&normalized)
        }
    }
}

/// The tree of the packing of a sequence pair.
///
/// The tree packs to the same coordinates when the sequence pair's packing
/// is bottom-left compacted.
pub fn seqpair_to_tree(
    sp: &SeqPair,
    shapes: &ShapeTable,
    orients: &[Orientation],
) -> BTree {
    tree_from_adjacency(&sp.evaluate(shapes, orients))
}

/// The sequence pair of the packing of a tree.
pub fn tree_to_seqpair(tree: &BTree, shapes: &ShapeTable) -> SeqPair {
    let packing = ContourEvaluator::new().evaluate(tree, shapes);
    placement_to_seqpair(&packing.placement)
}

enum Step {
    Visit(usize),
    ClaimRight(usize),
}

// Claims blocks in preorder. A block is claimed only after every block under
// it, so nothing above it is on the contour when it is packed: claimed blocks
// keep their x and never land higher than in the input.
fn tree_from_adjacency(placement: &Placement) -> BTree {
    let n = placement.len();
    let mut tree = BTree::unlinked(n);
    for (i, b) in placement.blocks.iter().enumerate() {
        tree.set_orient(i, b.orient);
    }
    if n == 0 {
        return tree;
    }
    let rects: Vec<Rect> = placement.blocks.iter().map(PlacedBlock::rect).collect();
    let under: Vec<Vec<usize>> = (0..n)
        .map(|b| {
            (0..n)
                .filter(|&c| {
                    c != b
                        && rects[c].y < rects[b].y
                        && rects[c].x < rects[b].x_max() - EPSILON
                        && rects[b].x < rects[c].x_max() - EPSILON
                })
                .collect()
        })
        .collect();
    let mut assigned = vec![false; n];

    let lowest_ready = |assigned: &[bool], pred: &dyn Fn(&Rect) -> bool| -> Option<usize> {
        (0..n)
            .filter(|&i| !assigned[i] && pred(&rects[i]))
            .filter(|&i| under[i].iter().all(|&c| assigned[c]))
            .min_by(|&a, &b| {
                rects[a]
                    .y
                    .total_cmp(&rects[b].y)
                    .then(rects[a].x.total_cmp(&rects[b].x))
            })
    };

    let root = lowest_ready(&assigned, &|r| approx_eq(r.x, 0.0))
        .or_else(|| lowest_ready(&assigned, &|_| true))
        .unwrap_or(0);
    assigned[root] = true;
    let wall = tree.left_wall();
    tree.link(wall, root, true);

    let mut stack = vec![Step::Visit(root)];
    while let Some(step) = stack.pop() {
        match step {
            Step::Visit(v) => {
                stack.push(Step::ClaimRight(v));
                let edge = rects[v].x_max();
                if let Some(l) = lowest_ready(&assigned, &|r| approx_eq(r.x, edge)) {
                    assigned[l] = true;
                    tree.link(v, l, true);
                    stack.push(Step::Visit(l));
                }
            }
            Step::ClaimRight(v) => {
                let column = rects[v].x;
                if let Some(r) = lowest_ready(&assigned, &|r| approx_eq(r.x, column)) {
                    assigned[r] = true;
                    tree.link(v, r, false);
                    stack.push(Step::Visit(r));
                }
            }
        }
    }

    let mut leftovers: Vec<usize> = (0..n).filter(|&i| !assigned[i]).collect();
    leftovers.sort_by(|&a, &b| {
        rects[a]
            .x
            .total_cmp(&rects[b].x)
            .then(rects[a].y.total_cmp(&rects[b].y))
    });
    for block in leftovers {
        let target = rects[block].x;
        let mut best: Option<(f64, usize, bool)> = None;
        for v in (0..n).filter(|&v| assigned[v]) {
            let node = tree.node(tree.position_of(v));
            let slots = [
                (node.left.is_none(), rects[v].x_max(), true),
                (node.right.is_none(), rects[v].x, false),
            ];
            for (free, x, as_left) in slots {
                let gap = (x - target).abs();
                if free && best.map_or(true, |(g, _, _)| gap < g) {
                    best = Some((gap, v, as_left));
                }
            }
        }
        if let Some((_, v, as_left)) = best {
            tree.link(tree.position_of(v), block, as_left);
            assigned[block] = true;
        }
    }
    debug_assert!(tree.validate().is_ok());
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compact::Compactor;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn squares(n: usize) -> ShapeTable {
        ShapeTable::from_dims(&vec![(10.0, 10.0); n])
    }

    #[test]
    fn forced_orders_from_geometry() {
        let rects = [
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(10.0, 5.0, 5.0, 5.0),
            Rect::new(2.0, 10.0, 5.0, 5.0),
            Rect::new(30.0, 12.0, 5.0, 5.0),
            Rect::new(30.0, -12.0, 5.0, 5.0),
        ];
        // left of 1: first in both
        assert!(forced_x(0, 1, &rects) && forced_y(0, 1, &rects));
        // below 2: after in X, first in Y
        assert!(forced_x(2, 0, &rects) && forced_y(0, 2, &rects));
        // lower-left of 3: Y forced, X free
        assert!(forced_y(0, 3, &rects));
        assert!(!forced_x(0, 3, &rects) && !forced_x(3, 0, &rects));
        // upper-left of 4: X forced, Y free
        assert!(forced_x(0, 4, &rects));
        assert!(!forced_y(0, 4, &rects) && !forced_y(4, 0, &rects));
    }

    #[test]
    fn overlapping_pairs_are_ordered_one_way() {
        let rects = [Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(0.0, 0.0, 10.0, 10.0)];
        assert_ne!(forced_x(0, 1, &rects), forced_x(1, 0, &rects));
        assert_ne!(forced_y(0, 1, &rects), forced_y(1, 0, &rects));
    }

    #[test]
    fn seqpair_round_trip_on_grid() {
        let sp = SeqPair::new(vec![2, 0, 3, 1], vec![0, 1, 2, 3]).unwrap();
        let placement = sp.evaluate(&squares(4), &[Orientation::N; 4]);
        let back = placement_to_seqpair(&placement);
        let again = back.evaluate(&squares(4), &[Orientation::N; 4]);
        assert!(placement.same_coordinates(&again));
    }

    #[test]
    fn seqpair_conversion_never_grows() {
        let mut rng = StdRng::seed_from_u64(21);
        let dims: Vec<(f64, f64)> = (0..15)
            .map(|_| (rng.gen_range(2.0..12.0), rng.gen_range(2.0..12.0)))
            .collect();
        let shapes = ShapeTable::from_dims(&dims);
        for _ in 0..20 {
            let tree = BTree::random(15, &mut rng);
            let packing = ContourEvaluator::new().evaluate(&tree, &shapes);
            let sp = placement_to_seqpair(&packing.placement);
            let p = sp.evaluate(&shapes, &[Orientation::N; 15]);
            assert!(p.width <= packing.placement.width + 1e-6);
            assert!(p.height <= packing.placement.height + 1e-6);
            assert!(!p.has_overlap());
        }
    }

    #[test]
    fn tree_from_grid_reproduces_it() {
        let sp = SeqPair::new(vec![2, 0, 3, 1], vec![0, 1, 2, 3]).unwrap();
        let shapes = squares(4);
        let tree = seqpair_to_tree(&sp, &shapes, &[Orientation::N; 4]);
        tree.validate().unwrap();
        let p = ContourEvaluator::new().evaluate(&tree, &shapes).placement;
        assert_eq!((p.width, p.height), (20.0, 20.0));
        let back = tree_to_seqpair(&tree, &shapes);
        let again = back.evaluate(&shapes, &[Orientation::N; 4]);
        assert_eq!((again.width, again.height), (20.0, 20.0));
    }

    #[test]
    fn compacted_packings_survive_the_round_trip() {
        let compactor = Compactor::new();
        let mut evaluator = ContourEvaluator::new();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let n = rng.gen_range(2..=12);
            let dims: Vec<(f64, f64)> = (0..n)
                .map(|_| (rng.gen_range(1..=20) as f64, rng.gen_range(1..=20) as f64))
                .collect();
            let shapes = ShapeTable::from_dims(&dims);
            let orients = vec![Orientation::N; n];
            let tree = BTree::random(n, &mut rng);
            let mut compacted = evaluator.evaluate(&tree, &shapes).placement;
            compactor.compact_to_fixed_point(&mut compacted, 64);

            let sp = placement_to_seqpair(&compacted);
            let from_sp = sp.evaluate(&shapes, &orients);
            assert!(from_sp.same_coordinates(&compacted), "seed {seed}");

            let rebuilt = seqpair_to_tree(&sp, &shapes, &orients);
            rebuilt.validate().unwrap();
            let from_tree = evaluator.evaluate(&rebuilt, &shapes).placement;
            assert!(from_tree.same_coordinates(&compacted), "seed {seed}");

            let again = tree_to_seqpair(&rebuilt, &shapes).evaluate(&shapes, &orients);
            assert_eq!(
                (again.width, again.height),
                (from_sp.width, from_sp.height),
                "seed {seed}"
            );
        }
    }

    #[test]
    fn block_waits_for_everything_under_it() {
        // 4 shares a column with 1 but rests on 0, which overhangs 1
        let dims = [(8.0, 5.0), (5.0, 3.0), (6.0, 4.0), (6.0, 4.0), (2.0, 2.0)];
        let corners = [(0.0, 4.0), (6.0, 0.0), (0.0, 0.0), (0.0, 9.0), (6.0, 9.0)];
        let placement = Placement::new(
            dims.iter()
                .zip(corners)
                .map(|(&(w, h), (x, y))| PlacedBlock::new(x, y, w, h, Orientation::N))
                .collect(),
        );
        let tree = placement_to_tree(&placement, ConversionAlgo::Heuristic);
        tree.validate().unwrap();
        let packed = ContourEvaluator::new()
            .evaluate(&tree, &ShapeTable::from_dims(&dims))
            .placement;
        assert!(packed.same_coordinates(&placement));
    }

    #[test]
    fn uncompacted_packings_never_grow() {
        let mut rng = StdRng::seed_from_u64(31);
        let dims: Vec<(f64, f64)> = (0..10)
            .map(|_| (rng.gen_range(1..=20) as f64, rng.gen_range(1..=20) as f64))
            .collect();
        let shapes = ShapeTable::from_dims(&dims);
        let orients = vec![Orientation::N; 10];
        for _ in 0..50 {
            let sp = SeqPair::random(10, &mut rng);
            let packed = sp.evaluate(&shapes, &orients);
            let tree = seqpair_to_tree(&sp, &shapes, &orients);
            let p = ContourEvaluator::new().evaluate(&tree, &shapes).placement;
            assert!(!p.has_overlap());
            assert!(p.width <= packed.width + 1e-9);
            assert!(p.height <= packed.height + 1e-9);
        }
    }

    #[test]
    fn tree_conversion_of_packings_is_valid() {
        let mut rng = StdRng::seed_from_u64(4);
        let dims: Vec<(f64, f64)> = (0..12)
            .map(|_| (rng.gen_range(2.0..12.0), rng.gen_range(2.0..12.0)))
            .collect();
        let shapes = ShapeTable::from_dims(&dims);
        let mut evaluator = ContourEvaluator::new();
        for _ in 0..20 {
            let tree = BTree::random(12, &mut rng);
            let p = evaluator.evaluate(&tree, &shapes).placement;
            let rebuilt = placement_to_tree(&p, ConversionAlgo::Heuristic);
            rebuilt.validate().unwrap();
            let q = evaluator.evaluate(&rebuilt, &shapes).placement;
            assert!(!q.has_overlap());
            assert_eq!(q.len(), p.len());
        }
    }

    #[test]
    fn tcg_path_produces_valid_tree() {
        let placement = Placement::new(vec![
            PlacedBlock::new(3.0, 4.0, 10.0, 10.0, Orientation::N),
            PlacedBlock::new(20.0, 2.0, 10.0, 10.0, Orientation::E),
            PlacedBlock::new(5.0, 30.0, 10.0, 10.0, Orientation::N),
        ]);
        let tree = placement_to_tree(&placement, ConversionAlgo::Tcg);
        tree.validate().unwrap();
        assert_eq!(tree.orient(1), Orientation::E);
        let p = ContourEvaluator::new()
            .evaluate(&tree, &squares(3))
            .placement;
        assert!(p.width <= 30.0 + 1e-9);
        assert!(!p.has_overlap());
    }
}
