//! Slack analysis of a placement.
//!
//! The slack of a block is how far it can move right (x-slack) or up
//! (y-slack) before it touches another block, an obstacle, or the edge of
//! the bounding box. Both are computed by sweeping the mirrored frame with a
//! [`Skyline`].

use crate::geom::Rect;
use crate::skyline::Skyline;
use crate::solution::Placement;
use serde::{Deserialize, Serialize};

/// Per-block slacks, indexed by block.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Slacks {
    /// Room to the right.
    pub x: Vec<f64>,
    /// Room above.
    pub y: Vec<f64>,
}

impl Slacks {
    /// Block indices ordered by ascending horizontal (or vertical) slack,
    /// ties by index.
    pub fn sorted_by(&self, horizontal: bool) -> Vec<usize> {
        let values = if horizontal { &self.x } else { &self.y };
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));
        order
    }
}

/// Computes slacks against a fixed set of obstacles.
#[derive(Clone, Debug, Default)]
pub struct SlackEvaluator {
    obstacles: Vec<Rect>,
}

impl SlackEvaluator {
    /// An evaluator without obstacles.
    pub fn new() -> Self {
        Self::default()
    }

    /// An evaluator that treats `obstacles` as blockers.
    pub fn with_obstacles(obstacles: Vec<Rect>) -> Self {
        Self { obstacles }
    }

    /// Slacks of every block of `placement`.
    pub fn evaluate(&self, placement: &Placement) -> Slacks {
        let rects: Vec<Rect> = placement.blocks.iter().map(|b| b.rect()).collect();
        Slacks {
            x: sweep(&rects, &self.obstacles, placement.width, true),
            y: sweep(&rects, &self.obstacles, placement.height, false),
        }
    }
}

// Distances towards the far edge `extent` along one axis. In the mirrored
// frame a coordinate `c` becomes `extent - c`, so items are swept from the
// far edge inwards and each block rests against the highest level over its
// cross-axis span.
fn sweep(rects: &[Rect], obstacles: &[Rect], extent: f64, horizontal: bool) -> Vec<f64> {
    // (mirrored near edge, mirrored far edge, cross lo, cross hi, block)
    let span = |r: &Rect| {
        if horizontal {
            (extent - r.x_max(), extent - r.x, r.y, r.y_max())
        } else {
            (extent - r.y_max(), extent - r.y, r.x, r.x_max())
        }
    };
    let mut items: Vec<(f64, f64, f64, f64, Option<usize>)> = rects
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let (near, far, lo, hi) = span(r);
            (near, far, lo, hi, Some(i))
        })
        .chain(obstacles.iter().map(|r| {
            let (near, far, lo, hi) = span(r);
            (near, far, lo, hi, None)
        }))
        .collect();
    items.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.4.cmp(&b.4)));

    let mut slack = vec![0.0; rects.len()];
    let mut skyline = Skyline::new(0.0);
    for (near, far, lo, hi, block) in items {
        if let Some(i) = block {
            let (level, _) = skyline.max_over(lo, hi);
            slack[i] = (near - level).max(0.0);
        }
        if far > 0.0 {
            skyline.raise(lo, hi, far, block);
        }
    }
    slack
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Orientation;
    use crate::solution::PlacedBlock;

    fn placed(x: f64, y: f64, w: f64, h: f64) -> PlacedBlock {
        PlacedBlock::new(x, y, w, h, Orientation::N)
    }

    #[test]
    fn slack_to_neighbors_and_edges() {
        // 0: tall at the left; 1: small right of it; 2: far right, tall
        let p = Placement::new(vec![
            placed(0.0, 0.0, 10.0, 30.0),
            placed(10.0, 0.0, 5.0, 5.0),
            placed(25.0, 0.0, 5.0, 20.0),
        ]);
        let slacks = SlackEvaluator::new().evaluate(&p);
        assert_eq!(slacks.x, vec![0.0, 10.0, 0.0]);
        assert_eq!(slacks.y, vec![0.0, 25.0, 10.0]);
        assert_eq!(slacks.sorted_by(true), vec![0, 2, 1]);
        assert_eq!(slacks.sorted_by(false), vec![0, 2, 1]);
    }

    #[test]
    fn obstacles_limit_slack() {
        let p = Placement::new(vec![placed(0.0, 0.0, 10.0, 10.0), placed(30.0, 0.0, 10.0, 10.0)]);
        let evaluator = SlackEvaluator::with_obstacles(vec![Rect::new(15.0, 5.0, 5.0, 5.0)]);
        let slacks = evaluator.evaluate(&p);
        assert_eq!(slacks.x[0], 5.0);
        // obstacles beyond the bounding box never count
        let far = SlackEvaluator::with_obstacles(vec![Rect::new(50.0, 0.0, 5.0, 5.0)]);
        assert_eq!(far.evaluate(&p).x[1], 0.0);
    }

    #[test]
    fn shifting_by_slack_keeps_placement_legal() {
        use crate::packing::{BTree, ContourEvaluator};
        use crate::shape::ShapeTable;
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(17);
        let dims: Vec<(f64, f64)> = (0..20)
            .map(|_| (rng.gen_range(1.0..10.0), rng.gen_range(1.0..10.0)))
            .collect();
        let shapes = ShapeTable::from_dims(&dims);
        for _ in 0..10 {
            let tree = BTree::random(20, &mut rng);
            let p = ContourEvaluator::new().evaluate(&tree, &shapes).placement;
            let slacks = SlackEvaluator::new().evaluate(&p);
            for i in 0..p.len() {
                assert!(slacks.x[i] >= 0.0 && slacks.y[i] >= 0.0);
                let mut moved = p.clone();
                moved.blocks[i].x += slacks.x[i];
                assert!(!moved.has_overlap());
                assert!(moved.blocks[i].rect().x_max() <= p.width + 1e-9);
                let mut moved = p.clone();
                moved.blocks[i].y += slacks.y[i];
                assert!(!moved.has_overlap());
            }
        }
    }
}
