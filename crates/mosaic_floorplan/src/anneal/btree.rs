//! Annealing over packing trees.

use super::driver::AnnealState;
use super::moves::{
    critical_block, random_orientation, random_other, search_blocks, slack_pair, slackest,
    soft_resize_target, MoveContext, MoveKind, MoveSelection,
};
use super::schedule::Schedule;
use crate::packing::{BTree, ContourEvaluator};
use crate::shape::ShapeTable;
use crate::solution::Placement;
use mosaic_config::Representation;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// A packing tree with its shapes and its evaluated packing.
#[derive(Debug)]
pub(crate) struct TreeState {
    tree: BTree,
    shapes: ShapeTable,
    placement: Placement,
}

impl Clone for TreeState {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            shapes: self.shapes.clone(),
            placement: self.placement.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.tree.clone_from(&source.tree);
        self.shapes.clone_from(&source.shapes);
        self.placement.clone_from(&source.placement);
    }
}

impl TreeState {
    /// The tree of this state.
    pub(crate) fn tree(&self) -> &BTree {
        &self.tree
    }

    fn plain_move(rng: &mut StdRng) -> MoveKind {
        match rng.gen_range(0..3) {
            0 => MoveKind::Swap,
            1 => MoveKind::Rotate,
            _ => MoveKind::Relocate,
        }
    }
}

impl AnnealState for TreeState {
    type Scratch = ContourEvaluator;

    const REPRESENTATION: Representation = Representation::Tree;
    const SCHEDULE: Schedule = Schedule::TREE;
    const AR_SCALE: f64 = 20.0;
    const WASTED_AREA_BLEND: bool = true;

    fn scratch(ctx: &MoveContext<'_>) -> ContourEvaluator {
        ContourEvaluator::with_obstacles(ctx.db.obstacle_rects(), ctx.outline)
    }

    fn seed(
        ctx: &MoveContext<'_>,
        shapes: ShapeTable,
        scratch: &mut ContourEvaluator,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = BTree::random(shapes.len(), rng);
        for (block, &orient) in ctx.orients.iter().enumerate() {
            tree.set_orient(block, orient);
        }
        let mut state = Self {
            tree,
            shapes,
            placement: Placement::default(),
        };
        state.evaluate(scratch);
        state
    }

    fn select_move(ctx: &MoveContext<'_>, sel: &MoveSelection, rng: &mut StdRng) -> MoveKind {
        let master = if ctx.soft_blocks && sel.temperature < 50.0 {
            rng.gen_range(0..1000)
        } else {
            0
        };
        let pick = rng.gen_range(0..1000);
        let fixed = ctx.outline.is_some();

        if ctx.soft_blocks && master == 1 {
            MoveKind::SoftPack
        } else if ctx.soft_blocks && master > 950 {
            MoveKind::SoftResize
        } else if fixed && sel.step % 4 == 0 && ctx.ar_off_target(sel.aspect_ratio) {
            MoveKind::AspectRatio
        } else if pick < 150 {
            if fixed {
                MoveKind::AspectRatio
            } else {
                Self::plain_move(rng)
            }
        } else if pick < 300 && ctx.min_wirelength {
            if fixed {
                MoveKind::ArWirelength
            } else {
                MoveKind::Wirelength
            }
        } else {
            Self::plain_move(rng)
        }
    }

    fn apply(&mut self, kind: MoveKind, ctx: &MoveContext<'_>, rng: &mut StdRng) -> bool {
        let n = self.tree.len();
        if n == 0 {
            return false;
        }
        match kind {
            MoveKind::Swap => {
                let a = rng.gen_range(0..n);
                let Some(b) = random_other(n, a, rng) else {
                    return false;
                };
                self.tree.swap(a, b);
                true
            }
            MoveKind::Rotate => {
                let block = rng.gen_range(0..n);
                let orient = random_orientation(self.tree.orient(block), rng);
                self.tree.rotate(block, orient, &self.shapes)
            }
            MoveKind::Relocate => {
                let block = rng.gen_range(0..n);
                let Some(target) = random_other(n, block, rng) else {
                    return false;
                };
                self.tree.relocate(block, target, rng.gen())
            }
            MoveKind::AspectRatio => {
                let horizontal = ctx.too_wide(self.placement.aspect_ratio());
                let slacks = ctx.slacks.evaluate(&self.placement);
                match slack_pair(&slacks, horizontal, rng) {
                    Some((operand, target)) => self.tree.relocate(operand, target, horizontal),
                    None => false,
                }
            }
            MoveKind::Wirelength => {
                let operand = rng.gen_range(0..n);
                let near = search_blocks(ctx, &self.placement, operand);
                let target = match near.choose(rng) {
                    Some(&t) => t,
                    None => match random_other(n, operand, rng) {
                        Some(t) => t,
                        None => return false,
                    },
                };
                self.tree.relocate(operand, target, rng.gen())
            }
            MoveKind::ArWirelength => {
                let horizontal = ctx.too_wide(self.placement.aspect_ratio());
                let slacks = ctx.slacks.evaluate(&self.placement);
                let order = slacks.sorted_by(horizontal);
                let Some(operand) = critical_block(&slacks, &order, horizontal, rng) else {
                    return false;
                };
                let near = search_blocks(ctx, &self.placement, operand);
                let target = match slackest(&slacks, horizontal, &near) {
                    Some(t) => t,
                    None => match random_other(n, operand, rng) {
                        Some(t) => t,
                        None => return false,
                    },
                };
                self.tree.relocate(operand, target, horizontal)
            }
            MoveKind::SoftResize => {
                match soft_resize_target(ctx, &self.shapes, &self.placement, rng) {
                    Some((block, width)) => {
                        self.reshape(block, width);
                        true
                    }
                    None => false,
                }
            }
            MoveKind::SoftPack => false,
        }
    }

    fn reshape(&mut self, block: usize, width: f64) {
        let orient = self.tree.orient(block);
        self.shapes.resize(block, orient, width);
    }

    fn evaluate(&mut self, scratch: &mut ContourEvaluator) {
        self.placement = scratch.evaluate(&self.tree, &self.shapes).placement;
    }

    fn placement(&self) -> &Placement {
        &self.placement
    }

    fn shapes(&self) -> &ShapeTable {
        &self.shapes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Block, FloorplanDb, Net, NetPin};
    use crate::geom::Orientation;
    use crate::slack::SlackEvaluator;
    use crate::solution::OutlineTarget;
    use rand::SeedableRng;

    fn squares(n: usize) -> FloorplanDb {
        let mut db = FloorplanDb::new();
        let ids: Vec<_> = (0..n)
            .map(|i| db.add_block(Block::hard(format!("b{i}"), 10.0, 10.0 + i as f64)))
            .collect();
        for pair in ids.windows(2) {
            db.add_net(Net::new("n", vec![NetPin::center(pair[0]), NetPin::center(pair[1])]))
                .unwrap();
        }
        db
    }

    fn context(db: &FloorplanDb, outline: Option<OutlineTarget>) -> MoveContext<'_> {
        MoveContext {
            db,
            block_nets: db.block_nets(),
            outline,
            slacks: SlackEvaluator::new(),
            min_wirelength: true,
            soft_blocks: false,
            orients: vec![Orientation::N; db.block_count()],
        }
    }

    #[test]
    fn every_move_keeps_the_packing_legal() {
        let db = squares(8);
        let outline = OutlineTarget {
            width: 30.0,
            height: 40.0,
        };
        let ctx = context(&db, Some(outline));
        let mut rng = StdRng::seed_from_u64(5);
        let mut scratch = TreeState::scratch(&ctx);
        let mut state =
            TreeState::seed(&ctx, ShapeTable::from_db(&db, false), &mut scratch, &mut rng);
        for kind in MoveKind::ALL.iter().cycle().take(200) {
            let mut next = state.clone();
            if next.apply(*kind, &ctx, &mut rng) {
                next.evaluate(&mut scratch);
                assert!(next.tree().validate().is_ok());
                assert!(!next.placement().has_overlap(), "{kind} overlapped");
                state = next;
            }
        }
    }

    #[test]
    fn soft_pack_is_left_to_the_driver() {
        let db = squares(3);
        let ctx = context(&db, None);
        let mut rng = StdRng::seed_from_u64(1);
        let mut scratch = TreeState::scratch(&ctx);
        let mut state =
            TreeState::seed(&ctx, ShapeTable::from_db(&db, false), &mut scratch, &mut rng);
        assert!(!state.apply(MoveKind::SoftPack, &ctx, &mut rng));
    }

    #[test]
    fn free_outline_never_selects_outline_moves() {
        let db = squares(4);
        let ctx = context(&db, None);
        let mut rng = StdRng::seed_from_u64(9);
        for step in 0..500 {
            let sel = MoveSelection {
                temperature: 100.0,
                step,
                aspect_ratio: 3.0,
            };
            let kind = TreeState::select_move(&ctx, &sel, &mut rng);
            assert!(!matches!(
                kind,
                MoveKind::AspectRatio | MoveKind::ArWirelength | MoveKind::SoftPack
            ));
        }
    }

    #[test]
    fn off_target_outline_forces_aspect_ratio_moves_every_fourth_step() {
        let db = squares(4);
        let outline = OutlineTarget {
            width: 20.0,
            height: 20.0,
        };
        let ctx = context(&db, Some(outline));
        let mut rng = StdRng::seed_from_u64(2);
        let sel = MoveSelection {
            temperature: 100.0,
            step: 8,
            aspect_ratio: 4.0,
        };
        for _ in 0..50 {
            assert_eq!(
                TreeState::select_move(&ctx, &sel, &mut rng),
                MoveKind::AspectRatio
            );
        }
    }

    #[test]
    fn clone_from_copies_everything() {
        let db = squares(5);
        let ctx = context(&db, None);
        let mut rng = StdRng::seed_from_u64(4);
        let mut scratch = TreeState::scratch(&ctx);
        let a = TreeState::seed(&ctx, ShapeTable::from_db(&db, false), &mut scratch, &mut rng);
        let mut b = TreeState::seed(&ctx, ShapeTable::from_db(&db, false), &mut scratch, &mut rng);
        b.clone_from(&a);
        assert_eq!(b.tree(), a.tree());
        assert_eq!(b.placement(), a.placement());
    }
}
