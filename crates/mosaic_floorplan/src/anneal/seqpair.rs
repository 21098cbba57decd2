//! Annealing over sequence pairs.

use super::driver::AnnealState;
use super::moves::{
    critical_block, random_orientation, random_other, search_blocks, slack_pair, slackest,
    soft_resize_target, MoveContext, MoveKind, MoveSelection,
};
use super::schedule::Schedule;
use crate::geom::{Direction, Orientation};
use crate::seqpair::SeqPair;
use crate::shape::ShapeTable;
use crate::solution::Placement;
use mosaic_config::Representation;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// A sequence pair with per-block orientations, shapes, and its packing.
#[derive(Debug)]
pub(crate) struct SeqPairState {
    pair: SeqPair,
    orients: Vec<Orientation>,
    shapes: ShapeTable,
    placement: Placement,
}

impl Clone for SeqPairState {
    fn clone(&self) -> Self {
        Self {
            pair: self.pair.clone(),
            orients: self.orients.clone(),
            shapes: self.shapes.clone(),
            placement: self.placement.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.pair.clone_from(&source.pair);
        self.orients.clone_from(&source.orients);
        self.shapes.clone_from(&source.shapes);
        self.placement.clone_from(&source.placement);
    }
}

impl SeqPairState {
    // The side of `target` a block lands on to relieve the critical axis.
    fn side(horizontal: bool) -> Direction {
        if horizontal {
            Direction::Right
        } else {
            Direction::Up
        }
    }
}

impl AnnealState for SeqPairState {
    type Scratch = ();

    const REPRESENTATION: Representation = Representation::SequencePair;
    const SCHEDULE: Schedule = Schedule::SEQUENCE_PAIR;
    const AR_SCALE: f64 = 10.0;
    const WASTED_AREA_BLEND: bool = false;

    fn scratch(_ctx: &MoveContext<'_>) -> Self::Scratch {}

    fn seed(ctx: &MoveContext<'_>, shapes: ShapeTable, scratch: &mut (), rng: &mut StdRng) -> Self {
        let mut state = Self {
            pair: SeqPair::random(shapes.len(), rng),
            orients: ctx.orients.clone(),
            shapes,
            placement: Placement::default(),
        };
        state.evaluate(scratch);
        state
    }

    fn select_move(ctx: &MoveContext<'_>, sel: &MoveSelection, rng: &mut StdRng) -> MoveKind {
        let master = if ctx.soft_blocks && sel.temperature < 30.0 {
            rng.gen_range(0..1000)
        } else {
            0
        };
        let pick = rng.gen_range(0..1000);
        let fixed = ctx.outline.is_some();

        if ctx.soft_blocks && master > 990 {
            MoveKind::SoftPack
        } else if ctx.soft_blocks && master > 930 {
            MoveKind::SoftResize
        } else if fixed && sel.step % 4 == 0 && ctx.ar_off_target(sel.aspect_ratio) {
            MoveKind::AspectRatio
        } else if pick < 150 && ctx.min_wirelength && fixed {
            MoveKind::ArWirelength
        } else if pick < 300 && ctx.min_wirelength {
            MoveKind::Wirelength
        } else if pick < 500 {
            MoveKind::Rotate
        } else if rng.gen_bool(0.5) {
            MoveKind::Swap
        } else {
            MoveKind::Relocate
        }
    }

    fn apply(&mut self, kind: MoveKind, ctx: &MoveContext<'_>, rng: &mut StdRng) -> bool {
        let n = self.pair.len();
        if n == 0 {
            return false;
        }
        match kind {
            MoveKind::Swap => {
                if rng.gen_bool(0.5) {
                    return self.pair.near_swap(rng).is_some();
                }
                let a = rng.gen_range(0..n);
                let Some(b) = random_other(n, a, rng) else {
                    return false;
                };
                self.pair.swap_blocks(a, b);
                true
            }
            MoveKind::Rotate => {
                let block = rng.gen_range(0..n);
                if !self.shapes.can_rotate(block) {
                    return false;
                }
                self.orients[block] = random_orientation(self.orients[block], rng);
                true
            }
            MoveKind::Relocate => {
                let block = rng.gen_range(0..n);
                let Some(anchor) = random_other(n, block, rng) else {
                    return false;
                };
                let side = Direction::ALL[rng.gen_range(0..4)];
                self.pair.place_next_to(block, anchor, side);
                true
            }
            MoveKind::AspectRatio => {
                let horizontal = ctx.too_wide(self.placement.aspect_ratio());
                let slacks = ctx.slacks.evaluate(&self.placement);
                match slack_pair(&slacks, horizontal, rng) {
                    Some((operand, target)) => {
                        self.pair
                            .place_next_to(operand, target, Self::side(horizontal));
                        true
                    }
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
                self.pair
                    .place_next_to(operand, target, Self::side(rng.gen()));
                true
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
                self.pair
                    .place_next_to(operand, target, Self::side(horizontal));
                true
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
        self.shapes.resize(block, self.orients[block], width);
    }

    fn evaluate(&mut self, _scratch: &mut ()) {
        self.placement = self.pair.evaluate(&self.shapes, &self.orients);
    }

    fn placement(&self) -> &Placement {
        &self.placement
    }

    fn shapes(&self) -> &ShapeTable {
        &self.shapes
    }
}
