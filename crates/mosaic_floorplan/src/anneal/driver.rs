//! The annealing loop, generic over the solution encoding.

use super::moves::{soft_width, MoveContext, MoveKind, MoveSelection, MoveStats};
use super::objective::{Objective, Snapshot};
use super::schedule::Schedule;
use super::{AnnealParams, AnnealPhase};
use crate::compact::{Compactor, DEFAULT_COMPACTION_ROUNDS};
use crate::shape::ShapeTable;
use crate::solution::Placement;
use mosaic_common::definitely_less;
use mosaic_config::Representation;
use rand::rngs::StdRng;
use rand::Rng;

/// A solution encoding the annealer can perturb and evaluate.
///
/// The driver keeps two states: the current one and a candidate rebuilt
/// from it with `clone_from` before every move, so a rejected move never
/// needs undoing.
pub(crate) trait AnnealState: Clone {
    /// Evaluator buffers reused across evaluations.
    type Scratch;

    const REPRESENTATION: Representation;
    const SCHEDULE: Schedule;
    /// Scale of the aspect-ratio term of the objective.
    const AR_SCALE: f64;
    /// Whether the fixed-outline wirelength blend uses wasted area.
    const WASTED_AREA_BLEND: bool;

    fn scratch(ctx: &MoveContext<'_>) -> Self::Scratch;

    /// A random, evaluated starting solution.
    fn seed(
        ctx: &MoveContext<'_>,
        shapes: ShapeTable,
        scratch: &mut Self::Scratch,
        rng: &mut StdRng,
    ) -> Self;

    fn select_move(ctx: &MoveContext<'_>, sel: &MoveSelection, rng: &mut StdRng) -> MoveKind;

    /// Applies a move of `kind` without evaluating. Returns `false` when no
    /// legal move of that kind exists.
    fn apply(&mut self, kind: MoveKind, ctx: &MoveContext<'_>, rng: &mut StdRng) -> bool;

    /// Gives soft block `block` the width `width` in its current orientation.
    fn reshape(&mut self, block: usize, width: f64);

    fn evaluate(&mut self, scratch: &mut Self::Scratch);

    fn placement(&self) -> &Placement;

    fn shapes(&self) -> &ShapeTable;
}

/// What one annealing run produced.
#[derive(Debug, Clone)]
pub(crate) struct RunResult {
    pub placement: Placement,
    pub success: bool,
    pub moves: u64,
    pub stats: MoveStats,
    pub phase: AnnealPhase,
}

/// Anneals from a random seed of encoding `S`.
pub(crate) fn anneal<S: AnnealState>(
    ctx: &MoveContext<'_>,
    params: &AnnealParams,
    shapes: ShapeTable,
    rng: &mut StdRng,
) -> RunResult {
    let objective = Objective {
        min_wirelength: ctx.min_wirelength,
        outline: ctx.outline,
        area_weight: params.area_weight,
        wire_weight: params.wire_weight,
        ar_scale: S::AR_SCALE,
        start_temperature: params.start_temperature,
        block_area: shapes.block_area(),
        wasted_area_blend: S::WASTED_AREA_BLEND,
    };
    let mut phase = AnnealPhase::Uninitialized;
    let mut scratch = S::scratch(ctx);
    let mut current = S::seed(ctx, shapes, &mut scratch, rng);
    phase.advance(AnnealPhase::Seeded);

    let mut curr = objective.snapshot(ctx.db, current.placement());
    let mut candidate = current.clone();
    let mut best: Option<(Snapshot, S)> = None;
    if objective.improves_best(&curr, None) {
        best = Some((curr, current.clone()));
    }
    let mut least = ctx
        .outline
        .map(|outline| (curr.violation(&outline), current.clone()));

    let n = current.placement().len();
    let moves_per_temperature = S::SCHEDULE.moves_per_temperature(n);
    let mut temperature = params.start_temperature;
    let mut step = 0;
    let mut moves: u64 = 0;
    let mut stats = MoveStats::default();

    phase.advance(AnnealPhase::Annealing);
    'cooling: loop {
        // one last round at or below T_cool accepts improvements only
        let greedy = temperature <= params.cool_temperature;
        if greedy {
            phase.advance(AnnealPhase::Greedy);
        }
        for _ in 0..moves_per_temperature {
            let sel = MoveSelection {
                temperature,
                step,
                aspect_ratio: curr.aspect_ratio(),
            };
            let kind = S::select_move(ctx, &sel, rng);
            moves += 1;

            let accepted = if kind == MoveKind::SoftPack {
                pack_soft(ctx, &mut current, &mut candidate, &mut scratch);
                curr = objective.snapshot(ctx.db, current.placement());
                true
            } else {
                candidate.clone_from(&current);
                if candidate.apply(kind, ctx, rng) {
                    candidate.evaluate(&mut scratch);
                    let next = objective.snapshot(ctx.db, candidate.placement());
                    let delta = objective.delta(&curr, &next, temperature);

                    let accept = delta < 0.0
                        || (!greedy && rng.gen::<f64>() < (-delta / temperature).exp());
                    if accept {
                        std::mem::swap(&mut current, &mut candidate);
                        curr = next;
                    }
                    accept
                } else {
                    // nothing to move: a no-op, trivially accepted
                    true
                }
            };
            stats.record(kind, accepted);

            if objective.improves_best(&curr, best.as_ref().map(|(s, _)| s)) {
                best = Some((curr, current.clone()));
            }
            if let (Some(outline), Some((violation, state))) = (&ctx.outline, &mut least) {
                let v = curr.violation(outline);
                if v < *violation {
                    *violation = v;
                    state.clone_from(&current);
                }
            }
            if objective.is_done(&curr, temperature) {
                break 'cooling;
            }
        }

        if greedy || params.max_moves.is_some_and(|max| moves >= max) {
            break;
        }
        temperature *= S::SCHEDULE.alpha(temperature);
        step += 1;
    }
    phase.advance(AnnealPhase::Converged);

    let chosen = match (best, least) {
        (Some((_, state)), _) => state,
        (None, Some((_, state))) => state,
        (None, None) => current,
    };
    let mut placement = chosen.placement().clone();
    if params.compact {
        compact_within_outline(ctx, &mut placement);
    }

    RunResult {
        success: ctx.outline.map_or(true, |o| placement.fits(&o)),
        placement,
        moves,
        stats,
        phase,
    }
}

/// Two rounds of reshaping soft blocks, alternating the axis. A reshape is
/// kept only when it shrinks the packing.
fn pack_soft<S: AnnealState>(
    ctx: &MoveContext<'_>,
    current: &mut S,
    candidate: &mut S,
    scratch: &mut S::Scratch,
) {
    for round in 0..2 {
        let horizontal = round % 2 == 0;
        let slacks = ctx.slacks.evaluate(current.placement());
        for block in slacks.sorted_by(horizontal) {
            let Some(width) =
                soft_width(ctx, current.shapes(), current.placement(), &slacks, block)
            else {
                continue;
            };
            candidate.clone_from(current);
            candidate.reshape(block, width);
            candidate.evaluate(scratch);
            if definitely_less(candidate.placement().area(), current.placement().area()) {
                std::mem::swap(current, candidate);
            }
        }
    }
}

/// Compacts `placement` towards the origin unless that would lose an
/// outline fit it already has.
pub(crate) fn compact_within_outline(ctx: &MoveContext<'_>, placement: &mut Placement) {
    let mut compacted = placement.clone();
    Compactor::with_obstacles(ctx.db.obstacle_rects())
        .compact_to_fixed_point(&mut compacted, DEFAULT_COMPACTION_ROUNDS);
    let keep = match &ctx.outline {
        Some(outline) => compacted.fits(outline) || !placement.fits(outline),
        None => true,
    };
    if keep {
        *placement = compacted;
    }
}
