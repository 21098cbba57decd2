//! Move kinds, move statistics, and the slack- and wirelength-guided choices
//! shared by both encodings.

use crate::cost;
use crate::data::{FloorplanDb, NetPin};
use crate::geom::{Orientation, Point};
use crate::ids::NetId;
use crate::shape::ShapeTable;
use crate::slack::{SlackEvaluator, Slacks};
use crate::solution::{OutlineTarget, Placement};
use mosaic_common::EPSILON;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of perturbation the annealer applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKind {
    /// Exchange two blocks.
    Swap,
    /// Move one block next to another.
    Relocate,
    /// Change one block's orientation.
    Rotate,
    /// Move a critical block next to a block with slack, towards the target
    /// aspect ratio.
    AspectRatio,
    /// Move a critical block next to the slackest block near its
    /// wirelength-optimal location.
    ArWirelength,
    /// Move a block next to a block near its wirelength-optimal location.
    Wirelength,
    /// Reshape one soft block.
    SoftResize,
    /// Reshape every soft block that shrinks the packing.
    SoftPack,
}

impl MoveKind {
    /// All kinds, in statistics order.
    pub const ALL: [MoveKind; 8] = [
        MoveKind::Swap,
        MoveKind::Relocate,
        MoveKind::Rotate,
        MoveKind::AspectRatio,
        MoveKind::ArWirelength,
        MoveKind::Wirelength,
        MoveKind::SoftResize,
        MoveKind::SoftPack,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MoveKind::Swap => "swap",
            MoveKind::Relocate => "relocate",
            MoveKind::Rotate => "rotate",
            MoveKind::AspectRatio => "aspect-ratio",
            MoveKind::ArWirelength => "aspect-ratio/wirelength",
            MoveKind::Wirelength => "wirelength",
            MoveKind::SoftResize => "soft-resize",
            MoveKind::SoftPack => "soft-pack",
        };
        f.write_str(name)
    }
}

/// Attempted and accepted counts per move kind.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveStats {
    attempted: [u64; 8],
    accepted: [u64; 8],
}

impl MoveStats {
    /// Records one attempt.
    pub fn record(&mut self, kind: MoveKind, accepted: bool) {
        self.attempted[kind.index()] += 1;
        if accepted {
            self.accepted[kind.index()] += 1;
        }
    }

    /// Attempts of `kind`.
    pub fn attempted(&self, kind: MoveKind) -> u64 {
        self.attempted[kind.index()]
    }

    /// Accepted attempts of `kind`.
    pub fn accepted(&self, kind: MoveKind) -> u64 {
        self.accepted[kind.index()]
    }

    /// Attempts of every kind.
    pub fn total_attempted(&self) -> u64 {
        self.attempted.iter().sum()
    }

    /// Accepted attempts of every kind.
    pub fn total_accepted(&self) -> u64 {
        self.accepted.iter().sum()
    }

    /// Adds the counts of `other`.
    pub fn merge(&mut self, other: &MoveStats) {
        for i in 0..MoveKind::ALL.len() {
            self.attempted[i] += other.attempted[i];
            self.accepted[i] += other.accepted[i];
        }
    }
}

/// Where the annealer stands when it picks a move.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MoveSelection {
    pub temperature: f64,
    /// Number of completed temperature steps.
    pub step: usize,
    /// Aspect ratio of the current packing.
    pub aspect_ratio: f64,
}

/// Read-only data every move may consult.
pub(crate) struct MoveContext<'a> {
    pub db: &'a FloorplanDb,
    pub block_nets: Vec<Vec<NetId>>,
    pub outline: Option<OutlineTarget>,
    pub slacks: SlackEvaluator,
    pub min_wirelength: bool,
    pub soft_blocks: bool,
    /// Starting orientation of each block.
    pub orients: Vec<Orientation>,
}

impl MoveContext<'_> {
    /// Returns `true` if the packing aspect ratio is off the outline's.
    pub fn ar_off_target(&self, aspect_ratio: f64) -> bool {
        match &self.outline {
            Some(o) => {
                let r = o.aspect_ratio();
                ((aspect_ratio - r) / r).abs() > 0.00005
            }
            None => false,
        }
    }

    /// Whether the packing should get narrower (move blocks into
    /// horizontal slack) to approach the outline.
    pub fn too_wide(&self, aspect_ratio: f64) -> bool {
        self.outline
            .as_ref()
            .is_some_and(|o| aspect_ratio > o.aspect_ratio())
    }
}

/// Weighted centroid of the pins that share a net with `block`, excluding
/// the block's own pins.
pub(crate) fn optimal_location(
    ctx: &MoveContext<'_>,
    placement: &Placement,
    block: usize,
) -> Option<Point> {
    let (mut sx, mut sy, mut sw) = (0.0, 0.0, 0.0);
    for &net_id in &ctx.block_nets[block] {
        let net = ctx.db.net(net_id);
        let w = net.weight();
        for pin in &net.pins {
            if matches!(pin, NetPin::Block { block: b, .. } if b.index() == block) {
                continue;
            }
            let p = cost::pin_location(ctx.db, placement, pin);
            sx += w * p.x;
            sy += w * p.y;
            sw += w;
        }
    }
    (sw > 0.0).then(|| Point::new(sx / sw, sy / sw))
}

/// Blocks whose centers lie near the optimal location of `block`.
///
/// The search radius grows in steps of `max(W, H) / sqrt(n)` and stops
/// after `ceil(n / 5)` steps or `ceil(n / 5)` blocks.
pub(crate) fn search_blocks(
    ctx: &MoveContext<'_>,
    placement: &Placement,
    block: usize,
) -> Vec<usize> {
    let n = placement.len();
    let mut found = Vec::new();
    if n < 2 {
        return found;
    }
    let Some(ideal) = optimal_location(ctx, placement, block) else {
        return found;
    };
    let unit = placement.width.max(placement.height) / (n as f64).sqrt();
    let limit = n.div_ceil(5);
    let mut seen = vec![false; n];
    seen[block] = true;

    let mut radius = 0.0;
    for _ in 0..limit {
        if found.len() >= limit {
            break;
        }
        radius += unit;
        for j in 0..n {
            if found.len() >= limit {
                break;
            }
            if !seen[j] && placement.blocks[j].center().distance(ideal) < radius {
                seen[j] = true;
                found.push(j);
            }
        }
    }
    found
}

/// A uniformly random block other than `exclude`.
pub(crate) fn random_other(n: usize, exclude: usize, rng: &mut impl Rng) -> Option<usize> {
    if n < 2 {
        return None;
    }
    let pick = rng.gen_range(0..n - 1);
    Some(if pick >= exclude { pick + 1 } else { pick })
}

fn slack_values(slacks: &Slacks, horizontal: bool) -> &[f64] {
    if horizontal {
        &slacks.x
    } else {
        &slacks.y
    }
}

/// A critical block: one of the `ceil(n / 5)` least slack blocks, walked
/// down to a block without slack.
pub(crate) fn critical_block(
    slacks: &Slacks,
    order: &[usize],
    horizontal: bool,
    rng: &mut impl Rng,
) -> Option<usize> {
    let values = slack_values(slacks, horizontal);
    let n = order.len();
    if n == 0 {
        return None;
    }
    let range = n.div_ceil(5);
    let mut ptr = rng.gen_range(0..range);
    while ptr > 0 && values[order[ptr]] > EPSILON {
        ptr -= 1;
    }
    Some(order[ptr])
}

/// A critical block and a block with room next to it, both drawn from the
/// ends of the slack order.
pub(crate) fn slack_pair(
    slacks: &Slacks,
    horizontal: bool,
    rng: &mut impl Rng,
) -> Option<(usize, usize)> {
    let values = slack_values(slacks, horizontal);
    let order = slacks.sorted_by(horizontal);
    let n = order.len();
    if n < 2 {
        return None;
    }
    let operand = critical_block(slacks, &order, horizontal, rng)?;

    let range = n.div_ceil(5);
    let mut ptr = n - 1 - rng.gen_range(0..range);
    while ptr < n - 1 && values[order[ptr]] <= EPSILON {
        ptr += 1;
    }
    let target = order[ptr];
    (operand != target).then_some((operand, target))
}

/// The block of `candidates` with the most slack (first on ties).
pub(crate) fn slackest(slacks: &Slacks, horizontal: bool, candidates: &[usize]) -> Option<usize> {
    let values = slack_values(slacks, horizontal);
    let mut best: Option<usize> = None;
    for &c in candidates {
        if best.map_or(true, |b| values[c] > values[b]) {
            best = Some(c);
        }
    }
    best
}

/// Slack left along one axis once the excess over the outline is paid.
fn normalized_slack(
    ctx: &MoveContext<'_>,
    placement: &Placement,
    slack: f64,
    horizontal: bool,
) -> f64 {
    match &ctx.outline {
        Some(o) if horizontal => slack - (placement.width - o.width),
        Some(o) => slack - (placement.height - o.height),
        None => slack,
    }
}

/// Aspect ratio bounds of `block` in its current orientation, narrowed to
/// `[1/3, 3]` under a fixed outline.
fn soft_bounds(
    ctx: &MoveContext<'_>,
    shapes: &ShapeTable,
    placement: &Placement,
    block: usize,
) -> (f64, f64) {
    let (lo, hi) = shapes.ar_bounds(block, placement.blocks[block].orient);
    if ctx.outline.is_some() {
        (lo.max(1.0 / 3.0), hi.min(3.0))
    } else {
        (lo, hi)
    }
}

/// The first soft block, in ascending slack order along `horizontal`, that
/// has room in the orthogonal direction and may still be reshaped.
pub(crate) fn soft_candidate(
    ctx: &MoveContext<'_>,
    shapes: &ShapeTable,
    placement: &Placement,
    slacks: &Slacks,
    horizontal: bool,
) -> Option<usize> {
    let orth = slack_values(slacks, !horizontal);
    slacks.sorted_by(horizontal).into_iter().find(|&i| {
        if !shapes.is_soft(i) {
            return false;
        }
        let b = &placement.blocks[i];
        let (min_ar, max_ar) = shapes.ar_bounds(i, b.orient);
        let ar = b.width / b.height;
        let adjustable = if horizontal {
            ar > min_ar + EPSILON
        } else {
            ar < max_ar - EPSILON
        };
        adjustable && normalized_slack(ctx, placement, orth[i], !horizontal) > EPSILON
    })
}

/// New width of soft block `block`: stretched along the axis with more
/// normalized slack, within its aspect ratio bounds.
pub(crate) fn soft_width(
    ctx: &MoveContext<'_>,
    shapes: &ShapeTable,
    placement: &Placement,
    slacks: &Slacks,
    block: usize,
) -> Option<f64> {
    if !shapes.is_soft(block) {
        return None;
    }
    let b = &placement.blocks[block];
    let area = shapes.shape(block).area;
    let (min_ar, max_ar) = soft_bounds(ctx, shapes, placement, block);
    if min_ar > max_ar {
        return None;
    }
    let (min_w, max_w) = ((area * min_ar).sqrt(), (area * max_ar).sqrt());
    let (min_h, max_h) = ((area / max_ar).sqrt(), (area / min_ar).sqrt());

    let nsx = normalized_slack(ctx, placement, slacks.x[block], true);
    let nsy = normalized_slack(ctx, placement, slacks.y[block], false);
    let width = if nsx > nsy {
        (b.width + nsx).min(max_w).max(min_w)
    } else {
        area / (b.height + nsy).min(max_h).max(min_h)
    };
    ((width - b.width).abs() > EPSILON).then_some(width)
}

/// A soft block and its new width, trying the random axis first.
pub(crate) fn soft_resize_target(
    ctx: &MoveContext<'_>,
    shapes: &ShapeTable,
    placement: &Placement,
    rng: &mut impl Rng,
) -> Option<(usize, f64)> {
    let slacks = ctx.slacks.evaluate(placement);
    let horizontal = rng.gen_bool(0.5);
    let block = soft_candidate(ctx, shapes, placement, &slacks, horizontal)
        .or_else(|| soft_candidate(ctx, shapes, placement, &slacks, !horizontal))?;
    let width = soft_width(ctx, shapes, placement, &slacks, block)?;
    Some((block, width))
}

/// A new orientation for `current`: a random one, turned a further quarter
/// when the draw repeats the current orientation.
pub(crate) fn random_orientation(current: Orientation, rng: &mut impl Rng) -> Orientation {
    let o = Orientation::from_index(rng.gen_range(0..8));
    if o == current {
        o.rotated_quarter()
    } else {
        o
    }
}
