//! Simulated-annealing floorplanning.
//!
//! An [`Annealer`] starts from a random solution in one of two encodings (a
//! packing tree or a sequence pair), repeatedly perturbs it, and accepts or
//! rejects each perturbation with the Metropolis criterion. The temperature
//! falls geometrically with a piecewise cooling factor. The objective blends
//! packing area, weighted wirelength and distance to the target aspect ratio,
//! depending on whether a fixed outline is required and whether wirelength
//! is minimized.
//!
//! With [`Representation::Auto`] the encoding is picked per instance, and a
//! run that misses its outline may be retried once in the other encoding.

pub(crate) mod btree;
pub(crate) mod driver;
pub mod moves;
pub mod objective;
pub mod schedule;
pub(crate) mod seqpair;

pub use moves::{MoveKind, MoveStats};
pub use objective::{Objective, Snapshot};
pub use schedule::Schedule;

use crate::cost;
use crate::data::FloorplanDb;
use crate::diagnostics::REPRESENTATION_SWITCH;
use crate::error::{FloorplanError, FloorplanResult};
use crate::packing::{BTree, ContourEvaluator};
use crate::shape::ShapeTable;
use crate::slack::SlackEvaluator;
use crate::solution::{OutlineTarget, Placement};
use btree::TreeState;
use driver::RunResult;
use mosaic_config::{OutlineChoice, Representation, ResolvedOptions};
use mosaic_diagnostics::{Diagnostic, DiagnosticSink};
use moves::MoveContext;
use rand::rngs::StdRng;
use rand::SeedableRng;
use seqpair::SeqPairState;
use serde::{Deserialize, Serialize};

/// The outline an annealing run must respect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Outline {
    /// No outline; the packing only gets smaller.
    Free,
    /// Outline derived from an aspect ratio (width / height) and the
    /// whitespace budget.
    AspectRatio(f64),
    /// An explicit box.
    Fixed {
        /// Box width.
        width: f64,
        /// Box height.
        height: f64,
    },
}

/// Progress of one annealing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnnealPhase {
    /// Nothing has been built yet.
    Uninitialized,
    /// A random starting solution exists.
    Seeded,
    /// The cooling loop is running.
    Annealing,
    /// The closing round below the cooling temperature, accepting only
    /// improving moves, is running.
    Greedy,
    /// The cooling loop has finished.
    Converged,
}

impl AnnealPhase {
    /// Moves to `next`, which must come later.
    pub(crate) fn advance(&mut self, next: AnnealPhase) {
        debug_assert!(next > *self, "anneal phase {self:?} cannot go to {next:?}");
        *self = next;
    }
}

/// Parameters of an annealing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnealParams {
    /// Solution encoding.
    pub representation: Representation,
    /// Whether wirelength joins the objective.
    pub min_wirelength: bool,
    /// Outline to respect.
    pub outline: Outline,
    /// Whitespace budget in percent of the block area.
    pub max_whitespace: f64,
    /// RNG seed, `None` for OS entropy.
    pub seed: Option<u64>,
    /// Initial temperature.
    pub start_temperature: f64,
    /// Temperature at which cooling stops.
    pub cool_temperature: f64,
    /// Move budget, checked once per temperature step.
    pub max_moves: Option<u64>,
    /// Weight of the area term.
    pub area_weight: f64,
    /// Weight of the wirelength term.
    pub wire_weight: f64,
    /// Whether soft blocks may be reshaped.
    pub soft_blocks: bool,
    /// Whether every block keeps its orientation.
    pub no_rotation: bool,
    /// Whether the result is compacted towards the origin.
    pub compact: bool,
    /// Largest block count for which `Auto` prefers the sequence pair.
    pub seqpair_block_threshold: usize,
    /// How often `Auto` may change encoding after missing the outline.
    pub max_representation_switches: usize,
}

impl Default for AnnealParams {
    fn default() -> Self {
        Self::from_options(&ResolvedOptions::default())
    }
}

impl AnnealParams {
    /// Parameters of a flat run with the given options.
    pub fn from_options(options: &ResolvedOptions) -> Self {
        Self {
            representation: options.representation,
            min_wirelength: options.minimize_wirelength,
            outline: match options.outline {
                OutlineChoice::Free => Outline::Free,
                OutlineChoice::AspectRatio(r) => Outline::AspectRatio(r),
            },
            max_whitespace: options.max_whitespace,
            seed: options.seed,
            start_temperature: options.anneal.start_temperature,
            cool_temperature: options.anneal.cool_temperature,
            max_moves: options.anneal.max_moves,
            area_weight: options.anneal.area_weight,
            wire_weight: options.anneal.wire_weight,
            soft_blocks: options.soft_blocks,
            no_rotation: options.no_rotation,
            compact: options.compact,
            seqpair_block_threshold: options.anneal.seqpair_block_threshold,
            max_representation_switches: 1,
        }
    }

    /// The outline a packing of `block_area` must fit, if any.
    pub fn required_outline(&self, block_area: f64) -> FloorplanResult<Option<OutlineTarget>> {
        match self.outline {
            Outline::Free => Ok(None),
            Outline::AspectRatio(r) => {
                if !(r > 0.0) {
                    return Err(FloorplanError::InvalidOutline {
                        width: r,
                        height: 1.0,
                    });
                }
                Ok(Some(OutlineTarget::from_aspect_ratio(
                    block_area,
                    r,
                    self.max_whitespace,
                )))
            }
            Outline::Fixed { width, height } => {
                if !(width > 0.0 && height > 0.0) {
                    return Err(FloorplanError::InvalidOutline { width, height });
                }
                Ok(Some(OutlineTarget { width, height }))
            }
        }
    }
}

/// The result of an annealing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnealOutcome {
    /// The chosen placement, indexed like the database blocks.
    pub placement: Placement,
    /// Whether the placement fits the outline (always with a free outline).
    pub success: bool,
    /// Encoding that produced the placement.
    pub representation: Representation,
    /// Moves attempted over every run.
    pub moves: u64,
    /// Per-kind move counts over every run.
    pub stats: MoveStats,
    /// Phase the last run finished in.
    pub phase: AnnealPhase,
    /// Weighted wirelength of the placement.
    pub hpwl: f64,
    /// Number of encoding changes after missed outlines.
    pub switches: usize,
}

/// Runs simulated annealing on a whole database.
#[derive(Debug, Clone, Default)]
pub struct Annealer {
    params: AnnealParams,
}

impl Annealer {
    /// Creates an annealer with the given parameters.
    pub fn new(params: AnnealParams) -> Self {
        Self { params }
    }

    /// The parameters of this annealer.
    pub fn params(&self) -> &AnnealParams {
        &self.params
    }

    /// Anneals `db` with an RNG seeded from the parameters.
    pub fn run(&self, db: &FloorplanDb, sink: &DiagnosticSink) -> FloorplanResult<AnnealOutcome> {
        let mut rng = match self.params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.run_with_rng(db, &mut rng, sink)
    }

    /// Anneals `db` drawing every random choice from `rng`.
    ///
    /// The database is only read; the placement is returned in the outcome.
    pub fn run_with_rng(
        &self,
        db: &FloorplanDb,
        rng: &mut StdRng,
        sink: &DiagnosticSink,
    ) -> FloorplanResult<AnnealOutcome> {
        db.validate()?;
        let p = &self.params;
        let mut shapes = ShapeTable::from_db(db, p.no_rotation);
        if !p.soft_blocks {
            shapes.freeze_soft();
        }
        let outline = p.required_outline(shapes.block_area())?;
        let ctx = MoveContext {
            db,
            block_nets: db.block_nets(),
            outline,
            slacks: SlackEvaluator::with_obstacles(db.obstacle_rects()),
            min_wirelength: p.min_wirelength,
            soft_blocks: p.soft_blocks && shapes.has_soft(),
            orients: db.blocks.iter().map(|b| b.orient).collect(),
        };
        let n = shapes.len();
        let mut representation = self.pick_representation(n, &ctx, sink);

        if n < 2 {
            let placement = match n {
                0 => Placement::default(),
                _ => place_single(&ctx, shapes),
            };
            return Ok(AnnealOutcome {
                success: outline.map_or(true, |o| placement.fits(&o)),
                hpwl: cost::total_hpwl(db, &placement),
                placement,
                representation,
                moves: 0,
                stats: MoveStats::default(),
                phase: AnnealPhase::Converged,
                switches: 0,
            });
        }

        let mut result = self.run_once(representation, &ctx, &shapes, rng);
        let mut moves = result.moves;
        let mut stats = result.stats.clone();
        let mut used = representation;
        let mut switches = 0;

        while !result.success
            && p.representation == Representation::Auto
            && switches < p.max_representation_switches
        {
            let next = match representation {
                Representation::SequencePair => Representation::Tree,
                _ if db.obstacles.is_empty() => Representation::SequencePair,
                _ => break,
            };
            switches += 1;
            sink.emit(Diagnostic::note(
                REPRESENTATION_SWITCH,
                format!("{representation} missed the outline, retrying with {next}"),
            ));
            representation = next;

            let retry = self.run_once(representation, &ctx, &shapes, rng);
            moves += retry.moves;
            stats.merge(&retry.stats);
            let better = match &outline {
                Some(o) => {
                    retry.success || retry.placement.violation(o) < result.placement.violation(o)
                }
                None => true,
            };
            if better {
                result = retry;
                used = representation;
            }
        }

        Ok(AnnealOutcome {
            hpwl: cost::total_hpwl(db, &result.placement),
            placement: result.placement,
            success: result.success,
            representation: used,
            moves,
            stats,
            phase: result.phase,
            switches,
        })
    }

    fn pick_representation(
        &self,
        blocks: usize,
        ctx: &MoveContext<'_>,
        sink: &DiagnosticSink,
    ) -> Representation {
        let p = &self.params;
        let wanted = match p.representation {
            Representation::Auto => {
                let prefers_pair = ctx.outline.is_some()
                    || p.min_wirelength
                    || p.max_whitespace >= 10.0;
                if blocks <= p.seqpair_block_threshold && prefers_pair {
                    Representation::SequencePair
                } else {
                    Representation::Tree
                }
            }
            chosen => chosen,
        };
        if wanted == Representation::SequencePair && !ctx.db.obstacles.is_empty() {
            sink.emit(
                Diagnostic::note(
                    REPRESENTATION_SWITCH,
                    "sequence pairs cannot pack around obstacles, using the packing tree",
                )
                .with_note(format!("{} obstacles present", ctx.db.obstacles.len())),
            );
            return Representation::Tree;
        }
        wanted
    }

    fn run_once(
        &self,
        representation: Representation,
        ctx: &MoveContext<'_>,
        shapes: &ShapeTable,
        rng: &mut StdRng,
    ) -> RunResult {
        match representation {
            Representation::SequencePair => {
                driver::anneal::<SeqPairState>(ctx, &self.params, shapes.clone(), rng)
            }
            Representation::Tree | Representation::Auto => {
                driver::anneal::<TreeState>(ctx, &self.params, shapes.clone(), rng)
            }
        }
    }
}

/// Places a lone block: its own orientation or a quarter turn, whichever
/// misses the outline by less (then has less wirelength). A soft block is
/// first shaped towards the outline's aspect ratio.
fn place_single(ctx: &MoveContext<'_>, mut shapes: ShapeTable) -> Placement {
    let orient = ctx.orients[0];
    let reshapes = ctx.soft_blocks && shapes.is_soft(0);
    if let Some(outline) = ctx.outline.filter(|_| reshapes) {
        let (lo, hi) = shapes.ar_bounds(0, orient);
        let ar = outline.aspect_ratio().max(lo).min(hi);
        let width = (shapes.shape(0).area * ar).sqrt();
        shapes.resize(0, orient, width);
    }

    let mut candidates = vec![orient];
    if shapes.can_rotate(0) {
        candidates.push(orient.rotated_quarter());
    }

    let mut evaluator = ContourEvaluator::with_obstacles(ctx.db.obstacle_rects(), ctx.outline);
    let mut best: Option<((f64, f64), Placement)> = None;
    for candidate in candidates {
        let mut tree = BTree::chain(1);
        tree.set_orient(0, candidate);
        let placement = evaluator.evaluate(&tree, &shapes).placement;
        let key = (
            ctx.outline.map_or(0.0, |o| placement.violation(&o)),
            cost::total_hpwl(ctx.db, &placement),
        );
        if best.as_ref().map_or(true, |(k, _)| key < *k) {
            best = Some((key, placement));
        }
    }
    best.map(|(_, p)| p).unwrap_or_default()
}
