//! Rectangle floorplanning engine for the Mosaic toolchain.
//!
//! This crate places a set of hard and soft rectangular blocks, connected by
//! weighted nets to each other and to fixed terminals, so that they do not
//! overlap, fit an optional outline, and keep wirelength short.
//!
//! # Pipeline
//!
//! 1. **Validate** the [`FloorplanDb`] (block shapes, unique names)
//! 2. **Anneal** a packing tree or sequence pair ([`anneal`]), directly for
//!    small instances or through clustering ([`hier`]) for large ones
//! 3. **Refine** with slack-driven compaction ([`compact`]) and overlap
//!    legalization ([`legalize`])
//! 4. **Write back** per-block location, orientation and dimensions
//!
//! Macro placement inside a core rectangle is available separately through
//! the four-quadrant [`partition::PartitionAdapter`].
//!
//! # Usage
//!
//! ```ignore
//! use mosaic_floorplan::{floorplan, Block, FloorplanDb};
//!
//! let mut db = FloorplanDb::new();
//! db.add_block(Block::hard("alu", 10.0, 10.0));
//! let report = floorplan(&mut db, &options, &sink)?;
//! assert!(db.is_fully_placed());
//! ```

#![warn(missing_docs)]

pub mod anneal;
pub mod cluster;
pub mod compact;
pub mod cost;
pub mod data;
pub mod diagnostics;
pub mod error;
pub mod geom;
pub mod hier;
pub mod ids;
pub mod legalize;
pub mod packing;
pub mod partition;
pub mod seqpair;
pub mod shape;
pub(crate) mod skyline;
pub mod slack;
pub mod solution;

pub use anneal::{AnnealOutcome, AnnealParams, Annealer, Outline};
pub use cluster::{Clusterer, NetlistClusterer, ProximityClusterer};
pub use compact::Compactor;
pub use data::{Block, FloorplanDb, Net, NetPin, Obstacle, Terminal};
pub use error::{FloorplanError, FloorplanResult};
pub use geom::{Direction, Orientation, Point, Rect};
pub use hier::{HierOutcome, HierarchicalSolver};
pub use ids::{BlockId, NetId, TerminalId};
pub use legalize::{LegalizeReport, LegalizeResult, Legalizer};
pub use packing::{BTree, ContourEvaluator};
pub use partition::{CoreEdge, Cuts, PartitionAdapter, PartitionOutcome, PartitionSet, Quadrant};
pub use seqpair::SeqPair;
pub use slack::{SlackEvaluator, Slacks};
pub use solution::{OutlineTarget, PlacedBlock, Placement};

use diagnostics::{ANNEAL_SUMMARY, INVALID_INPUT, OUTLINE_MISSED};
use mosaic_config::{Representation, ResolvedOptions};
use mosaic_diagnostics::{Diagnostic, DiagnosticSink};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Aggregate figures of a finished floorplan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloorplanReport {
    /// Bounding-box area.
    pub area: f64,
    /// Bounding-box width.
    pub width: f64,
    /// Bounding-box height.
    pub height: f64,
    /// Weighted half-perimeter wirelength.
    pub hpwl: f64,
    /// Whether the outline (if any) was met without unresolved overlap.
    pub success: bool,
    /// Encoding used by the top-level anneal.
    pub representation: Representation,
}

/// Floorplans every block of `db` and writes the result back into it.
///
/// Malformed input is reported as an `E408` diagnostic and returned as
/// [`FloorplanError::InvalidInput`] before any annealing starts. A missed
/// outline is not an error: the closest placement found is written back and
/// the report's `success` flag is cleared.
pub fn floorplan(
    db: &mut FloorplanDb,
    options: &ResolvedOptions,
    sink: &DiagnosticSink,
) -> FloorplanResult<FloorplanReport> {
    if let Err(err) = db.validate() {
        sink.emit(Diagnostic::error(INVALID_INPUT, err.to_string()));
        return Err(err);
    }

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let outcome = HierarchicalSolver::from_options(options).solve(db, &mut rng, sink)?;
    db.apply_placement(&outcome.placement)?;

    let report = FloorplanReport {
        area: outcome.placement.area(),
        width: outcome.placement.width,
        height: outcome.placement.height,
        hpwl: outcome.hpwl,
        success: outcome.success,
        representation: outcome.representation,
    };
    if !report.success {
        sink.emit(
            Diagnostic::warning(OUTLINE_MISSED, "outline not met, keeping the closest placement")
                .with_note(format!("packing is {:.3} x {:.3}", report.width, report.height)),
        );
    }
    sink.emit(Diagnostic::note(
        ANNEAL_SUMMARY,
        format!(
            "placed {} blocks with {}: {:.3} x {:.3}, hpwl {:.3}, {} moves",
            db.block_count(),
            report.representation,
            report.width,
            report.height,
            report.hpwl,
            outcome.moves
        ),
    ));
    Ok(report)
}
