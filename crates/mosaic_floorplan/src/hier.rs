//! Hierarchical floorplanning for instances too large to anneal flat.
//!
//! Blocks are grouped into clusters, each multi-block cluster becomes a soft
//! super-block, and the cluster-level problem is annealed. Every cluster is
//! then solved again inside the box it was given, with the other clusters
//! seen as terminals at their box centers. Cluster sub-problems are
//! independent and may run in parallel; each gets its own RNG seeded from
//! the parent's. A final legalization clears whatever overlap the boxes
//! could not absorb.

use crate::anneal::{AnnealOutcome, AnnealParams, Annealer, Outline};
use crate::cluster::{Clusterer, NetlistClusterer, ProximityClusterer};
use crate::compact::{Compactor, DEFAULT_COMPACTION_ROUNDS};
use crate::cost;
use crate::data::{Block, FloorplanDb, Net, NetPin, Terminal};
use crate::diagnostics::{
    HIERARCHY_FALLBACK, LEGALIZER_UNRESOLVED, REPRESENTATION_SWITCH, WHITESPACE_SHRINK,
};
use crate::error::FloorplanResult;
use crate::geom::{Point, Rect};
use crate::ids::{BlockId, TerminalId};
use crate::legalize::Legalizer;
use crate::solution::{OutlineTarget, PlacedBlock, Placement};
use mosaic_common::InternalError;
use mosaic_config::{Clustering, HierarchySettings, Representation, ResolvedOptions};
use mosaic_diagnostics::{Diagnostic, DiagnosticSink};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whitespace share (percent) given to clusters when no outline limits it.
const FREE_CLUSTER_WHITESPACE: f64 = 15.0;

/// Aspect ratio bounds of a cluster super-block.
const CLUSTER_MIN_AR: f64 = 1.0 / 3.0;
const CLUSTER_MAX_AR: f64 = 3.0;

/// The result of a hierarchical solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierOutcome {
    /// The placement, indexed like the database blocks.
    pub placement: Placement,
    /// Whether the placement fits the outline without unresolved overlap.
    pub success: bool,
    /// Encoding of the top-level anneal.
    pub representation: Representation,
    /// Moves attempted over every anneal.
    pub moves: u64,
    /// Number of top-level clusters, zero for a flat solve.
    pub clusters: usize,
    /// Factor the cluster-level blocks were shrunk by, if whitespace was
    /// insufficient.
    pub shrink_ratio: Option<f64>,
    /// Blocks the final legalization could not clear.
    pub unresolved: Vec<BlockId>,
    /// Weighted wirelength of the placement.
    pub hpwl: f64,
}

impl HierOutcome {
    fn flat(outcome: AnnealOutcome) -> Self {
        Self {
            placement: outcome.placement,
            success: outcome.success,
            representation: outcome.representation,
            moves: outcome.moves,
            clusters: 0,
            shrink_ratio: None,
            unresolved: Vec::new(),
            hpwl: outcome.hpwl,
        }
    }
}

/// Divide-and-conquer solver on top of the [`Annealer`].
#[derive(Debug, Clone)]
pub struct HierarchicalSolver {
    params: AnnealParams,
    settings: HierarchySettings,
}

/// A multi-block cluster to re-solve inside its box.
struct SubProblem {
    cluster: usize,
    frame: Rect,
    db: FloorplanDb,
    seed: u64,
}

impl HierarchicalSolver {
    /// Creates a solver.
    pub fn new(params: AnnealParams, settings: HierarchySettings) -> Self {
        Self { params, settings }
    }

    /// A solver configured from resolved options.
    pub fn from_options(options: &ResolvedOptions) -> Self {
        Self::new(
            AnnealParams::from_options(options),
            options.hierarchy.clone(),
        )
    }

    /// Annealing parameters.
    pub fn params(&self) -> &AnnealParams {
        &self.params
    }

    fn clusterer(&self) -> Box<dyn Clusterer> {
        match self.settings.clustering {
            Clustering::Netlist => Box::new(NetlistClusterer::default()),
            Clustering::Physical => Box::new(ProximityClusterer),
        }
    }

    /// Places every block of `db`. Small instances are annealed flat.
    pub fn solve(
        &self,
        db: &FloorplanDb,
        rng: &mut StdRng,
        sink: &DiagnosticSink,
    ) -> FloorplanResult<HierOutcome> {
        db.validate()?;
        let n = db.block_count();
        let max_top = self.settings.max_top_level(n).max(2);
        if n <= max_top {
            return self.flat(db, rng, sink);
        }
        let clusters = self.clusterer().cluster(db, max_top);
        if clusters.len() < 2 || clusters.len() >= n {
            return self.flat(db, rng, sink);
        }

        let outline = self.params.required_outline(db.block_area())?;
        let (cluster_db, shrink_ratio) = self.cluster_level(db, &clusters, outline)?;
        if let Some(ratio) = shrink_ratio {
            sink.emit(
                Diagnostic::warning(
                    WHITESPACE_SHRINK,
                    format!("insufficient whitespace, cluster-level blocks shrunk by {ratio:.4}"),
                )
                .with_help("raise max_whitespace or loosen the aspect ratio"),
            );
        }

        let (top, mut moves) = self.anneal_clusters(&cluster_db, outline, rng, sink)?;
        let boxes: Vec<Rect> = top
            .placement
            .blocks
            .iter()
            .map(|b| match shrink_ratio {
                Some(ratio) => grow(b.rect(), 1.0 / ratio, outline),
                None => b.rect(),
            })
            .collect();

        let (mut placement, sub_moves) = self.propagate(db, &clusters, &boxes, &top, rng, sink)?;
        moves += sub_moves;

        let unresolved = self.legalize(db, &mut placement, outline, sink);
        if self.params.compact && unresolved.is_empty() {
            let mut compacted = placement.clone();
            Compactor::with_obstacles(db.obstacle_rects())
                .compact_to_fixed_point(&mut compacted, DEFAULT_COMPACTION_ROUNDS);
            let keeps_fit = outline.map_or(true, |o| compacted.fits(&o) || !placement.fits(&o));
            if keeps_fit && !compacted.has_overlap() {
                placement = compacted;
            }
        }

        Ok(HierOutcome {
            success: unresolved.is_empty() && outline.map_or(true, |o| placement.fits(&o)),
            hpwl: cost::total_hpwl(db, &placement),
            placement,
            representation: top.representation,
            moves,
            clusters: clusters.len(),
            shrink_ratio,
            unresolved,
        })
    }

    fn flat(
        &self,
        db: &FloorplanDb,
        rng: &mut StdRng,
        sink: &DiagnosticSink,
    ) -> FloorplanResult<HierOutcome> {
        Annealer::new(self.params.clone())
            .run_with_rng(db, rng, sink)
            .map(HierOutcome::flat)
    }

    /// Builds the cluster-level database. Returns it with the shrink ratio
    /// applied when the inflated area exceeds the outline.
    fn cluster_level(
        &self,
        db: &FloorplanDb,
        clusters: &[Vec<BlockId>],
        outline: Option<OutlineTarget>,
    ) -> FloorplanResult<(FloorplanDb, Option<f64>)> {
        let whitespace = match outline {
            Some(_) => self.params.max_whitespace,
            None => self.params.max_whitespace.max(FREE_CLUSTER_WHITESPACE),
        };
        let mut level = FloorplanDb::new();
        let mut owner = vec![0; db.block_count()];
        for (c, members) in clusters.iter().enumerate() {
            for b in members {
                owner[b.index()] = c;
            }
            match members[..] {
                [only] => {
                    let mut block = db.block(only).clone();
                    block.location = None;
                    level.add_block(block);
                }
                _ => {
                    let area: f64 = members.iter().map(|&b| db.block(b).area).sum();
                    let name = format!("cluster_{c}_{}", db.block(members[0]).name);
                    level.add_block(Block::soft(
                        name,
                        area * (1.0 + whitespace / 100.0),
                        CLUSTER_MIN_AR,
                        CLUSTER_MAX_AR,
                    ));
                }
            }
        }

        let mut shrink = None;
        if let Some(o) = outline {
            let inflated = level.block_area();
            if inflated > o.area() {
                let ratio = (o.area() / inflated).sqrt();
                for block in &mut level.blocks {
                    block.width *= ratio;
                    block.height *= ratio;
                    block.area *= ratio * ratio;
                }
                shrink = Some(ratio);
            }
        }

        for terminal in &db.terminals {
            level.add_terminal(terminal.clone());
        }
        for obstacle in &db.obstacles {
            level.add_obstacle(obstacle.name.clone(), obstacle.rect);
        }
        for net in &db.nets {
            let mut pins: Vec<NetPin> = Vec::new();
            let mut seen = Vec::new();
            for pin in &net.pins {
                match *pin {
                    NetPin::Block { block, offset } => {
                        let c = owner[block.index()];
                        if seen.contains(&c) {
                            continue;
                        }
                        seen.push(c);
                        let offset = if clusters[c].len() == 1 {
                            offset
                        } else {
                            Point::default()
                        };
                        pins.push(NetPin::Block {
                            block: BlockId::from_raw(c as u32),
                            offset,
                        });
                    }
                    NetPin::Terminal(t) => pins.push(NetPin::Terminal(t)),
                }
            }
            // nets inside one cluster do not constrain the cluster level
            if pins.len() < 2 {
                continue;
            }
            let mut remapped = Net::new(net.name.clone(), pins);
            remapped.weight = net.weight;
            level.add_net(remapped)?;
        }
        Ok((level, shrink))
    }

    /// Anneals the cluster level, switching to the tree after repeated
    /// sequence-pair failures. Keeps the least-violating attempt.
    fn anneal_clusters(
        &self,
        level: &FloorplanDb,
        outline: Option<OutlineTarget>,
        rng: &mut StdRng,
        sink: &DiagnosticSink,
    ) -> FloorplanResult<(AnnealOutcome, u64)> {
        let mut params = self.params.clone();
        params.soft_blocks = true;
        params.max_representation_switches = 0;
        params.outline = match outline {
            Some(o) => Outline::Fixed {
                width: o.width,
                height: o.height,
            },
            None => Outline::Free,
        };
        params.representation = match self.params.representation {
            Representation::Tree => Representation::Tree,
            _ => Representation::SequencePair,
        };

        let mut best = Annealer::new(params.clone()).run_with_rng(level, rng, sink)?;
        let mut moves = best.moves;
        let mut failures = usize::from(!best.success);
        let attempts = self.settings.max_cluster_iterations.max(1);
        for _ in 1..attempts {
            if best.success {
                break;
            }
            if params.representation == Representation::SequencePair
                && failures >= self.settings.switch_after_failures
            {
                params.representation = Representation::Tree;
                sink.emit(Diagnostic::note(
                    REPRESENTATION_SWITCH,
                    format!(
                        "cluster level missed the outline {failures} times, \
                         switching to the packing tree"
                    ),
                ));
            }
            let attempt = Annealer::new(params.clone()).run_with_rng(level, rng, sink)?;
            moves += attempt.moves;
            if !attempt.success {
                failures += 1;
            }
            let better = match &outline {
                Some(o) => {
                    attempt.success
                        || attempt.placement.violation(o) < best.placement.violation(o)
                }
                None => false,
            };
            if better {
                best = attempt;
            }
        }
        if !best.success {
            sink.emit(
                Diagnostic::warning(
                    HIERARCHY_FALLBACK,
                    "cluster-level placement missed the outline, keeping the closest attempt",
                )
                .with_note(format!("{attempts} attempts over {} clusters", level.block_count())),
            );
        }
        Ok((best, moves))
    }

    /// Places the members of every cluster inside its box.
    fn propagate(
        &self,
        db: &FloorplanDb,
        clusters: &[Vec<BlockId>],
        boxes: &[Rect],
        top: &AnnealOutcome,
        rng: &mut StdRng,
        sink: &DiagnosticSink,
    ) -> FloorplanResult<(Placement, u64)> {
        let mut owner = vec![0; db.block_count()];
        for (c, members) in clusters.iter().enumerate() {
            for b in members {
                owner[b.index()] = c;
            }
        }
        let centers: Vec<Point> = boxes.iter().map(Rect::center).collect();

        let mut placed: Vec<Option<PlacedBlock>> = vec![None; db.block_count()];
        let mut jobs = Vec::new();
        for (c, members) in clusters.iter().enumerate() {
            let frame = boxes[c];
            match members[..] {
                [only] => {
                    let orient = top.placement.blocks[c].orient;
                    let block = db.block(only);
                    let (width, height) = if block.is_soft() {
                        (frame.width, frame.height)
                    } else {
                        block.dims_in(orient)
                    };
                    placed[only.index()] =
                        Some(PlacedBlock::new(frame.x, frame.y, width, height, orient));
                }
                _ => jobs.push(SubProblem {
                    cluster: c,
                    frame,
                    db: sub_problem(db, members, &owner, &centers, c, frame)?,
                    seed: rng.gen(),
                }),
            }
        }

        let solve = |job: &SubProblem| -> FloorplanResult<(usize, HierOutcome)> {
            let mut params = self.params.clone();
            params.outline = Outline::Fixed {
                width: job.frame.width,
                height: job.frame.height,
            };
            let mut rng = StdRng::seed_from_u64(job.seed);
            HierarchicalSolver::new(params, self.settings.clone())
                .solve(&job.db, &mut rng, sink)
                .map(|outcome| (job.cluster, outcome))
        };
        let solved: Vec<(usize, HierOutcome)> = if self.settings.parallel {
            jobs.par_iter().map(solve).collect::<FloorplanResult<_>>()?
        } else {
            jobs.iter().map(solve).collect::<FloorplanResult<_>>()?
        };

        let mut moves = 0;
        for (c, outcome) in solved {
            moves += outcome.moves;
            let frame = boxes[c];
            for (member, block) in clusters[c].iter().zip(&outcome.placement.blocks) {
                let mut block = *block;
                block.x += frame.x;
                block.y += frame.y;
                placed[member.index()] = Some(block);
            }
        }

        let blocks = placed
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| InternalError::new("cluster member left unplaced"))?;
        Ok((Placement::new(blocks), moves))
    }

    /// Clears overlaps against the outline (or unbounded space to the upper
    /// right without one). Returns the blocks left overlapping.
    fn legalize(
        &self,
        db: &FloorplanDb,
        placement: &mut Placement,
        outline: Option<OutlineTarget>,
        sink: &DiagnosticSink,
    ) -> Vec<BlockId> {
        let bounds = match outline {
            Some(o) => Rect::new(0.0, 0.0, o.width, o.height),
            None => Rect::new(0.0, 0.0, f64::INFINITY, f64::INFINITY),
        };
        let rotatable: Vec<bool> = db
            .blocks
            .iter()
            .map(|b| !(b.orient_fixed || self.params.no_rotation))
            .collect();
        let report =
            Legalizer::new(bounds).legalize_placement(placement, &db.obstacle_rects(), &rotatable);
        report
            .unresolved
            .iter()
            .map(|&i| {
                let block = &db.blocks[i];
                sink.emit(
                    Diagnostic::warning(
                        LEGALIZER_UNRESOLVED,
                        "block still overlaps after legalization",
                    )
                    .with_subject(block.name.clone()),
                );
                block.id
            })
            .collect()
    }
}

/// Scales `rect` by `factor` about its center, kept inside the outline.
fn grow(rect: Rect, factor: f64, outline: Option<OutlineTarget>) -> Rect {
    let center = rect.center();
    let width = rect.width * factor;
    let height = rect.height * factor;
    let mut x = center.x - width / 2.0;
    let mut y = center.y - height / 2.0;
    if let Some(o) = outline {
        x = x.min(o.width - width).max(0.0);
        y = y.min(o.height - height).max(0.0);
    }
    Rect::new(x, y, width, height)
}

/// The database of cluster `cluster` in the frame of its box. Pins on other
/// clusters become terminals at their box centers.
fn sub_problem(
    db: &FloorplanDb,
    members: &[BlockId],
    owner: &[usize],
    centers: &[Point],
    cluster: usize,
    frame: Rect,
) -> FloorplanResult<FloorplanDb> {
    let mut sub = FloorplanDb::new();
    let mut local = HashMap::new();
    for &b in members {
        let mut block = db.block(b).clone();
        block.location = None;
        local.insert(b, sub.add_block(block));
    }

    let mut terminals: HashMap<TerminalId, TerminalId> = HashMap::new();
    let mut outside: HashMap<usize, TerminalId> = HashMap::new();
    for net in &db.nets {
        if !net.blocks().any(|b| owner[b.index()] == cluster) {
            continue;
        }
        let mut pins = Vec::with_capacity(net.pins.len());
        for pin in &net.pins {
            let mapped = match *pin {
                NetPin::Block { block, offset } => match local.get(&block) {
                    Some(&id) => NetPin::Block { block: id, offset },
                    None => {
                        let oc = owner[block.index()];
                        let t = *outside.entry(oc).or_insert_with(|| {
                            let p = centers[oc];
                            sub.add_terminal(Terminal::new(
                                format!("cluster_{oc}"),
                                p.x - frame.x,
                                p.y - frame.y,
                            ))
                        });
                        NetPin::Terminal(t)
                    }
                },
                NetPin::Terminal(t) => {
                    let t = *terminals.entry(t).or_insert_with(|| {
                        let term = db.terminal(t);
                        sub.add_terminal(Terminal::new(
                            term.name.clone(),
                            term.position.x - frame.x,
                            term.position.y - frame.y,
                        ))
                    });
                    NetPin::Terminal(t)
                }
            };
            pins.push(mapped);
        }
        if pins.len() < 2 {
            continue;
        }
        let mut local_net = Net::new(net.name.clone(), pins);
        local_net.weight = net.weight;
        sub.add_net(local_net)?;
    }

    for obstacle in &db.obstacles {
        if obstacle.rect.overlaps(&frame) {
            sub.add_obstacle(
                obstacle.name.clone(),
                obstacle.rect.translated(-frame.x, -frame.y),
            );
        }
    }
    Ok(sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_common::approx_eq;

    /// Twelve 10x10 blocks wired as six strongly connected pairs plus a
    /// weak ring, with a pad on the left edge.
    fn paired() -> FloorplanDb {
        let mut db = FloorplanDb::new();
        let ids: Vec<_> = (0..12)
            .map(|i| db.add_block(Block::hard(format!("b{i}"), 10.0, 10.0)))
            .collect();
        let pad = db.add_terminal(Terminal::new("pad", 0.0, 20.0));
        for pair in ids.chunks(2) {
            db.add_net(
                Net::new("strong", vec![NetPin::center(pair[0]), NetPin::center(pair[1])])
                    .with_weight(5),
            )
            .unwrap();
        }
        for i in 0..12 {
            db.add_net(Net::new(
                "weak",
                vec![NetPin::center(ids[i]), NetPin::center(ids[(i + 1) % 12])],
            ))
            .unwrap();
        }
        db.add_net(Net::new("io", vec![NetPin::center(ids[0]), NetPin::Terminal(pad)]))
            .unwrap();
        db
    }

    fn settings(parallel: bool) -> HierarchySettings {
        HierarchySettings {
            max_top_level_blocks: Some(4),
            max_cluster_iterations: 2,
            switch_after_failures: 1,
            clustering: Clustering::Netlist,
            parallel,
        }
    }

    fn params(outline: Outline) -> AnnealParams {
        AnnealParams {
            representation: Representation::Auto,
            outline,
            min_wirelength: true,
            max_whitespace: 15.0,
            ..AnnealParams::default()
        }
    }

    #[test]
    fn small_instances_are_solved_flat() {
        let mut db = FloorplanDb::new();
        for i in 0..3 {
            db.add_block(Block::hard(format!("b{i}"), 10.0, 10.0));
        }
        let solver = HierarchicalSolver::new(params(Outline::Free), settings(false));
        let outcome = solver
            .solve(&db, &mut StdRng::seed_from_u64(1), &DiagnosticSink::new())
            .unwrap();
        assert_eq!(outcome.clusters, 0);
        assert!(outcome.success);
        assert!(!outcome.placement.has_overlap());
    }

    #[test]
    fn free_outline_clusters_and_legalizes() {
        let db = paired();
        let solver = HierarchicalSolver::new(params(Outline::Free), settings(false));
        let sink = DiagnosticSink::new();
        let outcome = solver
            .solve(&db, &mut StdRng::seed_from_u64(3), &sink)
            .unwrap();
        assert_eq!(outcome.clusters, 6);
        assert_eq!(outcome.placement.len(), 12);
        assert!(outcome.unresolved.is_empty());
        assert!(outcome.success);
        assert!(!outcome.placement.has_overlap());
        assert!(outcome
            .placement
            .blocks
            .iter()
            .all(|b| b.x >= 0.0 && b.y >= 0.0));
        assert!(approx_eq(outcome.hpwl, cost::total_hpwl(&db, &outcome.placement)));
    }

    #[test]
    fn parallel_and_sequential_solves_agree() {
        let db = paired();
        let sink = DiagnosticSink::new();
        let a = HierarchicalSolver::new(params(Outline::Free), settings(true))
            .solve(&db, &mut StdRng::seed_from_u64(11), &sink)
            .unwrap();
        let b = HierarchicalSolver::new(params(Outline::Free), settings(false))
            .solve(&db, &mut StdRng::seed_from_u64(11), &sink)
            .unwrap();
        assert_eq!(a.placement, b.placement);
        assert_eq!(a.moves, b.moves);
    }

    #[test]
    fn tiny_outline_shrinks_and_reports_failure() {
        let db = paired();
        let outline = Outline::Fixed {
            width: 20.0,
            height: 20.0,
        };
        let solver = HierarchicalSolver::new(params(outline), settings(false));
        let sink = DiagnosticSink::new();
        let outcome = solver
            .solve(&db, &mut StdRng::seed_from_u64(5), &sink)
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.shrink_ratio.is_some_and(|r| r < 1.0));
        // twelve 10x10 blocks cannot all sit in a 20x20 box
        assert!(!outcome.unresolved.is_empty());
        let codes: Vec<_> = sink.diagnostics().iter().map(|d| d.code).collect();
        assert!(codes.contains(&WHITESPACE_SHRINK));
        assert!(codes.contains(&LEGALIZER_UNRESOLVED));
    }

    #[test]
    fn cluster_level_drops_internal_nets() {
        let db = paired();
        let clusters: Vec<Vec<BlockId>> = (0..6)
            .map(|c| vec![BlockId::from_raw(2 * c), BlockId::from_raw(2 * c + 1)])
            .collect();
        let solver = HierarchicalSolver::new(params(Outline::Free), settings(false));
        let (level, shrink) = solver.cluster_level(&db, &clusters, None).unwrap();
        assert_eq!(shrink, None);
        assert_eq!(level.block_count(), 6);
        // six ring nets cross clusters, plus the pad net
        assert_eq!(level.net_count(), 7);
        assert!(level.blocks.iter().all(|b| b.is_soft()));
        assert!(approx_eq(level.blocks[0].area, 200.0 * 1.15));
    }

    #[test]
    fn grow_restores_size_inside_outline() {
        let outline = OutlineTarget {
            width: 20.0,
            height: 20.0,
        };
        let r = grow(Rect::new(0.0, 0.0, 5.0, 5.0), 2.0, Some(outline));
        assert_eq!(r, Rect::new(0.0, 0.0, 10.0, 10.0));
        let r = grow(Rect::new(10.0, 10.0, 5.0, 5.0), 2.0, None);
        assert_eq!(r, Rect::new(7.5, 7.5, 10.0, 10.0));
    }

    #[test]
    fn sub_problem_sees_other_clusters_as_terminals() {
        let db = paired();
        let owner: Vec<usize> = (0..12).map(|b| b / 2).collect();
        let centers: Vec<Point> = (0..6).map(|c| Point::new(c as f64 * 30.0, 5.0)).collect();
        let frame = Rect::new(30.0, 0.0, 25.0, 12.0);
        let members = [BlockId::from_raw(2), BlockId::from_raw(3)];
        let sub = sub_problem(&db, &members, &owner, &centers, 1, frame).unwrap();
        assert_eq!(sub.block_count(), 2);
        // the strong pair net and the ring nets to clusters 0 and 2
        assert_eq!(sub.net_count(), 4);
        assert_eq!(sub.terminals.len(), 2);
        assert_eq!(sub.terminals[0].position, Point::new(-30.0, 5.0));
    }
}
