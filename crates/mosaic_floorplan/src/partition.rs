//! Four-quadrant macro placement around a rectangular core.
//!
//! The core is cut into four boxes by one vertical line and one horizontal
//! line on each side of it. Several cut sets are tried: the center cuts,
//! then cuts along the macro edges when there are few macros, or on a
//! regular grid when there are many. Each box is annealed on its own, with
//! connections leaving it folded into four virtual terminals at the
//! midpoints of the core edges. Of the sets whose boxes all fit, the one
//! with the smallest weighted wirelength is kept.
//!
//! Packing grows from the origin of the annealing frame, so every box
//! except the south-west one is annealed mirrored and flipped back, which
//! packs its macros against the outer corner of the core.

use crate::anneal::{AnnealParams, Annealer, Outline};
use crate::data::{Block, FloorplanDb, Net, NetPin, Terminal};
use crate::diagnostics::QUADRANT_FAILED;
use crate::error::FloorplanResult;
use crate::geom::{Point, Rect};
use crate::ids::{BlockId, NetId, TerminalId};
use crate::solution::Placement;
use mosaic_common::{approx_eq, definitely_less, less_or_equal};
use mosaic_config::Representation;
use mosaic_diagnostics::{Diagnostic, DiagnosticSink};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A quarter of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    /// Lower left.
    SouthWest,
    /// Lower right.
    SouthEast,
    /// Upper left.
    NorthWest,
    /// Upper right.
    NorthEast,
}

impl Quadrant {
    /// Every quadrant, in solve order.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::SouthWest,
        Quadrant::SouthEast,
        Quadrant::NorthWest,
        Quadrant::NorthEast,
    ];

    fn from_sides(east: bool, north: bool) -> Quadrant {
        match (east, north) {
            (false, false) => Quadrant::SouthWest,
            (true, false) => Quadrant::SouthEast,
            (false, true) => Quadrant::NorthWest,
            (true, true) => Quadrant::NorthEast,
        }
    }

    /// The quadrant of `core` containing `p`. Points on a center line go to
    /// the east or north side.
    pub fn of(core: &Rect, p: Point) -> Quadrant {
        Cuts::center(core).quadrant_of(p)
    }

    /// Whether the quadrant lies on the east half.
    pub fn is_east(self) -> bool {
        matches!(self, Quadrant::SouthEast | Quadrant::NorthEast)
    }

    /// Whether the quadrant lies on the north half.
    pub fn is_north(self) -> bool {
        matches!(self, Quadrant::NorthWest | Quadrant::NorthEast)
    }

    /// The box of this quadrant when `core` is cut through its center.
    pub fn bounds(self, core: &Rect) -> Rect {
        Cuts::center(core).bounds(core, self)
    }

    /// Mirroring (left-right, top-bottom) between the quadrant box and its
    /// annealing frame.
    pub fn flips(self) -> (bool, bool) {
        (self.is_east(), self.is_north())
    }

    /// The core edge a connection from this quadrant to `other` leaves
    /// through. Diagonal neighbors are reached horizontally.
    pub fn edge_towards(self, other: Quadrant) -> CoreEdge {
        if self.is_east() != other.is_east() {
            if other.is_east() {
                CoreEdge::East
            } else {
                CoreEdge::West
            }
        } else if other.is_north() {
            CoreEdge::North
        } else {
            CoreEdge::South
        }
    }

    /// Maps a point between the quadrant box frame (origin at the box's
    /// lower-left corner) and the annealing frame. The map is its own
    /// inverse.
    fn to_frame(self, p: Point, width: f64, height: f64) -> Point {
        let (fx, fy) = self.flips();
        Point::new(
            if fx { width - p.x } else { p.x },
            if fy { height - p.y } else { p.y },
        )
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quadrant::SouthWest => "south-west",
            Quadrant::SouthEast => "south-east",
            Quadrant::NorthWest => "north-west",
            Quadrant::NorthEast => "north-east",
        };
        f.write_str(name)
    }
}

/// Where the core is cut: one vertical line, then one horizontal line on
/// each side of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cuts {
    /// The vertical cut.
    pub x: f64,
    /// The horizontal cut west of `x`.
    pub west_y: f64,
    /// The horizontal cut east of `x`.
    pub east_y: f64,
}

impl Cuts {
    /// Cuts through the center of `core`.
    pub fn center(core: &Rect) -> Self {
        let c = core.center();
        Self {
            x: c.x,
            west_y: c.y,
            east_y: c.y,
        }
    }

    fn y(&self, east: bool) -> f64 {
        if east {
            self.east_y
        } else {
            self.west_y
        }
    }

    /// The box of `quadrant` in `core`.
    pub fn bounds(&self, core: &Rect, quadrant: Quadrant) -> Rect {
        let y = self.y(quadrant.is_east());
        let (x0, x1) = if quadrant.is_east() {
            (self.x, core.x_max())
        } else {
            (core.x, self.x)
        };
        let (y0, y1) = if quadrant.is_north() {
            (y, core.y_max())
        } else {
            (core.y, y)
        };
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// The quadrant containing `p`. Points on a cut go east or north.
    pub fn quadrant_of(&self, p: Point) -> Quadrant {
        let east = p.x >= self.x;
        Quadrant::from_sides(east, p.y >= self.y(east))
    }
}

/// A side of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoreEdge {
    /// Left side.
    West,
    /// Right side.
    East,
    /// Bottom side.
    South,
    /// Top side.
    North,
}

impl CoreEdge {
    /// Every edge, in table order.
    pub const ALL: [CoreEdge; 4] = [
        CoreEdge::West,
        CoreEdge::East,
        CoreEdge::South,
        CoreEdge::North,
    ];

    /// Position of this edge in the weight table after the macros.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The edge of `core` closest to `p`. Ties go west, east, south, north.
    pub fn nearest(core: &Rect, p: Point) -> CoreEdge {
        let distances = [
            (p.x - core.x).abs(),
            (core.x_max() - p.x).abs(),
            (p.y - core.y).abs(),
            (core.y_max() - p.y).abs(),
        ];
        let mut best = 0;
        for (i, &d) in distances.iter().enumerate().skip(1) {
            if d < distances[best] {
                best = i;
            }
        }
        CoreEdge::ALL[best]
    }

    /// Midpoint of this edge of `core`.
    pub fn midpoint(self, core: &Rect) -> Point {
        let c = core.center();
        match self {
            CoreEdge::West => Point::new(core.x, c.y),
            CoreEdge::East => Point::new(core.x_max(), c.y),
            CoreEdge::South => Point::new(c.x, core.y),
            CoreEdge::North => Point::new(c.x, core.y_max()),
        }
    }
}

/// Symmetric connection weights of a group of macros: the macros first,
/// then the four core edges in [`CoreEdge::ALL`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    /// Macros of the group, in table order.
    pub members: Vec<BlockId>,
    weights: Vec<f64>,
}

impl WeightTable {
    fn new(members: Vec<BlockId>) -> Self {
        let size = members.len() + CoreEdge::ALL.len();
        Self {
            members,
            weights: vec![0.0; size * size],
        }
    }

    /// Number of rows (macros plus edges).
    pub fn size(&self) -> usize {
        self.members.len() + CoreEdge::ALL.len()
    }

    /// Weight between rows `i` and `j`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.weights[i * self.size() + j]
    }

    /// Row of a core edge.
    pub fn edge_row(&self, edge: CoreEdge) -> usize {
        self.members.len() + edge.index()
    }

    fn add(&mut self, i: usize, j: usize, w: f64) {
        let size = self.size();
        self.weights[i * size + j] += w;
        self.weights[j * size + i] += w;
    }
}

/// One way of cutting the core, with the quadrant of every block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSet {
    /// The cut lines.
    pub cuts: Cuts,
    /// Quadrant of each block, indexed by block.
    pub assignment: Vec<Quadrant>,
}

/// Result for one quadrant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuadrantOutcome {
    /// The quadrant.
    pub quadrant: Quadrant,
    /// Its box in the core.
    pub bounds: Rect,
    /// Macros assigned to it.
    pub blocks: Vec<BlockId>,
    /// Whether the macros fit the quadrant box.
    pub success: bool,
    /// Placement of `blocks` in core coordinates, if the quadrant fit.
    pub placement: Option<Placement>,
    /// Width and height of the best packing found, halos included.
    pub packed: (f64, f64),
    /// Moves attempted.
    pub moves: u64,
    /// Wirelength against the virtual edge terminals.
    pub hpwl: f64,
}

/// Result of [`PartitionAdapter::place`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionOutcome {
    /// The cuts that were kept.
    pub cuts: Cuts,
    /// One entry per quadrant of the kept set, in [`Quadrant::ALL`] order.
    pub quadrants: Vec<QuadrantOutcome>,
    /// Number of partition sets annealed.
    pub sets_tried: usize,
    /// Weighted wirelength of the kept set, if all of its quadrants fit.
    pub weighted_wirelength: Option<f64>,
}

impl PartitionOutcome {
    /// Returns `true` if every quadrant fit.
    pub fn success(&self) -> bool {
        self.quadrants.iter().all(|q| q.success)
    }
}

/// Footprint and pull point of every block, as seen by the cut search.
struct Footprints {
    /// Width and height with the halo.
    dims: Vec<(f64, f64)>,
    /// Where the pins of the block pull it.
    pull: Vec<Point>,
    /// Lower-left corner of the footprint: the current one if placed, else
    /// centered on the pull point inside the core.
    corner: Vec<Point>,
}

/// The interval a cut runs across, and the extent of the region along it.
#[derive(Debug, Clone, Copy)]
struct Region {
    lo: f64,
    hi: f64,
    breadth: f64,
}

/// A horizontal cut of one side and the macros below and above it.
type SideCut = (f64, Vec<usize>, Vec<usize>);

/// Places macros quadrant by quadrant inside a core rectangle.
#[derive(Debug, Clone)]
pub struct PartitionAdapter {
    params: AnnealParams,
    core: Rect,
    parallel: bool,
    search_cuts: bool,
    halo: (f64, f64),
    site: Option<(f64, f64)>,
}

impl PartitionAdapter {
    /// An adapter for `core`. Quadrants are annealed with the packing tree,
    /// wirelength minimization and the quadrant box as outline, whatever
    /// `params` say about those.
    pub fn new(params: AnnealParams, core: Rect) -> Self {
        let params = AnnealParams {
            representation: Representation::Tree,
            min_wirelength: true,
            max_representation_switches: 0,
            ..params
        };
        Self {
            params,
            core,
            parallel: true,
            search_cuts: true,
            halo: (0.0, 0.0),
            site: None,
        }
    }

    /// Solves the quadrants on the calling thread only.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Tries the center cuts only.
    pub fn center_cut_only(mut self) -> Self {
        self.search_cuts = false;
        self
    }

    /// Keeps `x` free on the left and right of every macro and `y` below
    /// and above it.
    pub fn with_halo(mut self, x: f64, y: f64) -> Self {
        self.halo = (x.max(0.0), y.max(0.0));
        self
    }

    /// Snaps cut lines to a grid of `width` x `height` sites anchored at the
    /// core origin.
    pub fn with_site(mut self, width: f64, height: f64) -> Self {
        self.site = Some((width, height));
        self
    }

    /// The core rectangle.
    pub fn core(&self) -> Rect {
        self.core
    }

    fn has_halo(&self) -> bool {
        self.halo.0 > 0.0 || self.halo.1 > 0.0
    }

    fn footprint(&self, block: &Block) -> (f64, f64) {
        (
            block.width + 2.0 * self.halo.0,
            block.height + 2.0 * self.halo.1,
        )
    }

    /// Assigns every block of `db` to a quadrant of the center cuts.
    ///
    /// Blocks are taken largest first. A block goes to the quadrant of the
    /// weighted centroid of the terminals it connects to, else of its
    /// current center, else to the emptiest quadrant. A quadrant holds at
    /// most a quarter of the core area while another one has room.
    pub fn assign(&self, db: &FloorplanDb) -> Vec<Quadrant> {
        let capacity = self.core.area() / 4.0;
        let block_nets = db.block_nets();
        let mut filled = [0.0_f64; 4];
        let mut assignment = vec![Quadrant::SouthWest; db.block_count()];
        let areas: Vec<f64> = db
            .blocks
            .iter()
            .map(|b| {
                let (w, h) = self.footprint(b);
                w * h
            })
            .collect();

        let mut order: Vec<usize> = (0..db.block_count()).collect();
        order.sort_by(|&a, &b| areas[b].total_cmp(&areas[a]).then(a.cmp(&b)));

        for i in order {
            let block = &db.blocks[i];
            let area = areas[i];
            let emptiest = || {
                (0..4)
                    .min_by(|&a, &b| filled[a].total_cmp(&filled[b]))
                    .unwrap_or(0)
            };
            let preferred = self
                .terminal_centroid(db, &block_nets[i])
                .or_else(|| block.rect().map(|r| r.center()))
                .map(|p| Quadrant::of(&self.core, p) as usize)
                .unwrap_or_else(emptiest);
            let chosen = if filled[preferred] + area <= capacity {
                preferred
            } else {
                (0..4)
                    .filter(|&q| filled[q] + area <= capacity)
                    .min_by(|&a, &b| filled[a].total_cmp(&filled[b]))
                    .unwrap_or(preferred)
            };
            filled[chosen] += area;
            assignment[i] = Quadrant::ALL[chosen];
        }
        assignment
    }

    fn terminal_centroid(&self, db: &FloorplanDb, nets: &[NetId]) -> Option<Point> {
        let (mut x, mut y, mut total) = (0.0, 0.0, 0.0);
        for &id in nets {
            let net = db.net(id);
            for pin in &net.pins {
                if let NetPin::Terminal(t) = pin {
                    let p = db.terminal(*t).position;
                    x += p.x * net.weight();
                    y += p.y * net.weight();
                    total += net.weight();
                }
            }
        }
        (total > 0.0).then(|| Point::new(x / total, y / total))
    }

    fn footprints(&self, db: &FloorplanDb) -> Footprints {
        let block_nets = db.block_nets();
        let core = self.core;
        let inside = |v: f64, size: f64, lo: f64, hi: f64| v.min(hi - size).max(lo);
        let mut fp = Footprints {
            dims: Vec::with_capacity(db.block_count()),
            pull: Vec::with_capacity(db.block_count()),
            corner: Vec::with_capacity(db.block_count()),
        };
        for (block, nets) in db.blocks.iter().zip(&block_nets) {
            let (w, h) = self.footprint(block);
            let pull = self
                .terminal_centroid(db, nets)
                .or_else(|| block.rect().map(|r| r.center()))
                .unwrap_or_else(|| core.center());
            let corner = match block.location {
                Some(p) => Point::new(p.x - self.halo.0, p.y - self.halo.1),
                None => Point::new(
                    inside(pull.x - w / 2.0, w, core.x, core.x_max()),
                    inside(pull.y - h / 2.0, h, core.y, core.y_max()),
                ),
            };
            fp.dims.push((w, h));
            fp.pull.push(pull);
            fp.corner.push(corner);
        }
        fp
    }

    /// Candidate cut positions across `region` for `members`. Up to four
    /// macros cut along their low edges, skipping an edge within a quarter
    /// of the largest macro of the last kept one. More macros cut on a grid
    /// of `round(sqrt(n / 3))` slices.
    fn cut_lines(
        &self,
        fp: &Footprints,
        members: &[usize],
        vertical: bool,
        region: Region,
    ) -> Vec<f64> {
        let size = |i: usize| if vertical { fp.dims[i].0 } else { fp.dims[i].1 };
        let mut lines: Vec<f64> = Vec::new();
        if members.len() <= 4 {
            let mut starts: Vec<f64> = members
                .iter()
                .map(|&i| if vertical { fp.corner[i].x } else { fp.corner[i].y })
                .collect();
            starts.sort_by(f64::total_cmp);
            let gap = members.iter().map(|&i| size(i)).fold(0.0, f64::max) / 4.0;
            for s in starts {
                if lines.last().map_or(true, |&last| s - last > gap) {
                    lines.push(s);
                }
            }
        } else {
            let slices = ((members.len() as f64 / 3.0).sqrt().round() as usize).max(1);
            let step = (region.hi - region.lo) / slices as f64;
            lines.extend((0..=slices).map(|i| region.lo + step * i as f64));
        }

        let site = self
            .site
            .map(|(w, h)| if vertical { w } else { h })
            .filter(|&s| s > 0.0);
        for line in &mut lines {
            *line = line.max(region.lo).min(region.hi);
            if let Some(site) = site {
                let snapped = region.lo + ((*line - region.lo) / site).round() * site;
                *line = snapped.min(region.hi);
            }
        }
        lines.dedup_by(|a, b| approx_eq(*a, *b));
        lines
    }

    /// Splits `members` along a cut at `at`. A macro goes to the only side
    /// it fits, else to the side of its pull point. `None` if some macro
    /// fits neither side or a side gets more area than it has.
    fn split(
        &self,
        fp: &Footprints,
        members: &[usize],
        vertical: bool,
        at: f64,
        region: Region,
    ) -> Option<(Vec<usize>, Vec<usize>)> {
        let (mut low, mut high) = (Vec::new(), Vec::new());
        let (mut low_area, mut high_area) = (0.0, 0.0);
        for &i in members {
            let (w, h) = fp.dims[i];
            let (size, pulled) = if vertical {
                (w, fp.pull[i].x)
            } else {
                (h, fp.pull[i].y)
            };
            let fits_low = less_or_equal(size, at - region.lo);
            let fits_high = less_or_equal(size, region.hi - at);
            let goes_low = match (fits_low, fits_high) {
                (false, false) => return None,
                (true, true) => pulled < at,
                (low_only, _) => low_only,
            };
            if goes_low {
                low.push(i);
                low_area += w * h;
            } else {
                high.push(i);
                high_area += w * h;
            }
        }
        let fits = less_or_equal(low_area, (at - region.lo) * region.breadth)
            && less_or_equal(high_area, (region.hi - at) * region.breadth);
        fits.then_some((low, high))
    }

    fn side_cuts(&self, fp: &Footprints, members: &[usize], region: Region) -> Vec<SideCut> {
        if members.is_empty() {
            let middle = (region.lo + region.hi) / 2.0;
            return vec![(middle, Vec::new(), Vec::new())];
        }
        self.cut_lines(fp, members, false, region)
            .into_iter()
            .filter_map(|y| {
                self.split(fp, members, false, y, region)
                    .map(|(south, north)| (y, south, north))
            })
            .collect()
    }

    /// The partitions to try. The first one cuts through the center and is
    /// filled by [`Self::assign`]. Unless the search is off, every feasible
    /// combination of a vertical cut and a horizontal cut per side follows.
    pub fn partition_sets(&self, db: &FloorplanDb) -> Vec<PartitionSet> {
        let mut sets = vec![PartitionSet {
            cuts: Cuts::center(&self.core),
            assignment: self.assign(db),
        }];
        if !self.search_cuts {
            return sets;
        }

        let core = self.core;
        let fp = self.footprints(db);
        let all: Vec<usize> = (0..db.block_count()).collect();
        let across = Region {
            lo: core.x,
            hi: core.x_max(),
            breadth: core.height,
        };
        let side = |breadth: f64| Region {
            lo: core.y,
            hi: core.y_max(),
            breadth,
        };
        for x in self.cut_lines(&fp, &all, true, across) {
            let Some((west, east)) = self.split(&fp, &all, true, x, across) else {
                continue;
            };
            let west_cuts = self.side_cuts(&fp, &west, side(x - core.x));
            let east_cuts = self.side_cuts(&fp, &east, side(core.x_max() - x));
            for (west_y, sw, nw) in &west_cuts {
                for (east_y, se, ne) in &east_cuts {
                    let mut assignment = vec![Quadrant::SouthWest; all.len()];
                    let groups = [
                        (sw, Quadrant::SouthWest),
                        (se, Quadrant::SouthEast),
                        (nw, Quadrant::NorthWest),
                        (ne, Quadrant::NorthEast),
                    ];
                    for (group, q) in groups {
                        for &i in group {
                            assignment[i] = q;
                        }
                    }
                    let set = PartitionSet {
                        cuts: Cuts {
                            x,
                            west_y: *west_y,
                            east_y: *east_y,
                        },
                        assignment,
                    };
                    if !sets.contains(&set) {
                        sets.push(set);
                    }
                }
            }
        }
        sets
    }

    fn fold_weights(
        &self,
        db: &FloorplanDb,
        members: Vec<BlockId>,
        outside: impl Fn(BlockId) -> CoreEdge,
    ) -> WeightTable {
        let mut row = vec![None; db.block_count()];
        for (r, b) in members.iter().enumerate() {
            row[b.index()] = Some(r);
        }
        let mut table = WeightTable::new(members);

        for net in &db.nets {
            let mut ends: Vec<usize> = net
                .pins
                .iter()
                .map(|pin| match *pin {
                    NetPin::Block { block, .. } => row[block.index()]
                        .unwrap_or_else(|| table.edge_row(outside(block))),
                    NetPin::Terminal(t) => {
                        let p = db.terminal(t).position;
                        table.edge_row(CoreEdge::nearest(&self.core, p))
                    }
                })
                .collect();
            ends.sort_unstable();
            ends.dedup();
            // nets that never touch the group carry no information
            if ends.len() < 2 || ends[0] >= table.members.len() {
                continue;
            }
            let w = net.weight() / (ends.len() - 1) as f64;
            for (k, &a) in ends.iter().enumerate() {
                for &b in &ends[k + 1..] {
                    table.add(a, b, w);
                }
            }
        }
        table
    }

    /// Builds the weight table of `quadrant`. Each net adds
    /// `weight / (k - 1)` between every pair of its `k` distinct endpoints,
    /// where pins outside the quadrant collapse onto a core edge: macros in
    /// another quadrant onto the edge facing them, terminals onto the
    /// nearest core edge.
    pub fn weight_table(
        &self,
        db: &FloorplanDb,
        assignment: &[Quadrant],
        quadrant: Quadrant,
    ) -> WeightTable {
        let members: Vec<BlockId> = db
            .blocks
            .iter()
            .filter(|b| assignment[b.id.index()] == quadrant)
            .map(|b| b.id)
            .collect();
        self.fold_weights(db, members, |b| {
            quadrant.edge_towards(assignment[b.index()])
        })
    }

    /// Weighted wirelength of a solved set: each weight between a macro and
    /// another row of the table over all blocks, times the Manhattan
    /// distance between macro centers or core edge midpoints.
    fn weighted_wirelength(&self, table: &WeightTable, quadrants: &[QuadrantOutcome]) -> f64 {
        let m = table.members.len();
        let mut centers = vec![self.core.center(); m];
        for q in quadrants {
            let Some(placement) = &q.placement else {
                continue;
            };
            for (&id, placed) in q.blocks.iter().zip(&placement.blocks) {
                centers[id.index()] = placed.center();
            }
        }
        let at = |r: usize| {
            if r < m {
                centers[r]
            } else {
                CoreEdge::ALL[r - m].midpoint(&self.core)
            }
        };
        let mut total = 0.0;
        for i in 0..m {
            for j in i + 1..table.size() {
                let w = table.get(i, j);
                if w > 0.0 {
                    let (a, b) = (at(i), at(j));
                    total += w * ((a.x - b.x).abs() + (a.y - b.y).abs());
                }
            }
        }
        total
    }

    /// The annealing problem of one quadrant: its macros grown by the halo
    /// plus one terminal per core edge midpoint, in the mirrored frame of
    /// the quadrant box.
    fn quadrant_db(
        &self,
        db: &FloorplanDb,
        quadrant: Quadrant,
        bounds: Rect,
        table: &WeightTable,
    ) -> FloorplanResult<FloorplanDb> {
        let mut qdb = FloorplanDb::new();
        for &b in &table.members {
            let mut block: Block = db.block(b).clone();
            block.location = None;
            if self.has_halo() {
                let soft = block.is_soft();
                (block.width, block.height) = self.footprint(&block);
                block.area = block.width * block.height;
                if !soft {
                    let (w, h) = block.base_dims();
                    block.min_ar = w / h;
                    block.max_ar = w / h;
                }
            }
            qdb.add_block(block);
        }
        let edges: Vec<TerminalId> = CoreEdge::ALL
            .iter()
            .map(|&edge| {
                let mid = edge.midpoint(&self.core);
                let local = Point::new(mid.x - bounds.x, mid.y - bounds.y);
                let p = quadrant.to_frame(local, bounds.width, bounds.height);
                qdb.add_terminal(Terminal::new(format!("{quadrant}_{edge:?}"), p.x, p.y))
            })
            .collect();

        let m = table.members.len();
        let pin = |r: usize| {
            if r < m {
                NetPin::center(BlockId::from_raw(r as u32))
            } else {
                NetPin::Terminal(edges[r - m])
            }
        };
        for i in 0..m {
            for j in i + 1..table.size() {
                let w = table.get(i, j);
                if w <= 0.0 {
                    continue;
                }
                let weight = w.round().max(1.0) as u32;
                let net = Net::new(format!("q{i}_{j}"), vec![pin(i), pin(j)]).with_weight(weight);
                qdb.add_net(net)?;
            }
        }
        Ok(qdb)
    }

    fn solve_quadrant(
        &self,
        db: &FloorplanDb,
        quadrant: Quadrant,
        bounds: Rect,
        table: WeightTable,
        seed: u64,
        sink: &DiagnosticSink,
    ) -> FloorplanResult<QuadrantOutcome> {
        let mut outcome = QuadrantOutcome {
            quadrant,
            bounds,
            blocks: table.members.clone(),
            success: true,
            placement: None,
            packed: (0.0, 0.0),
            moves: 0,
            hpwl: 0.0,
        };
        if table.members.is_empty() {
            return Ok(outcome);
        }
        let qdb = self.quadrant_db(db, quadrant, bounds, &table)?;
        let params = AnnealParams {
            outline: Outline::Fixed {
                width: bounds.width,
                height: bounds.height,
            },
            ..self.params.clone()
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let run = Annealer::new(params).run_with_rng(&qdb, &mut rng, sink)?;
        outcome.moves = run.moves;
        outcome.hpwl = run.hpwl;
        outcome.packed = (run.placement.width, run.placement.height);
        if !run.success {
            outcome.success = false;
            return Ok(outcome);
        }

        let mut placement = run.placement;
        let (fx, fy) = quadrant.flips();
        if fx {
            placement.mirror_x(bounds.width);
        }
        if fy {
            placement.mirror_y(bounds.height);
        }
        placement.translate(bounds.x, bounds.y);
        if self.has_halo() {
            for (placed, &id) in placement.blocks.iter_mut().zip(&table.members) {
                let turned =
                    placed.orient.swaps_dimensions() != db.block(id).orient.swaps_dimensions();
                let (hx, hy) = if turned {
                    (self.halo.1, self.halo.0)
                } else {
                    self.halo
                };
                placed.x += hx;
                placed.y += hy;
                placed.width -= 2.0 * hx;
                placed.height -= 2.0 * hy;
            }
            placement.recompute_extent();
        }
        outcome.placement = Some(placement);
        Ok(outcome)
    }

    /// Places the macros of `db` and writes the quadrants that fit back into
    /// it. Blocks of a failed quadrant keep their previous state.
    ///
    /// Every partition set is annealed. Among the sets whose quadrants all
    /// fit, the smallest weighted wirelength wins. When none fits entirely,
    /// the set with the most fitting quadrants is kept and each failed
    /// quadrant is reported. Ties go to the earlier set.
    pub fn place(
        &self,
        db: &mut FloorplanDb,
        rng: &mut StdRng,
        sink: &DiagnosticSink,
    ) -> FloorplanResult<PartitionOutcome> {
        db.validate()?;
        let sets = self.partition_sets(db);
        let mut jobs = Vec::with_capacity(sets.len() * Quadrant::ALL.len());
        for set in &sets {
            for q in Quadrant::ALL {
                let table = self.weight_table(db, &set.assignment, q);
                jobs.push((q, set.cuts.bounds(&self.core, q), table, rng.gen::<u64>()));
            }
        }

        let shared: &FloorplanDb = db;
        let solve = |(q, bounds, table, seed): (Quadrant, Rect, WeightTable, u64)| {
            self.solve_quadrant(shared, q, bounds, table, seed, sink)
        };
        let solved: Vec<QuadrantOutcome> = if self.parallel {
            jobs.into_par_iter().map(solve).collect::<FloorplanResult<_>>()?
        } else {
            jobs.into_iter().map(solve).collect::<FloorplanResult<_>>()?
        };

        let everything = self.fold_weights(db, db.blocks.iter().map(|b| b.id).collect(), |_| {
            // every block is a member
            CoreEdge::West
        });
        let mut best: Option<(usize, f64)> = None;
        let (mut fallback, mut fallback_fit) = (0, 0);
        for (s, quadrants) in solved.chunks(Quadrant::ALL.len()).enumerate() {
            let fit = quadrants.iter().filter(|q| q.success).count();
            if fit > fallback_fit {
                fallback = s;
                fallback_fit = fit;
            }
            if fit == Quadrant::ALL.len() {
                let wl = self.weighted_wirelength(&everything, quadrants);
                if best.map_or(true, |(_, least)| definitely_less(wl, least)) {
                    best = Some((s, wl));
                }
            }
        }
        let kept = best.map_or(fallback, |(s, _)| s);
        let quadrants: Vec<QuadrantOutcome> = solved
            .into_iter()
            .skip(kept * Quadrant::ALL.len())
            .take(Quadrant::ALL.len())
            .collect();

        for q in &quadrants {
            let Some(placement) = &q.placement else {
                sink.emit(
                    Diagnostic::warning(QUADRANT_FAILED, "macros do not fit their quadrant")
                        .with_subject(q.quadrant.to_string())
                        .with_note(format!(
                            "packing is {:.3} x {:.3}, quadrant is {:.3} x {:.3}",
                            q.packed.0, q.packed.1, q.bounds.width, q.bounds.height
                        )),
                );
                continue;
            };
            for (&id, placed) in q.blocks.iter().zip(&placement.blocks) {
                let block = db.block_mut(id);
                block.location = Some(Point::new(placed.x, placed.y));
                block.orient = placed.orient;
                block.width = placed.width;
                block.height = placed.height;
            }
        }
        Ok(PartitionOutcome {
            cuts: sets[kept].cuts,
            quadrants,
            sets_tried: sets.len(),
            weighted_wirelength: best.map(|(_, wl)| wl),
        })
    }
}
