//! Core floorplan data structures.
//!
//! Defines the problem instance the engine works on: blocks (hard or soft,
//! with an optional placement), nets joining block pins and fixed terminals,
//! and fixed obstacles. The [`FloorplanDb`] is the central structure that
//! every solver reads from and writes its result back into.

use crate::cost;
use crate::error::{FloorplanError, FloorplanResult};
use crate::geom::{Orientation, Point, Rect};
use crate::ids::{BlockId, NetId, TerminalId};
use crate::solution::{PlacedBlock, Placement};
use mosaic_common::{InternalError, MosaicResult, EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A rectangular module.
///
/// A hard block has fixed dimensions (`min_ar == max_ar`); a soft block has
/// a fixed area and may take any width/height ratio in `[min_ar, max_ar]`.
/// Aspect ratios are width over height in the `N` orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// The block ID (assigned by [`FloorplanDb::add_block`]).
    pub id: BlockId,
    /// Unique block name.
    pub name: String,
    /// Width in the current orientation.
    pub width: f64,
    /// Height in the current orientation.
    pub height: f64,
    /// Block area.
    pub area: f64,
    /// Smallest allowed width/height ratio.
    pub min_ar: f64,
    /// Largest allowed width/height ratio.
    pub max_ar: f64,
    /// Current orientation.
    pub orient: Orientation,
    /// Whether the orientation must not change.
    pub orient_fixed: bool,
    /// Whether the block is a macro (used by the partition adapter).
    pub is_macro: bool,
    /// Lower-left corner once placed.
    pub location: Option<Point>,
}

impl Block {
    /// Creates an unplaced hard block.
    pub fn hard(name: impl Into<String>, width: f64, height: f64) -> Self {
        let ar = if height > 0.0 { width / height } else { 1.0 };
        Self {
            id: BlockId::from_raw(0),
            name: name.into(),
            width,
            height,
            area: width * height,
            min_ar: ar,
            max_ar: ar,
            orient: Orientation::N,
            orient_fixed: false,
            is_macro: false,
            location: None,
        }
    }

    /// Creates an unplaced soft block with its initial shape as close to
    /// square as the ratio bounds allow.
    pub fn soft(name: impl Into<String>, area: f64, min_ar: f64, max_ar: f64) -> Self {
        let ar = 1.0_f64.clamp(min_ar, max_ar);
        let width = (area * ar).sqrt();
        Self {
            id: BlockId::from_raw(0),
            name: name.into(),
            width,
            height: area / width,
            area,
            min_ar,
            max_ar,
            orient: Orientation::N,
            orient_fixed: false,
            is_macro: false,
            location: None,
        }
    }

    /// Marks the block as a macro.
    pub fn as_macro(mut self) -> Self {
        self.is_macro = true;
        self
    }

    /// Forbids orientation changes.
    pub fn with_fixed_orientation(mut self) -> Self {
        self.orient_fixed = true;
        self
    }

    /// Places the block with its lower-left corner at `(x, y)`.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.location = Some(Point::new(x, y));
        self
    }

    /// Returns `true` if the block may be reshaped.
    pub fn is_soft(&self) -> bool {
        self.max_ar - self.min_ar > EPSILON
    }

    /// Width and height in the `N` orientation.
    pub fn base_dims(&self) -> (f64, f64) {
        if self.orient.swaps_dimensions() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Width and height in the given orientation.
    pub fn dims_in(&self, orient: Orientation) -> (f64, f64) {
        let (w, h) = self.base_dims();
        if orient.swaps_dimensions() {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// The footprint, if placed.
    pub fn rect(&self) -> Option<Rect> {
        self.location
            .map(|p| Rect::new(p.x, p.y, self.width, self.height))
    }
}

/// A fixed boundary terminal (I/O pad or propagated external pin).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terminal {
    /// The terminal ID.
    pub id: TerminalId,
    /// Terminal name.
    pub name: String,
    /// Fixed location.
    pub position: Point,
}

impl Terminal {
    /// Creates a terminal at `(x, y)`.
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: TerminalId::from_raw(0),
            name: name.into(),
            position: Point::new(x, y),
        }
    }
}

/// A fixed rectangle no block may overlap, in packing-frame coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Obstacle name.
    pub name: String,
    /// Blocked region.
    pub rect: Rect,
}

/// One endpoint of a net.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NetPin {
    /// A pin on a block, at an offset from the block center normalized to
    /// the block dimensions (each component in `[-0.5, 0.5]`).
    Block {
        /// The block carrying the pin.
        block: BlockId,
        /// Normalized offset in the block's `N` frame.
        offset: Point,
    },
    /// A fixed terminal.
    Terminal(TerminalId),
}

impl NetPin {
    /// A pin at the center of a block.
    pub fn center(block: BlockId) -> Self {
        NetPin::Block {
            block,
            offset: Point::default(),
        }
    }
}

/// A hyperedge joining block pins and terminals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Net {
    /// The net ID.
    pub id: NetId,
    /// Net name.
    pub name: String,
    /// Connected pins (at least one).
    pub pins: Vec<NetPin>,
    /// Optional weight; unweighted nets count once.
    pub weight: Option<u32>,
}

impl Net {
    /// Creates an unweighted net.
    pub fn new(name: impl Into<String>, pins: Vec<NetPin>) -> Self {
        Self {
            id: NetId::from_raw(0),
            name: name.into(),
            pins,
            weight: None,
        }
    }

    /// Sets the weight.
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Effective weight.
    pub fn weight(&self) -> f64 {
        f64::from(self.weight.unwrap_or(1))
    }

    /// Blocks touched by this net, in pin order, possibly repeated.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.pins.iter().filter_map(|p| match p {
            NetPin::Block { block, .. } => Some(*block),
            NetPin::Terminal(_) => None,
        })
    }
}

/// The floorplanning problem instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloorplanDb {
    /// All blocks.
    pub blocks: Vec<Block>,
    /// All nets.
    pub nets: Vec<Net>,
    /// All terminals.
    pub terminals: Vec<Terminal>,
    /// Fixed obstacles.
    pub obstacles: Vec<Obstacle>,
    /// Auxiliary index: block name to ID (rebuilt on deserialization).
    #[serde(skip)]
    block_by_name: HashMap<String, BlockId>,
}

impl FloorplanDb {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a block and returns its ID.
    pub fn add_block(&mut self, mut block: Block) -> BlockId {
        let id = BlockId::from_raw(self.blocks.len() as u32);
        block.id = id;
        self.block_by_name.insert(block.name.clone(), id);
        self.blocks.push(block);
        id
    }

    /// Adds a terminal and returns its ID.
    pub fn add_terminal(&mut self, mut terminal: Terminal) -> TerminalId {
        let id = TerminalId::from_raw(self.terminals.len() as u32);
        terminal.id = id;
        self.terminals.push(terminal);
        id
    }

    /// Adds a net and returns its ID.
    ///
    /// Rejects nets without pins and pins referring to unknown blocks or
    /// terminals.
    pub fn add_net(&mut self, mut net: Net) -> FloorplanResult<NetId> {
        if net.pins.is_empty() {
            return Err(FloorplanError::InvalidInput(format!(
                "net '{}' has no pins",
                net.name
            )));
        }
        for pin in &net.pins {
            let known = match pin {
                NetPin::Block { block, .. } => block.index() < self.blocks.len(),
                NetPin::Terminal(t) => t.index() < self.terminals.len(),
            };
            if !known {
                return Err(FloorplanError::InvalidInput(format!(
                    "net '{}' refers to an unknown pin owner",
                    net.name
                )));
            }
        }
        let id = NetId::from_raw(self.nets.len() as u32);
        net.id = id;
        self.nets.push(net);
        Ok(id)
    }

    /// Adds a fixed obstacle.
    pub fn add_obstacle(&mut self, name: impl Into<String>, rect: Rect) {
        self.obstacles.push(Obstacle {
            name: name.into(),
            rect,
        });
    }

    /// Returns the block with the given ID.
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// Returns a mutable reference to the block with the given ID.
    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    /// Returns the net with the given ID.
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.index()]
    }

    /// Returns the terminal with the given ID.
    pub fn terminal(&self, id: TerminalId) -> &Terminal {
        &self.terminals[id.index()]
    }

    /// Looks up a block by name.
    pub fn block_by_name(&self, name: &str) -> Option<BlockId> {
        self.block_by_name.get(name).copied()
    }

    /// Returns the number of blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the number of nets.
    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    /// Sum of block areas.
    pub fn block_area(&self) -> f64 {
        self.blocks.iter().map(|b| b.area).sum()
    }

    /// Obstacle rectangles.
    pub fn obstacle_rects(&self) -> Vec<Rect> {
        self.obstacles.iter().map(|o| o.rect).collect()
    }

    /// For each block, the nets it is on (each net listed once).
    pub fn block_nets(&self) -> Vec<Vec<NetId>> {
        let mut result = vec![Vec::new(); self.blocks.len()];
        for net in &self.nets {
            for block in net.blocks() {
                let list: &mut Vec<NetId> = &mut result[block.index()];
                if list.last() != Some(&net.id) {
                    list.push(net.id);
                }
            }
        }
        result
    }

    /// Rebuilds auxiliary indices after deserialization.
    pub fn rebuild_indices(&mut self) {
        self.block_by_name.clear();
        for (i, block) in self.blocks.iter().enumerate() {
            self.block_by_name
                .insert(block.name.clone(), BlockId::from_raw(i as u32));
        }
    }

    /// Checks block shapes and name uniqueness.
    pub fn validate(&self) -> FloorplanResult<()> {
        let mut seen = HashSet::new();
        for block in &self.blocks {
            if !(block.area > 0.0 && block.width > 0.0 && block.height > 0.0) {
                return Err(FloorplanError::InvalidInput(format!(
                    "block '{}' has a non-positive dimension",
                    block.name
                )));
            }
            if !(block.min_ar > 0.0 && block.min_ar <= block.max_ar + EPSILON) {
                return Err(FloorplanError::InvalidInput(format!(
                    "block '{}' has an empty aspect ratio range [{}, {}]",
                    block.name, block.min_ar, block.max_ar
                )));
            }
            if !seen.insert(block.name.as_str()) {
                return Err(FloorplanError::InvalidInput(format!(
                    "duplicate block name '{}'",
                    block.name
                )));
            }
        }
        Ok(())
    }

    /// Returns whether every block has a location.
    pub fn is_fully_placed(&self) -> bool {
        self.blocks.iter().all(|b| b.location.is_some())
    }

    /// The stored placement, if every block is placed.
    pub fn current_placement(&self) -> Option<Placement> {
        let blocks = self
            .blocks
            .iter()
            .map(|b| {
                b.location
                    .map(|p| PlacedBlock::new(p.x, p.y, b.width, b.height, b.orient))
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Placement::new(blocks))
    }

    /// Writes a solution back: location, orientation, and (for soft blocks)
    /// the chosen dimensions.
    pub fn apply_placement(&mut self, placement: &Placement) -> MosaicResult<()> {
        if placement.len() != self.blocks.len() {
            return Err(InternalError::new(format!(
                "placement has {} blocks, database has {}",
                placement.len(),
                self.blocks.len()
            )));
        }
        for (block, placed) in self.blocks.iter_mut().zip(&placement.blocks) {
            block.location = Some(Point::new(placed.x, placed.y));
            block.orient = placed.orient;
            block.width = placed.width;
            block.height = placed.height;
        }
        Ok(())
    }

    /// Weighted half-perimeter wirelength of the stored placement.
    pub fn hpwl(&self) -> Option<f64> {
        self.current_placement()
            .map(|p| cost::total_hpwl(self, &p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_lookup() {
        let mut db = FloorplanDb::new();
        let a = db.add_block(Block::hard("a", 10.0, 5.0));
        let b = db.add_block(Block::soft("b", 100.0, 0.5, 2.0));
        assert_eq!(db.block_by_name("a"), Some(a));
        assert_eq!(db.block(b).name, "b");
        assert_eq!(db.block_count(), 2);
        assert_eq!(db.block_area(), 150.0);
        assert!(!db.block(a).is_soft());
        assert!(db.block(b).is_soft());
    }

    #[test]
    fn soft_block_starts_square_when_allowed() {
        let b = Block::soft("s", 100.0, 0.5, 2.0);
        assert!((b.width - 10.0).abs() < 1e-9);
        assert!((b.height - 10.0).abs() < 1e-9);

        let tall = Block::soft("t", 100.0, 2.0, 4.0);
        assert!((tall.width / tall.height - 2.0).abs() < 1e-9);
    }

    #[test]
    fn dims_per_orientation() {
        let mut b = Block::hard("a", 10.0, 5.0);
        assert_eq!(b.dims_in(Orientation::E), (5.0, 10.0));
        b.orient = Orientation::E;
        b.width = 5.0;
        b.height = 10.0;
        assert_eq!(b.base_dims(), (10.0, 5.0));
        assert_eq!(b.dims_in(Orientation::FS), (10.0, 5.0));
    }

    #[test]
    fn empty_net_rejected() {
        let mut db = FloorplanDb::new();
        db.add_block(Block::hard("a", 1.0, 1.0));
        let err = db.add_net(Net::new("n", vec![])).unwrap_err();
        assert!(matches!(err, FloorplanError::InvalidInput(_)));
    }

    #[test]
    fn dangling_pin_rejected() {
        let mut db = FloorplanDb::new();
        let err = db
            .add_net(Net::new("n", vec![NetPin::center(BlockId::from_raw(3))]))
            .unwrap_err();
        assert!(matches!(err, FloorplanError::InvalidInput(_)));
    }

    #[test]
    fn block_nets_deduplicated() {
        let mut db = FloorplanDb::new();
        let a = db.add_block(Block::hard("a", 1.0, 1.0));
        let b = db.add_block(Block::hard("b", 1.0, 1.0));
        let n = db
            .add_net(Net::new("n", vec![NetPin::center(a), NetPin::center(a), NetPin::center(b)]))
            .unwrap();
        let nets = db.block_nets();
        assert_eq!(nets[0], vec![n]);
        assert_eq!(nets[1], vec![n]);
    }

    #[test]
    fn validate_catches_duplicates_and_bad_shapes() {
        let mut db = FloorplanDb::new();
        db.add_block(Block::hard("a", 1.0, 1.0));
        db.add_block(Block::hard("a", 2.0, 1.0));
        assert!(db.validate().is_err());

        let mut db = FloorplanDb::new();
        db.add_block(Block::hard("z", 0.0, 1.0));
        assert!(db.validate().is_err());
    }

    #[test]
    fn apply_and_read_back_placement() {
        let mut db = FloorplanDb::new();
        db.add_block(Block::hard("a", 10.0, 10.0));
        db.add_block(Block::hard("b", 10.0, 10.0));
        assert!(db.current_placement().is_none());

        let placement = Placement::new(vec![
            PlacedBlock::new(0.0, 0.0, 10.0, 10.0, Orientation::N),
            PlacedBlock::new(10.0, 0.0, 10.0, 10.0, Orientation::S),
        ]);
        db.apply_placement(&placement).unwrap();
        assert!(db.is_fully_placed());
        assert_eq!(db.blocks[1].orient, Orientation::S);
        assert_eq!(db.current_placement().unwrap(), placement);

        let short = Placement::new(vec![]);
        assert!(db.apply_placement(&short).is_err());
    }

    #[test]
    fn serde_roundtrip_rebuilds_index() {
        let mut db = FloorplanDb::new();
        let a = db.add_block(Block::hard("a", 3.0, 4.0).at(1.0, 2.0));
        let t = db.add_terminal(Terminal::new("pad", 0.0, 0.0));
        db.add_net(Net::new("n", vec![NetPin::center(a), NetPin::Terminal(t)]).with_weight(3))
            .unwrap();
        db.add_obstacle("ram", Rect::new(5.0, 5.0, 2.0, 2.0));

        let json = serde_json::to_string(&db).unwrap();
        let mut back: FloorplanDb = serde_json::from_str(&json).unwrap();
        assert_eq!(back.block_by_name("a"), None);
        back.rebuild_indices();
        assert_eq!(back.block_by_name("a"), Some(a));
        assert_eq!(back.nets[0].weight(), 3.0);
        assert_eq!(back.obstacles.len(), 1);
    }
}
