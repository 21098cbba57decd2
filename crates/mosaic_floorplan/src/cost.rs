//! Floorplan cost functions.
//!
//! Evaluates a placement by half-perimeter wire length (HPWL) and by the
//! whitespace trapped under its upper and right profiles. The annealer
//! blends these with area and aspect-ratio terms.

use crate::data::{FloorplanDb, NetPin};
use crate::geom::Point;
use crate::ids::NetId;
use crate::skyline::Skyline;
use crate::solution::Placement;
use serde::{Deserialize, Serialize};

/// Summary figures of one placement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Packing width.
    pub width: f64,
    /// Packing height.
    pub height: f64,
    /// Bounding-box area.
    pub area: f64,
    /// Weighted half-perimeter wirelength.
    pub hpwl: f64,
    /// Whitespace below the upper profile plus whitespace left of the right
    /// profile.
    pub wasted: f64,
}

impl Metrics {
    /// Measures a placement.
    pub fn measure(db: &FloorplanDb, placement: &Placement) -> Self {
        Self {
            width: placement.width,
            height: placement.height,
            area: placement.area(),
            hpwl: total_hpwl(db, placement),
            wasted: wasted_area(placement),
        }
    }
}

/// Position of a net pin under a placement.
pub fn pin_location(db: &FloorplanDb, placement: &Placement, pin: &NetPin) -> Point {
    match pin {
        NetPin::Block { block, offset } => placement.blocks[block.index()].pin_position(*offset),
        NetPin::Terminal(t) => db.terminal(*t).position,
    }
}

/// Computes the total weighted half-perimeter wire length across all nets.
pub fn total_hpwl(db: &FloorplanDb, placement: &Placement) -> f64 {
    db.nets.iter().map(|n| net_hpwl(db, placement, n.id)).sum()
}

/// Computes the weighted HPWL of a single net.
///
/// Nets with fewer than two pins contribute nothing.
pub fn net_hpwl(db: &FloorplanDb, placement: &Placement, net_id: NetId) -> f64 {
    let net = db.net(net_id);
    if net.pins.len() < 2 {
        return 0.0;
    }

    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for pin in &net.pins {
        let p = pin_location(db, placement, pin);
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }

    net.weight() * (max_x - min_x + max_y - min_y)
}

/// Whitespace enclosed by the upper profile plus whitespace enclosed by the
/// right profile of the packing.
///
/// Zero for a packing without holes against either profile.
pub fn wasted_area(placement: &Placement) -> f64 {
    if placement.is_empty() {
        return 0.0;
    }
    let mut order: Vec<usize> = (0..placement.len()).collect();

    order.sort_by(|&a, &b| {
        let (ra, rb) = (placement.blocks[a].rect(), placement.blocks[b].rect());
        ra.y_max().total_cmp(&rb.y_max())
    });
    let mut top = Skyline::new(0.0);
    for &i in &order {
        let r = placement.blocks[i].rect();
        top.raise(r.x, r.x_max(), r.y_max(), Some(i));
    }

    order.sort_by(|&a, &b| {
        let (ra, rb) = (placement.blocks[a].rect(), placement.blocks[b].rect());
        ra.x_max().total_cmp(&rb.x_max())
    });
    let mut right = Skyline::new(0.0);
    for &i in &order {
        let r = placement.blocks[i].rect();
        right.raise(r.y, r.y_max(), r.x_max(), Some(i));
    }

    let blocks = placement.block_area();
    let wasted = top.area_between(0.0, placement.width) + right.area_between(0.0, placement.height)
        - 2.0 * blocks;
    wasted.max(0.0)
}
