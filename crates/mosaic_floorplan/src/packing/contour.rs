//! Contour evaluation of a [`BTree`].
//!
//! The contour is a doubly linked list of horizontal segments over a node
//! pool: slot 0 is the left wall, slot 1 the bottom wall (ground level,
//! extending to infinity), further slots are block tops and the fragments
//! left when a block lands inside a longer segment.

use crate::geom::Rect;
use crate::packing::tree::BTree;
use crate::shape::ShapeTable;
use crate::solution::{OutlineTarget, PlacedBlock, Placement};
use mosaic_common::EPSILON;

const LEFT_WALL: usize = 0;
const BOTTOM_WALL: usize = 1;
const NIL: usize = usize::MAX;

/// Extra obstacle shifts allowed per obstacle before a block is pushed past
/// all of them.
const SHIFTS_PER_OBSTACLE: usize = 4;

#[derive(Clone, Copy, Debug)]
struct Segment {
    begin: f64,
    end: f64,
    top: f64,
    prev: usize,
    next: usize,
    alive: bool,
}

/// The result of packing a tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Packing {
    /// Block coordinates; `width` and `height` are the packing extent.
    pub placement: Placement,
    /// Area under the final contour.
    pub contour_area: f64,
}

/// Packs B*-trees bottom-left using a contour, optionally around obstacles.
#[derive(Clone, Debug, Default)]
pub struct ContourEvaluator {
    obstacles: Vec<Rect>,
    frame: Option<OutlineTarget>,
    segs: Vec<Segment>,
    block_seg: Vec<usize>,
}

impl ContourEvaluator {
    /// An evaluator without obstacles.
    pub fn new() -> Self {
        Self::default()
    }

    /// An evaluator that packs around `obstacles` inside an optional frame.
    pub fn with_obstacles(obstacles: Vec<Rect>, frame: Option<OutlineTarget>) -> Self {
        Self {
            obstacles,
            frame,
            ..Self::default()
        }
    }

    /// The obstacles packed around.
    pub fn obstacles(&self) -> &[Rect] {
        &self.obstacles
    }

    fn reset(&mut self, n: usize) {
        self.segs.clear();
        self.segs.push(Segment {
            begin: f64::NEG_INFINITY,
            end: 0.0,
            top: f64::INFINITY,
            prev: LEFT_WALL,
            next: BOTTOM_WALL,
            alive: true,
        });
        self.segs.push(Segment {
            begin: 0.0,
            end: f64::INFINITY,
            top: 0.0,
            prev: LEFT_WALL,
            next: NIL,
            alive: true,
        });
        self.block_seg.clear();
        self.block_seg.resize(n, LEFT_WALL);
    }

    /// Computes the packing of `tree` with block dimensions from `shapes`.
    pub fn evaluate(&mut self, tree: &BTree, shapes: &ShapeTable) -> Packing {
        let n = tree.len();
        self.reset(n);
        let mut placed = vec![PlacedBlock::new(0.0, 0.0, 0.0, 0.0, Default::default()); n];

        for pos in tree.preorder() {
            let node = tree.node(pos);
            let block = node.block;
            let (w, h) = shapes.dims(block, node.orient);
            let Some(parent) = node.parent else {
                continue;
            };
            let is_left = tree.node(parent).left == Some(pos);

            let (hint, parent_rect) = if parent == tree.left_wall() {
                (LEFT_WALL, None)
            } else {
                let pb = tree.node(parent).block;
                (self.block_seg[pb], Some(placed[pb].rect()))
            };
            let base_x = match (parent_rect, is_left) {
                (None, _) => 0.0,
                (Some(r), true) => r.x_max(),
                (Some(r), false) => r.x,
            };
            let parent_top = parent_rect.map_or(f64::INFINITY, |r| r.y_max());

            let (x, y, first, last) = self.locate(hint, base_x, w, h, is_left, parent_top);
            placed[block] = PlacedBlock::new(x, y, w, h, node.orient);
            self.block_seg[block] = self.splice(first, last, x, x + w, y + h);
        }

        let placement = Placement::new(placed);
        let contour_area = self.area_up_to(placement.width);
        Packing {
            placement,
            contour_area,
        }
    }

    // Finds the lowest position at or right of `base_x` clear of obstacles,
    // together with the first and last contour segments under it.
    fn locate(
        &self,
        hint: usize,
        base_x: f64,
        w: f64,
        h: f64,
        is_left: bool,
        parent_top: f64,
    ) -> (f64, f64, usize, usize) {
        let (frame_w, frame_h) = self
            .frame
            .map_or((f64::INFINITY, f64::INFINITY), |f| (f.width, f.height));
        let mut x_shift = 0.0;
        let mut y_shift = 0.0;
        let budget = SHIFTS_PER_OBSTACLE * self.obstacles.len() + 1;

        for _ in 0..budget {
            let x = base_x + x_shift;
            let (first, last, level) = self.scan(hint, x, x + w);
            let y = level + y_shift;
            let candidate = Rect::new(x, y, w, h);
            let Some(obs) = self.obstacles.iter().find(|o| candidate.overlaps(o)) else {
                return (x, y, first, last);
            };
            let push_right = if is_left {
                obs.y_max() + h > parent_top + h * 0.5 && obs.x_max() + w < frame_w
            } else {
                obs.y_max() + h > frame_h
            };
            if push_right {
                x_shift += obs.x_max() - x;
                y_shift = 0.0;
            } else {
                y_shift = obs.y_max() - level;
            }
        }

        let x = self
            .obstacles
            .iter()
            .map(Rect::x_max)
            .fold(base_x, f64::max);
        let (first, last, level) = self.scan(hint, x, x + w);
        (x, level, first, last)
    }

    // First and last live segments overlapping [lo, hi) and their highest top.
    fn scan(&self, hint: usize, lo: f64, hi: f64) -> (usize, usize, f64) {
        let mut cur = hint;
        if !self.segs[cur].alive || self.segs[cur].begin > lo + EPSILON {
            cur = LEFT_WALL;
        }
        while self.segs[cur].end <= lo + EPSILON {
            cur = self.segs[cur].next;
        }
        let first = cur;
        let mut level = self.segs[cur].top;
        while self.segs[cur].end < hi - EPSILON {
            cur = self.segs[cur].next;
            level = level.max(self.segs[cur].top);
        }
        (first, cur, level)
    }

    // Replaces the contour over [lo, hi) by a segment at `top`; returns it.
    fn splice(&mut self, first: usize, last: usize, lo: f64, hi: f64, top: f64) -> usize {
        let front_partial = self.segs[first].begin < lo - EPSILON;

        let succ = if self.segs[last].end > hi + EPSILON {
            if first == last && front_partial {
                let seg = self.segs[last];
                let frag = self.segs.len();
                self.segs.push(Segment {
                    begin: hi,
                    end: seg.end,
                    top: seg.top,
                    prev: last,
                    next: seg.next,
                    alive: true,
                });
                if seg.next != NIL {
                    self.segs[seg.next].prev = frag;
                }
                self.segs[last].next = frag;
                frag
            } else {
                self.segs[last].begin = hi;
                last
            }
        } else {
            self.segs[last].next
        };

        let pred = if front_partial {
            self.segs[first].end = lo;
            first
        } else {
            self.segs[first].prev
        };

        let mut cur = self.segs[pred].next;
        while cur != succ {
            self.segs[cur].alive = false;
            cur = self.segs[cur].next;
        }

        let id = self.segs.len();
        self.segs.push(Segment {
            begin: lo,
            end: hi,
            top,
            prev: pred,
            next: succ,
            alive: true,
        });
        self.segs[pred].next = id;
        if succ != NIL {
            self.segs[succ].prev = id;
        }
        id
    }

    fn area_up_to(&self, width: f64) -> f64 {
        let mut area = 0.0;
        let mut cur = self.segs[LEFT_WALL].next;
        loop {
            let seg = self.segs[cur];
            let span = seg.end.min(width) - seg.begin.max(0.0);
            if span > 0.0 {
                area += span * seg.top;
            }
            if seg.end >= width || seg.next == NIL {
                break;
            }
            cur = seg.next;
        }
        area
    }
}
