//! The B*-tree packing representation.
//!
//! Tree positions live in an arena of `N + 2` nodes. Positions `0..N` hold
//! one block each; position `N` is the left wall and roots the tree (its left
//! child is the block at the origin), position `N + 1` is the bottom wall and
//! only appears in the contour. A left child sits immediately right of its
//! parent, a right child directly above it at the same x.

use crate::error::{FloorplanError, FloorplanResult};
use crate::geom::Orientation;
use crate::shape::ShapeTable;
use mosaic_common::{InternalError, MosaicResult};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One tree position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Parent position, `None` only for the walls.
    pub parent: Option<usize>,
    /// Position placed to the right of this one.
    pub left: Option<usize>,
    /// Position placed above this one.
    pub right: Option<usize>,
    /// The block held by this position.
    pub block: usize,
    /// The orientation of that block.
    pub orient: Orientation,
}

impl TreeNode {
    fn detached(block: usize) -> Self {
        Self {
            parent: None,
            left: None,
            right: None,
            block,
            orient: Orientation::N,
        }
    }
}

/// A B*-tree over `N` blocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BTree {
    nodes: Vec<TreeNode>,
    // position holding each block
    position: Vec<usize>,
}

impl BTree {
    /// The tree of an instance without blocks.
    pub fn empty() -> Self {
        Self::unlinked(0)
    }

    /// All blocks in one row, block `i + 1` right of block `i`.
    pub fn chain(n: usize) -> Self {
        let mut tree = Self::unlinked(n);
        let mut prev = tree.left_wall();
        for i in 0..n {
            tree.link(prev, i, true);
            prev = i;
        }
        tree
    }

    /// Builds a tree from a bit string, a block permutation and one
    /// orientation per permutation entry.
    ///
    /// Blocks are attached in permutation order. A `false` bit attaches the
    /// next block below the current position (as left child after a
    /// descent, as right child after a climb); each `true` bit climbs to the
    /// nearest ancestor with a free right slot.
    pub fn from_bits(
        bits: &[bool],
        perm: &[usize],
        orients: &[Orientation],
    ) -> FloorplanResult<Self> {
        let n = perm.len();
        if orients.len() != n {
            return Err(FloorplanError::InvalidInput(format!(
                "{} orientations for {} blocks",
                orients.len(),
                n
            )));
        }
        let mut seen = vec![false; n];
        for &b in perm {
            if b >= n || std::mem::replace(&mut seen[b], true) {
                return Err(FloorplanError::NotAPermutation {
                    which: "tree",
                    len: n,
                });
            }
        }

        let malformed = || FloorplanError::InvalidInput("malformed tree bits".to_string());
        let mut tree = Self::unlinked(n);
        let mut ptr = tree.left_wall();
        let mut bit = 0;
        let mut climbed: Option<bool> = None;
        for (i, &block) in perm.iter().enumerate() {
            loop {
                let current = *bits.get(bit).ok_or_else(malformed)?;
                if !current {
                    break;
                }
                if climbed == Some(true) {
                    ptr = tree.nodes[ptr].parent.ok_or_else(malformed)?;
                }
                while tree.nodes[ptr].right.is_some() {
                    ptr = tree.nodes[ptr].parent.ok_or_else(malformed)?;
                }
                bit += 1;
                climbed = Some(true);
            }
            let as_left = climbed != Some(true);
            let slot = if as_left {
                tree.nodes[ptr].left
            } else {
                tree.nodes[ptr].right
            };
            if slot.is_some() {
                return Err(malformed());
            }
            tree.link(ptr, block, as_left);
            tree.nodes[block].orient = orients[i];
            ptr = block;
            climbed = Some(false);
            bit += 1;
        }
        tree.validate()
            .map_err(|e| FloorplanError::InvalidInput(e.message))?;
        Ok(tree)
    }

    /// A random tree: blocks inserted in random order into random free slots.
    pub fn random(n: usize, rng: &mut impl Rng) -> Self {
        let mut tree = Self::unlinked(n);
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);
        let mut free: Vec<(usize, bool)> = vec![(tree.left_wall(), true)];
        for block in order {
            let (parent, as_left) = free.swap_remove(rng.gen_range(0..free.len()));
            tree.link(parent, block, as_left);
            free.push((block, true));
            free.push((block, false));
        }
        tree
    }

    pub(crate) fn unlinked(n: usize) -> Self {
        let mut nodes: Vec<TreeNode> = (0..n + 2).map(TreeNode::detached).collect();
        nodes[n].block = n;
        nodes[n + 1].block = n + 1;
        Self {
            nodes,
            position: (0..n).collect(),
        }
    }

    /// Links the position holding `child` below `parent` (a position).
    pub(crate) fn link(&mut self, parent: usize, child: usize, as_left: bool) {
        let node = self.position[child];
        if as_left {
            self.nodes[parent].left = Some(node);
        } else {
            self.nodes[parent].right = Some(node);
        }
        self.nodes[node].parent = Some(parent);
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.position.len()
    }

    /// Returns `true` if the tree holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    /// Position of the left wall (the root).
    pub fn left_wall(&self) -> usize {
        self.len()
    }

    /// Position of the bottom wall.
    pub fn bottom_wall(&self) -> usize {
        self.len() + 1
    }

    /// The node at a position.
    pub fn node(&self, position: usize) -> &TreeNode {
        &self.nodes[position]
    }

    /// The position holding `block`.
    pub fn position_of(&self, block: usize) -> usize {
        self.position[block]
    }

    /// Orientation of `block`.
    pub fn orient(&self, block: usize) -> Orientation {
        self.nodes[self.position[block]].orient
    }

    /// Orientations indexed by block.
    pub fn orients(&self) -> Vec<Orientation> {
        (0..self.len()).map(|b| self.orient(b)).collect()
    }

    /// The block whose position is the parent of `block`'s, or `None` when
    /// `block` sits at the root.
    pub fn parent_block(&self, block: usize) -> Option<usize> {
        let parent = self.nodes[self.position[block]].parent?;
        (parent < self.len()).then(|| self.nodes[parent].block)
    }

    /// Positions in depth-first order, left subtrees first.
    pub fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack: Vec<usize> = self.nodes[self.left_wall()].left.into_iter().collect();
        while let Some(node) = stack.pop() {
            order.push(node);
            if let Some(r) = self.nodes[node].right {
                stack.push(r);
            }
            if let Some(l) = self.nodes[node].left {
                stack.push(l);
            }
        }
        order
    }

    /// Checks the structural invariants.
    pub fn validate(&self) -> MosaicResult<()> {
        let n = self.len();
        if self.nodes.len() != n + 2 {
            return Err(InternalError::new(format!(
                "tree has {} nodes for {} blocks",
                self.nodes.len(),
                n
            )));
        }
        for (block, &pos) in self.position.iter().enumerate() {
            if pos >= n || self.nodes[pos].block != block {
                return Err(InternalError::new(format!(
                    "block {block} is not held by its position"
                )));
            }
        }
        let wall = &self.nodes[n];
        if wall.parent.is_some() || wall.right.is_some() {
            return Err(InternalError::new("left wall has a parent or right child"));
        }
        if wall.left.is_none() != (n == 0) {
            return Err(InternalError::new("left wall does not root the tree"));
        }
        let bottom = &self.nodes[n + 1];
        if bottom.parent.is_some() || bottom.left.is_some() || bottom.right.is_some() {
            return Err(InternalError::new("bottom wall is linked into the tree"));
        }

        let mut visited = vec![false; n];
        let mut stack = vec![n];
        let mut count = 0;
        while let Some(node) = stack.pop() {
            for child in [self.nodes[node].left, self.nodes[node].right]
                .into_iter()
                .flatten()
            {
                if child >= n {
                    return Err(InternalError::new(format!(
                        "position {node} links to wall {child}"
                    )));
                }
                if self.nodes[child].parent != Some(node) {
                    return Err(InternalError::new(format!(
                        "position {child} does not point back to its parent {node}"
                    )));
                }
                if std::mem::replace(&mut visited[child], true) {
                    return Err(InternalError::new(format!(
                        "position {child} is reachable twice"
                    )));
                }
                count += 1;
                stack.push(child);
            }
        }
        if count != n {
            return Err(InternalError::new(format!(
                "{} of {} blocks reachable from the root",
                count, n
            )));
        }
        Ok(())
    }

    /// Exchanges the tree positions of two blocks; each keeps its
    /// orientation. Applying the same swap twice restores the tree.
    pub fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let (pa, pb) = (self.position[a], self.position[b]);
        let (oa, ob) = (self.nodes[pa].orient, self.nodes[pb].orient);
        self.nodes[pa].block = b;
        self.nodes[pa].orient = ob;
        self.nodes[pb].block = a;
        self.nodes[pb].orient = oa;
        self.position.swap(a, b);
        debug_assert!(self.validate().is_ok());
    }

    /// Moves `block` below `target`, as its left or right child.
    ///
    /// The moved block leaves its children behind: a single child takes its
    /// place; with two children the left child does, and the right subtree is
    /// hung at the top of the promoted child's right chain. On insertion the
    /// block adopts the child `target` had on that side.
    ///
    /// Returns `false` without changes when `block == target`.
    pub fn relocate(&mut self, block: usize, target: usize, as_left: bool) -> bool {
        if block == target {
            return false;
        }
        let node = self.position[block];
        self.detach(node);

        let target = self.position[target];
        let displaced = if as_left {
            self.nodes[target].left.replace(node)
        } else {
            self.nodes[target].right.replace(node)
        };
        let moved = &mut self.nodes[node];
        moved.parent = Some(target);
        if as_left {
            moved.left = displaced;
        } else {
            moved.right = displaced;
        }
        if let Some(d) = displaced {
            self.nodes[d].parent = Some(node);
        }
        debug_assert!(self.validate().is_ok());
        true
    }

    fn detach(&mut self, node: usize) {
        let TreeNode {
            parent,
            left,
            right,
            ..
        } = self.nodes[node];
        let replacement = match (left, right) {
            (Some(l), Some(r)) => {
                let mut top = l;
                while let Some(next) = self.nodes[top].right {
                    top = next;
                }
                self.nodes[top].right = Some(r);
                self.nodes[r].parent = Some(top);
                Some(l)
            }
            (Some(c), None) | (None, Some(c)) => Some(c),
            (None, None) => None,
        };
        if let Some(parent) = parent {
            if self.nodes[parent].left == Some(node) {
                self.nodes[parent].left = replacement;
            } else {
                self.nodes[parent].right = replacement;
            }
        }
        if let Some(c) = replacement {
            self.nodes[c].parent = parent;
        }
        let detached = &mut self.nodes[node];
        detached.parent = None;
        detached.left = None;
        detached.right = None;
    }

    /// Sets the orientation of `block`. Returns `false` when the block's
    /// orientation is fixed.
    pub fn rotate(&mut self, block: usize, orient: Orientation, shapes: &ShapeTable) -> bool {
        if !shapes.can_rotate(block) {
            return false;
        }
        let pos = self.position[block];
        self.nodes[pos].orient = orient;
        true
    }

    pub(crate) fn set_orient(&mut self, block: usize, orient: Orientation) {
        let pos = self.position[block];
        self.nodes[pos].orient = orient;
    }
}
