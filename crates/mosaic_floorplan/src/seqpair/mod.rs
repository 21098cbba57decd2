//! The sequence-pair representation.
//!
//! Block `a` is left of block `b` when `a` precedes `b` in both sequences,
//! and above `b` when it precedes `b` in `x` but follows it in `y`.

pub mod convert;

use crate::error::{FloorplanError, FloorplanResult};
use crate::geom::{Direction, Orientation};
use crate::shape::ShapeTable;
use crate::solution::{PlacedBlock, Placement};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub use convert::{
    placement_to_seqpair, placement_to_tree, seqpair_to_tree, tree_to_seqpair, ConversionAlgo,
};

/// A pair of block permutations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeqPair {
    x: Vec<usize>,
    y: Vec<usize>,
}

impl SeqPair {
    /// Builds a sequence pair, checking that both sequences are permutations
    /// of the same block set.
    pub fn new(x: Vec<usize>, y: Vec<usize>) -> FloorplanResult<Self> {
        if x.len() != y.len() {
            return Err(FloorplanError::SequencePairLength {
                x: x.len(),
                y: y.len(),
                expected: x.len(),
            });
        }
        check_permutation(&x, "x")?;
        check_permutation(&y, "y")?;
        Ok(Self { x, y })
    }

    /// All blocks in one row, in index order.
    pub fn row(n: usize) -> Self {
        Self {
            x: (0..n).collect(),
            y: (0..n).collect(),
        }
    }

    /// A uniformly random sequence pair.
    pub fn random(n: usize, rng: &mut impl Rng) -> Self {
        let mut x: Vec<usize> = (0..n).collect();
        let mut y = x.clone();
        x.shuffle(rng);
        y.shuffle(rng);
        Self { x, y }
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns `true` if there are no blocks.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// The X sequence.
    pub fn x(&self) -> &[usize] {
        &self.x
    }

    /// The Y sequence.
    pub fn y(&self) -> &[usize] {
        &self.y
    }

    fn positions(seq: &[usize]) -> Vec<usize> {
        let mut pos = vec![0; seq.len()];
        for (i, &b) in seq.iter().enumerate() {
            pos[b] = i;
        }
        pos
    }

    /// Returns `true` if `a` is constrained to the left of `b`.
    pub fn is_left_of(&self, a: usize, b: usize) -> bool {
        let (px, py) = (Self::positions(&self.x), Self::positions(&self.y));
        px[a] < px[b] && py[a] < py[b]
    }

    /// Returns `true` if `a` is constrained below `b`.
    pub fn is_below(&self, a: usize, b: usize) -> bool {
        let (px, py) = (Self::positions(&self.x), Self::positions(&self.y));
        px[a] > px[b] && py[a] < py[b]
    }

    /// Lower-left corners of the tightest packing for the given dimensions.
    pub fn coordinates(&self, dims: &[(f64, f64)]) -> Vec<(f64, f64)> {
        let n = self.len();
        let pos_y = Self::positions(&self.y);
        let mut coords = vec![(0.0, 0.0); n];

        let mut tree = PrefixMax::new(n);
        for &b in &self.x {
            let x = tree.query(pos_y[b]);
            coords[b].0 = x;
            tree.update(pos_y[b], x + dims[b].0);
        }

        let mut tree = PrefixMax::new(n);
        for &b in self.x.iter().rev() {
            let y = tree.query(pos_y[b]);
            coords[b].1 = y;
            tree.update(pos_y[b], y + dims[b].1);
        }
        coords
    }

    /// Packs the blocks with the given orientations.
    pub fn evaluate(&self, shapes: &ShapeTable, orients: &[Orientation]) -> Placement {
        let dims: Vec<(f64, f64)> = (0..self.len())
            .map(|b| shapes.dims(b, orients[b]))
            .collect();
        let coords = self.coordinates(&dims);
        Placement::new(
            coords
                .iter()
                .zip(&dims)
                .zip(orients)
                .map(|((&(x, y), &(w, h)), &o)| PlacedBlock::new(x, y, w, h, o))
                .collect(),
        )
    }

    /// Swaps the blocks at two positions of the X sequence.
    pub fn swap_x(&mut self, i: usize, j: usize) {
        self.x.swap(i, j);
    }

    /// Swaps the blocks at two positions of the Y sequence.
    pub fn swap_y(&mut self, i: usize, j: usize) {
        self.y.swap(i, j);
    }

    /// Exchanges two blocks in both sequences.
    pub fn swap_blocks(&mut self, a: usize, b: usize) {
        for seq in [&mut self.x, &mut self.y] {
            for v in seq.iter_mut() {
                if *v == a {
                    *v = b;
                } else if *v == b {
                    *v = a;
                }
            }
        }
    }

    /// Moves the entry at position `from` of the X sequence to position `to`.
    pub fn relocate_x(&mut self, from: usize, to: usize) {
        let b = self.x.remove(from);
        self.x.insert(to, b);
    }

    /// Moves the entry at position `from` of the Y sequence to position `to`.
    pub fn relocate_y(&mut self, from: usize, to: usize) {
        let b = self.y.remove(from);
        self.y.insert(to, b);
    }

    /// Swaps two blocks whose X positions differ by at most `ceil(n / 4)`.
    /// Returns the swapped positions.
    pub fn near_swap(&mut self, rng: &mut impl Rng) -> Option<(usize, usize)> {
        let n = self.len();
        if n < 2 {
            return None;
        }
        let reach = n.div_ceil(4).max(1);
        let i = rng.gen_range(0..n);
        let lo = i.saturating_sub(reach);
        let hi = (i + reach).min(n - 1);
        let mut j = rng.gen_range(lo..=hi);
        if j == i {
            j = if i + 1 < n { i + 1 } else { i - 1 };
        }
        self.swap_x(i, j);
        Some((i, j))
    }

    /// Moves `block` next to `anchor` on the given side, in both sequences.
    pub fn place_next_to(&mut self, block: usize, anchor: usize, side: Direction) {
        if block == anchor {
            return;
        }
        // (after anchor in X, after anchor in Y)
        let (after_x, after_y) = match side {
            Direction::Right => (true, true),
            Direction::Left => (false, false),
            Direction::Up => (false, true),
            Direction::Down => (true, false),
        };
        for (seq, after) in [(&mut self.x, after_x), (&mut self.y, after_y)] {
            seq.retain(|&b| b != block);
            let at = seq.iter().position(|&b| b == anchor).unwrap_or(0);
            seq.insert(if after { at + 1 } else { at }, block);
        }
    }
}

fn check_permutation(seq: &[usize], which: &'static str) -> FloorplanResult<()> {
    let mut seen = vec![false; seq.len()];
    for &b in seq {
        if b >= seq.len() || std::mem::replace(&mut seen[b], true) {
            return Err(FloorplanError::NotAPermutation {
                which,
                len: seq.len(),
            });
        }
    }
    Ok(())
}

// Fenwick tree answering "max over positions < i".
struct PrefixMax {
    tree: Vec<f64>,
}

impl PrefixMax {
    fn new(n: usize) -> Self {
        Self {
            tree: vec![0.0; n + 1],
        }
    }

    fn update(&mut self, pos: usize, value: f64) {
        let mut i = pos + 1;
        while i < self.tree.len() {
            self.tree[i] = self.tree[i].max(value);
            i += i & i.wrapping_neg();
        }
    }

    fn query(&self, pos: usize) -> f64 {
        let mut best = 0.0_f64;
        let mut i = pos;
        while i > 0 {
            best = best.max(self.tree[i]);
            i -= i & i.wrapping_neg();
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn squares(n: usize) -> ShapeTable {
        ShapeTable::from_dims(&vec![(10.0, 10.0); n])
    }

    #[test]
    fn rejects_bad_sequences() {
        assert!(matches!(
            SeqPair::new(vec![0, 1], vec![0]),
            Err(FloorplanError::SequencePairLength { x: 2, y: 1, .. })
        ));
        assert!(matches!(
            SeqPair::new(vec![0, 0], vec![0, 1]),
            Err(FloorplanError::NotAPermutation { which: "x", .. })
        ));
        assert!(matches!(
            SeqPair::new(vec![0, 1], vec![1, 2]),
            Err(FloorplanError::NotAPermutation { which: "y", .. })
        ));
    }

    #[test]
    fn row_and_column() {
        let row = SeqPair::row(3).evaluate(&squares(3), &[Orientation::N; 3]);
        assert_eq!((row.width, row.height), (30.0, 10.0));

        let column = SeqPair::new(vec![0, 1, 2], vec![2, 1, 0]).unwrap();
        let p = column.evaluate(&squares(3), &[Orientation::N; 3]);
        assert_eq!((p.width, p.height), (10.0, 30.0));
        // 0 precedes in X and follows in Y: 0 is on top
        assert_eq!(p.blocks[0].y, 20.0);
        assert!(column.is_below(2, 0));
    }

    #[test]
    fn two_by_two_grid() {
        // 2 3
        // 0 1
        let sp = SeqPair::new(vec![2, 0, 3, 1], vec![0, 1, 2, 3]).unwrap();
        let p = sp.evaluate(&squares(4), &[Orientation::N; 4]);
        assert_eq!((p.width, p.height), (20.0, 20.0));
        assert_eq!((p.blocks[3].x, p.blocks[3].y), (10.0, 10.0));
        assert!(sp.is_left_of(0, 1));
        assert!(!p.has_overlap());
    }

    #[test]
    fn random_pairs_never_overlap() {
        let mut rng = StdRng::seed_from_u64(9);
        let dims: Vec<(f64, f64)> = (0..25)
            .map(|_| (rng.gen_range(1.0..15.0), rng.gen_range(1.0..15.0)))
            .collect();
        let shapes = ShapeTable::from_dims(&dims);
        for _ in 0..40 {
            let sp = SeqPair::random(25, &mut rng);
            let p = sp.evaluate(&shapes, &[Orientation::N; 25]);
            assert!(!p.has_overlap());
        }
    }

    #[test]
    fn moves_keep_permutations() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut sp = SeqPair::random(10, &mut rng);
        sp.swap_x(0, 9);
        sp.swap_y(3, 4);
        sp.swap_blocks(2, 7);
        sp.relocate_x(1, 8);
        sp.relocate_y(9, 0);
        let (i, j) = sp.near_swap(&mut rng).unwrap();
        assert!(i.abs_diff(j) <= 3);
        sp.place_next_to(5, 6, Direction::Up);
        SeqPair::new(sp.x().to_vec(), sp.y().to_vec()).unwrap();
    }

    #[test]
    fn place_next_to_sets_relation() {
        let mut sp = SeqPair::row(4);
        sp.place_next_to(0, 3, Direction::Right);
        assert!(sp.is_left_of(3, 0));
        sp.place_next_to(1, 2, Direction::Up);
        assert!(sp.is_below(2, 1));
        sp.place_next_to(2, 0, Direction::Down);
        assert!(sp.is_below(2, 0));
        sp.place_next_to(3, 1, Direction::Left);
        assert!(sp.is_left_of(3, 1));
    }
}
