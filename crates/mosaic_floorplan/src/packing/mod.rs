//! B*-tree packing: the tree representation and its contour evaluator.

pub mod contour;
pub mod tree;

pub use contour::{ContourEvaluator, Packing};
pub use tree::{BTree, TreeNode};
