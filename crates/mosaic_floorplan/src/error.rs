//! Error types for floorplanning requests.

use mosaic_common::InternalError;
use mosaic_config::ConfigError;

/// Errors that reject a floorplanning request before any annealing starts.
///
/// An infeasible outline is not an error: solver outcomes carry a `success`
/// flag instead.
#[derive(Debug, thiserror::Error)]
pub enum FloorplanError {
    /// The configuration could not be loaded or resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The two sequences of a sequence pair disagree with the block count.
    #[error("sequence pair lengths differ: x has {x}, y has {y}, expected {expected}")]
    SequencePairLength {
        /// Length of the X sequence.
        x: usize,
        /// Length of the Y sequence.
        y: usize,
        /// Number of blocks.
        expected: usize,
    },

    /// A sequence does not contain every block exactly once.
    #[error("sequence {which} is not a permutation of 0..{len}")]
    NotAPermutation {
        /// `"x"` or `"y"`.
        which: &'static str,
        /// Expected permutation length.
        len: usize,
    },

    /// The design database is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An explicit outline has a non-positive dimension.
    #[error("invalid outline {width} x {height}")]
    InvalidOutline {
        /// Requested width.
        width: f64,
        /// Requested height.
        height: f64,
    },

    /// An internal invariant was violated.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// Result alias for floorplanning requests.
pub type FloorplanResult<T> = Result<T, FloorplanError>;
