//! Shared foundational types used across the Mosaic floorplanner.
//!
//! This crate provides the internal error type, the common result alias, and
//! tolerance-aware floating point comparisons used by every geometric stage.

#![warn(missing_docs)]

pub mod float;
pub mod result;

pub use float::{approx_eq, definitely_less, less_or_equal, Tolerance, EPSILON};
pub use result::{InternalError, MosaicResult};
