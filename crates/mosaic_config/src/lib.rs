//! Parsing and validation of `mosaic.toml` floorplanner configuration files.
//!
//! This crate reads the configuration file, validates its numeric ranges, and
//! resolves the free-form names (representation, clustering strategy) into a
//! strongly-typed [`ResolvedOptions`] that the engine consumes.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use resolve::{
    resolve_options, AnnealSettings, Clustering, HierarchySettings, OutlineChoice,
    Representation, ResolvedOptions,
};
pub use types::*;
