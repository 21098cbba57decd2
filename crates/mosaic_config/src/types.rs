//! Configuration types deserialized from `mosaic.toml`.
//!
//! Every section and every field is optional; omitted values take the
//! defaults documented on each field.

use serde::Deserialize;

/// The top-level configuration parsed from `mosaic.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MosaicConfig {
    /// Objective and representation settings.
    #[serde(default)]
    pub floorplan: FloorplanSection,
    /// Annealing schedule and cost weights.
    #[serde(default)]
    pub anneal: AnnealSection,
    /// Hierarchical (clustering) solver settings.
    #[serde(default)]
    pub hierarchy: HierarchySection,
}

/// The `[floorplan]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FloorplanSection {
    /// Encoding used by the annealer: `"tree"`, `"sequence-pair"` or `"auto"`.
    pub representation: String,
    /// Whether half-perimeter wirelength joins area in the objective.
    pub minimize_wirelength: bool,
    /// Target width/height ratio of the fixed outline; omitted means free outline.
    pub aspect_ratio: Option<f64>,
    /// Allowed whitespace as a percentage of total block area.
    pub max_whitespace: f64,
    /// RNG seed; omitted means OS entropy.
    pub seed: Option<u64>,
    /// Whether the final placement is compacted.
    pub compact: bool,
    /// Disables orientation changes for every block.
    pub no_rotation: bool,
    /// Enables reshaping of soft blocks during annealing.
    pub soft_blocks: bool,
}

impl Default for FloorplanSection {
    fn default() -> Self {
        Self {
            representation: "auto".to_string(),
            minimize_wirelength: false,
            aspect_ratio: None,
            max_whitespace: 15.0,
            seed: None,
            compact: true,
            no_rotation: false,
            soft_blocks: true,
        }
    }
}

/// The `[anneal]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnnealSection {
    /// Initial temperature.
    pub start_temperature: f64,
    /// Temperature below which only improving moves are accepted.
    pub cool_temperature: f64,
    /// Total move budget across the run; omitted means unbounded.
    pub max_moves: Option<u64>,
    /// Weight of the area term.
    pub area_weight: f64,
    /// Weight of the wirelength term.
    pub wire_weight: f64,
    /// Largest block count for which `auto` prefers the sequence pair.
    pub seqpair_block_threshold: usize,
}

impl Default for AnnealSection {
    fn default() -> Self {
        Self {
            start_temperature: 30000.0,
            cool_temperature: 0.01,
            max_moves: None,
            area_weight: 0.4,
            wire_weight: 0.4,
            seqpair_block_threshold: 40,
        }
    }
}

/// The `[hierarchy]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HierarchySection {
    /// Largest block count solved flat; omitted means `max(2 * sqrt(n), 50)`.
    pub max_top_level_blocks: Option<usize>,
    /// Cluster-level annealing attempts before falling back.
    pub max_cluster_iterations: usize,
    /// Sequence-pair failures tolerated before switching to the tree.
    pub switch_after_failures: usize,
    /// Clustering strategy: `"netlist"` or `"physical"`.
    pub clustering: String,
    /// Whether independent clusters are solved in parallel.
    pub parallel: bool,
}

impl Default for HierarchySection {
    fn default() -> Self {
        Self {
            max_top_level_blocks: None,
            max_cluster_iterations: 4,
            switch_after_failures: 2,
            clustering: "netlist".to_string(),
            parallel: true,
        }
    }
}
