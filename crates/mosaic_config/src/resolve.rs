//! Resolution of free-form configuration names into engine options.

use crate::error::ConfigError;
use crate::types::MosaicConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The solution encoding used by the annealer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Representation {
    /// B*-tree packing with contour evaluation.
    Tree,
    /// Sequence pair with longest-common-subsequence evaluation.
    SequencePair,
    /// Chosen per instance from the block count and objective.
    Auto,
}

impl FromStr for Representation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tree" | "btree" | "b*-tree" => Ok(Representation::Tree),
            "sequence-pair" | "seqpair" | "sp" => Ok(Representation::SequencePair),
            "auto" => Ok(Representation::Auto),
            _ => Err(ConfigError::UnknownRepresentation(s.to_string())),
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Representation::Tree => write!(f, "tree"),
            Representation::SequencePair => write!(f, "sequence-pair"),
            Representation::Auto => write!(f, "auto"),
        }
    }
}

/// Which collaborator groups blocks for the hierarchical solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Clustering {
    /// Greedy merging of strongly connected blocks.
    Netlist,
    /// Grid bucketing of current block locations.
    Physical,
}

impl FromStr for Clustering {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "netlist" | "connectivity" => Ok(Clustering::Netlist),
            "physical" | "proximity" => Ok(Clustering::Physical),
            _ => Err(ConfigError::UnknownClustering(s.to_string())),
        }
    }
}

/// The outline objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OutlineChoice {
    /// No outline; minimize area (and wirelength).
    Free,
    /// Fixed outline derived from an aspect ratio and the whitespace budget.
    AspectRatio(f64),
}

/// Resolved `[anneal]` settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnealSettings {
    /// Initial temperature.
    pub start_temperature: f64,
    /// Greedy-phase threshold temperature.
    pub cool_temperature: f64,
    /// Total move budget.
    pub max_moves: Option<u64>,
    /// Weight of the area term.
    pub area_weight: f64,
    /// Weight of the wirelength term.
    pub wire_weight: f64,
    /// Largest block count for which `auto` prefers the sequence pair.
    pub seqpair_block_threshold: usize,
}

/// Resolved `[hierarchy]` settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchySettings {
    /// Largest block count solved flat, if overridden.
    pub max_top_level_blocks: Option<usize>,
    /// Cluster-level annealing attempts.
    pub max_cluster_iterations: usize,
    /// Sequence-pair failures before switching to the tree.
    pub switch_after_failures: usize,
    /// Clustering strategy.
    pub clustering: Clustering,
    /// Whether clusters are solved in parallel.
    pub parallel: bool,
}

impl HierarchySettings {
    /// Returns the flat-solve limit for an instance of `block_count` blocks.
    pub fn max_top_level(&self, block_count: usize) -> usize {
        self.max_top_level_blocks
            .unwrap_or_else(|| ((2.0 * (block_count as f64).sqrt()) as usize).max(50))
    }
}

/// A fully resolved configuration, ready to drive the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOptions {
    /// Solution encoding.
    pub representation: Representation,
    /// Whether wirelength joins the objective.
    pub minimize_wirelength: bool,
    /// Outline objective.
    pub outline: OutlineChoice,
    /// Allowed whitespace percentage.
    pub max_whitespace: f64,
    /// RNG seed, `None` for OS entropy.
    pub seed: Option<u64>,
    /// Post-anneal compaction.
    pub compact: bool,
    /// Orientation changes disabled.
    pub no_rotation: bool,
    /// Soft-block reshaping enabled.
    pub soft_blocks: bool,
    /// Annealing settings.
    pub anneal: AnnealSettings,
    /// Hierarchy settings.
    pub hierarchy: HierarchySettings,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        build(&MosaicConfig::default(), Representation::Auto, Clustering::Netlist)
    }
}

/// Resolves the named choices of a validated configuration.
pub fn resolve_options(config: &MosaicConfig) -> Result<ResolvedOptions, ConfigError> {
    let representation: Representation = config.floorplan.representation.parse()?;
    let clustering: Clustering = config.hierarchy.clustering.parse()?;
    Ok(build(config, representation, clustering))
}

fn build(
    config: &MosaicConfig,
    representation: Representation,
    clustering: Clustering,
) -> ResolvedOptions {
    let fp = &config.floorplan;
    let outline = match fp.aspect_ratio {
        Some(ar) => OutlineChoice::AspectRatio(ar),
        None => OutlineChoice::Free,
    };

    ResolvedOptions {
        representation,
        minimize_wirelength: fp.minimize_wirelength,
        outline,
        max_whitespace: fp.max_whitespace,
        seed: fp.seed,
        compact: fp.compact,
        no_rotation: fp.no_rotation,
        soft_blocks: fp.soft_blocks,
        anneal: AnnealSettings {
            start_temperature: config.anneal.start_temperature,
            cool_temperature: config.anneal.cool_temperature,
            max_moves: config.anneal.max_moves,
            area_weight: config.anneal.area_weight,
            wire_weight: config.anneal.wire_weight,
            seqpair_block_threshold: config.anneal.seqpair_block_threshold,
        },
        hierarchy: HierarchySettings {
            max_top_level_blocks: config.hierarchy.max_top_level_blocks,
            max_cluster_iterations: config.hierarchy.max_cluster_iterations,
            switch_after_failures: config.hierarchy.switch_after_failures,
            clustering,
            parallel: config.hierarchy.parallel,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    #[test]
    fn representation_names() {
        assert_eq!("tree".parse::<Representation>().unwrap(), Representation::Tree);
        assert_eq!(
            "Sequence-Pair".parse::<Representation>().unwrap(),
            Representation::SequencePair
        );
        assert_eq!("sp".parse::<Representation>().unwrap(), Representation::SequencePair);
        assert_eq!("auto".parse::<Representation>().unwrap(), Representation::Auto);
        assert!(matches!(
            "o-tree".parse::<Representation>(),
            Err(ConfigError::UnknownRepresentation(name)) if name == "o-tree"
        ));
    }

    #[test]
    fn representation_display_parses_back() {
        for rep in [
            Representation::Tree,
            Representation::SequencePair,
            Representation::Auto,
        ] {
            assert_eq!(rep.to_string().parse::<Representation>().unwrap(), rep);
        }
    }

    #[test]
    fn resolve_defaults() {
        let opts = ResolvedOptions::default();
        assert_eq!(opts.representation, Representation::Auto);
        assert_eq!(opts.outline, OutlineChoice::Free);
        assert_eq!(opts.hierarchy.clustering, Clustering::Netlist);
        assert!(opts.seed.is_none());
    }

    #[test]
    fn resolve_fixed_outline() {
        let config = load_config_from_str(
            "[floorplan]\nrepresentation = \"tree\"\naspect_ratio = 1.5\nseed = 3\n",
        )
        .unwrap();
        let opts = resolve_options(&config).unwrap();
        assert_eq!(opts.representation, Representation::Tree);
        assert_eq!(opts.outline, OutlineChoice::AspectRatio(1.5));
        assert_eq!(opts.seed, Some(3));
    }

    #[test]
    fn unknown_representation_errors() {
        let config = load_config_from_str("[floorplan]\nrepresentation = \"slicing\"\n").unwrap();
        let err = resolve_options(&config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRepresentation(_)));
    }

    #[test]
    fn unknown_clustering_errors() {
        let config = load_config_from_str("[hierarchy]\nclustering = \"spectral\"\n").unwrap();
        let err = resolve_options(&config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownClustering(_)));
    }

    #[test]
    fn top_level_limit() {
        let mut hier = ResolvedOptions::default().hierarchy;
        assert_eq!(hier.max_top_level(100), 50);
        assert_eq!(hier.max_top_level(10_000), 200);
        hier.max_top_level_blocks = Some(8);
        assert_eq!(hier.max_top_level(10_000), 8);
    }
}
