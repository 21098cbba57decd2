//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::MosaicConfig;
use std::path::Path;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "mosaic.toml";

/// Loads and validates `mosaic.toml` from a directory.
pub fn load_config(dir: &Path) -> Result<MosaicConfig, ConfigError> {
    let content = std::fs::read_to_string(dir.join(CONFIG_FILE_NAME))?;
    load_config_from_str(&content)
}

/// Parses and validates a `mosaic.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<MosaicConfig, ConfigError> {
    let config: MosaicConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks numeric ranges and required names.
fn validate_config(config: &MosaicConfig) -> Result<(), ConfigError> {
    let fp = &config.floorplan;
    if fp.representation.trim().is_empty() {
        return Err(ConfigError::MissingField(
            "floorplan.representation".to_string(),
        ));
    }
    if let Some(ar) = fp.aspect_ratio {
        if !(ar.is_finite() && ar > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "floorplan.aspect_ratio must be positive, got {ar}"
            )));
        }
    }
    if !(fp.max_whitespace.is_finite() && fp.max_whitespace >= 0.0) {
        return Err(ConfigError::ValidationError(format!(
            "floorplan.max_whitespace must be non-negative, got {}",
            fp.max_whitespace
        )));
    }

    let an = &config.anneal;
    if !(an.start_temperature > 0.0 && an.cool_temperature > 0.0) {
        return Err(ConfigError::ValidationError(
            "anneal temperatures must be positive".to_string(),
        ));
    }
    if an.cool_temperature >= an.start_temperature {
        return Err(ConfigError::ValidationError(format!(
            "anneal.cool_temperature ({}) must be below start_temperature ({})",
            an.cool_temperature, an.start_temperature
        )));
    }
    for (name, w) in [("area_weight", an.area_weight), ("wire_weight", an.wire_weight)] {
        if !(0.0..=1.0).contains(&w) {
            return Err(ConfigError::ValidationError(format!(
                "anneal.{name} must lie in [0, 1], got {w}"
            )));
        }
    }
    if an.area_weight + an.wire_weight > 1.0 + 1e-9 {
        return Err(ConfigError::ValidationError(
            "anneal.area_weight + anneal.wire_weight must not exceed 1".to_string(),
        ));
    }

    let hier = &config.hierarchy;
    if hier.max_cluster_iterations == 0 {
        return Err(ConfigError::ValidationError(
            "hierarchy.max_cluster_iterations must be at least 1".to_string(),
        ));
    }
    if hier.max_top_level_blocks == Some(0) {
        return Err(ConfigError::ValidationError(
            "hierarchy.max_top_level_blocks must be at least 1".to_string(),
        ));
    }
    Ok(())
}
