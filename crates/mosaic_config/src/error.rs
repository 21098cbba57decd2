//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating a `mosaic.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// The representation name is not one of the supported encodings.
    #[error("unknown representation '{0}' (expected 'tree', 'sequence-pair' or 'auto')")]
    UnknownRepresentation(String),

    /// The clustering strategy name is not recognized.
    #[error("unknown clustering strategy '{0}' (expected 'netlist' or 'physical')")]
    UnknownClustering(String),

    /// A required field is missing from the configuration.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}
