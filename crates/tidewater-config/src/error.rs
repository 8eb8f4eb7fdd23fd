//! Error types for config loading, interpolation and validation.

use thiserror::Error;

/// Errors returned while loading, resolving or validating config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading a config file failed.
    #[error("failed to read config: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// A config file could not be parsed.
    #[error("failed to parse {origin} at line {line}: {message}")]
    ParseFailed {
        origin: String,
        line: usize,
        message: String,
    },
    /// Serializing the resolved config failed.
    #[error("failed to encode config: {0}")]
    EncodeFailed(#[from] serde_json::Error),
    /// The requested section does not exist.
    #[error("missing config section [{0}]")]
    MissingSection(String),
    /// The requested option does not exist in the section.
    #[error("missing config option {section}:{option}")]
    MissingOption { section: String, option: String },
    /// A `${section:option}` reference points at nothing.
    #[error("unresolved reference {chain}")]
    UnresolvedReference { chain: String },
    /// A chain of `${section:option}` references loops back on itself.
    #[error("circular reference {chain}")]
    CircularReference { chain: String },
    /// An interpolation expression is malformed.
    #[error("bad interpolation in {section}:{option}: {message}")]
    BadInterpolation {
        section: String,
        option: String,
        message: String,
    },
    /// A value could not be converted to the requested type.
    #[error("invalid value for {section}:{option}: {message}")]
    InvalidValue {
        section: String,
        option: String,
        message: String,
    },
    /// A NetCDF format or engine value is not supported.
    #[error("unsupported NetCDF {key} {value:?} (expected one of: {expected})")]
    UnsupportedNetcdf {
        key: String,
        value: String,
        expected: String,
    },
    /// Generic validation failure.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn invalid_value(section: &str, option: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            section: section.to_string(),
            option: option.to_string(),
            message: message.into(),
        }
    }
}
