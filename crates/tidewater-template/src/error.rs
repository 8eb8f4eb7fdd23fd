//! Error types for template rendering, namelists and streams.

use tidewater_config::ConfigError;

/// Errors returned while rendering templates or building model inputs.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A `{{ ... }}` expression is not a plain placeholder name.
    #[error("invalid placeholder {{{{ {placeholder} }}}} at line {line}")]
    BadPlaceholder { placeholder: String, line: usize },
    /// A placeholder has no bound value.
    #[error("missing binding for placeholder {{{{ {placeholder} }}}} at line {line}")]
    MissingBinding { placeholder: String, line: usize },
    /// Rendered YAML could not be parsed.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Rendered YAML does not have the expected model layout.
    #[error("invalid model yaml at {path}: {message}")]
    InvalidModelYaml { path: String, message: String },
    /// Two definitions with the same name have different element kinds.
    #[error("cannot update {name:?}: inconsistent kinds {existing} vs. {new}")]
    KindMismatch {
        name: String,
        existing: String,
        new: String,
    },
    /// Config lookup failed while building bindings.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
