//! Error types for task setup.

use tidewater_config::ConfigError;
use tidewater_template::TemplateError;

/// Errors returned while building or setting up tasks.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Config loading or lookup failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Template rendering or model input generation failed.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// Job script rendering failed.
    #[error("job script error: {0}")]
    JobScript(#[from] tera::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Task filter pattern error.
    #[error("invalid task pattern: {0}")]
    Pattern(#[from] globset::Error),
    /// No task with the requested path.
    #[error("unknown task: {0}")]
    UnknownTask(String),
    /// The `[parallel] system` option is not recognized.
    #[error("unexpected parallel system: {0}")]
    ParallelSystem(String),
    /// Available resources cannot satisfy a step's minimum.
    #[error("insufficient resources for step {step}: {message}")]
    Resources { step: String, message: String },
    /// Convergence inputs are inconsistent.
    #[error("invalid convergence input: {0}")]
    ConvergenceInput(String),
    /// Order of convergence below the required threshold.
    #[error("order of convergence {order:.3} < min tolerance {threshold}")]
    ConvergenceTooLow { order: f64, threshold: f64 },
}
