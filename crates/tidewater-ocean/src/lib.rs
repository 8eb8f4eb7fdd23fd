//! Ocean test cases for the tidewater framework.
//!
//! Tasks lay out steps from the merged config; setup renders each forward
//! step's model inputs, writes the task config with provenance and a batch
//! job script. Convergence helpers fit the order of accuracy of a task's
//! per-resolution errors.

pub mod component;
pub mod convergence;
mod error;
pub mod job;
pub mod parallel;
pub mod setup;
pub mod step;
pub mod tasks;

/// Error type for task building and setup.
pub use error::TaskError;
/// Convergence settings and analysis.
pub use convergence::{
    ConvergenceReport, ConvergenceSettings, ConvergenceVerdict, ErrorNorm,
    order_of_convergence,
};
/// Parallel resources.
pub use parallel::{AvailableResources, ParallelSystem, SlurmJob};
/// Task setup.
pub use setup::{SetupOptions, SetupReport, load_task_config, setup_task};
/// Steps.
pub use step::{Step, StepKind, StepResources};
/// Task registry.
pub use tasks::{Task, TaskEntry, TaskSummary, all_tasks, filter_tasks, find_task};
