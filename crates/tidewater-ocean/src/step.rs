//! Steps: the unit of work inside a task.

use crate::TaskError;
use crate::parallel::AvailableResources;
use log::debug;
use serde::Serialize;
use tidewater_template::{Bindings, Replacements};

/// What a step does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Builds the mesh and initial condition.
    Init,
    /// Runs the ocean model.
    Forward,
    /// Compares model output to a reference.
    Analysis,
}

/// A file linked into the step directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepInput {
    /// Name inside the step directory.
    pub filename: String,
    /// Path of the linked file, relative to the step directory.
    pub target: String,
}

/// A file the step produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutput {
    pub filename: String,
    /// Variables compared against a baseline when validating.
    pub validate_vars: Vec<String>,
}

/// A named YAML template rendered into model options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTemplate {
    pub name: String,
    pub text: String,
}

/// Requested and minimum MPI tasks and threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepResources {
    pub ntasks: u64,
    pub min_tasks: u64,
    pub cpus_per_task: u64,
    pub min_cpus_per_task: u64,
    pub openmp_threads: u64,
}

impl Default for StepResources {
    fn default() -> Self {
        Self::serial()
    }
}

impl StepResources {
    /// One task on one core.
    pub fn serial() -> Self {
        Self {
            ntasks: 1,
            min_tasks: 1,
            cpus_per_task: 1,
            min_cpus_per_task: 1,
            openmp_threads: 1,
        }
    }

    /// MPI tasks with one core each.
    pub fn mpi(ntasks: u64, min_tasks: u64) -> Self {
        let ntasks = ntasks.max(1);
        Self {
            ntasks,
            min_tasks: min_tasks.clamp(1, ntasks),
            ..Self::serial()
        }
    }

    /// Cores used at the requested size.
    pub fn target_cores(&self) -> u64 {
        self.ntasks * self.cpus_per_task
    }

    /// Cores needed at the minimum size.
    pub fn min_cores(&self) -> u64 {
        self.min_tasks * self.min_cpus_per_task
    }
}

/// One step of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    /// Directory relative to the task directory.
    pub subdir: String,
    pub kind: StepKind,
    pub inputs: Vec<StepInput>,
    pub outputs: Vec<StepOutput>,
    /// Templates rendered in order; later documents win.
    pub templates: Vec<StepTemplate>,
    /// Values for template placeholders.
    pub bindings: Bindings,
    /// Namelist options applied after the templates.
    pub model_options: Replacements,
    pub resources: StepResources,
}

impl Step {
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        let name = name.into();
        Self {
            subdir: name.clone(),
            name,
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            templates: Vec::new(),
            bindings: Bindings::new(),
            model_options: Replacements::new(),
            resources: StepResources::serial(),
        }
    }

    /// Link `target` into the step directory as `filename`.
    pub fn add_input(&mut self, filename: impl Into<String>, target: impl Into<String>) {
        self.inputs.push(StepInput {
            filename: filename.into(),
            target: target.into(),
        });
    }

    pub fn add_output(&mut self, filename: impl Into<String>, validate_vars: &[&str]) {
        self.outputs.push(StepOutput {
            filename: filename.into(),
            validate_vars: validate_vars.iter().map(|var| var.to_string()).collect(),
        });
    }

    pub fn add_template(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.templates.push(StepTemplate {
            name: name.into(),
            text: text.into(),
        });
    }

    /// Whether the step runs the ocean model and needs model input files.
    pub fn runs_model(&self) -> bool {
        self.kind == StepKind::Forward
    }

    /// The requested resources fitted to what is available.
    ///
    /// Cores per task are capped at the cores of one node and tasks at the
    /// total cores; falling below a minimum is an error. The step keeps its
    /// requested resources.
    pub fn constrain_resources(
        &self,
        available: &AvailableResources,
    ) -> Result<StepResources, TaskError> {
        let requested = self.resources;
        if !available.mpi_allowed && requested.ntasks > 1 {
            return Err(TaskError::Resources {
                step: self.name.clone(),
                message: format!(
                    "{} MPI tasks requested but MPI is not available on {} nodes",
                    requested.ntasks, available.system
                ),
            });
        }

        let cpus_per_task = requested.cpus_per_task.min(available.cores_per_node);
        if cpus_per_task < requested.min_cpus_per_task {
            return Err(TaskError::Resources {
                step: self.name.clone(),
                message: format!(
                    "cpus_per_task {cpus_per_task} is below the minimum {}",
                    requested.min_cpus_per_task
                ),
            });
        }
        let ntasks = requested.ntasks.min(available.cores / cpus_per_task.max(1));
        if ntasks < requested.min_tasks {
            return Err(TaskError::Resources {
                step: self.name.clone(),
                message: format!(
                    "ntasks {ntasks} is below the minimum {} ({} cores available)",
                    requested.min_tasks, available.cores
                ),
            });
        }
        if ntasks != requested.ntasks || cpus_per_task != requested.cpus_per_task {
            debug!(
                "constrained step resources (step={}, ntasks={}->{}, cpus_per_task={}->{})",
                self.name, requested.ntasks, ntasks, requested.cpus_per_task, cpus_per_task
            );
        }
        Ok(StepResources {
            ntasks,
            cpus_per_task,
            openmp_threads: requested.openmp_threads.min(cpus_per_task).max(1),
            ..requested
        })
    }
}
