//! Task setup: config layers, step directories and model input files.

use crate::TaskError;
use crate::component::{DEFAULT_CONFIG, OCEAN_CONFIG, OCEAN_SECTION, OCEAN_STREAMS, Ocean};
use crate::job::JobOptions;
use crate::parallel::{
    AvailableResources, PARALLEL_SECTION, ParallelSystem, SlurmJob, available_resources,
    parallel_command, set_cores_per_node,
};
use crate::step::{Step, StepInput, StepKind, StepOutput, StepResources};
use crate::tasks::{Task, TaskEntry};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tidewater_config::{
    ConfigLayerSource, IoOptions, LayeredConfig, LayeredConfigOptions, TidewaterConfig,
};
use tidewater_template::{ModelConfig, Template};

/// Per-step manifest filename.
pub const STEP_MANIFEST: &str = "step.json";
/// Per-step run script filename.
pub const RUN_SCRIPT: &str = "run.sh";

/// Where and how to set up a task.
#[derive(Debug, Clone)]
pub struct SetupOptions {
    /// Base work directory; the task lands under its path.
    pub work_dir: PathBuf,
    /// Optional machine config.
    pub machine_config: Option<PathBuf>,
    /// User config; `None` skips it.
    pub user_config: Option<PathBuf>,
    /// Runtime config files applied last.
    pub runtime_configs: Vec<PathBuf>,
    pub suite: Option<String>,
    /// Cores on this node, used when the config does not say.
    pub cpu_count: u64,
    pub slurm: Option<SlurmJob>,
}

impl SetupOptions {
    /// Options with the default user config and the current environment.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            machine_config: None,
            user_config: LayeredConfigOptions::new().user_config_path,
            runtime_configs: Vec::new(),
            suite: None,
            cpu_count: std::thread::available_parallelism()
                .map(|count| count.get() as u64)
                .unwrap_or(1),
            slurm: SlurmJob::from_env(),
        }
    }
}

/// What `setup_task` wrote.
#[derive(Debug, Clone)]
pub struct SetupReport {
    pub task_dir: PathBuf,
    pub config_path: PathBuf,
    pub job_script: PathBuf,
    pub step_dirs: Vec<PathBuf>,
    /// The task with each step's requested resources.
    pub task: Task,
    /// Resources detected on the machine running setup.
    pub resources: AvailableResources,
    /// Resources each step's commands launch with, by step name.
    pub launch: BTreeMap<String, StepResources>,
}

/// Serialized description of a step written next to its inputs.
#[derive(Debug, Clone, Serialize)]
struct StepManifest<'a> {
    name: &'a str,
    kind: StepKind,
    inputs: &'a [StepInput],
    outputs: &'a [StepOutput],
    /// Requested resources.
    resources: StepResources,
    /// Resources the commands launch with.
    launch: StepResources,
    commands: &'a [Vec<String>],
}

/// Layer options for a task: defaults, machine, ocean, task, user, runtime.
pub fn task_config_options(entry: &TaskEntry, options: &SetupOptions) -> LayeredConfigOptions {
    let mut layers = LayeredConfigOptions::default()
        .with_text(ConfigLayerSource::Defaults, "default.cfg", DEFAULT_CONFIG)
        .with_text(ConfigLayerSource::Component, "ocean.cfg", OCEAN_CONFIG)
        .with_text(
            ConfigLayerSource::Task,
            format!("{}.cfg", entry.name),
            entry.config,
        );
    if let Some(path) = &options.machine_config {
        layers = layers.with_machine_path(path);
    }
    layers.user_config_path = options.user_config.clone();
    for path in &options.runtime_configs {
        layers = layers.with_runtime_path(path);
    }
    layers
}

/// Load the merged config for a task.
pub fn load_task_config(
    entry: &TaskEntry,
    options: &SetupOptions,
) -> Result<LayeredConfig, TaskError> {
    Ok(TidewaterConfig::load_layered(task_config_options(entry, options))?)
}

/// Set up a task: write its config, step directories and job script.
pub fn setup_task(entry: &TaskEntry, options: &SetupOptions) -> Result<SetupReport, TaskError> {
    let LayeredConfig { mut config, layers } = load_task_config(entry, options)?;
    debug!("loaded task config (task={}, layers={})", entry.path, layers.len());

    let io = IoOptions::from_config(&config)?;
    let resources = available_resources(&config, options.cpu_count, options.slurm)?;
    let system_set = config
        .get_opt(PARALLEL_SECTION, "system")?
        .is_some_and(|value| !value.trim().is_empty());
    if !system_set {
        config.set(PARALLEL_SECTION, "system", resources.system.to_string());
    }
    set_cores_per_node(&mut config, resources.system, resources.cores_per_node)?;
    let target: ParallelSystem = config.get(PARALLEL_SECTION, "system")?.parse()?;

    let task = (entry.build)(&config)?;

    let task_dir = options.work_dir.join(entry.path);
    fs::create_dir_all(&task_dir)?;
    info!(
        "setting up task (task={}, dir={}, steps={})",
        entry.path,
        task_dir.display(),
        task.steps.len()
    );

    let mut step_dirs = Vec::with_capacity(task.steps.len());
    let mut launch = BTreeMap::new();
    for step in &task.steps {
        let step_launch = launch_resources(step, &resources, target);
        step_dirs.push(setup_step(step, step_launch, target, &config, &io, &task_dir)?);
        launch.insert(step.name.clone(), step_launch);
    }

    let config_path = task_dir.join(format!("{}.cfg", entry.name));
    config.write_to_path(&config_path)?;

    let job = JobOptions::from_config(
        &config,
        task.target_cores(),
        task.min_cores(),
        options.suite.as_deref(),
        task.steps.iter().map(|step| step.subdir.clone()).collect(),
    )?;
    let job_script = job.write(&task_dir)?;

    Ok(SetupReport {
        task_dir,
        config_path,
        job_script,
        step_dirs,
        task,
        resources,
        launch,
    })
}

/// Resources a step's commands launch with.
///
/// Steps are fitted to this machine only when it is the system the job runs
/// on. Otherwise, or when this machine is too small, the request stands and
/// the job script asks for enough nodes. Login nodes run serially.
fn launch_resources(
    step: &Step,
    available: &AvailableResources,
    target: ParallelSystem,
) -> StepResources {
    if target == ParallelSystem::Login {
        if step.resources.ntasks > 1 {
            warn!(
                "login nodes run steps serially (step={}, requested_ntasks={})",
                step.name, step.resources.ntasks
            );
        }
        return StepResources::serial();
    }
    if available.system != target {
        return step.resources;
    }
    match step.constrain_resources(available) {
        Ok(fitted) => fitted,
        Err(err) => {
            warn!(
                "keeping requested resources for the job allocation (step={}, reason={err})",
                step.name
            );
            step.resources
        }
    }
}

fn setup_step(
    step: &Step,
    launch: StepResources,
    target: ParallelSystem,
    config: &TidewaterConfig,
    io: &IoOptions,
    task_dir: &Path,
) -> Result<PathBuf, TaskError> {
    let step_dir = task_dir.join(&step.subdir);
    fs::create_dir_all(&step_dir)?;

    let commands = if step.runs_model() {
        write_model_inputs(step, config, io, &step_dir)?;
        model_commands(launch, target, config)?
    } else {
        Vec::new()
    };

    for input in &step.inputs {
        link_input(&step_dir, input)?;
    }

    let manifest = StepManifest {
        name: &step.name,
        kind: step.kind,
        inputs: &step.inputs,
        outputs: &step.outputs,
        resources: step.resources,
        launch,
        commands: &commands,
    };
    fs::write(
        step_dir.join(STEP_MANIFEST),
        serde_json::to_string_pretty(&manifest)?,
    )?;
    fs::write(step_dir.join(RUN_SCRIPT), run_script(step, launch, &commands))?;
    debug!("set up step (step={}, dir={})", step.name, step_dir.display());
    Ok(step_dir)
}

/// Render a step's templates and write the namelist and streams files.
///
/// Templates are layered over the default streams in order; the namelist
/// gets every resulting option followed by the step's own model options.
pub fn write_model_inputs(
    step: &Step,
    config: &TidewaterConfig,
    io: &IoOptions,
    step_dir: &Path,
) -> Result<(), TaskError> {
    let ocean = Ocean;
    let mut model = ModelConfig::from_yaml(OCEAN_STREAMS)?;
    for template in &step.templates {
        let text = Template::parse(&template.text)?.render(&step.bindings)?;
        debug!("rendered template (step={}, template={})", step.name, template.name);
        model.merge(ModelConfig::from_yaml(&text)?)?;
    }

    let mut replacements = model.replacements();
    replacements.extend(
        step.model_options
            .iter()
            .map(|(option, value)| (option.clone(), value.clone())),
    );
    let mut namelist = ocean.default_namelist();
    namelist.replace(&replacements);

    let mut streams = model.streams;
    streams.set_default_io_type(&io.io_type);

    let namelist_file = config.get(OCEAN_SECTION, "namelist_filename")?;
    let streams_file = config.get(OCEAN_SECTION, "streams_filename")?;
    namelist.write_to_path(step_dir.join(&namelist_file))?;
    streams.write_to_path(step_dir.join(&streams_file))?;
    Ok(())
}

/// Partition the graph when running on more than one task, then launch the
/// model through the parallel executable. Login nodes run the model directly.
fn model_commands(
    resources: StepResources,
    target: ParallelSystem,
    config: &TidewaterConfig,
) -> Result<Vec<Vec<String>>, TaskError> {
    let mut commands = Vec::new();
    if resources.ntasks > 1 {
        commands.push(vec![
            config.get("executables", "partition")?,
            "graph.info".to_string(),
            resources.ntasks.to_string(),
        ]);
    }
    let args = vec![
        config.get(OCEAN_SECTION, "model_executable")?,
        "-n".to_string(),
        config.get(OCEAN_SECTION, "namelist_filename")?,
        "-s".to_string(),
        config.get(OCEAN_SECTION, "streams_filename")?,
    ];
    if target == ParallelSystem::Login {
        commands.push(args);
    } else {
        commands.push(parallel_command(
            &args,
            resources.cpus_per_task,
            resources.ntasks,
            config,
        )?);
    }
    Ok(commands)
}

fn run_script(step: &Step, launch: StepResources, commands: &[Vec<String>]) -> String {
    let mut script = String::from("#!/bin/bash\nset -e\n\n");
    if commands.is_empty() {
        script.push_str(&format!("# {} has no command to run here\n", step.name));
    }
    if launch.openmp_threads > 1 {
        script.push_str(&format!("export OMP_NUM_THREADS={}\n", launch.openmp_threads));
    }
    for command in commands {
        script.push_str(&command.join(" "));
        script.push('\n');
    }
    script
}

#[cfg(unix)]
fn link_input(step_dir: &Path, input: &StepInput) -> Result<(), TaskError> {
    let link = step_dir.join(&input.filename);
    if link.symlink_metadata().is_ok() {
        fs::remove_file(&link)?;
    }
    std::os::unix::fs::symlink(&input.target, &link)?;
    Ok(())
}

#[cfg(not(unix))]
fn link_input(step_dir: &Path, input: &StepInput) -> Result<(), TaskError> {
    debug!(
        "symlinks unsupported; recorded input only (dir={}, file={})",
        step_dir.display(),
        input.filename
    );
    Ok(())
}
