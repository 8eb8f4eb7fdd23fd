//! Task registry and shared builders.
//!
//! Each task carries an embedded config layer and YAML templates. Building a
//! task reads its options from the merged config and lays out its steps.

mod cosine_bell;
mod inertial_gravity_wave;
mod manufactured_solution;
mod merry_go_round;
mod single_column;

use crate::TaskError;
use crate::component::{OCEAN_OUTPUT, OCEAN_SECTION};
use crate::convergence::{
    ConvergenceSettings, format_run_duration, format_time_step, planar_hex_nx_ny,
    resolution_label, spherical_cell_count,
};
use crate::step::{Step, StepKind, StepResources};
use globset::Glob;
use log::debug;
use serde::Serialize;
use tidewater_config::TidewaterConfig;
use tidewater_template::Bindings;

/// Builds a task from the merged config.
pub type TaskBuilder = fn(&TidewaterConfig) -> Result<Task, TaskError>;

/// A registered task.
#[derive(Clone, Copy)]
pub struct TaskEntry {
    /// Unique path, e.g. `ocean/planar/manufactured_solution/convergence`.
    pub path: &'static str,
    /// Short name; also the config section and the task config filename.
    pub name: &'static str,
    /// Embedded task config layer.
    pub config: &'static str,
    pub build: TaskBuilder,
}

impl std::fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEntry")
            .field("path", &self.path)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

const TASKS: &[TaskEntry] = &[
    TaskEntry {
        path: "ocean/planar/manufactured_solution/convergence",
        name: "manufactured_solution",
        config: manufactured_solution::CONFIG,
        build: manufactured_solution::build,
    },
    TaskEntry {
        path: "ocean/planar/inertial_gravity_wave/convergence",
        name: "inertial_gravity_wave",
        config: inertial_gravity_wave::CONFIG,
        build: inertial_gravity_wave::build,
    },
    TaskEntry {
        path: "ocean/planar/merry_go_round/convergence",
        name: "merry_go_round",
        config: merry_go_round::CONFIG,
        build: merry_go_round::build,
    },
    TaskEntry {
        path: "ocean/spherical/cosine_bell/convergence",
        name: "cosine_bell",
        config: cosine_bell::CONFIG,
        build: cosine_bell::build,
    },
    TaskEntry {
        path: "ocean/single_column/ekman",
        name: "single_column",
        config: single_column::CONFIG,
        build: single_column::build,
    },
];

/// Every registered task, in listing order.
pub fn all_tasks() -> &'static [TaskEntry] {
    TASKS
}

/// Look a task up by path or short name.
pub fn find_task(name: &str) -> Result<&'static TaskEntry, TaskError> {
    TASKS
        .iter()
        .find(|entry| entry.path == name || entry.name == name)
        .ok_or_else(|| TaskError::UnknownTask(name.to_string()))
}

/// Tasks whose path or name matches a glob pattern.
pub fn filter_tasks(pattern: &str) -> Result<Vec<&'static TaskEntry>, TaskError> {
    let matcher = Glob::new(pattern)?.compile_matcher();
    Ok(TASKS
        .iter()
        .filter(|entry| matcher.is_match(entry.path) || matcher.is_match(entry.name))
        .collect())
}

/// A task with its steps laid out.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub name: String,
    pub path: String,
    /// Config section holding the task options.
    pub section: String,
    pub steps: Vec<Step>,
    /// Present for resolution convergence tasks.
    pub convergence: Option<ConvergenceSettings>,
}

impl Task {
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.name == name)
    }

    /// Largest core count any step asks for.
    pub fn target_cores(&self) -> u64 {
        self.steps
            .iter()
            .map(|step| step.resources.target_cores())
            .max()
            .unwrap_or(1)
    }

    /// Largest minimum core count of any step.
    pub fn min_cores(&self) -> u64 {
        self.steps
            .iter()
            .map(|step| step.resources.min_cores())
            .max()
            .unwrap_or(1)
    }
}

/// Summary used when listing tasks.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub path: String,
    pub name: String,
}

impl From<&TaskEntry> for TaskSummary {
    fn from(entry: &TaskEntry) -> Self {
        Self {
            path: entry.path.to_string(),
            name: entry.name.to_string(),
        }
    }
}

/// Horizontal extent of a convergence mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum MeshExtent {
    /// Doubly periodic plane, sizes in km.
    Planar { lx: f64, ly: f64 },
    Spherical { radius_km: f64 },
}

impl MeshExtent {
    /// Planar extent from `lx` and optional `ly` (default `sqrt(3)/2 * lx`).
    pub(crate) fn planar(config: &TidewaterConfig, section: &str) -> Result<Self, TaskError> {
        let lx = config.get_float(section, "lx")?;
        let ly = if config.has_option(section, "ly") {
            config.get_float(section, "ly")?
        } else {
            3f64.sqrt() / 2.0 * lx
        };
        Ok(MeshExtent::Planar { lx, ly })
    }

    pub(crate) fn cell_count(&self, resolution: f64) -> u64 {
        match *self {
            MeshExtent::Planar { lx, ly } => {
                let (nx, ny) = planar_hex_nx_ny(lx, ly, resolution);
                nx * ny
            }
            MeshExtent::Spherical { radius_km } => spherical_cell_count(radius_km, resolution),
        }
    }
}

/// MPI tasks for a mesh, from the ocean `goal_cells_per_core` and
/// `max_cells_per_core` options.
pub(crate) fn resources_for_cells(
    config: &TidewaterConfig,
    cells: u64,
) -> Result<StepResources, TaskError> {
    let goal = config.get_int(OCEAN_SECTION, "goal_cells_per_core")?.max(1) as u64;
    let max = config.get_int(OCEAN_SECTION, "max_cells_per_core")?.max(1) as u64;
    Ok(StepResources::mpi(cells.div_ceil(goal), cells.div_ceil(max)))
}

/// Bindings shared by forward steps: the task section plus formatted
/// `run_duration` and `output_interval`, both given in hours.
pub(crate) fn forward_bindings(
    config: &TidewaterConfig,
    section: &str,
) -> Result<Bindings, TaskError> {
    let mut bindings = Bindings::from_section(config, section)?;
    let run_duration = config.get_float(section, "run_duration")?;
    bindings.insert("run_duration", format_run_duration(run_duration));
    let output_interval = match config.get_opt(section, "output_interval")? {
        Some(_) => config.get_float(section, "output_interval")?,
        None => run_duration,
    };
    bindings.insert("output_interval", format_run_duration(output_interval));
    Ok(bindings)
}

/// What differs between resolution convergence tasks.
pub(crate) struct ConvergenceLayout<'a> {
    pub name: &'a str,
    pub path: &'a str,
    pub mesh: MeshExtent,
    pub forward_yaml: &'a str,
    /// Variables validated in forward output.
    pub validate_vars: &'a [&'a str],
}

/// Lay out `init_{res}km`, `forward_{res}km` per resolution and a final
/// `analysis` step comparing every forward run.
pub(crate) fn convergence_task(
    config: &TidewaterConfig,
    layout: ConvergenceLayout<'_>,
) -> Result<Task, TaskError> {
    let section = layout.name;
    let settings = ConvergenceSettings::from_config(config, section)?;
    let shared = forward_bindings(config, section)?;
    let mut steps = Vec::new();
    let mut analysis = Step::new("analysis", StepKind::Analysis);

    for &resolution in &settings.resolutions {
        let label = resolution_label(resolution);
        let init_name = format!("init_{label}");
        let forward_name = format!("forward_{label}");
        let cells = layout.mesh.cell_count(resolution);

        let mut init = Step::new(&init_name, StepKind::Init);
        init.add_output("initial_state.nc", &["temperature", "salinity", "layerThickness"]);
        init.add_output("culled_graph.info", &[]);

        let mut forward = Step::new(&forward_name, StepKind::Forward);
        forward.add_input("init.nc", format!("../{init_name}/initial_state.nc"));
        forward.add_input("graph.info", format!("../{init_name}/culled_graph.info"));
        forward.add_output("output.nc", layout.validate_vars);
        forward.add_template("output.yaml", OCEAN_OUTPUT);
        forward.add_template("forward.yaml", layout.forward_yaml);
        forward.bindings = shared.clone();
        forward.bindings.insert("resolution", resolution);
        forward
            .bindings
            .insert("dt", format_time_step(settings.time_step(resolution)));
        if let Some(btr_dt) = settings.btr_time_step(resolution) {
            forward.bindings.insert("btr_dt", format_time_step(btr_dt));
        }
        forward.resources = resources_for_cells(config, cells)?;
        debug!(
            "convergence step resources (task={}, resolution={label}, cells={cells}, ntasks={})",
            layout.name, forward.resources.ntasks
        );

        analysis.add_input(format!("init_{label}.nc"), format!("../{init_name}/initial_state.nc"));
        analysis.add_input(format!("output_{label}.nc"), format!("../{forward_name}/output.nc"));

        steps.push(init);
        steps.push(forward);
    }
    steps.push(analysis);

    Ok(Task {
        name: layout.name.to_string(),
        path: layout.path.to_string(),
        section: section.to_string(),
        steps,
        convergence: Some(settings),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_by_name_or_path() {
        assert_eq!(find_task("cosine_bell").expect("name").name, "cosine_bell");
        assert_eq!(
            find_task("ocean/single_column/ekman").expect("path").name,
            "single_column"
        );
        let err = find_task("baroclinic_channel").unwrap_err();
        assert!(err.to_string().contains("baroclinic_channel"));
    }

    #[test]
    fn glob_filter() {
        let planar: Vec<&str> = filter_tasks("ocean/planar/**")
            .expect("filter")
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(
            planar,
            vec!["manufactured_solution", "inertial_gravity_wave", "merry_go_round"]
        );
        assert_eq!(filter_tasks("*").expect("all").len(), all_tasks().len());
        assert!(filter_tasks("[").is_err());
    }

    #[test]
    fn every_task_config_parses() {
        for entry in all_tasks() {
            let config = TidewaterConfig::load_from_str(entry.config)
                .unwrap_or_else(|err| panic!("{}: {err}", entry.path));
            assert!(config.has_section(entry.name), "{}", entry.path);
        }
    }

    #[test]
    fn spherical_and_planar_cell_counts() {
        let planar = MeshExtent::Planar {
            lx: 10000.0,
            ly: 3f64.sqrt() / 2.0 * 10000.0,
        };
        assert_eq!(planar.cell_count(100.0), 100 * 100);
        let sphere = MeshExtent::Spherical { radius_km: 6371.22 };
        assert!(sphere.cell_count(240.0) < sphere.cell_count(120.0));
    }
}
