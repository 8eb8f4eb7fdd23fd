//! Ekman layer spin-up in a single water column under constant wind stress.

use super::{MeshExtent, Task, forward_bindings, resources_for_cells};
use crate::TaskError;
use crate::component::OCEAN_OUTPUT;
use crate::step::{Step, StepKind};
use tidewater_config::TidewaterConfig;
use tidewater_template::Bindings;

pub(crate) const CONFIG: &str =
    include_str!("../../assets/tasks/single_column/single_column.cfg");
const FORWARD: &str = include_str!("../../assets/tasks/single_column/forward.yaml");

const NAME: &str = "single_column";
const EKMAN_SECTION: &str = "ekman";

pub(crate) fn build(config: &TidewaterConfig) -> Result<Task, TaskError> {
    let mut init = Step::new("init", StepKind::Init);
    init.add_output("initial_state.nc", &["temperature", "salinity", "layerThickness"]);
    init.add_output("forcing.nc", &["windStressZonal", "windStressMeridional"]);
    init.add_output("culled_graph.info", &[]);

    let mut forward = Step::new("forward", StepKind::Forward);
    forward.add_input("init.nc", "../init/initial_state.nc");
    forward.add_input("forcing.nc", "../init/forcing.nc");
    forward.add_input("graph.info", "../init/culled_graph.info");
    forward.add_output("output.nc", &["temperature", "layerThickness"]);
    forward.add_template("output.yaml", OCEAN_OUTPUT);
    forward.add_template("forward.yaml", FORWARD);

    let mut bindings = forward_bindings(config, NAME)?;
    bindings.extend(&Bindings::from_section(config, EKMAN_SECTION)?);
    bindings.insert("dt", config.get(NAME, "dt")?);
    forward.bindings = bindings;

    let resolution = config.get_float(NAME, "resolution")?;
    let cells = MeshExtent::planar(config, NAME)?.cell_count(resolution);
    forward.resources = resources_for_cells(config, cells)?;

    Ok(Task {
        name: NAME.to_string(),
        path: "ocean/single_column/ekman".to_string(),
        section: NAME.to_string(),
        steps: vec![init, forward],
        convergence: None,
    })
}
