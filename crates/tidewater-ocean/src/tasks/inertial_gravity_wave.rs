//! Linear inertial gravity wave on an f-plane.

use super::{ConvergenceLayout, MeshExtent, Task, convergence_task};
use crate::TaskError;
use tidewater_config::TidewaterConfig;

pub(crate) const CONFIG: &str =
    include_str!("../../assets/tasks/inertial_gravity_wave/inertial_gravity_wave.cfg");
const FORWARD: &str = include_str!("../../assets/tasks/inertial_gravity_wave/forward.yaml");

const NAME: &str = "inertial_gravity_wave";

pub(crate) fn build(config: &TidewaterConfig) -> Result<Task, TaskError> {
    convergence_task(
        config,
        ConvergenceLayout {
            name: NAME,
            path: "ocean/planar/inertial_gravity_wave/convergence",
            mesh: MeshExtent::planar(config, NAME)?,
            forward_yaml: FORWARD,
            validate_vars: &["layerThickness", "normalVelocity"],
        },
    )
}
