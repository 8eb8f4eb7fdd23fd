//! Tracer advection by a prescribed vortex pair in an x-z plane.
//!
//! Velocity and thickness tendencies are switched off, so only the debug
//! tracers evolve.

use super::{ConvergenceLayout, MeshExtent, Task, convergence_task};
use crate::TaskError;
use tidewater_config::TidewaterConfig;

pub(crate) const CONFIG: &str =
    include_str!("../../assets/tasks/merry_go_round/merry_go_round.cfg");
const FORWARD: &str = include_str!("../../assets/tasks/merry_go_round/forward.yaml");

const NAME: &str = "merry_go_round";

pub(crate) fn build(config: &TidewaterConfig) -> Result<Task, TaskError> {
    convergence_task(
        config,
        ConvergenceLayout {
            name: NAME,
            path: "ocean/planar/merry_go_round/convergence",
            mesh: MeshExtent::planar(config, NAME)?,
            forward_yaml: FORWARD,
            validate_vars: &["layerThickness", "normalVelocity", "tracer1"],
        },
    )
}
