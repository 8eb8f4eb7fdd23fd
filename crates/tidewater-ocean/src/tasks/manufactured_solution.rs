//! Manufactured-solution convergence on a doubly periodic plane.
//!
//! Forcing terms make a travelling surface wave an exact solution, so the
//! error of each resolution can be measured against it directly.

use super::{ConvergenceLayout, MeshExtent, Task, convergence_task};
use crate::TaskError;
use tidewater_config::TidewaterConfig;

pub(crate) const CONFIG: &str =
    include_str!("../../assets/tasks/manufactured_solution/manufactured_solution.cfg");
const FORWARD: &str = include_str!("../../assets/tasks/manufactured_solution/forward.yaml");

const NAME: &str = "manufactured_solution";

pub(crate) fn build(config: &TidewaterConfig) -> Result<Task, TaskError> {
    convergence_task(
        config,
        ConvergenceLayout {
            name: NAME,
            path: "ocean/planar/manufactured_solution/convergence",
            mesh: MeshExtent::planar(config, NAME)?,
            forward_yaml: FORWARD,
            validate_vars: &["layerThickness", "normalVelocity"],
        },
    )
}
