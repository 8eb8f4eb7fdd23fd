//! Cosine bell advected once around the sphere by solid-body rotation.

use super::{ConvergenceLayout, MeshExtent, Task, convergence_task};
use crate::TaskError;
use tidewater_config::TidewaterConfig;

pub(crate) const CONFIG: &str = include_str!("../../assets/tasks/cosine_bell/cosine_bell.cfg");
const FORWARD: &str = include_str!("../../assets/tasks/cosine_bell/forward.yaml");

const NAME: &str = "cosine_bell";

pub(crate) fn build(config: &TidewaterConfig) -> Result<Task, TaskError> {
    let radius_km = config.get_float(NAME, "sphere_radius")?;
    convergence_task(
        config,
        ConvergenceLayout {
            name: NAME,
            path: "ocean/spherical/cosine_bell/convergence",
            mesh: MeshExtent::Spherical { radius_km },
            forward_yaml: FORWARD,
            validate_vars: &["normalVelocity", "tracer1"],
        },
    )
}
