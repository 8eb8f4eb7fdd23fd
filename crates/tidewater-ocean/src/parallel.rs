//! Parallel resources and MPI launch commands.

use crate::TaskError;
use log::{debug, warn};
use serde::Serialize;
use std::env;
use std::fmt;
use std::str::FromStr;
use tidewater_config::TidewaterConfig;

/// Section holding machine parallel settings.
pub const PARALLEL_SECTION: &str = "parallel";

/// How jobs are launched on the current machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelSystem {
    /// Inside a slurm allocation.
    Slurm,
    /// A single node without a scheduler.
    SingleNode,
    /// A login node: no MPI.
    Login,
}

impl FromStr for ParallelSystem {
    type Err = TaskError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "slurm" => Ok(ParallelSystem::Slurm),
            "single_node" => Ok(ParallelSystem::SingleNode),
            "login" => Ok(ParallelSystem::Login),
            other => Err(TaskError::ParallelSystem(other.to_string())),
        }
    }
}

impl fmt::Display for ParallelSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParallelSystem::Slurm => "slurm",
            ParallelSystem::SingleNode => "single_node",
            ParallelSystem::Login => "login",
        };
        f.write_str(name)
    }
}

/// The slurm allocation a process is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlurmJob {
    pub nodes: u64,
    pub cpus_on_node: Option<u64>,
}

impl SlurmJob {
    /// Read `SLURM_JOB_ID`, `SLURM_JOB_NUM_NODES` and `SLURM_CPUS_ON_NODE`.
    pub fn from_env() -> Option<Self> {
        env::var("SLURM_JOB_ID").ok()?;
        let nodes = env::var("SLURM_JOB_NUM_NODES")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(1);
        let cpus_on_node = env::var("SLURM_CPUS_ON_NODE")
            .ok()
            .and_then(|value| value.parse().ok());
        Some(Self {
            nodes,
            cpus_on_node,
        })
    }
}

/// Cores available to the steps of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AvailableResources {
    pub system: ParallelSystem,
    pub cores: u64,
    pub nodes: u64,
    pub cores_per_node: u64,
    pub mpi_allowed: bool,
}

/// Determine the parallel system and available cores.
///
/// An empty or missing `system` option means slurm inside an allocation and
/// `single_node` otherwise. A configured `slurm` outside an allocation falls
/// back to `login`. `cpu_count` is the number of cores on this node and caps
/// the configured `cores_per_node` and `login_cores`.
pub fn available_resources(
    config: &TidewaterConfig,
    cpu_count: u64,
    slurm: Option<SlurmJob>,
) -> Result<AvailableResources, TaskError> {
    let configured = match config.get_opt(PARALLEL_SECTION, "system")? {
        Some(value) if !value.trim().is_empty() => value.parse()?,
        _ if slurm.is_some() => ParallelSystem::Slurm,
        _ => ParallelSystem::SingleNode,
    };
    let cpu_count = cpu_count.max(1);

    let resources = match (configured, slurm) {
        (ParallelSystem::Slurm, Some(job)) => {
            let nodes = job.nodes.max(1);
            let cores_per_node = job.cpus_on_node.unwrap_or(cpu_count).max(1);
            AvailableResources {
                system: ParallelSystem::Slurm,
                cores: cores_per_node * nodes,
                nodes,
                cores_per_node,
                mpi_allowed: true,
            }
        }
        (ParallelSystem::SingleNode, _) => {
            let cores = match configured_u64(config, "cores_per_node")? {
                Some(configured) => cpu_count.min(configured.max(1)),
                None => cpu_count,
            };
            AvailableResources {
                system: ParallelSystem::SingleNode,
                cores,
                nodes: 1,
                cores_per_node: cores,
                mpi_allowed: true,
            }
        }
        (ParallelSystem::Slurm, None) | (ParallelSystem::Login, _) => {
            if configured == ParallelSystem::Slurm {
                debug!("no slurm allocation found; using login node resources");
            }
            let login_cores = configured_u64(config, "login_cores")?.unwrap_or(1).max(1);
            let cores = cpu_count.min(login_cores);
            AvailableResources {
                system: ParallelSystem::Login,
                cores,
                nodes: 1,
                cores_per_node: cores,
                mpi_allowed: false,
            }
        }
    };
    debug!(
        "available resources (system={}, cores={}, nodes={})",
        resources.system, resources.cores, resources.nodes
    );
    Ok(resources)
}

/// Record the detected cores per node for the detected system.
///
/// Slurm always overwrites the option, warning when the configured value
/// differs. A single node only fills it in when it is missing.
pub fn set_cores_per_node(
    config: &mut TidewaterConfig,
    system: ParallelSystem,
    cores_per_node: u64,
) -> Result<(), TaskError> {
    match system {
        ParallelSystem::Slurm => {
            if let Some(old) = configured_u64(config, "cores_per_node")? {
                if old != cores_per_node {
                    warn!(
                        "slurm found a different number of cores per node than the config (found={cores_per_node}, configured={old})"
                    );
                }
            }
            config.set(PARALLEL_SECTION, "cores_per_node", cores_per_node.to_string());
        }
        ParallelSystem::SingleNode => {
            if configured_u64(config, "cores_per_node")?.is_none() {
                config.set(PARALLEL_SECTION, "cores_per_node", cores_per_node.to_string());
            }
        }
        ParallelSystem::Login => {}
    }
    Ok(())
}

/// Prefix `args` with the configured parallel executable and its flags.
pub fn parallel_command(
    args: &[String],
    cpus_per_task: u64,
    ntasks: u64,
    config: &TidewaterConfig,
) -> Result<Vec<String>, TaskError> {
    let system: ParallelSystem = config.get(PARALLEL_SECTION, "system")?.parse()?;
    let executable = config.get(PARALLEL_SECTION, "parallel_executable")?;
    let mut command: Vec<String> = executable.split_whitespace().map(str::to_string).collect();

    match system {
        ParallelSystem::Slurm => {
            command.extend(["-c".to_string(), cpus_per_task.to_string()]);
            // Without a known node size slurm picks the node count itself.
            if let Some(cores_per_node) = configured_u64(config, "cores_per_node")? {
                let nodes = (cpus_per_task * ntasks).div_ceil(cores_per_node.max(1)).max(1);
                command.extend(["-N".to_string(), nodes.to_string()]);
            }
            command.extend(["-n".to_string(), ntasks.to_string()]);
        }
        ParallelSystem::SingleNode => {
            command.extend(["-n".to_string(), ntasks.to_string()]);
        }
        ParallelSystem::Login => {
            return Err(TaskError::ParallelSystem(
                "login nodes cannot launch parallel commands".to_string(),
            ));
        }
    }
    command.extend(args.iter().cloned());
    Ok(command)
}

fn configured_u64(config: &TidewaterConfig, option: &str) -> Result<Option<u64>, TaskError> {
    match config.get_opt(PARALLEL_SECTION, option)? {
        Some(value) if !value.trim().is_empty() => {
            let value = config.get_int(PARALLEL_SECTION, option)?;
            Ok(Some(value.max(0) as u64))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(text: &str) -> TidewaterConfig {
        TidewaterConfig::load_from_str(text).expect("config")
    }

    #[test]
    fn single_node_uses_configured_cores() {
        let config = config("[parallel]\nsystem = single_node\ncores_per_node = 8\n");
        let resources = available_resources(&config, 64, None).expect("resources");
        assert_eq!(resources.cores, 8);
        assert!(resources.mpi_allowed);
    }

    #[test]
    fn single_node_is_capped_by_real_cores() {
        let capped = config("[parallel]\nsystem = single_node\ncores_per_node = 8\n");
        let resources = available_resources(&capped, 4, None).expect("resources");
        assert_eq!(resources.cores, 4);
        assert_eq!(resources.cores_per_node, 4);

        let unset = config("[parallel]\nsystem = single_node\n");
        assert_eq!(available_resources(&unset, 6, None).expect("resources").cores, 6);
    }

    #[test]
    fn slurm_outside_allocation_falls_back_to_login() {
        let config = config("[parallel]\nsystem = slurm\ncores_per_node = 64\nlogin_cores = 2\n");
        let resources = available_resources(&config, 16, None).expect("resources");
        assert_eq!(resources.system, ParallelSystem::Login);
        assert!(!resources.mpi_allowed);
        assert_eq!(resources.cores, 2);
        assert_eq!(resources.nodes, 1);
    }

    #[test]
    fn slurm_prefers_detected_cores_per_node() {
        let config = config("[parallel]\nsystem = slurm\ncores_per_node = 64\n");
        let job = SlurmJob {
            nodes: 2,
            cpus_on_node: Some(128),
        };
        let resources = available_resources(&config, 4, Some(job)).expect("resources");
        assert_eq!(resources.system, ParallelSystem::Slurm);
        assert_eq!(resources.cores_per_node, 128);
        assert_eq!(resources.cores, 256);
    }

    #[test]
    fn missing_system_detects_slurm() {
        let config = config("[parallel]\nparallel_executable = srun\n");
        let job = SlurmJob {
            nodes: 3,
            cpus_on_node: Some(128),
        };
        let resources = available_resources(&config, 4, Some(job)).expect("resources");
        assert_eq!(resources.system, ParallelSystem::Slurm);
        assert_eq!(resources.cores, 384);
        assert_eq!(resources.cores_per_node, 128);
    }

    #[test]
    fn login_disallows_mpi() {
        let config = config("[parallel]\nsystem = login\nlogin_cores = 2\n");
        let resources = available_resources(&config, 16, None).expect("resources");
        assert_eq!(resources.cores, 2);
        assert!(!resources.mpi_allowed);
    }

    #[test]
    fn login_cores_are_capped_by_real_cores() {
        let config = config("[parallel]\nsystem = login\nlogin_cores = 16\n");
        let resources = available_resources(&config, 4, None).expect("resources");
        assert_eq!(resources.cores, 4);
        assert_eq!(resources.cores_per_node, 4);
    }

    #[test]
    fn unknown_system_is_rejected() {
        let config = config("[parallel]\nsystem = pbs\n");
        let err = available_resources(&config, 4, None).unwrap_err();
        assert!(err.to_string().contains("pbs"));
    }

    #[test]
    fn slurm_command_counts_nodes() {
        let config = config(
            "[parallel]\nsystem = slurm\nparallel_executable = srun --mpi=pmi2\ncores_per_node = 64\n",
        );
        let command =
            parallel_command(&["ocean_model".to_string()], 2, 100, &config).expect("command");
        assert_eq!(
            command,
            vec!["srun", "--mpi=pmi2", "-c", "2", "-N", "4", "-n", "100", "ocean_model"]
        );
    }

    #[test]
    fn slurm_command_without_node_size_omits_node_count() {
        let config = config("[parallel]\nsystem = slurm\nparallel_executable = srun\n");
        let command = parallel_command(&["a".to_string()], 1, 8, &config).expect("command");
        assert_eq!(command, vec!["srun", "-c", "1", "-n", "8", "a"]);
    }

    #[test]
    fn single_node_and_login_commands() {
        let single = config("[parallel]\nsystem = single_node\nparallel_executable = mpirun\n");
        let command = parallel_command(&["a".to_string()], 1, 4, &single).expect("command");
        assert_eq!(command, vec!["mpirun", "-n", "4", "a"]);

        let login = config("[parallel]\nsystem = login\nparallel_executable = mpirun\n");
        assert!(parallel_command(&["a".to_string()], 1, 1, &login).is_err());
    }

    #[test]
    fn single_node_keeps_configured_cores_per_node() {
        let mut config = config("[parallel]\ncores_per_node = 8\n");
        set_cores_per_node(&mut config, ParallelSystem::SingleNode, 32).expect("set");
        assert_eq!(config.get_int("parallel", "cores_per_node").expect("cores"), 8);

        let mut empty = TidewaterConfig::new();
        set_cores_per_node(&mut empty, ParallelSystem::SingleNode, 32).expect("set");
        assert_eq!(empty.get_int("parallel", "cores_per_node").expect("cores"), 32);
    }

    #[test]
    fn slurm_overwrites_cores_per_node() {
        let mut config = config("[parallel]\ncores_per_node = 64\n");
        set_cores_per_node(&mut config, ParallelSystem::Slurm, 128).expect("set");
        assert_eq!(config.get_int("parallel", "cores_per_node").expect("cores"), 128);

        let mut login = TidewaterConfig::new();
        set_cores_per_node(&mut login, ParallelSystem::Login, 4).expect("set");
        assert!(!login.has_option("parallel", "cores_per_node"));
    }
}
