//! Batch job scripts for running a task's steps.

use crate::TaskError;
use crate::component::JOB_SCRIPT_TEMPLATE;
use crate::parallel::PARALLEL_SECTION;
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tidewater_config::TidewaterConfig;

/// Section with job submission options.
pub const JOB_SECTION: &str = "job";
/// Placeholder meaning "derive this option".
pub const DEFAULT_MARKER: &str = "<<<default>>>";
/// Name of the generated job script when no suite is given.
pub const JOB_SCRIPT_FILENAME: &str = "job_script.sh";

/// Values substituted into the job script template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOptions {
    pub job_name: String,
    pub account: String,
    pub nodes: u64,
    pub wall_time: String,
    pub partition: String,
    pub qos: String,
    pub constraint: String,
    pub gpus_per_node: String,
    pub suite: String,
    /// Step directories run in order.
    pub steps: Vec<String>,
}

impl JobOptions {
    /// Resolve `[job]` options, filling `<<<default>>>` values.
    ///
    /// Nodes come from the geometric mean of the target and minimum cores.
    pub fn from_config(
        config: &TidewaterConfig,
        target_cores: u64,
        min_cores: u64,
        suite: Option<&str>,
        steps: Vec<String>,
    ) -> Result<Self, TaskError> {
        let cores_per_node = match config.get_opt(PARALLEL_SECTION, "cores_per_node")? {
            Some(value) if !value.trim().is_empty() => {
                config.get_int(PARALLEL_SECTION, "cores_per_node")?.max(1) as u64
            }
            _ => 1,
        };
        let cores = ((target_cores.max(1) * min_cores.max(1)) as f64).sqrt();
        let nodes = ((cores / cores_per_node as f64).ceil() as u64).max(1);

        let job_name = match job_option(config, "job_name")? {
            Some(name) => name,
            None => match suite {
                Some(suite) => format!("tidewater_{suite}"),
                None => "tidewater".to_string(),
            },
        };
        let wall_time = job_option(config, "wall_time")?.unwrap_or_else(|| "1:00:00".to_string());
        let partition = match job_option(config, "partition")? {
            Some(value) => value,
            None => first_listed(config, "partitions")?,
        };
        let qos = match job_option(config, "qos")? {
            Some(value) => value,
            None => first_listed(config, "qos")?,
        };
        let constraint = match job_option(config, "constraint")? {
            Some(value) => value,
            None => first_listed(config, "constraints")?,
        };

        Ok(Self {
            job_name,
            account: parallel_option(config, "account")?,
            nodes,
            wall_time,
            partition,
            qos,
            constraint,
            gpus_per_node: parallel_option(config, "gpus_per_node")?,
            suite: suite.unwrap_or_default().to_string(),
            steps,
        })
    }

    /// Render the job script text.
    pub fn render(&self) -> Result<String, TaskError> {
        let context = Context::from_serialize(self)?;
        let text = Tera::one_off(JOB_SCRIPT_TEMPLATE, &context, false)?;
        Ok(clean_up_whitespace(&text))
    }

    /// `job_script.sh`, or `job_script.<suite>.sh` for a suite.
    pub fn script_filename(&self) -> String {
        if self.suite.is_empty() {
            JOB_SCRIPT_FILENAME.to_string()
        } else {
            format!("job_script.{}.sh", self.suite)
        }
    }

    /// Render and write the job script into `dir`.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, TaskError> {
        let path = dir.join(self.script_filename());
        fs::write(&path, self.render()?)?;
        info!(
            "wrote job script (path={}, nodes={})",
            path.display(),
            self.nodes
        );
        Ok(path)
    }
}

/// Drop blank lines that follow another blank line or sit between comments.
pub fn clean_up_whitespace(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if line.is_empty() {
            let after_blank = kept.last().is_none_or(|prev| prev.is_empty());
            let between_comments = kept.last().is_some_and(|prev| prev.starts_with('#'))
                && lines[idx + 1..]
                    .iter()
                    .find(|next| !next.is_empty())
                    .is_some_and(|next| next.starts_with('#'));
            if after_blank || between_comments {
                continue;
            }
        }
        kept.push(line);
    }
    while kept.last().is_some_and(|line| line.is_empty()) {
        kept.pop();
    }
    let mut out = kept.join("\n");
    out.push('\n');
    out
}

fn job_option(config: &TidewaterConfig, option: &str) -> Result<Option<String>, TaskError> {
    Ok(config
        .get_opt(JOB_SECTION, option)?
        .map(|value| value.trim().to_string())
        .filter(|value| value != DEFAULT_MARKER))
}

fn parallel_option(config: &TidewaterConfig, option: &str) -> Result<String, TaskError> {
    Ok(config
        .get_opt(PARALLEL_SECTION, option)?
        .unwrap_or_default()
        .trim()
        .to_string())
}

fn first_listed(config: &TidewaterConfig, option: &str) -> Result<String, TaskError> {
    if !config.has_option(PARALLEL_SECTION, option) {
        return Ok(String::new());
    }
    Ok(config
        .get_list(PARALLEL_SECTION, option)?
        .into_iter()
        .next()
        .unwrap_or_default())
}
