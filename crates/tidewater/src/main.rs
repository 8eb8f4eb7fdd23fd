//! Command-line entry point for listing, configuring and setting up tasks.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use std::path::PathBuf;
use tidewater::config::{LayeredConfigOptions, TidewaterConfig};
use tidewater::ocean::{
    ConvergenceSettings, SetupOptions, TaskSummary, all_tasks, filter_tasks, find_task,
    load_task_config, setup_task,
};
use tidewater::{init_logging, parse_assignment, parse_config_override, render_template_file};

/// Command-line options for the tidewater CLI.
#[derive(Parser)]
#[command(name = "tidewater", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Config layers shared by task commands.
#[derive(clap::Args, Clone, Default)]
struct LayerArgs {
    /// Machine config file
    #[arg(long)]
    machine: Option<PathBuf>,
    /// Extra config files applied last, in order
    #[arg(long = "config")]
    configs: Vec<PathBuf>,
    /// Skip ~/.tidewater.cfg
    #[arg(long)]
    no_user_config: bool,
}

impl LayerArgs {
    fn setup_options(&self, work_dir: PathBuf) -> SetupOptions {
        let mut options = SetupOptions::new(work_dir);
        options.machine_config = self.machine.clone();
        options.runtime_configs = self.configs.clone();
        if self.no_user_config {
            options.user_config = None;
        }
        options
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ConfigFormat {
    /// Raw options with the layer that set each one
    Ini,
    /// Fully resolved options
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List available tasks
    List {
        /// Glob matched against task paths and names
        #[arg(long)]
        filter: Option<String>,
        /// Print JSON instead of one path per line
        #[arg(long)]
        json: bool,
    },
    /// Show the merged config for a task
    Config {
        /// Task path or name
        task: String,
        #[command(flatten)]
        layers: LayerArgs,
        /// Override an option as section:option=value
        #[arg(long = "set")]
        sets: Vec<String>,
        #[arg(long, value_enum, default_value = "ini")]
        format: ConfigFormat,
    },
    /// Render a template with values from config files
    Render {
        /// Template file
        #[arg(long)]
        template: PathBuf,
        /// Config files, merged in order
        #[arg(long = "config")]
        configs: Vec<PathBuf>,
        /// Section whose options become bindings
        #[arg(long)]
        section: Option<String>,
        /// Bind a placeholder as name=value
        #[arg(long = "set")]
        sets: Vec<String>,
        /// Write here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Set up one or more tasks in a work directory
    Setup {
        /// Task paths or names
        #[arg(required = true)]
        tasks: Vec<String>,
        /// Base work directory
        #[arg(long, short = 'w', default_value = ".")]
        work_dir: PathBuf,
        #[command(flatten)]
        layers: LayerArgs,
        /// Suite name used for the job name
        #[arg(long)]
        suite: Option<String>,
    },
    /// Fit the order of convergence of per-resolution errors
    Converge {
        /// Task path or name
        task: String,
        /// Errors in the order of the task's resolutions
        #[arg(long, value_delimiter = ',', required = true)]
        errors: Vec<f64>,
        #[command(flatten)]
        layers: LayerArgs,
    },
}

/// Entry point for the tidewater CLI.
fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::List { filter, json } => list(filter.as_deref(), json),
        Command::Config {
            task,
            layers,
            sets,
            format,
        } => show_config(&task, &layers, &sets, format),
        Command::Render {
            template,
            configs,
            section,
            sets,
            output,
        } => render(template, configs, section, sets, output),
        Command::Setup {
            tasks,
            work_dir,
            layers,
            suite,
        } => setup(&tasks, work_dir, &layers, suite),
        Command::Converge {
            task,
            errors,
            layers,
        } => converge(&task, &errors, &layers),
    }
}

fn list(filter: Option<&str>, json: bool) -> anyhow::Result<()> {
    let entries = match filter {
        Some(pattern) => filter_tasks(pattern).context("failed to filter tasks")?,
        None => all_tasks().iter().collect(),
    };
    if json {
        let summaries: Vec<TaskSummary> = entries.into_iter().map(TaskSummary::from).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for entry in entries {
            println!("{}", entry.path);
        }
    }
    Ok(())
}

fn show_config(
    task: &str,
    layers: &LayerArgs,
    sets: &[String],
    format: ConfigFormat,
) -> anyhow::Result<()> {
    let entry = find_task(task)?;
    let layered = load_task_config(entry, &layers.setup_options(PathBuf::from(".")))
        .with_context(|| format!("failed to load config for {}", entry.path))?;
    debug!("task config loaded (task={}, layers={})", entry.path, layered.layers.len());
    let mut config = layered.config;
    for raw in sets {
        let (section, option, value) = parse_config_override(raw)?;
        config.set(&section, &option, value);
    }
    match format {
        ConfigFormat::Ini => print!("{}", config.write_ini()),
        ConfigFormat::Json => println!("{}", config.to_json().context("failed to resolve config")?),
    }
    Ok(())
}

fn render(
    template: PathBuf,
    configs: Vec<PathBuf>,
    section: Option<String>,
    sets: Vec<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut options = LayeredConfigOptions::new().without_user_config();
    for path in &configs {
        options = options.with_runtime_path(path);
    }
    let config = TidewaterConfig::load_layered(options)
        .context("failed to load config")?
        .config;
    if let Some(section) = section.as_deref() {
        if !config.has_section(section) {
            bail!("section [{section}] not found in the given config files");
        }
    }
    let overrides = sets
        .iter()
        .map(|raw| parse_assignment(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let text = render_template_file(&template, &config, section.as_deref(), &overrides)?;
    match output {
        Some(path) => {
            std::fs::write(&path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("rendered template (path={})", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn setup(
    tasks: &[String],
    work_dir: PathBuf,
    layers: &LayerArgs,
    suite: Option<String>,
) -> anyhow::Result<()> {
    let mut options = layers.setup_options(work_dir);
    options.suite = suite;
    for name in tasks {
        let entry = find_task(name)?;
        let report =
            setup_task(entry, &options).with_context(|| format!("failed to set up {}", entry.path))?;
        println!(
            "{} ({} steps) -> {}",
            entry.path,
            report.task.steps.len(),
            report.task_dir.display()
        );
    }
    Ok(())
}

fn converge(task: &str, errors: &[f64], layers: &LayerArgs) -> anyhow::Result<()> {
    let entry = find_task(task)?;
    let config = load_task_config(entry, &layers.setup_options(PathBuf::from(".")))
        .with_context(|| format!("failed to load config for {}", entry.path))?
        .config;
    let settings = ConvergenceSettings::from_config(&config, entry.name)
        .with_context(|| format!("{} is not a convergence task", entry.path))?;
    let report = settings.analyze(errors)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
