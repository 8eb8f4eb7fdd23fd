//! Layered configuration loader.
//!
//! Collects configuration layers (defaults, machine, component, task, user,
//! runtime), parses each one, and merges them in precedence order so the last
//! layer to set an option wins. Interpolation is deferred until values are
//! read from the resulting `TidewaterConfig`.

mod layer_io;
mod merge;
mod utils;


use crate::{ConfigError, TidewaterConfig, ini};
use log::{debug, info};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) use merge::merge_sections;

/// Default user config filename under the home directory.
const DEFAULT_USER_CONFIG_FILE: &str = ".tidewater.cfg";
/// Label recorded for options changed through `TidewaterConfig::set`.
pub(crate) const RUNTIME_SET_LABEL: &str = "runtime(set)";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged config.
    pub config: TidewaterConfig,
    /// Metadata for each layer merged, in precedence order.
    pub layers: Vec<ConfigLayer>,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigLayerSource {
    /// Framework-wide defaults (lowest precedence).
    Defaults,
    /// Machine-specific options such as parallel settings.
    Machine,
    /// Model-component options (e.g. the ocean component).
    Component,
    /// Task-specific options.
    Task,
    /// User config file.
    User,
    /// Runtime overrides (highest precedence).
    Runtime,
}

impl ConfigLayerSource {
    /// Short lower-case name used in labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLayerSource::Defaults => "defaults",
            ConfigLayerSource::Machine => "machine",
            ConfigLayerSource::Component => "component",
            ConfigLayerSource::Task => "task",
            ConfigLayerSource::User => "user",
            ConfigLayerSource::Runtime => "runtime",
        }
    }
}

/// Metadata about a merged config layer.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigLayer {
    /// Layer origin.
    pub source: ConfigLayerSource,
    /// Human-readable label, also used as option provenance.
    pub label: String,
    /// Location on disk if the layer came from a file.
    pub path: Option<PathBuf>,
}

/// Where the text of a requested layer comes from.
#[derive(Debug, Clone)]
pub enum LayerContents {
    /// Text already in memory, such as an embedded default file.
    Text { name: String, text: String },
    /// A file that must exist.
    Path(PathBuf),
}

/// A single requested layer.
#[derive(Debug, Clone)]
pub struct LayerInput {
    /// Layer origin, which decides precedence.
    pub source: ConfigLayerSource,
    /// Layer contents.
    pub contents: LayerContents,
}

/// Options controlling which layers are loaded.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfigOptions {
    /// Explicit layers; merged by source precedence, stable within a source.
    pub layers: Vec<LayerInput>,
    /// Optional machine config path, skipped when missing.
    pub machine_config_path: Option<PathBuf>,
    /// Optional user config path (defaults to `~/.tidewater.cfg`), skipped when missing.
    pub user_config_path: Option<PathBuf>,
    /// Runtime override config paths applied last; each must exist.
    pub runtime_paths: Vec<PathBuf>,
}

impl LayeredConfigOptions {
    /// Create options with the default user config location.
    pub fn new() -> Self {
        Self {
            user_config_path: layer_io::default_user_config_path(),
            ..Self::default()
        }
    }

    /// Add an in-memory layer.
    pub fn with_text(
        mut self,
        source: ConfigLayerSource,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.layers.push(LayerInput {
            source,
            contents: LayerContents::Text {
                name: name.into(),
                text: text.into(),
            },
        });
        self
    }

    /// Add a required layer read from disk.
    pub fn with_path(mut self, source: ConfigLayerSource, path: impl AsRef<Path>) -> Self {
        self.layers.push(LayerInput {
            source,
            contents: LayerContents::Path(path.as_ref().to_path_buf()),
        });
        self
    }

    /// Set the optional machine config path.
    pub fn with_machine_path(mut self, path: impl AsRef<Path>) -> Self {
        self.machine_config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Add a runtime override config path that is applied last.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Skip the user config file.
    pub fn without_user_config(mut self) -> Self {
        self.user_config_path = None;
        self
    }
}

impl TidewaterConfig {
    /// Load a single config from a path (no layering).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading config from path: {}", path.display());
        let contents = fs::read_to_string(path)?;
        let label = path.display().to_string();
        let sections = ini::parse_ini(&contents, &label)?;
        let mut config = TidewaterConfig::new();
        config.merge_layer(&label, sections);
        Ok(config)
    }

    /// Load a single config from INI contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let sections = ini::parse_ini(contents, "config")?;
        let mut config = TidewaterConfig::new();
        config.merge_layer("config", sections);
        Ok(config)
    }

    /// Load a layered config stack.
    ///
    /// Layer precedence (low -> high): defaults, machine, component, task,
    /// user, runtime overrides.
    pub fn load_layered(options: LayeredConfigOptions) -> Result<LayeredConfig, ConfigError> {
        let mut loaded = Vec::new();
        let mut seen_paths = HashSet::new();

        for input in options.layers {
            let layer = match input.contents {
                LayerContents::Text { name, text } => {
                    layer_io::load_text_layer(input.source, &name, &text)?
                }
                LayerContents::Path(path) => {
                    if !seen_paths.insert(utils::unique_path(&path)) {
                        debug!("skipping duplicate layer (path={})", path.display());
                        continue;
                    }
                    layer_io::load_required_layer(input.source, &path)?
                }
            };
            loaded.push(layer);
        }

        for (source, path) in [
            (
                ConfigLayerSource::Machine,
                options.machine_config_path.as_deref(),
            ),
            (ConfigLayerSource::User, options.user_config_path.as_deref()),
        ] {
            if let Some(path) = path {
                if !seen_paths.insert(utils::unique_path(path)) {
                    debug!("skipping duplicate layer (path={})", path.display());
                    continue;
                }
            }
            if let Some(layer) = layer_io::load_optional_layer(source, path)? {
                debug!("loaded {:?} layer", source);
                loaded.push(layer);
            }
        }

        for runtime_path in &options.runtime_paths {
            let layer = layer_io::load_required_layer(ConfigLayerSource::Runtime, runtime_path)?;
            debug!("loaded runtime layer (path={})", runtime_path.display());
            loaded.push(layer);
        }

        // Stable: layers of the same source keep their request order.
        loaded.sort_by_key(|layer| layer.meta.source);

        let mut config = TidewaterConfig::new();
        let mut layers = Vec::with_capacity(loaded.len());
        for layer in loaded {
            config.merge_layer(&layer.meta.label, layer.sections);
            layers.push(layer.meta);
        }

        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }
}

/// Internal representation of a parsed config layer.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    sections: crate::SectionMap,
}
