//! IO helpers for reading config layers.

use super::{ConfigLayer, ConfigLayerSource, DEFAULT_USER_CONFIG_FILE, LoadedLayer};
use crate::{ConfigError, ini};
use directories::UserDirs;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Load an optional layer if the provided path exists.
pub(super) fn load_optional_layer(
    source: ConfigLayerSource,
    path: Option<&Path>,
) -> Result<Option<LoadedLayer>, ConfigError> {
    let path = match path {
        Some(path) => path,
        None => return Ok(None),
    };

    if !path.exists() {
        debug!(
            "optional layer missing (source={:?}, path={})",
            source,
            path.display()
        );
        return Ok(None);
    }

    Ok(Some(load_required_layer(source, path)?))
}

/// Load and parse a required layer from disk.
pub(super) fn load_required_layer(
    source: ConfigLayerSource,
    path: &Path,
) -> Result<LoadedLayer, ConfigError> {
    debug!(
        "loading config layer (source={:?}, path={})",
        source,
        path.display()
    );
    let contents = fs::read_to_string(path)?;
    let label = layer_label(source, &path.display().to_string());
    let sections = ini::parse_ini(&contents, &label)?;
    Ok(LoadedLayer {
        meta: ConfigLayer {
            source,
            label,
            path: Some(path.to_path_buf()),
        },
        sections,
    })
}

/// Parse an in-memory layer.
pub(super) fn load_text_layer(
    source: ConfigLayerSource,
    name: &str,
    text: &str,
) -> Result<LoadedLayer, ConfigError> {
    debug!("loading config layer (source={:?}, name={})", source, name);
    let label = layer_label(source, name);
    let sections = ini::parse_ini(text, &label)?;
    Ok(LoadedLayer {
        meta: ConfigLayer {
            source,
            label,
            path: None,
        },
        sections,
    })
}

/// Build a user-friendly label for provenance and parse errors.
pub(super) fn layer_label(source: ConfigLayerSource, name: &str) -> String {
    format!("{}({name})", source.as_str())
}

/// Default user config path under the home directory.
pub(super) fn default_user_config_path() -> Option<PathBuf> {
    UserDirs::new().map(|dirs| dirs.home_dir().join(DEFAULT_USER_CONFIG_FILE))
}
