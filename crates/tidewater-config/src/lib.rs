//! Layered configuration for ocean-model test cases.
//!
//! This crate owns INI-style config parsing, layer merging with per-option
//! provenance, `${section:option}` interpolation and typed accessors used by
//! task setup and the CLI.

use std::collections::BTreeMap;

mod error;
mod ini;
mod interpolate;
mod loader;
mod model;
mod netcdf;

/// Public error type returned by config loading and resolution APIs.
pub use error::ConfigError;
/// INI parser for a single layer.
pub use ini::parse_ini;
/// Layered config types and loader options.
pub use loader::{
    ConfigLayer, ConfigLayerSource, LayerContents, LayerInput, LayeredConfig,
    LayeredConfigOptions,
};
/// Merged configuration.
pub use model::TidewaterConfig;
/// NetCDF io options.
pub use netcdf::{DEFAULT_IO_TYPE, IO_SECTION, IoOptions, NetcdfEngine, NetcdfFormat};

/// Options of one section, keyed by lower-case option name.
pub type OptionMap = BTreeMap<String, String>;
/// Sections keyed by name.
pub type SectionMap = BTreeMap<String, OptionMap>;
