//! NetCDF output options read from the `[io]` section.

use crate::{ConfigError, TidewaterConfig};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Section holding io options.
pub const IO_SECTION: &str = "io";
/// Default MPAS-style parallel io type for output streams.
pub const DEFAULT_IO_TYPE: &str = "pnetcdf,cdf5";

/// NetCDF file format written by post-processing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetcdfFormat {
    #[serde(rename = "NETCDF4")]
    Netcdf4,
    #[serde(rename = "NETCDF4_CLASSIC")]
    Netcdf4Classic,
    #[serde(rename = "NETCDF3_64BIT_OFFSET")]
    Netcdf3_64BitOffset,
    #[serde(rename = "NETCDF3_64BIT_DATA")]
    Netcdf3_64BitData,
    #[serde(rename = "NETCDF3_CLASSIC")]
    Netcdf3Classic,
}

impl NetcdfFormat {
    const ALL: [NetcdfFormat; 5] = [
        NetcdfFormat::Netcdf4,
        NetcdfFormat::Netcdf4Classic,
        NetcdfFormat::Netcdf3_64BitOffset,
        NetcdfFormat::Netcdf3_64BitData,
        NetcdfFormat::Netcdf3Classic,
    ];

    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NetcdfFormat::Netcdf4 => "NETCDF4",
            NetcdfFormat::Netcdf4Classic => "NETCDF4_CLASSIC",
            NetcdfFormat::Netcdf3_64BitOffset => "NETCDF3_64BIT_OFFSET",
            NetcdfFormat::Netcdf3_64BitData => "NETCDF3_64BIT_DATA",
            NetcdfFormat::Netcdf3Classic => "NETCDF3_CLASSIC",
        }
    }
}

impl fmt::Display for NetcdfFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetcdfFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_uppercase();
        NetcdfFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == wanted)
            .ok_or_else(|| unsupported("format", value, &NetcdfFormat::ALL.map(|f| f.as_str())))
    }
}

/// Library used to write NetCDF files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetcdfEngine {
    Netcdf4,
    Scipy,
    H5netcdf,
}

impl NetcdfEngine {
    const ALL: [NetcdfEngine; 3] = [
        NetcdfEngine::Netcdf4,
        NetcdfEngine::Scipy,
        NetcdfEngine::H5netcdf,
    ];

    /// Canonical lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NetcdfEngine::Netcdf4 => "netcdf4",
            NetcdfEngine::Scipy => "scipy",
            NetcdfEngine::H5netcdf => "h5netcdf",
        }
    }
}

impl fmt::Display for NetcdfEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetcdfEngine {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        NetcdfEngine::ALL
            .into_iter()
            .find(|engine| engine.as_str() == wanted)
            .ok_or_else(|| unsupported("engine", value, &NetcdfEngine::ALL.map(|e| e.as_str())))
    }
}

/// Validated io settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IoOptions {
    /// NetCDF file format.
    pub format: NetcdfFormat,
    /// NetCDF writing library.
    pub engine: NetcdfEngine,
    /// `io_type` applied to model output streams that do not set one.
    pub io_type: String,
}

impl Default for IoOptions {
    fn default() -> Self {
        Self {
            format: NetcdfFormat::Netcdf3_64BitOffset,
            engine: NetcdfEngine::Netcdf4,
            io_type: DEFAULT_IO_TYPE.to_string(),
        }
    }
}

impl IoOptions {
    /// Read `[io]` options, falling back to defaults for absent keys.
    pub fn from_config(config: &TidewaterConfig) -> Result<Self, ConfigError> {
        let defaults = IoOptions::default();
        let format = match config.get_opt(IO_SECTION, "format")? {
            Some(value) => value.parse()?,
            None => defaults.format,
        };
        let engine = match config.get_opt(IO_SECTION, "engine")? {
            Some(value) => value.parse()?,
            None => defaults.engine,
        };
        let io_type = config
            .get_opt(IO_SECTION, "io_type")?
            .unwrap_or(defaults.io_type);

        if format == NetcdfFormat::Netcdf3_64BitData && engine == NetcdfEngine::Scipy {
            return Err(ConfigError::UnsupportedNetcdf {
                key: format!("{IO_SECTION}:engine"),
                value: engine.to_string(),
                expected: "netcdf4 or h5netcdf for NETCDF3_64BIT_DATA".to_string(),
            });
        }

        Ok(Self {
            format,
            engine,
            io_type,
        })
    }
}

fn unsupported(key: &str, value: &str, expected: &[&str]) -> ConfigError {
    ConfigError::UnsupportedNetcdf {
        key: format!("{IO_SECTION}:{key}"),
        value: value.to_string(),
        expected: expected.join(", "),
    }
}
