//! Embedded defaults for the framework and the ocean component.

use crate::TaskError;
use tidewater_template::{ModelConfig, Namelist, StreamSet};

/// Framework-wide default config layer.
pub const DEFAULT_CONFIG: &str = include_str!("../assets/default.cfg");
/// Tera template for batch job scripts.
pub const JOB_SCRIPT_TEMPLATE: &str = include_str!("../assets/job_script.template");

/// Ocean component config layer.
pub const OCEAN_CONFIG: &str = include_str!("../assets/ocean/ocean.cfg");
/// Default ocean namelist.
pub const OCEAN_NAMELIST: &str = include_str!("../assets/ocean/namelist.ocean");
/// Default immutable streams.
pub const OCEAN_STREAMS: &str = include_str!("../assets/ocean/streams.yaml");
/// Output stream template shared by forward steps.
pub const OCEAN_OUTPUT: &str = include_str!("../assets/ocean/output.yaml");

/// Component section and file names.
pub const OCEAN_SECTION: &str = "ocean";

/// The ocean model component.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ocean;

impl Ocean {
    pub fn name(&self) -> &'static str {
        OCEAN_SECTION
    }

    /// A fresh copy of the defaults namelist.
    pub fn default_namelist(&self) -> Namelist {
        Namelist::parse(OCEAN_NAMELIST)
    }

    /// The default streams every forward step starts from.
    pub fn default_streams(&self) -> Result<StreamSet, TaskError> {
        Ok(ModelConfig::from_yaml(OCEAN_STREAMS)?.streams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewater_config::TidewaterConfig;
    use tidewater_template::StreamKind;

    #[test]
    fn embedded_layers_parse() {
        let mut config = TidewaterConfig::load_from_str(DEFAULT_CONFIG).expect("defaults");
        config.merge_str("component(ocean)", OCEAN_CONFIG).expect("ocean");
        assert_eq!(config.get("ocean", "namelist_filename").expect("namelist"), "namelist.ocean");
        assert_eq!(config.get("io", "io_type").expect("io_type"), "pnetcdf,cdf5");
    }

    #[test]
    fn default_streams_are_immutable() {
        let streams = Ocean.default_streams().expect("streams");
        assert!(streams.streams().len() >= 3);
        assert!(
            streams
                .streams()
                .iter()
                .all(|stream| stream.kind == StreamKind::Immutable)
        );
    }

    #[test]
    fn default_namelist_has_time_step() {
        let namelist = Ocean.default_namelist();
        assert_eq!(namelist.get("time_integration", "config_dt"), Some("'00:05:00'"));
    }
}
