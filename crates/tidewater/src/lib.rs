//! Public SDK surface for tidewater.
//!
//! This crate re-exports the config, template and ocean crates and provides
//! the small helpers shared by the `tidewater` binary.

use anyhow::{Context, bail};
use std::path::Path;
use tidewater_config::TidewaterConfig;
use tidewater_template::{Bindings, Template};

/// Re-export for convenience.
pub use tidewater_config as config;
/// Re-export for convenience.
pub use tidewater_ocean as ocean;
/// Re-export for convenience.
pub use tidewater_template as template;

#[inline]
/// Initialize logging with millisecond timestamps and `RUST_LOG` filtering.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();
}

/// Parse a `name=value` override.
pub fn parse_assignment(raw: &str) -> anyhow::Result<(String, String)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("expected name=value, found {raw:?}");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("empty name in {raw:?}");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Parse a `section:option=value` config override.
pub fn parse_config_override(raw: &str) -> anyhow::Result<(String, String, String)> {
    let (key, value) = parse_assignment(raw)?;
    let Some((section, option)) = key.split_once(':') else {
        bail!("expected section:option=value, found {raw:?}");
    };
    if section.is_empty() || option.is_empty() {
        bail!("expected section:option=value, found {raw:?}");
    }
    Ok((section.to_string(), option.to_string(), value))
}

/// Render a template file with a config section plus explicit bindings.
///
/// Explicit bindings win over config options of the same name.
pub fn render_template_file(
    template: &Path,
    config: &TidewaterConfig,
    section: Option<&str>,
    overrides: &[(String, String)],
) -> anyhow::Result<String> {
    let text = std::fs::read_to_string(template)
        .with_context(|| format!("failed to read template {}", template.display()))?;
    let parsed = Template::parse(&text)
        .with_context(|| format!("failed to parse template {}", template.display()))?;
    let mut bindings = match section {
        Some(section) => Bindings::from_section(config, section)
            .with_context(|| format!("failed to bind section [{section}]"))?,
        None => Bindings::new(),
    };
    for (name, value) in overrides {
        bindings.insert(name.clone(), value.clone());
    }
    parsed
        .render(&bindings)
        .with_context(|| format!("failed to render template {}", template.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn parses_assignments() {
        assert_eq!(
            parse_assignment("dt = 00:05:00").expect("assignment"),
            ("dt".to_string(), "00:05:00".to_string())
        );
        assert!(parse_assignment("dt").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn parses_config_overrides() {
        assert_eq!(
            parse_config_override("vertical_grid:grid_type=z-level").expect("override"),
            (
                "vertical_grid".to_string(),
                "grid_type".to_string(),
                "z-level".to_string()
            )
        );
        assert!(parse_config_override("grid_type=z-level").is_err());
        assert!(parse_config_override(":grid_type=z-level").is_err());
    }

    #[test]
    fn renders_file_with_section_and_overrides() {
        let dir = tempfile::tempdir().expect("tmp");
        let path = dir.path().join("forward.yaml");
        fs::write(&path, "dt: {{ dt }}\nlevels: {{ vert_levels }}\n").expect("write");
        let config = TidewaterConfig::load_from_str(
            "[vertical_grid]\nvert_levels = 50\ndt = 00:01:00\n",
        )
        .expect("config");
        let overrides = vec![("dt".to_string(), "00:05:00".to_string())];
        let text = render_template_file(&path, &config, Some("vertical_grid"), &overrides)
            .expect("render");
        assert_eq!(text, "dt: 00:05:00\nlevels: 50\n");
    }

    #[test]
    fn missing_binding_error_names_placeholder() {
        let dir = tempfile::tempdir().expect("tmp");
        let path = dir.path().join("t.yaml");
        fs::write(&path, "x: {{ nowhere }}\n").expect("write");
        let err = render_template_file(&path, &TidewaterConfig::new(), None, &[]).unwrap_err();
        assert!(format!("{err:#}").contains("nowhere"));
    }
}
