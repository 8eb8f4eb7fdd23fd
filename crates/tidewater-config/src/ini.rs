//! Parser for INI-style config layers.
//!
//! Supports `[section]` headers, `key = value` and `key: value` options,
//! full-line `#`/`;` comments and indented continuation lines. Option names
//! are lower-cased; section names are kept as written.

use crate::{ConfigError, SectionMap};

/// Parse INI text into a section map. `origin` labels parse errors.
pub fn parse_ini(text: &str, origin: &str) -> Result<SectionMap, ConfigError> {
    let mut sections = SectionMap::new();
    let mut section: Option<String> = None;
    let mut last_option: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw_line.trim();

        if trimmed.is_empty() {
            last_option = None;
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let indented = raw_line.starts_with(' ') || raw_line.starts_with('\t');
        if indented {
            if let (Some(section), Some(option)) = (section.as_ref(), last_option.as_ref()) {
                if let Some(value) = sections
                    .get_mut(section)
                    .and_then(|options| options.get_mut(option))
                {
                    if !value.is_empty() {
                        value.push('\n');
                    }
                    value.push_str(trimmed);
                    continue;
                }
            }
        }

        if trimmed.starts_with('[') {
            let Some(name) = trimmed
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
            else {
                return Err(parse_error(origin, line_no, "unterminated section header"));
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(parse_error(origin, line_no, "empty section name"));
            }
            sections.entry(name.to_string()).or_default();
            section = Some(name.to_string());
            last_option = None;
            continue;
        }

        let Some(split) = trimmed.find(['=', ':']) else {
            return Err(parse_error(
                origin,
                line_no,
                format!("expected `key = value`, found {trimmed:?}"),
            ));
        };
        let key = trimmed[..split].trim().to_ascii_lowercase();
        let value = trimmed[split + 1..].trim().to_string();
        if key.is_empty() {
            return Err(parse_error(origin, line_no, "empty option name"));
        }
        let Some(current) = section.as_ref() else {
            return Err(parse_error(
                origin,
                line_no,
                format!("option {key:?} appears before any section"),
            ));
        };
        sections
            .entry(current.clone())
            .or_default()
            .insert(key.clone(), value);
        last_option = Some(key);
    }

    Ok(sections)
}

fn parse_error(origin: &str, line: usize, message: impl Into<String>) -> ConfigError {
    ConfigError::ParseFailed {
        origin: origin.to_string(),
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_ini;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_sections_options_and_comments() {
        let text = "\
# leading comment
[ocean]
Model = omega
grid_type: uniform

; another comment
[cosine_bell]
resolutions = 60, 120
";
        let sections = parse_ini(text, "test").expect("parse");
        assert_eq!(sections["ocean"]["model"], "omega");
        assert_eq!(sections["ocean"]["grid_type"], "uniform");
        assert_eq!(sections["cosine_bell"]["resolutions"], "60, 120");
    }

    #[test]
    fn joins_continuation_lines() {
        let text = "[job]\nmodules =\n    gcc\n    netcdf\nwall_time = 1:00:00\n";
        let sections = parse_ini(text, "test").expect("parse");
        assert_eq!(sections["job"]["modules"], "gcc\nnetcdf");
        assert_eq!(sections["job"]["wall_time"], "1:00:00");
    }

    #[test]
    fn keeps_interpolation_colons_in_values() {
        let text = "[a]\nx = ${b:y}\n";
        let sections = parse_ini(text, "test").expect("parse");
        assert_eq!(sections["a"]["x"], "${b:y}");
    }

    #[test]
    fn rejects_option_outside_section() {
        let err = parse_ini("x = 1\n", "layer.cfg").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("layer.cfg"));
        assert!(msg.contains("line 1"));
    }

    #[test]
    fn rejects_unterminated_header() {
        let err = parse_ini("[ocean\n", "layer.cfg").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }
}
