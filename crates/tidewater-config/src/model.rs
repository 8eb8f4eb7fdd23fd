//! Merged configuration with typed, interpolated accessors.

use crate::interpolate;
use crate::loader::{RUNTIME_SET_LABEL, merge_sections};
use crate::{ConfigError, SectionMap};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Merged config options with per-option provenance.
///
/// Raw values are stored as written; `${section:option}` references are
/// expanded when a value is read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TidewaterConfig {
    sections: SectionMap,
    provenance: SectionMap,
}

impl TidewaterConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a parsed layer on top of the current options.
    pub fn merge_layer(&mut self, label: &str, sections: SectionMap) {
        merge_sections(&mut self.sections, &mut self.provenance, sections, label);
    }

    /// Merge INI text as an additional layer.
    pub fn merge_str(&mut self, label: &str, text: &str) -> Result<(), ConfigError> {
        let sections = crate::ini::parse_ini(text, label)?;
        self.merge_layer(label, sections);
        Ok(())
    }

    /// Set a single option, recorded as a runtime change.
    pub fn set(&mut self, section: &str, option: &str, value: impl Into<String>) {
        let option = option.to_ascii_lowercase();
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(option.clone(), value.into());
        self.provenance
            .entry(section.to_string())
            .or_default()
            .insert(option, RUNTIME_SET_LABEL.to_string());
    }

    /// Whether the section exists.
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Whether the option exists in the section.
    pub fn has_option(&self, section: &str, option: &str) -> bool {
        self.sections
            .get(section)
            .is_some_and(|options| options.contains_key(&option.to_ascii_lowercase()))
    }

    /// Section names in sorted order.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Option names of a section in sorted order.
    pub fn options(&self, section: &str) -> Result<Vec<&str>, ConfigError> {
        self.sections
            .get(section)
            .map(|options| options.keys().map(String::as_str).collect())
            .ok_or_else(|| ConfigError::MissingSection(section.to_string()))
    }

    /// The raw, uninterpolated value of an option.
    pub fn raw(&self, section: &str, option: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|options| options.get(&option.to_ascii_lowercase()))
            .map(String::as_str)
    }

    /// Label of the layer that last set an option.
    pub fn source_of(&self, section: &str, option: &str) -> Option<&str> {
        self.provenance
            .get(section)
            .and_then(|options| options.get(&option.to_ascii_lowercase()))
            .map(String::as_str)
    }

    /// Interpolated string value.
    pub fn get(&self, section: &str, option: &str) -> Result<String, ConfigError> {
        interpolate::resolve_option(&self.sections, section, option)
    }

    /// Interpolated value, or `None` when the option is absent.
    pub fn get_opt(&self, section: &str, option: &str) -> Result<Option<String>, ConfigError> {
        if self.has_option(section, option) {
            self.get(section, option).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Integer value.
    pub fn get_int(&self, section: &str, option: &str) -> Result<i64, ConfigError> {
        self.get_parsed(section, option)
    }

    /// Floating-point value.
    pub fn get_float(&self, section: &str, option: &str) -> Result<f64, ConfigError> {
        self.get_parsed(section, option)
    }

    /// Boolean value (`true/yes/on/1` or `false/no/off/0`, case-insensitive).
    pub fn get_bool(&self, section: &str, option: &str) -> Result<bool, ConfigError> {
        let value = self.get(section, option)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            other => Err(ConfigError::invalid_value(
                section,
                option,
                format!("expected a boolean, found {other:?}"),
            )),
        }
    }

    /// List value split on commas and whitespace alike.
    pub fn get_list(&self, section: &str, option: &str) -> Result<Vec<String>, ConfigError> {
        let value = self.get(section, option)?;
        Ok(split_list(&value))
    }

    /// List of floating-point values.
    pub fn get_float_list(&self, section: &str, option: &str) -> Result<Vec<f64>, ConfigError> {
        self.get_parsed_list(section, option)
    }

    /// List of integer values.
    pub fn get_int_list(&self, section: &str, option: &str) -> Result<Vec<i64>, ConfigError> {
        self.get_parsed_list(section, option)
    }

    /// Expand references in arbitrary text relative to `section`.
    pub fn interpolate(&self, section: &str, text: &str) -> Result<String, ConfigError> {
        interpolate::interpolate_text(&self.sections, section, text)
    }

    /// Every option of a section, fully interpolated.
    pub fn resolve_section(
        &self,
        section: &str,
    ) -> Result<crate::OptionMap, ConfigError> {
        let options = self
            .sections
            .get(section)
            .ok_or_else(|| ConfigError::MissingSection(section.to_string()))?;
        options
            .keys()
            .map(|option| Ok((option.clone(), self.get(section, option)?)))
            .collect()
    }

    /// Every option, fully interpolated.
    pub fn resolve_all(&self) -> Result<SectionMap, ConfigError> {
        self.sections
            .keys()
            .map(|section| Ok((section.clone(), self.resolve_section(section)?)))
            .collect()
    }

    /// Resolved options as pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(&self.resolve_all()?)?)
    }

    /// Render the raw options as INI text with a source comment per option.
    pub fn write_ini(&self) -> String {
        let mut out = String::new();
        for (section, options) in &self.sections {
            let _ = writeln!(out, "[{section}]");
            out.push('\n');
            for (option, value) in options {
                if let Some(source) = self.source_of(section, option) {
                    let _ = writeln!(out, "# source: {source}");
                }
                let mut lines = value.lines();
                let first = lines.next().unwrap_or_default();
                let _ = writeln!(out, "{option} = {first}");
                for line in lines {
                    let _ = writeln!(out, "    {line}");
                }
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }

    /// Write `write_ini` output to disk.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path, self.write_ini())?;
        Ok(())
    }

    fn get_parsed<T>(&self, section: &str, option: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self.get(section, option)?;
        value.trim().parse::<T>().map_err(|err| {
            ConfigError::invalid_value(section, option, format!("{value:?}: {err}"))
        })
    }

    fn get_parsed_list<T>(&self, section: &str, option: &str) -> Result<Vec<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get_list(section, option)?
            .into_iter()
            .map(|item| {
                item.parse::<T>().map_err(|err| {
                    ConfigError::invalid_value(section, option, format!("{item:?}: {err}"))
                })
            })
            .collect()
    }
}

/// Split a list option on any mix of commas and whitespace.
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{TidewaterConfig, split_list};
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
[parallel]
system = single_node
cores_per_node = 8
use_gpu = Yes
partitions = short, long

[cosine_bell]
resolutions = 60 120 240
dt_per_km = 30.0
";

    #[test]
    fn typed_getters() {
        let config = TidewaterConfig::load_from_str(SAMPLE).expect("config");
        assert_eq!(config.get_int("parallel", "cores_per_node").expect("int"), 8);
        assert!(config.get_bool("parallel", "use_gpu").expect("bool"));
        assert_eq!(
            config.get_list("parallel", "partitions").expect("list"),
            vec!["short".to_string(), "long".to_string()]
        );
        assert_eq!(
            config.get_float_list("cosine_bell", "resolutions").expect("floats"),
            vec![60.0, 120.0, 240.0]
        );
        assert_eq!(
            config.get_float("cosine_bell", "dt_per_km").expect("float"),
            30.0
        );
    }

    #[test]
    fn bad_integer_names_option() {
        let config = TidewaterConfig::load_from_str("[a]\nn = lots\n").expect("config");
        let msg = config.get_int("a", "n").unwrap_err().to_string();
        assert!(msg.contains("a:n"));
    }

    #[test]
    fn missing_option_and_section() {
        let config = TidewaterConfig::load_from_str(SAMPLE).expect("config");
        assert!(config.get("parallel", "nope").is_err());
        assert!(config.get("nowhere", "x").is_err());
        assert_eq!(config.get_opt("parallel", "nope").expect("opt"), None);
    }

    #[test]
    fn set_overrides_and_records_source() {
        let mut config = TidewaterConfig::load_from_str(SAMPLE).expect("config");
        config.set("parallel", "Cores_Per_Node", "16");
        assert_eq!(config.get_int("parallel", "cores_per_node").expect("int"), 16);
        assert_eq!(
            config.source_of("parallel", "cores_per_node"),
            Some("runtime(set)")
        );
    }

    #[test]
    fn write_ini_round_trips_values() {
        let mut config = TidewaterConfig::load_from_str(SAMPLE).expect("config");
        config.set("job", "modules", "gcc\nnetcdf");
        let text = config.write_ini();
        assert!(text.contains("# source: config"));
        let reparsed = TidewaterConfig::load_from_str(&text).expect("reparse");
        assert_eq!(
            reparsed.resolve_all().expect("resolved"),
            config.resolve_all().expect("resolved")
        );
    }

    #[test]
    fn split_list_handles_separators() {
        assert_eq!(split_list("a, b ,c"), vec!["a", "b", "c"]);
        assert_eq!(split_list("a  b\nc"), vec!["a", "b", "c"]);
        // Commas and whitespace separate items together.
        assert_eq!(split_list("a, b c"), vec!["a", "b", "c"]);
        assert_eq!(split_list("60,120 240,"), vec!["60", "120", "240"]);
        assert!(split_list("").is_empty());
    }
}
