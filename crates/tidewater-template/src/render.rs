//! `{{ name }}` placeholder templates.
//!
//! A template is split once into literal text and placeholders. Rendering
//! substitutes bound scalars for placeholders; substituted text is never
//! scanned again, so rendering the same template with the same bindings
//! always produces the same output.

use crate::TemplateError;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use tidewater_config::TidewaterConfig;

/// Placeholder expressions: anything between `{{` and `}}`.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("placeholder pattern is valid"));

/// A scalar value bound to a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(value) => f.write_str(value),
            Scalar::Int(value) => write!(f, "{value}"),
            // Debug keeps a trailing `.0` so floats stay floats in YAML.
            Scalar::Float(value) => write!(f, "{value:?}"),
            Scalar::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// Placeholder name to value mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: BTreeMap<String, Scalar>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every option of a config section, interpolated, as a string.
    pub fn from_section(config: &TidewaterConfig, section: &str) -> Result<Self, TemplateError> {
        let mut bindings = Bindings::new();
        for (option, value) in config.resolve_section(section)? {
            bindings.insert(option, value);
        }
        Ok(bindings)
    }

    /// Bind a value, replacing any previous binding of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Scalar>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder-style `insert`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(name, value);
        self
    }

    /// Copy all bindings from `other`, which win on conflicts.
    pub fn extend(&mut self, other: &Bindings) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder { name: String, line: usize },
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Split `text` into literals and placeholders.
    ///
    /// Placeholder names must look like `name` or `dotted.name`; any other
    /// `{{ ... }}` expression is rejected.
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut cursor = 0;
        for captures in PLACEHOLDER.captures_iter(text) {
            let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if whole.start() > cursor {
                segments.push(Segment::Literal(text[cursor..whole.start()].to_string()));
            }
            let line = text[..whole.start()].matches('\n').count() + 1;
            let name = inner.as_str().trim();
            if !is_placeholder_name(name) {
                return Err(TemplateError::BadPlaceholder {
                    placeholder: name.to_string(),
                    line,
                });
            }
            segments.push(Segment::Placeholder {
                name: name.to_string(),
                line,
            });
            cursor = whole.end();
        }
        if cursor < text.len() {
            segments.push(Segment::Literal(text[cursor..].to_string()));
        }
        Ok(Self { segments })
    }

    /// Unique placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder { name, .. } = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute every placeholder; the first unbound one is an error.
    pub fn render(&self, bindings: &Bindings) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { name, line } => {
                    let value = bindings.get(name).ok_or_else(|| TemplateError::MissingBinding {
                        placeholder: name.clone(),
                        line: *line,
                    })?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }
}

/// Parse and render in one step.
pub fn render_str(text: &str, bindings: &Bindings) -> Result<String, TemplateError> {
    Template::parse(text)?.render(bindings)
}

fn is_placeholder_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.')
}

#[cfg(test)]
mod tests {
    use super::{Bindings, PLACEHOLDER, Scalar, Template, render_str};
    use crate::TemplateError;
    use pretty_assertions::assert_eq;
    use tidewater_config::TidewaterConfig;

    const FORWARD: &str = "\
ocean:
  time_management:
    config_run_duration: {{ run_duration }}
  time_integration:
    config_dt: {{dt}}
  streams:
    output:
      output_interval: {{ output_interval }}
";

    fn forward_bindings() -> Bindings {
        Bindings::new()
            .with("run_duration", "'0000_06:00:00'")
            .with("dt", "'00:05:00'")
            .with("output_interval", "0000_01:00:00")
    }

    #[test]
    fn renders_all_placeholders() {
        let text = render_str(FORWARD, &forward_bindings()).expect("render");
        assert!(text.contains("config_run_duration: '0000_06:00:00'"));
        assert!(text.contains("config_dt: '00:05:00'"));
        assert!(!text.contains("{{"));
    }

    #[test]
    fn rendering_is_idempotent() {
        let template = Template::parse(FORWARD).expect("parse");
        let bindings = forward_bindings();
        let first = template.render(&bindings).expect("first");
        let second = template.render(&bindings).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let bindings = Bindings::new().with("a", "{{ b }}");
        assert_eq!(render_str("x: {{ a }}", &bindings).expect("render"), "x: {{ b }}");
    }

    #[test]
    fn missing_binding_names_placeholder() {
        let bindings = Bindings::new()
            .with("run_duration", "1")
            .with("output_interval", "2");
        let err = render_str(FORWARD, &bindings).unwrap_err();
        match &err {
            TemplateError::MissingBinding { placeholder, line } => {
                assert_eq!(placeholder, "dt");
                assert_eq!(*line, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("{{ dt }}"));
    }

    #[test]
    fn rejects_expressions() {
        let err = Template::parse("x: {{ 1 + 2 }}").unwrap_err();
        assert!(matches!(err, TemplateError::BadPlaceholder { .. }));
    }

    #[test]
    fn placeholder_pattern_is_shared_across_parses() {
        let first = Template::parse("{{ a }}").expect("first");
        let second = Template::parse("{{ a }}").expect("second");
        assert_eq!(first, second);
        assert_eq!(PLACEHOLDER.captures_iter("{{a}} and {{ b }}").count(), 2);
    }

    #[test]
    fn lists_unique_placeholders_in_order() {
        let template = Template::parse("{{ b }} {{ a }} {{ b }}").expect("parse");
        assert_eq!(template.placeholders(), vec!["b", "a"]);
    }

    #[test]
    fn scalar_formatting() {
        assert_eq!(Scalar::from(30.0).to_string(), "30.0");
        assert_eq!(Scalar::from(7i64).to_string(), "7");
        assert_eq!(Scalar::from(true).to_string(), "true");
    }

    #[test]
    fn bindings_from_config_section() {
        let config = TidewaterConfig::load_from_str(
            "[cosine_bell]\nradius = 2123000.0\nlabel = bell-${radius}\n",
        )
        .expect("config");
        let bindings = Bindings::from_section(&config, "cosine_bell").expect("bindings");
        let text = render_str("{{ label }}", &bindings).expect("render");
        assert_eq!(text, "bell-2123000.0");
    }
}
