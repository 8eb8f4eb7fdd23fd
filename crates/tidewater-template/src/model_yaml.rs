//! Rendered model YAML: namelist overrides plus stream definitions.
//!
//! The expected layout is a single top-level key naming the model, holding
//! namelist records and an optional `streams` mapping:
//!
//! ```yaml
//! ocean:
//!   time_integration:
//!     config_dt: '00:05:00'
//!   streams:
//!     output:
//!       type: output
//!       filename_template: output.nc
//!       contents:
//!       - xtime
//!       - var_array: tracers
//!         packages: tracersPKG
//! ```

use crate::namelist::Replacements;
use crate::streams::{MemberKind, MemberMerge, StreamDefinition, StreamKind, StreamMember, StreamSet};
use crate::TemplateError;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Namelist overrides and streams decoded from one YAML document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelConfig {
    /// Top-level key of the document.
    pub model: String,
    /// Record name to option replacements.
    pub records: BTreeMap<String, Replacements>,
    pub streams: StreamSet,
}

impl ModelConfig {
    /// Decode a rendered YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, TemplateError> {
        let value: Value = serde_yaml::from_str(text)?;
        let root = expect_mapping(&value, "")?;
        if root.len() != 1 {
            return Err(invalid("", "expected a single top-level model key"));
        }
        let Some((model_key, body)) = root.iter().next() else {
            return Err(invalid("", "empty document"));
        };
        let model = key_string(model_key, "")?;
        let body = expect_mapping(body, &model)?;

        let mut config = ModelConfig {
            model: model.clone(),
            ..ModelConfig::default()
        };
        for (key, value) in body {
            let key = key_string(key, &model)?;
            let path = format!("{model}.{key}");
            if key == "streams" {
                for (name, stream) in expect_mapping(value, &path)? {
                    let name = key_string(name, &path)?;
                    let stream_path = format!("{path}.{name}");
                    let definition = decode_stream(&name, stream, &stream_path)?;
                    config.streams.upsert(definition, MemberMerge::Replace)?;
                }
            } else {
                let options = config.records.entry(key).or_default();
                for (option, literal) in expect_mapping(value, &path)? {
                    let option = key_string(option, &path)?;
                    let literal = namelist_literal(literal, &format!("{path}.{option}"))?;
                    options.insert(option, literal);
                }
            }
        }
        Ok(config)
    }

    /// All namelist replacements, regardless of record.
    pub fn replacements(&self) -> Replacements {
        self.records
            .values()
            .flat_map(|options| options.iter())
            .map(|(option, value)| (option.clone(), value.clone()))
            .collect()
    }

    /// Layer another document on top of this one.
    pub fn merge(&mut self, other: ModelConfig) -> Result<(), TemplateError> {
        for (record, options) in other.records {
            self.records.entry(record).or_default().extend(options);
        }
        self.streams.update(other.streams, MemberMerge::Replace)
    }
}

/// Convert a YAML scalar into a namelist literal.
///
/// Booleans become `.true.`/`.false.`, strings are single-quoted unless they
/// already are, numbers are written as-is.
pub fn namelist_literal(value: &Value, path: &str) -> Result<String, TemplateError> {
    match value {
        Value::Bool(true) => Ok(".true.".to_string()),
        Value::Bool(false) => Ok(".false.".to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::String(text) => {
            if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
                Ok(text.clone())
            } else {
                Ok(format!("'{}'", text.replace('\'', "''")))
            }
        }
        _ => Err(invalid(path, "namelist options must be scalars")),
    }
}

fn decode_stream(name: &str, value: &Value, path: &str) -> Result<StreamDefinition, TemplateError> {
    let map = expect_mapping(value, path)?;
    let immutable = match map.get("immutable") {
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return Err(invalid(&format!("{path}.immutable"), "expected a boolean")),
        None => false,
    };
    let kind = if immutable {
        StreamKind::Immutable
    } else {
        StreamKind::Stream
    };
    let mut stream = StreamDefinition::new(name, kind);

    for (key, value) in map {
        let key = key_string(key, path)?;
        match key.as_str() {
            "immutable" => {}
            "contents" => {
                let contents_path = format!("{path}.contents");
                let Value::Sequence(entries) = value else {
                    return Err(invalid(&contents_path, "expected a list"));
                };
                for (idx, entry) in entries.iter().enumerate() {
                    let member = decode_member(entry, &format!("{contents_path}[{idx}]"))?;
                    stream.members.push(member);
                }
            }
            _ => {
                let attr = scalar_string(value, &format!("{path}.{key}"))?;
                stream.set_attribute(&key, attr);
            }
        }
    }
    Ok(stream)
}

fn decode_member(value: &Value, path: &str) -> Result<StreamMember, TemplateError> {
    match value {
        Value::String(name) => Ok(StreamMember::var(name.clone())),
        Value::Mapping(map) => {
            let mut member: Option<StreamMember> = None;
            let mut packages = None;
            for (key, value) in map {
                let key = key_string(key, path)?;
                if key == "packages" {
                    packages = Some(scalar_string(value, &format!("{path}.packages"))?);
                    continue;
                }
                let Some(kind) = MemberKind::from_tag(&key) else {
                    return Err(invalid(path, &format!("unknown member kind {key:?}")));
                };
                if member.is_some() {
                    return Err(invalid(path, "member lists more than one kind"));
                }
                member = Some(StreamMember {
                    kind,
                    name: scalar_string(value, &format!("{path}.{key}"))?,
                    packages: None,
                });
            }
            let mut member = member.ok_or_else(|| invalid(path, "member has no kind"))?;
            member.packages = packages;
            Ok(member)
        }
        _ => Err(invalid(path, "expected a variable name or a mapping")),
    }
}

fn expect_mapping<'a>(value: &'a Value, path: &str) -> Result<&'a Mapping, TemplateError> {
    value
        .as_mapping()
        .ok_or_else(|| invalid(path, "expected a mapping"))
}

fn key_string(key: &Value, path: &str) -> Result<String, TemplateError> {
    key.as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(path, "keys must be strings"))
}

fn scalar_string(value: &Value, path: &str) -> Result<String, TemplateError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err(invalid(path, "expected a scalar")),
    }
}

fn invalid(path: &str, message: &str) -> TemplateError {
    let path = if path.is_empty() { "<root>" } else { path };
    TemplateError::InvalidModelYaml {
        path: path.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{ModelConfig, namelist_literal};
    use crate::streams::{MemberKind, StreamKind};
    use pretty_assertions::assert_eq;
    use serde_yaml::Value;

    const FORWARD: &str = r#"
ocean:
  time_management:
    config_run_duration: 0000_06:00:00
    config_do_restart: false
  time_integration:
    config_dt: '00:05:00'
    config_btr_dt_fraction: 0.1
  streams:
    mesh:
      immutable: true
      type: input
      filename_template: init.nc
    output:
      type: output
      filename_template: output.nc
      output_interval: 0000_01:00:00
      contents:
      - xtime
      - var_array: tracers
        packages: tracersPKG
"#;

    #[test]
    fn decodes_records_and_streams() {
        let config = ModelConfig::from_yaml(FORWARD).expect("decode");
        assert_eq!(config.model, "ocean");
        let replacements = config.replacements();
        assert_eq!(replacements["config_run_duration"], "'0000_06:00:00'");
        assert_eq!(replacements["config_do_restart"], ".false.");
        assert_eq!(replacements["config_dt"], "'00:05:00'");
        assert_eq!(replacements["config_btr_dt_fraction"], "0.1");

        let mesh = config.streams.get("mesh").expect("mesh");
        assert_eq!(mesh.kind, StreamKind::Immutable);
        let output = config.streams.get("output").expect("output");
        assert_eq!(output.attribute("output_interval"), Some("0000_01:00:00"));
        assert_eq!(output.members.len(), 2);
        assert_eq!(output.members[1].kind, MemberKind::VarArray);
        assert_eq!(output.members[1].packages.as_deref(), Some("tracersPKG"));
    }

    #[test]
    fn merge_replaces_stream_contents() {
        let mut base = ModelConfig::from_yaml(FORWARD).expect("base");
        let overlay = ModelConfig::from_yaml(
            "ocean:\n  time_integration:\n    config_dt: '00:01:00'\n  streams:\n    output:\n      contents:\n      - ssh\n",
        )
        .expect("overlay");
        base.merge(overlay).expect("merge");
        assert_eq!(base.replacements()["config_dt"], "'00:01:00'");
        let output = base.streams.get("output").expect("output");
        assert_eq!(output.members.len(), 1);
        assert_eq!(output.members[0].name, "ssh");
        assert_eq!(output.attribute("filename_template"), Some("output.nc"));
    }

    #[test]
    fn rejects_multiple_models() {
        let err = ModelConfig::from_yaml("ocean: {}\nseaice: {}\n").unwrap_err();
        assert!(err.to_string().contains("single top-level"));
    }

    #[test]
    fn rejects_nested_namelist_values() {
        let err = ModelConfig::from_yaml("ocean:\n  rec:\n    opt: [1, 2]\n").unwrap_err();
        assert!(err.to_string().contains("ocean.rec.opt"));
    }

    #[test]
    fn literal_quoting() {
        assert_eq!(
            namelist_literal(&Value::String("it's".to_string()), "x").expect("lit"),
            "'it''s'"
        );
        assert_eq!(
            namelist_literal(&Value::String("'done'".to_string()), "x").expect("lit"),
            "'done'"
        );
    }
}
