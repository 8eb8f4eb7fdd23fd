//! Fortran-style namelist files: ingest defaults, apply replacements, write.

use crate::TemplateError;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Option name to namelist literal.
pub type Replacements = BTreeMap<String, String>;

/// One `&record ... /` group, options in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamelistRecord {
    pub name: String,
    pub options: Vec<(String, String)>,
}

impl NamelistRecord {
    fn get(&self, option: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(key, _)| key == option)
            .map(|(_, value)| value.as_str())
    }

    fn set(&mut self, option: &str, value: &str) -> bool {
        match self.options.iter_mut().find(|(key, _)| key == option) {
            Some((_, existing)) => {
                *existing = value.to_string();
                true
            }
            None => false,
        }
    }
}

/// An ordered set of namelist records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namelist {
    records: Vec<NamelistRecord>,
}

impl Namelist {
    /// Ingest a defaults namelist.
    ///
    /// A line containing `&` starts a record; `option = value` lines inside a
    /// record become options. Other lines are ignored.
    pub fn parse(text: &str) -> Self {
        let mut records: Vec<NamelistRecord> = Vec::new();
        for line in text.lines() {
            if line.contains('&') {
                let name = line.trim().trim_start_matches('&').trim().to_string();
                records.push(NamelistRecord {
                    name,
                    options: Vec::new(),
                });
            } else if let Some((option, value)) = line.split_once('=') {
                match records.last_mut() {
                    Some(record) => record
                        .options
                        .push((option.trim().to_string(), value.trim().to_string())),
                    None => debug!("ignoring namelist option outside a record: {}", line.trim()),
                }
            }
        }
        Self { records }
    }

    /// Ingest a defaults namelist from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn records(&self) -> &[NamelistRecord] {
        &self.records
    }

    /// The value of `option` in `record`.
    pub fn get(&self, record: &str, option: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|entry| entry.name == record)
            .and_then(|entry| entry.get(option))
    }

    /// Apply replacements to every record that holds the option.
    ///
    /// Returns the replacement names that matched no record; each one is
    /// also logged as a warning.
    pub fn replace(&mut self, replacements: &Replacements) -> Vec<String> {
        let mut unused = Vec::new();
        for (option, value) in replacements {
            let mut used = false;
            for record in &mut self.records {
                used |= record.set(option, value);
            }
            if !used {
                warn!("{option} is not in the namelist and the replacement will not be used");
                unused.push(option.clone());
            }
        }
        unused
    }

    /// Render as namelist text.
    pub fn write(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            let _ = writeln!(out, "&{}", record.name);
            for (option, value) in &record.options {
                let _ = writeln!(out, "    {option} = {value}");
            }
            out.push_str("/\n");
        }
        out
    }

    /// Write namelist text to disk.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<(), TemplateError> {
        fs::write(path, self.write())?;
        Ok(())
    }
}

/// Read `option = value` replacement lines.
pub fn parse_replacements(text: &str) -> Replacements {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(option, value)| (option.trim().to_string(), value.trim().to_string()))
        .filter(|(option, _)| !option.is_empty())
        .collect()
}
