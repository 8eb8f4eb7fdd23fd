//! Model input/output stream definitions and the streams XML writer.

use crate::TemplateError;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

/// Whether a stream can be changed at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stream,
    Immutable,
}

impl StreamKind {
    /// XML tag for this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            StreamKind::Stream => "stream",
            StreamKind::Immutable => "immutable_stream",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Kind of a stream member, in the order members are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemberKind {
    Stream,
    VarStruct,
    VarArray,
    Var,
}

impl MemberKind {
    pub const ALL: [MemberKind; 4] = [
        MemberKind::Stream,
        MemberKind::VarStruct,
        MemberKind::VarArray,
        MemberKind::Var,
    ];

    /// XML tag for this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            MemberKind::Stream => "stream",
            MemberKind::VarStruct => "var_struct",
            MemberKind::VarArray => "var_array",
            MemberKind::Var => "var",
        }
    }

    /// Parse an XML/YAML tag name.
    pub fn from_tag(tag: &str) -> Option<Self> {
        MemberKind::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A variable, variable group or nested stream included in a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMember {
    pub kind: MemberKind,
    pub name: String,
    /// Model packages that must be active for the member to be written.
    pub packages: Option<String>,
}

impl StreamMember {
    /// A plain `var` member.
    pub fn var(name: impl Into<String>) -> Self {
        Self {
            kind: MemberKind::Var,
            name: name.into(),
            packages: None,
        }
    }
}

/// A named model input/output channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDefinition {
    pub name: String,
    pub kind: StreamKind,
    /// Attributes such as `filename_template`, `type`, `output_interval`.
    pub attributes: Vec<(String, String)>,
    pub members: Vec<StreamMember>,
}

impl StreamDefinition {
    pub fn new(name: impl Into<String>, kind: StreamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attributes: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set or add an attribute, keeping the original position when present.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Whether the `type` attribute mentions output.
    pub fn is_output(&self) -> bool {
        self.attribute("type")
            .is_some_and(|value| value.contains("output"))
    }

    fn merge_members(&mut self, members: Vec<StreamMember>) -> Result<(), TemplateError> {
        for member in members {
            let Some(idx) = self.members.iter().position(|entry| entry.name == member.name)
            else {
                self.members.push(member);
                continue;
            };
            let existing = &mut self.members[idx];
            if existing.kind != member.kind {
                return Err(TemplateError::KindMismatch {
                    name: member.name,
                    existing: existing.kind.to_string(),
                    new: member.kind.to_string(),
                });
            }
            if member.packages.is_some() {
                existing.packages = member.packages;
            }
        }
        Ok(())
    }
}

/// How members of an updated stream combine with the existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberMerge {
    /// Keep existing members and add new ones.
    Append,
    /// When the update lists members, they replace the existing ones.
    Replace,
}

/// An ordered collection of stream definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSet {
    streams: Vec<StreamDefinition>,
}

impl StreamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streams(&self) -> &[StreamDefinition] {
        &self.streams
    }

    pub fn get(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|stream| stream.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Add or update one stream by name.
    ///
    /// Attributes of the update overwrite existing ones; members combine per
    /// `merge`. A kind mismatch for the same name is an error.
    pub fn upsert(
        &mut self,
        stream: StreamDefinition,
        merge: MemberMerge,
    ) -> Result<(), TemplateError> {
        let Some(idx) = self
            .streams
            .iter()
            .position(|entry| entry.name == stream.name)
        else {
            self.streams.push(stream);
            return Ok(());
        };
        let existing = &mut self.streams[idx];

        if existing.kind != stream.kind {
            return Err(TemplateError::KindMismatch {
                name: stream.name,
                existing: existing.kind.to_string(),
                new: stream.kind.to_string(),
            });
        }
        for (name, value) in stream.attributes {
            existing.set_attribute(&name, value);
        }
        if merge == MemberMerge::Replace && !stream.members.is_empty() {
            existing.members.clear();
        }
        existing.merge_members(stream.members)
    }

    /// Apply every stream in `other` with `upsert`.
    pub fn update(&mut self, other: StreamSet, merge: MemberMerge) -> Result<(), TemplateError> {
        for stream in other.streams {
            self.upsert(stream, merge)?;
        }
        Ok(())
    }

    /// Set `io_type` on output streams that do not already have one.
    pub fn set_default_io_type(&mut self, io_type: &str) {
        for stream in &mut self.streams {
            if stream.is_output() && stream.attribute("io_type").is_none() {
                stream.set_attribute("io_type", io_type);
            }
        }
    }

    /// Render as a `<streams>` XML document.
    ///
    /// Immutable streams come first; stream members are grouped by kind.
    pub fn write_xml(&self) -> String {
        let mut out = String::from("<streams>\n");

        for stream in self
            .streams
            .iter()
            .filter(|stream| stream.kind == StreamKind::Immutable)
        {
            out.push('\n');
            let _ = write!(out, "<immutable_stream name=\"{}\"", escape(&stream.name));
            for (name, value) in &stream.attributes {
                let _ = write!(out, "\n                  {name}=\"{}\"", escape(value));
            }
            out.push_str("/>\n");
        }

        for stream in self
            .streams
            .iter()
            .filter(|stream| stream.kind == StreamKind::Stream)
        {
            out.push('\n');
            let _ = write!(out, "<stream name=\"{}\"", escape(&stream.name));
            for (name, value) in &stream.attributes {
                let _ = write!(out, "\n        {name}=\"{}\"", escape(value));
            }
            out.push_str(">\n\n");

            for kind in MemberKind::ALL {
                for member in stream.members.iter().filter(|member| member.kind == kind) {
                    if kind == MemberKind::Stream && member.name == stream.name {
                        continue;
                    }
                    let _ = write!(out, "    <{} name=\"{}\"", kind.tag(), escape(&member.name));
                    if let Some(packages) = &member.packages {
                        let _ = write!(out, " packages=\"{}\"", escape(packages));
                    }
                    out.push_str("/>\n");
                }
            }

            out.push_str("</stream>\n");
        }

        out.push_str("\n</streams>\n");
        out
    }

    /// Write the XML document to disk.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<(), TemplateError> {
        fs::write(path, self.write_xml())?;
        Ok(())
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
