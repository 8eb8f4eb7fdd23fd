//! Template rendering and model input files.
//!
//! Renders `{{ name }}` templates, decodes the rendered model YAML into
//! namelist overrides and stream definitions, and writes the namelist and
//! streams files read by the ocean model.

pub mod error;
pub mod model_yaml;
pub mod namelist;
pub mod render;
pub mod streams;

/// Template error type.
pub use error::TemplateError;
/// Decoded model YAML.
pub use model_yaml::{ModelConfig, namelist_literal};
/// Namelist model and replacement helpers.
pub use namelist::{Namelist, NamelistRecord, Replacements, parse_replacements};
/// Placeholder templates and bindings.
pub use render::{Bindings, Scalar, Template, render_str};
/// Stream definitions and XML writer.
pub use streams::{
    MemberKind, MemberMerge, StreamDefinition, StreamKind, StreamMember, StreamSet,
};
