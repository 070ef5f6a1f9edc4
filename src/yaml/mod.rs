//! YAML helpers shared by manifest and reference-file parsing

pub mod diagnostics;

pub use diagnostics::YamlSyntaxError;
