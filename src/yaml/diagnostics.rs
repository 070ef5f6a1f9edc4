//! YAML error diagnostics for bank manifests and reference files

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// YAML parse error with source location
#[derive(Debug, Error, Diagnostic)]
#[error("invalid YAML in {file}: {message}")]
#[diagnostic(code(banklink::yaml::syntax))]
pub struct YamlSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("error here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    file: String,

    /// The underlying error message
    message: String,
}

impl YamlSyntaxError {
    /// Create a parse error from a serde_yml error
    pub fn from_serde_error(err: &serde_yml::Error, source: &str, filename: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));

        let offset = line_col_to_offset(source, line, column);
        let message = err.to_string();
        let help = generate_help(&message);

        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1)),
            help,
            file: filename.to_string(),
            message,
        }
    }
}

/// Byte offset of a 1-based line/column, clamped to the source length
fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();

    let column_offset = source[line_start.min(source.len())..]
        .char_indices()
        .nth(column.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);

    (line_start + column_offset).min(source.len().saturating_sub(1))
}

/// Message fragments and the hint shown for them, first match wins
const HINTS: &[(&str, &str)] = &[
    (
        "guid",
        "GUIDs are quoted strings: guid: \"{01234567-89ab-cdef-0011-223344556677}\"",
    ),
    (
        "invalid length 1",
        "Parameter ids are two 32-bit words: id: [1234, 5678]",
    ),
    (
        "expected a sequence",
        "Reference files are lists of records: - { name: x, path: event:/x, guid: \"\" }",
    ),
    (
        "tab",
        "YAML indents with spaces, not tabs",
    ),
    (
        "duplicate key",
        "Each key may appear once per record",
    ),
    (
        "mapping values are not allowed",
        "Check the indentation, or add a space after ':'",
    ),
    (
        "found unexpected ':'",
        "Quote values containing colons, e.g. path: \"event:/amb/wind\"",
    ),
    (
        "expected ','",
        "Separate flow items with commas: [a, b]",
    ),
];

fn generate_help(message: &str) -> Option<String> {
    let lower = message.to_lowercase();
    HINTS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, hint)| hint.to_string())
}
