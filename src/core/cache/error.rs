//! Cache errors

use miette::Diagnostic;
use thiserror::Error;

use crate::core::identity::Guid;
use crate::core::source::SourceError;

/// Errors raised while building or loading a cache snapshot
#[derive(Debug, Error, Diagnostic)]
pub enum CacheError {
    #[error("no strings bank found in the build folder")]
    #[diagnostic(
        code(banklink::cache::no_strings_bank),
        help("build the master bank in the authoring tool so a *.strings.bank is produced")
    )]
    NoStringsBank,

    #[error("bank {path} is not inside {base}")]
    #[diagnostic(code(banklink::cache::path_outside_base))]
    PathOutsideBase { path: String, base: String },

    #[error("GUID {id} is used by both {first} and {second}")]
    #[diagnostic(
        code(banklink::cache::id_collision),
        help("two events share a GUID; re-export the banks from a consistent project")
    )]
    IdCollision {
        id: Guid,
        first: String,
        second: String,
    },

    #[error("event path {path} has two GUIDs: {first} and {second}")]
    #[diagnostic(code(banklink::cache::path_collision))]
    PathCollision {
        path: String,
        first: Guid,
        second: Guid,
    },

    #[error("parameter '{name}' of {owner} is invalid: {reason}")]
    #[diagnostic(code(banklink::cache::invalid_parameter))]
    InvalidParameter {
        name: String,
        owner: String,
        reason: String,
    },

    #[error("event {path} has min_distance {min_distance} greater than max_distance {max_distance}")]
    #[diagnostic(code(banklink::cache::invalid_event))]
    InvalidEvent {
        path: String,
        min_distance: f32,
        max_distance: f32,
    },

    #[error("cache database is inconsistent: {0}")]
    #[diagnostic(
        code(banklink::cache::corrupt),
        help("run 'banklink cache rebuild'")
    )]
    Corrupt(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] SourceError),
}
