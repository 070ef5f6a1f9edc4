//! Core module - cache, resolution and project plumbing

pub mod cache;
pub mod config;
pub mod identity;
pub mod project;
pub mod references;
pub mod resolver;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{Cache, CacheError, CacheStore, RebuildReason, RefreshOutcome, CACHE_VERSION};
pub use config::{Config, LinkageMode};
pub use identity::{Guid, IdParseError, ParamId};
pub use project::{InitOptions, Project, ProjectError};
pub use resolver::{MismatchInfo, Reference, ReferenceStatus, Repair, Resolver};
pub use source::{BankSource, BuildDirectory, MetadataSource, SourceError};
