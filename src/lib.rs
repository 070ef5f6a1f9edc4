//! banklink: audio bank event cache and reference resolver
//!
//! Mirrors the metadata of compiled audio banks into a local SQLite cache
//! and resolves event references by path or GUID against it, detecting and
//! repairing references that drifted after renames in the authoring tool.

pub mod cli;
pub mod core;
pub mod yaml;
