//! CLI command implementations

pub mod bank;
pub mod cache;
pub mod completions;
pub mod config;
pub mod event;
pub mod init;
pub mod param;
pub mod refs;
pub mod resolve;
