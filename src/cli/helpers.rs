//! Shared helper functions for CLI commands
//!
//! Project discovery, cache opening and value formatting used across
//! command modules.

use chrono::{DateTime, Local};
use miette::Result;
use serde::Serialize;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::cache::{ticks_to_datetime, CacheStore};
use crate::core::config::{Config, LinkageMode};
use crate::core::project::Project;
use crate::core::source::{BuildDirectory, SourceError};

/// Locate the project from `--project` or the current directory
pub fn discover_project(global: &GlobalOpts) -> Result<Project> {
    let project = match &global.project {
        Some(path) => Project::discover_from(path),
        None => Project::discover(),
    };
    project.map_err(|e| miette::miette!("{}", e))
}

/// Linkage mode after applying the `--linkage` override
pub fn linkage(global: &GlobalOpts, config: &Config) -> LinkageMode {
    global.linkage.unwrap_or_else(|| config.linkage())
}

/// Open the cache, refreshing it from the build folder when one is configured
pub fn open_cache(project: &Project, config: &Config) -> Result<CacheStore> {
    match BuildDirectory::from_config(project, config) {
        Ok(dir) => CacheStore::open(project, &dir, &dir),
        Err(SourceError::NotConfigured) => {
            tracing::warn!("no bank folder configured, using the cache as is");
            CacheStore::open_without_refresh(project)
        }
        Err(e) => Err(e.into()),
    }
}

/// Print a value as JSON or YAML
pub fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|e| miette::miette!("failed to serialize output: {}", e))?,
        _ => serde_yml::to_string(value)
            .map_err(|e| miette::miette!("failed to serialize output: {}", e))?,
    };
    println!("{}", text.trim_end());
    Ok(())
}

/// Format a tick timestamp in local time
pub fn format_ticks(ticks: i64) -> String {
    match ticks_to_datetime(ticks) {
        Some(dt) if ticks > 0 => {
            let local: DateTime<Local> = dt.with_timezone(&Local);
            local.format("%Y-%m-%d %H:%M:%S").to_string()
        }
        _ => "-".to_string(),
    }
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Truncate a string to max_len, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Escape a string for CSV output
///
/// Handles commas, quotes, and newlines according to RFC 4180.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::TICKS_PER_SECOND;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_ticks() {
        assert_eq!(format_ticks(0), "-");
        assert_eq!(format_ticks(1_700_000_000 * TICKS_PER_SECOND).len(), 19);
    }
}
