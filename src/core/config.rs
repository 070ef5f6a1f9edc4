//! Configuration management with layered hierarchy

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::core::Project;

/// Which identifier of a reference is authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
pub enum LinkageMode {
    /// References resolve by event path; the GUID is kept in step
    #[default]
    #[serde(rename = "path")]
    #[value(name = "path")]
    ByPath,
    /// References resolve by GUID; the path is kept in step
    #[serde(rename = "guid")]
    #[value(name = "guid")]
    ById,
}

impl LinkageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkageMode::ByPath => "path",
            LinkageMode::ById => "guid",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path" => Some(LinkageMode::ByPath),
            "guid" | "id" => Some(LinkageMode::ById),
            _ => None,
        }
    }
}

impl fmt::Display for LinkageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// banklink configuration with layered hierarchy
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Folder holding the compiled banks, relative to the project root
    pub source_bank_path: Option<String>,

    /// Platform sub-folders of the build folder (empty for a flat layout)
    pub platforms: Vec<String>,

    /// Platform whose banks are scanned for metadata
    pub editor_platform: Option<String>,

    /// Authoritative identifier for event references
    pub linkage: Option<LinkageMode>,
}

impl Config {
    /// Load configuration for a project, merging in priority order
    pub fn load(project: &Project) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/banklink/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // 3. Project config (.banklink/config.yaml)
        if let Some(project_config) = Self::read_file(&project.config_path()) {
            config.merge(project_config);
        }

        // 4. Environment variables
        config.apply_env(|key| std::env::var(key).ok());

        config
    }

    fn read_file(path: &std::path::Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
                None
            }
        }
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "banklink")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("BANKLINK_BANK_PATH") {
            self.source_bank_path = Some(path);
        }
        if let Some(platform) = var("BANKLINK_PLATFORM") {
            self.editor_platform = Some(platform);
        }
        if let Some(linkage) = var("BANKLINK_LINKAGE") {
            match LinkageMode::parse(&linkage) {
                Some(mode) => self.linkage = Some(mode),
                None => tracing::warn!(value = %linkage, "ignoring unknown BANKLINK_LINKAGE"),
            }
        }
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.source_bank_path.is_some() {
            self.source_bank_path = other.source_bank_path;
        }
        if !other.platforms.is_empty() {
            self.platforms = other.platforms;
        }
        if other.editor_platform.is_some() {
            self.editor_platform = other.editor_platform;
        }
        if other.linkage.is_some() {
            self.linkage = other.linkage;
        }
    }

    /// The authoritative identifier, defaulting to path linkage
    pub fn linkage(&self) -> LinkageMode {
        self.linkage.unwrap_or_default()
    }

    /// Platform folder scanned for metadata
    ///
    /// Falls back to the first configured platform. `None` means the build
    /// folder has no platform sub-folders.
    pub fn editor_platform(&self) -> Option<&str> {
        self.editor_platform
            .as_deref()
            .or_else(|| self.platforms.first().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_linkage_defaults_to_path() {
        assert_eq!(Config::default().linkage(), LinkageMode::ByPath);
    }

    #[test]
    fn test_linkage_yaml_spelling() {
        let config: Config = serde_yml::from_str("linkage: guid\n").unwrap();
        assert_eq!(config.linkage(), LinkageMode::ById);

        let config: Config = serde_yml::from_str("linkage: path\n").unwrap();
        assert_eq!(config.linkage(), LinkageMode::ByPath);
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base: Config = serde_yml::from_str(
            "source_bank_path: Build\nplatforms: [Desktop]\nlinkage: path\n",
        )
        .unwrap();
        let over: Config = serde_yml::from_str("linkage: guid\n").unwrap();
        base.merge(over);

        assert_eq!(base.source_bank_path.as_deref(), Some("Build"));
        assert_eq!(base.platforms, vec!["Desktop".to_string()]);
        assert_eq!(base.linkage(), LinkageMode::ById);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BANKLINK_BANK_PATH", "Other/Build"),
            ("BANKLINK_LINKAGE", "GUID"),
            ("BANKLINK_PLATFORM", "Mobile"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.source_bank_path.as_deref(), Some("Other/Build"));
        assert_eq!(config.linkage(), LinkageMode::ById);
        assert_eq!(config.editor_platform(), Some("Mobile"));
    }

    #[test]
    fn test_env_ignores_unknown_linkage() {
        let mut config = Config::default();
        config.apply_env(|k| (k == "BANKLINK_LINKAGE").then(|| "sometimes".to_string()));
        assert_eq!(config.linkage, None);
    }

    #[test]
    fn test_editor_platform_falls_back_to_first_platform() {
        let config: Config =
            serde_yml::from_str("platforms: [Desktop, Mobile]\n").unwrap();
        assert_eq!(config.editor_platform(), Some("Desktop"));

        assert_eq!(Config::default().editor_platform(), None);
    }
}
