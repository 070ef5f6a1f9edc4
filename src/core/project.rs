//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::config::LinkageMode;

/// Marker directory holding config and cache
pub const PROJECT_DIR: &str = ".banklink";

/// Values written into a fresh config.yaml
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Build folder, relative to the project root
    pub bank_path: Option<String>,
    pub linkage: Option<LinkageMode>,
}

/// Represents a banklink project
#[derive(Debug, Clone)]
pub struct Project {
    /// Root directory of the project (parent of .banklink/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project at the given path
    pub fn init(path: &Path, options: &InitOptions) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if root.join(PROJECT_DIR).exists() {
            return Err(ProjectError::AlreadyExists(root));
        }

        Self::write_structure(root, options)
    }

    /// Force initialization even if .banklink/ exists
    pub fn init_force(path: &Path, options: &InitOptions) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self::write_structure(root, options)
    }

    fn write_structure(root: PathBuf, options: &InitOptions) -> Result<Self, ProjectError> {
        let dir = root.join(PROJECT_DIR);
        std::fs::create_dir_all(&dir).map_err(|e| ProjectError::IoError(e.to_string()))?;

        std::fs::write(dir.join("config.yaml"), Self::default_config(options))
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        // The cache is machine-local
        std::fs::write(
            dir.join(".gitignore"),
            "cache.db\ncache.db-journal\ncache.db-wal\ncache.db-shm\n",
        )
        .map_err(|e| ProjectError::IoError(e.to_string()))?;

        Ok(Self { root })
    }

    fn default_config(options: &InitOptions) -> String {
        let bank_line = match &options.bank_path {
            Some(path) => format!("source_bank_path: \"{}\"", path.replace('\\', "/")),
            None => "# source_bank_path: \"Build\"".to_string(),
        };
        let linkage_line = match options.linkage {
            Some(mode) => format!("linkage: {}", mode),
            None => "# linkage: path".to_string(),
        };

        format!(
            r#"# banklink project configuration

# Folder with the compiled banks, relative to the project root
{bank_line}

# Platform sub-folders of the build folder (leave empty for a flat layout)
# platforms: [Desktop, Mobile]

# Platform whose banks are scanned (default: first platform)
# editor_platform: Desktop

# Authoritative identifier for event references: path or guid
{linkage_line}
"#
        )
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .banklink directory
    pub fn banklink_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Project configuration file
    pub fn config_path(&self) -> PathBuf {
        self.banklink_dir().join("config.yaml")
    }

    /// Cache database file
    pub fn cache_path(&self) -> PathBuf {
        self.banklink_dir().join("cache.db")
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a banklink project (searched from {searched_from:?}). Run 'banklink init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("banklink project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_project_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path(), &InitOptions::default()).unwrap();

        assert!(project.banklink_dir().is_dir());
        assert!(project.config_path().exists());
        let ignore = std::fs::read_to_string(project.banklink_dir().join(".gitignore")).unwrap();
        assert!(ignore.contains("cache.db"));
        assert!(ignore.contains("cache.db-wal"));
    }

    #[test]
    fn test_project_init_writes_bank_path() {
        let tmp = tempdir().unwrap();
        let options = InitOptions {
            bank_path: Some("Audio\\Build".to_string()),
            linkage: Some(LinkageMode::ById),
        };
        let project = Project::init(tmp.path(), &options).unwrap();

        let config = std::fs::read_to_string(project.config_path()).unwrap();
        assert!(config.contains("source_bank_path: \"Audio/Build\""));
        assert!(config.contains("\nlinkage: guid\n"));
    }

    #[test]
    fn test_project_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path(), &InitOptions::default()).unwrap();

        let err = Project::init(tmp.path(), &InitOptions::default()).unwrap_err();
        assert!(matches!(err, ProjectError::AlreadyExists(_)));

        assert!(Project::init_force(tmp.path(), &InitOptions::default()).is_ok());
    }

    #[test]
    fn test_project_discover_finds_marker_dir() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path(), &InitOptions::default()).unwrap();

        let subdir = tmp.path().join("some/nested/dir");
        std::fs::create_dir_all(&subdir).unwrap();

        let project = Project::discover_from(&subdir).unwrap();
        assert_eq!(
            project.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_project_discover_fails_without_marker_dir() {
        let tmp = tempdir().unwrap();
        let err = Project::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }));
    }
}
