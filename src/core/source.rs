//! Bank listing and authoring metadata providers
//!
//! The cache never talks to the build pipeline directly. It consumes two
//! collaborators:
//! - [`BankSource`] lists the compiled bank files with sizes and write times
//! - [`MetadataSource`] reads the authoring-side description of one bank
//!
//! [`BuildDirectory`] implements both over a build folder on disk, reading a
//! YAML manifest (`<bank>.yaml`) exported next to every bank.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

use crate::core::cache::{normalize_path, ticks_from_system_time};
use crate::core::identity::{Guid, ParamId};
use crate::core::{Config, Project};
use crate::yaml::YamlSyntaxError;

const BANK_EXTENSION: &str = ".bank";
const STRINGS_BANK_EXTENSION: &str = ".strings.bank";
const MANIFEST_SUFFIX: &str = ".yaml";

/// Size key used when the build folder has no platform sub-folders
pub const DEFAULT_PLATFORM: &str = "default";

/// One compiled bank file found in the build folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankFile {
    /// Location on disk
    pub path: PathBuf,
    /// Normalized path relative to the project root
    pub rel_path: String,
    /// Last write time in ticks
    pub last_modified: i64,
    /// Size in bytes per platform
    pub file_sizes: BTreeMap<String, u64>,
    /// SHA-256 of the bank's manifest (empty when there is none)
    pub digest: String,
}

impl BankFile {
    pub fn file_name(&self) -> &str {
        self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path)
    }

    pub fn is_strings_bank(&self) -> bool {
        self.file_name().ends_with(STRINGS_BANK_EXTENSION)
    }

    /// File name of the master bank this strings bank belongs to
    pub fn master_bank_file_name(&self) -> Option<String> {
        self.file_name()
            .strip_suffix(STRINGS_BANK_EXTENSION)
            .map(|stem| format!("{stem}{BANK_EXTENSION}"))
    }
}

/// The banks of one build, relative to the folder they were found in
#[derive(Debug, Clone, Default)]
pub struct BankListing {
    /// Normalized folder the bank names are derived against
    pub base_path: String,
    pub banks: Vec<BankFile>,
}

/// Provider of compiled-bank listings
pub trait BankSource {
    fn list_banks(&self) -> Result<BankListing, SourceError>;
}

/// Provider of authoring-side metadata for a bank
pub trait MetadataSource {
    fn read_bank(&self, bank: &BankFile) -> Result<BankMetadata, SourceError>;
}

/// Authoring description of one bank
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BankMetadata {
    /// Bank id, used to drop duplicated strings banks
    pub id: Guid,
    /// Path of the bank in the authoring tool
    pub path: String,
    pub events: Vec<EventMetadata>,
    /// System-wide parameters (reported by master banks)
    pub global_parameters: Vec<ParamMetadata>,
}

/// Authoring description of one event
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EventMetadata {
    pub path: String,
    pub id: Guid,
    pub is_3d: bool,
    pub is_stream: bool,
    #[serde(alias = "is_oneshot")]
    pub is_one_shot: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Length in milliseconds
    pub length: u32,
    pub parameters: Vec<ParamMetadata>,
}

/// Authoring description of one parameter
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ParamMetadata {
    pub name: String,
    pub id: ParamId,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub global: bool,
    pub readonly: bool,
    pub discrete: bool,
    pub labels: Vec<String>,
}

/// Errors raised by bank and metadata providers
#[derive(Debug, Error, Diagnostic)]
pub enum SourceError {
    #[error("no bank folder configured")]
    #[diagnostic(
        code(banklink::source::not_configured),
        help("set source_bank_path in .banklink/config.yaml or BANKLINK_BANK_PATH")
    )]
    NotConfigured,

    #[error("bank folder {0:?} does not exist")]
    #[diagnostic(
        code(banklink::source::missing_folder),
        help("build the banks in the authoring tool or check source_bank_path")
    )]
    MissingFolder(PathBuf),

    #[error("bank {bank:?} has no manifest (expected {manifest:?})")]
    #[diagnostic(code(banklink::source::missing_manifest))]
    MissingManifest { bank: PathBuf, manifest: PathBuf },

    #[error("failed to read {path:?}: {source}")]
    #[diagnostic(code(banklink::source::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Manifest(#[from] YamlSyntaxError),
}

/// A build folder on disk, optionally split into platform sub-folders
#[derive(Debug, Clone)]
pub struct BuildDirectory {
    project_root: PathBuf,
    source_bank_path: PathBuf,
    platforms: Vec<String>,
    editor_platform: Option<String>,
}

impl BuildDirectory {
    pub fn new(
        project_root: &Path,
        source_bank_path: impl AsRef<Path>,
        platforms: Vec<String>,
        editor_platform: Option<String>,
    ) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            source_bank_path: project_root.join(source_bank_path),
            platforms,
            editor_platform,
        }
    }

    /// Build folder described by the project configuration
    pub fn from_config(project: &Project, config: &Config) -> Result<Self, SourceError> {
        let bank_path = config
            .source_bank_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(SourceError::NotConfigured)?;

        Ok(Self::new(
            project.root(),
            bank_path,
            config.platforms.clone(),
            config.editor_platform().map(String::from),
        ))
    }

    /// Folder whose banks are scanned for metadata
    pub fn editor_folder(&self) -> PathBuf {
        match &self.editor_platform {
            Some(platform) => self.source_bank_path.join(platform),
            None => self.source_bank_path.clone(),
        }
    }

    /// Manifest file describing a bank
    pub fn manifest_path(bank: &Path) -> PathBuf {
        let mut name = bank.as_os_str().to_os_string();
        name.push(MANIFEST_SUFFIX);
        PathBuf::from(name)
    }

    fn relative(&self, path: &Path) -> String {
        normalize_path(
            &path
                .strip_prefix(&self.project_root)
                .unwrap_or(path)
                .to_string_lossy(),
        )
    }

    fn file_sizes(&self, bank: &Path, editor_folder: &Path, editor_size: u64) -> BTreeMap<String, u64> {
        let mut sizes = BTreeMap::new();

        if self.platforms.is_empty() {
            sizes.insert(DEFAULT_PLATFORM.to_string(), editor_size);
            return sizes;
        }

        let rel = bank.strip_prefix(editor_folder).unwrap_or(bank);
        for platform in &self.platforms {
            let candidate = self.source_bank_path.join(platform).join(rel);
            if let Ok(meta) = fs::metadata(&candidate) {
                sizes.insert(platform.clone(), meta.len());
            }
        }

        sizes
    }
}

impl BankSource for BuildDirectory {
    fn list_banks(&self) -> Result<BankListing, SourceError> {
        let folder = self.editor_folder();
        if !folder.is_dir() {
            return Err(SourceError::MissingFolder(folder));
        }

        let mut banks = Vec::new();

        for entry in WalkDir::new(&folder)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy();

            // Resource forks left behind by some file systems
            if !file_name.ends_with(BANK_EXTENSION) || file_name.starts_with("._") {
                continue;
            }

            let meta = fs::metadata(path).map_err(|source| SourceError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let last_modified = meta
                .modified()
                .map(ticks_from_system_time)
                .unwrap_or(0);

            let digest = fs::read(Self::manifest_path(path))
                .map(|bytes| compute_digest(&bytes))
                .unwrap_or_default();

            banks.push(BankFile {
                path: path.to_path_buf(),
                rel_path: self.relative(path),
                last_modified,
                file_sizes: self.file_sizes(path, &folder, meta.len()),
                digest,
            });
        }

        banks.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        tracing::debug!(folder = %folder.display(), count = banks.len(), "listed banks");

        Ok(BankListing {
            base_path: self.relative(&folder),
            banks,
        })
    }
}

impl MetadataSource for BuildDirectory {
    fn read_bank(&self, bank: &BankFile) -> Result<BankMetadata, SourceError> {
        let manifest = Self::manifest_path(&bank.path);
        let content = match fs::read_to_string(&manifest) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::MissingManifest {
                    bank: bank.path.clone(),
                    manifest,
                })
            }
            Err(source) => {
                return Err(SourceError::Io {
                    path: manifest,
                    source,
                })
            }
        };

        serde_yml::from_str(&content).map_err(|e| {
            let name = manifest.file_name().map(|n| n.to_string_lossy().to_string());
            YamlSyntaxError::from_serde_error(&e, &content, name.as_deref().unwrap_or("manifest"))
                .into()
        })
    }
}

/// Compute SHA256 digest of manifest content
pub(crate) fn compute_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::BuildFixture;

    #[test]
    fn test_strings_bank_detection() {
        let bank = BankFile {
            path: PathBuf::from("Build/Desktop/Master.strings.bank"),
            rel_path: "Build/Desktop/Master.strings.bank".to_string(),
            last_modified: 0,
            file_sizes: BTreeMap::new(),
            digest: String::new(),
        };
        assert!(bank.is_strings_bank());
        assert_eq!(bank.master_bank_file_name().as_deref(), Some("Master.bank"));
    }

    #[test]
    fn test_banks_at_project_root() {
        let tmp = tempfile::tempdir().unwrap();
        for (name, manifest) in [
            ("Master.strings.bank", "path: bank:/Master.strings\n"),
            ("Master.bank", "path: bank:/Master\n"),
        ] {
            let path = tmp.path().join(name);
            fs::write(&path, format!("BANK {name}")).unwrap();
            fs::write(BuildDirectory::manifest_path(&path), manifest).unwrap();
        }

        let dir = BuildDirectory::new(tmp.path(), ".", vec![], None);
        let listing = dir.list_banks().unwrap();
        assert_eq!(listing.base_path, "");
        assert_eq!(listing.banks[0].rel_path, "Master.bank");

        let cache = crate::core::cache::build_for_tests(&dir).unwrap();
        let mut names: Vec<_> = cache.banks().iter().map(|b| b.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["Master", "Master.strings"]);
    }

    #[test]
    fn test_list_banks_flat_layout() {
        let fixture = BuildFixture::flat();
        fixture.bank("Master.strings.bank", "path: bank:/Master.strings\n");
        fixture.bank("Master.bank", "path: bank:/Master\n");
        fixture.bank("Music/Level1.bank", "path: bank:/Music/Level1\n");
        fixture.raw_file("._Master.bank", b"junk");
        fixture.raw_file("notes.txt", b"not a bank");

        let listing = fixture.directory().list_banks().unwrap();
        let paths: Vec<_> = listing.banks.iter().map(|b| b.rel_path.as_str()).collect();

        assert_eq!(listing.base_path, "Build");
        assert_eq!(
            paths,
            vec![
                "Build/Master.bank",
                "Build/Master.strings.bank",
                "Build/Music/Level1.bank"
            ]
        );
        let master = &listing.banks[0];
        assert!(master.file_sizes.contains_key(DEFAULT_PLATFORM));
        assert!(!master.digest.is_empty());
        assert!(master.last_modified > 0);
    }

    #[test]
    fn test_list_banks_collects_platform_sizes() {
        let fixture = BuildFixture::with_platforms(&["Desktop", "Mobile"]);
        fixture.bank("Master.bank", "path: bank:/Master\n");
        fixture.platform_file("Mobile", "Master.bank", &[0u8; 7]);

        let listing = fixture.directory().list_banks().unwrap();
        assert_eq!(listing.base_path, "Build/Desktop");

        let sizes = &listing.banks[0].file_sizes;
        assert!(sizes.contains_key("Desktop"));
        assert_eq!(sizes.get("Mobile"), Some(&7));
    }

    #[test]
    fn test_list_banks_missing_folder() {
        let fixture = BuildFixture::flat();
        let dir = BuildDirectory::new(fixture.root(), "Nowhere", vec![], None);
        assert!(matches!(dir.list_banks(), Err(SourceError::MissingFolder(_))));
    }

    #[test]
    fn test_read_bank_parses_manifest() {
        let fixture = BuildFixture::flat();
        fixture.bank(
            "SFX.bank",
            r#"
id: "{00000000-0000-0000-0000-000000000010}"
path: bank:/SFX
events:
  - path: event:/amb/wind
    id: "{00000000-0000-0000-0000-00000000abcd}"
    is_3d: true
    is_oneshot: true
    min_distance: 1.0
    max_distance: 25.0
    length: 1200
    parameters:
      - name: Gust
        id: [1, 2]
        min: 0.0
        max: 1.0
"#,
        );

        let dir = fixture.directory();
        let listing = dir.list_banks().unwrap();
        let meta = dir.read_bank(&listing.banks[0]).unwrap();

        assert_eq!(meta.path, "bank:/SFX");
        assert_eq!(meta.events.len(), 1);
        let event = &meta.events[0];
        assert_eq!(event.id, Guid::from_u128(0xABCD));
        assert!(event.is_3d && event.is_one_shot && !event.is_stream);
        assert_eq!(event.length, 1200);
        assert_eq!(event.parameters[0].id, ParamId::new(1, 2));
    }

    #[test]
    fn test_read_bank_missing_manifest() {
        let fixture = BuildFixture::flat();
        fixture.raw_file("Orphan.bank", b"bank");

        let dir = fixture.directory();
        let listing = dir.list_banks().unwrap();
        assert!(listing.banks[0].digest.is_empty());
        assert!(matches!(
            dir.read_bank(&listing.banks[0]),
            Err(SourceError::MissingManifest { .. })
        ));
    }

    #[test]
    fn test_read_bank_reports_yaml_errors() {
        let fixture = BuildFixture::flat();
        fixture.bank("Broken.bank", "events: [\n  - path: event:/x\n    id: {not a guid\n");

        let dir = fixture.directory();
        let listing = dir.list_banks().unwrap();
        assert!(matches!(
            dir.read_bank(&listing.banks[0]),
            Err(SourceError::Manifest(_))
        ));
    }
}
