//! Fixtures shared by unit tests

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::project::{InitOptions, Project};
use crate::core::source::{
    compute_digest, BankFile, BankListing, BankMetadata, BankSource, BuildDirectory,
    MetadataSource, SourceError, DEFAULT_PLATFORM,
};
use crate::yaml::YamlSyntaxError;

/// A build folder on disk under a temporary project root
pub(crate) struct BuildFixture {
    tmp: TempDir,
    platforms: Vec<String>,
}

impl BuildFixture {
    /// `Build/` without platform sub-folders
    pub fn flat() -> Self {
        Self::with_platforms(&[])
    }

    /// `Build/<platform>/` for every platform, the first one scanned
    pub fn with_platforms(platforms: &[&str]) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let fixture = Self {
            tmp,
            platforms: platforms.iter().map(|p| p.to_string()).collect(),
        };
        fs::create_dir_all(fixture.editor_folder()).unwrap();
        fixture
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    fn editor_folder(&self) -> PathBuf {
        match self.platforms.first() {
            Some(platform) => self.root().join("Build").join(platform),
            None => self.root().join("Build"),
        }
    }

    /// Write a bank and its manifest
    pub fn bank(&self, name: &str, manifest: &str) {
        let path = self.editor_folder().join(name);
        self.raw_file(name, format!("BANK {name}").as_bytes());
        fs::write(BuildDirectory::manifest_path(&path), manifest).unwrap();
    }

    /// Write a file into the scanned folder
    pub fn raw_file(&self, name: &str, content: &[u8]) {
        let path = self.editor_folder().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Write a file into another platform's folder
    pub fn platform_file(&self, platform: &str, name: &str, content: &[u8]) {
        let path = self.root().join("Build").join(platform).join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Delete a bank and its manifest
    pub fn remove(&self, name: &str) {
        let path = self.editor_folder().join(name);
        let _ = fs::remove_file(BuildDirectory::manifest_path(&path));
        fs::remove_file(path).unwrap();
    }

    pub fn directory(&self) -> BuildDirectory {
        BuildDirectory::new(
            self.root(),
            "Build",
            self.platforms.clone(),
            self.platforms.first().cloned(),
        )
    }
}

/// Initialize a project at the fixture root pointing at its build folder
pub(crate) fn test_project(fixture: &BuildFixture) -> Project {
    let options = InitOptions {
        bank_path: Some("Build".to_string()),
        linkage: None,
    };
    Project::init(fixture.root(), &options).unwrap()
}

/// Banks and manifests held in memory
pub(crate) struct MemorySource {
    base_path: String,
    banks: BTreeMap<String, BankFile>,
    manifests: HashMap<String, String>,
}

impl MemorySource {
    pub fn new(base_path: &str) -> Self {
        Self {
            base_path: base_path.to_string(),
            banks: BTreeMap::new(),
            manifests: HashMap::new(),
        }
    }

    fn rel_path(&self, name: &str) -> String {
        format!("{}/{}", self.base_path, name)
    }

    /// Add a bank written at tick 1
    pub fn bank(mut self, name: &str, manifest: &str) -> Self {
        let rel_path = self.rel_path(name);
        let mut file_sizes = BTreeMap::new();
        file_sizes.insert(DEFAULT_PLATFORM.to_string(), manifest.len() as u64);

        self.banks.insert(
            rel_path.clone(),
            BankFile {
                path: PathBuf::from(&rel_path),
                rel_path: rel_path.clone(),
                last_modified: 1,
                file_sizes,
                digest: compute_digest(manifest.as_bytes()),
            },
        );
        self.manifests.insert(rel_path, manifest.to_string());
        self
    }

    pub fn set_manifest(&mut self, name: &str, manifest: &str) {
        let rel_path = self.rel_path(name);
        if let Some(bank) = self.banks.get_mut(&rel_path) {
            bank.digest = compute_digest(manifest.as_bytes());
        }
        self.manifests.insert(rel_path, manifest.to_string());
    }

    /// Keep the bank but lose its manifest
    pub fn drop_manifest(&mut self, name: &str) {
        let rel_path = self.rel_path(name);
        self.manifests.remove(&rel_path);
    }

    pub fn touch(&mut self, name: &str, ticks: i64) {
        let rel_path = self.rel_path(name);
        if let Some(bank) = self.banks.get_mut(&rel_path) {
            bank.last_modified = ticks;
        }
    }

    pub fn remove(&mut self, name: &str) {
        let rel_path = self.rel_path(name);
        self.banks.remove(&rel_path);
        self.manifests.remove(&rel_path);
    }
}

impl BankSource for MemorySource {
    fn list_banks(&self) -> Result<BankListing, SourceError> {
        Ok(BankListing {
            base_path: self.base_path.clone(),
            banks: self.banks.values().cloned().collect(),
        })
    }
}

impl MetadataSource for MemorySource {
    fn read_bank(&self, bank: &BankFile) -> Result<BankMetadata, SourceError> {
        let manifest = self
            .manifests
            .get(&bank.rel_path)
            .ok_or_else(|| SourceError::MissingManifest {
                bank: bank.path.clone(),
                manifest: BuildDirectory::manifest_path(&bank.path),
            })?;

        serde_yml::from_str(manifest)
            .map_err(|e| YamlSyntaxError::from_serde_error(&e, manifest, &bank.rel_path).into())
    }
}
