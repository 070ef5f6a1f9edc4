//! Reference files
//!
//! Projects keep event references in `*.refs.yaml` files, each a list of
//! `{ name, path, guid }` records. [`scan`] checks every record against a
//! snapshot and collects the repairs; [`apply`] writes them back, touching
//! each file once.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::core::project::PROJECT_DIR;
use crate::core::resolver::{MismatchInfo, Reference, ReferenceStatus, Resolver};
use crate::yaml::YamlSyntaxError;

pub const REFERENCE_FILE_SUFFIX: &str = ".refs.yaml";

/// One named reference in a reference file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub reference: Reference,
}

/// A reference file loaded from disk
#[derive(Debug, Clone)]
pub struct ReferenceFile {
    pub path: PathBuf,
    pub records: Vec<ReferenceRecord>,
}

impl ReferenceFile {
    pub fn load(path: &Path) -> Result<Self, ReferenceFileError> {
        let content = fs::read_to_string(path).map_err(|source| ReferenceFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let records = if content.trim().is_empty() {
            Vec::new()
        } else {
            serde_yml::from_str(&content).map_err(|e| {
                YamlSyntaxError::from_serde_error(&e, &content, &path.to_string_lossy())
            })?
        };

        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn save(&self) -> Result<(), ReferenceFileError> {
        let yaml = serde_yml::to_string(&self.records).map_err(|e| ReferenceFileError::Serialize {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        fs::write(&self.path, yaml).map_err(|source| ReferenceFileError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// A record that can be repaired
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceTask {
    pub file: PathBuf,
    pub index: usize,
    pub name: String,
    pub reference: Reference,
    pub info: MismatchInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    Malformed,
    NotFound,
}

impl ProblemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemKind::Malformed => "no path or GUID",
            ProblemKind::NotFound => "event not found",
        }
    }
}

/// A record that cannot be repaired automatically
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceProblem {
    pub file: PathBuf,
    pub index: usize,
    pub name: String,
    pub reference: Reference,
    pub kind: ProblemKind,
}

/// Result of scanning reference files
#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    pub files: usize,
    pub records: usize,
    pub tasks: Vec<ReferenceTask>,
    pub problems: Vec<ReferenceProblem>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.tasks.is_empty() && self.problems.is_empty()
    }
}

/// Statistics from applying repairs
#[derive(Debug, Default, Serialize)]
pub struct ApplyStats {
    pub files_changed: usize,
    pub records_changed: usize,
    pub records_skipped: usize,
}

/// Errors reading or writing reference files
#[derive(Debug, Error, Diagnostic)]
pub enum ReferenceFileError {
    #[error("failed to access {path:?}: {source}")]
    #[diagnostic(code(banklink::refs::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Yaml(#[from] YamlSyntaxError),

    #[error("failed to serialize {path:?}: {message}")]
    #[diagnostic(code(banklink::refs::serialize))]
    Serialize { path: PathBuf, message: String },
}

/// Find every reference file below `root`, skipping the project directory
pub fn discover(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != PROJECT_DIR)
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(REFERENCE_FILE_SUFFIX))
        .map(|e| e.into_path())
        .collect();

    files.sort();
    files
}

/// Check every record of the given files
pub fn scan(files: &[PathBuf], resolver: &Resolver<'_>) -> Result<ScanReport, ReferenceFileError> {
    let mut report = ScanReport::default();

    for path in files {
        let file = ReferenceFile::load(path)?;
        report.files += 1;

        for (index, record) in file.records.iter().enumerate() {
            report.records += 1;

            let status = resolver.check(&record.reference);
            if let Some(info) = status.repair_info() {
                report.tasks.push(ReferenceTask {
                    file: path.clone(),
                    index,
                    name: record.name.clone(),
                    reference: record.reference.clone(),
                    info: info.clone(),
                });
                continue;
            }

            let kind = match status {
                ReferenceStatus::Malformed => ProblemKind::Malformed,
                ReferenceStatus::NotFound => ProblemKind::NotFound,
                _ => continue,
            };
            report.problems.push(ReferenceProblem {
                file: path.clone(),
                index,
                name: record.name.clone(),
                reference: record.reference.clone(),
                kind,
            });
        }
    }

    tracing::debug!(
        files = report.files,
        records = report.records,
        tasks = report.tasks.len(),
        problems = report.problems.len(),
        "scanned reference files"
    );

    Ok(report)
}

/// Apply the repairs, rewriting each affected file once
///
/// A record that changed on disk since the scan is left alone.
pub fn apply(
    tasks: &[ReferenceTask],
    resolver: &Resolver<'_>,
    dry_run: bool,
) -> Result<ApplyStats, ReferenceFileError> {
    let mut stats = ApplyStats::default();

    let mut by_file: BTreeMap<&Path, Vec<&ReferenceTask>> = BTreeMap::new();
    for task in tasks {
        by_file.entry(task.file.as_path()).or_default().push(task);
    }

    for (path, tasks) in by_file {
        let mut file = ReferenceFile::load(path)?;
        let mut changed = 0;

        for task in tasks {
            match file.records.get_mut(task.index) {
                Some(record) if record.reference == task.reference => {
                    resolver.repair(&mut record.reference, &task.info);
                    changed += 1;
                }
                _ => {
                    tracing::warn!(file = %path.display(), record = %task.name, "record changed since scan, skipping");
                    stats.records_skipped += 1;
                }
            }
        }

        if changed == 0 {
            continue;
        }

        if !dry_run {
            file.save()?;
        }
        stats.files_changed += 1;
        stats.records_changed += changed;
    }

    Ok(stats)
}
