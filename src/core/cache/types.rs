//! Cache type definitions
//!
//! Entries held by a snapshot, the keys that address them, and the stats
//! reported by the store.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::CacheError;
use crate::core::identity::{Guid, ParamId};

/// Modification times are stored as 100 ns ticks since the Unix epoch
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Convert a file time to ticks
pub fn ticks_from_system_time(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| (d.as_nanos() / 100) as i64)
        .unwrap_or(0)
}

/// Convert ticks back to a UTC timestamp for display
pub fn ticks_to_datetime(ticks: i64) -> Option<DateTime<Utc>> {
    let secs = ticks.div_euclid(TICKS_PER_SECOND);
    let nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Use forward slashes regardless of platform
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Derive a bank name from its file path
///
/// The path must lie strictly below `base_path`. The result is the
/// remainder with the last extension stripped, so
/// `Build/Desktop/Music/Level1.bank` under `Build/Desktop` is `Music/Level1`.
pub fn calculate_name(file_path: &str, base_path: &str) -> Result<String, CacheError> {
    let file = normalize_path(file_path);
    let base = normalize_path(base_path);
    let base = base.trim_end_matches('/');

    // an empty base is the project root itself
    let below_base = if base.is_empty() || base == "." {
        Some(file.strip_prefix("./").unwrap_or(&file))
    } else {
        file.strip_prefix(base).and_then(|rest| rest.strip_prefix('/'))
    };
    let remainder = below_base
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| CacheError::PathOutsideBase {
            path: file.clone(),
            base: base.to_string(),
        })?;

    let leaf_start = remainder.rfind('/').map(|i| i + 1).unwrap_or(0);
    let name = match remainder[leaf_start..].rfind('.') {
        Some(dot) if dot > 0 => &remainder[..leaf_start + dot],
        _ => remainder,
    };

    Ok(name.to_string())
}

// =========================================================================
// Keys
// =========================================================================

macro_rules! arena_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name(pub(crate) usize);

        impl $name {
            pub fn index(&self) -> usize {
                self.0
            }
        }
    };
}

arena_key!(
    /// Index of a bank within a snapshot
    BankKey
);
arena_key!(
    /// Index of an event within a snapshot
    EventKey
);
arena_key!(
    /// Index of a parameter within a snapshot
    ParamKey
);

// =========================================================================
// Entries
// =========================================================================

/// How a parameter's value space is shaped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    #[default]
    Continuous,
    Discrete,
    Labeled,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::Continuous => "continuous",
            ParameterKind::Discrete => "discrete",
            ParameterKind::Labeled => "labeled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "continuous" => Some(ParameterKind::Continuous),
            "discrete" => Some(ParameterKind::Discrete),
            "labeled" => Some(ParameterKind::Labeled),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One controllable parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamEntry {
    pub name: String,
    pub id: ParamId,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub kind: ParameterKind,
    pub labels: Vec<String>,
    pub is_global: bool,
    /// False for a parameter carried over from the previous build
    pub exists: bool,
}

impl ParamEntry {
    pub(crate) fn validate(&self, owner: &str) -> Result<(), CacheError> {
        let reason = if self.min > self.max {
            Some(format!("min {} is greater than max {}", self.min, self.max))
        } else if self.default < self.min || self.default > self.max {
            Some(format!(
                "default {} is outside [{}, {}]",
                self.default, self.min, self.max
            ))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(CacheError::InvalidParameter {
                name: self.name.clone(),
                owner: owner.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// One compiled bank
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankEntry {
    /// Normalized path relative to the project root
    pub path: String,
    pub name: String,
    pub studio_path: String,
    pub file_sizes: BTreeMap<String, u64>,
    /// Ticks
    pub last_modified: i64,
    pub exists: bool,
    #[serde(skip)]
    pub manifest_digest: String,
}

impl BankEntry {
    /// Create an entry for a bank file found below `base_path`
    pub fn new(path: &str, base_path: &str) -> Result<Self, CacheError> {
        Ok(Self {
            path: normalize_path(path),
            name: calculate_name(path, base_path)?,
            studio_path: String::new(),
            file_sizes: BTreeMap::new(),
            last_modified: 0,
            exists: true,
            manifest_digest: String::new(),
        })
    }

    /// Last segment of the bank name
    pub fn leaf_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Record the bank's path in the authoring tool
    ///
    /// Localized banks report the studio path of the source locale; when
    /// the file's own leaf name is missing from it the leaf replaces the
    /// last segment.
    pub fn set_studio_path(&mut self, studio_path: &str) {
        let leaf = self.leaf_name();

        self.studio_path = if studio_path.contains(leaf) {
            studio_path.to_string()
        } else {
            let dir_end = studio_path.rfind('/').map(|i| i + 1).unwrap_or(0);
            format!("{}{}", &studio_path[..dir_end], leaf)
        };
    }

    pub fn last_modified_utc(&self) -> Option<DateTime<Utc>> {
        ticks_to_datetime(self.last_modified)
    }
}

/// One playable event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEntry {
    pub path: String,
    pub id: Guid,
    pub banks: Vec<BankKey>,
    pub parameters: Vec<ParamKey>,
    pub is_3d: bool,
    pub is_stream: bool,
    pub is_one_shot: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Milliseconds, only meaningful for one-shots
    pub length: u32,
}

impl EventEntry {
    pub(crate) fn validate(&self) -> Result<(), CacheError> {
        if self.min_distance > self.max_distance {
            return Err(CacheError::InvalidEvent {
                path: self.path.clone(),
                min_distance: self.min_distance,
                max_distance: self.max_distance,
            });
        }
        if self.banks.is_empty() {
            return Err(CacheError::Corrupt(format!(
                "event {} belongs to no bank",
                self.path
            )));
        }
        Ok(())
    }
}

// =========================================================================
// Stats
// =========================================================================

/// Statistics from a rebuild
#[derive(Debug, Default, Clone, Serialize)]
pub struct RebuildStats {
    pub banks: usize,
    pub events: usize,
    pub parameters: usize,
    pub stale_parameters: usize,
    pub skipped_strings_banks: usize,
    pub duration_ms: u64,
}

/// Cache statistics
#[derive(Debug, Default, Serialize)]
pub struct CacheStats {
    pub version: u32,
    pub banks: usize,
    pub master_banks: usize,
    pub strings_banks: usize,
    pub events: usize,
    pub parameters: usize,
    pub global_parameters: usize,
    pub stale_parameters: usize,
    pub strings_bank_write_time: Option<DateTime<Utc>>,
    pub built_at: Option<String>,
    pub db_size_bytes: u64,
}

/// Why a refresh rebuilt the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RebuildReason {
    NeverBuilt,
    VersionMismatch { found: u32 },
    MissingFiles { count: usize },
    StringsBankChanged,
    BanksChanged { count: usize },
    Forced,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildReason::NeverBuilt => write!(f, "cache has never been built"),
            RebuildReason::VersionMismatch { found } => {
                write!(f, "cache version {found} is out of date")
            }
            RebuildReason::MissingFiles { count } => {
                write!(f, "{count} cached bank file(s) are missing")
            }
            RebuildReason::StringsBankChanged => write!(f, "strings bank changed"),
            RebuildReason::BanksChanged { count } => {
                write!(f, "{count} bank(s) added or modified")
            }
            RebuildReason::Forced => write!(f, "rebuild requested"),
        }
    }
}

/// Result of a refresh
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    UpToDate,
    Rebuilt {
        reason: RebuildReason,
        stats: RebuildStats,
    },
}
