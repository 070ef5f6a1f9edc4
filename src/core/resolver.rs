//! Dual-key event resolution
//!
//! A [`Reference`] names an event by path and by GUID. Only one of the two is
//! authoritative, chosen by [`LinkageMode`]; the other is kept in step. The
//! resolver finds the event a reference points at, reports when the secondary
//! key has drifted, and detects events renamed in the authoring tool.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::cache::{Cache, EventEntry};
use crate::core::config::LinkageMode;
use crate::core::identity::Guid;

/// A caller-held pointer to an event
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub path: String,
    #[serde(default, rename = "guid")]
    pub id: Guid,
}

impl Reference {
    pub fn new(path: impl Into<String>, id: Guid) -> Self {
        Self {
            path: path.into(),
            id,
        }
    }

    /// A reference to the given event with both keys in step
    pub fn to_event(event: &EventEntry) -> Self {
        Self::new(event.path.clone(), event.id)
    }

    /// At least one of the keys is set
    pub fn is_well_formed(&self) -> bool {
        !self.path.is_empty() || !self.id.is_null()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.path.is_empty(), self.id.is_null()) {
            (false, true) => write!(f, "{}", self.path),
            (true, false) => write!(f, "{}", self.id),
            _ => write!(f, "{} {}", self.path, self.id),
        }
    }
}

/// What a repair changes on the reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "set", content = "value", rename_all = "snake_case")]
pub enum Repair {
    #[serde(rename = "guid")]
    SetId(Guid),
    #[serde(rename = "path")]
    SetPath(String),
}

impl Repair {
    pub fn apply(&self, reference: &mut Reference) {
        match self {
            Repair::SetId(id) => reference.id = *id,
            Repair::SetPath(path) => reference.path = path.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// The GUID does not match the event found by path
    IdMismatch,
    /// The path does not match the event found by GUID
    PathMismatch,
    /// The path no longer exists but the GUID resolves elsewhere
    Moved,
}

/// A detected divergence and the action that repairs it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MismatchInfo {
    pub kind: MismatchKind,
    pub repair: Repair,
}

impl MismatchInfo {
    /// Short message for list views
    pub fn message(&self) -> String {
        match (&self.kind, &self.repair) {
            (MismatchKind::IdMismatch, _) => "GUID doesn't match path".to_string(),
            (MismatchKind::PathMismatch, _) => "Path doesn't match GUID".to_string(),
            (MismatchKind::Moved, Repair::SetPath(path)) => format!("Moved to {path}"),
            (MismatchKind::Moved, Repair::SetId(_)) => "Moved".to_string(),
        }
    }

    /// Longer explanation of what the repair will do
    pub fn tooltip(&self) -> String {
        match &self.repair {
            Repair::SetId(id) => format!("This will change the GUID to {id}"),
            Repair::SetPath(path) => format!("This will change the path to {path}"),
        }
    }
}

/// Overall state of a reference
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceStatus<'a> {
    /// Neither key is set
    Malformed,
    Valid(&'a EventEntry),
    Mismatch(MismatchInfo),
    Moved(MismatchInfo),
    NotFound,
}

impl ReferenceStatus<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            ReferenceStatus::Malformed => "malformed",
            ReferenceStatus::Valid(_) => "valid",
            ReferenceStatus::Mismatch(_) => "mismatch",
            ReferenceStatus::Moved(_) => "moved",
            ReferenceStatus::NotFound => "not found",
        }
    }

    /// The repair for this status, if one exists
    pub fn repair_info(&self) -> Option<&MismatchInfo> {
        match self {
            ReferenceStatus::Mismatch(info) | ReferenceStatus::Moved(info) => Some(info),
            _ => None,
        }
    }
}

/// Lookups against one snapshot under one linkage mode
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    cache: &'a Cache,
    linkage: LinkageMode,
}

impl<'a> Resolver<'a> {
    pub fn new(cache: &'a Cache, linkage: LinkageMode) -> Self {
        Self { cache, linkage }
    }

    pub fn linkage(&self) -> LinkageMode {
        self.linkage
    }

    pub fn cache(&self) -> &'a Cache {
        self.cache
    }

    /// Exact, case-sensitive path lookup
    pub fn find_by_path(&self, path: &str) -> Option<&'a EventEntry> {
        self.cache
            .event_key_by_path(path)
            .map(|key| self.cache.event(key))
    }

    /// GUID lookup; the null GUID never resolves
    pub fn find_by_id(&self, id: Guid) -> Option<&'a EventEntry> {
        self.cache.event_key_by_id(id).map(|key| self.cache.event(key))
    }

    /// Look up a path, or a GUID when the text starts with `{`
    pub fn find(&self, path_or_guid: &str) -> Option<&'a EventEntry> {
        if path_or_guid.starts_with('{') {
            Guid::parse(path_or_guid)
                .ok()
                .and_then(|id| self.find_by_id(id))
        } else {
            self.find_by_path(path_or_guid)
        }
    }

    /// The key actually used for a reference
    ///
    /// Falls back to the other key when the authoritative one is empty.
    pub fn effective_linkage(&self, reference: &Reference) -> LinkageMode {
        match self.linkage {
            LinkageMode::ByPath if reference.path.is_empty() && !reference.id.is_null() => {
                LinkageMode::ById
            }
            LinkageMode::ById if reference.id.is_null() && !reference.path.is_empty() => {
                LinkageMode::ByPath
            }
            mode => mode,
        }
    }

    /// The event a reference points at
    pub fn resolve(&self, reference: &Reference) -> Option<&'a EventEntry> {
        match self.effective_linkage(reference) {
            LinkageMode::ByPath => self.find_by_path(&reference.path),
            LinkageMode::ById => self.find_by_id(reference.id),
        }
    }

    /// Report when the non-authoritative key disagrees with the event
    pub fn detect_mismatch(&self, reference: &Reference) -> Option<MismatchInfo> {
        let entry = self.resolve(reference)?;

        match self.effective_linkage(reference) {
            LinkageMode::ByPath if reference.id != entry.id => Some(MismatchInfo {
                kind: MismatchKind::IdMismatch,
                repair: Repair::SetId(entry.id),
            }),
            LinkageMode::ById if reference.path != entry.path => Some(MismatchInfo {
                kind: MismatchKind::PathMismatch,
                repair: Repair::SetPath(entry.path.clone()),
            }),
            _ => None,
        }
    }

    /// Find the event a path-linked reference was renamed to
    pub fn detect_rename(&self, reference: &Reference) -> Option<&'a EventEntry> {
        if self.effective_linkage(reference) != LinkageMode::ByPath || reference.id.is_null() {
            return None;
        }

        self.find_by_id(reference.id)
            .filter(|entry| entry.path != reference.path)
    }

    /// Classify a reference
    pub fn check(&self, reference: &Reference) -> ReferenceStatus<'a> {
        if !reference.is_well_formed() {
            return ReferenceStatus::Malformed;
        }

        if let Some(entry) = self.resolve(reference) {
            return match self.detect_mismatch(reference) {
                Some(info) => ReferenceStatus::Mismatch(info),
                None => ReferenceStatus::Valid(entry),
            };
        }

        match self.detect_rename(reference) {
            Some(entry) => ReferenceStatus::Moved(MismatchInfo {
                kind: MismatchKind::Moved,
                repair: Repair::SetPath(entry.path.clone()),
            }),
            None => ReferenceStatus::NotFound,
        }
    }

    /// Apply a repair to the caller's reference
    pub fn repair(&self, reference: &mut Reference, info: &MismatchInfo) {
        tracing::debug!(reference = %reference, repair = ?info.repair, "repairing reference");
        info.repair.apply(reference);
    }
}
