//! Immutable cache snapshot

use std::collections::HashMap;

use super::{BankEntry, BankKey, CacheError, EventEntry, EventKey, ParamEntry, ParamKey};
use crate::core::identity::Guid;

/// Everything needed to assemble a [`Cache`]
#[derive(Debug, Default)]
pub(crate) struct CacheParts {
    pub version: u32,
    pub strings_bank_write_time: i64,
    pub banks: Vec<BankEntry>,
    pub events: Vec<EventEntry>,
    pub parameters: Vec<ParamEntry>,
    pub master_banks: Vec<BankKey>,
    pub strings_banks: Vec<BankKey>,
}

/// One generation of cached metadata
///
/// Entries live in arena vectors and refer to each other by key. A snapshot
/// never changes after construction; a rebuild produces a new one.
#[derive(Debug, Default)]
pub struct Cache {
    version: u32,
    strings_bank_write_time: i64,
    banks: Vec<BankEntry>,
    events: Vec<EventEntry>,
    parameters: Vec<ParamEntry>,
    master_banks: Vec<BankKey>,
    strings_banks: Vec<BankKey>,
    by_path: HashMap<String, EventKey>,
    by_id: HashMap<Guid, EventKey>,
}

impl Cache {
    /// A snapshot that has never been built
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate the parts and build the lookup indices
    pub(crate) fn from_parts(parts: CacheParts) -> Result<Self, CacheError> {
        let CacheParts {
            version,
            strings_bank_write_time,
            banks,
            events,
            parameters,
            master_banks,
            strings_banks,
        } = parts;

        let bank_count = banks.len();
        let check_bank = |key: &BankKey| {
            if key.0 < bank_count {
                Ok(())
            } else {
                Err(CacheError::Corrupt(format!("bank key {} out of range", key.0)))
            }
        };
        master_banks.iter().try_for_each(&check_bank)?;
        strings_banks.iter().try_for_each(&check_bank)?;

        let mut by_path: HashMap<String, EventKey> = HashMap::with_capacity(events.len());
        let mut by_id: HashMap<Guid, EventKey> = HashMap::with_capacity(events.len());

        for (index, event) in events.iter().enumerate() {
            event.validate()?;
            event.banks.iter().try_for_each(&check_bank)?;

            for key in &event.parameters {
                let param = parameters.get(key.0).ok_or_else(|| {
                    CacheError::Corrupt(format!("parameter key {} out of range", key.0))
                })?;
                param.validate(&event.path)?;
            }

            let key = EventKey(index);

            if !event.id.is_null() {
                if let Some(existing) = by_id.insert(event.id, key) {
                    return Err(CacheError::IdCollision {
                        id: event.id,
                        first: events[existing.0].path.clone(),
                        second: event.path.clone(),
                    });
                }
            }

            if let Some(existing) = by_path.insert(event.path.clone(), key) {
                return Err(CacheError::PathCollision {
                    path: event.path.clone(),
                    first: events[existing.0].id,
                    second: event.id,
                });
            }
        }

        for param in parameters.iter().filter(|p| p.is_global) {
            param.validate("global parameters")?;
        }

        Ok(Self {
            version,
            strings_bank_write_time,
            banks,
            events,
            parameters,
            master_banks,
            strings_banks,
            by_path,
            by_id,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Latest write time of any strings bank, in ticks
    pub fn strings_bank_write_time(&self) -> i64 {
        self.strings_bank_write_time
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty() && self.events.is_empty()
    }

    pub fn banks(&self) -> &[BankEntry] {
        &self.banks
    }

    pub fn events(&self) -> &[EventEntry] {
        &self.events
    }

    pub fn parameters(&self) -> &[ParamEntry] {
        &self.parameters
    }

    pub fn bank(&self, key: BankKey) -> &BankEntry {
        &self.banks[key.0]
    }

    pub fn event(&self, key: EventKey) -> &EventEntry {
        &self.events[key.0]
    }

    pub fn parameter(&self, key: ParamKey) -> &ParamEntry {
        &self.parameters[key.0]
    }

    pub fn master_banks(&self) -> impl Iterator<Item = &BankEntry> {
        self.master_banks.iter().map(|k| self.bank(*k))
    }

    pub fn strings_banks(&self) -> impl Iterator<Item = &BankEntry> {
        self.strings_banks.iter().map(|k| self.bank(*k))
    }

    pub(crate) fn master_bank_keys(&self) -> &[BankKey] {
        &self.master_banks
    }

    pub(crate) fn strings_bank_keys(&self) -> &[BankKey] {
        &self.strings_banks
    }

    pub fn bank_by_path(&self, path: &str) -> Option<&BankEntry> {
        self.banks.iter().find(|b| b.path == path)
    }

    pub(crate) fn event_key_by_path(&self, path: &str) -> Option<EventKey> {
        self.by_path.get(path).copied()
    }

    pub(crate) fn event_key_by_id(&self, id: Guid) -> Option<EventKey> {
        if id.is_null() {
            return None;
        }
        self.by_id.get(&id).copied()
    }

    /// Banks an event is compiled into
    pub fn event_banks<'a>(&'a self, event: &'a EventEntry) -> impl Iterator<Item = &'a BankEntry> {
        event.banks.iter().map(|k| self.bank(*k))
    }

    /// All parameters of an event in the order they were listed
    pub fn event_parameters<'a>(
        &'a self,
        event: &'a EventEntry,
    ) -> impl Iterator<Item = &'a ParamEntry> {
        event.parameters.iter().map(|k| self.parameter(*k))
    }

    /// Parameters owned by the event, sorted by name
    pub fn local_parameters<'a>(&'a self, event: &'a EventEntry) -> Vec<&'a ParamEntry> {
        let mut params: Vec<_> = self.event_parameters(event).filter(|p| !p.is_global).collect();
        params.sort_by(|a, b| a.name.cmp(&b.name));
        params
    }

    /// Global parameters the event reads, sorted by name
    pub fn global_parameters_of<'a>(&'a self, event: &'a EventEntry) -> Vec<&'a ParamEntry> {
        let mut params: Vec<_> = self.event_parameters(event).filter(|p| p.is_global).collect();
        params.sort_by(|a, b| a.name.cmp(&b.name));
        params
    }

    /// Every global parameter in the snapshot, sorted by name
    pub fn global_parameters(&self) -> Vec<&ParamEntry> {
        let mut params: Vec<_> = self.parameters.iter().filter(|p| p.is_global).collect();
        params.sort_by(|a, b| a.name.cmp(&b.name));
        params
    }
}
