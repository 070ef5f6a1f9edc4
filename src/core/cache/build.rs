//! Cache rebuild from a bank listing
//!
//! Builds a complete new snapshot off to the side. Nothing here touches the
//! published snapshot or the database; a failure leaves both as they were.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::snapshot::CacheParts;
use super::{
    BankEntry, BankKey, Cache, CacheError, EventEntry, EventKey, ParamEntry, ParamKey,
    ParameterKind, RebuildReason, RebuildStats, CACHE_VERSION,
};
use crate::core::identity::{Guid, ParamId};
use crate::core::source::{
    BankFile, BankListing, BankMetadata, EventMetadata, MetadataSource, ParamMetadata,
};

/// Build a new snapshot from the listing and the banks' metadata
///
/// `previous` is only consulted to carry stale parameters forward.
pub(crate) fn build(
    listing: &BankListing,
    metadata: &dyn MetadataSource,
    previous: &Cache,
) -> Result<(Cache, RebuildStats), CacheError> {
    let start = Instant::now();
    let mut stats = RebuildStats::default();

    let mut files: Vec<&BankFile> = listing
        .banks
        .iter()
        .filter(|b| !b.file_name().starts_with("._"))
        .collect();
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    let (strings, others): (Vec<&BankFile>, Vec<&BankFile>) =
        files.into_iter().partition(|b| b.is_strings_bank());

    if strings.is_empty() {
        return Err(CacheError::NoStringsBank);
    }

    let strings_bank_write_time = strings
        .iter()
        .map(|b| b.last_modified)
        .max()
        .unwrap_or(0);

    let mut loaded: Vec<(&BankFile, BankMetadata)> = Vec::with_capacity(strings.len() + others.len());
    let mut master_paths = HashSet::new();
    let mut seen_ids = HashSet::new();

    for file in strings {
        let meta = metadata.read_bank(file)?;

        // A cloned project extended with a new master bank ships the old
        // strings bank too
        if !meta.id.is_null() && !seen_ids.insert(meta.id) {
            tracing::warn!(bank = %file.rel_path, id = %meta.id, "ignoring strings bank with duplicate id");
            stats.skipped_strings_banks += 1;
            continue;
        }

        if let Some(master) = file.master_bank_file_name() {
            master_paths.insert(sibling_path(&file.rel_path, &master));
        }
        loaded.push((file, meta));
    }

    for file in others {
        let meta = metadata.read_bank(file)?;
        loaded.push((file, meta));
    }

    loaded.sort_by(|a, b| a.0.rel_path.cmp(&b.0.rel_path));

    let mut builder = Builder::new(&listing.base_path);
    for (file, meta) in &loaded {
        let is_master = master_paths.contains(&file.rel_path);
        builder.add_bank(file, meta, is_master)?;
    }

    stats.stale_parameters = builder.carry_stale(previous);

    let parts = CacheParts {
        version: CACHE_VERSION,
        strings_bank_write_time,
        banks: builder.banks,
        events: builder.events,
        parameters: builder.parameters,
        master_banks: builder.master_banks,
        strings_banks: builder.strings_banks,
    };
    let cache = Cache::from_parts(parts)?;

    stats.banks = cache.banks().len();
    stats.events = cache.events().len();
    stats.parameters = cache.parameters().len();
    stats.duration_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        banks = stats.banks,
        events = stats.events,
        parameters = stats.parameters,
        stale = stats.stale_parameters,
        "built cache snapshot"
    );

    Ok((cache, stats))
}

/// Decide whether the snapshot is out of date with the listing
pub(crate) fn stale_reason(cache: &Cache, listing: &BankListing) -> Option<RebuildReason> {
    if cache.version() == 0 {
        return Some(RebuildReason::NeverBuilt);
    }
    if cache.version() != CACHE_VERSION {
        return Some(RebuildReason::VersionMismatch {
            found: cache.version(),
        });
    }

    let listed: HashMap<&str, &BankFile> = listing
        .banks
        .iter()
        .filter(|b| !b.file_name().starts_with("._"))
        .map(|b| (b.rel_path.as_str(), b))
        .collect();

    let missing = cache
        .banks()
        .iter()
        .filter(|b| b.exists && !listed.contains_key(b.path.as_str()))
        .count();
    if missing > 0 {
        return Some(RebuildReason::MissingFiles { count: missing });
    }

    let strings_time = listed
        .values()
        .filter(|b| b.is_strings_bank())
        .map(|b| b.last_modified)
        .max()
        .unwrap_or(0);
    if strings_time != cache.strings_bank_write_time() {
        return Some(RebuildReason::StringsBankChanged);
    }

    let cached: HashMap<&str, &BankEntry> = cache
        .banks()
        .iter()
        .map(|b| (b.path.as_str(), b))
        .collect();

    let changed = listed
        .values()
        .filter(|file| match cached.get(file.rel_path.as_str()) {
            Some(bank) => {
                bank.last_modified != file.last_modified || bank.manifest_digest != file.digest
            }
            // Skipped duplicate strings banks are never cached
            None => !file.is_strings_bank(),
        })
        .count();
    if changed > 0 {
        return Some(RebuildReason::BanksChanged { count: changed });
    }

    None
}

fn sibling_path(path: &str, file_name: &str) -> String {
    match path.rfind('/') {
        Some(i) => format!("{}/{}", &path[..i], file_name),
        None => file_name.to_string(),
    }
}

fn param_entry(meta: &ParamMetadata, is_global: bool) -> ParamEntry {
    let kind = if !meta.labels.is_empty() {
        ParameterKind::Labeled
    } else if meta.discrete {
        ParameterKind::Discrete
    } else {
        ParameterKind::Continuous
    };

    ParamEntry {
        name: meta.name.clone(),
        id: meta.id,
        min: meta.min,
        max: meta.max,
        default: meta.default,
        kind,
        labels: meta.labels.clone(),
        is_global,
        exists: true,
    }
}

struct Builder<'a> {
    base_path: &'a str,
    banks: Vec<BankEntry>,
    events: Vec<EventEntry>,
    parameters: Vec<ParamEntry>,
    master_banks: Vec<BankKey>,
    strings_banks: Vec<BankKey>,
    events_by_id: HashMap<Guid, EventKey>,
    events_by_path: HashMap<String, EventKey>,
    globals: HashMap<ParamId, ParamKey>,
}

impl<'a> Builder<'a> {
    fn new(base_path: &'a str) -> Self {
        Self {
            base_path,
            banks: Vec::new(),
            events: Vec::new(),
            parameters: Vec::new(),
            master_banks: Vec::new(),
            strings_banks: Vec::new(),
            events_by_id: HashMap::new(),
            events_by_path: HashMap::new(),
            globals: HashMap::new(),
        }
    }

    fn add_bank(
        &mut self,
        file: &BankFile,
        meta: &BankMetadata,
        is_master: bool,
    ) -> Result<(), CacheError> {
        let mut bank = BankEntry::new(&file.rel_path, self.base_path)?;
        bank.set_studio_path(&meta.path);
        bank.file_sizes = file.file_sizes.clone();
        bank.last_modified = file.last_modified;
        bank.manifest_digest = file.digest.clone();

        let key = BankKey(self.banks.len());
        self.banks.push(bank);

        if is_master {
            self.master_banks.push(key);
        }
        if file.is_strings_bank() {
            self.strings_banks.push(key);
        }

        tracing::debug!(
            bank = %file.rel_path,
            events = meta.events.len(),
            master = is_master,
            "adding bank"
        );

        for event in &meta.events {
            self.add_event(key, event)?;
        }

        let owner = format!("bank {}", file.rel_path);
        for param in &meta.global_parameters {
            self.add_global(param, &owner)?;
        }

        Ok(())
    }

    fn add_event(&mut self, bank: BankKey, meta: &EventMetadata) -> Result<(), CacheError> {
        let existing = if meta.id.is_null() {
            self.events_by_path.get(&meta.path).copied()
        } else {
            self.events_by_id
                .get(&meta.id)
                .or_else(|| self.events_by_path.get(&meta.path))
                .copied()
        };

        if let Some(key) = existing {
            let entry = &mut self.events[key.0];
            if entry.path != meta.path {
                return Err(CacheError::IdCollision {
                    id: meta.id,
                    first: entry.path.clone(),
                    second: meta.path.clone(),
                });
            }
            if entry.id != meta.id {
                return Err(CacheError::PathCollision {
                    path: meta.path.clone(),
                    first: entry.id,
                    second: meta.id,
                });
            }
            if !entry.banks.contains(&bank) {
                entry.banks.push(bank);
            }
            return Ok(());
        }

        let mut parameters = Vec::with_capacity(meta.parameters.len());
        for param in &meta.parameters {
            if param.readonly && !param.global {
                continue;
            }
            let key = if param.global {
                self.add_global(param, &meta.path)?
            } else {
                self.push_param(param_entry(param, false), &meta.path)?
            };
            if !parameters.contains(&key) {
                parameters.push(key);
            }
        }

        let entry = EventEntry {
            path: meta.path.clone(),
            id: meta.id,
            banks: vec![bank],
            parameters,
            is_3d: meta.is_3d,
            is_stream: meta.is_stream,
            is_one_shot: meta.is_one_shot,
            min_distance: meta.min_distance,
            max_distance: meta.max_distance,
            length: meta.length,
        };
        entry.validate()?;

        let key = EventKey(self.events.len());
        if !entry.id.is_null() {
            self.events_by_id.insert(entry.id, key);
        }
        self.events_by_path.insert(entry.path.clone(), key);
        self.events.push(entry);

        Ok(())
    }

    /// Global parameters are shared by id
    fn add_global(&mut self, meta: &ParamMetadata, owner: &str) -> Result<ParamKey, CacheError> {
        if let Some(key) = self.globals.get(&meta.id) {
            return Ok(*key);
        }
        let key = self.push_param(param_entry(meta, true), owner)?;
        self.globals.insert(meta.id, key);
        Ok(key)
    }

    fn push_param(&mut self, param: ParamEntry, owner: &str) -> Result<ParamKey, CacheError> {
        param.validate(owner)?;
        let key = ParamKey(self.parameters.len());
        self.parameters.push(param);
        Ok(key)
    }

    fn push_stale(&mut self, previous: &ParamEntry) -> ParamKey {
        tracing::warn!(parameter = %previous.name, id = %previous.id, "keeping removed parameter as stale");

        let key = ParamKey(self.parameters.len());
        self.parameters.push(ParamEntry {
            exists: false,
            ..previous.clone()
        });
        if previous.is_global {
            self.globals.insert(previous.id, key);
        }
        key
    }

    fn find_event(&self, previous: &EventEntry) -> Option<EventKey> {
        if previous.id.is_null() {
            self.events_by_path.get(&previous.path).copied()
        } else {
            self.events_by_id.get(&previous.id).copied()
        }
    }

    /// Carry parameters that disappeared since the previous generation
    ///
    /// They stay for exactly one generation with `exists = false`.
    fn carry_stale(&mut self, previous: &Cache) -> usize {
        let before = self.parameters.len();

        for prev_event in previous.events() {
            let Some(key) = self.find_event(prev_event) else {
                continue;
            };

            for prev_param in previous.event_parameters(prev_event) {
                if !prev_param.exists {
                    continue;
                }

                let listed = self.events[key.0].parameters.iter().any(|k| {
                    let p = &self.parameters[k.0];
                    p.id == prev_param.id && p.is_global == prev_param.is_global
                });
                if listed {
                    continue;
                }

                let stale = if prev_param.is_global {
                    match self.globals.get(&prev_param.id).copied() {
                        Some(k) if self.parameters[k.0].exists => continue,
                        Some(k) => k,
                        None => self.push_stale(prev_param),
                    }
                } else {
                    self.push_stale(prev_param)
                };
                self.events[key.0].parameters.push(stale);
            }
        }

        let paths: HashSet<&str> = self.banks.iter().map(|b| b.path.as_str()).collect();
        let masters_present = previous
            .master_banks()
            .any(|b| paths.contains(b.path.as_str()));

        if masters_present {
            for prev_param in previous.global_parameters() {
                if prev_param.exists && !self.globals.contains_key(&prev_param.id) {
                    self.push_stale(prev_param);
                }
            }
        }

        self.parameters.len() - before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::BankSource;
    use crate::core::test_support::MemorySource;

    const STRINGS: &str = "id: \"{00000000-0000-0000-0000-0000000000aa}\"\npath: bank:/Master.strings\n";

    const MASTER: &str = r#"
path: bank:/Master
events:
  - path: event:/amb/wind
    id: "{00000000-0000-0000-0000-00000000abcd}"
    min_distance: 1.0
    max_distance: 20.0
    parameters:
      - { name: Wind, id: [0, 1], min: 0.0, max: 1.0 }
      - { name: Direction, id: [0, 2], min: 0.0, max: 360.0, readonly: true }
      - { name: TimeOfDay, id: [9, 9], min: 0.0, max: 24.0, global: true }
global_parameters:
  - { name: TimeOfDay, id: [9, 9], min: 0.0, max: 24.0, global: true }
  - { name: Weather, id: [9, 8], min: 0.0, max: 3.0, global: true, labels: [Sun, Rain, Snow, Fog] }
"#;

    const SFX: &str = r#"
path: bank:/SFX
events:
  - path: event:/amb/wind
    id: "{00000000-0000-0000-0000-00000000abcd}"
    min_distance: 1.0
    max_distance: 20.0
  - path: event:/ui/click
    id: "{00000000-0000-0000-0000-000000001234}"
    is_one_shot: true
    length: 150
"#;

    fn source() -> MemorySource {
        MemorySource::new("Build")
            .bank("Master.strings.bank", STRINGS)
            .bank("Master.bank", MASTER)
            .bank("SFX.bank", SFX)
    }

    fn build_from(source: &MemorySource, previous: &Cache) -> Result<(Cache, RebuildStats), CacheError> {
        build(&source.list_banks().unwrap(), source, previous)
    }

    #[test]
    fn test_build_merges_events_across_banks() {
        let (cache, stats) = build_from(&source(), &Cache::empty()).unwrap();

        assert_eq!(cache.version(), CACHE_VERSION);
        assert_eq!(stats.banks, 3);
        assert_eq!(stats.events, 2);

        let wind = cache.event(cache.event_key_by_path("event:/amb/wind").unwrap());
        let banks: Vec<_> = cache.event_banks(wind).map(|b| b.name.as_str()).collect();
        assert_eq!(banks, vec!["Master", "SFX"]);

        let masters: Vec<_> = cache.master_banks().map(|b| b.path.as_str()).collect();
        assert_eq!(masters, vec!["Build/Master.bank"]);
        let strings: Vec<_> = cache.strings_banks().map(|b| b.path.as_str()).collect();
        assert_eq!(strings, vec!["Build/Master.strings.bank"]);
        assert_eq!(cache.strings_bank_write_time(), 1);
    }

    #[test]
    fn test_every_event_is_indexed_both_ways() {
        let (cache, _) = build_from(&source(), &Cache::empty()).unwrap();

        for (i, event) in cache.events().iter().enumerate() {
            assert_eq!(cache.event_key_by_id(event.id), Some(EventKey(i)));
            assert_eq!(cache.event_key_by_path(&event.path), Some(EventKey(i)));
        }
    }

    #[test]
    fn test_readonly_local_parameters_are_skipped() {
        let (cache, _) = build_from(&source(), &Cache::empty()).unwrap();
        let wind = cache.event(cache.event_key_by_path("event:/amb/wind").unwrap());

        let local: Vec<_> = cache.local_parameters(wind).iter().map(|p| p.name.as_str()).collect();
        assert_eq!(local, vec!["Wind"]);
    }

    #[test]
    fn test_global_parameters_are_shared() {
        let (cache, _) = build_from(&source(), &Cache::empty()).unwrap();
        let wind = cache.event(cache.event_key_by_path("event:/amb/wind").unwrap());

        let globals = cache.global_parameters();
        let names: Vec<_> = globals.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["TimeOfDay", "Weather"]);
        assert_eq!(globals[1].kind, ParameterKind::Labeled);

        let event_global = cache.global_parameters_of(wind)[0];
        assert!(std::ptr::eq(event_global, globals[0]));
    }

    #[test]
    fn test_build_without_strings_bank_fails() {
        let source = MemorySource::new("Build").bank("SFX.bank", SFX);
        assert!(matches!(
            build_from(&source, &Cache::empty()),
            Err(CacheError::NoStringsBank)
        ));
    }

    #[test]
    fn test_duplicate_strings_bank_is_ignored() {
        let source = source()
            .bank("Old.strings.bank", STRINGS)
            .bank("Old.bank", "path: bank:/Old\n");

        let (cache, stats) = build_from(&source, &Cache::empty()).unwrap();
        assert_eq!(stats.skipped_strings_banks, 1);
        assert_eq!(cache.strings_banks().count(), 1);
        assert_eq!(cache.master_banks().count(), 1);
        assert!(cache.bank_by_path("Build/Old.bank").is_some());
        assert!(cache.bank_by_path("Build/Old.strings.bank").is_none());
    }

    #[test]
    fn test_id_collision_rejects_build() {
        let source = source().bank(
            "Extra.bank",
            "events:\n  - path: event:/amb/gust\n    id: \"{00000000-0000-0000-0000-00000000abcd}\"\n",
        );
        assert!(matches!(
            build_from(&source, &Cache::empty()),
            Err(CacheError::IdCollision { .. })
        ));
    }

    #[test]
    fn test_path_collision_rejects_build() {
        let source = source().bank(
            "Extra.bank",
            "events:\n  - path: event:/ui/click\n    id: \"{00000000-0000-0000-0000-000000009999}\"\n",
        );
        assert!(matches!(
            build_from(&source, &Cache::empty()),
            Err(CacheError::PathCollision { .. })
        ));
    }

    #[test]
    fn test_invalid_parameter_rejects_build() {
        let source = source().bank(
            "Extra.bank",
            "events:\n  - path: event:/x\n    id: \"{00000000-0000-0000-0000-000000000077}\"\n    parameters:\n      - { name: Bad, id: [4, 4], min: 2.0, max: 1.0 }\n",
        );
        assert!(matches!(
            build_from(&source, &Cache::empty()),
            Err(CacheError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_missing_manifest_fails_build() {
        let mut source = source();
        source.drop_manifest("SFX.bank");
        assert!(matches!(
            build_from(&source, &Cache::empty()),
            Err(CacheError::Source(_))
        ));
    }

    #[test]
    fn test_removed_parameters_survive_one_generation() {
        let (first, _) = build_from(&source(), &Cache::empty()).unwrap();

        let mut source = source();
        source.set_manifest("Master.bank", &MASTER.replace("      - { name: Wind, id: [0, 1], min: 0.0, max: 1.0 }\n", ""));

        let (second, stats) = build_from(&source, &first).unwrap();
        assert_eq!(stats.stale_parameters, 1);

        let wind = second.event(second.event_key_by_path("event:/amb/wind").unwrap());
        let local = second.local_parameters(wind);
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].name, "Wind");
        assert!(!local[0].exists);

        let (third, stats) = build_from(&source, &second).unwrap();
        assert_eq!(stats.stale_parameters, 0);
        let wind = third.event(third.event_key_by_path("event:/amb/wind").unwrap());
        assert!(third.local_parameters(wind).is_empty());
    }

    #[test]
    fn test_removed_global_parameter_is_stale() {
        let (first, _) = build_from(&source(), &Cache::empty()).unwrap();

        let mut source = source();
        source.set_manifest(
            "Master.bank",
            &MASTER.replace(
                "  - { name: Weather, id: [9, 8], min: 0.0, max: 3.0, global: true, labels: [Sun, Rain, Snow, Fog] }\n",
                "",
            ),
        );

        let (second, _) = build_from(&source, &first).unwrap();
        let weather = second
            .global_parameters()
            .into_iter()
            .find(|p| p.name == "Weather")
            .unwrap();
        assert!(!weather.exists);
    }

    #[test]
    fn test_events_of_removed_banks_are_dropped() {
        let (first, _) = build_from(&source(), &Cache::empty()).unwrap();

        let mut source = source();
        source.remove("SFX.bank");
        let (second, _) = build_from(&source, &first).unwrap();

        assert!(second.event_key_by_path("event:/ui/click").is_none());
        let wind = second.event(second.event_key_by_path("event:/amb/wind").unwrap());
        assert_eq!(wind.banks.len(), 1);
    }

    #[test]
    fn test_stale_reason_tracks_listing_changes() {
        let mut source = source();
        let listing = source.list_banks().unwrap();
        assert_eq!(
            stale_reason(&Cache::empty(), &listing),
            Some(RebuildReason::NeverBuilt)
        );

        let (cache, _) = build(&listing, &source, &Cache::empty()).unwrap();
        assert_eq!(stale_reason(&cache, &listing), None);

        source.set_manifest("SFX.bank", "path: bank:/SFX\n");
        assert_eq!(
            stale_reason(&cache, &source.list_banks().unwrap()),
            Some(RebuildReason::BanksChanged { count: 1 })
        );

        source.touch("Master.strings.bank", 50);
        assert_eq!(
            stale_reason(&cache, &source.list_banks().unwrap()),
            Some(RebuildReason::StringsBankChanged)
        );

        source.remove("SFX.bank");
        assert_eq!(
            stale_reason(&cache, &source.list_banks().unwrap()),
            Some(RebuildReason::MissingFiles { count: 1 })
        );
    }
}
