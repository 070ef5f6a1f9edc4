//! Saving and loading snapshots

use chrono::Utc;
use miette::{IntoDiagnostic, Result};
use rusqlite::{params, OptionalExtension};

use super::snapshot::CacheParts;
use super::{
    BankEntry, BankKey, Cache, CacheError, CacheStore, EventEntry, ParamEntry, ParamKey,
    ParameterKind, CACHE_VERSION,
};
use crate::core::identity::{Guid, ParamId};

/// What the database holds
pub(super) enum Loaded {
    /// Tables exist but no snapshot was ever saved
    Empty,
    /// Written by a different cache version
    Outdated { found: u32 },
    Ready(Cache),
}

impl CacheStore {
    /// Replace the persisted snapshot in one transaction
    pub(super) fn save(&mut self, cache: &Cache) -> Result<()> {
        let tx = self.conn.transaction().into_diagnostic()?;

        tx.execute_batch(
            r#"
            DELETE FROM event_parameters;
            DELETE FROM event_banks;
            DELETE FROM events;
            DELETE FROM parameters;
            DELETE FROM bank_file_sizes;
            DELETE FROM banks;
            DELETE FROM cache_meta;
            DELETE FROM schema_version;
            "#,
        )
        .into_diagnostic()?;

        {
            let mut insert_bank = tx
                .prepare(
                    "INSERT INTO banks (key, path, name, studio_path, last_modified, present,
                        is_master, is_strings, manifest_digest)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .into_diagnostic()?;
            let mut insert_size = tx
                .prepare("INSERT INTO bank_file_sizes (bank_key, platform, size) VALUES (?1, ?2, ?3)")
                .into_diagnostic()?;

            for (key, bank) in cache.banks().iter().enumerate() {
                let is_master = cache.master_bank_keys().contains(&BankKey(key));
                let is_strings = cache.strings_bank_keys().contains(&BankKey(key));
                insert_bank
                    .execute(params![
                        key as i64,
                        bank.path,
                        bank.name,
                        bank.studio_path,
                        bank.last_modified,
                        bank.exists,
                        is_master,
                        is_strings,
                        bank.manifest_digest,
                    ])
                    .into_diagnostic()?;

                for (platform, size) in &bank.file_sizes {
                    insert_size
                        .execute(params![key as i64, platform, *size as i64])
                        .into_diagnostic()?;
                }
            }

            let mut insert_param = tx
                .prepare(
                    "INSERT INTO parameters (key, name, data1, data2, min_value, max_value,
                        default_value, kind, labels, is_global, present)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                )
                .into_diagnostic()?;

            for (key, param) in cache.parameters().iter().enumerate() {
                let labels = serde_json::to_string(&param.labels).into_diagnostic()?;
                insert_param
                    .execute(params![
                        key as i64,
                        param.name,
                        param.id.data1,
                        param.id.data2,
                        param.min as f64,
                        param.max as f64,
                        param.default as f64,
                        param.kind.as_str(),
                        labels,
                        param.is_global,
                        param.exists,
                    ])
                    .into_diagnostic()?;
            }

            let mut insert_event = tx
                .prepare(
                    "INSERT INTO events (key, path, guid, is_3d, is_stream, is_one_shot,
                        min_distance, max_distance, length)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .into_diagnostic()?;
            let mut insert_event_bank = tx
                .prepare("INSERT INTO event_banks (event_key, bank_key, position) VALUES (?1, ?2, ?3)")
                .into_diagnostic()?;
            let mut insert_event_param = tx
                .prepare(
                    "INSERT INTO event_parameters (event_key, param_key, position) VALUES (?1, ?2, ?3)",
                )
                .into_diagnostic()?;

            for (key, event) in cache.events().iter().enumerate() {
                insert_event
                    .execute(params![
                        key as i64,
                        event.path,
                        event.id.to_string(),
                        event.is_3d,
                        event.is_stream,
                        event.is_one_shot,
                        event.min_distance as f64,
                        event.max_distance as f64,
                        event.length,
                    ])
                    .into_diagnostic()?;

                for (position, bank) in event.banks.iter().enumerate() {
                    insert_event_bank
                        .execute(params![key as i64, bank.0 as i64, position as i64])
                        .into_diagnostic()?;
                }
                for (position, param) in event.parameters.iter().enumerate() {
                    insert_event_param
                        .execute(params![key as i64, param.0 as i64, position as i64])
                        .into_diagnostic()?;
                }
            }
        }

        tx.execute(
            "INSERT INTO cache_meta (key, value) VALUES ('strings_bank_write_time', ?1), ('built_at', ?2)",
            params![
                cache.strings_bank_write_time().to_string(),
                Utc::now().to_rfc3339()
            ],
        )
        .into_diagnostic()?;
        tx.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![cache.version()],
        )
        .into_diagnostic()?;

        tx.commit().into_diagnostic()?;
        Ok(())
    }

    /// Version stamp of the persisted snapshot (0 when missing)
    pub(super) fn persisted_version(&self) -> u32 {
        self.conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Read the persisted snapshot back
    pub(super) fn load(&self) -> Result<Loaded> {
        let version = self.persisted_version();
        if version != CACHE_VERSION {
            return Ok(Loaded::Outdated { found: version });
        }

        let bank_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM banks", [], |row| row.get(0))
            .into_diagnostic()?;
        if bank_count == 0 {
            return Ok(Loaded::Empty);
        }

        let mut parts = CacheParts {
            version,
            strings_bank_write_time: self.meta_value("strings_bank_write_time")?
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            ..Default::default()
        };

        self.load_banks(&mut parts)?;
        self.load_parameters(&mut parts)?;
        self.load_events(&mut parts)?;

        Ok(Loaded::Ready(Cache::from_parts(parts)?))
    }

    pub(super) fn meta_value(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM cache_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .into_diagnostic()
    }

    fn load_banks(&self, parts: &mut CacheParts) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT key, path, name, studio_path, last_modified, present, is_master,
                    is_strings, manifest_digest
                 FROM banks ORDER BY key",
            )
            .into_diagnostic()?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    BankEntry {
                        path: row.get(1)?,
                        name: row.get(2)?,
                        studio_path: row.get(3)?,
                        file_sizes: Default::default(),
                        last_modified: row.get(4)?,
                        exists: row.get(5)?,
                        manifest_digest: row.get(8)?,
                    },
                    row.get::<_, bool>(6)?,
                    row.get::<_, bool>(7)?,
                ))
            })
            .into_diagnostic()?;

        for row in rows {
            let (key, bank, is_master, is_strings) = row.into_diagnostic()?;
            let index = expect_key(key, parts.banks.len(), "bank")?;
            if is_master {
                parts.master_banks.push(BankKey(index));
            }
            if is_strings {
                parts.strings_banks.push(BankKey(index));
            }
            parts.banks.push(bank);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT bank_key, platform, size FROM bank_file_sizes")
            .into_diagnostic()?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .into_diagnostic()?;

        for row in rows {
            let (key, platform, size) = row.into_diagnostic()?;
            let bank = usize::try_from(key)
                .ok()
                .and_then(|k| parts.banks.get_mut(k))
                .ok_or_else(|| CacheError::Corrupt(format!("size row for unknown bank {key}")))?;
            bank.file_sizes.insert(platform, size.max(0) as u64);
        }

        Ok(())
    }

    fn load_parameters(&self, parts: &mut CacheParts) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT key, name, data1, data2, min_value, max_value, default_value, kind,
                    labels, is_global, present
                 FROM parameters ORDER BY key",
            )
            .into_diagnostic()?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    ParamId::new(row.get(2)?, row.get(3)?),
                    [
                        row.get::<_, f64>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, f64>(6)?,
                    ],
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, bool>(9)?,
                    row.get::<_, bool>(10)?,
                ))
            })
            .into_diagnostic()?;

        for row in rows {
            let (key, name, id, [min, max, default], kind, labels, is_global, exists) =
                row.into_diagnostic()?;
            expect_key(key, parts.parameters.len(), "parameter")?;

            let kind = ParameterKind::parse(&kind)
                .ok_or_else(|| CacheError::Corrupt(format!("unknown parameter kind '{kind}'")))?;
            let labels: Vec<String> = serde_json::from_str(&labels).into_diagnostic()?;

            parts.parameters.push(ParamEntry {
                name,
                id,
                min: min as f32,
                max: max as f32,
                default: default as f32,
                kind,
                labels,
                is_global,
                exists,
            });
        }

        Ok(())
    }

    fn load_events(&self, parts: &mut CacheParts) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT key, path, guid, is_3d, is_stream, is_one_shot, min_distance,
                    max_distance, length
                 FROM events ORDER BY key",
            )
            .into_diagnostic()?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    [
                        row.get::<_, bool>(3)?,
                        row.get::<_, bool>(4)?,
                        row.get::<_, bool>(5)?,
                    ],
                    row.get::<_, f64>(6)?,
                    row.get::<_, f64>(7)?,
                    row.get::<_, u32>(8)?,
                ))
            })
            .into_diagnostic()?;

        for row in rows {
            let (key, path, guid, [is_3d, is_stream, is_one_shot], min_distance, max_distance, length) =
                row.into_diagnostic()?;
            expect_key(key, parts.events.len(), "event")?;

            let id = Guid::parse(&guid)
                .map_err(|e| CacheError::Corrupt(format!("event {path}: {e}")))?;

            parts.events.push(EventEntry {
                path,
                id,
                banks: Vec::new(),
                parameters: Vec::new(),
                is_3d,
                is_stream,
                is_one_shot,
                min_distance: min_distance as f32,
                max_distance: max_distance as f32,
                length,
            });
        }

        for (event_key, link_key) in self.links("SELECT event_key, bank_key FROM event_banks ORDER BY event_key, position")? {
            let event = event_mut(parts, event_key)?;
            event.banks.push(BankKey(link_key));
        }
        for (event_key, link_key) in self.links(
            "SELECT event_key, param_key FROM event_parameters ORDER BY event_key, position",
        )? {
            let event = event_mut(parts, event_key)?;
            event.parameters.push(ParamKey(link_key));
        }

        Ok(())
    }

    fn links(&self, sql: &str) -> Result<Vec<(usize, usize)>> {
        let mut stmt = self.conn.prepare(sql).into_diagnostic()?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, usize>(0)?, row.get::<_, usize>(1)?)))
            .into_diagnostic()?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }
}

fn expect_key(key: i64, expected: usize, what: &str) -> std::result::Result<usize, CacheError> {
    if usize::try_from(key).ok() == Some(expected) {
        Ok(expected)
    } else {
        Err(CacheError::Corrupt(format!(
            "{what} key {key} found where {expected} was expected"
        )))
    }
}

fn event_mut(parts: &mut CacheParts, key: usize) -> std::result::Result<&mut EventEntry, CacheError> {
    parts
        .events
        .get_mut(key)
        .ok_or_else(|| CacheError::Corrupt(format!("link row for unknown event {key}")))
}
