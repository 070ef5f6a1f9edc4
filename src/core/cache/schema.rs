//! Database schema initialization

use miette::{IntoDiagnostic, Result};
use rusqlite::params;

use super::{CacheStore, CACHE_VERSION};

impl CacheStore {
    /// Initialize database schema
    pub(super) fn init_schema(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Snapshot-wide values (strings_bank_write_time, built_at)
            CREATE TABLE IF NOT EXISTS cache_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Compiled banks; keys are arena indices of the snapshot
            CREATE TABLE IF NOT EXISTS banks (
                key INTEGER PRIMARY KEY,
                path TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                studio_path TEXT NOT NULL,
                last_modified INTEGER NOT NULL,
                present INTEGER NOT NULL,
                is_master INTEGER NOT NULL DEFAULT 0,
                is_strings INTEGER NOT NULL DEFAULT 0,
                manifest_digest TEXT NOT NULL
            );

            -- Per-platform sizes of each bank
            CREATE TABLE IF NOT EXISTS bank_file_sizes (
                bank_key INTEGER NOT NULL,
                platform TEXT NOT NULL,
                size INTEGER NOT NULL,
                PRIMARY KEY (bank_key, platform),
                FOREIGN KEY (bank_key) REFERENCES banks(key) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS parameters (
                key INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                data1 INTEGER NOT NULL,
                data2 INTEGER NOT NULL,
                min_value REAL NOT NULL,
                max_value REAL NOT NULL,
                default_value REAL NOT NULL,
                kind TEXT NOT NULL,
                labels TEXT NOT NULL,
                is_global INTEGER NOT NULL,
                present INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_parameters_name ON parameters(name);
            CREATE INDEX IF NOT EXISTS idx_parameters_global ON parameters(is_global);

            CREATE TABLE IF NOT EXISTS events (
                key INTEGER PRIMARY KEY,
                path TEXT NOT NULL,
                guid TEXT NOT NULL,
                is_3d INTEGER NOT NULL,
                is_stream INTEGER NOT NULL,
                is_one_shot INTEGER NOT NULL,
                min_distance REAL NOT NULL,
                max_distance REAL NOT NULL,
                length INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_path ON events(path);
            CREATE INDEX IF NOT EXISTS idx_events_guid ON events(guid);

            CREATE TABLE IF NOT EXISTS event_banks (
                event_key INTEGER NOT NULL,
                bank_key INTEGER NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (event_key, bank_key)
            );
            CREATE INDEX IF NOT EXISTS idx_event_banks_bank ON event_banks(bank_key);

            CREATE TABLE IF NOT EXISTS event_parameters (
                event_key INTEGER NOT NULL,
                param_key INTEGER NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (event_key, param_key)
            );
            CREATE INDEX IF NOT EXISTS idx_event_parameters_param ON event_parameters(param_key);
            "#,
            )
            .into_diagnostic()?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![CACHE_VERSION],
            )
            .into_diagnostic()?;

        Ok(())
    }

    /// Drop every table, keeping the database file
    pub(super) fn drop_schema(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                DROP TABLE IF EXISTS schema_version;
                DROP TABLE IF EXISTS cache_meta;
                DROP TABLE IF EXISTS event_parameters;
                DROP TABLE IF EXISTS event_banks;
                DROP TABLE IF EXISTS events;
                DROP TABLE IF EXISTS parameters;
                DROP TABLE IF EXISTS bank_file_sizes;
                DROP TABLE IF EXISTS banks;
                "#,
            )
            .into_diagnostic()?;
        Ok(())
    }
}
