//! SQLite-backed event cache
//!
//! This module provides a local cache that:
//! - Mirrors banks, events and parameters from the build folder
//! - Persists the last good snapshot in `.banklink/cache.db`
//! - Detects bank changes and rebuilds on demand
//! - Supports direct SQL queries for power users
//!
//! The cache is machine-local and gitignored. A snapshot is never edited in
//! place: rebuilds construct a new one and publish it by swapping the `Arc`.

mod build;
mod error;
mod persist;
mod schema;
mod snapshot;
mod types;

pub use error::CacheError;
pub use snapshot::Cache;
pub use types::*;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use miette::{IntoDiagnostic, Result};
use rusqlite::Connection;

use crate::core::project::Project;
use crate::core::source::{BankListing, BankSource, MetadataSource};
use persist::Loaded;

/// Current cache version - persisted snapshots of any other version are rebuilt
pub const CACHE_VERSION: u32 = 3;

/// The cache store backed by SQLite
pub struct CacheStore {
    conn: Connection,
    db_path: PathBuf,
    current: Arc<Cache>,
    /// Set when the persisted snapshot could not be used
    pending: Option<RebuildReason>,
}

impl CacheStore {
    /// Open the cache and bring it up to date with the build folder
    ///
    /// If bringing it up to date fails but a persisted snapshot exists, that
    /// snapshot keeps being served and the failure is logged.
    pub fn open(
        project: &Project,
        source: &dyn BankSource,
        metadata: &dyn MetadataSource,
    ) -> Result<Self> {
        let mut store = Self::open_without_refresh(project)?;

        match store.refresh(source, metadata) {
            Ok(RefreshOutcome::Rebuilt { reason, .. }) => {
                tracing::info!(%reason, "cache rebuilt on open");
            }
            Ok(RefreshOutcome::UpToDate) => {}
            Err(e) if !store.current.is_empty() => {
                tracing::warn!(error = %e, "cache refresh failed, serving the last good snapshot");
            }
            Err(e) => return Err(e),
        }

        Ok(store)
    }

    /// Open the cache without looking at the build folder
    pub fn open_without_refresh(project: &Project) -> Result<Self> {
        let db_path = project.cache_path();

        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).into_diagnostic()?;
        }

        let needs_init = !db_path.exists();
        let conn = Connection::open(&db_path).into_diagnostic()?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .into_diagnostic()?;

        let mut store = Self {
            conn,
            db_path,
            current: Arc::new(Cache::empty()),
            pending: Some(RebuildReason::NeverBuilt),
        };

        if needs_init {
            store.init_schema()?;
            return Ok(store);
        }

        match store.load() {
            Ok(Loaded::Ready(cache)) => {
                tracing::debug!(events = cache.events().len(), "loaded cache snapshot");
                store.current = Arc::new(cache);
                store.pending = None;
            }
            Ok(Loaded::Empty) => {}
            Ok(Loaded::Outdated { found }) => {
                tracing::info!(found, expected = CACHE_VERSION, "discarding cache of another version");
                store.reinitialize_schema()?;
                if found != 0 {
                    store.pending = Some(RebuildReason::VersionMismatch { found });
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable cache");
                store.reinitialize_schema()?;
                store.pending = Some(RebuildReason::Forced);
            }
        }

        Ok(store)
    }

    /// Drop all tables and recreate them empty
    fn reinitialize_schema(&mut self) -> Result<()> {
        self.drop_schema()?;
        self.init_schema()
    }

    /// The published snapshot
    ///
    /// Holders keep a consistent view even if a rebuild publishes a newer one.
    pub fn snapshot(&self) -> Arc<Cache> {
        Arc::clone(&self.current)
    }

    /// Why the next refresh will rebuild regardless of the listing, if at all
    pub fn pending_reason(&self) -> Option<&RebuildReason> {
        self.pending.as_ref()
    }

    /// Full rebuild from the build folder
    ///
    /// On failure the published snapshot and the database stay untouched.
    pub fn rebuild(
        &mut self,
        source: &dyn BankSource,
        metadata: &dyn MetadataSource,
    ) -> Result<RebuildStats> {
        let listing = source.list_banks()?;
        self.rebuild_from(&listing, metadata)
    }

    /// Rebuild only when the build folder changed since the last build
    pub fn refresh(
        &mut self,
        source: &dyn BankSource,
        metadata: &dyn MetadataSource,
    ) -> Result<RefreshOutcome> {
        let listing = source.list_banks()?;

        let reason = match &self.pending {
            Some(reason) => Some(reason.clone()),
            None => build::stale_reason(&self.current, &listing),
        };

        match reason {
            None => {
                tracing::debug!("cache is up to date");
                Ok(RefreshOutcome::UpToDate)
            }
            Some(reason) => {
                tracing::info!(%reason, "rebuilding cache");
                let stats = self.rebuild_from(&listing, metadata)?;
                Ok(RefreshOutcome::Rebuilt { reason, stats })
            }
        }
    }

    fn rebuild_from(
        &mut self,
        listing: &BankListing,
        metadata: &dyn MetadataSource,
    ) -> Result<RebuildStats> {
        let (cache, stats) = build::build(listing, metadata, &self.current)?;

        self.save(&cache)?;
        self.current = Arc::new(cache);
        self.pending = None;

        tracing::info!(duration_ms = stats.duration_ms, "published cache snapshot");
        Ok(stats)
    }

    /// Get cache statistics
    pub fn statistics(&self) -> Result<CacheStats> {
        let cache = &self.current;

        let built_at = self.meta_value("built_at")?;
        let db_size_bytes = fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0);

        Ok(CacheStats {
            version: cache.version(),
            banks: cache.banks().len(),
            master_banks: cache.master_banks().count(),
            strings_banks: cache.strings_banks().count(),
            events: cache.events().len(),
            parameters: cache.parameters().len(),
            global_parameters: cache.global_parameters().len(),
            stale_parameters: cache.parameters().iter().filter(|p| !p.exists).count(),
            strings_bank_write_time: (cache.strings_bank_write_time() > 0)
                .then(|| ticks_to_datetime(cache.strings_bank_write_time()))
                .flatten(),
            built_at,
            db_size_bytes,
        })
    }

    /// Execute raw SQL query (read-only)
    pub fn query_raw(&self, sql: &str) -> Result<Vec<Vec<String>>> {
        let mut stmt = self.conn.prepare(sql).into_diagnostic()?;
        if !stmt.readonly() {
            return Err(miette::miette!("only read-only queries are allowed"));
        }
        let column_count = stmt.column_count();

        let rows = stmt
            .query_map([], |row| {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    let value: String = row
                        .get::<_, rusqlite::types::Value>(i)
                        .map(|v| match v {
                            rusqlite::types::Value::Null => "NULL".to_string(),
                            rusqlite::types::Value::Integer(i) => i.to_string(),
                            rusqlite::types::Value::Real(f) => f.to_string(),
                            rusqlite::types::Value::Text(s) => s,
                            rusqlite::types::Value::Blob(_) => "<blob>".to_string(),
                        })
                        .unwrap_or_default();
                    values.push(value);
                }
                Ok(values)
            })
            .into_diagnostic()?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }

    /// Get column names for a query
    pub fn query_columns(&self, sql: &str) -> Result<Vec<String>> {
        let stmt = self.conn.prepare(sql).into_diagnostic()?;
        Ok(stmt.column_names().iter().map(|s| s.to_string()).collect())
    }

    /// Clear the entire cache
    ///
    /// The next refresh rebuilds from scratch.
    pub fn clear(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            DELETE FROM event_parameters;
            DELETE FROM event_banks;
            DELETE FROM events;
            DELETE FROM parameters;
            DELETE FROM bank_file_sizes;
            DELETE FROM banks;
            DELETE FROM cache_meta;
            "#,
            )
            .into_diagnostic()?;

        self.current = Arc::new(Cache::empty());
        self.pending = Some(RebuildReason::NeverBuilt);
        Ok(())
    }
}

/// Build a snapshot straight from a source, bypassing the database
#[cfg(test)]
pub(crate) fn build_for_tests<S>(source: &S) -> std::result::Result<Cache, CacheError>
where
    S: BankSource + MetadataSource,
{
    let listing = source.list_banks()?;
    build::build(&listing, source, &Cache::empty()).map(|(cache, _)| cache)
}
