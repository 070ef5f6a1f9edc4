//! `banklink cache` command - Manage the event cache
//!
//! The cache is a local SQLite database mirroring the banks in the build
//! folder: banks, events, parameters and their links. It is user-local
//! (gitignored) and rebuilds itself when the build folder changes.

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{
    discover_project, escape_csv, format_bytes, open_cache, print_structured,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::cache::{CacheStore, RebuildStats, RefreshOutcome};
use crate::core::project::Project;
use crate::core::source::BuildDirectory;
use crate::core::Config;

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Rebuild the cache from scratch
    Rebuild,

    /// Rebuild only if the build folder changed
    Refresh,

    /// Show cache statistics
    Status,

    /// Execute SQL query against cache (read-only)
    Query {
        /// SQL query to execute
        sql: String,
    },

    /// Clear the cache completely
    Clear,
}

pub fn run(cmd: CacheCommands, global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let config = Config::load(&project);

    match cmd {
        CacheCommands::Rebuild => run_rebuild(&project, &config, global),
        CacheCommands::Refresh => run_refresh(&project, &config, global),
        CacheCommands::Status => run_status(&project, &config, global),
        CacheCommands::Query { sql } => run_query(&project, &sql, global.format),
        CacheCommands::Clear => run_clear(&project),
    }
}

fn run_rebuild(project: &Project, config: &Config, global: &GlobalOpts) -> Result<()> {
    let dir = BuildDirectory::from_config(project, config)?;
    let mut cache = CacheStore::open_without_refresh(project)?;

    if !global.quiet {
        println!(
            "{} Rebuilding cache from {}...",
            style("→").blue(),
            style(dir.editor_folder().display()).cyan()
        );
    }
    let stats = cache.rebuild(&dir, &dir)?;

    println!(
        "{} Cache rebuilt in {}ms",
        style("✓").green(),
        stats.duration_ms
    );
    print_rebuild_stats(&stats);
    Ok(())
}

fn run_refresh(project: &Project, config: &Config, global: &GlobalOpts) -> Result<()> {
    let dir = BuildDirectory::from_config(project, config)?;
    let mut cache = CacheStore::open_without_refresh(project)?;

    let outcome = cache.refresh(&dir, &dir)?;

    if matches!(global.format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_structured(&outcome, global.format);
    }

    match outcome {
        RefreshOutcome::UpToDate => {
            println!("{} Cache is up to date", style("✓").green());
        }
        RefreshOutcome::Rebuilt { reason, stats } => {
            println!(
                "{} Cache rebuilt in {}ms ({})",
                style("✓").green(),
                stats.duration_ms,
                style(reason).yellow()
            );
            print_rebuild_stats(&stats);
        }
    }
    Ok(())
}

fn print_rebuild_stats(stats: &RebuildStats) {
    println!("  Banks:       {}", stats.banks);
    println!("  Events:      {}", stats.events);
    println!("  Parameters:  {}", stats.parameters);
    if stats.stale_parameters > 0 {
        println!("  Stale:       {}", style(stats.stale_parameters).yellow());
    }
    if stats.skipped_strings_banks > 0 {
        println!(
            "  Skipped:     {} duplicate strings bank(s)",
            style(stats.skipped_strings_banks).yellow()
        );
    }
}

fn run_status(project: &Project, config: &Config, global: &GlobalOpts) -> Result<()> {
    let cache = open_cache(project, config)?;
    let stats = cache.statistics()?;

    if matches!(global.format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_structured(&stats, global.format);
    }

    println!("{}", style("Cache Status").bold());
    println!("{}", style("─".repeat(40)).dim());
    println!("  Location:        {}", project.cache_path().display());
    println!("  Version:         {}", style(stats.version).cyan());
    println!(
        "  Banks:           {} ({} master, {} strings)",
        style(stats.banks).cyan(),
        stats.master_banks,
        stats.strings_banks
    );
    println!("  Events:          {}", style(stats.events).cyan());
    println!(
        "  Parameters:      {} ({} global)",
        style(stats.parameters).cyan(),
        stats.global_parameters
    );
    if stats.stale_parameters > 0 {
        println!(
            "  Stale params:    {}",
            style(stats.stale_parameters).yellow()
        );
    }
    if let Some(time) = stats.strings_bank_write_time {
        println!("  Strings bank:    {}", time.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(built) = &stats.built_at {
        println!("  Built at:        {}", built);
    }
    println!(
        "  Database size:   {}",
        style(format_bytes(stats.db_size_bytes)).cyan()
    );
    if let Some(reason) = cache.pending_reason() {
        println!();
        println!("  {} {}", style("!").yellow(), reason);
    }

    Ok(())
}

fn run_query(project: &Project, sql: &str, format: OutputFormat) -> Result<()> {
    let cache = CacheStore::open_without_refresh(project)?;

    let columns = cache.query_columns(sql)?;
    let rows = cache.query_raw(sql)?;

    match format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let objects: Vec<serde_json::Value> = rows
                .iter()
                .map(|row| {
                    let mut obj = serde_json::Map::new();
                    for (col, val) in columns.iter().zip(row) {
                        obj.insert(col.clone(), serde_json::Value::String(val.clone()));
                    }
                    serde_json::Value::Object(obj)
                })
                .collect();
            print_structured(&objects, format)?;
        }
        OutputFormat::Csv => {
            println!("{}", columns.join(","));
            for row in rows {
                println!("{}", row.iter().map(|s| escape_csv(s)).collect::<Vec<_>>().join(","));
            }
        }
        _ => {
            println!("{}", columns.join("\t"));
            for row in rows {
                println!("{}", row.join("\t"));
            }
        }
    }

    Ok(())
}

fn run_clear(project: &Project) -> Result<()> {
    if !project.cache_path().exists() {
        println!("No cache to clear");
        return Ok(());
    }

    let mut cache = CacheStore::open_without_refresh(project)?;
    cache.clear()?;
    println!("{} Cache cleared", style("✓").green());
    Ok(())
}
