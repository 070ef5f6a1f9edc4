//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    bank::BankCommands, cache::CacheCommands, completions::CompletionsArgs,
    config::ConfigCommands, event::EventCommands, init::InitArgs, param::ParamCommands,
    refs::RefsCommands, resolve::ResolveArgs,
};
use crate::core::config::LinkageMode;

#[derive(Parser)]
#[command(name = "banklink")]
#[command(author, version, about = "Audio bank event cache and reference resolver")]
#[command(long_about = "Mirrors compiled audio banks into a local event cache and keeps path/GUID event references in step with it.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .banklink/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Override the configured linkage mode
    #[arg(long, global = true, value_enum)]
    pub linkage: Option<LinkageMode>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new banklink project
    Init(InitArgs),

    /// Manage the event cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Browse cached events
    #[command(subcommand)]
    Event(EventCommands),

    /// Browse cached banks
    #[command(subcommand)]
    Bank(BankCommands),

    /// Browse cached parameters
    #[command(subcommand)]
    Param(ParamCommands),

    /// Check a single event reference
    Resolve(ResolveArgs),

    /// Check and fix references stored in *.refs.yaml files
    #[command(subcommand)]
    Refs(RefsCommands),

    /// Show the effective configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, table for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just the key column, one per line
    Id,
}
