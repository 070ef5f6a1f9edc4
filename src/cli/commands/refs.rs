//! `banklink refs` command - Check and fix stored event references
//!
//! Reference files (`*.refs.yaml`) hold `{ name, path, guid }` records.
//! `check` reports drifted and dangling records, `fix` rewrites the drifted
//! ones so both keys match the cache again.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{discover_project, linkage, open_cache, print_structured};
use crate::cli::table::TableOutput;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::references::{self, ScanReport};
use crate::core::resolver::Resolver;
use crate::core::Config;

#[derive(Subcommand, Debug)]
pub enum RefsCommands {
    /// Report references that drifted from the cache or point nowhere
    Check(CheckArgs),

    /// Repair drifted references in place
    Fix(FixArgs),
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Reference files (default: every *.refs.yaml in the project)
    pub files: Vec<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct FixArgs {
    /// Reference files (default: every *.refs.yaml in the project)
    pub files: Vec<PathBuf>,

    /// Show what would change without writing
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(cmd: RefsCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        RefsCommands::Check(args) => run_check(args, global),
        RefsCommands::Fix(args) => run_fix(args, global),
    }
}

fn target_files(root: &Path, files: Vec<PathBuf>) -> Vec<PathBuf> {
    if files.is_empty() {
        references::discover(root)
    } else {
        files
    }
}

fn run_check(args: CheckArgs, global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let config = Config::load(&project);
    let store = open_cache(&project, &config)?;
    let cache = store.snapshot();
    let resolver = Resolver::new(&cache, linkage(global, &config));

    let files = target_files(project.root(), args.files);
    let report = references::scan(&files, &resolver)?;

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&report, global.format)?,
        format => print_report(project.root(), &report, format, global.quiet),
    }

    if report.is_clean() {
        Ok(())
    } else {
        Err(miette::miette!(
            "{} reference(s) need repair, {} cannot be resolved",
            report.tasks.len(),
            report.problems.len()
        ))
    }
}

fn print_report(root: &Path, report: &ScanReport, format: OutputFormat, quiet: bool) {
    let mut table = TableOutput::new(&["FILE", "NAME", "STATUS", "DETAIL"], "issue");
    for task in &report.tasks {
        table.push(vec![
            display_path(root, &task.file),
            task.name.clone(),
            "repairable".to_string(),
            task.info.message(),
        ]);
    }
    for problem in &report.problems {
        table.push(vec![
            display_path(root, &problem.file),
            problem.name.clone(),
            "broken".to_string(),
            format!("{}: {}", problem.kind.as_str(), problem.reference),
        ]);
    }

    if table.is_empty() && format == OutputFormat::Auto {
        println!(
            "{} {} reference(s) in {} file(s) are up to date",
            style("✓").green(),
            report.records,
            report.files
        );
        return;
    }
    table.print(format, quiet);
}

fn run_fix(args: FixArgs, global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let config = Config::load(&project);
    let store = open_cache(&project, &config)?;
    let cache = store.snapshot();
    let resolver = Resolver::new(&cache, linkage(global, &config));

    let files = target_files(project.root(), args.files);
    let report = references::scan(&files, &resolver)?;

    if !global.quiet {
        for task in &report.tasks {
            println!(
                "{} {} {} {}",
                style("→").blue(),
                display_path(project.root(), &task.file),
                style(&task.name).cyan(),
                style(task.info.tooltip()).dim()
            );
        }
    }

    let stats = references::apply(&report.tasks, &resolver, args.dry_run)?;

    if matches!(global.format, OutputFormat::Json | OutputFormat::Yaml) {
        print_structured(&stats, global.format)?;
    } else {
        let verb = if args.dry_run { "Would repair" } else { "Repaired" };
        println!(
            "{} {} {} reference(s) in {} file(s)",
            style("✓").green(),
            verb,
            stats.records_changed,
            stats.files_changed
        );
        if stats.records_skipped > 0 {
            println!(
                "  {} {} record(s) changed since the scan were skipped",
                style("!").yellow(),
                stats.records_skipped
            );
        }
        for problem in &report.problems {
            println!(
                "  {} {} {}: {}",
                style("✗").red(),
                display_path(project.root(), &problem.file),
                problem.name,
                problem.kind.as_str()
            );
        }
    }

    Ok(())
}

fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
