//! `banklink config` command - Configuration management

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::fs;

use crate::cli::helpers::{discover_project, linkage, print_structured};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::LinkageMode;
use crate::core::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Set a value in the project config
    Set(SetArgs),

    /// Show paths to configuration files
    Path,

    /// List all available configuration keys
    Keys,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Configuration key (see `banklink config keys`)
    pub key: String,

    /// Value to set; lists are comma-separated
    pub value: String,
}

/// Valid configuration keys
const VALID_KEYS: &[(&str, &str)] = &[
    ("source_bank_path", "Build folder, relative to the project root"),
    ("platforms", "Platform sub-folders of the build folder"),
    ("editor_platform", "Platform whose banks are scanned"),
    ("linkage", "Authoritative reference key: path or guid"),
];

pub fn run(cmd: ConfigCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ConfigCommands::Show => run_show(global),
        ConfigCommands::Set(args) => run_set(args, global),
        ConfigCommands::Path => run_path(global),
        ConfigCommands::Keys => run_keys(),
    }
}

fn run_show(global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let mut config = Config::load(&project);
    config.linkage = Some(linkage(global, &config));

    if matches!(global.format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_structured(&config, global.format);
    }

    println!("{}", style("Effective Configuration").bold().underlined());
    println!();
    print_value("source_bank_path", config.source_bank_path.as_deref());
    let platforms = config.platforms.join(", ");
    print_value("platforms", (!platforms.is_empty()).then_some(platforms.as_str()));
    print_value("editor_platform", config.editor_platform());
    print_value("linkage", Some(config.linkage().as_str()));

    println!();
    println!("{}", style("Config Sources (in priority order):").dim());
    println!("  1. Command line (--linkage)");
    println!("  2. Environment variables (BANKLINK_BANK_PATH, BANKLINK_PLATFORM, BANKLINK_LINKAGE)");
    println!("  3. Project config (.banklink/config.yaml)");
    println!("  4. Global config (~/.config/banklink/config.yaml)");
    Ok(())
}

fn print_value(key: &str, value: Option<&str>) {
    match value {
        Some(v) => println!("  {:<18} {}", style(key).cyan(), v),
        None => println!("  {:<18} {}", style(key).cyan(), style("(not set)").dim()),
    }
}

fn run_set(args: SetArgs, global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let path = project.config_path();

    let existing = if path.exists() {
        Some(fs::read_to_string(&path).into_diagnostic()?)
    } else {
        None
    };
    let yaml = update_config(existing.as_deref(), &args.key, &args.value)?;
    fs::write(&path, yaml).into_diagnostic()?;

    println!(
        "{} Set {} {} {}",
        style("✓").green(),
        style(&args.key).cyan(),
        style("→").dim(),
        style(&args.value).yellow()
    );
    Ok(())
}

/// Rewrite config file content with one key set
fn update_config(existing: Option<&str>, key: &str, raw: &str) -> Result<String> {
    let mut map = match existing {
        Some(content) => serde_yml::from_str::<Option<serde_yml::Mapping>>(content)
            .into_diagnostic()?
            .unwrap_or_default(),
        None => serde_yml::Mapping::new(),
    };
    map.insert(key.to_string(), parse_value(key, raw)?);
    serde_yml::to_string(&map).into_diagnostic()
}

fn parse_value(key: &str, raw: &str) -> Result<serde_yml::Value> {
    match key {
        "source_bank_path" | "editor_platform" => Ok(serde_yml::Value::String(raw.to_string())),
        "platforms" => Ok(serde_yml::Value::Sequence(
            raw.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| serde_yml::Value::String(p.to_string()))
                .collect(),
        )),
        "linkage" => {
            let mode = <LinkageMode as clap::ValueEnum>::from_str(raw, true)
                .map_err(|_| miette::miette!("linkage must be 'path' or 'guid', got '{}'", raw))?;
            Ok(serde_yml::Value::String(mode.as_str().to_string()))
        }
        _ => Err(miette::miette!(
            "Unknown key '{}'. Run 'banklink config keys' to list valid keys.",
            key
        )),
    }
}

fn run_path(global: &GlobalOpts) -> Result<()> {
    println!("{}", style("Configuration file paths:").bold());
    println!();

    match Config::global_config_path() {
        Some(path) => print_path("Global:", &path),
        None => println!("  {} {}", style("Global:").cyan(), style("(unavailable)").dim()),
    }

    println!();
    match discover_project(global) {
        Ok(project) => print_path("Project:", &project.config_path()),
        Err(_) => println!(
            "  {} {}",
            style("Project:").cyan(),
            style("(not in a banklink project)").dim()
        ),
    }
    Ok(())
}

fn print_path(label: &str, path: &std::path::Path) {
    println!("  {} {}", style(label).cyan(), path.display());
    if path.exists() {
        println!("    {}", style("(exists)").green());
    } else {
        println!("    {}", style("(not created)").dim());
    }
}

fn run_keys() -> Result<()> {
    println!("{}", style("Available configuration keys:").bold());
    println!();
    for (key, description) in VALID_KEYS {
        println!("  {:<20} {}", style(key).cyan(), style(description).dim());
    }
    println!();
    println!(
        "{}",
        style("Use 'banklink config set <key> <value>' to set a value.").dim()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_platform_list() {
        let value = parse_value("platforms", "Desktop, Mobile,").unwrap();
        let platforms: Vec<String> = serde_yml::from_value(value).unwrap();
        assert_eq!(platforms, vec!["Desktop", "Mobile"]);
    }

    #[test]
    fn test_update_config_keeps_other_keys() {
        let existing = "source_bank_path: Build\nlinkage: path\n";
        let yaml = update_config(Some(existing), "linkage", "guid").unwrap();
        let config: Config = serde_yml::from_str(&yaml).unwrap();

        assert_eq!(config.linkage, Some(LinkageMode::ById));
        assert_eq!(config.source_bank_path.as_deref(), Some("Build"));
        assert_eq!(yaml.matches("linkage").count(), 1);
    }

    #[test]
    fn test_update_config_creates_mapping() {
        let yaml = update_config(None, "platforms", "Desktop").unwrap();
        assert!(yaml.contains("platforms"));
        assert!(yaml.contains("- Desktop"));
    }

    #[test]
    fn test_parse_value_linkage() {
        assert_eq!(
            parse_value("linkage", "GUID").unwrap(),
            serde_yml::Value::String("guid".to_string())
        );
        assert!(parse_value("linkage", "sometimes").is_err());
        assert!(parse_value("author", "me").is_err());
    }
}
