//! `banklink init` command - Initialize a new banklink project

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};

use crate::cli::GlobalOpts;
use crate::core::project::{InitOptions, Project, ProjectError, PROJECT_DIR};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Folder with the compiled banks, relative to the project root
    #[arg(long)]
    pub bank_path: Option<String>,

    /// Force initialization even if .banklink/ already exists
    #[arg(long)]
    pub force: bool,
}

/// The global `--linkage` flag is written into the new config
pub fn run(args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        println!(
            "{} Created directory {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }

    let options = InitOptions {
        bank_path: args.bank_path.clone(),
        linkage: global.linkage,
    };
    let project = if args.force {
        Project::init_force(&path, &options)
    } else {
        Project::init(&path, &options)
    };

    match project {
        Ok(project) => {
            println!(
                "{} Initialized banklink project at {}",
                style("✓").green(),
                style(project.root().display()).cyan()
            );
            println!();
            println!("Created project structure:");
            print_structure(project.root());
            println!();
            println!("Next steps:");
            if options.bank_path.is_none() {
                println!(
                    "  {} Point the project at your build folder",
                    style("banklink config set source_bank_path Build").yellow()
                );
            }
            println!(
                "  {} Build the event cache",
                style("banklink cache rebuild").yellow()
            );
            println!(
                "  {} List cached events",
                style("banklink event list").yellow()
            );
            Ok(())
        }
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} banklink project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!(
                "Use {} to reinitialize",
                style("banklink init --force").yellow()
            );
            Ok(())
        }
        Err(e) => Err(miette::miette!("{}", e)),
    }
}

fn print_structure(root: &Path) {
    let entries = [
        format!("{}/", PROJECT_DIR),
        format!("{}/config.yaml", PROJECT_DIR),
        format!("{}/.gitignore", PROJECT_DIR),
    ];

    for entry in &entries {
        if root.join(entry).exists() {
            println!("  {}", style(entry).dim());
        }
    }
}
