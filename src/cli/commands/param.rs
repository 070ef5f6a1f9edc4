//! `banklink param` command - Browse cached parameters

use clap::Subcommand;
use miette::Result;

use crate::cli::helpers::{discover_project, linkage, open_cache, print_structured};
use crate::cli::table::TableOutput;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::cache::ParamEntry;
use crate::core::resolver::Resolver;
use crate::core::Config;

#[derive(Subcommand, Debug)]
pub enum ParamCommands {
    /// List parameters, globally or for one event
    List(ListArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Event path or {GUID}; lists its local and global parameters
    #[arg(long, short = 'e')]
    pub event: Option<String>,

    /// Only global parameters
    #[arg(long, conflicts_with = "event")]
    pub global: bool,

    /// Include parameters carried over from the previous build
    #[arg(long)]
    pub stale: bool,
}

pub fn run(cmd: ParamCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ParamCommands::List(args) => run_list(args, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let config = Config::load(&project);
    let store = open_cache(&project, &config)?;
    let cache = store.snapshot();

    let mut params: Vec<&ParamEntry> = match &args.event {
        Some(needle) => {
            let resolver = Resolver::new(&cache, linkage(global, &config));
            let event = resolver
                .find(needle)
                .ok_or_else(|| miette::miette!("No event found matching '{}'", needle))?;
            let mut params = cache.local_parameters(event);
            params.extend(cache.global_parameters_of(event));
            params
        }
        None if args.global => cache.global_parameters(),
        None => {
            let mut params: Vec<&ParamEntry> = cache.parameters().iter().collect();
            params.sort_by(|a, b| a.name.cmp(&b.name));
            params
        }
    };
    params.retain(|p| args.stale || p.exists);

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&params, global.format),
        format => {
            let mut table = TableOutput::new(
                &["NAME", "ID", "SCOPE", "KIND", "MIN", "MAX", "DEFAULT", "LABELS"],
                "parameter",
            );
            for param in params {
                let scope = match (param.is_global, param.exists) {
                    (_, false) => "stale",
                    (true, true) => "global",
                    (false, true) => "local",
                };
                table.push(vec![
                    param.name.clone(),
                    param.id.to_string(),
                    scope.to_string(),
                    param.kind.to_string(),
                    param.min.to_string(),
                    param.max.to_string(),
                    param.default.to_string(),
                    param.labels.join("|"),
                ]);
            }
            table.print(format, global.quiet);
            Ok(())
        }
    }
}
