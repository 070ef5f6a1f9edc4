//! `banklink bank` command - Browse cached banks

use clap::Subcommand;
use miette::Result;
use serde::Serialize;

use crate::cli::helpers::{discover_project, format_bytes, format_ticks, open_cache, print_structured};
use crate::cli::table::TableOutput;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::cache::BankEntry;
use crate::core::Config;

#[derive(Subcommand, Debug)]
pub enum BankCommands {
    /// List cached banks
    List(ListArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only master banks
    #[arg(long, conflicts_with = "strings")]
    pub master: bool,

    /// Only strings banks
    #[arg(long)]
    pub strings: bool,
}

#[derive(Debug, Serialize)]
struct BankView<'a> {
    #[serde(flatten)]
    bank: &'a BankEntry,
    events: usize,
    master: bool,
    strings: bool,
}

pub fn run(cmd: BankCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        BankCommands::List(args) => run_list(args, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let config = Config::load(&project);
    let store = open_cache(&project, &config)?;
    let cache = store.snapshot();

    let masters = cache.master_bank_keys();
    let strings = cache.strings_bank_keys();

    let views: Vec<BankView> = cache
        .banks()
        .iter()
        .enumerate()
        .map(|(index, bank)| BankView {
            bank,
            events: cache
                .events()
                .iter()
                .filter(|e| e.banks.iter().any(|k| k.index() == index))
                .count(),
            master: masters.iter().any(|k| k.index() == index),
            strings: strings.iter().any(|k| k.index() == index),
        })
        .filter(|v| !args.master || v.master)
        .filter(|v| !args.strings || v.strings)
        .collect();

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&views, global.format),
        format => {
            let mut table =
                TableOutput::new(&["NAME", "KIND", "EVENTS", "SIZE", "MODIFIED", "STUDIO PATH"], "bank");
            for view in &views {
                let kind = match (view.master, view.strings) {
                    (_, true) => "strings",
                    (true, false) => "master",
                    _ => "bank",
                };
                let size: u64 = view.bank.file_sizes.values().sum();
                table.push(vec![
                    view.bank.name.clone(),
                    kind.to_string(),
                    view.events.to_string(),
                    format_bytes(size),
                    format_ticks(view.bank.last_modified),
                    view.bank.studio_path.clone(),
                ]);
            }
            table.print(format, global.quiet);
            Ok(())
        }
    }
}
