//! `banklink event` command - Browse cached events

use clap::Subcommand;
use console::style;
use miette::Result;
use serde::Serialize;

use crate::cli::helpers::{discover_project, linkage, open_cache, print_structured, truncate_str};
use crate::cli::table::TableOutput;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::cache::{Cache, EventEntry, ParamEntry};
use crate::core::identity::Guid;
use crate::core::resolver::Resolver;
use crate::core::Config;

#[derive(Subcommand, Debug)]
pub enum EventCommands {
    /// List cached events
    List(ListArgs),

    /// Show one event by path or {GUID}
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only events compiled into a bank whose name contains this text
    #[arg(long, short = 'b')]
    pub bank: Option<String>,

    /// Only events whose path contains this text (case-insensitive)
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Only 3D events
    #[arg(long = "3d")]
    pub spatial: bool,

    /// Only one-shot events
    #[arg(long)]
    pub one_shot: bool,

    /// Limit the number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Event path (event:/...) or GUID ({...})
    pub event: String,
}

/// Flattened event for structured output
#[derive(Debug, Serialize)]
struct EventView<'a> {
    path: &'a str,
    guid: Guid,
    banks: Vec<&'a str>,
    is_3d: bool,
    is_stream: bool,
    is_one_shot: bool,
    min_distance: f32,
    max_distance: f32,
    length: u32,
    parameters: Vec<&'a ParamEntry>,
    global_parameters: Vec<&'a ParamEntry>,
}

impl<'a> EventView<'a> {
    fn new(cache: &'a Cache, event: &'a EventEntry) -> Self {
        Self {
            path: &event.path,
            guid: event.id,
            banks: cache.event_banks(event).map(|b| b.name.as_str()).collect(),
            is_3d: event.is_3d,
            is_stream: event.is_stream,
            is_one_shot: event.is_one_shot,
            min_distance: event.min_distance,
            max_distance: event.max_distance,
            length: event.length,
            parameters: cache.local_parameters(event),
            global_parameters: cache.global_parameters_of(event),
        }
    }
}

pub fn run(cmd: EventCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        EventCommands::List(args) => run_list(args, global),
        EventCommands::Show(args) => run_show(args, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let config = Config::load(&project);
    let store = open_cache(&project, &config)?;
    let cache = store.snapshot();

    let search = args.search.as_deref().map(str::to_lowercase);
    let mut events: Vec<&EventEntry> = cache
        .events()
        .iter()
        .filter(|e| {
            search
                .as_deref()
                .map_or(true, |s| e.path.to_lowercase().contains(s))
        })
        .filter(|e| {
            args.bank.as_deref().map_or(true, |bank| {
                cache.event_banks(e).any(|b| b.name.contains(bank))
            })
        })
        .filter(|e| !args.spatial || e.is_3d)
        .filter(|e| !args.one_shot || e.is_one_shot)
        .collect();

    events.sort_by(|a, b| a.path.cmp(&b.path));
    if let Some(limit) = args.limit {
        events.truncate(limit);
    }

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let views: Vec<EventView> = events.iter().map(|e| EventView::new(&cache, e)).collect();
            print_structured(&views, global.format)
        }
        format => {
            let mut table = TableOutput::new(&["PATH", "GUID", "BANKS", "FLAGS", "PARAMS"], "event");
            for event in events {
                let banks: Vec<&str> = cache.event_banks(event).map(|b| b.name.as_str()).collect();
                table.push(vec![
                    event.path.clone(),
                    event.id.to_string(),
                    truncate_str(&banks.join(", "), 40),
                    flags(event),
                    event.parameters.len().to_string(),
                ]);
            }
            table.print(format, global.quiet);
            Ok(())
        }
    }
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let config = Config::load(&project);
    let store = open_cache(&project, &config)?;
    let cache = store.snapshot();
    let resolver = Resolver::new(&cache, linkage(global, &config));

    let event = resolver
        .find(&args.event)
        .ok_or_else(|| miette::miette!("No event found matching '{}'", args.event))?;

    match global.format {
        OutputFormat::Tsv | OutputFormat::Csv | OutputFormat::Md => {
            Err(miette::miette!("event show supports yaml, json and id output"))
        }
        OutputFormat::Id => {
            println!("{}", event.id);
            Ok(())
        }
        OutputFormat::Json | OutputFormat::Yaml => {
            print_structured(&EventView::new(&cache, event), global.format)
        }
        OutputFormat::Auto => {
            print_event(&cache, event);
            Ok(())
        }
    }
}

fn print_event(cache: &Cache, event: &EventEntry) {
    println!("{}", style(&event.path).bold());
    println!("{}", style("─".repeat(40)).dim());
    println!("  GUID:       {}", style(event.id).cyan());
    let banks: Vec<&str> = cache.event_banks(event).map(|b| b.name.as_str()).collect();
    println!("  Banks:      {}", banks.join(", "));
    println!("  Flags:      {}", flags(event));
    if event.is_3d {
        println!(
            "  Distance:   {} - {}",
            event.min_distance, event.max_distance
        );
    }
    if event.is_one_shot {
        println!("  Length:     {} ms", event.length);
    }

    print_params("Parameters", &cache.local_parameters(event));
    print_params("Global parameters", &cache.global_parameters_of(event));
}

fn print_params(title: &str, params: &[&ParamEntry]) {
    if params.is_empty() {
        return;
    }
    println!();
    println!("  {}", style(title).bold());
    for param in params {
        let stale = if param.exists {
            String::new()
        } else {
            format!(" {}", style("(stale)").yellow())
        };
        println!(
            "    {:<20} [{} .. {}] default {} {}{}",
            param.name,
            param.min,
            param.max,
            param.default,
            style(param.kind).dim(),
            stale
        );
    }
}

/// Short flag summary, e.g. "3d,stream"
fn flags(event: &EventEntry) -> String {
    let flags: Vec<&str> = [
        (event.is_3d, "3d"),
        (event.is_stream, "stream"),
        (event.is_one_shot, "one-shot"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect();

    if flags.is_empty() {
        "-".to_string()
    } else {
        flags.join(",")
    }
}
