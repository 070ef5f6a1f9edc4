//! `banklink resolve` command - Check a single event reference

use console::style;
use miette::Result;
use serde::Serialize;

use crate::cli::helpers::{discover_project, linkage, open_cache, print_structured};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::LinkageMode;
use crate::core::identity::Guid;
use crate::core::resolver::{MismatchInfo, Reference, ReferenceStatus, Resolver};
use crate::core::Config;

#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    /// Event path, e.g. event:/amb/wind
    #[arg(long)]
    pub path: Option<String>,

    /// Event GUID, e.g. {0ad3b5f2-...}
    #[arg(long)]
    pub guid: Option<Guid>,
}

#[derive(Debug, Serialize)]
struct ResolveView<'a> {
    status: &'static str,
    linkage: LinkageMode,
    reference: &'a Reference,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repair: Option<RepairView>,
}

#[derive(Debug, Serialize)]
struct RepairView {
    message: String,
    tooltip: String,
    #[serde(flatten)]
    info: MismatchInfo,
}

pub fn run(args: ResolveArgs, global: &GlobalOpts) -> Result<()> {
    let reference = Reference::new(args.path.unwrap_or_default(), args.guid.unwrap_or_default());

    let project = discover_project(global)?;
    let config = Config::load(&project);
    let store = open_cache(&project, &config)?;
    let cache = store.snapshot();
    let resolver = Resolver::new(&cache, linkage(global, &config));

    let status = resolver.check(&reference);
    let event = match &status {
        ReferenceStatus::Valid(entry) => Some(Reference::to_event(entry)),
        _ => resolver
            .resolve(&reference)
            .or_else(|| resolver.detect_rename(&reference))
            .map(Reference::to_event),
    };

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let view = ResolveView {
                status: status.label(),
                linkage: resolver.effective_linkage(&reference),
                reference: &reference,
                event,
                repair: status.repair_info().map(|info| RepairView {
                    message: info.message(),
                    tooltip: info.tooltip(),
                    info: info.clone(),
                }),
            };
            print_structured(&view, global.format)?;
        }
        _ => print_status(&status, event.as_ref()),
    }

    match status {
        ReferenceStatus::Malformed => Err(miette::miette!(
            "a reference needs --path, --guid or both"
        )),
        ReferenceStatus::NotFound => Err(miette::miette!("no event matches {}", reference)),
        _ => Ok(()),
    }
}

fn print_status(status: &ReferenceStatus<'_>, event: Option<&Reference>) {
    match status {
        ReferenceStatus::Valid(_) => {
            println!("{} {}", style("✓").green(), style(status.label()).green());
        }
        ReferenceStatus::Mismatch(_) | ReferenceStatus::Moved(_) => {
            println!("{} {}", style("!").yellow(), style(status.label()).yellow());
        }
        ReferenceStatus::Malformed | ReferenceStatus::NotFound => {
            println!("{} {}", style("✗").red(), style(status.label()).red());
        }
    }

    if let Some(event) = event {
        println!("  Event: {}", style(&event.path).cyan());
        println!("  GUID:  {}", event.id);
    }

    if let Some(info) = status.repair_info() {
        println!();
        println!("  {}", info.message());
        println!("  {}", style(info.tooltip()).dim());
    }
}
