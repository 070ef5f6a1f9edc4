use banklink::cli::{commands, Cli, Commands};
use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;

    // Diagnostics go to stderr so piped output stays clean
    let default_filter = if global.verbose { "banklink=debug" } else { "banklink=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init(args) => commands::init::run(args, &global),
        Commands::Cache(cmd) => commands::cache::run(cmd, &global),
        Commands::Event(cmd) => commands::event::run(cmd, &global),
        Commands::Bank(cmd) => commands::bank::run(cmd, &global),
        Commands::Param(cmd) => commands::param::run(cmd, &global),
        Commands::Resolve(args) => commands::resolve::run(args, &global),
        Commands::Refs(cmd) => commands::refs::run(cmd, &global),
        Commands::Config(cmd) => commands::config::run(cmd, &global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}
