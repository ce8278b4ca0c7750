// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use isoseed::config::Config;
use tracing_subscriber::EnvFilter;

/// Log filter: RUST_LOG wins, otherwise derived from -v/-q
fn log_filter(verbose: u8, quiet: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        EnvFilter::new(level)
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, cli.quiet))
        .with_writer(std::io::stderr)
        .init();

    let progress = |no_progress: bool| !no_progress && !cli.quiet;

    match cli.command {
        Commands::Resolve { selection } => {
            let config = Config::load_or_default(cli.config.as_deref())?;
            let config = commands::apply_selection(config, &selection);
            commands::cmd_resolve(&config)
        }
        Commands::Fetch { selection, fetch } => {
            let config = Config::load_or_default(cli.config.as_deref())?;
            let config = commands::apply_selection(config, &selection);
            let config = commands::apply_fetch(config, &fetch);
            commands::cmd_fetch(&config, progress(fetch.no_progress))
        }
        Commands::Index { directory } => commands::cmd_index(&directory),
        Commands::Build {
            selection,
            fetch,
            report,
        } => {
            let config = Config::load_or_default(cli.config.as_deref())?;
            let config = commands::apply_selection(config, &selection);
            let config = commands::apply_fetch(config, &fetch);
            commands::cmd_build(&config, report.as_deref(), progress(fetch.no_progress))
        }
        Commands::ShowConfig => {
            let config = Config::load_or_default(cli.config.as_deref())?;
            commands::cmd_show_config(&config)
        }
    }
}
