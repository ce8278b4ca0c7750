// src/commands.rs
//! Command handlers for the isoseed CLI

use crate::cli::{FetchArgs, SelectionArgs};
use anyhow::{Context, Result};
use isoseed::client::HttpClient;
use isoseed::config::Config;
use isoseed::lock::DestinationLock;
use isoseed::pipeline::{Pipeline, open_index, open_source};
use isoseed::repo_index::check_directory;
use isoseed::{Error, ExistingPolicy, build_index};
use std::path::Path;
use tracing::info;

/// Apply selection flags on top of the loaded configuration
pub fn apply_selection(mut config: Config, args: &SelectionArgs) -> Config {
    if !args.seeds.is_empty() {
        config = config.with_seeds(args.seeds.clone());
    }
    if !args.extras.is_empty() {
        config = config.with_extra_packages(args.extras.clone());
    }
    if let Some(jobs) = args.jobs {
        config = config.with_jobs(jobs);
    }
    if let Some(root) = &args.root {
        config = config.with_root(root.clone());
    }
    config
}

/// Apply download flags on top of the loaded configuration
pub fn apply_fetch(mut config: Config, args: &FetchArgs) -> Config {
    if let Some(dest) = &args.dest {
        config = config.with_destination(dest.clone());
    }
    if let Some(parallel) = args.parallel {
        config = config.with_parallel_downloads(parallel);
    }
    if let Some(retries) = args.retries {
        config = config.with_retries(retries);
    }
    if args.overwrite {
        config = config.with_existing(ExistingPolicy::Overwrite);
    }
    config
}

fn http_client(config: &Config) -> Result<HttpClient> {
    HttpClient::with_timeout(config.download_timeout()).context("Failed to set up HTTP client")
}

pub fn cmd_resolve(config: &Config) -> Result<()> {
    config.validate()?;
    let client = http_client(config)?;
    let index = open_index(config, &client)?;
    let source = open_source(config, index.as_ref(), &client);

    let resolved = Pipeline::new(index.as_ref(), source.as_ref())
        .with_config(config)
        .resolve(&config.seeds, &config.extra_packages)?;

    for name in &resolved {
        println!("{}", name);
    }
    info!("{} package(s) resolved", resolved.len());
    Ok(())
}

pub fn cmd_fetch(config: &Config, progress: bool) -> Result<()> {
    config.validate()?;
    let dest = &config.destination;
    let _lock = DestinationLock::acquire(dest)?;

    let client = http_client(config)?;
    let index = open_index(config, &client)?;
    let source = open_source(config, index.as_ref(), &client);

    let (resolved, report) = Pipeline::new(index.as_ref(), source.as_ref())
        .with_config(config)
        .with_progress(progress)
        .fetch(&config.seeds, &config.extra_packages, dest)?;

    println!(
        "Resolved {}, fetched {} ({} downloaded, {} already present), failed {}",
        resolved.len(),
        report.succeeded(),
        report.downloaded(),
        report.skipped(),
        report.failed()
    );
    for name in report.failed_names() {
        println!("  failed: {}", name);
    }

    if report.succeeded() == 0 {
        return Err(Error::EmptyRepository(dest.clone()).into());
    }
    Ok(())
}

pub fn cmd_index(directory: &Path) -> Result<()> {
    // The lock would create a missing directory; a typo must not become an empty repo
    check_directory(directory)?;
    let _lock = DestinationLock::acquire(directory)?;
    let index = build_index(directory)?;

    println!(
        "Indexed {} package(s) into {}",
        index.len(),
        index.packages_path.display()
    );
    for skipped in &index.skipped {
        println!("  skipped: {}", skipped.display());
    }
    Ok(())
}

pub fn cmd_build(config: &Config, report_path: Option<&Path>, progress: bool) -> Result<()> {
    config.validate()?;
    let dest = &config.destination;
    let _lock = DestinationLock::acquire(dest)?;

    let client = http_client(config)?;
    let index = open_index(config, &client)?;
    let source = open_source(config, index.as_ref(), &client);

    let report = Pipeline::new(index.as_ref(), source.as_ref())
        .with_config(config)
        .with_progress(progress)
        .execute(&config.seeds, &config.extra_packages, dest)?;

    println!("{}", report.summary);

    if let Some(path) = report_path {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Wrote run report to {}", path.display());
    }

    if report.is_empty() {
        return Err(Error::EmptyRepository(dest.clone()).into());
    }
    Ok(())
}

pub fn cmd_show_config(config: &Config) -> Result<()> {
    let text = toml::to_string_pretty(config).context("Failed to render configuration")?;
    print!("{}", text);
    Ok(())
}
