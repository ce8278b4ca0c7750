// src/cli.rs
//! CLI definitions for isoseed
//!
//! Command implementations live in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "isoseed")]
#[command(version)]
#[command(about = "Build an offline package repository for unattended installer images", long_about = None)]
pub struct Cli {
    /// Configuration file (default: /etc/isoseed/isoseed.toml if present)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace); ignored when RUST_LOG is set
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Package selection and run options shared by several subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Seed package (repeatable; replaces the configured seeds)
    #[arg(short, long = "seed", value_name = "NAME")]
    pub seeds: Vec<String>,

    /// Extra package fetched without its dependencies (repeatable)
    #[arg(short, long = "extra", value_name = "NAME")]
    pub extras: Vec<String>,

    /// Concurrent dependency queries (default: number of CPUs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Base image root whose package database apt should use
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,
}

/// Download options
#[derive(Args, Debug, Clone, Default)]
pub struct FetchArgs {
    /// Output repository directory
    #[arg(short, long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Concurrent downloads
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Extra attempts for a failed download
    #[arg(long)]
    pub retries: Option<u32>,

    /// Re-download packages already present in the destination
    #[arg(long)]
    pub overwrite: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the resolved package set, one name per line
    Resolve {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Resolve and download packages without indexing
    Fetch {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Regenerate Packages and Packages.gz for a directory of .deb files
    Index {
        /// Repository directory
        directory: PathBuf,
    },

    /// Resolve, download and index (the full pipeline)
    Build {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        fetch: FetchArgs,

        /// Also write a JSON run report to this path
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}
