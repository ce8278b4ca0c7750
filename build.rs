// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Package selection arguments shared by resolve, fetch and build
fn selection_args() -> Vec<Arg> {
    vec![
        Arg::new("seeds")
            .short('s')
            .long("seed")
            .value_name("NAME")
            .action(ArgAction::Append)
            .help("Seed package (repeatable; replaces the configured seeds)"),
        Arg::new("extras")
            .short('e')
            .long("extra")
            .value_name("NAME")
            .action(ArgAction::Append)
            .help("Extra package fetched without its dependencies (repeatable)"),
        Arg::new("jobs")
            .short('j')
            .long("jobs")
            .help("Concurrent dependency queries (default: number of CPUs)"),
        Arg::new("root")
            .long("root")
            .value_name("DIR")
            .help("Base image root whose package database apt should use"),
    ]
}

/// Download arguments shared by fetch and build
fn fetch_args() -> Vec<Arg> {
    vec![
        Arg::new("dest")
            .short('d')
            .long("dest")
            .value_name("DIR")
            .help("Output repository directory"),
        Arg::new("parallel")
            .short('p')
            .long("parallel")
            .help("Concurrent downloads"),
        Arg::new("retries")
            .long("retries")
            .help("Extra attempts for a failed download"),
        Arg::new("overwrite")
            .long("overwrite")
            .action(ArgAction::SetTrue)
            .help("Re-download packages already present in the destination"),
        Arg::new("no_progress")
            .long("no-progress")
            .action(ArgAction::SetTrue)
            .help("Disable the progress bar"),
    ]
}

fn build_cli() -> Command {
    Command::new("isoseed")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Build an offline package repository for unattended installer images")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Configuration file (default: /etc/isoseed/isoseed.toml if present)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("More log output (-v debug, -vv trace)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Only log warnings and errors"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("resolve")
                .about("Print the resolved package set, one name per line")
                .args(selection_args()),
        )
        .subcommand(
            Command::new("fetch")
                .about("Resolve and download packages without indexing")
                .args(selection_args())
                .args(fetch_args()),
        )
        .subcommand(
            Command::new("index")
                .about("Regenerate Packages and Packages.gz for a directory of .deb files")
                .arg(Arg::new("directory").required(true).help("Repository directory")),
        )
        .subcommand(
            Command::new("build")
                .about("Resolve, download and index (the full pipeline)")
                .args(selection_args())
                .args(fetch_args())
                .arg(
                    Arg::new("report")
                        .long("report")
                        .value_name("PATH")
                        .help("Also write a JSON run report to this path"),
                ),
        )
        .subcommand(Command::new("show-config").about("Print the effective configuration as TOML"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("isoseed.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
