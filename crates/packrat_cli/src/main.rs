//! packrat — a content-addressed cache for compiled Go build artifacts.
//!
//! Provides `packrat save` to stash freshly built artifacts into the cache,
//! `packrat restore` to relink them into place on a later invocation with
//! identical inputs, and `packrat clear` to drop the cache wholesale.
//! packrat never compiles anything; it decides whether a previously
//! produced artifact can be reused and manages its durable storage.

#![warn(missing_docs)]

mod clear;
mod golist;
mod report;
mod restore;
mod save;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use packrat_graph::UnitRequest;

/// packrat — cache compiled build artifacts across invocations.
#[derive(Parser, Debug)]
#[command(name = "packrat", version, about = "Content-addressed build artifact cache")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Save installed artifacts for the requested units into the cache.
    Save(UnitArgs),
    /// Restore cached artifacts for the requested units.
    Restore(UnitArgs),
    /// Delete the entire cache directory.
    Clear,
}

/// Unit requests shared by `save` and `restore`.
#[derive(Parser, Debug)]
pub struct UnitArgs {
    /// Units to operate on, as `path` or `path:opt1,opt2`
    /// (e.g. `./cmd/server` or `example.com/lib:race`).
    /// Defaults to the current working unit.
    pub units: Vec<String>,
}

impl UnitArgs {
    /// Parses the requested units, defaulting to `.`.
    pub fn requests(&self) -> Vec<UnitRequest> {
        if self.units.is_empty() {
            vec![UnitRequest::parse(".")]
        } else {
            self.units.iter().map(|u| UnitRequest::parse(u)).collect()
        }
    }
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose information.
    pub verbose: bool,
}

/// Resolves the cache directory: `PACKRAT_CACHE` when set, otherwise the
/// user cache directory under the invoking user's home.
pub fn cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PACKRAT_CACHE") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    directories::ProjectDirs::from("", "", "packrat")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".packrat-cache"))
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    let result = match cli.command {
        Command::Save(ref args) => save::run(args, &global),
        Command::Restore(ref args) => restore::run(args, &global),
        Command::Clear => clear::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
