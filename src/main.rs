//! Binary entry point for the `lpmfwd` command-line tool.
//!
//! Parses arguments with `clap`, sets the diagnostics verbosity level,
//! dispatches to the `build` / `cpe` / `lookup` subcommand, and converts
//! any `Err` into a diagnostic on stderr plus exit code 1. All resources
//! are released automatically via Rust's RAII drop; there is no manual
//! teardown step.

use clap::Parser;

use lpmfwd::cli::args::{Cli, Command};
use lpmfwd::cli::dispatch::{run_build, run_cpe, run_lookup};
use lpmfwd::diagnostics::set_display_level;

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet { 0 } else { 2 + cli.verbose as u32 };
    set_display_level(level);

    let result = match &cli.command {
        Command::Build(args) => run_build(args),
        Command::Cpe(args) => run_cpe(args),
        Command::Lookup(args) => run_lookup(args),
    };

    if let Err(e) = result {
        eprintln!("lpmfwd: error: {e:#}");
        std::process::exit(1);
    }
}
