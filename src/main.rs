//! wiregen - Command-line tool generating Go wiring code from annotated sources.
//!
//! Scans a Go project for Fiber/Gin handler methods carrying `@Router` annotations and
//! for `Provide*` constructors, then writes a route registration file and an aggregated
//! Wire provider set.
//!
//! # Usage
//!
//! ```bash
//! wiregen [OPTIONS] <COMMAND>
//! ```
//!
//! # Examples
//!
//! Print what would be generated:
//! ```bash
//! wiregen scan
//! ```
//!
//! Write both generated files:
//! ```bash
//! wiregen generate
//! ```
//!
//! Write a JSON report with verbose logging:
//! ```bash
//! wiregen -v scan -f json -o scan.json
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use wiregen::cli;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("wiregen starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    Ok(())
}
