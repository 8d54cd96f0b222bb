//! doicache - Resolve DOIs to redirect URLs
//!
//! Looks up each DOI in a local LMDB cache of doi.org handle API responses,
//! fetching and storing responses that are missing or expired, and prints one
//! redirect URL per line.

use std::fs::File;
use std::io::{self, BufReader};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use doicache::cli::{read_identifiers, resolve_all, Cli, Input, Mode, RunConfig};
use doicache::Cache;

/// Installs the stderr log subscriber
///
/// `--verbose` turns on debug output for this crate; otherwise `RUST_LOG`
/// applies, defaulting to warnings only.
fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("doicache=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cache: &Cache, config: &RunConfig) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = io::stdout().lock();
    match &config.mode {
        Mode::ListKeys => cache.dump_keys(stdout)?,
        Mode::Dump => cache.dump_key_values(stdout)?,
        Mode::Resolve(input) => {
            let summary = match input {
                Input::Args(ids) => resolve_all(
                    cache,
                    ids.iter().cloned().map(Ok),
                    config.keep_going,
                    stdout,
                )?,
                Input::File(path) => {
                    let reader = BufReader::new(File::open(path)?);
                    resolve_all(cache, read_identifiers(reader), config.keep_going, stdout)?
                }
                Input::Stdin => {
                    let reader = io::stdin().lock();
                    resolve_all(cache, read_identifiers(reader), config.keep_going, stdout)?
                }
            };
            tracing::debug!(
                resolved = summary.resolved,
                skipped = summary.skipped,
                "batch finished"
            );
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = RunConfig::from_cli(&cli)?;
    let cache = Cache::open(&config.db_path, config.cache.clone(), config.http.clone())?;
    tracing::debug!(db = %cache.path().display(), "cache opened");

    let result = run(&cache, &config);
    cache.close()?;
    result
}
