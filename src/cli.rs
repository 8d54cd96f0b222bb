//! Command-line interface for doicache
//!
//! Parses arguments with clap, turns them into a [`RunConfig`], and drives
//! batch resolution of identifiers read from arguments, a file or stdin.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::config::{default_db_path, CacheConfig, HttpConfig, DEFAULT_ENDPOINT};
use crate::error::{Error, Result, StoreError};
use crate::store::Store;
use crate::transport::Transport;
use crate::Cache;

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The TTL string is not a duration
    #[error("Invalid TTL: '{0}'. Use a number of seconds or units like 2880h, 30d, 1h30m")]
    InvalidTtl(String),

    /// The map size is not a positive number of MiB
    #[error("Invalid map size: '{0}'. Use a positive number of MiB, e.g. 4096")]
    InvalidMapSize(String),

    /// No --db given and no home directory to derive a default from
    #[error("No database directory: pass --db")]
    NoDatabasePath,
}

/// doicache - Resolve DOIs to redirect URLs through a local cache
#[derive(Parser, Debug)]
#[command(name = "doicache")]
#[command(about = "Resolve DOIs to redirect URLs, caching handle API responses locally")]
#[command(version)]
pub struct Cli {
    /// DOIs to resolve, or a file with one DOI per line; reads stdin if empty
    #[arg(value_name = "DOI_OR_FILE")]
    pub inputs: Vec<String>,

    /// Database directory [default: ~/.cache/doicache/default]
    #[arg(long, value_name = "DIR")]
    pub db: Option<PathBuf>,

    /// Entry expiration, e.g. 2880h, 30d, 1h30m, or plain seconds
    #[arg(long, value_name = "DURATION", default_value = "2880h", value_parser = parse_ttl)]
    pub ttl: Duration,

    /// Maximum database size in MiB; raise it when the store reports being full
    #[arg(long, value_name = "MIB", default_value = "1024", value_parser = parse_map_size)]
    pub map_size: usize,

    /// Handle API endpoint
    #[arg(long, value_name = "URL", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Retries for failed or 429/5xx requests
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub retries: u32,

    /// Be verbose
    #[arg(short, long)]
    pub verbose: bool,

    /// List all cached keys and exit
    #[arg(long, conflicts_with = "dump")]
    pub list_keys: bool,

    /// List all cached keys with their redirect URL and exit
    #[arg(long)]
    pub dump: bool,

    /// Skip DOIs that have no redirect or fail with an HTTP status instead of stopping
    #[arg(long)]
    pub keep_going: bool,
}

/// Where identifiers to resolve come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Identifiers given directly as arguments
    Args(Vec<String>),
    /// A file with one identifier per line
    File(PathBuf),
    /// Standard input, one identifier per line
    Stdin,
}

/// What the program should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Resolve(Input),
    ListKeys,
    Dump,
}

/// Everything needed to run, derived from CLI arguments
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub db_path: PathBuf,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub mode: Mode,
    pub keep_going: bool,
}

impl RunConfig {
    /// Creates a RunConfig from parsed CLI arguments
    ///
    /// # Returns
    /// * `Ok(RunConfig)` with the selected mode and settings
    /// * `Err(CliError::NoDatabasePath)` if no database directory can be determined
    pub fn from_cli(cli: &Cli) -> std::result::Result<Self, CliError> {
        let db_path = match &cli.db {
            Some(path) => path.clone(),
            None => default_db_path().ok_or(CliError::NoDatabasePath)?,
        };

        let mode = if cli.list_keys {
            Mode::ListKeys
        } else if cli.dump {
            Mode::Dump
        } else {
            Mode::Resolve(select_input(&cli.inputs))
        };

        Ok(RunConfig {
            db_path,
            cache: CacheConfig::default()
                .with_endpoint(cli.endpoint.clone())
                .with_ttl(cli.ttl)
                .with_map_size(cli.map_size),
            http: HttpConfig::default()
                .with_timeout(Duration::from_secs(cli.timeout))
                .with_max_retries(cli.retries),
            mode,
            keep_going: cli.keep_going,
        })
    }
}

/// An existing file as first argument is read line by line; anything else is
/// taken as a list of identifiers.
fn select_input(inputs: &[String]) -> Input {
    match inputs.first() {
        None => Input::Stdin,
        Some(first) if Path::new(first).is_file() => Input::File(PathBuf::from(first)),
        Some(_) => Input::Args(inputs.to_vec()),
    }
}

/// Parses a TTL such as `2880h`, `30d`, `1h30m` or `3600`
///
/// Units are `s`, `m`, `h` and `d`; a bare number means seconds.
pub fn parse_ttl(s: &str) -> std::result::Result<Duration, CliError> {
    let invalid = || CliError::InvalidTtl(s.to_string());
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total: u64 = 0;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let factor = match &rest[..unit_len] {
            "s" => 1,
            "m" => 60,
            "h" => 60 * 60,
            "d" => 24 * 60 * 60,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];

        total = value
            .checked_mul(factor)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(invalid)?;
    }
    Ok(Duration::from_secs(total))
}

/// Parses a map size given in MiB into bytes
pub fn parse_map_size(s: &str) -> std::result::Result<usize, CliError> {
    let invalid = || CliError::InvalidMapSize(s.to_string());
    let mib: usize = s.trim().parse().map_err(|_| invalid())?;
    if mib == 0 {
        return Err(invalid());
    }
    mib.checked_mul(1024 * 1024).ok_or_else(invalid)
}

/// Reads identifiers from a line-oriented source, trimming and skipping blanks
pub fn read_identifiers<R: BufRead>(reader: R) -> impl Iterator<Item = std::io::Result<String>> {
    reader
        .lines()
        .map(|line| line.map(|l| l.trim().to_string()))
        .filter(|line| !matches!(line, Ok(l) if l.is_empty()))
}

/// Counts of a finished batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub resolved: usize,
    pub skipped: usize,
}

/// Resolves every identifier and writes one redirect URL per line to `out`
///
/// With `keep_going`, identifiers without a redirect, answered with an HTTP
/// error status, or rejected by the store as keys are logged and skipped.
/// Every other error stops the batch.
pub fn resolve_all<S, T, I, W>(
    cache: &Cache<S, T>,
    identifiers: I,
    keep_going: bool,
    mut out: W,
) -> Result<BatchSummary>
where
    S: Store,
    T: Transport,
    I: IntoIterator<Item = std::io::Result<String>>,
    W: Write,
{
    let mut summary = BatchSummary::default();
    for identifier in identifiers {
        let identifier = identifier?;
        match cache.resolve(&identifier) {
            Ok(url) => {
                writeln!(out, "{url}")?;
                summary.resolved += 1;
            }
            Err(err) if keep_going && is_skippable(&err) => {
                tracing::warn!(doi = %identifier, error = %err, "skipping");
                summary.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }
    out.flush()?;
    Ok(summary)
}

fn is_skippable(err: &Error) -> bool {
    err.is_no_redirect()
        || matches!(
            err,
            Error::Protocol { .. }
                | Error::Store(StoreError::KeyTooLarge { .. } | StoreError::EmptyKey)
        )
}
