use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Driver location tooling.
///
/// Runs the bulk ingestion pipeline against a dry-run sink so input files
/// can be checked before they reach a real store.
#[derive(Parser, Debug)]
#[command(name = "fleetpos", version, about = "Driver location ingestion tooling")]
pub struct CliArgs {
    /// Configuration profile (keys are read as {PROFILE}_{KEY} first)
    #[arg(long, env = "FLEETPOS_PROFILE", global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse and batch a file without writing anywhere, then print the report
    Check(CheckArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Delimited `latitude,longitude` file with a header line
    pub file: PathBuf,

    /// Records per bulk write (overrides INGEST_BATCH_SIZE)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Concurrent writers (overrides INGEST_MAX_WORKERS)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Field delimiter, a single character or `tab` (overrides INGEST_DELIMITER)
    #[arg(long)]
    pub delimiter: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
