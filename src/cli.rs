//! CLI argument parsing for blocksync

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// blocksync - delta-download files over HTTP using zsync control files
#[derive(Parser, Debug)]
#[command(name = "blocksync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize a local file from a remote control file
    Sync(SyncArgs),

    /// Generate a control file for a local file
    Make(MakeArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Arguments for the sync command
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// URL of the control file (.zsync)
    pub control: String,

    /// Output directory [default: current directory]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the target file URL from the control file
    #[arg(short = 'u', long)]
    pub url: Option<String>,

    /// Show progress
    #[arg(short = 'P', long)]
    pub progress: bool,

    /// Path to a configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the make command
#[derive(Parser, Debug)]
pub struct MakeArgs {
    /// File to generate a control file for
    pub file: PathBuf,

    /// Output path [default: <file>.zsync]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Block size in bytes
    #[arg(short, long, default_value = "2048")]
    pub block_size: usize,

    /// URL to embed in the control file
    #[arg(short = 'u', long)]
    pub url: Option<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Print the default configuration file path
    #[arg(long)]
    pub path: bool,

    /// Write a default configuration file
    #[arg(long)]
    pub init: bool,
}
