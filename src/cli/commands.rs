//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// EcoFarm incremental ETL
#[derive(Parser, Debug)]
#[command(name = "ecofarm-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (YAML)
    #[arg(short, long, global = true, env = "ETL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Raw bucket URL (overrides the config file)
    #[arg(long, global = true, env = "RAW_BUCKET")]
    pub raw_bucket: Option<String>,

    /// Processed bucket URL (overrides the config file)
    #[arg(long, global = true, env = "PROC_BUCKET")]
    pub proc_bucket: Option<String>,

    /// Checkpoint object key (overrides the config file)
    #[arg(long, global = true, env = "CHECKPOINT_FILE")]
    pub checkpoint_key: Option<String>,

    /// Time dimension object key (overrides the config file)
    #[arg(long, global = true, env = "TIME_DIM_KEY")]
    pub time_dim_key: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process new raw objects for every source and commit the checkpoint
    Run {
        /// Processing time used for artifact names (RFC 3339, default now)
        #[arg(long)]
        run_timestamp: Option<String>,
    },

    /// Inspect or reset the checkpoint
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },

    /// Manage the time dimension table
    TimeDim {
        #[command(subcommand)]
        action: TimeDimAction,
    },

    /// Validate the configuration
    Validate,

    /// List configured sources
    Sources,
}

/// Checkpoint subcommands
#[derive(Subcommand, Debug)]
pub enum CheckpointAction {
    /// Print the stored watermarks
    Show,

    /// Drop watermarks so sources are reprocessed
    Reset {
        /// Source to reset (repeatable, default all)
        #[arg(long)]
        source: Vec<String>,
    },
}

/// Time dimension subcommands
#[derive(Subcommand, Debug)]
pub enum TimeDimAction {
    /// Generate the calendar if it does not exist
    Generate {
        /// Regenerate and merge into an existing table
        #[arg(long)]
        force: bool,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON
    Json,
    /// Indented JSON
    Pretty,
}
