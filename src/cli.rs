use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tapewalk")]
#[command(about = "Read tape devices record by record, file mark by file mark")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Specify configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read the whole tape and summarize every file on it
    Scan {
        /// Tape device path (otherwise config file or $TAPE)
        #[arg(short = 'f', long, value_name = "DEVICE")]
        device: Option<String>,

        /// Read buffer size in bytes
        #[arg(long, value_name = "BYTES")]
        block_size: Option<usize>,

        /// Retries of a faulted read before giving up
        #[arg(long)]
        retries: Option<u32>,

        /// Show a progress spinner
        #[arg(short, long)]
        progress: bool,
    },

    /// Copy every tape file to a local directory
    Dump {
        /// Output directory (created if missing)
        #[arg(value_name = "OUTPUT_DIR")]
        output: PathBuf,

        /// Tape device path (otherwise config file or $TAPE)
        #[arg(short = 'f', long, value_name = "DEVICE")]
        device: Option<String>,

        /// Read buffer size in bytes
        #[arg(long, value_name = "BYTES")]
        block_size: Option<usize>,

        /// Stop after this many files
        #[arg(long)]
        max_files: Option<u64>,
    },

    /// Read to the end of the current file, then space forward over file marks
    Skip {
        /// Number of file marks to space over
        #[arg(value_name = "COUNT", default_value = "1")]
        count: u32,

        /// Tape device path (otherwise config file or $TAPE)
        #[arg(short = 'f', long, value_name = "DEVICE")]
        device: Option<String>,
    },

    /// Check tape status
    Status {
        /// Tape device path (otherwise config file or $TAPE)
        #[arg(short = 'f', long, value_name = "DEVICE")]
        device: Option<String>,

        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
