//! Command-line arguments and subcommands for the `cbsgen` binary.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "cbsgen",
    version,
    about = "Parse CBS funcon specifications and lower them to interpreter node specs."
)]
pub struct CbsArgs {
    /// YAML configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log debug events (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse files or directories and report declaration counts.
    Parse {
        /// Files or directories; defaults to the configured funcon directory.
        paths: Vec<PathBuf>,
        /// Print the parsed document as JSON instead of counts.
        #[arg(long)]
        json: bool,
        /// Write one JSON dump per file into this directory.
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },
    /// Parse, then lower every funcon and datatype to a node spec.
    Lower {
        paths: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Parse and lower, reporting errors only.
    Check { paths: Vec<PathBuf> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}
