use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fordep", version, about = "Fortran dependency scanner.")]
pub struct Args {
    /// Directory containing the Fortran source files
    pub source: PathBuf,

    /// Start file for the scanning, relative to SOURCE
    pub start: String,

    /// Recurse to child folders
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Files to exclude, relative to SOURCE, separated by a colon
    #[arg(long)]
    pub exclude: Option<String>,

    /// Directory name (or glob) to skip when recursing; may be repeated
    #[arg(long = "exclude-dir")]
    pub exclude_dir: Vec<String>,

    /// Stop after reaching the dependencies of the start file
    #[arg(long = "stop-after-start", default_value_t = false)]
    pub stop_after_start: bool,

    /// Path to a config TOML (overrides FORDEP_CONFIG and the default locations)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format for the file list
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Print the module -> file index and exit
    #[arg(long, default_value_t = false)]
    pub dump_index: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
