use std::path::PathBuf;

use clap::{value_parser, ArgAction, Parser, ValueEnum};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Makes a partial copy of a conda channel in a local directory.",
    arg_required_else_help = true
)]
pub struct Args {
    /// What to do with the target directory
    #[arg(value_enum)]
    pub action: Action,

    /// File with the package specs to mirror, one per line
    #[arg(long)]
    pub packages_list: Option<PathBuf>,

    /// Channel to mirror: a name on anaconda.org like "conda-forge" or a full URL
    #[arg(long)]
    pub upstream_channel: Option<String>,

    /// Directory the packages are mirrored to
    #[arg(long)]
    pub target_directory: PathBuf,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print logs and the final summary as JSON
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Path to an alternate config file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Proxy used for every request
    #[arg(short = 'P', long, global = true)]
    pub proxy: Option<String>,

    /// User agent sent with every request
    #[arg(short = 'A', long, global = true)]
    pub user_agent: Option<String>,

    /// Extra request header, as `Key: Value`
    #[arg(short = 'H', long, global = true)]
    pub header: Option<Vec<String>>,

    /// Number of packages processed at once
    #[arg(long, global = true, value_parser = value_parser!(u32).range(1..))]
    pub parallel_limit: Option<u32>,

    /// Validate packages by size only
    #[arg(long, global = true)]
    pub no_sha256: bool,

    /// Platform subdirectory to mirror; replaces the configured list
    #[arg(long = "platform", global = true)]
    pub platforms: Option<Vec<String>>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Download missing and corrupted packages, then rewrite the indexes
    Clone,
    /// Check integrity and consistency of the target directory
    Validate,
    /// List the valid packages of the target directory
    List,
    /// Report what `clone` would do without changing anything
    Check,
    /// Remove invalid and unknown files from the target directory
    Clean,
}
