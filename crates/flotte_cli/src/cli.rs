use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "flotte",
    version,
    about = "Flotte - run ORCA/xTB calculations in parallel, one process per input file."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML configuration file. Defaults to ./flotte.toml if present.
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Append logs to this file instead of the configured one
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover input files and run every unfinished job.
    Run(RunArgs),
    /// Check finished output files for success markers.
    Audit(AuditArgs),
    /// Write a configuration file with default values.
    InitConfig(InitConfigArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Path to the ORCA executable.
    #[arg(short = 'o', long, value_name = "PATH")]
    pub executable: Option<PathBuf>,

    /// Directory containing input files.
    #[arg(short, long, value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Glob pattern for input files (e.g. "calcs/**/*.inp").
    #[arg(short, long, value_name = "GLOB")]
    pub pattern: Option<String>,

    /// Directory for output files. Defaults to each input file's directory.
    #[arg(short = 'd', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of parallel jobs.
    #[arg(
        short = 'w',
        long,
        value_name = "NUM",
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub max_workers: Option<usize>,

    /// Only search the top level of the input directory.
    #[arg(long)]
    pub no_recursive: bool,

    /// List the jobs that would be submitted, then exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Keep scratch files after successful jobs.
    #[arg(long)]
    pub no_cleanup: bool,

    /// Write a JSON run report to this path.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

/// Arguments for the `audit` subcommand.
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Directory containing output files.
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Only search the top level of the directory.
    #[arg(long)]
    pub no_recursive: bool,
}

/// Arguments for the `init-config` subcommand.
#[derive(Args, Debug)]
pub struct InitConfigArgs {
    /// Where to write the configuration file.
    #[arg(value_name = "PATH", default_value = "flotte.toml")]
    pub path: PathBuf,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}
