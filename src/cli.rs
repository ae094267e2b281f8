// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `postcorr`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "postcorr",
    version,
    about = "Resumable post-processing of correlated VLBI experiments.",
    long_about = None
)]
pub struct CliArgs {
    /// Name of the experiment to process (case insensitive).
    #[arg(short = 'e', long, value_name = "NAME")]
    pub exp: String,

    /// Identifier of the support scientist driving the run.
    ///
    /// Selects the working directory `{data_root}/{supsci}/{EXP}`.
    #[arg(long, value_name = "NAME", default_value = "jops")]
    pub supsci: String,

    /// Path to the config file (TOML).
    ///
    /// Default: `Postcorr.toml` in the current working directory; built-in
    /// defaults are used when the file does not exist.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Override the working directory for this experiment.
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `POSTCORR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands exposed on the CLI.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the post-processing steps, resuming after the last completed one.
    ///
    /// With FROM, start there instead; with FROM and TO, run only that
    /// contiguous sub-sequence.
    Run {
        /// First step to run.
        from: Option<String>,
        /// Last step to run (inclusive).
        to: Option<String>,
    },

    /// Report which steps have recorded output for the experiment.
    Info,

    /// Print the name of the last completed step.
    Last,

    /// Run a single external tool directly, outside the step ordering.
    Exec {
        /// Name of the tool to run (e.g. `standardplots`).
        tool: String,
        /// Extra parameters; when omitted, defaults are derived from the
        /// persisted metadata.
        params: Vec<String>,
    },

    /// Overwrite one experiment field after validation.
    Edit {
        /// Field name (e.g. `refant`, `polswap`, `source_kind`).
        field: String,
        /// New value; list fields take comma-separated values.
        value: String,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
