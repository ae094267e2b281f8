// src/lib.rs

pub mod cli;
pub mod commands;
pub mod config;
pub mod dialog;
pub mod errors;
pub mod exp;
pub mod logging;
pub mod remote;
pub mod steps;
pub mod store;

use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use crate::cli::{CliArgs, Command};
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::ConfigFile;
use crate::dialog::TerminalDialog;
use crate::remote::SshRemote;
use crate::steps::StepRegistry;
use crate::store::MetadataStore;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the per-experiment working directory and metadata store
/// - the step registry
/// - the production executor and terminal dialog
/// and dispatches the requested subcommand.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let cfg = load_and_validate(&config_path)?;

    let workdir = working_directory(&cfg, &args);
    std::fs::create_dir_all(&workdir)?;
    debug!(workdir = %workdir.display(), "working directory resolved");

    let store = MetadataStore::new(&workdir);
    let registry = StepRegistry::standard();
    let remote = SshRemote::new();

    match &args.command {
        Command::Run { from, to } => {
            let mut dialog = TerminalDialog::new();
            commands::run_steps(
                &cfg,
                &store,
                &registry,
                &remote,
                &mut dialog,
                &args.exp,
                &args.supsci,
                from.as_deref(),
                to.as_deref(),
            )
            .await?;
        }
        Command::Info => {
            print!("{}", commands::report_info(&store, &registry, &args.exp)?);
        }
        Command::Last => {
            println!("{}", commands::report_last(&store, &args.exp)?);
        }
        Command::Exec { tool, params } => {
            commands::exec_tool(&store, &remote, &args.exp, tool, params).await?;
        }
        Command::Edit { field, value } => {
            commands::edit_field(&store, &args.exp, field, value)?;
        }
    }

    Ok(())
}

/// The per-experiment working directory: an explicit `--data-dir`, or
/// `{data_root}/{supsci}/{EXP}`.
fn working_directory(cfg: &ConfigFile, args: &CliArgs) -> PathBuf {
    match &args.data_dir {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(&cfg.paths.data_root)
            .join(args.supsci.trim().to_lowercase())
            .join(args.exp.trim().to_uppercase()),
    }
}
