// src/steps/mod.rs

//! Step catalogue, state machine and step implementations.
//!
//! - [`registry`] holds the fixed step ordering and range derivation.
//! - [`runner`] contains the resumable step-sequencing state machine.
//! - [`correlator`] implements the steps talking to the correlator host.
//! - [`processing`] implements the local conversion/plotting/archiving
//!   steps.
//! - [`pipeline`] implements the steps on the calibration pipeline host.

pub mod correlator;
pub mod pipeline;
pub mod processing;
pub mod registry;
pub mod runner;

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::ConfigFile;
use crate::dialog::Dialog;
use crate::errors::Result;
use crate::exp::{Experiment, StepId, StepReport};
use crate::remote::{run_checked, CmdOutput, Host, RemoteExecutor};

pub use registry::{StepDef, StepRegistry};
pub use runner::{RunSummary, RunnerState, StepRunner};

/// How one step attempt ended.
#[derive(Debug)]
pub enum StepOutcome {
    /// The step finished; record this report and move on.
    Done(StepReport),
    /// The operator asked to redo the step at a checkpoint.
    Repeat,
    /// Manual work outside the tool is required before the run can
    /// continue; stop cleanly with this message.
    Hold(String),
}

/// Everything a step implementation needs: configuration, the command
/// executor, the operator dialog and the experiment working directory.
pub struct StepContext<'a> {
    pub config: &'a ConfigFile,
    pub remote: &'a dyn RemoteExecutor,
    pub dialog: &'a mut dyn Dialog,
    pub workdir: PathBuf,
}

impl StepContext<'_> {
    pub fn correlator(&self) -> Host {
        Host::from_config(&self.config.hosts.correlator)
    }

    pub fn pipeline_host(&self) -> Host {
        Host::from_config(&self.config.hosts.pipeline)
    }

    pub fn archive_host(&self) -> Host {
        Host::from_config(&self.config.hosts.archive)
    }

    pub fn logs_host(&self) -> Host {
        Host::from_config(&self.config.hosts.logs)
    }

    /// Run a command, append it to the experiment's command notebook and
    /// fail on a non-zero exit.
    pub async fn run(&self, host: &Host, command: &str, args: &[&str]) -> Result<CmdOutput> {
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        self.notebook(&shown_command(host, command, &owned));
        run_checked(self.remote, host, command, &owned).await
    }

    /// Run a command without treating a non-zero exit as an error.
    pub async fn run_unchecked(
        &self,
        host: &Host,
        command: &str,
        args: &[&str],
    ) -> Result<CmdOutput> {
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        self.notebook(&shown_command(host, command, &owned));
        self.remote.execute(host, command, &owned).await
    }

    pub async fn file_exists(&self, host: &Host, path: &str) -> Result<bool> {
        self.remote.file_exists(host, path).await
    }

    pub async fn copy(&self, from: &str, to: &str) -> Result<()> {
        self.notebook(&format!("scp {from} {to}"));
        self.remote.copy(from, to).await
    }

    /// Append an entry to `processing.log` in the working directory, the
    /// operator's replayable notebook of everything that ran.
    pub fn notebook(&self, entry: &str) {
        use std::io::Write;

        let path = self.workdir.join("processing.log");
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{entry}"));

        if let Err(err) = result {
            warn!(path = %path.display(), error = %err, "could not update the command notebook");
        }
    }

    /// Names of files in the working directory ending with `suffix`,
    /// sorted for stable ordering.
    pub fn local_files_ending_with(&self, suffix: &str) -> Result<Vec<String>> {
        local_files_ending_with(&self.workdir, suffix)
    }
}

/// Names of files in `dir` ending with `suffix`, sorted.
pub fn local_files_ending_with(dir: &Path, suffix: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if !dir.exists() {
        return Ok(names);
    }

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(suffix) {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

fn shown_command(host: &Host, command: &str, args: &[String]) -> String {
    let line = if args.is_empty() {
        command.to_string()
    } else {
        format!("{command} {}", args.join(" "))
    };

    if host.is_local() {
        line
    } else {
        format!("ssh {} \"{line}\"", host.as_str())
    }
}

/// Dispatch one step to its implementation.
pub async fn execute_step(
    id: StepId,
    ctx: &mut StepContext<'_>,
    exp: &mut Experiment,
) -> Result<StepOutcome> {
    match id {
        StepId::Setup => processing::setup(ctx, exp).await,
        StepId::Listing => correlator::listing(ctx, exp).await,
        StepId::Checklisting => correlator::checklisting(ctx, exp).await,
        StepId::Fetch => processing::fetch(ctx, exp).await,
        StepId::Convert => processing::convert(ctx, exp).await,
        StepId::Plot => processing::plot(ctx, exp).await,
        StepId::Msops => processing::msops(ctx, exp).await,
        StepId::Fitsidi => processing::fitsidi(ctx, exp).await,
        StepId::Archive => processing::archive(ctx, exp).await,
        StepId::Antab => pipeline::antab(ctx, exp).await,
        StepId::Pipeinputs => pipeline::pipeinputs(ctx, exp).await,
        StepId::Pipeline => pipeline::run_pipeline(ctx, exp).await,
        StepId::Postpipe => pipeline::postpipe(ctx, exp).await,
        StepId::Finalize => pipeline::finalize(ctx, exp).await,
    }
}
