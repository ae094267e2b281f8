// src/exp/report.rs

//! Step identifiers and their typed result payloads.
//!
//! The per-step outputs are not an open-ended map of free-form values:
//! every step stores a [`StepReport`] variant with its own schema, keyed
//! by [`StepId`]. The `Ord` on `StepId` follows the declaration order,
//! which **is** the processing order, so "last completed step" is simply
//! the maximum recorded key.

use serde::{Deserialize, Serialize};

/// The fixed, totally ordered catalogue of step names.
///
/// Declaration order defines the processing order; do not reorder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StepId {
    /// Set up directories, fetch summary/letter files, catalogue lookup.
    Setup,
    /// Create and retrieve the correlator file listings; derive passes.
    Listing,
    /// Validate the listings; manual-edit checkpoint.
    Checklisting,
    /// Retrieve the correlated data per pass.
    Fetch,
    /// Convert to measurement sets and read the observation setup back.
    Convert,
    /// Produce and review the standard plots.
    Plot,
    /// Measurement-set operations: flagging, swaps, bit-depth fixes.
    Msops,
    /// Convert to the archive format; polarization-conversion checkpoint.
    Fitsidi,
    /// Archive plots and data products.
    Archive,
    /// Collect station calibration/log files; editor checkpoint.
    Antab,
    /// Prepare the pipeline input files.
    Pipeinputs,
    /// Run the calibration pipeline.
    Pipeline,
    /// Post-pipeline bookkeeping and review.
    Postpipe,
    /// Final letters and completion mark.
    Finalize,
}

impl StepId {
    /// All steps in processing order.
    pub const ALL: [StepId; 14] = [
        StepId::Setup,
        StepId::Listing,
        StepId::Checklisting,
        StepId::Fetch,
        StepId::Convert,
        StepId::Plot,
        StepId::Msops,
        StepId::Fitsidi,
        StepId::Archive,
        StepId::Antab,
        StepId::Pipeinputs,
        StepId::Pipeline,
        StepId::Postpipe,
        StepId::Finalize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StepId::Setup => "setup",
            StepId::Listing => "listing",
            StepId::Checklisting => "checklisting",
            StepId::Fetch => "fetch",
            StepId::Convert => "convert",
            StepId::Plot => "plot",
            StepId::Msops => "msops",
            StepId::Fitsidi => "fitsidi",
            StepId::Archive => "archive",
            StepId::Antab => "antab",
            StepId::Pipeinputs => "pipeinputs",
            StepId::Pipeline => "pipeline",
            StepId::Postpipe => "postpipe",
            StepId::Finalize => "finalize",
        }
    }

    pub fn from_name(name: &str) -> Option<StepId> {
        StepId::ALL
            .iter()
            .copied()
            .find(|s| s.name() == name.trim().to_lowercase())
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed result payload of one step, recorded under the step's key in the
/// experiment's stored outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepReport {
    Setup {
        obs_date: String,
        realtime_name: Option<String>,
        letter_existed: bool,
        listing_existed: bool,
        credentials_set: bool,
    },
    Listing {
        listings: Vec<String>,
        passes: usize,
    },
    Checklisting {
        issues: Vec<String>,
    },
    Fetch {
        passes_fetched: usize,
    },
    Convert {
        measurement_sets: Vec<String>,
    },
    Plot {
        plot_files: Vec<String>,
        sources: Vec<String>,
    },
    Msops {
        threshold: f64,
        flagged_percent: f64,
        polswap: Vec<String>,
        onebit: Vec<String>,
        polconvert: Vec<String>,
    },
    Fitsidi {
        fits_files: Vec<String>,
    },
    Archive {
        archived: Vec<String>,
    },
    Antab {
        logs_found: Vec<String>,
        antab_found: Vec<String>,
        missing: Vec<String>,
    },
    Pipeinputs {
        input_files: Vec<String>,
    },
    Pipeline {
        passes_run: usize,
    },
    Postpipe {
        reviewed: bool,
    },
    Finalize {
        notified: Vec<String>,
    },
}

impl StepReport {
    /// The step this report belongs to. Keeping the mapping here means a
    /// report can never be stored under the wrong key.
    pub fn step(&self) -> StepId {
        match self {
            StepReport::Setup { .. } => StepId::Setup,
            StepReport::Listing { .. } => StepId::Listing,
            StepReport::Checklisting { .. } => StepId::Checklisting,
            StepReport::Fetch { .. } => StepId::Fetch,
            StepReport::Convert { .. } => StepId::Convert,
            StepReport::Plot { .. } => StepId::Plot,
            StepReport::Msops { .. } => StepId::Msops,
            StepReport::Fitsidi { .. } => StepId::Fitsidi,
            StepReport::Archive { .. } => StepId::Archive,
            StepReport::Antab { .. } => StepId::Antab,
            StepReport::Pipeinputs { .. } => StepId::Pipeinputs,
            StepReport::Pipeline { .. } => StepId::Pipeline,
            StepReport::Postpipe { .. } => StepId::Postpipe,
            StepReport::Finalize { .. } => StepId::Finalize,
        }
    }

    /// One-line summary used by the `info` report.
    pub fn summary(&self) -> String {
        match self {
            StepReport::Setup {
                obs_date,
                realtime_name,
                ..
            } => match realtime_name {
                Some(rt) => format!("observed {obs_date} (real-time run {rt})"),
                None => format!("observed {obs_date}"),
            },
            StepReport::Listing { listings, passes } => {
                format!("{} listing(s), {} pass(es)", listings.len(), passes)
            }
            StepReport::Checklisting { issues } => {
                if issues.is_empty() {
                    "listings clean".to_string()
                } else {
                    format!("{} issue(s) accepted", issues.len())
                }
            }
            StepReport::Fetch { passes_fetched } => {
                format!("data fetched for {passes_fetched} pass(es)")
            }
            StepReport::Convert { measurement_sets } => {
                format!("measurement sets: {}", measurement_sets.join(", "))
            }
            StepReport::Plot { plot_files, sources } => {
                format!("{} plot(s) on {}", plot_files.len(), sources.join(","))
            }
            StepReport::Msops {
                threshold,
                flagged_percent,
                ..
            } => format!("threshold {threshold}, {flagged_percent}% flagged"),
            StepReport::Fitsidi { fits_files } => {
                format!("archive files: {}", fits_files.join(", "))
            }
            StepReport::Archive { archived } => format!("archived: {}", archived.join(", ")),
            StepReport::Antab {
                antab_found,
                missing,
                ..
            } => format!(
                "antab for {}; missing {}",
                antab_found.join(","),
                if missing.is_empty() {
                    "none".to_string()
                } else {
                    missing.join(",")
                }
            ),
            StepReport::Pipeinputs { input_files } => {
                format!("inputs: {}", input_files.join(", "))
            }
            StepReport::Pipeline { passes_run } => {
                format!("pipeline run for {passes_run} pass(es)")
            }
            StepReport::Postpipe { reviewed } => {
                if *reviewed {
                    "results reviewed".to_string()
                } else {
                    "awaiting review".to_string()
                }
            }
            StepReport::Finalize { notified } => format!("letters to {}", notified.join(", ")),
        }
    }
}

/// Record of one ad-hoc `exec` tool invocation. These live outside the
/// ordered step outputs and never affect `last`/precondition checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRun {
    pub command: String,
    pub args: Vec<String>,
    pub host: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub ran_at: chrono::NaiveDateTime,
}
