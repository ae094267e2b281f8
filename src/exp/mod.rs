// src/exp/mod.rs

//! The experiment aggregate: all metadata gathered and produced during
//! post-processing, and the typed per-step output record used to resume
//! an interrupted run.
//!
//! - [`antenna`] holds the antennas and their status flags.
//! - [`source`] holds the observed sources and role tags.
//! - [`pass`] holds the correlator passes and frequency setups.
//! - [`report`] holds the step identifiers and per-step payload schemas.

pub mod antenna;
pub mod pass;
pub mod report;
pub mod source;

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use antenna::{Antenna, AntennaSet};
pub use pass::{CorrelatorPass, FlagWeight, Subbands};
pub use report::{StepId, StepReport, ToolRun};
pub use source::{Source, SourceKind};

/// Credentials protecting the archived data of one experiment during the
/// proprietary period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// One experiment's full post-processing state.
///
/// Constructed once per experiment name, either fresh or rehydrated from
/// the metadata store; mutated only by step implementations and by the
/// `edit` surface; never deleted (the finished record is the audit trail
/// of the run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    name: String,
    /// Name of the real-time run this experiment was observed under, when
    /// it differs from the experiment's own name.
    pub realtime_name: Option<String>,
    pub supsci: String,
    pub pi_names: Vec<String>,
    pub pi_emails: Vec<String>,
    /// Observation start date in YYMMDD, from the correlator catalogue.
    pub obs_date: String,
    /// Date this record was first created.
    pub processed_on: NaiveDate,
    pub time_range: Option<(NaiveDateTime, NaiveDateTime)>,
    pub antennas: AntennaSet,
    pub ref_antennas: Vec<String>,
    /// Sources to use for the standard plots; falls back to the
    /// fringe finders when unset.
    pub plot_sources: Option<Vec<String>>,
    pub sources: Vec<Source>,
    pub passes: Vec<CorrelatorPass>,
    pub credentials: Option<Credentials>,
    /// Whether a cover letter already existed before this run.
    pub letter_existed: bool,
    /// Whether a file listing already existed before this run.
    pub listing_existed: bool,
    stored_outputs: BTreeMap<StepId, StepReport>,
    pub tool_runs: BTreeMap<String, ToolRun>,
}

impl Experiment {
    /// Create a fresh experiment record. The name is uppercased and fixed
    /// for the lifetime of the record.
    pub fn new(name: &str, supsci: &str) -> Self {
        Self {
            name: name.trim().to_uppercase(),
            realtime_name: None,
            supsci: supsci.trim().to_lowercase(),
            pi_names: Vec::new(),
            pi_emails: Vec::new(),
            obs_date: String::new(),
            processed_on: chrono::Local::now().date_naive(),
            time_range: None,
            antennas: AntennaSet::new(),
            ref_antennas: Vec::new(),
            plot_sources: None,
            sources: Vec::new(),
            passes: Vec::new(),
            credentials: None,
            letter_existed: false,
            listing_existed: false,
            stored_outputs: BTreeMap::new(),
            tool_runs: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercase form used in file names (`n19c3.expsum`, `n19c3.ms`, ...).
    pub fn lowname(&self) -> String {
        self.name.to_lowercase()
    }

    /// The name the correlator knows this experiment by: the real-time run
    /// name when there is one, the experiment name otherwise.
    pub fn corr_name(&self) -> &str {
        self.realtime_name.as_deref().unwrap_or(&self.name)
    }

    /// Observation start as a date, when the catalogue lookup has run.
    pub fn obs_datetime(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.obs_date, "%y%m%d").ok()
    }

    /// Session directory name on the logs host (e.g. `feb25`).
    pub fn session_dir(&self) -> Option<String> {
        self.obs_datetime()
            .map(|d| d.format("%b%y").to_string().to_lowercase())
    }

    /// Sources to use for the standard plots: the operator's explicit pick,
    /// or every fringe finder.
    pub fn sources_for_plots(&self) -> Vec<String> {
        match &self.plot_sources {
            Some(picked) => picked.clone(),
            None => self
                .sources
                .iter()
                .filter(|s| s.kind == SourceKind::FringeFinder)
                .map(|s| s.name.clone())
                .collect(),
        }
    }

    /// Record a step's result, replacing any previous output of the same
    /// step. The report's own variant fixes the key, so an entry can never
    /// land under the wrong step.
    pub fn record_report(&mut self, report: StepReport) {
        self.stored_outputs.insert(report.step(), report);
    }

    pub fn report_for(&self, step: StepId) -> Option<&StepReport> {
        self.stored_outputs.get(&step)
    }

    pub fn has_completed(&self, step: StepId) -> bool {
        self.stored_outputs.contains_key(&step)
    }

    /// The most advanced step with a recorded output, by step order (not
    /// by insertion time, so a stale re-run of an early step is never
    /// misreported).
    pub fn last_step(&self) -> Option<StepId> {
        self.stored_outputs.keys().next_back().copied()
    }

    pub fn stored_outputs(&self) -> &BTreeMap<StepId, StepReport> {
        &self.stored_outputs
    }

    pub fn record_tool_run(&mut self, run: ToolRun) {
        self.tool_runs.insert(run.command.clone(), run);
    }

    /// Merge the content of an experiment summary (`.expsum`) file:
    /// PI names and addresses, scheduled antennas, and the source list.
    ///
    /// Unrecognized lines are skipped; a malformed `src =` line is an
    /// error since a wrong source table would leak protected sources.
    pub fn apply_expsum(&mut self, text: &str) -> crate::errors::Result<()> {
        for line in text.lines() {
            if let Some(rest) = line.split_once("Principal Investigator:").map(|x| x.1) {
                // Expected: 'Principal Investigator: SURNAME (EMAIL)'
                if let Some((name, email)) = split_name_email(rest) {
                    if !self.pi_names.contains(&name) {
                        self.pi_names.push(name);
                        self.pi_emails.push(email);
                    }
                }
            } else if line.contains("co-I information") {
                let rest = line.replace("co-I information", "").replace(':', "");
                if let Some((name, email)) = split_name_email(&rest) {
                    if !self.pi_names.contains(&name) {
                        self.pi_names.push(name);
                        self.pi_emails.push(email);
                    }
                }
            } else if let Some(rest) = line.split_once("scheduled telescopes:").map(|x| x.1) {
                for code in rest.split_whitespace() {
                    if let Some(ant) = self.antennas.get_mut(code) {
                        ant.scheduled = true;
                    } else {
                        self.antennas.upsert(Antenna::scheduled(code));
                    }
                }
            } else if line.contains("src = ") {
                let source = parse_expsum_source(line)?;
                if !self.sources.iter().any(|s| s.name == source.name) {
                    self.sources.push(source);
                }
            }
        }

        Ok(())
    }
}

/// Split `" SURNAME  (EMAIL)"` into its parts.
fn split_name_email(rest: &str) -> Option<(String, String)> {
    let (name, tail) = rest.split_once('(')?;
    let email = tail.split(')').next()?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), email.trim().to_string()))
}

/// Parse one `src = NAME, type = TYPE (...), use = YES/NO (...)` line.
fn parse_expsum_source(line: &str) -> crate::errors::Result<Source> {
    let mut name = None;
    let mut kind = SourceKind::Other;
    let mut protected = false;

    for field in line.split(',') {
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        let value = value.split('(').next().unwrap_or("").trim();
        match key.trim() {
            "src" => name = Some(value.to_string()),
            "type" => {
                kind = value.parse().unwrap_or_else(|_| {
                    warn!(kind = %value, "unknown source type in summary; treating as other");
                    SourceKind::Other
                });
            }
            // 'use = YES' means freely usable, i.e. NOT protected.
            "use" => match value {
                "YES" => protected = false,
                "NO" => protected = true,
                other => {
                    return Err(crate::errors::PostError::InvalidValue {
                        field: "expsum".to_string(),
                        reason: format!("unknown 'use' value '{other}'"),
                    });
                }
            },
            _ => {}
        }
    }

    let name = name.ok_or_else(|| crate::errors::PostError::InvalidValue {
        field: "expsum".to_string(),
        reason: format!("source line without a name: '{line}'"),
    })?;

    Ok(Source::new(name, kind, protected))
}
