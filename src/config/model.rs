// src/config/model.rs

use serde::Deserialize;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [hosts]
/// correlator = "jops@ccs"
/// pipeline = "pipe@jop83"
///
/// [paths]
/// data_root = "/data0"
///
/// [defaults]
/// ref_antenna_priority = ["Ef", "O8"]
/// ```
///
/// All sections are optional and have defaults matching the standard
/// observatory layout.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Remote hosts from `[hosts]`.
    #[serde(default)]
    pub hosts: HostsSection,

    /// Remote path roots from `[paths]`.
    #[serde(default)]
    pub paths: PathsSection,

    /// Tuning defaults from `[defaults]`.
    #[serde(default)]
    pub defaults: DefaultsSection,
}

/// Validated configuration; obtained via `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub hosts: HostsSection,
    pub paths: PathsSection,
    pub defaults: DefaultsSection,
}

impl ConfigFile {
    /// Construct without re-validating; used by the `TryFrom` conversion
    /// and by test builders that already hold checked sections.
    pub fn new_unchecked(
        hosts: HostsSection,
        paths: PathsSection,
        defaults: DefaultsSection,
    ) -> Self {
        Self {
            hosts,
            paths,
            defaults,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            HostsSection::default(),
            PathsSection::default(),
            DefaultsSection::default(),
        )
    }
}

/// `[hosts]` section.
///
/// An empty string means "run the command locally"; anything else is an
/// ssh destination (`user@host`).
#[derive(Debug, Clone, Deserialize)]
pub struct HostsSection {
    /// Correlator host holding the experiment catalogue and file listings.
    #[serde(default = "default_correlator")]
    pub correlator: String,

    /// Host running the calibration pipeline.
    #[serde(default = "default_pipeline")]
    pub pipeline: String,

    /// Archive host holding cover letters and experiment summaries.
    #[serde(default = "default_archive")]
    pub archive: String,

    /// Host collecting station log and calibration files.
    #[serde(default = "default_logs")]
    pub logs: String,
}

fn default_correlator() -> String {
    "jops@ccs".to_string()
}

fn default_pipeline() -> String {
    "pipe@jop83".to_string()
}

fn default_archive() -> String {
    "jops@archive.jive.eu".to_string()
}

fn default_logs() -> String {
    "evn@vlbeer.ira.inaf.it".to_string()
}

impl Default for HostsSection {
    fn default() -> Self {
        Self {
            correlator: default_correlator(),
            pipeline: default_pipeline(),
            archive: default_archive(),
            logs: default_logs(),
        }
    }
}

/// `[paths]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    /// Local root under which per-operator experiment directories live.
    #[serde(default = "default_data_root")]
    pub data_root: String,

    /// Directory on the correlator host holding per-experiment data.
    #[serde(default = "default_correlator_exp_dir")]
    pub correlator_exp_dir: String,

    /// Experiment catalogue file on the correlator host.
    #[serde(default = "default_catalogue")]
    pub catalogue: String,

    /// Root of the pipeline in/out tree on the pipeline host.
    #[serde(default = "default_pipeline_root")]
    pub pipeline_root: String,

    /// Directory on the logs host holding per-session station files.
    #[serde(default = "default_log_archive_dir")]
    pub log_archive_dir: String,
}

fn default_data_root() -> String {
    "/data0".to_string()
}

fn default_correlator_exp_dir() -> String {
    "/ccs/expr".to_string()
}

fn default_catalogue() -> String {
    "/ccs/var/log2vex/MASTER_PROJECTS.LIS".to_string()
}

fn default_pipeline_root() -> String {
    "/jop83_0/pipe".to_string()
}

fn default_log_archive_dir() -> String {
    "vlbi_arch".to_string()
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            correlator_exp_dir: default_correlator_exp_dir(),
            catalogue: default_catalogue(),
            pipeline_root: default_pipeline_root(),
            log_archive_dir: default_log_archive_dir(),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsSection {
    /// Candidate reference antennas, in order of preference, used when the
    /// operator has not picked one.
    #[serde(default = "default_ref_antenna_priority")]
    pub ref_antenna_priority: Vec<String>,

    /// Whether plot files should be opened in a viewer after plotting.
    #[serde(default = "default_open_plots")]
    pub open_plots: bool,
}

fn default_ref_antenna_priority() -> Vec<String> {
    ["Ef", "O8", "Ys", "Mc", "Gb", "At", "Pt"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_open_plots() -> bool {
    true
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            ref_antenna_priority: default_ref_antenna_priority(),
            open_plots: default_open_plots(),
        }
    }
}
