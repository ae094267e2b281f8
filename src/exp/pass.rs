// src/exp/pass.rs

//! Correlator passes and their frequency setup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{PostError, Result};

/// Frequency setup of one correlator pass.
///
/// The shape invariants (`channels` has one entry per subband, the
/// frequency table has one row per subband) are enforced by the
/// constructor, so a deserialized or constructed value can be trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subbands {
    pub n_subbands: usize,
    /// Channels per subband.
    pub channels: Vec<usize>,
    /// Reference frequency per subband and channel, in Hz.
    pub frequencies: Vec<Vec<f64>>,
    /// Total bandwidth per subband, in Hz.
    pub bandwidths: Vec<f64>,
}

impl Subbands {
    pub fn new(
        channels: Vec<usize>,
        frequencies: Vec<Vec<f64>>,
        bandwidths: Vec<f64>,
    ) -> Result<Self> {
        let n_subbands = channels.len();
        if frequencies.len() != n_subbands {
            return Err(PostError::InvalidValue {
                field: "freq_setup".to_string(),
                reason: format!(
                    "frequency table has {} rows but there are {} subbands",
                    frequencies.len(),
                    n_subbands
                ),
            });
        }

        if bandwidths.len() != n_subbands {
            return Err(PostError::InvalidValue {
                field: "freq_setup".to_string(),
                reason: format!(
                    "{} bandwidth entries for {} subbands",
                    bandwidths.len(),
                    n_subbands
                ),
            });
        }

        for (i, row) in frequencies.iter().enumerate() {
            if row.len() != channels[i] {
                return Err(PostError::InvalidValue {
                    field: "freq_setup".to_string(),
                    reason: format!(
                        "subband {} has {} frequencies but {} channels",
                        i,
                        row.len(),
                        channels[i]
                    ),
                });
            }
        }

        Ok(Self {
            n_subbands,
            channels,
            frequencies,
            bandwidths,
        })
    }
}

/// One correlator pass: a file-listing / measurement-set / archive-format
/// triple, plus the pass-dependent metadata.
///
/// An experiment may carry several passes (e.g. a continuum and a spectral
/// line pass, or multiple phase centres). The first pass is the reference
/// one and produces the `_1_1` archive files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatorPass {
    /// The source file listing driving this pass.
    pub listing: PathBuf,
    /// Measurement set produced by the format converter.
    pub ms_file: PathBuf,
    /// Common name of the archive-format (FITS-IDI) files for this pass.
    pub fits_file: String,
    /// Whether this pass feeds the downstream calibration pipeline.
    pub pipeline: bool,
    /// Names of the sources present in this pass.
    pub sources: Vec<String>,
    pub freq_setup: Option<Subbands>,
    pub flag_weights: Option<FlagWeight>,
}

impl CorrelatorPass {
    pub fn new(
        listing: impl Into<PathBuf>,
        ms_file: impl Into<PathBuf>,
        fits_file: impl Into<String>,
        pipeline: bool,
    ) -> Self {
        Self {
            listing: listing.into(),
            ms_file: ms_file.into(),
            fits_file: fits_file.into(),
            pipeline,
            sources: Vec::new(),
            freq_setup: None,
            flag_weights: None,
        }
    }
}

/// Weight-flagging record: the threshold applied to the data and the
/// resulting percentage of flagged visibilities. A percentage of -1 means
/// the flagging tool has not reported yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagWeight {
    pub threshold: f64,
    pub percentage: f64,
}

impl FlagWeight {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            percentage: -1.0,
        }
    }

    pub fn computed(&self) -> bool {
        self.percentage >= 0.0
    }
}
