// src/exp/source.rs

//! Observed sources and their roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of a source within the observation. Closed set: `edit` and the
/// summary parser reject anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Target,
    Calibrator,
    FringeFinder,
    Other,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Target => "target",
            SourceKind::Calibrator => "calibrator",
            SourceKind::FringeFinder => "fringefinder",
            SourceKind::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "target" => Ok(SourceKind::Target),
            "calibrator" | "reference" => Ok(SourceKind::Calibrator),
            "fringefinder" | "fringe-finder" => Ok(SourceKind::FringeFinder),
            "other" => Ok(SourceKind::Other),
            other => Err(format!(
                "unknown source kind '{other}' (expected target, calibrator, fringefinder or other)"
            )),
        }
    }
}

/// One observed source.
///
/// Protected sources must never be listed in outward-facing products such
/// as the cover letter. Only the kind may change after creation, through
/// the `edit` surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub kind: SourceKind,
    pub protected: bool,
}

impl Source {
    pub fn new(name: impl Into<String>, kind: SourceKind, protected: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            protected,
        }
    }
}
