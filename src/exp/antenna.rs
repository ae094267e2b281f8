// src/exp/antenna.rs

//! Antennas and their per-experiment status flags.

use serde::{Deserialize, Serialize};

/// One antenna (station) with its status flags for this experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Antenna {
    pub name: String,
    /// Listed in the observing schedule.
    pub scheduled: bool,
    /// Produced visibilities in at least one correlator pass.
    pub observed: bool,
    /// Recorded one-bit data and needs the bit-depth correction.
    pub onebit: bool,
    /// Needs its polarizations swapped.
    pub polswap: bool,
    /// Recorded linear polarization and needs conversion to circular.
    pub polconvert: bool,
    /// A station log file was found on the logs host.
    pub logs_found: bool,
    /// A calibration (antab) file was found on the logs host.
    pub antab_found: bool,
}

impl Antenna {
    pub fn scheduled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scheduled: true,
            ..Self::default()
        }
    }
}

/// The experiment's antennas, with list views per role flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntennaSet {
    antennas: Vec<Antenna>,
}

impl AntennaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an antenna; replaces any previous entry with the same name.
    pub fn upsert(&mut self, antenna: Antenna) {
        match self.antennas.iter_mut().find(|a| a.name == antenna.name) {
            Some(existing) => *existing = antenna,
            None => self.antennas.push(antenna),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Antenna> {
        self.antennas.iter().find(|a| a.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Antenna> {
        self.antennas.iter_mut().find(|a| a.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.antennas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.antennas.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Antenna> {
        self.antennas.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.antennas.iter().map(|a| a.name.clone()).collect()
    }

    fn with_flag(&self, flag: impl Fn(&Antenna) -> bool) -> Vec<String> {
        self.antennas
            .iter()
            .filter(|a| flag(a))
            .map(|a| a.name.clone())
            .collect()
    }

    pub fn observed(&self) -> Vec<String> {
        self.with_flag(|a| a.observed)
    }

    pub fn onebit(&self) -> Vec<String> {
        self.with_flag(|a| a.onebit)
    }

    pub fn polswap(&self) -> Vec<String> {
        self.with_flag(|a| a.polswap)
    }

    pub fn polconvert(&self) -> Vec<String> {
        self.with_flag(|a| a.polconvert)
    }

    pub fn logs_found(&self) -> Vec<String> {
        self.with_flag(|a| a.logs_found)
    }

    pub fn antab_found(&self) -> Vec<String> {
        self.with_flag(|a| a.antab_found)
    }

    /// Observed antennas that are missing a file flag (log or antab).
    pub fn observed_missing(&self, flag: impl Fn(&Antenna) -> bool) -> Vec<String> {
        self.antennas
            .iter()
            .filter(|a| a.observed && !flag(a))
            .map(|a| a.name.clone())
            .collect()
    }
}

/// Whether `code` looks like a valid station code: a letter followed by a
/// letter or digit (e.g. `Ef`, `O8`, `Wb`).
pub fn is_valid_antenna_code(code: &str) -> bool {
    let mut chars = code.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(a), Some(b), None) => a.is_ascii_alphabetic() && b.is_ascii_alphanumeric(),
        _ => false,
    }
}
