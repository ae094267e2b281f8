#![allow(dead_code)]

use postcorr::exp::{Antenna, CorrelatorPass, Experiment, Source, SourceKind};

/// Builder for `Experiment` to simplify test setup.
pub struct ExperimentBuilder {
    exp: Experiment,
}

impl ExperimentBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            exp: Experiment::new(name, "test"),
        }
    }

    pub fn obs_date(mut self, yymmdd: &str) -> Self {
        self.exp.obs_date = yymmdd.to_string();
        self
    }

    pub fn realtime_name(mut self, name: &str) -> Self {
        self.exp.realtime_name = Some(name.to_string());
        self
    }

    pub fn antenna(mut self, code: &str, observed: bool) -> Self {
        let mut ant = Antenna::scheduled(code);
        ant.observed = observed;
        self.exp.antennas.upsert(ant);
        self
    }

    pub fn refant(mut self, code: &str) -> Self {
        self.exp.ref_antennas.push(code.to_string());
        self
    }

    pub fn source(mut self, name: &str, kind: SourceKind, protected: bool) -> Self {
        self.exp.sources.push(Source::new(name, kind, protected));
        self
    }

    pub fn pass(mut self, listing: &str, ms: &str, fits: &str, pipeline: bool) -> Self {
        self.exp
            .passes
            .push(CorrelatorPass::new(listing, ms, fits, pipeline));
        self
    }

    pub fn pi(mut self, name: &str, email: &str) -> Self {
        self.exp.pi_names.push(name.to_string());
        self.exp.pi_emails.push(email.to_string());
        self
    }

    pub fn build(self) -> Experiment {
        self.exp
    }
}
