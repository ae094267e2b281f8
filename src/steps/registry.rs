// src/steps/registry.rs

//! The fixed, totally ordered step catalogue.

use crate::errors::{PostError, Result};
use crate::exp::StepId;

/// One catalogue entry: the step and the step that must have completed
/// before it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDef {
    pub id: StepId,
    pub predecessor: Option<StepId>,
}

/// Ordered catalogue of every step, with lookup and range derivation.
#[derive(Debug, Clone)]
pub struct StepRegistry {
    steps: Vec<StepDef>,
}

impl StepRegistry {
    /// The standard post-processing sequence. Each step's predecessor is
    /// the previous step in the ordering; the first one has none.
    pub fn standard() -> Self {
        let mut steps = Vec::with_capacity(StepId::ALL.len());
        let mut previous = None;
        for id in StepId::ALL {
            steps.push(StepDef {
                id,
                predecessor: previous,
            });
            previous = Some(id);
        }
        Self { steps }
    }

    pub fn steps(&self) -> &[StepDef] {
        &self.steps
    }

    pub fn ids(&self) -> impl Iterator<Item = StepId> + '_ {
        self.steps.iter().map(|s| s.id)
    }

    /// Declared predecessor of a step.
    pub fn predecessor(&self, id: StepId) -> Option<StepId> {
        self.steps
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.predecessor)
    }

    /// Resolve a step name, failing with `UnknownStep` for anything not
    /// in the catalogue.
    pub fn lookup(&self, name: &str) -> Result<StepId> {
        StepId::from_name(name).ok_or_else(|| PostError::UnknownStep(name.to_string()))
    }

    /// The step right after `id`, if any.
    pub fn next_after(&self, id: StepId) -> Option<StepId> {
        let pos = self.steps.iter().position(|s| s.id == id)?;
        self.steps.get(pos + 1).map(|s| s.id)
    }

    /// Derive the contiguous sub-sequence `[from, to]` (inclusive); `to`
    /// defaults to the end of the catalogue. `from` must not come after
    /// `to` in the fixed ordering.
    pub fn range(&self, from: StepId, to: Option<StepId>) -> Result<Vec<StepId>> {
        let to = to.unwrap_or(StepId::Finalize);

        if from > to {
            return Err(PostError::InvalidStepRange {
                from: from.name().to_string(),
                to: to.name().to_string(),
            });
        }

        Ok(self
            .steps
            .iter()
            .map(|s| s.id)
            .filter(|id| *id >= from && *id <= to)
            .collect())
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
