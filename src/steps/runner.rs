// src/steps/runner.rs

//! The step-sequencing state machine.
//!
//! Given a requested step range and the loaded experiment, the runner
//! walks the steps in catalogue order, checks each step's precondition,
//! executes it, records its report and persists the experiment. The only
//! suspension point is an interactive checkpoint inside a step.
//!
//! Failure contract: the runner snapshots the experiment before every
//! step. A failing step's own mutations are discarded by restoring the
//! snapshot, so the persisted state always reflects exactly the last
//! successful step (at-most-one-partial-write).

use tracing::{debug, info, warn};

use crate::errors::{PostError, Result};
use crate::exp::{Experiment, StepId};
use crate::steps::registry::StepRegistry;
use crate::steps::{execute_step, StepContext, StepOutcome};
use crate::store::MetadataStore;

/// Observable state of the runner, for logging and the run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerState {
    Pending(StepId),
    Running(StepId),
    WaitingOnUser(StepId),
    Succeeded(StepId),
    Failed(StepId),
}

/// What a `run` invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Steps completed in this invocation, in execution order.
    pub completed: Vec<StepId>,
    /// Set when the run stopped cleanly for out-of-band operator work.
    pub held: Option<(StepId, String)>,
}

impl RunSummary {
    pub fn finished(&self) -> bool {
        self.held.is_none()
    }
}

/// Drives a range of steps over one experiment.
pub struct StepRunner<'a> {
    registry: &'a StepRegistry,
    store: &'a MetadataStore,
    state: Option<RunnerState>,
}

impl<'a> StepRunner<'a> {
    pub fn new(registry: &'a StepRegistry, store: &'a MetadataStore) -> Self {
        Self {
            registry,
            store,
            state: None,
        }
    }

    pub fn state(&self) -> Option<&RunnerState> {
        self.state.as_ref()
    }

    /// Walk `range` in order. Halts on the first failure; stops cleanly
    /// on a hold; returns the summary on success.
    pub async fn run_range(
        &mut self,
        ctx: &mut StepContext<'_>,
        exp: &mut Experiment,
        range: &[StepId],
    ) -> Result<RunSummary> {
        let mut summary = RunSummary {
            completed: Vec::new(),
            held: None,
        };

        for &step in range {
            self.transition(RunnerState::Pending(step));
            self.check_precondition(exp, step)?;

            match self.run_step(ctx, exp, step).await? {
                StepProgress::Completed => summary.completed.push(step),
                StepProgress::Held(reason) => {
                    summary.held = Some((step, reason));
                    break;
                }
            }
        }

        Ok(summary)
    }

    /// Precondition: the step's declared predecessor must have a recorded
    /// output (reports recorded earlier in this same invocation count).
    /// Nothing is mutated or persisted on violation.
    fn check_precondition(&self, exp: &Experiment, step: StepId) -> Result<()> {
        let Some(pred) = self.registry.predecessor(step) else {
            return Ok(());
        };

        if exp.has_completed(pred) {
            return Ok(());
        }

        Err(PostError::PreconditionNotMet {
            step: step.name().to_string(),
            missing: pred.name().to_string(),
        })
    }

    /// Run one step to completion, re-entering it on a `repeat` answer.
    async fn run_step(
        &mut self,
        ctx: &mut StepContext<'_>,
        exp: &mut Experiment,
        step: StepId,
    ) -> Result<StepProgress> {
        let mut attempt = 1u32;

        loop {
            // Snapshot so a failing attempt leaves no partial outputs.
            let snapshot = exp.clone();

            self.transition(RunnerState::Running(step));
            info!(step = %step, attempt, "running step");

            match execute_step(step, ctx, exp).await {
                Ok(StepOutcome::Done(report)) => {
                    exp.record_report(report);
                    self.store.save(exp)?;
                    self.transition(RunnerState::Succeeded(step));
                    return Ok(StepProgress::Completed);
                }
                Ok(StepOutcome::Repeat) => {
                    // Operator asked to redo the step. Nothing durable has
                    // been recorded for it yet; inputs chosen at the gate
                    // (e.g. new plot sources) stay in place.
                    self.transition(RunnerState::WaitingOnUser(step));
                    attempt += 1;
                    warn!(step = %step, attempt, "operator requested a re-run of the step");
                }
                Ok(StepOutcome::Hold(reason)) => {
                    // Manual work is needed outside the tool. Discard the
                    // attempt's mutations, persist and stop cleanly.
                    *exp = snapshot;
                    self.store.save(exp)?;
                    self.transition(RunnerState::WaitingOnUser(step));
                    info!(step = %step, reason = %reason, "run held for manual work");
                    return Ok(StepProgress::Held(reason));
                }
                Err(err) => {
                    // Discard the failing step's partial mutations and
                    // persist the last-known-good state.
                    *exp = snapshot;
                    self.store.save(exp)?;
                    self.transition(RunnerState::Failed(step));
                    warn!(step = %step, error = %err, "step failed; state restored");
                    return Err(err);
                }
            }
        }
    }

    fn transition(&mut self, next: RunnerState) {
        debug!(from = ?self.state, to = ?next, "runner transition");
        self.state = Some(next);
    }
}

enum StepProgress {
    Completed,
    Held(String),
}
