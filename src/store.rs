// src/store.rs

//! Persisted experiment state.
//!
//! One JSON file per experiment, written after every completed step. The
//! file is the single source of truth for resuming a run: `load` at
//! process start, `save` after each mutation. Writes go to a temporary
//! sibling first and are renamed into place, so a crash mid-write never
//! leaves a truncated record behind.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{PostError, Result};
use crate::exp::Experiment;

#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the persisted record for the given experiment name.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name.trim().to_lowercase()))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).exists()
    }

    /// Load the persisted experiment, failing with `ExperimentNotFound`
    /// when there is no record for this name.
    pub fn load(&self, name: &str) -> Result<Experiment> {
        let path = self.path_for(name);
        if !path.exists() {
            return Err(PostError::ExperimentNotFound(name.to_uppercase()));
        }

        let contents = std::fs::read_to_string(&path)?;
        let exp: Experiment = serde_json::from_str(&contents)?;
        debug!(experiment = %exp.name(), path = %path.display(), "loaded persisted state");
        Ok(exp)
    }

    /// Persist the experiment record, replacing any previous one.
    pub fn save(&self, exp: &Experiment) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.path_for(exp.name());
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(exp)?;
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &path)?;

        debug!(experiment = %exp.name(), path = %path.display(), "persisted state");
        Ok(())
    }
}
