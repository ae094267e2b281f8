// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PostError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::PostError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.hosts, raw.paths, raw.defaults))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_hosts(cfg)?;
    validate_paths(cfg)?;
    validate_defaults(cfg)?;
    Ok(())
}

fn validate_hosts(cfg: &RawConfigFile) -> Result<()> {
    for (name, value) in [
        ("correlator", &cfg.hosts.correlator),
        ("pipeline", &cfg.hosts.pipeline),
        ("archive", &cfg.hosts.archive),
        ("logs", &cfg.hosts.logs),
    ] {
        // Empty means "local"; otherwise expect user@host with no spaces.
        if !value.is_empty() && (value.contains(' ') || value.ends_with('@')) {
            return Err(PostError::ConfigError(format!(
                "[hosts].{name} must be empty (local) or a 'user@host' destination (got '{value}')"
            )));
        }
    }
    Ok(())
}

fn validate_paths(cfg: &RawConfigFile) -> Result<()> {
    for (name, value) in [
        ("data_root", &cfg.paths.data_root),
        ("correlator_exp_dir", &cfg.paths.correlator_exp_dir),
        ("catalogue", &cfg.paths.catalogue),
        ("pipeline_root", &cfg.paths.pipeline_root),
    ] {
        if !value.starts_with('/') {
            return Err(PostError::ConfigError(format!(
                "[paths].{name} must be an absolute path (got '{value}')"
            )));
        }
    }

    if cfg.paths.log_archive_dir.is_empty() {
        return Err(PostError::ConfigError(
            "[paths].log_archive_dir must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_defaults(cfg: &RawConfigFile) -> Result<()> {
    if cfg.defaults.ref_antenna_priority.is_empty() {
        return Err(PostError::ConfigError(
            "[defaults].ref_antenna_priority must contain at least one antenna".to_string(),
        ));
    }
    Ok(())
}
