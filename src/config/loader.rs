// src/config/loader.rs

use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform
/// semantic validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks host spellings and path sanity.
///
/// When the file does not exist, the built-in defaults are returned, so a
/// bare checkout works against the standard observatory layout.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    if !path.as_ref().exists() {
        return Ok(ConfigFile::default());
    }

    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Helper to resolve a default config path.
///
/// Currently this just returns `Postcorr.toml` in the current working
/// directory, but this function exists so you can later respect an env
/// var or look in multiple default locations.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Postcorr.toml")
}
