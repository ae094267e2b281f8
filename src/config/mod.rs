// src/config/mod.rs

//! Configuration for `postcorr`.
//!
//! - [`model`] defines the TOML-backed configuration types.
//! - [`loader`] reads and deserializes the config file.
//! - [`validate`] performs semantic validation when converting the raw
//!   file into the checked [`model::ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use model::{ConfigFile, DefaultsSection, HostsSection, PathsSection, RawConfigFile};
