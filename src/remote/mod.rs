// src/remote/mod.rs

//! Remote command execution layer.
//!
//! Every step talks to external tools through the [`RemoteExecutor`]
//! trait instead of spawning processes directly. This makes it easy to
//! swap in a scripted executor in tests while keeping the production
//! ssh/scp implementation in [`ssh`].
//!
//! All call sites receive the same [`CmdOutput`] record; there is no
//! second result shape anywhere.

pub mod ssh;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::errors::{PostError, Result};

pub use ssh::SshRemote;

/// A command destination: either this machine or an ssh `user@host`
/// endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host(String);

impl Host {
    pub fn local() -> Self {
        Host(String::new())
    }

    pub fn remote(dest: impl Into<String>) -> Self {
        Host(dest.into())
    }

    /// Build from a config value: empty string means local.
    pub fn from_config(value: &str) -> Self {
        Host(value.trim().to_string())
    }

    pub fn is_local(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_local() {
            f.write_str("localhost")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Result of one executed command. A single record with named fields for
/// every call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Trait abstracting how external commands are executed.
///
/// Production code uses [`SshRemote`]; tests provide a scripted
/// implementation that records command lines and replays canned outputs.
pub trait RemoteExecutor: Send + Sync {
    /// Run `command args...` on the given host and capture its output.
    ///
    /// A non-zero exit is **not** an error at this level; use
    /// [`run_checked`] when it should be.
    fn execute<'a>(
        &'a self,
        host: &'a Host,
        command: &'a str,
        args: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<CmdOutput>> + Send + 'a>>;

    /// Whether a file (or glob) exists on the given host.
    fn file_exists<'a>(
        &'a self,
        host: &'a Host,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

    /// Copy a file between endpoints. `from`/`to` are scp-style strings
    /// (`user@host:path` or a plain local path).
    fn copy<'a>(
        &'a self,
        from: &'a str,
        to: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Run a command and turn any non-zero exit into a `RemoteCommand` error
/// carrying enough context to retry by hand.
pub async fn run_checked(
    remote: &dyn RemoteExecutor,
    host: &Host,
    command: &str,
    args: &[String],
) -> Result<CmdOutput> {
    let output = remote.execute(host, command, args).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(PostError::RemoteCommand {
            host: host.to_string(),
            command: format!("{command} {}", args.join(" ")).trim().to_string(),
            exit_code: output.exit_code,
            stderr: output.stderr,
        })
    }
}
