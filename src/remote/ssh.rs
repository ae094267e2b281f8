// src/remote/ssh.rs

//! Production executor: local commands through the shell, remote ones
//! through `ssh`, copies through `scp`, all via `tokio::process` with
//! captured output.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, info};

use super::{CmdOutput, Host, RemoteExecutor};
use crate::errors::{PostError, Result};

#[derive(Debug, Default)]
pub struct SshRemote;

impl SshRemote {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, mut cmd: Command, shown: &str) -> Result<CmdOutput> {
        info!(command = %shown, "running command");

        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let output = cmd
            .output()
            .await
            .with_context(|| format!("spawning '{shown}'"))
            .map_err(PostError::Other)?;

        let result = CmdOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            command = %shown,
            exit_code = result.exit_code,
            stdout_bytes = result.stdout.len(),
            stderr_bytes = result.stderr.len(),
            "command finished"
        );

        Ok(result)
    }

    fn build(&self, host: &Host, command: &str, args: &[String]) -> (Command, String) {
        let line = if args.is_empty() {
            command.to_string()
        } else {
            format!("{command} {}", args.join(" "))
        };

        if host.is_local() {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&line);
            (c, line)
        } else {
            let mut c = Command::new("ssh");
            c.arg(host.as_str()).arg(&line);
            (c, format!("ssh {} {line}", host.as_str()))
        }
    }
}

impl RemoteExecutor for SshRemote {
    fn execute<'a>(
        &'a self,
        host: &'a Host,
        command: &'a str,
        args: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<CmdOutput>> + Send + 'a>> {
        Box::pin(async move {
            let (cmd, shown) = self.build(host, command, args);
            self.run(cmd, &shown).await
        })
    }

    fn file_exists<'a>(
        &'a self,
        host: &'a Host,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            // `ls` rather than `test -f` so a glob with multiple matches
            // still reports presence.
            let args = vec![path.to_string()];
            let (cmd, shown) = self.build(host, "ls", &args);
            let output = self.run(cmd, &shown).await?;

            match output.exit_code {
                0 => Ok(true),
                1 | 2 => Ok(false),
                code => Err(PostError::RemoteCommand {
                    host: host.to_string(),
                    command: shown,
                    exit_code: code,
                    stderr: output.stderr,
                }),
            }
        })
    }

    fn copy<'a>(
        &'a self,
        from: &'a str,
        to: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut c = Command::new("scp");
            c.arg(from).arg(to);
            let shown = format!("scp {from} {to}");
            let output = self.run(c, &shown).await?;

            if output.success() {
                Ok(())
            } else {
                Err(PostError::RemoteCommand {
                    host: "localhost".to_string(),
                    command: shown,
                    exit_code: output.exit_code,
                    stderr: output.stderr,
                })
            }
        })
    }
}
