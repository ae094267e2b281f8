use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use postcorr::errors::Result;
use postcorr::remote::{CmdOutput, Host, RemoteExecutor};

/// A scripted executor that:
/// - records every command line it is asked to run
/// - replays canned outputs matched by substring
/// - reports success with empty output for everything else.
///
/// No process is ever spawned.
#[derive(Default)]
pub struct FakeRemote {
    calls: Arc<Mutex<Vec<String>>>,
    responses: Mutex<Vec<(String, CmdOutput)>>,
    existing: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every executed command line (host-prefixed), in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of executed command lines containing `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.contains(needle))
            .count()
    }

    /// Reply with `stdout` (exit 0) to commands containing `needle`.
    pub fn respond(&self, needle: &str, stdout: &str) {
        self.responses.lock().unwrap().push((
            needle.to_string(),
            CmdOutput {
                exit_code: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        ));
    }

    /// Fail commands containing `needle` with the given exit code.
    pub fn fail(&self, needle: &str, exit_code: i32, stderr: &str) {
        self.responses.lock().unwrap().push((
            needle.to_string(),
            CmdOutput {
                exit_code,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        ));
    }

    /// Declare that a remote path (substring match) exists.
    pub fn path_exists(&self, needle: &str) {
        self.existing.lock().unwrap().push(needle.to_string());
    }

    fn record_and_lookup(&self, line: String) -> CmdOutput {
        self.calls.lock().unwrap().push(line.clone());

        let responses = self.responses.lock().unwrap();
        for (needle, output) in responses.iter() {
            if line.contains(needle) {
                return output.clone();
            }
        }

        CmdOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

impl RemoteExecutor for FakeRemote {
    fn execute<'a>(
        &'a self,
        host: &'a Host,
        command: &'a str,
        args: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<CmdOutput>> + Send + 'a>> {
        let line = if args.is_empty() {
            format!("{host}: {command}")
        } else {
            format!("{host}: {command} {}", args.join(" "))
        };
        let output = self.record_and_lookup(line);
        Box::pin(async move { Ok(output) })
    }

    fn file_exists<'a>(
        &'a self,
        host: &'a Host,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{host}: ls {path}"));
        let exists = self
            .existing
            .lock()
            .unwrap()
            .iter()
            .any(|needle| path.contains(needle.as_str()));
        Box::pin(async move { Ok(exists) })
    }

    fn copy<'a>(
        &'a self,
        from: &'a str,
        to: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("scp {from} {to}"));
        Box::pin(async move { Ok(()) })
    }
}
