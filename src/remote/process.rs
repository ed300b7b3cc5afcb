//! Child process execution with output capture, timeout and cancellation.

use crate::cancel::CancelToken;
use crate::error::{Result, RunbookError};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a finished (or killed) process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// None if the process was killed or terminated by a signal.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Short human-readable reason for a failed run.
    pub fn failure_reason(&self) -> String {
        if self.timed_out {
            return "timed out".to_string();
        }
        let status = match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        }
    }
}

/// Run `command` to completion, killing it on timeout or cancellation.
pub fn run(mut command: Command, timeout: Option<Duration>, cancel: &CancelToken) -> Result<ExecOutput> {
    let program = command.get_program().to_string_lossy().to_string();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|e| {
        RunbookError::UserError(format!(
            "failed to execute '{}': {}\nFix: ensure the command is installed and in PATH.",
            program, e
        ))
    })?;

    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    // Readers of a killed process are left detached: grandchildren may still
    // hold the pipes open.
    let (exit_code, timed_out) = wait(&mut child, timeout, cancel)?;
    if timed_out {
        return Ok(ExecOutput {
            timed_out,
            ..ExecOutput::default()
        });
    }

    Ok(ExecOutput {
        stdout: join_reader(stdout),
        stderr: join_reader(stderr),
        exit_code,
        timed_out,
    })
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> Option<JoinHandle<String>> {
    source.map(|mut source| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = source.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Returns (exit_code, timed_out).
fn wait(child: &mut Child, timeout: Option<Duration>, cancel: &CancelToken) -> Result<(Option<i32>, bool)> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok((status.code(), false)),
            Ok(None) => {
                if cancel.is_cancelled() {
                    kill(child);
                    return Err(RunbookError::Cancelled);
                }
                if timeout.is_some_and(|limit| start.elapsed() >= limit) {
                    kill(child);
                    return Ok((None, true));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                kill(child);
                return Err(RunbookError::UserError(format!(
                    "failed to check process status: {}",
                    e
                )));
            }
        }
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
