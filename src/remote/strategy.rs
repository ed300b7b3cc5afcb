//! Host fan-out: sequential, parallel and grouped waves.
//!
//! Each wave runs on scoped threads that are joined before the next wave (or
//! the statement) continues, so host tasks may borrow from the caller.
//! Failures are collected after the wave completes.

use super::config::{Parallelization, Strategy};
use crate::cancel::{CancelToken, Sleeper};
use crate::error::{HostFailure, Result, RunbookError};
use std::time::Duration;

/// Run `task` once per host according to `parallelization`.
///
/// Returns `(host, value)` pairs in host order. A failure stops further waves
/// (and, for the sequential strategy, further hosts).
pub fn dispatch<T, F>(
    hosts: &[String],
    parallelization: &Parallelization,
    sleeper: &dyn Sleeper,
    cancel: &CancelToken,
    task: F,
) -> Result<Vec<(String, T)>>
where
    T: Send,
    F: Fn(&str) -> Result<T> + Sync,
{
    match parallelization.strategy {
        Strategy::Sequential => sequential(hosts, cancel, &task),
        Strategy::Parallel => waves(hosts, hosts.len().max(1), 0, sleeper, cancel, &task),
        Strategy::Groups => waves(
            hosts,
            parallelization.limit.max(1),
            parallelization.wait,
            sleeper,
            cancel,
            &task,
        ),
    }
}

fn sequential<T, F>(hosts: &[String], cancel: &CancelToken, task: &F) -> Result<Vec<(String, T)>>
where
    F: Fn(&str) -> Result<T>,
{
    let mut results = Vec::with_capacity(hosts.len());
    for host in hosts {
        cancel.check()?;
        tracing::debug!(host = %host, "dispatching to host");
        match task(host.as_str()) {
            Ok(value) => results.push((host.clone(), value)),
            Err(err) => return Err(collect_failures(vec![(host.clone(), err)])),
        }
    }
    Ok(results)
}

fn waves<T, F>(
    hosts: &[String],
    size: usize,
    wait: u64,
    sleeper: &dyn Sleeper,
    cancel: &CancelToken,
    task: &F,
) -> Result<Vec<(String, T)>>
where
    T: Send,
    F: Fn(&str) -> Result<T> + Sync,
{
    let mut results = Vec::with_capacity(hosts.len());
    for (index, wave) in hosts.chunks(size).enumerate() {
        if index > 0 && wait > 0 {
            tracing::debug!(seconds = wait, "pausing between host groups");
            sleeper.sleep(Duration::from_secs(wait), cancel)?;
        }
        cancel.check()?;
        tracing::debug!(wave = index, hosts = wave.len(), "dispatching wave");

        let mut failures = Vec::new();
        for (host, outcome) in run_wave(wave, task) {
            match outcome {
                Ok(value) => results.push((host, value)),
                Err(err) => failures.push((host, err)),
            }
        }
        if !failures.is_empty() {
            return Err(collect_failures(failures));
        }
    }
    Ok(results)
}

fn run_wave<T, F>(wave: &[String], task: &F) -> Vec<(String, Result<T>)>
where
    T: Send,
    F: Fn(&str) -> Result<T> + Sync,
{
    std::thread::scope(|scope| {
        let handles: Vec<_> = wave
            .iter()
            .map(|host| (host, scope.spawn(move || task(host.as_str()))))
            .collect();

        handles
            .into_iter()
            .map(|(host, handle)| {
                let outcome = handle.join().unwrap_or_else(|_| {
                    Err(RunbookError::TransportFailure {
                        host: host.clone(),
                        message: "host task panicked".to_string(),
                    })
                });
                (host.clone(), outcome)
            })
            .collect()
    })
}

/// Fold per-host errors into one. Cancellation wins over everything else.
fn collect_failures(failures: Vec<(String, RunbookError)>) -> RunbookError {
    if failures
        .iter()
        .any(|(_, err)| matches!(err, RunbookError::Cancelled))
    {
        return RunbookError::Cancelled;
    }

    let mut collected = Vec::new();
    for (host, err) in failures {
        match err {
            RunbookError::HostFailures(inner) => collected.extend(inner),
            RunbookError::TransportFailure { host, message } => {
                collected.push(HostFailure { host, message })
            }
            other => collected.push(HostFailure {
                host,
                message: other.to_string(),
            }),
        }
    }
    for failure in &collected {
        tracing::warn!(host = %failure.host, error = %failure.message, "host failed");
    }
    RunbookError::HostFailures(collected)
}
