//! Cooperative cancellation and interruptible sleeps.
//!
//! The CLI flips a [`CancelToken`] from its Ctrl-C handler. Host tasks, process
//! polling loops and every [`Sleeper`] observe it and unwind with
//! [`RunbookError::Cancelled`].

use crate::error::{Result, RunbookError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token has been flipped.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(RunbookError::Cancelled);
        }
        Ok(())
    }
}

/// Source of pauses: waits, assert intervals and group pacing.
pub trait Sleeper: Sync {
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> Result<()>;
}

/// Sleeps on the current thread, waking regularly to observe cancellation.
#[derive(Debug, Clone, Copy)]
pub struct ThreadSleeper {
    slice: Duration,
}

impl Default for ThreadSleeper {
    fn default() -> Self {
        Self {
            slice: Duration::from_millis(100),
        }
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            cancel.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep(self.slice.min(deadline - now));
        }
    }
}
