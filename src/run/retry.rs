//! Poll-until-success loop behind `assert` statements.

use crate::cancel::{CancelToken, Sleeper};
use crate::error::Result;
use std::time::Duration;

/// How often and how long to retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries until success or cancellation.
    pub attempts: Option<u32>,
    /// Pause between a failed attempt and the next one.
    pub interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Passed { attempts: u32 },
    Exhausted { attempts: u32 },
}

/// Call `attempt` until it returns `true` or the policy runs out.
///
/// `attempt` receives the 1-based attempt number. An `Err` from it ends the
/// loop; callers turn ordinary failures into `Ok(false)` and only let
/// cancellation through. There is no pause after the final attempt.
pub fn retry<F>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    cancel: &CancelToken,
    mut attempt: F,
) -> Result<RetryOutcome>
where
    F: FnMut(u32) -> Result<bool>,
{
    let mut made: u32 = 0;
    loop {
        cancel.check()?;
        made = made.saturating_add(1);

        if attempt(made)? {
            return Ok(RetryOutcome::Passed { attempts: made });
        }
        if policy.attempts.is_some_and(|max| made >= max) {
            return Ok(RetryOutcome::Exhausted { attempts: made });
        }

        tracing::debug!(attempt = made, interval = ?policy.interval, "retrying");
        sleeper.sleep(policy.interval, cancel)?;
    }
}
