//! Bounded polling.
//!
//! Everything the harness waits for goes through [`poll_until`]: the probe is
//! called immediately, then once per interval, until it reports
//! [`Observation::Ready`] or the budget's attempts are used up. The caller
//! decides whether exhaustion is a failure.

use std::thread;
use taskprobe_core::config::PollBudget;

/// What a single probe saw. `Pending` carries the observation that did not
/// yet satisfy the wait, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation<T, L> {
    Ready(T),
    Pending(L),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, L> {
    Satisfied { value: T, polls: u32 },
    Exhausted { polls: u32, last: Option<L> },
}

impl<T, L> Outcome<T, L> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Outcome::Satisfied { .. })
    }

    pub fn polls(&self) -> u32 {
        match self {
            Outcome::Satisfied { polls, .. } | Outcome::Exhausted { polls, .. } => *polls,
        }
    }

    /// Converts exhaustion into an error built from the poll count and the
    /// last pending observation.
    pub fn or_else_exhausted<E, F>(self, on_exhausted: F) -> Result<T, E>
    where
        F: FnOnce(u32, Option<L>) -> E,
    {
        match self {
            Outcome::Satisfied { value, .. } => Ok(value),
            Outcome::Exhausted { polls, last } => Err(on_exhausted(polls, last)),
        }
    }
}

/// Polls `probe` until it is ready or `budget.max_attempts` probes have been
/// made. A probe error ends the wait immediately.
pub fn poll_until<T, L, E, F>(budget: &PollBudget, mut probe: F) -> Result<Outcome<T, L>, E>
where
    F: FnMut() -> Result<Observation<T, L>, E>,
{
    let mut last = None;
    for poll in 1..=budget.max_attempts {
        match probe()? {
            Observation::Ready(value) => {
                tracing::trace!("[POLL] ready after {} poll(s)", poll);
                return Ok(Outcome::Satisfied { value, polls: poll });
            }
            Observation::Pending(seen) => {
                tracing::trace!("[POLL] {}/{} pending", poll, budget.max_attempts);
                last = Some(seen);
            }
        }
        if poll < budget.max_attempts && budget.interval_ms > 0 {
            thread::sleep(budget.interval());
        }
    }

    Ok(Outcome::Exhausted {
        polls: budget.max_attempts,
        last,
    })
}
