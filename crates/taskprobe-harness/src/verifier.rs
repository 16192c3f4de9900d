//! Convergence checks after a perturbation.
//!
//! A verification moves through [`Phase`]s in one direction:
//!
//! ```text
//! WaitingForStart -> Perturbed -> WaitingForTerminal -> Verified | TimedOut
//! ```
//!
//! [`Convergence`] tracks the phase and refuses steps taken out of order: a
//! perturbation needs a RUNNING observation of the same attempt, and when the
//! working directory is part of the check it must have been seen before the
//! perturbation. Otherwise an empty directory afterwards proves nothing.

use crate::error::{Result, VerifyError};
use crate::job::JobHandle;
use crate::poller::{poll_until, Observation};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use taskprobe_client::Cluster;
use taskprobe_core::config::PollBudget;
use taskprobe_core::constants::local_task_dir;
use taskprobe_core::model::{
    JobId, JobRunState, JobStatusSnapshot, NodeAddress, TaskAttemptId, TaskAttemptStatus,
    TaskCompletionEvent, TaskRunState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForStart,
    Perturbed,
    WaitingForTerminal,
    Verified,
    TimedOut,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::WaitingForStart => "waiting for start",
            Phase::Perturbed => "perturbed",
            Phase::WaitingForTerminal => "waiting for terminal state",
            Phase::Verified => "verified",
            Phase::TimedOut => "timed out",
        };
        write!(f, "{}", s)
    }
}

/// The per-attempt scratch directory found on an execution node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDir {
    pub node: NodeAddress,
    pub attempt_id: TaskAttemptId,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct Convergence {
    phase: Phase,
    running: Option<TaskAttemptId>,
    working_dir: Option<WorkingDir>,
    require_working_dir: bool,
}

impl Convergence {
    pub fn new() -> Self {
        Self {
            phase: Phase::WaitingForStart,
            running: None,
            working_dir: None,
            require_working_dir: false,
        }
    }

    /// A convergence that also requires the working directory to be located
    /// before the perturbation.
    pub fn with_working_dir_check() -> Self {
        Self {
            require_working_dir: true,
            ..Self::new()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn working_dir(&self) -> Option<&WorkingDir> {
        self.working_dir.as_ref()
    }

    fn out_of_order(&self, step: impl Into<String>) -> VerifyError {
        VerifyError::PhaseOrder {
            phase: self.phase,
            step: step.into(),
        }
    }

    /// Records that `attempt_id` was seen RUNNING. Later attempts may be
    /// observed after a perturbation.
    pub fn observe_running(&mut self, attempt_id: &TaskAttemptId) -> Result<()> {
        match self.phase {
            Phase::WaitingForStart | Phase::Perturbed => {
                self.running = Some(attempt_id.clone());
                Ok(())
            }
            _ => Err(self.out_of_order(format!("observe {} running", attempt_id))),
        }
    }

    fn observe_working_dir(&mut self, dir: WorkingDir) -> Result<()> {
        if self.phase != Phase::WaitingForStart || self.running.as_ref() != Some(&dir.attempt_id)
        {
            return Err(self.out_of_order(format!(
                "record the working directory of {}",
                dir.attempt_id
            )));
        }
        self.working_dir = Some(dir);
        Ok(())
    }

    /// Marks `attempt_id` as perturbed. Consumes the RUNNING observation, so
    /// each perturbation needs a fresh one.
    pub fn perturb(&mut self, attempt_id: &TaskAttemptId) -> Result<()> {
        if !matches!(self.phase, Phase::WaitingForStart | Phase::Perturbed) {
            return Err(self.out_of_order(format!("perturb {}", attempt_id)));
        }
        if self.running.as_ref() != Some(attempt_id) {
            return Err(self.out_of_order(format!(
                "perturb {} before observing it running",
                attempt_id
            )));
        }
        if self.require_working_dir
            && self.working_dir.as_ref().map(|d| &d.attempt_id) != Some(attempt_id)
        {
            return Err(self.out_of_order(format!(
                "perturb {} before locating its working directory",
                attempt_id
            )));
        }
        self.running = None;
        self.phase = Phase::Perturbed;
        Ok(())
    }

    fn begin_terminal_wait(&mut self) -> Result<()> {
        if self.phase != Phase::Perturbed {
            return Err(self.out_of_order("wait for a terminal state"));
        }
        self.phase = Phase::WaitingForTerminal;
        tracing::debug!("Convergence: {}", self.phase);
        Ok(())
    }

    fn conclude(&mut self, verified: bool) {
        self.phase = if verified {
            Phase::Verified
        } else {
            Phase::TimedOut
        };
        tracing::debug!("Convergence: {}", self.phase);
    }
}

impl Default for Convergence {
    fn default() -> Self {
        Self::new()
    }
}

/// One joint observation of the cleanup wait.
#[derive(Debug, Clone)]
struct CleanupObservation {
    remaining: usize,
    state: Option<TaskRunState>,
}

impl CleanupObservation {
    fn state_label(&self) -> String {
        self.state
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unreported".to_string())
    }
}

impl fmt::Display for CleanupObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries left, attempt {}",
            self.remaining,
            self.state_label()
        )
    }
}

pub struct ConvergenceVerifier {
    cluster: Arc<dyn Cluster>,
}

impl ConvergenceVerifier {
    pub fn new(cluster: Arc<dyn Cluster>) -> Self {
        Self { cluster }
    }

    /// Searches every local root of `node` for the attempt's working
    /// directory until one lists non-empty.
    pub fn locate_working_dir(
        &self,
        convergence: &mut Convergence,
        node: &NodeAddress,
        user: &str,
        job_id: &JobId,
        attempt_id: &TaskAttemptId,
        budget: &PollBudget,
    ) -> Result<WorkingDir> {
        let client = self.cluster.node(&node.host)?;
        let roots = client.local_dirs()?;
        let relative = local_task_dir(user, job_id, attempt_id);

        let outcome = poll_until(budget, || -> Result<Observation<PathBuf, ()>> {
            for root in &roots {
                let candidate = root.join(&relative);
                if !client.list_status(&candidate, true)?.is_empty() {
                    return Ok(Observation::Ready(candidate));
                }
            }
            Ok(Observation::Pending(()))
        })?;

        let path = outcome.or_else_exhausted(|_, _| VerifyError::WorkingDirNotFound {
            attempt_id: attempt_id.clone(),
            node: node.host.clone(),
            searched: roots.len(),
        })?;
        tracing::info!("Working directory of {} is {}", attempt_id, path.display());

        let dir = WorkingDir {
            node: node.clone(),
            attempt_id: attempt_id.clone(),
            path,
        };
        convergence.observe_working_dir(dir.clone())?;
        Ok(dir)
    }

    /// Waits until the working directory lists empty and the attempt reports
    /// a terminal state, then requires that state to be `expected`.
    ///
    /// Cleanup may land before or after the status update; both must happen
    /// within the one budget. If it runs out with entries still listed the
    /// failure is a leak, otherwise a timeout on the state.
    pub fn await_cleanup(
        &self,
        convergence: &mut Convergence,
        dir: &WorkingDir,
        expected: TaskRunState,
        budget: &PollBudget,
    ) -> Result<TaskAttemptStatus> {
        convergence.begin_terminal_wait()?;
        let tracker = self.cluster.tracker();
        let client = self.cluster.node(&dir.node.host)?;
        let task_id = &dir.attempt_id.task_id;
        let index = dir.attempt_id.index;

        let outcome = poll_until(budget, || {
            let remaining = client.list_status(&dir.path, true)?.len();
            let info = tracker.task_info(task_id)?;
            let attempt = info.attempt(index).cloned();
            let state = attempt.as_ref().map(|a| a.run_state);
            Ok::<_, VerifyError>(match attempt {
                Some(attempt) if remaining == 0 && attempt.run_state.is_terminal() => {
                    Observation::Ready(attempt)
                }
                _ => Observation::Pending(CleanupObservation { remaining, state }),
            })
        });

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                convergence.conclude(false);
                return Err(e);
            }
        };

        let attempt = outcome.or_else_exhausted(|attempts, last| {
            let last = last.unwrap_or(CleanupObservation {
                remaining: 0,
                state: None,
            });
            if last.remaining > 0 {
                tracing::warn!(
                    "{} still has {} entries after {}",
                    dir.path.display(),
                    last.remaining,
                    budget
                );
                VerifyError::ResourceLeak {
                    node: dir.node.host.clone(),
                    path: dir.path.clone(),
                    remaining: last.remaining,
                    state: last.state_label(),
                }
            } else {
                VerifyError::TimedOut {
                    what: format!("{} to reach a terminal state", dir.attempt_id),
                    attempts,
                    last_observed: last.to_string(),
                }
            }
        });

        let attempt = match attempt {
            Ok(attempt) => attempt,
            Err(e) => {
                convergence.conclude(false);
                return Err(e);
            }
        };

        if attempt.run_state != expected {
            convergence.conclude(false);
            return Err(VerifyError::UnexpectedTerminalState {
                subject: format!("Attempt {}", attempt.attempt_id),
                expected: expected.to_string(),
                actual: attempt.run_state.to_string(),
            });
        }
        convergence.conclude(true);
        tracing::info!(
            "{} is {} and its working directory is gone",
            attempt.attempt_id,
            attempt.run_state
        );
        Ok(attempt)
    }

    /// Waits for the job to complete and requires it to end as `expected`.
    pub fn await_job_terminal(
        &self,
        convergence: &mut Convergence,
        job: &mut JobHandle,
        expected: JobRunState,
        budget: &PollBudget,
    ) -> Result<JobStatusSnapshot> {
        convergence.begin_terminal_wait()?;
        let status = match job.await_completion(budget) {
            Ok(status) => status,
            Err(e) => {
                convergence.conclude(false);
                return Err(e);
            }
        };

        if status.run_state != expected {
            convergence.conclude(false);
            return Err(VerifyError::UnexpectedTerminalState {
                subject: format!("Job {}", job.id()),
                expected: expected.to_string(),
                actual: status.run_state.to_string(),
            });
        }
        convergence.conclude(true);
        tracing::info!("Job {} completed as {}", job.id(), status.run_state);
        Ok(status)
    }

    /// Waits for `attempt_id` to show up in the job's completion events.
    /// Running out of polls is a hard failure: the kill was not recorded.
    pub fn await_completion_event(
        &self,
        convergence: &Convergence,
        job: &JobHandle,
        attempt_id: &TaskAttemptId,
        budget: &PollBudget,
    ) -> Result<TaskCompletionEvent> {
        if convergence.phase() != Phase::Perturbed {
            return Err(convergence.out_of_order(format!(
                "look up the completion event of {}",
                attempt_id
            )));
        }

        let outcome = poll_until(budget, || {
            let events = job.completion_events(0)?;
            let found = events.into_iter().find(|e| e.attempt_id == *attempt_id);
            Ok::<_, VerifyError>(match found {
                Some(event) => Observation::Ready(event),
                None => Observation::Pending(()),
            })
        })?;

        let event = outcome.or_else_exhausted(|polls, _| VerifyError::AttemptNotRecorded {
            attempt_id: attempt_id.clone(),
            polls,
        })?;
        tracing::info!(
            "Completion event #{} records {} as {:?}",
            event.event_id,
            attempt_id,
            event.status
        );
        Ok(event)
    }

    /// Looks the job up in the tracker's listing of all jobs and requires it
    /// to be there in state `expected`.
    pub fn confirm_in_job_listing(
        &self,
        job_id: &JobId,
        expected: JobRunState,
    ) -> Result<JobStatusSnapshot> {
        let listed = self
            .cluster
            .tracker()
            .all_job_statuses()?
            .into_iter()
            .find(|s| s.job_id == *job_id)
            .ok_or_else(|| VerifyError::JobNotListed {
                job_id: job_id.clone(),
            })?;

        if listed.run_state != expected {
            return Err(VerifyError::UnexpectedTerminalState {
                subject: format!("Listed job {}", job_id),
                expected: expected.to_string(),
                actual: listed.run_state.to_string(),
            });
        }
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskprobe_core::model::TaskId;

    fn attempt(index: u32) -> TaskAttemptId {
        TaskAttemptId::new(TaskId("task_1_0001_m_000000".into()), index)
    }

    fn dir_of(attempt_id: TaskAttemptId) -> WorkingDir {
        WorkingDir {
            node: "tracker_node1:50060".parse().unwrap(),
            attempt_id,
            path: PathBuf::from("/local/0/taskTracker"),
        }
    }

    #[test]
    fn test_perturbation_requires_running_observation() {
        let mut conv = Convergence::new();
        let err = conv.perturb(&attempt(0)).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::PhaseOrder {
                phase: Phase::WaitingForStart,
                ..
            }
        ));

        conv.observe_running(&attempt(0)).unwrap();
        conv.perturb(&attempt(0)).unwrap();
        assert_eq!(conv.phase(), Phase::Perturbed);
    }

    #[test]
    fn test_each_perturbation_needs_its_own_observation() {
        let mut conv = Convergence::new();
        conv.observe_running(&attempt(0)).unwrap();
        conv.perturb(&attempt(0)).unwrap();
        assert!(conv.perturb(&attempt(1)).is_err());

        conv.observe_running(&attempt(1)).unwrap();
        conv.perturb(&attempt(1)).unwrap();
    }

    #[test]
    fn test_working_dir_must_precede_perturbation() {
        let mut conv = Convergence::with_working_dir_check();
        conv.observe_running(&attempt(0)).unwrap();
        assert!(conv.perturb(&attempt(0)).is_err());

        conv.observe_working_dir(dir_of(attempt(0))).unwrap();
        conv.perturb(&attempt(0)).unwrap();
        assert!(conv.working_dir().is_some());
    }

    #[test]
    fn test_working_dir_of_another_attempt_is_rejected() {
        let mut conv = Convergence::with_working_dir_check();
        conv.observe_running(&attempt(0)).unwrap();
        assert!(conv.observe_working_dir(dir_of(attempt(1))).is_err());
    }

    #[test]
    fn test_terminal_wait_requires_perturbation() {
        let mut conv = Convergence::new();
        assert!(conv.begin_terminal_wait().is_err());

        conv.observe_running(&attempt(0)).unwrap();
        conv.perturb(&attempt(0)).unwrap();
        conv.begin_terminal_wait().unwrap();
        assert!(conv.observe_running(&attempt(1)).is_err());

        conv.conclude(true);
        assert_eq!(conv.phase(), Phase::Verified);
        assert!(conv.begin_terminal_wait().is_err());
    }
}
