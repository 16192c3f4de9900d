use crate::error::{Result, VerifyError};
use crate::poller::{poll_until, Observation};
use std::sync::Arc;
use taskprobe_client::{ClientError, JobTracker};
use taskprobe_core::config::PollBudget;
use taskprobe_core::model::{
    JobId, JobRunState, JobSpec, JobStatusSnapshot, TaskAttemptId, TaskCompletionEvent,
};

/// A submitted job and its last observed status.
///
/// The snapshot only changes through [`JobHandle::refresh`]. Every refresh
/// checks that a job seen complete stays complete in the same state.
pub struct JobHandle {
    tracker: Arc<dyn JobTracker>,
    job_id: JobId,
    last_status: JobStatusSnapshot,
}

impl JobHandle {
    pub fn submit(tracker: Arc<dyn JobTracker>, spec: &JobSpec) -> Result<Self> {
        let job_id = tracker.submit_job(spec).map_err(VerifyError::Submission)?;
        Self::attach(tracker, job_id)
    }

    /// Wraps a job that is already known to the tracker.
    pub fn attach(tracker: Arc<dyn JobTracker>, job_id: JobId) -> Result<Self> {
        let last_status = tracker.job_status(&job_id)?;
        tracing::debug!("Job {} is {}", job_id, last_status.run_state);
        Ok(Self {
            tracker,
            job_id,
            last_status,
        })
    }

    pub fn id(&self) -> &JobId {
        &self.job_id
    }

    pub fn last_status(&self) -> &JobStatusSnapshot {
        &self.last_status
    }

    pub fn refresh(&mut self) -> Result<JobStatusSnapshot> {
        let status = self.tracker.job_status(&self.job_id)?;
        let was = self.last_status.run_state;
        if self.last_status.is_complete() && status.run_state != was {
            return Err(VerifyError::CompletionRegressed {
                job_id: self.job_id.clone(),
                was,
                now: status.run_state,
            });
        }
        if status.run_state != was {
            tracing::info!("Job {}: {} -> {}", self.job_id, was, status.run_state);
        }
        self.last_status = status.clone();
        Ok(status)
    }

    /// Waits for the job to enter one of `targets`. A job that completes in
    /// any other state can never get there, so that fails immediately.
    pub fn await_run_state(
        &mut self,
        targets: &[JobRunState],
        budget: &PollBudget,
    ) -> Result<JobStatusSnapshot> {
        let expected = targets
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("|");

        let outcome = poll_until(budget, || {
            let status = self.refresh()?;
            if targets.contains(&status.run_state) {
                Ok(Observation::Ready(status))
            } else if status.is_complete() {
                Err(VerifyError::UnexpectedTerminalState {
                    subject: format!("Job {}", self.job_id),
                    expected: expected.clone(),
                    actual: status.run_state.to_string(),
                })
            } else {
                Ok(Observation::Pending(status.run_state))
            }
        })?;

        outcome.or_else_exhausted(|attempts, last| {
            tracing::warn!(
                "Job {} did not reach {} within {}",
                self.job_id,
                expected,
                budget
            );
            VerifyError::NotStarted {
                job_id: self.job_id.clone(),
                expected: expected.clone(),
                attempts,
                last: describe(last),
            }
        })
    }

    /// Waits until the job reports any terminal state.
    pub fn await_completion(&mut self, budget: &PollBudget) -> Result<JobStatusSnapshot> {
        let outcome = poll_until(budget, || {
            let status = self.refresh()?;
            Ok::<_, VerifyError>(if status.is_complete() {
                Observation::Ready(status)
            } else {
                Observation::Pending(status.run_state)
            })
        })?;

        outcome.or_else_exhausted(|attempts, last| VerifyError::TimedOut {
            what: format!("job {} to complete", self.job_id),
            attempts,
            last_observed: describe(last),
        })
    }

    pub fn kill_task_attempt(&self, attempt_id: &TaskAttemptId, fail_job: bool) -> Result<()> {
        self.tracker
            .kill_task_attempt(attempt_id, fail_job)
            .map_err(|e| match e {
                e @ ClientError::ControlChannel { .. } => VerifyError::ControlChannel(e),
                other => VerifyError::ControlChannel(ClientError::ControlChannel {
                    target: attempt_id.to_string(),
                    reason: other.to_string(),
                }),
            })
    }

    pub fn completion_events(&self, from_index: usize) -> Result<Vec<TaskCompletionEvent>> {
        Ok(self
            .tracker
            .task_completion_events(&self.job_id, from_index)?)
    }
}

fn describe<L: ToString>(last: Option<L>) -> String {
    last.map(|l| l.to_string())
        .unwrap_or_else(|| "nothing".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use taskprobe_client::Result as ClientResult;
    use taskprobe_core::model::{TaskId, TaskInfo};

    /// Replays a fixed sequence of run states, repeating the last one.
    struct ScriptedTracker {
        states: Mutex<Vec<JobRunState>>,
    }

    impl ScriptedTracker {
        fn new(states: &[JobRunState]) -> Arc<Self> {
            let mut states = states.to_vec();
            states.reverse();
            Arc::new(Self {
                states: Mutex::new(states),
            })
        }
    }

    impl JobTracker for ScriptedTracker {
        fn submit_job(&self, _spec: &JobSpec) -> ClientResult<JobId> {
            Ok(JobId("job_test_0001".to_string()))
        }

        fn job_status(&self, job_id: &JobId) -> ClientResult<JobStatusSnapshot> {
            let mut states = self.states.lock().unwrap();
            let run_state = if states.len() > 1 {
                states.pop().unwrap()
            } else {
                states[0]
            };
            Ok(JobStatusSnapshot {
                job_id: job_id.clone(),
                run_state,
                username: "probe".to_string(),
            })
        }

        fn all_job_statuses(&self) -> ClientResult<Vec<JobStatusSnapshot>> {
            Ok(Vec::new())
        }

        fn task_infos(&self, _job_id: &JobId) -> ClientResult<Vec<TaskInfo>> {
            Ok(Vec::new())
        }

        fn task_info(&self, task_id: &TaskId) -> ClientResult<TaskInfo> {
            Err(ClientError::NotFound {
                kind: "task",
                id: task_id.to_string(),
            })
        }

        fn task_completion_events(
            &self,
            _job_id: &JobId,
            _from_index: usize,
        ) -> ClientResult<Vec<TaskCompletionEvent>> {
            Ok(Vec::new())
        }

        fn kill_task_attempt(&self, attempt_id: &TaskAttemptId, _fail: bool) -> ClientResult<()> {
            Err(ClientError::NotFound {
                kind: "attempt",
                id: attempt_id.to_string(),
            })
        }
    }

    fn budget(n: u32) -> PollBudget {
        PollBudget::new(n, 0)
    }

    use JobRunState::*;

    #[test]
    fn test_await_run_state_returns_matching_snapshot() {
        let tracker = ScriptedTracker::new(&[Pending, Pending, Pending, Running]);
        let mut job = JobHandle::submit(tracker, &JobSpec::sleep(1, 0, 1, 1)).unwrap();

        let status = job.await_run_state(&[Running], &budget(10)).unwrap();
        assert_eq!(status.run_state, Running);
        assert_eq!(job.last_status().run_state, Running);
    }

    #[test]
    fn test_await_run_state_exhaustion_is_not_started() {
        let tracker = ScriptedTracker::new(&[Pending]);
        let mut job = JobHandle::submit(tracker, &JobSpec::sleep(1, 0, 1, 1)).unwrap();

        match job.await_run_state(&[Running], &budget(3)).unwrap_err() {
            VerifyError::NotStarted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "PENDING");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_terminal_state_outside_targets_fails_fast() {
        let tracker = ScriptedTracker::new(&[Pending, Failed]);
        let mut job = JobHandle::submit(tracker, &JobSpec::sleep(1, 0, 1, 1)).unwrap();

        let err = job.await_run_state(&[Running], &budget(50)).unwrap_err();
        assert!(matches!(err, VerifyError::UnexpectedTerminalState { .. }));
    }

    #[test]
    fn test_completion_regression_is_detected() {
        let tracker = ScriptedTracker::new(&[Running, Succeeded, Running]);
        let mut job = JobHandle::submit(tracker, &JobSpec::sleep(1, 0, 1, 1)).unwrap();

        assert_eq!(job.refresh().unwrap().run_state, Succeeded);
        match job.refresh().unwrap_err() {
            VerifyError::CompletionRegressed { was, now, .. } => {
                assert_eq!(was, Succeeded);
                assert_eq!(now, Running);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_refresh_of_completed_job_is_stable() {
        let tracker = ScriptedTracker::new(&[Killed]);
        let mut job = JobHandle::submit(tracker, &JobSpec::sleep(1, 0, 1, 1)).unwrap();

        let first = job.refresh().unwrap();
        let second = job.refresh().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_await_completion_times_out() {
        let tracker = ScriptedTracker::new(&[Running]);
        let mut job = JobHandle::submit(tracker, &JobSpec::sleep(1, 0, 1, 1)).unwrap();

        let err = job.await_completion(&budget(2)).unwrap_err();
        assert!(matches!(err, VerifyError::TimedOut { attempts: 2, .. }));
    }

    #[test]
    fn test_kill_failures_are_control_channel_errors() {
        let tracker = ScriptedTracker::new(&[Running]);
        let job = JobHandle::submit(tracker, &JobSpec::sleep(1, 0, 1, 1)).unwrap();

        let attempt = TaskAttemptId::new(TaskId("task_test_0001_m_000000".into()), 0);
        let err = job.kill_task_attempt(&attempt, false).unwrap_err();
        assert!(matches!(err, VerifyError::ControlChannel(_)));
    }
}
