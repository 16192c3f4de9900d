use crate::error::{Result, VerifyError};
use crate::poller::{poll_until, Observation};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use std::fmt;
use std::sync::Arc;
use taskprobe_client::JobTracker;
use taskprobe_core::config::{PollBudget, SelectionConfig, SelectionStrategy};
use taskprobe_core::model::{
    JobId, NodeAddress, TaskAttemptId, TaskAttemptStatus, TaskId, TaskInfo, TaskRunState,
};

/// How the task under test is picked among a job's work tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSelection {
    /// The first work task in the tracker's query order.
    FirstInQueryOrder,
    LowestTaskId,
    /// A seed-determined pick among the work tasks sorted by id.
    Seeded(u64),
}

impl From<&SelectionConfig> for TargetSelection {
    fn from(config: &SelectionConfig) -> Self {
        match config.strategy {
            SelectionStrategy::First => TargetSelection::FirstInQueryOrder,
            SelectionStrategy::LowestId => TargetSelection::LowestTaskId,
            SelectionStrategy::Seeded => TargetSelection::Seeded(config.seed),
        }
    }
}

impl fmt::Display for TargetSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSelection::FirstInQueryOrder => write!(f, "first"),
            TargetSelection::LowestTaskId => write!(f, "lowest-id"),
            TargetSelection::Seeded(seed) => write!(f, "seeded({})", seed),
        }
    }
}

impl TargetSelection {
    /// Picks among `tasks`, never returning a bookkeeping task.
    pub fn select<'a>(&self, tasks: &'a [TaskInfo]) -> Option<&'a TaskInfo> {
        let mut candidates: Vec<&TaskInfo> =
            tasks.iter().filter(|t| !t.is_bookkeeping).collect();
        match self {
            TargetSelection::FirstInQueryOrder => candidates.first().copied(),
            TargetSelection::LowestTaskId => candidates
                .into_iter()
                .min_by(|a, b| a.task_id.cmp(&b.task_id)),
            TargetSelection::Seeded(seed) => {
                candidates.sort_by(|a, b| a.task_id.cmp(&b.task_id));
                let mut rng = StdRng::seed_from_u64(*seed);
                candidates.choose(&mut rng).copied()
            }
        }
    }
}

/// Finds the task under test and follows its attempts.
pub struct TaskLocator {
    tracker: Arc<dyn JobTracker>,
    selection: TargetSelection,
}

impl TaskLocator {
    pub fn new(tracker: Arc<dyn JobTracker>, selection: TargetSelection) -> Self {
        Self { tracker, selection }
    }

    pub fn list_tasks(&self, job_id: &JobId, include_bookkeeping: bool) -> Result<Vec<TaskInfo>> {
        let mut tasks = self.tracker.task_infos(job_id)?;
        if !include_bookkeeping {
            tasks.retain(|t| !t.is_bookkeeping);
        }
        Ok(tasks)
    }

    pub fn select_target(&self, tasks: &[TaskInfo]) -> Option<TaskInfo> {
        self.selection.select(tasks).cloned()
    }

    /// Waits until the job lists a task eligible for perturbation.
    pub fn await_target(&self, job_id: &JobId, budget: &PollBudget) -> Result<TaskInfo> {
        self.await_target_matching(job_id, budget, |_| true)
    }

    /// Like [`TaskLocator::await_target`], restricted to tasks accepted by
    /// `eligible`.
    pub fn await_target_matching<F>(
        &self,
        job_id: &JobId,
        budget: &PollBudget,
        eligible: F,
    ) -> Result<TaskInfo>
    where
        F: Fn(&TaskInfo) -> bool,
    {
        let outcome = poll_until(budget, || {
            let tasks: Vec<TaskInfo> = self
                .list_tasks(job_id, false)?
                .into_iter()
                .filter(|t| eligible(t))
                .collect();
            Ok::<_, VerifyError>(match self.select_target(&tasks) {
                Some(task) => Observation::Ready(task),
                None => Observation::Pending(tasks.len()),
            })
        })?;

        let target = outcome.or_else_exhausted(|_, _| VerifyError::NoTargetTask {
            job_id: job_id.clone(),
        })?;
        tracing::info!(
            "Selected {} of job {} ({} selection)",
            target.task_id,
            job_id,
            self.selection
        );
        Ok(target)
    }

    /// Waits for the task's first attempt to be RUNNING.
    pub fn await_running_attempt(
        &self,
        task_id: &TaskId,
        budget: &PollBudget,
    ) -> Result<TaskAttemptStatus> {
        self.await_attempt_running(task_id, 0, budget)
    }

    /// Waits for attempt `index` of the task to be RUNNING. No attempts yet
    /// is a pending observation; an attempt that already ended fails.
    pub fn await_attempt_running(
        &self,
        task_id: &TaskId,
        index: u32,
        budget: &PollBudget,
    ) -> Result<TaskAttemptStatus> {
        let attempt_id = TaskAttemptId::new(task_id.clone(), index);

        let outcome = poll_until(budget, || -> Result<Observation<TaskAttemptStatus, String>> {
            let info = self.tracker.task_info(task_id)?;
            match info.attempt(index) {
                None => Ok(Observation::Pending(format!(
                    "{} attempt(s) reported",
                    info.attempts.len()
                ))),
                Some(attempt) if attempt.run_state == TaskRunState::Running => {
                    Ok(Observation::Ready(attempt.clone()))
                }
                Some(attempt) if attempt.run_state.is_terminal() => {
                    Err(VerifyError::UnexpectedTerminalState {
                        subject: format!("Attempt {}", attempt_id),
                        expected: TaskRunState::Running.to_string(),
                        actual: attempt.run_state.to_string(),
                    })
                }
                Some(attempt) => Ok(Observation::Pending(attempt.run_state.to_string())),
            }
        })?;

        let attempt = outcome.or_else_exhausted(|attempts, last| VerifyError::TaskNotStarted {
            attempt_id: attempt_id.clone(),
            attempts,
            last: last.unwrap_or_else(|| "nothing".to_string()),
        })?;
        tracing::info!("Attempt {} is RUNNING", attempt.attempt_id);
        Ok(attempt)
    }

    /// Waits until some work task of the job has a RUNNING attempt.
    pub fn await_any_task_running(
        &self,
        job_id: &JobId,
        budget: &PollBudget,
    ) -> Result<TaskInfo> {
        let outcome = poll_until(budget, || {
            let tasks = self.list_tasks(job_id, false)?;
            let running = tasks.into_iter().find(|t| {
                t.attempts
                    .iter()
                    .any(|a| a.run_state == TaskRunState::Running)
            });
            Ok::<_, VerifyError>(match running {
                Some(task) => Observation::Ready(task),
                None => Observation::Pending(()),
            })
        })?;

        outcome.or_else_exhausted(|attempts, _| VerifyError::TimedOut {
            what: format!("any task of job {} to run", job_id),
            attempts,
            last_observed: "no RUNNING attempt".to_string(),
        })
    }

    /// Polls the task's execution nodes until one is reported and parses the
    /// first into a node address.
    pub fn resolve_execution_node(
        &self,
        task_id: &TaskId,
        budget: &PollBudget,
    ) -> Result<NodeAddress> {
        let outcome = poll_until(budget, || {
            let info = self.tracker.task_info(task_id)?;
            Ok::<_, VerifyError>(match info.execution_nodes.into_iter().next() {
                Some(node) => Observation::Ready(node),
                None => Observation::Pending(()),
            })
        })?;

        let raw = outcome.or_else_exhausted(|attempts, _| VerifyError::NodeUnresolved {
            task_id: task_id.clone(),
            reason: format!("no execution node reported after {} polls", attempts),
        })?;

        let address = raw
            .parse::<NodeAddress>()
            .map_err(|e| VerifyError::NodeUnresolved {
                task_id: task_id.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!("{} runs on {}", task_id, address.host);
        Ok(address)
    }
}
