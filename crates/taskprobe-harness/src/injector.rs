use crate::error::{Result, VerifyError};
use crate::job::JobHandle;
use crate::verifier::Convergence;
use std::sync::Arc;
use taskprobe_client::{ClientError, Cluster};
use taskprobe_core::model::{ControlAction, JobKind, JobSpec, NodeAddress, TaskAttemptId, TaskId};

/// Whether a kill should be absorbed by a retry or counted as a failed
/// attempt against the task's attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillIntent {
    Transparent,
    CountTowardFailure,
}

impl KillIntent {
    pub fn fail_job(self) -> bool {
        matches!(self, KillIntent::CountTowardFailure)
    }
}

/// Issues the faults and control signals a scenario applies to the cluster.
pub struct PerturbationInjector {
    cluster: Arc<dyn Cluster>,
}

impl PerturbationInjector {
    pub fn new(cluster: Arc<dyn Cluster>) -> Self {
        Self { cluster }
    }

    /// Kills `attempt_id`. The attempt must have been observed RUNNING in
    /// `convergence` first.
    pub fn kill_attempt(
        &self,
        convergence: &mut Convergence,
        job: &JobHandle,
        attempt_id: &TaskAttemptId,
        intent: KillIntent,
    ) -> Result<()> {
        convergence.perturb(attempt_id)?;
        tracing::info!(
            "Killing {} of job {} (fail_job={})",
            attempt_id,
            job.id(),
            intent.fail_job()
        );
        job.kill_task_attempt(attempt_id, intent.fail_job())
    }

    /// Lets the failure built into the job body fire. Nothing is sent; the
    /// attempt is only marked as perturbed.
    pub fn induce_failure(
        &self,
        convergence: &mut Convergence,
        attempt_id: &TaskAttemptId,
    ) -> Result<()> {
        convergence.perturb(attempt_id)?;
        tracing::info!("Waiting for {} to fail on its own", attempt_id);
        Ok(())
    }

    /// Asks the node running `task_id` to complete the current attempt now.
    pub fn force_finish(&self, node: &NodeAddress, task_id: &TaskId) -> Result<()> {
        let control_err = |e: ClientError| match e {
            e @ ClientError::ControlChannel { .. } => VerifyError::ControlChannel(e),
            other => VerifyError::ControlChannel(ClientError::ControlChannel {
                target: node.host.clone(),
                reason: other.to_string(),
            }),
        };

        let client = self.cluster.node(&node.host).map_err(control_err)?;
        client
            .send_action(&ControlAction::FinishTask {
                task_id: task_id.clone(),
            })
            .map_err(control_err)?;
        tracing::debug!("Sent finish-task for {} to {}", task_id, node.host);
        Ok(())
    }

    /// A single-map job whose attempt raises an error after `fail_after_ms`
    /// and is never retried.
    pub fn failing_job_spec(fail_after_ms: u64) -> JobSpec {
        JobSpec::new(
            "Task Failed job",
            JobKind::FailingMap { fail_after_ms },
            1,
            0,
        )
        .with_max_attempts(1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_intent_flags() {
        assert!(!KillIntent::Transparent.fail_job());
        assert!(KillIntent::CountTowardFailure.fail_job());
    }

    #[test]
    fn test_failing_job_spec_is_never_retried() {
        let spec = PerturbationInjector::failing_job_spec(5000);
        assert_eq!(spec.map_tasks, 1);
        assert_eq!(spec.reduce_tasks, 0);
        assert_eq!(spec.max_map_attempts, Some(1));
        assert_eq!(
            spec.kind,
            JobKind::FailingMap {
                fail_after_ms: 5000
            }
        );
    }
}
