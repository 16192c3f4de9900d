use super::{sleep_spec, verdict, Scenario, ScenarioContext, Verdict};
use crate::error::Result;
use crate::injector::KillIntent;
use crate::verifier::Convergence;
use taskprobe_core::model::JobRunState;

/// Kills every attempt of one map task, counting each as failed, until the
/// task runs out of attempts and the job fails.
pub struct ExhaustiveKill;

impl Scenario for ExhaustiveKill {
    fn name(&self) -> &'static str {
        "exhaustive-kill"
    }

    fn description(&self) -> &'static str {
        "Killing every attempt of a task fails the job"
    }

    fn run(&self, ctx: &ScenarioContext) -> Result<Verdict> {
        let budgets = ctx.budgets();
        let spec = sleep_spec(&ctx.config.scenarios.exhaustive_kill);
        let max_attempts = spec
            .max_map_attempts
            .unwrap_or(ctx.config.cluster.default_max_map_attempts);

        let mut job = ctx.submit(&spec)?;
        job.await_run_state(&[JobRunState::Running], &budgets.job_start)?;

        let locator = ctx.locator();
        locator.await_any_task_running(job.id(), &budgets.any_task_running)?;
        let target =
            locator.await_target_matching(job.id(), &budgets.job_start, |t| t.task_id.is_map())?;

        let injector = ctx.injector();
        let verifier = ctx.verifier();
        let mut convergence = Convergence::new();
        for index in 0..max_attempts {
            let attempt =
                locator.await_attempt_running(&target.task_id, index, &budgets.task_start)?;
            convergence.observe_running(&attempt.attempt_id)?;
            injector.kill_attempt(
                &mut convergence,
                &job,
                &attempt.attempt_id,
                KillIntent::CountTowardFailure,
            )?;
            verifier.await_completion_event(
                &convergence,
                &job,
                &attempt.attempt_id,
                &budgets.completion_event,
            )?;
            tracing::info!("Kill {}/{} recorded", index + 1, max_attempts);
        }

        verifier.await_job_terminal(
            &mut convergence,
            &mut job,
            JobRunState::Failed,
            &budgets.job_completion,
        )?;
        verifier.confirm_in_job_listing(job.id(), JobRunState::Failed)?;

        verdict(
            job.id(),
            format!(
                "{} attempts of {} killed, job FAILED",
                max_attempts, target.task_id
            ),
        )
    }
}
