use super::{sleep_spec, verdict, Scenario, ScenarioContext, Verdict};
use crate::error::Result;
use crate::injector::KillIntent;
use crate::verifier::Convergence;
use taskprobe_core::model::JobRunState;

/// Kills the first attempt of one task and expects the job to succeed
/// through a retry.
pub struct KillTransparency;

impl Scenario for KillTransparency {
    fn name(&self) -> &'static str {
        "kill-transparency"
    }

    fn description(&self) -> &'static str {
        "A killed attempt is retried and the job still succeeds"
    }

    fn run(&self, ctx: &ScenarioContext) -> Result<Verdict> {
        let budgets = ctx.budgets();
        let spec = sleep_spec(&ctx.config.scenarios.kill_transparency);
        let mut job = ctx.submit(&spec)?;
        job.await_run_state(&[JobRunState::Running], &budgets.job_start)?;

        let locator = ctx.locator();
        let target = locator.await_target(job.id(), &budgets.job_start)?;
        let attempt = locator.await_running_attempt(&target.task_id, &budgets.task_start)?;

        let mut convergence = Convergence::new();
        convergence.observe_running(&attempt.attempt_id)?;
        ctx.injector().kill_attempt(
            &mut convergence,
            &job,
            &attempt.attempt_id,
            KillIntent::Transparent,
        )?;

        ctx.verifier().await_job_terminal(
            &mut convergence,
            &mut job,
            JobRunState::Succeeded,
            &budgets.job_completion,
        )?;

        verdict(
            job.id(),
            format!("killed {}, job SUCCEEDED", attempt.attempt_id),
        )
    }
}
