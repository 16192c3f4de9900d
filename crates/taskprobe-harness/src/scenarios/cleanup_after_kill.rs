use super::{verdict, Scenario, ScenarioContext, Verdict};
use crate::error::Result;
use crate::injector::KillIntent;
use crate::verifier::Convergence;
use taskprobe_core::model::{JobKind, JobRunState, JobSpec, TaskRunState};

/// Kills a running attempt whose working directory has been seen and
/// expects the directory to be removed and the attempt to end KILLED.
pub struct CleanupAfterKill;

impl Scenario for CleanupAfterKill {
    fn name(&self) -> &'static str {
        "cleanup-after-kill"
    }

    fn description(&self) -> &'static str {
        "A killed attempt's working directory is cleaned up"
    }

    fn run(&self, ctx: &ScenarioContext) -> Result<Verdict> {
        let budgets = ctx.budgets();
        let max_attempts = ctx.config.scenarios.cleanup_after_kill.max_attempts;
        let (input, output) = ctx.prepare_input(self.name())?;
        let spec = JobSpec::new("Word Count", JobKind::WordCount, 1, 1)
            .with_max_attempts(max_attempts, max_attempts)
            .with_io(input, output);

        let mut job = ctx.submit(&spec)?;
        let status = job.await_run_state(&[JobRunState::Running], &budgets.job_start)?;

        let locator = ctx.locator();
        let target = locator.await_target(job.id(), &budgets.job_start)?;
        let attempt = locator.await_running_attempt(&target.task_id, &budgets.task_start)?;
        let mut convergence = Convergence::with_working_dir_check();
        convergence.observe_running(&attempt.attempt_id)?;

        let node = locator.resolve_execution_node(&target.task_id, &budgets.node_resolve)?;
        let injector = ctx.injector();
        injector.force_finish(&node, &target.task_id)?;

        let verifier = ctx.verifier();
        let dir = verifier.locate_working_dir(
            &mut convergence,
            &node,
            &status.username,
            job.id(),
            &attempt.attempt_id,
            &budgets.dir_probe,
        )?;

        injector.kill_attempt(
            &mut convergence,
            &job,
            &attempt.attempt_id,
            KillIntent::Transparent,
        )?;
        verifier.await_cleanup(&mut convergence, &dir, TaskRunState::Killed, &budgets.cleanup)?;

        verdict(
            job.id(),
            format!(
                "{} KILLED, {} removed from {}",
                attempt.attempt_id,
                dir.path.display(),
                node.host
            ),
        )
    }
}
