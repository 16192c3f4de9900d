use super::{expect_job_outcome, verdict, Scenario, ScenarioContext, Verdict};
use crate::error::Result;
use crate::injector::PerturbationInjector;
use crate::verifier::Convergence;
use taskprobe_core::model::{JobRunState, TaskRunState};

/// Runs a single map that raises an error and is never retried, and
/// expects its working directory to be gone once it is FAILED.
pub struct CleanupAfterFailure;

impl Scenario for CleanupAfterFailure {
    fn name(&self) -> &'static str {
        "cleanup-after-failure"
    }

    fn description(&self) -> &'static str {
        "A failed attempt's working directory is cleaned up"
    }

    fn run(&self, ctx: &ScenarioContext) -> Result<Verdict> {
        let budgets = ctx.budgets();
        let params = &ctx.config.scenarios.cleanup_after_failure;
        let (input, output) = ctx.prepare_input(self.name())?;
        let spec =
            PerturbationInjector::failing_job_spec(params.fail_after_ms).with_io(input, output);

        let mut job = ctx.submit(&spec)?;
        let status = job.await_run_state(&[JobRunState::Running], &budgets.job_start)?;

        let locator = ctx.locator();
        let target = locator.await_target(job.id(), &budgets.job_start)?;
        let node = locator.resolve_execution_node(&target.task_id, &budgets.node_resolve)?;
        let injector = ctx.injector();
        injector.force_finish(&node, &target.task_id)?;

        let attempt = locator.await_running_attempt(&target.task_id, &budgets.task_start)?;
        let mut convergence = Convergence::with_working_dir_check();
        convergence.observe_running(&attempt.attempt_id)?;

        let verifier = ctx.verifier();
        let dir = verifier.locate_working_dir(
            &mut convergence,
            &node,
            &status.username,
            job.id(),
            &attempt.attempt_id,
            &budgets.dir_probe,
        )?;

        injector.induce_failure(&mut convergence, &attempt.attempt_id)?;
        verifier.await_cleanup(
            &mut convergence,
            &dir,
            TaskRunState::Failed,
            &budgets.failure_cleanup,
        )?;
        expect_job_outcome(&mut job, JobRunState::Failed, ctx)?;

        verdict(
            job.id(),
            format!(
                "{} FAILED, {} removed from {}",
                attempt.attempt_id,
                dir.path.display(),
                node.host
            ),
        )
    }
}
