//! Scenario drivers and their registry.
//!
//! Each driver owns its job from submission to the final assertion and only
//! touches the cluster through the collaborators in [`ScenarioContext`].
//! Drivers share nothing mutable, so several can run against one cluster at
//! once as long as their jobs are distinct.

mod cleanup_after_failure;
mod cleanup_after_kill;
mod exhaustive_kill;
mod kill_transparency;

pub use cleanup_after_failure::CleanupAfterFailure;
pub use cleanup_after_kill::CleanupAfterKill;
pub use exhaustive_kill::ExhaustiveKill;
pub use kill_transparency::KillTransparency;

use crate::error::{Result, VerifyError};
use crate::injector::PerturbationInjector;
use crate::job::JobHandle;
use crate::locator::{TargetSelection, TaskLocator};
use crate::verifier::ConvergenceVerifier;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskprobe_client::{inputs, Cluster, JobTracker};
use taskprobe_core::config::{Budgets, Config, SleepJobParams};
use taskprobe_core::errors::DomainError;
use taskprobe_core::model::{JobId, JobRunState, JobSpec};

/// What a scenario established when it passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub job_id: JobId,
    pub summary: String,
}

pub trait Scenario: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn run(&self, ctx: &ScenarioContext) -> Result<Verdict>;
}

/// The collaborators and settings handed to every driver.
#[derive(Clone)]
pub struct ScenarioContext {
    pub cluster: Arc<dyn Cluster>,
    pub config: Arc<Config>,
}

impl ScenarioContext {
    pub fn new(cluster: Arc<dyn Cluster>, config: Config) -> Self {
        Self {
            cluster,
            config: Arc::new(config),
        }
    }

    pub fn tracker(&self) -> Arc<dyn JobTracker> {
        self.cluster.tracker()
    }

    pub fn budgets(&self) -> &Budgets {
        &self.config.budgets
    }

    pub fn locator(&self) -> TaskLocator {
        TaskLocator::new(
            self.tracker(),
            TargetSelection::from(&self.config.selection),
        )
    }

    pub fn injector(&self) -> PerturbationInjector {
        PerturbationInjector::new(Arc::clone(&self.cluster))
    }

    pub fn verifier(&self) -> ConvergenceVerifier {
        ConvergenceVerifier::new(Arc::clone(&self.cluster))
    }

    /// DFS input and output directories private to `scenario`.
    pub fn io_dirs(&self, scenario: &str) -> (PathBuf, PathBuf) {
        let dfs = &self.config.dfs;
        (
            Path::new(&dfs.input_dir).join(scenario),
            Path::new(&dfs.output_dir).join(scenario),
        )
    }

    /// Recreates the scenario's input on the DFS and returns the
    /// `(input, output)` pair to put on the job spec.
    pub fn prepare_input(&self, scenario: &str) -> Result<(String, String)> {
        let (input, output) = self.io_dirs(scenario);
        inputs::prepare_text_input(
            self.cluster.dfs().as_ref(),
            &input,
            &output,
            self.config.dfs.input_repeat,
        )?;
        Ok((
            input.to_string_lossy().into_owned(),
            output.to_string_lossy().into_owned(),
        ))
    }

    pub fn submit(&self, spec: &JobSpec) -> Result<JobHandle> {
        let job = JobHandle::submit(self.tracker(), spec)?;
        tracing::info!("Submitted '{}' as {}", spec.name, job.id());
        Ok(job)
    }
}

pub(crate) fn sleep_spec(params: &SleepJobParams) -> JobSpec {
    let spec = JobSpec::sleep(
        params.map_tasks,
        params.reduce_tasks,
        params.map_sleep_ms,
        params.reduce_sleep_ms,
    );
    match params.max_attempts {
        Some(max) => spec.with_max_attempts(max, max),
        None => spec,
    }
}

pub fn all() -> Vec<Box<dyn Scenario>> {
    vec![
        Box::new(KillTransparency),
        Box::new(CleanupAfterKill),
        Box::new(CleanupAfterFailure),
        Box::new(ExhaustiveKill),
    ]
}

pub fn names() -> Vec<&'static str> {
    all().iter().map(|s| s.name()).collect()
}

pub fn find(name: &str) -> std::result::Result<Box<dyn Scenario>, DomainError> {
    all()
        .into_iter()
        .find(|s| s.name() == name)
        .ok_or_else(|| DomainError::UnknownScenario {
            name: name.to_string(),
            available: names().into_iter().map(String::from).collect(),
        })
}

#[derive(Debug)]
pub struct ScenarioOutcome {
    pub name: &'static str,
    pub result: Result<Verdict>,
    pub elapsed: Duration,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

fn run_one(scenario: &dyn Scenario, ctx: &ScenarioContext) -> ScenarioOutcome {
    let span = tracing::info_span!("scenario", name = scenario.name());
    let _enter = span.enter();

    tracing::info!("Starting: {}", scenario.description());
    let start = Instant::now();
    let result = scenario.run(ctx);
    let elapsed = start.elapsed();
    match &result {
        Ok(verdict) => tracing::info!("PASSED in {:.1?}: {}", elapsed, verdict.summary),
        Err(e) => tracing::error!("FAILED in {:.1?} [{}]: {}", elapsed, e.kind(), e),
    }

    ScenarioOutcome {
        name: scenario.name(),
        result,
        elapsed,
    }
}

/// Runs the named scenarios, or all of them when `names` is empty. Every
/// name is resolved before anything runs. Outcomes come back in the order
/// the names were given.
pub fn run_scenarios(
    ctx: &ScenarioContext,
    names: &[String],
    parallel: bool,
) -> std::result::Result<Vec<ScenarioOutcome>, DomainError> {
    let selected = if names.is_empty() {
        all()
    } else {
        names
            .iter()
            .map(|n| find(n))
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    let outcomes: Vec<ScenarioOutcome> = if parallel {
        selected
            .par_iter()
            .map(|s| run_one(s.as_ref(), ctx))
            .collect()
    } else {
        selected.iter().map(|s| run_one(s.as_ref(), ctx)).collect()
    };
    Ok(outcomes)
}

pub(crate) fn verdict(job_id: &JobId, summary: impl Into<String>) -> Result<Verdict> {
    Ok(Verdict {
        job_id: job_id.clone(),
        summary: summary.into(),
    })
}

/// Waits for the job to complete and requires `expected`. For checks made
/// after the convergence itself has been verified.
pub(crate) fn expect_job_outcome(
    job: &mut JobHandle,
    expected: JobRunState,
    ctx: &ScenarioContext,
) -> Result<()> {
    let status = job.await_completion(&ctx.budgets().job_completion)?;
    if status.run_state != expected {
        return Err(VerifyError::UnexpectedTerminalState {
            subject: format!("Job {}", job.id()),
            expected: expected.to_string(),
            actual: status.run_state.to_string(),
        });
    }
    Ok(())
}
