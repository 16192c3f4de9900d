use crate::verifier::Phase;
use std::path::PathBuf;
use taskprobe_client::ClientError;
use taskprobe_core::errors::{ConfigError, DomainError};
use taskprobe_core::model::{JobId, JobRunState, TaskAttemptId, TaskId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Job submission failed: {0}")]
    Submission(#[source] ClientError),

    #[error("Job {job_id} did not reach {expected} within {attempts} polls (last observed: {last})")]
    NotStarted {
        job_id: JobId,
        expected: String,
        attempts: u32,
        last: String,
    },

    #[error("Attempt {attempt_id} was not RUNNING within {attempts} polls (last observed: {last})")]
    TaskNotStarted {
        attempt_id: TaskAttemptId,
        attempts: u32,
        last: String,
    },

    #[error("Could not resolve the execution node of {task_id}: {reason}")]
    NodeUnresolved { task_id: TaskId, reason: String },

    #[error("Control call failed: {0}")]
    ControlChannel(#[source] ClientError),

    #[error("Timed out after {attempts} polls waiting for {what} (last observed: {last_observed})")]
    TimedOut {
        what: String,
        attempts: u32,
        last_observed: String,
    },

    #[error("{subject} ended {actual}, expected {expected}")]
    UnexpectedTerminalState {
        subject: String,
        expected: String,
        actual: String,
    },

    #[error("Working directory {} on {node} still holds {remaining} entries (attempt state: {state})", path.display())]
    ResourceLeak {
        node: String,
        path: PathBuf,
        remaining: usize,
        state: String,
    },

    #[error("Attempt {attempt_id} never appeared in the completion events ({polls} polls)")]
    AttemptNotRecorded {
        attempt_id: TaskAttemptId,
        polls: u32,
    },

    #[error("Working directory of {attempt_id} was not found on {node} while the attempt was running (searched {searched} local roots)")]
    WorkingDirNotFound {
        attempt_id: TaskAttemptId,
        node: String,
        searched: usize,
    },

    #[error("Job {job_id} has no task eligible for perturbation")]
    NoTargetTask { job_id: JobId },

    #[error("Job {job_id} is missing from the cluster's job listing")]
    JobNotListed { job_id: JobId },

    #[error("Job {job_id} reported {now} after completing as {was}")]
    CompletionRegressed {
        job_id: JobId,
        was: JobRunState,
        now: JobRunState,
    },

    #[error("Cannot {step} while {phase}")]
    PhaseOrder { phase: Phase, step: String },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl VerifyError {
    /// Short label used in outcome tables.
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::Submission(_) => "submission",
            VerifyError::NotStarted { .. }
            | VerifyError::TaskNotStarted { .. }
            | VerifyError::TimedOut { .. } => "timeout",
            VerifyError::NodeUnresolved { .. } => "node",
            VerifyError::ControlChannel(_) => "control",
            VerifyError::UnexpectedTerminalState { .. }
            | VerifyError::CompletionRegressed { .. }
            | VerifyError::JobNotListed { .. } => "invariant",
            VerifyError::ResourceLeak { .. } => "leak",
            VerifyError::AttemptNotRecorded { .. } => "unrecorded",
            VerifyError::WorkingDirNotFound { .. } | VerifyError::NoTargetTask { .. } => {
                "precondition"
            }
            VerifyError::PhaseOrder { .. } => "ordering",
            VerifyError::Client(_) => "client",
            VerifyError::Config(_) | VerifyError::Domain(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;
