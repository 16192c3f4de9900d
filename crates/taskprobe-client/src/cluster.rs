//! Seams between the harness and the cluster it drives.
//!
//! Everything the harness knows about the cluster arrives through these
//! traits. Implementations are expected to be cheap to call repeatedly: the
//! harness polls them in tight loops and treats every call as an idempotent
//! read, except for the control calls (`submit_job`, `kill_task_attempt`,
//! `send_action`) which mutate cluster state.

use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use taskprobe_core::model::{
    ControlAction, FileEntry, JobId, JobSpec, JobStatusSnapshot, TaskAttemptId, TaskCompletionEvent,
    TaskId, TaskInfo,
};

/// The scheduler's status and control protocol.
pub trait JobTracker: Send + Sync {
    fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn submit_job(&self, spec: &JobSpec) -> Result<JobId>;

    fn job_status(&self, job_id: &JobId) -> Result<JobStatusSnapshot>;

    fn all_job_statuses(&self) -> Result<Vec<JobStatusSnapshot>>;

    /// All tasks of the job in the scheduler's query order, bookkeeping
    /// tasks included.
    fn task_infos(&self, job_id: &JobId) -> Result<Vec<TaskInfo>>;

    fn task_info(&self, task_id: &TaskId) -> Result<TaskInfo>;

    fn task_completion_events(
        &self,
        job_id: &JobId,
        from_index: usize,
    ) -> Result<Vec<TaskCompletionEvent>>;

    /// `fail_job` asks the scheduler to count the attempt as failed, which
    /// consumes the task's attempt budget.
    fn kill_task_attempt(&self, attempt_id: &TaskAttemptId, fail_job: bool) -> Result<()>;
}

/// Control and filesystem access to one execution node.
pub trait NodeClient: Send + Sync {
    fn host(&self) -> &str;

    fn send_action(&self, action: &ControlAction) -> Result<()>;

    /// Entries under `path`. A path that does not exist lists as empty.
    fn list_status(&self, path: &Path, recursive: bool) -> Result<Vec<FileEntry>>;

    fn local_dirs(&self) -> Result<Vec<PathBuf>>;
}

/// The distributed filesystem used to stage job input.
pub trait Dfs: Send + Sync {
    fn delete(&self, path: &Path, recursive: bool) -> Result<bool>;

    fn mkdirs(&self, path: &Path) -> Result<bool>;

    fn set_permission(&self, path: &Path, mode: u32) -> Result<()>;

    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>>;
}

/// The collaborators a scenario needs, injected as one bundle.
pub trait Cluster: Send + Sync {
    fn tracker(&self) -> Arc<dyn JobTracker>;

    fn node(&self, host: &str) -> Result<Arc<dyn NodeClient>>;

    fn dfs(&self) -> Arc<dyn Dfs>;
}
