use crate::model::{JobId, TaskAttemptId};
use std::path::PathBuf;

pub mod dirs {
    pub const TASK_TRACKER: &str = "taskTracker";
    pub const JOBCACHE: &str = "jobcache";
    pub const TASKPROBE: &str = "taskprobe";
    pub const LOGS: &str = "logs";
}

pub mod files {
    pub const CONFIG: &str = "config.toml";
    pub const INPUT_DATA: &str = "data.txt";
}

pub mod env {
    pub const LOG_LEVEL: &str = "TASKPROBE_LOG_LEVEL";
    pub const TEST_LOG_TEE: &str = "TASKPROBE_TEST_LOG_TEE";
}

/// Framework default for `max map attempts` when a job does not set one.
pub const DEFAULT_MAX_MAP_ATTEMPTS: u32 = 4;

/// Per-attempt working directory, relative to one of the node's local roots.
pub fn local_task_dir(user: &str, job_id: &JobId, attempt_id: &TaskAttemptId) -> PathBuf {
    PathBuf::from(dirs::TASK_TRACKER)
        .join(user)
        .join(dirs::JOBCACHE)
        .join(&job_id.0)
        .join(attempt_id.to_string())
}
