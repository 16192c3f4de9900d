use crate::errors::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(transparent)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        JobId(s)
    }
}

impl FromStr for JobId {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(JobId(s.to_string()))
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

impl FromStr for TaskId {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TaskId(s.to_string()))
    }
}

impl TaskId {
    /// Map task ids carry an `_m_` type segment before the task number.
    pub fn is_map(&self) -> bool {
        self.type_segment() == Some("m")
    }

    pub fn is_reduce(&self) -> bool {
        self.type_segment() == Some("r")
    }

    fn type_segment(&self) -> Option<&str> {
        let mut parts = self.0.rsplitn(3, '_');
        parts.next()?;
        parts.next()
    }
}

const TASK_PREFIX: &str = "task_";
const ATTEMPT_PREFIX: &str = "attempt_";

/// One execution instance of a task. The text form follows the scheduler's
/// convention: `task_X_m_000001` attempt 2 is `attempt_X_m_000001_2`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskAttemptId {
    pub task_id: TaskId,
    pub index: u32,
}

impl TaskAttemptId {
    pub fn new(task_id: TaskId, index: u32) -> Self {
        Self { task_id, index }
    }
}

impl fmt::Display for TaskAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let task = &self.task_id.0;
        let body = task.strip_prefix(TASK_PREFIX).unwrap_or(task);
        write!(f, "{}{}_{}", ATTEMPT_PREFIX, body, self.index)
    }
}

impl FromStr for TaskAttemptId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidAttemptId(s.to_string());
        let body = s.strip_prefix(ATTEMPT_PREFIX).ok_or_else(invalid)?;
        let (task_body, index) = body.rsplit_once('_').ok_or_else(invalid)?;
        if task_body.is_empty() {
            return Err(invalid());
        }
        let index = index.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self {
            task_id: TaskId(format!("{}{}", TASK_PREFIX, task_body)),
            index,
        })
    }
}

impl TryFrom<String> for TaskAttemptId {
    type Error = DomainError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskAttemptId> for String {
    fn from(id: TaskAttemptId) -> Self {
        id.to_string()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobRunState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Killed,
}

impl JobRunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobRunState::Succeeded | JobRunState::Failed | JobRunState::Killed
        )
    }
}

impl fmt::Display for JobRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobRunState::Pending => "PENDING",
            JobRunState::Running => "RUNNING",
            JobRunState::Succeeded => "SUCCEEDED",
            JobRunState::Failed => "FAILED",
            JobRunState::Killed => "KILLED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskRunState {
    Unassigned,
    Running,
    CommitPending,
    Succeeded,
    Failed,
    Killed,
}

impl TaskRunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskRunState::Succeeded | TaskRunState::Failed | TaskRunState::Killed
        )
    }
}

impl fmt::Display for TaskRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskRunState::Unassigned => "UNASSIGNED",
            TaskRunState::Running => "RUNNING",
            TaskRunState::CommitPending => "COMMIT_PENDING",
            TaskRunState::Succeeded => "SUCCEEDED",
            TaskRunState::Failed => "FAILED",
            TaskRunState::Killed => "KILLED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusSnapshot {
    pub job_id: JobId,
    pub run_state: JobRunState,
    pub username: String,
}

impl JobStatusSnapshot {
    pub fn is_complete(&self) -> bool {
        self.run_state.is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAttemptStatus {
    pub attempt_id: TaskAttemptId,
    pub run_state: TaskRunState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: TaskId,
    /// Setup and cleanup tasks the scheduler creates for every job.
    #[serde(default)]
    pub is_bookkeeping: bool,
    #[serde(default)]
    pub execution_nodes: Vec<String>,
    #[serde(default)]
    pub attempts: Vec<TaskAttemptStatus>,
}

impl TaskInfo {
    pub fn attempt(&self, index: u32) -> Option<&TaskAttemptStatus> {
        self.attempts.iter().find(|a| a.attempt_id.index == index)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionStatus {
    Succeeded,
    Failed,
    Killed,
    Obsolete,
    Tipfailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompletionEvent {
    pub event_id: u32,
    pub attempt_id: TaskAttemptId,
    pub status: CompletionStatus,
    #[serde(default)]
    pub tracker_http: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlAction {
    /// Complete the task's current attempt without waiting out its work.
    FinishTask { task_id: TaskId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub len: u64,
    #[serde(default)]
    pub is_dir: bool,
}

/// Address of an execution node as reported in a task's execution node
/// list, e.g. `tracker_worker-3.example.com:localhost/127.0.0.1:50060`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    pub role: String,
    pub host: String,
    pub port: u16,
}

impl FromStr for NodeAddress {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| DomainError::InvalidNodeAddress {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (role, rest) = s
            .split_once('_')
            .ok_or_else(|| invalid("missing '_' after role"))?;
        if role.is_empty() {
            return Err(invalid("empty role"));
        }

        let (host, tail) = rest
            .split_once(':')
            .ok_or_else(|| invalid("missing ':' after host"))?;
        if host.is_empty() {
            return Err(invalid("empty host"));
        }

        let port_str = tail.rsplit(':').next().unwrap_or(tail);
        let port = port_str
            .parse::<u16>()
            .map_err(|_| invalid("port is not a number"))?;

        Ok(NodeAddress {
            role: role.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}:{}", self.role, self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum JobKind {
    Sleep {
        map_sleep_ms: u64,
        reduce_sleep_ms: u64,
        map_sleep_count: u32,
        reduce_sleep_count: u32,
    },
    WordCount,
    /// Every map attempt raises an error once `fail_after_ms` has elapsed.
    FailingMap { fail_after_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub kind: JobKind,
    pub map_tasks: u32,
    pub reduce_tasks: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_map_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reduce_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Tasks block until a finish signal arrives instead of completing on their own.
    #[serde(default)]
    pub controlled: bool,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, kind: JobKind, map_tasks: u32, reduce_tasks: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            map_tasks,
            reduce_tasks,
            max_map_attempts: None,
            max_reduce_attempts: None,
            input_dir: None,
            output_dir: None,
            controlled: false,
        }
    }

    pub fn sleep(maps: u32, reduces: u32, map_sleep_ms: u64, reduce_sleep_ms: u64) -> Self {
        Self::new(
            "Sleep job",
            JobKind::Sleep {
                map_sleep_ms,
                reduce_sleep_ms,
                map_sleep_count: 100,
                reduce_sleep_count: 100,
            },
            maps,
            reduces,
        )
    }

    pub fn with_max_attempts(mut self, map: u32, reduce: u32) -> Self {
        self.max_map_attempts = Some(map);
        self.max_reduce_attempts = Some(reduce);
        self
    }

    pub fn with_io(mut self, input_dir: impl Into<String>, output_dir: impl Into<String>) -> Self {
        self.input_dir = Some(input_dir.into());
        self.output_dir = Some(output_dir.into());
        self
    }
}
