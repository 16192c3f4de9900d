//! A deterministic stand-in for a live cluster.
//!
//! Time is counted in ticks. Every tracker or node call advances the clock by
//! one tick before answering, so a poll loop sees the cluster move forward at
//! a fixed rate no matter how long its sleep interval is. Tests configure the
//! timing and the faults through [`SimBehavior`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use taskprobe_client::dfs::LocalDfs;
use taskprobe_client::{ClientError, Cluster, Dfs, JobTracker, NodeClient, Result};
use taskprobe_core::constants::{local_task_dir, DEFAULT_MAX_MAP_ATTEMPTS};
use taskprobe_core::model::{
    CompletionStatus, ControlAction, FileEntry, JobId, JobKind, JobRunState, JobSpec,
    JobStatusSnapshot, TaskAttemptId, TaskAttemptStatus, TaskCompletionEvent, TaskId, TaskInfo,
    TaskRunState,
};

pub const SIM_USER: &str = "probe";
pub const SIM_HOST: &str = "node1.sim";
pub const SIM_TRACKER_NAME: &str = "tracker_node1.sim:localhost/127.0.0.1:50060";
pub const SIM_LOCAL_ROOTS: [&str; 2] = ["/sim/mapred/local/0", "/sim/mapred/local/1"];

const CLUSTER_STAMP: &str = "201012011234";

#[derive(Debug, Clone)]
pub struct SimBehavior {
    /// Ticks between submission and RUNNING.
    pub job_start_ticks: u64,
    /// Ticks between scheduling an attempt and the attempt running.
    pub attempt_start_ticks: u64,
    /// Ticks a running attempt needs to succeed on its own.
    pub work_ticks: u64,
    /// Ticks after which a failing map attempt raises its error.
    pub fail_ticks: u64,
    /// Ticks between an attempt ending and its working directory vanishing.
    pub cleanup_lag_ticks: u64,
    /// Ticks an ended attempt keeps reporting RUNNING.
    pub status_lag_ticks: u64,
    pub leak_working_dirs: bool,
    /// Running attempts never get a working directory.
    pub skip_working_dirs: bool,
    pub drop_completion_events: bool,
    pub never_start: bool,
    /// Killed attempts end in this state instead of the requested one.
    pub kill_outcome_override: Option<TaskRunState>,
    /// Report bare host names instead of `<role>_<host>:<port>` tokens.
    pub malformed_tracker_names: bool,
    pub reject_stale_kills: bool,
    pub reject_submissions: bool,
    pub hide_from_listing: bool,
}

impl Default for SimBehavior {
    fn default() -> Self {
        Self {
            job_start_ticks: 2,
            attempt_start_ticks: 2,
            work_ticks: 40,
            fail_ticks: 30,
            cleanup_lag_ticks: 2,
            status_lag_ticks: 0,
            leak_working_dirs: false,
            skip_working_dirs: false,
            drop_completion_events: false,
            never_start: false,
            kill_outcome_override: None,
            malformed_tracker_names: false,
            reject_stale_kills: true,
            reject_submissions: false,
            hide_from_listing: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Setup,
    Map,
    Reduce,
    Cleanup,
}

impl TaskKind {
    fn is_bookkeeping(self) -> bool {
        matches!(self, TaskKind::Setup | TaskKind::Cleanup)
    }
}

#[derive(Debug)]
struct SimAttempt {
    id: TaskAttemptId,
    state: TaskRunState,
    ready_at: u64,
    started_at: Option<u64>,
    ended_at: Option<u64>,
    reported_at: u64,
    finish_requested: bool,
    dir: Option<PathBuf>,
}

impl SimAttempt {
    fn scheduled(id: TaskAttemptId, now: u64) -> Self {
        Self {
            id,
            state: TaskRunState::Unassigned,
            ready_at: now,
            started_at: None,
            ended_at: None,
            reported_at: now,
            finish_requested: false,
            dir: None,
        }
    }

    fn end(&mut self, state: TaskRunState, now: u64, status_lag: u64) {
        self.state = state;
        self.ended_at = Some(now);
        self.reported_at = now + status_lag;
    }

    fn visible_state(&self, now: u64) -> TaskRunState {
        if self.state.is_terminal() && now < self.reported_at {
            TaskRunState::Running
        } else {
            self.state
        }
    }
}

#[derive(Debug)]
struct SimTask {
    id: TaskId,
    kind: TaskKind,
    attempts: Vec<SimAttempt>,
    failures: u32,
    node: Option<String>,
}

impl SimTask {
    fn succeeded(&self) -> bool {
        self.attempts
            .last()
            .is_some_and(|a| a.state == TaskRunState::Succeeded)
    }

    fn schedule_next(&mut self, now: u64) {
        let index = self.attempts.len() as u32;
        self.attempts.push(SimAttempt::scheduled(
            TaskAttemptId::new(self.id.clone(), index),
            now,
        ));
    }

    fn info(&self, now: u64) -> TaskInfo {
        TaskInfo {
            task_id: self.id.clone(),
            is_bookkeeping: self.kind.is_bookkeeping(),
            execution_nodes: self.node.iter().cloned().collect(),
            attempts: self
                .attempts
                .iter()
                .filter(|a| a.started_at.is_some())
                .map(|a| TaskAttemptStatus {
                    attempt_id: a.id.clone(),
                    run_state: a.visible_state(now),
                })
                .collect(),
        }
    }
}

#[derive(Debug)]
struct SimJob {
    id: JobId,
    spec: JobSpec,
    state: JobRunState,
    submitted_at: u64,
    tasks: Vec<SimTask>,
    events: Vec<TaskCompletionEvent>,
}

impl SimJob {
    fn new(serial: usize, spec: JobSpec, now: u64) -> Self {
        let job_body = format!("{}_{:04}", CLUSTER_STAMP, serial);
        let task_id = |kind: &str, n: u32| TaskId(format!("task_{}_{}_{:06}", job_body, kind, n));
        let bookkeeping = |id: TaskId, kind: TaskKind| {
            let mut attempt = SimAttempt::scheduled(TaskAttemptId::new(id.clone(), 0), now);
            attempt.started_at = Some(now);
            attempt.end(TaskRunState::Succeeded, now, 0);
            SimTask {
                id,
                kind,
                attempts: vec![attempt],
                failures: 0,
                node: Some(SIM_TRACKER_NAME.to_string()),
            }
        };
        let work = |id: TaskId, kind: TaskKind| SimTask {
            id,
            kind,
            attempts: Vec::new(),
            failures: 0,
            node: None,
        };

        // Query order mirrors the scheduler: setup, maps, reduces, cleanup.
        let mut tasks = vec![bookkeeping(task_id("m", spec.map_tasks), TaskKind::Setup)];
        tasks.extend((0..spec.map_tasks).map(|n| work(task_id("m", n), TaskKind::Map)));
        tasks.extend((0..spec.reduce_tasks).map(|n| work(task_id("r", n), TaskKind::Reduce)));
        tasks.push(bookkeeping(
            task_id("m", spec.map_tasks + 1),
            TaskKind::Cleanup,
        ));

        Self {
            id: JobId(format!("job_{}", job_body)),
            spec,
            state: JobRunState::Pending,
            submitted_at: now,
            tasks,
            events: Vec::new(),
        }
    }

    fn snapshot(&self) -> JobStatusSnapshot {
        JobStatusSnapshot {
            job_id: self.id.clone(),
            run_state: self.state,
            username: SIM_USER.to_string(),
        }
    }

    fn max_attempts(&self, kind: TaskKind) -> u32 {
        let configured = match kind {
            TaskKind::Reduce => self.spec.max_reduce_attempts,
            _ => self.spec.max_map_attempts,
        };
        configured.unwrap_or(DEFAULT_MAX_MAP_ATTEMPTS)
    }

    fn advance(&mut self, now: u64, behavior: &SimBehavior) {
        match self.state {
            JobRunState::Pending => {
                if !behavior.never_start && now >= self.submitted_at + behavior.job_start_ticks {
                    self.state = JobRunState::Running;
                    for task in self.tasks.iter_mut().filter(|t| !t.kind.is_bookkeeping()) {
                        task.schedule_next(now);
                    }
                }
            }
            JobRunState::Running => self.advance_running(now, behavior),
            _ => {}
        }
        self.reap_working_dirs(now, behavior);
    }

    fn advance_running(&mut self, now: u64, behavior: &SimBehavior) {
        let maps_done = self
            .tasks
            .iter()
            .filter(|t| t.kind == TaskKind::Map)
            .all(SimTask::succeeded);
        let failing = matches!(self.spec.kind, JobKind::FailingMap { .. });
        let controlled = self.spec.controlled;
        let tracker_name = if behavior.malformed_tracker_names {
            SIM_HOST.to_string()
        } else {
            SIM_TRACKER_NAME.to_string()
        };

        for idx in 0..self.tasks.len() {
            if self.state != JobRunState::Running {
                return;
            }
            let job_id = &self.id;
            let task = &mut self.tasks[idx];
            let kind = task.kind;
            if kind.is_bookkeeping() {
                continue;
            }
            let Some(attempt) = task.attempts.last_mut() else {
                continue;
            };

            let outcome = match attempt.state {
                TaskRunState::Unassigned => {
                    if now >= attempt.ready_at + behavior.attempt_start_ticks
                        && (kind != TaskKind::Reduce || maps_done)
                    {
                        attempt.state = TaskRunState::Running;
                        attempt.started_at = Some(now);
                        if !behavior.skip_working_dirs {
                            attempt.dir = Some(
                                Path::new(SIM_LOCAL_ROOTS[1])
                                    .join(local_task_dir(SIM_USER, job_id, &attempt.id)),
                            );
                        }
                        task.node = Some(tracker_name.clone());
                    }
                    None
                }
                TaskRunState::Running => {
                    let started = attempt.started_at.unwrap_or(now);
                    if attempt.finish_requested {
                        Some(TaskRunState::Succeeded)
                    } else if failing && kind == TaskKind::Map {
                        (now >= started + behavior.fail_ticks).then_some(TaskRunState::Failed)
                    } else if !controlled {
                        (now >= started + behavior.work_ticks).then_some(TaskRunState::Succeeded)
                    } else {
                        None
                    }
                }
                _ => None,
            };

            if let Some(state) = outcome {
                self.end_attempt(idx, state, now, behavior);
            }
        }

        let all_done = self
            .tasks
            .iter()
            .filter(|t| !t.kind.is_bookkeeping())
            .all(SimTask::succeeded);
        if self.state == JobRunState::Running && all_done {
            self.state = JobRunState::Succeeded;
        }
    }

    /// Ends the current attempt of task `idx`. A FAILED attempt counts
    /// against the task's attempt budget; exhausting it fails the job.
    fn end_attempt(&mut self, idx: usize, state: TaskRunState, now: u64, behavior: &SimBehavior) {
        let max_attempts = self.max_attempts(self.tasks[idx].kind);
        let task = &mut self.tasks[idx];
        let Some(attempt) = task.attempts.last_mut() else {
            return;
        };
        attempt.end(state, now, behavior.status_lag_ticks);
        let attempt_id = attempt.id.clone();

        let exhausted = if state == TaskRunState::Failed {
            task.failures += 1;
            task.failures >= max_attempts
        } else {
            false
        };

        let status = match state {
            TaskRunState::Succeeded => CompletionStatus::Succeeded,
            TaskRunState::Killed => CompletionStatus::Killed,
            _ if exhausted => CompletionStatus::Tipfailed,
            _ => CompletionStatus::Failed,
        };
        self.record_event(attempt_id, status, behavior);

        if exhausted {
            self.fail(now, behavior);
        } else if state != TaskRunState::Succeeded {
            self.tasks[idx].schedule_next(now);
        }
    }

    fn fail(&mut self, now: u64, behavior: &SimBehavior) {
        self.state = JobRunState::Failed;
        let mut killed = Vec::new();
        for task in self.tasks.iter_mut().filter(|t| !t.kind.is_bookkeeping()) {
            if let Some(attempt) = task.attempts.last_mut() {
                match attempt.state {
                    TaskRunState::Running => {
                        attempt.end(TaskRunState::Killed, now, behavior.status_lag_ticks);
                        killed.push(attempt.id.clone());
                    }
                    TaskRunState::Unassigned => attempt.end(TaskRunState::Killed, now, 0),
                    _ => {}
                }
            }
        }
        for attempt_id in killed {
            self.record_event(attempt_id, CompletionStatus::Killed, behavior);
        }
    }

    fn record_event(
        &mut self,
        attempt_id: TaskAttemptId,
        status: CompletionStatus,
        behavior: &SimBehavior,
    ) {
        if behavior.drop_completion_events {
            return;
        }
        self.events.push(TaskCompletionEvent {
            event_id: self.events.len() as u32,
            attempt_id,
            status,
            tracker_http: Some(format!("http://{}:50060", SIM_HOST)),
        });
    }

    fn reap_working_dirs(&mut self, now: u64, behavior: &SimBehavior) {
        if behavior.leak_working_dirs {
            return;
        }
        for attempt in self.tasks.iter_mut().flat_map(|t| t.attempts.iter_mut()) {
            let due = attempt
                .ended_at
                .is_some_and(|ended| now >= ended + behavior.cleanup_lag_ticks);
            if attempt.state.is_terminal() && due {
                attempt.dir = None;
            }
        }
    }

    fn find_attempt_mut(&mut self, id: &TaskAttemptId) -> Option<(usize, &mut SimAttempt)> {
        self.tasks
            .iter_mut()
            .enumerate()
            .find(|(_, t)| t.id == id.task_id)
            .and_then(|(idx, t)| {
                t.attempts
                    .iter_mut()
                    .find(|a| a.id == *id)
                    .map(|a| (idx, a))
            })
    }
}

#[derive(Debug)]
struct SimState {
    now: u64,
    behavior: SimBehavior,
    dfs_root: PathBuf,
    jobs: Vec<SimJob>,
    submitted: Vec<JobSpec>,
    kills: Vec<(TaskAttemptId, bool)>,
    actions: Vec<(String, ControlAction)>,
}

impl SimState {
    fn tick(&mut self) {
        self.now += 1;
        let now = self.now;
        for job in &mut self.jobs {
            job.advance(now, &self.behavior);
        }
    }

    fn job(&self, id: &JobId) -> Result<&SimJob> {
        self.jobs
            .iter()
            .find(|j| j.id == *id)
            .ok_or_else(|| ClientError::NotFound {
                kind: "job",
                id: id.to_string(),
            })
    }

    fn task(&self, id: &TaskId) -> Result<&SimTask> {
        self.jobs
            .iter()
            .flat_map(|j| j.tasks.iter())
            .find(|t| t.id == *id)
            .ok_or_else(|| ClientError::NotFound {
                kind: "task",
                id: id.to_string(),
            })
    }

    fn working_dirs(&self) -> impl Iterator<Item = &Path> {
        self.jobs
            .iter()
            .flat_map(|j| j.tasks.iter())
            .flat_map(|t| t.attempts.iter())
            .filter_map(|a| a.dir.as_deref())
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SimTracker {
    state: Arc<Mutex<SimState>>,
}

impl JobTracker for SimTracker {
    fn submit_job(&self, spec: &JobSpec) -> Result<JobId> {
        let mut state = lock(&self.state);
        state.tick();
        if state.behavior.reject_submissions {
            return Err(ClientError::SubmissionRejected {
                reason: "submissions are disabled".to_string(),
            });
        }
        if let Some(input) = &spec.input_dir {
            let on_disk = state.dfs_root.join(input.trim_start_matches('/'));
            if !on_disk.exists() {
                return Err(ClientError::SubmissionRejected {
                    reason: format!("Input path does not exist: {}", input),
                });
            }
        }

        let now = state.now;
        let job = SimJob::new(state.jobs.len() + 1, spec.clone(), now);
        let id = job.id.clone();
        state.jobs.push(job);
        state.submitted.push(spec.clone());
        Ok(id)
    }

    fn job_status(&self, job_id: &JobId) -> Result<JobStatusSnapshot> {
        let mut state = lock(&self.state);
        state.tick();
        state.job(job_id).map(SimJob::snapshot)
    }

    fn all_job_statuses(&self) -> Result<Vec<JobStatusSnapshot>> {
        let mut state = lock(&self.state);
        state.tick();
        if state.behavior.hide_from_listing {
            return Ok(Vec::new());
        }
        Ok(state.jobs.iter().map(SimJob::snapshot).collect())
    }

    fn task_infos(&self, job_id: &JobId) -> Result<Vec<TaskInfo>> {
        let mut state = lock(&self.state);
        state.tick();
        let now = state.now;
        let job = state.job(job_id)?;
        // Tasks are only reported once the job has been initialized.
        if job.state == JobRunState::Pending {
            return Ok(Vec::new());
        }
        Ok(job.tasks.iter().map(|t| t.info(now)).collect())
    }

    fn task_info(&self, task_id: &TaskId) -> Result<TaskInfo> {
        let mut state = lock(&self.state);
        state.tick();
        let now = state.now;
        state.task(task_id).map(|t| t.info(now))
    }

    fn task_completion_events(
        &self,
        job_id: &JobId,
        from_index: usize,
    ) -> Result<Vec<TaskCompletionEvent>> {
        let mut state = lock(&self.state);
        state.tick();
        let job = state.job(job_id)?;
        Ok(job.events.iter().skip(from_index).cloned().collect())
    }

    fn kill_task_attempt(&self, attempt_id: &TaskAttemptId, fail_job: bool) -> Result<()> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        state.tick();
        state.kills.push((attempt_id.clone(), fail_job));
        let now = state.now;
        let behavior = state.behavior.clone();

        let stale = |reason: &str| ClientError::ControlChannel {
            target: attempt_id.to_string(),
            reason: reason.to_string(),
        };

        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.tasks.iter().any(|t| t.id == attempt_id.task_id))
            .ok_or_else(|| stale("unknown attempt"))?;
        if job.state.is_terminal() {
            return if behavior.reject_stale_kills {
                Err(stale("job already complete"))
            } else {
                Ok(())
            };
        }

        let (idx, attempt) = job
            .find_attempt_mut(attempt_id)
            .ok_or_else(|| stale("attempt has not been scheduled"))?;
        if attempt.state != TaskRunState::Running {
            return if behavior.reject_stale_kills {
                Err(stale(&format!("attempt is {}", attempt.state)))
            } else {
                Ok(())
            };
        }

        let requested = if fail_job {
            TaskRunState::Failed
        } else {
            TaskRunState::Killed
        };
        let outcome = behavior.kill_outcome_override.unwrap_or(requested);
        job.end_attempt(idx, outcome, now, &behavior);
        Ok(())
    }
}

pub struct SimNode {
    host: String,
    state: Arc<Mutex<SimState>>,
}

impl NodeClient for SimNode {
    fn host(&self) -> &str {
        &self.host
    }

    fn send_action(&self, action: &ControlAction) -> Result<()> {
        let mut state = lock(&self.state);
        state.tick();
        state.actions.push((self.host.clone(), action.clone()));

        let ControlAction::FinishTask { task_id } = action;
        for job in state.jobs.iter_mut().filter(|j| j.spec.controlled) {
            let current = job
                .tasks
                .iter_mut()
                .find(|t| t.id == *task_id)
                .and_then(|t| t.attempts.last_mut());
            if let Some(attempt) = current {
                attempt.finish_requested = true;
            }
        }
        Ok(())
    }

    fn list_status(&self, path: &Path, recursive: bool) -> Result<Vec<FileEntry>> {
        let mut state = lock(&self.state);
        state.tick();

        let mut entries = Vec::new();
        for dir in state.working_dirs() {
            let candidates = [
                FileEntry {
                    path: dir.to_path_buf(),
                    len: 0,
                    is_dir: true,
                },
                FileEntry {
                    path: dir.join("work"),
                    len: 0,
                    is_dir: true,
                },
                FileEntry {
                    path: dir.join("job.xml"),
                    len: 1024,
                    is_dir: false,
                },
            ];
            entries.extend(candidates.into_iter().filter(|e| {
                e.path != path
                    && e.path.starts_with(path)
                    && (recursive || e.path.parent() == Some(path))
            }));
        }
        Ok(entries)
    }

    fn local_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut state = lock(&self.state);
        state.tick();
        Ok(SIM_LOCAL_ROOTS.iter().map(PathBuf::from).collect())
    }
}

/// One job tracker, one execution node and a DFS rooted in a temp dir.
pub struct SimCluster {
    state: Arc<Mutex<SimState>>,
    tracker: Arc<SimTracker>,
    dfs: Arc<LocalDfs>,
    _dfs_dir: tempfile::TempDir,
}

impl SimCluster {
    pub fn new() -> Self {
        Self::with_behavior(SimBehavior::default())
    }

    pub fn with_behavior(behavior: SimBehavior) -> Self {
        let dfs_dir = tempfile::Builder::new()
            .prefix("taskprobe-sim-dfs-")
            .tempdir()
            .expect("Failed to create sim DFS dir");
        let state = Arc::new(Mutex::new(SimState {
            now: 0,
            behavior,
            dfs_root: dfs_dir.path().to_path_buf(),
            jobs: Vec::new(),
            submitted: Vec::new(),
            kills: Vec::new(),
            actions: Vec::new(),
        }));
        Self {
            tracker: Arc::new(SimTracker {
                state: Arc::clone(&state),
            }),
            dfs: Arc::new(LocalDfs::new(dfs_dir.path())),
            state,
            _dfs_dir: dfs_dir,
        }
    }

    pub fn now(&self) -> u64 {
        lock(&self.state).now
    }

    pub fn dfs_root(&self) -> PathBuf {
        lock(&self.state).dfs_root.clone()
    }

    pub fn submitted(&self) -> Vec<JobSpec> {
        lock(&self.state).submitted.clone()
    }

    pub fn kills(&self) -> Vec<(TaskAttemptId, bool)> {
        lock(&self.state).kills.clone()
    }

    pub fn actions(&self) -> Vec<(String, ControlAction)> {
        lock(&self.state).actions.clone()
    }

    /// Current state without advancing the clock.
    pub fn job_state(&self, job_id: &JobId) -> Option<JobRunState> {
        lock(&self.state).job(job_id).ok().map(|j| j.state)
    }

    pub fn has_working_dir(&self, attempt_id: &TaskAttemptId) -> bool {
        lock(&self.state)
            .jobs
            .iter()
            .flat_map(|j| j.tasks.iter())
            .flat_map(|t| t.attempts.iter())
            .any(|a| a.id == *attempt_id && a.dir.is_some())
    }
}

impl Default for SimCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl Cluster for SimCluster {
    fn tracker(&self) -> Arc<dyn JobTracker> {
        self.tracker.clone()
    }

    fn node(&self, host: &str) -> Result<Arc<dyn NodeClient>> {
        if host != SIM_HOST {
            return Err(ClientError::NotFound {
                kind: "node",
                id: host.to_string(),
            });
        }
        Ok(Arc::new(SimNode {
            host: host.to_string(),
            state: Arc::clone(&self.state),
        }))
    }

    fn dfs(&self) -> Arc<dyn Dfs> {
        self.dfs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_until<F: Fn(&SimCluster) -> bool>(sim: &SimCluster, done: F) {
        for _ in 0..500 {
            if done(sim) {
                return;
            }
            sim.tracker().all_job_statuses().unwrap();
        }
        panic!("simulation did not reach the expected state");
    }

    #[test]
    fn test_job_runs_to_success() {
        let sim = SimCluster::new();
        let id = sim
            .tracker()
            .submit_job(&JobSpec::sleep(2, 1, 10, 10))
            .unwrap();
        run_until(&sim, |s| s.job_state(&id) == Some(JobRunState::Succeeded));

        let events = sim.tracker().task_completion_events(&id, 0).unwrap();
        assert_eq!(events.len(), 3);
        assert!(events
            .iter()
            .all(|e| e.status == CompletionStatus::Succeeded));
    }

    #[test]
    fn test_bookkeeping_tasks_wrap_the_work_tasks() {
        let sim = SimCluster::new();
        let tracker = sim.tracker();
        let id = tracker.submit_job(&JobSpec::sleep(2, 1, 10, 10)).unwrap();
        run_until(&sim, |s| s.job_state(&id) == Some(JobRunState::Running));

        let tasks = tracker.task_infos(&id).unwrap();
        let flags: Vec<bool> = tasks.iter().map(|t| t.is_bookkeeping).collect();
        assert_eq!(flags, vec![true, false, false, false, true]);
        assert!(tasks[0].task_id.is_map());
        assert!(tasks[3].task_id.is_reduce());
    }

    #[test]
    fn test_counted_kills_exhaust_the_attempt_budget() {
        let sim = SimCluster::new();
        let tracker = sim.tracker();
        let spec = JobSpec::sleep(1, 0, 10, 10).with_max_attempts(2, 2);
        let id = tracker.submit_job(&spec).unwrap();
        run_until(&sim, |s| s.job_state(&id) == Some(JobRunState::Running));

        let task = tracker.task_infos(&id).unwrap()[1].task_id.clone();
        for index in 0..2 {
            let attempt = TaskAttemptId::new(task.clone(), index);
            run_until(&sim, |s| {
                s.tracker()
                    .task_info(&task)
                    .unwrap()
                    .attempt(index)
                    .is_some_and(|a| a.run_state == TaskRunState::Running)
            });
            tracker.kill_task_attempt(&attempt, true).unwrap();
        }

        assert_eq!(sim.job_state(&id), Some(JobRunState::Failed));
        let statuses: Vec<_> = tracker
            .task_completion_events(&id, 0)
            .unwrap()
            .into_iter()
            .map(|e| e.status)
            .collect();
        assert_eq!(
            statuses,
            vec![CompletionStatus::Failed, CompletionStatus::Tipfailed]
        );
    }

    #[test]
    fn test_stale_kill_is_rejected() {
        let sim = SimCluster::new();
        let tracker = sim.tracker();
        let id = tracker.submit_job(&JobSpec::sleep(1, 0, 10, 10)).unwrap();
        run_until(&sim, |s| s.job_state(&id) == Some(JobRunState::Running));

        let task = tracker.task_infos(&id).unwrap()[1].task_id.clone();
        let attempt = TaskAttemptId::new(task.clone(), 0);
        run_until(&sim, |s| {
            !s.tracker().task_info(&task).unwrap().attempts.is_empty()
        });
        tracker.kill_task_attempt(&attempt, false).unwrap();

        let err = tracker.kill_task_attempt(&attempt, false).unwrap_err();
        assert!(err.is_control_channel());
    }

    #[test]
    fn test_working_dir_lives_under_second_root_until_reaped() {
        let sim = SimCluster::new();
        let tracker = sim.tracker();
        let id = tracker.submit_job(&JobSpec::sleep(1, 0, 10, 10)).unwrap();
        run_until(&sim, |s| s.job_state(&id) == Some(JobRunState::Running));
        let task = tracker.task_infos(&id).unwrap()[1].task_id.clone();
        let attempt = TaskAttemptId::new(task.clone(), 0);
        run_until(&sim, |s| s.has_working_dir(&attempt));

        let node = sim.node(SIM_HOST).unwrap();
        let rel = local_task_dir(SIM_USER, &id, &attempt);
        let first = Path::new(SIM_LOCAL_ROOTS[0]).join(&rel);
        let second = Path::new(SIM_LOCAL_ROOTS[1]).join(&rel);
        assert!(node.list_status(&first, true).unwrap().is_empty());
        assert_eq!(node.list_status(&second, true).unwrap().len(), 2);
        assert_eq!(node.list_status(&second, false).unwrap().len(), 2);

        tracker.kill_task_attempt(&attempt, false).unwrap();
        run_until(&sim, |s| !s.has_working_dir(&attempt));
        assert!(node.list_status(&second, true).unwrap().is_empty());
    }

    #[test]
    fn test_finish_signal_only_moves_controlled_jobs() {
        let sim = SimCluster::new();
        let tracker = sim.tracker();
        let mut spec = JobSpec::sleep(1, 0, 10, 10);
        spec.controlled = true;
        let id = tracker.submit_job(&spec).unwrap();
        run_until(&sim, |s| s.job_state(&id) == Some(JobRunState::Running));
        let task = tracker.task_infos(&id).unwrap()[1].task_id.clone();
        run_until(&sim, |s| {
            !s.tracker().task_info(&task).unwrap().attempts.is_empty()
        });

        sim.node(SIM_HOST)
            .unwrap()
            .send_action(&ControlAction::FinishTask {
                task_id: task.clone(),
            })
            .unwrap();
        run_until(&sim, |s| s.job_state(&id) == Some(JobRunState::Succeeded));
        assert_eq!(sim.actions().len(), 1);
    }

    #[test]
    fn test_submission_checks_input_path() {
        let sim = SimCluster::new();
        let spec = JobSpec::new("Word Count", JobKind::WordCount, 1, 1).with_io("input", "output");
        let err = sim.tracker().submit_job(&spec).unwrap_err();
        assert!(matches!(err, ClientError::SubmissionRejected { .. }));

        std::fs::create_dir_all(sim.dfs_root().join("input")).unwrap();
        assert!(sim.tracker().submit_job(&spec).is_ok());
    }
}
