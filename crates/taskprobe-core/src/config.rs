use crate::constants::{dirs, files, DEFAULT_MAX_MAP_ATTEMPTS};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub budgets: Budgets,
    pub selection: SelectionConfig,
    pub dfs: DfsConfig,
    pub scenarios: ScenarioConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeAccess {
    #[default]
    Agent,
    Ssh,
}

impl fmt::Display for NodeAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeAccess::Agent => write!(f, "agent"),
            NodeAccess::Ssh => write!(f, "ssh"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub tracker_url: String,
    pub request_timeout_ms: u64,
    pub node_access: NodeAccess,
    pub agent_port: u16,
    pub ssh_user: Option<String>,
    /// Local roots on every node; only consulted in ssh mode.
    pub local_dirs: Vec<PathBuf>,
    pub control_command: String,
    pub default_max_map_attempts: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            tracker_url: "http://localhost:50030/taskprobe".to_string(),
            request_timeout_ms: 30_000,
            node_access: NodeAccess::Agent,
            agent_port: 50061,
            ssh_user: None,
            local_dirs: Vec::new(),
            control_command: "taskprobe-node-control".to_string(),
            default_max_map_attempts: DEFAULT_MAX_MAP_ATTEMPTS,
        }
    }
}

impl ClusterConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// A bounded polling budget: at most `max_attempts` observations,
/// `interval_ms` apart.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct PollBudget {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl PollBudget {
    pub const fn new(max_attempts: u32, interval_ms: u64) -> Self {
        Self {
            max_attempts,
            interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Upper bound on the wall time spent sleeping between observations.
    pub fn total_wait(&self) -> Duration {
        self.interval() * self.max_attempts.saturating_sub(1)
    }
}

impl fmt::Display for PollBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} x {}ms, up to {:?}",
            self.max_attempts,
            self.interval_ms,
            self.total_wait()
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Budgets {
    pub job_start: PollBudget,
    pub task_start: PollBudget,
    pub any_task_running: PollBudget,
    pub node_resolve: PollBudget,
    pub dir_probe: PollBudget,
    pub cleanup: PollBudget,
    pub failure_cleanup: PollBudget,
    pub completion_event: PollBudget,
    pub job_completion: PollBudget,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            job_start: PollBudget::new(60, 1000),
            task_start: PollBudget::new(60, 1000),
            any_task_running: PollBudget::new(10, 5000),
            node_resolve: PollBudget::new(30, 1000),
            dir_probe: PollBudget::new(30, 1000),
            cleanup: PollBudget::new(60, 1000),
            failure_cleanup: PollBudget::new(90, 1000),
            completion_event: PollBudget::new(10, 10_000),
            job_completion: PollBudget::new(600, 1000),
        }
    }
}

impl Budgets {
    fn named(&self) -> [(&'static str, &PollBudget); 9] {
        [
            ("job_start", &self.job_start),
            ("task_start", &self.task_start),
            ("any_task_running", &self.any_task_running),
            ("node_resolve", &self.node_resolve),
            ("dir_probe", &self.dir_probe),
            ("cleanup", &self.cleanup),
            ("failure_cleanup", &self.failure_cleanup),
            ("completion_event", &self.completion_event),
            ("job_completion", &self.job_completion),
        ]
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    #[default]
    First,
    LowestId,
    Seeded,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SelectionConfig {
    pub strategy: SelectionStrategy,
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DfsConfig {
    pub root: PathBuf,
    pub input_dir: String,
    pub output_dir: String,
    pub input_repeat: u64,
}

impl Default for DfsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/mnt/dfs"),
            input_dir: "input".to_string(),
            output_dir: "output".to_string(),
            input_repeat: 3_000_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SleepJobParams {
    pub map_tasks: u32,
    pub reduce_tasks: u32,
    pub map_sleep_ms: u64,
    pub reduce_sleep_ms: u64,
    pub max_attempts: Option<u32>,
}

impl Default for SleepJobParams {
    fn default() -> Self {
        Self {
            map_tasks: 3,
            reduce_tasks: 1,
            map_sleep_ms: 4000,
            reduce_sleep_ms: 4000,
            max_attempts: Some(20),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct WordCountParams {
    pub max_attempts: u32,
}

impl Default for WordCountParams {
    fn default() -> Self {
        Self { max_attempts: 20 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct FailingTaskParams {
    pub fail_after_ms: u64,
}

impl Default for FailingTaskParams {
    fn default() -> Self {
        Self {
            fail_after_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScenarioConfig {
    pub kill_transparency: SleepJobParams,
    pub cleanup_after_kill: WordCountParams,
    pub cleanup_after_failure: FailingTaskParams,
    pub exhaustive_kill: SleepJobParams,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            kill_transparency: SleepJobParams::default(),
            cleanup_after_kill: WordCountParams::default(),
            cleanup_after_failure: FailingTaskParams::default(),
            exhaustive_kill: SleepJobParams {
                map_tasks: 3,
                reduce_tasks: 1,
                map_sleep_ms: 40_000,
                reduce_sleep_ms: 1000,
                max_attempts: None,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub max_files: usize,
    pub max_age_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            max_files: 20,
            max_age_days: 7,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, budget) in self.budgets.named() {
            if budget.max_attempts == 0 {
                return Err(ConfigError::General(format!(
                    "budget '{}' must allow at least one attempt",
                    name
                )));
            }
        }
        if self.cluster.tracker_url.trim().is_empty() {
            return Err(ConfigError::General(
                "cluster.tracker_url must not be empty".to_string(),
            ));
        }
        if self.cluster.node_access == NodeAccess::Ssh && self.cluster.local_dirs.is_empty() {
            return Err(ConfigError::General(
                "cluster.local_dirs must list the node local roots when node_access = \"ssh\""
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn expand_paths(&mut self) -> Result<(), ConfigError> {
        self.dfs.root = expand_path(&self.dfs.root)?;
        Ok(())
    }
}

fn expand_path(path: &Path) -> Result<PathBuf, ConfigError> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .map_err(|e| ConfigError::General(format!("cannot expand path '{}': {}", raw, e)))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let mut config: Config = toml::from_str(content)?;
    config.expand_paths()?;
    config.validate()?;
    Ok(config)
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::PathIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix(dirs::TASKPROBE);
    let config_home = xdg_dirs
        .get_config_home()
        .ok_or(ConfigError::HomeDirectoryNotFound)?;
    Ok(config_home.join(files::CONFIG))
}

/// Loads the explicit config file, or the XDG one. A missing XDG file is
/// not an error; the defaults are used instead.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }

    let path = default_config_path()?;
    if path.exists() {
        tracing::debug!("Loading configuration from {}", path.display());
        load_config_from(&path)
    } else {
        tracing::info!(
            "No configuration at {}, using built-in defaults",
            path.display()
        );
        let mut config = Config::default();
        config.expand_paths()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_budgets_of_the_suite() {
        let config = Config::default();
        assert_eq!(config.budgets.job_start, PollBudget::new(60, 1000));
        assert_eq!(config.budgets.cleanup, PollBudget::new(60, 1000));
        assert_eq!(config.cluster.default_max_map_attempts, 4);
        assert_eq!(config.scenarios.exhaustive_kill.max_attempts, None);
        assert_eq!(config.scenarios.kill_transparency.max_attempts, Some(20));
    }

    #[test]
    fn test_parse_partial_config() {
        let config = parse_config(
            r#"
[cluster]
tracker_url = "http://jt.example.com:50030/taskprobe"
node_access = "ssh"
local_dirs = ["/data/1/mapred/local", "/data/2/mapred/local"]

[budgets.cleanup]
max_attempts = 5
interval_ms = 10

[selection]
strategy = "seeded"
seed = 42
"#,
        )
        .unwrap();

        assert_eq!(config.cluster.node_access, NodeAccess::Ssh);
        assert_eq!(config.cluster.local_dirs.len(), 2);
        assert_eq!(config.budgets.cleanup, PollBudget::new(5, 10));
        assert_eq!(config.budgets.job_start, PollBudget::new(60, 1000));
        assert_eq!(config.selection.strategy, SelectionStrategy::Seeded);
        assert_eq!(config.selection.seed, 42);
    }

    #[test]
    fn test_zero_attempt_budget_is_rejected() {
        let err = parse_config(
            r#"
[budgets.dir_probe]
max_attempts = 0
interval_ms = 100
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("dir_probe"));
    }

    #[test]
    fn test_ssh_mode_requires_local_dirs() {
        let err = parse_config("[cluster]\nnode_access = \"ssh\"\n").unwrap_err();
        assert!(err.to_string().contains("local_dirs"));
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            load_config(Some(&missing)),
            Err(ConfigError::ConfigNotFound(_))
        ));
    }

    #[test]
    fn test_budget_total_wait() {
        assert_eq!(PollBudget::new(60, 1000).total_wait(), Duration::from_secs(59));
        assert_eq!(PollBudget::new(1, 1000).total_wait(), Duration::ZERO);
    }

    #[test]
    fn test_budget_display_includes_total_wait() {
        assert_eq!(PollBudget::new(60, 1000).to_string(), "60 x 1000ms, up to 59s");
        assert_eq!(PollBudget::new(20, 0).to_string(), "20 x 0ms, up to 0ns");
    }
}
