use std::fs;
use std::path::{Path, PathBuf};
use taskprobe_core::config::{self, Budgets, Config, PollBudget};

/// Budgets that never sleep. Against the simulated cluster every poll
/// advances time, so only the attempt counts matter.
pub fn fast_budgets() -> Budgets {
    let quick = PollBudget::new(200, 0);
    Budgets {
        job_start: quick,
        task_start: quick,
        any_task_running: quick,
        node_resolve: quick,
        dir_probe: PollBudget::new(20, 0),
        cleanup: quick,
        failure_cleanup: quick,
        completion_event: PollBudget::new(20, 0),
        job_completion: PollBudget::new(1000, 0),
    }
}

/// A configuration suited to the simulated cluster: fast budgets, a small
/// input file and the DFS rooted at `dfs_root`.
pub fn sim_config(dfs_root: &Path) -> Config {
    let mut config = Config::default();
    config.budgets = fast_budgets();
    config.dfs.root = dfs_root.to_path_buf();
    config.dfs.input_repeat = 10;
    config
}

pub struct TestContext {
    pub _temp_dir: tempfile::TempDir,
    pub test_root: PathBuf,
    pub config_dir: PathBuf,
    pub dfs_root: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_tracker_url("http://127.0.0.1:9/taskprobe")
    }

    /// Writes `<config_dir>/taskprobe/config.toml` pointing at `tracker_url`,
    /// suitable for use as `XDG_CONFIG_HOME`.
    pub fn with_tracker_url(tracker_url: &str) -> Self {
        let temp_dir = tempfile::Builder::new()
            .prefix("taskprobe-test-")
            .tempdir()
            .expect("Failed to create temp dir");
        let test_root = temp_dir.path().to_path_buf();

        let config_dir = test_root.join("config");
        let dfs_root = test_root.join("dfs");
        fs::create_dir_all(config_dir.join("taskprobe")).expect("Failed to create config dir");
        fs::create_dir_all(&dfs_root).expect("Failed to create dfs dir");

        let config_content = format!(
            r#"
[cluster]
tracker_url = "{}"
request_timeout_ms = 2000

[dfs]
root = "{}"
input_repeat = 10

[budgets.job_start]
max_attempts = 3
interval_ms = 10

[budgets.job_completion]
max_attempts = 3
interval_ms = 10
"#,
            tracker_url,
            dfs_root.display()
        );
        fs::write(config_dir.join("taskprobe").join("config.toml"), config_content)
            .expect("Failed to write temp config");

        Self {
            _temp_dir: temp_dir,
            test_root,
            config_dir,
            dfs_root,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("taskprobe").join("config.toml")
    }

    pub fn load_config(&self) -> Config {
        config::load_config_from(&self.config_path()).expect("Failed to load test config")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
