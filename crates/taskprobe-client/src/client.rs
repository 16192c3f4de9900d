use crate::{
    cluster::{Cluster, Dfs, JobTracker, NodeClient},
    dfs::LocalDfs,
    error::{ClientError, Result},
    nodes::{HttpNodeAgent, SshNode},
    tracker::HttpJobTracker,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use taskprobe_core::{
    config::{ClusterConfig, Config, NodeAccess},
    errors::ConfigError,
};

/// The live cluster: the job tracker gateway, one client per execution
/// node (created on first use), and the DFS mount.
#[derive(Clone)]
pub struct ClusterClient {
    cluster_config: Arc<ClusterConfig>,
    tracker: Arc<HttpJobTracker>,
    nodes: Arc<Mutex<HashMap<String, Arc<dyn NodeClient>>>>,
    dfs: Arc<LocalDfs>,
}

impl ClusterClient {
    pub fn new(config: &Config) -> Result<Self> {
        let cluster = &config.cluster;
        let tracker = HttpJobTracker::new(&cluster.tracker_url, cluster.request_timeout())?;
        tracing::debug!(
            "Cluster client for {} (node access: {})",
            tracker.base_url(),
            cluster.node_access
        );

        Ok(Self {
            cluster_config: Arc::new(cluster.clone()),
            tracker: Arc::new(tracker),
            nodes: Arc::new(Mutex::new(HashMap::new())),
            dfs: Arc::new(LocalDfs::new(config.dfs.root.clone())),
        })
    }

    /// Verifies the tracker is reachable before any scenario starts.
    pub fn connect(&self) -> Result<()> {
        self.tracker.ping()?;
        tracing::info!("Connected to job tracker at {}", self.tracker.base_url());
        Ok(())
    }

    /// Drops every cached node client.
    pub fn disconnect(&self) {
        if let Ok(mut nodes) = self.nodes.lock() {
            nodes.clear();
        }
    }

    fn build_node(&self, host: &str) -> Result<Arc<dyn NodeClient>> {
        let cfg = &self.cluster_config;
        let node: Arc<dyn NodeClient> = match cfg.node_access {
            NodeAccess::Agent => Arc::new(HttpNodeAgent::new(
                host,
                cfg.agent_port,
                cfg.request_timeout(),
            )?),
            NodeAccess::Ssh => Arc::new(SshNode::new(
                host,
                cfg.ssh_user.as_deref(),
                cfg.local_dirs.clone(),
                &cfg.control_command,
            )),
        };
        Ok(node)
    }
}

impl Cluster for ClusterClient {
    fn tracker(&self) -> Arc<dyn JobTracker> {
        self.tracker.clone()
    }

    fn node(&self, host: &str) -> Result<Arc<dyn NodeClient>> {
        let mut nodes = self.nodes.lock().map_err(|_| {
            ClientError::Config(ConfigError::General(
                "node client cache lock poisoned".to_string(),
            ))
        })?;

        if let Some(node) = nodes.get(host) {
            return Ok(node.clone());
        }

        let node = self.build_node(host)?;
        nodes.insert(host.to_string(), node.clone());
        Ok(node)
    }

    fn dfs(&self) -> Arc<dyn Dfs> {
        self.dfs.clone()
    }
}
