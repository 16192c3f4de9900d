pub mod client;
pub mod cluster;
pub mod dfs;
pub mod error;
pub mod inputs;
pub mod nodes;
pub mod tracker;
mod transport;

pub use client::ClusterClient;
pub use cluster::{Cluster, Dfs, JobTracker, NodeClient};
pub use error::{ClientError, Result};
