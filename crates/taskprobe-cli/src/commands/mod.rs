use crate::error::CliError;
use std::sync::Arc;
use taskprobe_client::ClusterClient;
use taskprobe_core::config::Config;

pub mod list;
pub mod ping;
pub mod run;
pub mod status;

/// Builds the cluster client and checks the tracker answers.
pub(crate) fn connect(config: &Config) -> Result<Arc<ClusterClient>, CliError> {
    let client = ClusterClient::new(config)?;
    client.connect()?;
    Ok(Arc::new(client))
}
