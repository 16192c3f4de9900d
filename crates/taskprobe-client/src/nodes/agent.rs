use crate::cluster::NodeClient;
use crate::error::{ClientError, Result};
use crate::transport::HttpTransport;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use taskprobe_core::model::{ControlAction, FileEntry};

#[derive(Debug, Deserialize)]
struct LocalDirsResponse {
    local_dirs: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    entries: Vec<FileEntry>,
}

/// The test agent running beside each execution node's daemon.
pub struct HttpNodeAgent {
    host: String,
    transport: HttpTransport,
}

impl HttpNodeAgent {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        Self::with_base_url(host, format!("http://{}:{}", host, port), timeout)
    }

    pub fn with_base_url(host: &str, base_url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            host: host.to_string(),
            transport: HttpTransport::new(base_url, timeout)?,
        })
    }
}

impl NodeClient for HttpNodeAgent {
    fn host(&self) -> &str {
        &self.host
    }

    fn send_action(&self, action: &ControlAction) -> Result<()> {
        let control_err = |reason: String| ClientError::ControlChannel {
            target: self.host.clone(),
            reason,
        };

        let (status, body) = self
            .transport
            .post_raw("/actions", action)
            .map_err(|e| control_err(e.to_string()))?;

        if (200..300).contains(&status) {
            tracing::debug!("Delivered {:?} to {}", action, self.host);
            Ok(())
        } else {
            Err(control_err(format!("HTTP {}: {}", status, body)))
        }
    }

    fn list_status(&self, path: &Path, recursive: bool) -> Result<Vec<FileEntry>> {
        let path_str = path.to_string_lossy().to_string();
        let recursive = if recursive { "true" } else { "false" };
        let response: Result<ListResponse> = self
            .transport
            .get_json_with_query("/ls", &[("path", path_str.as_str()), ("recursive", recursive)]);
        match response {
            Ok(response) => Ok(response.entries),
            Err(ClientError::Status { status: 404, .. }) => {
                tracing::trace!("{} does not exist on {}", path_str, self.host);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn local_dirs(&self) -> Result<Vec<PathBuf>> {
        let response: LocalDirsResponse = self.transport.get_json("/local-dirs")?;
        Ok(response.local_dirs)
    }
}
