use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] taskprobe_core::errors::ConfigError),

    #[error(transparent)]
    Domain(#[from] taskprobe_core::errors::DomainError),

    #[error("Job submission rejected: {reason}")]
    SubmissionRejected { reason: String },

    #[error("Request to '{endpoint}' failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to '{endpoint}' returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Could not decode response from '{endpoint}': {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("Control call to '{target}' failed: {reason}")]
    ControlChannel { target: String, reason: String },

    #[error("Unknown {kind} '{id}'")]
    NotFound { kind: &'static str, id: String },

    #[error("Command failed on node '{node}': {source}")]
    NodeCommandFailed {
        node: String,
        source: taskprobe_core::errors::ConfigError,
    },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        path: std::path::PathBuf,
        reason: String,
    },
}

impl ClientError {
    pub fn is_control_channel(&self) -> bool {
        matches!(self, ClientError::ControlChannel { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
