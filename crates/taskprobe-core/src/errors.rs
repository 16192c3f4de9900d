use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on path '{path}': {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    General(String),

    #[error("Configuration file not found at '{0}'.")]
    ConfigNotFound(PathBuf),

    #[error("Could not determine HOME directory.")]
    HomeDirectoryNotFound,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unrecognized node address '{input}': {reason}. Expected '<role>_<host>:<port>'.")]
    InvalidNodeAddress { input: String, reason: String },

    #[error("Invalid task attempt id '{0}'. Expected 'attempt_<job>_<type>_<task>_<index>'.")]
    InvalidAttemptId(String),

    #[error("Unknown scenario '{name}'.\nAvailable scenarios: {}", available.join(", "))]
    UnknownScenario {
        name: String,
        available: Vec<String>,
    },
}
