use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] taskprobe_core::errors::ConfigError),

    #[error(transparent)]
    Domain(#[from] taskprobe_core::errors::DomainError),

    #[error(transparent)]
    Client(#[from] taskprobe_client::ClientError),

    #[error("{failed} of {total} scenario(s) failed")]
    ScenariosFailed { failed: usize, total: usize },
}
