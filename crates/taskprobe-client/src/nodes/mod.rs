mod agent;
mod remote_command;
mod ssh;

pub use agent::HttpNodeAgent;
pub use remote_command::{shell_quote, RemoteCommand};
pub use ssh::SshNode;
