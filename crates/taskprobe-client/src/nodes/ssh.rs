use super::remote_command::{shell_quote, RemoteCommand};
use crate::cluster::NodeClient;
use crate::error::{ClientError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use taskprobe_core::{
    errors::ConfigError,
    logging,
    model::{ControlAction, FileEntry},
};

/// Node reached over `ssh`. Directory listings come straight from the
/// node's filesystem, independent of what the scheduler reports.
pub struct SshNode {
    host: String,
    address: String,
    local_dirs: Vec<PathBuf>,
    control_command: String,
}

impl SshNode {
    pub fn new(
        host: &str,
        user: Option<&str>,
        local_dirs: Vec<PathBuf>,
        control_command: &str,
    ) -> Self {
        let address = match user {
            Some(user) => format!("{}@{}", user, host),
            None => host.to_string(),
        };
        Self {
            host: host.to_string(),
            address,
            local_dirs,
            control_command: control_command.to_string(),
        }
    }

    fn run_remote(&self, remote: &RemoteCommand) -> Result<String> {
        let remote_string = format!("sh -c {}", shell_quote(&remote.to_shell_string()));

        let mut cmd = Command::new("ssh");
        cmd.arg("-o")
            .arg("BatchMode=yes")
            .arg(&self.address)
            .arg(&remote_string);

        logging::log_and_print_command(&cmd);
        let output = cmd.output().map_err(|e| ClientError::NodeCommandFailed {
            node: self.host.clone(),
            source: ConfigError::Io(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClientError::NodeCommandFailed {
                node: self.host.clone(),
                source: ConfigError::General(format!(
                    "'{}' exited with {}: {}",
                    remote_string,
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                )),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Lists the entries below `path`. A missing path lists as empty; any
/// failure of `find` itself fails the command.
pub(crate) fn listing_command(path: &Path, recursive: bool) -> RemoteCommand {
    let path_str = path.to_string_lossy();
    let mut find = RemoteCommand::new("find").arg(&path_str).args(["-mindepth", "1"]);
    if !recursive {
        find = find.args(["-maxdepth", "1"]);
    }
    let find = find.args(["-printf", "%y %s %p\\n"]);

    RemoteCommand::new("test")
        .args(["!", "-e", &*path_str])
        .otherwise(find)
}

/// Parses `find -printf '%y %s %p\n'` output.
pub(crate) fn parse_find_output(output: &str) -> Vec<FileEntry> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(3, ' ');
            let kind = fields.next()?;
            let len = fields.next()?.parse::<u64>().ok()?;
            let path = fields.next()?;
            if path.is_empty() {
                return None;
            }
            Some(FileEntry {
                path: PathBuf::from(path),
                len,
                is_dir: kind == "d",
            })
        })
        .collect()
}

impl NodeClient for SshNode {
    fn host(&self) -> &str {
        &self.host
    }

    fn send_action(&self, action: &ControlAction) -> Result<()> {
        let command = match action {
            ControlAction::FinishTask { task_id } => RemoteCommand::new(&self.control_command)
                .arg("finish-task")
                .arg(&task_id.0),
        };

        self.run_remote(&command)
            .map(|_| ())
            .map_err(|e| ClientError::ControlChannel {
                target: self.host.clone(),
                reason: e.to_string(),
            })
    }

    fn list_status(&self, path: &Path, recursive: bool) -> Result<Vec<FileEntry>> {
        let output = self.run_remote(&listing_command(path, recursive))?;
        Ok(parse_find_output(&output))
    }

    fn local_dirs(&self) -> Result<Vec<PathBuf>> {
        Ok(self.local_dirs.clone())
    }
}
