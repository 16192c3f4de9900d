use super::connect;
use crate::error::CliError;
use colored::Colorize;
use taskprobe_core::config::Config;

pub fn handle_ping(config: &Config) -> Result<(), CliError> {
    let client = connect(config)?;
    println!(
        "{} job tracker at {} is reachable",
        "[OK]".green(),
        config.cluster.tracker_url
    );
    client.disconnect();
    Ok(())
}
