use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "taskprobe",
    version,
    about = "Kill, fail and cleanup convergence checks for a job cluster.",
    long_about = "Drives a job cluster through attempt kills and failures, then verifies \
                  the final job and task states and the removal of every attempt's working directory."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        help = "Path to config.toml (defaults to $XDG_CONFIG_HOME/taskprobe/config.toml)"
    )]
    pub config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity level (-v for debug, -vv for trace)")]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "List the available scenarios")]
    List,

    #[command(about = "Run scenarios against the cluster")]
    Run(RunArgs),

    #[command(about = "Show a job's status and tasks")]
    Status(StatusArgs),

    #[command(about = "Check that the job tracker is reachable")]
    Ping,
}

#[derive(Args)]
pub struct RunArgs {
    #[arg(
        value_name = "SCENARIO",
        required_unless_present = "all",
        conflicts_with = "all",
        help = "Scenarios to run, by name"
    )]
    pub scenarios: Vec<String>,

    #[arg(long, help = "Run every scenario")]
    pub all: bool,

    #[arg(long, help = "Run the scenarios concurrently")]
    pub parallel: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    #[arg(help = "Job ID to inspect")]
    pub job_id: String,
}
