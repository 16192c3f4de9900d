mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use error::CliError;
use taskprobe_core::{config, logging};

fn main() {
    let cli = Cli::parse();

    logging::set_log_level(log_level(cli.verbose));
    logging::set_log_level_from_env();

    if let Err(e) = run(cli) {
        eprintln!("{}", format!("[ERROR] {}", e).red());
        std::process::exit(1);
    }
}

/// INFO by default, one level more verbose per `-v`.
fn log_level(verbose: u8) -> logging::LogLevel {
    logging::LogLevel::from(verbose.saturating_add(2))
}

fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::List = cli.command {
        return commands::list::handle_list();
    }

    let config = config::load_config(cli.config.as_deref())?;
    if let Err(e) = logging::init_session_logger(&config.logging) {
        eprintln!(
            "{}",
            format!("[ERROR] Failed to initialize session logger: {}", e).red()
        );
        logging::init_stderr_logger();
    }

    match cli.command {
        Commands::List => commands::list::handle_list(),
        Commands::Run(args) => commands::run::handle_run(args, config),
        Commands::Status(args) => commands::status::handle_status(args, &config),
        Commands::Ping => commands::ping::handle_ping(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskprobe_core::logging::LogLevel;

    #[test]
    fn test_log_level_from_verbosity() {
        assert_eq!(log_level(0), LogLevel::Info);
        assert_eq!(log_level(1), LogLevel::Debug);
        assert_eq!(log_level(2), LogLevel::Trace);
        assert_eq!(log_level(u8::MAX - 1), LogLevel::Trace);
        assert_eq!(log_level(u8::MAX), LogLevel::Trace);
    }
}
