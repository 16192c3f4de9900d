use crate::error::CliError;
use taskprobe_harness::scenarios;

pub fn handle_list() -> Result<(), CliError> {
    println!("Available scenarios:");
    for scenario in scenarios::all() {
        println!("  {:<24} {}", scenario.name(), scenario.description());
    }
    Ok(())
}
