use super::connect;
use crate::cli::RunArgs;
use crate::error::CliError;
use std::sync::Arc;
use taskprobe_client::Cluster;
use taskprobe_core::config::Config;
use taskprobe_harness::{report, scenarios, ScenarioContext};

pub fn handle_run(args: RunArgs, config: Config) -> Result<(), CliError> {
    let names = if args.all { Vec::new() } else { args.scenarios };
    // Reject unknown names before touching the cluster.
    for name in &names {
        scenarios::find(name)?;
    }

    let client = connect(&config)?;
    let cluster: Arc<dyn Cluster> = client.clone();
    let ctx = ScenarioContext::new(cluster, config);

    let outcomes = scenarios::run_scenarios(&ctx, &names, args.parallel)?;
    client.disconnect();

    println!("{}", report::render_table(&outcomes));
    println!("{}", report::render_summary(&outcomes));

    let failed = outcomes.iter().filter(|o| !o.passed()).count();
    if failed > 0 {
        return Err(CliError::ScenariosFailed {
            failed,
            total: outcomes.len(),
        });
    }
    Ok(())
}
