pub mod error;
pub mod injector;
pub mod job;
pub mod locator;
pub mod poller;
pub mod report;
pub mod scenarios;
pub mod verifier;

pub use error::{Result, VerifyError};
pub use scenarios::{run_scenarios, Scenario, ScenarioContext, ScenarioOutcome, Verdict};
