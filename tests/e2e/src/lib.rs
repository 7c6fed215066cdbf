//! Shared setup for scenarios against a real `mongod`
//!
//! Every test here needs a server binary. Point `RBACPROBE_MONGOD` at one
//! (and optionally `RBACPROBE_CONFIG` at a TOML file) and run with
//! `--ignored`. `RUST_LOG` controls verbosity; `rbacprobe::mongod=debug`
//! shows the server's own output.

use anyhow::Context;
use rbacprobe_core::HarnessConfig;
use rbacprobe_scenarios::{Scenario, ScenarioReport, ScenarioRunner};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Runner built from the environment
pub fn runner() -> anyhow::Result<ScenarioRunner> {
    init_tracing();
    let config = HarnessConfig::from_env().context("Failed to load harness configuration")?;
    Ok(ScenarioRunner::new(config))
}

/// Run `scenario` on a fresh server and log the outcome
pub async fn run(scenario: Scenario) -> anyhow::Result<ScenarioReport> {
    let runner = runner()?;
    let report = runner
        .run(scenario)
        .await
        .with_context(|| format!("Scenario {} failed", scenario))?;

    tracing::info!(
        run_id = %report.run_id,
        "{} observed {:?} in {:?}",
        scenario,
        report.outcome,
        report.elapsed
    );
    Ok(report)
}
