//! Deploy Checker Binary
//!
//! Runs the deploy checker poller against PostgreSQL and the configured load
//! balancer gateway until interrupted.

use anyhow::Context;
use tokio::signal;
use tracing::info;

use rollout_core::config::RolloutConfig;
use rollout_core::logging::init_structured_logging;
use rollout_core::orchestration::RolloutSystem;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config = RolloutConfig::load().context("failed to load rollout configuration")?;
    info!(
        interval_ms = config.deploy_checker.check_interval_ms,
        load_balancer_configured = config.load_balancer.uri.is_some(),
        "Starting deploy checker"
    );

    let system = RolloutSystem::bootstrap(config)
        .await
        .context("failed to bootstrap rollout system")?;
    let mut handle = system.start();

    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    handle.stop().await.context("failed to stop deploy poller")?;
    info!("Deploy checker stopped");

    Ok(())
}
