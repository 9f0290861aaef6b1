//! # Deploy Poller
//!
//! Background service that runs the deploy checker on a fixed interval.
//!
//! Passes never overlap: the next tick is awaited only once the current
//! pass has returned, and ticks missed during a long pass are delayed rather
//! than burst. A failed pass is logged and the loop carries on.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::deploy_checker::{DeployChecker, DeployCheckSummary};
use crate::error::RolloutResult;

#[derive(Debug, Clone)]
pub struct DeployPoller {
    checker: Arc<DeployChecker>,
    check_interval: Duration,
}

impl DeployPoller {
    pub fn new(checker: Arc<DeployChecker>) -> Self {
        let check_interval = checker.config().check_interval();
        Self {
            checker,
            check_interval,
        }
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Run a single pass, logging rather than returning a failure
    pub async fn run_once(&self) -> Option<DeployCheckSummary> {
        match self.checker.check_deploys().await {
            Ok(summary) => {
                debug!(processed = summary.processed, "Deploy poller pass finished");
                Some(summary)
            }
            Err(e) => {
                error!(error = %e, "Deploy check pass failed");
                None
            }
        }
    }

    /// Run passes until `shutdown` fires or its sender is dropped
    pub async fn run(&self, mut shutdown: oneshot::Receiver<()>) -> RolloutResult<()> {
        let mut timer = interval(self.check_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_ms = self.check_interval.as_millis() as u64,
            max_concurrent_checks = self.checker.config().max_concurrent_checks,
            "Starting deploy poller"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Deploy poller received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.run_once().await;
                }
            }
        }

        Ok(())
    }

    /// Run the poller on its own tokio task
    pub fn spawn(self, shutdown: oneshot::Receiver<()>) -> JoinHandle<RolloutResult<()>> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
