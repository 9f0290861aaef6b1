//! # Rollout System Bootstrap
//!
//! Wires configuration, collaborators, the deploy checker and its poller
//! into one handle the host process starts and stops.

use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::deploy_checker::{DeployChecker, DeployCheckerDependencies};
use super::deploy_poller::DeployPoller;
use crate::config::RolloutConfig;
use crate::error::{RolloutError, RolloutResult};

/// Configured deploy checker ready to be started
#[derive(Debug, Clone)]
pub struct RolloutSystem {
    config: RolloutConfig,
    checker: Arc<DeployChecker>,
}

impl RolloutSystem {
    /// Build from explicit collaborators
    pub fn new(config: RolloutConfig, dependencies: DeployCheckerDependencies) -> RolloutResult<Self> {
        config.validate()?;
        let checker = Arc::new(DeployChecker::new(
            dependencies,
            config.deploy_checker.clone(),
        ));
        Ok(Self { config, checker })
    }

    /// Build against Postgres and the HTTP load balancer gateway
    #[cfg(feature = "postgres")]
    pub async fn bootstrap(config: RolloutConfig) -> RolloutResult<Self> {
        use crate::database::{
            self, PgDeployStore, PgHealthcheckSource, PgRequestSource, PgTaskRegistry,
        };
        use crate::health::HealthcheckDeployHealthEvaluator;
        use crate::load_balancer::HttpLoadBalancerClient;

        info!("Bootstrapping rollout system");
        config.validate()?;

        let pool = database::connect(&config.database).await?;
        database::run_migrations(&pool).await?;

        let dependencies = DeployCheckerDependencies {
            deploy_store: Arc::new(PgDeployStore::new(pool.clone())),
            task_registry: Arc::new(PgTaskRegistry::new(pool.clone())),
            request_source: Arc::new(PgRequestSource::new(pool.clone())),
            health_evaluator: Arc::new(HealthcheckDeployHealthEvaluator::new(Arc::new(
                PgHealthcheckSource::new(pool),
            ))),
            load_balancer: Arc::new(HttpLoadBalancerClient::new(&config.load_balancer)?),
        };

        Self::new(config, dependencies)
    }

    pub fn config(&self) -> &RolloutConfig {
        &self.config
    }

    pub fn checker(&self) -> Arc<DeployChecker> {
        self.checker.clone()
    }

    /// Spawn the poller unless the deploy checker is disabled
    pub fn start(&self) -> RolloutSystemHandle {
        if !self.config.deploy_checker.enabled {
            warn!("Deploy checker disabled by configuration, poller not started");
            return RolloutSystemHandle {
                shutdown_sender: None,
                poller: None,
            };
        }

        let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();
        let poller = DeployPoller::new(self.checker.clone()).spawn(shutdown_receiver);

        info!(
            interval_ms = self.config.deploy_checker.check_interval_ms,
            "Rollout system started"
        );

        RolloutSystemHandle {
            shutdown_sender: Some(shutdown_sender),
            poller: Some(poller),
        }
    }
}

/// Lifecycle handle for a started rollout system
#[derive(Debug)]
pub struct RolloutSystemHandle {
    shutdown_sender: Option<oneshot::Sender<()>>,
    poller: Option<JoinHandle<RolloutResult<()>>>,
}

impl RolloutSystemHandle {
    pub fn is_running(&self) -> bool {
        self.shutdown_sender.is_some()
    }

    /// Signal the poller and wait for its in-flight pass to finish
    pub async fn stop(&mut self) -> RolloutResult<()> {
        let Some(sender) = self.shutdown_sender.take() else {
            warn!("Rollout system already stopped");
            return Ok(());
        };

        if sender.send(()).is_err() {
            warn!("Deploy poller exited before shutdown was requested");
        }

        if let Some(poller) = self.poller.take() {
            poller.await.map_err(|e| {
                error!(error = %e, "Deploy poller task failed");
                RolloutError::Internal(format!("Deploy poller task failed: {e}"))
            })??;
        }

        info!("Rollout system stopped");
        Ok(())
    }
}
