//! # Deploy Health
//!
//! Cohort-level health verdicts for the tasks of a pending deploy.
//!
//! The checker consumes [`DeployHealthEvaluator`]. The bundled
//! [`HealthcheckDeployHealthEvaluator`] derives the verdict from per-task
//! health check results supplied by any [`HealthcheckResultSource`].

pub mod evaluator;

use async_trait::async_trait;
use std::fmt;

use crate::error::RolloutResult;
use crate::models::{Deploy, TaskId};

pub use evaluator::{
    HealthcheckDeployHealthEvaluator, HealthcheckResult, HealthcheckResultSource,
    InMemoryHealthcheckSource,
};

/// Aggregate health of all tasks matching a deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeployHealth {
    /// Some tasks have not reported yet
    Waiting,
    Healthy,
    /// At least one task failed its check
    Unhealthy,
}

impl fmt::Display for DeployHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

#[async_trait]
pub trait DeployHealthEvaluator: Send + Sync {
    /// Verdict for the given cohort of `deploy`'s running tasks
    async fn deploy_health(&self, deploy: &Deploy, task_ids: &[TaskId])
        -> RolloutResult<DeployHealth>;
}
