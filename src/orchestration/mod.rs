//! # Deploy Orchestration
//!
//! The deploy checker, the poller that schedules it and the bootstrap that
//! wires both to their collaborators.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rollout_core::config::RolloutConfig;
//! use rollout_core::orchestration::RolloutSystem;
//!
//! let system = RolloutSystem::bootstrap(RolloutConfig::load()?).await?;
//! let mut handle = system.start();
//! tokio::signal::ctrl_c().await?;
//! handle.stop().await?;
//! ```

pub mod bootstrap;
pub mod deploy_checker;
pub mod deploy_poller;

pub use bootstrap::{RolloutSystem, RolloutSystemHandle};
pub use deploy_checker::{
    DeployCheckOutcome, DeployCheckSummary, DeployChecker, DeployCheckerDependencies,
};
pub use deploy_poller::DeployPoller;
