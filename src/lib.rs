#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Rollout Core Rust
//!
//! Deploy reconciliation core for a cluster task orchestrator.
//!
//! ## Overview
//!
//! A deploy introduces a new version of a long-running request. While it is
//! pending, a periodic checker pass looks at every pending deploy and decides
//! whether to keep waiting, promote it to active, roll it back or cancel it.
//! Promotion of a load-balanced deploy goes through an asynchronous cutover
//! against an external load balancer control plane that may take several
//! passes to settle.
//!
//! ## Key Features
//!
//! - **Health-gated promotion**: all instances must be running and healthy
//! - **Deadlines**: deploys that never become healthy are marked overdue
//! - **Operator cancellation**: cancel markers abort a rollout mid-flight
//! - **Optimistic concurrency**: promotion is a compare-and-swap on the
//!   deploy state version read earlier in the same pass
//! - **Error isolation**: one failing deploy never stops a pass
//!
//! ## Module Organization
//!
//! - [`models`] - Deploy, task, request and load balancer data types
//! - [`state_machine`] - Decision kinds and pure guards
//! - [`orchestration`] - Deploy checker, poller and bootstrap
//! - [`store`] - Versioned deploy state storage
//! - [`registry`] - Task registry and request definitions
//! - [`health`] - Cohort health evaluation
//! - [`load_balancer`] - Cutover gateway client
//! - [`database`] - PostgreSQL adapters for the collaborator traits
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//! - [`metrics`] - OpenTelemetry instruments
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rollout_core::config::RolloutConfig;
//! use rollout_core::orchestration::RolloutSystem;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RolloutConfig::load()?;
//! let system = RolloutSystem::bootstrap(config).await?;
//!
//! // One-off pass outside the poller
//! let summary = system.checker().check_deploys().await?;
//! println!("Processed {} pending deploys", summary.processed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Every collaborator has an in-memory implementation, so the checker can be
//! exercised end to end without a database:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and scenario tests
//! ```

pub mod config;
pub mod constants;
#[cfg(feature = "postgres")]
pub mod database;
pub mod error;
pub mod health;
pub mod load_balancer;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod state_machine;
pub mod store;

pub use config::{DatabaseConfig, DeployCheckerConfig, LoadBalancerConfig, RolloutConfig};
pub use error::{RolloutError, RolloutResult};
pub use health::{DeployHealth, DeployHealthEvaluator};
pub use load_balancer::LoadBalancerClient;
pub use models::{
    CancelMarker, Deploy, DeployKey, DeployMarker, DeployResult, DeployState, PendingDeploy,
    Request, RequestType, Task, TaskCleanup, TaskCleanupType, TaskId,
};
pub use orchestration::{
    DeployCheckOutcome, DeployCheckSummary, DeployChecker, DeployCheckerDependencies,
    DeployPoller, RolloutSystem, RolloutSystemHandle,
};
pub use registry::{RequestSource, TaskRegistry};
pub use state_machine::DeployCheckResult;
pub use store::{ConditionalPersistResult, DeleteResult, DeployStore};
