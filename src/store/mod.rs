//! # Deploy Store
//!
//! Durable, versioned storage of deploy state, pending deploys, cancel
//! markers and deploy result history.
//!
//! Promotion of a deploy to active goes through
//! [`DeployStore::save_deploy_state`], a compare-and-swap on the version
//! token read earlier in the same pass. A losing writer gets
//! [`ConditionalPersistResult::Conflict`] and must not retry.

pub mod memory;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::RolloutResult;
use crate::models::{
    CancelMarker, Deploy, DeployKey, DeployResult, DeployState, PendingDeploy,
    VersionedDeployState,
};

pub use memory::InMemoryDeployStore;

/// Outcome of a versioned write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalPersistResult {
    Saved,
    /// The stored version moved on since it was read
    Conflict,
    /// No deploy state exists for the request
    NotFound,
}

impl ConditionalPersistResult {
    pub const fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }
}

/// Outcome of a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteResult {
    Deleted,
    DidNotExist,
}

#[async_trait]
pub trait DeployStore: Send + Sync {
    /// All deploys currently being rolled out
    async fn pending_deploys(&self) -> RolloutResult<Vec<PendingDeploy>>;

    /// All outstanding cancel markers
    async fn cancel_deploys(&self) -> RolloutResult<Vec<CancelMarker>>;

    /// Deploy state of a request with the version it was read at
    async fn deploy_state(&self, request_id: &str) -> RolloutResult<Option<VersionedDeployState>>;

    /// Replace a request's deploy state if its version still equals `expected_version`
    async fn save_deploy_state(
        &self,
        state: &DeployState,
        expected_version: i64,
    ) -> RolloutResult<ConditionalPersistResult>;

    async fn save_pending_deploy(&self, pending: &PendingDeploy) -> RolloutResult<()>;

    async fn delete_pending_deploy(&self, pending: &PendingDeploy) -> RolloutResult<DeleteResult>;

    async fn delete_cancel_deploy(&self, cancel: &CancelMarker) -> RolloutResult<DeleteResult>;

    /// Resolve deploy definitions; keys without a definition are absent from the map
    async fn deploys_for_keys(&self, keys: &[DeployKey])
        -> RolloutResult<HashMap<DeployKey, Deploy>>;

    /// Record the final outcome of a deploy
    async fn save_deploy_result(&self, key: &DeployKey, result: &DeployResult)
        -> RolloutResult<()>;
}
