//! In-memory deploy store.
//!
//! Single-process only and not durable. Used by tests and local runs, and
//! as the reference for the version semantics the Postgres store follows.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::{ConditionalPersistResult, DeleteResult, DeployStore};
use crate::error::{RolloutError, RolloutResult};
use crate::models::{
    CancelMarker, Deploy, DeployKey, DeployResult, DeployState, PendingDeploy,
    VersionedDeployState,
};

#[derive(Debug, Default)]
struct StoreState {
    pending: BTreeMap<DeployKey, PendingDeploy>,
    cancels: BTreeMap<DeployKey, CancelMarker>,
    states: HashMap<String, VersionedDeployState>,
    deploys: HashMap<DeployKey, Deploy>,
    results: HashMap<DeployKey, DeployResult>,
    faulted_requests: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryDeployStore {
    state: RwLock<StoreState>,
}

impl InMemoryDeployStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_pending_deploy(&self, pending: PendingDeploy) {
        self.state.write().pending.insert(pending.deploy_key(), pending);
    }

    pub fn insert_cancel_marker(&self, cancel: CancelMarker) {
        self.state.write().cancels.insert(cancel.key(), cancel);
    }

    pub fn insert_deploy(&self, deploy: Deploy) {
        self.state.write().deploys.insert(deploy.key(), deploy);
    }

    /// Seed a request's deploy state at version 0
    pub fn insert_deploy_state(&self, deploy_state: DeployState) {
        self.state.write().states.insert(
            deploy_state.request_id.clone(),
            VersionedDeployState {
                deploy_state,
                version: 0,
            },
        );
    }

    /// Simulate a write by another process, invalidating earlier reads
    pub fn bump_version(&self, request_id: &str) {
        if let Some(versioned) = self.state.write().states.get_mut(request_id) {
            versioned.version += 1;
        }
    }

    /// Make every deploy state read for `request_id` fail
    pub fn inject_fault(&self, request_id: impl Into<String>) {
        self.state.write().faulted_requests.insert(request_id.into());
    }

    pub fn clear_faults(&self) {
        self.state.write().faulted_requests.clear();
    }

    pub fn pending_deploy(&self, key: &DeployKey) -> Option<PendingDeploy> {
        self.state.read().pending.get(key).cloned()
    }

    pub fn cancel_marker(&self, key: &DeployKey) -> Option<CancelMarker> {
        self.state.read().cancels.get(key).cloned()
    }

    pub fn current_deploy_state(&self, request_id: &str) -> Option<VersionedDeployState> {
        self.state.read().states.get(request_id).cloned()
    }

    pub fn deploy_result(&self, key: &DeployKey) -> Option<DeployResult> {
        self.state.read().results.get(key).cloned()
    }

    pub fn pending_count(&self) -> usize {
        self.state.read().pending.len()
    }

    pub fn cancel_count(&self) -> usize {
        self.state.read().cancels.len()
    }
}

#[async_trait]
impl DeployStore for InMemoryDeployStore {
    async fn pending_deploys(&self) -> RolloutResult<Vec<PendingDeploy>> {
        Ok(self.state.read().pending.values().cloned().collect())
    }

    async fn cancel_deploys(&self) -> RolloutResult<Vec<CancelMarker>> {
        Ok(self.state.read().cancels.values().cloned().collect())
    }

    async fn deploy_state(&self, request_id: &str) -> RolloutResult<Option<VersionedDeployState>> {
        let state = self.state.read();
        if state.faulted_requests.contains(request_id) {
            return Err(RolloutError::StateStoreError(format!(
                "injected fault reading deploy state for {request_id}"
            )));
        }
        Ok(state.states.get(request_id).cloned())
    }

    async fn save_deploy_state(
        &self,
        deploy_state: &DeployState,
        expected_version: i64,
    ) -> RolloutResult<ConditionalPersistResult> {
        let mut state = self.state.write();
        let Some(current) = state.states.get_mut(&deploy_state.request_id) else {
            return Ok(ConditionalPersistResult::NotFound);
        };
        if current.version != expected_version {
            return Ok(ConditionalPersistResult::Conflict);
        }
        current.deploy_state = deploy_state.clone();
        current.version += 1;
        Ok(ConditionalPersistResult::Saved)
    }

    async fn save_pending_deploy(&self, pending: &PendingDeploy) -> RolloutResult<()> {
        self.state
            .write()
            .pending
            .insert(pending.deploy_key(), pending.clone());
        Ok(())
    }

    async fn delete_pending_deploy(&self, pending: &PendingDeploy) -> RolloutResult<DeleteResult> {
        Ok(match self.state.write().pending.remove(&pending.deploy_key()) {
            Some(_) => DeleteResult::Deleted,
            None => DeleteResult::DidNotExist,
        })
    }

    async fn delete_cancel_deploy(&self, cancel: &CancelMarker) -> RolloutResult<DeleteResult> {
        Ok(match self.state.write().cancels.remove(&cancel.key()) {
            Some(_) => DeleteResult::Deleted,
            None => DeleteResult::DidNotExist,
        })
    }

    async fn deploys_for_keys(
        &self,
        keys: &[DeployKey],
    ) -> RolloutResult<HashMap<DeployKey, Deploy>> {
        let state = self.state.read();
        Ok(keys
            .iter()
            .filter_map(|key| state.deploys.get(key).map(|d| (key.clone(), d.clone())))
            .collect())
    }

    async fn save_deploy_result(&self, key: &DeployKey, result: &DeployResult) -> RolloutResult<()> {
        self.state.write().results.insert(key.clone(), result.clone());
        Ok(())
    }
}
