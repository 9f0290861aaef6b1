//! Shared wiring for deploy checker integration tests.
//!
//! Every collaborator is the in-memory implementation except the load
//! balancer, which is scripted so tests can dictate what the gateway says.

#![allow(dead_code)]

pub mod strategies;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use rollout_core::config::DeployCheckerConfig;
use rollout_core::health::{
    HealthcheckDeployHealthEvaluator, HealthcheckResult, InMemoryHealthcheckSource,
};
use rollout_core::load_balancer::LoadBalancerClient;
use rollout_core::models::{
    CancelMarker, Deploy, DeployKey, DeployMarker, DeployState, LoadBalancerRequest,
    LoadBalancerState, PendingDeploy, Request, Task, TaskId,
};
use rollout_core::orchestration::{DeployChecker, DeployCheckerDependencies};
use rollout_core::registry::memory::{InMemoryRequestSource, InMemoryTaskRegistry};
use rollout_core::store::{DeployStore, InMemoryDeployStore};
use rollout_core::{RolloutError, RolloutResult};

pub const REQUEST_ID: &str = "web";
pub const OLD_DEPLOY_ID: &str = "v1";
pub const NEW_DEPLOY_ID: &str = "v2";

/// Fixed submission time so every budget is computed from a known origin
pub fn submitted_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn seconds_after_submit(seconds: i64) -> DateTime<Utc> {
    submitted_at() + Duration::seconds(seconds)
}

pub fn new_deploy_key() -> DeployKey {
    DeployKey::new(REQUEST_ID, NEW_DEPLOY_ID)
}

pub fn new_deploy_marker() -> DeployMarker {
    DeployMarker::new(REQUEST_ID, NEW_DEPLOY_ID, submitted_at(), Some("deployer".to_string()))
}

pub fn task_id(deploy_id: &str, instance_no: u32) -> TaskId {
    TaskId::new(
        REQUEST_ID,
        deploy_id,
        submitted_at(),
        instance_no,
        format!("host-{instance_no}"),
    )
}

/// A call recorded by [`ScriptedLoadBalancer`]
#[derive(Debug, Clone, PartialEq)]
pub enum LoadBalancerCall {
    Enqueue(LoadBalancerRequest),
    Cancel(String),
}

/// Load balancer gateway that replays scripted answers.
///
/// Once a script runs dry the last answer keeps being returned; an empty
/// script answers `Ok(None)`.
#[derive(Debug)]
pub struct ScriptedLoadBalancer {
    valid_uri: bool,
    enqueue_results: Mutex<VecDeque<RolloutResult<Option<LoadBalancerState>>>>,
    cancel_results: Mutex<VecDeque<RolloutResult<Option<LoadBalancerState>>>>,
    calls: Mutex<Vec<LoadBalancerCall>>,
}

impl ScriptedLoadBalancer {
    pub fn new(valid_uri: bool) -> Self {
        Self {
            valid_uri,
            enqueue_results: Mutex::new(VecDeque::new()),
            cancel_results: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script_enqueue(&self, result: RolloutResult<Option<LoadBalancerState>>) {
        self.enqueue_results.lock().push_back(result);
    }

    pub fn script_cancel(&self, result: RolloutResult<Option<LoadBalancerState>>) {
        self.cancel_results.lock().push_back(result);
    }

    pub fn calls(&self) -> Vec<LoadBalancerCall> {
        self.calls.lock().clone()
    }

    pub fn enqueue_calls(&self) -> Vec<LoadBalancerRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                LoadBalancerCall::Enqueue(request) => Some(request.clone()),
                LoadBalancerCall::Cancel(_) => None,
            })
            .collect()
    }

    pub fn cancel_calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                LoadBalancerCall::Cancel(id) => Some(id.clone()),
                LoadBalancerCall::Enqueue(_) => None,
            })
            .collect()
    }

    fn next(
        script: &Mutex<VecDeque<RolloutResult<Option<LoadBalancerState>>>>,
    ) -> RolloutResult<Option<LoadBalancerState>> {
        let mut script = script.lock();
        match script.len() {
            0 => Ok(None),
            1 => script[0].clone(),
            _ => script.pop_front().unwrap_or(Ok(None)),
        }
    }
}

#[async_trait]
impl LoadBalancerClient for ScriptedLoadBalancer {
    fn has_valid_uri(&self) -> bool {
        self.valid_uri
    }

    async fn enqueue(
        &self,
        request: &LoadBalancerRequest,
    ) -> RolloutResult<Option<LoadBalancerState>> {
        self.calls
            .lock()
            .push(LoadBalancerCall::Enqueue(request.clone()));
        Self::next(&self.enqueue_results)
    }

    async fn cancel(
        &self,
        load_balancer_request_id: &str,
    ) -> RolloutResult<Option<LoadBalancerState>> {
        self.calls
            .lock()
            .push(LoadBalancerCall::Cancel(load_balancer_request_id.to_string()));
        Self::next(&self.cancel_results)
    }
}

/// In-memory world a [`DeployChecker`] runs against
pub struct DeployCheckHarness {
    pub store: Arc<InMemoryDeployStore>,
    pub registry: Arc<InMemoryTaskRegistry>,
    pub requests: Arc<InMemoryRequestSource>,
    pub healthchecks: Arc<InMemoryHealthcheckSource>,
    pub load_balancer: Arc<ScriptedLoadBalancer>,
    pub checker: DeployChecker,
}

impl DeployCheckHarness {
    pub fn new() -> Self {
        Self::with_load_balancer(ScriptedLoadBalancer::new(true))
    }

    pub fn with_load_balancer(load_balancer: ScriptedLoadBalancer) -> Self {
        Self::build(load_balancer, DeployCheckerConfig::default())
    }

    pub fn with_config(config: DeployCheckerConfig) -> Self {
        Self::build(ScriptedLoadBalancer::new(true), config)
    }

    fn build(load_balancer: ScriptedLoadBalancer, config: DeployCheckerConfig) -> Self {
        let store = Arc::new(InMemoryDeployStore::new());
        let registry = Arc::new(InMemoryTaskRegistry::new());
        let requests = Arc::new(InMemoryRequestSource::new());
        let healthchecks = Arc::new(InMemoryHealthcheckSource::new());
        let load_balancer = Arc::new(load_balancer);

        let dependencies = DeployCheckerDependencies {
            deploy_store: store.clone(),
            task_registry: registry.clone(),
            request_source: requests.clone(),
            health_evaluator: Arc::new(HealthcheckDeployHealthEvaluator::new(
                healthchecks.clone(),
            )),
            load_balancer: load_balancer.clone(),
        };

        Self {
            checker: DeployChecker::new(dependencies, config),
            store,
            registry,
            requests,
            healthchecks,
            load_balancer,
        }
    }

    /// Seed a service request with `instances`, an active old deploy and a
    /// pending new deploy defined by `deploy`
    pub fn seed_rollout(&self, instances: u32, deploy: Deploy) -> PendingDeploy {
        self.requests.insert(Request::service(REQUEST_ID, instances));

        let old_marker = DeployMarker::new(REQUEST_ID, OLD_DEPLOY_ID, submitted_at(), None);
        let pending = PendingDeploy::new(new_deploy_marker());
        self.store.insert_deploy_state(DeployState {
            request_id: REQUEST_ID.to_string(),
            active_deploy: Some(old_marker),
            pending_deploy: Some(new_deploy_marker()),
        });
        self.store.insert_deploy(deploy);
        self.store.insert_pending_deploy(pending.clone());
        pending
    }

    /// Start `count` tasks for `deploy_id`, returning their ids
    pub fn start_tasks(&self, deploy_id: &str, count: u32) -> Vec<TaskId> {
        (1..=count)
            .map(|instance_no| {
                let id = task_id(deploy_id, instance_no);
                self.registry.add_task(Task::new(id.clone(), vec![31000 + instance_no as u16]));
                id
            })
            .collect()
    }

    pub fn pass_healthchecks(&self, task_ids: &[TaskId]) {
        for id in task_ids {
            self.healthchecks.record(HealthcheckResult::passed(id.clone()));
        }
    }

    pub fn cancel_new_deploy(&self) {
        self.store.insert_cancel_marker(CancelMarker::new(
            REQUEST_ID,
            NEW_DEPLOY_ID,
            submitted_at(),
            Some("operator".to_string()),
        ));
    }

    /// The harness collaborators with the deploy store swapped for `store`
    pub fn dependencies_with_store(&self, store: Arc<dyn DeployStore>) -> DeployCheckerDependencies {
        DeployCheckerDependencies {
            deploy_store: store,
            task_registry: self.registry.clone(),
            request_source: self.requests.clone(),
            health_evaluator: Arc::new(HealthcheckDeployHealthEvaluator::new(
                self.healthchecks.clone(),
            )),
            load_balancer: self.load_balancer.clone(),
        }
    }

    pub fn set_load_balancer_state(&self, state: LoadBalancerState) {
        let pending = PendingDeploy::new(new_deploy_marker()).with_load_balancer_state(state);
        self.store.insert_pending_deploy(pending);
    }

    pub fn active_deploy_id(&self) -> Option<String> {
        self.store
            .current_deploy_state(REQUEST_ID)
            .and_then(|versioned| versioned.deploy_state.active_deploy)
            .map(|marker| marker.deploy_id)
    }
}

pub fn gateway_error() -> RolloutError {
    RolloutError::LoadBalancerError("connection reset".to_string())
}

/// Deploy definition for the pending deploy with a health check path
pub fn checked_deploy() -> Deploy {
    Deploy::new(REQUEST_ID, NEW_DEPLOY_ID).with_healthcheck("/health", None)
}
