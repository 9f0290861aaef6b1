//! # Deploy Checker
//!
//! One reconciliation pass over every pending deploy.
//!
//! ## Pass Flow
//!
//! 1. Read pending deploys, cancel markers, active task ids, the deploy
//!    definitions of every pending deploy and the versioned deploy state of
//!    every request involved, once per pass
//! 2. Evaluate each pending deploy independently, up to
//!    `max_concurrent_checks` at a time
//! 3. Commit the decision: promote, terminate tasks, record the result and
//!    remove the pending deploy, or leave it for the next pass
//! 4. Remove cancel markers that no longer have a deploy waiting on them
//!
//! A collaborator error while evaluating one deploy is logged and counted;
//! that deploy stays pending and the rest of the pass carries on.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn, Span};
use uuid::Uuid;

use crate::config::DeployCheckerConfig;
use crate::error::{RolloutError, RolloutResult};
use crate::health::{DeployHealth, DeployHealthEvaluator};
use crate::load_balancer::LoadBalancerClient;
use crate::logging::log_deploy_operation;
use crate::metrics;
use crate::models::{
    CancelMarker, Deploy, DeployKey, DeployResult, DeployState, LoadBalancerRequest,
    LoadBalancerState, PendingDeploy, Request, Task, TaskCleanup, TaskCleanupType, TaskId,
    VersionedDeployState,
};
use crate::registry::{RequestSource, TaskRegistry};
use crate::state_machine::{
    find_cancel, format_hms, settled_load_balancer_result, DeployCheckResult, DeployTimeBudget,
};
use crate::store::{ConditionalPersistResult, DeleteResult, DeployStore};

/// Collaborators the checker is wired with
#[derive(Clone)]
pub struct DeployCheckerDependencies {
    pub deploy_store: Arc<dyn DeployStore>,
    pub task_registry: Arc<dyn TaskRegistry>,
    pub request_source: Arc<dyn RequestSource>,
    pub health_evaluator: Arc<dyn DeployHealthEvaluator>,
    pub load_balancer: Arc<dyn LoadBalancerClient>,
}

/// What happened to one pending deploy during a pass
#[derive(Debug, Clone, PartialEq)]
pub enum DeployCheckOutcome {
    /// A decision was reached and committed
    Checked {
        key: DeployKey,
        result: DeployCheckResult,
    },
    /// The backing request no longer exists; the pending deploy was dropped
    Orphaned { key: DeployKey },
    /// A collaborator failed; the pending deploy is left for the next pass
    Errored { key: DeployKey, error: RolloutError },
}

impl DeployCheckOutcome {
    pub fn key(&self) -> &DeployKey {
        match self {
            Self::Checked { key, .. } | Self::Orphaned { key } | Self::Errored { key, .. } => key,
        }
    }

    pub fn result(&self) -> Option<DeployCheckResult> {
        match self {
            Self::Checked { result, .. } => Some(*result),
            _ => None,
        }
    }

    /// Whether a cancel marker addressed to this deploy must survive the pass
    fn retains_cancel_marker(&self) -> bool {
        match self {
            Self::Checked { result, .. } => !result.is_terminal(),
            Self::Orphaned { .. } => false,
            Self::Errored { .. } => true,
        }
    }
}

/// Counts for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployCheckSummary {
    /// Pending deploys read at the start of the pass
    pub processed: usize,
    pub waiting: usize,
    pub succeeded: usize,
    pub failed_internal_state: usize,
    pub overdue: usize,
    pub failed: usize,
    pub canceled: usize,
    pub orphaned: usize,
    pub errored: usize,
    pub cancel_markers_removed: usize,
}

impl DeployCheckSummary {
    fn record(&mut self, outcome: &DeployCheckOutcome) {
        match outcome {
            DeployCheckOutcome::Checked { result, .. } => match result {
                DeployCheckResult::Waiting => self.waiting += 1,
                DeployCheckResult::Succeeded { .. } => self.succeeded += 1,
                DeployCheckResult::FailedInternalState { .. } => self.failed_internal_state += 1,
                DeployCheckResult::Overdue { .. } => self.overdue += 1,
                DeployCheckResult::Failed { .. } => self.failed += 1,
                DeployCheckResult::Canceled { .. } => self.canceled += 1,
            },
            DeployCheckOutcome::Orphaned { .. } => self.orphaned += 1,
            DeployCheckOutcome::Errored { .. } => self.errored += 1,
        }
    }

    /// Number of deploys that reached `result` this pass
    pub fn count_for(&self, result: DeployCheckResult) -> usize {
        match result {
            DeployCheckResult::Waiting => self.waiting,
            DeployCheckResult::Succeeded { .. } => self.succeeded,
            DeployCheckResult::FailedInternalState { .. } => self.failed_internal_state,
            DeployCheckResult::Overdue { .. } => self.overdue,
            DeployCheckResult::Failed { .. } => self.failed,
            DeployCheckResult::Canceled { .. } => self.canceled,
        }
    }

    /// Deploys whose lifecycle ended this pass
    pub fn terminal(&self) -> usize {
        self.succeeded + self.failed_internal_state + self.overdue + self.failed + self.canceled
    }
}

/// Everything the decision function looks at for one pending deploy
struct DeployCheckContext<'a> {
    request: &'a Request,
    pending: &'a PendingDeploy,
    deploy: &'a Deploy,
    cancel: Option<&'a CancelMarker>,
    matching_tasks: &'a [TaskId],
    other_tasks: &'a [TaskId],
    now: DateTime<Utc>,
}

enum OverdueCheck {
    WithinBudget,
    Overdue(DeployCheckResult),
}

impl OverdueCheck {
    fn into_result(self) -> DeployCheckResult {
        match self {
            Self::WithinBudget => DeployCheckResult::WAITING,
            Self::Overdue(result) => result,
        }
    }
}

/// Per-pass deploy reconciler
#[derive(Clone)]
pub struct DeployChecker {
    deploy_store: Arc<dyn DeployStore>,
    task_registry: Arc<dyn TaskRegistry>,
    request_source: Arc<dyn RequestSource>,
    health_evaluator: Arc<dyn DeployHealthEvaluator>,
    load_balancer: Arc<dyn LoadBalancerClient>,
    config: DeployCheckerConfig,
}

impl std::fmt::Debug for DeployChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployChecker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DeployChecker {
    pub fn new(dependencies: DeployCheckerDependencies, config: DeployCheckerConfig) -> Self {
        Self {
            deploy_store: dependencies.deploy_store,
            task_registry: dependencies.task_registry,
            request_source: dependencies.request_source,
            health_evaluator: dependencies.health_evaluator,
            load_balancer: dependencies.load_balancer,
            config,
        }
    }

    pub fn config(&self) -> &DeployCheckerConfig {
        &self.config
    }

    /// Run one pass against the current wall clock
    pub async fn check_deploys(&self) -> RolloutResult<DeployCheckSummary> {
        self.check_deploys_at(Utc::now()).await
    }

    /// Run one pass, measuring every time budget against `now`.
    ///
    /// Fails only when the pass inputs cannot be read; per-deploy failures
    /// are reported in the summary.
    #[instrument(skip_all, fields(now = %now, pass_id = tracing::field::Empty))]
    pub async fn check_deploys_at(&self, now: DateTime<Utc>) -> RolloutResult<DeployCheckSummary> {
        let start = Instant::now();
        Span::current().record("pass_id", tracing::field::display(Uuid::new_v4()));
        metrics::deploy_check_passes_total().add(1, &[]);

        let pending_deploys = self.deploy_store.pending_deploys().await?;
        let cancel_deploys = self.deploy_store.cancel_deploys().await?;

        let mut summary = DeployCheckSummary {
            processed: pending_deploys.len(),
            ..Default::default()
        };

        let outcomes = if pending_deploys.is_empty() {
            Vec::new()
        } else {
            let keys: Vec<DeployKey> = pending_deploys.iter().map(PendingDeploy::deploy_key).collect();
            let deploys = self.deploy_store.deploys_for_keys(&keys).await?;
            let active_task_ids = self.task_registry.active_task_ids().await?;
            let deploy_states = self.read_deploy_states(&pending_deploys).await;

            let checks: Vec<_> = pending_deploys
                .iter()
                .map(|pending| {
                    self.check_deploy_isolated(
                        pending,
                        &cancel_deploys,
                        deploys.get(&pending.deploy_key()),
                        &active_task_ids,
                        deploy_state_for(&deploy_states, &pending.deploy_marker.request_id),
                        now,
                    )
                })
                .collect();

            stream::iter(checks)
                .buffer_unordered(self.config.max_concurrent_checks.max(1))
                .collect::<Vec<_>>()
                .await
        };

        for outcome in &outcomes {
            summary.record(outcome);
        }

        summary.cancel_markers_removed = self.remove_cancel_markers(&cancel_deploys, &outcomes).await;

        let duration_ms = start.elapsed().as_millis() as f64;
        metrics::deploy_check_duration().record(duration_ms, &[]);

        if summary.processed > 0 || summary.cancel_markers_removed > 0 {
            info!(
                processed = summary.processed,
                terminal = summary.terminal(),
                waiting = summary.waiting,
                orphaned = summary.orphaned,
                errored = summary.errored,
                cancel_markers_removed = summary.cancel_markers_removed,
                duration_ms = duration_ms,
                "Deploy check pass completed"
            );
        } else {
            debug!("No pending deploys this pass");
        }

        Ok(summary)
    }

    /// Version tokens for every request with a pending deploy, read once
    /// before any deploy is evaluated. A failed read is kept per request so
    /// only that request's deploys are affected.
    async fn read_deploy_states(&self, pending_deploys: &[PendingDeploy]) -> DeployStates {
        let request_ids: BTreeSet<&str> = pending_deploys
            .iter()
            .map(|pending| pending.deploy_marker.request_id.as_str())
            .collect();

        let reads: Vec<_> = request_ids
            .into_iter()
            .map(|request_id| async move {
                let state = self.deploy_store.deploy_state(request_id).await;
                (request_id.to_string(), state)
            })
            .collect();

        stream::iter(reads)
            .buffer_unordered(self.config.max_concurrent_checks.max(1))
            .collect()
            .await
    }

    async fn check_deploy_isolated(
        &self,
        pending: &PendingDeploy,
        cancel_deploys: &[CancelMarker],
        deploy: Option<&Deploy>,
        active_task_ids: &[TaskId],
        deploy_state: RolloutResult<Option<VersionedDeployState>>,
        now: DateTime<Utc>,
    ) -> DeployCheckOutcome {
        let key = pending.deploy_key();
        debug!(deploy_key = %key, "Checking deploy");

        match self
            .check_deploy(pending, cancel_deploys, deploy, active_task_ids, deploy_state, now)
            .await
        {
            Ok(outcome) => {
                if let Some(result) = outcome.result() {
                    metrics::record_result(result);
                }
                outcome
            }
            Err(error) => {
                error!(
                    deploy_key = %key,
                    error = %error,
                    "Deploy check failed, leaving deploy pending"
                );
                metrics::deploy_check_errors_total().add(1, &[]);
                DeployCheckOutcome::Errored { key, error }
            }
        }
    }

    #[instrument(skip_all, fields(deploy_key = %pending.deploy_key()))]
    async fn check_deploy(
        &self,
        pending: &PendingDeploy,
        cancel_deploys: &[CancelMarker],
        deploy: Option<&Deploy>,
        active_task_ids: &[TaskId],
        deploy_state: RolloutResult<Option<VersionedDeployState>>,
        now: DateTime<Utc>,
    ) -> RolloutResult<DeployCheckOutcome> {
        let marker = &pending.deploy_marker;
        let key = marker.key();

        let Some(request) = self.request_source.fetch_request(&marker.request_id).await? else {
            self.remove_orphan(pending, deploy).await?;
            return Ok(DeployCheckOutcome::Orphaned { key });
        };

        let deploy_state = deploy_state?;

        let (matching_tasks, other_tasks): (Vec<TaskId>, Vec<TaskId>) = active_task_ids
            .iter()
            .filter(|task_id| task_id.matches_request(&marker.request_id))
            .cloned()
            .partition(|task_id| task_id.matches_deploy(&marker.deploy_id));

        let result = match deploy {
            Some(deploy) => {
                let context = DeployCheckContext {
                    request: &request,
                    pending,
                    deploy,
                    cancel: find_cancel(cancel_deploys, marker),
                    matching_tasks: &matching_tasks,
                    other_tasks: &other_tasks,
                    now,
                };
                self.decide(&context).await?
            }
            None => {
                error!(deploy_key = %key, "Pending deploy has no deploy definition");
                DeployCheckResult::FAILED_INTERNAL_STATE
            }
        };

        info!(
            deploy_key = %key,
            result = %result,
            elapsed = %format_hms(now.signed_duration_since(marker.timestamp)),
            "Deploy check decided"
        );

        let result = self
            .commit(pending, result, deploy_state, &matching_tasks, &other_tasks, now)
            .await?;

        Ok(DeployCheckOutcome::Checked { key, result })
    }

    /// Decision function; the only side effects are load balancer calls and
    /// persisting the load balancer state they report.
    async fn decide(&self, context: &DeployCheckContext<'_>) -> RolloutResult<DeployCheckResult> {
        let pending = context.pending;
        let deploy = context.deploy;

        if let Some(result) = settled_load_balancer_result(pending.load_balancer_state) {
            return Ok(result);
        }

        if let Some(cancel) = context.cancel {
            if deploy.is_load_balanced() && pending.load_balancer_state.is_some() {
                self.cancel_load_balancer(pending, &deploy.load_balancer_request_id(), true)
                    .await?;
                return Ok(DeployCheckResult::WAITING);
            }
            info!(
                deploy_key = %pending.deploy_key(),
                cancel_user = ?cancel.user,
                "Canceling deploy due to cancel request"
            );
            return Ok(DeployCheckResult::CANCELED);
        }

        if !context.request.is_deployable() {
            info!(
                deploy_key = %pending.deploy_key(),
                request = %context.request,
                "Succeeding deploy because its request is not deployable"
            );
            return Ok(DeployCheckResult::SUCCEEDED);
        }

        let desired = context.request.instances_safe() as usize;
        if context.matching_tasks.len() < desired {
            debug!(
                deploy_key = %pending.deploy_key(),
                running = context.matching_tasks.len(),
                desired,
                "Deploy does not have all instances running yet"
            );
            return Ok(self.check_overdue(context).await?.into_result());
        }

        let health = self
            .health_evaluator
            .deploy_health(deploy, context.matching_tasks)
            .await?;

        match health {
            DeployHealth::Waiting => Ok(self.check_overdue(context).await?.into_result()),
            DeployHealth::Unhealthy => Ok(DeployCheckResult::FAILED),
            DeployHealth::Healthy => match self.check_overdue(context).await? {
                OverdueCheck::Overdue(result) => Ok(result),
                OverdueCheck::WithinBudget if deploy.is_load_balanced() => {
                    self.enqueue_load_balancer_switch(context).await
                }
                OverdueCheck::WithinBudget => Ok(DeployCheckResult::SUCCEEDED),
            },
        }
    }

    async fn check_overdue(&self, context: &DeployCheckContext<'_>) -> RolloutResult<OverdueCheck> {
        let pending = context.pending;
        let budget = DeployTimeBudget::evaluate(
            context.deploy,
            &pending.deploy_marker,
            self.config.deploy_healthy_by_seconds,
            context.now,
        );

        if !budget.is_overdue() {
            debug!(deploy_key = %pending.deploy_key(), budget = %budget, "Deploy is not yet overdue");
            return Ok(OverdueCheck::WithinBudget);
        }

        warn!(deploy_key = %pending.deploy_key(), budget = %budget, "Deploy is overdue");

        if pending.load_balancer_state.is_some() {
            self.cancel_load_balancer(pending, &context.deploy.load_balancer_request_id(), true)
                .await?;
            return Ok(OverdueCheck::Overdue(DeployCheckResult::WAITING));
        }

        Ok(OverdueCheck::Overdue(DeployCheckResult::OVERDUE))
    }

    async fn enqueue_load_balancer_switch(
        &self,
        context: &DeployCheckContext<'_>,
    ) -> RolloutResult<DeployCheckResult> {
        let pending = context.pending;

        if !self.load_balancer.has_valid_uri() {
            warn!(
                deploy_key = %pending.deploy_key(),
                "Deploy requires a load balancer uri but none is configured"
            );
            return Ok(DeployCheckResult::FAILED);
        }

        let all_tasks: Vec<TaskId> = context
            .matching_tasks
            .iter()
            .chain(context.other_tasks)
            .cloned()
            .collect();
        let resolved = self.task_registry.tasks(&all_tasks).await?;

        let (Some(add), Some(remove)) = (
            resolve_tasks(context.matching_tasks, &resolved),
            resolve_tasks(context.other_tasks, &resolved),
        ) else {
            warn!(
                deploy_key = %pending.deploy_key(),
                requested = all_tasks.len(),
                resolved = resolved.len(),
                "Task records missing for load balancer switch, will retry"
            );
            return Ok(DeployCheckResult::WAITING);
        };

        let request =
            LoadBalancerRequest::new(context.deploy.load_balancer_request_id(), add, remove);

        match self.load_balancer.enqueue(&request).await? {
            None => {
                debug!(
                    deploy_key = %pending.deploy_key(),
                    lb_request_id = %request.load_balancer_request_id,
                    "Load balancer enqueue not settled, will poll again"
                );
                Ok(DeployCheckResult::WAITING)
            }
            Some(LoadBalancerState::Failed) => Ok(DeployCheckResult::FAILED),
            Some(state) => {
                self.deploy_store
                    .save_pending_deploy(&pending.with_load_balancer_state(state))
                    .await?;
                Ok(DeployCheckResult::WAITING)
            }
        }
    }

    /// Best-effort gateway cancel. A reported canceling or canceled state is
    /// written back onto the pending deploy when `persist` is set.
    async fn cancel_load_balancer(
        &self,
        pending: &PendingDeploy,
        load_balancer_request_id: &str,
        persist: bool,
    ) -> RolloutResult<()> {
        match self.load_balancer.cancel(load_balancer_request_id).await {
            Ok(Some(state @ (LoadBalancerState::Canceling | LoadBalancerState::Canceled)))
                if persist =>
            {
                info!(
                    deploy_key = %pending.deploy_key(),
                    lb_request_id = load_balancer_request_id,
                    state = %state,
                    "Load balancer cancel accepted"
                );
                self.deploy_store
                    .save_pending_deploy(&pending.with_load_balancer_state(state))
                    .await?;
            }
            Ok(state) => {
                debug!(
                    deploy_key = %pending.deploy_key(),
                    lb_request_id = load_balancer_request_id,
                    state = ?state,
                    "Load balancer cancel requested"
                );
            }
            Err(e) => {
                warn!(
                    deploy_key = %pending.deploy_key(),
                    lb_request_id = load_balancer_request_id,
                    error = %e,
                    "Load balancer cancel failed, will retry next pass"
                );
            }
        }
        Ok(())
    }

    async fn commit(
        &self,
        pending: &PendingDeploy,
        result: DeployCheckResult,
        deploy_state: Option<VersionedDeployState>,
        matching_tasks: &[TaskId],
        other_tasks: &[TaskId],
        now: DateTime<Utc>,
    ) -> RolloutResult<DeployCheckResult> {
        let marker = &pending.deploy_marker;

        match result {
            DeployCheckResult::Waiting => Ok(result),
            DeployCheckResult::Succeeded { cleanup_type } => {
                let persist_result = match &deploy_state {
                    Some(versioned) => {
                        let promoted = DeployState::promoted(
                            versioned.deploy_state.request_id.clone(),
                            marker,
                        );
                        self.deploy_store
                            .save_deploy_state(&promoted, versioned.version)
                            .await?
                    }
                    None => ConditionalPersistResult::NotFound,
                };

                if persist_result.is_saved() {
                    self.finish_deploy(pending, other_tasks, cleanup_type, result, None, now)
                        .await?;
                    return Ok(result);
                }

                error!(
                    deploy_key = %pending.deploy_key(),
                    persist_result = ?persist_result,
                    "Failing deploy because its deploy state could not be saved"
                );
                let downgraded = DeployCheckResult::FAILED_INTERNAL_STATE;
                self.finish_deploy(
                    pending,
                    matching_tasks,
                    TaskCleanupType::DeployFailed,
                    downgraded,
                    Some(format!("Deploy state save returned {persist_result:?}")),
                    now,
                )
                .await?;
                Ok(downgraded)
            }
            DeployCheckResult::FailedInternalState { cleanup_type }
            | DeployCheckResult::Overdue { cleanup_type }
            | DeployCheckResult::Failed { cleanup_type }
            | DeployCheckResult::Canceled { cleanup_type } => {
                self.finish_deploy(pending, matching_tasks, cleanup_type, result, None, now)
                    .await?;
                Ok(result)
            }
        }
    }

    async fn finish_deploy(
        &self,
        pending: &PendingDeploy,
        tasks_to_kill: &[TaskId],
        cleanup_type: TaskCleanupType,
        result: DeployCheckResult,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> RolloutResult<()> {
        let key = pending.deploy_key();
        self.cleanup_tasks(tasks_to_kill, cleanup_type, now).await?;

        let elapsed = format_hms(now.signed_duration_since(pending.deploy_marker.timestamp));
        let message = message.unwrap_or_else(|| format!("{result} after {elapsed}"));
        let details = format!("{} tasks cleaned up as {cleanup_type}", tasks_to_kill.len());

        log_deploy_operation(
            "finish_deploy",
            &key.request_id,
            &key.deploy_id,
            result.as_str(),
            Some(details.as_str()),
        );

        let deploy_result = DeployResult::new(result, Some(message), now);
        if let Err(e) = self.deploy_store.save_deploy_result(&key, &deploy_result).await {
            error!(deploy_key = %key, error = %e, "Failed to record deploy result");
        }

        self.deploy_store.delete_pending_deploy(pending).await?;
        Ok(())
    }

    async fn cleanup_tasks(
        &self,
        task_ids: &[TaskId],
        cleanup_type: TaskCleanupType,
        now: DateTime<Utc>,
    ) -> RolloutResult<()> {
        let mut created = 0;
        for task_id in task_ids {
            let cleanup = TaskCleanup::new(task_id.clone(), cleanup_type, now);
            if self.task_registry.create_cleanup(&cleanup).await? {
                created += 1;
            } else {
                debug!(task_id = %task_id, "Task already has a cleanup");
            }
        }
        metrics::record_cleanups(cleanup_type, created);
        Ok(())
    }

    /// Drop a pending deploy whose request is gone, canceling a cutover that
    /// is still in flight. No tasks are cleaned up.
    async fn remove_orphan(&self, pending: &PendingDeploy, deploy: Option<&Deploy>) -> RolloutResult<()> {
        let key = pending.deploy_key();
        warn!(deploy_key = %key, "Deploy was missing a request, removing deploy");

        if pending.load_balancer_state == Some(LoadBalancerState::Waiting) {
            let lb_request_id = deploy
                .map(Deploy::load_balancer_request_id)
                .unwrap_or_else(|| key.to_string());
            self.cancel_load_balancer(pending, &lb_request_id, false).await?;
        }

        self.deploy_store.delete_pending_deploy(pending).await?;
        Ok(())
    }

    async fn remove_cancel_markers(
        &self,
        cancel_deploys: &[CancelMarker],
        outcomes: &[DeployCheckOutcome],
    ) -> usize {
        let outcomes_by_key: HashMap<&DeployKey, &DeployCheckOutcome> =
            outcomes.iter().map(|outcome| (outcome.key(), outcome)).collect();

        let mut removed = 0;
        for cancel in cancel_deploys {
            let key = cancel.key();
            if outcomes_by_key
                .get(&key)
                .is_some_and(|outcome| outcome.retains_cancel_marker())
            {
                debug!(deploy_key = %key, "Keeping cancel marker for deploy still in progress");
                continue;
            }

            match self.deploy_store.delete_cancel_deploy(cancel).await {
                Ok(delete_result) => {
                    debug!(deploy_key = %key, result = ?delete_result, "Removing cancel marker");
                    if delete_result == DeleteResult::Deleted {
                        removed += 1;
                    }
                }
                Err(e) => {
                    warn!(deploy_key = %key, error = %e, "Failed to remove cancel marker");
                }
            }
        }
        removed
    }
}

type DeployStates = HashMap<String, RolloutResult<Option<VersionedDeployState>>>;

fn deploy_state_for(
    deploy_states: &DeployStates,
    request_id: &str,
) -> RolloutResult<Option<VersionedDeployState>> {
    deploy_states.get(request_id).cloned().unwrap_or_else(|| {
        Err(RolloutError::Internal(format!(
            "Deploy state for request {request_id} was not read this pass"
        )))
    })
}

/// Look up every id; `None` if any record is missing
fn resolve_tasks(task_ids: &[TaskId], resolved: &HashMap<TaskId, Task>) -> Option<Vec<Task>> {
    task_ids.iter().map(|id| resolved.get(id).cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DeployKey {
        DeployKey::new("web", "v2")
    }

    #[test]
    fn test_cancel_marker_retention() {
        let waiting = DeployCheckOutcome::Checked {
            key: key(),
            result: DeployCheckResult::WAITING,
        };
        let canceled = DeployCheckOutcome::Checked {
            key: key(),
            result: DeployCheckResult::CANCELED,
        };
        let errored = DeployCheckOutcome::Errored {
            key: key(),
            error: RolloutError::Internal("boom".to_string()),
        };

        assert!(waiting.retains_cancel_marker());
        assert!(errored.retains_cancel_marker());
        assert!(!canceled.retains_cancel_marker());
        assert!(!DeployCheckOutcome::Orphaned { key: key() }.retains_cancel_marker());
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = DeployCheckSummary::default();
        for result in [
            DeployCheckResult::SUCCEEDED,
            DeployCheckResult::OVERDUE,
            DeployCheckResult::WAITING,
            DeployCheckResult::WAITING,
        ] {
            summary.record(&DeployCheckOutcome::Checked { key: key(), result });
        }
        summary.record(&DeployCheckOutcome::Orphaned { key: key() });

        assert_eq!(summary.count_for(DeployCheckResult::WAITING), 2);
        assert_eq!(summary.count_for(DeployCheckResult::SUCCEEDED), 1);
        assert_eq!(summary.terminal(), 2);
        assert_eq!(summary.orphaned, 1);
    }

    #[test]
    fn test_resolve_tasks_requires_every_record() {
        let id = TaskId::new("web", "v2", Utc::now(), 1, "host");
        let mut resolved = HashMap::new();
        assert_eq!(resolve_tasks(&[], &resolved), Some(vec![]));
        assert_eq!(resolve_tasks(std::slice::from_ref(&id), &resolved), None);

        resolved.insert(id.clone(), Task::new(id.clone(), vec![8080]));
        assert_eq!(resolve_tasks(&[id], &resolved).map(|t| t.len()), Some(1));
    }
}
