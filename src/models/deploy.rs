use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::load_balancer::LoadBalancerState;
use crate::state_machine::DeployCheckResult;

/// Composite identity of one deploy attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeployKey {
    pub request_id: String,
    pub deploy_id: String,
}

impl DeployKey {
    pub fn new(request_id: impl Into<String>, deploy_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            deploy_id: deploy_id.into(),
        }
    }
}

impl fmt::Display for DeployKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.request_id, self.deploy_id)
    }
}

/// Immutable reference to a submitted deploy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeployMarker {
    pub request_id: String,
    pub deploy_id: String,
    /// When the deploy was submitted; the overdue budget is measured from here
    pub timestamp: DateTime<Utc>,
    pub user: Option<String>,
}

impl DeployMarker {
    pub fn new(
        request_id: impl Into<String>,
        deploy_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        user: Option<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            deploy_id: deploy_id.into(),
            timestamp,
            user,
        }
    }

    pub fn key(&self) -> DeployKey {
        DeployKey::new(self.request_id.clone(), self.deploy_id.clone())
    }
}

impl fmt::Display for DeployMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeployMarker[request_id={}, deploy_id={}, timestamp={}",
            self.request_id,
            self.deploy_id,
            self.timestamp.to_rfc3339()
        )?;
        if let Some(user) = &self.user {
            write!(f, ", user={user}")?;
        }
        write!(f, "]")
    }
}

/// Operator request to abort one specific pending deploy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CancelMarker {
    pub request_id: String,
    pub deploy_id: String,
    pub timestamp: DateTime<Utc>,
    pub user: Option<String>,
}

impl CancelMarker {
    pub fn new(
        request_id: impl Into<String>,
        deploy_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        user: Option<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            deploy_id: deploy_id.into(),
            timestamp,
            user,
        }
    }

    pub fn key(&self) -> DeployKey {
        DeployKey::new(self.request_id.clone(), self.deploy_id.clone())
    }

    /// Whether this cancel targets the given deploy
    pub fn matches(&self, marker: &DeployMarker) -> bool {
        self.request_id == marker.request_id && self.deploy_id == marker.deploy_id
    }
}

/// Immutable deploy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deploy {
    pub request_id: String,
    pub id: String,
    /// Health check path requested on each task; no health check is performed when absent
    #[serde(default)]
    pub healthcheck_uri: Option<String>,
    #[serde(default)]
    pub healthcheck_interval_seconds: Option<u64>,
    /// Overrides the system-wide healthy-by budget
    #[serde(default)]
    pub deploy_health_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub load_balanced: bool,
    #[serde(default)]
    pub load_balancer_request_id: Option<String>,
}

impl Deploy {
    pub fn new(request_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            id: id.into(),
            healthcheck_uri: None,
            healthcheck_interval_seconds: None,
            deploy_health_timeout_seconds: None,
            load_balanced: false,
            load_balancer_request_id: None,
        }
    }

    pub fn with_healthcheck(mut self, uri: impl Into<String>, interval_seconds: Option<u64>) -> Self {
        self.healthcheck_uri = Some(uri.into());
        self.healthcheck_interval_seconds = interval_seconds;
        self
    }

    pub fn with_health_timeout(mut self, seconds: u64) -> Self {
        self.deploy_health_timeout_seconds = Some(seconds);
        self
    }

    pub fn with_load_balancer(mut self, load_balancer_request_id: Option<String>) -> Self {
        self.load_balanced = true;
        self.load_balancer_request_id = load_balancer_request_id;
        self
    }

    pub fn key(&self) -> DeployKey {
        DeployKey::new(self.request_id.clone(), self.id.clone())
    }

    pub fn is_load_balanced(&self) -> bool {
        self.load_balanced
    }

    /// Key under which cutover requests for this deploy are enqueued.
    ///
    /// Deploys that do not name one use their deploy key, so repeated
    /// enqueues for the same deploy always collapse onto one gateway request.
    pub fn load_balancer_request_id(&self) -> String {
        self.load_balancer_request_id
            .clone()
            .unwrap_or_else(|| self.key().to_string())
    }
}

/// A deploy currently being rolled out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeploy {
    pub deploy_marker: DeployMarker,
    pub load_balancer_state: Option<LoadBalancerState>,
}

impl PendingDeploy {
    pub fn new(deploy_marker: DeployMarker) -> Self {
        Self {
            deploy_marker,
            load_balancer_state: None,
        }
    }

    pub fn deploy_key(&self) -> DeployKey {
        self.deploy_marker.key()
    }

    /// Copy of this record carrying a new load balancer state
    pub fn with_load_balancer_state(&self, state: LoadBalancerState) -> Self {
        Self {
            deploy_marker: self.deploy_marker.clone(),
            load_balancer_state: Some(state),
        }
    }
}

impl fmt::Display for PendingDeploy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.load_balancer_state {
            Some(state) => write!(f, "PendingDeploy[{}, lb_state={state}]", self.deploy_marker),
            None => write!(f, "PendingDeploy[{}]", self.deploy_marker),
        }
    }
}

/// Which deploy is active for a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployState {
    pub request_id: String,
    pub active_deploy: Option<DeployMarker>,
    pub pending_deploy: Option<DeployMarker>,
}

impl DeployState {
    /// State naming `marker` as active with the pending slot cleared
    pub fn promoted(request_id: impl Into<String>, marker: &DeployMarker) -> Self {
        Self {
            request_id: request_id.into(),
            active_deploy: Some(marker.clone()),
            pending_deploy: None,
        }
    }
}

/// A deploy state together with the version token it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedDeployState {
    pub deploy_state: DeployState,
    pub version: i64,
}

/// Recorded outcome of a finished deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResult {
    pub result: DeployCheckResult,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DeployResult {
    pub fn new(result: DeployCheckResult, message: Option<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            result,
            message,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker() -> DeployMarker {
        DeployMarker::new("web", "v2", Utc::now(), Some("deployer".to_string()))
    }

    #[test]
    fn test_cancel_marker_matching() {
        let marker = marker();
        let cancel = CancelMarker::new("web", "v2", Utc::now(), None);
        let other = CancelMarker::new("web", "v1", Utc::now(), None);

        assert!(cancel.matches(&marker));
        assert!(!other.matches(&marker));
        assert_eq!(cancel.key(), marker.key());
    }

    #[test]
    fn test_load_balancer_request_id_fallback() {
        let deploy = Deploy::new("web", "v2").with_load_balancer(None);
        assert_eq!(deploy.load_balancer_request_id(), "web-v2");

        let named = Deploy::new("web", "v2").with_load_balancer(Some("lb-123".to_string()));
        assert_eq!(named.load_balancer_request_id(), "lb-123");
        assert!(named.is_load_balanced());
    }

    #[test]
    fn test_pending_deploy_state_update_keeps_marker() {
        let pending = PendingDeploy::new(marker());
        let updated = pending.with_load_balancer_state(LoadBalancerState::Waiting);

        assert_eq!(updated.deploy_marker, pending.deploy_marker);
        assert_eq!(updated.load_balancer_state, Some(LoadBalancerState::Waiting));
        assert!(pending.load_balancer_state.is_none());
    }

    #[test]
    fn test_promoted_state_clears_pending_slot() {
        let marker = marker();
        let state = DeployState::promoted("web", &marker);
        assert_eq!(state.active_deploy, Some(marker));
        assert!(state.pending_deploy.is_none());
    }
}
