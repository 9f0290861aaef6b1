use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one running task instance.
///
/// Storage keys are opaque; a task is looked up by these components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId {
    pub request_id: String,
    pub deploy_id: String,
    pub started_at: DateTime<Utc>,
    pub instance_no: u32,
    pub host: String,
}

impl TaskId {
    pub fn new(
        request_id: impl Into<String>,
        deploy_id: impl Into<String>,
        started_at: DateTime<Utc>,
        instance_no: u32,
        host: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            deploy_id: deploy_id.into(),
            started_at,
            instance_no,
            host: host.into(),
        }
    }

    pub fn matches_request(&self, request_id: &str) -> bool {
        self.request_id == request_id
    }

    pub fn matches_deploy(&self, deploy_id: &str) -> bool {
        self.deploy_id == deploy_id
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-{}",
            self.request_id,
            self.deploy_id,
            self.started_at.timestamp_millis(),
            self.instance_no,
            self.host
        )
    }
}

/// A running task with the addressing details a load balancer needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub hostname: String,
    pub ports: Vec<u16>,
}

impl Task {
    pub fn new(task_id: TaskId, ports: Vec<u16>) -> Self {
        let hostname = task_id.host.clone();
        Self {
            task_id,
            hostname,
            ports,
        }
    }
}

/// Reason a task is being terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskCleanupType {
    /// Replaced by a newly promoted deploy
    NewDeploySucceeded,
    /// Belongs to a deploy that failed, timed out or hit an internal fault
    DeployFailed,
    /// Belongs to a deploy an operator canceled
    DeployCanceled,
}

impl TaskCleanupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewDeploySucceeded => "NEW_DEPLOY_SUCCEEDED",
            Self::DeployFailed => "DEPLOY_FAILED",
            Self::DeployCanceled => "DEPLOY_CANCELED",
        }
    }
}

impl fmt::Display for TaskCleanupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskCleanupType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW_DEPLOY_SUCCEEDED" => Ok(Self::NewDeploySucceeded),
            "DEPLOY_FAILED" => Ok(Self::DeployFailed),
            "DEPLOY_CANCELED" => Ok(Self::DeployCanceled),
            _ => Err(format!("Invalid task cleanup type: {s}")),
        }
    }
}

/// Termination directive consumed by the task lifecycle component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCleanup {
    pub user: Option<String>,
    pub cleanup_type: TaskCleanupType,
    pub timestamp: DateTime<Utc>,
    pub task_id: TaskId,
}

impl TaskCleanup {
    pub fn new(task_id: TaskId, cleanup_type: TaskCleanupType, timestamp: DateTime<Utc>) -> Self {
        Self {
            user: None,
            cleanup_type,
            timestamp,
            task_id,
        }
    }
}
