use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::TaskCleanupType;

/// Outcome of evaluating one pending deploy during a pass.
///
/// Terminal variants carry the cleanup reason applied to the tasks they
/// terminate, so the commit path never has to re-derive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeployCheckResult {
    /// Not decided yet, re-evaluated next pass
    Waiting,
    /// Promoted to active; tasks of other deploys are replaced
    Succeeded { cleanup_type: TaskCleanupType },
    /// Promotion could not be committed consistently
    FailedInternalState { cleanup_type: TaskCleanupType },
    /// Exceeded its time budget
    Overdue { cleanup_type: TaskCleanupType },
    /// Unhealthy cohort or rejected cutover
    Failed { cleanup_type: TaskCleanupType },
    /// Aborted by an operator
    Canceled { cleanup_type: TaskCleanupType },
}

impl DeployCheckResult {
    pub const WAITING: Self = Self::Waiting;
    pub const SUCCEEDED: Self = Self::Succeeded {
        cleanup_type: TaskCleanupType::NewDeploySucceeded,
    };
    pub const FAILED_INTERNAL_STATE: Self = Self::FailedInternalState {
        cleanup_type: TaskCleanupType::DeployFailed,
    };
    pub const OVERDUE: Self = Self::Overdue {
        cleanup_type: TaskCleanupType::DeployFailed,
    };
    pub const FAILED: Self = Self::Failed {
        cleanup_type: TaskCleanupType::DeployFailed,
    };
    pub const CANCELED: Self = Self::Canceled {
        cleanup_type: TaskCleanupType::DeployCanceled,
    };

    /// Cleanup reason for tasks terminated by this outcome, `None` while waiting
    pub fn cleanup_type(&self) -> Option<TaskCleanupType> {
        match self {
            Self::Waiting => None,
            Self::Succeeded { cleanup_type }
            | Self::FailedInternalState { cleanup_type }
            | Self::Overdue { cleanup_type }
            | Self::Failed { cleanup_type }
            | Self::Canceled { cleanup_type } => Some(*cleanup_type),
        }
    }

    /// Check if this outcome ends the deploy's lifecycle
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Waiting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Succeeded { .. } => "SUCCEEDED",
            Self::FailedInternalState { .. } => "FAILED_INTERNAL_STATE",
            Self::Overdue { .. } => "OVERDUE",
            Self::Failed { .. } => "FAILED",
            Self::Canceled { .. } => "CANCELED",
        }
    }
}

impl fmt::Display for DeployCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeployCheckResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(Self::WAITING),
            "SUCCEEDED" => Ok(Self::SUCCEEDED),
            "FAILED_INTERNAL_STATE" => Ok(Self::FAILED_INTERNAL_STATE),
            "OVERDUE" => Ok(Self::OVERDUE),
            "FAILED" => Ok(Self::FAILED),
            "CANCELED" => Ok(Self::CANCELED),
            _ => Err(format!("Invalid deploy check result: {s}")),
        }
    }
}
