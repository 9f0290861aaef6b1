use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::defaults;

/// Kind of workload a request describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Long-running, possibly load balanced
    Service,
    /// Long-running, never load balanced
    Worker,
    /// Cron-style workload with no live instances to roll
    Scheduled,
    /// Run-once workload triggered by an operator
    OnDemand,
}

/// Service definition being deployed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub request_type: RequestType,
    pub instances: Option<u32>,
}

impl Request {
    pub fn new(id: impl Into<String>, request_type: RequestType, instances: Option<u32>) -> Self {
        Self {
            id: id.into(),
            request_type,
            instances,
        }
    }

    pub fn service(id: impl Into<String>, instances: u32) -> Self {
        Self::new(id, RequestType::Service, Some(instances))
    }

    /// Desired instance count, defaulting when unset
    pub fn instances_safe(&self) -> u32 {
        self.instances.unwrap_or(defaults::REQUEST_INSTANCES)
    }

    /// Whether deploys of this request roll out live instances
    pub fn is_deployable(&self) -> bool {
        matches!(self.request_type, RequestType::Service | RequestType::Worker)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Request[id={}, type={:?}, instances={}]",
            self.id,
            self.request_type,
            self.instances_safe()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployability() {
        assert!(Request::service("web", 2).is_deployable());
        assert!(Request::new("queue", RequestType::Worker, None).is_deployable());
        assert!(!Request::new("nightly", RequestType::Scheduled, None).is_deployable());
        assert!(!Request::new("adhoc", RequestType::OnDemand, Some(1)).is_deployable());
    }

    #[test]
    fn test_instances_default() {
        assert_eq!(Request::new("web", RequestType::Service, None).instances_safe(), 1);
        assert_eq!(Request::service("web", 3).instances_safe(), 3);
    }
}
