use serde::{Deserialize, Serialize};
use std::fmt;

use super::task::Task;

/// Progress of a load balancer cutover as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadBalancerState {
    /// Accepted, still being applied
    Waiting,
    Success,
    Failed,
    /// A cancel was accepted and is draining
    Canceling,
    Canceled,
}

impl LoadBalancerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Canceling => "CANCELING",
            Self::Canceled => "CANCELED",
        }
    }

    /// States the deploy checker must never overwrite once persisted
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Canceled)
    }
}

impl fmt::Display for LoadBalancerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LoadBalancerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(Self::Waiting),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "CANCELING" => Ok(Self::Canceling),
            "CANCELED" => Ok(Self::Canceled),
            _ => Err(format!("Invalid load balancer state: {s}")),
        }
    }
}

/// Body sent to the load balancer control plane to shift traffic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerRequest {
    pub load_balancer_request_id: String,
    pub add: Vec<Task>,
    pub remove: Vec<Task>,
}

impl LoadBalancerRequest {
    pub fn new(load_balancer_request_id: impl Into<String>, add: Vec<Task>, remove: Vec<Task>) -> Self {
        Self {
            load_balancer_request_id: load_balancer_request_id.into(),
            add,
            remove,
        }
    }
}

/// Control plane reply to an enqueue or cancel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerResponse {
    #[serde(default)]
    pub load_balancer_request_id: Option<String>,
    pub load_balancer_state: LoadBalancerState,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(LoadBalancerState::Canceling.to_string(), "CANCELING");
        assert_eq!(
            "SUCCESS".parse::<LoadBalancerState>().unwrap(),
            LoadBalancerState::Success
        );
        assert!("success".parse::<LoadBalancerState>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(LoadBalancerState::Success.is_terminal());
        assert!(LoadBalancerState::Canceled.is_terminal());
        assert!(!LoadBalancerState::Canceling.is_terminal());
        assert!(!LoadBalancerState::Waiting.is_terminal());
        assert!(!LoadBalancerState::Failed.is_terminal());
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"loadBalancerRequestId":"lb-1","loadBalancerState":"WAITING"}"#;
        let response: LoadBalancerResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.load_balancer_state, LoadBalancerState::Waiting);
        assert_eq!(response.load_balancer_request_id.as_deref(), Some("lb-1"));
        assert!(response.message.is_none());
    }

    #[test]
    fn test_request_uses_wire_field_names() {
        let request = LoadBalancerRequest::new("lb-1", vec![], vec![]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["loadBalancerRequestId"], "lb-1");
        assert!(json["add"].as_array().unwrap().is_empty());
    }
}
