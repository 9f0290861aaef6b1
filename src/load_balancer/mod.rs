//! # Load Balancer Gateway
//!
//! Asynchronous cutover requests against an external load balancer control
//! plane. Every call is a bounded wait: `Ok(None)` means the gateway has not
//! settled the request yet and the caller should look again next pass.

pub mod http_client;

use async_trait::async_trait;

use crate::error::RolloutResult;
use crate::models::{LoadBalancerRequest, LoadBalancerState};

pub use http_client::HttpLoadBalancerClient;

#[async_trait]
pub trait LoadBalancerClient: Send + Sync {
    /// Whether a control plane endpoint is configured at all
    fn has_valid_uri(&self) -> bool;

    /// Submit or re-poll a cutover keyed by its load balancer request id
    async fn enqueue(
        &self,
        request: &LoadBalancerRequest,
    ) -> RolloutResult<Option<LoadBalancerState>>;

    /// Ask the control plane to abandon a cutover
    async fn cancel(&self, load_balancer_request_id: &str)
        -> RolloutResult<Option<LoadBalancerState>>;
}
