use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use tracing::{debug, info, warn};

use super::LoadBalancerClient;
use crate::config::LoadBalancerConfig;
use crate::error::{RolloutError, RolloutResult};
use crate::logging::log_load_balancer_operation;
use crate::models::{LoadBalancerRequest, LoadBalancerResponse, LoadBalancerState};

/// JSON-over-HTTP client for the load balancer control plane.
///
/// `POST {uri}` submits a cutover and `DELETE {uri}/{id}` cancels one. Both
/// answer with a [`LoadBalancerResponse`]. Timeouts, connection failures and
/// server errors are reported as "not settled yet" so the deploy stays
/// pending; client errors on enqueue are a definitive failure.
#[derive(Debug, Clone)]
pub struct HttpLoadBalancerClient {
    client: Client,
    uri: Option<Url>,
}

impl HttpLoadBalancerClient {
    pub fn new(config: &LoadBalancerConfig) -> RolloutResult<Self> {
        let uri = config
            .uri
            .as_deref()
            .filter(|uri| !uri.trim().is_empty())
            .map(|uri| {
                Url::parse(uri).map_err(|e| {
                    RolloutError::ConfigurationError(format!(
                        "Invalid load balancer uri {uri}: {e}"
                    ))
                })
            })
            .transpose()?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(format!("rollout-core-rs/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                RolloutError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
            })?;

        info!(
            uri = ?uri.as_ref().map(Url::as_str),
            timeout_ms = config.request_timeout_ms,
            "Created load balancer client"
        );

        Ok(Self { client, uri })
    }

    fn cancel_url(base: &Url, load_balancer_request_id: &str) -> RolloutResult<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RolloutError::ConfigurationError(format!(
                    "Load balancer uri cannot carry a path: {base}"
                ))
            })?
            .pop_if_empty()
            .push(load_balancer_request_id);
        Ok(url)
    }

    async fn parse_state(response: Response, operation: &str) -> RolloutResult<LoadBalancerState> {
        let body = response.json::<LoadBalancerResponse>().await.map_err(|e| {
            RolloutError::LoadBalancerError(format!("Failed to parse {operation} response: {e}"))
        })?;
        if let Some(message) = &body.message {
            debug!(operation, message = %message, "Load balancer response message");
        }
        Ok(body.load_balancer_state)
    }
}

#[async_trait]
impl LoadBalancerClient for HttpLoadBalancerClient {
    fn has_valid_uri(&self) -> bool {
        self.uri.is_some()
    }

    async fn enqueue(
        &self,
        request: &LoadBalancerRequest,
    ) -> RolloutResult<Option<LoadBalancerState>> {
        let Some(uri) = &self.uri else {
            return Err(RolloutError::LoadBalancerError(
                "No load balancer uri configured".to_string(),
            ));
        };
        let lb_request_id = request.load_balancer_request_id.as_str();

        debug!(
            lb_request_id,
            add = request.add.len(),
            remove = request.remove.len(),
            "Enqueueing load balancer request"
        );

        let response = match self.client.post(uri.clone()).json(request).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(lb_request_id, error = %e, "Load balancer enqueue did not complete");
                return Ok(None);
            }
        };

        let status = response.status();
        if status.is_success() {
            let state = Self::parse_state(response, "enqueue").await?;
            log_load_balancer_operation("enqueue", lb_request_id, state.as_str(), None);
            return Ok(Some(state));
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status.is_client_error() {
            let details = format!("HTTP {status}: {error_text}");
            log_load_balancer_operation(
                "enqueue",
                lb_request_id,
                LoadBalancerState::Failed.as_str(),
                Some(details.as_str()),
            );
            return Ok(Some(LoadBalancerState::Failed));
        }

        warn!(
            lb_request_id,
            status = %status,
            error = %error_text,
            "Load balancer server error, will poll again"
        );
        Ok(None)
    }

    async fn cancel(
        &self,
        load_balancer_request_id: &str,
    ) -> RolloutResult<Option<LoadBalancerState>> {
        let Some(uri) = &self.uri else {
            warn!(
                lb_request_id = load_balancer_request_id,
                "No load balancer uri configured, cannot cancel"
            );
            return Ok(None);
        };
        let url = Self::cancel_url(uri, load_balancer_request_id)?;

        let response = match self.client.delete(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    lb_request_id = load_balancer_request_id,
                    error = %e,
                    "Load balancer cancel did not complete"
                );
                return Ok(None);
            }
        };

        let status = response.status();
        if status.is_success() {
            let state = Self::parse_state(response, "cancel").await?;
            log_load_balancer_operation("cancel", load_balancer_request_id, state.as_str(), None);
            return Ok(Some(state));
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        warn!(
            lb_request_id = load_balancer_request_id,
            status = %status,
            error = %error_text,
            "Load balancer rejected cancel"
        );
        Ok(None)
    }
}
