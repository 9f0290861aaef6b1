//! Pure predicates consulted by the deploy checker's decision function.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use super::states::DeployCheckResult;
use crate::models::{CancelMarker, Deploy, DeployMarker, LoadBalancerState};

/// Outcome dictated by a load balancer state the gateway has already settled.
///
/// Returns `None` when the state leaves the decision open.
pub fn settled_load_balancer_result(
    state: Option<LoadBalancerState>,
) -> Option<DeployCheckResult> {
    match state? {
        LoadBalancerState::Canceled => Some(DeployCheckResult::CANCELED),
        LoadBalancerState::Success => Some(DeployCheckResult::SUCCEEDED),
        LoadBalancerState::Canceling => Some(DeployCheckResult::WAITING),
        LoadBalancerState::Waiting | LoadBalancerState::Failed => None,
    }
}

/// Cancel marker addressed to the given deploy, if any
pub fn find_cancel<'a>(
    cancels: &'a [CancelMarker],
    marker: &DeployMarker,
) -> Option<&'a CancelMarker> {
    cancels.iter().find(|cancel| cancel.matches(marker))
}

/// Elapsed and allowed time for one pending deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployTimeBudget {
    pub elapsed: Duration,
    pub allowed: Duration,
}

impl DeployTimeBudget {
    /// Budget for `deploy` measured from the marker's submission time.
    ///
    /// Allowed time is the health check interval (zero when unset) plus the
    /// deploy's own health timeout, or `default_healthy_by_seconds` when the
    /// deploy does not set one.
    pub fn evaluate(
        deploy: &Deploy,
        marker: &DeployMarker,
        default_healthy_by_seconds: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let interval = deploy.healthcheck_interval_seconds.unwrap_or(0);
        let timeout = deploy
            .deploy_health_timeout_seconds
            .unwrap_or(default_healthy_by_seconds);
        let allowed_seconds = i64::try_from(interval.saturating_add(timeout)).unwrap_or(i64::MAX);

        Self {
            elapsed: now.signed_duration_since(marker.timestamp),
            allowed: Duration::try_seconds(allowed_seconds).unwrap_or(Duration::MAX),
        }
    }

    pub fn is_overdue(&self) -> bool {
        self.elapsed > self.allowed
    }
}

impl fmt::Display for DeployTimeBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} elapsed of {} allowed",
            format_hms(self.elapsed),
            format_hms(self.allowed)
        )
    }
}

/// Render a duration as `HH:MM:SS.mmm`; negative durations clamp to zero
pub fn format_hms(duration: Duration) -> String {
    let millis = duration.num_milliseconds().max(0);
    let hours = millis / 3_600_000;
    let minutes = (millis % 3_600_000) / 60_000;
    let seconds = (millis % 60_000) / 1_000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{:03}", millis % 1_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_at(timestamp: DateTime<Utc>) -> DeployMarker {
        DeployMarker::new("web", "v2", timestamp, None)
    }

    #[test]
    fn test_settled_load_balancer_results() {
        assert_eq!(settled_load_balancer_result(None), None);
        assert_eq!(
            settled_load_balancer_result(Some(LoadBalancerState::Canceled)),
            Some(DeployCheckResult::CANCELED)
        );
        assert_eq!(
            settled_load_balancer_result(Some(LoadBalancerState::Success)),
            Some(DeployCheckResult::SUCCEEDED)
        );
        assert_eq!(
            settled_load_balancer_result(Some(LoadBalancerState::Canceling)),
            Some(DeployCheckResult::WAITING)
        );
        assert_eq!(
            settled_load_balancer_result(Some(LoadBalancerState::Waiting)),
            None
        );
        assert_eq!(
            settled_load_balancer_result(Some(LoadBalancerState::Failed)),
            None
        );
    }

    #[test]
    fn test_budget_uses_system_default_without_timeout() {
        let now = Utc::now();
        let deploy = Deploy::new("web", "v2");
        let budget = DeployTimeBudget::evaluate(
            &deploy,
            &marker_at(now - Duration::seconds(121)),
            120,
            now,
        );

        assert_eq!(budget.allowed, Duration::seconds(120));
        assert!(budget.is_overdue());
    }

    #[test]
    fn test_budget_adds_healthcheck_interval_to_deploy_timeout() {
        let now = Utc::now();
        let deploy = Deploy::new("web", "v2")
            .with_healthcheck("/health", Some(10))
            .with_health_timeout(30);
        let marker = marker_at(now - Duration::seconds(40));
        let budget = DeployTimeBudget::evaluate(&deploy, &marker, 120, now);

        assert_eq!(budget.allowed, Duration::seconds(40));
        // Exactly at the limit is not overdue
        assert!(!budget.is_overdue());

        let later = DeployTimeBudget::evaluate(&deploy, &marker, 120, now + Duration::milliseconds(1));
        assert!(later.is_overdue());
    }

    #[test]
    fn test_future_marker_is_never_overdue() {
        let now = Utc::now();
        let budget = DeployTimeBudget::evaluate(
            &Deploy::new("web", "v2").with_health_timeout(0),
            &marker_at(now + Duration::seconds(5)),
            120,
            now,
        );
        assert!(!budget.is_overdue());
    }

    #[test]
    fn test_find_cancel() {
        let now = Utc::now();
        let marker = marker_at(now);
        let cancels = vec![
            CancelMarker::new("web", "v1", now, None),
            CancelMarker::new("web", "v2", now, Some("ops".to_string())),
        ];

        let found = find_cancel(&cancels, &marker).unwrap();
        assert_eq!(found.user.as_deref(), Some("ops"));
        assert!(find_cancel(&cancels[..1], &marker).is_none());
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(Duration::milliseconds(3_723_004)), "01:02:03.004");
        assert_eq!(format_hms(Duration::seconds(-5)), "00:00:00.000");
    }
}
