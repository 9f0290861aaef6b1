use proptest::prelude::*;

use rollout_core::models::LoadBalancerState;

/// Shape of a single-deploy rollout fed to the checker
#[derive(Debug, Clone)]
pub struct RolloutScenario {
    pub instances: u32,
    pub running: u32,
    pub old_running: u32,
    /// Per running task: `None` not yet checked, `Some(true)` passed, `Some(false)` failed
    pub health_results: Vec<Option<bool>>,
    pub elapsed_seconds: i64,
    pub health_timeout_seconds: Option<u64>,
    pub canceled: bool,
}

impl RolloutScenario {
    pub fn allowed_seconds(&self, default_healthy_by_seconds: u64) -> i64 {
        self.health_timeout_seconds
            .unwrap_or(default_healthy_by_seconds) as i64
    }
}

pub fn health_result_strategy() -> impl Strategy<Value = Option<bool>> {
    prop_oneof![
        3 => Just(Some(true)),
        1 => Just(Some(false)),
        1 => Just(None),
    ]
}

pub fn rollout_scenario_strategy() -> impl Strategy<Value = RolloutScenario> {
    (1u32..=4, 0u32..=5, 0u32..=3)
        .prop_flat_map(|(instances, running, old_running)| {
            (
                Just(instances),
                Just(running),
                Just(old_running),
                prop::collection::vec(health_result_strategy(), running as usize),
                0i64..=400,
                prop::option::of(1u64..=300),
                prop::bool::weighted(0.2),
            )
        })
        .prop_map(
            |(
                instances,
                running,
                old_running,
                health_results,
                elapsed_seconds,
                health_timeout_seconds,
                canceled,
            )| RolloutScenario {
                instances,
                running,
                old_running,
                health_results,
                elapsed_seconds,
                health_timeout_seconds,
                canceled,
            },
        )
}

pub fn load_balancer_state_strategy() -> impl Strategy<Value = LoadBalancerState> {
    prop_oneof![
        Just(LoadBalancerState::Waiting),
        Just(LoadBalancerState::Success),
        Just(LoadBalancerState::Failed),
        Just(LoadBalancerState::Canceling),
        Just(LoadBalancerState::Canceled),
    ]
}

/// Durations in milliseconds, up to a little over a day
pub fn duration_millis_strategy() -> impl Strategy<Value = i64> {
    0i64..=90_000_000
}
