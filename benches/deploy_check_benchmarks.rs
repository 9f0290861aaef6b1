use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use rollout_core::config::{DeployCheckerConfig, LoadBalancerConfig};
use rollout_core::health::{HealthcheckDeployHealthEvaluator, InMemoryHealthcheckSource};
use rollout_core::load_balancer::HttpLoadBalancerClient;
use rollout_core::models::{Deploy, DeployMarker, PendingDeploy, Request, Task, TaskId};
use rollout_core::orchestration::{DeployChecker, DeployCheckerDependencies};
use rollout_core::registry::{InMemoryRequestSource, InMemoryTaskRegistry};
use rollout_core::state_machine::DeployTimeBudget;
use rollout_core::store::InMemoryDeployStore;

/// Checker over `pending` deploys that stay waiting on a missing instance
fn waiting_checker(pending: usize) -> DeployChecker {
    let store = Arc::new(InMemoryDeployStore::new());
    let registry = Arc::new(InMemoryTaskRegistry::new());
    let requests = Arc::new(InMemoryRequestSource::new());
    let submitted = Utc::now();

    for n in 0..pending {
        let request_id = format!("request-{n}");
        requests.insert(Request::service(request_id.clone(), 2));
        store.insert_deploy(Deploy::new(request_id.clone(), "v2").with_health_timeout(u64::MAX));
        store.insert_pending_deploy(PendingDeploy::new(DeployMarker::new(
            request_id.clone(),
            "v2",
            submitted,
            None,
        )));
        registry.add_task(Task::new(
            TaskId::new(request_id, "v2", submitted, 1, "host"),
            vec![8080],
        ));
    }

    let dependencies = DeployCheckerDependencies {
        deploy_store: store,
        task_registry: registry,
        request_source: requests,
        health_evaluator: Arc::new(HealthcheckDeployHealthEvaluator::new(Arc::new(
            InMemoryHealthcheckSource::new(),
        ))),
        load_balancer: Arc::new(
            HttpLoadBalancerClient::new(&LoadBalancerConfig::default())
                .expect("load balancer client"),
        ),
    };
    DeployChecker::new(dependencies, DeployCheckerConfig::default())
}

fn benchmark_check_pass(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("deploy_check_pass");

    for pending in [10, 100, 1_000] {
        let checker = waiting_checker(pending);
        group.bench_with_input(BenchmarkId::from_parameter(pending), &checker, |b, checker| {
            b.iter(|| runtime.block_on(checker.check_deploys()))
        });
    }
    group.finish();
}

fn benchmark_time_budget(c: &mut Criterion) {
    let deploy = Deploy::new("web", "v2").with_healthcheck("/health", Some(10));
    let marker = DeployMarker::new("web", "v2", Utc::now(), None);
    let now = Utc::now();

    c.bench_function("deploy_time_budget", |b| {
        b.iter(|| DeployTimeBudget::evaluate(black_box(&deploy), black_box(&marker), 120, now))
    });
}

criterion_group!(benches, benchmark_check_pass, benchmark_time_budget);
criterion_main!(benches);
