//! Full run integration tests.
//!
//! Complete runs of the check catalog against mock collaborators, plus
//! orchestration behaviour with synthetic checks.

use crate::mocks::*;
use longhorn_probe::engine::orchestrator::{
    create_all_checks, CheckOrchestrator, OrchestratorConfig, RegisteredCheck, Selection,
};
use longhorn_probe::{CheckCategory, Outcome, ProbeContext, ProbeError};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

fn catalog_ids() -> Vec<String> {
    create_all_checks().into_iter().map(|c| c.id).collect()
}

fn report_ids(report: &longhorn_probe::Report) -> Vec<String> {
    report.checks.iter().map(|c| c.id.clone()).collect()
}

// Helper to create a check that returns a fixed outcome
fn fixed_check(id: &str, outcome: Outcome) -> RegisteredCheck {
    RegisteredCheck::new(id, &format!("{} check", id), CheckCategory::Cluster, "synthetic", move |_| {
        outcome.clone()
    })
}

#[test]
fn test_healthy_cluster_all_pass() {
    let cluster = MockCluster::healthy();
    let nodes = MockNodeAdmin::healthy(&cluster);
    let settings = fast_settings();

    let report = run_catalog(&cluster, Some(&nodes), &settings, &Selection::default()).unwrap();

    for check in &report.checks {
        assert!(
            matches!(check.outcome, Outcome::Pass { .. }),
            "{} did not pass: {}",
            check.id,
            check.outcome
        );
    }
    assert_eq!(report_ids(&report), catalog_ids());
    assert_eq!(report.summary().passed, 16);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.server_version.as_deref(), Some("v1.31.2"));
}

#[test]
fn test_healthy_run_leaves_nothing_behind() {
    let cluster = MockCluster::healthy();
    let settings = fast_settings();

    run_catalog(&cluster, None, &settings, &Selection::default()).unwrap();

    assert!(!cluster.claim_exists());
    assert!(!cluster.pod_exists());
}

#[test]
fn test_repeated_runs_pass() {
    let cluster = MockCluster::healthy();
    let nodes = MockNodeAdmin::healthy(&cluster);
    let settings = fast_settings();

    let first = run_catalog(&cluster, Some(&nodes), &settings, &Selection::default()).unwrap();
    let second = run_catalog(&cluster, Some(&nodes), &settings, &Selection::default()).unwrap();

    assert_eq!(first.exit_code(), 0);
    assert_eq!(second.exit_code(), 0);
}

#[test]
fn test_unreachable_cluster_runs_zero_checks() {
    let cluster = MockCluster::unreachable();
    let settings = fast_settings();
    let executed = Rc::new(Cell::new(0u32));

    let ctx = ProbeContext {
        cluster: &cluster,
        nodes: None,
        settings: &settings,
    };
    let mut orchestrator = CheckOrchestrator::new(OrchestratorConfig::default());
    for id in ["A-001", "A-002", "A-003"] {
        let executed = Rc::clone(&executed);
        orchestrator.register_check(RegisteredCheck::new(id, id, CheckCategory::Cluster, "counts", move |_| {
            executed.set(executed.get() + 1);
            Outcome::pass("ran")
        }));
    }

    let result = orchestrator.run(&ctx, &Selection::default());

    assert!(matches!(result, Err(ProbeError::ClusterUnreachable { .. })));
    assert_eq!(executed.get(), 0);
    assert_eq!(cluster.calls(), vec!["ping"]);
}

#[test]
fn test_unreachable_cluster_skips_teardown_too() {
    let cluster = MockCluster::unreachable().with_leftovers();
    let settings = fast_settings();

    let result = run_catalog(&cluster, None, &settings, &Selection::default());

    assert!(result.is_err());
    assert_eq!(cluster.call_count("delete"), 0);
}

#[test]
fn test_one_outcome_per_check_in_order() {
    let cluster = MockCluster::healthy();
    let settings = fast_settings();
    let ctx = ProbeContext {
        cluster: &cluster,
        nodes: None,
        settings: &settings,
    };

    let mut orchestrator = CheckOrchestrator::new(OrchestratorConfig::default());
    orchestrator.register_checks(vec![
        fixed_check("T-003", Outcome::warn("w", "d")),
        fixed_check("T-001", Outcome::fail("f", "d")),
        fixed_check("T-002", Outcome::pass("p")),
        fixed_check("T-004", Outcome::pass("p")),
    ]);

    let report = orchestrator.run(&ctx, &Selection::default()).unwrap();

    assert_eq!(report_ids(&report), vec!["T-003", "T-001", "T-002", "T-004"]);
    assert!(report.checks[0].outcome.is_warn());
    assert!(report.checks[1].outcome.is_fail());
    assert_eq!(report.summary().total, 4);
}

#[test]
fn test_failure_does_not_stop_later_checks() {
    let cluster = MockCluster::healthy();
    let settings = fast_settings();
    let ctx = ProbeContext {
        cluster: &cluster,
        nodes: None,
        settings: &settings,
    };

    let mut orchestrator = CheckOrchestrator::new(OrchestratorConfig::default());
    orchestrator.register_checks(vec![
        fixed_check("T-001", Outcome::fail("broken", "d")),
        fixed_check("T-002", Outcome::pass("still ran")),
    ]);

    let report = orchestrator.run(&ctx, &Selection::default()).unwrap();
    assert_eq!(report.checks.len(), 2);
    assert_eq!(report.outcome("T-002").map(|o| o.message()), Some("still ran"));
}

#[test]
fn test_exit_code_warnings_only_is_zero() {
    let cluster = MockCluster::healthy();
    let settings = fast_settings();
    let ctx = ProbeContext {
        cluster: &cluster,
        nodes: None,
        settings: &settings,
    };

    let mut orchestrator = CheckOrchestrator::new(OrchestratorConfig::default());
    orchestrator.register_checks(vec![
        fixed_check("T-001", Outcome::pass("p")),
        fixed_check("T-002", Outcome::warn("w", "d")),
    ]);
    assert_eq!(orchestrator.run(&ctx, &Selection::default()).unwrap().exit_code(), 0);

    orchestrator.register_check(fixed_check("T-003", Outcome::fail("f", "d")));
    assert_eq!(orchestrator.run(&ctx, &Selection::default()).unwrap().exit_code(), 1);
}

#[test]
fn test_panicking_check_recorded_as_fail() {
    let cluster = MockCluster::healthy();
    let settings = fast_settings();
    let ctx = ProbeContext {
        cluster: &cluster,
        nodes: None,
        settings: &settings,
    };

    let mut orchestrator = CheckOrchestrator::new(OrchestratorConfig::default());
    orchestrator.register_check(RegisteredCheck::new("T-001", "boom", CheckCategory::Cluster, "panics", |_| {
        panic!("unexpected state")
    }));
    orchestrator.register_check(fixed_check("T-002", Outcome::pass("p")));

    let report = orchestrator.run(&ctx, &Selection::default()).unwrap();
    assert_eq!(
        report.outcome("T-001").map(|o| o.message()),
        Some("Check panicked during execution")
    );
    assert!(!report.outcome("T-002").unwrap().is_fail());
}

#[test]
fn test_release_profile_keeps_unwinding() {
    // Panics are only caught when the shipped profile unwinds
    let manifest: toml::Table = toml::from_str(include_str!("../../Cargo.toml")).unwrap();
    let panic_strategy = manifest
        .get("profile")
        .and_then(|p| p.get("release"))
        .and_then(|r| r.get("panic"))
        .and_then(|v| v.as_str());
    assert_ne!(panic_strategy, Some("abort"));
}

#[test]
fn test_check_exceeding_timeout_fails() {
    let cluster = MockCluster::healthy();
    let settings = fast_settings();
    let ctx = ProbeContext {
        cluster: &cluster,
        nodes: None,
        settings: &settings,
    };

    let mut orchestrator = CheckOrchestrator::new(OrchestratorConfig { check_timeout_ms: 10 });
    orchestrator.register_check(RegisteredCheck::new("T-001", "slow", CheckCategory::Cluster, "sleeps", |_| {
        std::thread::sleep(Duration::from_millis(40));
        Outcome::pass("finished eventually")
    }));

    let report = orchestrator.run(&ctx, &Selection::default()).unwrap();
    let outcome = report.outcome("T-001").unwrap();
    assert!(outcome.is_fail());
    assert!(outcome.message().starts_with("Check timed out after"));
}

#[test]
fn test_teardown_runs_despite_only_filter() {
    let cluster = MockCluster::healthy().with_leftovers();
    let settings = fast_settings();
    let selection = Selection {
        only: vec!["LH-001".to_string()],
        ..Selection::default()
    };

    let report = run_catalog(&cluster, None, &settings, &selection).unwrap();

    assert_eq!(report_ids(&report), vec!["LH-001", "CLN-001"]);
    assert!(!cluster.pod_exists());
}

#[test]
fn test_teardown_runs_despite_skip() {
    let cluster = MockCluster::healthy();
    let settings = fast_settings();
    let selection = Selection {
        skip: vec!["CLN-001".to_string()],
        ..Selection::default()
    };

    let report = run_catalog(&cluster, None, &settings, &selection).unwrap();
    assert_eq!(report.checks.last().map(|c| c.id.as_str()), Some("CLN-001"));
}

#[test]
fn test_category_filter() {
    let cluster = MockCluster::healthy();
    let settings = fast_settings();
    let selection = Selection {
        categories: vec![CheckCategory::Longhorn],
        ..Selection::default()
    };

    let report = run_catalog(&cluster, None, &settings, &selection).unwrap();
    assert_eq!(
        report_ids(&report),
        vec!["LH-001", "LH-002", "LH-003", "LH-004", "LH-005", "CLN-001"]
    );
    assert_eq!(cluster.call_count("apply_manifest"), 0);
}

#[test]
fn test_claim_never_binds_warns_after_timeout() {
    let mut cluster = MockCluster::healthy();
    cluster.claim = ClaimBehavior::NeverBinds;
    let settings = fast_settings();

    let report = run_catalog(&cluster, None, &settings, &Selection::default()).unwrap();

    let binding = report.checks.iter().find(|c| c.id == "VOL-002").unwrap();
    assert!(binding.outcome.is_warn(), "got {}", binding.outcome);
    assert!(
        binding.duration_ms >= settings.timeouts.bind_timeout_ms,
        "gave up after {}ms",
        binding.duration_ms
    );
    assert!(cluster.call_count("pvc_phase") > 1);
    // The pod still starts and the run passes with a warning
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn test_slow_cluster_binding_timeout_warns_with_validated_settings() {
    let mut cluster = MockCluster::healthy();
    cluster.claim = ClaimBehavior::NeverBinds;
    cluster.latency = Duration::from_millis(50);

    let mut settings = fast_settings();
    settings.timeouts.bind_timeout_ms = 300;
    settings.timeouts.pod_timeout_ms = 300;
    settings.timeouts.poll_interval_ms = 100;
    // The tightest per-check budget validation accepts
    settings.timeouts.check_timeout_ms = 300 + 2 * settings.kubectl.command_timeout_ms() + 100 + 1;
    settings.validate().unwrap();

    let selection = Selection {
        categories: vec![CheckCategory::Volume],
        ..Selection::default()
    };
    let report = run_catalog(&cluster, None, &settings, &selection).unwrap();

    let binding = report.outcome("VOL-002").unwrap();
    assert!(binding.is_warn(), "got {}", binding);
    assert!(binding.message().contains("still Pending"));
}

#[test]
fn test_fast_settings_pass_validation() {
    assert!(fast_settings().validate().is_ok());
}

#[test]
fn test_pod_never_runs_fails_and_still_cleans_up() {
    let mut cluster = MockCluster::healthy();
    cluster.pod = PodBehavior::NeverRuns;
    let settings = fast_settings();

    let report = run_catalog(&cluster, None, &settings, &Selection::default()).unwrap();

    let pod = report.checks.iter().find(|c| c.id == "VOL-003").unwrap();
    assert!(pod.outcome.is_fail());
    assert!(pod.duration_ms >= settings.timeouts.pod_timeout_ms);
    assert!(report.outcome("CLN-001").map(|o| !o.is_fail()).unwrap_or(false));
    assert!(!cluster.pod_exists());
    assert!(!cluster.claim_exists());
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn test_claim_binding_after_several_polls() {
    let mut cluster = MockCluster::healthy();
    cluster.claim = ClaimBehavior::BindAfter(3);
    let settings = fast_settings();

    let report = run_catalog(&cluster, None, &settings, &Selection::default()).unwrap();

    let outcome = report.outcome("VOL-002").unwrap();
    assert!(matches!(outcome, Outcome::Pass { .. }), "got {}", outcome);
    assert_eq!(cluster.call_count("pvc_phase"), 3);
}
