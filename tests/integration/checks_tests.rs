//! Individual check tests against degraded mock clusters.

use crate::mocks::*;
use longhorn_probe::checks::{cleanup, cluster, longhorn, node, volume};
use longhorn_probe::config::ProbeSettings;
use longhorn_probe::platform::NodeAdmin;
use longhorn_probe::{Outcome, ProbeContext};

fn ctx<'a>(
    cluster: &'a MockCluster,
    nodes: Option<&'a MockNodeAdmin>,
    settings: &'a ProbeSettings,
) -> ProbeContext<'a> {
    ProbeContext {
        cluster,
        nodes: nodes.map(|n| n as &dyn NodeAdmin),
        settings,
    }
}

fn is_pass(outcome: &Outcome) -> bool {
    matches!(outcome, Outcome::Pass { .. })
}

// Cluster checks

#[test]
fn test_node_not_ready_fails() {
    let mut mock = MockCluster::healthy();
    mock.nodes[2].ready = false;
    let settings = fast_settings();

    let outcome = cluster::check_nodes_ready(&ctx(&mock, None, &settings));
    assert!(outcome.is_fail());
    assert_eq!(outcome.message(), "1 of 3 nodes not Ready");
    assert!(outcome.details().unwrap().contains("worker-2"));
}

#[test]
fn test_non_talos_node_warns() {
    let mut mock = MockCluster::healthy();
    mock.nodes[1].os_image = "Ubuntu 24.04.1 LTS".to_string();
    let settings = fast_settings();

    let outcome = cluster::check_talos_os(&ctx(&mock, None, &settings));
    assert!(outcome.is_warn());
}

#[test]
fn test_api_reachable_reports_version() {
    let mock = MockCluster::healthy();
    let settings = fast_settings();

    let outcome = cluster::check_api_reachable(&ctx(&mock, None, &settings));
    assert!(is_pass(&outcome));
    assert!(outcome.message().contains("v1.31.2"));
}

// Node checks

#[test]
fn test_node_checks_warn_without_node_admin() {
    let mock = MockCluster::healthy();
    let settings = fast_settings();
    let context = ctx(&mock, None, &settings);

    assert!(node::check_extensions(&context).is_warn());
    assert!(node::check_iscsiadm(&context).is_warn());
    assert!(node::check_iscsi_module(&context).is_warn());
}

#[test]
fn test_missing_extension_fails() {
    let mock = MockCluster::healthy();
    let mut admin = MockNodeAdmin::healthy(&mock);
    admin
        .extensions
        .insert("10.0.0.11".to_string(), vec!["siderolabs/util-linux-tools".to_string()]);
    let settings = fast_settings();

    let outcome = node::check_extensions(&ctx(&mock, Some(&admin), &settings));
    assert!(outcome.is_fail());
    assert_eq!(outcome.details(), Some("worker-1: iscsi-tools"));
}

#[test]
fn test_node_admin_errors_warn() {
    let mock = MockCluster::healthy();
    let mut admin = MockNodeAdmin::healthy(&mock);
    admin.failing = true;
    let settings = fast_settings();
    let context = ctx(&mock, Some(&admin), &settings);

    let outcome = node::check_extensions(&context);
    assert!(outcome.is_warn());
    assert!(outcome.details().unwrap().contains("PermissionDenied"));
    assert!(node::check_iscsiadm(&context).is_warn());
    assert!(node::check_iscsi_module(&context).is_warn());
}

#[test]
fn test_iscsiadm_absent_fails() {
    let mock = MockCluster::healthy();
    let mut admin = MockNodeAdmin::healthy(&mock);
    admin.iscsiadm_present = false;
    let settings = fast_settings();

    let outcome = node::check_iscsiadm(&ctx(&mock, Some(&admin), &settings));
    assert!(outcome.is_fail());
}

#[test]
fn test_iscsi_module_not_loaded_only_warns() {
    let mock = MockCluster::healthy();
    let mut admin = MockNodeAdmin::healthy(&mock);
    admin.proc_modules = "overlay 151552 0 - Live 0x0000000000000000\n".to_string();
    let settings = fast_settings();

    let outcome = node::check_iscsi_module(&ctx(&mock, Some(&admin), &settings));
    assert!(outcome.is_warn());
    assert_eq!(outcome.message(), "iscsi_tcp not loaded on 3 nodes");
}

// Longhorn checks

#[test]
fn test_missing_namespace_fails() {
    let mut mock = MockCluster::healthy();
    mock.namespaces.retain(|n| n != "longhorn-system");
    let settings = fast_settings();

    assert!(longhorn::check_namespace(&ctx(&mock, None, &settings)).is_fail());
}

#[test]
fn test_crashlooping_pod_fails() {
    let mut mock = MockCluster::healthy();
    mock.longhorn_pods[0].phase = "Running".to_string();
    mock.longhorn_pods[0].ready = false;
    mock.longhorn_pods[0].restarts = 14;
    let settings = fast_settings();

    let outcome = longhorn::check_pods_healthy(&ctx(&mock, None, &settings));
    assert!(outcome.is_fail());
    assert!(outcome.details().unwrap().contains("longhorn-manager-7kq2x (Running, 14 restarts)"));
}

#[test]
fn test_no_longhorn_pods_fails() {
    let mut mock = MockCluster::healthy();
    mock.longhorn_pods.clear();
    let settings = fast_settings();

    assert!(longhorn::check_pods_healthy(&ctx(&mock, None, &settings)).is_fail());
}

#[test]
fn test_missing_component_warns() {
    let mut mock = MockCluster::healthy();
    mock.longhorn_pods.retain(|p| !p.name.starts_with("longhorn-ui"));
    let settings = fast_settings();

    let outcome = longhorn::check_components(&ctx(&mock, None, &settings));
    assert!(outcome.is_warn());
    assert_eq!(outcome.details(), Some("Missing: longhorn-ui"));
}

#[test]
fn test_csi_driver_missing_fails() {
    let mut mock = MockCluster::healthy();
    mock.csi_drivers.clear();
    let settings = fast_settings();

    assert!(longhorn::check_csi_driver(&ctx(&mock, None, &settings)).is_fail());
}

#[test]
fn test_storage_class_not_default_warns() {
    let mut mock = MockCluster::healthy();
    mock.storage_classes = vec![storage_class("local-path", true), storage_class("longhorn", false)];
    let settings = fast_settings();

    let outcome = longhorn::check_storage_class(&ctx(&mock, None, &settings));
    assert!(outcome.is_warn());
    assert_eq!(outcome.details(), Some("default is local-path"));
}

#[test]
fn test_storage_class_missing_fails() {
    let mut mock = MockCluster::healthy();
    mock.storage_classes = vec![storage_class("local-path", true)];
    let settings = fast_settings();

    let outcome = longhorn::check_storage_class(&ctx(&mock, None, &settings));
    assert!(outcome.is_fail());
    assert_eq!(outcome.details(), Some("Available: local-path"));
}

// Volume checks

#[test]
fn test_binding_without_claim_fails() {
    let mock = MockCluster::healthy();
    let settings = fast_settings();

    let outcome = volume::wait_for_binding(&ctx(&mock, None, &settings));
    assert!(outcome.is_fail());
}

#[test]
fn test_lost_claim_fails() {
    let mut mock = MockCluster::healthy();
    mock.claim = ClaimBehavior::Lost;
    let settings = fast_settings();
    let context = ctx(&mock, None, &settings);

    assert!(is_pass(&volume::create_test_claim(&context)));
    assert!(volume::wait_for_binding(&context).is_fail());
}

#[test]
fn test_pod_exiting_early_fails_without_waiting() {
    let mut mock = MockCluster::healthy();
    mock.pod = PodBehavior::Exits("Failed");
    let mut settings = fast_settings();
    settings.timeouts.pod_timeout_ms = 60_000;

    let started = std::time::Instant::now();
    let outcome = volume::start_test_pod(&ctx(&mock, None, &settings));
    assert!(outcome.is_fail());
    assert_eq!(outcome.message(), "Pod longhorn-probe-pod exited early (Failed)");
    assert!(started.elapsed().as_millis() < 60_000);
}

#[test]
fn test_read_back_mismatch_fails() {
    let mut mock = MockCluster::healthy();
    mock.corrupt_reads = true;
    let settings = fast_settings();
    let context = ctx(&mock, None, &settings);

    assert!(is_pass(&volume::start_test_pod(&context)));
    let outcome = volume::read_write_roundtrip(&context);
    assert!(outcome.is_fail());
    assert_eq!(outcome.message(), "Data read back does not match what was written");
}

#[test]
fn test_read_write_without_pod_fails() {
    let mock = MockCluster::healthy();
    let settings = fast_settings();

    assert!(volume::read_write_roundtrip(&ctx(&mock, None, &settings)).is_fail());
}

#[test]
fn test_binding_timeout_explains_wait_for_first_consumer() {
    let mut mock = MockCluster::healthy();
    mock.claim = ClaimBehavior::NeverBinds;
    mock.storage_classes[0].binding_mode = Some("WaitForFirstConsumer".to_string());
    let settings = fast_settings();
    let context = ctx(&mock, None, &settings);

    assert!(is_pass(&volume::create_test_claim(&context)));
    let outcome = volume::wait_for_binding(&context);
    assert!(outcome.is_warn(), "got {}", outcome);
    assert!(outcome.details().unwrap().contains("WaitForFirstConsumer"));
}

#[test]
fn test_binding_timeout_with_immediate_binding_points_at_provisioning() {
    let mut mock = MockCluster::healthy();
    mock.claim = ClaimBehavior::NeverBinds;
    let settings = fast_settings();
    let context = ctx(&mock, None, &settings);

    assert!(is_pass(&volume::create_test_claim(&context)));
    let outcome = volume::wait_for_binding(&context);
    assert!(outcome.is_warn(), "got {}", outcome);
    assert!(outcome.details().unwrap().contains("Immediate binding"));
}

// Cluster API errors

fn assert_fails_with_read_error(outcome: &Outcome) {
    assert!(outcome.is_fail(), "got {}", outcome);
    assert!(outcome.message().starts_with("Failed to "), "message {}", outcome.message());
    assert!(
        outcome.details().unwrap_or_default().contains(READ_ERROR),
        "details {:?}",
        outcome.details()
    );
}

#[test]
fn test_node_listing_error_fails() {
    let mut mock = MockCluster::healthy();
    mock.failing_reads = true;
    let settings = fast_settings();

    assert_fails_with_read_error(&cluster::check_nodes_ready(&ctx(&mock, None, &settings)));
}

#[test]
fn test_longhorn_pod_listing_error_fails() {
    let mut mock = MockCluster::healthy();
    mock.failing_reads = true;
    let settings = fast_settings();

    assert_fails_with_read_error(&longhorn::check_pods_healthy(&ctx(&mock, None, &settings)));
}

#[test]
fn test_storage_class_listing_error_fails() {
    let mut mock = MockCluster::healthy();
    mock.failing_reads = true;
    let settings = fast_settings();

    assert_fails_with_read_error(&longhorn::check_storage_class(&ctx(&mock, None, &settings)));
}

#[test]
fn test_claim_read_error_fails() {
    let mut mock = MockCluster::healthy();
    mock.failing_reads = true;
    let settings = fast_settings();
    let context = ctx(&mock, None, &settings);

    assert!(is_pass(&volume::create_test_claim(&context)));
    let outcome = volume::wait_for_binding(&context);
    assert_fails_with_read_error(&outcome);
    assert_eq!(outcome.message(), "Failed to read the test claim");
    assert_eq!(mock.call_count("pvc_phase"), 1);
}

// Cleanup

#[test]
fn test_cleanup_is_idempotent() {
    let mock = MockCluster::healthy().with_leftovers();
    let settings = fast_settings();
    let context = ctx(&mock, None, &settings);

    let first = cleanup::remove_test_resources(&context);
    let second = cleanup::remove_test_resources(&context);

    assert!(is_pass(&first), "got {}", first);
    assert_eq!(first.message(), "Removed pod longhorn-probe-pod, pvc longhorn-probe-pvc");
    assert!(is_pass(&second), "got {}", second);
    assert_eq!(second.message(), "Nothing to clean up");
}

#[test]
fn test_cleanup_with_nothing_created_passes() {
    let mock = MockCluster::healthy();
    let settings = fast_settings();

    let outcome = cleanup::remove_test_resources(&ctx(&mock, None, &settings));
    assert!(is_pass(&outcome));
}

#[test]
fn test_cleanup_delete_errors_fail() {
    let mut mock = MockCluster::healthy().with_leftovers();
    mock.fail_deletes = true;
    let settings = fast_settings();

    let outcome = cleanup::remove_test_resources(&ctx(&mock, None, &settings));
    assert!(outcome.is_fail());
    assert!(outcome.details().unwrap().contains("Forbidden"));
}
