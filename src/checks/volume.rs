//! End-to-end volume checks (VOL-001 through VOL-004).
//!
//! These create a claim on the Longhorn storage class and a pod that mounts
//! it. They never delete anything; `cleanup::remove_test_resources` does.

use super::{cluster_error, ProbeContext};
use crate::config::ProbeSettings;
use crate::engine::poll::{poll_until, PollOutcome};
use crate::{Outcome, ProbeError};
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

const MANAGED_BY: &str = "longhorn-probe";
const PROBE_FILE: &str = ".longhorn-probe";

/// Manifest for the test claim (JSON is valid input for `kubectl apply`)
pub fn claim_manifest(settings: &ProbeSettings) -> String {
    let volume = &settings.volume;
    json!({
        "apiVersion": "v1",
        "kind": "PersistentVolumeClaim",
        "metadata": {
            "name": volume.pvc_name,
            "namespace": volume.namespace,
            "labels": { "app.kubernetes.io/managed-by": MANAGED_BY }
        },
        "spec": {
            "accessModes": ["ReadWriteOnce"],
            "storageClassName": settings.longhorn.storage_class,
            "resources": { "requests": { "storage": volume.size } }
        }
    })
    .to_string()
}

/// Manifest for the pod mounting the test claim
pub fn pod_manifest(settings: &ProbeSettings) -> String {
    let volume = &settings.volume;
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": volume.pod_name,
            "namespace": volume.namespace,
            "labels": { "app.kubernetes.io/managed-by": MANAGED_BY }
        },
        "spec": {
            "restartPolicy": "Never",
            "terminationGracePeriodSeconds": 0,
            "containers": [{
                "name": "probe",
                "image": volume.image,
                "command": ["sh", "-c", "sleep 3600"],
                "volumeMounts": [{ "name": "data", "mountPath": volume.mount_path }]
            }],
            "volumes": [{
                "name": "data",
                "persistentVolumeClaim": { "claimName": volume.pvc_name }
            }]
        }
    })
    .to_string()
}

/// VOL-001: Create Test Volume Claim
pub fn create_test_claim(ctx: &ProbeContext<'_>) -> Outcome {
    let volume = &ctx.settings.volume;
    match ctx.cluster.apply_manifest(&claim_manifest(ctx.settings)) {
        Ok(()) => Outcome::pass(format!(
            "Claim {}/{} ({}) on {} applied",
            volume.namespace, volume.pvc_name, volume.size, ctx.settings.longhorn.storage_class
        )),
        Err(e) => cluster_error("create the test claim", &e),
    }
}

enum ClaimState {
    Bound,
    Lost,
    Missing,
}

/// VOL-002: Volume Claim Binding
///
/// A timeout only warns: with WaitForFirstConsumer binding the claim stays
/// Pending until VOL-003 schedules a pod.
pub fn wait_for_binding(ctx: &ProbeContext<'_>) -> Outcome {
    let volume = &ctx.settings.volume;
    let timeout_ms = ctx.settings.timeouts.bind_timeout_ms;
    let mut last_phase = "Pending".to_string();

    let polled = poll_until(&ctx.poll_policy(timeout_ms), || -> Result<_, ProbeError> {
        let state = match ctx.cluster.pvc_phase(&volume.namespace, &volume.pvc_name)? {
            None => Some(ClaimState::Missing),
            Some(phase) => {
                let state = match phase.as_str() {
                    "Bound" => Some(ClaimState::Bound),
                    "Lost" => Some(ClaimState::Lost),
                    _ => None,
                };
                last_phase = phase;
                state
            }
        };
        Ok(state)
    });

    match polled {
        Ok(PollOutcome::Ready { value: ClaimState::Bound, attempts }) => Outcome::pass(format!(
            "Claim {} Bound (after {} checks)",
            volume.pvc_name, attempts
        )),
        Ok(PollOutcome::Ready { value: ClaimState::Lost, .. }) => Outcome::fail(
            format!("Claim {} is Lost", volume.pvc_name),
            "The bound volume no longer exists",
        ),
        Ok(PollOutcome::Ready { value: ClaimState::Missing, .. }) => Outcome::fail(
            format!("Claim {} does not exist", volume.pvc_name),
            "VOL-001 did not create it",
        ),
        Ok(PollOutcome::TimedOut { elapsed, .. }) => Outcome::warn(
            format!(
                "Claim {} still {} after {}ms",
                volume.pvc_name,
                last_phase,
                elapsed.as_millis()
            ),
            binding_delay_details(ctx),
        ),
        Err(e) => cluster_error("read the test claim", &e),
    }
}

/// Explain a claim that is still Pending from the storage class binding mode
fn binding_delay_details(ctx: &ProbeContext<'_>) -> String {
    let class_name = &ctx.settings.longhorn.storage_class;
    let binding_mode = ctx
        .cluster
        .list_storage_classes()
        .ok()
        .and_then(|classes| classes.into_iter().find(|c| &c.name == class_name))
        .and_then(|class| class.binding_mode);

    match binding_mode.as_deref() {
        Some("WaitForFirstConsumer") => format!(
            "Storage class {} uses WaitForFirstConsumer; the claim binds once VOL-003 schedules a pod",
            class_name
        ),
        Some(mode) => format!(
            "Storage class {} uses {} binding; provisioning looks stalled (check longhorn-manager logs)",
            class_name, mode
        ),
        None => "Binding may be deferred until a pod consumes the claim".to_string(),
    }
}

enum PodState {
    Running,
    Finished(String),
    Missing,
}

/// VOL-003: Test Pod Running
pub fn start_test_pod(ctx: &ProbeContext<'_>) -> Outcome {
    let volume = &ctx.settings.volume;
    if let Err(e) = ctx.cluster.apply_manifest(&pod_manifest(ctx.settings)) {
        return cluster_error("create the test pod", &e);
    }

    let timeout_ms = ctx.settings.timeouts.pod_timeout_ms;
    let mut last_phase = "Pending".to_string();

    let polled = poll_until(&ctx.poll_policy(timeout_ms), || -> Result<_, ProbeError> {
        let state = match ctx.cluster.get_pod(&volume.namespace, &volume.pod_name)? {
            None => Some(PodState::Missing),
            Some(pod) => {
                let state = match pod.phase.as_str() {
                    "Running" if pod.ready => Some(PodState::Running),
                    "Succeeded" | "Failed" => Some(PodState::Finished(pod.phase.clone())),
                    _ => None,
                };
                last_phase = pod.phase;
                state
            }
        };
        Ok(state)
    });

    match polled {
        Ok(PollOutcome::Ready { value: PodState::Running, .. }) => Outcome::pass(format!(
            "Pod {} running with {} mounted",
            volume.pod_name, volume.pvc_name
        )),
        Ok(PollOutcome::Ready { value: PodState::Finished(phase), .. }) => Outcome::fail(
            format!("Pod {} exited early ({})", volume.pod_name, phase),
            "The container stopped before the volume could be exercised",
        ),
        Ok(PollOutcome::Ready { value: PodState::Missing, .. }) => Outcome::fail(
            format!("Pod {} disappeared", volume.pod_name),
            "The pod was applied but cannot be found",
        ),
        Ok(PollOutcome::TimedOut { elapsed, .. }) => Outcome::fail(
            format!(
                "Pod {} not running after {}ms",
                volume.pod_name,
                elapsed.as_millis()
            ),
            format!(
                "Last phase {}; the volume likely failed to attach (check longhorn-manager logs)",
                last_phase
            ),
        ),
        Err(e) => cluster_error("read the test pod", &e),
    }
}

/// VOL-004: Volume Read/Write
pub fn read_write_roundtrip(ctx: &ProbeContext<'_>) -> Outcome {
    let volume = &ctx.settings.volume;
    let token = format!(
        "longhorn-probe-{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    );
    let file = format!("{}/{}", volume.mount_path.trim_end_matches('/'), PROBE_FILE);
    let command = write_read_command(&token, &file);
    let command: Vec<&str> = command.iter().map(String::as_str).collect();

    match ctx.cluster.exec_in_pod(&volume.namespace, &volume.pod_name, &command) {
        Ok(output) if output.trim() == token => Outcome::pass(format!("Wrote and read back {}", file)),
        Ok(output) => Outcome::fail(
            "Data read back does not match what was written",
            format!("expected {:?}, got {:?}", token, output.trim()),
        ),
        Err(e) => cluster_error("write to the mounted volume", &e),
    }
}

/// Shell command that writes `token` to `file`, syncs, and prints the file.
///
/// Both values are passed as positional parameters so the shell never
/// interprets them.
pub fn write_read_command(token: &str, file: &str) -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        r#"echo "$1" > "$2" && sync && cat "$2""#.to_string(),
        "sh".to_string(),
        token.to_string(),
        file.to_string(),
    ]
}
