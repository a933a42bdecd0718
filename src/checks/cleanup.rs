//! Teardown check (CLN-001).

use super::ProbeContext;
use crate::platform::{DeleteOutcome, ResourceKind};
use crate::Outcome;

/// CLN-001: Cleanup Test Resources
///
/// Pod first so the claim is released. A resource that is already gone counts
/// as cleaned, which makes repeated runs pass.
pub fn remove_test_resources(ctx: &ProbeContext<'_>) -> Outcome {
    let volume = &ctx.settings.volume;
    let targets = [
        (ResourceKind::Pod, volume.pod_name.as_str()),
        (ResourceKind::PersistentVolumeClaim, volume.pvc_name.as_str()),
    ];

    let mut removed = Vec::new();
    let mut errors = Vec::new();

    for (kind, name) in targets {
        match ctx.cluster.delete(kind, &volume.namespace, name) {
            Ok(DeleteOutcome::Deleted) => removed.push(format!("{} {}", kind, name)),
            Ok(DeleteOutcome::Absent) => {
                tracing::debug!(kind = %kind, name, "already absent");
            }
            Err(e) => errors.push(format!("{} {}: {}", kind, name, e)),
        }
    }

    if !errors.is_empty() {
        Outcome::fail(
            format!("Could not remove {} test resources", errors.len()),
            errors.join("; "),
        )
    } else if removed.is_empty() {
        Outcome::pass("Nothing to clean up")
    } else {
        Outcome::pass(format!("Removed {}", removed.join(", ")))
    }
}
