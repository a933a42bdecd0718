//! Talos node checks (TAL-001 through TAL-003).
//!
//! These go through node administration, which is optional. When it is
//! missing, or a query errors (commonly an authentication problem with the
//! talosconfig), the check warns instead of failing. A definitive negative
//! answer from a node is still a failure.

use super::{cluster_error, join_names, ProbeContext};
use crate::platform::talosctl::module_loaded;
use crate::platform::NodeAdmin;
use crate::Outcome;

/// A node to query: display name and the address node administration uses
struct NodeTarget {
    name: String,
    address: String,
}

fn node_admin<'a>(ctx: &ProbeContext<'a>) -> Result<&'a dyn NodeAdmin, Outcome> {
    ctx.nodes.ok_or_else(|| {
        Outcome::warn(
            "Node administration unavailable",
            "talosctl not found or disabled; node prerequisites were not verified",
        )
    })
}

fn node_targets(ctx: &ProbeContext<'_>) -> Result<Vec<NodeTarget>, Outcome> {
    let nodes = ctx
        .cluster
        .list_nodes()
        .map_err(|e| cluster_error("list nodes", &e))?;

    if nodes.is_empty() {
        return Err(Outcome::fail("No nodes registered", "The cluster reports zero nodes"));
    }

    Ok(nodes
        .into_iter()
        .map(|n| NodeTarget {
            address: n.internal_ip.unwrap_or_else(|| n.name.clone()),
            name: n.name,
        })
        .collect())
}

/// Per-node findings folded into one outcome
#[derive(Default)]
struct NodeFindings {
    /// Definitive negatives, e.g. "worker-1: iscsi-tools"
    missing: Vec<String>,
    /// Queries that could not be answered
    errors: Vec<String>,
}

impl NodeFindings {
    fn into_outcome(self, node_count: usize, pass_message: String, missing_message: &str) -> Outcome {
        if !self.missing.is_empty() {
            Outcome::fail(
                format!("{} ({})", missing_message, self.missing.len()),
                join_names(&self.missing),
            )
        } else if !self.errors.is_empty() {
            Outcome::warn(
                format!("Could not query {} of {} nodes", self.errors.len(), node_count),
                self.errors.join("; "),
            )
        } else {
            Outcome::pass(pass_message)
        }
    }
}

/// Extension names may carry a publisher prefix ("siderolabs/iscsi-tools")
fn has_extension(installed: &[String], wanted: &str) -> bool {
    installed
        .iter()
        .any(|name| name == wanted || name.rsplit('/').next() == Some(wanted))
}

/// TAL-001: Talos System Extensions
pub fn check_extensions(ctx: &ProbeContext<'_>) -> Outcome {
    let admin = match node_admin(ctx) {
        Ok(admin) => admin,
        Err(outcome) => return outcome,
    };
    let targets = match node_targets(ctx) {
        Ok(targets) => targets,
        Err(outcome) => return outcome,
    };
    let required = &ctx.settings.talos.required_extensions;

    let mut findings = NodeFindings::default();
    for target in &targets {
        match admin.list_extensions(&target.address) {
            Ok(installed) => {
                for wanted in required {
                    if !has_extension(&installed, wanted) {
                        findings.missing.push(format!("{}: {}", target.name, wanted));
                    }
                }
            }
            Err(e) => {
                tracing::warn!(node = %target.name, error = %e, "extension query failed");
                findings.errors.push(format!("{}: {}", target.name, e));
            }
        }
    }

    findings.into_outcome(
        targets.len(),
        format!("{} present on {} nodes", required.join(", "), targets.len()),
        "Required extensions missing",
    )
}

/// TAL-002: iSCSI Tooling Present
pub fn check_iscsiadm(ctx: &ProbeContext<'_>) -> Outcome {
    let admin = match node_admin(ctx) {
        Ok(admin) => admin,
        Err(outcome) => return outcome,
    };
    let targets = match node_targets(ctx) {
        Ok(targets) => targets,
        Err(outcome) => return outcome,
    };
    let path = &ctx.settings.talos.iscsiadm_path;

    let mut findings = NodeFindings::default();
    for target in &targets {
        match admin.path_exists(&target.address, path) {
            Ok(true) => {}
            Ok(false) => findings.missing.push(target.name.clone()),
            Err(e) => findings.errors.push(format!("{}: {}", target.name, e)),
        }
    }

    findings.into_outcome(
        targets.len(),
        format!("{} found on {} nodes", path, targets.len()),
        &format!("{} absent", path),
    )
}

/// TAL-003: iSCSI Kernel Module
///
/// The module is often loaded on first attach, so absence only warns.
pub fn check_iscsi_module(ctx: &ProbeContext<'_>) -> Outcome {
    let admin = match node_admin(ctx) {
        Ok(admin) => admin,
        Err(outcome) => return outcome,
    };
    let targets = match node_targets(ctx) {
        Ok(targets) => targets,
        Err(outcome) => return outcome,
    };
    let module = &ctx.settings.talos.iscsi_module;

    let mut not_loaded = Vec::new();
    let mut errors = Vec::new();
    for target in &targets {
        match admin.read_file(&target.address, "/proc/modules") {
            Ok(modules) if module_loaded(&modules, module) => {}
            Ok(_) => not_loaded.push(target.name.clone()),
            Err(e) => errors.push(format!("{}: {}", target.name, e)),
        }
    }

    if !errors.is_empty() {
        Outcome::warn(
            format!("Could not read kernel modules on {} of {} nodes", errors.len(), targets.len()),
            errors.join("; "),
        )
    } else if !not_loaded.is_empty() {
        Outcome::warn(
            format!("{} not loaded on {} nodes", module, not_loaded.len()),
            format!(
                "It may load on first volume attach: {}",
                join_names(&not_loaded)
            ),
        )
    } else {
        Outcome::pass(format!("{} loaded on {} nodes", module, targets.len()))
    }
}
