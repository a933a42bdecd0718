//! Cluster checks (CLU-001 through CLU-003).

use super::{cluster_error, join_names, ProbeContext};
use crate::Outcome;

/// CLU-001: Cluster API Reachable
pub fn check_api_reachable(ctx: &ProbeContext<'_>) -> Outcome {
    match ctx.cluster.ping() {
        Ok(version) => Outcome::pass(format!("API server {} at {}", version, ctx.subject())),
        Err(e) => cluster_error("reach the API server", &e),
    }
}

/// CLU-002: Nodes Ready
pub fn check_nodes_ready(ctx: &ProbeContext<'_>) -> Outcome {
    let nodes = match ctx.cluster.list_nodes() {
        Ok(nodes) => nodes,
        Err(e) => return cluster_error("list nodes", &e),
    };

    if nodes.is_empty() {
        return Outcome::fail("No nodes registered", "The cluster reports zero nodes");
    }

    let not_ready: Vec<String> = nodes
        .iter()
        .filter(|n| !n.ready)
        .map(|n| n.name.clone())
        .collect();

    if not_ready.is_empty() {
        Outcome::pass(format!("{} nodes Ready", nodes.len()))
    } else {
        Outcome::fail(
            format!("{} of {} nodes not Ready", not_ready.len(), nodes.len()),
            format!("Not Ready: {}", join_names(&not_ready)),
        )
    }
}

/// CLU-003: Talos Node OS
pub fn check_talos_os(ctx: &ProbeContext<'_>) -> Outcome {
    let nodes = match ctx.cluster.list_nodes() {
        Ok(nodes) => nodes,
        Err(e) => return cluster_error("list nodes", &e),
    };

    let other: Vec<String> = nodes
        .iter()
        .filter(|n| !n.os_image.to_lowercase().contains("talos"))
        .map(|n| format!("{} ({})", n.name, n.os_image))
        .collect();

    match nodes.first() {
        None => Outcome::warn("No nodes to inspect", "The cluster reports zero nodes"),
        Some(first) if other.is_empty() => Outcome::pass(format!("{} on all nodes", first.os_image)),
        Some(_) => Outcome::warn(
            format!("{} nodes are not running Talos", other.len()),
            format!(
                "Talos-specific node checks may not apply: {}",
                join_names(&other)
            ),
        ),
    }
}
