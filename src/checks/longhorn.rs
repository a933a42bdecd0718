//! Longhorn deployment checks (LH-001 through LH-005).

use super::{cluster_error, join_names, ProbeContext};
use crate::Outcome;

/// LH-001: Longhorn Namespace
pub fn check_namespace(ctx: &ProbeContext<'_>) -> Outcome {
    let namespace = &ctx.settings.longhorn.namespace;
    match ctx.cluster.namespace_exists(namespace) {
        Ok(true) => Outcome::pass(format!("Namespace {} exists", namespace)),
        Ok(false) => Outcome::fail(
            format!("Namespace {} not found", namespace),
            "Longhorn does not appear to be installed",
        ),
        Err(e) => cluster_error("look up the Longhorn namespace", &e),
    }
}

/// LH-002: Longhorn Pods Healthy
pub fn check_pods_healthy(ctx: &ProbeContext<'_>) -> Outcome {
    let namespace = &ctx.settings.longhorn.namespace;
    let pods = match ctx.cluster.list_pods(namespace) {
        Ok(pods) => pods,
        Err(e) => return cluster_error("list Longhorn pods", &e),
    };

    if pods.is_empty() {
        return Outcome::fail(
            format!("No pods in {}", namespace),
            "Longhorn components are not running",
        );
    }

    let unhealthy: Vec<String> = pods
        .iter()
        .filter(|p| !p.is_healthy())
        .map(|p| format!("{} ({}, {} restarts)", p.name, p.phase, p.restarts))
        .collect();

    if unhealthy.is_empty() {
        Outcome::pass(format!("{} pods running", pods.len()))
    } else {
        Outcome::fail(
            format!("{} of {} pods unhealthy", unhealthy.len(), pods.len()),
            join_names(&unhealthy),
        )
    }
}

/// LH-003: Longhorn Components
pub fn check_components(ctx: &ProbeContext<'_>) -> Outcome {
    let longhorn = &ctx.settings.longhorn;
    let pods = match ctx.cluster.list_pods(&longhorn.namespace) {
        Ok(pods) => pods,
        Err(e) => return cluster_error("list Longhorn pods", &e),
    };

    let missing: Vec<String> = longhorn
        .components
        .iter()
        .filter(|prefix| !pods.iter().any(|p| p.name.starts_with(prefix.as_str())))
        .cloned()
        .collect();

    if missing.is_empty() {
        Outcome::pass(format!("All {} components present", longhorn.components.len()))
    } else {
        Outcome::warn(
            format!("{} components without pods", missing.len()),
            format!("Missing: {}", join_names(&missing)),
        )
    }
}

/// LH-004: Longhorn CSI Driver
pub fn check_csi_driver(ctx: &ProbeContext<'_>) -> Outcome {
    let driver = &ctx.settings.longhorn.csi_driver;
    match ctx.cluster.csi_driver_exists(driver) {
        Ok(true) => Outcome::pass(format!("CSIDriver {} registered", driver)),
        Ok(false) => Outcome::fail(
            format!("CSIDriver {} not registered", driver),
            "The Longhorn driver deployer has not finished or failed",
        ),
        Err(e) => cluster_error("look up the CSI driver", &e),
    }
}

/// LH-005: Longhorn StorageClass
pub fn check_storage_class(ctx: &ProbeContext<'_>) -> Outcome {
    let wanted = &ctx.settings.longhorn.storage_class;
    let classes = match ctx.cluster.list_storage_classes() {
        Ok(classes) => classes,
        Err(e) => return cluster_error("list storage classes", &e),
    };

    let Some(class) = classes.iter().find(|c| &c.name == wanted) else {
        let names: Vec<String> = classes.iter().map(|c| c.name.clone()).collect();
        return Outcome::fail(
            format!("StorageClass {} not found", wanted),
            if names.is_empty() {
                "No storage classes exist".to_string()
            } else {
                format!("Available: {}", join_names(&names))
            },
        );
    };

    if class.is_default {
        Outcome::pass(format!("{} is the default class ({})", class.name, class.provisioner))
    } else {
        let default = classes
            .iter()
            .find(|c| c.is_default)
            .map(|c| format!("default is {}", c.name))
            .unwrap_or_else(|| "no default class is set".to_string());
        Outcome::warn(format!("{} exists but is not the default", class.name), default)
    }
}
