//! Check execution orchestrator.
//!
//! Runs registered checks strictly in registration order, one at a time.
//!
//! # Run contract
//!
//! - Preflight: the cluster API is pinged first. If it is unreachable the run
//!   ends with `ProbeError::ClusterUnreachable` and no check executes.
//! - Every selected check yields exactly one outcome. Warn and Fail never stop
//!   the run.
//! - Teardown checks run last and always, whatever the selection.
//! - Check panics: caught via `std::panic::catch_unwind`, recorded as Fail.
//! - Check overrun: a check that outlives the per-check timeout is recorded
//!   as Fail whatever it returned.

use crate::checks::{cleanup, cluster, longhorn, node, volume, ProbeContext};
use crate::engine::result::{ResultAggregator, ValidationReport};
use crate::{Check, CheckCategory, Outcome, ProbeError};
use std::time::Instant;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wall-clock budget for any single check
    pub check_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            check_timeout_ms: 300_000,
        }
    }
}

/// When a check runs relative to the others
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckPhase {
    Main,
    /// Runs after all main checks, unconditionally
    Teardown,
}

pub type CheckFn = Box<dyn Fn(&ProbeContext<'_>) -> Outcome>;

/// A registered check with its execution function
pub struct RegisteredCheck {
    pub id: String,
    pub name: String,
    pub category: CheckCategory,
    pub description: String,
    pub phase: CheckPhase,
    pub check_fn: CheckFn,
}

impl RegisteredCheck {
    pub fn new<F>(id: &str, name: &str, category: CheckCategory, description: &str, check_fn: F) -> Self
    where
        F: Fn(&ProbeContext<'_>) -> Outcome + 'static,
    {
        RegisteredCheck {
            id: id.to_string(),
            name: name.to_string(),
            category,
            description: description.to_string(),
            phase: CheckPhase::Main,
            check_fn: Box::new(check_fn),
        }
    }

    /// Mark as a teardown check
    pub fn teardown(mut self) -> Self {
        self.phase = CheckPhase::Teardown;
        self
    }
}

/// Which main-phase checks to run. Empty filters select everything.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub categories: Vec<CheckCategory>,
    pub only: Vec<String>,
    pub skip: Vec<String>,
}

impl Selection {
    fn includes(&self, check: &RegisteredCheck) -> bool {
        if !self.only.is_empty() && !self.only.contains(&check.id) {
            return false;
        }
        if self.skip.contains(&check.id) {
            return false;
        }
        self.categories.is_empty() || self.categories.contains(&check.category)
    }
}

/// Check orchestrator
pub struct CheckOrchestrator {
    config: OrchestratorConfig,
    checks: Vec<RegisteredCheck>,
}

impl CheckOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        CheckOrchestrator {
            config,
            checks: Vec::new(),
        }
    }

    /// Register checks for execution
    pub fn register_checks(&mut self, checks: Vec<RegisteredCheck>) {
        self.checks.extend(checks);
    }

    pub fn register_check(&mut self, check: RegisteredCheck) {
        self.checks.push(check);
    }

    /// Preflight, then main checks in order, then teardown checks
    pub fn run(&self, ctx: &ProbeContext<'_>, selection: &Selection) -> Result<ValidationReport, ProbeError> {
        let start = Instant::now();

        let server_version = ctx.cluster.ping().map_err(|e| match e {
            ProbeError::ClusterUnreachable { .. } => e,
            other => ProbeError::ClusterUnreachable {
                message: other.to_string(),
            },
        })?;
        tracing::info!(server_version = %server_version, "cluster API reachable");

        let mut aggregator = ResultAggregator::new();

        let main = self
            .checks
            .iter()
            .filter(|c| c.phase == CheckPhase::Main && selection.includes(c));
        let teardown = self.checks.iter().filter(|c| c.phase == CheckPhase::Teardown);

        for check in main.chain(teardown) {
            aggregator.add_result(self.execute_check(check, ctx));
        }

        Ok(aggregator.into_report(
            ctx.subject(),
            Some(server_version),
            start.elapsed().as_millis() as u64,
        ))
    }

    /// Execute a single check with panic and timeout handling
    fn execute_check(&self, check: &RegisteredCheck, ctx: &ProbeContext<'_>) -> Check {
        tracing::info!(check = %check.id, name = %check.name, "running check");
        let start = Instant::now();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (check.check_fn)(ctx)));
        let duration_ms = start.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(_) if duration_ms > self.config.check_timeout_ms => Outcome::fail(
                format!("Check timed out after {}ms", duration_ms),
                format!("Exceeded the per-check timeout of {}ms", self.config.check_timeout_ms),
            ),
            Ok(outcome) => outcome,
            Err(_) => Outcome::fail(
                "Check panicked during execution",
                "An unexpected error occurred",
            ),
        };

        match &outcome {
            Outcome::Fail { message, .. } => {
                tracing::warn!(check = %check.id, duration_ms, message = %message, "check failed")
            }
            other => tracing::info!(check = %check.id, duration_ms, status = other.status(), "check finished"),
        }

        Check {
            id: check.id.clone(),
            name: check.name.clone(),
            category: check.category,
            description: check.description.clone(),
            outcome,
            duration_ms,
        }
    }
}

/// Create all registered checks, in execution order
pub fn create_all_checks() -> Vec<RegisteredCheck> {
    use crate::CheckCategory::*;

    vec![
        RegisteredCheck::new(
            "CLU-001",
            "Cluster API Reachable",
            Cluster,
            "Confirm the Kubernetes API server answers and report its version",
            cluster::check_api_reachable,
        ),
        RegisteredCheck::new(
            "CLU-002",
            "Nodes Ready",
            Cluster,
            "Verify every node reports the Ready condition",
            cluster::check_nodes_ready,
        ),
        RegisteredCheck::new(
            "CLU-003",
            "Talos Node OS",
            Cluster,
            "Verify nodes run Talos Linux",
            cluster::check_talos_os,
        ),
        RegisteredCheck::new(
            "TAL-001",
            "Talos System Extensions",
            Node,
            "Verify the system extensions Longhorn needs are installed on every node",
            node::check_extensions,
        ),
        RegisteredCheck::new(
            "TAL-002",
            "iSCSI Tooling Present",
            Node,
            "Verify iscsiadm is available on every node",
            node::check_iscsiadm,
        ),
        RegisteredCheck::new(
            "TAL-003",
            "iSCSI Kernel Module",
            Node,
            "Check whether the iSCSI transport module is loaded",
            node::check_iscsi_module,
        ),
        RegisteredCheck::new(
            "LH-001",
            "Longhorn Namespace",
            Longhorn,
            "Verify the Longhorn namespace exists",
            longhorn::check_namespace,
        ),
        RegisteredCheck::new(
            "LH-002",
            "Longhorn Pods Healthy",
            Longhorn,
            "Verify all Longhorn pods are running and ready",
            longhorn::check_pods_healthy,
        ),
        RegisteredCheck::new(
            "LH-003",
            "Longhorn Components",
            Longhorn,
            "Verify each expected Longhorn component has a pod",
            longhorn::check_components,
        ),
        RegisteredCheck::new(
            "LH-004",
            "Longhorn CSI Driver",
            Longhorn,
            "Verify the Longhorn CSI driver is registered",
            longhorn::check_csi_driver,
        ),
        RegisteredCheck::new(
            "LH-005",
            "Longhorn StorageClass",
            Longhorn,
            "Verify the Longhorn storage class exists and is the default",
            longhorn::check_storage_class,
        ),
        RegisteredCheck::new(
            "VOL-001",
            "Create Test Volume Claim",
            Volume,
            "Create a persistent volume claim on the Longhorn storage class",
            volume::create_test_claim,
        ),
        RegisteredCheck::new(
            "VOL-002",
            "Volume Claim Binding",
            Volume,
            "Wait for the test claim to bind",
            volume::wait_for_binding,
        ),
        RegisteredCheck::new(
            "VOL-003",
            "Test Pod Running",
            Volume,
            "Start a pod mounting the test claim and wait for it to run",
            volume::start_test_pod,
        ),
        RegisteredCheck::new(
            "VOL-004",
            "Volume Read/Write",
            Volume,
            "Write to the mounted volume and read the data back",
            volume::read_write_roundtrip,
        ),
        RegisteredCheck::new(
            "CLN-001",
            "Cleanup Test Resources",
            Cleanup,
            "Delete the test pod and claim; absent resources count as cleaned",
            cleanup::remove_test_resources,
        )
        .teardown(),
    ]
}
