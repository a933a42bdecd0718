//! Collaborator interfaces.
//!
//! Checks never talk to a cluster directly. They go through two seams:
//! - [`ClusterApi`]: the Kubernetes control plane (implemented by [`kubectl::Kubectl`])
//! - [`NodeAdmin`]: Talos node administration (implemented by [`talosctl::Talosctl`])
//!
//! Both are synchronous and treat the remote system as a black box. Errors
//! carry the tool's own stderr so checks can surface it verbatim.

pub mod exec;
pub mod kubectl;
pub mod talosctl;

use crate::ProbeError;
use std::fmt;

/// A cluster node as seen by the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub ready: bool,
    pub internal_ip: Option<String>,
    pub os_image: String,
}

/// Pod state summarised for health classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodInfo {
    pub name: String,
    pub phase: String,
    /// Every container reports ready
    pub ready: bool,
    pub restarts: u32,
}

impl PodInfo {
    /// Running with all containers ready, or ran to completion
    pub fn is_healthy(&self) -> bool {
        (self.phase == "Running" && self.ready) || self.phase == "Succeeded"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageClassInfo {
    pub name: String,
    pub provisioner: String,
    pub is_default: bool,
    pub binding_mode: Option<String>,
}

/// Kinds of resources the probe creates and removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Pod,
    PersistentVolumeClaim,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Pod => write!(f, "pod"),
            ResourceKind::PersistentVolumeClaim => write!(f, "pvc"),
        }
    }
}

/// Result of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing to delete
    Absent,
}

/// Kubernetes control plane operations used by the checks.
pub trait ClusterApi {
    /// Confirm the API server answers; returns its version string
    fn ping(&self) -> Result<String, ProbeError>;

    fn list_nodes(&self) -> Result<Vec<NodeInfo>, ProbeError>;

    fn list_pods(&self, namespace: &str) -> Result<Vec<PodInfo>, ProbeError>;

    fn namespace_exists(&self, namespace: &str) -> Result<bool, ProbeError>;

    fn list_storage_classes(&self) -> Result<Vec<StorageClassInfo>, ProbeError>;

    fn csi_driver_exists(&self, name: &str) -> Result<bool, ProbeError>;

    /// Create or update resources from a manifest (JSON or YAML)
    fn apply_manifest(&self, manifest: &str) -> Result<(), ProbeError>;

    /// Phase of a claim, or `None` if it does not exist
    fn pvc_phase(&self, namespace: &str, name: &str) -> Result<Option<String>, ProbeError>;

    fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<PodInfo>, ProbeError>;

    /// Run a command inside a pod's first container and return its stdout
    fn exec_in_pod(&self, namespace: &str, pod: &str, command: &[&str]) -> Result<String, ProbeError>;

    fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<DeleteOutcome, ProbeError>;
}

/// Read-only Talos node queries. Nodes are addressed by IP or hostname.
pub trait NodeAdmin {
    /// Names of installed system extensions
    fn list_extensions(&self, node: &str) -> Result<Vec<String>, ProbeError>;

    fn path_exists(&self, node: &str, path: &str) -> Result<bool, ProbeError>;

    fn read_file(&self, node: &str, path: &str) -> Result<String, ProbeError>;
}
