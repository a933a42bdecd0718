//! `kubectl`-backed cluster API.
//!
//! All reads use `-o json` and are decoded into the small subset of the
//! Kubernetes object model the checks need. Missing objects are detected from
//! kubectl's `NotFound` error text rather than by listing.

use crate::config::KubectlSettings;
use crate::platform::exec::{self, ToolOutput};
use crate::platform::{ClusterApi, DeleteOutcome, NodeInfo, PodInfo, ResourceKind, StorageClassInfo};
use crate::ProbeError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";
const BETA_DEFAULT_CLASS_ANNOTATION: &str = "storageclass.beta.kubernetes.io/is-default-class";

/// Cluster API client that shells out to kubectl
#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: PathBuf,
    context: Option<String>,
    kubeconfig: Option<PathBuf>,
    request_timeout_secs: u64,
    /// Deadline for a single kubectl process
    command_timeout: Duration,
    delete_timeout_ms: u64,
}

impl Kubectl {
    /// Find kubectl on PATH and bind it to the configured context
    pub fn locate(settings: &KubectlSettings) -> Result<Self, ProbeError> {
        let binary = exec::locate(&settings.binary)?;
        Ok(Kubectl {
            binary,
            context: settings.context.clone(),
            kubeconfig: settings.kubeconfig.clone(),
            request_timeout_secs: settings.request_timeout_secs,
            command_timeout: Duration::from_millis(settings.command_timeout_ms()),
            delete_timeout_ms: 60_000,
        })
    }

    pub fn with_delete_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.delete_timeout_ms = timeout_ms;
        self
    }

    fn args(&self, args: &[&str]) -> Vec<String> {
        let mut full = vec![format!("--request-timeout={}s", self.request_timeout_secs)];
        if let Some(ref context) = self.context {
            full.push(format!("--context={}", context));
        }
        if let Some(ref kubeconfig) = self.kubeconfig {
            full.push(format!("--kubeconfig={}", kubeconfig.display()));
        }
        full.extend(args.iter().map(|a| a.to_string()));
        full
    }

    fn invoke(&self, args: &[&str], stdin: Option<&str>) -> Result<ToolOutput, ProbeError> {
        self.invoke_within(args, stdin, self.command_timeout)
    }

    fn invoke_within(
        &self,
        args: &[&str],
        stdin: Option<&str>,
        timeout: Duration,
    ) -> Result<ToolOutput, ProbeError> {
        exec::run(&self.binary, &self.args(args), stdin, timeout)
    }

    /// Run and require success; returns stdout
    fn run(&self, args: &[&str]) -> Result<String, ProbeError> {
        let output = self.invoke(args, None)?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(self.command_error(args, &output))
        }
    }

    /// Run a `get`; `None` when the object does not exist
    fn get_optional(&self, args: &[&str]) -> Result<Option<String>, ProbeError> {
        let output = self.invoke(args, None)?;
        if output.success {
            Ok(Some(output.stdout))
        } else if is_not_found(&output.stderr) {
            Ok(None)
        } else {
            Err(self.command_error(args, &output))
        }
    }

    fn command_error(&self, args: &[&str], output: &ToolOutput) -> ProbeError {
        ProbeError::Command {
            command: format!("kubectl {}", args.join(" ")),
            message: output.error_text(),
        }
    }
}

impl ClusterApi for Kubectl {
    fn ping(&self) -> Result<String, ProbeError> {
        let output = self.invoke(&["version", "-o", "json"], None)?;
        if !output.success {
            return Err(ProbeError::ClusterUnreachable {
                message: output.error_text(),
            });
        }
        parse_server_version(&output.stdout)
    }

    fn list_nodes(&self) -> Result<Vec<NodeInfo>, ProbeError> {
        parse_node_list(&self.run(&["get", "nodes", "-o", "json"])?)
    }

    fn list_pods(&self, namespace: &str) -> Result<Vec<PodInfo>, ProbeError> {
        parse_pod_list(&self.run(&["get", "pods", "-n", namespace, "-o", "json"])?)
    }

    fn namespace_exists(&self, namespace: &str) -> Result<bool, ProbeError> {
        Ok(self
            .get_optional(&["get", "namespace", namespace, "-o", "name"])?
            .is_some())
    }

    fn list_storage_classes(&self) -> Result<Vec<StorageClassInfo>, ProbeError> {
        parse_storage_class_list(&self.run(&["get", "storageclasses", "-o", "json"])?)
    }

    fn csi_driver_exists(&self, name: &str) -> Result<bool, ProbeError> {
        Ok(self
            .get_optional(&["get", "csidriver", name, "-o", "name"])?
            .is_some())
    }

    fn apply_manifest(&self, manifest: &str) -> Result<(), ProbeError> {
        let args = ["apply", "-f", "-"];
        let output = self.invoke(&args, Some(manifest))?;
        if output.success {
            Ok(())
        } else {
            Err(self.command_error(&args, &output))
        }
    }

    fn pvc_phase(&self, namespace: &str, name: &str) -> Result<Option<String>, ProbeError> {
        match self.get_optional(&["get", "pvc", name, "-n", namespace, "-o", "json"])? {
            Some(json) => parse_pvc_phase(&json).map(Some),
            None => Ok(None),
        }
    }

    fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<PodInfo>, ProbeError> {
        match self.get_optional(&["get", "pod", name, "-n", namespace, "-o", "json"])? {
            Some(json) => parse_pod(&json).map(Some),
            None => Ok(None),
        }
    }

    fn exec_in_pod(&self, namespace: &str, pod: &str, command: &[&str]) -> Result<String, ProbeError> {
        let mut args = vec!["exec", "-n", namespace, pod, "--"];
        args.extend_from_slice(command);
        self.run(&args)
    }

    fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<DeleteOutcome, ProbeError> {
        let kind = kind.to_string();
        let timeout = format!("--timeout={}s", (self.delete_timeout_ms / 1000).max(1));
        let args = ["delete", kind.as_str(), name, "-n", namespace, "--wait=true", timeout.as_str()];
        // --wait blocks past the request timeout until the object is gone
        let deadline = self.command_timeout + Duration::from_millis(self.delete_timeout_ms);
        let output = self.invoke_within(&args, None, deadline)?;
        if output.success {
            Ok(DeleteOutcome::Deleted)
        } else if is_not_found(&output.stderr) {
            Ok(DeleteOutcome::Absent)
        } else {
            Err(self.command_error(&args, &output))
        }
    }
}

/// kubectl reports missing objects as `Error from server (NotFound): ...`
pub fn is_not_found(stderr: &str) -> bool {
    stderr.contains("(NotFound)") || stderr.contains(" not found")
}

// Minimal Kubernetes object model

#[derive(Debug, Deserialize)]
struct List<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ObjectMeta {
    name: String,
    annotations: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Node {
    metadata: ObjectMeta,
    status: NodeStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NodeStatus {
    conditions: Vec<Condition>,
    addresses: Vec<NodeAddress>,
    node_info: NodeSystemInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Condition {
    #[serde(rename = "type")]
    kind: String,
    status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NodeAddress {
    #[serde(rename = "type")]
    kind: String,
    address: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NodeSystemInfo {
    os_image: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Pod {
    metadata: ObjectMeta,
    status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PodStatus {
    phase: String,
    container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ContainerStatus {
    ready: bool,
    restart_count: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StorageClass {
    metadata: ObjectMeta,
    provisioner: String,
    volume_binding_mode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Pvc {
    status: PvcStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PvcStatus {
    phase: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VersionInfo {
    server_version: Option<ServerVersion>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ServerVersion {
    git_version: String,
}

fn decode<'a, T: Deserialize<'a>>(json: &'a str, context: &str) -> Result<T, ProbeError> {
    serde_json::from_str(json).map_err(|e| ProbeError::Parse {
        context: context.to_string(),
        message: e.to_string(),
    })
}

impl From<Node> for NodeInfo {
    fn from(node: Node) -> Self {
        let ready = node
            .status
            .conditions
            .iter()
            .any(|c| c.kind == "Ready" && c.status == "True");
        let internal_ip = node
            .status
            .addresses
            .into_iter()
            .find(|a| a.kind == "InternalIP")
            .map(|a| a.address);
        NodeInfo {
            name: node.metadata.name,
            ready,
            internal_ip,
            os_image: node.status.node_info.os_image,
        }
    }
}

impl From<Pod> for PodInfo {
    fn from(pod: Pod) -> Self {
        let statuses = &pod.status.container_statuses;
        PodInfo {
            ready: !statuses.is_empty() && statuses.iter().all(|c| c.ready),
            restarts: statuses.iter().map(|c| c.restart_count).sum(),
            name: pod.metadata.name,
            phase: pod.status.phase,
        }
    }
}

impl From<StorageClass> for StorageClassInfo {
    fn from(sc: StorageClass) -> Self {
        let is_default = [DEFAULT_CLASS_ANNOTATION, BETA_DEFAULT_CLASS_ANNOTATION]
            .iter()
            .any(|key| sc.metadata.annotations.get(*key).map(|v| v == "true").unwrap_or(false));
        StorageClassInfo {
            name: sc.metadata.name,
            provisioner: sc.provisioner,
            is_default,
            binding_mode: sc.volume_binding_mode,
        }
    }
}

pub fn parse_server_version(json: &str) -> Result<String, ProbeError> {
    let info: VersionInfo = decode(json, "kubectl version")?;
    info.server_version
        .map(|v| v.git_version)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProbeError::ClusterUnreachable {
            message: "kubectl reported no server version".to_string(),
        })
}

pub fn parse_node_list(json: &str) -> Result<Vec<NodeInfo>, ProbeError> {
    let list: List<Node> = decode(json, "node list")?;
    Ok(list.items.into_iter().map(NodeInfo::from).collect())
}

pub fn parse_pod_list(json: &str) -> Result<Vec<PodInfo>, ProbeError> {
    let list: List<Pod> = decode(json, "pod list")?;
    Ok(list.items.into_iter().map(PodInfo::from).collect())
}

pub fn parse_pod(json: &str) -> Result<PodInfo, ProbeError> {
    let pod: Pod = decode(json, "pod")?;
    Ok(pod.into())
}

pub fn parse_storage_class_list(json: &str) -> Result<Vec<StorageClassInfo>, ProbeError> {
    let list: List<StorageClass> = decode(json, "storage class list")?;
    Ok(list.items.into_iter().map(StorageClassInfo::from).collect())
}

/// A claim with no status yet is reported as Pending
pub fn parse_pvc_phase(json: &str) -> Result<String, ProbeError> {
    let pvc: Pvc = decode(json, "persistent volume claim")?;
    Ok(pvc.status.phase.unwrap_or_else(|| "Pending".to_string()))
}
