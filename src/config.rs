//! Probe settings.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! command line overrides (applied by `cli::args::CheckArgs::apply_to`).
//!
//! ```toml
//! [kubectl]
//! context = "admin@homelab"
//!
//! [longhorn]
//! storage_class = "longhorn"
//!
//! [timeouts]
//! bind_timeout_ms = 60000
//! ```

use crate::ProbeError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// All settings for a probe run
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeSettings {
    pub kubectl: KubectlSettings,
    pub talos: TalosSettings,
    pub longhorn: LonghornSettings,
    pub volume: VolumeSettings,
    pub timeouts: TimeoutSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct KubectlSettings {
    /// Binary name or path, resolved against PATH
    pub binary: String,
    pub context: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    /// Passed to kubectl as --request-timeout
    pub request_timeout_secs: u64,
}

/// Extra time a kubectl process gets beyond its own request timeout before it
/// is killed, so kubectl can report the timeout itself.
pub const COMMAND_GRACE_SECS: u64 = 5;

impl KubectlSettings {
    /// Deadline for a single kubectl process
    pub fn command_timeout_ms(&self) -> u64 {
        self.request_timeout_secs
            .saturating_add(COMMAND_GRACE_SECS)
            .saturating_mul(1000)
    }
}

impl Default for KubectlSettings {
    fn default() -> Self {
        KubectlSettings {
            binary: "kubectl".to_string(),
            context: None,
            kubeconfig: None,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TalosSettings {
    /// When false, node-level checks warn without calling talosctl
    pub enabled: bool,
    pub binary: String,
    pub talosconfig: Option<PathBuf>,
    /// Extensions every node must carry for Longhorn
    pub required_extensions: Vec<String>,
    pub iscsiadm_path: String,
    pub iscsi_module: String,
    /// Deadline for a single talosctl process
    pub command_timeout_secs: u64,
}

impl Default for TalosSettings {
    fn default() -> Self {
        TalosSettings {
            enabled: true,
            binary: "talosctl".to_string(),
            talosconfig: None,
            required_extensions: vec![
                "iscsi-tools".to_string(),
                "util-linux-tools".to_string(),
            ],
            iscsiadm_path: "/usr/local/sbin/iscsiadm".to_string(),
            iscsi_module: "iscsi_tcp".to_string(),
            command_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LonghornSettings {
    pub namespace: String,
    pub storage_class: String,
    pub csi_driver: String,
    /// Pod name prefixes that must each match at least one pod
    pub components: Vec<String>,
}

impl Default for LonghornSettings {
    fn default() -> Self {
        LonghornSettings {
            namespace: "longhorn-system".to_string(),
            storage_class: "longhorn".to_string(),
            csi_driver: "driver.longhorn.io".to_string(),
            components: vec![
                "longhorn-manager".to_string(),
                "longhorn-driver-deployer".to_string(),
                "longhorn-ui".to_string(),
                "csi-attacher".to_string(),
                "csi-provisioner".to_string(),
                "longhorn-csi-plugin".to_string(),
                "engine-image".to_string(),
                "instance-manager".to_string(),
            ],
        }
    }
}

/// Names and shape of the throwaway resources created by volume checks
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct VolumeSettings {
    pub namespace: String,
    pub pvc_name: String,
    pub pod_name: String,
    pub image: String,
    pub size: String,
    pub mount_path: String,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        VolumeSettings {
            namespace: "default".to_string(),
            pvc_name: "longhorn-probe-pvc".to_string(),
            pod_name: "longhorn-probe-pod".to_string(),
            image: "busybox:1.36".to_string(),
            size: "1Gi".to_string(),
            mount_path: "/data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutSettings {
    pub bind_timeout_ms: u64,
    pub pod_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Wall-clock budget for any single check
    pub check_timeout_ms: u64,
    /// Passed to kubectl delete --timeout
    pub delete_timeout_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        TimeoutSettings {
            bind_timeout_ms: 120_000,
            pod_timeout_ms: 180_000,
            poll_interval_ms: 5_000,
            check_timeout_ms: 300_000,
            delete_timeout_ms: 60_000,
        }
    }
}

impl ProbeSettings {
    /// Load settings from a TOML file, or return defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ProbeError> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| ProbeError::Io {
                    context: format!("reading {}", path.display()),
                    message: e.to_string(),
                })?;
                Self::from_toml(&content)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ProbeError> {
        let settings: ProbeSettings = toml::from_str(content).map_err(|e| ProbeError::Config {
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would make polling or waiting meaningless
    pub fn validate(&self) -> Result<(), ProbeError> {
        let timeouts = &self.timeouts;
        if timeouts.poll_interval_ms == 0 {
            return Err(ProbeError::Config {
                message: "timeouts.poll_interval_ms must be greater than zero".to_string(),
            });
        }
        if self.kubectl.request_timeout_secs == 0 || self.talos.command_timeout_secs == 0 {
            return Err(ProbeError::Config {
                message: "kubectl.request_timeout_secs and talos.command_timeout_secs must be greater than zero"
                    .to_string(),
            });
        }
        // A wait can overrun its timeout by the cluster query in flight, and
        // VOL-003 applies a manifest before it starts waiting.
        let headroom = self
            .kubectl
            .command_timeout_ms()
            .saturating_mul(2)
            .saturating_add(timeouts.poll_interval_ms);
        let longest_wait = timeouts.bind_timeout_ms.max(timeouts.pod_timeout_ms);
        if timeouts.check_timeout_ms <= longest_wait.saturating_add(headroom) {
            return Err(ProbeError::Config {
                message: format!(
                    "timeouts.check_timeout_ms ({}) must exceed the longest wait ({}) by more than {}ms \
                     (two kubectl command deadlines plus one poll interval)",
                    timeouts.check_timeout_ms, longest_wait, headroom
                ),
            });
        }
        if self.volume.pvc_name.is_empty() || self.volume.pod_name.is_empty() {
            return Err(ProbeError::Config {
                message: "volume.pvc_name and volume.pod_name must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
