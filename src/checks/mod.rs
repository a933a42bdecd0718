//! Verification checks.
//!
//! Checks are grouped by what they look at:
//! - `cluster`: API reachability, node readiness, node OS
//! - `node`: Talos node prerequisites via node administration
//! - `longhorn`: Longhorn deployment health
//! - `volume`: end-to-end provisioning (creates resources)
//! - `cleanup`: teardown of what `volume` created
//!
//! # Classification
//!
//! Checks never panic and never return errors. They classify:
//! - Cluster API errors: Fail, with the collaborator's error text as details
//! - Node administration missing or erroring: Warn (it is optional)
//! - Waits that time out: Warn or Fail depending on the check
//!
//! No check decides whether another check runs.

pub mod cleanup;
pub mod cluster;
pub mod longhorn;
pub mod node;
pub mod volume;

use crate::config::ProbeSettings;
use crate::engine::poll::PollPolicy;
use crate::platform::{ClusterApi, NodeAdmin};
use crate::{Outcome, ProbeError};

/// Everything a check may use
pub struct ProbeContext<'a> {
    pub cluster: &'a dyn ClusterApi,
    /// `None` when talosctl is unavailable or disabled
    pub nodes: Option<&'a dyn NodeAdmin>,
    pub settings: &'a ProbeSettings,
}

impl<'a> ProbeContext<'a> {
    /// Human-readable name of the probed cluster
    pub fn subject(&self) -> String {
        match self.settings.kubectl.context {
            Some(ref context) => format!("context {}", context),
            None => "current kube context".to_string(),
        }
    }

    pub fn poll_policy(&self, timeout_ms: u64) -> PollPolicy {
        PollPolicy::from_millis(timeout_ms, self.settings.timeouts.poll_interval_ms)
    }
}

/// Fail outcome for a cluster API call that errored
pub(crate) fn cluster_error(action: &str, error: &ProbeError) -> Outcome {
    Outcome::fail(format!("Failed to {}", action), error.to_string())
}

/// Join names for messages, truncating long lists
pub(crate) fn join_names(names: &[String]) -> String {
    const MAX: usize = 5;
    if names.len() <= MAX {
        names.join(", ")
    } else {
        format!("{} and {} more", names[..MAX].join(", "), names.len() - MAX)
    }
}
