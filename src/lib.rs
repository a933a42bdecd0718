//! longhorn-probe library
//!
//! Smoke tests for Longhorn storage running on Talos Linux Kubernetes clusters.
//!
//! The library provides:
//! - A sequential verification runner with Pass/Warn/Fail outcomes
//! - A catalog of cluster, node, Longhorn and volume checks
//! - Collaborator seams over `kubectl` and `talosctl`
//! - Structural validation of Talos configuration templates
//!
//! # Example
//!
//! ```no_run
//! use longhorn_probe::config::ProbeSettings;
//! use longhorn_probe::{run_probe, ProbeConfig};
//!
//! let settings = ProbeSettings::default();
//! let report = run_probe(&ProbeConfig::default(), &settings).expect("cluster unreachable");
//! println!("Checks failed: {}", report.summary().failed);
//! ```

pub mod checks;
pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod logging;
pub mod platform;
pub mod version;

use config::ProbeSettings;
use engine::orchestrator::{create_all_checks, CheckOrchestrator, OrchestratorConfig, Selection};
use engine::result::ValidationReport;
use platform::kubectl::Kubectl;
use platform::talosctl::Talosctl;
use platform::NodeAdmin;
use serde::Serialize;
use std::fmt;

pub use checks::ProbeContext;
pub use engine::result::{ResultSummary, ValidationReport as Report};

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// Expected state confirmed
    Pass { message: String },
    /// Ambiguous or expected-but-unconfirmed state
    Warn { message: String, details: String },
    /// Expected state definitively not achieved
    Fail { message: String, details: String },
}

impl Outcome {
    pub fn pass(message: impl Into<String>) -> Self {
        Outcome::Pass {
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>, details: impl Into<String>) -> Self {
        Outcome::Warn {
            message: message.into(),
            details: details.into(),
        }
    }

    pub fn fail(message: impl Into<String>, details: impl Into<String>) -> Self {
        Outcome::Fail {
            message: message.into(),
            details: details.into(),
        }
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Outcome::Fail { .. })
    }

    pub fn is_warn(&self) -> bool {
        matches!(self, Outcome::Warn { .. })
    }

    /// Lowercase status label, as used in JSON output
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Pass { .. } => "pass",
            Outcome::Warn { .. } => "warn",
            Outcome::Fail { .. } => "fail",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Outcome::Pass { message }
            | Outcome::Warn { message, .. }
            | Outcome::Fail { message, .. } => message,
        }
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            Outcome::Pass { .. } => None,
            Outcome::Warn { details, .. } | Outcome::Fail { details, .. } => Some(details),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass { message } => write!(f, "PASS: {}", message),
            Outcome::Warn { message, details } => write!(f, "WARN: {} ({})", message, details),
            Outcome::Fail { message, details } => write!(f, "FAIL: {} ({})", message, details),
        }
    }
}

/// Check category for grouping related checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CheckCategory {
    /// Cluster API and node readiness
    Cluster,
    /// Talos node-level prerequisites (extensions, iSCSI)
    Node,
    /// Longhorn deployment health
    Longhorn,
    /// End-to-end volume provisioning (creates resources)
    Volume,
    /// Removal of resources created by volume checks
    Cleanup,
    /// Configuration template validation
    Templates,
}

impl CheckCategory {
    /// Display order used by the formatters
    pub const ALL: [CheckCategory; 6] = [
        CheckCategory::Cluster,
        CheckCategory::Node,
        CheckCategory::Longhorn,
        CheckCategory::Volume,
        CheckCategory::Cleanup,
        CheckCategory::Templates,
    ];
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckCategory::Cluster => write!(f, "Cluster"),
            CheckCategory::Node => write!(f, "Node"),
            CheckCategory::Longhorn => write!(f, "Longhorn"),
            CheckCategory::Volume => write!(f, "Volume"),
            CheckCategory::Cleanup => write!(f, "Cleanup"),
            CheckCategory::Templates => write!(f, "Templates"),
        }
    }
}

/// An executed check with its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    /// Unique identifier (e.g., "LH-002")
    pub id: String,
    /// Human-readable name
    pub name: String,
    pub category: CheckCategory,
    pub description: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
}

/// Error types for longhorn-probe operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProbeError {
    /// The cluster API could not be reached at all
    #[error("Cluster API unreachable: {message}")]
    ClusterUnreachable { message: String },

    #[error("Required tool '{tool}' not found: {message}")]
    ToolNotFound { tool: String, message: String },

    /// An external command exited unsuccessfully
    #[error("Command '{command}' failed: {message}")]
    Command { command: String, message: String },

    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error in {context}: {message}")]
    Io { context: String, message: String },
}

/// Which checks to run.
#[derive(Debug, Clone, Default)]
pub struct ProbeConfig {
    /// Categories to run (empty = all)
    pub categories: Vec<CheckCategory>,
    /// Specific checks to skip (by ID)
    pub skip_checks: Vec<String>,
    /// Specific checks to run (by ID)
    pub only_checks: Vec<String>,
}

impl ProbeConfig {
    /// Create configuration from `check` subcommand arguments
    pub fn from_args(args: &cli::args::CheckArgs) -> Self {
        ProbeConfig {
            categories: args.category.clone(),
            skip_checks: args.skip.clone(),
            only_checks: args.only.clone(),
        }
    }

    pub fn selection(&self) -> Selection {
        Selection {
            categories: self.categories.clone(),
            only: self.only_checks.clone(),
            skip: self.skip_checks.clone(),
        }
    }
}

/// Run the Longhorn verification checks against the configured cluster.
///
/// Fails with [`ProbeError`] only when the run cannot start at all: `kubectl`
/// is missing or the cluster API is unreachable. Every other problem is
/// reported as a check outcome inside the returned report.
pub fn run_probe(config: &ProbeConfig, settings: &ProbeSettings) -> Result<ValidationReport, ProbeError> {
    let kubectl =
        Kubectl::locate(&settings.kubectl)?.with_delete_timeout_ms(settings.timeouts.delete_timeout_ms);

    let talosctl = if settings.talos.enabled {
        match Talosctl::locate(&settings.talos) {
            Ok(talosctl) => Some(talosctl),
            Err(e) => {
                tracing::warn!(error = %e, "node administration unavailable, node checks will warn");
                None
            }
        }
    } else {
        tracing::info!("node administration disabled by configuration");
        None
    };

    let ctx = ProbeContext {
        cluster: &kubectl,
        nodes: talosctl.as_ref().map(|t| t as &dyn NodeAdmin),
        settings,
    };

    let mut orchestrator = CheckOrchestrator::new(OrchestratorConfig {
        check_timeout_ms: settings.timeouts.check_timeout_ms,
    });
    orchestrator.register_checks(create_all_checks());

    orchestrator.run(&ctx, &config.selection())
}
