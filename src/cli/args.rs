//! Command line arguments.
//!
//! `check` is the default command, so `longhorn-probe --only LH-002` and
//! `longhorn-probe check --only LH-002` are equivalent. Check options given
//! before an explicit subcommand are rejected rather than silently dropped.

use crate::config::ProbeSettings;
use crate::CheckCategory;
use clap::error::ErrorKind;
use clap::{Args as ClapArgs, CommandFactory, Parser, Subcommand, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
    /// JUnit XML for CI/CD integration
    Junit,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "longhorn-probe",
    version,
    about = "Smoke tests for Longhorn storage on Talos Kubernetes clusters"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Arguments for the default `check` command
    #[command(flatten)]
    pub check: CheckArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t, global = true, env = "LONGHORN_PROBE_FORMAT")]
    pub format: OutputFormat,

    /// Only output failures and warnings
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Include details and durations; repeat to raise log level (-vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output (also honours NO_COLOR)
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Load settings from a TOML file
    #[arg(long, global = true, env = "LONGHORN_PROBE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run verification checks against the cluster (default)
    Check(CheckArgs),
    /// List all available checks
    List,
    /// Validate Talos configuration templates and their patch references
    Templates(TemplatesArgs),
    /// Print version and build information
    Version,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, ClapArgs)]
pub struct CheckArgs {
    /// Run only checks in this category (repeatable)
    #[arg(long, value_enum)]
    pub category: Vec<CheckCategory>,

    /// Run only this check ID (repeatable)
    #[arg(long, value_name = "ID")]
    pub only: Vec<String>,

    /// Skip this check ID (repeatable)
    #[arg(long, value_name = "ID")]
    pub skip: Vec<String>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Path to the kubeconfig file
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Path to the talosconfig file
    #[arg(long)]
    pub talosconfig: Option<PathBuf>,

    /// Do not query nodes with talosctl; node checks warn
    #[arg(long)]
    pub no_talos: bool,

    /// Longhorn storage class to test
    #[arg(long)]
    pub storage_class: Option<String>,

    /// Namespace for the test claim and pod
    #[arg(long, value_name = "NAMESPACE")]
    pub test_namespace: Option<String>,

    /// How long to wait for the test claim to bind, in milliseconds
    #[arg(long, value_name = "MS")]
    pub bind_timeout: Option<u64>,

    /// How long to wait for the test pod to run, in milliseconds
    #[arg(long, value_name = "MS")]
    pub pod_timeout: Option<u64>,

    /// Wall-clock budget per check, in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct TemplatesArgs {
    /// Directory containing the YAML templates
    pub dir: PathBuf,
}

impl Args {
    /// Parse the process arguments, exiting with a usage error on bad input
    pub fn parse_checked() -> Self {
        Self::parse().reject_misplaced_check_args().unwrap_or_else(|e| e.exit())
    }

    pub fn try_parse_checked_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args)?.reject_misplaced_check_args()
    }

    /// `longhorn-probe --skip VOL-004 check` would otherwise run with no skip
    fn reject_misplaced_check_args(self) -> Result<Self, clap::Error> {
        if self.command.is_some() && self.check != CheckArgs::default() {
            let mut cmd = <Self as CommandFactory>::command();
            return Err(cmd.error(
                ErrorKind::ArgumentConflict,
                "check options must come after the subcommand, e.g. `longhorn-probe check --skip VOL-004`",
            ));
        }
        Ok(self)
    }

    /// The command to run, with `check` as the default
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Check(self.check.clone()))
    }

    /// Whether colour escape codes should be emitted
    pub fn color_enabled(&self) -> bool {
        !self.no_color && std::env::var_os("NO_COLOR").is_none()
    }
}

impl CheckArgs {
    /// Overlay command line values onto loaded settings
    pub fn apply_to(&self, settings: &mut ProbeSettings) {
        if let Some(ref context) = self.context {
            settings.kubectl.context = Some(context.clone());
        }
        if let Some(ref kubeconfig) = self.kubeconfig {
            settings.kubectl.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(ref talosconfig) = self.talosconfig {
            settings.talos.talosconfig = Some(talosconfig.clone());
        }
        if self.no_talos {
            settings.talos.enabled = false;
        }
        if let Some(ref class) = self.storage_class {
            settings.longhorn.storage_class = class.clone();
        }
        if let Some(ref namespace) = self.test_namespace {
            settings.volume.namespace = namespace.clone();
        }
        if let Some(ms) = self.bind_timeout {
            settings.timeouts.bind_timeout_ms = ms;
        }
        if let Some(ms) = self.pod_timeout {
            settings.timeouts.pod_timeout_ms = ms;
        }
        if let Some(ms) = self.timeout {
            settings.timeouts.check_timeout_ms = ms;
        }
    }
}
