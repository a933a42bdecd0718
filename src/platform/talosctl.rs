//! `talosctl`-backed node administration.
//!
//! Only read-only Talos API calls are issued. `talosctl get -o json` emits a
//! stream of concatenated JSON documents (one per resource), not an array.

use crate::config::TalosSettings;
use crate::platform::exec::{self, ToolOutput};
use crate::platform::NodeAdmin;
use crate::ProbeError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Talosctl {
    binary: PathBuf,
    talosconfig: Option<PathBuf>,
    command_timeout: Duration,
}

impl Talosctl {
    pub fn locate(settings: &TalosSettings) -> Result<Self, ProbeError> {
        Ok(Talosctl {
            binary: exec::locate(&settings.binary)?,
            talosconfig: settings.talosconfig.clone(),
            command_timeout: Duration::from_secs(settings.command_timeout_secs),
        })
    }

    fn invoke(&self, node: &str, args: &[&str]) -> Result<ToolOutput, ProbeError> {
        let mut full = Vec::new();
        if let Some(ref talosconfig) = self.talosconfig {
            full.push(format!("--talosconfig={}", talosconfig.display()));
        }
        full.push(format!("--nodes={}", node));
        full.extend(args.iter().map(|a| a.to_string()));
        exec::run(&self.binary, &full, None, self.command_timeout)
    }

    fn run(&self, node: &str, args: &[&str]) -> Result<String, ProbeError> {
        let output = self.invoke(node, args)?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(ProbeError::Command {
                command: format!("talosctl --nodes={} {}", node, args.join(" ")),
                message: output.error_text(),
            })
        }
    }
}

impl NodeAdmin for Talosctl {
    fn list_extensions(&self, node: &str) -> Result<Vec<String>, ProbeError> {
        parse_extension_stream(&self.run(node, &["get", "extensions", "-o", "json"])?)
    }

    fn path_exists(&self, node: &str, path: &str) -> Result<bool, ProbeError> {
        let output = self.invoke(node, &["ls", path])?;
        if output.success {
            Ok(true)
        } else if output.error_text().to_lowercase().contains("no such file") {
            Ok(false)
        } else {
            Err(ProbeError::Command {
                command: format!("talosctl --nodes={} ls {}", node, path),
                message: output.error_text(),
            })
        }
    }

    fn read_file(&self, node: &str, path: &str) -> Result<String, ProbeError> {
        self.run(node, &["read", path])
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExtensionResource {
    spec: ExtensionSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExtensionSpec {
    metadata: ExtensionMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExtensionMetadata {
    name: String,
}

/// Extract extension names from `talosctl get extensions -o json` output
pub fn parse_extension_stream(output: &str) -> Result<Vec<String>, ProbeError> {
    serde_json::Deserializer::from_str(output)
        .into_iter::<ExtensionResource>()
        .map(|resource| {
            resource.map(|r| r.spec.metadata.name).map_err(|e| ProbeError::Parse {
                context: "talosctl extensions".to_string(),
                message: e.to_string(),
            })
        })
        .filter(|name| !matches!(name, Ok(n) if n.is_empty()))
        .collect()
}

/// Whether `/proc/modules` content lists the named kernel module
pub fn module_loaded(proc_modules: &str, module: &str) -> bool {
    proc_modules
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|name| name == module)
}
