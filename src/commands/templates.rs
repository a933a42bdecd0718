//! `templates` command: structural validation of Talos configuration templates.
//!
//! Every `*.yaml`/`*.yml` file under the directory becomes one check. A file
//! fails when a document does not parse or a patch reference (`@path` inside a
//! `patches` or `configPatches` list) points at a file that does not exist.
//! Indentation tabs and trailing whitespace only warn.

use crate::engine::result::ValidationReport;
use crate::{Check, CheckCategory, Outcome, ProbeError};
use serde::Deserialize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

const PATCH_KEYS: [&str; 2] = ["patches", "configPatches"];

/// Validate every template under `dir`
pub fn run(dir: &Path) -> Result<ValidationReport, ProbeError> {
    if !dir.is_dir() {
        return Err(ProbeError::Io {
            context: dir.display().to_string(),
            message: "not a directory".to_string(),
        });
    }

    let start = Instant::now();
    let files = find_templates(dir)?;
    if files.is_empty() {
        return Err(ProbeError::Io {
            context: dir.display().to_string(),
            message: "no YAML templates found".to_string(),
        });
    }

    let mut report = ValidationReport::new(format!("templates in {}", dir.display()));
    for (index, path) in files.iter().enumerate() {
        let check_start = Instant::now();
        let outcome = validate_file(path);
        let name = path.strip_prefix(dir).unwrap_or(path).display().to_string();
        tracing::info!(file = %name, status = outcome.status(), "template validated");

        report.checks.push(Check {
            id: format!("TPL-{:03}", index + 1),
            name,
            category: CheckCategory::Templates,
            description: "Parse the template and resolve its patch references".to_string(),
            outcome,
            duration_ms: check_start.elapsed().as_millis() as u64,
        });
    }
    report.total_duration_ms = start.elapsed().as_millis() as u64;

    Ok(report)
}

/// YAML files under `dir`, sorted by path
pub fn find_templates(dir: &Path) -> Result<Vec<PathBuf>, ProbeError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| ProbeError::Io {
            context: dir.display().to_string(),
            message: e.to_string(),
        })?;
        let is_yaml = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if entry.file_type().is_file() && is_yaml {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn validate_file(path: &Path) -> Outcome {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => return Outcome::fail("Cannot read file", e.to_string()),
    };

    let documents = match parse_documents(&text) {
        Ok(documents) => documents,
        Err(e) => return Outcome::fail("Invalid YAML", e),
    };

    let mut references = Vec::new();
    for document in &documents {
        collect_patch_references(document, &mut references);
    }

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let unresolved: Vec<&String> = references
        .iter()
        .filter(|r| !base.join(&r[1..]).is_file())
        .collect();
    if !unresolved.is_empty() {
        let list: Vec<&str> = unresolved.iter().map(|r| r.as_str()).collect();
        return Outcome::fail(
            format!("{} unresolved patch references", unresolved.len()),
            list.join(", "),
        );
    }

    let findings = lint(&text);
    if !findings.is_empty() {
        return Outcome::warn(format!("{} lint findings", findings.len()), findings.join("; "));
    }

    Outcome::pass(format!(
        "{} documents, {} patches resolved",
        documents.len(),
        references.len()
    ))
}

/// Parse every document in a multi-document stream
pub fn parse_documents(text: &str) -> Result<Vec<Value>, String> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document).map_err(|e| e.to_string())?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

/// `@`-prefixed string items of any `patches`/`configPatches` sequence, at any depth
pub fn collect_patch_references(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let is_patch_key = key.as_str().is_some_and(|k| PATCH_KEYS.contains(&k));
                if let (true, Value::Sequence(items)) = (is_patch_key, child) {
                    out.extend(
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .filter(|s| s.starts_with('@') && s.len() > 1)
                            .map(str::to_string),
                    );
                }
                collect_patch_references(child, out);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                collect_patch_references(item, out);
            }
        }
        Value::Tagged(tagged) => collect_patch_references(&tagged.value, out),
        _ => {}
    }
}

/// Line-level findings: tabs in indentation, trailing whitespace
pub fn lint(text: &str) -> Vec<String> {
    let mut findings = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
        if indent.contains('\t') {
            findings.push(format!("line {}: tab in indentation", number + 1));
        } else if line.ends_with([' ', '\t']) {
            findings.push(format!("line {}: trailing whitespace", number + 1));
        }
    }
    findings
}
