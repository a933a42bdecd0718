//! Output formatting for longhorn-probe.
//!
//! Provides terminal, JSON, and JUnit XML output formatters.
//!
//! All formatters produce valid output for any ValidationReport input,
//! including an empty one. No function in this module panics.

use crate::cli::args::OutputFormat;
use crate::engine::result::{ResultSummary, ValidationReport};
use crate::{Check, CheckCategory, Outcome};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const RULE: &str = "--------------------------------------------------------------------------------";

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format a validation report into a string
    fn format(&self, report: &ValidationReport) -> String;
}

/// Terminal (human-readable) formatter
pub struct TerminalFormatter {
    color: bool,
    verbose: bool,
    quiet: bool,
}

impl TerminalFormatter {
    pub fn new(color: bool, verbose: bool, quiet: bool) -> Self {
        TerminalFormatter {
            color,
            verbose,
            quiet,
        }
    }

    fn colorize(&self, text: &str, color_code: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", color_code, text)
        } else {
            text.to_string()
        }
    }

    fn status_label(&self, outcome: &Outcome) -> String {
        match outcome {
            Outcome::Pass { .. } => self.colorize("[PASS]", "32"),
            Outcome::Warn { .. } => self.colorize("[WARN]", "33"),
            Outcome::Fail { .. } => self.colorize("[FAIL]", "31"),
        }
    }

    fn check_line(&self, check: &Check) -> String {
        let mut line = format!(
            "  {} {}: {} ({})",
            self.status_label(&check.outcome),
            check.id,
            check.name,
            check.outcome.message()
        );
        if self.verbose {
            line.push_str(&self.colorize(&format!(" [{}ms]", check.duration_ms), "90"));
            if let Some(details) = check.outcome.details() {
                line.push_str(&format!("\n         {}", details));
            }
        }
        line
    }
}

impl OutputFormatter for TerminalFormatter {
    fn format(&self, report: &ValidationReport) -> String {
        let mut output = String::new();

        output.push_str(RULE);
        output.push('\n');
        output.push_str("longhorn-probe report\n");
        output.push_str(&format!("Target: {}\n", report.subject));
        if let Some(ref version) = report.server_version {
            output.push_str(&format!("Server: {}\n", version));
        }
        output.push_str(&format!("Timestamp: {}\n", format_timestamp(report.timestamp)));
        output.push_str(RULE);
        output.push_str("\n\n");

        for category in CheckCategory::ALL {
            let checks = report.by_category(category);
            if checks.is_empty() {
                continue;
            }

            let shown: Vec<&Check> = checks
                .into_iter()
                .filter(|c| !self.quiet || !matches!(c.outcome, Outcome::Pass { .. }))
                .collect();
            if shown.is_empty() {
                continue;
            }

            output.push_str(&format!("{} CHECKS\n", category.to_string().to_uppercase()));
            for check in shown {
                output.push_str(&self.check_line(check));
                output.push('\n');
            }
            output.push('\n');
        }

        let summary = report.summary();
        output.push_str(RULE);
        output.push('\n');
        output.push_str(&format!(
            "SUMMARY: {} passed, {} warnings, {} failed\n",
            summary.passed, summary.warned, summary.failed
        ));
        output.push_str(&format!(
            "Total time: {:.1}s\n",
            report.total_duration_ms as f64 / 1000.0
        ));

        let exit_desc = if summary.failed > 0 {
            "failures detected"
        } else if summary.warned > 0 {
            "passed with warnings"
        } else {
            "all checks passed"
        };
        output.push_str(&format!("Exit code: {} ({})\n", summary.exit_code(), exit_desc));
        output.push_str(RULE);

        output
    }
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    #[serde(flatten)]
    report: &'a ValidationReport,
    summary: ResultSummary,
    exit_code: u8,
}

/// JSON formatter
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        JsonFormatter { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &ValidationReport) -> String {
        let summary = report.summary();
        let document = JsonDocument {
            report,
            exit_code: summary.exit_code(),
            summary,
        };
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&document)
        } else {
            serde_json::to_string(&document)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

/// JUnit XML formatter
pub struct JunitFormatter;

impl JunitFormatter {
    pub fn new() -> Self {
        JunitFormatter
    }

    fn escape_xml(s: &str) -> String {
        let mut result = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '&' => result.push_str("&amp;"),
                '<' => result.push_str("&lt;"),
                '>' => result.push_str("&gt;"),
                '"' => result.push_str("&quot;"),
                '\'' => result.push_str("&apos;"),
                c => result.push(c),
            }
        }
        result
    }
}

impl Default for JunitFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for JunitFormatter {
    fn format(&self, report: &ValidationReport) -> String {
        let mut output = String::new();
        output.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

        let summary = report.summary();
        output.push_str(&format!(
            "<testsuites name=\"longhorn-probe\" tests=\"{}\" failures=\"{}\" errors=\"0\" time=\"{:.3}\">\n",
            summary.total,
            summary.failed,
            report.total_duration_ms as f64 / 1000.0
        ));

        for category in CheckCategory::ALL {
            let checks = report.by_category(category);
            if checks.is_empty() {
                continue;
            }

            let suite_name = category.to_string().to_lowercase();
            let suite_failures = checks.iter().filter(|c| c.outcome.is_fail()).count();
            let suite_time: u64 = checks.iter().map(|c| c.duration_ms).sum();

            output.push_str(&format!(
                "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"0\" time=\"{:.3}\">\n",
                suite_name,
                checks.len(),
                suite_failures,
                suite_time as f64 / 1000.0
            ));

            for check in checks {
                output.push_str(&format!(
                    "    <testcase name=\"{}: {}\" classname=\"longhorn-probe.{}\" time=\"{:.3}\">\n",
                    Self::escape_xml(&check.id),
                    Self::escape_xml(&check.name),
                    suite_name,
                    check.duration_ms as f64 / 1000.0
                ));

                match &check.outcome {
                    Outcome::Pass { message } => {
                        output.push_str(&format!(
                            "      <system-out>{}</system-out>\n",
                            Self::escape_xml(message)
                        ));
                    }
                    Outcome::Warn { message, details } => {
                        output.push_str(&format!(
                            "      <system-out>WARNING: {} - {}</system-out>\n",
                            Self::escape_xml(message),
                            Self::escape_xml(details)
                        ));
                    }
                    Outcome::Fail { message, details } => {
                        output.push_str(&format!(
                            "      <failure message=\"{}\">{}</failure>\n",
                            Self::escape_xml(message),
                            Self::escape_xml(details)
                        ));
                    }
                }
                output.push_str("    </testcase>\n");
            }

            output.push_str("  </testsuite>\n");
        }

        output.push_str("</testsuites>");
        output
    }
}

/// Get a formatter based on the output format
pub fn get_formatter(
    format: OutputFormat,
    color: bool,
    verbose: bool,
    quiet: bool,
) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(TerminalFormatter::new(color, verbose, quiet)),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Junit => Box::new(JunitFormatter::new()),
    }
}

/// Format a Unix timestamp as RFC 3339, falling back to the raw seconds
fn format_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| timestamp.to_string())
}
