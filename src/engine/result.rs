//! Result aggregation and reporting.
//!
//! The aggregator is written only by the orchestrator; once a run completes it
//! is frozen into a [`ValidationReport`] which decides the exit status.

use crate::{Check, CheckCategory, Outcome};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// Result summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub passed: u32,
    pub warned: u32,
    pub failed: u32,
    pub total: u32,
    pub total_duration_ms: u64,
}

impl ResultSummary {
    /// 0 when nothing failed, 1 otherwise. Warnings never fail a run.
    pub fn exit_code(&self) -> u8 {
        if self.failed > 0 {
            1
        } else {
            0
        }
    }
}

/// Report of one run, in execution order
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Seconds since the Unix epoch at report creation
    pub timestamp: u64,
    /// What was probed: a kube context or a template directory
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    pub checks: Vec<Check>,
    pub total_duration_ms: u64,
}

impl ValidationReport {
    /// Create a new empty report
    pub fn new(subject: impl Into<String>) -> Self {
        ValidationReport {
            timestamp: unix_timestamp(),
            subject: subject.into(),
            server_version: None,
            checks: Vec::new(),
            total_duration_ms: 0,
        }
    }

    /// Calculate summary statistics
    pub fn summary(&self) -> ResultSummary {
        let mut summary = ResultSummary::default();

        for check in &self.checks {
            summary.total += 1;
            summary.total_duration_ms += check.duration_ms;

            match check.outcome {
                Outcome::Pass { .. } => summary.passed += 1,
                Outcome::Warn { .. } => summary.warned += 1,
                Outcome::Fail { .. } => summary.failed += 1,
            }
        }

        summary
    }

    /// Outcome recorded for a check id
    pub fn outcome(&self, id: &str) -> Option<&Outcome> {
        self.checks.iter().find(|c| c.id == id).map(|c| &c.outcome)
    }

    pub fn exit_code(&self) -> u8 {
        self.summary().exit_code()
    }

    pub fn by_category(&self, category: CheckCategory) -> Vec<&Check> {
        self.checks.iter().filter(|c| c.category == category).collect()
    }
}

/// Collects check results during a run
#[derive(Debug, Default)]
pub struct ResultAggregator {
    checks: Vec<Check>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        ResultAggregator { checks: Vec::new() }
    }

    /// Add a completed check result
    pub fn add_result(&mut self, check: Check) {
        self.checks.push(check);
    }

    /// Freeze into the final report
    pub fn into_report(
        self,
        subject: impl Into<String>,
        server_version: Option<String>,
        total_duration_ms: u64,
    ) -> ValidationReport {
        ValidationReport {
            timestamp: unix_timestamp(),
            subject: subject.into(),
            server_version,
            checks: self.checks,
            total_duration_ms,
        }
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
