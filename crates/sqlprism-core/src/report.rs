//! Report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use crate::config::Engine;
use crate::diagnostic::{Diagnostic, Severity};
use crate::query::Query;

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Total number of diagnostics
    pub total: usize,

    /// Number of errors
    pub errors: usize,

    /// Number of warnings
    pub warnings: usize,

    /// Number of info messages
    pub info: usize,

    /// Number of packages included
    pub packages: usize,

    /// Number of queries analyzed successfully
    pub queries: usize,
}

/// Analysis output for one package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageReport {
    /// Package name
    pub name: String,

    /// Engine the package targets
    pub engine: Engine,

    /// Catalog snapshot after all DDL was folded
    pub catalog: serde_json::Value,

    /// Resolved queries
    pub queries: Vec<Query>,
}

/// Analysis report (report.json v1)
///
/// This is the stable hand-off format for code generators.
/// All fields are versioned and backward-compatible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Summary statistics
    pub summary: ReportSummary,

    /// Per-package results
    pub packages: Vec<PackageReport>,

    /// All diagnostics
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: ReportSummary::default(),
            packages: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Add a package's results
    pub fn add_package(&mut self, package: PackageReport) {
        self.summary.packages += 1;
        self.summary.queries += package.queries.len();
        self.packages.push(package);
    }

    /// Add a diagnostic to the report
    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.summary.errors += 1,
            Severity::Warn => self.summary.warnings += 1,
            Severity::Info => self.summary.info += 1,
        }

        self.summary.total += 1;
        self.diagnostics.push(diagnostic);
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticCode;

    #[test]
    fn empty_report() {
        let report = Report::new();
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary.total, 0);
        assert!(!report.has_errors());
    }

    #[test]
    fn report_counts_diagnostics() {
        let mut report = Report::new();
        report.add_diagnostic(Diagnostic::new(DiagnosticCode::QueryError, Severity::Error, "bad"));
        report.add_diagnostic(Diagnostic::new(DiagnosticCode::UnsupportedStatement, Severity::Warn, "skipped"));

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.warnings, 1);
        assert!(report.has_errors());
    }

    #[test]
    fn report_serialization() {
        let mut report = Report::new();
        report.add_package(PackageReport {
            name: "app".into(),
            engine: Engine::Postgresql,
            catalog: serde_json::json!({ "default_schema": "public" }),
            queries: Vec::new(),
        });
        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"postgresql\""));
        assert_eq!(report.summary.packages, 1);
    }
}
