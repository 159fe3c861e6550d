//! Concurrent package compilation
//!
//! Packages share nothing, so each one is compiled on its own blocking
//! worker with its own catalog. A semaphore sized to the machine's
//! parallelism bounds how many run at once. Cancellation is checked when a
//! package is about to start; a package already folding runs to completion.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlprism_core::{PackageConfig, Report, SeverityThreshold};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::compiler::{Compiler, PackageResult, SourceFile};

/// Shared flag that stops packages which have not started yet
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One package's configuration and sources
#[derive(Debug, Clone)]
pub struct PackageInput {
    pub config: PackageConfig,
    pub schema: Vec<SourceFile>,
    pub queries: Vec<SourceFile>,
}

impl PackageInput {
    pub fn new(config: PackageConfig, schema: Vec<SourceFile>, queries: Vec<SourceFile>) -> Self {
        Self { config, schema, queries }
    }

    fn compile(self) -> PackageResult {
        Compiler::new(self.config).compile(&self.schema, &self.queries)
    }
}

#[derive(Debug, Clone)]
pub enum PackageOutcome {
    Compiled(PackageResult),

    /// Cancelled before it started
    Cancelled(String),

    /// The worker panicked or was aborted
    Failed { name: String, error: String },
}

impl PackageOutcome {
    pub fn name(&self) -> &str {
        match self {
            Self::Compiled(result) => &result.name,
            Self::Cancelled(name) | Self::Failed { name, .. } => name,
        }
    }

    pub fn result(&self) -> Option<&PackageResult> {
        match self {
            Self::Compiled(result) => Some(result),
            _ => None,
        }
    }
}

/// Compile packages concurrently, returning outcomes in input order
pub async fn compile_packages(inputs: Vec<PackageInput>, cancel: &Cancellation) -> Vec<PackageOutcome> {
    let workers = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
    let permits = Arc::new(Semaphore::new(workers));
    let names: Vec<String> = inputs.iter().map(|i| i.config.name.clone()).collect();
    info!(packages = inputs.len(), workers, "compiling packages");

    let mut tasks = JoinSet::new();
    for (index, input) in inputs.into_iter().enumerate() {
        let permits = Arc::clone(&permits);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let name = input.config.name.clone();
            let outcome = match permits.acquire_owned().await {
                Ok(_) if cancel.is_cancelled() => {
                    info!(package = %name, "package cancelled");
                    PackageOutcome::Cancelled(name)
                }
                Ok(permit) => {
                    info!(package = %name, "package started");
                    let worker = tokio::task::spawn_blocking(move || {
                        let _permit = permit;
                        input.compile()
                    });
                    match worker.await {
                        Ok(result) => {
                            info!(
                                package = %name,
                                queries = result.queries.len(),
                                diagnostics = result.diagnostics.len(),
                                "package compiled"
                            );
                            PackageOutcome::Compiled(result)
                        }
                        Err(err) => PackageOutcome::Failed {
                            name,
                            error: err.to_string(),
                        },
                    }
                }
                Err(err) => PackageOutcome::Failed {
                    name,
                    error: err.to_string(),
                },
            };
            (index, outcome)
        });
    }

    let mut outcomes: Vec<Option<PackageOutcome>> = names.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(err) => warn!(error = %err, "package task did not finish"),
        }
    }

    outcomes
        .into_iter()
        .zip(names)
        .map(|(outcome, name)| {
            outcome.unwrap_or(PackageOutcome::Failed {
                name,
                error: "task did not finish".to_string(),
            })
        })
        .collect()
}

/// Assemble the report for compiled packages
///
/// Diagnostic severities are adjusted by the configured overrides.
pub fn build_report(results: &[PackageResult], severity: &SeverityThreshold) -> Report {
    let mut report = Report::new();
    for result in results {
        report.add_package(result.to_report());
        for diagnostic in &result.diagnostics {
            let level = severity.get_severity(diagnostic.code, diagnostic.severity);
            report.add_diagnostic(diagnostic.clone().with_severity(level));
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlprism_core::{DiagnosticCode, Engine, Severity};

    fn input(name: &str, schema: &str) -> PackageInput {
        PackageInput::new(
            PackageConfig::new(name, Engine::Postgresql),
            vec![SourceFile::new("schema.sql", schema)],
            vec![SourceFile::new("query.sql", "-- name: CountRows :one\nSELECT count(*) FROM t;")],
        )
    }

    #[test]
    fn cancellation_is_shared() {
        let cancel = Cancellation::new();
        let other = cancel.clone();
        assert!(!other.is_cancelled());
        cancel.cancel();
        assert!(other.is_cancelled());
    }

    #[tokio::test]
    async fn outcomes_keep_input_order() {
        let inputs = vec![
            input("first", "CREATE TABLE t (id INT);"),
            input("second", "CREATE TABLE t (id INT, name TEXT);"),
            input("third", "CREATE TABLE t (id INT);"),
        ];
        let outcomes = compile_packages(inputs, &Cancellation::new()).await;
        let names: Vec<_> = outcomes.iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert!(outcomes.iter().all(|o| o.result().map_or(false, |r| r.queries.len() == 1)));
    }

    #[tokio::test]
    async fn cancelled_packages_do_not_start() {
        let cancel = Cancellation::new();
        cancel.cancel();
        let outcomes = compile_packages(vec![input("only", "CREATE TABLE t (id INT);")], &cancel).await;
        assert!(matches!(&outcomes[0], PackageOutcome::Cancelled(name) if name == "only"));
    }

    #[test]
    fn report_applies_severity_overrides() {
        let result = Compiler::new(PackageConfig::new("app", Engine::Postgresql)).compile(
            &[SourceFile::new("schema.sql", "CREATE TABLE t (id INT);")],
            &[SourceFile::new("query.sql", "-- name: Bad :many\nSELECT nope FROM t;")],
        );
        let mut severity = SeverityThreshold::default();
        severity.set_override(DiagnosticCode::QueryError, Severity::Warn);

        let report = build_report(&[result], &severity);
        assert_eq!(report.summary.packages, 1);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.summary.errors, 0);
        assert_eq!(report.packages[0].catalog["default_schema"], "public");
    }
}
