//! sqlprism core
//!
//! Stable domain types shared by every analyzer crate: multi-part names,
//! error kinds with SQLSTATE-like codes, diagnostics, the query result
//! model, configuration and the JSON report.
//! Never rename diagnostic or error codes - they are part of the public API.

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod identifier;
pub mod query;
pub mod report;

pub use config::{Config, ConfigError, Engine, PackageConfig, SeverityThreshold};
pub use diagnostic::{line_column, Diagnostic, DiagnosticCode, Location, Severity};
pub use error::{ErrorKind, Result, SqlError};
pub use identifier::{FuncName, TableName, TypeName};
pub use query::{Cmd, Column, Parameter, Query};
pub use report::{PackageReport, Report, ReportSummary, ReportVersion};
