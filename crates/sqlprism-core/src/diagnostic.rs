//! Diagnostic codes and error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};
use crate::error::SqlError;

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    /// Statement text could not be parsed
    SqlParseError,

    /// A DDL statement could not be folded into the catalog
    CatalogError,

    /// A query failed name, type or parameter resolution
    QueryError,

    /// Statement kind is not modelled and was skipped
    UnsupportedStatement,

    /// The `-- name:` comment of a query is malformed
    InvalidMetadata,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlParseError => "SQL_PARSE_ERROR",
            Self::CatalogError => "CATALOG_ERROR",
            Self::QueryError => "QUERY_ERROR",
            Self::UnsupportedStatement => "UNSUPPORTED_STATEMENT",
            Self::InvalidMetadata => "INVALID_METADATA",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - the statement produced no usable result
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Source location in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File name as supplied by the caller
    pub file: String,

    /// Optional line number (1-indexed)
    pub line: Option<usize>,

    /// Optional column number (1-indexed)
    pub column: Option<usize>,
}

impl Location {
    /// Create a new location with just a file name
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }

    /// Create a location with file, line, and column
    pub fn with_position(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// Resolve a byte offset within `source` to a line and column
    ///
    /// Offsets past the end clamp to the end of the text; offsets inside a
    /// multi-byte character count that character once.
    pub fn from_offset(file: impl Into<String>, source: &str, offset: usize) -> Self {
        let (line, column) = line_column(source, offset);
        Self::with_position(file, line, column)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{}:{}:{}", self.file, line, column),
            (Some(line), None) => write!(f, "{}:{}", self.file, line),
            _ => write!(f, "{}", self.file),
        }
    }
}

/// 1-based line and column of a byte offset
pub fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for (idx, ch) in source.char_indices() {
        if idx >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// SQLSTATE-like code of the underlying error, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlstate: Option<String>,

    /// Source location (best-effort)
    pub location: Option<Location>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            sqlstate: None,
            location: None,
        }
    }

    /// Build an error diagnostic from an analyzer error
    ///
    /// `base` is the byte offset of the text the error location is relative
    /// to (for example the start of a statement within its file).
    pub fn from_sql_error(
        code: DiagnosticCode,
        err: &SqlError,
        file: &str,
        source: &str,
        base: usize,
    ) -> Self {
        let offset = base + err.location.unwrap_or(0);
        Self::new(code, Severity::Error, err.to_string())
            .with_sqlstate(err.code())
            .with_location(Location::from_offset(file, source, offset))
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the SQLSTATE-like code
    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }

    /// Set the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{}: ", location)?;
        }
        write!(f, "{}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn diagnostic_code_stability() {
        assert_eq!(DiagnosticCode::SqlParseError.as_str(), "SQL_PARSE_ERROR");
        assert_eq!(DiagnosticCode::UnsupportedStatement.as_str(), "UNSUPPORTED_STATEMENT");
    }

    #[test]
    fn line_column_counts_from_one() {
        let src = "select 1;\nselect foo\nfrom t";
        assert_eq!(line_column(src, 0), (1, 1));
        assert_eq!(line_column(src, 17), (2, 8));
        assert_eq!(line_column(src, 1000), (3, 7));
    }

    #[test]
    fn from_sql_error_attributes_position() {
        let src = "CREATE TABLE a (id int);\nCREATE TABLE a (id int);";
        let err = SqlError::new(ErrorKind::RelationExists("a".into())).with_location(0);
        let diag = Diagnostic::from_sql_error(DiagnosticCode::CatalogError, &err, "schema.sql", src, 25);

        assert_eq!(diag.sqlstate.as_deref(), Some("42P07"));
        assert_eq!(diag.location, Some(Location::with_position("schema.sql", 2, 1)));
        assert_eq!(diag.to_string(), "schema.sql:2:1: relation \"a\" already exists");
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::new(DiagnosticCode::QueryError, Severity::Error, "bad")
            .with_location(Location::with_position("query.sql", 4, 2));

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("QUERY_ERROR"));
        assert!(json.contains("error"));
        assert!(!json.contains("sqlstate"));
    }
}
