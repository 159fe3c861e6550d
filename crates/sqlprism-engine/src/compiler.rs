//! Package compilation
//!
//! A [`Compiler`] owns one package's catalog. Schema files are folded in
//! the order given; query files are then split into statements and every
//! statement introduced by a `-- name:` comment is analyzed against the
//! finished catalog. Errors are collected per statement and attributed to
//! the file, line and column they came from.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlprism_core::{Engine, PackageConfig};
//! use sqlprism_engine::{Compiler, SourceFile};
//!
//! let compiler = Compiler::new(PackageConfig::new("app", Engine::Postgresql));
//! let result = compiler.compile(
//!     &[SourceFile::new("schema.sql", "CREATE TABLE authors (id INT);")],
//!     &[SourceFile::new("query.sql", "-- name: ListAuthors :many\nSELECT * FROM authors;")],
//! );
//! assert_eq!(result.queries[0].sql, "SELECT id FROM authors");
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlprism_catalog::{Catalog, ColumnGenerator, ContribLoader, ExtensionLoader};
use sqlprism_core::{
    Column, Diagnostic, DiagnosticCode, Engine, Location, PackageConfig, PackageReport, Query, Severity, SqlError,
};
use sqlprism_sql::ast::SelectStmt;
use sqlprism_sql::source::{original_offset, split_statements};
use sqlprism_sql::{parse_metadata, validate_cmd, MetadataError, ParseError, Parser, QueryMetadata, SqlParser, Stmt};
use tracing::{debug, info, warn};

use crate::analyze::{Analysis, AnalysisMode, Analyzer};
use crate::scope::QueryCatalog;

/// A named SQL source handed in by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    pub contents: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Everything one package compiled to
#[derive(Debug, Clone, Serialize)]
pub struct PackageResult {
    pub name: String,
    pub engine: Engine,

    /// The catalog as it stood after the last schema file
    pub catalog: Catalog,

    /// Queries that analyzed cleanly, in file order
    pub queries: Vec<Query>,

    pub diagnostics: Vec<Diagnostic>,
}

impl PackageResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Report entry with the catalog snapshot as JSON
    ///
    /// A catalog that cannot be serialized is logged and reported as `null`.
    pub fn to_report(&self) -> PackageReport {
        let catalog = match serde_json::to_value(&self.catalog) {
            Ok(value) => value,
            Err(err) => {
                warn!(package = %self.name, error = %err, "catalog snapshot could not be serialized");
                serde_json::Value::Null
            }
        };
        PackageReport {
            name: self.name.clone(),
            engine: self.engine,
            catalog,
            queries: self.queries.clone(),
        }
    }
}

/// Computes view columns while DDL is folded
pub(crate) struct ViewColumns;

impl ColumnGenerator for ViewColumns {
    fn output_columns(&self, catalog: &Catalog, query: &SelectStmt) -> Result<Vec<Column>, SqlError> {
        let config = PackageConfig::new("", catalog.engine);
        let analyzer = Analyzer::new(catalog, &config);
        analyzer.select_columns(&QueryCatalog::new(catalog), None, query)
    }
}

/// Compiles the schema and queries of one package
pub struct Compiler {
    config: PackageConfig,
    parser: SqlParser,
    catalog: Catalog,
    loader: Box<dyn ExtensionLoader>,
}

impl Compiler {
    pub fn new(config: PackageConfig) -> Self {
        Self {
            parser: SqlParser::new(config.engine),
            catalog: Catalog::with_default_schema(config.engine, config.default_schema()),
            loader: Box::new(ContribLoader),
            config,
        }
    }

    /// Use another source of `CREATE EXTENSION` definitions
    pub fn with_extension_loader(mut self, loader: impl ExtensionLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn config(&self) -> &PackageConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Fold schema files into the catalog
    ///
    /// A statement that fails to parse or apply is reported and skipped;
    /// the statements after it are still folded.
    pub fn parse_catalog(&mut self, files: &[SourceFile]) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for file in files {
            let parsed = self.parser.parse(&file.contents);
            for err in &parsed.errors {
                let diagnostic = err.to_diagnostic(&file.name, &file.contents);
                if err.is_unsupported_syntax() {
                    warn!(file = %file.name, error = %err, "skipping unsupported statement");
                    diagnostics.push(diagnostic.with_severity(Severity::Warn));
                } else {
                    diagnostics.push(diagnostic);
                }
            }

            for raw in &parsed.statements {
                if let Stmt::Unsupported(kind) = &raw.stmt {
                    debug!(file = %file.name, kind = %kind, "statement does not change the catalog");
                    continue;
                }
                if let Err(err) = self.catalog.update(&raw.stmt, &ViewColumns, self.loader.as_ref()) {
                    diagnostics.push(Diagnostic::from_sql_error(
                        DiagnosticCode::CatalogError,
                        &err,
                        &file.name,
                        &file.contents,
                        raw.location,
                    ));
                }
            }
        }

        let tables: usize = self.catalog.schemas.iter().map(|s| s.tables.len()).sum();
        info!(
            package = %self.config.name,
            schemas = self.catalog.schemas.len(),
            tables,
            errors = diagnostics.len(),
            "catalog built"
        );
        diagnostics
    }

    /// Analyze every named statement of the query files
    ///
    /// Each query is analyzed fail-fast; a failing query is reported and
    /// left out of the result.
    pub fn parse_queries(&self, files: &[SourceFile]) -> (Vec<Query>, Vec<Diagnostic>) {
        let mut queries = Vec::new();
        let mut diagnostics = Vec::new();
        let mut names = HashSet::new();

        for file in files {
            for range in split_statements(&file.contents, self.config.engine) {
                let text = range.text(&file.contents);
                let text = text.trim_end().strip_suffix(';').unwrap_or(text);
                let at_statement = |message: String, code: DiagnosticCode| {
                    Diagnostic::new(code, Severity::Error, message).with_location(Location::from_offset(
                        &file.name,
                        &file.contents,
                        range.start,
                    ))
                };

                let meta = match parse_metadata(text, self.config.engine) {
                    Ok(Some(meta)) => meta,
                    Ok(None) => {
                        debug!(file = %file.name, offset = range.start, "statement without a name comment");
                        continue;
                    }
                    Err(err) => {
                        diagnostics.push(at_statement(err.to_string(), DiagnosticCode::InvalidMetadata));
                        continue;
                    }
                };

                let parsed = match self.parser.parse_query(text) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        diagnostics.push(err.offset_by(range.start).to_diagnostic(&file.name, &file.contents));
                        continue;
                    }
                };

                if let Err(err) = validate_cmd(&parsed.stmt, &meta, self.config.engine) {
                    diagnostics.push(at_statement(err.to_string(), DiagnosticCode::InvalidMetadata));
                    continue;
                }
                if !names.insert(meta.name.clone()) {
                    let err = MetadataError::DuplicateName(meta.name.clone());
                    diagnostics.push(at_statement(err.to_string(), DiagnosticCode::InvalidMetadata));
                    continue;
                }

                let analysis = self.analyzer(AnalysisMode::FailFast).analyze(&parsed, &meta, &file.name);
                for err in &analysis.errors {
                    let mut err = err.clone();
                    err.location = err.location.map(|at| original_offset(&parsed.edits, at));
                    diagnostics.push(Diagnostic::from_sql_error(
                        DiagnosticCode::QueryError,
                        &err,
                        &file.name,
                        &file.contents,
                        range.start,
                    ));
                }
                if let (Some(query), true) = (analysis.query, analysis.errors.is_empty()) {
                    queries.push(query);
                }
            }
        }

        info!(
            package = %self.config.name,
            queries = queries.len(),
            errors = diagnostics.len(),
            "queries analyzed"
        );
        (queries, diagnostics)
    }

    /// Analyze a single query text against the current catalog
    ///
    /// Locations in the returned errors are byte offsets into `text`.
    pub fn analyze_query(&self, text: &str, filename: &str, mode: AnalysisMode) -> Result<Analysis, ParseError> {
        let text = text.trim_end();
        let text = text.strip_suffix(';').unwrap_or(text);
        let meta = parse_metadata(text, self.config.engine)?.unwrap_or_else(|| QueryMetadata {
            name: String::new(),
            cmd: sqlprism_core::Cmd::Exec,
        });
        let parsed = self.parser.parse_query(text)?;
        validate_cmd(&parsed.stmt, &meta, self.config.engine)?;

        let mut analysis = self.analyzer(mode).analyze(&parsed, &meta, filename);
        for err in &mut analysis.errors {
            err.location = err.location.map(|at| original_offset(&parsed.edits, at));
        }
        Ok(analysis)
    }

    fn analyzer(&self, mode: AnalysisMode) -> Analyzer<'_> {
        Analyzer::new(&self.catalog, &self.config).with_mode(mode)
    }

    /// Fold the schema, then analyze the queries
    pub fn compile(mut self, schema: &[SourceFile], queries: &[SourceFile]) -> PackageResult {
        let mut diagnostics = self.parse_catalog(schema);
        let (queries, query_diagnostics) = self.parse_queries(queries);
        diagnostics.extend(query_diagnostics);

        PackageResult {
            name: self.config.name,
            engine: self.config.engine,
            catalog: self.catalog,
            queries,
            diagnostics,
        }
    }
}
