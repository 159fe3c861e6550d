//! Query analysis
//!
//! [`Analyzer`] runs the passes over one parsed query against a frozen
//! catalog: reference and function checks, output columns, parameters and
//! star expansion. In [`AnalysisMode::FailFast`] the first error ends the
//! analysis; in [`AnalysisMode::CollectAll`] each failing target, parameter
//! or check is recorded and skipped, and a partial [`Query`] is returned
//! alongside the errors.
//!
//! ## Example
//!
//! ```rust,ignore
//! let analyzer = Analyzer::new(&catalog, &config).with_mode(AnalysisMode::CollectAll);
//! let analysis = analyzer.analyze(&parsed, &meta, "query.sql");
//! for err in &analysis.errors {
//!     eprintln!("{}", err);
//! }
//! ```

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use sqlprism_catalog::Catalog;
use sqlprism_core::{Engine, PackageConfig, Query, SqlError, TableName};
use sqlprism_sql::source::{apply_edits, locate_word, strip_comments, Edit};
use sqlprism_sql::{ParsedQuery, QueryMetadata, Stmt};
use tracing::debug;

use crate::scope::QueryCatalog;

/// What to do when a pass fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    /// Stop at the first error
    #[default]
    FailFast,

    /// Record errors and keep going, returning a partial result
    CollectAll,
}

/// Outcome of analyzing one query
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// The analyzed query; `None` only when fail-fast analysis stopped
    pub query: Option<Query>,

    /// Errors with locations relative to the rewritten query text
    pub errors: Vec<SqlError>,
}

impl Analysis {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The query, or the first error
    pub fn into_result(mut self) -> Result<Query, SqlError> {
        match (self.query, self.errors.is_empty()) {
            (Some(query), true) => Ok(query),
            _ if !self.errors.is_empty() => Err(self.errors.remove(0)),
            _ => Err(SqlError::invalid("analysis produced no query")),
        }
    }
}

/// Analyzes queries against one catalog
pub struct Analyzer<'c> {
    pub(crate) catalog: &'c Catalog,
    pub(crate) engine: Engine,
    pub(crate) strict_order_by: bool,
    pub(crate) strict_function_checks: bool,
    pub(crate) mode: Cell<AnalysisMode>,

    /// Star replacements keyed by offset in the rewritten query text
    pub(crate) stars: RefCell<BTreeMap<usize, Edit>>,
    errors: RefCell<Vec<SqlError>>,
}

impl<'c> Analyzer<'c> {
    pub fn new(catalog: &'c Catalog, config: &PackageConfig) -> Self {
        Self {
            catalog,
            engine: config.engine,
            strict_order_by: config.strict_order_by,
            strict_function_checks: config.strict_function_checks,
            mode: Cell::new(AnalysisMode::FailFast),
            stars: RefCell::new(BTreeMap::new()),
            errors: RefCell::new(Vec::new()),
        }
    }

    pub fn with_mode(self, mode: AnalysisMode) -> Self {
        self.mode.set(mode);
        self
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    /// Route a failure through the error sink
    ///
    /// Fail-fast propagates it; collect-all records it and yields `None`.
    pub(crate) fn check<T>(&self, result: Result<T, SqlError>) -> Result<Option<T>, SqlError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if self.mode.get() == AnalysisMode::CollectAll => {
                self.errors.borrow_mut().push(err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Analyze one parsed query
    pub fn analyze(&self, parsed: &ParsedQuery, meta: &QueryMetadata, filename: &str) -> Analysis {
        debug!(query = %meta.name, cmd = meta.cmd.as_str(), "analyzing query");
        self.stars.borrow_mut().clear();
        self.errors.borrow_mut().clear();

        let result = self.run(parsed, meta, filename);
        let mut errors = self.errors.take();
        let query = match result {
            Ok(query) => Some(query),
            Err(err) => {
                errors.push(err);
                None
            }
        };
        // passes over the same clause can report the same failure
        let mut unique: Vec<SqlError> = Vec::with_capacity(errors.len());
        for err in errors {
            let err = self.locate(err, &parsed.sql);
            if !unique.contains(&err) {
                unique.push(err);
            }
        }
        Analysis { query, errors: unique }
    }

    fn run(&self, parsed: &ParsedQuery, meta: &QueryMetadata, filename: &str) -> Result<Query, SqlError> {
        let qc = QueryCatalog::new(self.catalog);
        self.validate(&qc, &parsed.stmt, &parsed.params)?;

        let columns = self.check(self.output_columns(&qc, &parsed.stmt))?.unwrap_or_default();
        let params = self.check(self.parameters(&qc, parsed))?.unwrap_or_default();
        self.expand_remaining_stars(&qc, &parsed.stmt);

        let edits: Vec<Edit> = self.stars.borrow().values().cloned().collect();
        let (sql, comments) = strip_comments(&apply_edits(&parsed.sql, &edits));

        Ok(Query {
            sql,
            name: meta.name.clone(),
            cmd: meta.cmd,
            columns,
            params,
            comments,
            filename: filename.to_string(),
            insert_into_table: self.insert_target(&parsed.stmt),
        })
    }

    fn insert_target(&self, stmt: &Stmt) -> Option<TableName> {
        match stmt {
            Stmt::Insert(insert) => Some(
                self.catalog
                    .table(&insert.relation.name)
                    .map_or_else(|_| insert.relation.name.clone(), |t| t.rel.clone()),
            ),
            _ => None,
        }
    }

    /// Point an error without a location at the first use of its subject
    fn locate(&self, err: SqlError, sql: &str) -> SqlError {
        if err.location.is_some() {
            return err;
        }
        let word = err
            .kind
            .subject()
            .map(|s| s.rsplit('.').next().unwrap_or(s).trim_end_matches("(*)").to_string());
        let found = word.and_then(|w| locate_word(sql, self.engine, &w));
        err.or_location(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{catalog, parse};
    use pretty_assertions::assert_eq;
    use sqlprism_core::{Cmd, ErrorKind};

    const SCHEMA: &str = "CREATE TABLE authors (id BIGINT PRIMARY KEY, name TEXT NOT NULL);";

    fn meta() -> QueryMetadata {
        QueryMetadata {
            name: "Check".into(),
            cmd: Cmd::Many,
        }
    }

    #[test]
    fn fail_fast_stops_at_first_error() {
        let catalog = catalog(Engine::Postgresql, SCHEMA);
        let config = PackageConfig::new("test", Engine::Postgresql);
        let parsed = parse(Engine::Postgresql, "SELECT nope, id, missing FROM authors");

        let analysis = Analyzer::new(&catalog, &config).analyze(&parsed, &meta(), "q.sql");
        assert!(analysis.query.is_none());
        assert_eq!(analysis.errors.len(), 1);
        assert_eq!(analysis.errors[0].kind, ErrorKind::ColumnDoesNotExist("nope".into()));
        assert_eq!(analysis.errors[0].location, Some(7));
    }

    #[test]
    fn collect_all_returns_partial_query() {
        let catalog = catalog(Engine::Postgresql, SCHEMA);
        let config = PackageConfig::new("test", Engine::Postgresql);
        let parsed = parse(Engine::Postgresql, "SELECT nope, id, missing FROM authors");

        let analysis = Analyzer::new(&catalog, &config)
            .with_mode(AnalysisMode::CollectAll)
            .analyze(&parsed, &meta(), "q.sql");
        assert_eq!(analysis.errors.len(), 2);
        let query = analysis.query.unwrap();
        assert_eq!(query.columns.len(), 1);
        assert_eq!(query.columns[0].name, "id");
    }

    #[test]
    fn insert_target_is_recorded() {
        let catalog = catalog(Engine::Postgresql, SCHEMA);
        let config = PackageConfig::new("test", Engine::Postgresql);
        let parsed = parse(Engine::Postgresql, "INSERT INTO authors (id, name) VALUES ($1, $2)");
        let query = Analyzer::new(&catalog, &config)
            .analyze(&parsed, &meta(), "q.sql")
            .into_result()
            .unwrap();
        assert_eq!(query.insert_into_table, Some(TableName::with_schema("public", "authors")));
        assert_eq!(query.filename, "q.sql");
    }
}
