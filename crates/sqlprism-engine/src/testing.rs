//! Helpers shared by unit tests

use sqlprism_catalog::{Catalog, ContribLoader};
use sqlprism_core::{Cmd, Engine, PackageConfig, Query, SqlError};
use sqlprism_sql::{ParsedQuery, Parser, QueryMetadata, SqlParser};

use crate::analyze::Analyzer;
use crate::compiler::ViewColumns;

/// Fold DDL into a fresh catalog, panicking on any error
pub(crate) fn catalog(engine: Engine, ddl: &str) -> Catalog {
    let parsed = SqlParser::new(engine).parse(ddl);
    assert!(parsed.errors.is_empty(), "schema failed to parse: {:?}", parsed.errors);

    let mut catalog = Catalog::new(engine);
    for raw in &parsed.statements {
        catalog.update(&raw.stmt, &ViewColumns, &ContribLoader).unwrap();
    }
    catalog
}

pub(crate) fn parse(engine: Engine, sql: &str) -> ParsedQuery {
    SqlParser::new(engine).parse_query(sql).unwrap()
}

/// Analyze one query fail-fast with default package settings
pub(crate) fn analyze(catalog: &Catalog, sql: &str) -> Result<Query, SqlError> {
    let config = PackageConfig::new("test", catalog.engine);
    let parsed = parse(catalog.engine, sql);
    let meta = QueryMetadata {
        name: "Test".to_string(),
        cmd: Cmd::Many,
    };
    Analyzer::new(catalog, &config).analyze(&parsed, &meta, "query.sql").into_result()
}
