//! Test fixtures for catalog integration tests
//!
//! Schema files covering the DDL forms the catalog folds, plus a helper
//! that parses and applies them.

use sqlprism_catalog::{Catalog, ColumnGenerator, ContribLoader};
use sqlprism_core::{Engine, SqlError};
use sqlprism_sql::ast::SelectStmt;
use sqlprism_sql::{Parser, SqlParser};

/// A bookstore schema exercising tables, enums, inheritance and functions
pub const BOOKSTORE: &str = r#"
CREATE SCHEMA inventory;

CREATE TYPE book_kind AS ENUM ('fiction', 'nonfiction');

CREATE TABLE authors (
    id   BIGSERIAL PRIMARY KEY,
    name text NOT NULL,
    bio  text
);

CREATE TABLE inventory.books (
    id        serial PRIMARY KEY,
    author_id bigint NOT NULL,
    title     text   NOT NULL,
    kind      book_kind NOT NULL,
    tags      text[]
);

CREATE TABLE editors (
    since date NOT NULL
) INHERITS (authors);

CREATE FUNCTION inventory.book_count(author bigint, include_drafts boolean DEFAULT false)
RETURNS bigint AS $$ SELECT 1::bigint $$ LANGUAGE sql;

COMMENT ON TABLE authors IS 'People who write books';
COMMENT ON COLUMN authors.bio IS 'Free text';

CREATE EXTENSION IF NOT EXISTS "uuid-ossp";
CREATE INDEX authors_name_idx ON authors (name);
"#;

/// Column generator for schemas without views
pub struct NoViews;

impl ColumnGenerator for NoViews {
    fn output_columns(
        &self,
        _catalog: &Catalog,
        _query: &SelectStmt,
    ) -> Result<Vec<sqlprism_core::Column>, SqlError> {
        Err(SqlError::invalid("no views in this fixture"))
    }
}

/// Parse `sql` and fold every statement, stopping at the first failure
pub fn build(engine: Engine, sql: &str) -> Result<Catalog, SqlError> {
    let mut catalog = Catalog::new(engine);
    apply(&mut catalog, sql)?;
    Ok(catalog)
}

/// Fold more DDL into an existing catalog
pub fn apply(catalog: &mut Catalog, sql: &str) -> Result<(), SqlError> {
    let file = SqlParser::new(catalog.engine).parse(sql);
    if let Some(err) = file.errors.first() {
        return Err(SqlError::invalid(err.to_string()));
    }
    for raw in &file.statements {
        catalog
            .update(&raw.stmt, &NoViews, &ContribLoader)
            .map_err(|err| err.or_location(Some(raw.location)))?;
    }
    Ok(())
}
