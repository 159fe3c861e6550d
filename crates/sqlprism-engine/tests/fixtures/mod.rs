//! Test fixtures for engine integration tests
//!
//! Schemas and query files in the shape a package is handed in, plus
//! helpers that compile them.

#![allow(dead_code)]

use sqlprism_core::{Column, Engine, PackageConfig, Query};
use sqlprism_engine::{Compiler, PackageResult, SourceFile};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Orders and their (optional) shipments
pub const SHOP: &str = r#"
CREATE TABLE customers (
    customer_id BIGINT PRIMARY KEY,
    email       TEXT NOT NULL,
    nickname    TEXT
);

CREATE TABLE orders (
    order_id    BIGINT PRIMARY KEY,
    customer_id BIGINT NOT NULL,
    total       NUMERIC NOT NULL,
    placed_at   TIMESTAMP NOT NULL,
    note        TEXT
);

CREATE TABLE shipments (
    shipment_id BIGINT PRIMARY KEY,
    order_id    BIGINT NOT NULL,
    carrier     TEXT NOT NULL,
    shipped_at  TIMESTAMP NOT NULL
);

CREATE TYPE order_status AS ENUM ('open', 'paid', 'shipped');
"#;

pub const AUTHORS: &str = "CREATE TABLE authors (id INT);";

/// Route engine logs to the test writer; set `RUST_LOG` to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init();
}

/// Compile one package made of a single schema file and a single query file
pub fn compile(engine: Engine, schema: &str, queries: &str) -> PackageResult {
    init_tracing();
    Compiler::new(PackageConfig::new("test", engine)).compile(
        &[SourceFile::new("schema.sql", schema)],
        &[SourceFile::new("query.sql", queries)],
    )
}

/// The query with the given name; panics with the diagnostics when absent
pub fn query<'a>(result: &'a PackageResult, name: &str) -> &'a Query {
    result
        .queries
        .iter()
        .find(|q| q.name == name)
        .unwrap_or_else(|| panic!("no query {name}; diagnostics: {:#?}", result.diagnostics))
}

/// `(name, not_null)` pairs of a query's result columns
pub fn nullability(columns: &[Column]) -> Vec<(&str, bool)> {
    columns.iter().map(|c| (c.name.as_str(), c.not_null)).collect()
}
