//! Integration tests for the engine
//!
//! Whole packages go through the compiler: schema files are folded, query
//! files are split and analyzed, and the results are checked the way a
//! code generator would consume them.

mod fixtures;

use fixtures::{compile, init_tracing, nullability, query, AUTHORS, SHOP};
use pretty_assertions::assert_eq;
use sqlprism_core::{DiagnosticCode, Engine, PackageConfig, SeverityThreshold};
use sqlprism_engine::{build_report, compile_packages, Cancellation, PackageInput, PackageOutcome, SourceFile};

// =============================================================================
// Reference checks
// =============================================================================

#[test]
fn test_order_by_unknown_column() {
    let result = compile(
        Engine::Postgresql,
        AUTHORS,
        "-- name: ListAuthors :many\nSELECT id FROM authors ORDER BY foo;",
    );

    assert!(result.queries.is_empty());
    assert_eq!(result.diagnostics.len(), 1);
    let diag = &result.diagnostics[0];
    assert_eq!(diag.code, DiagnosticCode::QueryError);
    assert_eq!(diag.message, "column reference \"foo\" not found");
    assert_eq!(diag.sqlstate.as_deref(), Some("42703"));
    let location = diag.location.as_ref().unwrap();
    assert_eq!((location.file.as_str(), location.line, location.column), ("query.sql", Some(2), Some(33)));
}

#[test]
fn test_ambiguous_column_needs_qualifier() {
    let result = compile(
        Engine::Postgresql,
        SHOP,
        "-- name: Ambiguous :many\n\
         SELECT order_id FROM orders o JOIN shipments s ON o.order_id = s.order_id;\n\n\
         -- name: Qualified :many\n\
         SELECT o.order_id FROM orders o JOIN shipments s ON o.order_id = s.order_id;",
    );

    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].message, "column reference \"order_id\" is ambiguous");
    assert_eq!(query(&result, "Qualified").columns[0].name, "order_id");
}

// =============================================================================
// Output columns
// =============================================================================

#[test]
fn test_left_join_makes_right_side_nullable() {
    let result = compile(
        Engine::Postgresql,
        SHOP,
        "-- name: OrdersWithShipments :many\n\
         SELECT o.order_id, o.total, s.carrier, s.shipped_at\n\
         FROM orders o LEFT JOIN shipments s ON o.order_id = s.order_id;",
    );

    let q = query(&result, "OrdersWithShipments");
    assert_eq!(
        nullability(&q.columns),
        vec![("order_id", true), ("total", true), ("carrier", false), ("shipped_at", false)]
    );
}

#[test]
fn test_nullability_through_nested_joins() {
    let result = compile(
        Engine::Postgresql,
        SHOP,
        "-- name: Nested :many\n\
         SELECT c.email, o.total, s.carrier\n\
         FROM customers c\n\
         LEFT JOIN orders o ON o.customer_id = c.customer_id\n\
         JOIN shipments s ON s.order_id = o.order_id;\n\n\
         -- name: Full :many\n\
         SELECT o.total, s.carrier FROM orders o FULL JOIN shipments s ON o.order_id = s.order_id;",
    );

    assert_eq!(
        nullability(&query(&result, "Nested").columns),
        vec![("email", true), ("total", false), ("carrier", true)]
    );
    assert_eq!(
        nullability(&query(&result, "Full").columns),
        vec![("total", false), ("carrier", false)]
    );
}

#[test]
fn test_nested_join_keeps_its_own_using() {
    let result = compile(
        Engine::Postgresql,
        "CREATE TABLE a (id INT NOT NULL);\n\
         CREATE TABLE b (id INT NOT NULL, k INT NOT NULL);\n\
         CREATE TABLE c (k INT NOT NULL, label TEXT);",
        "-- name: Nested :many\n\
         SELECT a.id, k, c.label FROM a JOIN (b JOIN c USING (k)) ON a.id = abs(b.id);",
    );

    assert_eq!(result.diagnostics, vec![]);
    assert_eq!(
        nullability(&query(&result, "Nested").columns),
        vec![("id", true), ("k", true), ("label", false)]
    );
}

#[test]
fn test_select_star_keeps_declared_order() {
    let result = compile(
        Engine::Postgresql,
        SHOP,
        "-- name: ListOrders :many\nSELECT * FROM orders;\n\n\
         -- name: OrderWithCustomer :one\n\
         SELECT o.*, c.email FROM orders o JOIN customers c USING (customer_id) WHERE o.order_id = $1;",
    );

    let list = query(&result, "ListOrders");
    assert_eq!(list.sql, "SELECT order_id, customer_id, total, placed_at, note FROM orders");
    let names: Vec<&str> = list.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["order_id", "customer_id", "total", "placed_at", "note"]);

    let joined = query(&result, "OrderWithCustomer");
    assert_eq!(
        joined.sql,
        "SELECT o.order_id, o.customer_id, o.total, o.placed_at, o.note, c.email \
         FROM orders o JOIN customers c USING (customer_id) WHERE o.order_id = $1"
    );
    assert_eq!(joined.columns.len(), 6);
}

#[test]
fn test_ctes_and_correlated_subqueries() {
    let result = compile(
        Engine::Postgresql,
        SHOP,
        "-- name: BigSpenders :many\n\
         WITH spend AS (SELECT customer_id, sum(total) AS spent FROM orders GROUP BY customer_id)\n\
         SELECT c.email, spend.spent,\n\
                (SELECT count(*) FROM orders o WHERE o.customer_id = c.customer_id) AS order_count\n\
         FROM customers c JOIN spend ON spend.customer_id = c.customer_id;",
    );

    let q = query(&result, "BigSpenders");
    let columns: Vec<(&str, &str)> = q.columns.iter().map(|c| (c.name.as_str(), c.data_type.as_str())).collect();
    assert_eq!(columns, vec![("email", "text"), ("spent", "numeric"), ("order_count", "bigint")]);
}

#[test]
fn test_embed_yields_one_column() {
    let result = compile(
        Engine::Postgresql,
        SHOP,
        "-- name: OrderAndShipment :many\n\
         SELECT sqlprism.embed(o), s.carrier FROM orders o JOIN shipments s ON s.order_id = o.order_id;",
    );

    let q = query(&result, "OrderAndShipment");
    assert_eq!(q.columns.len(), 2);
    assert_eq!(q.columns[0].embed_table.as_ref().map(|t| t.name.as_str()), Some("orders"));
    assert!(q.sql.starts_with("SELECT o.order_id, o.customer_id, o.total, o.placed_at, o.note, s.carrier"));
    assert!(q.has_embeds());
}

// =============================================================================
// Parameters
// =============================================================================

#[test]
fn test_limit_and_offset_parameters() {
    let result = compile(
        Engine::Postgresql,
        SHOP,
        "-- name: Page :many\n\
         SELECT order_id FROM orders WHERE total > $1 ORDER BY placed_at DESC LIMIT $2 OFFSET $3;",
    );

    let params: Vec<(usize, &str, &str, bool)> = query(&result, "Page")
        .params
        .iter()
        .map(|p| (p.number, p.column.name.as_str(), p.column.data_type.as_str(), p.column.not_null))
        .collect();
    assert_eq!(
        params,
        vec![
            (1, "total", "numeric", true),
            (2, "limit", "integer", true),
            (3, "offset", "integer", true),
        ]
    );
}

#[test]
fn test_named_parameters() {
    let result = compile(
        Engine::Postgresql,
        SHOP,
        "-- name: UpdateCustomer :exec\n\
         UPDATE customers SET nickname = sqlprism.narg(nickname), email = @email WHERE customer_id = @id;",
    );

    let q = query(&result, "UpdateCustomer");
    assert_eq!(q.sql, "UPDATE customers SET nickname = $1, email = $2 WHERE customer_id = $3");
    let params: Vec<(&str, bool, bool)> = q
        .params
        .iter()
        .map(|p| (p.column.name.as_str(), p.column.not_null, p.column.is_named_param))
        .collect();
    assert_eq!(params, vec![("nickname", false, true), ("email", true, true), ("id", true, true)]);
}

#[test]
fn test_insert_returning() {
    let result = compile(
        Engine::Postgresql,
        SHOP,
        "-- name: CreateShipment :one\n\
         INSERT INTO shipments (order_id, carrier, shipped_at) VALUES ($1, $2, now())\n\
         RETURNING shipment_id;",
    );

    let q = query(&result, "CreateShipment");
    assert_eq!(q.columns[0].name, "shipment_id");
    let names: Vec<&str> = q.params.iter().map(|p| p.column.name.as_str()).collect();
    assert_eq!(names, vec!["order_id", "carrier"]);
    assert_eq!(q.insert_into_table.as_ref().map(|t| t.name.as_str()), Some("shipments"));
}

#[test]
fn test_mysql_placeholders() {
    let result = compile(
        Engine::Mysql,
        "CREATE TABLE users (id BIGINT UNSIGNED NOT NULL PRIMARY KEY, name VARCHAR(255) NOT NULL, age INT);",
        "-- name: FindUsers :many\nSELECT id, name FROM users WHERE age > ? AND name LIKE ? LIMIT ?;",
    );

    let q = query(&result, "FindUsers");
    let params: Vec<(&str, &str)> = q
        .params
        .iter()
        .map(|p| (p.column.name.as_str(), p.column.data_type.as_str()))
        .collect();
    assert_eq!(params, vec![("age", "int"), ("name", "varchar"), ("limit", "int")]);
    assert!(q.columns[0].unsigned);
}

// =============================================================================
// Packages
// =============================================================================

fn package(name: &str, queries: &str) -> PackageInput {
    PackageInput::new(
        PackageConfig::new(name, Engine::Postgresql),
        vec![SourceFile::new("schema.sql", SHOP)],
        vec![SourceFile::new("query.sql", queries)],
    )
}

#[tokio::test]
async fn test_packages_compile_concurrently() {
    init_tracing();
    let inputs = vec![
        package("orders", "-- name: ListOrders :many\nSELECT * FROM orders;"),
        package("broken", "-- name: Broken :many\nSELECT nope FROM orders;"),
        package("shipments", "-- name: ListShipments :many\nSELECT * FROM shipments;"),
    ];

    let outcomes = compile_packages(inputs, &Cancellation::new()).await;
    let names: Vec<&str> = outcomes.iter().map(|o| o.name()).collect();
    assert_eq!(names, vec!["orders", "broken", "shipments"]);

    let results: Vec<_> = outcomes.iter().filter_map(|o| o.result().cloned()).collect();
    assert_eq!(results.len(), 3);
    assert!(results[1].has_errors());

    let report = build_report(&results, &SeverityThreshold::default());
    assert_eq!(report.summary.packages, 3);
    assert_eq!(report.summary.queries, 2);
    assert_eq!(report.summary.errors, 1);
    let json = report.to_json().unwrap();
    assert!(json.contains("\"ListShipments\""));
}

#[tokio::test]
async fn test_cancelled_packages_are_skipped() {
    let cancel = Cancellation::new();
    cancel.cancel();

    let outcomes = compile_packages(
        vec![package("a", "-- name: A :many\nSELECT 1;"), package("b", "-- name: B :many\nSELECT 1;")],
        &cancel,
    )
    .await;
    assert!(outcomes.iter().all(|o| matches!(o, PackageOutcome::Cancelled(_))));
}
