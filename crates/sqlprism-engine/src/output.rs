//! Output columns
//!
//! Each target of a SELECT or RETURNING list maps to one or more columns.
//! Column references take their type and nullability from the scope; other
//! expressions are typed by [`crate::infer`] or by the function they call.
//! Tables reached only through the optional side of an outer join have all
//! of their columns made nullable before any target is resolved.

use std::collections::{HashMap, HashSet};

use sqlprism_catalog::{Function, ANY_ELEMENT};
use sqlprism_core::{Column, ErrorKind, SqlError, TableName, TypeName};
use sqlprism_sql::ast::{
    Alias, Expr, FromItem, FuncCall, JoinKind, RangeVar, ResTarget, SelectStmt, Stmt, SubLinkKind, WithClause,
};
use tracing::debug;

use crate::analyze::Analyzer;
use crate::infer;
use crate::scope::{QueryCatalog, Scope, Table};

/// Name of a result column nothing else names
pub(crate) const UNNAMED: &str = "?column?";

/// How a FROM item is reached through the join tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reach {
    NotFound,
    Required,
    Optional,
}

impl Reach {
    fn combine(self, other: Reach) -> Reach {
        match (self, other) {
            (Reach::NotFound, r) | (r, Reach::NotFound) => r,
            (Reach::Optional, Reach::Optional) => Reach::Optional,
            _ => Reach::Required,
        }
    }
}

/// Scope names reached only through the optional side of an outer join
pub(crate) fn optional_scopes(from: &[FromItem]) -> HashSet<String> {
    reached_optionally(from, false)
}

/// Like [`optional_scopes`], but both sides of a `FULL JOIN` count as
/// required; a merged `FULL JOIN` column is only nullable through these
fn optional_outside_full_joins(from: &[FromItem]) -> HashSet<String> {
    reached_optionally(from, true)
}

fn reached_optionally(from: &[FromItem], full_as_inner: bool) -> HashSet<String> {
    let mut reach = HashMap::new();
    for item in from {
        mark_reach(item, Reach::Required, full_as_inner, &mut reach);
    }
    reach
        .into_iter()
        .filter(|(_, r)| *r == Reach::Optional)
        .map(|(name, _)| name)
        .collect()
}

fn mark_reach(item: &FromItem, inherited: Reach, full_as_inner: bool, reach: &mut HashMap<String, Reach>) {
    match item {
        FromItem::Join(join) => {
            let (left, right) = match join.kind {
                JoinKind::Left => (inherited, Reach::Optional),
                JoinKind::Right => (Reach::Optional, inherited),
                JoinKind::Full if full_as_inner => (inherited, inherited),
                JoinKind::Full => (Reach::Optional, Reach::Optional),
                JoinKind::Inner | JoinKind::Cross => (inherited, inherited),
            };
            mark_reach(&join.left, left, full_as_inner, reach);
            mark_reach(&join.right, right, full_as_inner, reach);
        }
        other => {
            let name = from_scope_name(other);
            let current = reach.get(&name).copied().unwrap_or(Reach::NotFound);
            reach.insert(name, current.combine(inherited));
        }
    }
}

fn from_scope_name(item: &FromItem) -> String {
    match item {
        FromItem::Relation(rv) => rv.scope_name().to_string(),
        FromItem::Subselect { alias, .. } => alias.as_ref().map(|a| a.name.clone()).unwrap_or_default(),
        FromItem::Function { call, alias } => alias
            .as_ref()
            .map_or_else(|| call.name.name.clone(), |a| a.name.clone()),
        FromItem::Join(_) => String::new(),
    }
}

fn named(name: &str, mut column: Column) -> Column {
    column.name = name.to_string();
    column
}

/// A fresh column with the type of `source` and `dims` array dimensions
pub(crate) fn typed_like(source: &Column, dims: usize) -> Column {
    Column {
        data_type: source.data_type.clone(),
        type_name: source.type_name.clone().map(|t| TypeName { array_dims: dims, ..t }),
        unsigned: source.unsigned,
        is_array: dims > 0,
        array_dims: dims,
        length: source.length,
        ..Column::default()
    }
}

pub(crate) fn is_unknown_function(err: &SqlError) -> bool {
    matches!(err.kind, ErrorKind::FunctionNotFound(_) | ErrorKind::SchemaNotFound(_))
}

/// Column a resolved function returns; polymorphic results follow the
/// first argument
fn returned_column(func: &Function, first: Option<&Column>) -> Column {
    let not_null = !func.return_type_nullable;
    let Some(return_type) = &func.return_type else {
        return Column::any("");
    };
    let takes_array = func.in_args().next().map_or(false, |a| a.type_name.name == "anyarray");

    let column = match (return_type.name.as_str(), first) {
        (ANY_ELEMENT, Some(arg)) if !arg.is_any() => {
            let dims = if takes_array { arg.array_dims.saturating_sub(1) } else { arg.array_dims };
            typed_like(arg, dims)
        }
        ("anyarray", Some(arg)) if !arg.is_any() => {
            let dims = if takes_array { arg.array_dims } else { arg.array_dims + 1 };
            typed_like(arg, dims)
        }
        (ANY_ELEMENT | "anyarray", _) => Column::any(""),
        _ => Column::from_type("", return_type),
    };
    column.with_not_null(not_null)
}

impl<'c> Analyzer<'c> {
    /// Result columns of a statement; empty for statements without a
    /// projection
    pub fn output_columns(&self, qc: &QueryCatalog<'c>, stmt: &Stmt) -> Result<Vec<Column>, SqlError> {
        match stmt {
            Stmt::Select(select) => self.select_columns(qc, None, select),
            Stmt::Insert(insert) => {
                let qc = self.with_ctes(qc, insert.with.as_ref())?;
                let scope = self.statement_scope(&qc, &insert.relation, &[], true)?;
                self.target_list(&qc, &scope, &insert.returning)
            }
            Stmt::Update(update) => {
                let qc = self.with_ctes(qc, update.with.as_ref())?;
                let scope = self.statement_scope(&qc, &update.relation, &update.from, true)?;
                self.target_list(&qc, &scope, &update.returning)
            }
            Stmt::Delete(delete) => {
                let qc = self.with_ctes(qc, delete.with.as_ref())?;
                let scope = self.statement_scope(&qc, &delete.relation, &delete.using, true)?;
                self.target_list(&qc, &scope, &delete.returning)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Add the CTEs of a WITH clause, each seeing the ones before it
    pub(crate) fn with_ctes(
        &self,
        qc: &QueryCatalog<'c>,
        with: Option<&WithClause>,
    ) -> Result<QueryCatalog<'c>, SqlError> {
        let mut qc = qc.clone();
        let Some(with) = with else {
            return Ok(qc);
        };
        for cte in &with.ctes {
            let mut columns = match cte.query.as_ref() {
                Stmt::Select(select) if with.recursive => {
                    // the non-recursive branch fixes the row type
                    if let Some(set) = &select.set_op {
                        let seed = self.select_columns(&qc, None, &set.left)?;
                        qc.add_cte(&cte.name, rename(seed, &cte.columns));
                    }
                    self.select_columns(&qc, None, select)?
                }
                stmt => self.output_columns(&qc, stmt)?,
            };
            columns = rename(columns, &cte.columns);
            qc.add_cte(&cte.name, columns);
        }
        Ok(qc)
    }

    pub(crate) fn select_columns(
        &self,
        qc: &QueryCatalog<'c>,
        outer: Option<&Scope<'_>>,
        select: &SelectStmt,
    ) -> Result<Vec<Column>, SqlError> {
        let qc = self.with_ctes(qc, select.with.as_ref())?;
        if let Some(set) = &select.set_op {
            let left = self.select_columns(&qc, outer, &set.left)?;
            self.select_columns(&qc, outer, &set.right)?;
            return Ok(left);
        }
        if !select.values.is_empty() {
            return self.values_columns(&qc, outer, &select.values);
        }
        let scope = self.from_scope(&qc, outer, &select.from, true)?;
        self.target_list(&qc, &scope, &select.targets)
    }

    fn values_columns(
        &self,
        qc: &QueryCatalog<'c>,
        outer: Option<&Scope<'_>>,
        rows: &[Vec<Expr>],
    ) -> Result<Vec<Column>, SqlError> {
        let scope = Scope::nested(Vec::new(), outer);
        let mut columns: Vec<Column> = Vec::new();
        for row in rows {
            for (i, expr) in row.iter().enumerate() {
                let column = self.expr_column(qc, &scope, expr)?;
                match columns.get_mut(i) {
                    Some(existing) => {
                        if existing.is_any() && !column.is_any() {
                            let retyped = typed_like(&column, column.array_dims).with_not_null(existing.not_null);
                            *existing = named(&existing.name, retyped);
                        }
                        existing.not_null &= column.not_null;
                    }
                    None => {
                        let typed = typed_like(&column, column.array_dims).with_not_null(column.not_null);
                        columns.push(named(&format!("column{}", i + 1), typed));
                    }
                }
            }
        }
        Ok(columns)
    }

    /// Scope of the target relation of a DML statement plus its FROM/USING
    pub(crate) fn statement_scope(
        &self,
        qc: &QueryCatalog<'c>,
        relation: &RangeVar,
        extra: &[FromItem],
        adjust_nullability: bool,
    ) -> Result<Scope<'static>, SqlError> {
        let mut tables = vec![qc.get_table(&relation.name)?.with_alias(relation.alias.as_ref())];
        tables.extend(self.from_scope(qc, None, extra, adjust_nullability)?.tables);
        Ok(Scope::new(tables))
    }

    /// Resolve a FROM clause into the tables it makes visible
    ///
    /// With `adjust_nullability`, tables on the optional side of an outer
    /// join have their columns marked nullable.
    pub(crate) fn from_scope<'s>(
        &self,
        qc: &QueryCatalog<'c>,
        outer: Option<&'s Scope<'s>>,
        from: &[FromItem],
        adjust_nullability: bool,
    ) -> Result<Scope<'s>, SqlError> {
        let mut tables = Vec::new();
        for item in from {
            self.from_item(qc, outer, item, &mut tables)?;
        }

        let mut seen = HashSet::new();
        for table in &tables {
            let name = table.scope_name();
            if !name.is_empty() && !seen.insert(name) {
                return Err(ErrorKind::DuplicateAlias(name.to_string()).into());
            }
        }

        if adjust_nullability {
            let optional = optional_scopes(from);
            let outside_full = optional_outside_full_joins(from);
            for table in &mut tables {
                let nullable = match &table.coalesce_of {
                    Some(left) => outside_full.contains(left),
                    None => optional.contains(table.scope_name()),
                };
                if nullable {
                    table.make_nullable();
                }
            }
        }
        Ok(Scope::nested(tables, outer))
    }

    fn from_item(
        &self,
        qc: &QueryCatalog<'c>,
        outer: Option<&Scope<'_>>,
        item: &FromItem,
        tables: &mut Vec<Table>,
    ) -> Result<(), SqlError> {
        match item {
            FromItem::Relation(rv) => {
                tables.push(qc.get_table(&rv.name)?.with_alias(rv.alias.as_ref()));
            }
            FromItem::Subselect { query, alias, lateral } => {
                let columns = if *lateral {
                    let current = Scope::nested(tables.clone(), outer);
                    self.select_columns(qc, Some(&current), query)?
                } else {
                    self.select_columns(qc, outer, query)?
                };
                let name = alias.as_ref().map(|a| a.name.clone()).unwrap_or_default();
                tables.push(Table::new(TableName::new(name), columns).with_alias(alias.as_ref()));
            }
            FromItem::Function { call, alias } => {
                let current = Scope::nested(tables.clone(), outer);
                tables.push(self.function_table(qc, &current, call, alias.as_ref())?);
            }
            FromItem::Join(join) => {
                let start = tables.len();
                self.from_item(qc, outer, &join.left, tables)?;
                let mid = tables.len();
                self.from_item(qc, outer, &join.right, tables)?;

                let shared: Vec<String> = if join.natural {
                    let right: HashSet<&str> = tables[mid..]
                        .iter()
                        .flat_map(|t| t.visible_columns().map(|c| c.name.as_str()))
                        .collect();
                    tables[start..mid]
                        .iter()
                        .flat_map(|t| t.visible_columns())
                        .filter(|c| right.contains(c.name.as_str()))
                        .map(|c| c.name.clone())
                        .collect()
                } else {
                    join.using.clone()
                };

                let mut coalesced = Vec::new();
                for name in shared {
                    let visible = |side: &[Table]| {
                        side.iter()
                            .find_map(|t| t.visible_columns().find(|c| c.name == name))
                            .cloned()
                    };
                    let (Some(left), Some(right)) = (visible(&tables[start..mid]), visible(&tables[mid..])) else {
                        return Err(ErrorKind::ColumnDoesNotExist(name).into());
                    };

                    // unqualified references see the side that is always present
                    let hidden = match join.kind {
                        JoinKind::Right => start..mid,
                        JoinKind::Full => start..tables.len(),
                        JoinKind::Left | JoinKind::Inner | JoinKind::Cross => mid..tables.len(),
                    };
                    for table in &mut tables[hidden] {
                        if table.column(&name).is_some() && !table.merged.contains(&name) {
                            table.merged.push(name.clone());
                        }
                    }
                    if join.kind == JoinKind::Full {
                        let not_null = left.not_null && right.not_null;
                        coalesced.push(left.with_not_null(not_null));
                    }
                }

                if !coalesced.is_empty() {
                    let mut table = Table::new(TableName::new(""), coalesced);
                    table.coalesce_of = Some(tables[start].scope_name().to_string());
                    tables.push(table);
                }
            }
        }
        Ok(())
    }

    /// Columns of a function in FROM
    ///
    /// Unknown functions never fail here: their columns come from the
    /// alias column list, typed `any`.
    fn function_table(
        &self,
        qc: &QueryCatalog<'c>,
        scope: &Scope<'_>,
        call: &FuncCall,
        alias: Option<&Alias>,
    ) -> Result<Table, SqlError> {
        let name = alias.map_or_else(|| call.name.name.clone(), |a| a.name.clone());
        let columns = match self.catalog.resolve_func_call(call) {
            Ok(func) => {
                let outs: Vec<Column> = func
                    .out_args()
                    .map(|a| Column::from_type(a.name.clone(), &a.type_name))
                    .collect();
                let row_table = func
                    .return_type
                    .as_ref()
                    .and_then(|t| qc.get_table(&TableName::with_schema(t.schema.clone(), t.name.clone())).ok());
                if !outs.is_empty() {
                    outs
                } else if let Some(table) = row_table {
                    table.columns
                } else {
                    let first = match call.args.first() {
                        Some(arg) => Some(self.expr_column(qc, scope, &arg.value)?),
                        None => None,
                    };
                    vec![named(&name, returned_column(func, first.as_ref()))]
                }
            }
            Err(err) if is_unknown_function(&err) => {
                debug!(function = %call.name, "unknown table function, columns typed as any");
                match alias {
                    Some(a) if !a.columns.is_empty() => a.columns.iter().map(|c| Column::any(c.clone())).collect(),
                    _ => vec![Column::any(name.clone())],
                }
            }
            Err(err) => return Err(err),
        };
        Ok(Table::new(TableName::new(name), columns).with_alias(alias))
    }

    pub(crate) fn target_list(
        &self,
        qc: &QueryCatalog<'c>,
        scope: &Scope<'_>,
        targets: &[ResTarget],
    ) -> Result<Vec<Column>, SqlError> {
        let mut columns = Vec::new();
        for target in targets {
            if let Some(mut resolved) = self.check(self.target_columns(qc, scope, target))? {
                columns.append(&mut resolved);
            }
        }
        Ok(columns)
    }

    fn target_columns(
        &self,
        qc: &QueryCatalog<'c>,
        scope: &Scope<'_>,
        target: &ResTarget,
    ) -> Result<Vec<Column>, SqlError> {
        if let Expr::Column(cref) = &target.val {
            if cref.star || cref.embed {
                return self.star_columns(scope, cref);
            }
        }
        let mut column = self.expr_column(qc, scope, &target.val)?;
        if let Some(name) = &target.name {
            column.name = name.clone();
        }
        Ok(vec![column])
    }

    /// Type, nullability and default name of one expression
    pub(crate) fn expr_column(
        &self,
        qc: &QueryCatalog<'c>,
        scope: &Scope<'_>,
        expr: &Expr,
    ) -> Result<Column, SqlError> {
        let column = match expr {
            Expr::Column(cref) if cref.star || cref.embed => Column::any(UNNAMED),
            Expr::Column(cref) => scope.resolve(cref)?.clone(),
            Expr::Const(value) => named(UNNAMED, infer::literal(self.engine, value)),
            Expr::Param(_) => Column::any(UNNAMED),
            Expr::BinaryOp { op, left, right } => {
                let left = self.expr_column(qc, scope, left)?;
                let right = self.expr_column(qc, scope, right)?;
                named(UNNAMED, infer::binary(self.engine, op, &left, &right))
            }
            Expr::UnaryOp { expr, .. } => {
                let inner = self.expr_column(qc, scope, expr)?;
                named(UNNAMED, typed_like(&inner, inner.array_dims).with_not_null(inner.not_null))
            }
            Expr::Bool { args, .. } => {
                for arg in args {
                    self.expr_column(qc, scope, arg)?;
                }
                named(UNNAMED, Column::new("", infer::boolean_type(self.engine)).with_not_null(true))
            }
            Expr::NullTest { arg, .. } => {
                self.expr_column(qc, scope, arg)?;
                named(UNNAMED, Column::new("", infer::boolean_type(self.engine)).with_not_null(true))
            }
            Expr::Cast { arg, type_name } => {
                let inner = self.expr_column(qc, scope, arg)?;
                let type_name = type_name.clone().canonicalize(self.engine);
                let name = match arg.as_ref() {
                    Expr::Column(_) => inner.name.clone(),
                    _ => type_name.name.clone(),
                };
                Column::from_type(name, &type_name).with_not_null(inner.not_null)
            }
            Expr::Func(call) => self.func_column(qc, scope, call)?,
            Expr::Case(case) => {
                if let Some(arg) = &case.arg {
                    self.expr_column(qc, scope, arg)?;
                }
                let mut results = Vec::with_capacity(case.whens.len());
                for (condition, result) in &case.whens {
                    self.expr_column(qc, scope, condition)?;
                    results.push(self.expr_column(qc, scope, result)?);
                }
                let default = match &case.default {
                    Some(d) => Some(self.expr_column(qc, scope, d)?),
                    None => None,
                };
                let not_null =
                    default.as_ref().map_or(false, |d| d.not_null) && results.iter().all(|c| c.not_null);
                let typed = results
                    .iter()
                    .chain(default.iter())
                    .find(|c| !c.is_any())
                    .map_or_else(|| Column::any(""), |c| typed_like(c, c.array_dims));
                named("case", typed.with_not_null(not_null))
            }
            Expr::Coalesce(args) => {
                let columns = args
                    .iter()
                    .map(|a| self.expr_column(qc, scope, a))
                    .collect::<Result<Vec<_>, _>>()?;
                let not_null = columns.iter().any(|c| c.not_null);
                let typed = columns
                    .iter()
                    .find(|c| !c.is_any())
                    .map_or_else(|| Column::any(""), |c| typed_like(c, c.array_dims));
                named("coalesce", typed.with_not_null(not_null))
            }
            Expr::SubLink(link) => {
                if let Some(test) = &link.test {
                    self.expr_column(qc, scope, test)?;
                }
                let columns = self.select_columns(qc, Some(scope), &link.subselect)?;
                match link.kind {
                    SubLinkKind::Exists => {
                        named("exists", Column::new("", infer::boolean_type(self.engine)).with_not_null(true))
                    }
                    SubLinkKind::Expr => {
                        let first = columns.into_iter().next().unwrap_or_else(|| Column::any(UNNAMED));
                        first.with_not_null(false)
                    }
                    SubLinkKind::Any(_) | SubLinkKind::All(_) => {
                        named(UNNAMED, Column::new("", infer::boolean_type(self.engine)))
                    }
                }
            }
            Expr::In { expr, list, .. } => {
                self.expr_column(qc, scope, expr)?;
                for item in list {
                    self.expr_column(qc, scope, item)?;
                }
                named(UNNAMED, Column::new("", infer::boolean_type(self.engine)))
            }
            Expr::Between { expr, low, high, .. } => {
                for e in [expr, low, high] {
                    self.expr_column(qc, scope, e)?;
                }
                named(UNNAMED, Column::new("", infer::boolean_type(self.engine)))
            }
            Expr::Quantified { left, right, .. } => {
                self.expr_column(qc, scope, left)?;
                self.expr_column(qc, scope, right)?;
                named(UNNAMED, Column::new("", infer::boolean_type(self.engine)))
            }
            Expr::Row(items) => {
                for item in items {
                    self.expr_column(qc, scope, item)?;
                }
                named("row", Column::new("", "record").with_not_null(true))
            }
            Expr::Array(items) => {
                let columns = items
                    .iter()
                    .map(|i| self.expr_column(qc, scope, i))
                    .collect::<Result<Vec<_>, _>>()?;
                let element = columns.iter().find(|c| !c.is_any());
                let array = match element {
                    Some(c) => typed_like(c, c.array_dims + 1),
                    None => typed_like(&Column::any(""), 1),
                };
                named("array", array.with_not_null(true))
            }
            Expr::Other(_) => Column::any(UNNAMED),
        };
        Ok(column)
    }

    fn func_column(&self, qc: &QueryCatalog<'c>, scope: &Scope<'_>, call: &FuncCall) -> Result<Column, SqlError> {
        let args = call
            .args
            .iter()
            .map(|a| self.expr_column(qc, scope, &a.value))
            .collect::<Result<Vec<_>, _>>()?;
        let column = match self.catalog.resolve_func_call(call) {
            Ok(func) => returned_column(func, args.first()),
            Err(err) if is_unknown_function(&err) => {
                debug!(function = %call.name, "unknown function, result typed as any");
                Column::any("")
            }
            Err(err) => return Err(err),
        };
        Ok(named(&call.name.name, column).func_call())
    }
}

fn rename(mut columns: Vec<Column>, names: &[String]) -> Vec<Column> {
    for (column, name) in columns.iter_mut().zip(names) {
        column.name = name.clone();
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{analyze, catalog};
    use pretty_assertions::assert_eq;
    use sqlprism_core::Engine;

    const SCHEMA: &str = "
        CREATE TABLE authors (id BIGINT PRIMARY KEY, name TEXT NOT NULL, bio TEXT);
        CREATE TABLE books (id BIGINT PRIMARY KEY, author_id BIGINT NOT NULL, title TEXT NOT NULL, price NUMERIC NOT NULL, tags TEXT[] NOT NULL);
    ";

    fn columns(sql: &str) -> Vec<(String, String, bool)> {
        let catalog = catalog(Engine::Postgresql, SCHEMA);
        let query = analyze(&catalog, sql).unwrap();
        query
            .columns
            .into_iter()
            .map(|c| (c.name, c.data_type, c.not_null))
            .collect()
    }

    fn col(name: &str, data_type: &str, not_null: bool) -> (String, String, bool) {
        (name.to_string(), data_type.to_string(), not_null)
    }

    fn from_clause(sql: &str) -> Vec<FromItem> {
        let parsed = sqlprism_sql::Parser::parse_query(&sqlprism_sql::SqlParser::postgres(), sql).unwrap();
        match parsed.stmt {
            Stmt::Select(select) => select.from,
            other => panic!("not a select: {:?}", other),
        }
    }

    #[test]
    fn outer_join_lattice() {
        let optional = optional_scopes(&from_clause(
            "SELECT 1 FROM authors a LEFT JOIN books b ON a.id = b.author_id",
        ));
        assert!(optional.contains("b"));
        assert!(!optional.contains("a"));

        let optional = optional_scopes(&from_clause(
            "SELECT 1 FROM authors a FULL JOIN books b ON a.id = b.author_id",
        ));
        assert_eq!(optional.len(), 2);
    }

    #[test]
    fn nested_joins_stay_optional() {
        let optional = optional_scopes(&from_clause(
            "SELECT 1 FROM authors a LEFT JOIN (books b JOIN authors c ON c.id = b.author_id) ON true",
        ));
        assert!(optional.contains("b") && optional.contains("c"));
        assert!(!optional.contains("a"));
    }

    #[test]
    fn expression_kinds() {
        assert_eq!(
            columns(
                "SELECT name::varchar, count(*), coalesce(bio, ''), CASE WHEN bio IS NULL THEN 'none' END,
                       upper(name), 1 + 2, EXISTS (SELECT 1 FROM books)
                FROM authors"
            ),
            vec![
                col("name", "varchar", true),
                col("count", "bigint", true),
                col("coalesce", "text", true),
                col("case", "text", false),
                col("upper", "text", false),
                col("?column?", "integer", true),
                col("exists", "boolean", true),
            ]
        );
    }

    #[test]
    fn polymorphic_functions_follow_their_argument() {
        assert_eq!(
            columns("SELECT max(price), array_agg(title), unnest(tags) FROM books"),
            vec![
                col("max", "numeric", false),
                col("array_agg", "text", false),
                col("unnest", "text", true),
            ]
        );
    }

    #[test]
    fn ctes_and_derived_tables() {
        assert_eq!(
            columns(
                "WITH t (n) AS (SELECT name FROM authors)
                 SELECT t.n, d.total FROM t, (SELECT count(*) AS total FROM books) d"
            ),
            vec![col("n", "text", true), col("total", "bigint", true)]
        );
    }

    #[test]
    fn union_takes_left_branch() {
        assert_eq!(
            columns("SELECT id, name FROM authors UNION SELECT id, title FROM books"),
            vec![col("id", "bigint", true), col("name", "text", true)]
        );
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let catalog = catalog(Engine::Postgresql, SCHEMA);
        let err = analyze(&catalog, "SELECT 1 FROM authors a, books a").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateAlias("a".into()));
    }

    #[test]
    fn using_columns_merge() {
        let catalog = catalog(
            Engine::Postgresql,
            "CREATE TABLE l (k INT NOT NULL, a TEXT); CREATE TABLE r (k INT NOT NULL, b TEXT);",
        );
        let query = analyze(&catalog, "SELECT k, r.k AS rk FROM l JOIN r USING (k)").unwrap();
        assert_eq!(query.columns[0].table_alias, "l");
        assert_eq!(query.columns[1].table_alias, "r");
    }

    #[test]
    fn right_join_using_shows_right_side() {
        let catalog = catalog(
            Engine::Postgresql,
            "CREATE TABLE a (k INT NOT NULL, x TEXT); CREATE TABLE c (k INT NOT NULL, y TEXT);",
        );
        let query = analyze(&catalog, "SELECT k FROM a RIGHT JOIN c USING (k)").unwrap();
        assert_eq!(query.columns[0].table_alias, "c");
        assert!(query.columns[0].not_null);

        let query = analyze(&catalog, "SELECT k FROM a LEFT JOIN c USING (k)").unwrap();
        assert_eq!(query.columns[0].table_alias, "a");
        assert!(query.columns[0].not_null);
    }

    #[test]
    fn full_join_using_is_not_null_when_both_sides_are() {
        let catalog = catalog(
            Engine::Postgresql,
            "CREATE TABLE a (k INT NOT NULL, j INT NOT NULL); CREATE TABLE c (k INT NOT NULL, j INT);",
        );
        let query = analyze(&catalog, "SELECT k, j, a.k AS ak FROM a FULL JOIN c USING (k, j)").unwrap();
        assert_eq!(
            query.columns.iter().map(|c| (c.name.as_str(), c.not_null)).collect::<Vec<_>>(),
            vec![("k", true), ("j", false), ("ak", false)]
        );

        let query = analyze(&catalog, "SELECT k FROM (SELECT 1 AS id) o LEFT JOIN (a FULL JOIN c USING (k)) ON true").unwrap();
        assert!(!query.columns[0].not_null);
    }

    #[test]
    fn unknown_table_function_uses_alias_columns() {
        let catalog = catalog(Engine::Postgresql, SCHEMA);
        let query = analyze(&catalog, "SELECT x, y FROM mystery_fn(1) AS m (x, y)").unwrap();
        assert_eq!(query.columns.len(), 2);
        assert!(query.columns.iter().all(|c| c.is_any()));
    }
}
