//! Parameter inference
//!
//! Placeholders are typed by the context they appear in, walking the
//! statement in source order. The first context that explains a number
//! wins; later occurrences only log a mismatch. A placeholder seen only in
//! an uninformative position is typed `any` until a better context turns up.

use std::collections::BTreeMap;
use std::slice;

use sqlprism_core::{Column, ErrorKind, Parameter, SqlError};
use sqlprism_sql::ast::{
    Alias, Expr, FromItem, FuncCall, InsertStmt, ParamMode, ParamRef, SelectStmt, SetTarget, Stmt, WithClause,
};
use sqlprism_sql::{Nullability, Param, ParsedQuery};
use tracing::debug;

use crate::analyze::{AnalysisMode, Analyzer};
use crate::infer::{self, OpClass};
use crate::output::{is_unknown_function, typed_like};
use crate::scope::{QueryCatalog, Scope, Table};

const POLYMORPHIC: &[&str] = &["any", "anyelement", "anyarray", "anynonarray", "anycompatible"];

/// The placeholder an expression consists of, looking through a cast
fn param_of(expr: &Expr) -> Option<&ParamRef> {
    match expr {
        Expr::Param(p) => Some(p),
        Expr::Cast { arg, .. } => match arg.as_ref() {
            Expr::Param(p) => Some(p),
            _ => None,
        },
        _ => None,
    }
}

/// A parameter typed after a column, with the given array dimensions
fn param_like(source: &Column, name: &str, dims: usize) -> Column {
    let mut column = typed_like(source, dims);
    column.name = name.to_string();
    column.not_null = source.not_null;
    column.table = source.table.clone();
    column
}

/// Apply what the author declared about a named parameter
fn apply_named(mut column: Column, named: Option<&Param>) -> Column {
    let Some(param) = named else {
        return column;
    };
    let inferred = if column.not_null {
        Nullability::INFERRED_NOT_NULL
    } else {
        Nullability::UNSPECIFIED
    };
    if !param.name.is_empty() {
        column.name = param.name.clone();
    }
    column.not_null = param.nullability.merge(inferred).not_null();
    column.is_named_param = true;
    column.is_slice = param.slice;
    column
}

struct Slot {
    column: Column,
    /// Typed from an uninformative position; a later context may replace it
    weak: bool,
}

struct ParamWalker<'a, 'c> {
    analyzer: &'a Analyzer<'c>,
    found: BTreeMap<usize, Slot>,
}

impl<'c> Analyzer<'c> {
    /// Parameters of a query, ordered by number
    pub(crate) fn parameters(&self, qc: &QueryCatalog<'c>, parsed: &ParsedQuery) -> Result<Vec<Parameter>, SqlError> {
        let mut walker = ParamWalker {
            analyzer: self,
            found: BTreeMap::new(),
        };
        walker.stmt(qc, &parsed.stmt)?;
        for site in &parsed.placeholders {
            walker.unresolved(site.number, Column::any(""));
        }

        let max = walker.found.keys().next_back().copied().unwrap_or(0);
        let mut params = Vec::with_capacity(max);
        for number in 1..=max {
            match walker.found.remove(&number) {
                Some(slot) => {
                    let column = apply_named(slot.column, parsed.params.get(number));
                    params.push(Parameter::new(number, column));
                }
                None => {
                    self.check::<()>(Err(ErrorKind::UndeterminedParameter(number).into()))?;
                }
            }
        }
        Ok(params)
    }
}

impl<'a, 'c> ParamWalker<'a, 'c> {
    fn resolved(&mut self, number: usize, column: Column) {
        match self.found.get_mut(&number) {
            Some(slot) if slot.weak => {
                *slot = Slot { column, weak: false };
            }
            Some(slot) => {
                if slot.column.data_type != column.data_type {
                    debug!(
                        number,
                        kept = %slot.column.data_type,
                        ignored = %column.data_type,
                        "parameter reused with a different type"
                    );
                }
            }
            None => {
                self.found.insert(number, Slot { column, weak: false });
            }
        }
    }

    fn unresolved(&mut self, number: usize, column: Column) {
        self.found.entry(number).or_insert(Slot { column, weak: true });
    }

    /// Resolve a column for a parameter context, through the error sink
    fn column(&self, scope: &Scope<'_>, expr: &Expr) -> Result<Option<Column>, SqlError> {
        match expr {
            Expr::Column(cref) if !cref.star && !cref.embed => self.analyzer.check(scope.resolve(cref).cloned()),
            _ => Ok(None),
        }
    }

    fn stmt(&mut self, qc: &QueryCatalog<'c>, stmt: &Stmt) -> Result<(), SqlError> {
        match stmt {
            Stmt::Select(select) => self.select(qc, None, select, None),
            Stmt::Insert(insert) => self.insert(qc, insert),
            Stmt::Update(update) => {
                let qc = self.with(qc, update.with.as_ref())?;
                let scope = self.analyzer.statement_scope(&qc, &update.relation, &update.from, false)?;
                self.from_items(&qc, &scope, None, &update.from)?;
                let target = scope.tables[0].clone();
                for set in &update.targets {
                    self.set_target(&qc, &scope, &target, set)?;
                }
                self.optional(&qc, &scope, update.where_clause.as_ref())?;
                for target in &update.returning {
                    self.expr(&qc, &scope, &target.val)?;
                }
                self.limit(&qc, &scope, update.limit.as_ref(), "limit")
            }
            Stmt::Delete(delete) => {
                let qc = self.with(qc, delete.with.as_ref())?;
                let scope = self.analyzer.statement_scope(&qc, &delete.relation, &delete.using, false)?;
                self.from_items(&qc, &scope, None, &delete.using)?;
                self.optional(&qc, &scope, delete.where_clause.as_ref())?;
                for target in &delete.returning {
                    self.expr(&qc, &scope, &target.val)?;
                }
                self.limit(&qc, &scope, delete.limit.as_ref(), "limit")
            }
            _ => Ok(()),
        }
    }

    /// Walk the CTEs of a WITH clause and return the catalog they extend
    fn with(&mut self, qc: &QueryCatalog<'c>, with: Option<&WithClause>) -> Result<QueryCatalog<'c>, SqlError> {
        let extended = self.analyzer.with_ctes(qc, with)?;
        if let Some(with) = with {
            for cte in &with.ctes {
                self.stmt(&extended, &cte.query)?;
            }
        }
        Ok(extended)
    }

    /// `into` holds the destination columns when the select feeds an INSERT
    fn select(
        &mut self,
        qc: &QueryCatalog<'c>,
        outer: Option<&Scope<'_>>,
        select: &SelectStmt,
        into: Option<&[Column]>,
    ) -> Result<(), SqlError> {
        let qc = self.with(qc, select.with.as_ref())?;
        if let Some(set) = &select.set_op {
            self.select(&qc, outer, &set.left, into)?;
            self.select(&qc, outer, &set.right, into)?;
            let scope = Scope::nested(Vec::new(), outer);
            self.limit(&qc, &scope, select.limit.as_ref(), "limit")?;
            return self.limit(&qc, &scope, select.offset.as_ref(), "offset");
        }

        let scope = self.analyzer.from_scope(&qc, outer, &select.from, false)?;
        self.from_items(&qc, &scope, outer, &select.from)?;

        for row in &select.values {
            for (i, expr) in row.iter().enumerate() {
                self.positional(&qc, &scope, expr, into.and_then(|cols| cols.get(i)))?;
            }
        }
        for (i, target) in select.targets.iter().enumerate() {
            self.positional(&qc, &scope, &target.val, into.and_then(|cols| cols.get(i)))?;
        }

        for expr in select
            .distinct_on
            .iter()
            .chain(select.where_clause.iter())
            .chain(select.group_by.iter())
            .chain(select.having.iter())
            .chain(select.order_by.iter())
        {
            self.expr(&qc, &scope, expr)?;
        }
        for window in &select.windows {
            for expr in window.partition_by.iter().chain(&window.order_by) {
                self.expr(&qc, &scope, expr)?;
            }
        }
        self.limit(&qc, &scope, select.limit.as_ref(), "limit")?;
        self.limit(&qc, &scope, select.offset.as_ref(), "offset")
    }

    /// A value written to a known destination column
    fn positional(
        &mut self,
        qc: &QueryCatalog<'c>,
        scope: &Scope<'_>,
        expr: &Expr,
        destination: Option<&Column>,
    ) -> Result<(), SqlError> {
        match (param_of(expr), destination) {
            (Some(p), Some(column)) => {
                self.resolved(p.number, param_like(column, &column.name, column.array_dims));
                Ok(())
            }
            _ => self.expr(qc, scope, expr),
        }
    }

    fn from_items(
        &mut self,
        qc: &QueryCatalog<'c>,
        scope: &Scope<'_>,
        outer: Option<&Scope<'_>>,
        items: &[FromItem],
    ) -> Result<(), SqlError> {
        for item in items {
            match item {
                FromItem::Relation(_) => {}
                FromItem::Subselect { query, lateral, .. } => {
                    if *lateral {
                        self.select(qc, Some(scope), query, None)?;
                    } else {
                        self.select(qc, outer, query, None)?;
                    }
                }
                FromItem::Function { call, .. } => self.func_call(qc, scope, call)?,
                FromItem::Join(join) => {
                    self.from_items(qc, scope, outer, slice::from_ref(&join.left))?;
                    self.from_items(qc, scope, outer, slice::from_ref(&join.right))?;
                    self.optional(qc, scope, join.on.as_ref())?;
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, qc: &QueryCatalog<'c>, insert: &InsertStmt) -> Result<(), SqlError> {
        let qc = self.with(qc, insert.with.as_ref())?;
        let table = qc.get_table(&insert.relation.name)?.with_alias(insert.relation.alias.as_ref());

        let destinations = if insert.columns.is_empty() {
            table.columns.clone()
        } else {
            let mut columns = Vec::with_capacity(insert.columns.len());
            for name in &insert.columns {
                let found = table.column(name).cloned().ok_or_else(|| {
                    SqlError::from(ErrorKind::ColumnNotFound {
                        relation: table.rel.name.clone(),
                        column: name.clone(),
                    })
                });
                let column = self.analyzer.check(found)?.unwrap_or_else(|| Column::any(name.clone()));
                columns.push(column);
            }
            columns
        };

        if let Some(source) = &insert.source {
            self.select(&qc, None, source, Some(&destinations))?;
        }

        let excluded = table
            .clone()
            .with_alias(Some(&Alias::new("excluded")));
        let scope = Scope::new(vec![table.clone(), excluded]);
        for set in &insert.on_conflict {
            self.set_target(&qc, &scope, &table, set)?;
        }
        let returning = Scope::new(vec![table]);
        for target in &insert.returning {
            self.expr(&qc, &returning, &target.val)?;
        }
        Ok(())
    }

    /// `SET column = value`, typed after the destination column
    fn set_target(
        &mut self,
        qc: &QueryCatalog<'c>,
        scope: &Scope<'_>,
        table: &Table,
        set: &SetTarget,
    ) -> Result<(), SqlError> {
        match (param_of(&set.value), table.column(&set.column)) {
            (Some(p), Some(column)) => {
                self.resolved(p.number, param_like(column, &column.name, column.array_dims));
                Ok(())
            }
            _ => self.expr(qc, scope, &set.value),
        }
    }

    fn limit(
        &mut self,
        qc: &QueryCatalog<'c>,
        scope: &Scope<'_>,
        clause: Option<&Expr>,
        name: &str,
    ) -> Result<(), SqlError> {
        let Some(expr) = clause else {
            return Ok(());
        };
        match param_of(expr) {
            Some(p) => {
                let column = Column::new(name, infer::integer_type(self.analyzer.engine)).with_not_null(true);
                self.resolved(p.number, column);
                Ok(())
            }
            None => self.expr(qc, scope, expr),
        }
    }

    fn optional(&mut self, qc: &QueryCatalog<'c>, scope: &Scope<'_>, expr: Option<&Expr>) -> Result<(), SqlError> {
        match expr {
            Some(expr) => self.expr(qc, scope, expr),
            None => Ok(()),
        }
    }

    /// A parameter compared or combined with another operand
    fn against(
        &mut self,
        qc: &QueryCatalog<'c>,
        scope: &Scope<'_>,
        param: &ParamRef,
        other: &Expr,
    ) -> Result<(), SqlError> {
        if let Some(column) = self.column(scope, other)? {
            self.resolved(param.number, param_like(&column, &column.name, column.array_dims));
            return Ok(());
        }
        if matches!(other, Expr::Column(_) | Expr::Param(_)) {
            return Ok(());
        }
        // Typed after the other expression when it has a known type
        if let Some(column) = self.quietly(|a| a.expr_column(qc, scope, other)) {
            if !column.is_any() {
                self.resolved(param.number, typed_like(&column, column.array_dims));
            }
        }
        Ok(())
    }

    /// Run a typing pass whose errors the other passes already report
    fn quietly<T>(&self, pass: impl FnOnce(&Analyzer<'c>) -> Result<T, SqlError>) -> Option<T> {
        let mode = self.analyzer.mode.replace(AnalysisMode::FailFast);
        let result = pass(self.analyzer);
        self.analyzer.mode.set(mode);
        result.ok()
    }

    fn expr(&mut self, qc: &QueryCatalog<'c>, scope: &Scope<'_>, expr: &Expr) -> Result<(), SqlError> {
        match expr {
            Expr::Param(p) => self.unresolved(p.number, Column::any("")),
            Expr::Column(_) | Expr::Const(_) => {}
            Expr::BinaryOp { op, left, right } => {
                if matches!(infer::classify(op), OpClass::Comparison | OpClass::Arithmetic) {
                    match (param_of(left), param_of(right)) {
                        (Some(p), None) => self.against(qc, scope, p, right)?,
                        (None, Some(p)) => self.against(qc, scope, p, left)?,
                        _ => {}
                    }
                }
                self.expr(qc, scope, left)?;
                self.expr(qc, scope, right)?;
            }
            Expr::Quantified { left, right, .. } => {
                // col = ANY($1) takes an array of the column's type
                if let Some(p) = param_of(right) {
                    if let Some(column) = self.column(scope, left)? {
                        self.resolved(p.number, param_like(&column, &column.name, column.array_dims + 1));
                    }
                }
                if let Some(p) = param_of(left) {
                    if let Some(column) = self.column(scope, right)? {
                        let dims = column.array_dims.saturating_sub(1);
                        self.resolved(p.number, param_like(&column, &column.name, dims));
                    }
                }
                self.expr(qc, scope, left)?;
                self.expr(qc, scope, right)?;
            }
            Expr::In { expr: tested, list, .. } => {
                if let Some(column) = self.column(scope, tested)? {
                    for item in list {
                        if let Some(p) = param_of(item) {
                            self.resolved(p.number, param_like(&column, &column.name, column.array_dims));
                        }
                    }
                }
                self.expr(qc, scope, tested)?;
                for item in list {
                    self.expr(qc, scope, item)?;
                }
            }
            Expr::Between { expr: tested, low, high, .. } => {
                if let Some(column) = self.column(scope, tested)? {
                    if let Some(p) = param_of(low) {
                        let name = format!("from_{}", column.name);
                        self.resolved(p.number, param_like(&column, &name, column.array_dims));
                    }
                    if let Some(p) = param_of(high) {
                        let name = format!("to_{}", column.name);
                        self.resolved(p.number, param_like(&column, &name, column.array_dims));
                    }
                }
                for e in [tested, low, high] {
                    self.expr(qc, scope, e)?;
                }
            }
            Expr::Func(call) => self.func_call(qc, scope, call)?,
            Expr::Coalesce(args) => {
                let mut typed = None;
                for arg in args {
                    if let Expr::Column(cref) = arg {
                        if let Ok(column) = scope.resolve(cref) {
                            typed = Some(column.clone());
                            break;
                        }
                    }
                }
                if let Some(column) = typed {
                    for arg in args {
                        if let Some(p) = param_of(arg) {
                            let param = param_like(&column, &column.name, column.array_dims).with_not_null(false);
                            self.resolved(p.number, param);
                        }
                    }
                }
                for arg in args {
                    self.expr(qc, scope, arg)?;
                }
            }
            Expr::Cast { arg, type_name } => match arg.as_ref() {
                Expr::Param(p) => {
                    let type_name = type_name.clone().canonicalize(self.analyzer.engine);
                    self.resolved(p.number, Column::from_type("", &type_name));
                }
                other => self.expr(qc, scope, other)?,
            },
            Expr::Case(case) => {
                if let Some(arg) = &case.arg {
                    if let Some(column) = self.column(scope, arg)? {
                        for (condition, _) in &case.whens {
                            if let Some(p) = param_of(condition) {
                                self.resolved(p.number, param_like(&column, &column.name, column.array_dims));
                            }
                        }
                    }
                    self.expr(qc, scope, arg)?;
                }
                for (condition, result) in &case.whens {
                    self.expr(qc, scope, condition)?;
                    self.expr(qc, scope, result)?;
                }
                if let Some(default) = &case.default {
                    self.expr(qc, scope, default)?;
                }
            }
            Expr::SubLink(link) => {
                if let Some(test) = &link.test {
                    if let Some(p) = param_of(test) {
                        // $1 IN (SELECT id ...) takes the subquery's column
                        let columns = self.quietly(|a| a.select_columns(qc, Some(scope), &link.subselect));
                        if let Some(first) = columns.and_then(|c| c.into_iter().next()) {
                            if !first.is_any() {
                                self.resolved(p.number, param_like(&first, &first.name, first.array_dims));
                            }
                        }
                    }
                    self.expr(qc, scope, test)?;
                }
                self.select(qc, Some(scope), &link.subselect, None)?;
            }
            Expr::UnaryOp { expr: inner, .. } => self.expr(qc, scope, inner)?,
            Expr::NullTest { arg, .. } => self.expr(qc, scope, arg)?,
            Expr::Bool { args, .. } | Expr::Row(args) | Expr::Array(args) | Expr::Other(args) => {
                for arg in args {
                    self.expr(qc, scope, arg)?;
                }
            }
        }
        Ok(())
    }

    /// Arguments take the declared type of the parameter they bind to
    fn func_call(&mut self, qc: &QueryCatalog<'c>, scope: &Scope<'_>, call: &FuncCall) -> Result<(), SqlError> {
        match self.analyzer.catalog.resolve_func_call(call) {
            Ok(func) => {
                let inputs: Vec<_> = func.in_args().collect();
                for (i, arg) in call.args.iter().enumerate() {
                    let Expr::Param(p) = &arg.value else {
                        continue;
                    };
                    let declared = match &arg.name {
                        Some(label) => inputs.iter().find(|a| a.name.eq_ignore_ascii_case(label)).copied(),
                        None => inputs
                            .get(i)
                            .or_else(|| inputs.last().filter(|a| a.mode == ParamMode::Variadic))
                            .copied(),
                    };
                    let name = match declared {
                        Some(a) if !a.name.is_empty() => a.name.clone(),
                        _ => arg.name.clone().unwrap_or_else(|| func.name.clone()),
                    };
                    match declared {
                        Some(a) if !POLYMORPHIC.contains(&a.type_name.name.as_str()) => {
                            self.resolved(p.number, Column::from_type(name, &a.type_name).with_not_null(true));
                        }
                        _ => self.unresolved(p.number, Column::any(name)),
                    }
                }
            }
            Err(err) if is_unknown_function(&err) => {
                for arg in &call.args {
                    if let Expr::Param(p) = &arg.value {
                        let name = arg.name.clone().unwrap_or_else(|| call.name.name.clone());
                        self.unresolved(p.number, Column::any(name));
                    }
                }
            }
            // reported by validation
            Err(_) => {}
        }

        for arg in &call.args {
            self.expr(qc, scope, &arg.value)?;
        }
        if let Some(over) = &call.over {
            for expr in over.partition_by.iter().chain(&over.order_by) {
                self.expr(qc, scope, expr)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{analyze, catalog};
    use pretty_assertions::assert_eq;
    use sqlprism_core::Engine;

    const SCHEMA: &str = "
        CREATE TABLE authors (id BIGINT PRIMARY KEY, name TEXT NOT NULL, bio TEXT, tags TEXT[] NOT NULL, born DATE);
    ";

    fn params(engine: Engine, sql: &str) -> Vec<(usize, String, String, bool)> {
        let catalog = catalog(engine, SCHEMA);
        analyze(&catalog, sql)
            .unwrap()
            .params
            .into_iter()
            .map(|p| (p.number, p.column.name, p.column.data_type, p.column.not_null))
            .collect()
    }

    fn p(number: usize, name: &str, data_type: &str, not_null: bool) -> (usize, String, String, bool) {
        (number, name.to_string(), data_type.to_string(), not_null)
    }

    #[test]
    fn comparison_and_limit() {
        assert_eq!(
            params(
                Engine::Postgresql,
                "SELECT id FROM authors WHERE name = $1 AND bio <> $2 LIMIT $3 OFFSET $4"
            ),
            vec![
                p(1, "name", "text", true),
                p(2, "bio", "text", false),
                p(3, "limit", "integer", true),
                p(4, "offset", "integer", true),
            ]
        );
    }

    #[test]
    fn between_in_and_any() {
        let catalog = catalog(Engine::Postgresql, SCHEMA);
        let query = analyze(
            &catalog,
            "SELECT id FROM authors WHERE born BETWEEN $1 AND $2 AND id IN ($3, $4) AND id = ANY($5::bigint[])",
        )
        .unwrap();
        let names: Vec<_> = query.params.iter().map(|p| p.column.name.as_str()).collect();
        assert_eq!(names, vec!["from_born", "to_born", "id", "id", "id"]);
        assert!(query.params[4].column.is_array);
        assert!(!query.params[0].column.is_array);
    }

    #[test]
    fn insert_and_update_targets() {
        assert_eq!(
            params(Engine::Postgresql, "INSERT INTO authors VALUES ($1, $2, $3, $4, $5)"),
            vec![
                p(1, "id", "bigint", true),
                p(2, "name", "text", true),
                p(3, "bio", "text", false),
                p(4, "tags", "text", true),
                p(5, "born", "date", false),
            ]
        );
        assert_eq!(
            params(Engine::Postgresql, "UPDATE authors SET bio = $2 WHERE id = $1"),
            vec![p(1, "id", "bigint", true), p(2, "bio", "text", false)]
        );
    }

    #[test]
    fn function_arguments_and_casts() {
        assert_eq!(
            params(Engine::Postgresql, "SELECT id FROM authors WHERE lower(name) = lower($1) AND born > $2::date"),
            vec![p(1, "lower", "text", true), p(2, "born", "date", false)]
        );
        assert_eq!(
            params(Engine::Postgresql, "SELECT mystery($1)"),
            vec![p(1, "mystery", "any", false)]
        );
    }

    #[test]
    fn mysql_placeholders_follow_appearance() {
        assert_eq!(
            params(Engine::Mysql, "SELECT id FROM authors WHERE name = ? AND id > ? LIMIT ?"),
            vec![p(1, "name", "text", true), p(2, "id", "bigint", true), p(3, "limit", "int", true)]
        );
    }

    #[test]
    fn gaps_are_reported() {
        let catalog = catalog(Engine::Postgresql, SCHEMA);
        let err = analyze(&catalog, "SELECT id FROM authors WHERE id = $1 OR id = $3").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndeterminedParameter(2));
    }

    #[test]
    fn repeated_number_keeps_first_context() {
        assert_eq!(
            params(Engine::Postgresql, "SELECT id FROM authors WHERE id = $1 OR name = $1"),
            vec![p(1, "id", "bigint", true)]
        );
        assert_eq!(
            params(Engine::Postgresql, "SELECT id FROM authors WHERE name = $1 OR id = $1"),
            vec![p(1, "name", "text", true)]
        );
    }

    #[test]
    fn unknown_function_argument_yields_to_a_later_column() {
        assert_eq!(
            params(Engine::Postgresql, "SELECT id FROM authors WHERE mystery($1) AND id = $1"),
            vec![p(1, "id", "bigint", true)]
        );
        assert_eq!(
            params(Engine::Postgresql, "SELECT id FROM authors WHERE id = $1 AND mystery($1)"),
            vec![p(1, "id", "bigint", true)]
        );
    }

    #[test]
    fn slices_take_the_in_column_type() {
        let catalog = catalog(Engine::Mysql, SCHEMA);
        let query = analyze(&catalog, "SELECT name FROM authors WHERE id IN (sqlprism.slice(ids)) AND name = ?").unwrap();
        let slice = &query.params[0].column;
        assert_eq!((slice.name.as_str(), slice.data_type.as_str()), ("ids", "bigint"));
        assert!(slice.is_slice && slice.is_named_param && !slice.is_array);
        assert!(!query.params[1].column.is_slice);
        assert!(query.sql.contains("IN (/*SLICE:ids*/?)"));
    }

    #[test]
    fn named_parameters_override_inference() {
        assert_eq!(
            params(
                Engine::Postgresql,
                "SELECT id FROM authors WHERE name = sqlprism.narg(author_name) LIMIT sqlprism.arg(page_size)"
            ),
            vec![p(1, "author_name", "text", false), p(2, "page_size", "integer", true)]
        );
    }
}
