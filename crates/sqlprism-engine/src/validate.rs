//! Reference and function checks
//!
//! Runs before any typing pass. Checks function calls against the catalog,
//! that ORDER BY / GROUP BY / window references name an output column or a
//! column in scope, and that INSERT and UPDATE target columns exist. A
//! `sqlprism.slice` must be the only item of its `IN` list.

use std::collections::HashSet;

use sqlprism_core::{ErrorKind, SqlError};
use sqlprism_sql::ast::{
    ColumnRef, Expr, FromItem, FuncCall, RangeVar, SelectStmt, SetTarget, Stmt, WindowDef, WithClause,
};
use sqlprism_sql::visit::{walk_expr, walk_from_item, walk_select, walk_stmt, walk_with, Visitor};
use sqlprism_sql::ParamSet;
use tracing::debug;

use crate::analyze::{AnalysisMode, Analyzer};
use crate::output::is_unknown_function;
use crate::scope::{QueryCatalog, Scope, Table};

/// Namespace of the macros rewritten before parsing
const MACRO_SCHEMA: &str = "sqlprism";

impl<'c> Analyzer<'c> {
    pub(crate) fn validate(&self, qc: &QueryCatalog<'c>, stmt: &Stmt, params: &ParamSet) -> Result<(), SqlError> {
        let mut validator = Validator {
            analyzer: self,
            params,
            qc: qc.clone(),
            failed: None,
        };
        validator.visit_stmt(stmt);
        match validator.failed {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct Validator<'a, 'c> {
    analyzer: &'a Analyzer<'c>,
    params: &'a ParamSet,
    /// Grows as WITH clauses are passed in source order
    qc: QueryCatalog<'c>,
    failed: Option<SqlError>,
}

impl<'a, 'c> Validator<'a, 'c> {
    fn report(&mut self, err: SqlError) {
        if self.failed.is_some() {
            return;
        }
        if let Err(err) = self.analyzer.check::<()>(Err(err)) {
            self.failed = Some(err);
        }
    }

    fn check_call(&mut self, call: &FuncCall) {
        if call.name.schema == MACRO_SCHEMA {
            self.report(ErrorKind::FunctionNotFound(call.name.to_string()).into());
            return;
        }
        match self.analyzer.catalog.resolve_func_call(call) {
            Ok(_) => {}
            Err(err) if is_unknown_function(&err) => {
                if self.analyzer.strict_function_checks {
                    self.report(err);
                } else {
                    debug!(function = %call.name, "call to unknown function");
                }
            }
            Err(err) => self.report(err),
        }
    }

    fn check_slices(&mut self, tested: &Expr, list: &[Expr]) {
        if list.len() < 2 {
            return;
        }
        for item in list {
            let Expr::Param(p) = item else { continue };
            if !self.params.is_slice(p.number) {
                continue;
            }
            let tested = match tested {
                Expr::Column(cref) => cref.joined("."),
                _ => "...".to_string(),
            };
            let name = self.params.get(p.number).map(|param| param.name.as_str()).unwrap_or("?");
            let err = SqlError::invalid(format!(
                "expected '{} IN' expr to consist only of sqlprism.slice({})",
                tested, name
            ));
            self.report(err.or_location(p.location));
            return;
        }
    }

    fn check_targets(&mut self, table: &Table, columns: impl IntoIterator<Item = String>) {
        for column in columns {
            if table.column(&column).is_none() {
                self.report(
                    ErrorKind::ColumnNotFound {
                        relation: table.rel.name.clone(),
                        column,
                    }
                    .into(),
                );
            }
        }
    }

    fn target_table(&mut self, relation: &RangeVar) -> Option<Table> {
        match self.qc.get_table(&relation.name) {
            Ok(table) => Some(table),
            Err(err) => {
                self.report(err);
                None
            }
        }
    }

    /// ORDER BY, GROUP BY and window references of one SELECT
    fn check_references(&mut self, select: &SelectStmt) {
        if !self.analyzer.strict_order_by {
            return;
        }
        let projection = select.leftmost();

        let mut refs = ColumnRefs::default();
        for expr in select.order_by.iter().chain(&select.group_by) {
            refs.visit_expr(expr);
        }
        for window in &select.windows {
            refs.window(window);
        }
        let mut windows = InlineWindows::default();
        if select.set_op.is_none() {
            for target in &select.targets {
                windows.visit_expr(&target.val);
            }
        }
        for window in &windows.found {
            refs.window(window);
        }
        if refs.found.is_empty() {
            return;
        }

        let outputs = self.output_names(select);
        let scope = match self.quietly(|a, qc| a.from_scope(qc, None, &projection.from, false)) {
            Some(scope) => scope,
            None => return,
        };
        for cref in &refs.found {
            self.check_reference(&scope, &outputs, cref);
        }
    }

    fn check_reference(&mut self, scope: &Scope<'_>, outputs: &HashSet<String>, cref: &ColumnRef) {
        if cref.fields.len() == 1 && outputs.contains(&cref.fields[0]) {
            return;
        }
        match scope.resolve(cref) {
            Ok(_) => {}
            Err(err) if matches!(err.kind, ErrorKind::ColumnDoesNotExist(_)) => {
                self.report(ErrorKind::ColumnReferenceNotFound(cref.joined(".")).into());
            }
            Err(err) => self.report(err),
        }
    }

    /// Names a SELECT's result columns go by
    fn output_names(&self, select: &SelectStmt) -> HashSet<String> {
        let mut names: HashSet<String> = select
            .leftmost()
            .targets
            .iter()
            .filter_map(|t| match (&t.name, &t.val) {
                (Some(name), _) => Some(name.clone()),
                (None, Expr::Column(cref)) => cref.name().map(str::to_string),
                _ => None,
            })
            .collect();
        if let Some(columns) = self.quietly(|a, qc| a.select_columns(qc, None, select)) {
            names.extend(columns.into_iter().map(|c| c.name));
        }
        names
    }

    /// Run a typing pass whose failures other passes report
    fn quietly<T>(&self, pass: impl FnOnce(&Analyzer<'c>, &QueryCatalog<'c>) -> Result<T, SqlError>) -> Option<T> {
        let mode = self.analyzer.mode.replace(AnalysisMode::FailFast);
        let result = pass(self.analyzer, &self.qc);
        self.analyzer.mode.set(mode);
        result.ok()
    }
}

fn set_columns(targets: &[SetTarget]) -> impl Iterator<Item = String> + '_ {
    targets.iter().map(|t| t.column.clone())
}

impl Visitor for Validator<'_, '_> {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Insert(insert) => {
                if let Some(table) = self.target_table(&insert.relation) {
                    self.check_targets(&table, insert.columns.iter().cloned());
                    self.check_targets(&table, set_columns(&insert.on_conflict));
                }
            }
            Stmt::Update(update) => {
                if let Some(table) = self.target_table(&update.relation) {
                    self.check_targets(&table, set_columns(&update.targets));
                }
            }
            _ => {}
        }
        walk_stmt(self, stmt);
    }

    fn visit_with(&mut self, with: &WithClause) {
        if let Some(qc) = self.quietly(|a, qc| a.with_ctes(qc, Some(with))) {
            self.qc = qc;
        }
        walk_with(self, with);
    }

    fn visit_select(&mut self, select: &SelectStmt) {
        walk_select(self, select);
        if select.set_op.is_some() || select.values.is_empty() {
            self.check_references(select);
        }
    }

    fn visit_from_item(&mut self, item: &FromItem) {
        if let FromItem::Function { call, .. } = item {
            self.check_call(call);
        }
        walk_from_item(self, item);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Func(call) => self.check_call(call),
            Expr::In { expr: tested, list, .. } => self.check_slices(tested, list),
            _ => {}
        }
        walk_expr(self, expr);
    }
}

/// Column references of an expression, outside of subqueries
#[derive(Default)]
struct ColumnRefs {
    found: Vec<ColumnRef>,
}

impl ColumnRefs {
    fn window(&mut self, window: &WindowDef) {
        for expr in window.partition_by.iter().chain(&window.order_by) {
            self.visit_expr(expr);
        }
    }
}

impl Visitor for ColumnRefs {
    fn visit_select(&mut self, _select: &SelectStmt) {}

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Column(cref) if !cref.star && !cref.embed => self.found.push(cref.clone()),
            Expr::Const(_) => {}
            _ => walk_expr(self, expr),
        }
    }
}

/// `OVER (...)` clauses written inline in a target list
#[derive(Default)]
struct InlineWindows {
    found: Vec<WindowDef>,
}

impl Visitor for InlineWindows {
    fn visit_select(&mut self, _select: &SelectStmt) {}

    fn visit_expr(&mut self, expr: &Expr) {
        if let Expr::Func(FuncCall { over: Some(over), .. }) = expr {
            self.found.push(over.clone());
        }
        walk_expr(self, expr);
    }
}
