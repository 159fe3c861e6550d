//! Conversion from `sqlparser` statements to the common AST
//!
//! Only shapes that matter for name and type resolution are carried over.
//! Parts of the grammar's tree whose exact layout is version-sensitive are
//! read through their `Display` output instead of being destructured.

use std::ops::ControlFlow;
use sqlparser::ast as sql;
use sqlparser::dialect::Dialect;
use sqlprism_core::{Engine, FuncName, SqlError, TableName, TypeName};
use tracing::debug;
use crate::ast::{
    Alias, AlterTableCmd, AlterTableStmt, BoolOp, CaseExpr, ColumnDef, ColumnRef, Const,
    CreateTableAsStmt, CreateTableStmt, CreateViewStmt, Cte, DeleteStmt, DropSchemaStmt,
    DropTableStmt, Expr, FromItem, FuncArg, FuncCall, InsertStmt, JoinExpr, JoinKind, ParamRef,
    RangeVar, RenameColumnStmt, RenameTableStmt, ResTarget, SelectStmt, SetOp, SetOperation,
    SetTarget, Stmt, SubLink, SubLinkKind, UpdateStmt, WindowDef, WithClause,
};
use crate::source::{tokenize, PlaceholderSite, StarSite, Token, TokenKind};

/// Fold an identifier: unquoted names are case-insensitive
pub(crate) fn ident(id: &sql::Ident) -> String {
    if id.quote_style.is_none() {
        id.value.to_lowercase()
    } else {
        id.value.clone()
    }
}

fn object_parts(name: &sql::ObjectName) -> Vec<String> {
    name.0.iter().map(ident).collect()
}

/// Label of a statement the analyzer does not model
fn statement_label(stmt: &sql::Statement) -> String {
    let text = stmt.to_string();
    let words: Vec<&str> = text.split_whitespace().take(2).collect();
    words.join(" ").to_ascii_uppercase()
}

/// Join kind and constraint of a parsed join
fn join_parts(op: &sql::JoinOperator) -> (JoinKind, Option<&sql::JoinConstraint>) {
    match op {
        sql::JoinOperator::Inner(c)
        | sql::JoinOperator::Semi(c)
        | sql::JoinOperator::LeftSemi(c)
        | sql::JoinOperator::RightSemi(c)
        | sql::JoinOperator::Anti(c)
        | sql::JoinOperator::LeftAnti(c)
        | sql::JoinOperator::RightAnti(c) => (JoinKind::Inner, Some(c)),
        sql::JoinOperator::AsOf { constraint, .. } => (JoinKind::Inner, Some(constraint)),
        sql::JoinOperator::LeftOuter(c) => (JoinKind::Left, Some(c)),
        sql::JoinOperator::RightOuter(c) => (JoinKind::Right, Some(c)),
        sql::JoinOperator::FullOuter(c) => (JoinKind::Full, Some(c)),
        sql::JoinOperator::OuterApply => (JoinKind::Left, None),
        sql::JoinOperator::CrossJoin | sql::JoinOperator::CrossApply => (JoinKind::Cross, None),
    }
}

fn unsupported(what: impl Into<String>) -> SqlError {
    SqlError::new(sqlprism_core::ErrorKind::UnsupportedStatementType(what.into()))
}

/// Converts one parsed statement, assigning star and placeholder sites in
/// source order
pub(crate) struct Converter<'a> {
    engine: Engine,
    dialect: &'a dyn Dialect,
    /// Text handed to the grammar
    sql: &'a str,
    stars: &'a [StarSite],
    star_cursor: usize,
    placeholders: &'a [PlaceholderSite],
    placeholder_cursor: usize,
}

impl<'a> Converter<'a> {
    pub(crate) fn new(
        engine: Engine,
        dialect: &'a dyn Dialect,
        sql: &'a str,
        stars: &'a [StarSite],
        placeholders: &'a [PlaceholderSite],
    ) -> Self {
        Self {
            engine,
            dialect,
            sql,
            stars,
            star_cursor: 0,
            placeholders,
            placeholder_cursor: 0,
        }
    }

    pub(crate) fn statement(&mut self, stmt: &sql::Statement) -> Result<Vec<Stmt>, SqlError> {
        let converted = match stmt {
            sql::Statement::Query(q) => self.query_stmt(q)?,
            sql::Statement::Insert(_) | sql::Statement::Update { .. } | sql::Statement::Delete(_) => self.dml(stmt)?,
            sql::Statement::CreateTable(ct) => self.create_table(ct)?,
            sql::Statement::AlterTable { name, if_exists, operations, .. } => {
                return self.alter_table(name, *if_exists, operations);
            }
            sql::Statement::CreateView { or_replace, name, query, .. } => {
                Stmt::CreateView(Box::new(CreateViewStmt {
                    name: TableName::from_parts(&object_parts(name))?,
                    replace: *or_replace,
                    alter: false,
                    query: Box::new(self.query(query)?),
                }))
            }
            sql::Statement::AlterView { name, query, .. } => Stmt::CreateView(Box::new(CreateViewStmt {
                name: TableName::from_parts(&object_parts(name))?,
                replace: true,
                alter: true,
                query: Box::new(self.query(query)?),
            })),
            sql::Statement::Drop { object_type, if_exists, names, .. } => match object_type {
                sql::ObjectType::Table | sql::ObjectType::View => Stmt::DropTable(DropTableStmt {
                    tables: names
                        .iter()
                        .map(|n| TableName::from_parts(&object_parts(n)))
                        .collect::<Result<_, _>>()?,
                    if_exists: *if_exists,
                }),
                sql::ObjectType::Schema => Stmt::DropSchema(DropSchemaStmt {
                    schemas: names.iter().map(|n| object_parts(n).join(".")).collect(),
                    if_exists: *if_exists,
                }),
                _ => Stmt::Unsupported(statement_label(stmt)),
            },
            other => Stmt::Unsupported(statement_label(other)),
        };
        Ok(vec![converted])
    }

    fn dml(&mut self, stmt: &sql::Statement) -> Result<Stmt, SqlError> {
        match stmt {
            sql::Statement::Insert(insert) => self.insert(insert),
            sql::Statement::Update { table, assignments, selection, returning, .. } => {
                self.update(table, assignments, selection.as_ref(), returning.as_deref())
            }
            sql::Statement::Delete(delete) => self.delete(delete),
            other => Err(unsupported(statement_label(other))),
        }
    }

    /// A query, which may be a data-modifying statement under a WITH clause
    fn query_stmt(&mut self, q: &sql::Query) -> Result<Stmt, SqlError> {
        match q.body.as_ref() {
            sql::SetExpr::Insert(inner) | sql::SetExpr::Update(inner) => {
                let with = q.with.as_ref().map(|w| self.with(w)).transpose()?;
                let mut stmt = self.dml(inner)?;
                match &mut stmt {
                    Stmt::Insert(n) => n.with = with,
                    Stmt::Update(n) => n.with = with,
                    Stmt::Delete(n) => n.with = with,
                    _ => {}
                }
                Ok(stmt)
            }
            _ => Ok(Stmt::Select(Box::new(self.query(q)?))),
        }
    }

    fn with(&mut self, with: &sql::With) -> Result<WithClause, SqlError> {
        let mut ctes = Vec::with_capacity(with.cte_tables.len());
        for cte in &with.cte_tables {
            let columns = cte.alias.columns.iter().map(|c| ident(&c.name)).collect();
            ctes.push(Cte {
                name: ident(&cte.alias.name),
                columns,
                query: Box::new(self.query_stmt(&cte.query)?),
            });
        }
        Ok(WithClause {
            recursive: with.recursive,
            ctes,
        })
    }

    fn query(&mut self, q: &sql::Query) -> Result<SelectStmt, SqlError> {
        let with = q.with.as_ref().map(|w| self.with(w)).transpose()?;
        let mut select = self.set_expr(&q.body)?;
        if with.is_some() {
            select.with = with;
        }
        if let Some(order_by) = &q.order_by {
            select.order_by = order_by
                .exprs
                .iter()
                .map(|o| self.expr(&o.expr))
                .collect::<Result<_, _>>()?;
        }
        if let Some(limit) = &q.limit {
            select.limit = Some(self.expr(limit)?);
        }
        if let Some(offset) = &q.offset {
            select.offset = Some(self.expr(&offset.value)?);
        }
        if select.limit.is_none() {
            if let Some(quantity) = q.fetch.as_ref().and_then(|f| f.quantity.as_ref()) {
                select.limit = Some(self.expr(quantity)?);
            }
        }
        Ok(select)
    }

    fn set_expr(&mut self, body: &sql::SetExpr) -> Result<SelectStmt, SqlError> {
        match body {
            sql::SetExpr::Select(select) => self.select(select),
            sql::SetExpr::Query(q) => self.query(q),
            sql::SetExpr::SetOperation { op, set_quantifier, left, right } => {
                let left = self.set_expr(left)?;
                let right = self.set_expr(right)?;
                let op = match op {
                    sql::SetOperator::Union => SetOp::Union,
                    sql::SetOperator::Intersect => SetOp::Intersect,
                    _ => SetOp::Except,
                };
                Ok(SelectStmt {
                    set_op: Some(SetOperation {
                        op,
                        all: matches!(set_quantifier, sql::SetQuantifier::All),
                        left: Box::new(left),
                        right: Box::new(right),
                    }),
                    ..SelectStmt::default()
                })
            }
            sql::SetExpr::Values(values) => {
                let mut rows = Vec::with_capacity(values.rows.len());
                for row in &values.rows {
                    rows.push(row.iter().map(|e| self.expr(e)).collect::<Result<Vec<_>, _>>()?);
                }
                Ok(SelectStmt {
                    values: rows,
                    ..SelectStmt::default()
                })
            }
            other => Err(unsupported(format!("set expression {}", other))),
        }
    }

    fn select(&mut self, s: &sql::Select) -> Result<SelectStmt, SqlError> {
        let mut out = SelectStmt::default();
        match &s.distinct {
            Some(sql::Distinct::On(exprs)) => {
                out.distinct = true;
                out.distinct_on = exprs.iter().map(|e| self.expr(e)).collect::<Result<_, _>>()?;
            }
            Some(_) => out.distinct = true,
            None => {}
        }

        out.targets = self.targets(&s.projection)?;

        for twj in &s.from {
            out.from.push(self.from_item(twj)?);
        }
        if let Some(selection) = &s.selection {
            out.where_clause = Some(self.expr(selection)?);
        }
        if let sql::GroupByExpr::Expressions(exprs, _) = &s.group_by {
            out.group_by = exprs.iter().map(|e| self.expr(e)).collect::<Result<_, _>>()?;
        }
        if let Some(having) = &s.having {
            out.having = Some(self.expr(having)?);
        }
        Ok(out)
    }

    fn targets(&mut self, items: &[sql::SelectItem]) -> Result<Vec<ResTarget>, SqlError> {
        let mut targets = Vec::with_capacity(items.len());
        for item in items {
            let target = match item {
                sql::SelectItem::UnnamedExpr(e) => ResTarget::new(self.target_expr(e)?),
                sql::SelectItem::ExprWithAlias { expr, alias } => {
                    ResTarget::new(self.target_expr(expr)?).with_name(ident(alias))
                }
                sql::SelectItem::QualifiedWildcard(name, _) => {
                    let qualifier = object_parts(name);
                    ResTarget::new(Expr::Column(self.star_ref(qualifier, false)))
                }
                sql::SelectItem::Wildcard(_) => ResTarget::new(Expr::Column(self.star_ref(Vec::new(), false))),
            };
            targets.push(target);
        }
        Ok(targets)
    }

    /// A target expression; `sqlprism.embed(t)` stands for all of `t`'s columns
    fn target_expr(&mut self, e: &sql::Expr) -> Result<Expr, SqlError> {
        if let sql::Expr::Function(f) = e {
            let parts = object_parts(&f.name);
            if parts.len() == 2 && parts[0] == "sqlprism" && parts[1] == "embed" {
                if let sql::FunctionArguments::List(list) = &f.args {
                    if let [sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(sql::Expr::Identifier(id)))] =
                        list.args.as_slice()
                    {
                        return Ok(Expr::Column(self.star_ref(vec![ident(id)], true)));
                    }
                }
                return Err(SqlError::invalid("expected parameter to sqlprism.embed to be a table reference"));
            }
        }
        self.expr(e)
    }

    fn star_ref(&mut self, qualifier: Vec<String>, embed: bool) -> ColumnRef {
        let mut col = ColumnRef::star(qualifier);
        col.embed = embed;
        let found = self.stars[self.star_cursor.min(self.stars.len())..]
            .iter()
            .position(|s| s.embed == embed && s.qualifier == col.fields);
        if let Some(i) = found {
            let site = &self.stars[self.star_cursor + i];
            col.location = Some(site.start);
            col.len = site.end - site.start;
            self.star_cursor += i + 1;
        }
        col
    }

    fn placeholder(&mut self, text: &str) -> Result<Expr, SqlError> {
        let digits = text.trim_start_matches(['$', '?']);
        let number = digits
            .parse::<usize>()
            .map_err(|_| SqlError::invalid(format!("unsupported placeholder {}", text)))?;
        let from = self.placeholder_cursor.min(self.placeholders.len());
        let found = self.placeholders[from..]
            .iter()
            .position(|p| p.number == number)
            .map(|i| from + i)
            .or_else(|| self.placeholders.iter().position(|p| p.number == number));
        let location = found.map(|i| {
            self.placeholder_cursor = i + 1;
            self.placeholders[i].start
        });
        Ok(Expr::Param(ParamRef { number, location }))
    }

    /// Placeholders anywhere below an expression kind that is not modelled
    fn params_within<V: sql::Visit>(&mut self, node: &V) -> Result<Vec<Expr>, SqlError> {
        let mut found = Vec::new();
        let _ = sql::visit_expressions(node, |e| {
            if let sql::Expr::Value(sql::Value::Placeholder(p)) = e {
                found.push(p.clone());
            }
            ControlFlow::<()>::Continue(())
        });
        found.iter().map(|p| self.placeholder(p)).collect()
    }

    fn boxed(&mut self, e: &sql::Expr) -> Result<Box<Expr>, SqlError> {
        Ok(Box::new(self.expr(e)?))
    }

    fn exprs(&mut self, list: &[sql::Expr]) -> Result<Vec<Expr>, SqlError> {
        list.iter().map(|e| self.expr(e)).collect()
    }

    pub(crate) fn expr(&mut self, e: &sql::Expr) -> Result<Expr, SqlError> {
        let out = match e {
            sql::Expr::Identifier(id) => Expr::Column(ColumnRef::new(vec![ident(id)])),
            sql::Expr::CompoundIdentifier(ids) => Expr::Column(ColumnRef::new(ids.iter().map(ident).collect())),
            sql::Expr::Value(v) => self.value(v)?,
            sql::Expr::Nested(inner) => self.expr(inner)?,
            sql::Expr::Collate { expr, .. } => self.expr(expr)?,
            sql::Expr::BinaryOp { left, op, right } => match op {
                sql::BinaryOperator::And => self.bool_expr(BoolOp::And, left, right)?,
                sql::BinaryOperator::Or => self.bool_expr(BoolOp::Or, left, right)?,
                _ => Expr::BinaryOp {
                    op: op.to_string(),
                    left: self.boxed(left)?,
                    right: self.boxed(right)?,
                },
            },
            sql::Expr::UnaryOp { op, expr } => {
                let inner = self.expr(expr)?;
                match (op, inner) {
                    (sql::UnaryOperator::Not, inner) => Expr::Bool {
                        op: BoolOp::Not,
                        args: vec![inner],
                    },
                    (sql::UnaryOperator::Minus, Expr::Const(Const::Integer(n))) => Expr::Const(Const::Integer(-n)),
                    (sql::UnaryOperator::Minus, Expr::Const(Const::Float(f))) => Expr::Const(Const::Float(format!("-{}", f))),
                    (op, inner) => Expr::UnaryOp {
                        op: op.to_string(),
                        expr: Box::new(inner),
                    },
                }
            }
            sql::Expr::IsNull(inner) => Expr::NullTest {
                arg: self.boxed(inner)?,
                negated: false,
            },
            sql::Expr::IsNotNull(inner) => Expr::NullTest {
                arg: self.boxed(inner)?,
                negated: true,
            },
            sql::Expr::IsDistinctFrom(left, right) => Expr::BinaryOp {
                op: "IS DISTINCT FROM".to_string(),
                left: self.boxed(left)?,
                right: self.boxed(right)?,
            },
            sql::Expr::IsNotDistinctFrom(left, right) => Expr::BinaryOp {
                op: "IS NOT DISTINCT FROM".to_string(),
                left: self.boxed(left)?,
                right: self.boxed(right)?,
            },
            sql::Expr::InList { expr, list, negated } => Expr::In {
                expr: self.boxed(expr)?,
                list: self.exprs(list)?,
                negated: *negated,
            },
            sql::Expr::InSubquery { expr, subquery, negated } => Expr::SubLink(SubLink {
                kind: SubLinkKind::Any("=".to_string()),
                test: Some(self.boxed(expr)?),
                subselect: Box::new(self.query(subquery)?),
                negated: *negated,
            }),
            sql::Expr::Between { expr, negated, low, high } => Expr::Between {
                expr: self.boxed(expr)?,
                low: self.boxed(low)?,
                high: self.boxed(high)?,
                negated: *negated,
            },
            sql::Expr::Like { negated, expr, pattern, .. } => self.pattern_op("LIKE", *negated, expr, pattern)?,
            sql::Expr::ILike { negated, expr, pattern, .. } => self.pattern_op("ILIKE", *negated, expr, pattern)?,
            sql::Expr::SimilarTo { negated, expr, pattern, .. } => {
                self.pattern_op("SIMILAR TO", *negated, expr, pattern)?
            }
            sql::Expr::AnyOp { left, compare_op, right, .. } => self.quantified(left, compare_op, right, false)?,
            sql::Expr::AllOp { left, compare_op, right } => self.quantified(left, compare_op, right, true)?,
            sql::Expr::Cast { expr, data_type, .. } => Expr::Cast {
                arg: self.boxed(expr)?,
                type_name: self.type_name(data_type)?,
            },
            sql::Expr::TypedString { data_type, .. } => Expr::Cast {
                arg: Box::new(Expr::Const(Const::String(String::new()))),
                type_name: self.type_name(data_type)?,
            },
            sql::Expr::Function(f) => self.function(f)?,
            sql::Expr::Case { operand, conditions, results, else_result } => {
                let arg = operand.as_ref().map(|o| self.boxed(o)).transpose()?;
                let mut whens = Vec::with_capacity(conditions.len());
                for (cond, result) in conditions.iter().zip(results) {
                    whens.push((self.expr(cond)?, self.expr(result)?));
                }
                let default = else_result.as_ref().map(|e| self.boxed(e)).transpose()?;
                Expr::Case(CaseExpr { arg, whens, default })
            }
            sql::Expr::Exists { subquery, negated } => Expr::SubLink(SubLink {
                kind: SubLinkKind::Exists,
                test: None,
                subselect: Box::new(self.query(subquery)?),
                negated: *negated,
            }),
            sql::Expr::Subquery(q) => Expr::SubLink(SubLink {
                kind: SubLinkKind::Expr,
                test: None,
                subselect: Box::new(self.query(q)?),
                negated: false,
            }),
            sql::Expr::Tuple(items) => Expr::Row(self.exprs(items)?),
            sql::Expr::Array(array) => Expr::Array(self.exprs(&array.elem)?),
            sql::Expr::Substring { expr, substring_from, substring_for, .. } => {
                let mut args = vec![self.expr(expr)?];
                if let Some(from) = substring_from {
                    args.push(self.expr(from)?);
                }
                if let Some(count) = substring_for {
                    args.push(self.expr(count)?);
                }
                Expr::Func(FuncCall::new(FuncName::new("substring"), args))
            }
            sql::Expr::Position { expr, r#in } => {
                let args = vec![self.expr(expr)?, self.expr(r#in)?];
                Expr::Func(FuncCall::new(FuncName::new("position"), args))
            }
            sql::Expr::Wildcard(..) => Expr::Column(ColumnRef::star(Vec::new())),
            sql::Expr::QualifiedWildcard(name, ..) => Expr::Column(ColumnRef::star(object_parts(name))),
            other => Expr::Other(self.params_within(other)?),
        };
        Ok(out)
    }

    fn bool_expr(&mut self, op: BoolOp, left: &sql::Expr, right: &sql::Expr) -> Result<Expr, SqlError> {
        let mut args = Vec::new();
        for side in [left, right] {
            match self.expr(side)? {
                Expr::Bool { op: inner, args: nested } if inner == op => args.extend(nested),
                other => args.push(other),
            }
        }
        Ok(Expr::Bool { op, args })
    }

    fn pattern_op(
        &mut self,
        op: &str,
        negated: bool,
        expr: &sql::Expr,
        pattern: &sql::Expr,
    ) -> Result<Expr, SqlError> {
        let op = if negated { format!("NOT {}", op) } else { op.to_string() };
        Ok(Expr::BinaryOp {
            op,
            left: self.boxed(expr)?,
            right: self.boxed(pattern)?,
        })
    }

    fn quantified(
        &mut self,
        left: &sql::Expr,
        op: &sql::BinaryOperator,
        right: &sql::Expr,
        all: bool,
    ) -> Result<Expr, SqlError> {
        let op = op.to_string();
        if let sql::Expr::Subquery(q) = right {
            let test = Some(self.boxed(left)?);
            let kind = if all { SubLinkKind::All(op) } else { SubLinkKind::Any(op) };
            return Ok(Expr::SubLink(SubLink {
                kind,
                test,
                subselect: Box::new(self.query(q)?),
                negated: false,
            }));
        }
        Ok(Expr::Quantified {
            left: self.boxed(left)?,
            op,
            right: self.boxed(right)?,
            all,
        })
    }

    fn value(&mut self, v: &sql::Value) -> Result<Expr, SqlError> {
        let c = match v {
            sql::Value::Number(n, _) => match n.parse::<i64>() {
                Ok(i) => Const::Integer(i),
                Err(_) => Const::Float(n.clone()),
            },
            sql::Value::SingleQuotedString(s) | sql::Value::DoubleQuotedString(s) => Const::String(s.clone()),
            sql::Value::DollarQuotedString(d) => Const::String(d.value.clone()),
            sql::Value::Boolean(b) => Const::Boolean(*b),
            sql::Value::Null => Const::Null,
            sql::Value::Placeholder(p) => return self.placeholder(p),
            other => Const::String(other.to_string()),
        };
        Ok(Expr::Const(c))
    }

    fn function(&mut self, f: &sql::Function) -> Result<Expr, SqlError> {
        let parts = object_parts(&f.name);
        let name = FuncName::from_parts(&parts)?;
        let mut call = FuncCall::new(name, Vec::new());

        match &f.args {
            sql::FunctionArguments::List(list) => {
                call.distinct = matches!(list.duplicate_treatment, Some(sql::DuplicateTreatment::Distinct));
                for arg in &list.args {
                    match arg {
                        sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(e)) => {
                            let value = self.expr(e)?;
                            call.args.push(FuncArg { name: None, value });
                        }
                        sql::FunctionArg::Unnamed(_) => call.star = true,
                        sql::FunctionArg::Named { name, arg: sql::FunctionArgExpr::Expr(e), .. } => {
                            let value = self.expr(e)?;
                            call.args.push(FuncArg { name: Some(ident(name)), value });
                        }
                        other => {
                            for value in self.params_within(other)? {
                                call.args.push(FuncArg { name: None, value });
                            }
                        }
                    }
                }
            }
            sql::FunctionArguments::Subquery(q) => {
                let subselect = Box::new(self.query(q)?);
                call.args.push(FuncArg {
                    name: None,
                    value: Expr::SubLink(SubLink {
                        kind: SubLinkKind::Expr,
                        test: None,
                        subselect,
                        negated: false,
                    }),
                });
            }
            sql::FunctionArguments::None => {}
        }

        if let Some(over) = &f.over {
            call.over = Some(match over {
                sql::WindowType::WindowSpec(spec) => WindowDef {
                    name: spec.window_name.as_ref().map(ident),
                    partition_by: self.exprs(&spec.partition_by)?,
                    order_by: spec
                        .order_by
                        .iter()
                        .map(|o| self.expr(&o.expr))
                        .collect::<Result<_, _>>()?,
                },
                sql::WindowType::NamedWindow(id) => WindowDef {
                    name: Some(ident(id)),
                    ..WindowDef::default()
                },
            });
        }

        let is_coalesce = call.name.schema.is_empty() && call.name.name == "coalesce";
        if is_coalesce {
            return Ok(Expr::Coalesce(call.args.into_iter().map(|a| a.value).collect()));
        }
        Ok(Expr::Func(call))
    }

    fn type_name(&self, data_type: &sql::DataType) -> Result<TypeName, SqlError> {
        Ok(TypeName::parse(&data_type.to_string())?.canonicalize(self.engine))
    }

    fn alias(&self, alias: &sql::TableAlias) -> Alias {
        Alias {
            name: ident(&alias.name),
            columns: alias.columns.iter().map(|c| ident(&c.name)).collect(),
        }
    }

    fn range_var(&self, tf: &sql::TableFactor) -> Result<RangeVar, SqlError> {
        match tf {
            sql::TableFactor::Table { name, alias, .. } => Ok(RangeVar {
                name: TableName::from_parts(&object_parts(name))?,
                alias: alias.as_ref().map(|a| self.alias(a)),
            }),
            other => Err(unsupported(format!("target relation {}", other))),
        }
    }

    fn from_item(&mut self, twj: &sql::TableWithJoins) -> Result<FromItem, SqlError> {
        let mut item = self.table_factor(&twj.relation)?;
        for join in &twj.joins {
            let right = self.table_factor(&join.relation)?;
            let (kind, constraint) = join_parts(&join.join_operator);
            let (on, using, natural) = match constraint {
                Some(sql::JoinConstraint::On(e)) => (Some(self.expr(e)?), Vec::new(), false),
                Some(sql::JoinConstraint::Using(columns)) => (None, columns.iter().map(ident).collect(), false),
                Some(sql::JoinConstraint::Natural) => (None, Vec::new(), true),
                Some(sql::JoinConstraint::None) | None => (None, Vec::new(), false),
            };

            item = FromItem::Join(Box::new(JoinExpr {
                kind,
                left: item,
                right,
                on,
                using,
                natural,
            }));
        }
        Ok(item)
    }

    fn table_factor(&mut self, tf: &sql::TableFactor) -> Result<FromItem, SqlError> {
        match tf {
            sql::TableFactor::Table { name, alias, args, .. } => {
                let parts = object_parts(name);
                let alias = alias.as_ref().map(|a| self.alias(a));
                match args {
                    Some(table_args) => {
                        let mut call = FuncCall::new(FuncName::from_parts(&parts)?, Vec::new());
                        call.args = self.func_args(&table_args.args)?;
                        Ok(FromItem::Function { call, alias })
                    }
                    None => Ok(FromItem::Relation(RangeVar {
                        name: TableName::from_parts(&parts)?,
                        alias,
                    })),
                }
            }
            sql::TableFactor::Derived { lateral, subquery, alias } => Ok(FromItem::Subselect {
                query: Box::new(self.query(subquery)?),
                alias: alias.as_ref().map(|a| self.alias(a)),
                lateral: *lateral,
            }),
            sql::TableFactor::Function { name, args, alias, .. } => {
                let mut call = FuncCall::new(FuncName::from_parts(&object_parts(name))?, Vec::new());
                call.args = self.func_args(args)?;
                Ok(FromItem::Function {
                    call,
                    alias: alias.as_ref().map(|a| self.alias(a)),
                })
            }
            sql::TableFactor::UNNEST { alias, array_exprs, .. } => {
                let call = FuncCall::new(FuncName::new("unnest"), self.exprs(array_exprs)?);
                Ok(FromItem::Function {
                    call,
                    alias: alias.as_ref().map(|a| self.alias(a)),
                })
            }
            sql::TableFactor::NestedJoin { table_with_joins, .. } => self.from_item(table_with_joins),
            other => Err(unsupported(format!("FROM item {}", other))),
        }
    }

    fn func_args(&mut self, args: &[sql::FunctionArg]) -> Result<Vec<FuncArg>, SqlError> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(e)) => {
                    out.push(FuncArg { name: None, value: self.expr(e)? });
                }
                sql::FunctionArg::Named { name, arg: sql::FunctionArgExpr::Expr(e), .. } => {
                    out.push(FuncArg { name: Some(ident(name)), value: self.expr(e)? });
                }
                other => {
                    for value in self.params_within(other)? {
                        out.push(FuncArg { name: None, value });
                    }
                }
            }
        }
        Ok(out)
    }

    fn assignments(&mut self, assignments: &[sql::Assignment]) -> Result<Vec<SetTarget>, SqlError> {
        let mut out = Vec::with_capacity(assignments.len());
        for a in assignments {
            match &a.target {
                sql::AssignmentTarget::ColumnName(name) => {
                    let column = object_parts(name).pop().unwrap_or_default();
                    out.push(SetTarget {
                        column,
                        value: self.expr(&a.value)?,
                    });
                }
                sql::AssignmentTarget::Tuple(names) => {
                    let value = self.expr(&a.value)?;
                    let values = match value {
                        Expr::Row(items) if items.len() == names.len() => items,
                        other => {
                            debug!("multi-column assignment from a non-row expression");
                            vec![other]
                        }
                    };
                    for (name, value) in names.iter().zip(values) {
                        out.push(SetTarget {
                            column: object_parts(name).pop().unwrap_or_default(),
                            value,
                        });
                    }
                }
            }
        }
        Ok(out)
    }

    fn insert(&mut self, insert: &sql::Insert) -> Result<Stmt, SqlError> {
        let mut relation = RangeVar::new(TableName::from_parts(&object_parts(&insert.table_name))?);
        if let Some(alias) = &insert.table_alias {
            relation.alias = Some(Alias::new(ident(alias)));
        }
        let columns = insert.columns.iter().map(ident).collect();
        let source = insert.source.as_ref().map(|q| self.query(q)).transpose()?.map(Box::new);

        let mut on_conflict = Vec::new();
        match &insert.on {
            Some(sql::OnInsert::DuplicateKeyUpdate(assignments)) => {
                on_conflict = self.assignments(assignments)?;
            }
            Some(sql::OnInsert::OnConflict(conflict)) => {
                if let sql::OnConflictAction::DoUpdate(update) = &conflict.action {
                    on_conflict = self.assignments(&update.assignments)?;
                }
            }
            _ => {}
        }

        let returning = match &insert.returning {
            Some(items) => self.targets(items)?,
            None => Vec::new(),
        };

        Ok(Stmt::Insert(Box::new(InsertStmt {
            with: None,
            relation,
            columns,
            source,
            on_conflict,
            returning,
        })))
    }

    fn update(
        &mut self,
        table: &sql::TableWithJoins,
        assignments: &[sql::Assignment],
        selection: Option<&sql::Expr>,
        returning: Option<&[sql::SelectItem]>,
    ) -> Result<Stmt, SqlError> {
        let relation = self.range_var(&table.relation)?;
        let mut from = Vec::new();
        for join in &table.joins {
            from.push(self.table_factor(&join.relation)?);
        }

        let targets = self.assignments(assignments)?;

        if let Some(text) = update_from_text(self.sql, self.engine) {
            let wrapped = format!("SELECT 1 FROM {}", text);
            let parsed = sqlparser::parser::Parser::parse_sql(self.dialect, &wrapped)
                .map_err(|e| SqlError::invalid(e.to_string()))?;
            if let Some(sql::Statement::Query(q)) = parsed.first() {
                if let sql::SetExpr::Select(s) = q.body.as_ref() {
                    for twj in &s.from {
                        from.push(self.from_item(twj)?);
                    }
                }
            }
        }

        let where_clause = selection.map(|e| self.expr(e)).transpose()?;
        let returning = match returning {
            Some(items) => self.targets(items)?,
            None => Vec::new(),
        };
        let limit = match update_limit_token(self.sql, self.engine) {
            Some(text) if text.starts_with('$') || text.starts_with('?') => Some(self.placeholder(&text)?),
            Some(text) => text.parse::<i64>().ok().map(|n| Expr::Const(Const::Integer(n))),
            None => None,
        };

        Ok(Stmt::Update(Box::new(UpdateStmt {
            with: None,
            relation,
            targets,
            from,
            where_clause,
            returning,
            limit,
        })))
    }

    fn delete(&mut self, delete: &sql::Delete) -> Result<Stmt, SqlError> {
        let tables = match &delete.from {
            sql::FromTable::WithFromKeyword(tables) | sql::FromTable::WithoutKeyword(tables) => tables,
        };
        let first = tables
            .first()
            .ok_or_else(|| SqlError::invalid("DELETE without a target table"))?;
        let relation = self.range_var(&first.relation)?;

        let mut using = Vec::new();
        if let Some(items) = &delete.using {
            for twj in items {
                using.push(self.from_item(twj)?);
            }
        }
        let where_clause = delete.selection.as_ref().map(|e| self.expr(e)).transpose()?;
        let returning = match &delete.returning {
            Some(items) => self.targets(items)?,
            None => Vec::new(),
        };
        let limit = delete.limit.as_ref().map(|e| self.expr(e)).transpose()?;

        Ok(Stmt::Delete(Box::new(DeleteStmt {
            with: None,
            relation,
            using,
            where_clause,
            returning,
            limit,
        })))
    }

    pub(crate) fn column_def(&self, col: &sql::ColumnDef) -> Result<ColumnDef, SqlError> {
        let mut def = ColumnDef::new(ident(&col.name), self.type_name(&col.data_type)?);
        for opt in &col.options {
            match &opt.option {
                sql::ColumnOption::NotNull => def.not_null = true,
                sql::ColumnOption::Unique { is_primary: true, .. } => {
                    def.primary_key = true;
                    def.not_null = true;
                }
                sql::ColumnOption::Comment(comment) => def.comment = comment.clone(),
                _ => {}
            }
        }
        Ok(def)
    }

    fn create_table(&mut self, ct: &sql::CreateTable) -> Result<Stmt, SqlError> {
        let name = TableName::from_parts(&object_parts(&ct.name))?;
        if let Some(q) = &ct.query {
            return Ok(Stmt::CreateTableAs(Box::new(CreateTableAsStmt {
                name,
                if_not_exists: ct.if_not_exists,
                query: Box::new(self.query(q)?),
            })));
        }

        let mut stmt = CreateTableStmt::new(name);
        stmt.if_not_exists = ct.if_not_exists;
        stmt.like = ct
            .like
            .as_ref()
            .map(|l| TableName::from_parts(&object_parts(l)))
            .transpose()?;
        for col in &ct.columns {
            stmt.columns.push(self.column_def(col)?);
        }
        for constraint in &ct.constraints {
            if let sql::TableConstraint::PrimaryKey { columns, .. } = constraint {
                stmt.primary_key.extend(columns.iter().map(ident));
            }
        }
        Ok(Stmt::CreateTable(Box::new(stmt)))
    }

    fn alter_table(
        &mut self,
        name: &sql::ObjectName,
        if_exists: bool,
        operations: &[sql::AlterTableOperation],
    ) -> Result<Vec<Stmt>, SqlError> {
        let table = TableName::from_parts(&object_parts(name))?;
        let mut cmds = Vec::new();
        let mut stmts = Vec::new();

        for op in operations {
            match op {
                sql::AlterTableOperation::AddColumn { column_def, if_not_exists, .. } => {
                    cmds.push(AlterTableCmd::AddColumn {
                        def: self.column_def(column_def)?,
                        if_not_exists: *if_not_exists,
                    });
                }
                sql::AlterTableOperation::DropColumn { column_name, if_exists, .. } => {
                    cmds.push(AlterTableCmd::DropColumn {
                        name: ident(column_name),
                        missing_ok: *if_exists,
                    });
                }
                sql::AlterTableOperation::AlterColumn { column_name, op } => {
                    let name = ident(column_name);
                    match op {
                        sql::AlterColumnOperation::SetNotNull => cmds.push(AlterTableCmd::SetNotNull { name }),
                        sql::AlterColumnOperation::DropNotNull => cmds.push(AlterTableCmd::DropNotNull { name }),
                        sql::AlterColumnOperation::SetDataType { data_type, .. } => {
                            cmds.push(AlterTableCmd::AlterColumnType {
                                name,
                                type_name: self.type_name(data_type)?,
                            });
                        }
                        _ => {}
                    }
                }
                sql::AlterTableOperation::RenameColumn { old_column_name, new_column_name } => {
                    stmts.push(Stmt::RenameColumn(RenameColumnStmt {
                        table: table.clone(),
                        column: ident(old_column_name),
                        new_name: ident(new_column_name),
                        missing_ok: if_exists,
                    }));
                }
                sql::AlterTableOperation::RenameTable { table_name } => {
                    stmts.push(Stmt::RenameTable(RenameTableStmt {
                        table: table.clone(),
                        new_name: object_parts(table_name).pop().unwrap_or_default(),
                        missing_ok: if_exists,
                    }));
                }
                other => debug!(operation = %other, "ignoring ALTER TABLE operation"),
            }
        }

        let mut out = Vec::new();
        if !cmds.is_empty() {
            out.push(Stmt::AlterTable(AlterTableStmt {
                table,
                missing_ok: if_exists,
                cmds,
            }));
        }
        out.extend(stmts);
        if out.is_empty() {
            out.push(Stmt::Unsupported("ALTER TABLE".to_string()));
        }
        Ok(out)
    }
}

/// Top-level tokens of a statement with their parenthesis depth
fn top_level(src: &str, engine: Engine) -> Vec<Token> {
    let mut depth = 0usize;
    let mut out = Vec::new();
    for tok in tokenize(src, engine) {
        if tok.is_comment() {
            continue;
        }
        if tok.is_punct(src, '(') {
            depth += 1;
            continue;
        }
        if tok.is_punct(src, ')') {
            depth = depth.saturating_sub(1);
            continue;
        }
        if depth == 0 {
            out.push(tok);
        }
    }
    out
}

const UPDATE_FROM_END: &[&str] = &["where", "returning", "order", "limit"];

/// Text of the FROM list of `UPDATE ... SET ... FROM ...`
fn update_from_text(src: &str, engine: Engine) -> Option<&str> {
    let toks = top_level(src, engine);
    let set = toks.iter().position(|t| t.is_keyword(src, "set"))?;
    let from = set + toks[set..].iter().position(|t| t.is_keyword(src, "from"))?;
    let start = toks[from].end;
    let end = toks[from + 1..]
        .iter()
        .find(|t| UPDATE_FROM_END.iter().any(|k| t.is_keyword(src, k)) || t.is_punct(src, ';'))
        .map_or(src.len(), |t| t.start);
    let text = src[start..end].trim();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// The token after a top-level LIMIT of an UPDATE
fn update_limit_token(src: &str, engine: Engine) -> Option<String> {
    let toks = top_level(src, engine);
    let set = toks.iter().position(|t| t.is_keyword(src, "set"))?;
    let limit = set + toks[set..].iter().position(|t| t.is_keyword(src, "limit"))?;
    let next = toks.get(limit + 1)?;
    match next.kind {
        TokenKind::Placeholder | TokenKind::Number => Some(next.text(src).to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Parser, SqlParser};

    fn from_clause(sql: &str) -> Vec<FromItem> {
        match SqlParser::postgres().parse_query(sql).unwrap().stmt {
            Stmt::Select(select) => select.from,
            other => panic!("not a select: {:?}", other),
        }
    }

    fn join(item: &FromItem) -> &JoinExpr {
        match item {
            FromItem::Join(join) => join,
            other => panic!("not a join: {:?}", other),
        }
    }

    #[test]
    fn join_kinds_and_constraints() {
        let from = from_clause("SELECT 1 FROM a LEFT OUTER JOIN b ON a.id = b.id NATURAL FULL JOIN c CROSS JOIN d");
        let cross = join(&from[0]);
        assert_eq!(cross.kind, JoinKind::Cross);
        let full = join(&cross.left);
        assert_eq!((full.kind, full.natural), (JoinKind::Full, true));
        let left = join(&full.left);
        assert_eq!(left.kind, JoinKind::Left);
        assert!(left.on.is_some());

        let from = from_clause("SELECT 1 FROM a JOIN b USING (id, \"Key\")");
        assert_eq!(join(&from[0]).using, vec!["id".to_string(), "Key".to_string()]);
    }

    #[test]
    fn nested_using_stays_with_its_join() {
        let from = from_clause("SELECT a.id FROM a JOIN (b JOIN c USING (k)) ON a.id = abs(b.id)");
        let outer = join(&from[0]);
        assert_eq!(outer.kind, JoinKind::Inner);
        assert!(outer.using.is_empty());
        assert!(matches!(outer.on, Some(Expr::BinaryOp { .. })));

        let inner = join(&outer.right);
        assert_eq!(inner.using, vec!["k".to_string()]);
        assert!(inner.on.is_none());
    }

    #[test]
    fn primary_key_constraint_columns() {
        let parsed = SqlParser::postgres().parse("CREATE TABLE t (a INT, \"B\" INT, PRIMARY KEY (a, \"B\"));");
        match &parsed.statements[0].stmt {
            Stmt::CreateTable(ct) => assert_eq!(ct.primary_key, vec!["a".to_string(), "B".to_string()]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn update_from_is_found_lexically() {
        let sql = "UPDATE t SET a = EXTRACT(YEAR FROM now()) FROM u, (SELECT 1) v WHERE t.id = u.id";
        assert_eq!(update_from_text(sql, Engine::Postgresql), Some("u, (SELECT 1) v"));
        assert_eq!(update_from_text("UPDATE t SET a = 1 WHERE id = 2", Engine::Postgresql), None);
        assert_eq!(
            update_limit_token("UPDATE t SET a = ?1 LIMIT ?2", Engine::Mysql),
            Some("?2".to_string())
        );
    }
}
