//! Depth-first traversal of the common AST
//!
//! Implement [`Visitor`] and override the hooks you care about; call the
//! matching `walk_*` function from an override to keep descending.
//! Children are visited in source order.

use crate::ast::{
    Expr, FromItem, SelectStmt, Stmt, WindowDef, WithClause,
};

pub trait Visitor {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_with(&mut self, with: &WithClause) {
        walk_with(self, with);
    }

    fn visit_select(&mut self, select: &SelectStmt) {
        walk_select(self, select);
    }

    fn visit_from_item(&mut self, item: &FromItem) {
        walk_from_item(self, item);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(v: &mut V, stmt: &Stmt) {
    match stmt {
        Stmt::Select(n) => v.visit_select(n),
        Stmt::Insert(n) => {
            if let Some(with) = &n.with {
                v.visit_with(with);
            }
            if let Some(source) = &n.source {
                v.visit_select(source);
            }
            for target in &n.on_conflict {
                v.visit_expr(&target.value);
            }
            for target in &n.returning {
                v.visit_expr(&target.val);
            }
        }
        Stmt::Update(n) => {
            if let Some(with) = &n.with {
                v.visit_with(with);
            }
            for target in &n.targets {
                v.visit_expr(&target.value);
            }
            for item in &n.from {
                v.visit_from_item(item);
            }
            if let Some(expr) = &n.where_clause {
                v.visit_expr(expr);
            }
            for target in &n.returning {
                v.visit_expr(&target.val);
            }
            if let Some(expr) = &n.limit {
                v.visit_expr(expr);
            }
        }
        Stmt::Delete(n) => {
            if let Some(with) = &n.with {
                v.visit_with(with);
            }
            for item in &n.using {
                v.visit_from_item(item);
            }
            if let Some(expr) = &n.where_clause {
                v.visit_expr(expr);
            }
            for target in &n.returning {
                v.visit_expr(&target.val);
            }
            if let Some(expr) = &n.limit {
                v.visit_expr(expr);
            }
        }
        Stmt::CreateTableAs(n) => v.visit_select(&n.query),
        Stmt::CreateView(n) => v.visit_select(&n.query),
        _ => {}
    }
}

pub fn walk_with<V: Visitor + ?Sized>(v: &mut V, with: &WithClause) {
    for cte in &with.ctes {
        v.visit_stmt(&cte.query);
    }
}

pub fn walk_select<V: Visitor + ?Sized>(v: &mut V, select: &SelectStmt) {
    if let Some(with) = &select.with {
        v.visit_with(with);
    }
    if let Some(op) = &select.set_op {
        v.visit_select(&op.left);
        v.visit_select(&op.right);
    }
    for expr in &select.distinct_on {
        v.visit_expr(expr);
    }
    for target in &select.targets {
        v.visit_expr(&target.val);
    }
    for item in &select.from {
        v.visit_from_item(item);
    }
    if let Some(expr) = &select.where_clause {
        v.visit_expr(expr);
    }
    for expr in &select.group_by {
        v.visit_expr(expr);
    }
    if let Some(expr) = &select.having {
        v.visit_expr(expr);
    }
    for window in &select.windows {
        walk_window(v, window);
    }
    for row in &select.values {
        for expr in row {
            v.visit_expr(expr);
        }
    }
    for expr in &select.order_by {
        v.visit_expr(expr);
    }
    if let Some(expr) = &select.limit {
        v.visit_expr(expr);
    }
    if let Some(expr) = &select.offset {
        v.visit_expr(expr);
    }
}

pub fn walk_from_item<V: Visitor + ?Sized>(v: &mut V, item: &FromItem) {
    match item {
        FromItem::Relation(_) => {}
        FromItem::Subselect { query, .. } => v.visit_select(query),
        FromItem::Function { call, .. } => {
            for arg in &call.args {
                v.visit_expr(&arg.value);
            }
        }
        FromItem::Join(join) => {
            v.visit_from_item(&join.left);
            v.visit_from_item(&join.right);
            if let Some(on) = &join.on {
                v.visit_expr(on);
            }
        }
    }
}

fn walk_window<V: Visitor + ?Sized>(v: &mut V, window: &WindowDef) {
    for expr in &window.partition_by {
        v.visit_expr(expr);
    }
    for expr in &window.order_by {
        v.visit_expr(expr);
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, expr: &Expr) {
    match expr {
        Expr::Column(_) | Expr::Const(_) | Expr::Param(_) => {}
        Expr::BinaryOp { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        Expr::UnaryOp { expr, .. } => v.visit_expr(expr),
        Expr::Bool { args, .. } | Expr::Coalesce(args) | Expr::Row(args) | Expr::Array(args) | Expr::Other(args) => {
            for arg in args {
                v.visit_expr(arg);
            }
        }
        Expr::NullTest { arg, .. } | Expr::Cast { arg, .. } => v.visit_expr(arg),
        Expr::Func(call) => {
            for arg in &call.args {
                v.visit_expr(&arg.value);
            }
            if let Some(window) = &call.over {
                walk_window(v, window);
            }
        }
        Expr::Case(case) => {
            if let Some(arg) = &case.arg {
                v.visit_expr(arg);
            }
            for (when, then) in &case.whens {
                v.visit_expr(when);
                v.visit_expr(then);
            }
            if let Some(default) = &case.default {
                v.visit_expr(default);
            }
        }
        Expr::SubLink(link) => {
            if let Some(test) = &link.test {
                v.visit_expr(test);
            }
            v.visit_select(&link.subselect);
        }
        Expr::In { expr, list, .. } => {
            v.visit_expr(expr);
            for item in list {
                v.visit_expr(item);
            }
        }
        Expr::Between { expr, low, high, .. } => {
            v.visit_expr(expr);
            v.visit_expr(low);
            v.visit_expr(high);
        }
        Expr::Quantified { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ResTarget, SubLink, SubLinkKind};

    #[derive(Default)]
    struct Params(Vec<usize>);

    impl Visitor for Params {
        fn visit_expr(&mut self, expr: &Expr) {
            if let Expr::Param(p) = expr {
                self.0.push(p.number);
            }
            walk_expr(self, expr);
        }
    }

    #[test]
    fn visits_nested_selects_in_order() {
        let inner = SelectStmt {
            where_clause: Some(Expr::BinaryOp {
                op: "=".into(),
                left: Box::new(Expr::column(&["id"])),
                right: Box::new(Expr::param(2)),
            }),
            ..SelectStmt::default()
        };
        let outer = SelectStmt {
            targets: vec![ResTarget::new(Expr::param(1))],
            where_clause: Some(Expr::SubLink(SubLink {
                kind: SubLinkKind::Exists,
                test: None,
                subselect: Box::new(inner),
                negated: false,
            })),
            limit: Some(Expr::param(3)),
            ..SelectStmt::default()
        };

        let mut params = Params::default();
        params.visit_stmt(&Stmt::Select(Box::new(outer)));
        assert_eq!(params.0, vec![1, 2, 3]);
    }
}
