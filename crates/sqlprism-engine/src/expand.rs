//! Star expansion
//!
//! Every `*`, `t.*` and `sqlprism.embed(t)` in a projection list is replaced
//! in the rewritten query text by the explicit column list it stands for.
//! Replacements are keyed by the star's byte offset, so a star analyzed
//! twice is only rewritten once.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use sqlprism_core::{Column, Engine, ErrorKind, SqlError};
use sqlprism_sql::ast::{ColumnRef, Expr, SelectStmt, Stmt};
use sqlprism_sql::is_reserved_keyword;
use sqlprism_sql::source::Edit;
use sqlprism_sql::visit::{walk_select, Visitor};
use tracing::debug;

use crate::analyze::{AnalysisMode, Analyzer};
use crate::scope::{QueryCatalog, Scope, Table};

fn lower_identifier() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_$]*$").ok())
        .as_ref()
}

fn identifier() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").ok())
        .as_ref()
}

/// Quote an identifier when it would not survive being written bare
pub(crate) fn quote_ident(engine: Engine, name: &str) -> String {
    let pattern = match engine {
        Engine::Postgresql => lower_identifier(),
        Engine::Mysql | Engine::Sqlite => identifier(),
    };
    let plain = pattern.map_or(false, |re| re.is_match(name));
    if plain && !is_reserved_keyword(engine, name) {
        return name.to_string();
    }
    let quote = engine.quote_char();
    let escaped = name.replace(quote, &format!("{quote}{quote}"));
    format!("{quote}{escaped}{quote}")
}

impl<'c> Analyzer<'c> {
    /// Columns a star or embed stands for, recording its replacement text
    pub(crate) fn star_columns(&self, scope: &Scope<'_>, cref: &ColumnRef) -> Result<Vec<Column>, SqlError> {
        let qualifier = cref.qualifier();
        let tables = scope.tables_matching(qualifier);
        if tables.is_empty() {
            return Err(if qualifier.is_empty() {
                SqlError::invalid("SELECT * with no tables specified is not valid")
            } else {
                ErrorKind::RelationNotFound(qualifier.join(".")).into()
            });
        }

        if cref.embed {
            let table = tables[0];
            self.record_star(cref, self.qualified_list(table));
            let mut column = Column::new(table.scope_name(), table.rel.name.clone()).with_not_null(true);
            column.table = Some(table.rel.clone());
            column.table_alias = table.scope_name().to_string();
            column.embed_table = Some(table.rel.clone());
            return Ok(vec![column]);
        }

        let qualified = !qualifier.is_empty();
        let mut picked: Vec<(&Table, &Column)> = Vec::new();
        for table in &tables {
            if qualified {
                picked.extend(table.columns.iter().map(|c| (*table, c)));
            } else {
                picked.extend(table.visible_columns().map(|c| (*table, c)));
            }
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (_, column) in &picked {
            *counts.entry(column.name.as_str()).or_default() += 1;
        }

        let mut items = Vec::with_capacity(picked.len());
        let mut columns = Vec::with_capacity(picked.len());
        for (table, column) in picked {
            let name = quote_ident(self.engine, &column.name);
            if qualified || counts.get(column.name.as_str()).copied().unwrap_or(0) > 1 {
                items.push(format!("{}.{}", quote_ident(self.engine, table.scope_name()), name));
            } else {
                items.push(name);
            }
            let mut column = column.clone();
            column.scope = qualifier.join(".");
            columns.push(column);
        }

        self.record_star(cref, items);
        Ok(columns)
    }

    fn qualified_list(&self, table: &Table) -> Vec<String> {
        let prefix = quote_ident(self.engine, table.scope_name());
        table
            .columns
            .iter()
            .map(|c| format!("{}.{}", prefix, quote_ident(self.engine, &c.name)))
            .collect()
    }

    fn record_star(&self, cref: &ColumnRef, items: Vec<String>) {
        if let Some(start) = cref.location {
            self.stars.borrow_mut().insert(
                start,
                Edit {
                    start,
                    end: start + cref.len,
                    replacement: items.join(", "),
                },
            );
        }
    }

    /// Expand stars no projection pass reached, such as those inside
    /// `EXISTS (SELECT * ...)`; failures leave the star as written
    pub(crate) fn expand_remaining_stars(&self, qc: &QueryCatalog<'c>, stmt: &Stmt) {
        let with = match stmt {
            Stmt::Select(select) => select.with.as_ref(),
            Stmt::Insert(insert) => insert.with.as_ref(),
            Stmt::Update(update) => update.with.as_ref(),
            Stmt::Delete(delete) => delete.with.as_ref(),
            _ => None,
        };
        let qc = self.with_ctes(qc, with).unwrap_or_else(|_| qc.clone());

        let mode = self.mode.replace(AnalysisMode::FailFast);
        let mut finder = RemainingStars { analyzer: self, qc };
        finder.visit_stmt(stmt);
        self.mode.set(mode);
    }

    fn has_pending_star(&self, select: &SelectStmt) -> bool {
        let stars = self.stars.borrow();
        select.targets.iter().any(|t| match &t.val {
            Expr::Column(c) if c.star || c.embed => c.location.map_or(false, |at| !stars.contains_key(&at)),
            _ => false,
        })
    }
}

struct RemainingStars<'a, 'c> {
    analyzer: &'a Analyzer<'c>,
    qc: QueryCatalog<'c>,
}

impl Visitor for RemainingStars<'_, '_> {
    fn visit_select(&mut self, select: &SelectStmt) {
        if self.analyzer.has_pending_star(select) {
            if let Err(err) = self.analyzer.select_columns(&self.qc, None, select) {
                debug!(%err, "star left unexpanded");
            }
        }
        walk_select(self, select);
    }
}
