//! Tables visible to a query
//!
//! A [`Scope`] holds the relations of one FROM clause and links to the
//! scope of the enclosing query, so correlated subqueries can see outer
//! tables. A [`QueryCatalog`] layers the CTEs of a WITH clause over the
//! catalog.

use std::collections::HashMap;

use sqlprism_catalog::Catalog;
use sqlprism_core::{Column, ErrorKind, SqlError, TableName};
use sqlprism_sql::ast::{Alias, ColumnRef};

/// A relation visible in a FROM scope
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub rel: TableName,
    pub alias: Option<String>,
    pub columns: Vec<Column>,

    /// Columns merged into the other side of a `USING` or `NATURAL` join;
    /// only a qualified reference reaches them
    pub merged: Vec<String>,

    /// Set on the table holding the merged columns of a `FULL JOIN`: the
    /// scope name of its left side
    pub coalesce_of: Option<String>,
}

impl Table {
    pub fn new(rel: TableName, columns: Vec<Column>) -> Self {
        let mut table = Self {
            rel,
            alias: None,
            columns,
            merged: Vec::new(),
            coalesce_of: None,
        };
        table.tag_columns();
        table
    }

    /// Name the table is referenced by: its alias, else its name
    pub fn scope_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.rel.name)
    }

    /// Apply `AS alias (c1, c2, ...)`, renaming columns positionally
    pub fn with_alias(mut self, alias: Option<&Alias>) -> Self {
        if let Some(alias) = alias {
            self.alias = Some(alias.name.clone());
            for (column, name) in self.columns.iter_mut().zip(&alias.columns) {
                column.name = name.clone();
            }
            self.tag_columns();
        }
        self
    }

    fn tag_columns(&mut self) {
        let scope = self.scope_name().to_string();
        for column in &mut self.columns {
            column.table_alias = scope.clone();
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns an unqualified reference or star can see
    pub fn visible_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(move |c| !self.merged.contains(&c.name))
    }

    /// Whether a qualifier (`t`, `schema.t`) names this table
    pub fn matches(&self, qualifier: &[String]) -> bool {
        let Some((name, rest)) = qualifier.split_last() else {
            return true;
        };
        if name != self.scope_name() {
            return false;
        }
        match rest.last() {
            None => true,
            Some(schema) => self.alias.is_none() && (self.rel.schema.is_empty() || &self.rel.schema == schema),
        }
    }

    /// Mark every column nullable, for the optional side of an outer join
    pub fn make_nullable(&mut self) {
        for column in &mut self.columns {
            column.not_null = false;
        }
    }
}

/// Relations of one FROM clause, linked to the enclosing query's scope
#[derive(Debug, Clone, Default)]
pub struct Scope<'p> {
    pub tables: Vec<Table>,
    parent: Option<&'p Scope<'p>>,
}

impl<'p> Scope<'p> {
    pub fn new(tables: Vec<Table>) -> Self {
        Self { tables, parent: None }
    }

    /// A scope whose unresolved names fall back to `parent`
    pub fn nested(tables: Vec<Table>, parent: Option<&'p Scope<'p>>) -> Self {
        Self { tables, parent }
    }

    pub fn parent(&self) -> Option<&'p Scope<'p>> {
        self.parent
    }

    /// Resolve a column reference, innermost scope first
    pub fn resolve(&self, cref: &ColumnRef) -> Result<&Column, SqlError> {
        let name = cref.name().unwrap_or_default();
        let qualifier = cref.qualifier();

        let mut found: Option<&Column> = None;
        for table in self.tables.iter().filter(|t| t.matches(qualifier)) {
            let column = if qualifier.is_empty() {
                table.visible_columns().find(|c| c.name == name)
            } else {
                table.column(name)
            };
            if let Some(column) = column {
                if found.is_some() {
                    return Err(ErrorKind::AmbiguousColumnReference(name.to_string()).into());
                }
                found = Some(column);
            }
        }

        match (found, self.parent) {
            (Some(column), _) => Ok(column),
            (None, Some(parent)) => parent.resolve(cref),
            (None, None) => Err(ErrorKind::ColumnDoesNotExist(cref.joined(".")).into()),
        }
    }

    /// Tables of this level a star qualifier selects
    pub fn tables_matching(&self, qualifier: &[String]) -> Vec<&Table> {
        self.tables.iter().filter(|t| t.matches(qualifier)).collect()
    }

    /// Whether a name resolves to anything, ignoring ambiguity
    pub fn contains(&self, cref: &ColumnRef) -> bool {
        match self.resolve(cref) {
            Ok(_) => true,
            Err(err) => matches!(err.kind, ErrorKind::AmbiguousColumnReference(_)),
        }
    }
}

/// The catalog as seen by one query: CTEs shadow unqualified table names
#[derive(Clone)]
pub struct QueryCatalog<'c> {
    catalog: &'c Catalog,
    ctes: HashMap<String, Table>,
}

impl<'c> QueryCatalog<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self {
            catalog,
            ctes: HashMap::new(),
        }
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    pub fn add_cte(&mut self, name: &str, columns: Vec<Column>) {
        self.ctes
            .insert(name.to_string(), Table::new(TableName::new(name), columns));
    }

    pub fn has_cte(&self, name: &str) -> bool {
        self.ctes.contains_key(name)
    }

    /// A table, view or CTE with its columns as query columns
    pub fn get_table(&self, name: &TableName) -> Result<Table, SqlError> {
        if name.schema.is_empty() && name.catalog.is_empty() {
            if let Some(cte) = self.ctes.get(&name.name) {
                return Ok(cte.clone());
            }
        }
        let table = self.catalog.table(name)?;
        let columns = table
            .columns
            .iter()
            .map(|c| c.to_query_column(&table.rel))
            .collect();
        Ok(Table::new(table.rel.clone(), columns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(name: &str, columns: &[&str]) -> Table {
        Table::new(
            TableName::new(name),
            columns.iter().map(|c| Column::new(*c, "integer")).collect(),
        )
    }

    fn cref(fields: &[&str]) -> ColumnRef {
        ColumnRef::new(fields.iter().map(|f| f.to_string()).collect())
    }

    #[test]
    fn unqualified_and_qualified_lookup() {
        let scope = Scope::new(vec![table("a", &["id", "x"]), table("b", &["id", "y"])]);
        assert_eq!(scope.resolve(&cref(&["x"])).unwrap().table_alias, "a");
        assert_eq!(scope.resolve(&cref(&["b", "id"])).unwrap().table_alias, "b");

        let err = scope.resolve(&cref(&["id"])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AmbiguousColumnReference("id".into()));

        let err = scope.resolve(&cref(&["c", "id"])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ColumnDoesNotExist("c.id".into()));
    }

    #[test]
    fn merged_columns_need_a_qualifier() {
        let mut right = table("b", &["id", "y"]);
        right.merged.push("id".into());
        let scope = Scope::new(vec![table("a", &["id"]), right]);

        assert_eq!(scope.resolve(&cref(&["id"])).unwrap().table_alias, "a");
        assert_eq!(scope.resolve(&cref(&["b", "id"])).unwrap().table_alias, "b");
    }

    #[test]
    fn alias_renames_table_and_columns() {
        let aliased = table("authors", &["id", "name"]).with_alias(Some(&Alias {
            name: "a".into(),
            columns: vec!["author_id".into()],
        }));
        assert_eq!(aliased.scope_name(), "a");
        assert_eq!(aliased.columns[0].name, "author_id");
        assert_eq!(aliased.columns[1].name, "name");
        assert_eq!(aliased.columns[1].table_alias, "a");
        assert!(!aliased.matches(&["authors".to_string()]));
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let outer = Scope::new(vec![table("a", &["id", "outer_only"])]);
        let inner = Scope::nested(vec![table("b", &["id"])], Some(&outer));

        assert_eq!(inner.resolve(&cref(&["id"])).unwrap().table_alias, "b");
        assert_eq!(inner.resolve(&cref(&["outer_only"])).unwrap().table_alias, "a");
        assert!(!inner.contains(&cref(&["missing"])));
    }
}
