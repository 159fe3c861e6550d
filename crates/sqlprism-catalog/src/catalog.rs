//! Catalog model
//!
//! The catalog is an owned value: it is built once per package by folding
//! DDL in file order (see [`crate::fold`]) and only read afterwards.
//! Lookups resolve unqualified names against the default schema.

use serde::{Deserialize, Serialize};
use sqlprism_core::{Engine, ErrorKind, FuncName, SqlError, TableName, TypeName};
use sqlprism_sql::ast::ParamMode;

use crate::builtins;

/// Schema store for one package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub name: String,
    pub default_schema: String,

    /// Schemas consulted for unqualified function names, before the default schema
    #[serde(default)]
    pub search_path: Vec<String>,

    pub schemas: Vec<Schema>,

    /// Extensions already merged by CREATE EXTENSION
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub comment: String,

    pub engine: Engine,
}

impl Catalog {
    /// Catalog with the engine's default schema and builtin functions
    pub fn new(engine: Engine) -> Self {
        Self::with_default_schema(engine, engine.default_schema())
    }

    /// Catalog whose default schema has a custom name
    pub fn with_default_schema(engine: Engine, default_schema: &str) -> Self {
        let mut catalog = Self {
            name: String::new(),
            default_schema: default_schema.to_string(),
            search_path: Vec::new(),
            schemas: vec![Schema::new(default_schema)],
            extensions: Vec::new(),
            comment: String::new(),
            engine,
        };
        builtins::install(&mut catalog);
        catalog
    }

    /// Schema name a table or type reference resolves to
    pub fn schema_name<'a>(&'a self, schema: &'a str) -> &'a str {
        if schema.is_empty() {
            &self.default_schema
        } else {
            schema
        }
    }

    pub fn schema(&self, name: &str) -> Result<&Schema, SqlError> {
        let name = self.schema_name(name);
        self.schemas
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SqlError::new(ErrorKind::SchemaNotFound(name.to_string())))
    }

    pub fn schema_mut(&mut self, name: &str) -> Result<&mut Schema, SqlError> {
        let name = self.schema_name(name).to_string();
        self.schemas
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or(SqlError::new(ErrorKind::SchemaNotFound(name)))
    }

    pub fn has_schema(&self, name: &str) -> bool {
        self.schemas.iter().any(|s| s.name == name)
    }

    /// Look up a table or view
    pub fn table(&self, name: &TableName) -> Result<&Table, SqlError> {
        let schema = self.schema(&name.schema)?;
        schema
            .table(&name.name)
            .ok_or_else(|| SqlError::new(ErrorKind::RelationNotFound(name.name.clone())))
    }

    pub fn table_mut(&mut self, name: &TableName) -> Result<&mut Table, SqlError> {
        let schema = self.schema_mut(&name.schema)?;
        schema
            .tables
            .iter_mut()
            .find(|t| t.rel.name == name.name)
            .ok_or_else(|| SqlError::new(ErrorKind::RelationNotFound(name.name.clone())))
    }

    /// Look up an enum or composite type
    pub fn get_type(&self, name: &TypeName) -> Result<&Type, SqlError> {
        let schema = self.schema(&name.schema)?;
        schema
            .get_type(&name.name)
            .ok_or_else(|| SqlError::new(ErrorKind::TypeNotFound(name.name.clone())))
    }

    /// Whether a type name refers to an enum defined in this catalog
    pub fn is_enum(&self, name: &TypeName) -> bool {
        matches!(self.get_type(name), Ok(Type::Enum(_)))
    }

    /// Every function with this name, in search order
    ///
    /// Unqualified names search the search path and then the default schema;
    /// a qualified name searches only its schema. Names compare
    /// case-insensitively.
    pub fn list_funcs_by_name(&self, name: &FuncName) -> Result<Vec<&Function>, SqlError> {
        let schemas: Vec<&str> = if name.schema.is_empty() {
            let mut path: Vec<&str> = self.search_path.iter().map(String::as_str).collect();
            if !path.contains(&self.default_schema.as_str()) {
                path.push(&self.default_schema);
            }
            path
        } else {
            if !self.has_schema(&name.schema) {
                return Err(SqlError::new(ErrorKind::SchemaNotFound(name.schema.clone())));
            }
            vec![name.schema.as_str()]
        };

        let wanted = name.name.to_ascii_lowercase();
        let funcs = schemas
            .into_iter()
            .filter_map(|s| self.schemas.iter().find(|schema| schema.name == s))
            .flat_map(|schema| schema.functions.iter())
            .filter(|f| f.name.to_ascii_lowercase() == wanted)
            .collect();
        Ok(funcs)
    }

    /// Rewrite every column typed `from` to `to`, across all schemas
    pub(crate) fn rewrite_type_refs(&mut self, from: &TypeName, to: &TypeName) {
        let from_schema = self.schema_name(&from.schema).to_string();
        let default_schema = self.default_schema.clone();
        let matches = |t: &TypeName| {
            let schema = if t.schema.is_empty() { default_schema.as_str() } else { t.schema.as_str() };
            t.name == from.name && schema == from_schema
        };
        for schema in &mut self.schemas {
            for table in &mut schema.tables {
                for column in &mut table.columns {
                    if matches(&column.type_name) {
                        retarget(&mut column.type_name, to);
                    }
                }
            }
            for ty in &mut schema.types {
                if let Type::Composite(composite) = ty {
                    for column in &mut composite.columns {
                        if matches(&column.type_name) {
                            retarget(&mut column.type_name, to);
                        }
                    }
                }
            }
        }
    }
}

fn retarget(type_name: &mut TypeName, to: &TypeName) {
    type_name.name = to.name.clone();
    type_name.schema = to.schema.clone();
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub types: Vec<Type>,
    #[serde(default)]
    pub functions: Vec<Function>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.rel.name == name)
    }

    pub(crate) fn table_index(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.rel.name == name)
    }

    pub fn get_type(&self, name: &str) -> Option<&Type> {
        self.types.iter().find(|t| t.name() == name)
    }

    pub(crate) fn type_index(&self, name: &str) -> Option<usize> {
        self.types.iter().position(|t| t.name() == name)
    }

    /// Index of the function with exactly these input argument types
    pub(crate) fn func_index(&self, name: &str, args: &[TypeName]) -> Option<usize> {
        self.functions.iter().position(|f| {
            let inputs: Vec<&Argument> = f.in_args().collect();
            f.name == name
                && inputs.len() == args.len()
                && inputs.iter().zip(args).all(|(a, t)| a.type_name.same_type(t))
        })
    }

    /// Index of the only function with this name
    pub(crate) fn func_index_by_name(&self, name: &str) -> Result<Option<usize>, SqlError> {
        let mut found = self.functions.iter().enumerate().filter(|(_, f)| f.name == name);
        let first = found.next().map(|(i, _)| i);
        if found.next().is_some() {
            return Err(SqlError::new(ErrorKind::FunctionNotUnique(name.to_string())));
        }
        Ok(first)
    }
}

/// A table, view, or the synthesized table of a CTE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub rel: TableName,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub comment: String,
}

impl Table {
    pub fn new(rel: TableName, columns: Vec<Column>) -> Self {
        Self {
            rel,
            columns,
            comment: String::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub(crate) fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Catalog form of a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub type_name: TypeName,
    pub not_null: bool,
    #[serde(default)]
    pub comment: String,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: TypeName) -> Self {
        Self {
            name: name.into(),
            type_name,
            not_null: false,
            comment: String::new(),
        }
    }

    pub fn with_not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    pub fn is_array(&self) -> bool {
        self.type_name.is_array()
    }

    /// Analysis form of this column, owned by `table`
    pub fn to_query_column(&self, table: &TableName) -> sqlprism_core::Column {
        let mut column = sqlprism_core::Column::from_type(self.name.clone(), &self.type_name);
        column.original_name = self.name.clone();
        column.not_null = self.not_null;
        column.comment = self.comment.clone();
        column.table = Some(table.clone());
        column
    }
}

impl From<&sqlprism_core::Column> for Column {
    fn from(column: &sqlprism_core::Column) -> Self {
        let type_name = match &column.type_name {
            Some(t) => t.clone(),
            None => TypeName::new(column.data_type.clone()).array_of(column.array_dims),
        };
        Self {
            name: column.name.clone(),
            type_name,
            not_null: column.not_null,
            comment: column.comment.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    Enum(Enum),
    Composite(CompositeType),
}

impl Type {
    pub fn name(&self) -> &str {
        match self {
            Type::Enum(e) => &e.name,
            Type::Composite(c) => &c.name,
        }
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        match self {
            Type::Enum(e) => e.name = name.to_string(),
            Type::Composite(c) => c.name = name.to_string(),
        }
    }

    pub(crate) fn comment_mut(&mut self) -> &mut String {
        match self {
            Type::Enum(e) => &mut e.comment,
            Type::Composite(c) => &mut c.comment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enum {
    pub name: String,
    pub values: Vec<String>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeType {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub args: Vec<Argument>,

    /// `None` for procedures
    pub return_type: Option<TypeName>,

    #[serde(default = "default_true")]
    pub return_type_nullable: bool,

    /// `RETURNS SETOF` / `RETURNS TABLE`
    #[serde(default)]
    pub returns_set: bool,

    #[serde(default)]
    pub comment: String,
}

fn default_true() -> bool {
    true
}

impl Function {
    pub fn new(name: impl Into<String>, args: Vec<Argument>, return_type: TypeName) -> Self {
        Self {
            name: name.into(),
            args,
            return_type: Some(return_type),
            return_type_nullable: true,
            returns_set: false,
            comment: String::new(),
        }
    }

    pub fn with_not_null(mut self) -> Self {
        self.return_type_nullable = false;
        self
    }

    pub fn returning_set(mut self) -> Self {
        self.returns_set = true;
        self
    }

    /// Arguments a caller supplies
    pub fn in_args(&self) -> impl Iterator<Item = &Argument> {
        self.args
            .iter()
            .filter(|a| matches!(a.mode, ParamMode::In | ParamMode::InOut | ParamMode::Variadic))
    }

    /// OUT and TABLE arguments, the columns of a set-returning function
    pub fn out_args(&self) -> impl Iterator<Item = &Argument> {
        self.args
            .iter()
            .filter(|a| matches!(a.mode, ParamMode::Out | ParamMode::InOut | ParamMode::Table))
    }

    pub fn is_procedure(&self) -> bool {
        self.return_type.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    #[serde(default)]
    pub name: String,
    pub type_name: TypeName,
    #[serde(default)]
    pub has_default: bool,
    #[serde(default)]
    pub mode: ParamMode,
}

impl Argument {
    pub fn new(name: impl Into<String>, type_name: TypeName) -> Self {
        Self {
            name: name.into(),
            type_name,
            has_default: false,
            mode: ParamMode::In,
        }
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.mode = ParamMode::Variadic;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_catalog_has_default_schema() {
        let catalog = Catalog::new(Engine::Postgresql);
        assert_eq!(catalog.default_schema, "public");
        assert!(catalog.schema("").is_ok());
        assert!(catalog.schema("pg_catalog").is_ok());
        assert_eq!(catalog.search_path, vec!["pg_catalog".to_string()]);

        let sqlite = Catalog::new(Engine::Sqlite);
        assert_eq!(sqlite.default_schema, "main");
    }

    #[test]
    fn missing_objects_report_their_names() {
        let catalog = Catalog::new(Engine::Postgresql);
        let err = catalog.table(&TableName::new("users")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RelationNotFound("users".into()));

        let err = catalog.table(&TableName::with_schema("audit", "log")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaNotFound("audit".into()));

        let err = catalog.get_type(&TypeName::new("mood")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeNotFound("mood".into()));
    }

    #[test]
    fn function_lookup_is_case_insensitive() {
        let catalog = Catalog::new(Engine::Postgresql);
        let funcs = catalog.list_funcs_by_name(&FuncName::new("LOWER")).unwrap();
        assert!(!funcs.is_empty());

        let err = catalog
            .list_funcs_by_name(&FuncName::from_parts(&["nope".into(), "lower".into()]).unwrap())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaNotFound("nope".into()));
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut catalog = Catalog::new(Engine::Mysql);
        catalog.schemas[0].tables.push(Table::new(
            TableName::new("t"),
            vec![Column::new("id", TypeName::new("int")).with_not_null(true)],
        ));
        let json = serde_json::to_string(&catalog).unwrap();
        let back: Catalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, catalog);
    }
}
