//! Folding DDL into the catalog
//!
//! [`Catalog::update`] applies one statement. Statements are applied in
//! file order and every failure leaves the catalog as it was before the
//! statement.

use sqlprism_core::{ErrorKind, FuncName, SqlError, TableName, TypeName};
use sqlprism_sql::ast::{
    AlterTableCmd, AlterTableSetSchemaStmt, AlterTableStmt, AlterTypeAddValueStmt,
    AlterTypeRenameValueStmt, AlterTypeSetSchemaStmt, ColumnDef, CommentStmt, CommentTarget,
    CreateCompositeTypeStmt, CreateEnumStmt, CreateExtensionStmt, CreateFunctionStmt,
    CreateSchemaStmt, CreateTableAsStmt, CreateTableStmt, CreateViewStmt, DropFunctionStmt,
    DropSchemaStmt, DropTableStmt, DropTypeStmt, ParamMode, RenameColumnStmt, RenameTableStmt,
    RenameTypeStmt, SelectStmt, Stmt,
};
use tracing::debug;

use crate::catalog::{Argument, Catalog, Column, CompositeType, Enum, Function, Table, Type};
use crate::extension::ExtensionLoader;

/// Computes the output columns of a query against a catalog
///
/// Views and `CREATE TABLE AS` store the columns of their query; the
/// analysis engine implements this.
pub trait ColumnGenerator {
    fn output_columns(
        &self,
        catalog: &Catalog,
        query: &SelectStmt,
    ) -> Result<Vec<sqlprism_core::Column>, SqlError>;
}

const SERIAL_TYPES: &[&str] = &["serial", "bigserial", "smallserial", "serial4", "serial8", "serial2"];

impl Catalog {
    /// Apply one statement
    ///
    /// Query statements and statement kinds without catalog effect are
    /// accepted and ignored.
    pub fn update(
        &mut self,
        stmt: &Stmt,
        columns: &dyn ColumnGenerator,
        extensions: &dyn ExtensionLoader,
    ) -> Result<(), SqlError> {
        debug!(kind = stmt.kind(), "folding statement into catalog");
        match stmt {
            Stmt::CreateTable(n) => self.create_table(n),
            Stmt::CreateTableAs(n) => self.create_table_as(n, columns),
            Stmt::AlterTable(n) => self.alter_table(n),
            Stmt::RenameTable(n) => self.rename_table(n),
            Stmt::RenameColumn(n) => self.rename_column(n),
            Stmt::AlterTableSetSchema(n) => self.alter_table_set_schema(n),
            Stmt::DropTable(n) => self.drop_table(n),
            Stmt::CreateSchema(n) => self.create_schema(n),
            Stmt::DropSchema(n) => self.drop_schema(n),
            Stmt::CreateEnum(n) => self.create_enum(n),
            Stmt::CreateCompositeType(n) => self.create_composite_type(n),
            Stmt::AlterTypeAddValue(n) => self.alter_type_add_value(n),
            Stmt::AlterTypeRenameValue(n) => self.alter_type_rename_value(n),
            Stmt::RenameType(n) => self.rename_type(n),
            Stmt::AlterTypeSetSchema(n) => self.alter_type_set_schema(n),
            Stmt::DropType(n) => self.drop_type(n),
            Stmt::CreateFunction(n) => self.create_function(n),
            Stmt::DropFunction(n) => self.drop_function(n),
            Stmt::CreateView(n) => self.create_view(n, columns),
            Stmt::Comment(n) => self.comment_on(n),
            Stmt::CreateExtension(n) => self.create_extension(n, extensions),
            Stmt::Select(_)
            | Stmt::Insert(_)
            | Stmt::Update(_)
            | Stmt::Delete(_)
            | Stmt::Truncate(_)
            | Stmt::Unsupported(_) => Ok(()),
        }
    }

    fn create_table(&mut self, stmt: &CreateTableStmt) -> Result<(), SqlError> {
        let schema_name = self.schema_name(&stmt.name.schema).to_string();
        let schema = self.schema(&schema_name)?;
        if schema.table(&stmt.name.name).is_some() {
            if stmt.if_not_exists {
                return Ok(());
            }
            return Err(ErrorKind::RelationExists(stmt.name.name.clone()).into());
        }

        let mut columns: Vec<Column> = Vec::new();
        if let Some(like) = &stmt.like {
            if !stmt.columns.is_empty() {
                return Err(SqlError::invalid(
                    "create table node cannot have both a LIKE reference and columns",
                ));
            }
            columns = self.table(like)?.columns.clone();
        }

        for parent in &stmt.inherits {
            for column in &self.table(parent)?.columns {
                merge_column(&mut columns, column.clone());
            }
        }

        let mut enums = Vec::new();
        for def in &stmt.columns {
            let primary_key = def.primary_key || stmt.primary_key.contains(&def.name);
            let column = match inline_enum(&stmt.name, def) {
                Some((type_name, values)) => {
                    enums.push(Enum {
                        name: type_name.name.clone(),
                        values,
                        comment: String::new(),
                    });
                    let mut column = column_from_def(def, primary_key);
                    column.type_name = type_name;
                    column
                }
                None => column_from_def(def, primary_key),
            };
            merge_column(&mut columns, column);
        }

        let schema = self.schema_mut(&schema_name)?;
        if let Some(e) = enums.iter().find(|e| schema.type_index(&e.name).is_some()) {
            return Err(ErrorKind::TypeExists(e.name.clone()).into());
        }
        schema.types.extend(enums.into_iter().map(Type::Enum));
        let mut table = Table::new(
            TableName::with_schema(schema_name, stmt.name.name.clone()),
            columns,
        );
        table.comment = stmt.comment.clone();
        schema.tables.push(table);
        Ok(())
    }

    fn create_table_as(
        &mut self,
        stmt: &CreateTableAsStmt,
        generator: &dyn ColumnGenerator,
    ) -> Result<(), SqlError> {
        let schema_name = self.schema_name(&stmt.name.schema).to_string();
        if self.schema(&schema_name)?.table(&stmt.name.name).is_some() {
            if stmt.if_not_exists {
                return Ok(());
            }
            return Err(ErrorKind::RelationExists(stmt.name.name.clone()).into());
        }
        let columns = generator
            .output_columns(self, &stmt.query)?
            .iter()
            .map(Column::from)
            .collect();
        let table = Table::new(TableName::with_schema(schema_name.clone(), stmt.name.name.clone()), columns);
        self.schema_mut(&schema_name)?.tables.push(table);
        Ok(())
    }

    fn create_view(
        &mut self,
        stmt: &CreateViewStmt,
        generator: &dyn ColumnGenerator,
    ) -> Result<(), SqlError> {
        let schema_name = self.schema_name(&stmt.name.schema).to_string();
        let existing = self.schema(&schema_name)?.table_index(&stmt.name.name);
        if existing.is_some() && !stmt.replace && !stmt.alter {
            return Err(ErrorKind::RelationExists(stmt.name.name.clone()).into());
        }
        if existing.is_none() && stmt.alter {
            return Err(ErrorKind::RelationNotFound(stmt.name.name.clone()).into());
        }

        let columns: Vec<Column> = generator
            .output_columns(self, &stmt.query)?
            .iter()
            .map(Column::from)
            .collect();
        let schema = self.schema_mut(&schema_name)?;
        match existing {
            Some(idx) => schema.tables[idx].columns = columns,
            None => schema.tables.push(Table::new(
                TableName::with_schema(schema_name.clone(), stmt.name.name.clone()),
                columns,
            )),
        }
        Ok(())
    }

    fn alter_table(&mut self, stmt: &AlterTableStmt) -> Result<(), SqlError> {
        let schema_name = self.schema_name(&stmt.table.schema).to_string();
        let mut table = match self.table(&stmt.table) {
            Ok(table) => table.clone(),
            Err(err) if stmt.missing_ok && err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };

        let relation = table.rel.name.clone();
        let not_found = |column: &str| -> SqlError {
            ErrorKind::ColumnNotFound {
                relation: relation.clone(),
                column: column.to_string(),
            }
            .into()
        };

        let mut enums = Vec::new();
        for cmd in &stmt.cmds {
            match cmd {
                AlterTableCmd::AddColumn { def, if_not_exists } => {
                    if table.column_index(&def.name).is_some() {
                        if *if_not_exists {
                            continue;
                        }
                        return Err(ErrorKind::ColumnExists {
                            relation: relation.clone(),
                            column: def.name.clone(),
                        }
                        .into());
                    }
                    let mut column = column_from_def(def, def.primary_key);
                    if let Some((type_name, values)) = inline_enum(&table.rel, def) {
                        enums.push(Enum {
                            name: type_name.name.clone(),
                            values,
                            comment: String::new(),
                        });
                        column.type_name = type_name;
                    }
                    table.columns.push(column);
                }
                AlterTableCmd::DropColumn { name, missing_ok } => match table.column_index(name) {
                    Some(idx) => {
                        table.columns.remove(idx);
                    }
                    None if *missing_ok => {}
                    None => return Err(not_found(name)),
                },
                AlterTableCmd::AlterColumnType { name, type_name } => {
                    let idx = table.column_index(name).ok_or_else(|| not_found(name))?;
                    table.columns[idx].type_name = type_name.clone();
                }
                AlterTableCmd::SetNotNull { name } => {
                    let idx = table.column_index(name).ok_or_else(|| not_found(name))?;
                    table.columns[idx].not_null = true;
                }
                AlterTableCmd::DropNotNull { name } => {
                    let idx = table.column_index(name).ok_or_else(|| not_found(name))?;
                    table.columns[idx].not_null = false;
                }
            }
        }

        let schema = self.schema_mut(&schema_name)?;
        if let Some(e) = enums.iter().find(|e| schema.type_index(&e.name).is_some()) {
            return Err(ErrorKind::TypeExists(e.name.clone()).into());
        }
        schema.types.extend(enums.into_iter().map(Type::Enum));
        if let Some(idx) = schema.table_index(&table.rel.name) {
            schema.tables[idx] = table;
        }
        Ok(())
    }

    fn rename_table(&mut self, stmt: &RenameTableStmt) -> Result<(), SqlError> {
        let schema_name = self.schema_name(&stmt.table.schema).to_string();
        let schema = match self.schema_mut(&schema_name) {
            Ok(schema) => schema,
            Err(_) if stmt.missing_ok => return Ok(()),
            Err(err) => return Err(err),
        };
        let idx = match schema.table_index(&stmt.table.name) {
            Some(idx) => idx,
            None if stmt.missing_ok => return Ok(()),
            None => return Err(ErrorKind::RelationNotFound(stmt.table.name.clone()).into()),
        };
        if schema.table_index(&stmt.new_name).is_some() {
            return Err(ErrorKind::RelationExists(stmt.new_name.clone()).into());
        }
        schema.tables[idx].rel.name = stmt.new_name.clone();
        Ok(())
    }

    fn rename_column(&mut self, stmt: &RenameColumnStmt) -> Result<(), SqlError> {
        let table = match self.table_mut(&stmt.table) {
            Ok(table) => table,
            Err(err) if stmt.missing_ok && err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };
        if table.column_index(&stmt.new_name).is_some() {
            return Err(ErrorKind::ColumnExists {
                relation: table.rel.name.clone(),
                column: stmt.new_name.clone(),
            }
            .into());
        }
        let idx = table.column_index(&stmt.column).ok_or_else(|| {
            SqlError::new(ErrorKind::ColumnNotFound {
                relation: table.rel.name.clone(),
                column: stmt.column.clone(),
            })
        })?;
        table.columns[idx].name = stmt.new_name.clone();
        Ok(())
    }

    fn alter_table_set_schema(&mut self, stmt: &AlterTableSetSchemaStmt) -> Result<(), SqlError> {
        let from = self.schema_name(&stmt.table.schema).to_string();
        let idx = match self.schema(&from).map(|s| s.table_index(&stmt.table.name)) {
            Ok(Some(idx)) => idx,
            Ok(None) | Err(_) if stmt.missing_ok => return Ok(()),
            Ok(None) => return Err(ErrorKind::RelationNotFound(stmt.table.name.clone()).into()),
            Err(err) => return Err(err),
        };
        if self.schema(&stmt.new_schema)?.table_index(&stmt.table.name).is_some() {
            return Err(ErrorKind::RelationExists(stmt.table.name.clone()).into());
        }
        let mut table = self.schema_mut(&from)?.tables.remove(idx);
        table.rel.schema = stmt.new_schema.clone();
        self.schema_mut(&stmt.new_schema)?.tables.push(table);
        Ok(())
    }

    fn drop_table(&mut self, stmt: &DropTableStmt) -> Result<(), SqlError> {
        for name in &stmt.tables {
            let schema = match self.schema_mut(&name.schema) {
                Ok(schema) => schema,
                Err(_) if stmt.if_exists => continue,
                Err(err) => return Err(err),
            };
            match schema.table_index(&name.name) {
                Some(idx) => {
                    schema.tables.remove(idx);
                }
                None if stmt.if_exists => {}
                None => return Err(ErrorKind::RelationNotFound(name.name.clone()).into()),
            }
        }
        Ok(())
    }

    fn create_schema(&mut self, stmt: &CreateSchemaStmt) -> Result<(), SqlError> {
        if self.has_schema(&stmt.name) {
            if stmt.if_not_exists || stmt.name == self.default_schema {
                return Ok(());
            }
            return Err(ErrorKind::SchemaExists(stmt.name.clone()).into());
        }
        self.schemas.push(crate::catalog::Schema::new(stmt.name.clone()));
        Ok(())
    }

    fn drop_schema(&mut self, stmt: &DropSchemaStmt) -> Result<(), SqlError> {
        for name in &stmt.schemas {
            match self.schemas.iter().position(|s| &s.name == name) {
                Some(idx) => {
                    self.schemas.remove(idx);
                }
                None if stmt.if_exists => {}
                None => return Err(ErrorKind::SchemaNotFound(name.clone()).into()),
            }
        }
        Ok(())
    }

    /// Enum and composite types share a namespace with tables
    fn check_new_type(&self, name: &TypeName) -> Result<(), SqlError> {
        let schema = self.schema(&name.schema)?;
        if schema.table(&name.name).is_some() {
            return Err(ErrorKind::RelationExists(name.name.clone()).into());
        }
        if schema.get_type(&name.name).is_some() {
            return Err(ErrorKind::TypeExists(name.name.clone()).into());
        }
        Ok(())
    }

    fn create_enum(&mut self, stmt: &CreateEnumStmt) -> Result<(), SqlError> {
        self.check_new_type(&stmt.name)?;
        self.schema_mut(&stmt.name.schema)?.types.push(Type::Enum(Enum {
            name: stmt.name.name.clone(),
            values: stmt.values.clone(),
            comment: String::new(),
        }));
        Ok(())
    }

    fn create_composite_type(&mut self, stmt: &CreateCompositeTypeStmt) -> Result<(), SqlError> {
        self.check_new_type(&stmt.name)?;
        let columns = stmt.columns.iter().map(|def| column_from_def(def, false)).collect();
        self.schema_mut(&stmt.name.schema)?
            .types
            .push(Type::Composite(CompositeType {
                name: stmt.name.name.clone(),
                columns,
                comment: String::new(),
            }));
        Ok(())
    }

    fn enum_mut(&mut self, name: &TypeName) -> Result<&mut Enum, SqlError> {
        let schema = self.schema_mut(&name.schema)?;
        let idx = schema
            .type_index(&name.name)
            .ok_or_else(|| SqlError::new(ErrorKind::TypeNotFound(name.name.clone())))?;
        match &mut schema.types[idx] {
            Type::Enum(e) => Ok(e),
            Type::Composite(_) => Err(SqlError::invalid(format!("\"{}\" is not an enum", name.name))),
        }
    }

    fn alter_type_add_value(&mut self, stmt: &AlterTypeAddValueStmt) -> Result<(), SqlError> {
        let e = self.enum_mut(&stmt.type_name)?;
        if e.values.contains(&stmt.new_value) {
            if stmt.if_not_exists {
                return Ok(());
            }
            return Err(ErrorKind::EnumValueExists(stmt.new_value.clone())
            .into());
        }
        match &stmt.neighbor {
            Some(neighbor) => {
                let idx = e.values.iter().position(|v| v == neighbor).ok_or_else(|| {
                    SqlError::new(ErrorKind::EnumValueNotFound(neighbor.clone()))
                })?;
                let at = if stmt.after { idx + 1 } else { idx };
                e.values.insert(at, stmt.new_value.clone());
            }
            None => e.values.push(stmt.new_value.clone()),
        }
        Ok(())
    }

    fn alter_type_rename_value(&mut self, stmt: &AlterTypeRenameValueStmt) -> Result<(), SqlError> {
        let e = self.enum_mut(&stmt.type_name)?;
        if e.values.contains(&stmt.new_value) {
            return Err(ErrorKind::EnumValueExists(stmt.new_value.clone())
            .into());
        }
        let idx = e.values.iter().position(|v| v == &stmt.old_value).ok_or_else(|| {
            SqlError::new(ErrorKind::EnumValueNotFound(stmt.old_value.clone()))
        })?;
        e.values[idx] = stmt.new_value.clone();
        Ok(())
    }

    fn rename_type(&mut self, stmt: &RenameTypeStmt) -> Result<(), SqlError> {
        let schema_name = self.schema_name(&stmt.type_name.schema).to_string();
        let schema = self.schema_mut(&schema_name)?;
        let idx = schema
            .type_index(&stmt.type_name.name)
            .ok_or_else(|| SqlError::new(ErrorKind::TypeNotFound(stmt.type_name.name.clone())))?;
        if schema.type_index(&stmt.new_name).is_some() {
            return Err(ErrorKind::TypeExists(stmt.new_name.clone()).into());
        }
        schema.types[idx].set_name(&stmt.new_name);

        let to = TypeName::with_schema(stmt.type_name.schema.clone(), stmt.new_name.clone());
        self.rewrite_type_refs(&stmt.type_name, &to);
        Ok(())
    }

    fn alter_type_set_schema(&mut self, stmt: &AlterTypeSetSchemaStmt) -> Result<(), SqlError> {
        let from = self.schema_name(&stmt.type_name.schema).to_string();
        let idx = self
            .schema(&from)?
            .type_index(&stmt.type_name.name)
            .ok_or_else(|| SqlError::new(ErrorKind::TypeNotFound(stmt.type_name.name.clone())))?;
        if self.schema(&stmt.new_schema)?.type_index(&stmt.type_name.name).is_some() {
            return Err(ErrorKind::TypeExists(stmt.type_name.name.clone()).into());
        }
        let moved = self.schema_mut(&from)?.types.remove(idx);
        self.schema_mut(&stmt.new_schema)?.types.push(moved);

        let to = TypeName::with_schema(stmt.new_schema.clone(), stmt.type_name.name.clone());
        self.rewrite_type_refs(&stmt.type_name, &to);
        Ok(())
    }

    fn drop_type(&mut self, stmt: &DropTypeStmt) -> Result<(), SqlError> {
        for name in &stmt.types {
            let schema = match self.schema_mut(&name.schema) {
                Ok(schema) => schema,
                Err(_) if stmt.if_exists => continue,
                Err(err) => return Err(err),
            };
            match schema.type_index(&name.name) {
                Some(idx) => {
                    schema.types.remove(idx);
                }
                None if stmt.if_exists => {}
                None => return Err(ErrorKind::TypeNotFound(name.name.clone()).into()),
            }
        }
        Ok(())
    }

    fn create_function(&mut self, stmt: &CreateFunctionStmt) -> Result<(), SqlError> {
        let args: Vec<Argument> = stmt
            .params
            .iter()
            .map(|p| Argument {
                name: p.name.clone(),
                type_name: p.type_name.clone(),
                has_default: p.has_default,
                mode: p.mode,
            })
            .collect();
        let function = Function {
            name: stmt.name.name.clone(),
            args,
            return_type: stmt.returns.clone(),
            return_type_nullable: true,
            returns_set: stmt.setof || stmt.params.iter().any(|p| p.mode == ParamMode::Table),
            comment: String::new(),
        };
        let in_types: Vec<TypeName> = function.in_args().map(|a| a.type_name.clone()).collect();

        let schema = self.schema_mut(&stmt.name.schema)?;
        match schema.func_index(&function.name, &in_types) {
            Some(idx) if stmt.replace => schema.functions[idx] = function,
            Some(_) => return Err(ErrorKind::FunctionExists(function.name).into()),
            None => schema.functions.push(function),
        }
        Ok(())
    }

    fn drop_function(&mut self, stmt: &DropFunctionStmt) -> Result<(), SqlError> {
        for spec in &stmt.funcs {
            let schema = match self.schema_mut(&spec.name.schema) {
                Ok(schema) => schema,
                Err(_) if stmt.missing_ok => continue,
                Err(err) => return Err(err),
            };
            let idx = match &spec.args {
                Some(args) => schema.func_index(&spec.name.name, args),
                None => schema.func_index_by_name(&spec.name.name)?,
            };
            match idx {
                Some(idx) => {
                    schema.functions.remove(idx);
                }
                None if stmt.missing_ok => {}
                None => return Err(not_found_func(&spec.name)),
            }
        }
        Ok(())
    }

    fn comment_on(&mut self, stmt: &CommentStmt) -> Result<(), SqlError> {
        let text = stmt.comment.clone().unwrap_or_default();
        match &stmt.target {
            CommentTarget::Schema(name) => {
                let schema = self
                    .schemas
                    .iter_mut()
                    .find(|s| &s.name == name)
                    .ok_or_else(|| SqlError::new(ErrorKind::SchemaNotFound(name.clone())))?;
                schema.comment = text;
            }
            CommentTarget::Table(name) | CommentTarget::View(name) => {
                self.table_mut(name)?.comment = text;
            }
            CommentTarget::Column { table, column } => {
                let table = self.table_mut(table)?;
                let idx = table.column_index(column).ok_or_else(|| {
                    SqlError::new(ErrorKind::ColumnNotFound {
                        relation: table.rel.name.clone(),
                        column: column.clone(),
                    })
                })?;
                table.columns[idx].comment = text;
            }
            CommentTarget::Type(name) => {
                let schema = self.schema_mut(&name.schema)?;
                let idx = schema
                    .type_index(&name.name)
                    .ok_or_else(|| SqlError::new(ErrorKind::TypeNotFound(name.name.clone())))?;
                *schema.types[idx].comment_mut() = text;
            }
        }
        Ok(())
    }

    fn create_extension(
        &mut self,
        stmt: &CreateExtensionStmt,
        loader: &dyn ExtensionLoader,
    ) -> Result<(), SqlError> {
        if self.extensions.contains(&stmt.name) {
            return Ok(());
        }
        let Some(functions) = loader.load(&stmt.name) else {
            debug!(extension = %stmt.name, "no definitions for extension");
            return Ok(());
        };
        let default_schema = self.default_schema.clone();
        let schema = self.schema_mut(&default_schema)?;
        for function in functions {
            let in_types: Vec<TypeName> = function.in_args().map(|a| a.type_name.clone()).collect();
            if schema.func_index(&function.name, &in_types).is_none() {
                schema.functions.push(function);
            }
        }
        self.extensions.push(stmt.name.clone());
        Ok(())
    }
}

fn not_found_func(name: &FuncName) -> SqlError {
    SqlError::new(ErrorKind::FunctionNotFound(name.to_string()))
}

fn column_from_def(def: &ColumnDef, primary_key: bool) -> Column {
    let serial = def.type_name.schema.is_empty() && SERIAL_TYPES.contains(&def.type_name.name.as_str());
    Column {
        name: def.name.clone(),
        type_name: def.type_name.clone(),
        not_null: def.not_null || primary_key || serial,
        comment: def.comment.clone(),
    }
}

/// Type name and labels of an inline `ENUM(...)` column, named `{table}_{column}`
fn inline_enum(table: &TableName, def: &ColumnDef) -> Option<(TypeName, Vec<String>)> {
    if def.type_name.name != "enum" || def.type_name.enum_values.is_empty() {
        return None;
    }
    let name = format!("{}_{}", table.name, def.name);
    Some((
        TypeName::with_schema(table.schema.clone(), name),
        def.type_name.enum_values.clone(),
    ))
}

/// Add a column, merging with an earlier one of the same name
fn merge_column(columns: &mut Vec<Column>, column: Column) {
    match columns.iter_mut().find(|c| c.name == column.name) {
        Some(existing) => existing.not_null |= column.not_null,
        None => columns.push(column),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{ContribLoader, StaticLoader};
    use pretty_assertions::assert_eq;
    use sqlprism_core::Engine;
    use sqlprism_sql::{Parser, SqlParser};

    /// Generator for DDL that never contains views
    struct NoViews;

    impl ColumnGenerator for NoViews {
        fn output_columns(
            &self,
            _catalog: &Catalog,
            _query: &SelectStmt,
        ) -> Result<Vec<sqlprism_core::Column>, SqlError> {
            Err(SqlError::invalid("views are not expected here"))
        }
    }

    fn fold(catalog: &mut Catalog, sql: &str) -> Result<(), SqlError> {
        let file = SqlParser::new(catalog.engine).parse(sql);
        assert!(file.errors.is_empty(), "parse errors: {:?}", file.errors);
        for raw in &file.statements {
            catalog.update(&raw.stmt, &NoViews, &ContribLoader)?;
        }
        Ok(())
    }

    fn column_names(table: &Table) -> Vec<&str> {
        table.columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn add_existing_column_fails_then_readd_succeeds() {
        let mut catalog = Catalog::new(Engine::Postgresql);
        fold(&mut catalog, "CREATE TABLE foo (bar text);").unwrap();

        let err = fold(&mut catalog, "ALTER TABLE foo ADD COLUMN bar text;").unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::ColumnExists {
                relation: "foo".into(),
                column: "bar".into()
            }
        );

        fold(&mut catalog, "ALTER TABLE foo DROP COLUMN bar; ALTER TABLE foo ADD COLUMN bar text;").unwrap();
        let table = catalog.table(&TableName::new("foo")).unwrap();
        assert_eq!(column_names(table), vec!["bar"]);
    }

    #[test]
    fn create_table_twice() {
        let mut catalog = Catalog::new(Engine::Postgresql);
        fold(&mut catalog, "CREATE TABLE foo (id int);").unwrap();
        let err = fold(&mut catalog, "CREATE TABLE foo (id int);").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RelationExists("foo".into()));
        fold(&mut catalog, "CREATE TABLE IF NOT EXISTS foo (other int);").unwrap();
        assert_eq!(column_names(catalog.table(&TableName::new("foo")).unwrap()), vec!["id"]);
    }

    #[test]
    fn primary_keys_and_serials_are_not_null() {
        let mut catalog = Catalog::new(Engine::Postgresql);
        fold(
            &mut catalog,
            "CREATE TABLE t (id serial, code text, name text, PRIMARY KEY (code));",
        )
        .unwrap();
        let table = catalog.table(&TableName::new("t")).unwrap();
        let not_null: Vec<bool> = table.columns.iter().map(|c| c.not_null).collect();
        assert_eq!(not_null, vec![true, true, false]);
    }

    #[test]
    fn inherits_prepends_parent_columns() {
        let mut catalog = Catalog::new(Engine::Postgresql);
        fold(
            &mut catalog,
            "CREATE TABLE base (id int NOT NULL, name text);
             CREATE TABLE child (name text NOT NULL, extra bool) INHERITS (base);",
        )
        .unwrap();
        let child = catalog.table(&TableName::new("child")).unwrap();
        assert_eq!(column_names(child), vec!["id", "name", "extra"]);
        assert!(child.columns[1].not_null);
    }

    #[test]
    fn inline_enum_creates_type() {
        let mut catalog = Catalog::new(Engine::Mysql);
        fold(&mut catalog, "CREATE TABLE shirts (size ENUM('s', 'm', 'l') NOT NULL);").unwrap();
        let ty = catalog.get_type(&TypeName::new("shirts_size")).unwrap();
        match ty {
            Type::Enum(e) => assert_eq!(e.values, vec!["s", "m", "l"]),
            other => panic!("expected enum, got {:?}", other),
        }
        let table = catalog.table(&TableName::new("shirts")).unwrap();
        assert_eq!(table.columns[0].type_name.name, "shirts_size");
    }

    #[test]
    fn enum_values_are_positioned() {
        let mut catalog = Catalog::new(Engine::Postgresql);
        fold(
            &mut catalog,
            "CREATE TYPE mood AS ENUM ('sad', 'happy');
             ALTER TYPE mood ADD VALUE 'ok' BEFORE 'happy';
             ALTER TYPE mood ADD VALUE 'great' AFTER 'happy';
             ALTER TYPE mood ADD VALUE IF NOT EXISTS 'ok';",
        )
        .unwrap();
        match catalog.get_type(&TypeName::new("mood")).unwrap() {
            Type::Enum(e) => assert_eq!(e.values, vec!["sad", "ok", "happy", "great"]),
            other => panic!("expected enum, got {:?}", other),
        }

        let err = fold(&mut catalog, "ALTER TYPE mood ADD VALUE 'sad';").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::EnumValueExists { .. }));

        let err = fold(&mut catalog, "ALTER TYPE mood RENAME VALUE 'meh' TO 'fine';").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::EnumValueNotFound { .. }));
    }

    #[test]
    fn enum_cannot_shadow_table() {
        let mut catalog = Catalog::new(Engine::Postgresql);
        fold(&mut catalog, "CREATE TABLE status (id int);").unwrap();
        let err = fold(&mut catalog, "CREATE TYPE status AS ENUM ('a');").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RelationExists("status".into()));
    }

    #[test]
    fn renaming_type_rewrites_columns() {
        let mut catalog = Catalog::new(Engine::Postgresql);
        fold(
            &mut catalog,
            "CREATE SCHEMA app;
             CREATE TYPE mood AS ENUM ('sad', 'happy');
             CREATE TABLE people (m mood);
             ALTER TYPE mood RENAME TO feeling;
             ALTER TYPE feeling SET SCHEMA app;",
        )
        .unwrap();
        let people = catalog.table(&TableName::new("people")).unwrap();
        assert_eq!(people.columns[0].type_name.name, "feeling");
        assert_eq!(people.columns[0].type_name.schema, "app");
        assert!(catalog.get_type(&TypeName::with_schema("app", "feeling")).is_ok());
    }

    #[test]
    fn rename_and_move_tables() {
        let mut catalog = Catalog::new(Engine::Postgresql);
        fold(
            &mut catalog,
            "CREATE SCHEMA archive;
             CREATE TABLE a (id int);
             CREATE TABLE b (id int);",
        )
        .unwrap();
        let err = fold(&mut catalog, "ALTER TABLE a RENAME TO b;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RelationExists("b".into()));

        fold(&mut catalog, "ALTER TABLE a RENAME TO c; ALTER TABLE c SET SCHEMA archive;").unwrap();
        assert!(catalog.table(&TableName::with_schema("archive", "c")).is_ok());
        assert!(catalog.table(&TableName::new("c")).is_err());
    }

    #[test]
    fn drop_with_and_without_if_exists() {
        let mut catalog = Catalog::new(Engine::Postgresql);
        fold(&mut catalog, "DROP TABLE IF EXISTS ghost; DROP TYPE IF EXISTS ghost;").unwrap();
        let err = fold(&mut catalog, "DROP TABLE ghost;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RelationNotFound("ghost".into()));
        let err = fold(&mut catalog, "DROP SCHEMA ghost;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaNotFound("ghost".into()));
    }

    #[test]
    fn default_schema_create_is_a_noop() {
        let mut catalog = Catalog::new(Engine::Postgresql);
        fold(&mut catalog, "CREATE SCHEMA public;").unwrap();
        fold(&mut catalog, "CREATE SCHEMA app;").unwrap();
        let err = fold(&mut catalog, "CREATE SCHEMA app;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaExists("app".into()));
    }

    #[test]
    fn function_overloads_and_drop() {
        let mut catalog = Catalog::new(Engine::Postgresql);
        fold(
            &mut catalog,
            "CREATE FUNCTION f(a integer) RETURNS integer AS $$ SELECT a $$ LANGUAGE sql;
             CREATE FUNCTION f(a text) RETURNS text AS $$ SELECT a $$ LANGUAGE sql;",
        )
        .unwrap();

        let err = fold(
            &mut catalog,
            "CREATE FUNCTION f(b integer) RETURNS integer AS $$ SELECT b $$ LANGUAGE sql;",
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::FunctionExists("f".into()));

        let err = fold(&mut catalog, "DROP FUNCTION f;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::FunctionNotUnique("f".into()));

        fold(&mut catalog, "DROP FUNCTION f(text); DROP FUNCTION f;").unwrap();
        assert!(catalog.schema("").unwrap().functions.is_empty());
    }

    #[test]
    fn comments_attach_and_clear() {
        let mut catalog = Catalog::new(Engine::Postgresql);
        fold(
            &mut catalog,
            "CREATE TABLE t (id int);
             COMMENT ON TABLE t IS 'things';
             COMMENT ON COLUMN t.id IS 'key';",
        )
        .unwrap();
        let table = catalog.table(&TableName::new("t")).unwrap();
        assert_eq!(table.comment, "things");
        assert_eq!(table.columns[0].comment, "key");

        fold(&mut catalog, "COMMENT ON TABLE t IS NULL;").unwrap();
        assert_eq!(catalog.table(&TableName::new("t")).unwrap().comment, "");

        let err = fold(&mut catalog, "COMMENT ON COLUMN t.nope IS 'x';").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ColumnNotFound { .. }));
    }

    #[test]
    fn extensions_load_once() {
        let mut catalog = Catalog::new(Engine::Postgresql);
        let loader = StaticLoader::new().with_extension(
            "hstore",
            vec![Function::new("akeys", vec![Argument::new("", TypeName::new("hstore"))], TypeName::new("text").array_of(1))],
        );
        let stmt = Stmt::CreateExtension(CreateExtensionStmt {
            name: "hstore".into(),
            if_not_exists: false,
        });
        catalog.update(&stmt, &NoViews, &loader).unwrap();
        catalog.update(&stmt, &NoViews, &loader).unwrap();
        let funcs = catalog.list_funcs_by_name(&FuncName::new("akeys")).unwrap();
        assert_eq!(funcs.len(), 1);
        assert_eq!(catalog.extensions, vec!["hstore".to_string()]);
    }
}
