//! Common statement AST
//!
//! Every supported engine's grammar is converted into this closed set of
//! node types. Only the structure needed for name and type resolution is
//! kept; anything else collapses into [`Expr::Other`] or
//! [`Stmt::Unsupported`].

use serde::{Deserialize, Serialize};
use sqlprism_core::{FuncName, TableName, TypeName};

/// A statement together with its position in the source file
#[derive(Debug, Clone, PartialEq)]
pub struct RawStmt {
    pub stmt: Stmt,

    /// Byte offset of the statement's first character (leading comments included)
    pub location: usize,

    /// Length of the statement text in bytes
    pub len: usize,
}

impl RawStmt {
    /// Source text of this statement within the file it was parsed from
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        let end = (self.location + self.len).min(src.len());
        &src[self.location.min(end)..end]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Select(Box<SelectStmt>),
    Insert(Box<InsertStmt>),
    Update(Box<UpdateStmt>),
    Delete(Box<DeleteStmt>),
    Truncate(TruncateStmt),
    CreateTable(Box<CreateTableStmt>),
    CreateTableAs(Box<CreateTableAsStmt>),
    AlterTable(AlterTableStmt),
    RenameTable(RenameTableStmt),
    RenameColumn(RenameColumnStmt),
    AlterTableSetSchema(AlterTableSetSchemaStmt),
    DropTable(DropTableStmt),
    CreateSchema(CreateSchemaStmt),
    DropSchema(DropSchemaStmt),
    CreateEnum(CreateEnumStmt),
    CreateCompositeType(CreateCompositeTypeStmt),
    AlterTypeAddValue(AlterTypeAddValueStmt),
    AlterTypeRenameValue(AlterTypeRenameValueStmt),
    RenameType(RenameTypeStmt),
    AlterTypeSetSchema(AlterTypeSetSchemaStmt),
    DropType(DropTypeStmt),
    CreateFunction(Box<CreateFunctionStmt>),
    DropFunction(DropFunctionStmt),
    CreateView(Box<CreateViewStmt>),
    Comment(CommentStmt),
    CreateExtension(CreateExtensionStmt),
    /// A statement kind the analyzer does not model; carries its keyword
    Unsupported(String),
}

impl Stmt {
    /// Short label used in logs and error messages
    pub fn kind(&self) -> &str {
        match self {
            Stmt::Select(_) => "SELECT",
            Stmt::Insert(_) => "INSERT",
            Stmt::Update(_) => "UPDATE",
            Stmt::Delete(_) => "DELETE",
            Stmt::Truncate(_) => "TRUNCATE",
            Stmt::CreateTable(_) => "CREATE TABLE",
            Stmt::CreateTableAs(_) => "CREATE TABLE AS",
            Stmt::AlterTable(_) => "ALTER TABLE",
            Stmt::RenameTable(_) => "RENAME TABLE",
            Stmt::RenameColumn(_) => "RENAME COLUMN",
            Stmt::AlterTableSetSchema(_) => "ALTER TABLE SET SCHEMA",
            Stmt::DropTable(_) => "DROP TABLE",
            Stmt::CreateSchema(_) => "CREATE SCHEMA",
            Stmt::DropSchema(_) => "DROP SCHEMA",
            Stmt::CreateEnum(_) => "CREATE TYPE AS ENUM",
            Stmt::CreateCompositeType(_) => "CREATE TYPE",
            Stmt::AlterTypeAddValue(_) => "ALTER TYPE ADD VALUE",
            Stmt::AlterTypeRenameValue(_) => "ALTER TYPE RENAME VALUE",
            Stmt::RenameType(_) => "ALTER TYPE RENAME",
            Stmt::AlterTypeSetSchema(_) => "ALTER TYPE SET SCHEMA",
            Stmt::DropType(_) => "DROP TYPE",
            Stmt::CreateFunction(_) => "CREATE FUNCTION",
            Stmt::DropFunction(_) => "DROP FUNCTION",
            Stmt::CreateView(_) => "CREATE VIEW",
            Stmt::Comment(_) => "COMMENT",
            Stmt::CreateExtension(_) => "CREATE EXTENSION",
            Stmt::Unsupported(kind) => kind,
        }
    }

    /// Whether the statement reads or writes rows (as opposed to DDL)
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Stmt::Select(_) | Stmt::Insert(_) | Stmt::Update(_) | Stmt::Delete(_) | Stmt::Truncate(_)
        )
    }

    /// RETURNING list of a data-modifying statement
    pub fn returning(&self) -> Option<&[ResTarget]> {
        match self {
            Stmt::Insert(n) => Some(&n.returning),
            Stmt::Update(n) => Some(&n.returning),
            Stmt::Delete(n) => Some(&n.returning),
            _ => None,
        }
    }
}

/// `WITH [RECURSIVE] name AS (...), ...`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WithClause {
    pub recursive: bool,
    pub ctes: Vec<Cte>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    /// Explicit column names: `name(a, b) AS (...)`
    pub columns: Vec<String>,
    pub query: Box<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    Intersect,
    Except,
}

/// Two selects combined by UNION / INTERSECT / EXCEPT
#[derive(Debug, Clone, PartialEq)]
pub struct SetOperation {
    pub op: SetOp,
    pub all: bool,
    pub left: Box<SelectStmt>,
    pub right: Box<SelectStmt>,
}

/// SELECT, VALUES, or a set operation over them
///
/// A set operation leaves `targets` and `from` empty and carries its
/// branches in `set_op`; ORDER BY and LIMIT then apply to the whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectStmt {
    pub with: Option<WithClause>,
    pub distinct: bool,
    pub distinct_on: Vec<Expr>,
    pub targets: Vec<ResTarget>,
    pub from: Vec<FromItem>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    /// Named windows from the WINDOW clause
    pub windows: Vec<WindowDef>,
    pub order_by: Vec<Expr>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    /// Rows of a `VALUES (...), (...)` list
    pub values: Vec<Vec<Expr>>,
    pub set_op: Option<SetOperation>,
}

impl SelectStmt {
    /// Leftmost plain SELECT of a set-operation tree
    pub fn leftmost(&self) -> &SelectStmt {
        match &self.set_op {
            Some(op) => op.left.leftmost(),
            None => self,
        }
    }
}

/// One entry of a target or RETURNING list
#[derive(Debug, Clone, PartialEq)]
pub struct ResTarget {
    /// Explicit `AS name`
    pub name: Option<String>,
    pub val: Expr,
}

impl ResTarget {
    pub fn new(val: Expr) -> Self {
        Self { name: None, val }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// `column = value` in UPDATE SET and ON CONFLICT DO UPDATE SET
#[derive(Debug, Clone, PartialEq)]
pub struct SetTarget {
    pub column: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub with: Option<WithClause>,
    pub relation: RangeVar,
    /// Explicit column list; empty means every column in table order
    pub columns: Vec<String>,
    /// `VALUES` rows or a `SELECT`; `None` for `DEFAULT VALUES`
    pub source: Option<Box<SelectStmt>>,
    /// `ON CONFLICT DO UPDATE SET` / `ON DUPLICATE KEY UPDATE` assignments
    pub on_conflict: Vec<SetTarget>,
    pub returning: Vec<ResTarget>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmt {
    pub with: Option<WithClause>,
    pub relation: RangeVar,
    pub targets: Vec<SetTarget>,
    pub from: Vec<FromItem>,
    pub where_clause: Option<Expr>,
    pub returning: Vec<ResTarget>,
    pub limit: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub with: Option<WithClause>,
    pub relation: RangeVar,
    pub using: Vec<FromItem>,
    pub where_clause: Option<Expr>,
    pub returning: Vec<ResTarget>,
    pub limit: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TruncateStmt {
    pub relations: Vec<TableName>,
}

/// `AS alias (col, ...)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub columns: Vec<String>,
}

impl Alias {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }
}

/// A table reference in FROM
#[derive(Debug, Clone, PartialEq)]
pub struct RangeVar {
    pub name: TableName,
    pub alias: Option<Alias>,
}

impl RangeVar {
    pub fn new(name: TableName) -> Self {
        Self { name, alias: None }
    }

    /// Name the table is visible as within its scope
    pub fn scope_name(&self) -> &str {
        match &self.alias {
            Some(alias) => &alias.name,
            None => &self.name.name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinExpr {
    pub kind: JoinKind,
    pub left: FromItem,
    pub right: FromItem,
    pub on: Option<Expr>,
    pub using: Vec<String>,
    pub natural: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    Relation(RangeVar),
    Subselect {
        query: Box<SelectStmt>,
        alias: Option<Alias>,
        lateral: bool,
    },
    Function {
        call: FuncCall,
        alias: Option<Alias>,
    },
    Join(Box<JoinExpr>),
}

impl FromItem {
    /// Alias given to this item, if any
    pub fn alias(&self) -> Option<&Alias> {
        match self {
            FromItem::Relation(rv) => rv.alias.as_ref(),
            FromItem::Subselect { alias, .. } | FromItem::Function { alias, .. } => alias.as_ref(),
            FromItem::Join(_) => None,
        }
    }
}

/// A column reference, possibly `*` or `alias.*`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRef {
    /// Qualifier parts followed by the column name; only the qualifier for stars
    pub fields: Vec<String>,
    pub star: bool,
    /// `sqlprism.embed(alias)`
    pub embed: bool,
    /// Byte range of a star in the query text, used to expand it
    pub location: Option<usize>,
    pub len: usize,
}

impl ColumnRef {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    pub fn star(qualifier: Vec<String>) -> Self {
        Self {
            fields: qualifier,
            star: true,
            ..Self::default()
        }
    }

    /// Referenced column name; `None` for stars
    pub fn name(&self) -> Option<&str> {
        if self.star {
            None
        } else {
            self.fields.last().map(String::as_str)
        }
    }

    /// Table qualifier (`alias` in `alias.col`), empty if unqualified
    pub fn qualifier(&self) -> &[String] {
        if self.star {
            &self.fields
        } else {
            &self.fields[..self.fields.len().saturating_sub(1)]
        }
    }

    /// Dotted text form (`a.b`, `a.*`)
    pub fn joined(&self, sep: &str) -> String {
        let mut parts = self.fields.clone();
        if self.star {
            parts.push("*".to_string());
        }
        parts.join(sep)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    String(String),
    Integer(i64),
    Float(String),
    Boolean(bool),
    Null,
}

/// A positional placeholder after named parameters were rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamRef {
    pub number: usize,
    pub location: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpr {
    pub arg: Option<Box<Expr>>,
    pub whens: Vec<(Expr, Expr)>,
    pub default: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubLinkKind {
    Exists,
    /// Scalar subquery
    Expr,
    /// `x op ANY (SELECT ...)`, which includes `x IN (SELECT ...)`
    Any(String),
    All(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubLink {
    pub kind: SubLinkKind,
    pub test: Option<Box<Expr>>,
    pub subselect: Box<SelectStmt>,
    pub negated: bool,
}

/// Argument of a function call, optionally named (`f(x => 1)`)
#[derive(Debug, Clone, PartialEq)]
pub struct FuncArg {
    pub name: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowDef {
    pub name: Option<String>,
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncCall {
    pub name: FuncName,
    pub args: Vec<FuncArg>,
    /// `count(*)`
    pub star: bool,
    pub distinct: bool,
    pub over: Option<WindowDef>,
}

impl FuncCall {
    pub fn new(name: FuncName, args: Vec<Expr>) -> Self {
        Self {
            name,
            args: args.into_iter().map(|value| FuncArg { name: None, value }).collect(),
            star: false,
            distinct: false,
            over: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    Const(Const),
    Param(ParamRef),
    BinaryOp {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: String,
        expr: Box<Expr>,
    },
    Bool {
        op: BoolOp,
        args: Vec<Expr>,
    },
    NullTest {
        arg: Box<Expr>,
        negated: bool,
    },
    Cast {
        arg: Box<Expr>,
        type_name: TypeName,
    },
    Func(FuncCall),
    Case(CaseExpr),
    Coalesce(Vec<Expr>),
    SubLink(SubLink),
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    /// `x op ANY (array)` / `x op ALL (array)`
    Quantified {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
        all: bool,
    },
    Row(Vec<Expr>),
    Array(Vec<Expr>),
    /// An expression kind that is not modelled; keeps the children that may
    /// hold parameters or subqueries
    Other(Vec<Expr>),
}

impl Expr {
    pub fn column(fields: &[&str]) -> Self {
        Expr::Column(ColumnRef::new(fields.iter().map(|f| f.to_string()).collect()))
    }

    pub fn param(number: usize) -> Self {
        Expr::Param(ParamRef { number, location: None })
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Expr::Const(_))
    }
}

/// Column definition in CREATE TABLE, ALTER TABLE ADD COLUMN and composite types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: TypeName,
    pub not_null: bool,
    pub primary_key: bool,
    #[serde(default)]
    pub comment: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, type_name: TypeName) -> Self {
        Self {
            name: name.into(),
            type_name,
            not_null: false,
            primary_key: false,
            comment: String::new(),
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStmt {
    pub name: TableName,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef>,
    /// `CREATE TABLE a (LIKE b)` / `CREATE TABLE a LIKE b`
    pub like: Option<TableName>,
    pub inherits: Vec<TableName>,
    /// Columns named by a table-level PRIMARY KEY constraint
    pub primary_key: Vec<String>,
    pub comment: String,
}

impl CreateTableStmt {
    pub fn new(name: TableName) -> Self {
        Self {
            name,
            if_not_exists: false,
            columns: Vec::new(),
            like: None,
            inherits: Vec::new(),
            primary_key: Vec::new(),
            comment: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableAsStmt {
    pub name: TableName,
    pub if_not_exists: bool,
    pub query: Box<SelectStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterTableCmd {
    AddColumn { def: ColumnDef, if_not_exists: bool },
    DropColumn { name: String, missing_ok: bool },
    AlterColumnType { name: String, type_name: TypeName },
    SetNotNull { name: String },
    DropNotNull { name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTableStmt {
    pub table: TableName,
    pub missing_ok: bool,
    pub cmds: Vec<AlterTableCmd>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenameTableStmt {
    pub table: TableName,
    pub new_name: String,
    pub missing_ok: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenameColumnStmt {
    pub table: TableName,
    pub column: String,
    pub new_name: String,
    pub missing_ok: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTableSetSchemaStmt {
    pub table: TableName,
    pub new_schema: String,
    pub missing_ok: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStmt {
    pub tables: Vec<TableName>,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSchemaStmt {
    pub name: String,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropSchemaStmt {
    pub schemas: Vec<String>,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateEnumStmt {
    pub name: TypeName,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateCompositeTypeStmt {
    pub name: TypeName,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTypeAddValueStmt {
    pub type_name: TypeName,
    pub new_value: String,
    /// Existing label to position against
    pub neighbor: Option<String>,
    /// `AFTER neighbor` rather than `BEFORE neighbor`
    pub after: bool,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTypeRenameValueStmt {
    pub type_name: TypeName,
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenameTypeStmt {
    pub type_name: TypeName,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTypeSetSchemaStmt {
    pub type_name: TypeName,
    pub new_schema: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTypeStmt {
    pub types: Vec<TypeName>,
    pub if_exists: bool,
}

/// Argument mode of a function parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamMode {
    #[default]
    In,
    Out,
    InOut,
    Variadic,
    /// Output column of `RETURNS TABLE (...)`
    Table,
}

/// A declared function parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncParam {
    #[serde(default)]
    pub name: String,
    pub type_name: TypeName,
    #[serde(default)]
    pub mode: ParamMode,
    #[serde(default)]
    pub has_default: bool,
}

impl FuncParam {
    pub fn new(name: impl Into<String>, type_name: TypeName) -> Self {
        Self {
            name: name.into(),
            type_name,
            mode: ParamMode::In,
            has_default: false,
        }
    }

    /// Whether a caller supplies a value for this parameter
    pub fn is_input(&self) -> bool {
        matches!(self.mode, ParamMode::In | ParamMode::InOut | ParamMode::Variadic)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateFunctionStmt {
    pub name: FuncName,
    pub replace: bool,
    pub params: Vec<FuncParam>,
    /// Declared return type; `None` for procedures
    pub returns: Option<TypeName>,
    pub setof: bool,
}

/// Function named in DROP FUNCTION, with its signature when given
#[derive(Debug, Clone, PartialEq)]
pub struct FuncSpec {
    pub name: FuncName,
    pub args: Option<Vec<TypeName>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropFunctionStmt {
    pub funcs: Vec<FuncSpec>,
    pub missing_ok: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateViewStmt {
    pub name: TableName,
    pub replace: bool,
    /// `ALTER VIEW ... AS`
    pub alter: bool,
    pub query: Box<SelectStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommentTarget {
    Schema(String),
    Table(TableName),
    View(TableName),
    Column { table: TableName, column: String },
    Type(TypeName),
}

/// `COMMENT ON ... IS 'text'`; `IS NULL` clears the comment
#[derive(Debug, Clone, PartialEq)]
pub struct CommentStmt {
    pub target: CommentTarget,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateExtensionStmt {
    pub name: String,
    pub if_not_exists: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_ref_parts() {
        let col = ColumnRef::new(vec!["u".into(), "id".into()]);
        assert_eq!(col.name(), Some("id"));
        assert_eq!(col.qualifier(), &["u".to_string()]);

        let star = ColumnRef::star(vec!["u".into()]);
        assert_eq!(star.name(), None);
        assert_eq!(star.qualifier(), &["u".to_string()]);
        assert_eq!(star.joined("."), "u.*");
    }

    #[test]
    fn leftmost_branch_of_union() {
        let left = SelectStmt {
            targets: vec![ResTarget::new(Expr::column(&["a"]))],
            ..SelectStmt::default()
        };
        let right = SelectStmt::default();
        let union = SelectStmt {
            set_op: Some(SetOperation {
                op: SetOp::Union,
                all: false,
                left: Box::new(left.clone()),
                right: Box::new(right),
            }),
            ..SelectStmt::default()
        };
        assert_eq!(union.leftmost(), &left);
    }

    #[test]
    fn range_var_scope_name() {
        let mut rv = RangeVar::new(TableName::new("users"));
        assert_eq!(rv.scope_name(), "users");
        rv.alias = Some(Alias::new("u"));
        assert_eq!(rv.scope_name(), "u");
    }
}
