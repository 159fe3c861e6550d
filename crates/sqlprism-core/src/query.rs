//! Query result model (stable v1)
//!
//! These types are what downstream code generators consume: one [`Query`]
//! per analyzed statement, carrying its output [`Column`]s and bound
//! [`Parameter`]s. They are plain snapshots with no references back into the
//! catalog, so later catalog changes never affect results already produced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::identifier::{TableName, TypeName};

/// Command kind declared in a query's `-- name:` comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cmd {
    Exec,
    ExecResult,
    ExecRows,
    ExecLastId,
    One,
    Many,
    CopyFrom,
    BatchExec,
    BatchMany,
    BatchOne,
}

impl Cmd {
    /// The `:cmd` spelling used in query comments
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exec => ":exec",
            Self::ExecResult => ":execresult",
            Self::ExecRows => ":execrows",
            Self::ExecLastId => ":execlastid",
            Self::One => ":one",
            Self::Many => ":many",
            Self::CopyFrom => ":copyfrom",
            Self::BatchExec => ":batchexec",
            Self::BatchMany => ":batchmany",
            Self::BatchOne => ":batchone",
        }
    }

    /// Batch commands are only meaningful for PostgreSQL
    pub fn is_batch(&self) -> bool {
        matches!(self, Self::BatchExec | Self::BatchMany | Self::BatchOne)
    }

    /// Commands that hand rows back to the caller
    pub fn returns_rows(&self) -> bool {
        matches!(self, Self::One | Self::Many | Self::BatchMany | Self::BatchOne)
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Cmd {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ":exec" => Ok(Self::Exec),
            ":execresult" => Ok(Self::ExecResult),
            ":execrows" => Ok(Self::ExecRows),
            ":execlastid" => Ok(Self::ExecLastId),
            ":one" => Ok(Self::One),
            ":many" => Ok(Self::Many),
            ":copyfrom" => Ok(Self::CopyFrom),
            ":batchexec" => Ok(Self::BatchExec),
            ":batchmany" => Ok(Self::BatchMany),
            ":batchone" => Ok(Self::BatchOne),
            other => Err(format!("invalid query type: {}", other)),
        }
    }
}

/// An output column or parameter slot, with resolution metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Name as it appears in the result (alias if one was given)
    pub name: String,

    /// Name of the underlying source column, before aliasing
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_name: String,

    /// Type name, `any` when unknown
    pub data_type: String,

    /// Structured form of the type, when it came from a catalog or a cast
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<TypeName>,

    pub not_null: bool,

    #[serde(default)]
    pub unsigned: bool,

    #[serde(default)]
    pub is_array: bool,

    #[serde(default)]
    pub array_dims: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    /// Parameter named with `@name` / `sqlprism.arg(name)`
    #[serde(default)]
    pub is_named_param: bool,

    /// Parameter bound as a list of `data_type` values (`sqlprism.slice(name)`)
    #[serde(default)]
    pub is_slice: bool,

    /// Produced by a function call
    #[serde(default)]
    pub is_func_call: bool,

    /// Qualifier of the `alias.*` this column was expanded from
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,

    /// Catalog table the value ultimately comes from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableName>,

    /// Name of the FROM entry (alias or relation name) the column was read through
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub table_alias: String,

    /// Set when the column stands for a whole embedded row of this table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_table: Option<TableName>,
}

impl Column {
    /// Create a nullable column of the given type
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            ..Self::default()
        }
    }

    /// Create a nullable column of unknown type
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, "any")
    }

    /// Create a column typed after a parsed type name
    pub fn from_type(name: impl Into<String>, type_name: &TypeName) -> Self {
        Self {
            name: name.into(),
            data_type: type_name.data_type(),
            unsigned: type_name.unsigned,
            is_array: type_name.is_array(),
            array_dims: type_name.array_dims,
            length: type_name.length,
            type_name: Some(type_name.clone()),
            ..Self::default()
        }
    }

    /// Set nullability
    pub fn with_not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    /// Mark as the result of a function call
    pub fn func_call(mut self) -> Self {
        self.is_func_call = true;
        self
    }

    /// Whether the type is unknown
    pub fn is_any(&self) -> bool {
        self.data_type == "any"
    }
}

/// A bound parameter, keyed by its ordinal number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// 1-based placeholder number
    pub number: usize,

    /// Inferred name, type and nullability
    pub column: Column,
}

impl Parameter {
    pub fn new(number: usize, column: Column) -> Self {
        Self { number, column }
    }
}

/// Analysis result for one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Query text with named parameters rewritten and stars expanded
    pub sql: String,

    /// Name from the `-- name:` comment
    pub name: String,

    /// Command kind from the `-- name:` comment
    pub cmd: Cmd,

    /// Output columns in result order
    pub columns: Vec<Column>,

    /// Parameters ordered by number, or by appearance for `?` engines
    pub params: Vec<Parameter>,

    /// Leading comment lines other than the `-- name:` line
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,

    /// File the query was read from
    pub filename: String,

    /// Target table of an INSERT statement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_into_table: Option<TableName>,
}

impl Query {
    /// Whether any output column represents an embedded table
    pub fn has_embeds(&self) -> bool {
        self.columns.iter().any(|c| c.embed_table.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmd_parsing() {
        assert_eq!(":one".parse::<Cmd>(), Ok(Cmd::One));
        assert_eq!(":execlastid".parse::<Cmd>(), Ok(Cmd::ExecLastId));
        assert!(":some".parse::<Cmd>().is_err());
        assert!(Cmd::BatchOne.is_batch());
        assert!(!Cmd::Exec.returns_rows());
    }

    #[test]
    fn column_from_type() {
        let t = TypeName::parse("varchar(20)[]").unwrap();
        let col = Column::from_type("tags", &t).with_not_null(true);
        assert_eq!(col.data_type, "varchar");
        assert!(col.is_array);
        assert_eq!(col.array_dims, 1);
        assert_eq!(col.length, Some(20));
        assert!(col.not_null);
    }

    #[test]
    fn column_serialization_skips_empty_metadata() {
        let json = serde_json::to_string(&Column::new("id", "integer")).unwrap();
        assert!(json.contains("\"data_type\":\"integer\""));
        assert!(!json.contains("table_alias"));
        assert!(!json.contains("embed_table"));
    }
}
