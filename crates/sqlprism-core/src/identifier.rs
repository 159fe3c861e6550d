//! Canonical multi-part names
//!
//! Tables, types and functions are addressed by `catalog.schema.name`
//! triples where the leading parts are optional. An empty string means
//! "not specified"; resolution against the default schema happens in the
//! catalog, not here.

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::config::Engine;
use crate::error::SqlError;

fn split_parts(parts: &[String], what: &str) -> Result<(String, String, String), SqlError> {
    match parts {
        [name] => Ok((String::new(), String::new(), name.clone())),
        [schema, name] => Ok((String::new(), schema.clone(), name.clone())),
        [catalog, schema, name] => Ok((catalog.clone(), schema.clone(), name.clone())),
        _ => Err(SqlError::invalid(format!(
            "invalid {} name: {}",
            what,
            parts.join(".")
        ))),
    }
}

fn fmt_qualified(f: &mut fmt::Formatter<'_>, catalog: &str, schema: &str, name: &str) -> fmt::Result {
    if !catalog.is_empty() {
        write!(f, "{}.", catalog)?;
    }
    if !schema.is_empty() {
        write!(f, "{}.", schema)?;
    }
    write!(f, "{}", name)
}

/// Name of a table, view or CTE
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub catalog: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,
    pub name: String,
}

impl TableName {
    /// Unqualified table name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            catalog: String::new(),
            schema: String::new(),
            name: name.into(),
        }
    }

    /// Schema-qualified table name
    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            catalog: String::new(),
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Build from one to three dotted parts
    pub fn from_parts(parts: &[String]) -> Result<Self, SqlError> {
        let (catalog, schema, name) = split_parts(parts, "table")?;
        Ok(Self { catalog, schema, name })
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_qualified(f, &self.catalog, &self.schema, &self.name)
    }
}

/// Name of a function
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuncName {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub catalog: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,
    pub name: String,
}

impl FuncName {
    /// Unqualified function name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            catalog: String::new(),
            schema: String::new(),
            name: name.into(),
        }
    }

    /// Build from one to three dotted parts
    pub fn from_parts(parts: &[String]) -> Result<Self, SqlError> {
        let (catalog, schema, name) = split_parts(parts, "function")?;
        Ok(Self { catalog, schema, name })
    }
}

impl fmt::Display for FuncName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_qualified(f, &self.catalog, &self.schema, &self.name)
    }
}

/// A type reference as written in DDL or a cast
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeName {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub catalog: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,
    pub name: String,

    /// Number of array dimensions (`int[][]` is 2)
    #[serde(default)]
    pub array_dims: usize,

    /// Declared length of character types (`varchar(255)`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,

    /// MySQL `UNSIGNED` modifier
    #[serde(default)]
    pub unsigned: bool,

    /// Labels of an inline `ENUM('a', 'b')` column type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
}

impl TypeName {
    /// Unqualified scalar type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Schema-qualified scalar type
    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Same type with `dims` array dimensions
    pub fn array_of(mut self, dims: usize) -> Self {
        self.array_dims = dims;
        self
    }

    /// Parse a type as written in SQL text
    ///
    /// Handles schema qualification, quoted parts, modifiers in parentheses,
    /// `[]` / `ARRAY` suffixes, `UNSIGNED`, and inline `ENUM(...)` labels.
    /// Unquoted parts are folded to lower case and whitespace is collapsed.
    pub fn parse(text: &str) -> Result<Self, SqlError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SqlError::invalid("empty type name"));
        }

        let mut out = TypeName::default();
        let mut rest = text.to_string();

        let lower = rest.to_ascii_lowercase();
        if lower.starts_with("enum") && lower[4..].trim_start().starts_with('(') {
            out.name = "enum".to_string();
            out.enum_values = quoted_literals(&rest[4..]);
            return Ok(out);
        }

        loop {
            let trimmed = rest.trim_end();
            let lower = trimmed.to_ascii_lowercase();
            if let Some(stripped) = strip_word_suffix(&lower, "unsigned") {
                out.unsigned = true;
                rest = trimmed[..stripped].to_string();
            } else if let Some(stripped) = strip_word_suffix(&lower, "zerofill") {
                rest = trimmed[..stripped].to_string();
            } else if let Some(stripped) = strip_word_suffix(&lower, "array") {
                out.array_dims += 1;
                rest = trimmed[..stripped].to_string();
            } else if trimmed.ends_with(']') {
                match trimmed.rfind('[') {
                    Some(open) => {
                        out.array_dims += 1;
                        rest = trimmed[..open].to_string();
                    }
                    None => return Err(SqlError::invalid(format!("invalid type name: {}", text))),
                }
            } else {
                rest = trimmed.to_string();
                break;
            }
        }

        let (base, modifiers) = remove_modifiers(&rest);
        if let Some(first) = modifiers.first() {
            out.length = first.trim().parse::<i64>().ok();
        }

        let mut parts = split_dotted(&base);
        if parts.is_empty() {
            return Err(SqlError::invalid(format!("invalid type name: {}", text)));
        }
        let name = parts.pop().unwrap_or_default();
        out.name = name;
        match parts.len() {
            0 => {}
            1 => out.schema = parts.remove(0),
            2 => {
                out.catalog = parts.remove(0);
                out.schema = parts.remove(0);
            }
            _ => return Err(SqlError::invalid(format!("invalid type name: {}", text))),
        }

        if !is_character_type(&out.name) {
            out.length = None;
        }

        Ok(out)
    }

    /// Rewrite engine-specific spellings to one canonical name
    ///
    /// Only PostgreSQL has a family of aliases worth folding; other engines
    /// keep the spelling that was written.
    pub fn canonicalize(mut self, engine: Engine) -> Self {
        if engine == Engine::Postgresql && (self.schema.is_empty() || self.schema == "pg_catalog") {
            let canonical = match self.name.as_str() {
                "int" | "int4" | "integer" => Some("integer"),
                "int8" | "bigint" => Some("bigint"),
                "int2" | "smallint" => Some("smallint"),
                "bool" | "boolean" => Some("boolean"),
                "float4" | "real" => Some("real"),
                "float" | "float8" | "double precision" | "double" => Some("double precision"),
                "decimal" | "numeric" => Some("numeric"),
                "character varying" | "varchar" => Some("varchar"),
                "character" | "char" | "bpchar" => Some("char"),
                "timestamp with time zone" | "timestamptz" => Some("timestamptz"),
                "timestamp without time zone" | "timestamp" => Some("timestamp"),
                "time with time zone" | "timetz" => Some("timetz"),
                "time without time zone" | "time" => Some("time"),
                "serial" | "serial4" => Some("serial"),
                "bigserial" | "serial8" => Some("bigserial"),
                "smallserial" | "serial2" => Some("smallserial"),
                _ => None,
            };
            if let Some(name) = canonical {
                self.name = name.to_string();
                self.schema.clear();
                self.catalog.clear();
            }
        }
        self
    }

    /// Name used as a column's data type (`schema.name` or `name`)
    pub fn data_type(&self) -> String {
        if self.schema.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }

    /// Whether this is an array type
    pub fn is_array(&self) -> bool {
        self.array_dims > 0
    }

    /// Signature comparison: name and array-ness must match; schemas only
    /// when both sides name one
    pub fn same_type(&self, other: &TypeName) -> bool {
        if self.name != other.name || self.array_dims != other.array_dims {
            return false;
        }
        self.schema.is_empty() || other.schema.is_empty() || self.schema == other.schema
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_qualified(f, &self.catalog, &self.schema, &self.name)?;
        for _ in 0..self.array_dims {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

/// Character types whose first modifier is a length
pub fn is_character_type(name: &str) -> bool {
    matches!(
        name,
        "varchar" | "character varying" | "char" | "character" | "bpchar" | "nvarchar" | "nchar"
            | "varbinary" | "binary" | "bit" | "varbit" | "bit varying"
    )
}

fn strip_word_suffix(lower: &str, word: &str) -> Option<usize> {
    let cut = lower.strip_suffix(word)?;
    if cut.is_empty() {
        return None;
    }
    if cut.ends_with(|c: char| c.is_whitespace()) {
        Some(cut.trim_end().len())
    } else {
        None
    }
}

/// Remove every top-level `( ... )` group, returning the collapsed base and
/// the comma-separated contents of the first group
fn remove_modifiers(text: &str) -> (String, Vec<String>) {
    let mut base = String::new();
    let mut modifiers = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    let mut first_group = true;
    for ch in text.chars() {
        match ch {
            '(' => {
                depth += 1;
                if depth > 1 {
                    current.push(ch);
                }
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if first_group {
                        modifiers = current.split(',').map(|s| s.trim().to_string()).collect();
                        first_group = false;
                    }
                    current.clear();
                    base.push(' ');
                } else {
                    current.push(ch);
                }
            }
            _ if depth > 0 => current.push(ch),
            _ => base.push(ch),
        }
    }
    let collapsed = base.split_whitespace().collect::<Vec<_>>().join(" ");
    (collapsed, modifiers)
}

/// Split on dots outside double quotes; unquoted parts are lower-cased
fn split_dotted(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    for ch in text.chars() {
        match ch {
            '"' | '`' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            '.' if !in_quotes => {
                parts.push(finish_part(&current, quoted));
                current.clear();
                quoted = false;
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(finish_part(&current, quoted));
    }
    parts
}

fn finish_part(part: &str, quoted: bool) -> String {
    if quoted {
        part.to_string()
    } else {
        part.trim().to_ascii_lowercase()
    }
}

/// Collect the single-quoted literals of an `ENUM('a', 'b')` list
fn quoted_literals(text: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\'' {
            continue;
        }
        let mut value = String::new();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    value.push('\'');
                } else {
                    break;
                }
            } else {
                value.push(c);
            }
        }
        values.push(value);
    }
    values
}
