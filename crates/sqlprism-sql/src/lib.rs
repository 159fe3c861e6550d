//! SQL parsing for the analyzer
//!
//! This crate handles:
//! - Splitting files into statements and scanning them lexically
//! - Parsing SQL using sqlparser-rs and converting it to a common AST
//! - DDL forms the grammar does not model (types, functions, comments)
//! - Query metadata comments (`-- name: GetAuthor :one`)
//! - Named parameters (`sqlprism.arg`, `sqlprism.narg`, `@name`)

pub mod ast;
mod convert;
pub mod ddl;
pub mod keywords;
pub mod metadata;
pub mod named;
pub mod parser;
pub mod source;
pub mod visit;

pub use ast::{RawStmt, Stmt};
pub use keywords::is_reserved_keyword;
pub use metadata::{parse_metadata, validate_cmd, MetadataError, QueryMetadata};
pub use named::{Nullability, Param, ParamSet};
pub use parser::{ParseError, ParsedFile, ParsedQuery, Parser, SqlParser};
pub use visit::Visitor;
