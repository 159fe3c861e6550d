//! Query metadata comments
//!
//! Each query is introduced by a comment of the form
//! `-- name: GetAuthor :one`. Statements without one are not analyzed.

use sqlprism_core::{Cmd, Engine, SqlError};
use thiserror::Error;
use crate::ast::Stmt;

/// Name and command kind of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMetadata {
    pub name: String,
    pub cmd: Cmd,
}

/// Errors in metadata comments or their use
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("missing query type [':one', ':many', ':exec', ':execrows', ':execlastid', ':execresult', ':copyfrom', ':batchexec', ':batchmany', ':batchone']: {0}")]
    MissingCmd(String),

    #[error("invalid query comment: {0}")]
    InvalidComment(String),

    #[error("invalid query type: {0}")]
    InvalidCmd(String),

    #[error("invalid query name: {0:?}")]
    InvalidName(String),

    #[error("duplicate query name: {0}")]
    DuplicateName(String),

    #[error("query {name:?} specifies parameter {cmd:?} without containing a RETURNING clause")]
    MissingReturning { name: String, cmd: String },

    #[error("{name}: :copyfrom requires an INSERT INTO statement")]
    CopyFromRequiresInsert { name: String },

    #[error("{name}: {cmd} is only supported by postgresql")]
    BatchRequiresPostgres { name: String, cmd: String },
}

impl From<MetadataError> for SqlError {
    fn from(err: MetadataError) -> Self {
        SqlError::invalid(err.to_string())
    }
}

/// A query name must start with a letter or `_` and continue with letters,
/// digits or `_`
pub fn validate_name(name: &str) -> Result<(), MetadataError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_alphabetic() || first == '_') && chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(MetadataError::InvalidName(name.to_string()))
    }
}

/// Find the `name:` comment in a statement's leading lines
///
/// Returns `Ok(None)` when the statement carries no metadata.
pub fn parse_metadata(text: &str, engine: Engine) -> Result<Option<QueryMetadata>, MetadataError> {
    for line in text.lines() {
        let line = line.trim_start();
        let prefix = if line.starts_with("--") {
            "--"
        } else if line.starts_with("/*") {
            "/*"
        } else if line.starts_with('#') && engine == Engine::Mysql {
            "#"
        } else {
            continue;
        };

        let rest = &line[prefix.len()..];
        if !rest.trim_start().starts_with("name") || !rest.contains(':') {
            continue;
        }
        if !rest.starts_with(" name: ") {
            return Err(MetadataError::InvalidMetadata(line.to_string()));
        }

        let mut parts: Vec<&str> = line.trim().split(' ').filter(|p| !p.is_empty()).collect();
        if prefix == "/*" && parts.last() == Some(&"*/") {
            parts.pop();
        }
        match parts.len() {
            3 => return Err(MetadataError::MissingCmd(line.to_string())),
            4 => {}
            _ => return Err(MetadataError::InvalidComment(line.to_string())),
        }

        let name = parts[2];
        let cmd: Cmd = parts[3]
            .trim_end_matches("*/")
            .parse()
            .map_err(|_| MetadataError::InvalidCmd(parts[3].to_string()))?;
        validate_name(name)?;

        return Ok(Some(QueryMetadata {
            name: name.to_string(),
            cmd,
        }));
    }
    Ok(None)
}

/// Check that the command kind fits the statement it annotates
pub fn validate_cmd(stmt: &Stmt, meta: &QueryMetadata, engine: Engine) -> Result<(), MetadataError> {
    if meta.cmd.is_batch() && engine != Engine::Postgresql {
        return Err(MetadataError::BatchRequiresPostgres {
            name: meta.name.clone(),
            cmd: meta.cmd.to_string(),
        });
    }

    if meta.cmd == Cmd::CopyFrom {
        return match stmt {
            Stmt::Insert(_) => Ok(()),
            _ => Err(MetadataError::CopyFromRequiresInsert { name: meta.name.clone() }),
        };
    }

    if !matches!(meta.cmd, Cmd::One | Cmd::Many) {
        return Ok(());
    }

    match stmt.returning() {
        Some(list) if list.is_empty() => Err(MetadataError::MissingReturning {
            name: meta.name.clone(),
            cmd: meta.cmd.to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DeleteStmt, RangeVar};
    use sqlprism_core::TableName;

    #[test]
    fn parses_dash_comment() {
        let meta = parse_metadata("-- name: GetAuthor :one\nSELECT 1", Engine::Postgresql)
            .unwrap()
            .unwrap();
        assert_eq!(meta.name, "GetAuthor");
        assert_eq!(meta.cmd, Cmd::One);
    }

    #[test]
    fn parses_block_comment() {
        let meta = parse_metadata("/* name: ListAuthors :many */\nSELECT 1", Engine::Sqlite)
            .unwrap()
            .unwrap();
        assert_eq!(meta.name, "ListAuthors");
        assert_eq!(meta.cmd, Cmd::Many);
    }

    #[test]
    fn no_metadata_is_none() {
        assert_eq!(parse_metadata("-- just a comment\nSELECT 1", Engine::Postgresql), Ok(None));
    }

    #[test]
    fn rejects_bad_metadata() {
        assert!(matches!(
            parse_metadata("-- name: GetAuthor\nSELECT 1", Engine::Postgresql),
            Err(MetadataError::MissingCmd(_))
        ));
        assert!(matches!(
            parse_metadata("-- name: GetAuthor :some\nSELECT 1", Engine::Postgresql),
            Err(MetadataError::InvalidCmd(_))
        ));
        assert!(matches!(
            parse_metadata("-- name: 1Author :one\nSELECT 1", Engine::Postgresql),
            Err(MetadataError::InvalidName(_))
        ));
        assert!(matches!(
            parse_metadata("--name: GetAuthor :one\nSELECT 1", Engine::Postgresql),
            Err(MetadataError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn many_requires_returning_on_delete() {
        let stmt = Stmt::Delete(Box::new(DeleteStmt {
            with: None,
            relation: RangeVar::new(TableName::new("authors")),
            using: Vec::new(),
            where_clause: None,
            returning: Vec::new(),
            limit: None,
        }));
        let meta = QueryMetadata { name: "DeleteAll".into(), cmd: Cmd::Many };
        assert!(matches!(
            validate_cmd(&stmt, &meta, Engine::Postgresql),
            Err(MetadataError::MissingReturning { .. })
        ));

        let copy = QueryMetadata { name: "Copy".into(), cmd: Cmd::CopyFrom };
        assert!(matches!(
            validate_cmd(&stmt, &copy, Engine::Postgresql),
            Err(MetadataError::CopyFromRequiresInsert { .. })
        ));

        let batch = QueryMetadata { name: "Batch".into(), cmd: Cmd::BatchExec };
        assert!(matches!(
            validate_cmd(&stmt, &batch, Engine::Mysql),
            Err(MetadataError::BatchRequiresPostgres { .. })
        ));
    }
}
