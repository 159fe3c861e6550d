//! SQL parsing per engine
//!
//! Splits files into statements, runs the supplementary DDL pass, hands the
//! rest to `sqlparser` and converts the result into the common AST.

use std::sync::OnceLock;
use regex::Regex;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::ParserError;
use sqlprism_core::{Diagnostic, DiagnosticCode, Engine, ErrorKind, Location, Severity, SqlError};
use thiserror::Error;
use tracing::debug;
use crate::ast::{RawStmt, Stmt};
use crate::convert::Converter;
use crate::ddl::{self, Prepared, TableExtras};
use crate::keywords;
use crate::metadata::MetadataError;
use crate::named::{self, ParamSet};
use crate::source::{self, Edit, PlaceholderSite};

/// The dialect collaborator the analyzer relies on
pub trait Parser: Send + Sync {
    fn engine(&self) -> Engine;

    /// Parse every statement of a schema file
    fn parse(&self, src: &str) -> ParsedFile;

    /// Parse one query statement, rewriting named parameters first
    fn parse_query(&self, text: &str) -> Result<ParsedQuery, ParseError>;

    /// Whether a word must be quoted when used as an identifier
    fn is_reserved_keyword(&self, word: &str) -> bool {
        keywords::is_reserved_keyword(self.engine(), word)
    }
}

/// SQL parser for one engine
#[derive(Debug, Clone, Copy)]
pub struct SqlParser {
    engine: Engine,
}

impl SqlParser {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Create a SQL parser for PostgreSQL
    pub fn postgres() -> Self {
        Self::new(Engine::Postgresql)
    }

    /// Create a SQL parser for MySQL
    pub fn mysql() -> Self {
        Self::new(Engine::Mysql)
    }

    /// Create a SQL parser for SQLite
    pub fn sqlite() -> Self {
        Self::new(Engine::Sqlite)
    }

    fn dialect(&self) -> Box<dyn Dialect> {
        match self.engine {
            Engine::Postgresql => Box::new(PostgreSqlDialect {}),
            Engine::Mysql => Box::new(MySqlDialect {}),
            Engine::Sqlite => Box::new(SQLiteDialect {}),
        }
    }

    /// Parse one statement's text
    ///
    /// `stars` and `placeholders` are the lexical sites of the same text; they
    /// are attached to the converted tree in source order.
    fn parse_statement(
        &self,
        text: &str,
        stars: &[source::StarSite],
        placeholders: &[PlaceholderSite],
    ) -> Result<Vec<Stmt>, ParseError> {
        match ddl::prepare(text, self.engine)? {
            Prepared::Parsed(stmts) => Ok(stmts),
            Prepared::Grammar { text, extras } => {
                let mut stmts = self.grammar(&text, stars, placeholders)?;
                attach_extras(&mut stmts, extras);
                Ok(stmts)
            }
        }
    }

    fn grammar(
        &self,
        text: &str,
        stars: &[source::StarSite],
        placeholders: &[PlaceholderSite],
    ) -> Result<Vec<Stmt>, ParseError> {
        let dialect = self.dialect();
        let parsed = sqlparser::parser::Parser::parse_sql(&*dialect, text)
            .map_err(|e| ParseError::from_parser(&e, text))?;

        let mut converter = Converter::new(self.engine, &*dialect, text, stars, placeholders);
        let mut out = Vec::with_capacity(parsed.len());
        for stmt in &parsed {
            out.extend(converter.statement(stmt)?);
        }
        Ok(out)
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::postgres()
    }
}

impl Parser for SqlParser {
    fn engine(&self) -> Engine {
        self.engine
    }

    fn parse(&self, src: &str) -> ParsedFile {
        let mut file = ParsedFile::default();
        for range in source::split_statements(src, self.engine) {
            let text = range.text(src);
            match self.parse_statement(text, &[], &[]) {
                Ok(stmts) => {
                    for stmt in stmts {
                        file.statements.push(RawStmt {
                            stmt,
                            location: range.start,
                            len: range.end - range.start,
                        });
                    }
                }
                Err(err) => {
                    debug!(offset = range.start, error = %err, "statement failed to parse");
                    file.errors.push(err.offset_by(range.start));
                }
            }
        }
        file
    }

    fn parse_query(&self, text: &str) -> Result<ParsedQuery, ParseError> {
        let rewritten = named::rewrite(text, self.engine)?;
        let grammar_text = source::number_bare_placeholders(&rewritten.sql, &rewritten.placeholders);
        let stars = source::star_sites(&rewritten.sql, self.engine);

        let mut stmts = self
            .parse_statement(&grammar_text, &stars, &rewritten.placeholders)
            .map_err(|e| e.map_location(|at| source::original_offset(&rewritten.edits, at)))?;
        if stmts.len() > 1 {
            return Err(ParseError::Syntax {
                message: "expected a single statement per query".to_string(),
                location: None,
            });
        }
        let stmt = stmts.pop().ok_or_else(|| ParseError::Syntax {
            message: "query contains no statement".to_string(),
            location: None,
        })?;

        Ok(ParsedQuery {
            stmt,
            sql: rewritten.sql,
            edits: rewritten.edits,
            params: rewritten.params,
            placeholders: rewritten.placeholders,
        })
    }
}

fn attach_extras(stmts: &mut [Stmt], extras: TableExtras) {
    for stmt in stmts {
        if let Stmt::CreateTable(create) = stmt {
            if create.like.is_none() {
                create.like = extras.like.clone();
            }
            create.inherits.extend(extras.inherits.iter().cloned());
        }
    }
}

/// All statements of a schema file, plus the ones that failed to parse
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub statements: Vec<RawStmt>,
    pub errors: Vec<ParseError>,
}

/// A parsed query statement
#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub stmt: Stmt,

    /// Query text after named parameters were rewritten; locations inside
    /// `stmt` are offsets into this text
    pub sql: String,

    /// Edits that turned the original text into `sql`
    pub edits: Vec<Edit>,

    /// Names and nullability of named parameters by number
    pub params: ParamSet,

    /// Every placeholder in `sql`, in source order
    pub placeholders: Vec<PlaceholderSite>,
}

/// SQL parsing error with diagnostic information
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("syntax error: {message}")]
    Syntax {
        message: String,
        /// Byte offset, when the grammar reported a position
        location: Option<usize>,
    },

    #[error(transparent)]
    Sql(#[from] SqlError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

fn position_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"Line: (\d+), Column: (\d+)").ok())
        .as_ref()
}

/// Byte offset of a 1-based line and character column
fn offset_of(text: &str, line: usize, column: usize) -> Option<usize> {
    let mut start = 0;
    for (i, l) in text.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            let within = l.char_indices().nth(column.saturating_sub(1)).map_or(l.len(), |(b, _)| b);
            return Some(start + within);
        }
        start += l.len();
    }
    None
}

impl ParseError {
    fn from_parser(err: &ParserError, text: &str) -> Self {
        let message = err.to_string();
        let location = position_pattern().and_then(|re| re.captures(&message)).and_then(|caps| {
            let line = caps.get(1)?.as_str().parse().ok()?;
            let column = caps.get(2)?.as_str().parse().ok()?;
            offset_of(text, line, column)
        });
        let message = match message.find(" at Line: ") {
            Some(at) => message[..at].to_string(),
            None => message,
        };
        let message = message
            .trim_start_matches("sql parser error: ")
            .to_string();
        Self::Syntax { message, location }
    }

    pub fn location(&self) -> Option<usize> {
        match self {
            Self::Syntax { location, .. } => *location,
            Self::Sql(err) => err.location,
            Self::Metadata(_) => None,
        }
    }

    fn map_location(self, f: impl Fn(usize) -> usize) -> Self {
        match self {
            Self::Syntax { message, location } => Self::Syntax {
                message,
                location: location.map(f),
            },
            Self::Sql(mut err) => {
                err.location = err.location.map(f);
                Self::Sql(err)
            }
            other => other,
        }
    }

    /// Shift the location by the statement's offset within its file
    pub fn offset_by(self, base: usize) -> Self {
        self.map_location(|at| at + base)
    }

    /// Check if this is an unsupported statement rather than bad syntax
    pub fn is_unsupported_syntax(&self) -> bool {
        matches!(self, Self::Sql(SqlError { kind: ErrorKind::UnsupportedStatementType(_), .. }))
    }

    /// Convert to a diagnostic against the file the error occurred in
    pub fn to_diagnostic(&self, file: &str, source: &str) -> Diagnostic {
        let code = match self {
            Self::Metadata(_) => DiagnosticCode::InvalidMetadata,
            _ if self.is_unsupported_syntax() => DiagnosticCode::UnsupportedStatement,
            _ => DiagnosticCode::SqlParseError,
        };
        let location = match self.location() {
            Some(at) => Location::from_offset(file, source, at),
            None => Location::new(file),
        };
        let diag = Diagnostic::new(code, Severity::Error, self.to_string()).with_location(location);
        match self {
            Self::Sql(err) => diag.with_sqlstate(err.code()),
            Self::Syntax { .. } => diag.with_sqlstate("42601"),
            Self::Metadata(_) => diag,
        }
    }
}
