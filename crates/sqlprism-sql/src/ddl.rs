//! Token-level parsing for DDL the general grammar does not cover
//!
//! Types, functions, comments, extensions and a handful of simple schema
//! statements are read straight from tokens. CREATE TABLE is pre-processed
//! so that `LIKE` items and `INHERITS (...)` are lifted out before the rest
//! of the statement goes to the grammar.

use sqlprism_core::{Engine, FuncName, SqlError, TableName, TypeName};
use crate::ast::{
    AlterTableSetSchemaStmt, AlterTypeAddValueStmt, AlterTypeRenameValueStmt, ColumnDef,
    CommentStmt, CommentTarget, CreateCompositeTypeStmt, CreateEnumStmt, CreateExtensionStmt,
    CreateFunctionStmt, CreateSchemaStmt, CreateTableStmt, DropFunctionStmt, DropSchemaStmt,
    DropTableStmt, DropTypeStmt, FuncParam, FuncSpec, ParamMode, RenameTableStmt, RenameTypeStmt,
    AlterTypeSetSchemaStmt, Stmt, TruncateStmt,
};
use crate::source::{tokenize, Token, TokenKind};

/// Parts of CREATE TABLE lifted out before the grammar sees the statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableExtras {
    pub like: Option<TableName>,
    pub inherits: Vec<TableName>,
}

/// Outcome of the DDL pre-pass
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// The statement was fully parsed here
    Parsed(Vec<Stmt>),
    /// Parse `text` with the grammar; attach `extras` to a resulting CREATE TABLE
    Grammar { text: String, extras: TableExtras },
}

/// Parse what can be parsed from tokens, or prepare the text for the grammar
pub fn prepare(text: &str, engine: Engine) -> Result<Prepared, SqlError> {
    let mut c = Cursor::new(text, engine);
    let parsed = match c.word().as_deref() {
        Some("create") => c.create()?,
        Some("drop") => c.drop()?,
        Some("alter") => c.alter()?,
        Some("comment") => Some(vec![c.comment()?]),
        Some("truncate") => Some(vec![c.truncate()?]),
        Some("rename") => c.rename_tables()?,
        _ => None,
    };
    match parsed {
        Some(stmts) => Ok(Prepared::Parsed(stmts)),
        None => table_extras(text, engine),
    }
}

const FUNCTION_OPTIONS: &[&str] = &[
    "as", "language", "immutable", "stable", "volatile", "strict", "security", "called",
    "returns", "cost", "rows", "set", "parallel", "begin", "leakproof", "window", "transform",
    "support", "not", "deterministic", "reads", "modifies", "contains", "no", "comment",
    "external", "return",
];

const MULTIWORD_TYPE_STARTS: &[&str] = &[
    "double", "character", "char", "national", "bit", "timestamp", "time", "interval", "varchar",
];

struct Cursor<'a> {
    src: &'a str,
    toks: Vec<Token>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str, engine: Engine) -> Self {
        let toks = tokenize(src, engine).into_iter().filter(|t| !t.is_comment()).collect();
        Self { src, toks, pos: 0 }
    }

    fn peek(&self) -> Option<Token> {
        self.toks.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<Token> {
        self.toks.get(self.pos + offset).copied()
    }

    fn location(&self) -> usize {
        self.peek().map_or(self.src.len(), |t| t.start)
    }

    fn error(&self, message: impl Into<String>) -> SqlError {
        SqlError::invalid(message.into()).with_location(self.location())
    }

    fn syntax_error(&self) -> SqlError {
        match self.peek() {
            Some(t) => self.error(format!("syntax error at or near \"{}\"", t.text(self.src))),
            None => self.error("syntax error at end of input"),
        }
    }

    /// Consume the next token if it is a word, returning it lower-cased
    fn word(&mut self) -> Option<String> {
        let t = self.peek()?;
        if t.kind != TokenKind::Word {
            return None;
        }
        self.pos += 1;
        Some(t.text(self.src).to_ascii_lowercase())
    }

    fn peek_kw(&self, kw: &str) -> bool {
        self.peek().map_or(false, |t| t.is_keyword(self.src, kw))
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.peek_kw(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume a keyword sequence entirely or not at all
    fn eat_kws(&mut self, kws: &[&str]) -> bool {
        let ok = kws
            .iter()
            .enumerate()
            .all(|(i, kw)| self.peek_at(i).map_or(false, |t| t.is_keyword(self.src, kw)));
        if ok {
            self.pos += kws.len();
        }
        ok
    }

    fn expect_kw(&mut self, kw: &str) -> Result<(), SqlError> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.syntax_error())
        }
    }

    fn peek_punct(&self, ch: char) -> bool {
        self.peek().map_or(false, |t| t.is_punct(self.src, ch))
    }

    fn eat_punct(&mut self, ch: char) -> bool {
        if self.peek_punct(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, ch: char) -> Result<(), SqlError> {
        if self.eat_punct(ch) {
            Ok(())
        } else {
            Err(self.syntax_error())
        }
    }

    fn ident(&mut self) -> Result<String, SqlError> {
        let t = self.peek().ok_or_else(|| self.syntax_error())?;
        match t.ident(self.src) {
            Some(ident) => {
                self.pos += 1;
                Ok(ident)
            }
            None => Err(self.syntax_error()),
        }
    }

    fn qualified(&mut self) -> Result<Vec<String>, SqlError> {
        let mut parts = vec![self.ident()?];
        while self.peek_punct('.') {
            self.pos += 1;
            parts.push(self.ident()?);
        }
        Ok(parts)
    }

    fn string(&mut self) -> Result<String, SqlError> {
        let t = self.peek().ok_or_else(|| self.syntax_error())?;
        match t.string_value(self.src) {
            Some(value) => {
                self.pos += 1;
                Ok(value)
            }
            None => Err(self.syntax_error()),
        }
    }

    fn table_name(&mut self) -> Result<TableName, SqlError> {
        let at = self.location();
        let parts = self.qualified()?;
        TableName::from_parts(&parts).map_err(|e| e.or_location(Some(at)))
    }

    fn type_name_ref(&mut self) -> Result<TypeName, SqlError> {
        let parts = self.qualified()?;
        type_from_parts(&parts)
    }

    /// Source text of the tokens up to a top-level `,` / `)` or a stop word
    fn type_text(&mut self, stops: &[&str]) -> Result<TypeName, SqlError> {
        let first = self.pos;
        let mut depth = 0usize;
        while let Some(t) = self.peek() {
            if depth == 0 {
                if t.is_punct(self.src, ',')
                    || t.is_punct(self.src, ')')
                    || t.is_punct(self.src, ';')
                    || t.is_punct(self.src, '=')
                {
                    break;
                }
                if t.kind == TokenKind::Word && stops.iter().any(|s| t.is_keyword(self.src, s)) {
                    break;
                }
                if t.kind == TokenKind::String {
                    break;
                }
            }
            if t.is_punct(self.src, '(') {
                depth += 1;
            } else if t.is_punct(self.src, ')') {
                depth = depth.saturating_sub(1);
            }
            self.pos += 1;
        }
        if self.pos == first {
            return Err(self.syntax_error());
        }
        let text = &self.src[self.toks[first].start..self.toks[self.pos - 1].end];
        TypeName::parse(text).map_err(|e| e.or_location(Some(self.toks[first].start)))
    }

    /// Skip to the next top-level `,` or `)`
    fn skip_item(&mut self) {
        let mut depth = 0usize;
        while let Some(t) = self.peek() {
            if depth == 0 && (t.is_punct(self.src, ',') || t.is_punct(self.src, ')')) {
                return;
            }
            if t.is_punct(self.src, '(') {
                depth += 1;
            } else if t.is_punct(self.src, ')') {
                depth -= 1;
            }
            self.pos += 1;
        }
    }

    fn if_exists(&mut self) -> bool {
        self.eat_kws(&["if", "exists"])
    }

    fn if_not_exists(&mut self) -> bool {
        self.eat_kws(&["if", "not", "exists"])
    }

    fn create(&mut self) -> Result<Option<Vec<Stmt>>, SqlError> {
        let replace = self.eat_kws(&["or", "replace"]);
        if self.eat_kw("type") {
            return self.create_type().map(|s| Some(vec![s]));
        }
        if self.peek_kw("function") || self.peek_kw("procedure") {
            let procedure = self.peek_kw("procedure");
            self.pos += 1;
            return self.create_function(replace, procedure).map(|s| Some(vec![s]));
        }
        if self.eat_kw("schema") {
            return self.create_schema().map(|s| Some(vec![s]));
        }
        if self.eat_kw("extension") {
            let if_not_exists = self.if_not_exists();
            let name = self.ident()?;
            return Ok(Some(vec![Stmt::CreateExtension(CreateExtensionStmt { name, if_not_exists })]));
        }
        if self.peek_kw("trigger") || self.peek_kw("rule") || self.peek_kw("policy") || self.peek_kw("role") {
            let kind = format!("CREATE {}", self.word().unwrap_or_default().to_uppercase());
            return Ok(Some(vec![Stmt::Unsupported(kind)]));
        }
        Ok(None)
    }

    fn create_schema(&mut self) -> Result<Stmt, SqlError> {
        let if_not_exists = self.if_not_exists();
        self.eat_kw("authorization");
        let name = self.ident()?;
        Ok(Stmt::CreateSchema(CreateSchemaStmt { name, if_not_exists }))
    }

    fn create_type(&mut self) -> Result<Stmt, SqlError> {
        let name = self.type_name_ref()?;
        if !self.eat_kw("as") {
            return Ok(Stmt::Unsupported("CREATE TYPE".to_string()));
        }
        if self.eat_kw("enum") {
            self.expect_punct('(')?;
            let mut values = Vec::new();
            if !self.eat_punct(')') {
                loop {
                    values.push(self.string()?);
                    if self.eat_punct(')') {
                        break;
                    }
                    self.expect_punct(',')?;
                }
            }
            return Ok(Stmt::CreateEnum(CreateEnumStmt { name, values }));
        }
        if self.eat_kw("range") {
            return Ok(Stmt::Unsupported("CREATE TYPE AS RANGE".to_string()));
        }
        self.expect_punct('(')?;
        let mut columns = Vec::new();
        if !self.eat_punct(')') {
            loop {
                let col = self.ident()?;
                let type_name = self.type_text(&["collate"])?;
                self.skip_item();
                columns.push(ColumnDef::new(col, type_name));
                if self.eat_punct(')') {
                    break;
                }
                self.expect_punct(',')?;
            }
        }
        Ok(Stmt::CreateCompositeType(CreateCompositeTypeStmt { name, columns }))
    }

    fn create_function(&mut self, replace: bool, procedure: bool) -> Result<Stmt, SqlError> {
        let parts = self.qualified()?;
        let name = FuncName::from_parts(&parts)?;
        self.expect_punct('(')?;
        let mut params = Vec::new();
        if !self.eat_punct(')') {
            loop {
                params.push(self.func_param()?);
                if self.eat_punct(')') {
                    break;
                }
                self.expect_punct(',')?;
            }
        }

        let mut returns = None;
        let mut setof = false;
        while let Some(t) = self.peek() {
            if t.is_keyword(self.src, "returns") {
                self.pos += 1;
                if self.peek_kw("null") {
                    // RETURNS NULL ON NULL INPUT
                    continue;
                }
                if self.eat_kw("table") {
                    self.expect_punct('(')?;
                    loop {
                        let col = self.ident()?;
                        let type_name = self.type_text(&[])?;
                        params.push(FuncParam {
                            name: col,
                            type_name,
                            mode: ParamMode::Table,
                            has_default: false,
                        });
                        if self.eat_punct(')') {
                            break;
                        }
                        self.expect_punct(',')?;
                    }
                    returns = Some(TypeName::new("record"));
                    setof = true;
                } else {
                    setof = self.eat_kw("setof");
                    returns = Some(self.type_text(FUNCTION_OPTIONS)?);
                }
                continue;
            }
            self.pos += 1;
        }

        if returns.is_none() && !procedure {
            // OUT parameters imply the return type
            let outs: Vec<&FuncParam> = params
                .iter()
                .filter(|p| matches!(p.mode, ParamMode::Out | ParamMode::InOut))
                .collect();
            returns = match outs.as_slice() {
                [] => Some(TypeName::new("void")),
                [single] => Some(single.type_name.clone()),
                _ => Some(TypeName::new("record")),
            };
        }

        Ok(Stmt::CreateFunction(Box::new(CreateFunctionStmt {
            name,
            replace,
            params,
            returns,
            setof,
        })))
    }

    fn func_param(&mut self) -> Result<FuncParam, SqlError> {
        let mode = if self.eat_kw("inout") {
            ParamMode::InOut
        } else if self.eat_kw("out") {
            ParamMode::Out
        } else if self.eat_kw("variadic") {
            ParamMode::Variadic
        } else {
            self.eat_kw("in");
            ParamMode::In
        };

        let named = match (self.peek(), self.peek_at(1)) {
            (Some(first), Some(second)) => {
                let first_is_name = matches!(first.kind, TokenKind::Word | TokenKind::QuotedIdent)
                    && !MULTIWORD_TYPE_STARTS.iter().any(|w| first.is_keyword(self.src, w));
                let second_starts_type = matches!(second.kind, TokenKind::Word | TokenKind::QuotedIdent)
                    && !second.is_keyword(self.src, "default");
                first_is_name && second_starts_type
            }
            _ => false,
        };
        let name = if named { self.ident()? } else { String::new() };
        let type_name = self.type_text(&["default"])?;

        let has_default = self.eat_kw("default") || self.eat_punct('=');
        if has_default {
            self.skip_item();
        }
        Ok(FuncParam { name, type_name, mode, has_default })
    }

    fn drop(&mut self) -> Result<Option<Vec<Stmt>>, SqlError> {
        if self.eat_kw("table") || self.eat_kw("view") || self.eat_kws(&["materialized", "view"]) {
            let if_exists = self.if_exists();
            let mut tables = vec![self.table_name()?];
            while self.eat_punct(',') {
                tables.push(self.table_name()?);
            }
            return Ok(Some(vec![Stmt::DropTable(DropTableStmt { tables, if_exists })]));
        }
        if self.eat_kw("schema") || self.eat_kw("database") {
            let if_exists = self.if_exists();
            let mut schemas = vec![self.ident()?];
            while self.eat_punct(',') {
                schemas.push(self.ident()?);
            }
            return Ok(Some(vec![Stmt::DropSchema(DropSchemaStmt { schemas, if_exists })]));
        }
        if self.eat_kw("type") {
            let if_exists = self.if_exists();
            let mut types = vec![self.type_name_ref()?];
            while self.eat_punct(',') {
                types.push(self.type_name_ref()?);
            }
            return Ok(Some(vec![Stmt::DropType(DropTypeStmt { types, if_exists })]));
        }
        if self.eat_kw("function") || self.eat_kw("procedure") {
            let missing_ok = self.if_exists();
            let mut funcs = vec![self.func_spec()?];
            while self.eat_punct(',') {
                funcs.push(self.func_spec()?);
            }
            return Ok(Some(vec![Stmt::DropFunction(DropFunctionStmt { funcs, missing_ok })]));
        }
        Ok(None)
    }

    fn func_spec(&mut self) -> Result<FuncSpec, SqlError> {
        let parts = self.qualified()?;
        let name = FuncName::from_parts(&parts)?;
        if !self.eat_punct('(') {
            return Ok(FuncSpec { name, args: None });
        }
        let mut args = Vec::new();
        if !self.eat_punct(')') {
            loop {
                let param = self.func_param()?;
                if param.is_input() {
                    args.push(param.type_name);
                }
                if self.eat_punct(')') {
                    break;
                }
                self.expect_punct(',')?;
            }
        }
        Ok(FuncSpec { name, args: Some(args) })
    }

    fn alter(&mut self) -> Result<Option<Vec<Stmt>>, SqlError> {
        if self.eat_kw("type") {
            return self.alter_type().map(|s| Some(vec![s]));
        }
        if self.eat_kw("table") {
            let missing_ok = self.if_exists();
            self.eat_kw("only");
            let table = self.table_name()?;
            if self.eat_kws(&["set", "schema"]) {
                let new_schema = self.ident()?;
                return Ok(Some(vec![Stmt::AlterTableSetSchema(AlterTableSetSchemaStmt {
                    table,
                    new_schema,
                    missing_ok,
                })]));
            }
        }
        Ok(None)
    }

    fn alter_type(&mut self) -> Result<Stmt, SqlError> {
        let type_name = self.type_name_ref()?;
        if self.eat_kws(&["add", "value"]) {
            let if_not_exists = self.if_not_exists();
            let new_value = self.string()?;
            let (neighbor, after) = if self.eat_kw("before") {
                (Some(self.string()?), false)
            } else if self.eat_kw("after") {
                (Some(self.string()?), true)
            } else {
                (None, false)
            };
            return Ok(Stmt::AlterTypeAddValue(AlterTypeAddValueStmt {
                type_name,
                new_value,
                neighbor,
                after,
                if_not_exists,
            }));
        }
        if self.eat_kws(&["rename", "value"]) {
            let old_value = self.string()?;
            self.expect_kw("to")?;
            let new_value = self.string()?;
            return Ok(Stmt::AlterTypeRenameValue(AlterTypeRenameValueStmt {
                type_name,
                old_value,
                new_value,
            }));
        }
        if self.eat_kws(&["rename", "to"]) {
            let new_name = self.ident()?;
            return Ok(Stmt::RenameType(RenameTypeStmt { type_name, new_name }));
        }
        if self.eat_kws(&["set", "schema"]) {
            let new_schema = self.ident()?;
            return Ok(Stmt::AlterTypeSetSchema(AlterTypeSetSchemaStmt { type_name, new_schema }));
        }
        Ok(Stmt::Unsupported("ALTER TYPE".to_string()))
    }

    fn comment(&mut self) -> Result<Stmt, SqlError> {
        self.expect_kw("on")?;
        let target = if self.eat_kw("schema") {
            CommentTarget::Schema(self.ident()?)
        } else if self.eat_kw("table") {
            CommentTarget::Table(self.table_name()?)
        } else if self.eat_kw("view") || self.eat_kws(&["materialized", "view"]) {
            CommentTarget::View(self.table_name()?)
        } else if self.eat_kw("column") {
            let mut parts = self.qualified()?;
            if parts.len() < 2 {
                return Err(self.error(format!("column name must be qualified: {}", parts.join("."))));
            }
            let column = parts.pop().unwrap_or_default();
            CommentTarget::Column {
                table: TableName::from_parts(&parts)?,
                column,
            }
        } else if self.eat_kw("type") {
            CommentTarget::Type(self.type_name_ref()?)
        } else {
            let kind = self.word().unwrap_or_default().to_uppercase();
            return Ok(Stmt::Unsupported(format!("COMMENT ON {}", kind)));
        };
        self.expect_kw("is")?;
        let comment = if self.eat_kw("null") { None } else { Some(self.string()?) };
        Ok(Stmt::Comment(CommentStmt { target, comment }))
    }

    fn truncate(&mut self) -> Result<Stmt, SqlError> {
        self.eat_kw("table");
        self.eat_kw("only");
        let mut relations = vec![self.table_name()?];
        while self.eat_punct(',') {
            relations.push(self.table_name()?);
        }
        Ok(Stmt::Truncate(TruncateStmt { relations }))
    }

    /// MySQL `RENAME TABLE a TO b [, c TO d]`
    fn rename_tables(&mut self) -> Result<Option<Vec<Stmt>>, SqlError> {
        if !self.eat_kw("table") {
            return Ok(None);
        }
        let mut stmts = Vec::new();
        loop {
            let table = self.table_name()?;
            self.expect_kw("to")?;
            let new_name = self.table_name()?;
            stmts.push(Stmt::RenameTable(RenameTableStmt {
                table,
                new_name: new_name.name,
                missing_ok: false,
            }));
            if !self.eat_punct(',') {
                break;
            }
        }
        Ok(Some(stmts))
    }
}

fn type_from_parts(parts: &[String]) -> Result<TypeName, SqlError> {
    match parts {
        [name] => Ok(TypeName::new(name.clone())),
        [schema, name] => Ok(TypeName::with_schema(schema.clone(), name.clone())),
        [catalog, schema, name] => Ok(TypeName {
            catalog: catalog.clone(),
            ..TypeName::with_schema(schema.clone(), name.clone())
        }),
        _ => Err(SqlError::invalid(format!("invalid type name: {}", parts.join(".")))),
    }
}

/// Lift `LIKE` items and `INHERITS (...)` out of a CREATE TABLE
///
/// The removed text is blanked with spaces so byte offsets stay valid.
fn table_extras(text: &str, engine: Engine) -> Result<Prepared, SqlError> {
    let mut c = Cursor::new(text, engine);
    let passthrough = || -> Result<Prepared, SqlError> {
        Ok(Prepared::Grammar {
            text: text.to_string(),
            extras: TableExtras::default(),
        })
    };

    if !c.eat_kw("create") {
        return passthrough();
    }
    c.eat_kws(&["or", "replace"]);
    while c.eat_kw("temporary") || c.eat_kw("temp") || c.eat_kw("unlogged") || c.eat_kw("global") || c.eat_kw("local") {}
    if !c.eat_kw("table") {
        return passthrough();
    }
    let if_not_exists = c.if_not_exists();
    let name = c.table_name()?;
    let mut extras = TableExtras::default();
    let mut blanks: Vec<(usize, usize)> = Vec::new();
    let mut has_columns = false;

    if c.eat_kw("like") {
        // MySQL: CREATE TABLE a LIKE b
        extras.like = Some(c.table_name()?);
    } else if c.eat_punct('(') {
        loop {
            if c.eat_punct(')') {
                break;
            }
            let item_start = c.pos;
            if c.eat_kw("like") {
                extras.like = Some(c.table_name()?);
                c.skip_item();
                let start = c.toks[item_start].start;
                let mut end = c.toks.get(c.pos.saturating_sub(1)).map_or(start, |t| t.end);
                if c.peek_punct(',') {
                    end = c.peek().map_or(end, |t| t.end);
                } else if let Some(prev) = item_start.checked_sub(1).and_then(|i| c.toks.get(i)) {
                    if prev.is_punct(text, ',') {
                        blanks.push((prev.start, prev.end));
                    }
                }
                blanks.push((start, end));
            } else {
                has_columns = true;
                c.skip_item();
            }
            if c.peek().is_none() {
                break;
            }
            c.eat_punct(',');
        }
        if c.eat_kw("inherits") {
            let start = c.toks[c.pos - 1].start;
            c.expect_punct('(')?;
            loop {
                extras.inherits.push(c.table_name()?);
                if c.eat_punct(')') {
                    break;
                }
                c.expect_punct(',')?;
            }
            let end = c.toks[c.pos - 1].end;
            blanks.push((start, end));
        }
    }

    if extras.like.is_some() && !has_columns && extras.inherits.is_empty() {
        let mut stmt = CreateTableStmt::new(name);
        stmt.if_not_exists = if_not_exists;
        stmt.like = extras.like;
        return Ok(Prepared::Parsed(vec![Stmt::CreateTable(Box::new(stmt))]));
    }

    let mut out = text.to_string();
    for (start, end) in blanks {
        out.replace_range(start..end, &" ".repeat(end - start));
    }
    Ok(Prepared::Grammar { text: out, extras })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(sql: &str) -> Stmt {
        match prepare(sql, Engine::Postgresql).unwrap() {
            Prepared::Parsed(mut stmts) => stmts.remove(0),
            other => panic!("expected a parsed statement, got {:?}", other),
        }
    }

    #[test]
    fn bad_names_point_at_the_name() {
        let err = prepare("TRUNCATE a.b.c.d", Engine::Postgresql).unwrap_err();
        assert_eq!(err.location, Some(9));
        assert!(err.to_string().contains("invalid table name"));
    }

    #[test]
    fn create_enum() {
        match parse_one("CREATE TYPE app.mood AS ENUM ('sad', 'ok', 'happy')") {
            Stmt::CreateEnum(e) => {
                assert_eq!(e.name, TypeName::with_schema("app", "mood"));
                assert_eq!(e.values, vec!["sad", "ok", "happy"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn create_composite_type() {
        match parse_one("CREATE TYPE point3 AS (x double precision, y double precision, label varchar(10))") {
            Stmt::CreateCompositeType(t) => {
                assert_eq!(t.columns.len(), 3);
                assert_eq!(t.columns[0].type_name.name, "double precision");
                assert_eq!(t.columns[2].type_name.length, Some(10));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn alter_type_variants() {
        match parse_one("ALTER TYPE mood ADD VALUE IF NOT EXISTS 'meh' AFTER 'sad'") {
            Stmt::AlterTypeAddValue(s) => {
                assert_eq!(s.new_value, "meh");
                assert_eq!(s.neighbor.as_deref(), Some("sad"));
                assert!(s.after);
                assert!(s.if_not_exists);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(parse_one("ALTER TYPE mood RENAME VALUE 'ok' TO 'fine'"), Stmt::AlterTypeRenameValue(_)));
        assert!(matches!(parse_one("ALTER TYPE mood RENAME TO feeling"), Stmt::RenameType(_)));
        assert!(matches!(parse_one("ALTER TYPE mood SET SCHEMA app"), Stmt::AlterTypeSetSchema(_)));
    }

    #[test]
    fn create_function_with_params() {
        let sql = "CREATE OR REPLACE FUNCTION add_days(ts timestamptz, days int DEFAULT 1, VARIADIC tags text[]) \
                   RETURNS timestamptz LANGUAGE sql AS $$ SELECT ts + days $$";
        match parse_one(sql) {
            Stmt::CreateFunction(f) => {
                assert!(f.replace);
                assert_eq!(f.name, FuncName::new("add_days"));
                assert_eq!(f.params.len(), 3);
                assert_eq!(f.params[0].name, "ts");
                assert!(f.params[1].has_default);
                assert_eq!(f.params[2].mode, ParamMode::Variadic);
                assert_eq!(f.params[2].type_name.array_dims, 1);
                assert_eq!(f.returns, Some(TypeName::new("timestamptz")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn create_function_returns_table() {
        let sql = "CREATE FUNCTION recent(n int) RETURNS TABLE (id bigint, title text) AS 'select 1' LANGUAGE sql";
        match parse_one(sql) {
            Stmt::CreateFunction(f) => {
                assert!(f.setof);
                let table: Vec<&str> = f
                    .params
                    .iter()
                    .filter(|p| p.mode == ParamMode::Table)
                    .map(|p| p.name.as_str())
                    .collect();
                assert_eq!(table, vec!["id", "title"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unnamed_function_params() {
        match parse_one("CREATE FUNCTION f(text, double precision) RETURNS SETOF text AS 'x' LANGUAGE sql") {
            Stmt::CreateFunction(f) => {
                assert_eq!(f.params[0].name, "");
                assert_eq!(f.params[1].type_name.name, "double precision");
                assert!(f.setof);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn drop_function_signature() {
        match parse_one("DROP FUNCTION IF EXISTS f(text, int), g") {
            Stmt::DropFunction(d) => {
                assert!(d.missing_ok);
                assert_eq!(d.funcs[0].args.as_ref().map(Vec::len), Some(2));
                assert!(d.funcs[1].args.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn comment_targets() {
        match parse_one("COMMENT ON COLUMN public.users.name IS 'Full name'") {
            Stmt::Comment(c) => {
                assert_eq!(
                    c.target,
                    CommentTarget::Column {
                        table: TableName::with_schema("public", "users"),
                        column: "name".into()
                    }
                );
                assert_eq!(c.comment.as_deref(), Some("Full name"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse_one("COMMENT ON TABLE users IS NULL") {
            Stmt::Comment(c) => assert_eq!(c.comment, None),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn extension_and_truncate() {
        assert_eq!(
            parse_one("CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\""),
            Stmt::CreateExtension(CreateExtensionStmt { name: "uuid-ossp".into(), if_not_exists: true })
        );
        match parse_one("TRUNCATE TABLE a, b") {
            Stmt::Truncate(t) => assert_eq!(t.relations.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn create_table_like_only() {
        match parse_one("CREATE TABLE copy (LIKE users)") {
            Stmt::CreateTable(t) => assert_eq!(t.like, Some(TableName::new("users"))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn create_table_inherits_is_lifted() {
        let sql = "CREATE TABLE child (extra text) INHERITS (parent)";
        match prepare(sql, Engine::Postgresql).unwrap() {
            Prepared::Grammar { text, extras } => {
                assert_eq!(extras.inherits, vec![TableName::new("parent")]);
                assert_eq!(text.len(), sql.len());
                assert!(!text.contains("INHERITS"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn plain_statements_go_to_grammar() {
        assert!(matches!(
            prepare("SELECT 1", Engine::Postgresql).unwrap(),
            Prepared::Grammar { .. }
        ));
        assert!(matches!(
            prepare("ALTER TABLE t ADD COLUMN c int", Engine::Postgresql).unwrap(),
            Prepared::Grammar { .. }
        ));
    }
}
