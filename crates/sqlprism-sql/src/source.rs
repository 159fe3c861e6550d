//! Lexical scanning of raw SQL text
//!
//! The scanner knows just enough SQL to find statement boundaries, comments,
//! placeholders and projection stars without being fooled by string
//! literals, quoted identifiers or dollar-quoted bodies. All positions are
//! byte offsets into the scanned text.

use sqlprism_core::Engine;

/// Lexical class of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Unquoted identifier or keyword
    Word,
    /// `"ident"` or `` `ident` ``
    QuotedIdent,
    /// String literal, including dollar-quoted bodies
    String,
    Number,
    /// `$1`, `?`, `?1`
    Placeholder,
    /// `@name`
    AtName,
    /// Any other single character
    Punct,
    LineComment,
    BlockComment,
}

/// A token with its byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// Source text of the token
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }

    /// Whether the token is the given keyword (case-insensitive)
    pub fn is_keyword(&self, src: &str, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text(src).eq_ignore_ascii_case(keyword)
    }

    /// Whether the token is the given punctuation character
    pub fn is_punct(&self, src: &str, ch: char) -> bool {
        self.kind == TokenKind::Punct && self.text(src).starts_with(ch)
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::LineComment | TokenKind::BlockComment)
    }

    /// Identifier value: unquoted words fold to lower case, quoted ones keep
    /// their spelling with doubled quotes collapsed
    pub fn ident(&self, src: &str) -> Option<String> {
        match self.kind {
            TokenKind::Word => Some(self.text(src).to_lowercase()),
            TokenKind::QuotedIdent => {
                let text = self.text(src);
                let quote = &text[..1];
                let inner = &text[1..text.len().saturating_sub(1).max(1)];
                Some(inner.replace(&format!("{}{}", quote, quote), quote))
            }
            _ => None,
        }
    }

    /// Value of a single-quoted string literal
    pub fn string_value(&self, src: &str) -> Option<String> {
        if self.kind != TokenKind::String {
            return None;
        }
        let text = self.text(src);
        let body = text.trim_start_matches(['E', 'e', 'N', 'n']);
        let inner = body.strip_prefix('\'')?.strip_suffix('\'')?;
        Some(inner.replace("''", "'"))
    }
}

/// Split `src` into tokens, skipping whitespace
pub fn tokenize(src: &str, engine: Engine) -> Vec<Token> {
    Scanner { src, bytes: src.as_bytes(), pos: 0, engine }.run()
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    engine: Engine,
}

impl<'a> Scanner<'a> {
    fn run(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while self.pos < self.bytes.len() {
            let start = self.pos;
            let c = self.bytes[self.pos];
            let kind = match c {
                b' ' | b'\t' | b'\n' | b'\r' | 0x0c => {
                    self.pos += 1;
                    continue;
                }
                b'-' if self.peek(1) == Some(b'-') => {
                    self.skip_line();
                    TokenKind::LineComment
                }
                b'#' if self.engine == Engine::Mysql => {
                    self.skip_line();
                    TokenKind::LineComment
                }
                b'/' if self.peek(1) == Some(b'*') => {
                    self.skip_block_comment();
                    TokenKind::BlockComment
                }
                b'\'' => {
                    let backslash = self.engine == Engine::Mysql;
                    self.skip_quoted(b'\'', backslash);
                    TokenKind::String
                }
                b'E' | b'e' if self.peek(1) == Some(b'\'') => {
                    self.pos += 1;
                    self.skip_quoted(b'\'', true);
                    TokenKind::String
                }
                b'"' => {
                    self.skip_quoted(b'"', false);
                    TokenKind::QuotedIdent
                }
                b'`' if self.engine != Engine::Postgresql => {
                    self.skip_quoted(b'`', false);
                    TokenKind::QuotedIdent
                }
                b'$' => self.dollar(),
                b'?' if self.engine != Engine::Postgresql => {
                    self.pos += 1;
                    self.skip_while(|b| b.is_ascii_digit());
                    TokenKind::Placeholder
                }
                b'@' if self.peek(1).map_or(false, is_ident_start) => {
                    self.pos += 1;
                    self.skip_while(is_ident_char);
                    TokenKind::AtName
                }
                b'0'..=b'9' => {
                    self.number();
                    TokenKind::Number
                }
                b'.' if self.peek(1).map_or(false, |b| b.is_ascii_digit()) => {
                    self.number();
                    TokenKind::Number
                }
                _ if is_ident_start(c) => {
                    self.skip_while(is_ident_char);
                    TokenKind::Word
                }
                _ => {
                    self.pos += self.src[self.pos..].chars().next().map_or(1, char::len_utf8);
                    TokenKind::Punct
                }
            };
            tokens.push(Token { kind, start, end: self.pos });
        }
        tokens
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.pos < self.bytes.len() && pred(self.bytes[self.pos]) {
            self.pos += 1;
        }
    }

    fn skip_line(&mut self) {
        self.skip_while(|b| b != b'\n');
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        let mut depth = 1;
        while self.pos < self.bytes.len() && depth > 0 {
            if self.bytes[self.pos] == b'/' && self.peek(1) == Some(b'*') {
                depth += 1;
                self.pos += 2;
            } else if self.bytes[self.pos] == b'*' && self.peek(1) == Some(b'/') {
                depth -= 1;
                self.pos += 2;
            } else {
                self.pos += 1;
            }
        }
    }

    fn skip_quoted(&mut self, quote: u8, backslash: bool) {
        self.pos += 1;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if backslash && b == b'\\' {
                self.pos += 2;
                continue;
            }
            self.pos += 1;
            if b == quote {
                if self.bytes.get(self.pos) == Some(&quote) {
                    self.pos += 1;
                } else {
                    return;
                }
            }
        }
        self.pos = self.bytes.len();
    }

    fn number(&mut self) {
        self.skip_while(|b| b.is_ascii_digit() || b == b'.');
        if matches!(self.peek(0), Some(b'e') | Some(b'E'))
            && self.peek(1).map_or(false, |b| b.is_ascii_digit() || b == b'-' || b == b'+')
        {
            self.pos += 2;
            self.skip_while(|b| b.is_ascii_digit());
        }
    }

    /// `$1`, `$tag$ ... $tag$`, or a lone `$`
    fn dollar(&mut self) -> TokenKind {
        if self.peek(1).map_or(false, |b| b.is_ascii_digit()) {
            self.pos += 1;
            self.skip_while(|b| b.is_ascii_digit());
            return TokenKind::Placeholder;
        }
        let tag_start = self.pos;
        let mut end = self.pos + 1;
        while end < self.bytes.len() && is_ident_char(self.bytes[end]) && self.bytes[end] != b'$' {
            end += 1;
        }
        if end < self.bytes.len() && self.bytes[end] == b'$' {
            let tag = &self.src[tag_start..=end];
            let body_start = end + 1;
            match self.src[body_start..].find(tag) {
                Some(found) => self.pos = body_start + found + tag.len(),
                None => self.pos = self.bytes.len(),
            }
            return TokenKind::String;
        }
        self.pos += 1;
        TokenKind::Punct
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// One statement's byte range within a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementRange {
    /// First byte, including any leading comments
    pub start: usize,
    /// One past the last byte, including the terminating `;`
    pub end: usize,
}

impl StatementRange {
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }
}

/// Split a file into statements at top-level semicolons
///
/// Leading comments belong to the statement that follows them. Ranges that
/// contain nothing but comments are dropped.
pub fn split_statements(src: &str, engine: Engine) -> Vec<StatementRange> {
    let mut ranges = Vec::new();
    let mut start: Option<usize> = None;
    let mut has_code = false;
    let mut depth = 0usize;

    for tok in tokenize(src, engine) {
        if start.is_none() {
            start = Some(tok.start);
        }
        if tok.is_comment() {
            continue;
        }
        if tok.is_punct(src, '(') {
            depth += 1;
        } else if tok.is_punct(src, ')') {
            depth = depth.saturating_sub(1);
        }
        if tok.is_punct(src, ';') && depth == 0 {
            if let (Some(s), true) = (start, has_code) {
                ranges.push(StatementRange { start: s, end: tok.end });
            }
            start = None;
            has_code = false;
            continue;
        }
        has_code = true;
    }

    if let (Some(s), true) = (start, has_code) {
        ranges.push(StatementRange { start: s, end: src.trim_end().len().max(s) });
    }
    ranges
}

/// Remove comment lines from a query, returning the remaining text and the
/// comment bodies
///
/// `-- name:` lines are dropped without being returned. Comment text keeps
/// everything after the marker except one leading space.
pub fn strip_comments(sql: &str) -> (String, Vec<String>) {
    let mut lines = Vec::new();
    let mut comments = Vec::new();
    for line in sql.trim().lines() {
        let t = line.trim_end();
        let trimmed = t.trim_start();
        if trimmed.starts_with("-- name:") || (trimmed.starts_with("/* name:") && trimmed.ends_with("*/")) {
            continue;
        }
        if let Some(body) = trimmed.strip_prefix("--") {
            comments.push(body.strip_prefix(' ').unwrap_or(body).to_string());
            continue;
        }
        if trimmed.starts_with("/*") && trimmed.ends_with("*/") && trimmed.len() >= 4 {
            let body = &trimmed[2..trimmed.len() - 2];
            comments.push(body.trim().to_string());
            continue;
        }
        lines.push(t);
    }
    (lines.join("\n"), comments)
}

/// A textual replacement within a source string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

/// Apply non-overlapping edits
pub fn apply_edits(src: &str, edits: &[Edit]) -> String {
    let mut sorted: Vec<&Edit> = edits.iter().collect();
    sorted.sort_by_key(|e| e.start);
    let mut out = String::with_capacity(src.len());
    let mut pos = 0;
    for edit in sorted {
        if edit.start < pos {
            continue;
        }
        out.push_str(&src[pos..edit.start]);
        out.push_str(&edit.replacement);
        pos = edit.end;
    }
    out.push_str(&src[pos.min(src.len())..]);
    out
}

/// Map an offset in edited text back to the text the edits were applied to
pub fn original_offset(edits: &[Edit], offset: usize) -> usize {
    let mut sorted: Vec<&Edit> = edits.iter().collect();
    sorted.sort_by_key(|e| e.start);
    let mut delta: isize = 0;
    for edit in sorted {
        let new_start = (edit.start as isize + delta) as usize;
        if offset < new_start {
            break;
        }
        let new_end = new_start + edit.replacement.len();
        if offset < new_end {
            return edit.start;
        }
        delta += edit.replacement.len() as isize - (edit.end - edit.start) as isize;
    }
    (offset as isize - delta).max(0) as usize
}

/// Byte offset of the first occurrence of `word` as an identifier token
pub fn locate_word(src: &str, engine: Engine, word: &str) -> Option<usize> {
    tokenize(src, engine)
        .into_iter()
        .find(|t| t.ident(src).map_or(false, |ident| ident.eq_ignore_ascii_case(word)))
        .map(|t| t.start)
}

/// A `*`, `alias.*` or `sqlprism.embed(alias)` in a projection list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarSite {
    pub start: usize,
    pub end: usize,
    /// Folded qualifier parts (`["s", "t"]` for `s.t.*`)
    pub qualifier: Vec<String>,
    pub embed: bool,
}

const PROJECTION_START: &[&str] = &["select", "returning"];
const PROJECTION_END: &[&str] = &[
    "from", "into", "where", "group", "having", "order", "limit", "offset", "union",
    "intersect", "except", "window", "values", "set", "using", "for", "fetch",
];
const STAR_PREFIX: &[&str] = &["select", "distinct", "all", "returning"];

/// Find every projection star in source order
pub fn star_sites(src: &str, engine: Engine) -> Vec<StarSite> {
    let toks: Vec<Token> = tokenize(src, engine).into_iter().filter(|t| !t.is_comment()).collect();
    let mut frames = vec![false];
    let mut sites = Vec::new();
    let mut i = 0;

    while i < toks.len() {
        let tok = toks[i];
        let in_projection = frames.last().copied().unwrap_or(false);

        if tok.kind == TokenKind::Word {
            let word = tok.text(src).to_ascii_lowercase();
            if PROJECTION_START.contains(&word.as_str()) {
                set_top(&mut frames, true);
            } else if PROJECTION_END.contains(&word.as_str()) {
                set_top(&mut frames, false);
            } else if word == "on" && !(i > 0 && toks[i - 1].is_keyword(src, "distinct")) {
                set_top(&mut frames, false);
            } else if word == "sqlprism" && in_projection {
                if let Some((site, next)) = embed_site(src, &toks, i) {
                    if starts_item(src, &toks, i) {
                        sites.push(site);
                        i = next;
                        continue;
                    }
                }
            }
        } else if tok.is_punct(src, '(') {
            frames.push(false);
        } else if tok.is_punct(src, ')') {
            if frames.len() > 1 {
                frames.pop();
            }
        } else if tok.is_punct(src, ';') {
            frames.truncate(1);
            set_top(&mut frames, false);
        } else if tok.is_punct(src, '*') && in_projection {
            let mut first = i;
            let mut qualifier = Vec::new();
            while first >= 2
                && toks[first - 1].is_punct(src, '.')
                && matches!(toks[first - 2].kind, TokenKind::Word | TokenKind::QuotedIdent)
            {
                if let Some(part) = toks[first - 2].ident(src) {
                    qualifier.insert(0, part);
                }
                first -= 2;
            }
            if starts_item(src, &toks, first) {
                sites.push(StarSite {
                    start: toks[first].start,
                    end: tok.end,
                    qualifier,
                    embed: false,
                });
            }
        }
        i += 1;
    }
    sites
}

fn set_top(frames: &mut [bool], value: bool) {
    if let Some(top) = frames.last_mut() {
        *top = value;
    }
}

/// Whether the token at `idx` begins a projection item
fn starts_item(src: &str, toks: &[Token], idx: usize) -> bool {
    if idx == 0 {
        return false;
    }
    let prev = toks[idx - 1];
    prev.is_punct(src, ',')
        || STAR_PREFIX.iter().any(|k| prev.is_keyword(src, k))
}

/// Match `sqlprism . embed ( ident )` starting at `idx`
fn embed_site(src: &str, toks: &[Token], idx: usize) -> Option<(StarSite, usize)> {
    let window = toks.get(idx..idx + 6)?;
    if window[1].is_punct(src, '.')
        && window[2].is_keyword(src, "embed")
        && window[3].is_punct(src, '(')
        && window[5].is_punct(src, ')')
    {
        let target = window[4].ident(src)?;
        return Some((
            StarSite {
                start: window[0].start,
                end: window[5].end,
                qualifier: vec![target],
                embed: true,
            },
            idx + 6,
        ));
    }
    None
}

/// A placeholder occurrence in rewritten query text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderSite {
    pub number: usize,
    pub start: usize,
    pub end: usize,
    /// A bare `?` whose number comes from its position
    pub bare: bool,
}

/// Rewrite bare `?` markers to explicit `?N` so the parsed tree carries
/// their numbers
pub fn number_bare_placeholders(src: &str, sites: &[PlaceholderSite]) -> String {
    let edits: Vec<Edit> = sites
        .iter()
        .filter(|s| s.bare)
        .map(|s| Edit {
            start: s.start,
            end: s.end,
            replacement: format!("?{}", s.number),
        })
        .collect();
    apply_edits(src, &edits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str, engine: Engine) -> Vec<(TokenKind, String)> {
        tokenize(src, engine)
            .into_iter()
            .map(|t| (t.kind, t.text(src).to_string()))
            .collect()
    }

    #[test]
    fn tokenizes_strings_and_comments() {
        let toks = kinds("SELECT 'a;b' -- c;\n, \"x\"\"y\" /* d; */ FROM t", Engine::Postgresql);
        assert_eq!(toks[1], (TokenKind::String, "'a;b'".to_string()));
        assert_eq!(toks[2].0, TokenKind::LineComment);
        assert_eq!(toks[4], (TokenKind::QuotedIdent, "\"x\"\"y\"".to_string()));
        assert_eq!(toks[5].0, TokenKind::BlockComment);
    }

    #[test]
    fn dollar_quotes_and_placeholders() {
        let src = "SELECT $1, $fn$ select 1; $fn$, $$x$$";
        let toks = kinds(src, Engine::Postgresql);
        assert_eq!(toks[1], (TokenKind::Placeholder, "$1".to_string()));
        assert_eq!(toks[3], (TokenKind::String, "$fn$ select 1; $fn$".to_string()));
        assert_eq!(toks[5], (TokenKind::String, "$$x$$".to_string()));
    }

    #[test]
    fn question_mark_is_operator_on_postgres() {
        let pg = kinds("a ? b", Engine::Postgresql);
        assert_eq!(pg[1].0, TokenKind::Punct);
        let my = kinds("a = ? AND b = ?2", Engine::Sqlite);
        assert_eq!(my[2], (TokenKind::Placeholder, "?".to_string()));
        assert_eq!(my[6], (TokenKind::Placeholder, "?2".to_string()));
    }

    #[test]
    fn splits_on_top_level_semicolons() {
        let src = "-- first\nCREATE TABLE a (id int);\n\nCREATE FUNCTION f() RETURNS int AS $$ SELECT 1; $$ LANGUAGE sql;\n-- trailing only\n";
        let ranges = split_statements(src, Engine::Postgresql);
        assert_eq!(ranges.len(), 2);
        assert!(ranges[0].text(src).starts_with("-- first"));
        assert!(ranges[1].text(src).ends_with("LANGUAGE sql;"));
    }

    #[test]
    fn strip_comments_collects_doc_lines() {
        let (sql, comments) = strip_comments("-- name: GetUser :one\n-- Fetch one user\nSELECT 1");
        assert_eq!(sql, "SELECT 1");
        assert_eq!(comments, vec!["Fetch one user".to_string()]);
    }

    #[test]
    fn edits_and_offset_mapping() {
        let src = "SELECT * FROM t WHERE id = @id";
        let edits = vec![
            Edit { start: 7, end: 8, replacement: "id, name".into() },
            Edit { start: 27, end: 30, replacement: "$1".into() },
        ];
        let out = apply_edits(src, &edits);
        assert_eq!(out, "SELECT id, name FROM t WHERE id = $1");
        assert_eq!(original_offset(&edits, 16), 9);
        assert_eq!(original_offset(&edits, 35), 27);
    }

    #[test]
    fn finds_projection_stars_only() {
        let src = "SELECT *, u.* , count(*), a * b FROM t JOIN u ON true WHERE x IN (SELECT * FROM v)";
        let sites = star_sites(src, Engine::Postgresql);
        assert_eq!(sites.len(), 3);
        assert_eq!(&src[sites[0].start..sites[0].end], "*");
        assert_eq!(&src[sites[1].start..sites[1].end], "u.*");
        assert_eq!(sites[1].qualifier, vec!["u".to_string()]);
        assert!(sites[2].qualifier.is_empty());
    }

    #[test]
    fn finds_embed_sites() {
        let src = "SELECT sqlprism.embed(users), p.id FROM users JOIN posts p ON true";
        let sites = star_sites(src, Engine::Postgresql);
        assert_eq!(sites.len(), 1);
        assert!(sites[0].embed);
        assert_eq!(&src[sites[0].start..sites[0].end], "sqlprism.embed(users)");
    }

    #[test]
    fn numbers_bare_markers() {
        let sites = [
            PlaceholderSite { number: 1, start: 10, end: 11, bare: true },
            PlaceholderSite { number: 2, start: 20, end: 21, bare: true },
        ];
        let out = number_bare_placeholders("WHERE a = ? AND b = ?", &sites);
        assert_eq!(out, "WHERE a = ?1 AND b = ?2");
    }
}
