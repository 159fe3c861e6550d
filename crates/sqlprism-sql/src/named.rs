//! Named query parameters
//!
//! Queries may name their parameters with `@name`, `sqlprism.arg(name)`,
//! `sqlprism.narg(name)` or `sqlprism.slice(name)`. Before a statement is
//! handed to the grammar, every named form is rewritten to the engine's
//! positional placeholder and the name is remembered against the number it
//! was given.
//!
//! A slice stands for a list bound into `IN (...)`. On engines with `?`
//! markers it is written as `/*SLICE:name*/?` so the marker can be expanded
//! to one placeholder per element at execution time.

use std::collections::{BTreeMap, HashMap, HashSet};
use sqlprism_core::{Engine, SqlError};
use crate::source::{tokenize, Edit, PlaceholderSite, TokenKind};

const USER_NULLABLE: u8 = 1;
const USER_NOT_NULL: u8 = 2;
const INFERRED_NOT_NULL: u8 = 4;

/// Nullability knowledge about a parameter, merged from every source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Nullability(u8);

impl Nullability {
    /// Nothing is known
    pub const UNSPECIFIED: Nullability = Nullability(0);
    /// Declared nullable by the query author (`sqlprism.narg`)
    pub const NULLABLE: Nullability = Nullability(USER_NULLABLE);
    /// Declared not-null by the query author
    pub const NOT_NULL: Nullability = Nullability(USER_NOT_NULL);
    /// Inferred not-null from the parameter's context
    pub const INFERRED_NOT_NULL: Nullability = Nullability(INFERRED_NOT_NULL);

    /// Combine two sources of knowledge
    pub fn merge(self, other: Nullability) -> Nullability {
        Nullability(self.0 | other.0)
    }

    /// Author declarations win over inference
    pub fn not_null(self) -> bool {
        if self.0 & USER_NULLABLE != 0 {
            return false;
        }
        if self.0 & USER_NOT_NULL != 0 {
            return true;
        }
        self.0 & INFERRED_NOT_NULL != 0
    }
}

/// A named parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub nullability: Nullability,
    /// Declared with `sqlprism.slice`
    pub slice: bool,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullability: Nullability::UNSPECIFIED,
            slice: false,
        }
    }

    pub fn nullable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullability: Nullability::NULLABLE,
            slice: false,
        }
    }

    pub fn slice(name: impl Into<String>) -> Self {
        Self {
            slice: true,
            ..Self::new(name)
        }
    }

    /// Merge with what was inferred for the same number; the author's name
    /// wins when present
    pub fn merge(&self, inferred: &Param) -> Param {
        let name = if self.name.is_empty() { inferred.name.clone() } else { self.name.clone() };
        Param {
            name,
            nullability: self.nullability.merge(inferred.nullability),
            slice: self.slice || inferred.slice,
        }
    }
}

/// Numbers assigned to named parameters
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    by_number: BTreeMap<usize, Param>,
    by_name: HashMap<String, usize>,
}

impl ParamSet {
    /// Named parameter for a placeholder number
    pub fn get(&self, number: usize) -> Option<&Param> {
        self.by_number.get(&number)
    }

    /// Number assigned to a name
    pub fn number_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Whether the parameter with this number was declared as a slice
    pub fn is_slice(&self, number: usize) -> bool {
        self.by_number.get(&number).is_some_and(|p| p.slice)
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    fn insert(&mut self, number: usize, param: Param) {
        self.by_name.entry(param.name.clone()).or_insert(number);
        match self.by_number.get_mut(&number) {
            Some(existing) => *existing = existing.merge(&param),
            None => {
                self.by_number.insert(number, param);
            }
        }
    }
}

/// Query text after named parameters were rewritten
#[derive(Debug, Clone)]
pub struct Rewritten {
    /// Text with positional placeholders only
    pub sql: String,

    /// Edits that turned the input into `sql`
    pub edits: Vec<Edit>,

    /// Names of the rewritten parameters
    pub params: ParamSet,

    /// Every placeholder in `sql`, in source order
    pub placeholders: Vec<PlaceholderSite>,
}

enum Found {
    Explicit(usize),
    Bare,
    Named(Param),
}

/// Rewrite named parameters and number every placeholder
///
/// Numbering follows the engine: PostgreSQL reuses a number for repeated
/// names and otherwise takes the lowest unused one; MySQL numbers every
/// marker by appearance; SQLite follows its own rule of "one more than the
/// largest so far" for bare markers.
pub fn rewrite(sql: &str, engine: Engine) -> Result<Rewritten, SqlError> {
    let toks = tokenize(sql, engine);
    let mut found: Vec<(usize, usize, Found)> = Vec::new();
    let mut i = 0;

    while i < toks.len() {
        let tok = toks[i];
        match tok.kind {
            TokenKind::Placeholder => {
                let text = tok.text(sql);
                let digits = &text[1..];
                if digits.is_empty() {
                    found.push((tok.start, tok.end, Found::Bare));
                } else {
                    let n = digits
                        .parse::<usize>()
                        .map_err(|_| SqlError::invalid(format!("invalid placeholder {}", text)).with_location(tok.start))?;
                    if n == 0 {
                        return Err(SqlError::invalid(format!("invalid placeholder {}", text)).with_location(tok.start));
                    }
                    found.push((tok.start, tok.end, Found::Explicit(n)));
                }
            }
            TokenKind::AtName if engine != Engine::Mysql => {
                let name = tok.text(sql)[1..].to_string();
                found.push((tok.start, tok.end, Found::Named(Param::new(name))));
            }
            TokenKind::Word if tok.text(sql).eq_ignore_ascii_case("sqlprism") => {
                if let Some(window) = toks.get(i..i + 6) {
                    let func = window[2].text(sql).to_ascii_lowercase();
                    if window[1].is_punct(sql, '.')
                        && matches!(func.as_str(), "arg" | "narg" | "slice")
                        && window[3].is_punct(sql, '(')
                        && window[5].is_punct(sql, ')')
                    {
                        let name = window[4]
                            .ident(sql)
                            .or_else(|| window[4].string_value(sql))
                            .ok_or_else(|| {
                                SqlError::invalid(format!("invalid argument to sqlprism.{}", func))
                                    .with_location(window[4].start)
                            })?;
                        let param = match func.as_str() {
                            "narg" => Param::nullable(name),
                            "slice" => Param::slice(name),
                            _ => Param::new(name),
                        };
                        found.push((window[0].start, window[5].end, Found::Named(param)));
                        i += 6;
                        continue;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    let explicit: HashSet<usize> = found
        .iter()
        .filter_map(|(_, _, f)| match f {
            Found::Explicit(n) => Some(*n),
            _ => None,
        })
        .collect();

    let mut params = ParamSet::default();
    let mut used = explicit.clone();
    let mut edits = Vec::new();
    let mut numbered: Vec<(usize, usize, usize, bool, Option<String>)> = Vec::new();
    let mut appearance = 0usize;
    let mut largest = 0usize;

    for (start, end, f) in found {
        appearance += 1;
        let (number, bare, replacement) = match f {
            Found::Explicit(n) => {
                largest = largest.max(n);
                (n, false, None)
            }
            Found::Bare => {
                let n = match engine {
                    Engine::Mysql => appearance,
                    _ => largest + 1,
                };
                largest = largest.max(n);
                used.insert(n);
                (n, true, None)
            }
            Found::Named(param) => {
                let reuse = engine != Engine::Mysql;
                let n = match params.number_of(&param.name) {
                    Some(n) if reuse => n,
                    _ => match engine {
                        Engine::Mysql => appearance,
                        Engine::Sqlite => largest + 1,
                        Engine::Postgresql => (1..).find(|n| !used.contains(n)).unwrap_or(1),
                    },
                };
                largest = largest.max(n);
                used.insert(n);
                let replacement = match engine {
                    Engine::Postgresql => format!("${}", n),
                    _ if param.slice => format!("/*SLICE:{}*/?", param.name),
                    Engine::Mysql => "?".to_string(),
                    Engine::Sqlite => format!("?{}", n),
                };
                let bare = replacement.ends_with('?');
                params.insert(n, param);
                (n, bare, Some(replacement))
            }
        };
        numbered.push((start, end, number, bare, replacement));
    }

    let mut out = String::with_capacity(sql.len());
    let mut placeholders = Vec::new();
    let mut pos = 0;
    for (start, end, number, bare, replacement) in numbered {
        out.push_str(&sql[pos..start]);
        let new_start = out.len();
        match replacement {
            Some(text) => {
                out.push_str(&text);
                edits.push(Edit { start, end, replacement: text });
            }
            None => out.push_str(&sql[start..end]),
        }
        // a slice marker is a comment followed by the placeholder itself
        let site_start = if bare { out.len() - 1 } else { new_start };
        placeholders.push(PlaceholderSite { number, start: site_start, end: out.len(), bare });
        pos = end;
    }
    out.push_str(&sql[pos..]);

    Ok(Rewritten { sql: out, edits, params, placeholders })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_named_params_reuse_numbers() {
        let rw = rewrite(
            "SELECT * FROM t WHERE a = @a AND b = sqlprism.narg(b) AND c = @a",
            Engine::Postgresql,
        )
        .unwrap();
        assert_eq!(rw.sql, "SELECT * FROM t WHERE a = $1 AND b = $2 AND c = $1");
        assert_eq!(rw.params.get(1).unwrap().name, "a");
        assert!(!rw.params.get(2).unwrap().nullability.not_null());
        assert_eq!(rw.placeholders.len(), 3);
        assert_eq!(rw.edits.len(), 3);
    }

    #[test]
    fn postgres_named_params_skip_explicit_numbers() {
        let rw = rewrite("SELECT $1, sqlprism.arg('x')", Engine::Postgresql).unwrap();
        assert_eq!(rw.sql, "SELECT $1, $2");
        assert_eq!(rw.params.number_of("x"), Some(2));
    }

    #[test]
    fn mysql_numbers_by_appearance() {
        let rw = rewrite("UPDATE t SET a = ?, b = sqlprism.arg(b) WHERE id = ?", Engine::Mysql).unwrap();
        assert_eq!(rw.sql, "UPDATE t SET a = ?, b = ? WHERE id = ?");
        let numbers: Vec<usize> = rw.placeholders.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(rw.params.get(2).unwrap().name, "b");
        assert!(rw.placeholders.iter().all(|p| p.bare));
    }

    #[test]
    fn sqlite_bare_markers_follow_largest() {
        let rw = rewrite("SELECT ?2, ?, @x", Engine::Sqlite).unwrap();
        let numbers: Vec<usize> = rw.placeholders.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![2, 3, 4]);
        assert_eq!(rw.sql, "SELECT ?2, ?, ?4");
    }

    #[test]
    fn slices_keep_a_marker_on_question_mark_engines() {
        let rw = rewrite("SELECT * FROM t WHERE id IN (sqlprism.slice(ids)) AND a = ?", Engine::Mysql).unwrap();
        assert_eq!(rw.sql, "SELECT * FROM t WHERE id IN (/*SLICE:ids*/?) AND a = ?");
        assert!(rw.params.is_slice(1));
        assert!(!rw.params.is_slice(2));
        let site = rw.placeholders[0];
        assert_eq!(&rw.sql[site.start..site.end], "?");
        assert!(site.bare);

        let rw = rewrite("SELECT * FROM t WHERE id IN (sqlprism.slice('ids'))", Engine::Sqlite).unwrap();
        assert_eq!(rw.sql, "SELECT * FROM t WHERE id IN (/*SLICE:ids*/?)");
        assert_eq!(rw.placeholders[0].number, 1);

        let rw = rewrite("SELECT * FROM t WHERE id IN (sqlprism.slice(ids))", Engine::Postgresql).unwrap();
        assert_eq!(rw.sql, "SELECT * FROM t WHERE id IN ($1)");
        assert_eq!(rw.params.get(1).unwrap().name, "ids");
        assert!(rw.params.is_slice(1));
    }

    #[test]
    fn nullability_precedence() {
        assert!(Nullability::INFERRED_NOT_NULL.not_null());
        assert!(!Nullability::NULLABLE.merge(Nullability::INFERRED_NOT_NULL).not_null());
        assert!(!Nullability::UNSPECIFIED.not_null());
    }
}
