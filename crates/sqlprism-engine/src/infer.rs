//! Type rules for literals and operators

use sqlprism_core::{Column, Engine};
use sqlprism_sql::ast::Const;

/// Result type of an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpClass {
    Comparison,
    Arithmetic,
    Bitwise,
    Concat,
    JsonValue,
    JsonText,
    Other,
}

pub(crate) fn classify(op: &str) -> OpClass {
    match op.to_ascii_uppercase().as_str() {
        "=" | "<>" | "!=" | "<" | ">" | "<=" | ">=" | "<=>" | "LIKE" | "NOT LIKE" | "ILIKE" | "NOT ILIKE"
        | "SIMILAR TO" | "NOT SIMILAR TO" | "IS DISTINCT FROM" | "IS NOT DISTINCT FROM" | "~" | "~*" | "!~"
        | "!~*" | "@>" | "<@" | "&&" | "?" | "?|" | "?&" | "REGEXP" | "RLIKE" | "XOR" | "@@" => {
            OpClass::Comparison
        }
        "+" | "-" | "*" | "/" | "%" | "DIV" | "MOD" => OpClass::Arithmetic,
        "&" | "|" | "^" | "<<" | ">>" | "#" => OpClass::Bitwise,
        "||" => OpClass::Concat,
        "->" | "#>" => OpClass::JsonValue,
        "->>" | "#>>" => OpClass::JsonText,
        _ => OpClass::Other,
    }
}

pub(crate) fn boolean_type(_engine: Engine) -> &'static str {
    "boolean"
}

pub(crate) fn integer_type(engine: Engine) -> &'static str {
    match engine {
        Engine::Mysql => "int",
        Engine::Postgresql | Engine::Sqlite => "integer",
    }
}

fn decimal_type(engine: Engine) -> &'static str {
    match engine {
        Engine::Postgresql | Engine::Sqlite => "numeric",
        Engine::Mysql => "decimal",
    }
}

fn float_type(engine: Engine) -> &'static str {
    match engine {
        Engine::Postgresql => "numeric",
        Engine::Mysql => "decimal",
        Engine::Sqlite => "real",
    }
}

/// Column for a literal; only `NULL` is nullable
pub(crate) fn literal(engine: Engine, value: &Const) -> Column {
    let (data_type, not_null) = match value {
        Const::String(_) => ("text", true),
        Const::Integer(_) => (integer_type(engine), true),
        Const::Float(_) => (float_type(engine), true),
        Const::Boolean(_) => (boolean_type(engine), true),
        Const::Null => ("any", false),
    };
    Column::new("", data_type).with_not_null(not_null)
}

/// Numeric family of a type, ordered integer < decimal < float
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Numeric {
    Integer(u8),
    Decimal,
    Float(u8),
}

fn numeric(data_type: &str) -> Option<Numeric> {
    let class = match data_type {
        "tinyint" | "smallint" | "int2" | "smallserial" => Numeric::Integer(1),
        "int" | "integer" | "int4" | "mediumint" | "serial" => Numeric::Integer(2),
        "bigint" | "int8" | "bigserial" => Numeric::Integer(3),
        "numeric" | "decimal" | "dec" | "fixed" => Numeric::Decimal,
        "real" | "float" | "float4" => Numeric::Float(1),
        "double" | "double precision" | "float8" => Numeric::Float(2),
        _ => return None,
    };
    Some(class)
}

fn is_temporal(data_type: &str) -> bool {
    matches!(
        data_type,
        "date" | "time" | "timetz" | "timestamp" | "timestamptz" | "datetime" | "interval"
    )
}

enum Operand<'a> {
    Numeric(&'a str, Numeric),
    /// `any`; takes the type of the other operand
    Unknown,
    Other,
}

fn operand(column: &Column) -> Operand<'_> {
    if column.is_any() {
        return Operand::Unknown;
    }
    match numeric(&column.data_type) {
        Some(family) => Operand::Numeric(&column.data_type, family),
        None => Operand::Other,
    }
}

/// Result type of an arithmetic operator, or `None` when it cannot be told
///
/// Division never yields an integer; modulo is an integer only when both
/// operands are; the other operators take the wider of integer, decimal
/// and float. An operand of unknown type defers to the other one.
fn arithmetic_type(engine: Engine, op: &str, left: &Column, right: &Column) -> Option<String> {
    let (l, r) = (left.data_type.as_str(), right.data_type.as_str());
    if is_temporal(l) || is_temporal(r) {
        let result = match (op, l, r) {
            ("-", "timestamp" | "timestamptz", "timestamp" | "timestamptz") => "interval",
            ("-", "date", "date") => integer_type(engine),
            _ if is_temporal(l) => l,
            _ => r,
        };
        return Some(result.to_string());
    }

    let (left, right) = match (operand(left), operand(right)) {
        (Operand::Numeric(a, fa), Operand::Numeric(b, fb)) => ((a, fa), (b, fb)),
        (Operand::Numeric(a, fa), Operand::Unknown) | (Operand::Unknown, Operand::Numeric(a, fa)) => {
            ((a, fa), (a, fa))
        }
        (Operand::Unknown, Operand::Unknown) => return None,
        (Operand::Other, _) | (_, Operand::Other) => match op.to_ascii_uppercase().as_str() {
            "%" | "MOD" => return Some(decimal_type(engine).to_string()),
            _ => return None,
        },
    };
    let (widest, family) = if right.1 > left.1 { right } else { left };

    let result = match op.to_ascii_uppercase().as_str() {
        "/" | "DIV" => match family {
            Numeric::Float(_) => widest,
            Numeric::Integer(_) | Numeric::Decimal => decimal_type(engine),
        },
        "%" | "MOD" => match (left.1, right.1) {
            (Numeric::Integer(_), Numeric::Integer(_)) => widest,
            _ => decimal_type(engine),
        },
        _ => match family {
            Numeric::Decimal => decimal_type(engine),
            Numeric::Integer(_) | Numeric::Float(_) => widest,
        },
    };
    Some(result.to_string())
}

/// Column produced by `left op right`
pub(crate) fn binary(engine: Engine, op: &str, left: &Column, right: &Column) -> Column {
    let not_null = left.not_null && right.not_null;
    match classify(op) {
        OpClass::Comparison => Column::new("", boolean_type(engine)).with_not_null(true),
        OpClass::Arithmetic => match arithmetic_type(engine, op, left, right) {
            Some(data_type) => Column::new("", data_type).with_not_null(not_null),
            None => Column::any(""),
        },
        OpClass::Bitwise => Column::new("", integer_type(engine)).with_not_null(not_null),
        OpClass::Concat => Column::new("", "text").with_not_null(not_null),
        OpClass::JsonValue => {
            let data_type = if left.is_any() { "jsonb" } else { left.data_type.as_str() };
            Column::new("", data_type)
        }
        OpClass::JsonText => Column::new("", "text"),
        OpClass::Other => Column::any(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn col(data_type: &str, not_null: bool) -> Column {
        Column::new("c", data_type).with_not_null(not_null)
    }

    #[test]
    fn literals() {
        assert_eq!(literal(Engine::Postgresql, &Const::Integer(1)).data_type, "integer");
        assert_eq!(literal(Engine::Mysql, &Const::Integer(1)).data_type, "int");
        assert!(literal(Engine::Sqlite, &Const::String("x".into())).not_null);
        assert!(!literal(Engine::Postgresql, &Const::Null).not_null);
    }

    #[test]
    fn comparison_is_boolean() {
        let out = binary(Engine::Postgresql, "=", &col("text", false), &col("text", true));
        assert_eq!(out.data_type, "boolean");
        assert!(out.not_null);
    }

    #[test]
    fn mysql_promotion() {
        let int = col("int", true);
        let dec = col("decimal", true);
        let dbl = col("double", false);
        assert_eq!(binary(Engine::Mysql, "+", &int, &int).data_type, "int");
        assert_eq!(binary(Engine::Mysql, "+", &int, &dec).data_type, "decimal");
        assert_eq!(binary(Engine::Mysql, "/", &int, &int).data_type, "decimal");
        assert_eq!(binary(Engine::Mysql, "/", &int, &dbl).data_type, "double");
        assert_eq!(binary(Engine::Mysql, "%", &int, &dec).data_type, "decimal");
        assert_eq!(binary(Engine::Mysql, "&", &dec, &dec).data_type, "int");
        assert!(!binary(Engine::Mysql, "*", &int, &dbl).not_null);
    }

    #[test]
    fn postgres_arithmetic_keeps_widest() {
        let out = binary(Engine::Postgresql, "*", &col("numeric", true), &col("integer", true));
        assert_eq!(out.data_type, "numeric");
        assert!(out.not_null);

        let out = binary(Engine::Postgresql, "-", &col("timestamp", true), &col("timestamp", true));
        assert_eq!(out.data_type, "interval");
        assert_eq!(binary(Engine::Postgresql, "||", &col("text", true), &col("text", true)).data_type, "text");
    }

    #[test]
    fn division_never_yields_an_integer() {
        let out = binary(Engine::Postgresql, "/", &col("integer", true), &col("bigint", true));
        assert_eq!(out.data_type, "numeric");
        assert!(out.not_null);
        assert_eq!(binary(Engine::Sqlite, "/", &col("integer", true), &col("integer", true)).data_type, "numeric");
        assert_eq!(binary(Engine::Mysql, "DIV", &col("int", true), &col("bigint", true)).data_type, "decimal");
        assert_eq!(binary(Engine::Sqlite, "/", &col("integer", true), &col("real", true)).data_type, "real");
    }

    #[test]
    fn modulo_is_integer_only_for_integers() {
        assert_eq!(binary(Engine::Mysql, "%", &col("int", true), &col("bigint", true)).data_type, "bigint");
        assert_eq!(binary(Engine::Mysql, "MOD", &col("int", true), &col("double", true)).data_type, "decimal");
        assert_eq!(binary(Engine::Mysql, "%", &col("int", true), &col("varchar", true)).data_type, "decimal");
        assert_eq!(binary(Engine::Postgresql, "%", &col("integer", true), &col("numeric", true)).data_type, "numeric");
    }

    #[test]
    fn unknown_operands_stay_unknown() {
        let out = binary(Engine::Postgresql, "+", &Column::any("a"), &Column::any("b"));
        assert!(out.is_any());
        assert!(binary(Engine::Sqlite, "*", &col("text", true), &col("integer", true)).is_any());

        let out = binary(Engine::Postgresql, "+", &Column::any("a"), &col("bigint", true));
        assert_eq!(out.data_type, "bigint");
        assert!(!out.not_null);
    }

    #[test]
    fn float_wins_over_decimal() {
        let out = binary(Engine::Postgresql, "+", &col("numeric", true), &col("double precision", false));
        assert_eq!(out.data_type, "double precision");
        assert!(!out.not_null);
        assert_eq!(binary(Engine::Mysql, "-", &col("float", true), &col("double", true)).data_type, "double");
    }
}
