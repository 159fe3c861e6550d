//! Builtin functions per engine
//!
//! Signatures are written as compact strings: an argument prefixed with
//! `?` has a default, one prefixed with `...` is variadic. A return type of
//! `anyelement` means "the type of the first argument"; the engine resolves
//! it at the call site.

use sqlprism_core::{Engine, TypeName};

use crate::catalog::{Argument, Catalog, Function, Schema};

/// Schema holding PostgreSQL builtins
pub const PG_CATALOG: &str = "pg_catalog";

/// Polymorphic return type resolved from the first argument
pub const ANY_ELEMENT: &str = "anyelement";

struct Builtin {
    name: &'static str,
    args: &'static [&'static str],
    returns: &'static str,
    not_null: bool,
    set: bool,
}

const fn f(name: &'static str, args: &'static [&'static str], returns: &'static str) -> Builtin {
    Builtin {
        name,
        args,
        returns,
        not_null: false,
        set: false,
    }
}

const fn nn(name: &'static str, args: &'static [&'static str], returns: &'static str) -> Builtin {
    Builtin {
        name,
        args,
        returns,
        not_null: true,
        set: false,
    }
}

const fn set(name: &'static str, args: &'static [&'static str], returns: &'static str) -> Builtin {
    Builtin {
        name,
        args,
        returns,
        not_null: true,
        set: true,
    }
}

const POSTGRES: &[Builtin] = &[
    nn("count", &[], "bigint"),
    nn("count", &["any"], "bigint"),
    f("sum", &["any"], "numeric"),
    f("avg", &["any"], "numeric"),
    f("min", &["anyelement"], ANY_ELEMENT),
    f("max", &["anyelement"], ANY_ELEMENT),
    f("array_agg", &["anyelement"], "anyarray"),
    f("string_agg", &["text", "text"], "text"),
    f("bool_and", &["boolean"], "boolean"),
    f("bool_or", &["boolean"], "boolean"),
    f("json_agg", &["anyelement"], "json"),
    f("jsonb_agg", &["anyelement"], "jsonb"),
    nn("now", &[], "timestamptz"),
    nn("random", &[], "double precision"),
    nn("gen_random_uuid", &[], "uuid"),
    f("lower", &["text"], "text"),
    f("upper", &["text"], "text"),
    f("length", &["text"], "integer"),
    f("char_length", &["text"], "integer"),
    nn("concat", &["...any"], "text"),
    f("concat_ws", &["text", "...any"], "text"),
    f("substring", &["text", "integer", "?integer"], "text"),
    f("substr", &["text", "integer", "?integer"], "text"),
    f("position", &["text", "text"], "integer"),
    f("replace", &["text", "text", "text"], "text"),
    f("split_part", &["text", "text", "integer"], "text"),
    f("trim", &["text", "?text"], "text"),
    f("left", &["text", "integer"], "text"),
    f("right", &["text", "integer"], "text"),
    f("md5", &["text"], "text"),
    f("abs", &["anyelement"], ANY_ELEMENT),
    f("round", &["numeric", "?integer"], "numeric"),
    f("floor", &["numeric"], "numeric"),
    f("ceil", &["numeric"], "numeric"),
    f("nullif", &["anyelement", "anyelement"], ANY_ELEMENT),
    f("greatest", &["...anyelement"], ANY_ELEMENT),
    f("least", &["...anyelement"], ANY_ELEMENT),
    f("date_trunc", &["text", "timestamp"], "timestamp"),
    f("date_part", &["text", "timestamp"], "double precision"),
    f("age", &["timestamp", "?timestamp"], "interval"),
    f("to_char", &["any", "text"], "text"),
    f("to_timestamp", &["double precision"], "timestamptz"),
    f("array_length", &["anyarray", "integer"], "integer"),
    f("cardinality", &["anyarray"], "integer"),
    f("array_append", &["anyarray", "anyelement"], "anyarray"),
    f("json_build_object", &["...any"], "json"),
    f("jsonb_build_object", &["...any"], "jsonb"),
    f("to_json", &["anyelement"], "json"),
    f("to_jsonb", &["anyelement"], "jsonb"),
    nn("row_number", &[], "bigint"),
    nn("rank", &[], "bigint"),
    nn("dense_rank", &[], "bigint"),
    f("lag", &["anyelement", "?integer", "?anyelement"], ANY_ELEMENT),
    f("lead", &["anyelement", "?integer", "?anyelement"], ANY_ELEMENT),
    f("first_value", &["anyelement"], ANY_ELEMENT),
    f("last_value", &["anyelement"], ANY_ELEMENT),
    set("generate_series", &["integer", "integer", "?integer"], "integer"),
    set("unnest", &["anyarray"], ANY_ELEMENT),
];

const MYSQL: &[Builtin] = &[
    nn("count", &[], "bigint"),
    nn("count", &["any"], "bigint"),
    f("sum", &["any"], "decimal"),
    f("avg", &["any"], "decimal"),
    f("min", &["any"], ANY_ELEMENT),
    f("max", &["any"], ANY_ELEMENT),
    f("group_concat", &["...any"], "text"),
    nn("now", &[], "datetime"),
    nn("current_timestamp", &[], "datetime"),
    nn("utc_timestamp", &[], "datetime"),
    nn("uuid", &[], "char"),
    nn("rand", &["?bigint"], "double"),
    nn("last_insert_id", &[], "bigint"),
    f("lower", &["text"], "text"),
    f("upper", &["text"], "text"),
    f("length", &["text"], "int"),
    f("char_length", &["text"], "int"),
    f("concat", &["...any"], "text"),
    f("concat_ws", &["text", "...any"], "text"),
    f("substring", &["text", "int", "?int"], "text"),
    f("replace", &["text", "text", "text"], "text"),
    f("ifnull", &["any", "any"], ANY_ELEMENT),
    f("nullif", &["any", "any"], ANY_ELEMENT),
    f("abs", &["any"], ANY_ELEMENT),
    f("round", &["decimal", "?int"], "decimal"),
    f("floor", &["decimal"], "bigint"),
    f("ceil", &["decimal"], "bigint"),
    f("greatest", &["...any"], ANY_ELEMENT),
    f("least", &["...any"], ANY_ELEMENT),
    f("date_format", &["datetime", "text"], "text"),
    f("unix_timestamp", &["?datetime"], "bigint"),
    f("from_unixtime", &["bigint"], "datetime"),
    f("json_extract", &["json", "...text"], "json"),
    f("json_object", &["...any"], "json"),
    nn("row_number", &[], "bigint"),
    nn("rank", &[], "bigint"),
    nn("dense_rank", &[], "bigint"),
];

const SQLITE: &[Builtin] = &[
    nn("count", &[], "integer"),
    nn("count", &["any"], "integer"),
    f("sum", &["any"], "real"),
    nn("total", &["any"], "real"),
    f("avg", &["any"], "real"),
    f("min", &["...any"], ANY_ELEMENT),
    f("max", &["...any"], ANY_ELEMENT),
    f("group_concat", &["any", "?text"], "text"),
    f("lower", &["text"], "text"),
    f("upper", &["text"], "text"),
    f("length", &["any"], "integer"),
    f("substr", &["text", "integer", "?integer"], "text"),
    f("substring", &["text", "integer", "?integer"], "text"),
    f("replace", &["text", "text", "text"], "text"),
    f("trim", &["text", "?text"], "text"),
    f("instr", &["text", "text"], "integer"),
    f("ifnull", &["any", "any"], ANY_ELEMENT),
    f("nullif", &["any", "any"], ANY_ELEMENT),
    f("abs", &["any"], ANY_ELEMENT),
    f("round", &["real", "?integer"], "real"),
    nn("typeof", &["any"], "text"),
    nn("random", &[], "integer"),
    nn("last_insert_rowid", &[], "integer"),
    nn("changes", &[], "integer"),
    f("date", &["any", "...text"], "text"),
    f("time", &["any", "...text"], "text"),
    f("datetime", &["any", "...text"], "text"),
    f("julianday", &["any", "...text"], "real"),
    f("strftime", &["text", "any", "...text"], "text"),
    nn("unixepoch", &["?any"], "integer"),
    f("json_extract", &["text", "...text"], "any"),
    f("json_object", &["...any"], "text"),
    nn("row_number", &[], "integer"),
    nn("rank", &[], "integer"),
    nn("dense_rank", &[], "integer"),
];

fn to_function(builtin: &Builtin) -> Function {
    let args = builtin
        .args
        .iter()
        .map(|spec| {
            if let Some(ty) = spec.strip_prefix('?') {
                Argument::new("", TypeName::new(ty)).with_default()
            } else if let Some(ty) = spec.strip_prefix("...") {
                Argument::new("", TypeName::new(ty)).variadic()
            } else {
                Argument::new("", TypeName::new(*spec))
            }
        })
        .collect();
    let mut function = Function::new(builtin.name, args, TypeName::new(builtin.returns));
    function.return_type_nullable = !builtin.not_null;
    function.returns_set = builtin.set;
    function
}

/// Builtin functions of an engine
pub fn functions(engine: Engine) -> Vec<Function> {
    let table = match engine {
        Engine::Postgresql => POSTGRES,
        Engine::Mysql => MYSQL,
        Engine::Sqlite => SQLITE,
    };
    table.iter().map(to_function).collect()
}

/// Add an engine's builtins to a fresh catalog
///
/// PostgreSQL builtins live in `pg_catalog`, which goes first on the search
/// path; other engines keep them in the default schema.
pub(crate) fn install(catalog: &mut Catalog) {
    let functions = functions(catalog.engine);
    match catalog.engine {
        Engine::Postgresql => {
            let mut schema = Schema::new(PG_CATALOG);
            schema.functions = functions;
            catalog.schemas.push(schema);
            catalog.search_path = vec![PG_CATALOG.to_string()];
        }
        Engine::Mysql | Engine::Sqlite => {
            if let Some(schema) = catalog.schemas.iter_mut().find(|s| s.name == catalog.default_schema) {
                schema.functions.extend(functions);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlprism_sql::ast::ParamMode;

    #[test]
    fn signature_markers() {
        let funcs = functions(Engine::Postgresql);
        let concat = funcs.iter().find(|f| f.name == "concat").unwrap();
        assert_eq!(concat.args[0].mode, ParamMode::Variadic);
        assert!(!concat.return_type_nullable);

        let round = funcs.iter().find(|f| f.name == "round").unwrap();
        assert!(round.args[1].has_default);

        let series = funcs.iter().find(|f| f.name == "generate_series").unwrap();
        assert!(series.returns_set);
    }

    #[test]
    fn every_engine_counts() {
        for engine in [Engine::Postgresql, Engine::Mysql, Engine::Sqlite] {
            let catalog = Catalog::new(engine);
            let count = catalog
                .list_funcs_by_name(&sqlprism_core::FuncName::new("count"))
                .unwrap();
            assert_eq!(count.len(), 2, "{:?}", engine);
        }
    }
}
