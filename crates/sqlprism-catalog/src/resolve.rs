//! Function-call resolution
//!
//! A call matches a candidate when its argument count fits between the
//! candidate's required and total input arguments (a variadic tail accepts
//! any number of extra arguments) and every named argument names one of the
//! candidate's inputs. Argument types are not compared; the first matching
//! candidate in search-path order wins.

use sqlprism_core::{ErrorKind, FuncName, SqlError};
use sqlprism_sql::ast::{FuncCall, ParamMode};

use crate::catalog::{Catalog, Function};

impl Catalog {
    /// Find the function a call refers to
    pub fn resolve_func_call(&self, call: &FuncCall) -> Result<&Function, SqlError> {
        let candidates = self.list_funcs_by_name(&call.name)?;
        if candidates.is_empty() {
            return Err(ErrorKind::FunctionNotFound(call.name.to_string()).into());
        }

        let mut named: Vec<&str> = Vec::new();
        for arg in &call.args {
            match &arg.name {
                Some(name) => named.push(name),
                None if !named.is_empty() => {
                    return Err(SqlError::invalid(
                        "positional argument cannot follow named argument",
                    ))
                }
                None => {}
            }
        }

        let supplied = call.args.len();
        candidates
            .into_iter()
            .find(|f| accepts(f, supplied, &named))
            .ok_or_else(|| no_matching_function(&call.name, supplied))
    }
}

fn accepts(function: &Function, supplied: usize, named: &[&str]) -> bool {
    let inputs: Vec<_> = function.in_args().collect();
    let variadic = inputs.last().map_or(false, |a| a.mode == ParamMode::Variadic);
    let defaults = inputs.iter().filter(|a| a.has_default).count();

    let mut required = inputs.len() - defaults;
    if variadic && required > 0 {
        required -= 1;
    }
    if supplied < required || (supplied > inputs.len() && !variadic) {
        return false;
    }
    named
        .iter()
        .all(|name| inputs.iter().any(|a| a.name.eq_ignore_ascii_case(name)))
}

fn no_matching_function(name: &FuncName, supplied: usize) -> SqlError {
    let args = vec!["unknown"; supplied].join(", ");
    ErrorKind::NoMatchingFunction(format!("{}({})", name, args)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Argument, Function};
    use pretty_assertions::assert_eq;
    use sqlprism_core::{Engine, TypeName};
    use sqlprism_sql::ast::{Expr, FuncArg};

    fn catalog_with(funcs: Vec<Function>) -> Catalog {
        let mut catalog = Catalog::new(Engine::Postgresql);
        catalog.schemas[0].functions.extend(funcs);
        catalog
    }

    fn call(name: &str, positional: usize, named: &[&str]) -> FuncCall {
        let mut call = FuncCall::new(FuncName::new(name), vec![Expr::param(1); positional]);
        call.args.extend(named.iter().map(|n| FuncArg {
            name: Some(n.to_string()),
            value: Expr::param(2),
        }));
        call
    }

    fn text() -> TypeName {
        TypeName::new("text")
    }

    #[test]
    fn defaults_and_named_arguments() {
        let catalog = catalog_with(vec![Function::new(
            "greet",
            vec![Argument::new("who", text()), Argument::new("greeting", text()).with_default()],
            text(),
        )]);

        assert!(catalog.resolve_func_call(&call("greet", 1, &[])).is_ok());
        assert!(catalog.resolve_func_call(&call("greet", 2, &[])).is_ok());
        assert!(catalog.resolve_func_call(&call("greet", 1, &["greeting"])).is_ok());

        let err = catalog.resolve_func_call(&call("greet", 3, &[])).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::NoMatchingFunction("greet(unknown, unknown, unknown)".into())
        );

        let err = catalog.resolve_func_call(&call("greet", 1, &["tone"])).unwrap_err();
        assert_eq!(err.code(), "42883");
    }

    #[test]
    fn variadic_tail_accepts_extra_arguments() {
        let catalog = catalog_with(vec![Function::new(
            "pick",
            vec![Argument::new("idx", TypeName::new("integer")), Argument::new("vals", text()).variadic()],
            text(),
        )]);
        assert!(catalog.resolve_func_call(&call("pick", 1, &[])).is_ok());
        assert!(catalog.resolve_func_call(&call("pick", 5, &[])).is_ok());
        assert!(catalog.resolve_func_call(&call("pick", 0, &[])).is_err());
    }

    #[test]
    fn out_arguments_are_not_inputs() {
        let mut out = Argument::new("total", TypeName::new("integer"));
        out.mode = ParamMode::Out;
        let catalog = catalog_with(vec![Function::new(
            "stats",
            vec![Argument::new("id", TypeName::new("integer")), out],
            TypeName::new("record"),
        )]);
        assert!(catalog.resolve_func_call(&call("stats", 1, &[])).is_ok());
        assert!(catalog.resolve_func_call(&call("stats", 2, &[])).is_err());
    }

    #[test]
    fn unknown_function_and_argument_order() {
        let catalog = catalog_with(Vec::new());
        let err = catalog.resolve_func_call(&call("nope", 0, &[])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FunctionNotFound("nope".into()));

        let mut bad = call("lower", 0, &["x"]);
        bad.args.push(FuncArg {
            name: None,
            value: Expr::param(3),
        });
        assert!(catalog.resolve_func_call(&bad).is_err());
    }

    #[test]
    fn builtins_resolve_through_search_path() {
        let catalog = catalog_with(Vec::new());
        let f = catalog.resolve_func_call(&call("COUNT", 1, &[])).unwrap();
        assert!(!f.return_type_nullable);

        let mut star = call("count", 0, &[]);
        star.star = true;
        assert!(catalog.resolve_func_call(&star).is_ok());
    }
}
