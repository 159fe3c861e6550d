//! Extension loaders
//!
//! `CREATE EXTENSION` only changes the catalog when a loader knows the
//! extension. The loader hands back the functions to merge into the
//! default schema.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlprism_catalog::{ExtensionLoader, StaticLoader, Function};
//!
//! let loader = StaticLoader::new()
//!     .with_extension("hstore", vec![/* functions */]);
//! assert!(loader.load("hstore").is_some());
//! ```

use std::collections::HashMap;

use sqlprism_core::TypeName;

use crate::catalog::{Argument, Function};

/// Source of function definitions for named extensions
pub trait ExtensionLoader: Send + Sync {
    /// Functions defined by `name`, or `None` if the extension is unknown
    fn load(&self, name: &str) -> Option<Vec<Function>>;

    /// Loader name for logs
    fn name(&self) -> &str;
}

/// Loader for a handful of common PostgreSQL contrib extensions
#[derive(Debug, Clone, Copy, Default)]
pub struct ContribLoader;

fn arg(ty: &str) -> Argument {
    Argument::new("", TypeName::new(ty))
}

fn func(name: &str, args: &[&str], returns: &str) -> Function {
    Function::new(name, args.iter().map(|a| arg(a)).collect(), TypeName::new(returns))
}

impl ExtensionLoader for ContribLoader {
    fn load(&self, name: &str) -> Option<Vec<Function>> {
        let functions = match name {
            "pgcrypto" => vec![
                func("crypt", &["text", "text"], "text"),
                func("gen_salt", &["text"], "text"),
                func("gen_salt", &["text", "integer"], "text"),
                func("digest", &["text", "text"], "bytea"),
                func("digest", &["bytea", "text"], "bytea"),
                func("hmac", &["text", "text", "text"], "bytea"),
                func("gen_random_bytes", &["integer"], "bytea"),
                func("pgp_sym_encrypt", &["text", "text"], "bytea"),
                func("pgp_sym_decrypt", &["bytea", "text"], "text"),
            ],
            "uuid-ossp" => vec![
                func("uuid_generate_v1", &[], "uuid").with_not_null(),
                func("uuid_generate_v1mc", &[], "uuid").with_not_null(),
                func("uuid_generate_v4", &[], "uuid").with_not_null(),
                func("uuid_nil", &[], "uuid").with_not_null(),
            ],
            "citext" => vec![
                func("citext", &["text"], "citext"),
                func("regexp_replace", &["citext", "citext", "text"], "text"),
                func("strpos", &["citext", "citext"], "integer"),
            ],
            _ => return None,
        };
        Some(functions)
    }

    fn name(&self) -> &str {
        "contrib"
    }
}

/// In-memory loader with definitions registered up front
///
/// ```rust,ignore
/// let loader = StaticLoader::new().with_extension("ltree", functions);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    extensions: HashMap<String, Vec<Function>>,

    /// Consulted for names this loader does not know
    fallback: Option<ContribLoader>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension's functions
    pub fn with_extension(mut self, name: impl Into<String>, functions: Vec<Function>) -> Self {
        self.extensions.insert(name.into(), functions);
        self
    }

    /// Fall back to the contrib definitions for unregistered names
    pub fn with_contrib(mut self) -> Self {
        self.fallback = Some(ContribLoader);
        self
    }

    pub fn add_extension(&mut self, name: impl Into<String>, functions: Vec<Function>) {
        self.extensions.insert(name.into(), functions);
    }
}

impl ExtensionLoader for StaticLoader {
    fn load(&self, name: &str) -> Option<Vec<Function>> {
        match self.extensions.get(name) {
            Some(functions) => Some(functions.clone()),
            None => self.fallback.as_ref().and_then(|f| f.load(name)),
        }
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contrib_knows_common_extensions() {
        let loader = ContribLoader;
        let uuid = loader.load("uuid-ossp").unwrap();
        assert!(uuid.iter().any(|f| f.name == "uuid_generate_v4" && !f.return_type_nullable));
        assert!(loader.load("pgcrypto").is_some());
        assert!(loader.load("postgis").is_none());
    }

    #[test]
    fn static_loader_with_fallback() {
        let loader = StaticLoader::new().with_extension("ltree", vec![func("nlevel", &["ltree"], "integer")]);
        assert_eq!(loader.load("ltree").map(|f| f.len()), Some(1));
        assert!(loader.load("citext").is_none());

        let loader = loader.with_contrib();
        assert!(loader.load("citext").is_some());
    }
}
