//! sqlprism engine - query analysis
//!
//! This crate turns parsed queries into typed results against a catalog:
//! - Resolving FROM scopes, CTEs and joins into visible tables
//! - Output columns with types and nullability
//! - Parameter types, names and nullability
//! - Star expansion into explicit column lists
//! - Reference and function checks
//! - Compiling whole packages, concurrently when asked

mod analyze;
pub mod compiler;
mod expand;
mod infer;
mod output;
mod params;
pub mod pool;
mod scope;
#[cfg(test)]
pub(crate) mod testing;
mod validate;

pub use analyze::{Analysis, AnalysisMode, Analyzer};
pub use compiler::{Compiler, PackageResult, SourceFile};
pub use pool::{build_report, compile_packages, Cancellation, PackageInput, PackageOutcome};
pub use scope::{QueryCatalog, Scope, Table};
