//! Schema catalog for static SQL analysis
//!
//! This crate holds the in-memory model of a package's schema and the rules
//! for changing it as DDL is folded in file order:
//!
//! - [`Catalog`] / [`Schema`] / [`Table`] / [`Type`] / [`Function`] - the model
//! - [`Catalog::update`] - apply one parsed statement
//! - [`Catalog::resolve_func_call`] - pick the function a call refers to
//! - [`ExtensionLoader`] - supplies definitions for `CREATE EXTENSION`
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlprism_catalog::{Catalog, ContribLoader};
//! use sqlprism_core::Engine;
//!
//! let mut catalog = Catalog::new(Engine::Postgresql);
//! for raw in &parsed.statements {
//!     catalog.update(&raw.stmt, &generator, &ContribLoader)?;
//! }
//! ```

pub mod builtins;
pub mod catalog;
pub mod extension;
pub mod fold;
pub mod resolve;

pub use builtins::{ANY_ELEMENT, PG_CATALOG};
pub use catalog::{Argument, Catalog, Column, CompositeType, Enum, Function, Schema, Table, Type};
pub use extension::{ContribLoader, ExtensionLoader, StaticLoader};
pub use fold::ColumnGenerator;
