//! eduql: an educational relational database query execution core.
//!
//! Accepts a parsed SQL statement (the lexer/parser itself is an external
//! collaborator, per §6 of the design — see [`ast`]) and carries it through
//! five tightly coupled stages: [`value`]/[`meta`] (the type system and
//! on-disk schema), [`binder`]/[`statement`] (name resolution and view
//! expansion), [`logical`]/[`rewrite`] (statement-to-plan and predicate
//! pushdown), [`physical`] (access-method selection), and the `op_*`
//! modules (the pull-based operator pipeline). [`db`] ties the stages
//! together into a single `Database::execute` entry point.
//!
//! Storage idioms — `Rc`/`RefCell` ownership, a [`stg::Storage`] trait with
//! a `SimpleFileStorage` impl, `parking_lot` for the few places shared
//! mutable state is unavoidable, `serde`-backed persisted metadata — are
//! carried over from the embedded engine this crate is grounded on.

pub(crate) use parking_lot::Mutex;
pub(crate) use rustc_hash::FxHashMap as HashMap;
pub(crate) use std::cell::RefCell;
pub(crate) use std::rc::Rc;

pub mod rc;
pub mod util;
pub mod value;
pub mod meta;
pub mod record;
pub mod tuple;
pub mod expr;

pub mod stg;
pub mod pager;
pub mod blobstore;
pub mod heapfile;
pub mod bplus;
#[cfg(feature = "vector-index")]
pub mod vector_index;
pub mod table;
pub mod trx;

pub mod ast;
pub mod binder;
pub mod view;
pub mod statement;
pub mod logical;
pub mod rewrite;
pub mod physical;

pub mod operator;
pub mod op_scan;
pub mod op_predicate;
pub mod op_join;
pub mod op_groupby;
pub mod op_orderby;
pub mod op_project;
pub mod op_dml;
pub mod op_explain;
pub mod op_calc;

pub mod catalog;
pub mod db;

pub use rc::{Result, RC};
