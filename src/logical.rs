//! Logical plan shape (§4.4): the operator tree [`crate::statement`] builds
//! out of a bound query, before [`crate::rewrite`] pushes predicates down
//! and [`crate::physical`] picks access methods and operator
//! implementations. Every node here is shape only — no file or index is
//! touched until `physical::build` runs.

use crate::expr::{AggKind, Expr};
use crate::table::Table;
use rustc_hash::FxHashMap as HashMap;
use std::rc::Rc;

pub struct GroupKey {
    pub expr: Expr,
}

pub struct AggTarget {
    pub kind: AggKind,
    pub expr: Option<Expr>,
}

pub struct OrderKey {
    pub expr: Expr,
    pub desc: bool,
}

/// `(base table name, field index, expr)` — one `SET` assignment scoped to
/// the base table it ultimately writes, used by both plain `UPDATE` (one
/// table) and updatable-view `UPDATE` (one assignment per affected base
/// table, though this engine only ever produces one per statement).
pub struct Assignment {
    pub field_index: usize,
    pub expr: Expr,
}

pub enum LogicalOp {
    /// A base-table leaf. `filters` starts empty and is populated in place
    /// by the predicate-pushdown rewrite. `no_index` forces a `TableScan`
    /// even when an equality filter would otherwise select an `IndexScan`
    /// — `UPDATE`'s target table sets this, so a B+tree scan never walks
    /// a key range this statement is concurrently rewriting.
    TableGet { table: Rc<Table>, alias: Option<String>, filters: Vec<Expr>, no_index: bool },
    Predicate { child: Box<LogicalOp>, cond: Expr },
    Project { child: Box<LogicalOp>, items: Vec<(Expr, String)>, limit: Option<usize> },
    /// Left-deep nested-loop join; join conditions live in the enclosing
    /// `Predicate`, not here.
    Join { left: Box<LogicalOp>, right: Box<LogicalOp> },
    GroupBy { child: Box<LogicalOp>, keys: Vec<GroupKey>, aggs: Vec<AggTarget> },
    OrderBy { child: Box<LogicalOp>, keys: Vec<OrderKey> },
    Insert { table: Rc<Table>, rows: Vec<Vec<Expr>> },
    Delete { child: Box<LogicalOp>, table: Rc<Table> },
    Update { child: Box<LogicalOp>, table: Rc<Table>, assignments: Vec<Assignment> },
    /// Routes writes across an updatable view's base tables by the
    /// per-cell provenance each row's `child` tuple carries.
    ViewUpdate { child: Box<LogicalOp>, base_tables: HashMap<String, Rc<Table>>, assignments: Vec<(String, usize, Expr)> },
    Explain { child: Box<LogicalOp> },
    Calc { exprs: Vec<Expr> },
}

impl LogicalOp {
    /// Fold a non-empty list of relation subtrees into a left-deep join
    /// tree, the shape every multi-relation FROM clause takes.
    pub fn join_all(mut relations: Vec<LogicalOp>) -> LogicalOp {
        let mut iter = relations.drain(..);
        let mut tree = iter.next().expect("at least one relation");
        for next in iter {
            tree = LogicalOp::Join { left: Box::new(tree), right: Box::new(next) };
        }
        tree
    }
}
