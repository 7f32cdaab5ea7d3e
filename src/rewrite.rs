//! Predicate-pushdown rewrite: migrates a `Predicate`'s AND-leaves onto the
//! `TableGet` leaf they exclusively reference, so the physical planner sees
//! them as candidates for an index bound or a scan-local residual filter
//! instead of a post-join row-by-row check. An `OR` leaf only moves as a
//! whole, and only when every disjunct names the same single table —
//! [`Expr::references_only`] already encodes that "all or nothing" rule,
//! so the leaf-level test here applies uniformly to AND and OR leaves.

use crate::expr::{ConjType, Expr};
use crate::logical::LogicalOp;

/// Apply the rule once. A single top-down pass is a fixed point here: each
/// `Predicate` only ever sits directly above the join tree it filters (a
/// second `Predicate` above `GroupBy`, for `HAVING`, has no `TableGet`
/// beneath it to push into), so there is no benefit a second pass would add.
pub fn push_down_predicates(op: LogicalOp) -> LogicalOp {
    match op {
        LogicalOp::Predicate { child, cond } => {
            let mut child = push_down_predicates(*child);
            let leaves = match cond {
                Expr::Conjunction(ConjType::And, children) => children,
                other => vec![other],
            };
            let mut remaining = Vec::new();
            for leaf in leaves {
                if !try_push(&mut child, &leaf) {
                    remaining.push(leaf);
                }
            }
            if remaining.is_empty() {
                child
            } else {
                let cond = if remaining.len() == 1 { remaining.into_iter().next().unwrap() } else { Expr::Conjunction(ConjType::And, remaining) };
                LogicalOp::Predicate { child: Box::new(child), cond }
            }
        }
        LogicalOp::Join { left, right } => {
            LogicalOp::Join { left: Box::new(push_down_predicates(*left)), right: Box::new(push_down_predicates(*right)) }
        }
        LogicalOp::Project { child, items, limit } => LogicalOp::Project { child: Box::new(push_down_predicates(*child)), items, limit },
        LogicalOp::GroupBy { child, keys, aggs } => LogicalOp::GroupBy { child: Box::new(push_down_predicates(*child)), keys, aggs },
        LogicalOp::OrderBy { child, keys } => LogicalOp::OrderBy { child: Box::new(push_down_predicates(*child)), keys },
        LogicalOp::Delete { child, table } => LogicalOp::Delete { child: Box::new(push_down_predicates(*child)), table },
        LogicalOp::Update { child, table, assignments } => {
            LogicalOp::Update { child: Box::new(push_down_predicates(*child)), table, assignments }
        }
        LogicalOp::ViewUpdate { child, base_tables, assignments } => {
            LogicalOp::ViewUpdate { child: Box::new(push_down_predicates(*child)), base_tables, assignments }
        }
        LogicalOp::Explain { child } => LogicalOp::Explain { child: Box::new(push_down_predicates(*child)) },
        other @ (LogicalOp::TableGet { .. } | LogicalOp::Insert { .. } | LogicalOp::Calc { .. }) => other,
    }
}

/// Try to migrate `leaf` onto a `TableGet` it exclusively references,
/// descending through `Join` nodes. Returns whether it found a home.
fn try_push(op: &mut LogicalOp, leaf: &Expr) -> bool {
    match op {
        LogicalOp::TableGet { table, alias, filters, .. } => {
            let name = alias.as_deref().unwrap_or(table.meta().name.as_str());
            if leaf.references_only(name) {
                filters.push(leaf.clone());
                true
            } else {
                false
            }
        }
        LogicalOp::Join { left, right } => try_push(left, leaf) || try_push(right, leaf),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::CmpOp;
    use crate::meta::{FieldMeta, SYS_HEADER_LEN, TableMeta};
    use crate::tuple::TupleCellSpec;
    use crate::value::{AttrType, Value};
    use std::rc::Rc;
    use tempfile::tempdir;

    fn table(name: &str) -> Rc<Table> {
        let dir = tempdir().unwrap();
        let fields = vec![FieldMeta::new("a", AttrType::Ints, SYS_HEADER_LEN + 1, 4, 0, false, name)];
        let meta = TableMeta::new(1, name, fields);
        Rc::new(crate::table::Table::open(dir.path(), meta).unwrap())
    }

    use crate::table::Table;

    fn field_expr(t: &str, name: &str) -> Expr {
        let fm = Rc::new(FieldMeta::new(name, AttrType::Ints, SYS_HEADER_LEN + 1, 4, 0, false, t));
        Expr::Field(fm, TupleCellSpec { table_name: Some(t.to_string()), field_name: name.to_string(), alias: None, table_alias: None })
    }

    #[test]
    fn single_table_leaf_moves_onto_table_get() {
        let t = table("t");
        let cond = Expr::Comparison(CmpOp::Eq, Box::new(field_expr("t", "a")), Some(Box::new(Expr::Value(Value::Int(1)))));
        let plan = LogicalOp::Predicate {
            child: Box::new(LogicalOp::TableGet { table: t, alias: None, filters: Vec::new(), no_index: false }),
            cond,
        };
        let rewritten = push_down_predicates(plan);
        match rewritten {
            LogicalOp::TableGet { filters, .. } => assert_eq!(filters.len(), 1),
            _ => panic!("predicate should have collapsed away"),
        }
    }

    #[test]
    fn cross_table_leaf_stays_above_the_join() {
        let t = table("t");
        let u = table("u");
        let cond = Expr::Comparison(CmpOp::Eq, Box::new(field_expr("t", "a")), Some(Box::new(field_expr("u", "a"))));
        let plan = LogicalOp::Predicate {
            child: Box::new(LogicalOp::Join {
                left: Box::new(LogicalOp::TableGet { table: t, alias: None, filters: Vec::new(), no_index: false }),
                right: Box::new(LogicalOp::TableGet { table: u, alias: None, filters: Vec::new(), no_index: false }),
            }),
            cond,
        };
        let rewritten = push_down_predicates(plan);
        assert!(matches!(rewritten, LogicalOp::Predicate { .. }));
    }
}
