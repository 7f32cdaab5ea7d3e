//! Logical-to-physical planner: picks access methods (table scan vs.
//! B+tree index scan vs. IVF vector-index scan) and instantiates the
//! `op_*` operator tree that implements a [`LogicalOp`] shape.

use crate::expr::{CmpOp, Expr};
use crate::logical::LogicalOp;
use crate::meta::IndexMeta;
use crate::op_dml::{Assignment as DmlAssignment, Delete, Insert, Update, ViewUpdate};
use crate::op_explain::Explain;
use crate::op_groupby::{AggSpec, HashGroupBy, ScalarGroupBy};
use crate::op_join::NestedLoopJoin;
use crate::op_orderby::{OrderBy, OrderByKey};
use crate::op_predicate::Predicate;
use crate::op_project::{Project, ProjectItem};
use crate::op_scan::{FilterMode, IndexScan, TableScan, VectorIndexScan};
use crate::operator::PhysicalOperator;
use crate::rc::{Result, RC};
use crate::table::Table;
use crate::value::{DistanceType, Value};
use rustc_hash::FxHashMap as HashMap;
use std::rc::Rc;

/// Build the physical operator tree for `op`.
pub fn build(op: &LogicalOp) -> Result<Box<dyn PhysicalOperator>> {
    match op {
        LogicalOp::TableGet { table, alias, filters, no_index } => build_table_get(table.clone(), alias.clone(), filters, *no_index),
        LogicalOp::Predicate { child, cond } => Ok(Box::new(Predicate::new(build(child)?, cond.clone()))),
        LogicalOp::Project { child, items, limit } => build_project(child, items, *limit),
        LogicalOp::Join { left, right } => Ok(Box::new(NestedLoopJoin::new(build(left)?, build(right)?))),
        LogicalOp::GroupBy { child, keys, aggs } => {
            let specs: Vec<AggSpec> = aggs.iter().map(|a| AggSpec { kind: a.kind, expr: a.expr.clone() }).collect();
            if keys.is_empty() {
                Ok(Box::new(ScalarGroupBy::new(build(child)?, specs)))
            } else {
                let key_exprs: Vec<Expr> = keys.iter().map(|k| k.expr.clone()).collect();
                Ok(Box::new(HashGroupBy::new(build(child)?, key_exprs, specs)))
            }
        }
        LogicalOp::OrderBy { child, keys } => {
            let okeys = keys.iter().map(|k| OrderByKey { expr: k.expr.clone(), desc: k.desc }).collect();
            Ok(Box::new(OrderBy::new(build(child)?, okeys)))
        }
        LogicalOp::Insert { table, rows } => Ok(Box::new(Insert::new(table.clone(), rows.clone()))),
        LogicalOp::Delete { child, table } => Ok(Box::new(Delete::new(build(child)?, table.clone()))),
        LogicalOp::Update { child, table, assignments } => {
            let assigns = assignments.iter().map(|a| DmlAssignment { field_index: a.field_index, expr: a.expr.clone() }).collect();
            Ok(Box::new(Update::new(build(child)?, table.clone(), assigns)))
        }
        LogicalOp::ViewUpdate { child, base_tables, assignments } => {
            Ok(Box::new(ViewUpdate::new(build(child)?, base_tables.clone(), assignments.clone())?))
        }
        LogicalOp::Explain { child } => Ok(Box::new(Explain::new(describe(child, 0)))),
        LogicalOp::Calc { exprs } => Ok(Box::new(crate::op_calc::Calc::new(exprs.clone()))),
    }
}

fn build_table_get(table: Rc<Table>, alias: Option<String>, filters: &[Expr], no_index: bool) -> Result<Box<dyn PhysicalOperator>> {
    let eq = collect_equalities(filters);
    if !no_index {
        if let Some((idx, key)) = select_index(&table, &eq) {
            let idx_name = idx.name.clone();
            return Ok(Box::new(IndexScan::new(
                table,
                alias,
                idx_name,
                Some(key.clone()),
                true,
                Some(key),
                true,
                filters.to_vec(),
                FilterMode::And,
            )));
        }
    }
    Ok(Box::new(TableScan::new(table, alias, filters.to_vec(), FilterMode::And)))
}

/// Equality predicates of the form `field = value` (either operand order).
/// `filters` only ever holds leaves `rewrite` pushed down onto this
/// `TableGet`, each already confirmed to reference this table alone, so no
/// further table-name check is needed here.
fn collect_equalities(filters: &[Expr]) -> HashMap<String, Value> {
    let mut eq = HashMap::default();
    for f in filters {
        if let Expr::Comparison(CmpOp::Eq, l, Some(r)) = f {
            match (l.as_ref(), r.as_ref()) {
                (Expr::Field(fm, _), Expr::Value(v)) | (Expr::Value(v), Expr::Field(fm, _)) => {
                    eq.insert(fm.name.clone(), v.clone());
                }
                _ => {}
            }
        }
    }
    eq
}

/// An index whose full field set (order-independent) is covered by an
/// equality predicate, per the exact equality-key-set access-method rule.
fn select_index<'a>(table: &'a Table, eq: &HashMap<String, Value>) -> Option<(&'a IndexMeta, Vec<Value>)> {
    table.meta().indexes.iter().find_map(|idx| {
        if eq.len() != idx.fields.len() {
            return None;
        }
        let mut key = Vec::with_capacity(idx.fields.len());
        for f in &idx.fields {
            key.push(eq.get(&f.name)?.clone());
        }
        Some((idx, key))
    })
}

/// `Project(limit=k) -> OrderBy(single VectorDistance key) -> TableGet` is
/// rewritten to a single `VectorIndexScan` against a matching vector index,
/// when one exists; otherwise falls through to the generic build path.
fn build_project(child: &LogicalOp, items: &[(Expr, String)], limit: Option<usize>) -> Result<Box<dyn PhysicalOperator>> {
    if let (Some(k), Some(scan)) = (limit, try_vector_fusion(child, limit)) {
        let scan = scan?;
        let project_items = items
            .iter()
            .map(|(e, name)| ProjectItem { expr: e.clone(), name: name.clone() })
            .collect();
        return Ok(Box::new(Project::new(scan, project_items, Some(k))));
    }
    let project_items = items.iter().map(|(e, name)| ProjectItem { expr: e.clone(), name: name.clone() }).collect();
    Ok(Box::new(Project::new(build(child)?, project_items, limit)))
}

fn try_vector_fusion(child: &LogicalOp, limit: Option<usize>) -> Option<Result<Box<dyn PhysicalOperator>>> {
    let k = limit?;
    let LogicalOp::OrderBy { child: inner, keys } = child else { return None };
    if keys.len() != 1 || keys[0].desc {
        return None;
    }
    let Expr::VectorDistance(kind, l, r) = &keys[0].expr else { return None };
    let LogicalOp::TableGet { table, alias, filters, .. } = inner.as_ref() else { return None };
    if !filters.is_empty() {
        return None;
    }
    let (field_expr, query_expr) = (l.as_ref(), r.as_ref());
    let (field, query) = match (field_expr, query_expr) {
        (Expr::Field(f, _), Expr::Value(v)) => (f, v),
        (Expr::Value(v), Expr::Field(f, _)) => (f, v),
        _ => return None,
    };
    let query_vec = match query {
        Value::Vector(vd) => vd.data.as_deref()?.clone(),
        _ => return None,
    };
    let vidx_meta = table.meta().vector_indexes.iter().find(|v| v.field.name == field.name && v.distance == *kind)?;
    let (vecidx_path, aux_path) =
        crate::meta::TableMeta::vector_index_paths(table.base_dir(), &table.meta().name, &vidx_meta.name);
    let probes = vidx_meta.probes as usize;
    let index = match crate::vector_index::VectorIndex::open(&vecidx_path, &aux_path, vidx_meta.distance) {
        Ok(i) => Rc::new(i),
        Err(e) => return Some(Err(e)),
    };
    Some(Ok(Box::new(VectorIndexScan::new(table.clone(), alias.clone(), index, query_vec, k, probes))))
}

/// Render an indented, human-readable description of `op`'s physical
/// shape, the row `EXPLAIN` returns.
pub fn describe(op: &LogicalOp, depth: usize) -> String {
    let pad = "  ".repeat(depth);
    match op {
        LogicalOp::TableGet { table, alias, filters, no_index } => {
            let label = alias.as_deref().unwrap_or(&table.meta().name);
            let eq = collect_equalities(filters);
            if !no_index {
                if let Some((idx, _)) = select_index(table, &eq) {
                    return format!("{pad}IndexScan({} on {}, filters={})", idx.name, label, filters.len());
                }
            }
            format!("{pad}TableScan({}, filters={})", label, filters.len())
        }
        LogicalOp::Predicate { child, cond } => format!("{pad}Predicate({:?})\n{}", cond, describe(child, depth + 1)),
        LogicalOp::Project { child, items, limit } => {
            format!("{pad}Project(cols={}, limit={:?})\n{}", items.len(), limit, describe(child, depth + 1))
        }
        LogicalOp::Join { left, right } => {
            format!("{pad}NestedLoopJoin\n{}\n{}", describe(left, depth + 1), describe(right, depth + 1))
        }
        LogicalOp::GroupBy { child, keys, aggs } => {
            format!("{pad}GroupBy(keys={}, aggs={})\n{}", keys.len(), aggs.len(), describe(child, depth + 1))
        }
        LogicalOp::OrderBy { child, keys } => format!("{pad}OrderBy(keys={})\n{}", keys.len(), describe(child, depth + 1)),
        LogicalOp::Insert { table, rows } => format!("{pad}Insert({}, rows={})", table.meta().name, rows.len()),
        LogicalOp::Delete { child, table } => format!("{pad}Delete({})\n{}", table.meta().name, describe(child, depth + 1)),
        LogicalOp::Update { child, table, .. } => format!("{pad}Update({})\n{}", table.meta().name, describe(child, depth + 1)),
        LogicalOp::ViewUpdate { child, .. } => format!("{pad}ViewUpdate\n{}", describe(child, depth + 1)),
        LogicalOp::Explain { child } => format!("{pad}Explain\n{}", describe(child, depth + 1)),
        LogicalOp::Calc { exprs } => format!("{pad}Calc(n={})", exprs.len()),
    }
}
