//! Statement binding (§4.3): turns the parser's [`SqlNode`] into a
//! [`Statement`] — a bound logical plan ready for [`crate::rewrite`] and
//! [`crate::physical`], or a DDL/session action for [`crate::db::Database`]
//! to carry out directly against the catalog. Views are expanded here too:
//! a FROM-clause reference to a view, or a DML statement targeting one,
//! is rewritten in terms of its underlying base table before the rest of
//! the pipeline ever sees it.

use crate::ast::*;
use crate::binder::{bind_expr, bind_expr_with, BinderContext, ScopeEntry};
use crate::catalog::Catalog;
use crate::expr::{AggKind, ConjType, Expr, SubqueryState};
use crate::logical::{AggTarget, Assignment, GroupKey, LogicalOp, OrderKey};
use crate::meta::{build_user_fields, TableMeta};
use crate::physical;
use crate::rc::{Result, RC};
use crate::rewrite::push_down_predicates;
use crate::table::Table;
use crate::value::{AttrType, Value};
use crate::view::View;
use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// A bound statement. `Plan` carries everything that flows through
/// rewrite/physical/operator execution (SELECT, INSERT, DELETE, UPDATE,
/// EXPLAIN, CALC); every other variant is DDL or session control, which
/// `crate::db::Database` acts on directly rather than via an operator tree.
pub enum Statement {
    Plan(LogicalOp),
    CreateTable(CreateTableAst),
    CreateView(CreateViewAst),
    CreateIndex(CreateIndexAst),
    CreateVectorIndex(CreateVectorIndexAst),
    DropTable(String),
    DropIndex { table: String, name: String },
    DropVectorIndex { table: String, name: String },
    DescTable(String),
    ShowTables,
    Begin,
    Commit,
    Rollback,
    Exit,
    Help,
    SetVariable { name: String, value: String },
    LoadData(LoadDataAst),
}

impl Statement {
    /// Bind `node` against `cat`. The sole entry point an embedding parser
    /// calls once it has produced a [`SqlNode`].
    pub fn create(cat: &Catalog, node: SqlNode) -> Result<Statement> {
        match node {
            SqlNode::Select(ast) => Ok(Statement::Plan(bind_select(cat, &ast, None)?.0)),
            SqlNode::Insert(ast) => Ok(Statement::Plan(bind_insert(cat, &ast)?)),
            SqlNode::Delete(ast) => Ok(Statement::Plan(bind_delete(cat, &ast)?)),
            SqlNode::Update(ast) => Ok(Statement::Plan(bind_update(cat, &ast)?)),
            SqlNode::Explain(inner) => match Statement::create(cat, *inner)? {
                Statement::Plan(child) => Ok(Statement::Plan(LogicalOp::Explain { child: Box::new(child) })),
                _ => Err(RC::Unsupported),
            },
            SqlNode::Calc(exprs) => {
                let ctx = BinderContext::new(Vec::new());
                let bound = exprs.iter().map(|e| bind_expr(&ctx, e)).collect::<Result<Vec<_>>>()?;
                Ok(Statement::Plan(LogicalOp::Calc { exprs: bound }))
            }
            SqlNode::CreateTable(ast) => Ok(Statement::CreateTable(ast)),
            SqlNode::CreateView(ast) => Ok(Statement::CreateView(ast)),
            SqlNode::CreateIndex(ast) => Ok(Statement::CreateIndex(ast)),
            SqlNode::CreateVectorIndex(ast) => Ok(Statement::CreateVectorIndex(ast)),
            SqlNode::DropTable(name) => Ok(Statement::DropTable(name)),
            SqlNode::DropIndex { table, name } => Ok(Statement::DropIndex { table, name }),
            SqlNode::DropVectorIndex { table, name } => Ok(Statement::DropVectorIndex { table, name }),
            SqlNode::DescTable(name) => Ok(Statement::DescTable(name)),
            SqlNode::ShowTables => Ok(Statement::ShowTables),
            SqlNode::Begin => Ok(Statement::Begin),
            SqlNode::Commit => Ok(Statement::Commit),
            SqlNode::Rollback => Ok(Statement::Rollback),
            SqlNode::Exit => Ok(Statement::Exit),
            SqlNode::Help => Ok(Statement::Help),
            SqlNode::SetVariable { name, value } => Ok(Statement::SetVariable { name, value }),
            SqlNode::LoadData(ast) => Ok(Statement::LoadData(ast)),
        }
    }
}

/// Resolve a FROM clause's relations against the catalog, in order: each
/// base table contributes its own `ScopeEntry` plus a `TableGet` leaf;
/// each view contributes a synthetic scope entry over its declared output
/// plus its own bound plan, via [`build_view_scope_entry`].
fn resolve_relations(cat: &Catalog, relations: &[RelationRef]) -> Result<(Vec<ScopeEntry>, Vec<LogicalOp>)> {
    let mut scope = Vec::with_capacity(relations.len());
    let mut ops = Vec::with_capacity(relations.len());
    for rel in relations {
        if let Some(table) = cat.table(&rel.name) {
            let meta = Rc::new(table.meta().clone());
            scope.push(ScopeEntry::new(meta, rel.alias.clone()));
            ops.push(LogicalOp::TableGet { table, alias: rel.alias.clone(), filters: Vec::new(), no_index: false });
        } else if let Some(view) = cat.view(&rel.name) {
            let (entry, plan) = build_view_scope_entry(cat, &view, rel.alias.clone())?;
            scope.push(entry);
            ops.push(plan);
        } else {
            return Err(RC::SchemaTableNotExist);
        }
    }
    Ok((scope, ops))
}

/// Bind a view's own `SELECT` once, and present its output as a single
/// scope entry (a synthetic `TableMeta` over the bound output schema) plus
/// the bound plan itself — reused directly as the FROM-clause leaf. The
/// view's top-level `Project` keeps field provenance for plain column
/// references (see `op_project::Project::next`), which is what lets a
/// later UPDATE/DELETE through the view still resolve back to a base rid.
fn build_view_scope_entry(cat: &Catalog, view: &View, alias: Option<String>) -> Result<(ScopeEntry, LogicalOp)> {
    let (plan, schema) = bind_select(cat, &view.select_ast, None)?;
    let specs: Vec<(&str, AttrType, Option<usize>, bool)> = schema.iter().map(|(n, t)| (n.as_str(), *t, None, true)).collect();
    let fields = build_user_fields(&view.name, &specs);
    let synth_meta = Rc::new(TableMeta::new(0, &view.name, fields));
    Ok((ScopeEntry::new(synth_meta, alias), plan))
}

/// Plan and build a correlated subquery's physical operator, for splicing
/// into an [`Expr::Subquery`] node. `ctx` is the context the `Subquery`
/// expression itself is being bound against — it becomes the subquery's
/// outer scope.
fn plan_subquery(cat: &Catalog, ast: &SelectAst, ctx: &BinderContext) -> Result<Expr> {
    let (plan, _schema) = bind_select(cat, ast, Some(ctx))?;
    let plan = push_down_predicates(plan);
    let physical_op = physical::build(&plan)?;
    Ok(Expr::Subquery(Rc::new(RefCell::new(SubqueryState::new(physical_op)))))
}

/// Bind a `SELECT`, producing its logical plan plus `(output_name, type)`
/// per projected column. `outer` is `Some` when this is a correlated
/// subquery nested inside an already-bound query.
pub(crate) fn bind_select(cat: &Catalog, ast: &SelectAst, outer: Option<&BinderContext>) -> Result<(LogicalOp, Vec<(String, AttrType)>)> {
    if ast.relations.is_empty() {
        return Err(RC::Unsupported);
    }
    let (scope, ops) = resolve_relations(cat, &ast.relations)?;
    let ctx = match outer {
        Some(o) => o.child_scope(scope),
        None => BinderContext::new(scope),
    };
    let mut resolve_subquery = |a: &SelectAst, c: &BinderContext| plan_subquery(cat, a, c);

    let mut plan = LogicalOp::join_all(ops);

    if !ast.conditions.is_empty() {
        let bound: Vec<Expr> = ast.conditions.iter().map(|c| bind_expr_with(&ctx, c, &mut resolve_subquery)).collect::<Result<_>>()?;
        let cond = and_of(bound);
        plan = LogicalOp::Predicate { child: Box::new(plan), cond };
    }

    let mut select_items: Vec<(Expr, String)> = Vec::new();
    for item in &ast.expressions {
        match &item.expr {
            ExprAst::Star => select_items.extend(ctx.expand_star(None)?),
            ExprAst::Field { table, name } if name == "*" => select_items.extend(ctx.expand_star(table.as_deref())?),
            _ => {
                let e = bind_expr_with(&ctx, &item.expr, &mut resolve_subquery)?;
                let name = item.alias.clone().unwrap_or_else(|| default_output_name(&item.expr));
                select_items.push((e, name));
            }
        }
    }

    let having_expr: Option<Expr> = if ast.havings.is_empty() {
        None
    } else {
        let bound: Vec<Expr> = ast.havings.iter().map(|h| bind_expr_with(&ctx, h, &mut resolve_subquery)).collect::<Result<_>>()?;
        Some(and_of(bound))
    };
    let group_keys: Vec<Expr> = ast.group_by.iter().map(|g| bind_expr_with(&ctx, g, &mut resolve_subquery)).collect::<Result<_>>()?;

    let mut agg_exprs: Vec<Expr> = Vec::new();
    for (e, _) in &select_items {
        collect_aggregates(e, &mut agg_exprs);
    }
    if let Some(h) = &having_expr {
        collect_aggregates(h, &mut agg_exprs);
    }
    let aggregating = !group_keys.is_empty() || !agg_exprs.is_empty();
    if !ast.havings.is_empty() && !aggregating {
        return Err(RC::Unsupported);
    }

    let final_select_items = if aggregating {
        for (e, _) in &select_items {
            validate_non_agg(e, &group_keys)?;
        }
        if let Some(h) = &having_expr {
            validate_non_agg(h, &group_keys)?;
        }
        let keys: Vec<GroupKey> = group_keys.iter().cloned().map(|expr| GroupKey { expr }).collect();
        let aggs: Vec<AggTarget> = agg_exprs
            .iter()
            .map(|a| match a {
                Expr::Aggregation(kind, inner) => AggTarget { kind: *kind, expr: inner.as_ref().map(|b| (**b).clone()) },
                _ => unreachable!("collect_aggregates only gathers Expr::Aggregation nodes"),
            })
            .collect();
        plan = LogicalOp::GroupBy { child: Box::new(plan), keys, aggs };
        if let Some(h) = having_expr {
            let cond = replace_post_groupby(&h, &group_keys, &agg_exprs);
            plan = LogicalOp::Predicate { child: Box::new(plan), cond };
        }
        select_items.iter().map(|(e, name)| (replace_post_groupby(e, &group_keys, &agg_exprs), name.clone())).collect::<Vec<_>>()
    } else {
        select_items
    };

    let mut order_keys = Vec::with_capacity(ast.order_by.len());
    for item in &ast.order_by {
        let alias_match = if let ExprAst::Field { table: None, name } = &item.expr {
            final_select_items.iter().find(|(_, n)| n.eq_ignore_ascii_case(name)).map(|(e, _)| e.clone())
        } else {
            None
        };
        let e = match alias_match {
            Some(e) => e,
            None => {
                let bound = bind_expr_with(&ctx, &item.expr, &mut resolve_subquery)?;
                if aggregating {
                    validate_non_agg(&bound, &group_keys)?;
                    replace_post_groupby(&bound, &group_keys, &agg_exprs)
                } else {
                    bound
                }
            }
        };
        order_keys.push(OrderKey { expr: e, desc: item.desc });
    }
    if !order_keys.is_empty() {
        plan = LogicalOp::OrderBy { child: Box::new(plan), keys: order_keys };
    }

    let output_schema: Vec<(String, AttrType)> = final_select_items.iter().map(|(e, name)| (name.clone(), e.value_type())).collect();
    let plan = LogicalOp::Project { child: Box::new(plan), items: final_select_items, limit: ast.limit };
    Ok((plan, output_schema))
}

fn and_of(mut exprs: Vec<Expr>) -> Expr {
    if exprs.len() == 1 {
        exprs.pop().unwrap()
    } else {
        Expr::Conjunction(ConjType::And, exprs)
    }
}

/// Default projection output name for an unaliased select item, mirroring
/// the source's column-heading rule: the bare field name, the lowercased
/// aggregate kind, or `expr` for anything else.
fn default_output_name(ast: &ExprAst) -> String {
    match ast {
        ExprAst::Field { name, .. } => name.clone(),
        ExprAst::Agg(kind, _) => format!("{:?}", kind).to_lowercase(),
        _ => "expr".to_string(),
    }
}

/// Gather every distinct (by [`Expr::equal`]) `Aggregation` node reachable
/// from `e`, stopping at an `Aggregation` itself (its argument is never
/// itself aggregated further in this engine).
fn collect_aggregates(e: &Expr, out: &mut Vec<Expr>) {
    match e {
        Expr::Aggregation(..) => {
            if !out.iter().any(|o| o.equal(e)) {
                out.push(e.clone());
            }
        }
        Expr::Cast(inner, _) | Expr::Like(inner, ..) | Expr::Is(inner, _) => collect_aggregates(inner, out),
        Expr::Arithmetic(_, l, r) | Expr::Comparison(_, l, r) => {
            collect_aggregates(l, out);
            if let Some(r) = r {
                collect_aggregates(r, out);
            }
        }
        Expr::Conjunction(_, children) => children.iter().for_each(|c| collect_aggregates(c, out)),
        Expr::VectorDistance(_, l, r) => {
            collect_aggregates(l, out);
            collect_aggregates(r, out);
        }
        _ => {}
    }
}

/// Reject a bare column reference that is neither a `GROUP BY` key nor
/// wrapped in an aggregate — the standard "column must appear in GROUP BY
/// or be aggregated" rule, enforced by recursing through composite nodes
/// and treating `Aggregation` as opaque (its argument is not itself
/// subject to the rule).
fn validate_non_agg(e: &Expr, keys: &[Expr]) -> Result<()> {
    if keys.iter().any(|k| k.equal(e)) {
        return Ok(());
    }
    match e {
        Expr::Aggregation(..) => Ok(()),
        Expr::Field(..) => Err(RC::Unsupported),
        Expr::Cast(inner, _) | Expr::Like(inner, ..) | Expr::Is(inner, _) => validate_non_agg(inner, keys),
        Expr::Arithmetic(_, l, r) | Expr::Comparison(_, l, r) => {
            validate_non_agg(l, keys)?;
            if let Some(r) = r {
                validate_non_agg(r, keys)?;
            }
            Ok(())
        }
        Expr::Conjunction(_, children) => children.iter().try_for_each(|c| validate_non_agg(c, keys)),
        Expr::VectorDistance(_, l, r) => {
            validate_non_agg(l, keys)?;
            validate_non_agg(r, keys)
        }
        _ => Ok(()),
    }
}

/// Rewrite `e` to run against a `GroupBy`'s `Expression` output, whose
/// cells are the group keys followed by the aggregate results in order —
/// addressable only by flattened position, since that tuple carries no
/// field names. An exact structural match against a key or an aggregate
/// becomes a `Positional` reference; anything else is recursed into, since
/// `validate_non_agg` already confirmed every leaf either matches a key or
/// sits inside an aggregate.
fn replace_post_groupby(e: &Expr, keys: &[Expr], aggs: &[Expr]) -> Expr {
    if let Some(i) = keys.iter().position(|k| k.equal(e)) {
        return Expr::Positional(i, e.value_type());
    }
    if let Some(i) = aggs.iter().position(|a| a.equal(e)) {
        return Expr::Positional(keys.len() + i, e.value_type());
    }
    match e {
        Expr::Cast(inner, t) => Expr::Cast(Box::new(replace_post_groupby(inner, keys, aggs)), *t),
        Expr::Like(inner, p, n) => Expr::Like(Box::new(replace_post_groupby(inner, keys, aggs)), p.clone(), *n),
        Expr::Is(inner, k) => Expr::Is(Box::new(replace_post_groupby(inner, keys, aggs)), k.clone()),
        Expr::Arithmetic(op, l, r) => {
            Expr::Arithmetic(*op, Box::new(replace_post_groupby(l, keys, aggs)), r.as_ref().map(|r| Box::new(replace_post_groupby(r, keys, aggs))))
        }
        Expr::Comparison(op, l, r) => {
            Expr::Comparison(*op, Box::new(replace_post_groupby(l, keys, aggs)), r.as_ref().map(|r| Box::new(replace_post_groupby(r, keys, aggs))))
        }
        Expr::Conjunction(k, children) => Expr::Conjunction(*k, children.iter().map(|c| replace_post_groupby(c, keys, aggs)).collect()),
        Expr::VectorDistance(k, l, r) => {
            Expr::VectorDistance(*k, Box::new(replace_post_groupby(l, keys, aggs)), Box::new(replace_post_groupby(r, keys, aggs)))
        }
        other => other.clone(),
    }
}

/// Map a view's declared output columns back to its single base table's
/// field names, in declaration order — `Star` expands to every visible
/// base field, a plain `Field` contributes its own name. Anything else
/// (an updatable view's own shape never has one, but defence in depth)
/// is rejected.
fn view_base_field_names(view: &View, table: &Table) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for item in &view.select_ast.expressions {
        match &item.expr {
            ExprAst::Star => out.extend(table.meta().user_fields.iter().filter(|f| f.visible).map(|f| f.name.clone())),
            ExprAst::Field { name, .. } => out.push(name.clone()),
            _ => return Err(RC::Unsupported),
        }
    }
    Ok(out)
}

/// Map one of a view's declared/output column names back to its base
/// table's field name, via `view.declared_columns` when the view renamed
/// it, or the name itself otherwise.
fn view_column_to_base_field(view: &View, base_names: &[String], col: &str) -> Result<String> {
    if let Some(i) = view.declared_columns.iter().position(|c| c.eq_ignore_ascii_case(col)) {
        base_names.get(i).cloned().ok_or(RC::SchemaFieldNotExist)
    } else {
        Ok(col.to_string())
    }
}

fn bind_insert(cat: &Catalog, ast: &InsertAst) -> Result<LogicalOp> {
    if let Some(table) = cat.table(&ast.table) {
        let meta = table.meta();
        let positions: Vec<usize> = match &ast.columns {
            Some(cols) => cols.iter().map(|c| meta.field(c).map(|f| f.field_id).ok_or(RC::SchemaFieldNotExist)).collect::<Result<_>>()?,
            None => (0..meta.user_fields.len()).collect(),
        };
        let rows = bind_insert_rows(&ast.rows, &positions, meta.user_fields.len())?;
        Ok(LogicalOp::Insert { table, rows })
    } else if let Some(view) = cat.view(&ast.table) {
        bind_view_insert(cat, &view, ast)
    } else {
        Err(RC::SchemaTableNotExist)
    }
}

fn bind_insert_rows(ast_rows: &[Vec<ExprAst>], positions: &[usize], n_fields: usize) -> Result<Vec<Vec<Expr>>> {
    let ctx = BinderContext::new(Vec::new());
    let mut rows = Vec::with_capacity(ast_rows.len());
    for row in ast_rows {
        if row.len() != positions.len() {
            return Err(RC::SchemaFieldMissing);
        }
        let mut full_row = vec![Expr::Value(Value::Null); n_fields];
        for (i, e) in row.iter().enumerate() {
            full_row[positions[i]] = bind_expr(&ctx, e)?;
        }
        rows.push(full_row);
    }
    Ok(rows)
}

/// Route an `INSERT` through a single-table updatable view straight at its
/// base table, mapping declared view columns back to base field positions.
fn bind_view_insert(cat: &Catalog, view: &View, ast: &InsertAst) -> Result<LogicalOp> {
    if !view.is_updatable {
        return Err(RC::Unsupported);
    }
    let table = cat.table(&view.base_tables[0]).ok_or(RC::SchemaTableNotExist)?;
    let base_names = view_base_field_names(view, &table)?;
    let view_cols: Vec<String> = match &ast.columns {
        Some(cols) => cols.clone(),
        None if !view.declared_columns.is_empty() => view.declared_columns.clone(),
        None => base_names.clone(),
    };
    let meta = table.meta();
    let positions = view_cols
        .iter()
        .map(|vc| {
            let field_name = view_column_to_base_field(view, &base_names, vc)?;
            meta.field(&field_name).map(|f| f.field_id).ok_or(RC::SchemaFieldNotExist)
        })
        .collect::<Result<Vec<_>>>()?;
    let rows = bind_insert_rows(&ast.rows, &positions, meta.user_fields.len())?;
    Ok(LogicalOp::Insert { table, rows })
}

fn bind_delete(cat: &Catalog, ast: &DeleteAst) -> Result<LogicalOp> {
    if let Some(table) = cat.table(&ast.table) {
        let meta = Rc::new(table.meta().clone());
        let ctx = BinderContext::new(vec![ScopeEntry::new(meta, ast.alias.clone())]);
        let mut resolve_subquery = |a: &SelectAst, c: &BinderContext| plan_subquery(cat, a, c);
        let mut plan = LogicalOp::TableGet { table: table.clone(), alias: ast.alias.clone(), filters: Vec::new(), no_index: false };
        if !ast.conditions.is_empty() {
            let bound: Vec<Expr> = ast.conditions.iter().map(|c| bind_expr_with(&ctx, c, &mut resolve_subquery)).collect::<Result<_>>()?;
            plan = LogicalOp::Predicate { child: Box::new(plan), cond: and_of(bound) };
        }
        Ok(LogicalOp::Delete { child: Box::new(plan), table })
    } else if let Some(view) = cat.view(&ast.table) {
        bind_view_delete(cat, &view, ast)
    } else {
        Err(RC::SchemaTableNotExist)
    }
}

fn bind_view_delete(cat: &Catalog, view: &View, ast: &DeleteAst) -> Result<LogicalOp> {
    if !view.is_updatable {
        return Err(RC::Unsupported);
    }
    let table = cat.table(&view.base_tables[0]).ok_or(RC::SchemaTableNotExist)?;
    let (entry, view_plan) = build_view_scope_entry(cat, view, ast.alias.clone())?;
    let ctx = BinderContext::new(vec![entry]);
    let mut resolve_subquery = |a: &SelectAst, c: &BinderContext| plan_subquery(cat, a, c);
    let mut plan = view_plan;
    if !ast.conditions.is_empty() {
        let bound: Vec<Expr> = ast.conditions.iter().map(|c| bind_expr_with(&ctx, c, &mut resolve_subquery)).collect::<Result<_>>()?;
        plan = LogicalOp::Predicate { child: Box::new(plan), cond: and_of(bound) };
    }
    Ok(LogicalOp::Delete { child: Box::new(plan), table })
}

fn bind_update(cat: &Catalog, ast: &UpdateAst) -> Result<LogicalOp> {
    if let Some(table) = cat.table(&ast.table) {
        let meta = Rc::new(table.meta().clone());
        let ctx = BinderContext::new(vec![ScopeEntry::new(meta.clone(), ast.alias.clone())]);
        let mut resolve_subquery = |a: &SelectAst, c: &BinderContext| plan_subquery(cat, a, c);
        // `no_index: true`: this table's own key range may be under
        // rewrite by this very statement, so force a scan rather than an
        // index seek into it.
        let mut plan = LogicalOp::TableGet { table: table.clone(), alias: ast.alias.clone(), filters: Vec::new(), no_index: true };
        if !ast.conditions.is_empty() {
            let bound: Vec<Expr> = ast.conditions.iter().map(|c| bind_expr_with(&ctx, c, &mut resolve_subquery)).collect::<Result<_>>()?;
            plan = LogicalOp::Predicate { child: Box::new(plan), cond: and_of(bound) };
        }
        let assignments = ast
            .assignments
            .iter()
            .map(|(col, expr_ast)| {
                let field_index = meta.field(col).ok_or(RC::SchemaFieldNotExist)?.field_id;
                let expr = bind_expr_with(&ctx, expr_ast, &mut resolve_subquery)?;
                Ok(Assignment { field_index, expr })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(LogicalOp::Update { child: Box::new(plan), table, assignments })
    } else if let Some(view) = cat.view(&ast.table) {
        bind_view_update(cat, &view, ast)
    } else {
        Err(RC::SchemaTableNotExist)
    }
}

fn bind_view_update(cat: &Catalog, view: &View, ast: &UpdateAst) -> Result<LogicalOp> {
    if !view.is_updatable {
        return Err(RC::Unsupported);
    }
    let base_table_name = view.base_tables[0].clone();
    let table = cat.table(&base_table_name).ok_or(RC::SchemaTableNotExist)?;
    let (entry, view_plan) = build_view_scope_entry(cat, view, ast.alias.clone())?;
    let ctx = BinderContext::new(vec![entry]);
    let mut resolve_subquery = |a: &SelectAst, c: &BinderContext| plan_subquery(cat, a, c);
    let mut plan = view_plan;
    if !ast.conditions.is_empty() {
        let bound: Vec<Expr> = ast.conditions.iter().map(|c| bind_expr_with(&ctx, c, &mut resolve_subquery)).collect::<Result<_>>()?;
        plan = LogicalOp::Predicate { child: Box::new(plan), cond: and_of(bound) };
    }
    let base_names = view_base_field_names(view, &table)?;
    let assignments = ast
        .assignments
        .iter()
        .map(|(col, expr_ast)| {
            let field_name = view_column_to_base_field(view, &base_names, col)?;
            let field_index = table.meta().field(&field_name).ok_or(RC::SchemaFieldNotExist)?.field_id;
            let expr = bind_expr_with(&ctx, expr_ast, &mut resolve_subquery)?;
            Ok((base_table_name.clone(), field_index, expr))
        })
        .collect::<Result<Vec<_>>>()?;
    let mut base_tables: HashMap<String, Rc<Table>> = HashMap::default();
    base_tables.insert(base_table_name, table);
    Ok(LogicalOp::ViewUpdate { child: Box::new(plan), base_tables, assignments })
}
