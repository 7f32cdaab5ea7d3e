//! Name resolution: turns the parser's `ExprAst` into a bound [`Expr`]
//! against a [`BinderContext`] describing which tables are in scope —
//! and, for a correlated subquery, which outer queries' tables are too.

use crate::ast::{ExprAst, SelectAst};
use crate::expr::{ArithOp, Expr, IsKind};
use crate::meta::{FieldMeta, TableMeta};
use crate::rc::{Result, RC};
use crate::tuple::TupleCellSpec;
use std::rc::Rc;

/// One in-scope relation: its schema plus the alias it was brought into
/// the query under (`None` if unaliased).
#[derive(Clone)]
pub struct ScopeEntry {
    pub meta: Rc<TableMeta>,
    pub alias: Option<String>,
}

impl ScopeEntry {
    pub fn new(meta: Rc<TableMeta>, alias: Option<String>) -> Self {
        Self { meta, alias }
    }

    fn matches_qualifier(&self, q: &str) -> bool {
        self.alias.as_deref() == Some(q) || self.meta.name == q
    }

    fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.meta.name)
    }
}

/// Binder state threaded through `bind_expr`: the query's own in-scope
/// relations, plus the stack of enclosing queries' relations (nearest
/// first when walked) so a correlated subquery's field references can
/// reach outer tables.
pub struct BinderContext {
    pub scope: Vec<ScopeEntry>,
    outer: Vec<Vec<ScopeEntry>>,
}

impl BinderContext {
    pub fn new(scope: Vec<ScopeEntry>) -> Self {
        Self { scope, outer: Vec::new() }
    }

    /// Build the context a subquery nested inside this one binds against:
    /// its own scope, with this context's full scope stack pushed as the
    /// nearest outer layer.
    pub fn child_scope(&self, scope: Vec<ScopeEntry>) -> Self {
        let mut outer = vec![self.scope.clone()];
        outer.extend(self.outer.clone());
        Self { scope, outer }
    }

    fn find_in(scopes: &[ScopeEntry], table: Option<&str>, name: &str) -> Result<Option<(ScopeEntry, FieldMeta)>> {
        let mut found = None;
        for entry in scopes {
            if let Some(q) = table {
                if !entry.matches_qualifier(q) {
                    continue;
                }
            }
            if let Some(f) = entry.meta.field(name) {
                if found.is_some() {
                    return Err(RC::InvalidArgument);
                }
                found = Some((entry.clone(), f.clone()));
            }
        }
        Ok(found)
    }

    /// Resolve `(table?, name)`, trying this query's scope first and then
    /// each enclosing query's scope, nearest first. `pub(crate)` so
    /// [`crate::statement`] can reuse it while resolving expressions that
    /// may also contain subqueries (which this module's `bind_expr` alone
    /// cannot plan).
    pub(crate) fn resolve_field(&self, table: Option<&str>, name: &str) -> Result<(ScopeEntry, FieldMeta)> {
        if let Some(found) = Self::find_in(&self.scope, table, name)? {
            return Ok(found);
        }
        for outer_scope in &self.outer {
            if let Some(found) = Self::find_in(outer_scope, table, name)? {
                return Ok(found);
            }
        }
        Err(RC::SchemaFieldNotExist)
    }

    /// All visible fields of every in-scope relation, or just those of
    /// `table` when `Some` (`t.*` expansion) — `(expr, output_name)`
    /// pairs in declaration order.
    pub fn expand_star(&self, table: Option<&str>) -> Result<Vec<(Expr, String)>> {
        let mut out = Vec::new();
        let mut any_matched = table.is_none();
        for entry in &self.scope {
            if let Some(q) = table {
                if !entry.matches_qualifier(q) {
                    continue;
                }
                any_matched = true;
            }
            for f in entry.meta.user_fields.iter().filter(|f| f.visible) {
                let spec = TupleCellSpec {
                    table_name: Some(entry.meta.name.clone()),
                    field_name: f.name.clone(),
                    alias: None,
                    table_alias: entry.alias.clone(),
                };
                out.push((Expr::Field(Rc::new(f.clone()), spec), f.name.clone()));
            }
        }
        if !any_matched {
            return Err(RC::SchemaFieldNotExist);
        }
        Ok(out)
    }
}

/// Bind one parser expression tree to a resolved [`Expr`]. `Subquery`
/// nodes are rejected here — [`crate::statement`] resolves those itself
/// since it alone has the catalog access needed to plan the nested query.
pub fn bind_expr(ctx: &BinderContext, ast: &ExprAst) -> Result<Expr> {
    bind_expr_with(ctx, ast, &mut |_, _| Err(RC::InvalidArgument))
}

/// Same as [`bind_expr`], but `resolve_subquery` is invoked for every
/// `ExprAst::Subquery` node encountered (with the context it should bind
/// against), letting a caller with catalog access — [`crate::statement`]
/// — splice in a fully planned [`Expr::Subquery`].
pub fn bind_expr_with(ctx: &BinderContext, ast: &ExprAst, resolve_subquery: &mut dyn FnMut(&SelectAst, &BinderContext) -> Result<Expr>) -> Result<Expr> {
    match ast {
        ExprAst::Star => Ok(Expr::Star),
        ExprAst::Field { table: _, name } if name == "*" => Ok(Expr::Star),
        ExprAst::Field { table, name } => {
            let (entry, field) = ctx.resolve_field(table.as_deref(), name)?;
            let spec = TupleCellSpec {
                table_name: Some(entry.meta.name.clone()),
                field_name: field.name.clone(),
                alias: None,
                table_alias: entry.alias.clone(),
            };
            let _ = entry.display_name();
            Ok(Expr::Field(Rc::new(field), spec))
        }
        ExprAst::Value(v) => Ok(Expr::Value(v.clone())),
        ExprAst::ValueList(items) => {
            let values = items
                .iter()
                .map(|i| match i {
                    ExprAst::Value(v) => Ok(v.clone()),
                    _ => Err(RC::InvalidArgument),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Expr::ValueList(values))
        }
        ExprAst::Cast(inner, t) => Ok(Expr::Cast(Box::new(bind_expr_with(ctx, inner, resolve_subquery)?), *t)),
        ExprAst::Neg(inner) => Ok(Expr::Arithmetic(ArithOp::Neg, Box::new(bind_expr_with(ctx, inner, resolve_subquery)?), None)),
        ExprAst::Arith(op, l, r) => Ok(Expr::Arithmetic(
            *op,
            Box::new(bind_expr_with(ctx, l, resolve_subquery)?),
            Some(Box::new(bind_expr_with(ctx, r, resolve_subquery)?)),
        )),
        ExprAst::Agg(kind, arg) => {
            let inner = match arg {
                Some(a) => Some(Box::new(bind_expr_with(ctx, a, resolve_subquery)?)),
                None => None,
            };
            Ok(Expr::Aggregation(*kind, inner))
        }
        ExprAst::Comparison { op, left, right } => {
            let l = bind_expr_with(ctx, left, resolve_subquery)?;
            let r = match right {
                Some(r) => Some(Box::new(bind_expr_with(ctx, r, resolve_subquery)?)),
                None => None,
            };
            Ok(Expr::Comparison(*op, Box::new(l), r))
        }
        ExprAst::Conjunction(kind, children) => {
            let bound = children.iter().map(|c| bind_expr_with(ctx, c, resolve_subquery)).collect::<Result<Vec<_>>>()?;
            Ok(Expr::Conjunction(*kind, bound))
        }
        ExprAst::Like { inner, pattern, negated } => Ok(Expr::Like(Box::new(bind_expr_with(ctx, inner, resolve_subquery)?), pattern.clone(), *negated)),
        ExprAst::VectorDistance { kind, left, right } => Ok(Expr::VectorDistance(
            *kind,
            Box::new(bind_expr_with(ctx, left, resolve_subquery)?),
            Box::new(bind_expr_with(ctx, right, resolve_subquery)?),
        )),
        ExprAst::IsNull(inner) => Ok(Expr::Is(Box::new(bind_expr_with(ctx, inner, resolve_subquery)?), Box::new(IsKind::Null))),
        ExprAst::IsNotNull(inner) => Ok(Expr::Is(Box::new(bind_expr_with(ctx, inner, resolve_subquery)?), Box::new(IsKind::NotNull))),
        ExprAst::IsTrue(inner) => Ok(Expr::Is(Box::new(bind_expr_with(ctx, inner, resolve_subquery)?), Box::new(IsKind::True))),
        ExprAst::IsFalse(inner) => Ok(Expr::Is(Box::new(bind_expr_with(ctx, inner, resolve_subquery)?), Box::new(IsKind::False))),
        ExprAst::Subquery(select) => resolve_subquery(select, ctx),
        ExprAst::Placeholder => Ok(Expr::SpecialPlaceholder),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{FieldMeta as FM, SYS_HEADER_LEN};
    use crate::value::AttrType;

    fn scope() -> Vec<ScopeEntry> {
        let fields = vec![FM::new("a", AttrType::Ints, SYS_HEADER_LEN + 1, 4, 0, false, "t")];
        vec![ScopeEntry::new(Rc::new(TableMeta::new(1, "t", fields)), Some("t".into()))]
    }

    #[test]
    fn resolves_unqualified_unique_field() {
        let ctx = BinderContext::new(scope());
        let bound = bind_expr(&ctx, &ExprAst::field("a")).unwrap();
        assert!(matches!(bound, Expr::Field(..)));
    }

    #[test]
    fn ambiguous_field_across_two_tables_fails() {
        let fields = vec![FieldMeta::new("a", AttrType::Ints, SYS_HEADER_LEN + 1, 4, 0, false, "u")];
        let mut s = scope();
        s.push(ScopeEntry::new(Rc::new(TableMeta::new(2, "u", fields)), Some("u".into())));
        let ctx = BinderContext::new(s);
        assert!(bind_expr(&ctx, &ExprAst::field("a")).is_err());
    }

    #[test]
    fn qualified_reference_disambiguates() {
        let fields = vec![FieldMeta::new("a", AttrType::Ints, SYS_HEADER_LEN + 1, 4, 0, false, "u")];
        let mut s = scope();
        s.push(ScopeEntry::new(Rc::new(TableMeta::new(2, "u", fields)), Some("u".into())));
        let ctx = BinderContext::new(s);
        let bound = bind_expr(&ctx, &ExprAst::qfield("t", "a")).unwrap();
        assert!(matches!(bound, Expr::Field(..)));
    }

    #[test]
    fn subquery_field_resolves_against_outer_scope() {
        let outer_ctx = BinderContext::new(scope());
        let inner_scope: Vec<ScopeEntry> = Vec::new();
        let inner_ctx = outer_ctx.child_scope(inner_scope);
        let bound = bind_expr(&inner_ctx, &ExprAst::qfield("t", "a")).unwrap();
        assert!(matches!(bound, Expr::Field(..)));
    }
}
