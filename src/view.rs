//! Views: named, stored `SELECT`s. A view's definition is persisted in a
//! hidden system table (`__miniob_views__`) so it survives a process
//! restart; the binder (see [`crate::binder`]) expands a view reference
//! into its `select_ast` the same way it would expand any other relation.

use crate::ast::SelectAst;
use crate::meta::{build_user_fields, TableMeta};
use crate::rc::{Result, RC};
use crate::table::Table;
use crate::value::{AttrType, Value};
use rustc_hash::FxHashMap as HashMap;
use std::rc::Rc;

/// A named, stored query plus the bookkeeping needed to route writes
/// through it when it is updatable.
#[derive(Debug, Clone)]
pub struct View {
    pub name: String,
    pub definition_sql: String,
    pub select_ast: SelectAst,
    pub declared_columns: Vec<String>,
    /// True when the view is a single-table, aggregate-free, join-free
    /// projection — the only shape this engine routes INSERT/UPDATE/DELETE
    /// through (§9 Open Question).
    pub is_updatable: bool,
    pub base_tables: Vec<String>,
}

impl View {
    pub const SYSTEM_TABLE: &'static str = "__miniob_views__";

    pub fn new(name: &str, definition_sql: &str, select_ast: SelectAst, declared_columns: Vec<String>) -> Self {
        let base_tables: Vec<String> = select_ast.relations.iter().map(|r| r.name.clone()).collect();
        let is_updatable = base_tables.len() == 1
            && select_ast.group_by.is_empty()
            && select_ast.havings.is_empty()
            && select_ast.expressions.iter().all(|item| matches!(item.expr, crate::ast::ExprAst::Field { .. } | crate::ast::ExprAst::Star));
        Self { name: name.to_string(), definition_sql: definition_sql.to_string(), select_ast, declared_columns, is_updatable, base_tables }
    }

    /// Schema of the hidden system table backing every view's definition.
    fn system_table_meta(id: u64) -> TableMeta {
        let specs: Vec<(&str, AttrType, Option<usize>, bool)> = vec![
            ("view_name", AttrType::Chars, Some(64), false),
            ("definition_sql", AttrType::Texts, None, false),
            ("select_ast_json", AttrType::Texts, None, false),
            ("is_updatable", AttrType::Booleans, None, false),
            ("declared_columns", AttrType::Texts, None, false),
            ("base_tables", AttrType::Texts, None, false),
        ];
        TableMeta::new(id, Self::SYSTEM_TABLE, build_user_fields(Self::SYSTEM_TABLE, &specs))
    }

    /// Open (creating if absent) the system table that backs view
    /// definitions, for use by both `Catalog::open` and `create_view`.
    pub fn open_system_table(cat: &crate::catalog::Catalog) -> Result<Rc<Table>> {
        if let Some(t) = cat.table(Self::SYSTEM_TABLE) {
            return Ok(t);
        }
        let id = cat.allocate_table_id();
        let meta = Self::system_table_meta(id);
        meta.save(&cat.base_dir)?;
        let table = Table::open(&cat.base_dir, meta)?;
        Ok(cat.register_table(table))
    }

    /// Append this view's row to the system table.
    pub fn persist(&self, cat: &crate::catalog::Catalog) -> Result<()> {
        let table = Self::open_system_table(cat)?;
        let ast_json = serde_json::to_string(&self.select_ast).map_err(|_| RC::Internal)?;
        let values = vec![
            Value::Chars(Rc::new(self.name.clone())),
            Value::Chars(Rc::new(self.definition_sql.clone())),
            Value::Chars(Rc::new(ast_json)),
            Value::Bool(self.is_updatable),
            Value::Chars(Rc::new(self.declared_columns.join(","))),
            Value::Chars(Rc::new(self.base_tables.join(","))),
        ];
        let record = table.make_record(&values)?;
        table.insert(record)?;
        Ok(())
    }

    /// Load every view row out of the system table, used once at
    /// `Catalog::open` time.
    pub fn load_all(cat: &crate::catalog::Catalog) -> Result<HashMap<String, Rc<View>>> {
        let table = match cat.table(Self::SYSTEM_TABLE) {
            Some(t) => t,
            None => return Ok(HashMap::default()),
        };
        let mut views = HashMap::default();
        for (rid, _) in table.scan()? {
            let values = table.row_values(rid)?;
            let name = as_chars(&values[0])?;
            let definition_sql = as_chars(&values[1])?;
            let ast_json = as_chars(&values[2])?;
            let is_updatable = matches!(values[3], Value::Bool(true));
            let declared_columns: Vec<String> = split_csv(&as_chars(&values[4])?);
            let base_tables: Vec<String> = split_csv(&as_chars(&values[5])?);
            let select_ast: SelectAst = serde_json::from_str(&ast_json).map_err(|_| RC::Internal)?;
            let view = View { name: name.clone(), definition_sql, select_ast, declared_columns, is_updatable, base_tables };
            views.insert(name, Rc::new(view));
        }
        Ok(views)
    }
}

fn as_chars(v: &Value) -> Result<String> {
    match v {
        Value::Chars(s) => Ok(s.as_str().to_string()),
        Value::Text(t) => Ok(t.data.as_deref().cloned().unwrap_or_default()),
        _ => Err(RC::SchemaFieldTypeMismatch),
    }
}

fn split_csv(s: &str) -> Vec<String> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split(',').map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprAst, RelationRef, SelectAst, SelectItem};
    use crate::catalog::Catalog;
    use tempfile::tempdir;

    fn sample_select() -> SelectAst {
        SelectAst {
            relations: vec![RelationRef::new("t", None)],
            expressions: vec![SelectItem::new(ExprAst::field("a"), None)],
            ..Default::default()
        }
    }

    #[test]
    fn single_table_projection_is_updatable() {
        let view = View::new("v", "SELECT a FROM t", sample_select(), vec!["a".into()]);
        assert!(view.is_updatable);
        assert_eq!(view.base_tables, vec!["t".to_string()]);
    }

    #[test]
    fn persists_and_reloads_through_catalog() {
        let dir = tempdir().unwrap();
        let cat = Catalog::open(dir.path()).unwrap();
        let view = View::new("v", "SELECT a FROM t", sample_select(), vec!["a".into()]);
        view.persist(&cat).unwrap();

        let reopened = Catalog::open(dir.path()).unwrap();
        let loaded = reopened.view("v").expect("view reloaded");
        assert_eq!(loaded.definition_sql, "SELECT a FROM t");
        assert!(loaded.is_updatable);
        assert_eq!(loaded.select_ast.relations[0].name, "t");
    }
}
