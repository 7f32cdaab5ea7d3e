//! Top-level entry point: [`Database`] owns one [`Catalog`] and drives
//! every bound [`crate::statement::Statement`] to completion — SELECT/
//! INSERT/DELETE/UPDATE/EXPLAIN/CALC through rewrite → physical build →
//! the pull-based operator pipeline; DDL and session control directly
//! against the catalog.

use crate::ast::*;
use crate::bplus::BPlusIndex;
use crate::catalog::Catalog;
use crate::logical::LogicalOp;
use crate::meta::{build_user_fields, IndexMeta, TableMeta, VectorIndexMeta};
use crate::operator::drain_all;
use crate::physical;
use crate::rc::{Result, RC};
use crate::rewrite::push_down_predicates;
use crate::statement::{bind_select, Statement};
use crate::table::Table;
use crate::trx::SimpleTrx;
use crate::tuple::Tuple;
use crate::value::Value;
use crate::vector_index::VectorIndex;
use crate::view::View;
use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Row-at-a-time is the only execution path this engine implements; the
/// `Chunk`-batched path named in `operator`'s doc comment for
/// `TableScan`/`Project`/`GroupBy`/`Explain` is left unbuilt (an
/// educational-scope call, not a correctness gap — every operator's
/// pull-based `next` already produces a correct row stream on its own).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    RowAtATime,
    Vectorized,
}

/// Result of one `Database::execute` call.
#[derive(Debug, Clone)]
pub enum ExecResult {
    Rows { columns: Vec<String>, rows: Vec<Vec<Value>> },
    Affected(usize),
    Message(String),
}

/// An open database directory plus the session-level settings that don't
/// belong on any one statement.
pub struct Database {
    pub catalog: Catalog,
    pub mode: ExecutionMode,
    /// Default `probes` for a vector index query that doesn't specify one.
    pub default_probes: u32,
    session_vars: RefCell<HashMap<String, String>>,
}

impl Database {
    pub fn open(base_dir: &Path) -> Result<Self> {
        Ok(Self {
            catalog: Catalog::open(base_dir)?,
            mode: ExecutionMode::default(),
            default_probes: 4,
            session_vars: RefCell::new(HashMap::default()),
        })
    }

    /// Bind and run one parsed statement.
    pub fn execute(&self, node: SqlNode) -> Result<ExecResult> {
        match Statement::create(&self.catalog, node)? {
            Statement::Plan(plan) => self.run_plan(plan),
            Statement::CreateTable(ast) => self.create_table(ast),
            Statement::CreateView(ast) => self.create_view(ast),
            Statement::CreateIndex(ast) => self.create_index(ast),
            Statement::CreateVectorIndex(ast) => self.create_vector_index(ast),
            Statement::DropTable(name) => {
                self.catalog.drop_table(&name)?;
                Ok(ExecResult::Message(format!("table {name} dropped")))
            }
            Statement::DropIndex { table, name } => self.drop_index(&table, &name),
            // Dropping a vector index is a documented Open Question left
            // unimplemented: unlike a B+tree index it is never rebuilt
            // implicitly, so silently accepting the statement would leave
            // a stale index file nothing ever cleans up.
            Statement::DropVectorIndex { .. } => Err(RC::Unimplemented),
            Statement::DescTable(name) => self.desc_table(&name),
            Statement::ShowTables => Ok(ExecResult::Rows {
                columns: vec!["Tables".to_string()],
                rows: self.catalog.table_names().into_iter().map(|n| vec![Value::Chars(Rc::new(n))]).collect(),
            }),
            Statement::Begin => Ok(ExecResult::Message("transaction started".to_string())),
            Statement::Commit => Ok(ExecResult::Message("transaction committed".to_string())),
            Statement::Rollback => Ok(ExecResult::Message("transaction rolled back".to_string())),
            Statement::Exit => Ok(ExecResult::Message("bye".to_string())),
            Statement::Help => Ok(ExecResult::Message(HELP_TEXT.to_string())),
            Statement::SetVariable { name, value } => {
                self.session_vars.borrow_mut().insert(name.clone(), value.clone());
                Ok(ExecResult::Message(format!("{name} = {value}")))
            }
            Statement::LoadData(ast) => self.load_data(ast),
        }
    }

    fn run_plan(&self, plan: LogicalOp) -> Result<ExecResult> {
        let columns = output_columns(&plan);
        let plan = push_down_predicates(plan);
        let mut op = physical::build(&plan)?;
        let trx = SimpleTrx;
        op.open(&trx)?;
        let tuples = drain_all(op.as_mut());
        op.close()?;
        let tuples = tuples?;
        match columns {
            Some(columns) => Ok(ExecResult::Rows { columns, rows: tuples.iter().map(tuple_to_values).collect() }),
            None => Ok(ExecResult::Affected(tuples.len())),
        }
    }

    fn create_table(&self, ast: CreateTableAst) -> Result<ExecResult> {
        if self.catalog.has_relation(&ast.table) {
            return Err(RC::SchemaTableExist);
        }
        let specs: Vec<(&str, crate::value::AttrType, Option<usize>, bool)> =
            ast.columns.iter().map(|c| (c.name.as_str(), c.attr_type, c.len, c.nullable)).collect();
        let mut fields = build_user_fields(&ast.table, &specs);
        for (f, c) in fields.iter_mut().zip(ast.columns.iter()) {
            f.vector_dim = c.vector_dim;
        }
        let id = self.catalog.allocate_table_id();
        let meta = TableMeta::new(id, &ast.table, fields);
        meta.save(&self.catalog.base_dir)?;
        let table = Table::open(&self.catalog.base_dir, meta)?;
        self.catalog.register_table(table);
        Ok(ExecResult::Message(format!("table {} created", ast.table)))
    }

    /// `CreateViewAst` carries no declared-column list of its own (unlike
    /// `CREATE TABLE`) — it is derived here from `bind_select`'s bound
    /// output schema, the same name each column would project under.
    fn create_view(&self, ast: CreateViewAst) -> Result<ExecResult> {
        if self.catalog.has_relation(&ast.name) {
            return Err(RC::SchemaTableExist);
        }
        let (_plan, schema) = bind_select(&self.catalog, &ast.select, None)?;
        let declared_columns: Vec<String> = schema.into_iter().map(|(name, _)| name).collect();
        let view = View::new(&ast.name, &ast.definition_sql, ast.select, declared_columns);
        view.persist(&self.catalog)?;
        self.catalog.register_view(view);
        Ok(ExecResult::Message(format!("view {} created", ast.name)))
    }

    /// `Table::open` never backfills a newly added index against existing
    /// rows, and `Table`'s own metadata isn't mutable in place — so this
    /// builds the index file directly, then swaps in a freshly opened
    /// `Table` over the updated `TableMeta`.
    fn create_index(&self, ast: CreateIndexAst) -> Result<ExecResult> {
        let table = self.catalog.table(&ast.table).ok_or(RC::SchemaTableNotExist)?;
        if table.meta().indexes.iter().any(|i| i.name == ast.name) {
            return Err(RC::SchemaIndexNameRepeat);
        }
        let fields: Vec<_> = ast
            .columns
            .iter()
            .map(|c| table.meta().field(c).cloned().ok_or(RC::SchemaFieldNotExist))
            .collect::<Result<_>>()?;
        let path = TableMeta::index_path(&self.catalog.base_dir, &ast.table, &ast.name);
        let mut idx = BPlusIndex::create(&path, ast.unique);
        for (rid, record) in table.scan()? {
            let values = record.all_fields(table.meta())?;
            let key: Vec<Value> = fields.iter().map(|f| values[f.field_id].clone()).collect();
            idx.insert_entry(&key, rid)?;
        }
        idx.save()?;
        let mut new_meta = table.meta().clone();
        new_meta.indexes.push(IndexMeta { name: ast.name.clone(), fields, unique: ast.unique });
        new_meta.save(&self.catalog.base_dir)?;
        let new_table = Table::open(&self.catalog.base_dir, new_meta)?;
        self.catalog.register_table(new_table);
        Ok(ExecResult::Message(format!("index {} created", ast.name)))
    }

    fn create_vector_index(&self, ast: CreateVectorIndexAst) -> Result<ExecResult> {
        let table = self.catalog.table(&ast.table).ok_or(RC::SchemaTableNotExist)?;
        if table.meta().vector_indexes.iter().any(|i| i.name == ast.name) {
            return Err(RC::SchemaIndexNameRepeat);
        }
        let field = table.meta().field(&ast.column).cloned().ok_or(RC::SchemaFieldNotExist)?;
        let mut rows = Vec::new();
        for (rid, _) in table.scan()? {
            let values = table.row_values(rid)?;
            if let Value::Vector(v) = &values[field.field_id] {
                if let Some(data) = &v.data {
                    rows.push((rid, data.as_ref().clone()));
                }
            }
        }
        let (vecidx_path, aux_path) = TableMeta::vector_index_paths(&self.catalog.base_dir, &ast.table, &ast.name);
        VectorIndex::build(&vecidx_path, &aux_path, ast.distance, ast.lists as usize, rows)?;
        let mut new_meta = table.meta().clone();
        new_meta.vector_indexes.push(VectorIndexMeta { name: ast.name.clone(), field, distance: ast.distance, lists: ast.lists, probes: ast.probes });
        new_meta.save(&self.catalog.base_dir)?;
        let new_table = Table::open(&self.catalog.base_dir, new_meta)?;
        self.catalog.register_table(new_table);
        Ok(ExecResult::Message(format!("vector index {} created", ast.name)))
    }

    fn drop_index(&self, table_name: &str, name: &str) -> Result<ExecResult> {
        let table = self.catalog.table(table_name).ok_or(RC::SchemaTableNotExist)?;
        if !table.meta().indexes.iter().any(|i| i.name == name) {
            return Err(RC::SchemaFieldNotExist);
        }
        let path = TableMeta::index_path(&self.catalog.base_dir, table_name, name);
        let mut new_meta = table.meta().clone();
        new_meta.indexes.retain(|i| i.name != name);
        new_meta.save(&self.catalog.base_dir)?;
        let _ = std::fs::remove_file(path);
        let new_table = Table::open(&self.catalog.base_dir, new_meta)?;
        self.catalog.register_table(new_table);
        Ok(ExecResult::Message(format!("index {name} dropped")))
    }

    fn desc_table(&self, name: &str) -> Result<ExecResult> {
        let table = self.catalog.table(name).ok_or(RC::SchemaTableNotExist)?;
        let rows = table
            .meta()
            .user_fields
            .iter()
            .filter(|f| f.visible)
            .map(|f| {
                vec![
                    Value::Chars(Rc::new(f.name.clone())),
                    Value::Chars(Rc::new(format!("{:?}", f.attr_type))),
                    Value::Int(f.len as i32),
                    Value::Bool(f.nullable),
                ]
            })
            .collect();
        Ok(ExecResult::Rows { columns: vec!["Field".into(), "Type".into(), "Length".into(), "Nullable".into()], rows })
    }

    /// Bulk-load delimited rows from a local file. No partial-failure
    /// recovery: a row that fails to parse or insert aborts the load, and
    /// rows already committed before it stay committed (§9 Open Question —
    /// there is no transaction log here to roll them back through).
    fn load_data(&self, ast: LoadDataAst) -> Result<ExecResult> {
        let table = self.catalog.table(&ast.table).ok_or(RC::SchemaTableNotExist)?;
        let text = std::fs::read_to_string(&ast.path).map_err(|_| RC::IoerrOpen)?;
        let mut count = 0usize;
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() != table.meta().user_fields.len() {
                return Err(RC::SchemaFieldMissing);
            }
            let values: Vec<Value> = parts
                .iter()
                .zip(table.meta().user_fields.iter())
                .map(|(p, f)| if p.eq_ignore_ascii_case("NULL") { Ok(Value::Null) } else { Value::from_str(f.attr_type, p) })
                .collect::<Result<_>>()?;
            let record = table.make_record(&values)?;
            table.insert(record)?;
            count += 1;
        }
        Ok(ExecResult::Affected(count))
    }
}

/// `Some(column names)` for a plan that produces rows (SELECT/EXPLAIN/
/// CALC); `None` for a DML plan, whose tuple count becomes an affected-row
/// total instead.
fn output_columns(plan: &LogicalOp) -> Option<Vec<String>> {
    match plan {
        LogicalOp::Explain { .. } => Some(vec!["PLAN".to_string()]),
        LogicalOp::Calc { exprs } => Some((1..=exprs.len()).map(|i| format!("col{i}")).collect()),
        LogicalOp::Project { items, .. } => Some(items.iter().map(|(_, name)| name.clone()).collect()),
        _ => None,
    }
}

fn tuple_to_values(tuple: &Tuple) -> Vec<Value> {
    (0..tuple.cell_num()).map(|i| tuple.cell_at(i).map(|c| c.value.clone()).unwrap_or(Value::Null)).collect()
}

const HELP_TEXT: &str = "eduql: SELECT/INSERT/DELETE/UPDATE, CREATE/DROP TABLE, CREATE VIEW, \
CREATE/DROP INDEX, CREATE VECTOR INDEX, EXPLAIN, CALC, LOAD DATA, SHOW TABLES, DESC, \
BEGIN/COMMIT/ROLLBACK, SET, EXIT.";
