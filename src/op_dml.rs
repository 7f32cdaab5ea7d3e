//! DML sink operators: Insert, Delete, Update. Each drains its child and
//! drives writes through the `Trx` contract; view variants route each row
//! to its owning base table using the tuple cells' stored provenance.

use crate::expr::Expr;
use crate::operator::PhysicalOperator;
use crate::rc::{Result, RC};
use crate::table::Table;
use crate::trx::Trx;
use crate::tuple::{Cell, Tuple};
use crate::value::Value;
use rustc_hash::FxHashMap as HashMap;
use std::rc::Rc;

/// Inserts rows built from value-list expressions into a single base table.
pub struct Insert {
    table: Rc<Table>,
    rows: Vec<Vec<Expr>>,
    pos: usize,
    current: Option<Tuple>,
    inserted: usize,
}

impl Insert {
    pub fn new(table: Rc<Table>, rows: Vec<Vec<Expr>>) -> Self {
        Self { table, rows, pos: 0, current: None, inserted: 0 }
    }

    pub fn inserted_count(&self) -> usize {
        self.inserted
    }
}

impl PhysicalOperator for Insert {
    fn open(&mut self, _trx: &dyn Trx) -> Result<()> {
        self.pos = 0;
        self.inserted = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        if self.pos >= self.rows.len() {
            self.current = None;
            return Err(RC::RecordEof);
        }
        let trx_dummy = crate::trx::SimpleTrx;
        let placeholder = Tuple::ValueList(Vec::new());
        let values: Vec<Value> = self.rows[self.pos]
            .iter()
            .map(|e| e.get_value(&placeholder, &trx_dummy))
            .collect::<Result<_>>()?;
        let casted: Vec<Value> = values
            .into_iter()
            .zip(self.table.meta().user_fields.iter())
            .map(|(v, f)| if v.is_null() { Ok(v) } else { v.cast_to(f.attr_type) })
            .collect::<Result<_>>()?;
        let record = self.table.make_record(&casted)?;
        let rid = self.table.insert(record)?;
        self.pos += 1;
        self.inserted += 1;
        self.current = Some(Tuple::ValueList(vec![Cell { value: Value::Int(rid.slot_no as i32), rid: Some(rid), table_name: Some(self.table.meta().name.clone()) }]));
        Ok(())
    }

    fn current_tuple(&self) -> Option<&Tuple> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Drains the child and deletes each row's underlying RID.
pub struct Delete {
    child: Box<dyn PhysicalOperator>,
    table: Rc<Table>,
    current: Option<Tuple>,
    deleted: usize,
}

impl Delete {
    pub fn new(child: Box<dyn PhysicalOperator>, table: Rc<Table>) -> Self {
        Self { child, table, current: None, deleted: 0 }
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted
    }
}

impl PhysicalOperator for Delete {
    fn open(&mut self, trx: &dyn Trx) -> Result<()> {
        self.child.open(trx)?;
        self.deleted = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        self.child.next()?;
        let tuple = self.child.current_tuple().ok_or(RC::Internal)?;
        let rid = first_rid(tuple).ok_or(RC::Internal)?;
        self.table.delete(rid)?;
        self.deleted += 1;
        self.current = Some(tuple.clone());
        Ok(())
    }

    fn current_tuple(&self) -> Option<&Tuple> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}

/// One `SET col = expr` assignment.
pub struct Assignment {
    pub field_index: usize,
    pub expr: Expr,
}

/// Drains the child; for each row, evaluates SET expressions, casts, checks
/// NOT NULL, and rewrites the record via `Table::visit_record` plus index
/// maintenance.
pub struct Update {
    child: Box<dyn PhysicalOperator>,
    table: Rc<Table>,
    assignments: Vec<Assignment>,
    current: Option<Tuple>,
    updated: usize,
}

impl Update {
    pub fn new(child: Box<dyn PhysicalOperator>, table: Rc<Table>, assignments: Vec<Assignment>) -> Self {
        Self { child, table, assignments, current: None, updated: 0 }
    }

    pub fn updated_count(&self) -> usize {
        self.updated
    }
}

impl PhysicalOperator for Update {
    fn open(&mut self, trx: &dyn Trx) -> Result<()> {
        self.child.open(trx)?;
        self.updated = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        self.child.next()?;
        let tuple = self.child.current_tuple().ok_or(RC::Internal)?.clone();
        let rid = first_rid(&tuple).ok_or(RC::Internal)?;
        let meta = self.table.meta().clone();
        let old_record = self.table.get(rid)?;
        let old_values = old_record.all_fields(&meta)?;
        let trx_dummy = crate::trx::SimpleTrx;
        let mut new_values = old_values.clone();
        for a in &self.assignments {
            let v = a.expr.get_value(&tuple, &trx_dummy)?;
            let field = meta.user_fields.get(a.field_index).ok_or(RC::SchemaFieldNotExist)?;
            let casted = if v.is_null() { v } else { v.cast_to(field.attr_type)? };
            if casted.is_null() && !field.nullable {
                return Err(RC::InvalidArgument);
            }
            new_values[a.field_index] = casted;
        }
        let new_record = self.table.make_record(&new_values)?;
        self.table.visit_record(rid, &mut |r: &mut crate::record::Record| {
            *r = new_record.clone();
        })?;
        self.table.update_index(&old_values, &new_values, rid)?;
        self.updated += 1;
        self.current = Some(tuple);
        Ok(())
    }

    fn current_tuple(&self) -> Option<&Tuple> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}

fn first_rid(tuple: &Tuple) -> Option<crate::record::Rid> {
    match tuple {
        Tuple::Row { rid, .. } => Some(*rid),
        Tuple::ValueList(cells) => cells.first().and_then(|c| c.rid),
        Tuple::Joined { left, .. } => first_rid(left),
        Tuple::Project { cells, .. } => cells.first().and_then(|c| c.rid),
        Tuple::Expression(cells) => cells.first().and_then(|c| c.rid),
    }
}

/// Routes writes for an updatable view across its base tables, by the
/// `(table_name, rid)` each row cell carries. Best-effort: the first
/// failing base-table write aborts the remaining ones (§9 Open Question).
pub struct ViewUpdate {
    child: Box<dyn PhysicalOperator>,
    base_tables: HashMap<String, Rc<Table>>,
    assignments: Vec<(String, usize, Expr)>, // (base table name, field_index, expr)
    current: Option<Tuple>,
}

impl ViewUpdate {
    pub fn new(child: Box<dyn PhysicalOperator>, base_tables: HashMap<String, Rc<Table>>, assignments: Vec<(String, usize, Expr)>) -> Result<Self> {
        let distinct: std::collections::HashSet<&str> = assignments.iter().map(|(t, _, _)| t.as_str()).collect();
        if distinct.len() > 1 {
            return Err(RC::Unsupported);
        }
        Ok(Self { child, base_tables, assignments, current: None })
    }
}

impl PhysicalOperator for ViewUpdate {
    fn open(&mut self, trx: &dyn Trx) -> Result<()> {
        self.child.open(trx)
    }

    fn next(&mut self) -> Result<()> {
        self.child.next()?;
        let tuple = self.child.current_tuple().ok_or(RC::Internal)?.clone();
        let trx_dummy = crate::trx::SimpleTrx;
        for (table_name, field_index, expr) in &self.assignments {
            let table = self.base_tables.get(table_name).ok_or(RC::SchemaTableNotExist)?;
            let rid = find_rid_for_table(&tuple, table_name).ok_or(RC::Internal)?;
            let meta = table.meta().clone();
            let old_record = table.get(rid)?;
            let mut values = old_record.all_fields(&meta)?;
            let v = expr.get_value(&tuple, &trx_dummy)?;
            let field = meta.user_fields.get(*field_index).ok_or(RC::SchemaFieldNotExist)?;
            let casted = if v.is_null() { v } else { v.cast_to(field.attr_type)? };
            let old_values = values.clone();
            values[*field_index] = casted;
            let new_record = table.make_record(&values)?;
            table.visit_record(rid, &mut |r: &mut crate::record::Record| *r = new_record.clone())?;
            table.update_index(&old_values, &values, rid)?;
        }
        self.current = Some(tuple);
        Ok(())
    }

    fn current_tuple(&self) -> Option<&Tuple> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}

fn find_rid_for_table(tuple: &Tuple, table_name: &str) -> Option<crate::record::Rid> {
    match tuple {
        Tuple::Row { schema, rid, .. } if schema.table_name == table_name => Some(*rid),
        Tuple::Joined { left, right } => find_rid_for_table(left, table_name).or_else(|| find_rid_for_table(right, table_name)),
        Tuple::Row { cells, .. } => cells.iter().find(|c| c.table_name.as_deref() == Some(table_name)).and_then(|c| c.rid),
        Tuple::Project { cells, .. } => cells.iter().find(|c| c.table_name.as_deref() == Some(table_name)).and_then(|c| c.rid),
        _ => None,
    }
}
