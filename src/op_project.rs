//! Evaluates projection expressions against each child tuple; enforces
//! LIMIT by stopping after k rows.

use crate::expr::Expr;
use crate::operator::PhysicalOperator;
use crate::rc::{Result, RC};
use crate::trx::{SimpleTrx, Trx};
use crate::tuple::{Cell, Tuple};

pub struct ProjectItem {
    pub expr: Expr,
    pub name: String,
}

pub struct Project {
    child: Box<dyn PhysicalOperator>,
    items: Vec<ProjectItem>,
    limit: Option<usize>,
    emitted: usize,
    current: Option<Tuple>,
}

impl Project {
    pub fn new(child: Box<dyn PhysicalOperator>, items: Vec<ProjectItem>, limit: Option<usize>) -> Self {
        Self { child, items, limit, emitted: 0, current: None }
    }
}

impl PhysicalOperator for Project {
    fn open(&mut self, trx: &dyn Trx) -> Result<()> {
        self.child.open(trx)?;
        self.emitted = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        if let Some(limit) = self.limit {
            if self.emitted >= limit {
                self.current = None;
                return Err(RC::RecordEof);
            }
        }
        self.child.next()?;
        let tuple = self.child.current_tuple().ok_or(RC::Internal)?;
        let trx = SimpleTrx;
        let mut cells = Vec::with_capacity(self.items.len());
        let mut names = Vec::with_capacity(self.items.len());
        for item in &self.items {
            // Plain field projections keep the source cell's rid/table_name
            // so updatable views can still route writes back to it.
            let cell = match &item.expr {
                Expr::Field(_, spec) => tuple.find_cell(spec).cloned().unwrap_or_else(|| Cell::plain(crate::value::Value::Null)),
                other => Cell::plain(other.get_value(tuple, &trx)?),
            };
            cells.push(cell);
            names.push(item.name.clone());
        }
        self.current = Some(Tuple::Project { names, cells });
        self.emitted += 1;
        Ok(())
    }

    fn current_tuple(&self) -> Option<&Tuple> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }

    fn set_outer_tuple(&mut self, outer: Option<Tuple>) {
        self.child.set_outer_tuple(outer);
    }
}
