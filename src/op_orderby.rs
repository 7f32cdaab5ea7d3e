//! Materializing sort. NULLs sort first regardless of ASC/DESC; the sort
//! itself is stable so equal-key rows retain producer order.

use crate::expr::Expr;
use crate::operator::{drain_all, PhysicalOperator};
use crate::rc::{Result, RC};
use crate::trx::{SimpleTrx, Trx};
use crate::tuple::Tuple;
use std::cmp::Ordering;

pub struct OrderByKey {
    pub expr: Expr,
    pub desc: bool,
}

pub struct OrderBy {
    child: Box<dyn PhysicalOperator>,
    keys: Vec<OrderByKey>,
    rows: Vec<Tuple>,
    pos: usize,
    current: Option<Tuple>,
}

impl OrderBy {
    pub fn new(child: Box<dyn PhysicalOperator>, keys: Vec<OrderByKey>) -> Self {
        Self { child, keys, rows: Vec::new(), pos: 0, current: None }
    }
}

impl PhysicalOperator for OrderBy {
    fn open(&mut self, trx: &dyn Trx) -> Result<()> {
        self.child.open(trx)?;
        let mut rows = drain_all(self.child.as_mut())?;
        let sql_trx = SimpleTrx;
        let mut err = None;
        rows.sort_by(|a, b| {
            for key in &self.keys {
                let av = match key.expr.get_value(a, &sql_trx) {
                    Ok(v) => v,
                    Err(e) => {
                        err = Some(e);
                        return Ordering::Equal;
                    }
                };
                let bv = match key.expr.get_value(b, &sql_trx) {
                    Ok(v) => v,
                    Err(e) => {
                        err = Some(e);
                        return Ordering::Equal;
                    }
                };
                let ord = match (av.is_null(), bv.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    (false, false) => av.compare(&bv).unwrap_or(Ordering::Equal),
                };
                let ord = if key.desc && !av.is_null() && !bv.is_null() { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        if let Some(e) = err {
            return Err(e);
        }
        self.rows = rows;
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        if self.pos >= self.rows.len() {
            self.current = None;
            return Err(RC::RecordEof);
        }
        self.current = Some(self.rows[self.pos].clone());
        self.pos += 1;
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
