//! Generic boolean-expression filter sitting above a child operator.

use crate::expr::Expr;
use crate::operator::PhysicalOperator;
use crate::rc::{Result, RC};
use crate::trx::Trx;
use crate::tuple::Tuple;
use crate::value::Value;

pub struct Predicate {
    child: Box<dyn PhysicalOperator>,
    cond: Expr,
}

impl Predicate {
    pub fn new(child: Box<dyn PhysicalOperator>, cond: Expr) -> Self {
        Self { child, cond }
    }
}

impl PhysicalOperator for Predicate {
    fn open(&mut self, trx: &dyn Trx) -> Result<()> {
        self.child.open(trx)
    }

    fn next(&mut self) -> Result<()> {
        loop {
            self.child.next()?;
            let tuple = self.child.current_tuple().ok_or(RC::Internal)?;
            if matches!(self.cond.get_value(tuple, &crate::trx::SimpleTrx)?, Value::Bool(true)) {
                return Ok(());
            }
        }
    }

    fn current_tuple(&self) -> Option<&Tuple> {
        self.child.current_tuple()
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }

    fn set_outer_tuple(&mut self, outer: Option<Tuple>) {
        self.child.set_outer_tuple(outer);
    }
}
