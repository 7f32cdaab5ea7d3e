//! `CALC`: evaluates a list of constant expressions with no FROM clause,
//! emitting their values as a single row, then EOF. Used for one-off
//! arithmetic (`CALC 1+2, 3*4`), mirroring the source's `calc_stmt`.

use crate::expr::Expr;
use crate::operator::PhysicalOperator;
use crate::rc::{Result, RC};
use crate::trx::{SimpleTrx, Trx};
use crate::tuple::{Cell, Tuple};

pub struct Calc {
    exprs: Vec<Expr>,
    current: Option<Tuple>,
    emitted: bool,
}

impl Calc {
    pub fn new(exprs: Vec<Expr>) -> Self {
        Self { exprs, current: None, emitted: false }
    }
}

impl PhysicalOperator for Calc {
    fn open(&mut self, _trx: &dyn Trx) -> Result<()> {
        self.emitted = false;
        self.current = None;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        if self.emitted {
            self.current = None;
            return Err(RC::RecordEof);
        }
        let placeholder = Tuple::ValueList(Vec::new());
        let trx = SimpleTrx;
        let cells = self.exprs.iter().map(|e| e.get_value(&placeholder, &trx).map(Cell::plain)).collect::<Result<_>>()?;
        self.current = Some(Tuple::Expression(cells));
        self.emitted = true;
        Ok(())
    }

    fn current_tuple(&self) -> Option<&Tuple> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ArithOp};
    use crate::value::Value;

    #[test]
    fn evaluates_constant_exprs_into_one_row() {
        let exprs = vec![Expr::Arithmetic(ArithOp::Add, Box::new(Expr::Value(Value::Int(1))), Some(Box::new(Expr::Value(Value::Int(2)))))];
        let mut op = Calc::new(exprs);
        op.open(&crate::trx::SimpleTrx).unwrap();
        op.next().unwrap();
        let tuple = op.current_tuple().unwrap();
        assert_eq!(tuple.cell_at(0).unwrap().value, Value::Int(3));
        assert!(matches!(op.next(), Err(RC::RecordEof)));
    }
}
