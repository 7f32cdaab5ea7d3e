//! `EXPLAIN`: a leaf operator that emits the physical plan's rendered
//! description as a single row, then EOF. The description text itself is
//! built once by [`crate::physical::describe`] at plan-build time; this
//! operator only has to replay it through the pull protocol.

use crate::operator::PhysicalOperator;
use crate::rc::{Result, RC};
use crate::trx::Trx;
use crate::tuple::{Cell, Tuple};
use crate::value::Value;
use std::rc::Rc;

pub struct Explain {
    text: String,
    current: Option<Tuple>,
    emitted: bool,
}

impl Explain {
    pub fn new(text: String) -> Self {
        Self { text, current: None, emitted: false }
    }
}

impl PhysicalOperator for Explain {
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
        self.emitted = true;
        self.current = Some(Tuple::Expression(vec![Cell::plain(Value::Chars(Rc::new(self.text.clone())))]));
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

    #[test]
    fn emits_one_row_then_eof() {
        let mut op = Explain::new("TableScan(t, filters=0)".to_string());
        op.open(&crate::trx::SimpleTrx).unwrap();
        op.next().unwrap();
        assert_eq!(op.current_tuple().unwrap().cell_num(), 1);
        assert!(matches!(op.next(), Err(RC::RecordEof)));
    }
}
