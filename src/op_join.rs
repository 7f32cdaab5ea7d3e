//! Left-deep nested-loop join. Join predicates are not evaluated here —
//! they live in a parent `Predicate`, per the logical-plan shape rules.

use crate::operator::PhysicalOperator;
use crate::rc::{Result, RC};
use crate::trx::Trx;
use crate::tuple::Tuple;

pub struct NestedLoopJoin {
    left: Box<dyn PhysicalOperator>,
    right: Box<dyn PhysicalOperator>,
    left_tuple: Option<Tuple>,
    current: Option<Tuple>,
    right_started: bool,
}

impl NestedLoopJoin {
    pub fn new(left: Box<dyn PhysicalOperator>, right: Box<dyn PhysicalOperator>) -> Self {
        Self { left, right, left_tuple: None, current: None, right_started: false }
    }
}

impl PhysicalOperator for NestedLoopJoin {
    fn open(&mut self, trx: &dyn Trx) -> Result<()> {
        self.left.open(trx)?;
        match self.left.next() {
            Ok(()) => self.left_tuple = self.left.current_tuple().cloned(),
            Err(RC::RecordEof) => self.left_tuple = None,
            Err(e) => return Err(e),
        }
        self.right.open(trx)?;
        self.right_started = false;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        loop {
            let Some(left_tuple) = self.left_tuple.clone() else {
                self.current = None;
                return Err(RC::RecordEof);
            };
            if !self.right_started {
                self.right_started = true;
            } else {
                // already iterating right for this left row
            }
            match self.right.next() {
                Ok(()) => {
                    let right_tuple = self.right.current_tuple().ok_or(RC::Internal)?.clone();
                    self.current = Some(Tuple::Joined { left: Box::new(left_tuple), right: Box::new(right_tuple) });
                    return Ok(());
                }
                Err(RC::RecordEof) => {
                    match self.left.next() {
                        Ok(()) => {
                            self.left_tuple = self.left.current_tuple().cloned();
                            self.right.close()?;
                            self.right.open(&crate::trx::SimpleTrx)?;
                        }
                        Err(RC::RecordEof) => {
                            self.left_tuple = None;
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn current_tuple(&self) -> Option<&Tuple> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        self.left.close()?;
        self.right.close()
    }

    fn set_outer_tuple(&mut self, outer: Option<Tuple>) {
        self.left.set_outer_tuple(outer.clone());
        self.right.set_outer_tuple(outer);
    }
}
