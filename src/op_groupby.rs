//! Scalar (no grouping keys) and hash (grouping keys) aggregation.

use crate::expr::{AggKind, Aggregator, Expr};
use crate::operator::{drain_all, PhysicalOperator};
use crate::rc::{Result, RC};
use crate::trx::{SimpleTrx, Trx};
use crate::tuple::{Cell, Tuple};
use crate::value::Value;
use rustc_hash::FxHashMap;

/// One aggregate target: its kind plus the (optional) expression it feeds.
pub struct AggSpec {
    pub kind: AggKind,
    pub expr: Option<Expr>,
}

/// No grouping keys: one row of aggregates over the whole child stream.
/// `COUNT` over empty input is 0; `SUM/AVG/MAX/MIN` over empty input is NULL.
pub struct ScalarGroupBy {
    child: Box<dyn PhysicalOperator>,
    specs: Vec<AggSpec>,
    current: Option<Tuple>,
    emitted: bool,
}

impl ScalarGroupBy {
    pub fn new(child: Box<dyn PhysicalOperator>, specs: Vec<AggSpec>) -> Self {
        Self { child, specs, current: None, emitted: false }
    }
}

impl PhysicalOperator for ScalarGroupBy {
    fn open(&mut self, trx: &dyn Trx) -> Result<()> {
        self.child.open(trx)?;
        self.emitted = false;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        if self.emitted {
            self.current = None;
            return Err(RC::RecordEof);
        }
        let mut aggs: Vec<Aggregator> = self.specs.iter().map(|s| Aggregator::new(s.kind)).collect();
        let trx = SimpleTrx;
        loop {
            match self.child.next() {
                Ok(()) => {
                    let tuple = self.child.current_tuple().ok_or(RC::Internal)?;
                    for (spec, agg) in self.specs.iter().zip(aggs.iter_mut()) {
                        match &spec.expr {
                            Some(e) => {
                                let v = e.get_value(tuple, &trx)?;
                                agg.accumulate(Some(&v));
                            }
                            None => agg.accumulate(None),
                        }
                    }
                }
                Err(RC::RecordEof) => break,
                Err(e) => return Err(e),
            }
        }
        let cells = aggs.iter().map(|a| Cell::plain(a.finish())).collect();
        self.current = Some(Tuple::Expression(cells));
        self.emitted = true;
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

/// Groups rows by the tuple of grouping-key values; each bucket owns its
/// own aggregator set. Buckets are emitted in first-seen (insertion) order.
pub struct HashGroupBy {
    child: Box<dyn PhysicalOperator>,
    keys: Vec<Expr>,
    specs: Vec<AggSpec>,
    results: Vec<(Vec<Value>, Vec<Value>)>,
    pos: usize,
    current: Option<Tuple>,
}

impl HashGroupBy {
    pub fn new(child: Box<dyn PhysicalOperator>, keys: Vec<Expr>, specs: Vec<AggSpec>) -> Self {
        Self { child, keys, specs, results: Vec::new(), pos: 0, current: None }
    }
}

impl PhysicalOperator for HashGroupBy {
    fn open(&mut self, trx: &dyn Trx) -> Result<()> {
        self.child.open(trx)?;
        let rows = drain_all(self.child.as_mut())?;
        let trx2 = SimpleTrx;

        let mut order: Vec<Vec<Value>> = Vec::new();
        let mut buckets: FxHashMap<String, Vec<Aggregator>> = FxHashMap::default();
        for tuple in &rows {
            let key_values: Vec<Value> = self.keys.iter().map(|k| k.get_value(tuple, &trx2)).collect::<Result<_>>()?;
            let key_repr = format!("{:?}", key_values);
            let aggs = buckets.entry(key_repr.clone()).or_insert_with(|| {
                order.push(key_values.clone());
                self.specs.iter().map(|s| Aggregator::new(s.kind)).collect()
            });
            for (spec, agg) in self.specs.iter().zip(aggs.iter_mut()) {
                match &spec.expr {
                    Some(e) => agg.accumulate(Some(&e.get_value(tuple, &trx2)?)),
                    None => agg.accumulate(None),
                }
            }
        }

        self.results = order
            .into_iter()
            .map(|key_values| {
                let key_repr = format!("{:?}", key_values);
                let aggs = buckets.remove(&key_repr).unwrap();
                (key_values, aggs.iter().map(|a| a.finish()).collect())
            })
            .collect();
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        if self.pos >= self.results.len() {
            self.current = None;
            return Err(RC::RecordEof);
        }
        let (keys, aggs) = &self.results[self.pos];
        self.pos += 1;
        let cells = keys.iter().chain(aggs.iter()).cloned().map(Cell::plain).collect();
        self.current = Some(Tuple::Expression(cells));
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
