//! Access-method-driving leaf operators: full table scan, B+tree index
//! scan, and IVF vector-index scan.

use crate::expr::{ConjType, Expr};
use crate::operator::PhysicalOperator;
use crate::rc::{Result, RC};
use crate::record::Rid;
use crate::table::Table;
use crate::trx::{SimpleTrx, Trx};
use crate::tuple::Tuple;
use crate::value::Value;
use std::rc::Rc;

/// How residual predicates attached to a scan combine.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    And,
    Or,
}

/// Full table scan with optional residual predicates (left on the scan by
/// the rewriter when they could not be turned into an index bound).
pub struct TableScan {
    table: Rc<Table>,
    alias: Option<String>,
    filters: Vec<Expr>,
    mode: FilterMode,
    rows: Vec<(Rid, crate::record::Record)>,
    pos: usize,
    current: Option<Tuple>,
}

impl TableScan {
    pub fn new(table: Rc<Table>, alias: Option<String>, filters: Vec<Expr>, mode: FilterMode) -> Self {
        Self { table, alias, filters, mode, rows: Vec::new(), pos: 0, current: None }
    }

    fn passes(&self, tuple: &Tuple) -> Result<bool> {
        if self.filters.is_empty() {
            return Ok(true);
        }
        let trx = SimpleTrx;
        match self.mode {
            FilterMode::And => {
                for f in &self.filters {
                    if !matches!(f.get_value(tuple, &trx)?, Value::Bool(true)) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            FilterMode::Or => {
                for f in &self.filters {
                    if matches!(f.get_value(tuple, &trx)?, Value::Bool(true)) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

impl PhysicalOperator for TableScan {
    fn open(&mut self, _trx: &dyn Trx) -> Result<()> {
        self.rows = self.table.scan()?;
        self.pos = 0;
        self.current = None;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        while self.pos < self.rows.len() {
            let rid = self.rows[self.pos].0;
            self.pos += 1;
            let values = self.table.row_values(rid)?;
            let tuple = Tuple::row_with_values(self.table.meta(), self.alias.clone(), rid, values);
            if self.passes(&tuple)? {
                self.current = Some(tuple);
                return Ok(());
            }
        }
        self.current = None;
        Err(RC::RecordEof)
    }

    fn current_tuple(&self) -> Option<&Tuple> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// B+tree range scan over `[left, right]`, plus a residual filter applied
/// identically to `TableScan`.
pub struct IndexScan {
    table: Rc<Table>,
    alias: Option<String>,
    index_name: String,
    left: Option<Vec<Value>>,
    left_inclusive: bool,
    right: Option<Vec<Value>>,
    right_inclusive: bool,
    filters: Vec<Expr>,
    mode: FilterMode,
    rids: Vec<Rid>,
    pos: usize,
    current: Option<Tuple>,
}

impl IndexScan {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        table: Rc<Table>,
        alias: Option<String>,
        index_name: String,
        left: Option<Vec<Value>>,
        left_inclusive: bool,
        right: Option<Vec<Value>>,
        right_inclusive: bool,
        filters: Vec<Expr>,
        mode: FilterMode,
    ) -> Self {
        Self { table, alias, index_name, left, left_inclusive, right, right_inclusive, filters, mode, rids: Vec::new(), pos: 0, current: None }
    }

    fn passes(&self, tuple: &Tuple) -> Result<bool> {
        if self.filters.is_empty() {
            return Ok(true);
        }
        let trx = SimpleTrx;
        let results: Result<Vec<bool>> = self.filters.iter().map(|f| Ok(matches!(f.get_value(tuple, &trx)?, Value::Bool(true)))).collect();
        let results = results?;
        Ok(match self.mode {
            FilterMode::And => results.into_iter().all(|b| b),
            FilterMode::Or => results.into_iter().any(|b| b),
        })
    }
}

impl PhysicalOperator for IndexScan {
    fn open(&mut self, _trx: &dyn Trx) -> Result<()> {
        self.rids = self.table.index_scan(
            &self.index_name,
            self.left.as_deref(),
            self.left_inclusive,
            self.right.as_deref(),
            self.right_inclusive,
        )?;
        self.pos = 0;
        self.current = None;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        while self.pos < self.rids.len() {
            let rid = self.rids[self.pos];
            self.pos += 1;
            let values = self.table.row_values(rid)?;
            let tuple = Tuple::row_with_values(self.table.meta(), self.alias.clone(), rid, values);
            if self.passes(&tuple)? {
                self.current = Some(tuple);
                return Ok(());
            }
        }
        self.current = None;
        Err(RC::RecordEof)
    }

    fn current_tuple(&self) -> Option<&Tuple> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Queries a vector index for the top-k nearest neighbors, then fetches
/// base records by the returned RIDs.
pub struct VectorIndexScan {
    table: Rc<Table>,
    alias: Option<String>,
    index: Rc<crate::vector_index::VectorIndex>,
    query_vec: Vec<f32>,
    k: usize,
    probes: usize,
    rids: Vec<Rid>,
    pos: usize,
    current: Option<Tuple>,
}

impl VectorIndexScan {
    pub fn new(table: Rc<Table>, alias: Option<String>, index: Rc<crate::vector_index::VectorIndex>, query_vec: Vec<f32>, k: usize, probes: usize) -> Self {
        Self { table, alias, index, query_vec, k, probes, rids: Vec::new(), pos: 0, current: None }
    }
}

impl PhysicalOperator for VectorIndexScan {
    fn open(&mut self, _trx: &dyn Trx) -> Result<()> {
        self.rids = self.index.query(&self.query_vec, self.k, self.probes)?;
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        if self.pos >= self.rids.len() {
            self.current = None;
            return Err(RC::RecordEof);
        }
        let rid = self.rids[self.pos];
        self.pos += 1;
        let values = self.table.row_values(rid)?;
        self.current = Some(Tuple::row_with_values(self.table.meta(), self.alias.clone(), rid, values));
        Ok(())
    }

    fn current_tuple(&self) -> Option<&Tuple> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
