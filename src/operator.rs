//! Pull-based physical operator protocol. Every operator in `op_*` trees
//! uniquely owns its children — no parent back-pointers — and receives
//! cross-cutting context (the outer tuple for correlated subqueries, the
//! transaction) explicitly through `open`/`next`/`set_outer_tuple` rather
//! than through shared state.

use crate::rc::{Result, RC};
use crate::trx::Trx;
use crate::tuple::Tuple;

/// A batch of column values, the unit of vectorized execution. Only the
/// operators named in §4.5 (`TableScan, Project, GroupBy, Explain`) use
/// this; all others operate row-at-a-time via [`PhysicalOperator`].
pub struct Chunk {
    pub tuples: Vec<Tuple>,
}

/// Common contract every physical operator implements.
pub trait PhysicalOperator {
    /// Open this operator and its children against `trx`.
    fn open(&mut self, trx: &dyn Trx) -> Result<()>;

    /// Advance to the next row. `Err(RC::RecordEof)` is the non-error
    /// terminal signal, not a real error.
    fn next(&mut self) -> Result<()>;

    /// The tuple produced by the most recent successful `next`.
    fn current_tuple(&self) -> Option<&Tuple>;

    fn close(&mut self) -> Result<()>;

    /// Propagate the outer row of a correlated subquery. Default
    /// implementation is a no-op; operators with children must forward it.
    fn set_outer_tuple(&mut self, _outer: Option<Tuple>) {}
}

/// Drain `op` fully into a `Vec<Tuple>`, used by blocking operators
/// (`OrderBy`, `HashGroupBy`) that must consume the entire child stream
/// before producing their first row.
pub fn drain_all(op: &mut dyn PhysicalOperator) -> Result<Vec<Tuple>> {
    let mut out = Vec::new();
    loop {
        match op.next() {
            Ok(()) => {
                if let Some(t) = op.current_tuple() {
                    out.push(t.clone());
                }
            }
            Err(RC::RecordEof) => break,
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}
