//! Transaction contract: an external collaborator per §6. The core calls
//! `insert_record`/`delete_record`/`visit_record`; it never implements the
//! buffer-pool/WAL machinery behind them. [`SimpleTrx`] is a minimal
//! default that applies writes directly, suitable for the educational
//! scope this crate targets (no isolation, no rollback log).

use crate::meta::TableMeta;
use crate::rc::Result;
use crate::record::{Record, Rid};
use crate::table::Table;

/// External transaction contract the physical operators drive writes
/// through.
pub trait Trx {
    fn insert_record(&self, table: &Table, record: Record) -> Result<Rid>;
    fn delete_record(&self, table: &Table, rid: Rid) -> Result<()>;
    fn visit_record(&self, table: &Table, rid: Rid, f: &mut dyn FnMut(&mut Record)) -> Result<()>;
}

/// Default transaction: directly applies each write with no deferred
/// commit/rollback log. Good enough for single-statement autocommit.
pub struct SimpleTrx;

impl Trx for SimpleTrx {
    fn insert_record(&self, table: &Table, record: Record) -> Result<Rid> {
        table.insert(record)
    }

    fn delete_record(&self, table: &Table, rid: Rid) -> Result<()> {
        table.delete(rid)
    }

    fn visit_record(&self, table: &Table, rid: Rid, f: &mut dyn FnMut(&mut Record)) -> Result<()> {
        table.visit_record(rid, f)
    }
}

/// Accessor kept separate from `Trx` itself so operators that only need
/// read access to catalog metadata don't have to thread a `Trx` through.
pub fn table_meta(table: &Table) -> &TableMeta {
    table.meta()
}
