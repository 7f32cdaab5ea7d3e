//! Runtime row representation pulled through the operator tree. Unlike
//! `TableMeta`/`Record`, tuples are never persisted — each operator
//! produces the variant that fits what it does (`RowTuple` for a raw scan,
//! `JoinedTuple` for a join's concatenated children, and so on) rather
//! than materializing a common representation at every step.

use crate::meta::TableMeta;
use crate::record::{Record, Rid};
use crate::value::Value;
use std::rc::Rc;

/// `(table_name, field_name, alias?, table_alias?)` — what a `Field`
/// expression asks a tuple to resolve.
#[derive(Debug, Clone)]
pub struct TupleCellSpec {
    pub table_name: Option<String>,
    pub field_name: String,
    pub alias: Option<String>,
    pub table_alias: Option<String>,
}

/// One cell plus its provenance, so updatable views can route writes to
/// the base record the value came from.
#[derive(Debug, Clone)]
pub struct Cell {
    pub value: Value,
    pub rid: Option<Rid>,
    pub table_name: Option<String>,
}

impl Cell {
    pub fn plain(value: Value) -> Self {
        Self { value, rid: None, table_name: None }
    }
}

/// A tuple name for a single base table row: `(column_name, alias?)`.
#[derive(Debug, Clone)]
pub struct TupleSchema {
    pub table_name: String,
    pub table_alias: Option<String>,
    pub fields: Vec<String>,
}

/// The pull protocol's common row representation.
#[derive(Debug, Clone)]
pub enum Tuple {
    /// A raw table/view row plus the schema needed to resolve field names.
    Row { schema: Rc<TupleSchema>, rid: Rid, cells: Vec<Cell> },
    /// A freestanding row of already-evaluated cells (VALUES lists).
    ValueList(Vec<Cell>),
    /// Left/right children of a `NestedLoopJoin`, concatenated logically.
    Joined { left: Box<Tuple>, right: Box<Tuple> },
    /// The output of `Project`: named cells with no further table identity.
    Project { names: Vec<String>, cells: Vec<Cell> },
    /// An expression evaluated lazily against a child, used by `GroupBy`
    /// result rows where cells are the group key plus aggregate results.
    Expression(Vec<Cell>),
}

impl Tuple {
    pub fn row(meta: &TableMeta, table_alias: Option<String>, rid: Rid, record: &Record) -> crate::rc::Result<Tuple> {
        let values = record.all_fields(meta)?;
        Ok(Self::row_with_values(meta, table_alias, rid, values))
    }

    /// Build a row tuple from already-decoded (and, for `TEXTS`/`VECTORS`,
    /// already-materialized) field values — the path every access method
    /// uses via `Table::row_values` so out-of-line payloads are loaded once.
    pub fn row_with_values(meta: &TableMeta, table_alias: Option<String>, rid: Rid, values: Vec<Value>) -> Tuple {
        let schema = Rc::new(TupleSchema {
            table_name: meta.name.clone(),
            table_alias,
            fields: meta.user_fields.iter().map(|f| f.name.clone()).collect(),
        });
        let cells = values
            .into_iter()
            .map(|v| Cell { value: v, rid: Some(rid), table_name: Some(meta.name.clone()) })
            .collect();
        Tuple::Row { schema, rid, cells }
    }

    /// Number of cells in this tuple, flattening joins.
    pub fn cell_num(&self) -> usize {
        match self {
            Tuple::Row { cells, .. } => cells.len(),
            Tuple::ValueList(cells) => cells.len(),
            Tuple::Joined { left, right } => left.cell_num() + right.cell_num(),
            Tuple::Project { cells, .. } => cells.len(),
            Tuple::Expression(cells) => cells.len(),
        }
    }

    /// Cell at a flattened index.
    pub fn cell_at(&self, i: usize) -> Option<&Cell> {
        match self {
            Tuple::Row { cells, .. } => cells.get(i),
            Tuple::ValueList(cells) => cells.get(i),
            Tuple::Joined { left, right } => {
                let ln = left.cell_num();
                if i < ln { left.cell_at(i) } else { right.cell_at(i - ln) }
            }
            Tuple::Project { cells, .. } => cells.get(i),
            Tuple::Expression(cells) => cells.get(i),
        }
    }

    /// Resolve a `TupleCellSpec` to a cell value, per the binder's naming
    /// rules: a table/alias match is required when `spec.table_name` (or
    /// `table_alias`) is set; otherwise the first matching field name wins.
    pub fn find_cell(&self, spec: &TupleCellSpec) -> Option<&Cell> {
        match self {
            Tuple::Row { schema, cells, .. } => {
                if let Some(want) = spec.table_alias.as_ref().or(spec.table_name.as_ref()) {
                    let matches_table =
                        schema.table_alias.as_deref() == Some(want.as_str()) || schema.table_name == *want;
                    if !matches_table {
                        return None;
                    }
                }
                let pos = schema.fields.iter().position(|f| f.eq_ignore_ascii_case(&spec.field_name))?;
                cells.get(pos)
            }
            Tuple::Joined { left, right } => left.find_cell(spec).or_else(|| right.find_cell(spec)),
            Tuple::Project { names, cells } => {
                let pos = names.iter().position(|n| n.eq_ignore_ascii_case(&spec.field_name))?;
                cells.get(pos)
            }
            Tuple::ValueList(_) | Tuple::Expression(_) => None,
        }
    }
}
