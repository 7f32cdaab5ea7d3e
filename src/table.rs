//! Row-format table access method: wraps the record-file handler and
//! maintains secondary indexes on every write. Also owns the per-table
//! out-of-line blob stores (§4.7) that back `TEXTS`/`VECTORS` fields.

use crate::blobstore::{TextStore, VecStore};
use crate::bplus::BPlusIndex;
use crate::heapfile::HeapFile;
use crate::meta::{AttrType, TableMeta};
use crate::rc::{Result, RC};
use crate::record::{Record, Rid};
use crate::value::{TextData, Value, VectorData};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// A table's data file plus its live secondary indexes and blob stores.
pub struct Table {
    meta: TableMeta,
    base_dir: PathBuf,
    heap: RefCell<HeapFile>,
    indexes: RefCell<HashMap<String, BPlusIndex>>,
    text_store: RefCell<TextStore>,
    vec_store: RefCell<VecStore>,
}

impl Table {
    pub fn open(base_dir: &std::path::Path, meta: TableMeta) -> Result<Self> {
        let data_path = TableMeta::data_path(base_dir, &meta.name);
        let heap = HeapFile::new(crate::stg::SimpleFileStorage::new(data_path.to_str().ok_or(RC::FileName)?), meta.record_size());
        let mut indexes = HashMap::new();
        for idx_meta in &meta.indexes {
            let path = TableMeta::index_path(base_dir, &meta.name, &idx_meta.name);
            indexes.insert(idx_meta.name.clone(), BPlusIndex::open(&path, idx_meta.unique)?);
        }
        let text_path = TableMeta::text_path(base_dir, &meta.name);
        let text_store = TextStore::new(crate::stg::SimpleFileStorage::new(text_path.to_str().ok_or(RC::FileName)?));
        let vec_path = TableMeta::vec_path(base_dir, &meta.name);
        let vec_storage = crate::stg::SimpleFileStorage::new(vec_path.to_str().ok_or(RC::FileName)?);
        let vec_end = std::fs::metadata(&vec_path).map(|m| m.len()).unwrap_or(0);
        let vec_store = VecStore::with_end_offset(vec_storage, vec_end);
        Ok(Self {
            meta,
            base_dir: base_dir.to_path_buf(),
            heap: RefCell::new(heap),
            indexes: RefCell::new(indexes),
            text_store: RefCell::new(text_store),
            vec_store: RefCell::new(vec_store),
        })
    }

    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    pub fn base_dir(&self) -> &std::path::Path {
        &self.base_dir
    }

    /// Spill a `TEXTS`/`VECTORS` field's in-memory payload to its blob
    /// store, replacing the value with an on-disk pointer that still
    /// carries the materialized bytes (so the caller's in-memory copy
    /// stays usable without a round-trip read).
    fn spill_out_of_line(&self, attr_type: AttrType, value: Value) -> Result<Value> {
        match (attr_type, value) {
            (AttrType::Texts, Value::Chars(s)) => {
                let (offset, len) = self.text_store.borrow_mut().append(&s);
                Ok(Value::Text(TextData { offset, len, data: Some(s) }))
            }
            (AttrType::Texts, v @ Value::Text(_)) => Ok(v),
            (AttrType::Vectors, Value::Vector(v)) if v.data.is_some() => {
                let data = v.data.unwrap();
                let (offset, dim) = self.vec_store.borrow_mut().append(&data)?;
                Ok(Value::Vector(VectorData { offset, dim, data: Some(data) }))
            }
            (_, v) => Ok(v),
        }
    }

    /// Load the materialized bytes behind an on-disk `TEXTS`/`VECTORS`
    /// pointer that doesn't carry them yet (the common case right after a
    /// scan decodes a record).
    fn load_out_of_line(&self, value: Value) -> Result<Value> {
        match value {
            Value::Text(t) if t.data.is_none() => {
                let s = self.text_store.borrow().read(t.offset, t.len)?;
                Ok(Value::Text(TextData { data: Some(Rc::new(s)), ..t }))
            }
            Value::Vector(v) if v.data.is_none() => {
                let loaded = self.vec_store.borrow_mut().read(v.offset, v.dim)?;
                Ok(Value::Vector(loaded))
            }
            v => Ok(v),
        }
    }

    /// `Record::all_fields` plus out-of-line materialization, so every
    /// `Value` handed up to the operator pipeline already carries its
    /// bytes (needed for display, comparison, and `VectorDistance`).
    pub fn row_values(&self, rid: Rid) -> Result<Vec<Value>> {
        let record = self.get(rid)?;
        record.all_fields(&self.meta)?.into_iter().map(|v| self.load_out_of_line(v)).collect()
    }

    fn index_key(&self, idx_name: &str, values: &[Value]) -> Vec<Value> {
        let idx_meta = self.meta.indexes.iter().find(|i| i.name == idx_name).expect("index exists");
        idx_meta
            .fields
            .iter()
            .map(|f| {
                let pos = self.meta.user_fields.iter().position(|uf| uf.name == f.name).expect("field exists");
                values[pos].clone()
            })
            .collect()
    }

    /// Build a record from caller-supplied, already type-checked values,
    /// spilling any `TEXTS`/`VECTORS` payload to its blob store first.
    pub fn make_record(&self, values: &[Value]) -> Result<Record> {
        let spilled: Vec<Value> = values
            .iter()
            .zip(self.meta.user_fields.iter())
            .map(|(v, f)| self.spill_out_of_line(f.attr_type, v.clone()))
            .collect::<Result<_>>()?;
        Record::make(&self.meta, &spilled)
    }

    /// Insert `record`, then every index; a failed index insert triggers a
    /// best-effort rollback of the record and indexes already touched.
    pub fn insert(&self, record: Record) -> Result<Rid> {
        let values = record.all_fields(&self.meta)?;
        let rid = self.heap.borrow_mut().insert(&record)?;
        let mut touched = Vec::new();
        for idx_meta in &self.meta.indexes {
            let key = self.index_key(&idx_meta.name, &values);
            let mut indexes = self.indexes.borrow_mut();
            let idx = indexes.get_mut(&idx_meta.name).ok_or(RC::Internal)?;
            match idx.insert_entry(&key, rid) {
                Ok(()) => touched.push(idx_meta.name.clone()),
                Err(e) => {
                    for name in &touched {
                        let _ = indexes.get_mut(name).map(|i| i.delete_entry(&self.index_key(name, &values), rid));
                    }
                    drop(indexes);
                    if self.heap.borrow_mut().delete(rid).is_err() {
                        tracing::error!(table = %self.meta.name, "PANIC: failed to roll back record after index insert failure");
                        return Err(RC::Internal);
                    }
                    return Err(e);
                }
            }
        }
        Ok(rid)
    }

    pub fn get(&self, rid: Rid) -> Result<Record> {
        self.heap.borrow().get(rid)
    }

    pub fn delete(&self, rid: Rid) -> Result<()> {
        let record = self.heap.borrow().get(rid)?;
        let values = record.all_fields(&self.meta)?;
        for idx_meta in &self.meta.indexes {
            let key = self.index_key(&idx_meta.name, &values);
            let mut indexes = self.indexes.borrow_mut();
            if let Some(idx) = indexes.get_mut(&idx_meta.name) {
                let _ = idx.delete_entry(&key, rid);
            }
        }
        self.heap.borrow_mut().delete(rid)
    }

    /// Invoke `f(&mut Record)` at `rid`; callers are responsible for any
    /// index maintenance the mutation requires (see `op_dml::Update`).
    pub fn visit_record(&self, rid: Rid, f: &mut dyn FnMut(&mut Record)) -> Result<()> {
        let mut record = self.heap.borrow().get(rid)?;
        f(&mut record);
        self.heap.borrow_mut().update(rid, &record)
    }

    /// Explicit index-maintenance helper for `Update`: delete the old key,
    /// insert the new one, for every affected index.
    pub fn update_index(&self, old_values: &[Value], new_values: &[Value], rid: Rid) -> Result<()> {
        for idx_meta in &self.meta.indexes {
            let old_key = self.index_key(&idx_meta.name, old_values);
            let new_key = self.index_key(&idx_meta.name, new_values);
            if old_key == new_key {
                continue;
            }
            let mut indexes = self.indexes.borrow_mut();
            if let Some(idx) = indexes.get_mut(&idx_meta.name) {
                idx.update_entry(&old_key, &new_key, rid)?;
            }
        }
        Ok(())
    }

    pub fn scan(&self) -> Result<Vec<(Rid, Record)>> {
        self.heap.borrow().scan()
    }

    /// Exact-match index scan by index name, used when the physical
    /// planner has selected an `IndexScan`.
    pub fn index_scan(
        &self,
        idx_name: &str,
        left: Option<&[Value]>,
        left_inclusive: bool,
        right: Option<&[Value]>,
        right_inclusive: bool,
    ) -> Result<Vec<Rid>> {
        let indexes = self.indexes.borrow();
        let idx = indexes.get(idx_name).ok_or(RC::SchemaFieldNotExist)?;
        Ok(idx.scan(left, left_inclusive, right, right_inclusive))
    }

    pub fn save_meta(&self) -> Result<()> {
        self.meta.save(&self.base_dir)
    }

    pub fn flush_indexes(&self) -> Result<()> {
        for idx in self.indexes.borrow().values() {
            idx.save()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{FieldMeta, SYS_HEADER_LEN};
    use crate::value::AttrType;
    use tempfile::tempdir;

    fn sample_meta() -> TableMeta {
        let fields = vec![FieldMeta::new("a", AttrType::Ints, SYS_HEADER_LEN + 1, 4, 0, false, "t")];
        let mut m = TableMeta::new(1, "t", fields);
        m.indexes.push(crate::meta::IndexMeta { name: "idx_a".into(), fields: m.user_fields.clone(), unique: true });
        m
    }

    #[test]
    fn insert_maintains_index_and_scan_finds_row() {
        let dir = tempdir().unwrap();
        let meta = sample_meta();
        let table = Table::open(dir.path(), meta).unwrap();
        let rec = table.make_record(&[Value::Int(5)]).unwrap();
        let rid = table.insert(rec).unwrap();
        let found = table.index_scan("idx_a", Some(&[Value::Int(5)]), true, Some(&[Value::Int(5)]), true).unwrap();
        assert_eq!(found, vec![rid]);
    }

    #[test]
    fn duplicate_unique_key_rolls_back_record() {
        let dir = tempdir().unwrap();
        let meta = sample_meta();
        let table = Table::open(dir.path(), meta).unwrap();
        let rec1 = table.make_record(&[Value::Int(1)]).unwrap();
        table.insert(rec1).unwrap();
        let rec2 = table.make_record(&[Value::Int(1)]).unwrap();
        assert!(table.insert(rec2).is_err());
        assert_eq!(table.scan().unwrap().len(), 1);
    }
}
