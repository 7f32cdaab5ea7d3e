//! Persisted catalog metadata: `FieldMeta`, `TableMeta`, `IndexMeta`,
//! `VectorIndexMeta`. Serialized as JSON alongside each table's data file,
//! with crash-consistent temp-write-then-rename updates.

use crate::rc::{Result, RC};
use crate::value::{AttrType, DistanceType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Number of reserved bytes at the start of every record (trx bookkeeping).
pub const SYS_HEADER_LEN: usize = 8;

/// `(name, type, offset, len, field_id, visible, nullable, vector_dim?, owning_table_name)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldMeta {
    pub name: String,
    pub attr_type: AttrType,
    pub offset: usize,
    pub len: usize,
    /// 0-based index used to position this field's null bit.
    pub field_id: usize,
    pub visible: bool,
    pub nullable: bool,
    pub vector_dim: Option<u32>,
    pub owning_table_name: String,
}

impl FieldMeta {
    pub fn new(
        name: &str,
        attr_type: AttrType,
        offset: usize,
        len: usize,
        field_id: usize,
        nullable: bool,
        owning_table_name: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            attr_type,
            offset,
            len,
            field_id,
            visible: true,
            nullable,
            vector_dim: None,
            owning_table_name: owning_table_name.to_string(),
        }
    }
}

/// Fixed storage width for an `AttrType`, where the type has one. `Chars`
/// and out-of-line types use the caller-declared length / pointer width.
pub fn fixed_width(t: AttrType) -> Option<usize> {
    match t {
        AttrType::Ints | AttrType::Dates => Some(4),
        AttrType::Floats => Some(4),
        AttrType::Booleans => Some(1),
        AttrType::Texts => Some(16), // (offset:u64, len:u64)
        AttrType::Vectors => Some(12), // (offset:u64, dim:u32)
        AttrType::Chars | AttrType::Undefined | AttrType::Nulls => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageFormat {
    Row,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,
    pub fields: Vec<FieldMeta>,
    pub unique: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexMeta {
    pub name: String,
    pub field: FieldMeta,
    pub distance: DistanceType,
    pub lists: u32,
    pub probes: u32,
}

// `DistanceType` is a plain enum with no payload; derive serde on it here
// so `VectorIndexMeta` can round-trip through JSON.
impl Serialize for DistanceType {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let name = match self {
            DistanceType::L2 => "L2",
            DistanceType::Cosine => "Cosine",
            DistanceType::InnerProduct => "InnerProduct",
        };
        s.serialize_str(name)
    }
}

impl<'de> Deserialize<'de> for DistanceType {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        match s.as_str() {
            "L2" => Ok(DistanceType::L2),
            "Cosine" => Ok(DistanceType::Cosine),
            "InnerProduct" => Ok(DistanceType::InnerProduct),
            _ => Err(serde::de::Error::custom("unknown distance type")),
        }
    }
}

impl Serialize for AttrType {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let name = match self {
            AttrType::Undefined => "UNDEFINED",
            AttrType::Chars => "CHARS",
            AttrType::Ints => "INTS",
            AttrType::Floats => "FLOATS",
            AttrType::Booleans => "BOOLEANS",
            AttrType::Dates => "DATES",
            AttrType::Vectors => "VECTORS",
            AttrType::Nulls => "NULLS",
            AttrType::Texts => "TEXTS",
        };
        s.serialize_str(name)
    }
}

impl<'de> Deserialize<'de> for AttrType {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(match s.as_str() {
            "CHARS" => AttrType::Chars,
            "INTS" => AttrType::Ints,
            "FLOATS" => AttrType::Floats,
            "BOOLEANS" => AttrType::Booleans,
            "DATES" => AttrType::Dates,
            "VECTORS" => AttrType::Vectors,
            "NULLS" => AttrType::Nulls,
            "TEXTS" => AttrType::Texts,
            _ => AttrType::Undefined,
        })
    }
}

/// `(id, name, sys_fields[], user_fields[], indexes[], vector_indexes[], storage_format)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    pub id: u64,
    pub name: String,
    pub user_fields: Vec<FieldMeta>,
    pub indexes: Vec<IndexMeta>,
    pub vector_indexes: Vec<VectorIndexMeta>,
    pub storage_format: StorageFormat,
}

/// Lay out `(name, type, declared_len_for_chars, nullable)` specs into
/// `FieldMeta`s with sequential offsets, the way a `CREATE TABLE` handler
/// assigns storage to a fresh schema. Shared by DDL and by the views
/// system table, which is itself just a table.
pub fn build_user_fields(table: &str, specs: &[(&str, AttrType, Option<usize>, bool)]) -> Vec<FieldMeta> {
    let null_bitmap_len = specs.len().div_ceil(8);
    let mut offset = SYS_HEADER_LEN + null_bitmap_len;
    let mut fields = Vec::with_capacity(specs.len());
    for (i, (name, attr_type, declared_len, nullable)) in specs.iter().enumerate() {
        let len = fixed_width(*attr_type).unwrap_or_else(|| declared_len.unwrap_or(1) + 1);
        let mut f = FieldMeta::new(name, *attr_type, offset, len, i, *nullable, table);
        f.vector_dim = None;
        offset += len;
        fields.push(f);
    }
    fields
}

impl TableMeta {
    pub fn new(id: u64, name: &str, user_fields: Vec<FieldMeta>) -> Self {
        Self {
            id,
            name: name.to_string(),
            user_fields,
            indexes: Vec::new(),
            vector_indexes: Vec::new(),
            storage_format: StorageFormat::Row,
        }
    }

    /// Null-bitmap size in bytes: one bit per user field.
    pub fn null_bitmap_len(&self) -> usize {
        self.user_fields.len().div_ceil(8)
    }

    /// Total record size: sys header + null bitmap + field slots.
    pub fn record_size(&self) -> usize {
        let fields_end = self
            .user_fields
            .iter()
            .map(|f| f.offset + f.len)
            .max()
            .unwrap_or(SYS_HEADER_LEN + self.null_bitmap_len());
        fields_end
    }

    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.user_fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn path_for(base_dir: &Path, table: &str) -> std::path::PathBuf {
        base_dir.join(format!("{table}.table"))
    }

    pub fn data_path(base_dir: &Path, table: &str) -> std::path::PathBuf {
        base_dir.join(format!("{table}.data"))
    }

    pub fn text_path(base_dir: &Path, table: &str) -> std::path::PathBuf {
        base_dir.join(format!("{table}.text"))
    }

    pub fn vec_path(base_dir: &Path, table: &str) -> std::path::PathBuf {
        base_dir.join(format!("{table}.vec"))
    }

    pub fn index_path(base_dir: &Path, table: &str, index: &str) -> std::path::PathBuf {
        base_dir.join(format!("{table}-{index}.bplus"))
    }

    pub fn vector_index_paths(base_dir: &Path, table: &str, index: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        (
            base_dir.join(format!("{table}-{index}.vecidx")),
            base_dir.join(format!("{table}-{index}.aux")),
        )
    }

    /// Load `<table>.table` from `base_dir`.
    pub fn load(base_dir: &Path, table: &str) -> Result<TableMeta> {
        let path = Self::path_for(base_dir, table);
        let text = fs::read_to_string(&path).map_err(|_| RC::IoerrRead)?;
        serde_json::from_str(&text).map_err(|_| RC::Internal)
    }

    /// Write `<table>.table`, via a temp file renamed over the canonical
    /// path so a crash mid-write never leaves a half-written meta file.
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = Self::path_for(base_dir, &self.name);
        let tmp_path = base_dir.join(format!("{}.table.tmp", self.name));
        let json = serde_json::to_string_pretty(self).map_err(|_| RC::Internal)?;
        {
            let mut f = fs::File::create(&tmp_path).map_err(|_| RC::IoerrOpen)?;
            f.write_all(json.as_bytes()).map_err(|_| RC::IoerrWrite)?;
            f.sync_all().map_err(|_| RC::IoerrSync)?;
        }
        fs::rename(&tmp_path, &path).map_err(|_| RC::IoerrWrite)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn table_meta_round_trips_through_json() {
        let dir = tempdir().unwrap();
        let fields = vec![
            FieldMeta::new("a", AttrType::Ints, SYS_HEADER_LEN + 1, 4, 0, false, "t"),
            FieldMeta::new("b", AttrType::Chars, SYS_HEADER_LEN + 1 + 4, 8, 1, true, "t"),
        ];
        let meta = TableMeta::new(1, "t", fields);
        meta.save(dir.path()).unwrap();
        let loaded = TableMeta::load(dir.path(), "t").unwrap();
        assert_eq!(loaded.name, "t");
        assert_eq!(loaded.user_fields.len(), 2);
        assert_eq!(loaded.user_fields[1].attr_type, AttrType::Chars);
    }
}
