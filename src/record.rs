//! `FieldMeta`-driven record encoder/decoder, kept separate from the raw
//! byte buffer so the layout arithmetic can be unit-tested on its own.

use crate::meta::{fixed_width, TableMeta, SYS_HEADER_LEN};
use crate::rc::{Result, RC};
use crate::util::{getf32, getu32, getu64, setf32, setu32, setu64};
use crate::value::{AttrType, TextData, Value, VectorData};
use std::rc::Rc;

/// Record identity: `(page_no, slot_no)` into a table's data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rid {
    pub page_no: u64,
    pub slot_no: u32,
}

/// Opaque fixed-size byte buffer: sys header, null bitmap, fixed-offset
/// field slots. Out-of-line TEXTS/VECTORS store only an (offset,len/dim)
/// pointer here; materialized bytes live in the `Value`, not the record.
#[derive(Debug, Clone)]
pub struct Record {
    pub bytes: Vec<u8>,
}

fn null_bit_byte_offset(field_id: usize) -> usize {
    SYS_HEADER_LEN + field_id / 8
}

impl Record {
    pub fn new_zeroed(size: usize) -> Self {
        Self { bytes: vec![0u8; size] }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    fn is_null_bit(&self, field_id: usize) -> bool {
        let byte = self.bytes[null_bit_byte_offset(field_id)];
        (byte >> (field_id % 8)) & 1 == 1
    }

    fn set_null_bit(&mut self, field_id: usize, is_null: bool) {
        let off = null_bit_byte_offset(field_id);
        let bit = 1u8 << (field_id % 8);
        if is_null {
            self.bytes[off] |= bit;
        } else {
            self.bytes[off] &= !bit;
        }
    }

    /// Decode one field. The null bit is authoritative: it is consulted
    /// before any attempt to decode the slot bytes.
    pub fn get_field(&self, meta: &TableMeta, field_id: usize) -> Result<Value> {
        let f = meta.user_fields.get(field_id).ok_or(RC::SchemaFieldNotExist)?;
        if f.nullable && self.is_null_bit(field_id) {
            return Ok(Value::Null);
        }
        let data = &self.bytes[f.offset..f.offset + f.len];
        Ok(match f.attr_type {
            AttrType::Ints => Value::Int(getu32(data, 0) as i32),
            AttrType::Dates => Value::Date(getu32(data, 0) as i32),
            AttrType::Floats => Value::Float(getf32(data, 0)),
            AttrType::Booleans => Value::Bool(data[0] != 0),
            AttrType::Chars => {
                let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
                Value::Chars(Rc::new(String::from_utf8_lossy(&data[..end]).into_owned()))
            }
            AttrType::Texts => Value::Text(TextData {
                offset: getu64(data, 0),
                len: getu64(data, 8),
                data: None,
            }),
            AttrType::Vectors => Value::Vector(VectorData {
                offset: getu64(data, 0),
                dim: getu32(data, 8),
                data: None,
            }),
            AttrType::Undefined | AttrType::Nulls => Value::Null,
        })
    }

    /// Encode one already-cast field into its slot, updating the null bit.
    pub fn set_field(&mut self, meta: &TableMeta, field_id: usize, value: &Value) -> Result<()> {
        let f = meta.user_fields.get(field_id).ok_or(RC::SchemaFieldNotExist)?.clone();
        if value.is_null() {
            if !f.nullable {
                return Err(RC::InvalidArgument);
            }
            self.set_null_bit(field_id, true);
            self.bytes[f.offset..f.offset + f.len].fill(0);
            return Ok(());
        }
        if f.nullable {
            self.set_null_bit(field_id, false);
        }
        let data = &mut self.bytes[f.offset..f.offset + f.len];
        match (f.attr_type, value) {
            (AttrType::Ints, Value::Int(i)) => setu32(data, 0, *i as u32),
            (AttrType::Dates, Value::Date(d)) => setu32(data, 0, *d as u32),
            (AttrType::Floats, Value::Float(x)) => setf32(data, 0, *x),
            (AttrType::Booleans, Value::Bool(b)) => data[0] = *b as u8,
            (AttrType::Chars, Value::Chars(s)) => {
                let sb = s.as_bytes();
                if sb.len() >= f.len {
                    return Err(RC::IoerrTooLong);
                }
                data.fill(0);
                data[..sb.len()].copy_from_slice(sb);
            }
            (AttrType::Texts, Value::Text(t)) => {
                setu64(data, 0, t.offset);
                setu64(data, 8, t.len);
            }
            (AttrType::Vectors, Value::Vector(v)) => {
                setu64(data, 0, v.offset);
                setu32(data, 8, v.dim);
            }
            _ => return Err(RC::SchemaFieldTypeMismatch),
        }
        Ok(())
    }

    /// Build a fresh record from already type-checked, cast values in
    /// column order, respecting NOT NULL.
    pub fn make(meta: &TableMeta, values: &[Value]) -> Result<Record> {
        if values.len() != meta.user_fields.len() {
            return Err(RC::SchemaFieldMissing);
        }
        let mut rec = Record::new_zeroed(meta.record_size());
        for (i, v) in values.iter().enumerate() {
            rec.set_field(meta, i, v)?;
        }
        Ok(rec)
    }

    pub fn all_fields(&self, meta: &TableMeta) -> Result<Vec<Value>> {
        (0..meta.user_fields.len()).map(|i| self.get_field(meta, i)).collect()
    }
}

/// Placeholder byte width helper, re-exported for callers building layouts.
pub use crate::meta::fixed_width as field_width;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::FieldMeta;

    fn sample_meta() -> TableMeta {
        let fields = vec![
            FieldMeta::new("a", AttrType::Ints, SYS_HEADER_LEN + 1, 4, 0, false, "t"),
            FieldMeta::new("b", AttrType::Chars, SYS_HEADER_LEN + 1 + 4, 9, 1, true, "t"),
        ];
        TableMeta::new(1, "t", fields)
    }

    #[test]
    fn record_roundtrip() {
        let meta = sample_meta();
        let rec = Record::make(&meta, &[Value::Int(42), Value::Chars(Rc::new("hello".to_string()))]).unwrap();
        assert_eq!(rec.get_field(&meta, 0).unwrap(), Value::Int(42));
        assert_eq!(rec.get_field(&meta, 1).unwrap(), Value::Chars(Rc::new("hello".to_string())));
    }

    #[test]
    fn null_bit_is_authoritative() {
        let meta = sample_meta();
        let mut rec = Record::make(&meta, &[Value::Int(1), Value::Null]).unwrap();
        assert_eq!(rec.get_field(&meta, 1).unwrap(), Value::Null);
        rec.set_field(&meta, 1, &Value::Chars(Rc::new("x".to_string()))).unwrap();
        assert_eq!(rec.get_field(&meta, 1).unwrap(), Value::Chars(Rc::new("x".to_string())));
    }

    #[test]
    fn not_null_violation_rejected() {
        let meta = sample_meta();
        assert!(Record::make(&meta, &[Value::Null, Value::Null]).is_err());
    }
}
