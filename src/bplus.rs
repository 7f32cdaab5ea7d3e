//! Multi-column B+tree index. Keys are encoded as a `KEY_NULL_BYTE`
//! (4 bytes) NULL marker per column followed by the column's natural byte
//! encoding, so NULLs collate before any real value regardless of column
//! type. Persisted as a flat sorted key/Rid list rather than a paged
//! tree-of-pages — this index never needs to hold more keys than fit
//! comfortably in memory for the educational scope here, so the on-disk
//! format is a simple snapshot, not a true paged B+tree; `open`'s
//! range-scan contract is unchanged by that choice.

use crate::rc::{Result, RC};
use crate::record::Rid;
use crate::value::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// 4-byte NULL marker prefixed to every encoded key column. `0` means the
/// column value follows; `1` means the column is NULL and sorts first.
pub const KEY_NULL_BYTE: usize = 4;

fn encode_key(values: &[Value]) -> Vec<u8> {
    let mut out = Vec::new();
    for v in values {
        if v.is_null() {
            out.extend_from_slice(&1u32.to_le_bytes());
        } else {
            out.extend_from_slice(&0u32.to_le_bytes());
            encode_value(v, &mut out);
        }
    }
    out
}

fn encode_value(v: &Value, out: &mut Vec<u8>) {
    match v {
        Value::Int(i) => out.extend_from_slice(&(*i as i64).to_be_bytes()),
        Value::Date(d) => out.extend_from_slice(&(*d as i64).to_be_bytes()),
        Value::Float(f) => out.extend_from_slice(&(*f as f64).to_be_bytes()),
        Value::Bool(b) => out.push(*b as u8),
        Value::Chars(s) => {
            out.extend_from_slice(&(s.len() as u32).to_be_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        _ => {}
    }
}

/// Persisted, in-memory multi-column index: encoded key -> set of Rids
/// (a `Vec` rather than a set so a non-unique index keeps insertion order).
pub struct BPlusIndex {
    path: PathBuf,
    pub unique: bool,
    map: BTreeMap<Vec<u8>, Vec<Rid>>,
}

impl BPlusIndex {
    pub fn create(path: &Path, unique: bool) -> Self {
        Self { path: path.to_path_buf(), unique, map: BTreeMap::new() }
    }

    /// Load a previously-saved index file, or an empty index if absent.
    pub fn open(path: &Path, unique: bool) -> Result<Self> {
        let mut idx = Self::create(path, unique);
        if path.exists() {
            let bytes = fs::read(path).map_err(|_| RC::IoerrRead)?;
            idx.map = decode(&bytes)?;
        }
        Ok(idx)
    }

    pub fn insert_entry(&mut self, key: &[Value], rid: Rid) -> Result<()> {
        let k = encode_key(key);
        let entry = self.map.entry(k).or_default();
        if self.unique && !entry.is_empty() {
            return Err(RC::RecordDuplicateKey);
        }
        entry.push(rid);
        Ok(())
    }

    pub fn delete_entry(&mut self, key: &[Value], rid: Rid) -> Result<()> {
        let k = encode_key(key);
        if let Some(entry) = self.map.get_mut(&k) {
            entry.retain(|&r| r != rid);
            if entry.is_empty() {
                self.map.remove(&k);
            }
            return Ok(());
        }
        Err(RC::RecordNotExist)
    }

    pub fn update_entry(&mut self, old_key: &[Value], new_key: &[Value], rid: Rid) -> Result<()> {
        self.delete_entry(old_key, rid)?;
        self.insert_entry(new_key, rid)
    }

    /// Range scan between `[left, right]`, both sides inclusive/exclusive
    /// as given. A missing bound means unbounded on that side.
    pub fn scan(
        &self,
        left: Option<&[Value]>,
        left_inclusive: bool,
        right: Option<&[Value]>,
        right_inclusive: bool,
    ) -> Vec<Rid> {
        let left_key = left.map(encode_key);
        let right_key = right.map(encode_key);
        let mut out = Vec::new();
        for (k, rids) in self.map.iter() {
            if let Some(lk) = &left_key {
                if (left_inclusive && k < lk) || (!left_inclusive && k <= lk) {
                    continue;
                }
            }
            if let Some(rk) = &right_key {
                if (right_inclusive && k > rk) || (!right_inclusive && k >= rk) {
                    continue;
                }
            }
            out.extend_from_slice(rids);
        }
        out
    }

    /// Write the index to its file via a temp-write-then-rename.
    pub fn save(&self) -> Result<()> {
        let tmp = self.path.with_extension("bplus.tmp");
        let bytes = encode(&self.map);
        {
            let mut f = fs::File::create(&tmp).map_err(|_| RC::IoerrOpen)?;
            f.write_all(&bytes).map_err(|_| RC::IoerrWrite)?;
            f.sync_all().map_err(|_| RC::IoerrSync)?;
        }
        fs::rename(&tmp, &self.path).map_err(|_| RC::IoerrWrite)?;
        Ok(())
    }
}

fn encode(map: &BTreeMap<Vec<u8>, Vec<Rid>>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(map.len() as u64).to_le_bytes());
    for (k, rids) in map {
        out.extend_from_slice(&(k.len() as u32).to_le_bytes());
        out.extend_from_slice(k);
        out.extend_from_slice(&(rids.len() as u32).to_le_bytes());
        for r in rids {
            out.extend_from_slice(&r.page_no.to_le_bytes());
            out.extend_from_slice(&r.slot_no.to_le_bytes());
        }
    }
    out
}

fn decode(bytes: &[u8]) -> Result<BTreeMap<Vec<u8>, Vec<Rid>>> {
    let mut map = BTreeMap::new();
    let mut pos = 0usize;
    let read_u64 = |b: &[u8], p: usize| u64::from_le_bytes(b[p..p + 8].try_into().unwrap());
    let read_u32 = |b: &[u8], p: usize| u32::from_le_bytes(b[p..p + 4].try_into().unwrap());
    if bytes.len() < 8 {
        return Ok(map);
    }
    let n = read_u64(bytes, pos);
    pos += 8;
    for _ in 0..n {
        let klen = read_u32(bytes, pos) as usize;
        pos += 4;
        let key = bytes[pos..pos + klen].to_vec();
        pos += klen;
        let rc = read_u32(bytes, pos) as usize;
        pos += 4;
        let mut rids = Vec::with_capacity(rc);
        for _ in 0..rc {
            let page_no = read_u64(bytes, pos);
            pos += 8;
            let slot_no = read_u32(bytes, pos);
            pos += 4;
            rids.push(Rid { page_no, slot_no });
        }
        map.insert(key, rids);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn insert_scan_and_null_ordering() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t-idx.bplus");
        let mut idx = BPlusIndex::create(&path, false);
        idx.insert_entry(&[Value::Int(5)], Rid { page_no: 0, slot_no: 0 }).unwrap();
        idx.insert_entry(&[Value::Null], Rid { page_no: 0, slot_no: 1 }).unwrap();
        idx.insert_entry(&[Value::Int(1)], Rid { page_no: 0, slot_no: 2 }).unwrap();
        let all = idx.scan(None, true, None, true);
        assert_eq!(all.len(), 3);
        // NULL sorts first.
        assert_eq!(all[0], Rid { page_no: 0, slot_no: 1 });
    }

    #[test]
    fn unique_rejects_duplicate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t-u.bplus");
        let mut idx = BPlusIndex::create(&path, true);
        idx.insert_entry(&[Value::Int(1)], Rid { page_no: 0, slot_no: 0 }).unwrap();
        assert!(idx.insert_entry(&[Value::Int(1)], Rid { page_no: 0, slot_no: 1 }).is_err());
    }

    #[test]
    fn save_and_reopen_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t-r.bplus");
        let mut idx = BPlusIndex::create(&path, false);
        idx.insert_entry(&[Value::Int(2)], Rid { page_no: 1, slot_no: 3 }).unwrap();
        idx.save().unwrap();
        let reopened = BPlusIndex::open(&path, false).unwrap();
        assert_eq!(reopened.scan(None, true, None, true), vec![Rid { page_no: 1, slot_no: 3 }]);
    }
}
