//! Out-of-line storage for TEXTS and VECTORS: an append-only text blob
//! file, and a paged vector blob file backed by the [`crate::pager`] LRU.

use crate::pager::Pager;
use crate::rc::{Result, RC};
use crate::stg::{SimpleFileStorage, Storage};
use crate::value::VectorData;

/// Append-only text blob file. Writes return an `(offset, len)` pointer;
/// reads are by that pointer.
pub struct TextStore<S: Storage = SimpleFileStorage> {
    storage: S,
}

impl<S: Storage> TextStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Append `s` and return its `(offset, len)`.
    pub fn append(&mut self, s: &str) -> (u64, u64) {
        let offset = self.storage.size();
        let bytes = s.as_bytes();
        self.storage.write(offset, bytes);
        self.storage.commit(offset + bytes.len() as u64);
        (offset, bytes.len() as u64)
    }

    pub fn read(&self, offset: u64, len: u64) -> Result<String> {
        let mut buf = vec![0u8; len as usize];
        self.storage.read(offset, &mut buf);
        String::from_utf8(buf).map_err(|_| RC::Internal)
    }
}

/// Paged vector blob file: vectors span pages, writeback happens through
/// the LRU buffer pool. `end_offset` is the logical append cursor, tracked
/// independent of page boundaries so vectors pack tightly.
pub struct VecStore<S: Storage = SimpleFileStorage> {
    pager: Pager<S>,
    end_offset: u64,
}

impl<S: Storage> VecStore<S> {
    pub fn new(storage: S) -> Self {
        Self { pager: Pager::new(storage), end_offset: 0 }
    }

    /// Resume appending an existing file whose logical size is already known.
    pub fn with_end_offset(storage: S, end_offset: u64) -> Self {
        Self { pager: Pager::new(storage), end_offset }
    }

    /// Append a vector's f32 components and return its `(offset, dim)`.
    pub fn append(&mut self, v: &[f32]) -> Result<(u64, u32)> {
        let offset = self.end_offset;
        let mut bytes = Vec::with_capacity(v.len() * 4);
        for f in v {
            bytes.extend_from_slice(&f.to_le_bytes());
        }
        self.pager.write_at(offset, &bytes)?;
        self.end_offset = offset + bytes.len() as u64;
        Ok((offset, v.len() as u32))
    }

    pub fn read(&mut self, offset: u64, dim: u32) -> Result<VectorData> {
        let bytes = self.pager.read_at(offset, dim as usize * 4)?;
        let mut data = Vec::with_capacity(dim as usize);
        for chunk in bytes.chunks_exact(4) {
            data.push(f32::from_le_bytes(chunk.try_into().unwrap()));
        }
        Ok(VectorData { offset, dim, data: Some(std::rc::Rc::new(data)) })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.pager.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stg::SimpleFileStorage;
    use tempfile::tempdir;

    #[test]
    fn text_store_append_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.text");
        let mut store = TextStore::new(SimpleFileStorage::new(path.to_str().unwrap()));
        let (off, len) = store.append("hello world");
        assert_eq!(store.read(off, len).unwrap(), "hello world");
    }

    #[test]
    fn vec_store_append_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.vec");
        let mut store = VecStore::new(SimpleFileStorage::new(path.to_str().unwrap()));
        let (off, dim) = store.append(&[1.0, 2.0, 3.0]).unwrap();
        let v = store.read(off, dim).unwrap();
        assert_eq!(v.data.unwrap().as_slice(), &[1.0, 2.0, 3.0]);
    }
}
