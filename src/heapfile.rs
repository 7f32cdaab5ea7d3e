//! Fixed-size record file: a table's row storage. A page holds a fixed
//! number of fixed-size record slots plus an occupancy bitmap; a `Rid` is
//! `(page_no, slot_no)`. Built on the same [`Storage`] primitive as the
//! paged vector store, but with slot semantics instead of a byte stream.

use crate::pager::PAGE_SIZE;
use crate::rc::{Result, RC};
use crate::record::{Record, Rid};
use crate::stg::{SimpleFileStorage, Storage};

/// Per-page header: one bit per slot marking occupancy.
fn slots_per_page(record_size: usize) -> usize {
    let usable = PAGE_SIZE - 8; // reserve a small page header
    let bits_and_slot = record_size * 8 + 1; // 1 occupancy bit + record bits
    ((usable * 8) / bits_and_slot).max(1)
}

fn bitmap_bytes(slots: usize) -> usize {
    slots.div_ceil(8)
}

/// Fixed-size record file over a [`Storage`] backend.
pub struct HeapFile<S: Storage = SimpleFileStorage> {
    storage: S,
    record_size: usize,
    slots_per_page: usize,
    bitmap_bytes: usize,
}

impl<S: Storage> HeapFile<S> {
    pub fn new(storage: S, record_size: usize) -> Self {
        let slots = slots_per_page(record_size);
        Self { storage, record_size, slots_per_page: slots, bitmap_bytes: bitmap_bytes(slots) }
    }

    fn page_count(&self) -> u64 {
        self.storage.size() / PAGE_SIZE as u64
    }

    fn page_offset(&self, page_no: u64) -> u64 {
        page_no * PAGE_SIZE as u64
    }

    fn slot_offset(&self, slot_no: u32) -> usize {
        self.bitmap_bytes + slot_no as usize * self.record_size
    }

    fn read_page(&self, page_no: u64) -> Vec<u8> {
        let mut buf = vec![0u8; PAGE_SIZE];
        self.storage.read(self.page_offset(page_no), &mut buf);
        buf
    }

    fn write_page(&mut self, page_no: u64, buf: &[u8]) {
        self.storage.write(self.page_offset(page_no), buf);
        let needed = self.page_offset(page_no) + PAGE_SIZE as u64;
        if needed > self.storage.size() {
            self.storage.commit(needed);
        }
    }

    fn slot_bit(buf: &[u8], slot_no: u32) -> bool {
        let byte = buf[(slot_no / 8) as usize];
        (byte >> (slot_no % 8)) & 1 == 1
    }

    fn set_slot_bit(buf: &mut [u8], slot_no: u32, occupied: bool) {
        let idx = (slot_no / 8) as usize;
        let bit = 1u8 << (slot_no % 8);
        if occupied {
            buf[idx] |= bit;
        } else {
            buf[idx] &= !bit;
        }
    }

    /// Insert `rec`, allocating the first free slot (appending a page if
    /// none is free), and return its `Rid`.
    pub fn insert(&mut self, rec: &Record) -> Result<Rid> {
        if rec.bytes.len() != self.record_size {
            return Err(RC::RecordInvalidKey);
        }
        let pages = self.page_count();
        for page_no in 0..pages {
            let mut buf = self.read_page(page_no);
            for slot_no in 0..self.slots_per_page as u32 {
                if !Self::slot_bit(&buf, slot_no) {
                    Self::set_slot_bit(&mut buf, slot_no, true);
                    let off = self.slot_offset(slot_no);
                    buf[off..off + self.record_size].copy_from_slice(&rec.bytes);
                    self.write_page(page_no, &buf);
                    return Ok(Rid { page_no, slot_no });
                }
            }
        }
        // No free slot: append a new page.
        let page_no = pages;
        let mut buf = vec![0u8; PAGE_SIZE];
        Self::set_slot_bit(&mut buf, 0, true);
        let off = self.slot_offset(0);
        buf[off..off + self.record_size].copy_from_slice(&rec.bytes);
        self.write_page(page_no, &buf);
        Ok(Rid { page_no, slot_no: 0 })
    }

    pub fn get(&self, rid: Rid) -> Result<Record> {
        if rid.page_no >= self.page_count() {
            return Err(RC::RecordInvalidRid);
        }
        let buf = self.read_page(rid.page_no);
        if !Self::slot_bit(&buf, rid.slot_no) {
            return Err(RC::RecordNotExist);
        }
        let off = self.slot_offset(rid.slot_no);
        Ok(Record::from_bytes(buf[off..off + self.record_size].to_vec()))
    }

    /// Overwrite the record at `rid` in place.
    pub fn update(&mut self, rid: Rid, rec: &Record) -> Result<()> {
        if rid.page_no >= self.page_count() {
            return Err(RC::RecordInvalidRid);
        }
        let mut buf = self.read_page(rid.page_no);
        if !Self::slot_bit(&buf, rid.slot_no) {
            return Err(RC::RecordNotExist);
        }
        let off = self.slot_offset(rid.slot_no);
        buf[off..off + self.record_size].copy_from_slice(&rec.bytes);
        self.write_page(rid.page_no, &buf);
        Ok(())
    }

    pub fn delete(&mut self, rid: Rid) -> Result<()> {
        if rid.page_no >= self.page_count() {
            return Err(RC::RecordInvalidRid);
        }
        let mut buf = self.read_page(rid.page_no);
        if !Self::slot_bit(&buf, rid.slot_no) {
            return Err(RC::RecordNotExist);
        }
        Self::set_slot_bit(&mut buf, rid.slot_no, false);
        self.write_page(rid.page_no, &buf);
        Ok(())
    }

    /// Iterate all occupied `(rid, record)` pairs in page/slot order.
    pub fn scan(&self) -> Result<Vec<(Rid, Record)>> {
        let mut out = Vec::new();
        for page_no in 0..self.page_count() {
            let buf = self.read_page(page_no);
            for slot_no in 0..self.slots_per_page as u32 {
                if Self::slot_bit(&buf, slot_no) {
                    let off = self.slot_offset(slot_no);
                    out.push((
                        Rid { page_no, slot_no },
                        Record::from_bytes(buf[off..off + self.record_size].to_vec()),
                    ));
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stg::SimpleFileStorage;
    use tempfile::tempdir;

    #[test]
    fn insert_get_delete_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.data");
        let mut hf = HeapFile::new(SimpleFileStorage::new(path.to_str().unwrap()), 16);
        let rec = Record::from_bytes(vec![7u8; 16]);
        let rid = hf.insert(&rec).unwrap();
        assert_eq!(hf.get(rid).unwrap().bytes, vec![7u8; 16]);
        hf.delete(rid).unwrap();
        assert!(hf.get(rid).is_err());
    }

    #[test]
    fn scan_returns_only_occupied_slots() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t2.data");
        let mut hf = HeapFile::new(SimpleFileStorage::new(path.to_str().unwrap()), 8);
        let r1 = hf.insert(&Record::from_bytes(vec![1u8; 8])).unwrap();
        let _r2 = hf.insert(&Record::from_bytes(vec![2u8; 8])).unwrap();
        hf.delete(r1).unwrap();
        let rows = hf.scan().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.bytes, vec![2u8; 8]);
    }
}
