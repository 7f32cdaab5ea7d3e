//! Paged buffer pool backing the out-of-line vector blob store: 4 KiB
//! pages, an LRU of 16 buffers, a dirty set, and writeback on eviction.
//! A plain LRU rather than an MVCC snapshot-retaining cache, since this
//! layer has no transactional readers of its own.

use crate::rc::{Result, RC};
use crate::stg::Storage;
use std::collections::HashMap;

pub const PAGE_SIZE: usize = 4096;
pub const LRU_CAPACITY: usize = 16;

struct Frame {
    page_no: u64,
    data: [u8; PAGE_SIZE],
    dirty: bool,
}

/// Fixed-capacity LRU buffer pool over a [`Storage`] backend, addressed by
/// `page_no` (byte offset = `page_no * PAGE_SIZE`).
pub struct Pager<S: Storage> {
    storage: S,
    frames: HashMap<u64, Frame>,
    /// Most-recently-used at the back.
    lru: Vec<u64>,
}

impl<S: Storage> Pager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage, frames: HashMap::new(), lru: Vec::new() }
    }

    pub fn page_count(&self) -> u64 {
        self.storage.size() / PAGE_SIZE as u64
    }

    fn touch(&mut self, page_no: u64) {
        self.lru.retain(|&p| p != page_no);
        self.lru.push(page_no);
    }

    fn evict_if_needed(&mut self) -> Result<()> {
        while self.frames.len() > LRU_CAPACITY {
            let victim = self.lru.remove(0);
            if let Some(frame) = self.frames.remove(&victim) {
                if frame.dirty {
                    self.storage.write(victim * PAGE_SIZE as u64, &frame.data);
                }
            }
        }
        Ok(())
    }

    fn load(&mut self, page_no: u64) -> Result<()> {
        if self.frames.contains_key(&page_no) {
            self.touch(page_no);
            return Ok(());
        }
        let mut data = [0u8; PAGE_SIZE];
        if page_no < self.page_count() {
            self.storage.read(page_no * PAGE_SIZE as u64, &mut data);
        }
        self.frames.insert(page_no, Frame { page_no, data, dirty: false });
        self.touch(page_no);
        self.evict_if_needed()
    }

    /// Read `len` bytes starting at `offset` (may span multiple pages).
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        let mut off = offset;
        let mut remaining = len;
        while remaining > 0 {
            let page_no = off / PAGE_SIZE as u64;
            let in_page = (off % PAGE_SIZE as u64) as usize;
            self.load(page_no)?;
            let frame = self.frames.get(&page_no).ok_or(RC::Internal)?;
            let take = remaining.min(PAGE_SIZE - in_page);
            out.extend_from_slice(&frame.data[in_page..in_page + take]);
            off += take as u64;
            remaining -= take;
        }
        Ok(out)
    }

    /// Write `bytes` starting at `offset`, extending the backing file if
    /// writing past its current size.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut off = offset;
        let mut pos = 0usize;
        while pos < bytes.len() {
            let page_no = off / PAGE_SIZE as u64;
            let in_page = (off % PAGE_SIZE as u64) as usize;
            self.load(page_no)?;
            let take = (bytes.len() - pos).min(PAGE_SIZE - in_page);
            let frame = self.frames.get_mut(&page_no).ok_or(RC::Internal)?;
            frame.data[in_page..in_page + take].copy_from_slice(&bytes[pos..pos + take]);
            frame.dirty = true;
            pos += take;
            off += take as u64;
        }
        let new_size = offset + bytes.len() as u64;
        if new_size > self.storage.size() {
            self.storage.commit(new_size.div_ceil(PAGE_SIZE as u64) * PAGE_SIZE as u64);
        }
        Ok(())
    }

    /// Flush all dirty frames to the backing storage.
    pub fn flush(&mut self) -> Result<()> {
        for frame in self.frames.values_mut() {
            if frame.dirty {
                self.storage.write(frame.page_no * PAGE_SIZE as u64, &frame.data);
                frame.dirty = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stg::SimpleFileStorage;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_across_eviction() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.vec");
        let storage = SimpleFileStorage::new(path.to_str().unwrap());
        let mut pager = Pager::new(storage);
        for i in 0..32u64 {
            pager.write_at(i * PAGE_SIZE as u64, &[i as u8; 8]).unwrap();
        }
        pager.flush().unwrap();
        let got = pager.read_at(3 * PAGE_SIZE as u64, 8).unwrap();
        assert_eq!(got, vec![3u8; 8]);
    }
}
