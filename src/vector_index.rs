//! IVF-flat approximate nearest-neighbor vector index: vectors are bucketed
//! into `lists` inverted lists by nearest centroid, and a query probes the
//! nearest `probes` lists, scanning their members exactly. Persisted as two
//! files mirroring the source's tree-file/aux-file split: `.vecidx` holds
//! the centroids and list membership, `.aux` holds the flat `Rid` table
//! the list entries index into (conceptually mmap'ed read-only post-build,
//! though this implementation loads it eagerly since a simulated engine
//! has no need for lazy mapping).

use crate::rc::{Result, RC};
use crate::record::Rid;
use crate::value::{vector_distance, DistanceType};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

struct InvertedList {
    centroid: Vec<f32>,
    members: Vec<u32>, // indices into `rids`
}

/// IVF-flat vector index over a single VECTOR column.
pub struct VectorIndex {
    vecidx_path: PathBuf,
    aux_path: PathBuf,
    distance: DistanceType,
    dim: usize,
    lists: Vec<InvertedList>,
    rids: Vec<Rid>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Build from a full table scan's `(rid, vector)` pairs, per
    /// `create_vector_index`. Centroids are seeded by evenly sampling the
    /// input (a simple, deterministic stand-in for the library's own
    /// tree-building heuristic).
    pub fn build(
        vecidx_path: &Path,
        aux_path: &Path,
        distance: DistanceType,
        num_lists: usize,
        rows: Vec<(Rid, Vec<f32>)>,
    ) -> Result<Self> {
        if rows.is_empty() {
            return Err(RC::Empty);
        }
        let dim = rows[0].1.len();
        let num_lists = num_lists.max(1).min(rows.len());
        let stride = rows.len() / num_lists;
        let centroids: Vec<Vec<f32>> = (0..num_lists).map(|i| rows[i * stride].1.clone()).collect();

        let mut lists: Vec<InvertedList> =
            centroids.into_iter().map(|c| InvertedList { centroid: c, members: Vec::new() }).collect();
        let mut rids = Vec::with_capacity(rows.len());
        let mut vectors = Vec::with_capacity(rows.len());
        for (i, (rid, vec)) in rows.into_iter().enumerate() {
            let best = lists
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    let da = vector_distance(DistanceType::L2, &a.centroid, &vec).unwrap_or(f32::MAX);
                    let db = vector_distance(DistanceType::L2, &b.centroid, &vec).unwrap_or(f32::MAX);
                    da.partial_cmp(&db).unwrap()
                })
                .map(|(idx, _)| idx)
                .unwrap_or(0);
            lists[best].members.push(i as u32);
            rids.push(rid);
            vectors.push(vec);
        }
        let idx = Self { vecidx_path: vecidx_path.to_path_buf(), aux_path: aux_path.to_path_buf(), distance, dim, lists, rids, vectors };
        idx.save()?;
        Ok(idx)
    }

    /// Return the top-`k` nearest `Rid`s to `query`, probing the nearest
    /// `probes` inverted lists.
    pub fn query(&self, query: &[f32], k: usize, probes: usize) -> Result<Vec<Rid>> {
        if query.len() != self.dim {
            return Err(RC::InvalidArgument);
        }
        let mut list_order: Vec<usize> = (0..self.lists.len()).collect();
        list_order.sort_by(|&a, &b| {
            let da = vector_distance(DistanceType::L2, &self.lists[a].centroid, query).unwrap_or(f32::MAX);
            let db = vector_distance(DistanceType::L2, &self.lists[b].centroid, query).unwrap_or(f32::MAX);
            da.partial_cmp(&db).unwrap()
        });
        let probes = probes.max(1).min(list_order.len());
        let mut candidates: Vec<(f32, usize)> = Vec::new();
        for &list_idx in &list_order[..probes] {
            for &member in &self.lists[list_idx].members {
                let d = vector_distance(self.distance, &self.vectors[member as usize], query)?;
                candidates.push((d, member as usize));
            }
        }
        candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        Ok(candidates.into_iter().take(k).map(|(_, i)| self.rids[i]).collect())
    }

    fn save(&self) -> Result<()> {
        let mut meta = Vec::new();
        meta.extend_from_slice(&(self.dim as u32).to_le_bytes());
        meta.extend_from_slice(&(self.lists.len() as u32).to_le_bytes());
        for list in &self.lists {
            for f in &list.centroid {
                meta.extend_from_slice(&f.to_le_bytes());
            }
            meta.extend_from_slice(&(list.members.len() as u32).to_le_bytes());
            for m in &list.members {
                meta.extend_from_slice(&m.to_le_bytes());
            }
        }
        write_atomic(&self.vecidx_path, &meta)?;

        let mut aux = Vec::new();
        aux.extend_from_slice(&(self.rids.len() as u32).to_le_bytes());
        for (rid, vec) in self.rids.iter().zip(self.vectors.iter()) {
            aux.extend_from_slice(&rid.page_no.to_le_bytes());
            aux.extend_from_slice(&rid.slot_no.to_le_bytes());
            for f in vec {
                aux.extend_from_slice(&f.to_le_bytes());
            }
        }
        write_atomic(&self.aux_path, &aux)
    }

    /// Reload a previously built index (the RID aux file is treated as
    /// read-only afterwards, per the access-method contract).
    pub fn open(vecidx_path: &Path, aux_path: &Path, distance: DistanceType) -> Result<Self> {
        let meta = fs::read(vecidx_path).map_err(|_| RC::IoerrRead)?;
        let aux = fs::read(aux_path).map_err(|_| RC::IoerrRead)?;
        let mut pos = 0usize;
        let dim = u32::from_le_bytes(meta[0..4].try_into().unwrap()) as usize;
        let num_lists = u32::from_le_bytes(meta[4..8].try_into().unwrap()) as usize;
        pos += 8;
        let mut lists = Vec::with_capacity(num_lists);
        for _ in 0..num_lists {
            let mut centroid = Vec::with_capacity(dim);
            for _ in 0..dim {
                centroid.push(f32::from_le_bytes(meta[pos..pos + 4].try_into().unwrap()));
                pos += 4;
            }
            let member_count = u32::from_le_bytes(meta[pos..pos + 4].try_into().unwrap()) as usize;
            pos += 4;
            let mut members = Vec::with_capacity(member_count);
            for _ in 0..member_count {
                members.push(u32::from_le_bytes(meta[pos..pos + 4].try_into().unwrap()));
                pos += 4;
            }
            lists.push(InvertedList { centroid, members });
        }

        let mut apos = 0usize;
        let n = u32::from_le_bytes(aux[0..4].try_into().unwrap()) as usize;
        apos += 4;
        let mut rids = Vec::with_capacity(n);
        let mut vectors = Vec::with_capacity(n);
        for _ in 0..n {
            let page_no = u64::from_le_bytes(aux[apos..apos + 8].try_into().unwrap());
            apos += 8;
            let slot_no = u32::from_le_bytes(aux[apos..apos + 4].try_into().unwrap());
            apos += 4;
            rids.push(Rid { page_no, slot_no });
            let mut vec = Vec::with_capacity(dim);
            for _ in 0..dim {
                vec.push(f32::from_le_bytes(aux[apos..apos + 4].try_into().unwrap()));
                apos += 4;
            }
            vectors.push(vec);
        }

        Ok(Self { vecidx_path: vecidx_path.to_path_buf(), aux_path: aux_path.to_path_buf(), distance, dim, lists, rids, vectors })
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut f = fs::File::create(&tmp).map_err(|_| RC::IoerrOpen)?;
        f.write_all(bytes).map_err(|_| RC::IoerrWrite)?;
        f.sync_all().map_err(|_| RC::IoerrSync)?;
    }
    fs::rename(&tmp, path).map_err(|_| RC::IoerrWrite)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn top_k_returns_closest_points() {
        let dir = tempdir().unwrap();
        let rows = vec![
            (Rid { page_no: 0, slot_no: 0 }, vec![0.0, 0.0]),
            (Rid { page_no: 0, slot_no: 1 }, vec![10.0, 10.0]),
            (Rid { page_no: 0, slot_no: 2 }, vec![0.1, 0.1]),
        ];
        let idx = VectorIndex::build(
            &dir.path().join("t-v.vecidx"),
            &dir.path().join("t-v.aux"),
            DistanceType::L2,
            2,
            rows,
        )
        .unwrap();
        let result = idx.query(&[0.0, 0.0], 2, 2).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.contains(&Rid { page_no: 0, slot_no: 0 }));
        assert!(result.contains(&Rid { page_no: 0, slot_no: 2 }));
    }

    #[test]
    fn reopen_after_build() {
        let dir = tempdir().unwrap();
        let rows = vec![
            (Rid { page_no: 0, slot_no: 0 }, vec![1.0]),
            (Rid { page_no: 0, slot_no: 1 }, vec![2.0]),
        ];
        let vecidx_path = dir.path().join("t-v.vecidx");
        let aux_path = dir.path().join("t-v.aux");
        VectorIndex::build(&vecidx_path, &aux_path, DistanceType::L2, 1, rows).unwrap();
        let reopened = VectorIndex::open(&vecidx_path, &aux_path, DistanceType::L2).unwrap();
        let result = reopened.query(&[1.1], 1, 1).unwrap();
        assert_eq!(result, vec![Rid { page_no: 0, slot_no: 0 }]);
    }
}
