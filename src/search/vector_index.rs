//! FVIX (Fund Vector Index) flat inner-product index and binary format.
//!
//! Format overview (little-endian):
//!
//! Header (variable size):
//!   Magic: "FVIX" (4 bytes)
//!   Version: u16
//!   EmbedderID length: u16
//!   EmbedderID: bytes
//!   Dimension: u32
//!   Count: u32
//!   HeaderCRC32: u32 (CRC32 of header bytes before this field)
//!
//! Rows (fixed size per entry):
//!   Position: u32 (corpus position)
//!   IdHash: u64 (FNV-1a of the document id, validated on load)
//!
//! Vector slab:
//!   Count x Dimension f32, row-major, contiguous.
//!
//! Vectors are expected to be L2-normalized by the caller before build, so
//! inner product equals cosine similarity. Any load failure is reported as
//! an error; callers fall back to a full rebuild rather than failing
//! startup.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};

use super::ScoredPosition;

pub const FVIX_MAGIC: [u8; 4] = *b"FVIX";
pub const FVIX_VERSION: u16 = 1;
const ROW_SIZE_BYTES: usize = 12;

/// One document's entry handed to [`VectorIndex::build`].
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub position: u32,
    pub id_hash: u64,
    pub vector: Vec<f32>,
}

/// Immutable flat index over row-major f32 vectors.
#[derive(Debug)]
pub struct VectorIndex {
    embedder_id: String,
    dimension: usize,
    positions: Vec<u32>,
    id_hashes: Vec<u64>,
    vectors: Vec<f32>,
}

impl VectorIndex {
    pub fn build(
        embedder_id: impl Into<String>,
        dimension: usize,
        entries: Vec<VectorEntry>,
    ) -> Result<Self> {
        if dimension == 0 {
            bail!("dimension must be non-zero");
        }
        let mut positions = Vec::with_capacity(entries.len());
        let mut id_hashes = Vec::with_capacity(entries.len());
        let mut vectors = Vec::with_capacity(entries.len() * dimension);
        for (i, entry) in entries.into_iter().enumerate() {
            if entry.vector.len() != dimension {
                bail!(
                    "vector dimension mismatch at entry {i}: expected {dimension}, got {}",
                    entry.vector.len()
                );
            }
            positions.push(entry.position);
            id_hashes.push(entry.id_hash);
            vectors.extend_from_slice(&entry.vector);
        }
        Ok(Self {
            embedder_id: embedder_id.into(),
            dimension,
            positions,
            id_hashes,
            vectors,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    pub fn id_hashes(&self) -> &[u64] {
        &self.id_hashes
    }

    fn row(&self, idx: usize) -> Option<&[f32]> {
        let start = idx * self.dimension;
        let end = start + self.dimension;
        self.vectors.get(start..end)
    }

    /// `k` nearest rows by inner product, best first.
    ///
    /// Scores are raw inner products in [-1, 1] for normalized inputs;
    /// callers must not assume non-negativity.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredPosition> {
        if self.is_empty() || k == 0 || query.len() != self.dimension {
            return Vec::new();
        }

        let mut heap = BinaryHeap::with_capacity(k + 1);
        for idx in 0..self.len() {
            let Some(row) = self.row(idx) else { continue };
            let score = dot(row, query);
            heap.push(Reverse(ScoredEntry { score, idx }));
            if heap.len() > k {
                heap.pop();
            }
        }
        heap.into_sorted_vec()
            .into_iter()
            .map(|Reverse(entry)| ScoredPosition {
                position: self.positions[entry.idx] as usize,
                score: entry.score,
            })
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create index dir {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("create vector index {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        let mut header = Vec::new();
        header.extend_from_slice(&FVIX_MAGIC);
        header.extend_from_slice(&FVIX_VERSION.to_le_bytes());
        let id_bytes = self.embedder_id.as_bytes();
        let id_len =
            u16::try_from(id_bytes.len()).map_err(|_| anyhow!("embedder id too long"))?;
        header.extend_from_slice(&id_len.to_le_bytes());
        header.extend_from_slice(id_bytes);
        let dimension =
            u32::try_from(self.dimension).map_err(|_| anyhow!("dimension out of range"))?;
        header.extend_from_slice(&dimension.to_le_bytes());
        let count =
            u32::try_from(self.len()).map_err(|_| anyhow!("entry count out of range"))?;
        header.extend_from_slice(&count.to_le_bytes());

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header);
        writer.write_all(&header)?;
        writer.write_all(&hasher.finalize().to_le_bytes())?;

        for idx in 0..self.len() {
            let mut row = [0u8; ROW_SIZE_BYTES];
            row[0..4].copy_from_slice(&self.positions[idx].to_le_bytes());
            row[4..12].copy_from_slice(&self.id_hashes[idx].to_le_bytes());
            writer.write_all(&row)?;
        }
        for v in &self.vectors {
            writer.write_all(&v.to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("open vector index {}", path.display()))?;
        let mut reader = BufReader::new(file);
        let mut header_bytes = Vec::new();

        let magic = read_exact_array::<4, _>(&mut reader, &mut header_bytes)
            .context("read FVIX magic")?;
        if magic != FVIX_MAGIC {
            bail!("invalid FVIX magic: {magic:?}");
        }
        let version = read_u16_le(&mut reader, &mut header_bytes).context("read FVIX version")?;
        if version != FVIX_VERSION {
            bail!("unsupported FVIX version: {version}");
        }
        let id_len = read_u16_le(&mut reader, &mut header_bytes)
            .context("read embedder id length")? as usize;
        let id_bytes =
            read_exact_vec(&mut reader, id_len, &mut header_bytes).context("read embedder id")?;
        let embedder_id =
            String::from_utf8(id_bytes).context("embedder id is not valid UTF-8")?;
        let dimension =
            read_u32_le(&mut reader, &mut header_bytes).context("read dimension")? as usize;
        if dimension == 0 {
            bail!("dimension must be non-zero");
        }
        let count = read_u32_le(&mut reader, &mut header_bytes).context("read count")? as usize;

        let mut crc_bytes = [0u8; 4];
        reader.read_exact(&mut crc_bytes).context("read header crc")?;
        let crc_expected = u32::from_le_bytes(crc_bytes);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header_bytes);
        let crc_actual = hasher.finalize();
        if crc_actual != crc_expected {
            bail!("header CRC mismatch (expected {crc_expected:#010x}, got {crc_actual:#010x})");
        }

        let mut positions = Vec::with_capacity(count);
        let mut id_hashes = Vec::with_capacity(count);
        for _ in 0..count {
            let mut row = [0u8; ROW_SIZE_BYTES];
            reader.read_exact(&mut row).context("read index row")?;
            positions.push(u32::from_le_bytes(row[0..4].try_into()?));
            id_hashes.push(u64::from_le_bytes(row[4..12].try_into()?));
        }

        let mut vectors = Vec::with_capacity(count * dimension);
        let mut buf = [0u8; 4];
        for _ in 0..count * dimension {
            reader.read_exact(&mut buf).context("read vector slab")?;
            vectors.push(f32::from_le_bytes(buf));
        }
        let mut trailing = [0u8; 1];
        if reader.read(&mut trailing)? != 0 {
            bail!("trailing bytes after vector slab");
        }

        Ok(Self {
            embedder_id,
            dimension,
            positions,
            id_hashes,
            vectors,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct ScoredEntry {
    score: f32,
    idx: usize,
}

impl PartialEq for ScoredEntry {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.idx == other.idx
    }
}

impl Eq for ScoredEntry {}

impl PartialOrd for ScoredEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            // Lower position wins ties; the heap keeps the Reverse-max, so
            // compare descending on idx here.
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn read_exact_array<const N: usize, R: Read>(
    reader: &mut R,
    accum: &mut Vec<u8>,
) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    accum.extend_from_slice(&buf);
    Ok(buf)
}

fn read_exact_vec<R: Read>(reader: &mut R, len: usize, accum: &mut Vec<u8>) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    accum.extend_from_slice(&buf);
    Ok(buf)
}

fn read_u16_le<R: Read>(reader: &mut R, accum: &mut Vec<u8>) -> Result<u16> {
    let buf = read_exact_array::<2, _>(reader, accum)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32_le<R: Read>(reader: &mut R, accum: &mut Vec<u8>) -> Result<u32> {
    let buf = read_exact_array::<4, _>(reader, accum)?;
    Ok(u32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unit(dimension: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dimension];
        v[hot] = 1.0;
        v
    }

    fn sample_index() -> VectorIndex {
        let entries = vec![
            VectorEntry {
                position: 0,
                id_hash: 11,
                vector: unit(4, 0),
            },
            VectorEntry {
                position: 1,
                id_hash: 22,
                vector: unit(4, 1),
            },
            VectorEntry {
                position: 2,
                id_hash: 33,
                vector: unit(4, 2),
            },
        ];
        VectorIndex::build("fnv1a-4", 4, entries).unwrap()
    }

    #[test]
    fn exact_vector_is_top_one_with_unit_similarity() {
        let index = sample_index();
        let hits = index.search(&unit(4, 1), 2);
        assert_eq!(hits[0].position, 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dimension_mismatch_is_rejected_at_build() {
        let entries = vec![VectorEntry {
            position: 0,
            id_hash: 1,
            vector: vec![1.0; 3],
        }];
        assert!(VectorIndex::build("fnv1a-4", 4, entries).is_err());
    }

    #[test]
    fn mismatched_query_dimension_returns_empty() {
        let index = sample_index();
        assert!(index.search(&[1.0, 0.0], 2).is_empty());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.fvix");
        let index = sample_index();
        index.save(&path).unwrap();

        let loaded = VectorIndex::load(&path).unwrap();
        assert_eq!(loaded.embedder_id(), "fnv1a-4");
        assert_eq!(loaded.dimension(), 4);
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.id_hashes(), index.id_hashes());
        let hits = loaded.search(&unit(4, 2), 1);
        assert_eq!(hits[0].position, 2);
    }

    #[test]
    fn corrupted_header_fails_to_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.fvix");
        sample_index().save(&path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[6] ^= 0xff; // flip a bit inside the embedder id length
        std::fs::write(&path, bytes).unwrap();
        assert!(VectorIndex::load(&path).is_err());
    }

    #[test]
    fn truncated_file_fails_to_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.fvix");
        sample_index().save(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();
        assert!(VectorIndex::load(&path).is_err());
    }
}
