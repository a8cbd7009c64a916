/// Exact inner-product vector index
use std::cmp::Ordering;
use thiserror::Error;

const MAGIC: &[u8; 4] = b"DQVI";
const FORMAT_VERSION: u32 = 1;
const HEADER_SIZE: usize = 4 + 4 + 4 + 8;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Index contains no vectors")]
    Empty,

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Corrupt index file: {0}")]
    Corrupt(String),
}

/// One search hit: position in the index and its inner-product score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub score: f32,
}

/// Flat index over row-major `f32` storage
///
/// Scores are inner products. Stored and query vectors are expected to be
/// L2-normalized so the score is cosine similarity; nothing here enforces it.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector stored at `position`
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Append vectors in order
    ///
    /// Dimensions are checked up front, so a rejected batch leaves the index
    /// unchanged.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), VectorIndexError> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Drop every vector at or after `len`
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len * self.dimension);
    }

    /// Top-`k` neighbors by descending score, ties by ascending position
    ///
    /// `k` larger than the index returns every vector.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorIndexError> {
        if query.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if self.is_empty() {
            return Err(VectorIndexError::Empty);
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                score: dot(query, vector),
            })
            .collect();

        let k = k.min(neighbors.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, rank_order);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(rank_order);

        Ok(neighbors)
    }

    /// Serialize as `DQVI | version u32 | dimension u32 | count u64 | f32 data`
    ///
    /// Integers and floats are little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        bytes.extend_from_slice(bytemuck::cast_slice(&self.data));
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VectorIndexError> {
        if bytes.len() < HEADER_SIZE {
            return Err(VectorIndexError::Corrupt(format!(
                "file is {} bytes, shorter than the header",
                bytes.len()
            )));
        }

        if &bytes[0..4] != MAGIC {
            return Err(VectorIndexError::Corrupt("bad magic".to_string()));
        }

        let version = read_u32(&bytes[4..8]);
        if version != FORMAT_VERSION {
            return Err(VectorIndexError::Corrupt(format!(
                "unsupported format version {}",
                version
            )));
        }

        let dimension = read_u32(&bytes[8..12]) as usize;
        let count = read_u64(&bytes[12..20]) as usize;
        let payload = &bytes[HEADER_SIZE..];

        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| VectorIndexError::Corrupt("header overflows".to_string()))?;
        if payload.len() != expected {
            return Err(VectorIndexError::Corrupt(format!(
                "expected {} payload bytes for {} x {}, found {}",
                expected,
                count,
                dimension,
                payload.len()
            )));
        }

        Ok(Self {
            dimension,
            data: bytemuck::pod_collect_to_vec(payload),
        })
    }
}

fn rank_order(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.position.cmp(&b.position))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
