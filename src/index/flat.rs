//! Exact nearest-neighbour search over a dense, append-only vector table.
//!
//! Vectors are stored row-major in a single buffer and compared by squared
//! Euclidean distance. The structure supports appending and merging but no
//! point deletion; removing vectors means building a new table.


use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{QaError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Vector stored at `position`
    #[cfg(test)]
    pub(crate) fn get(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Append several vectors; on a dimension mismatch none are added
    #[inline]
    pub fn add_batch(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for vector in vectors {
            self.check_dimension(vector)?;
        }
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Append every vector of `other` after the existing ones
    #[inline]
    pub fn merge_from(&mut self, other: &FlatIndex) -> Result<()> {
        if other.dimension != self.dimension {
            return Err(dimension_mismatch(self.dimension, other.dimension));
        }
        self.data.extend_from_slice(&other.data);
        Ok(())
    }

    /// The `k` nearest positions as `(position, squared distance)`, closest first.
    /// Equal distances are ordered by position.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        self.check_dimension(query)?;

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let hits = self
            .data
            .chunks_exact(self.dimension)
            .map(|row| squared_l2(row, query))
            .enumerate()
            .k_smallest_by(k, |a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .collect();

        Ok(hits)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(dimension_mismatch(self.dimension, vector.len()));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(QaError::Index(
                "vector contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }
}

fn dimension_mismatch(expected: usize, actual: usize) -> QaError {
    QaError::Index(format!(
        "dimension mismatch: index holds {}-dimensional vectors, got {}",
        expected, actual
    ))
}

#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
