// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dense row-major `f32` matrix holding one embedding per chunk.

use crate::errors::{RagError, Result};

/// Embedding array of shape `[rows, dim]`.
///
/// Row `i` is the embedding of chunk `i`. All rows share one dimension.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmbeddingMatrix {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    /// Wraps a flat row-major buffer.
    pub fn new(rows: usize, dim: usize, data: Vec<f32>) -> Result<Self> {
        if rows.checked_mul(dim) != Some(data.len()) {
            return Err(RagError::IndexBuild(format!(
                "buffer of {} values does not match shape [{}, {}]",
                data.len(),
                rows,
                dim
            )));
        }
        Ok(Self { rows, dim, data })
    }

    /// Builds a matrix from individual vectors; all must share one length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let mut matrix = Self::default();
        for row in rows {
            matrix.push_row(&row)?;
        }
        Ok(matrix)
    }

    /// Appends one vector. The first row fixes the dimension.
    pub fn push_row(&mut self, row: &[f32]) -> Result<()> {
        if self.rows == 0 {
            self.dim = row.len();
        } else if row.len() != self.dim {
            return Err(RagError::IndexBuild(format!(
                "row {} has dimension {}, expected {}",
                self.rows,
                row.len(),
                self.dim
            )));
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Shape as `[rows, dim]`.
    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.dim]
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.dim;
        Some(&self.data[start..start + self.dim])
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        (0..self.rows).filter_map(move |i| self.row(i))
    }

    /// Flat row-major view.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_keeps_order() {
        let m = EmbeddingMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.shape(), [2, 2]);
        assert_eq!(m.row(1), Some(&[3.0, 4.0][..]));
        assert_eq!(m.row(2), None);
        assert_eq!(m.iter_rows().count(), 2);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = EmbeddingMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, RagError::IndexBuild(_)));
    }

    #[test]
    fn new_checks_buffer_length() {
        assert!(EmbeddingMatrix::new(2, 3, vec![0.0; 6]).is_ok());
        assert!(EmbeddingMatrix::new(2, 3, vec![0.0; 5]).is_err());
        let empty = EmbeddingMatrix::new(0, 0, Vec::new()).unwrap();
        assert!(empty.is_empty());
    }
}
