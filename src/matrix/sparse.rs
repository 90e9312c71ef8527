// SparseMatrix trait and the CSR implementation used for assembled operators

use crate::core::traits::{Indexing, MatTransVec, MatVec};
use crate::error::KError;
use faer::Mat;
use num_traits::Float;

/// A read‐only sparse matrix supporting y = A * x.
pub trait SparseMatrix<T> {
    /// Number of rows.
    fn nrows(&self) -> usize;
    /// Number of columns.
    fn ncols(&self) -> usize;
    /// Compute y = A * x.  `x.len() == ncols()`, `y.len() == nrows()`.
    fn spmv(&self, x: &[T], y: &mut [T]);
}

/// Nonzero structure of a CSR matrix, with sorted column indices in every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparsityPattern {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
}

impl SparsityPattern {
    /// Build from per-row column lists; duplicates are merged.
    pub fn from_rows(nrows: usize, ncols: usize, mut rows: Vec<Vec<usize>>) -> Result<Self, KError> {
        if rows.len() != nrows {
            return Err(KError::DimensionMismatch { expected: nrows, found: rows.len() });
        }
        let mut row_ptr = Vec::with_capacity(nrows + 1);
        let mut col_idx = Vec::new();
        row_ptr.push(0);
        for row in rows.iter_mut() {
            row.sort_unstable();
            row.dedup();
            if let Some(&c) = row.last() {
                if c >= ncols {
                    return Err(KError::Assembly(format!("column index {c} out of range for {ncols} columns")));
                }
            }
            col_idx.extend_from_slice(row);
            row_ptr.push(col_idx.len());
        }
        Ok(Self { nrows, ncols, row_ptr, col_idx })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    pub fn row(&self, i: usize) -> &[usize] {
        &self.col_idx[self.row_ptr[i]..self.row_ptr[i + 1]]
    }
}

/// Compressed sparse row matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<T> {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<T>,
}

impl<T: Float> CsrMatrix<T> {
    /// Build a CSR from raw row‐ptr, col‐idx, and values.
    pub fn from_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self, KError> {
        if row_ptr.len() != nrows + 1 {
            return Err(KError::DimensionMismatch { expected: nrows + 1, found: row_ptr.len() });
        }
        if col_idx.len() != values.len() || row_ptr.last() != Some(&col_idx.len()) {
            return Err(KError::DimensionMismatch { expected: col_idx.len(), found: values.len() });
        }
        for i in 0..nrows {
            let cols = &col_idx[row_ptr[i]..row_ptr[i + 1]];
            if cols.windows(2).any(|w| w[0] >= w[1]) || cols.last().is_some_and(|&c| c >= ncols) {
                return Err(KError::Assembly(format!("row {i} has unsorted or out-of-range column indices")));
            }
        }
        Ok(Self { nrows, ncols, row_ptr, col_idx, values })
    }

    /// All-zero matrix with the given nonzero structure.
    pub fn zeros(pattern: SparsityPattern) -> Self {
        let values = vec![T::zero(); pattern.nnz()];
        Self {
            nrows: pattern.nrows,
            ncols: pattern.ncols,
            row_ptr: pattern.row_ptr,
            col_idx: pattern.col_idx,
            values,
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row(&self, i: usize) -> (&[usize], &[T]) {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        (&self.col_idx[range.clone()], &self.values[range])
    }

    pub fn row_mut(&mut self, i: usize) -> (&[usize], &mut [T]) {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        (&self.col_idx[range.clone()], &mut self.values[range])
    }

    /// Stored value at (i, j), zero outside the pattern.
    pub fn get(&self, i: usize, j: usize) -> T {
        let (cols, vals) = self.row(i);
        cols.binary_search(&j).map(|k| vals[k]).unwrap_or_else(|_| T::zero())
    }

    /// Mutable access to a stored entry; `None` outside the pattern.
    pub fn entry_mut(&mut self, i: usize, j: usize) -> Option<&mut T> {
        let (cols, vals) = self.row_mut(i);
        cols.binary_search(&j).ok().map(move |k| &mut vals[k])
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn fill_zero(&mut self) {
        self.values.iter_mut().for_each(|v| *v = T::zero());
    }

    pub fn diagonal(&self) -> Vec<T> {
        (0..self.nrows.min(self.ncols)).map(|i| self.get(i, i)).collect()
    }

    pub fn to_dense(&self) -> Mat<T> {
        Mat::from_fn(self.nrows, self.ncols, |i, j| self.get(i, j))
    }
}

impl<T: Float + Send + Sync> SparseMatrix<T> for CsrMatrix<T> {
    fn nrows(&self) -> usize {
        self.nrows
    }
    fn ncols(&self) -> usize {
        self.ncols
    }
    fn spmv(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.ncols);
        assert_eq!(y.len(), self.nrows);
        let row_dot = |i: usize| {
            let (cols, vals) = self.row(i);
            cols.iter().zip(vals).fold(T::zero(), |acc, (&j, &v)| acc + v * x[j])
        };
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            y.par_iter_mut().enumerate().for_each(|(i, yi)| *yi = row_dot(i));
        }
        #[cfg(not(feature = "rayon"))]
        {
            y.iter_mut().enumerate().for_each(|(i, yi)| *yi = row_dot(i));
        }
    }
}

impl<T: Float + Send + Sync> MatVec<Vec<T>> for CsrMatrix<T> {
    fn matvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        self.spmv(x, y);
    }
}

impl<T: Float> MatTransVec<Vec<T>> for CsrMatrix<T> {
    fn mattransvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        assert_eq!(x.len(), self.nrows);
        assert_eq!(y.len(), self.ncols);
        y.iter_mut().for_each(|v| *v = T::zero());
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                y[j] = y[j] + v * x[i];
            }
        }
    }
}

impl<T> Indexing for CsrMatrix<T> {
    fn nrows(&self) -> usize {
        self.nrows
    }
}
