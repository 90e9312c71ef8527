//! Matrix module: CSR storage, assembled matrices and null-space annotations.
//!
//! An [`AssembledMatrix`] is the explicit operator produced by assembling a bilinear form.
//! It is shared between the assembler and the solver objects through a [`MatHandle`] and
//! carries an object-state counter that increases with every completed assembly, so solver
//! objects can tell when their factorization is stale.

pub mod nullspace;
pub mod sparse;

pub use nullspace::NullSpace;
pub use sparse::{CsrMatrix, SparseMatrix, SparsityPattern};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use faer::Mat;
use parking_lot::RwLock;

use crate::core::traits::{Indexing, MatTransVec, MatVec};
use crate::error::KError;

/// Shared, lockable assembled matrix.
pub type MatHandle = Arc<RwLock<AssembledMatrix>>;

/// Matrix storage format selected through the `mat_type` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatType {
    /// General compressed sparse row storage.
    #[default]
    Aij,
    /// Column-major dense storage.
    Dense,
}

impl FromStr for MatType {
    type Err = KError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aij" | "seqaij" | "mpiaij" => Ok(MatType::Aij),
            "dense" | "seqdense" | "mpidense" => Ok(MatType::Dense),
            _ => Err(KError::UnknownType { kind: "mat", name: s.to_string() }),
        }
    }
}

impl fmt::Display for MatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatType::Aij => "aij",
            MatType::Dense => "dense",
        })
    }
}

/// Backing storage of an assembled matrix.
#[derive(Debug, Clone)]
pub enum Storage {
    Csr(CsrMatrix<f64>),
    Dense(Mat<f64>),
}

/// Explicit matrix produced by assembly.
#[derive(Debug, Clone)]
pub struct AssembledMatrix {
    storage: Storage,
    options_prefix: String,
    nullspace: Option<Arc<NullSpace>>,
    transpose_nullspace: Option<Arc<NullSpace>>,
    state: u64,
}

impl AssembledMatrix {
    /// Allocate an all-zero matrix of the requested type over `pattern`.
    pub fn allocate(pattern: SparsityPattern, mat_type: MatType) -> Self {
        let storage = match mat_type {
            MatType::Aij => Storage::Csr(CsrMatrix::zeros(pattern)),
            MatType::Dense => Storage::Dense(Mat::zeros(pattern.nrows(), pattern.ncols())),
        };
        Self::from_storage(storage)
    }

    pub fn from_storage(storage: Storage) -> Self {
        Self {
            storage,
            options_prefix: String::new(),
            nullspace: None,
            transpose_nullspace: None,
            state: 0,
        }
    }

    pub fn into_handle(self) -> MatHandle {
        Arc::new(RwLock::new(self))
    }

    pub fn mat_type(&self) -> MatType {
        match self.storage {
            Storage::Csr(_) => MatType::Aij,
            Storage::Dense(_) => MatType::Dense,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn nrows(&self) -> usize {
        match &self.storage {
            Storage::Csr(m) => m.nrows(),
            Storage::Dense(m) => m.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match &self.storage {
            Storage::Csr(m) => m.ncols(),
            Storage::Dense(m) => m.ncols(),
        }
    }

    pub fn options_prefix(&self) -> &str {
        &self.options_prefix
    }

    pub fn set_options_prefix(&mut self, prefix: &str) {
        self.options_prefix = prefix.to_string();
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        match &self.storage {
            Storage::Csr(m) => m.get(i, j),
            Storage::Dense(m) => m[(i, j)],
        }
    }

    /// Zero every stored value, keeping the nonzero structure.
    pub fn zero_entries(&mut self) {
        match &mut self.storage {
            Storage::Csr(m) => m.fill_zero(),
            Storage::Dense(m) => *m = Mat::zeros(m.nrows(), m.ncols()),
        }
    }

    /// Add `v` at (i, j). Sparse storage rejects entries outside the preallocated pattern.
    pub fn add_value(&mut self, i: usize, j: usize, v: f64) -> Result<(), KError> {
        match &mut self.storage {
            Storage::Csr(m) => {
                let entry = m
                    .entry_mut(i, j)
                    .ok_or_else(|| KError::Assembly(format!("new nonzero at ({i}, {j}) caused a malloc")))?;
                *entry += v;
            }
            Storage::Dense(m) => m[(i, j)] += v,
        }
        Ok(())
    }

    /// Zero the given rows and columns; with `diag`, put it on the diagonal of every zeroed row.
    pub fn constrain(&mut self, rows: &[usize], cols: &[usize], diag: Option<f64>) -> Result<(), KError> {
        let mut row_mask = vec![false; self.nrows()];
        let mut col_mask = vec![false; self.ncols()];
        rows.iter().for_each(|&r| row_mask[r] = true);
        cols.iter().for_each(|&c| col_mask[c] = true);
        match &mut self.storage {
            Storage::Csr(m) => {
                for i in 0..m.nrows() {
                    let (cols, vals) = m.row_mut(i);
                    for (&j, v) in cols.iter().zip(vals.iter_mut()) {
                        if row_mask[i] || col_mask[j] {
                            *v = 0.0;
                        }
                    }
                }
                if let Some(d) = diag {
                    for &r in rows {
                        let entry = m
                            .entry_mut(r, r)
                            .ok_or_else(|| KError::Assembly(format!("missing diagonal entry in constrained row {r}")))?;
                        *entry = d;
                    }
                }
            }
            Storage::Dense(m) => {
                for i in 0..m.nrows() {
                    for j in 0..m.ncols() {
                        if row_mask[i] || col_mask[j] {
                            m[(i, j)] = 0.0;
                        }
                    }
                }
                if let Some(d) = diag {
                    for &r in rows {
                        m[(r, r)] = d;
                    }
                }
            }
        }
        Ok(())
    }

    /// Mark the end of an assembly pass; bumps the object state.
    pub fn assembly_end(&mut self) {
        self.state += 1;
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    /// Attach (or clear) the null space; its vectors must have `ncols` entries.
    pub fn set_nullspace(&mut self, nullspace: Option<Arc<NullSpace>>) -> Result<(), KError> {
        if let Some(ns) = &nullspace {
            ns.check_size(self.ncols())?;
        }
        self.nullspace = nullspace;
        Ok(())
    }

    pub fn nullspace(&self) -> Option<&Arc<NullSpace>> {
        self.nullspace.as_ref()
    }

    /// Attach (or clear) the transpose null space; its vectors must have `nrows` entries.
    pub fn set_transpose_nullspace(&mut self, nullspace: Option<Arc<NullSpace>>) -> Result<(), KError> {
        if let Some(ns) = &nullspace {
            ns.check_size(self.nrows())?;
        }
        self.transpose_nullspace = nullspace;
        Ok(())
    }

    pub fn transpose_nullspace(&self) -> Option<&Arc<NullSpace>> {
        self.transpose_nullspace.as_ref()
    }

    pub fn diagonal(&self) -> Vec<f64> {
        match &self.storage {
            Storage::Csr(m) => m.diagonal(),
            Storage::Dense(m) => (0..m.nrows().min(m.ncols())).map(|i| m[(i, i)]).collect(),
        }
    }

    pub fn to_dense(&self) -> Mat<f64> {
        match &self.storage {
            Storage::Csr(m) => m.to_dense(),
            Storage::Dense(m) => m.clone(),
        }
    }

    /// CSR copy; dense storage keeps its nonzeros and the diagonal.
    pub fn to_csr(&self) -> Result<CsrMatrix<f64>, KError> {
        match &self.storage {
            Storage::Csr(m) => Ok(m.clone()),
            Storage::Dense(m) => {
                let (mut row_ptr, mut col_idx, mut values) = (vec![0], Vec::new(), Vec::new());
                for i in 0..m.nrows() {
                    for j in 0..m.ncols() {
                        if m[(i, j)] != 0.0 || i == j {
                            col_idx.push(j);
                            values.push(m[(i, j)]);
                        }
                    }
                    row_ptr.push(col_idx.len());
                }
                CsrMatrix::from_csr(m.nrows(), m.ncols(), row_ptr, col_idx, values)
            }
        }
    }
}

impl MatVec<Vec<f64>> for AssembledMatrix {
    fn matvec(&self, x: &Vec<f64>, y: &mut Vec<f64>) {
        match &self.storage {
            Storage::Csr(m) => m.matvec(x, y),
            Storage::Dense(m) => m.matvec(x, y),
        }
    }
}

impl MatTransVec<Vec<f64>> for AssembledMatrix {
    fn mattransvec(&self, x: &Vec<f64>, y: &mut Vec<f64>) {
        match &self.storage {
            Storage::Csr(m) => m.mattransvec(x, y),
            Storage::Dense(m) => m.mattransvec(x, y),
        }
    }
}

impl Indexing for AssembledMatrix {
    fn nrows(&self) -> usize {
        AssembledMatrix::nrows(self)
    }
}
