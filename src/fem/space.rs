//! Discrete function spaces, argument placeholders and coefficient functions.
//!
//! A [`FunctionSpace`] only knows its degrees of freedom: how many there are, which ones
//! each cell touches, and which ones lie on each marked boundary. Basis functions and
//! geometry live in the cell kernels of the forms defined over the space.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::KError;

/// Degrees of freedom, cell connectivity and boundary markers of a discrete space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpace {
    name: String,
    ndofs: usize,
    cells: Vec<Vec<usize>>,
    boundaries: BTreeMap<usize, Vec<usize>>,
}

impl FunctionSpace {
    pub fn new(name: impl Into<String>, ndofs: usize, cells: Vec<Vec<usize>>) -> Result<Self, KError> {
        if let Some(&dof) = cells.iter().flatten().find(|&&d| d >= ndofs) {
            return Err(KError::DimensionMismatch { expected: ndofs, found: dof + 1 });
        }
        Ok(Self { name: name.into(), ndofs, cells, boundaries: BTreeMap::new() })
    }

    /// Mark `dofs` as the boundary with id `marker`.
    pub fn with_boundary(mut self, marker: usize, mut dofs: Vec<usize>) -> Result<Self, KError> {
        if let Some(&dof) = dofs.iter().find(|&&d| d >= self.ndofs) {
            return Err(KError::DimensionMismatch { expected: self.ndofs, found: dof + 1 });
        }
        dofs.sort_unstable();
        dofs.dedup();
        self.boundaries.insert(marker, dofs);
        Ok(self)
    }

    /// Piecewise-linear space on a uniform mesh of `[0, 1]` with `n_cells` cells.
    ///
    /// Boundary 1 is the left end point, boundary 2 the right one.
    pub fn interval(n_cells: usize) -> Result<Self, KError> {
        if n_cells == 0 {
            return Err(KError::DimensionMismatch { expected: 1, found: 0 });
        }
        let cells = (0..n_cells).map(|c| vec![c, c + 1]).collect();
        Self::new("P1(interval)", n_cells + 1, cells)?
            .with_boundary(1, vec![0])?
            .with_boundary(2, vec![n_cells])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ndofs(&self) -> usize {
        self.ndofs
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn cell_dofs(&self, cell: usize) -> &[usize] {
        &self.cells[cell]
    }

    pub fn boundary_dofs(&self, marker: usize) -> Option<&[usize]> {
        self.boundaries.get(&marker).map(Vec::as_slice)
    }

    pub fn markers(&self) -> impl Iterator<Item = usize> + '_ {
        self.boundaries.keys().copied()
    }
}

/// Test (number 0) or trial (number 1) placeholder on a space.
#[derive(Debug, Clone)]
pub struct Argument {
    space: Arc<FunctionSpace>,
    number: usize,
}

impl Argument {
    pub fn test(space: &Arc<FunctionSpace>) -> Self {
        Self { space: Arc::clone(space), number: 0 }
    }

    pub fn trial(space: &Arc<FunctionSpace>) -> Self {
        Self { space: Arc::clone(space), number: 1 }
    }

    pub fn space(&self) -> &Arc<FunctionSpace> {
        &self.space
    }

    pub fn number(&self) -> usize {
        self.number
    }
}

/// Coefficient values on a space.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    space: Arc<FunctionSpace>,
    values: Vec<f64>,
}

impl Function {
    pub fn new(space: &Arc<FunctionSpace>) -> Self {
        Self { space: Arc::clone(space), values: vec![0.0; space.ndofs()] }
    }

    pub fn from_values(space: &Arc<FunctionSpace>, values: Vec<f64>) -> Result<Self, KError> {
        if values.len() != space.ndofs() {
            return Err(KError::DimensionMismatch { expected: space.ndofs(), found: values.len() });
        }
        Ok(Self { space: Arc::clone(space), values })
    }

    /// Set every value to `c`.
    pub fn assign(&mut self, c: f64) -> &mut Self {
        self.values.iter_mut().for_each(|v| *v = c);
        self
    }

    pub fn space(&self) -> &Arc<FunctionSpace> {
        &self.space
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Vec<f64> {
        &mut self.values
    }
}
