//! Global assembly of forms into matrices and vectors.
//!
//! Assembly is split the way the solver objects need it: [`allocate_matrix`] builds the
//! nonzero structure once, and an [`AssemblyCallable`] refills the values of that same
//! matrix as many times as required. Boundary conditions are applied symmetrically: rows
//! and columns of constrained dofs are zeroed, and for forms whose test and trial spaces
//! coincide the diagonal entry is set to one.

use std::sync::Arc;

use log::debug;

use crate::error::KError;
use crate::fem::bcs::{constrained_nodes, DirichletBC};
use crate::fem::form::{BilinearForm, FormParameters, FormRef, LinearForm};
use crate::matrix::{AssembledMatrix, MatHandle, MatType, SparsityPattern};

/// Nonzero structure of `form`: the union of the test × trial dofs of every cell, plus the
/// diagonal when the form is square on a single space.
pub fn sparsity(form: &dyn BilinearForm) -> Result<SparsityPattern, KError> {
    let (test, trial) = (form.test_space(), form.trial_space());
    if test.num_cells() != trial.num_cells() {
        return Err(KError::Assembly("test and trial spaces have different cell counts".into()));
    }
    let mut rows = vec![Vec::new(); test.ndofs()];
    for cell in 0..test.num_cells() {
        let cols = trial.cell_dofs(cell);
        for &r in test.cell_dofs(cell) {
            rows[r].extend_from_slice(cols);
        }
    }
    if Arc::ptr_eq(test, trial) {
        for (i, row) in rows.iter_mut().enumerate() {
            row.push(i);
        }
    }
    SparsityPattern::from_rows(test.ndofs(), trial.ndofs(), rows)
}

/// Allocate a zeroed matrix for `form` in the requested storage format.
pub fn allocate_matrix(
    form: &FormRef,
    bcs: &[DirichletBC],
    params: &FormParameters,
    mat_type: MatType,
    options_prefix: &str,
) -> Result<MatHandle, KError> {
    check_bcs(form.as_ref(), bcs)?;
    let pattern = sparsity(form.as_ref())?;
    debug!(
        "allocating {} matrix for form {:?} ({}x{}, nnz {}, {} bcs, quadrature degree {:?})",
        mat_type,
        form.label(),
        pattern.nrows(),
        pattern.ncols(),
        pattern.nnz(),
        bcs.len(),
        params.quadrature_degree,
    );
    let mut mat = AssembledMatrix::allocate(pattern, mat_type);
    mat.set_options_prefix(options_prefix);
    Ok(mat.into_handle())
}

/// Reusable assembly of one form, with its boundary conditions, into one matrix.
pub struct AssemblyCallable {
    form: FormRef,
    tensor: MatHandle,
    row_nodes: Vec<usize>,
    col_nodes: Vec<usize>,
    diagonal: Option<f64>,
    params: FormParameters,
}

impl AssemblyCallable {
    pub fn new(
        form: &FormRef,
        tensor: &MatHandle,
        bcs: &[DirichletBC],
        params: &FormParameters,
    ) -> Result<Self, KError> {
        check_bcs(form.as_ref(), bcs)?;
        let (test, trial) = (form.test_space(), form.trial_space());
        {
            let mat = tensor.read();
            if mat.nrows() != test.ndofs() {
                return Err(KError::DimensionMismatch { expected: test.ndofs(), found: mat.nrows() });
            }
            if mat.ncols() != trial.ndofs() {
                return Err(KError::DimensionMismatch { expected: trial.ndofs(), found: mat.ncols() });
            }
        }
        Ok(Self {
            form: Arc::clone(form),
            tensor: Arc::clone(tensor),
            row_nodes: constrained_nodes(bcs, test),
            col_nodes: constrained_nodes(bcs, trial),
            diagonal: Arc::ptr_eq(test, trial).then_some(1.0),
            params: params.clone(),
        })
    }

    /// Zero the matrix and assemble the form into it.
    pub fn assemble(&self) -> Result<(), KError> {
        let (test, trial) = (self.form.test_space(), self.form.trial_space());
        let mut mat = self.tensor.write();
        mat.zero_entries();
        for cell in 0..test.num_cells() {
            let (rows, cols) = (test.cell_dofs(cell), trial.cell_dofs(cell));
            let local = self.form.cell_matrix(cell, &self.params);
            if local.nrows() != rows.len() || local.ncols() != cols.len() {
                return Err(KError::Assembly(format!(
                    "cell {cell}: kernel returned a {}x{} matrix for {}x{} dofs",
                    local.nrows(),
                    local.ncols(),
                    rows.len(),
                    cols.len()
                )));
            }
            for (li, &i) in rows.iter().enumerate() {
                for (lj, &j) in cols.iter().enumerate() {
                    mat.add_value(i, j, local[(li, lj)])?;
                }
            }
        }
        mat.constrain(&self.row_nodes, &self.col_nodes, self.diagonal)?;
        mat.assembly_end();
        debug!("assembled form {:?} (state {})", self.form.label(), mat.state());
        Ok(())
    }
}

/// Allocate and assemble in one go.
pub fn assemble_matrix(
    form: &FormRef,
    bcs: &[DirichletBC],
    params: &FormParameters,
    mat_type: MatType,
) -> Result<MatHandle, KError> {
    let tensor = allocate_matrix(form, bcs, params, mat_type, "")?;
    AssemblyCallable::new(form, &tensor, bcs, params)?.assemble()?;
    Ok(tensor)
}

/// Assemble a linear form into a vector.
pub fn assemble_vector(form: &dyn LinearForm, params: &FormParameters) -> Result<Vec<f64>, KError> {
    let space = form.space();
    let mut b = vec![0.0; space.ndofs()];
    for cell in 0..space.num_cells() {
        let dofs = space.cell_dofs(cell);
        let local = form.cell_vector(cell, params);
        if local.len() != dofs.len() {
            return Err(KError::Assembly(format!(
                "cell {cell}: kernel returned {} values for {} dofs",
                local.len(),
                dofs.len()
            )));
        }
        for (&i, v) in dofs.iter().zip(local) {
            b[i] += v;
        }
    }
    Ok(b)
}

/// An assembled matrix that remembers the form and boundary conditions it came from.
pub struct FormMatrix {
    form: FormRef,
    bcs: Vec<DirichletBC>,
    params: FormParameters,
    tensor: MatHandle,
}

impl FormMatrix {
    pub fn assemble(
        form: &FormRef,
        bcs: &[DirichletBC],
        params: &FormParameters,
        mat_type: MatType,
    ) -> Result<Self, KError> {
        let tensor = assemble_matrix(form, bcs, params, mat_type)?;
        Ok(Self { form: Arc::clone(form), bcs: bcs.to_vec(), params: params.clone(), tensor })
    }

    pub fn form(&self) -> &FormRef {
        &self.form
    }

    pub fn bcs(&self) -> &[DirichletBC] {
        &self.bcs
    }

    pub fn form_parameters(&self) -> &FormParameters {
        &self.params
    }

    pub fn handle(&self) -> &MatHandle {
        &self.tensor
    }

    /// Reassemble in place with different boundary conditions.
    ///
    /// Nothing happens when `bcs` constrain the same dofs as the current ones.
    pub fn reassemble_with(&mut self, bcs: &[DirichletBC]) -> Result<bool, KError> {
        let unchanged = bcs.len() == self.bcs.len()
            && bcs.iter().zip(&self.bcs).all(|(a, b)| a.same_nodes(b));
        if unchanged {
            self.bcs = bcs.to_vec();
            return Ok(false);
        }
        AssemblyCallable::new(&self.form, &self.tensor, bcs, &self.params)?.assemble()?;
        self.bcs = bcs.to_vec();
        Ok(true)
    }
}

fn check_bcs(form: &dyn BilinearForm, bcs: &[DirichletBC]) -> Result<(), KError> {
    let (test, trial) = (form.test_space(), form.trial_space());
    match bcs.iter().find(|bc| !Arc::ptr_eq(bc.space(), test) && !Arc::ptr_eq(bc.space(), trial)) {
        Some(bc) => Err(KError::Assembly(format!(
            "boundary condition on {:?} does not match the form's spaces",
            bc.space().name()
        ))),
        None => Ok(()),
    }
}
