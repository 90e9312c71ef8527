//! Matrix-free operators: the action of a form computed cell by cell.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::traits::{Indexing, MatTransVec, MatVec};
use crate::error::KError;
use crate::fem::bcs::{constrained_nodes, DirichletBC};
use crate::fem::form::{FormParameters, FormRef};
use crate::fem::space::FunctionSpace;
use crate::matrix::NullSpace;

/// Unassembled operator defined by a bilinear form and its boundary conditions.
///
/// Constrained columns ignore their input entries and, for diagonal blocks, constrained rows
/// copy the input entry to the output. The action therefore matches the matrix assembled
/// from the same form and conditions.
///
/// Cell kernel sizes are checked once at construction. A kernel that later returns a
/// matrix of another size makes the products panic.
pub struct MatFreeOperator {
    form: FormRef,
    row_bcs: Vec<DirichletBC>,
    col_bcs: Vec<DirichletBC>,
    row_nodes: Vec<usize>,
    col_nodes: Vec<usize>,
    on_diag: bool,
    params: FormParameters,
    nullspace: Option<Arc<NullSpace>>,
    transpose_nullspace: Option<Arc<NullSpace>>,
    state: AtomicU64,
}

impl MatFreeOperator {
    /// Wrap `form`; `bcs` are split into row and column conditions by space.
    pub fn new(form: FormRef, bcs: Vec<DirichletBC>) -> Result<Self, KError> {
        let on_diag = Arc::ptr_eq(form.test_space(), form.trial_space());
        Self::with_block_position(form, bcs, on_diag)
    }

    fn with_block_position(
        form: FormRef,
        bcs: Vec<DirichletBC>,
        on_diag: bool,
    ) -> Result<Self, KError> {
        let (test, trial) = (Arc::clone(form.test_space()), Arc::clone(form.trial_space()));
        let foreign = |bc: &&DirichletBC| {
            !Arc::ptr_eq(bc.space(), &test) && !Arc::ptr_eq(bc.space(), &trial)
        };
        if let Some(bc) = bcs.iter().find(foreign) {
            return Err(KError::Assembly(format!(
                "boundary condition on {:?} does not match the operator's spaces",
                bc.space().name()
            )));
        }
        check_kernel_sizes(&form)?;
        let on = |space: &Arc<FunctionSpace>| -> Vec<DirichletBC> {
            bcs.iter().filter(|bc| Arc::ptr_eq(bc.space(), space)).cloned().collect()
        };
        let (row_bcs, col_bcs) = (on(&test), on(&trial));
        Ok(Self {
            row_nodes: constrained_nodes(&row_bcs, &test),
            col_nodes: constrained_nodes(&col_bcs, &trial),
            form,
            row_bcs,
            col_bcs,
            on_diag,
            params: FormParameters::default(),
            nullspace: None,
            transpose_nullspace: None,
            state: AtomicU64::new(0),
        })
    }

    pub fn with_form_parameters(mut self, params: FormParameters) -> Self {
        self.params = params;
        self
    }

    /// Attach the null space of the operator; its vectors live on the trial space.
    pub fn with_nullspace(mut self, nullspace: NullSpace) -> Result<Self, KError> {
        nullspace.check_size(self.ncols())?;
        self.nullspace = Some(Arc::new(nullspace));
        Ok(self)
    }

    /// Attach the null space of the transpose; its vectors live on the test space.
    pub fn with_transpose_nullspace(mut self, nullspace: NullSpace) -> Result<Self, KError> {
        nullspace.check_size(self.nrows())?;
        self.transpose_nullspace = Some(Arc::new(nullspace));
        Ok(self)
    }

    /// Record that the coefficients behind the form changed.
    ///
    /// PCs compare this state at set-up, so the next `set_up` rebuilds from the new values
    /// without the operators being set again.
    pub fn increase_state(&self) {
        self.state.fetch_add(1, Ordering::Relaxed);
    }

    pub fn state(&self) -> u64 {
        self.state.load(Ordering::Relaxed)
    }

    pub fn form(&self) -> &FormRef {
        &self.form
    }

    pub fn row_bcs(&self) -> &[DirichletBC] {
        &self.row_bcs
    }

    pub fn col_bcs(&self) -> &[DirichletBC] {
        &self.col_bcs
    }

    /// Whether this operator is a diagonal block (same space for rows and columns).
    pub fn on_diag(&self) -> bool {
        self.on_diag
    }

    pub fn form_parameters(&self) -> &FormParameters {
        &self.params
    }

    pub fn nullspace(&self) -> Option<&Arc<NullSpace>> {
        self.nullspace.as_ref()
    }

    pub fn transpose_nullspace(&self) -> Option<&Arc<NullSpace>> {
        self.transpose_nullspace.as_ref()
    }

    pub fn nrows(&self) -> usize {
        self.form.test_space().ndofs()
    }

    pub fn ncols(&self) -> usize {
        self.form.trial_space().ndofs()
    }

    // y = A x with the cell loop; `transpose` swaps the roles of test and trial dofs.
    fn action(&self, x: &[f64], y: &mut [f64], transpose: bool) {
        let (test, trial) = (self.form.test_space(), self.form.trial_space());
        let (in_nodes, out_nodes) = if transpose {
            (&self.row_nodes, &self.col_nodes)
        } else {
            (&self.col_nodes, &self.row_nodes)
        };
        let mut xin = x.to_vec();
        in_nodes.iter().for_each(|&n| xin[n] = 0.0);
        y.iter_mut().for_each(|v| *v = 0.0);
        for cell in 0..test.num_cells() {
            let (rows, cols) = (test.cell_dofs(cell), trial.cell_dofs(cell));
            let local = self.form.cell_matrix(cell, &self.params);
            assert!(
                local.nrows() == rows.len() && local.ncols() == cols.len(),
                "cell {cell}: kernel changed size after construction"
            );
            for (li, &i) in rows.iter().enumerate() {
                for (lj, &j) in cols.iter().enumerate() {
                    if transpose {
                        y[j] += local[(li, lj)] * xin[i];
                    } else {
                        y[i] += local[(li, lj)] * xin[j];
                    }
                }
            }
        }
        for &n in out_nodes {
            y[n] = if self.on_diag { x[n] } else { 0.0 };
        }
    }
}

fn check_kernel_sizes(form: &FormRef) -> Result<(), KError> {
    let (test, trial) = (form.test_space(), form.trial_space());
    if test.num_cells() != trial.num_cells() {
        return Err(KError::Assembly("test and trial spaces have different cell counts".into()));
    }
    let params = FormParameters::default();
    for cell in 0..test.num_cells() {
        let (rows, cols) = (test.cell_dofs(cell).len(), trial.cell_dofs(cell).len());
        let local = form.cell_matrix(cell, &params);
        if local.nrows() != rows || local.ncols() != cols {
            return Err(KError::Assembly(format!(
                "cell {cell}: kernel returned a {}x{} matrix for {rows}x{cols} dofs",
                local.nrows(),
                local.ncols()
            )));
        }
    }
    Ok(())
}

impl MatVec<Vec<f64>> for MatFreeOperator {
    fn matvec(&self, x: &Vec<f64>, y: &mut Vec<f64>) {
        assert_eq!(x.len(), self.ncols(), "Input vector x has incorrect length");
        assert_eq!(y.len(), self.nrows(), "Output vector y has incorrect length");
        self.action(x, y, false);
    }
}

impl MatTransVec<Vec<f64>> for MatFreeOperator {
    fn mattransvec(&self, x: &Vec<f64>, y: &mut Vec<f64>) {
        assert_eq!(x.len(), self.nrows(), "Input vector x has incorrect length");
        assert_eq!(y.len(), self.ncols(), "Output vector y has incorrect length");
        self.action(x, y, true);
    }
}

impl Indexing for MatFreeOperator {
    fn nrows(&self) -> usize {
        MatFreeOperator::nrows(self)
    }
}

/// Forms coupling several fields, addressed by (row field, column field).
pub struct BlockOperator {
    spaces: Vec<Arc<FunctionSpace>>,
    blocks: BTreeMap<(usize, usize), FormRef>,
    bcs: Vec<DirichletBC>,
    params: FormParameters,
}

impl BlockOperator {
    pub fn new(spaces: Vec<Arc<FunctionSpace>>) -> Self {
        Self { spaces, blocks: BTreeMap::new(), bcs: Vec::new(), params: FormParameters::default() }
    }

    pub fn with_block(mut self, row: usize, col: usize, form: FormRef) -> Result<Self, KError> {
        let (test, trial) = (self.space(row)?, self.space(col)?);
        if !Arc::ptr_eq(form.test_space(), test) || !Arc::ptr_eq(form.trial_space(), trial) {
            return Err(KError::InvalidForm(format!("block ({row}, {col}) is defined on the wrong spaces")));
        }
        self.blocks.insert((row, col), form);
        Ok(self)
    }

    pub fn with_bcs(mut self, bcs: Vec<DirichletBC>) -> Self {
        self.bcs = bcs;
        self
    }

    pub fn with_form_parameters(mut self, params: FormParameters) -> Self {
        self.params = params;
        self
    }

    pub fn num_fields(&self) -> usize {
        self.spaces.len()
    }

    fn space(&self, field: usize) -> Result<&Arc<FunctionSpace>, KError> {
        self.spaces
            .get(field)
            .ok_or(KError::DimensionMismatch { expected: self.spaces.len(), found: field + 1 })
    }

    /// Matrix-free operator of block (row, col), carrying the conditions of both fields.
    pub fn sub_block(&self, row: usize, col: usize) -> Result<MatFreeOperator, KError> {
        let form = self
            .blocks
            .get(&(row, col))
            .ok_or_else(|| KError::InvalidForm(format!("block ({row}, {col}) is empty")))?;
        let (test, trial) = (self.space(row)?, self.space(col)?);
        let bcs = self
            .bcs
            .iter()
            .filter(|bc| Arc::ptr_eq(bc.space(), test) || Arc::ptr_eq(bc.space(), trial))
            .cloned()
            .collect();
        Ok(MatFreeOperator::with_block_position(Arc::clone(form), bcs, row == col)?
            .with_form_parameters(self.params.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fem::assemble::assemble_matrix;
    use crate::fem::form::KernelForm;
    use crate::fem::space::Argument;
    use crate::matrix::MatType;
    use approx::assert_relative_eq;
    use faer::Mat;

    fn mass(v: &Arc<FunctionSpace>, q: &Arc<FunctionSpace>) -> FormRef {
        let h = 1.0 / v.num_cells() as f64;
        KernelForm::new(&Argument::test(v), &Argument::trial(q), move |_, _| {
            Mat::from_fn(2, 2, |i, j| if i == j { h / 3.0 } else { h / 6.0 })
        })
        .unwrap()
        .into_ref()
    }

    #[test]
    fn action_matches_assembled_matrix() {
        let v = Arc::new(FunctionSpace::interval(5).unwrap());
        let a = mass(&v, &v);
        let bcs = vec![DirichletBC::new(&v, 2.0, 1).unwrap()];
        let op = MatFreeOperator::new(Arc::clone(&a), bcs.clone()).unwrap();
        assert!(op.on_diag());
        let m = assemble_matrix(&a, &bcs, &FormParameters::default(), MatType::Aij).unwrap();
        let x: Vec<f64> = (0..6).map(|i| (i as f64).sin() + 1.0).collect();
        let (mut y_free, mut y_mat) = (vec![0.0; 6], vec![0.0; 6]);
        op.matvec(&x, &mut y_free);
        m.read().matvec(&x, &mut y_mat);
        for (a, b) in y_free.iter().zip(&y_mat) {
            assert_relative_eq!(a, b, epsilon = 1e-14);
        }
        op.mattransvec(&x, &mut y_free);
        m.read().mattransvec(&x, &mut y_mat);
        for (a, b) in y_free.iter().zip(&y_mat) {
            assert_relative_eq!(a, b, epsilon = 1e-14);
        }
    }

    #[test]
    fn sub_blocks_know_their_position() {
        let v = Arc::new(FunctionSpace::interval(3).unwrap());
        let q = Arc::new(FunctionSpace::interval(3).unwrap());
        let block = BlockOperator::new(vec![Arc::clone(&v), Arc::clone(&q)])
            .with_block(0, 0, mass(&v, &v))
            .unwrap()
            .with_block(0, 1, mass(&v, &q))
            .unwrap()
            .with_bcs(vec![DirichletBC::new(&v, 0.0, 1).unwrap(), DirichletBC::new(&q, 0.0, 2).unwrap()]);
        assert_eq!(block.num_fields(), 2);
        let a00 = block.sub_block(0, 0).unwrap();
        assert!(a00.on_diag());
        assert_eq!(a00.row_bcs().len(), 1);
        let a01 = block.sub_block(0, 1).unwrap();
        assert!(!a01.on_diag());
        assert_eq!(a01.col_bcs()[0].marker(), 2);
        assert!(block.sub_block(1, 1).is_err());
        assert!(BlockOperator::new(vec![Arc::clone(&v)]).with_block(0, 0, mass(&q, &q)).is_err());
    }

    #[test]
    fn kernel_sizes_are_checked_on_construction() {
        let v = Arc::new(FunctionSpace::interval(4).unwrap());
        let bad = KernelForm::new(&Argument::test(&v), &Argument::trial(&v), |_, _| Mat::zeros(3, 2))
            .unwrap()
            .into_ref();
        let err = MatFreeOperator::new(bad, vec![]).err().unwrap();
        assert!(matches!(err, KError::Assembly(_)));
    }

    #[test]
    fn null_spaces_must_fit_the_operator() {
        let v = Arc::new(FunctionSpace::interval(4).unwrap());
        let op = MatFreeOperator::new(mass(&v, &v), vec![]).unwrap();
        let err = op.with_nullspace(NullSpace::constant(4)).err().unwrap();
        assert!(matches!(err, KError::DimensionMismatch { expected: 5, found: 4 }));
        let op = MatFreeOperator::new(mass(&v, &v), vec![])
            .unwrap()
            .with_nullspace(NullSpace::constant(5))
            .unwrap();
        assert!(op.with_transpose_nullspace(NullSpace::constant(6)).is_err());
    }

    #[test]
    fn state_increases_on_request() {
        let v = Arc::new(FunctionSpace::interval(2).unwrap());
        let op = MatFreeOperator::new(mass(&v, &v), vec![]).unwrap();
        assert_eq!(op.state(), 0);
        op.increase_state();
        op.increase_state();
        assert_eq!(op.state(), 2);
    }
}
