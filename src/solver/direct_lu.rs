//! Direct dense LU solver using Faer's partial-pivoting factorization.
//!
//! The factorization is cached, so repeated solves and transposed solves against the
//! same matrix reuse it. This is the backend of the `lu` preconditioner.

use crate::error::KError;
use crate::preconditioner::Preconditioner;
use crate::solver::LinearSolver;
use crate::utils::convergence::SolveStats;
use faer::linalg::solvers::{PartialPivLu, SolveCore};
use faer::{Conj, Mat, MatMut};

/// LU solver using row pivoting from Faer.
#[derive(Default)]
pub struct LuSolver {
    factor: Option<PartialPivLu<f64>>,
    n: usize,
}

impl LuSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factor `a`, replacing any cached factorization.
    pub fn factor(&mut self, a: &Mat<f64>) -> Result<(), KError> {
        if a.nrows() != a.ncols() {
            let msg = format!("matrix is {}x{}, not square", a.nrows(), a.ncols());
            return Err(KError::FactorError(msg));
        }
        if (0..a.ncols()).any(|j| (0..a.nrows()).any(|i| !a[(i, j)].is_finite())) {
            return Err(KError::FactorError("matrix has non-finite entries".into()));
        }
        self.factor = Some(PartialPivLu::new(a.as_ref()));
        self.n = a.nrows();
        Ok(())
    }

    /// Solve with the cached factorization.
    pub fn solve_cached(&self, b: &[f64], x: &mut [f64]) -> Result<(), KError> {
        self.solve_with(b, x, false)
    }

    /// Solve Aᵀ x = b with the cached factorization.
    pub fn solve_transpose_cached(&self, b: &[f64], x: &mut [f64]) -> Result<(), KError> {
        self.solve_with(b, x, true)
    }

    fn solve_with(&self, b: &[f64], x: &mut [f64], transpose: bool) -> Result<(), KError> {
        let factor = self.factor.as_ref().ok_or(KError::NotSetUp)?;
        if b.len() != self.n || x.len() != self.n {
            return Err(KError::DimensionMismatch { expected: self.n, found: b.len().max(x.len()) });
        }
        x.copy_from_slice(b);
        let x_mat = MatMut::from_column_major_slice_mut(x, self.n, 1);
        if transpose {
            factor.solve_transpose_in_place_with_conj(Conj::No, x_mat);
        } else {
            factor.solve_in_place_with_conj(Conj::No, x_mat);
        }
        if x.iter().any(|v| !v.is_finite()) {
            let msg = "LU solve produced non-finite values (singular matrix?)";
            return Err(KError::SolveError(msg.into()));
        }
        Ok(())
    }
}

impl LinearSolver<Mat<f64>, Vec<f64>> for LuSolver {
    type Error = KError;
    type Scalar = f64;

    /// Factor `a` and solve; the preconditioner is ignored.
    fn solve(
        &mut self,
        a: &Mat<f64>,
        _pc: Option<&dyn Preconditioner<Mat<f64>, Vec<f64>>>,
        b: &Vec<f64>,
        x: &mut Vec<f64>,
    ) -> Result<SolveStats<f64>, KError> {
        self.factor(a)?;
        self.solve_cached(b, x)?;
        Ok(SolveStats { iterations: 1, final_residual: 0.0, converged: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn system() -> Mat<f64> {
        // [[2,1,1],[1,3,2],[1,0,0]]
        let rows = [[2.0, 1.0, 1.0], [1.0, 3.0, 2.0], [1.0, 0.0, 0.0]];
        Mat::from_fn(3, 3, |i, j| rows[i][j])
    }

    #[test]
    fn lu_solver_solves_dense_system() {
        let b = vec![4.0, 5.0, 6.0];
        let mut x = vec![0.0; 3];
        let stats = LuSolver::new().solve(&system(), None, &b, &mut x).unwrap();
        assert!(stats.converged);
        for (xi, ei) in x.iter().zip([6.0, 15.0, -23.0]) {
            assert_abs_diff_eq!(*xi, ei, epsilon = 1e-10);
        }
    }

    #[test]
    fn transposed_solve_reuses_factor() {
        let a = system();
        let mut lu = LuSolver::new();
        lu.factor(&a).unwrap();
        let x_true = [1.0, -2.0, 0.5];
        let b: Vec<f64> = (0..3).map(|j| (0..3).map(|i| a[(i, j)] * x_true[i]).sum()).collect();
        let mut x = vec![0.0; 3];
        lu.solve_transpose_cached(&b, &mut x).unwrap();
        for (xi, ei) in x.iter().zip(x_true) {
            assert_abs_diff_eq!(*xi, ei, epsilon = 1e-10);
        }
    }

    #[test]
    fn large_tridiagonal_system() {
        let n = 200;
        let a = Mat::from_fn(n, n, |i, j| match i.abs_diff(j) {
            0 => 4.0,
            1 => -1.0,
            _ => 0.0,
        });
        let x_true: Vec<f64> = (0..n).map(|i| (i as f64 * 0.1).cos()).collect();
        let b: Vec<f64> = (0..n).map(|i| (0..n).map(|j| a[(i, j)] * x_true[j]).sum()).collect();
        let mut x = vec![0.0; n];
        LuSolver::new().solve(&a, None, &b, &mut x).unwrap();
        for (xi, ei) in x.iter().zip(&x_true) {
            assert_abs_diff_eq!(*xi, *ei, epsilon = 1e-12);
        }
    }

    #[test]
    fn errors_before_factor_and_on_bad_input() {
        let lu = LuSolver::new();
        assert!(matches!(lu.solve_cached(&[1.0], &mut [0.0]), Err(KError::NotSetUp)));
        let mut lu = LuSolver::new();
        assert!(lu.factor(&Mat::zeros(2, 3)).is_err());
        assert!(lu.factor(&Mat::from_fn(1, 1, |_, _| f64::NAN)).is_err());
    }
}
