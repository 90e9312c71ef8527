//! ILU(0) factorization with zero fill (Saad §10.3).
//!
//! The factors are kept in one dense matrix: the strict lower part holds L (unit diagonal
//! implied) and the upper part U. Only positions that are nonzero in A, plus the diagonal,
//! are ever updated.

use crate::error::KError;
use crate::preconditioner::Preconditioner;
use faer::Mat;

#[derive(Debug, Clone)]
pub struct Ilu0 {
    pub(crate) lu: Mat<f64>,
}

impl Ilu0 {
    pub fn new() -> Self {
        Self { lu: Mat::zeros(0, 0) }
    }

    pub fn factor(&mut self, a: &Mat<f64>) -> Result<(), KError> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(KError::DimensionMismatch { expected: n, found: a.ncols() });
        }
        let nz = |i: usize, j: usize| i == j || a[(i, j)] != 0.0;
        let mut lu = a.clone();
        // IKJ variant
        for i in 0..n {
            for k in 0..i {
                if !nz(i, k) {
                    continue;
                }
                let pivot = lu[(k, k)];
                if pivot == 0.0 {
                    return Err(KError::ZeroPivot(k));
                }
                let lik = lu[(i, k)] / pivot;
                lu[(i, k)] = lik;
                for j in (k + 1)..n {
                    if nz(i, j) {
                        lu[(i, j)] -= lik * lu[(k, j)];
                    }
                }
            }
            if lu[(i, i)] == 0.0 {
                return Err(KError::ZeroPivot(i));
            }
        }
        self.lu = lu;
        Ok(())
    }

    /// z = U⁻¹ L⁻¹ r
    pub fn apply_to(&self, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
        let n = self.check(r, z)?;
        z.copy_from_slice(r);
        for i in 0..n {
            for j in 0..i {
                z[i] -= self.lu[(i, j)] * z[j];
            }
        }
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                z[i] -= self.lu[(i, j)] * z[j];
            }
            z[i] /= self.lu[(i, i)];
        }
        Ok(())
    }

    /// z = L⁻ᵀ U⁻ᵀ r
    pub fn apply_transpose_to(&self, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
        let n = self.check(r, z)?;
        z.copy_from_slice(r);
        for i in 0..n {
            for j in 0..i {
                z[i] -= self.lu[(j, i)] * z[j];
            }
            z[i] /= self.lu[(i, i)];
        }
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                z[i] -= self.lu[(j, i)] * z[j];
            }
        }
        Ok(())
    }

    fn check(&self, r: &[f64], z: &[f64]) -> Result<usize, KError> {
        let n = self.lu.nrows();
        if n == 0 && !r.is_empty() {
            return Err(KError::NotSetUp);
        }
        if r.len() != n || z.len() != n {
            return Err(KError::DimensionMismatch { expected: n, found: r.len() });
        }
        Ok(n)
    }
}

impl Default for Ilu0 {
    fn default() -> Self {
        Self::new()
    }
}

impl Preconditioner<Mat<f64>, Vec<f64>> for Ilu0 {
    fn setup(&mut self, a: &Mat<f64>) -> Result<(), KError> {
        self.factor(a)
    }

    fn apply(&self, r: &Vec<f64>, z: &mut Vec<f64>) -> Result<(), KError> {
        self.apply_to(r, z)
    }

    fn apply_transpose(&self, r: &Vec<f64>, z: &mut Vec<f64>) -> Result<(), KError> {
        self.apply_transpose_to(r, z)
    }
}
