//! Successive over-relaxation on an assembled CSR matrix.

use std::fmt;

use bitflags::bitflags;

use crate::error::KError;
use crate::matrix::{AssembledMatrix, CsrMatrix};
use crate::preconditioner::Preconditioner;

bitflags! {
    /// Sweep directions of an SOR application.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct MatSorType: u32 {
        const APPLY_LOWER     = 0b0000_0010; // forward Gauss–Seidel
        const APPLY_UPPER     = 0b0000_0100; // backward
        const SYMMETRIC_SWEEP = Self::APPLY_LOWER.bits() | Self::APPLY_UPPER.bits();
    }
}

/// SOR preconditioner: `its` sweeps of relaxation on A z = r from a zero initial guess.
#[derive(Debug, Clone)]
pub struct Sor {
    pub its: usize,
    pub sym: MatSorType,
    pub omega: f64,
    a: Option<CsrMatrix<f64>>,
    inv_diag: Vec<f64>,
}

impl Sor {
    pub fn new(omega: f64, its: usize, sym: MatSorType) -> Self {
        Self { its, sym, omega, a: None, inv_diag: Vec::new() }
    }

    fn relax(&self, a: &CsrMatrix<f64>, r: &[f64], z: &mut [f64], i: usize) {
        let (cols, vals) = a.row(i);
        let sigma: f64 = cols.iter().zip(vals).filter(|&(&j, _)| j != i).map(|(&j, &v)| v * z[j]).sum();
        z[i] = (1.0 - self.omega) * z[i] + self.omega * (r[i] - sigma) * self.inv_diag[i];
    }

    pub fn apply_to(&self, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
        let a = self.a.as_ref().ok_or(KError::NotSetUp)?;
        let n = a.nrows();
        if r.len() != n || z.len() != n {
            return Err(KError::DimensionMismatch { expected: n, found: r.len() });
        }
        z.iter_mut().for_each(|v| *v = 0.0);
        for _ in 0..self.its {
            if self.sym.contains(MatSorType::APPLY_LOWER) {
                for i in 0..n {
                    self.relax(a, r, z, i);
                }
            }
            if self.sym.contains(MatSorType::APPLY_UPPER) {
                for i in (0..n).rev() {
                    self.relax(a, r, z, i);
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Sor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sweep = if self.sym == MatSorType::SYMMETRIC_SWEEP {
            "SYMMETRIC"
        } else if self.sym == MatSorType::APPLY_LOWER {
            "FORWARD"
        } else {
            "BACKWARD"
        };
        write!(f, "type = {sweep}, iterations = {}, omega = {}", self.its, self.omega)
    }
}

impl Preconditioner<AssembledMatrix, Vec<f64>> for Sor {
    fn setup(&mut self, a: &AssembledMatrix) -> Result<(), KError> {
        let csr = a.to_csr()?;
        self.inv_diag = csr
            .diagonal()
            .iter()
            .enumerate()
            .map(|(i, &d)| if d == 0.0 { Err(KError::ZeroPivot(i)) } else { Ok(1.0 / d) })
            .collect::<Result<_, _>>()?;
        self.a = Some(csr);
        Ok(())
    }

    fn apply(&self, r: &Vec<f64>, z: &mut Vec<f64>) -> Result<(), KError> {
        self.apply_to(r, z)
    }
}
