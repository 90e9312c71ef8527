//! Generalized Minimal Residual (GMRES) solver with fixed restart (Saad §6.4)
//!
//! Restarted GMRES for nonsymmetric systems. Left preconditioning runs Arnoldi on
//! M⁻¹A and monitors the preconditioned residual; right preconditioning runs it on AM⁻¹
//! and monitors the true residual. Orthogonalization is modified Gram-Schmidt applied
//! twice, and a happy breakdown ends the cycle early.
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems, 2nd Edition. SIAM. §6.4

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::KError;
use crate::preconditioner::Preconditioner;
use crate::solver::{residual, LinearSolver};
use crate::utils::convergence::{Convergence, SolveStats};
use num_traits::Float;

/// Preconditioning mode for GMRES (none, left, or right)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Preconditioning {
    None,
    Left,
    Right,
}

/// GMRES solver struct with restart and preconditioning options.
pub struct GmresSolver<T> {
    /// Number of Arnoldi vectors before restart
    pub restart: usize,
    /// Convergence criteria
    pub conv: Convergence<T>,
    /// Preconditioning mode
    pub preconditioning: Preconditioning,
}

impl<T: Copy + Float + From<f64>> GmresSolver<T> {
    pub fn new(restart: usize, rtol: T, max_iters: usize) -> Self {
        Self {
            restart: restart.max(1),
            conv: Convergence::new(rtol, T::zero(), max_iters),
            preconditioning: Preconditioning::Left,
        }
    }

    pub fn with_atol(mut self, atol: T) -> Self {
        self.conv.atol = atol;
        self
    }

    /// Set the preconditioning mode (left, right, or none).
    pub fn with_preconditioning(mut self, mode: Preconditioning) -> Self {
        self.preconditioning = mode;
        self
    }

    /// Apply the previous rotations to column `j` of `h`, build a new one and update `g`.
    fn apply_givens_and_update_g(h: &mut [Vec<T>], g: &mut [T], cs: &mut [T], sn: &mut [T], j: usize, epsilon: T) {
        for i in 0..j {
            let temp = cs[i] * h[i][j] + sn[i] * h[i + 1][j];
            h[i + 1][j] = -sn[i] * h[i][j] + cs[i] * h[i + 1][j];
            h[i][j] = temp;
        }
        let h_kk = h[j][j];
        let h_k1k = h[j + 1][j];
        let r = (h_kk * h_kk + h_k1k * h_k1k).sqrt();
        if r.abs() < epsilon {
            cs[j] = T::one();
            sn[j] = T::zero();
        } else {
            cs[j] = h_kk / r;
            sn[j] = h_k1k / r;
        }
        h[j][j] = cs[j] * h_kk + sn[j] * h_k1k;
        h[j + 1][j] = T::zero();
        let temp = cs[j] * g[j] + sn[j] * g[j + 1];
        g[j + 1] = -sn[j] * g[j] + cs[j] * g[j + 1];
        g[j] = temp;
    }

    /// Solve the upper-triangular system H y = g, skipping zero pivots.
    fn back_substitution(h: &[Vec<T>], g: &[T], m: usize, epsilon: T) -> Vec<T> {
        let mut y = vec![T::zero(); m];
        for i in (0..m).rev() {
            let mut yi = g[i];
            for j in (i + 1)..m {
                yi = yi - h[i][j] * y[j];
            }
            y[i] = if h[i][i].abs() > epsilon { yi / h[i][i] } else { T::zero() };
        }
        y
    }
}

fn scaled<V, T>(v: &V, s: T) -> V
where
    V: AsRef<[T]> + From<Vec<T>>,
    T: Float,
{
    V::from(v.as_ref().iter().map(|&vi| vi * s).collect())
}

impl<M, V, T> LinearSolver<M, V> for GmresSolver<T>
where
    M: MatVec<V>,
    (): InnerProduct<V, Scalar = T>,
    V: AsMut<[T]> + AsRef<[T]> + From<Vec<T>> + Clone,
    T: Float + From<f64>,
{
    type Error = KError;
    type Scalar = T;

    fn solve(
        &mut self,
        a: &M,
        pc: Option<&dyn Preconditioner<M, V>>,
        b: &V,
        x: &mut V,
    ) -> Result<SolveStats<T>, KError> {
        let n = b.as_ref().len();
        let ip = ();
        let epsilon = <T as From<f64>>::from(1e-14);
        let left = pc.filter(|_| self.preconditioning == Preconditioning::Left);
        let right = pc.filter(|_| self.preconditioning == Preconditioning::Right);
        let restart = self.restart.max(1);

        // Residual as seen by the Arnoldi process: M⁻¹(b - Ax) under left preconditioning.
        let monitored = |x: &V| -> Result<V, KError> {
            let r = residual(a, b, x);
            match left {
                Some(pc) => {
                    let mut z = V::from(vec![T::zero(); n]);
                    pc.apply(&r, &mut z)?;
                    Ok(z)
                }
                None => Ok(r),
            }
        };

        let mut r = monitored(&*x)?;
        let mut beta = ip.norm(&r);
        let res0 = beta;
        let converged = self.conv.is_converged(beta, res0);
        let mut stats = SolveStats { iterations: 0, final_residual: beta, converged };
        let mut iteration = 0;
        while !stats.converged && iteration < self.conv.max_iters {
            let mut v_basis: Vec<V> = Vec::with_capacity(restart + 1);
            let mut z_basis: Vec<V> = Vec::with_capacity(restart);
            v_basis.push(scaled(&r, T::one() / beta));
            let mut h = vec![vec![T::zero(); restart]; restart + 1];
            let mut g = vec![T::zero(); restart + 1];
            g[0] = beta;
            let mut cs = vec![T::zero(); restart];
            let mut sn = vec![T::zero(); restart];
            let mut m = 0;
            for j in 0..restart {
                iteration += 1;
                let mut w = V::from(vec![T::zero(); n]);
                if let Some(pc) = right {
                    let mut z = V::from(vec![T::zero(); n]);
                    pc.apply(&v_basis[j], &mut z)?;
                    a.matvec(&z, &mut w);
                    z_basis.push(z);
                } else {
                    a.matvec(&v_basis[j], &mut w);
                    if let Some(pc) = left {
                        let mut z = V::from(vec![T::zero(); n]);
                        pc.apply(&w, &mut z)?;
                        w = z;
                    }
                }
                for _ in 0..2 {
                    for i in 0..=j {
                        let hij = ip.dot(&w, &v_basis[i]);
                        h[i][j] = h[i][j] + hij;
                        for (wk, vik) in w.as_mut().iter_mut().zip(v_basis[i].as_ref()) {
                            *wk = *wk - hij * *vik;
                        }
                    }
                }
                h[j + 1][j] = ip.norm(&w);
                let happy_breakdown = h[j + 1][j].abs() < epsilon;
                if !happy_breakdown {
                    v_basis.push(scaled(&w, T::one() / h[j + 1][j]));
                }
                Self::apply_givens_and_update_g(&mut h, &mut g, &mut cs, &mut sn, j, epsilon);
                m = j + 1;
                let (stop, s) = self.conv.check(g[j + 1].abs(), res0, iteration);
                stats = s;
                if stop || happy_breakdown {
                    break;
                }
            }
            let y = Self::back_substitution(&h, &g, m, epsilon);
            let basis = if right.is_some() { &z_basis } else { &v_basis };
            for (yj, dir) in y.iter().zip(basis) {
                for (xi, di) in x.as_mut().iter_mut().zip(dir.as_ref()) {
                    *xi = *xi + *yj * *di;
                }
            }
            r = monitored(&*x)?;
            beta = ip.norm(&r);
            stats.final_residual = beta;
            stats.converged = self.conv.is_converged(beta, res0);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Mat;

    fn nonsym() -> Mat<f64> {
        let rows = [
            [4.0, 1.0, 0.0, 0.0],
            [2.0, 3.0, 1.0, 0.0],
            [0.0, 1.0, 2.0, 1.0],
            [0.0, 0.0, -1.0, 3.0],
        ];
        Mat::from_fn(4, 4, |i, j| rows[i][j])
    }

    struct DiagonalPc(Vec<f64>);

    impl Preconditioner<Mat<f64>, Vec<f64>> for DiagonalPc {
        fn apply(&self, r: &Vec<f64>, z: &mut Vec<f64>) -> Result<(), KError> {
            for ((zi, ri), di) in z.iter_mut().zip(r).zip(&self.0) {
                *zi = ri / di;
            }
            Ok(())
        }
    }

    fn rhs(a: &Mat<f64>, x_true: &[f64]) -> Vec<f64> {
        let mut b = vec![0.0; 4];
        a.matvec(&x_true.to_vec(), &mut b);
        b
    }

    #[test]
    fn gmres_solves_nonsymmetric_system_in_every_mode() {
        let a = nonsym();
        let x_true = [1.0, 2.0, 3.0, 4.0];
        let b = rhs(&a, &x_true);
        let pc = DiagonalPc(vec![4.0, 3.0, 2.0, 3.0]);
        for mode in [Preconditioning::None, Preconditioning::Left, Preconditioning::Right] {
            let mut x = vec![0.0; 4];
            let mut solver = GmresSolver::new(4, 1e-12, 100).with_preconditioning(mode);
            let stats = solver.solve(&a, Some(&pc), &b, &mut x).unwrap();
            assert!(stats.converged, "{mode:?} did not converge");
            for (xi, ei) in x.iter().zip(x_true) {
                assert!((xi - ei).abs() < 1e-8, "{mode:?}: xi = {}, expected = {}", xi, ei);
            }
        }
    }

    #[test]
    fn restarts_still_converge() {
        let a = nonsym();
        let x_true = [-1.0, 0.5, 2.0, 1.0];
        let b = rhs(&a, &x_true);
        let mut x = vec![0.0; 4];
        let stats = GmresSolver::new(2, 1e-10, 200).solve(&a, None, &b, &mut x).unwrap();
        assert!(stats.converged);
        assert!(stats.iterations > 2);
    }

    #[test]
    fn zero_rhs_returns_immediately() {
        let a = nonsym();
        let mut x = vec![0.0; 4];
        let stats = GmresSolver::new(4, 1e-10, 10).solve(&a, None, &vec![0.0; 4], &mut x).unwrap();
        assert!(stats.converged);
        assert_eq!(stats.iterations, 0);
    }
}
