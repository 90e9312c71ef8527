//! Preconditioned Richardson iteration: x ← x + s·M⁻¹(b − Ax).

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::KError;
use crate::preconditioner::Preconditioner;
use crate::solver::{residual, LinearSolver};
use crate::utils::convergence::{Convergence, SolveStats};
use num_traits::Float;

pub struct RichardsonSolver<T> {
    pub conv: Convergence<T>,
    /// Damping factor applied to every correction.
    pub scale: T,
}

impl<T: Float> RichardsonSolver<T> {
    pub fn new(rtol: T, max_iters: usize) -> Self {
        Self { conv: Convergence::new(rtol, T::zero(), max_iters), scale: T::one() }
    }

    pub fn with_atol(mut self, atol: T) -> Self {
        self.conv.atol = atol;
        self
    }

    pub fn with_scale(mut self, scale: T) -> Self {
        self.scale = scale;
        self
    }
}

impl<M, V, T> LinearSolver<M, V> for RichardsonSolver<T>
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
        let ip = ();
        let mut r = residual(a, b, &*x);
        let res0 = ip.norm(&r);
        let converged = self.conv.is_converged(res0, res0);
        let mut stats = SolveStats { iterations: 0, final_residual: res0, converged };
        let mut z = r.clone();
        let mut i = 0;
        while !stats.converged && i < self.conv.max_iters {
            match pc {
                Some(pc) => pc.apply(&r, &mut z)?,
                None => z.clone_from(&r),
            }
            for (xi, zi) in x.as_mut().iter_mut().zip(z.as_ref()) {
                *xi = *xi + self.scale * *zi;
            }
            i += 1;
            r = residual(a, b, &*x);
            let (_, s) = self.conv.check(ip.norm(&r), res0, i);
            stats = s;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Mat;

    struct DiagonalPc(Vec<f64>);

    impl Preconditioner<Mat<f64>, Vec<f64>> for DiagonalPc {
        fn apply(&self, r: &Vec<f64>, z: &mut Vec<f64>) -> Result<(), KError> {
            for ((zi, ri), di) in z.iter_mut().zip(r).zip(&self.0) {
                *zi = ri / di;
            }
            Ok(())
        }
    }

    #[test]
    fn jacobi_richardson_on_diagonally_dominant_system() {
        let a = Mat::from_fn(3, 3, |i, j| if i == j { 4.0 } else { 1.0 });
        let b = vec![6.0, 6.0, 6.0];
        let mut x = vec![0.0; 3];
        let pc = DiagonalPc(vec![4.0; 3]);
        let stats = RichardsonSolver::new(1e-10, 200).solve(&a, Some(&pc), &b, &mut x).unwrap();
        assert!(stats.converged);
        for xi in &x {
            assert!((xi - 1.0).abs() < 1e-8);
        }
    }

    #[test]
    fn reports_non_convergence() {
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 2.0 });
        let mut x = vec![0.0; 2];
        let stats = RichardsonSolver::new(1e-10, 5).solve(&a, None, &vec![1.0, 0.0], &mut x).unwrap();
        assert!(!stats.converged);
        assert_eq!(stats.iterations, 5);
    }
}
