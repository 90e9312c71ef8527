//! Preconditioned Conjugate Gradient (PCG) per Saad §9.2

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::KError;
use crate::preconditioner::Preconditioner;
use crate::solver::{residual, LinearSolver};
use crate::utils::convergence::{Convergence, SolveStats};

/// Norm used for the stopping test.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CgNormType {
    Preconditioned,
    Unpreconditioned,
    Natural,
}

pub struct PcgSolver<T> {
    pub conv: Convergence<T>,
    pub norm_type: CgNormType,
    pub residual_history: Vec<T>,
}

impl<T: Copy + num_traits::Float> PcgSolver<T> {
    pub fn new(rtol: T, max_iters: usize) -> Self {
        Self {
            conv: Convergence::new(rtol, T::zero(), max_iters),
            norm_type: CgNormType::Preconditioned,
            residual_history: Vec::new(),
        }
    }

    pub fn with_atol(mut self, atol: T) -> Self {
        self.conv.atol = atol;
        self
    }

    pub fn with_norm(mut self, norm_type: CgNormType) -> Self {
        self.norm_type = norm_type;
        self
    }

    fn norm<V>(&self, r: &V, z: &V) -> T
    where
        (): InnerProduct<V, Scalar = T>,
    {
        let ip = ();
        match self.norm_type {
            CgNormType::Preconditioned => ip.norm(z),
            CgNormType::Unpreconditioned => ip.norm(r),
            CgNormType::Natural => ip.dot(r, z).abs().sqrt(),
        }
    }
}

impl<M, V, T> LinearSolver<M, V> for PcgSolver<T>
where
    M: MatVec<V>,
    (): InnerProduct<V, Scalar = T>,
    V: AsMut<[T]> + AsRef<[T]> + From<Vec<T>> + Clone,
    T: num_traits::Float + From<f64>,
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
        self.residual_history.clear();
        let mut r = residual(a, b, &*x);
        let mut z = V::from(vec![T::zero(); n]);
        match pc {
            Some(pc) => pc.apply(&r, &mut z)?,
            None => z.clone_from(&r),
        }
        let res0 = self.norm(&r, &z);
        self.residual_history.push(res0);
        let converged = self.conv.is_converged(res0, res0);
        let mut stats = SolveStats { iterations: 0, final_residual: res0, converged };
        if stats.converged {
            return Ok(stats);
        }
        let mut p = z.clone();
        let mut rz = ip.dot(&r, &z);
        let mut ap = V::from(vec![T::zero(); n]);
        for i in 0..self.conv.max_iters {
            a.matvec(&p, &mut ap);
            let p_dot_ap = ip.dot(&p, &ap);
            if p_dot_ap <= T::zero() {
                return Err(KError::IndefiniteMatrix);
            }
            let alpha = rz / p_dot_ap;
            for (xj, pj) in x.as_mut().iter_mut().zip(p.as_ref()) {
                *xj = *xj + alpha * *pj;
            }
            for (rj, apj) in r.as_mut().iter_mut().zip(ap.as_ref()) {
                *rj = *rj - alpha * *apj;
            }
            match pc {
                Some(pc) => pc.apply(&r, &mut z)?,
                None => z.clone_from(&r),
            }
            let res_norm = self.norm(&r, &z);
            self.residual_history.push(res_norm);
            let (stop, s) = self.conv.check(res_norm, res0, i + 1);
            stats = s;
            if stop {
                break;
            }
            let rz_new = ip.dot(&r, &z);
            let beta = rz_new / rz;
            if beta < T::zero() {
                return Err(KError::IndefinitePreconditioner);
            }
            for (pj, zj) in p.as_mut().iter_mut().zip(z.as_ref()) {
                *pj = *zj + beta * *pj;
            }
            rz = rz_new;
        }
        Ok(stats)
    }
}
