//! Null-space annotations attached to operators and assembled matrices.

use crate::error::KError;

/// Orthonormal basis of an operator's null space.
///
/// When `has_constant` is set, the normalized constant vector is the first basis vector.
#[derive(Debug, Clone, PartialEq)]
pub struct NullSpace {
    has_constant: bool,
    basis: Vec<Vec<f64>>,
    n: usize,
}

impl NullSpace {
    /// Orthonormalize `vectors` (modified Gram-Schmidt) into a null-space basis of length `n`.
    pub fn new(has_constant: bool, vectors: Vec<Vec<f64>>, n: usize) -> Result<Self, KError> {
        let mut basis: Vec<Vec<f64>> = Vec::with_capacity(vectors.len() + has_constant as usize);
        let constant = has_constant.then(|| vec![1.0; n]);
        for mut v in constant.into_iter().chain(vectors) {
            if v.len() != n {
                return Err(KError::DimensionMismatch { expected: n, found: v.len() });
            }
            for q in &basis {
                let d = dot(&v, q);
                v.iter_mut().zip(q).for_each(|(vi, qi)| *vi -= d * qi);
            }
            let norm = dot(&v, &v).sqrt();
            if norm <= 1e-12 {
                return Err(KError::SolveError("null space vectors are linearly dependent".into()));
            }
            v.iter_mut().for_each(|vi| *vi /= norm);
            basis.push(v);
        }
        Ok(Self { has_constant, basis, n })
    }

    /// The constant null space of length `n`.
    pub fn constant(n: usize) -> Self {
        let c = 1.0 / (n as f64).sqrt();
        Self { has_constant: true, basis: vec![vec![c; n]], n }
    }

    pub fn has_constant(&self) -> bool {
        self.has_constant
    }

    pub fn dim(&self) -> usize {
        self.basis.len()
    }

    pub fn basis(&self) -> &[Vec<f64>] {
        &self.basis
    }

    /// Length of the vectors this null space acts on.
    pub fn size(&self) -> usize {
        self.n
    }

    pub(crate) fn check_size(&self, n: usize) -> Result<(), KError> {
        if self.n != n {
            return Err(KError::DimensionMismatch { expected: n, found: self.n });
        }
        Ok(())
    }

    /// Project the null-space components out of `v`.
    pub fn remove(&self, v: &mut [f64]) {
        debug_assert_eq!(v.len(), self.n, "null space applied to a vector of the wrong length");
        for q in &self.basis {
            let d = dot(v, q);
            v.iter_mut().zip(q).for_each(|(vi, qi)| *vi -= d * qi);
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
