// Jacobi preconditioner implementation

use crate::core::traits::{Indexing, MatVec};
use crate::error::KError;
use crate::preconditioner::Preconditioner;
use num_traits::Float;

/// Jacobi preconditioner: M⁻¹ = D⁻¹
///
/// Zero diagonal entries are skipped (their rows are left at zero).
#[derive(Debug, Clone)]
pub struct Jacobi<T> {
    pub(crate) inv_diag: Vec<T>,
}

impl<T: Float> Jacobi<T> {
    /// new with empty state; user must call `setup`.
    pub fn new() -> Self {
        Self { inv_diag: Vec::new() }
    }

    /// Build directly from a known diagonal.
    pub fn from_diagonal(diag: Vec<T>) -> Self {
        let inv_diag = diag
            .into_iter()
            .map(|d| if d != T::zero() { T::one() / d } else { T::zero() })
            .collect();
        Self { inv_diag }
    }

    pub fn len(&self) -> usize {
        self.inv_diag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inv_diag.is_empty()
    }

    pub fn apply_to(&self, x: &[T], y: &mut [T]) -> Result<(), KError> {
        if x.len() != self.inv_diag.len() || y.len() != x.len() {
            return Err(KError::DimensionMismatch { expected: self.inv_diag.len(), found: x.len() });
        }
        for ((yi, xi), di) in y.iter_mut().zip(x).zip(&self.inv_diag) {
            *yi = *di * *xi;
        }
        Ok(())
    }
}

impl<T: Float> Default for Jacobi<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, V, T> Preconditioner<M, V> for Jacobi<T>
where
    M: MatVec<V> + Indexing,
    V: AsRef<[T]> + AsMut<[T]> + From<Vec<T>>,
    T: Float + Send + Sync,
{
    /// Extract the diagonal by probing with unit vectors, which works for operators
    /// that only expose their action.
    fn setup(&mut self, a: &M) -> Result<(), KError> {
        let n = a.nrows();
        let mut diag = vec![T::zero(); n];
        let mut e = vec![T::zero(); n];
        for i in 0..n {
            e[i] = T::one();
            let e_v = V::from(e.clone());
            let mut col_v = V::from(vec![T::zero(); n]);
            a.matvec(&e_v, &mut col_v);
            diag[i] = col_v.as_ref()[i];
            e[i] = T::zero();
        }
        *self = Self::from_diagonal(diag);
        Ok(())
    }

    fn apply(&self, x: &V, y: &mut V) -> Result<(), KError> {
        self.apply_to(x.as_ref(), y.as_mut())
    }

    fn apply_transpose(&self, x: &V, y: &mut V) -> Result<(), KError> {
        self.apply_to(x.as_ref(), y.as_mut())
    }
}
