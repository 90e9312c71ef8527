//! Core linear-algebra traits.

/// Matrix–vector product: y ← A x.
pub trait MatVec<V> {
    /// Compute y = A · x.
    fn matvec(&self, x: &V, y: &mut V);
}

/// Transposed matrix–vector product: y ← Aᵀ x.
pub trait MatTransVec<V> {
    /// Compute y = Aᵀ · x.
    fn mattransvec(&self, x: &V, y: &mut V);
}

/// Inner products & norms.
pub trait InnerProduct<V> {
    /// Associated scalar type.
    type Scalar: Copy + PartialOrd + From<f64>;
    /// Compute dot(x, y).
    fn dot(&self, x: &V, y: &V) -> Self::Scalar;
    /// Compute ‖x‖₂.
    fn norm(&self, x: &V) -> Self::Scalar;
}

/// Uniform indexing into vectors and operators.
pub trait Indexing {
    /// Number of rows (or length for a vector).
    fn nrows(&self) -> usize;
}

/// Operator viewed through its transpose, so transposed solves reuse the forward solvers.
pub struct Transposed<'a, M>(pub &'a M);

impl<M, V> MatVec<V> for Transposed<'_, M>
where
    M: MatTransVec<V>,
{
    fn matvec(&self, x: &V, y: &mut V) {
        self.0.mattransvec(x, y);
    }
}

impl<M, V> MatTransVec<V> for Transposed<'_, M>
where
    M: MatVec<V>,
{
    fn mattransvec(&self, x: &V, y: &mut V) {
        self.0.matvec(x, y);
    }
}

impl<M: Indexing> Indexing for Transposed<'_, M> {
    fn nrows(&self) -> usize {
        self.0.nrows()
    }
}
