//! Implementations of the core traits for `faer::Mat` and `Vec<T>`.
//!
//! Vector inner products run on Rayon when the `rayon` feature is enabled.

use crate::core::traits::{Indexing, InnerProduct, MatTransVec, MatVec};
use faer::Mat;
use num_traits::Float;

impl<T: Float> MatVec<Vec<T>> for Mat<T> {
    fn matvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        assert_eq!(self.nrows(), y.len(), "Output vector y has incorrect length");
        assert_eq!(self.ncols(), x.len(), "Input vector x has incorrect length");
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = (0..self.ncols()).fold(T::zero(), |acc, j| acc + self[(i, j)] * x[j]);
        }
    }
}

impl<T: Float> MatTransVec<Vec<T>> for Mat<T> {
    fn mattransvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        assert_eq!(self.ncols(), y.len(), "Output vector y has incorrect length");
        assert_eq!(self.nrows(), x.len(), "Input vector x has incorrect length");
        for (j, yj) in y.iter_mut().enumerate() {
            *yj = (0..self.nrows()).fold(T::zero(), |acc, i| acc + self[(i, j)] * x[i]);
        }
    }
}

impl<T: Float + From<f64> + Send + Sync> InnerProduct<Vec<T>> for () {
    type Scalar = T;

    fn dot(&self, x: &Vec<T>, y: &Vec<T>) -> T {
        assert_eq!(x.len(), y.len(), "Vectors must have the same length");
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            x.par_iter()
                .zip(y.par_iter())
                .map(|(xi, yi)| *xi * *yi)
                .reduce(|| T::zero(), |acc, v| acc + v)
        }
        #[cfg(not(feature = "rayon"))]
        {
            x.iter()
                .zip(y.iter())
                .map(|(xi, yi)| *xi * *yi)
                .fold(T::zero(), |acc, v| acc + v)
        }
    }

    fn norm(&self, x: &Vec<T>) -> T {
        self.dot(x, x).sqrt()
    }
}

impl<T> Indexing for Vec<T> {
    fn nrows(&self) -> usize {
        self.len()
    }
}

impl<T> Indexing for Mat<T> {
    fn nrows(&self) -> usize {
        self.nrows()
    }
}
