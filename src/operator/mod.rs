//! Operators handed to PC and KSP objects: explicit matrices or matrix-free forms.

pub mod matfree;

pub use matfree::{BlockOperator, MatFreeOperator};

use std::sync::Arc;

use crate::core::traits::{Indexing, MatTransVec, MatVec};
use crate::matrix::{AssembledMatrix, MatHandle, NullSpace};

/// Shared handle to a linear operator.
#[derive(Clone)]
pub enum Operator {
    /// Explicit matrix, read under its lock at every product.
    Assembled(MatHandle),
    /// Unassembled operator with a form behind it.
    MatFree(Arc<MatFreeOperator>),
}

impl Operator {
    /// The matrix-free context, if this operator is not assembled.
    pub fn python_context(&self) -> Option<&Arc<MatFreeOperator>> {
        match self {
            Operator::MatFree(ctx) => Some(ctx),
            Operator::Assembled(_) => None,
        }
    }

    pub fn assembled(&self) -> Option<&MatHandle> {
        match self {
            Operator::Assembled(m) => Some(m),
            Operator::MatFree(_) => None,
        }
    }

    /// PETSc-style type name: the storage format, or `python` for matrix-free operators.
    pub fn type_name(&self) -> String {
        match self {
            Operator::Assembled(m) => m.read().mat_type().to_string(),
            Operator::MatFree(_) => "python".to_string(),
        }
    }

    pub fn nullspace(&self) -> Option<Arc<NullSpace>> {
        match self {
            Operator::Assembled(m) => m.read().nullspace().cloned(),
            Operator::MatFree(ctx) => ctx.nullspace().cloned(),
        }
    }

    pub fn transpose_nullspace(&self) -> Option<Arc<NullSpace>> {
        match self {
            Operator::Assembled(m) => m.read().transpose_nullspace().cloned(),
            Operator::MatFree(ctx) => ctx.transpose_nullspace().cloned(),
        }
    }

    /// Object state: bumped by every assembly of a matrix, or by
    /// [`MatFreeOperator::increase_state`] for matrix-free operators.
    pub fn state(&self) -> u64 {
        match self {
            Operator::Assembled(m) => m.read().state(),
            Operator::MatFree(ctx) => ctx.state(),
        }
    }

    pub fn nrows(&self) -> usize {
        match self {
            Operator::Assembled(m) => m.read().nrows(),
            Operator::MatFree(ctx) => ctx.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            Operator::Assembled(m) => m.read().ncols(),
            Operator::MatFree(ctx) => ctx.ncols(),
        }
    }
}

impl From<MatHandle> for Operator {
    fn from(m: MatHandle) -> Self {
        Operator::Assembled(m)
    }
}

impl From<AssembledMatrix> for Operator {
    fn from(m: AssembledMatrix) -> Self {
        Operator::Assembled(m.into_handle())
    }
}

impl From<MatFreeOperator> for Operator {
    fn from(ctx: MatFreeOperator) -> Self {
        Operator::MatFree(Arc::new(ctx))
    }
}

impl From<Arc<MatFreeOperator>> for Operator {
    fn from(ctx: Arc<MatFreeOperator>) -> Self {
        Operator::MatFree(ctx)
    }
}

impl MatVec<Vec<f64>> for Operator {
    fn matvec(&self, x: &Vec<f64>, y: &mut Vec<f64>) {
        match self {
            Operator::Assembled(m) => m.read().matvec(x, y),
            Operator::MatFree(ctx) => ctx.matvec(x, y),
        }
    }
}

impl MatTransVec<Vec<f64>> for Operator {
    fn mattransvec(&self, x: &Vec<f64>, y: &mut Vec<f64>) {
        match self {
            Operator::Assembled(m) => m.read().mattransvec(x, y),
            Operator::MatFree(ctx) => ctx.mattransvec(x, y),
        }
    }
}

impl Indexing for Operator {
    fn nrows(&self) -> usize {
        Operator::nrows(self)
    }
}
