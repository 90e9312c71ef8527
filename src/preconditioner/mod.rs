//! Preconditioners for linear solvers.
//!
//! This module defines the [`Preconditioner`] trait used by the Krylov solvers, the
//! algebraic preconditioners behind the built-in PC types (Jacobi, SOR, ILU(0)), the
//! [`PcPlugin`] contract for user-defined PCs, and the assembling plugins
//! [`AssembledPc`] and [`ExplicitSchurPc`].

use crate::error::KError;

/// A preconditioner M ≈ A⁻¹.
pub trait Preconditioner<M, V> {
    /// Apply M⁻¹ to r, writing z = M⁻¹ r
    fn apply(&self, r: &V, z: &mut V) -> Result<(), KError>;
    /// Apply M⁻ᵀ to r, for transposed solves.
    fn apply_transpose(&self, _r: &V, _z: &mut V) -> Result<(), KError> {
        Err(KError::Unsupported("transpose application"))
    }
    /// Optionally: setup/factorize from A
    fn setup(&mut self, _a: &M) -> Result<(), KError> {
        Ok(())
    }
}

pub mod assembled;
pub mod base;
pub mod ilu;
pub mod jacobi;
pub mod sor;

pub use assembled::{AssembledPc, ExplicitSchurPc, FormSource, OperatorForm, Schur, SchurApproximation};
pub use base::{create_python_pc, get_appctx, register_python_pc, view_base, PcPlugin, PluginFactory};
pub use ilu::Ilu0;
pub use jacobi::Jacobi;
pub use sor::{MatSorType, Sor};
