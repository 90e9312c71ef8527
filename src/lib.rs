//! kryst-assembled: assembled preconditioners for matrix-free operators
//!
//! A PETSc-style PC/KSP stack over Faer, with preconditioner plugins that assemble a
//! bilinear form into an explicit matrix and let a configurable inner PC invert it:
//! [`AssembledPc`] for diagonal blocks of matrix-free operators and [`ExplicitSchurPc`]
//! for user-supplied Schur complement approximations.

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod fem;
pub mod matrix;
pub mod operator;
pub mod preconditioner;
pub mod solver;
pub mod utils;

// Re-exports for convenience
pub use crate::core::*;
pub use config::*;
pub use context::*;
pub use error::*;
pub use fem::*;
pub use matrix::*;
pub use operator::*;
pub use preconditioner::*;
pub use solver::*;
pub use utils::*;
