//! Solver objects and the context they run in.
//!
//! - [`pc_context`]: the [`Pc`] object and its types
//! - [`ksp_context`]: the [`Ksp`] object wrapping a Krylov method around a `Pc`
//! - [`appctx`]: the application context and the `Dm` that carries it to a PC
//! - [`viewer`]: ASCII viewer used by `view`
//!
//! # References
//! - PETSc documentation: https://petsc.org/release/docs/manualpages/KSP/

pub mod appctx;
pub mod ksp_context;
pub mod pc_context;
pub mod viewer;

pub use appctx::{get_function_space, AppCtx, Dm, FORM_COMPILER_PARAMETERS};
pub use ksp_context::{Ksp, KspType};
pub use pc_context::{Pc, PcType, TransposedPc};
pub use viewer::Viewer;
