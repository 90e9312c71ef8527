//! The discretization pieces the preconditioners work on.
//!
//! Function spaces only know their dofs, cells and boundary markers; the local cell
//! matrices and vectors come from user kernels. This is enough to build, constrain and
//! assemble operators, and to solve with them.

pub mod assemble;
pub mod bcs;
pub mod form;
pub mod solving;
pub mod space;

pub use assemble::{allocate_matrix, assemble_matrix, assemble_vector, sparsity, AssemblyCallable, FormMatrix};
pub use bcs::{BcValue, DirichletBC};
pub use form::{BilinearForm, FormParameters, FormRef, KernelForm, KernelLinearForm, LinearForm};
pub use solving::{solve_assembled, solve_variational};
pub use space::{Argument, Function, FunctionSpace};
