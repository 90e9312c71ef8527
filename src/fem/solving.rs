//! Linear variational solves with strongly imposed boundary conditions.
//!
//! Both entry points lift the boundary values into the right-hand side,
//! `b' = b - A g` with `g` the boundary values and `A` the unconstrained operator, then
//! overwrite the constrained entries of `b'` with `g`. The constrained rows of the
//! assembled matrix are identity rows, so the solution takes the boundary values exactly.
//! The solver is a [`Ksp`] that defaults to `preonly` + `lu` and reads its options under
//! the given prefix.

use std::sync::Arc;

use log::debug;

use crate::config::options::OptionsDb;
use crate::context::ksp_context::{Ksp, KspType};
use crate::context::pc_context::PcType;
use crate::core::traits::MatVec;
use crate::error::KError;
use crate::fem::assemble::{assemble_matrix, assemble_vector, FormMatrix};
use crate::fem::bcs::DirichletBC;
use crate::fem::form::{FormParameters, FormRef, LinearForm};
use crate::fem::space::Function;
use crate::matrix::{MatHandle, MatType};
use crate::operator::{MatFreeOperator, Operator};
use crate::utils::convergence::SolveStats;

/// Solve `a(u, v) = L(v)` for `u` subject to `bcs`; a missing `L` means a zero right-hand side.
///
/// `u` provides the initial guess for iterative methods and receives the solution.
pub fn solve_variational(
    a: &FormRef,
    l: Option<&dyn LinearForm>,
    u: &mut Function,
    bcs: &[DirichletBC],
    options: &OptionsDb,
    prefix: &str,
) -> Result<SolveStats<f64>, KError> {
    check_spaces(a, u)?;
    let params = FormParameters::default();
    let mat_type: MatType = options.get_string(&format!("{prefix}mat_type"), "aij").parse()?;
    let tensor = assemble_matrix(a, bcs, &params, mat_type)?;
    let b = match l {
        Some(l) => {
            if !Arc::ptr_eq(l.space(), a.test_space()) {
                return Err(KError::InvalidForm("linear form and bilinear form use different test spaces".into()));
            }
            assemble_vector(l, &params)?
        }
        None => vec![0.0; a.test_space().ndofs()],
    };
    let rhs = lifted_rhs(a, &params, bcs, &b)?;
    solve_with(&tensor, &rhs, u, bcs, options, prefix)
}

/// Solve with a pre-assembled matrix and right-hand side.
///
/// Passing `bcs` that constrain other dofs than the ones `a` was assembled with
/// reassembles `a` first; `None` keeps the matrix's own conditions. `b` is left untouched.
pub fn solve_assembled(
    a: &mut FormMatrix,
    u: &mut Function,
    b: &[f64],
    bcs: Option<&[DirichletBC]>,
    options: &OptionsDb,
    prefix: &str,
) -> Result<SolveStats<f64>, KError> {
    check_spaces(a.form(), u)?;
    if let Some(bcs) = bcs {
        if a.reassemble_with(bcs)? {
            debug!("boundary conditions changed, matrix reassembled");
        }
    }
    let bcs = a.bcs().to_vec();
    let rhs = lifted_rhs(a.form(), a.form_parameters(), &bcs, b)?;
    solve_with(a.handle(), &rhs, u, &bcs, options, prefix)
}

fn check_spaces(a: &FormRef, u: &Function) -> Result<(), KError> {
    if !Arc::ptr_eq(a.trial_space(), u.space()) {
        return Err(KError::InvalidForm("solution does not live on the trial space".into()));
    }
    if a.test_space().ndofs() != a.trial_space().ndofs() {
        return Err(KError::InvalidForm("bilinear form is not square".into()));
    }
    Ok(())
}

fn lifted_rhs(a: &FormRef, params: &FormParameters, bcs: &[DirichletBC], b: &[f64]) -> Result<Vec<f64>, KError> {
    let n = a.test_space().ndofs();
    if b.len() != n {
        return Err(KError::DimensionMismatch { expected: n, found: b.len() });
    }
    let mut g = vec![0.0; a.trial_space().ndofs()];
    for bc in bcs {
        bc.apply(&mut g)?;
    }
    let mut rhs = b.to_vec();
    if bcs.is_empty() {
        return Ok(rhs);
    }
    let raw = MatFreeOperator::new(Arc::clone(a), Vec::new())?.with_form_parameters(params.clone());
    let mut ag = vec![0.0; n];
    raw.matvec(&g, &mut ag);
    rhs.iter_mut().zip(&ag).for_each(|(r, v)| *r -= v);
    for bc in bcs {
        bc.apply(&mut rhs)?;
    }
    Ok(rhs)
}

fn solve_with(
    tensor: &MatHandle,
    rhs: &[f64],
    u: &mut Function,
    bcs: &[DirichletBC],
    options: &OptionsDb,
    prefix: &str,
) -> Result<SolveStats<f64>, KError> {
    let mut ksp = Ksp::create();
    ksp.set_options_prefix(prefix);
    ksp.set_type(KspType::Preonly);
    ksp.pc_mut().set_type(PcType::Lu);
    ksp.set_from_options(options)?;
    let op = Operator::from(Arc::clone(tensor));
    ksp.set_operators(op.clone(), op);
    ksp.set_up()?;

    let mut x = u.values().to_vec();
    for bc in bcs {
        bc.apply(&mut x)?;
    }
    let stats = ksp.solve(rhs, &mut x)?;
    u.values_mut().copy_from_slice(&x);
    Ok(stats)
}
