//! Boundary condition semantics through the variational and pre-assembled solves.

mod common;

use approx::assert_abs_diff_eq;
use common::{helmholtz, interval, laplace};
use kryst_assembled::config::OptionsDb;
use kryst_assembled::fem::{
    solve_assembled, solve_variational, Argument, BcValue, DirichletBC, FormMatrix, FormParameters, Function,
    KernelLinearForm,
};
use kryst_assembled::matrix::MatType;
use parking_lot::RwLock;
use std::sync::Arc;

#[test]
fn homogenize_restore_and_set_value() {
    let v = interval(6);
    let a = laplace(&v);
    let mut g = Function::new(&v);
    g.assign(5.0);
    let mut bc = DirichletBC::new(&v, &g, 1).unwrap();
    let right = DirichletBC::new(&v, 5.0, 2).unwrap();
    let db = OptionsDb::new();

    let mut u = Function::new(&v);
    solve_variational(&a, None, &mut u, &[bc.clone(), right.clone()], &db, "").unwrap();
    u.values().iter().for_each(|&ui| assert_abs_diff_eq!(ui, 5.0, epsilon = 1e-12));

    bc.homogenize();
    let mut right_h = right.clone();
    right_h.homogenize();
    assert!(bc.is_homogeneous());
    solve_variational(&a, None, &mut u, &[bc.clone(), right_h], &db, "").unwrap();
    u.values().iter().for_each(|&ui| assert_abs_diff_eq!(ui, 0.0, epsilon = 1e-12));
    // The user's function keeps its values.
    assert!(g.values().iter().all(|&gi| gi == 5.0));

    bc.restore();
    assert_eq!(bc.value(), &BcValue::Function(vec![5.0; 7]));
    solve_variational(&a, None, &mut u, &[bc.clone(), right.clone()], &db, "").unwrap();
    u.values().iter().for_each(|&ui| assert_abs_diff_eq!(ui, 5.0, epsilon = 1e-12));

    bc.set_value(2.0).unwrap();
    bc.homogenize();
    bc.restore();
    solve_variational(&a, None, &mut u, &[bc, right], &db, "").unwrap();
    assert_abs_diff_eq!(u.values()[0], 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(u.values()[3], 3.5, epsilon = 1e-12);
    assert_abs_diff_eq!(u.values()[6], 5.0, epsilon = 1e-12);
}

#[test]
fn pre_assembled_solve_reassembles_on_new_conditions() {
    let v = interval(8);
    let k = Arc::new(RwLock::new(1.0));
    let a = helmholtz(&v, k);
    let left = DirichletBC::new(&v, 1.0, 1).unwrap();
    let right = DirichletBC::new(&v, -1.0, 2).unwrap();
    let mut mat = FormMatrix::assemble(&a, &[left.clone()], &FormParameters::default(), MatType::Aij).unwrap();
    assert_eq!(mat.handle().read().get(0, 0), 1.0);
    let state = mat.handle().read().state();

    let h = 1.0 / 8.0;
    let l = KernelLinearForm::new(&Argument::test(&v), move |_, _| vec![h / 2.0; 2]).unwrap();
    let b = kryst_assembled::fem::assemble_vector(&l, &FormParameters::default()).unwrap();
    let b_copy = b.clone();

    // Same conditions: the matrix is reused as is.
    let mut u = Function::new(&v);
    solve_assembled(&mut mat, &mut u, &b, None, &OptionsDb::new(), "").unwrap();
    assert_eq!(mat.handle().read().state(), state);
    assert_abs_diff_eq!(u.values()[0], 1.0, epsilon = 1e-12);

    // Different conditions: reassembled in place, rhs untouched.
    solve_assembled(&mut mat, &mut u, &b, Some(&[left.clone(), right.clone()]), &OptionsDb::new(), "").unwrap();
    assert_eq!(mat.handle().read().state(), state + 1);
    assert_eq!(mat.handle().read().get(8, 8), 1.0);
    assert_eq!(b, b_copy);
    assert_abs_diff_eq!(u.values()[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(u.values()[8], -1.0, epsilon = 1e-12);

    // Same dofs with a new value: no reassembly, the new value still shows up.
    let mut right2 = right.clone();
    right2.set_value(3.0).unwrap();
    solve_assembled(&mut mat, &mut u, &b, Some(&[left, right2]), &OptionsDb::new(), "").unwrap();
    assert_eq!(mat.handle().read().state(), state + 1);
    assert_abs_diff_eq!(u.values()[8], 3.0, epsilon = 1e-12);
}

#[test]
fn pre_assembled_and_variational_solves_agree() {
    let v = interval(12);
    let k = Arc::new(RwLock::new(0.3));
    let a = helmholtz(&v, k);
    let bcs = vec![DirichletBC::new(&v, 0.5, 1).unwrap()];
    let l = KernelLinearForm::new(&Argument::test(&v), |c, _| vec![c as f64 * 0.01; 2]).unwrap();
    let b = kryst_assembled::fem::assemble_vector(&l, &FormParameters::default()).unwrap();

    let mut u1 = Function::new(&v);
    solve_variational(&a, Some(&l), &mut u1, &bcs, &OptionsDb::new(), "").unwrap();

    let mut mat = FormMatrix::assemble(&a, &bcs, &FormParameters::default(), MatType::Dense).unwrap();
    let mut u2 = Function::new(&v);
    let db: OptionsDb = "-solve_ksp_type gmres -solve_ksp_rtol 1e-12 -solve_pc_type ilu".parse().unwrap();
    let stats = solve_assembled(&mut mat, &mut u2, &b, None, &db, "solve_").unwrap();
    assert!(stats.converged);
    for (x, y) in u1.values().iter().zip(u2.values()) {
        assert_abs_diff_eq!(*x, *y, epsilon = 1e-9);
    }
}
