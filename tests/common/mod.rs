//! P1 kernels on uniform interval meshes shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use faer::Mat;
use kryst_assembled::fem::{Argument, FormRef, FunctionSpace, KernelForm};
use parking_lot::RwLock;

pub fn interval(n: usize) -> Arc<FunctionSpace> {
    Arc::new(FunctionSpace::interval(n).unwrap())
}

/// ∫ u v over each cell.
pub fn mass(v: &Arc<FunctionSpace>, q: &Arc<FunctionSpace>) -> FormRef {
    let h = 1.0 / v.num_cells() as f64;
    KernelForm::new(&Argument::test(v), &Argument::trial(q), move |_, _| {
        Mat::from_fn(2, 2, |i, j| if i == j { h / 3.0 } else { h / 6.0 })
    })
    .unwrap()
    .with_label("mass")
    .into_ref()
}

/// ∫ k u' v' + u v, with `k` read at every assembly.
pub fn helmholtz(v: &Arc<FunctionSpace>, k: Arc<RwLock<f64>>) -> FormRef {
    let h = 1.0 / v.num_cells() as f64;
    KernelForm::new(&Argument::test(v), &Argument::trial(v), move |_, _| {
        let k = *k.read();
        Mat::from_fn(2, 2, |i, j| if i == j { k / h + h / 3.0 } else { -k / h + h / 6.0 })
    })
    .unwrap()
    .with_label("helmholtz")
    .into_ref()
}

/// ∫ u' v'.
pub fn laplace(v: &Arc<FunctionSpace>) -> FormRef {
    let h = 1.0 / v.num_cells() as f64;
    KernelForm::new(&Argument::test(v), &Argument::trial(v), move |_, _| {
        Mat::from_fn(2, 2, |i, j| if i == j { 1.0 / h } else { -1.0 / h })
    })
    .unwrap()
    .with_label("laplace")
    .into_ref()
}

pub fn random_vector(n: usize, seed: u64) -> Vec<f64> {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}
