//! Bilinear and linear forms described by per-cell kernels.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use faer::Mat;

use crate::error::KError;
use crate::fem::space::{Argument, FunctionSpace};

/// Parameters forwarded to every cell kernel (the "form compiler parameters").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormParameters {
    pub quadrature_degree: Option<usize>,
    pub extra: BTreeMap<String, String>,
}

impl FormParameters {
    pub fn with_quadrature_degree(mut self, degree: usize) -> Self {
        self.quadrature_degree = Some(degree);
        self
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.extra.insert(key.to_string(), value.to_string());
        self
    }
}

/// A bilinear form a(u, v) over a test and a trial space sharing one cell set.
pub trait BilinearForm: Send + Sync {
    fn test_space(&self) -> &Arc<FunctionSpace>;
    fn trial_space(&self) -> &Arc<FunctionSpace>;
    /// Local matrix of `cell`: rows follow the test space's cell dofs, columns the trial space's.
    fn cell_matrix(&self, cell: usize, params: &FormParameters) -> Mat<f64>;
    fn label(&self) -> &str {
        "a"
    }
}

/// Shared handle to a bilinear form.
pub type FormRef = Arc<dyn BilinearForm>;

/// A linear form L(v) over a test space.
pub trait LinearForm: Send + Sync {
    fn space(&self) -> &Arc<FunctionSpace>;
    fn cell_vector(&self, cell: usize, params: &FormParameters) -> Vec<f64>;
}

type MatrixKernel = dyn Fn(usize, &FormParameters) -> Mat<f64> + Send + Sync;
type VectorKernel = dyn Fn(usize, &FormParameters) -> Vec<f64> + Send + Sync;

/// Bilinear form backed by a closure computing local cell matrices.
pub struct KernelForm {
    test: Arc<FunctionSpace>,
    trial: Arc<FunctionSpace>,
    kernel: Box<MatrixKernel>,
    label: String,
}

impl KernelForm {
    pub fn new<F>(test: &Argument, trial: &Argument, kernel: F) -> Result<Self, KError>
    where
        F: Fn(usize, &FormParameters) -> Mat<f64> + Send + Sync + 'static,
    {
        if test.number() != 0 || trial.number() != 1 {
            return Err(KError::InvalidForm("arguments must be (test, trial)".into()));
        }
        if test.space().num_cells() != trial.space().num_cells() {
            return Err(KError::InvalidForm("test and trial spaces live on different meshes".into()));
        }
        Ok(Self {
            test: Arc::clone(test.space()),
            trial: Arc::clone(trial.space()),
            kernel: Box::new(kernel),
            label: "a".to_string(),
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn into_ref(self) -> FormRef {
        Arc::new(self)
    }
}

impl BilinearForm for KernelForm {
    fn test_space(&self) -> &Arc<FunctionSpace> {
        &self.test
    }

    fn trial_space(&self) -> &Arc<FunctionSpace> {
        &self.trial
    }

    fn cell_matrix(&self, cell: usize, params: &FormParameters) -> Mat<f64> {
        (self.kernel)(cell, params)
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for KernelForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelForm")
            .field("label", &self.label)
            .field("test", &self.test.name())
            .field("trial", &self.trial.name())
            .finish()
    }
}

/// Linear form backed by a closure computing local cell vectors.
pub struct KernelLinearForm {
    space: Arc<FunctionSpace>,
    kernel: Box<VectorKernel>,
}

impl KernelLinearForm {
    pub fn new<F>(test: &Argument, kernel: F) -> Result<Self, KError>
    where
        F: Fn(usize, &FormParameters) -> Vec<f64> + Send + Sync + 'static,
    {
        if test.number() != 0 {
            return Err(KError::InvalidForm("a linear form takes a test argument".into()));
        }
        Ok(Self { space: Arc::clone(test.space()), kernel: Box::new(kernel) })
    }
}

impl LinearForm for KernelLinearForm {
    fn space(&self) -> &Arc<FunctionSpace> {
        &self.space
    }

    fn cell_vector(&self, cell: usize, params: &FormParameters) -> Vec<f64> {
        (self.kernel)(cell, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_order_is_checked() {
        let v = Arc::new(FunctionSpace::interval(3).unwrap());
        let (u, w) = (Argument::trial(&v), Argument::test(&v));
        assert!(KernelForm::new(&u, &w, |_, _| Mat::zeros(2, 2)).is_err());
        assert!(KernelLinearForm::new(&u, |_, _| vec![0.0; 2]).is_err());

        let a = KernelForm::new(&w, &u, |_, p| {
            let q = p.quadrature_degree.unwrap_or(1) as f64;
            Mat::from_fn(2, 2, |_, _| q)
        })
        .unwrap()
        .with_label("mass");
        assert_eq!(a.label(), "mass");
        let params = FormParameters::default().with_quadrature_degree(4);
        assert_eq!(a.cell_matrix(0, &params)[(1, 1)], 4.0);
    }

    #[test]
    fn spaces_must_share_cells() {
        let v = Arc::new(FunctionSpace::interval(3).unwrap());
        let q = Arc::new(FunctionSpace::interval(2).unwrap());
        assert!(KernelForm::new(&Argument::test(&v), &Argument::trial(&q), |_, _| Mat::zeros(2, 2)).is_err());
    }
}
