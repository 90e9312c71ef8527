//! Preconditioners that assemble a bilinear form and hand the matrix to an inner PC.
//!
//! [`AssembledPc`] turns a matrix-free preconditioning operator into an explicit matrix
//! and lets any configured PC invert it. The form it assembles comes from a
//! [`FormSource`]: by default the matrix-free operator itself ([`OperatorForm`]), or a
//! user-supplied Schur complement approximation ([`Schur`]).
//!
//! Options are read under `<prefix><PREFIX>`, where `<prefix>` is the outer PC's prefix
//! and `<PREFIX>` is `assembled_` or `schur_`:
//!
//! - `<prefix><PREFIX>mat_type`: storage of the assembled matrix (`aij` or `dense`)
//! - `<prefix><PREFIX>pc_type` and every other option of the inner PC

use log::{debug, info};

use crate::context::appctx::get_function_space;
use crate::context::pc_context::{Pc, PcType};
use crate::context::viewer::Viewer;
use crate::error::KError;
use crate::fem::assemble::{allocate_matrix, AssemblyCallable};
use crate::fem::bcs::DirichletBC;
use crate::fem::form::FormRef;
use crate::fem::space::Argument;
use crate::matrix::{MatHandle, MatType};
use crate::operator::Operator;
use crate::preconditioner::base::{get_appctx, view_base, PcPlugin};

/// Where an assembling PC gets its bilinear form and boundary conditions from.
pub trait FormSource: Send + 'static {
    /// Options prefix appended to the outer PC's prefix.
    const PREFIX: &'static str;
    /// Name reported by `view`.
    const NAME: &'static str;

    fn form(&self, pc: &Pc, test: &Argument, trial: &Argument) -> Result<(FormRef, Vec<DirichletBC>), KError>;
}

/// The form and row conditions of the matrix-free preconditioning operator.
#[derive(Debug, Default, Clone, Copy)]
pub struct OperatorForm;

impl FormSource for OperatorForm {
    const PREFIX: &'static str = "assembled_";
    const NAME: &'static str = "AssembledPC";

    fn form(&self, pc: &Pc, _test: &Argument, _trial: &Argument) -> Result<(FormRef, Vec<DirichletBC>), KError> {
        let (_, p) = pc.operators()?;
        let ctx = p.python_context().ok_or(KError::NotMatrixFree)?;
        Ok((ctx.form().clone(), ctx.row_bcs().to_vec()))
    }
}

/// User-provided approximation of a Schur complement block.
pub trait SchurApproximation: Send + 'static {
    fn form(&self, pc: &Pc, test: &Argument, trial: &Argument) -> Result<(FormRef, Vec<DirichletBC>), KError>;
}

/// Form source delegating to a [`SchurApproximation`].
pub struct Schur<S>(pub S);

impl<S: SchurApproximation> FormSource for Schur<S> {
    const PREFIX: &'static str = "schur_";
    const NAME: &'static str = "ExplicitSchurPC";

    fn form(&self, pc: &Pc, test: &Argument, trial: &Argument) -> Result<(FormRef, Vec<DirichletBC>), KError> {
        self.0.form(pc, test, trial)
    }
}

/// Python-type PC that assembles a form and applies an inner PC to the result.
pub struct AssembledPc<S = OperatorForm> {
    source: S,
    p: Option<MatHandle>,
    assemble_p: Option<AssemblyCallable>,
    pc: Option<Pc>,
}

/// Assembles an explicit Schur complement approximation, under the `schur_` prefix.
pub type ExplicitSchurPc<S> = AssembledPc<Schur<S>>;

impl<S: FormSource> AssembledPc<S> {
    pub fn new(source: S) -> Self {
        Self { source, p: None, assemble_p: None, pc: None }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The inner PC, once initialized.
    pub fn inner_pc(&self) -> Option<&Pc> {
        self.pc.as_ref()
    }

    /// The assembled matrix, once initialized.
    pub fn matrix(&self) -> Option<&MatHandle> {
        self.p.as_ref()
    }

    fn assemble(&self) -> Result<(), KError> {
        self.assemble_p.as_ref().ok_or(KError::NotSetUp)?.assemble()
    }

    fn inner(&self) -> Result<&Pc, KError> {
        self.pc.as_ref().ok_or(KError::NotSetUp)
    }
}

impl<S: SchurApproximation> ExplicitSchurPc<S> {
    pub fn schur(approximation: S) -> Self {
        Self::new(Schur(approximation))
    }
}

impl Default for AssembledPc {
    fn default() -> Self {
        Self::new(OperatorForm)
    }
}

impl<S: FormSource> PcPlugin for AssembledPc<S> {
    fn name(&self) -> &str {
        S::NAME
    }

    fn initialize(&mut self, pc: &Pc) -> Result<(), KError> {
        let found = pc.effective_type();
        if found != PcType::Python {
            return Err(KError::WrongPcType { expected: PcType::Python, found });
        }
        let (_, p) = pc.operators()?;
        if p.python_context().is_some_and(|ctx| !ctx.on_diag()) {
            return Err(KError::OffDiagonalBlock);
        }

        let prefix = format!("{}{}", pc.options_prefix(), S::PREFIX);
        let dm = pc.dm().ok_or(KError::MissingDm)?;
        let space = get_function_space(dm);
        let (test, trial) = (Argument::test(space), Argument::trial(space));
        let (form, bcs) = self.source.form(pc, &test, &trial)?;

        let mat_type: MatType = pc.options().get_string(&format!("{prefix}mat_type"), "aij").parse()?;
        let fcp = get_appctx(pc)?.form_compiler_parameters()?;
        let tensor = allocate_matrix(&form, &bcs, &fcp, mat_type, &prefix)?;
        let assemble_p = AssemblyCallable::new(&form, &tensor, &bcs, &fcp)?;
        assemble_p.assemble()?;
        {
            let mut mat = tensor.write();
            mat.set_nullspace(p.nullspace())?;
            if let Some(tnsp) = p.transpose_nullspace() {
                mat.set_transpose_nullspace(Some(tnsp))?;
            }
        }
        let (m, n) = (form.test_space().ndofs(), form.trial_space().ndofs());
        info!("{}: assembled {mat_type} {m}x{n} matrix under prefix {prefix:?}", S::NAME);

        let mut inner = Pc::create();
        inner.increment_tab_level(1, Some(pc));
        inner.set_options_prefix(&prefix);
        if let Some(dm) = pc.dm_handle() {
            inner.set_dm(dm.clone());
        }
        let op = Operator::from(tensor.clone());
        inner.set_operators(op.clone(), op);
        inner.set_from_options(pc.options())?;
        inner.set_up()?;

        self.p = Some(tensor);
        self.assemble_p = Some(assemble_p);
        self.pc = Some(inner);
        Ok(())
    }

    fn update(&mut self, _pc: &Pc) -> Result<(), KError> {
        self.assemble()?;
        debug!("{}: reassembled preconditioning matrix", S::NAME);
        self.pc.as_mut().ok_or(KError::NotSetUp)?.set_up()
    }

    fn apply(&self, _pc: &Pc, x: &[f64], y: &mut [f64]) -> Result<(), KError> {
        self.inner()?.apply(x, y)
    }

    fn apply_transpose(&self, _pc: &Pc, x: &[f64], y: &mut [f64]) -> Result<(), KError> {
        self.inner()?.apply_transpose(x, y)
    }

    fn view(&self, pc: &Pc, viewer: &mut Viewer) {
        view_base(S::NAME, pc, viewer);
        if let Some(inner) = &self.pc {
            viewer.printf_ascii("PC to apply inverse");
            inner.view(viewer);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::options::OptionsDb;
    use crate::context::appctx::Dm;
    use crate::fem::form::KernelForm;
    use crate::fem::space::FunctionSpace;
    use crate::operator::{BlockOperator, MatFreeOperator};
    use faer::Mat;

    fn laplace(v: &Arc<FunctionSpace>, q: &Arc<FunctionSpace>) -> FormRef {
        let h = 1.0 / v.num_cells() as f64;
        KernelForm::new(&Argument::test(v), &Argument::trial(q), move |_, _| {
            Mat::from_fn(2, 2, |i, j| if i == j { 1.0 / h + h / 3.0 } else { -1.0 / h + h / 6.0 })
        })
        .unwrap()
        .into_ref()
    }

    fn outer_pc(p: Operator, space: &Arc<FunctionSpace>, prefix: &str, args: &str) -> Pc {
        let mut pc = Pc::create();
        pc.set_options_prefix(prefix);
        pc.set_dm(Arc::new(Dm::new(space)));
        pc.set_operators(p.clone(), p);
        let db: OptionsDb = args.parse().unwrap();
        pc.set_from_options(&db).unwrap();
        pc
    }

    #[test]
    fn rejects_non_python_outer_pc() {
        let v = Arc::new(FunctionSpace::interval(4).unwrap());
        let op = Operator::from(MatFreeOperator::new(laplace(&v, &v), vec![]).unwrap());
        let pc = outer_pc(op, &v, "", "-pc_type jacobi");
        let err = AssembledPc::default().initialize(&pc).unwrap_err();
        assert!(matches!(err, KError::WrongPcType { expected: PcType::Python, found: PcType::Jacobi }));
    }

    #[test]
    fn rejects_off_diagonal_block() {
        let v = Arc::new(FunctionSpace::interval(4).unwrap());
        let q = Arc::new(FunctionSpace::interval(4).unwrap());
        let block = BlockOperator::new(vec![Arc::clone(&v), Arc::clone(&q)])
            .with_block(0, 1, laplace(&v, &q))
            .unwrap();
        let op = Operator::from(block.sub_block(0, 1).unwrap());
        let pc = outer_pc(op, &v, "", "-pc_type python");
        let err = AssembledPc::default().initialize(&pc).unwrap_err();
        assert!(matches!(err, KError::OffDiagonalBlock));
        assert_eq!(err.to_string(), "only diagonal blocks may be inverted");
    }

    #[test]
    fn default_form_needs_matrix_free_operator() {
        let v = Arc::new(FunctionSpace::interval(4).unwrap());
        let m = crate::fem::assemble::assemble_matrix(&laplace(&v, &v), &[], &Default::default(), MatType::Aij)
            .unwrap();
        let pc = outer_pc(Operator::from(m), &v, "", "-pc_type python");
        assert!(matches!(AssembledPc::default().initialize(&pc), Err(KError::NotMatrixFree)));
    }

    #[test]
    fn missing_dm_is_reported() {
        let v = Arc::new(FunctionSpace::interval(4).unwrap());
        let op = Operator::from(MatFreeOperator::new(laplace(&v, &v), vec![]).unwrap());
        let mut pc = Pc::create();
        pc.set_type(PcType::Python);
        pc.set_operators(op.clone(), op);
        assert!(matches!(AssembledPc::default().initialize(&pc), Err(KError::MissingDm)));
    }

    #[test]
    fn inner_pc_gets_derived_prefix_and_tab_level() {
        let v = Arc::new(FunctionSpace::interval(6).unwrap());
        let op = Operator::from(MatFreeOperator::new(laplace(&v, &v), vec![]).unwrap());
        let args = "-fs_pc_type python -fs_assembled_pc_type lu -fs_assembled_mat_type dense";
        let mut pc = outer_pc(op, &v, "fs_", args);
        pc.increment_tab_level(2, None);
        let mut plugin = AssembledPc::default();
        plugin.initialize(&pc).unwrap();
        let inner = plugin.inner_pc().unwrap();
        assert_eq!(inner.options_prefix(), "fs_assembled_");
        assert_eq!(inner.tab_level(), 3);
        assert_eq!(inner.pc_type(), Some(PcType::Lu));
        let m = plugin.matrix().unwrap().read();
        assert_eq!(m.mat_type(), MatType::Dense);
        assert_eq!(m.options_prefix(), "fs_assembled_");
    }
}
