//! PETSc-style preconditioner object.
//!
//! A [`Pc`] holds a type, an options prefix, the operator pair and an optional [`Dm`].
//! `set_up` builds the backend that `apply` uses from the preconditioning operator:
//!
//! - `none`: identity
//! - `jacobi`: diagonal scaling (works on matrix-free operators by probing)
//! - `sor`: SOR sweeps, see `-pc_sor_omega`, `-pc_sor_its` and the sweep flags
//! - `ilu`: ILU(0)
//! - `lu`: dense LU with partial pivoting
//! - `ksp`: a nested [`Ksp`] under the prefix `<prefix>ksp_`
//! - `python`: a [`PcPlugin`], selected by `-pc_python_type` or set directly
//!
//! When no type is given, assembled operators get `ilu` and matrix-free ones `none`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::debug;

use crate::config::options::{OptionsDb, PcOptions};
use crate::context::appctx::Dm;
use crate::context::ksp_context::Ksp;
use crate::context::viewer::Viewer;
use crate::core::traits::Transposed;
use crate::error::KError;
use crate::operator::Operator;
use crate::preconditioner::base::{create_python_pc, PcPlugin};
use crate::preconditioner::{Ilu0, Jacobi, Preconditioner, Sor};
use crate::solver::LuSolver;

/// Preconditioner types selectable through `-pc_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcType {
    None,
    Jacobi,
    Sor,
    Ilu,
    Lu,
    Ksp,
    Python,
}

impl FromStr for PcType {
    type Err = KError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PcType::None),
            "jacobi" => Ok(PcType::Jacobi),
            "sor" => Ok(PcType::Sor),
            "ilu" => Ok(PcType::Ilu),
            "lu" => Ok(PcType::Lu),
            "ksp" => Ok(PcType::Ksp),
            "python" => Ok(PcType::Python),
            _ => Err(KError::UnknownType { kind: "pc", name: s.to_string() }),
        }
    }
}

impl fmt::Display for PcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PcType::None => "none",
            PcType::Jacobi => "jacobi",
            PcType::Sor => "sor",
            PcType::Ilu => "ilu",
            PcType::Lu => "lu",
            PcType::Ksp => "ksp",
            PcType::Python => "python",
        })
    }
}

enum Backend {
    Empty,
    Identity,
    Jacobi(Jacobi<f64>),
    Sor(Sor),
    Ilu(Ilu0),
    Lu(LuSolver),
    Ksp(Box<Ksp>),
    Python,
}

pub struct Pc {
    pc_type: Option<PcType>,
    prefix: String,
    tab_level: usize,
    amat: Option<Operator>,
    pmat: Option<Operator>,
    dm: Option<Arc<Dm>>,
    options: OptionsDb,
    pc_options: PcOptions,
    backend: Backend,
    plugin: Option<Box<dyn PcPlugin>>,
    plugin_initialized: bool,
    setup_state: Option<u64>,
    operators_changed: bool,
}

impl Pc {
    pub fn create() -> Self {
        Self {
            pc_type: None,
            prefix: String::new(),
            tab_level: 0,
            amat: None,
            pmat: None,
            dm: None,
            options: OptionsDb::new(),
            pc_options: PcOptions::default(),
            backend: Backend::Empty,
            plugin: None,
            plugin_initialized: false,
            setup_state: None,
            operators_changed: false,
        }
    }

    pub fn set_type(&mut self, pc_type: PcType) {
        if self.pc_type != Some(pc_type) {
            self.pc_type = Some(pc_type);
            self.reset();
        }
    }

    /// The type set so far; `None` until `set_type` or `set_from_options` picks one.
    pub fn pc_type(&self) -> Option<PcType> {
        self.pc_type
    }

    /// The type `set_up` uses: the set type, or the default for the current operator.
    pub fn effective_type(&self) -> PcType {
        match (self.pc_type, &self.pmat) {
            (Some(t), _) => t,
            (None, Some(Operator::Assembled(_))) => PcType::Ilu,
            (None, _) => PcType::None,
        }
    }

    pub fn set_options_prefix(&mut self, prefix: &str) {
        self.prefix = prefix.to_string();
    }

    pub fn options_prefix(&self) -> &str {
        &self.prefix
    }

    /// Nest this object one or more levels below `parent` for display purposes.
    pub fn increment_tab_level(&mut self, by: usize, parent: Option<&Pc>) {
        self.tab_level = parent.map_or(self.tab_level, |p| p.tab_level) + by;
    }

    pub fn tab_level(&self) -> usize {
        self.tab_level
    }

    pub(crate) fn set_tab_level(&mut self, level: usize) {
        self.tab_level = level;
    }

    /// Set the system operator and the operator the preconditioner is built from.
    pub fn set_operators(&mut self, amat: Operator, pmat: Operator) {
        self.amat = Some(amat);
        self.pmat = Some(pmat);
        self.operators_changed = true;
    }

    pub fn operators(&self) -> Result<(&Operator, &Operator), KError> {
        match (&self.amat, &self.pmat) {
            (Some(a), Some(p)) => Ok((a, p)),
            _ => Err(KError::MissingOperators),
        }
    }

    pub fn set_dm(&mut self, dm: Arc<Dm>) {
        self.dm = Some(dm);
    }

    pub fn dm(&self) -> Option<&Dm> {
        self.dm.as_deref()
    }

    pub(crate) fn dm_handle(&self) -> Option<&Arc<Dm>> {
        self.dm.as_ref()
    }

    /// Options database snapshot taken by the last `set_from_options`.
    pub fn options(&self) -> &OptionsDb {
        &self.options
    }

    /// Switch to type `python` with the given plugin; it is initialized at the next set-up.
    pub fn set_python_plugin(&mut self, plugin: Box<dyn PcPlugin>) {
        self.pc_type = Some(PcType::Python);
        self.plugin = Some(plugin);
        self.reset();
    }

    /// The plugin of a `python` PC, if it is a `P`.
    pub fn python_context<P: PcPlugin + 'static>(&self) -> Option<&P> {
        self.plugin.as_deref().and_then(|p| p.as_any().downcast_ref::<P>())
    }

    /// The nested solver of a `ksp` PC, once set up.
    pub fn ksp(&self) -> Option<&Ksp> {
        match &self.backend {
            Backend::Ksp(ksp) => Some(ksp),
            _ => None,
        }
    }

    /// Read `<prefix>pc_type` and the type-specific options.
    pub fn set_from_options(&mut self, db: &OptionsDb) -> Result<(), KError> {
        self.options = db.clone();
        self.pc_options = PcOptions::from_db(db, &self.prefix)?;
        if let Some(pc_type) = self.pc_options.pc_type {
            self.set_type(pc_type);
        }
        if self.pc_type == Some(PcType::Python) {
            if let Some(name) = self.pc_options.python_type.clone() {
                if self.plugin.as_ref().is_none_or(|p| p.name() != name) {
                    self.set_python_plugin(create_python_pc(&name)?);
                }
            }
        }
        if let Backend::Ksp(ksp) = &mut self.backend {
            ksp.set_from_options(db)?;
        }
        debug!("{}PC options: type {:?}", self.prefix, self.pc_type);
        Ok(())
    }

    pub fn is_set_up(&self) -> bool {
        !matches!(self.backend, Backend::Empty)
    }

    /// Build the backend from the preconditioning operator.
    ///
    /// Nothing happens if the operators were not reset and the preconditioning matrix has
    /// not been reassembled since the last call.
    pub fn set_up(&mut self) -> Result<(), KError> {
        let (amat, pmat) = {
            let (a, p) = self.operators()?;
            (a.clone(), p.clone())
        };
        let state = pmat.state();
        if self.is_set_up() && !self.operators_changed && self.setup_state == Some(state) {
            return Ok(());
        }
        let pc_type = self.effective_type();
        debug!("{}PC set-up: type {} on a {} operator (state {})", self.prefix, pc_type, pmat.type_name(), state);
        match pc_type {
            PcType::Python => self.set_up_plugin()?,
            PcType::Ksp => self.set_up_ksp(amat, pmat)?,
            _ => self.backend = build_backend(pc_type, &pmat, &self.pc_options)?,
        }
        self.setup_state = Some(state);
        self.operators_changed = false;
        Ok(())
    }

    fn set_up_plugin(&mut self) -> Result<(), KError> {
        let key = format!("{}pc_python_type", self.prefix);
        let mut plugin = self.plugin.take().ok_or(KError::InvalidOption { key, value: String::new() })?;
        let result = if self.plugin_initialized {
            plugin.update(self)
        } else {
            plugin.initialize(self)
        };
        self.plugin = Some(plugin);
        result?;
        self.plugin_initialized = true;
        self.backend = Backend::Python;
        Ok(())
    }

    fn set_up_ksp(&mut self, amat: Operator, pmat: Operator) -> Result<(), KError> {
        if !matches!(self.backend, Backend::Ksp(_)) {
            let mut ksp = Ksp::create();
            ksp.set_options_prefix(&format!("{}ksp_", self.prefix));
            ksp.set_tab_level(self.tab_level + 1);
            if let Some(dm) = &self.dm {
                ksp.set_dm(Arc::clone(dm));
            }
            ksp.set_from_options(&self.options)?;
            self.backend = Backend::Ksp(Box::new(ksp));
        }
        if let Backend::Ksp(ksp) = &mut self.backend {
            ksp.set_operators(amat, pmat);
            ksp.set_up()?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.backend = Backend::Empty;
        self.plugin_initialized = false;
        self.setup_state = None;
        if self.pc_type != Some(PcType::Python) {
            self.plugin = None;
        }
    }

    fn check_sizes(&self, x: &[f64], y: &[f64]) -> Result<(), KError> {
        let (_, p) = self.operators()?;
        let n = p.nrows();
        if x.len() != n || y.len() != n {
            return Err(KError::DimensionMismatch { expected: n, found: if x.len() != n { x.len() } else { y.len() } });
        }
        Ok(())
    }

    /// y = M⁻¹ x
    pub fn apply(&self, x: &[f64], y: &mut [f64]) -> Result<(), KError> {
        self.check_sizes(x, y)?;
        match &self.backend {
            Backend::Empty => Err(KError::NotSetUp),
            Backend::Identity => {
                y.copy_from_slice(x);
                Ok(())
            }
            Backend::Jacobi(j) => j.apply_to(x, y),
            Backend::Sor(s) => s.apply_to(x, y),
            Backend::Ilu(i) => i.apply_to(x, y),
            Backend::Lu(lu) => lu.solve_cached(x, y),
            Backend::Ksp(ksp) => {
                let mut z = vec![0.0; y.len()];
                ksp.solve(x, &mut z)?;
                y.copy_from_slice(&z);
                Ok(())
            }
            Backend::Python => match &self.plugin {
                Some(plugin) => plugin.apply(self, x, y),
                None => Err(KError::NotSetUp),
            },
        }
    }

    /// y = M⁻ᵀ x
    pub fn apply_transpose(&self, x: &[f64], y: &mut [f64]) -> Result<(), KError> {
        self.check_sizes(x, y)?;
        match &self.backend {
            Backend::Empty => Err(KError::NotSetUp),
            Backend::Identity => {
                y.copy_from_slice(x);
                Ok(())
            }
            Backend::Jacobi(j) => j.apply_to(x, y),
            Backend::Sor(_) => Err(KError::Unsupported("transpose application of SOR")),
            Backend::Ilu(i) => i.apply_transpose_to(x, y),
            Backend::Lu(lu) => lu.solve_transpose_cached(x, y),
            Backend::Ksp(ksp) => {
                let mut z = vec![0.0; y.len()];
                ksp.solve_transpose(x, &mut z)?;
                y.copy_from_slice(&z);
                Ok(())
            }
            Backend::Python => match &self.plugin {
                Some(plugin) => plugin.apply_transpose(self, x, y),
                None => Err(KError::NotSetUp),
            },
        }
    }

    pub fn view(&self, viewer: &mut Viewer) {
        let prefix = if self.prefix.is_empty() { String::new() } else { format!("({}) ", self.prefix) };
        viewer.printf_ascii(&format!("PC Object: {prefix}"));
        viewer.push_tab();
        viewer.printf_ascii(&format!("type: {}", self.effective_type()));
        match &self.backend {
            Backend::Sor(s) => viewer.printf_ascii(&s.to_string()),
            Backend::Ilu(_) => viewer.printf_ascii("ILU(0), no fill"),
            Backend::Lu(_) => viewer.printf_ascii("LU, partial pivoting"),
            Backend::Ksp(ksp) => {
                viewer.printf_ascii("KSP and PC on KSP preconditioner follow");
                ksp.view(viewer);
            }
            _ => {}
        }
        if let Some(plugin) = &self.plugin {
            plugin.view(self, viewer);
        }
        if let Some(p) = &self.pmat {
            let (name, m, n) = (p.type_name(), p.nrows(), p.ncols());
            viewer.printf_ascii(&format!("linear system matrix: type {name}, rows={m}, cols={n}"));
        }
        viewer.pop_tab();
    }
}

impl Default for Pc {
    fn default() -> Self {
        Self::create()
    }
}

impl fmt::Debug for Pc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pc")
            .field("type", &self.pc_type)
            .field("prefix", &self.prefix)
            .field("tab_level", &self.tab_level)
            .field("set_up", &self.is_set_up())
            .finish()
    }
}

fn build_backend(pc_type: PcType, pmat: &Operator, opts: &PcOptions) -> Result<Backend, KError> {
    let assembled = pmat.assembled();
    Ok(match (pc_type, assembled) {
        (PcType::None, _) => Backend::Identity,
        (PcType::Jacobi, Some(m)) => Backend::Jacobi(Jacobi::from_diagonal(m.read().diagonal())),
        (PcType::Jacobi, None) => {
            let mut jacobi = Jacobi::<f64>::new();
            Preconditioner::<Operator, Vec<f64>>::setup(&mut jacobi, pmat)?;
            Backend::Jacobi(jacobi)
        }
        (PcType::Sor, Some(m)) => {
            let mut sor = Sor::new(opts.sor_omega, opts.sor_its, opts.sor_type);
            sor.setup(&*m.read())?;
            Backend::Sor(sor)
        }
        (PcType::Ilu, Some(m)) => {
            let mut ilu = Ilu0::new();
            ilu.factor(&m.read().to_dense())?;
            Backend::Ilu(ilu)
        }
        (PcType::Lu, Some(m)) => {
            let mut lu = LuSolver::new();
            lu.factor(&m.read().to_dense())?;
            Backend::Lu(lu)
        }
        (PcType::Sor | PcType::Ilu | PcType::Lu, None) => {
            return Err(KError::Unsupported("factorization-based PC on a matrix-free operator"));
        }
        (PcType::Ksp | PcType::Python, _) => return Err(KError::Unsupported("nested PC built as a plain backend")),
    })
}

impl Preconditioner<Operator, Vec<f64>> for Pc {
    fn apply(&self, r: &Vec<f64>, z: &mut Vec<f64>) -> Result<(), KError> {
        Pc::apply(self, r, z)
    }

    fn apply_transpose(&self, r: &Vec<f64>, z: &mut Vec<f64>) -> Result<(), KError> {
        Pc::apply_transpose(self, r, z)
    }

    fn setup(&mut self, a: &Operator) -> Result<(), KError> {
        self.set_operators(a.clone(), a.clone());
        self.set_up()
    }
}

/// A PC seen through its transpose, for transposed Krylov solves.
pub struct TransposedPc<'a>(pub &'a Pc);

impl<'b> Preconditioner<Transposed<'b, Operator>, Vec<f64>> for TransposedPc<'_> {
    fn apply(&self, r: &Vec<f64>, z: &mut Vec<f64>) -> Result<(), KError> {
        self.0.apply_transpose(r, z)
    }

    fn apply_transpose(&self, r: &Vec<f64>, z: &mut Vec<f64>) -> Result<(), KError> {
        self.0.apply(r, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{AssembledMatrix, MatType, SparsityPattern};
    use approx::assert_abs_diff_eq;

    fn tridiag(n: usize) -> Operator {
        let rows = (0..n).map(|i| (i.saturating_sub(1)..(i + 2).min(n)).collect()).collect();
        let mut a = AssembledMatrix::allocate(SparsityPattern::from_rows(n, n, rows).unwrap(), MatType::Aij);
        for i in 0..n {
            a.add_value(i, i, 3.0).unwrap();
            if i + 1 < n {
                a.add_value(i, i + 1, -1.0).unwrap();
                a.add_value(i + 1, i, -1.0).unwrap();
            }
        }
        a.assembly_end();
        Operator::from(a)
    }

    #[test]
    fn pc_type_names() {
        for name in ["none", "jacobi", "sor", "ilu", "lu", "ksp", "python"] {
            assert_eq!(name.parse::<PcType>().unwrap().to_string(), name);
        }
        assert!(matches!("hypre".parse::<PcType>(), Err(KError::UnknownType { kind: "pc", .. })));
    }

    #[test]
    fn apply_before_set_up_fails() {
        let mut pc = Pc::create();
        assert!(matches!(pc.set_up(), Err(KError::MissingOperators)));
        let a = tridiag(3);
        pc.set_operators(a.clone(), a);
        assert!(matches!(pc.apply(&[1.0; 3], &mut [0.0; 3]), Err(KError::NotSetUp)));
    }

    #[test]
    fn default_type_depends_on_operator() {
        let a = tridiag(4);
        let mut pc = Pc::create();
        pc.set_operators(a.clone(), a);
        assert_eq!(pc.effective_type(), PcType::Ilu);
        pc.set_up().unwrap();
        assert!(pc.is_set_up());
    }

    #[test]
    fn lu_inverts_and_tracks_reassembly() {
        let a = tridiag(4);
        let db: OptionsDb = "-inner_pc_type lu".parse().unwrap();
        let mut pc = Pc::create();
        pc.set_options_prefix("inner_");
        pc.set_from_options(&db).unwrap();
        pc.set_operators(a.clone(), a.clone());
        pc.set_up().unwrap();
        let x_true = vec![1.0, 2.0, 3.0, 4.0];
        let mut b = vec![0.0; 4];
        crate::core::traits::MatVec::matvec(&a, &x_true, &mut b);
        let mut x = vec![0.0; 4];
        pc.apply(&b, &mut x).unwrap();
        for (xi, ei) in x.iter().zip(&x_true) {
            assert_abs_diff_eq!(*xi, *ei, epsilon = 1e-12);
        }
        pc.apply_transpose(&b, &mut x).unwrap();
        for (xi, ei) in x.iter().zip(&x_true) {
            assert_abs_diff_eq!(*xi, *ei, epsilon = 1e-12);
        }

        // Doubling the matrix is picked up at the next set-up.
        if let Some(m) = a.assembled() {
            let mut m = m.write();
            for i in 0..4 {
                let d = m.get(i, i);
                m.add_value(i, i, d).unwrap();
                if i + 1 < 4 {
                    m.add_value(i, i + 1, -1.0).unwrap();
                    m.add_value(i + 1, i, -1.0).unwrap();
                }
            }
            m.assembly_end();
        }
        pc.set_up().unwrap();
        pc.apply(&b, &mut x).unwrap();
        for (xi, ei) in x.iter().zip(&x_true) {
            assert_abs_diff_eq!(*xi, 0.5 * ei, epsilon = 1e-12);
        }
    }

    #[test]
    fn sor_and_jacobi_from_options() {
        let a = tridiag(5);
        let db: OptionsDb = "-pc_type sor -pc_sor_its 3 -pc_sor_omega 1.1".parse().unwrap();
        let mut pc = Pc::create();
        pc.set_from_options(&db).unwrap();
        pc.set_operators(a.clone(), a.clone());
        pc.set_up().unwrap();
        let mut viewer = Viewer::ascii();
        pc.view(&mut viewer);
        assert!(viewer.contents().contains("type = SYMMETRIC, iterations = 3, omega = 1.1"));
        assert!(matches!(pc.apply_transpose(&[1.0; 5], &mut [0.0; 5]), Err(KError::Unsupported(_))));

        pc.set_type(PcType::Jacobi);
        pc.set_up().unwrap();
        let mut y = vec![0.0; 5];
        pc.apply(&[3.0; 5], &mut y).unwrap();
        assert_eq!(y, vec![1.0; 5]);
    }

    #[test]
    fn nested_ksp_uses_derived_prefix() {
        let a = tridiag(6);
        let db: OptionsDb = "-pc_type ksp -ksp_ksp_type cg -ksp_ksp_rtol 1e-12 -ksp_pc_type jacobi".parse().unwrap();
        let mut pc = Pc::create();
        pc.set_from_options(&db).unwrap();
        pc.set_operators(a.clone(), a.clone());
        pc.set_up().unwrap();
        let ksp = pc.ksp().unwrap();
        assert_eq!(ksp.options_prefix(), "ksp_");
        assert_eq!(ksp.pc().pc_type(), Some(PcType::Jacobi));
        assert_eq!(ksp.tab_level(), 1);
        let x_true = vec![1.0, -1.0, 2.0, 0.0, 1.0, 3.0];
        let mut b = vec![0.0; 6];
        crate::core::traits::MatVec::matvec(&a, &x_true, &mut b);
        let mut x = vec![0.0; 6];
        pc.apply(&b, &mut x).unwrap();
        for (xi, ei) in x.iter().zip(&x_true) {
            assert_abs_diff_eq!(*xi, *ei, epsilon = 1e-9);
        }
    }

    #[test]
    fn tab_level_follows_parent() {
        let mut outer = Pc::create();
        outer.increment_tab_level(2, None);
        let mut inner = Pc::create();
        inner.increment_tab_level(1, Some(&outer));
        assert_eq!(inner.tab_level(), 3);
    }
}
