//! Krylov solver object with a PETSc-like lifecycle.
//!
//! A [`Ksp`] owns its [`Pc`]; both read their options under the same prefix
//! (`<prefix>ksp_type`, `<prefix>pc_type`, ...). Null spaces attached to the system
//! operator are removed from the right-hand side (transpose null space) and from the
//! solution (null space) around every solve.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, warn};

use crate::config::options::{KspOptions, OptionsDb};
use crate::context::appctx::Dm;
use crate::context::pc_context::{Pc, TransposedPc};
use crate::context::viewer::Viewer;
use crate::core::traits::Transposed;
use crate::error::KError;
use crate::operator::Operator;
use crate::preconditioner::Preconditioner;
use crate::solver::{GmresSolver, LinearSolver, PcgSolver, RichardsonSolver};
use crate::utils::convergence::SolveStats;

/// Krylov methods selectable through `-ksp_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KspType {
    /// Apply the preconditioner once.
    Preonly,
    Richardson,
    Cg,
    Gmres,
}

impl FromStr for KspType {
    type Err = KError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preonly" => Ok(KspType::Preonly),
            "richardson" => Ok(KspType::Richardson),
            "cg" => Ok(KspType::Cg),
            "gmres" => Ok(KspType::Gmres),
            _ => Err(KError::UnknownType { kind: "ksp", name: s.to_string() }),
        }
    }
}

impl fmt::Display for KspType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KspType::Preonly => "preonly",
            KspType::Richardson => "richardson",
            KspType::Cg => "cg",
            KspType::Gmres => "gmres",
        })
    }
}

pub struct Ksp {
    ksp_type: Option<KspType>,
    prefix: String,
    tab_level: usize,
    opts: KspOptions,
    amat: Option<Operator>,
    pc: Pc,
}

impl Ksp {
    pub fn create() -> Self {
        Self {
            ksp_type: None,
            prefix: String::new(),
            tab_level: 0,
            opts: KspOptions::default(),
            amat: None,
            pc: Pc::create(),
        }
    }

    pub fn set_type(&mut self, ksp_type: KspType) {
        self.ksp_type = Some(ksp_type);
    }

    /// The method `solve` runs; GMRES unless set otherwise.
    pub fn ksp_type(&self) -> KspType {
        self.ksp_type.unwrap_or(KspType::Gmres)
    }

    pub fn set_tolerances(&mut self, rtol: f64, atol: f64, max_it: usize) {
        self.opts.rtol = rtol;
        self.opts.atol = atol;
        self.opts.max_it = max_it;
    }

    pub fn tolerances(&self) -> (f64, f64, usize) {
        (self.opts.rtol, self.opts.atol, self.opts.max_it)
    }

    pub fn set_options_prefix(&mut self, prefix: &str) {
        self.prefix = prefix.to_string();
        self.pc.set_options_prefix(prefix);
    }

    pub fn options_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn increment_tab_level(&mut self, by: usize) {
        self.set_tab_level(self.tab_level + by);
    }

    pub(crate) fn set_tab_level(&mut self, level: usize) {
        self.tab_level = level;
        self.pc.set_tab_level(level);
    }

    pub fn tab_level(&self) -> usize {
        self.tab_level
    }

    pub fn set_operators(&mut self, amat: Operator, pmat: Operator) {
        self.amat = Some(amat.clone());
        self.pc.set_operators(amat, pmat);
    }

    pub fn set_dm(&mut self, dm: Arc<Dm>) {
        self.pc.set_dm(dm);
    }

    pub fn pc(&self) -> &Pc {
        &self.pc
    }

    pub fn pc_mut(&mut self) -> &mut Pc {
        &mut self.pc
    }

    /// Read `<prefix>ksp_*` options and pass the database on to the PC.
    pub fn set_from_options(&mut self, db: &OptionsDb) -> Result<(), KError> {
        let mut opts = KspOptions::from_db(db, &self.prefix)?;
        if opts.ksp_type.is_none() {
            opts.ksp_type = self.ksp_type;
        }
        self.ksp_type = opts.ksp_type;
        self.opts = opts;
        self.pc.set_from_options(db)
    }

    /// Set up the PC; call again after the preconditioning matrix is reassembled.
    pub fn set_up(&mut self) -> Result<(), KError> {
        debug!("{}KSP set-up: type {}", self.prefix, self.ksp_type());
        self.pc.set_up()
    }

    fn amat(&self) -> Result<&Operator, KError> {
        self.amat.as_ref().ok_or(KError::MissingOperators)
    }

    fn check(&self, b: &[f64], x: &[f64]) -> Result<(), KError> {
        if !self.pc.is_set_up() {
            return Err(KError::NotSetUp);
        }
        let n = self.amat()?.nrows();
        if b.len() != n {
            return Err(KError::DimensionMismatch { expected: n, found: b.len() });
        }
        if x.len() != n {
            return Err(KError::DimensionMismatch { expected: n, found: x.len() });
        }
        Ok(())
    }

    /// Solve A x = b; `x` holds the initial guess on entry.
    pub fn solve(&self, b: &[f64], x: &mut Vec<f64>) -> Result<SolveStats<f64>, KError> {
        self.check(b, x)?;
        let a = self.amat()?;
        let mut rhs = b.to_vec();
        if let Some(ns) = a.transpose_nullspace() {
            ns.remove(&mut rhs);
        }
        let stats = match self.ksp_type() {
            KspType::Preonly => {
                self.pc.apply(&rhs, x)?;
                SolveStats { iterations: 1, final_residual: 0.0, converged: true }
            }
            _ => self.run(a, &self.pc as &dyn Preconditioner<Operator, Vec<f64>>, &rhs, x)?,
        };
        if let Some(ns) = a.nullspace() {
            ns.remove(x);
        }
        self.report(&stats);
        Ok(stats)
    }

    /// Solve Aᵀ x = b with the transposed preconditioner.
    pub fn solve_transpose(&self, b: &[f64], x: &mut Vec<f64>) -> Result<SolveStats<f64>, KError> {
        self.check(b, x)?;
        let a = self.amat()?;
        let mut rhs = b.to_vec();
        if let Some(ns) = a.nullspace() {
            ns.remove(&mut rhs);
        }
        let stats = match self.ksp_type() {
            KspType::Preonly => {
                self.pc.apply_transpose(&rhs, x)?;
                SolveStats { iterations: 1, final_residual: 0.0, converged: true }
            }
            _ => {
                let pc = TransposedPc(&self.pc);
                self.run(&Transposed(a), &pc as &dyn Preconditioner<Transposed<'_, Operator>, Vec<f64>>, &rhs, x)?
            }
        };
        if let Some(ns) = a.transpose_nullspace() {
            ns.remove(x);
        }
        self.report(&stats);
        Ok(stats)
    }

    fn run<M>(
        &self,
        a: &M,
        pc: &dyn Preconditioner<M, Vec<f64>>,
        b: &Vec<f64>,
        x: &mut Vec<f64>,
    ) -> Result<SolveStats<f64>, KError>
    where
        M: crate::core::traits::MatVec<Vec<f64>>,
    {
        let KspOptions { rtol, atol, max_it, gmres_restart, .. } = self.opts;
        match self.ksp_type() {
            KspType::Cg => PcgSolver::new(rtol, max_it).with_atol(atol).solve(a, Some(pc), b, x),
            KspType::Richardson => RichardsonSolver::new(rtol, max_it).with_atol(atol).solve(a, Some(pc), b, x),
            KspType::Gmres | KspType::Preonly => {
                GmresSolver::new(gmres_restart, rtol, max_it).with_atol(atol).solve(a, Some(pc), b, x)
            }
        }
    }

    fn report(&self, stats: &SolveStats<f64>) {
        if stats.converged {
            debug!(
                "{}KSP {} converged in {} iterations, residual {:e}",
                self.prefix,
                self.ksp_type(),
                stats.iterations,
                stats.final_residual
            );
        } else {
            warn!(
                "{}KSP {} did not converge in {} iterations, residual {:e}",
                self.prefix,
                self.ksp_type(),
                stats.iterations,
                stats.final_residual
            );
        }
    }

    pub fn view(&self, viewer: &mut Viewer) {
        let saved = viewer.tab();
        viewer.set_tab(self.tab_level);
        let prefix = if self.prefix.is_empty() { String::new() } else { format!("({}) ", self.prefix) };
        viewer.printf_ascii(&format!("KSP Object: {prefix}"));
        viewer.push_tab();
        viewer.printf_ascii(&format!("type: {}", self.ksp_type()));
        if self.ksp_type() == KspType::Gmres {
            viewer.printf_ascii(&format!("restart={}", self.opts.gmres_restart));
        }
        viewer.printf_ascii(&format!("maximum iterations={}", self.opts.max_it));
        viewer.printf_ascii(&format!("tolerances: relative={:e}, absolute={:e}", self.opts.rtol, self.opts.atol));
        viewer.pop_tab();
        self.pc.view(viewer);
        viewer.set_tab(saved);
    }
}

impl Default for Ksp {
    fn default() -> Self {
        Self::create()
    }
}

impl fmt::Debug for Ksp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ksp")
            .field("type", &self.ksp_type())
            .field("prefix", &self.prefix)
            .field("pc", &self.pc)
            .finish()
    }
}
