//! Dirichlet boundary conditions.

use std::sync::Arc;

use crate::error::KError;
use crate::fem::space::{Function, FunctionSpace};

/// Prescribed boundary value: a constant or per-dof values of a function.
#[derive(Debug, Clone, PartialEq)]
pub enum BcValue {
    Constant(f64),
    Function(Vec<f64>),
}

impl From<f64> for BcValue {
    fn from(c: f64) -> Self {
        BcValue::Constant(c)
    }
}

impl From<&Function> for BcValue {
    fn from(f: &Function) -> Self {
        BcValue::Function(f.values().to_vec())
    }
}

/// Strong constraint `u = g` on the dofs of a marked boundary.
///
/// The value is copied when the condition is built: homogenizing the condition never
/// touches the caller's function.
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletBC {
    space: Arc<FunctionSpace>,
    marker: usize,
    nodes: Vec<usize>,
    value: BcValue,
    restore_value: BcValue,
}

impl DirichletBC {
    pub fn new(space: &Arc<FunctionSpace>, value: impl Into<BcValue>, marker: usize) -> Result<Self, KError> {
        let nodes = space.boundary_dofs(marker).ok_or(KError::UnknownBoundary(marker))?.to_vec();
        let value = value.into();
        check_value(space, &value)?;
        Ok(Self { space: Arc::clone(space), marker, nodes, restore_value: value.clone(), value })
    }

    pub fn space(&self) -> &Arc<FunctionSpace> {
        &self.space
    }

    pub fn marker(&self) -> usize {
        self.marker
    }

    /// Constrained dofs, sorted.
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn value(&self) -> &BcValue {
        &self.value
    }

    /// Replace the value by zero until [`restore`](Self::restore) is called.
    pub fn homogenize(&mut self) {
        self.value = BcValue::Constant(0.0);
    }

    /// Go back to the value given at construction or by the last `set_value`.
    pub fn restore(&mut self) {
        self.value = self.restore_value.clone();
    }

    /// Replace the value; later `restore` calls come back to this one.
    pub fn set_value(&mut self, value: impl Into<BcValue>) -> Result<(), KError> {
        let value = value.into();
        check_value(&self.space, &value)?;
        self.restore_value = value.clone();
        self.value = value;
        Ok(())
    }

    pub fn is_homogeneous(&self) -> bool {
        match &self.value {
            BcValue::Constant(c) => *c == 0.0,
            BcValue::Function(values) => self.nodes.iter().all(|&n| values[n] == 0.0),
        }
    }

    pub fn value_at(&self, dof: usize) -> f64 {
        match &self.value {
            BcValue::Constant(c) => *c,
            BcValue::Function(values) => values[dof],
        }
    }

    /// Write the boundary values into `u`.
    pub fn apply(&self, u: &mut [f64]) -> Result<(), KError> {
        if u.len() != self.space.ndofs() {
            return Err(KError::DimensionMismatch { expected: self.space.ndofs(), found: u.len() });
        }
        for &n in &self.nodes {
            u[n] = self.value_at(n);
        }
        Ok(())
    }

    /// Whether two conditions constrain the same dofs of the same space.
    pub fn same_nodes(&self, other: &DirichletBC) -> bool {
        Arc::ptr_eq(&self.space, &other.space) && self.nodes == other.nodes
    }
}

fn check_value(space: &FunctionSpace, value: &BcValue) -> Result<(), KError> {
    match value {
        BcValue::Function(values) if values.len() != space.ndofs() => {
            Err(KError::DimensionMismatch { expected: space.ndofs(), found: values.len() })
        }
        _ => Ok(()),
    }
}

/// Sorted union of the dofs constrained by the conditions that live on `space`.
pub(crate) fn constrained_nodes(bcs: &[DirichletBC], space: &Arc<FunctionSpace>) -> Vec<usize> {
    let mut nodes: Vec<usize> = bcs
        .iter()
        .filter(|bc| Arc::ptr_eq(bc.space(), space))
        .flat_map(|bc| bc.nodes().iter().copied())
        .collect();
    nodes.sort_unstable();
    nodes.dedup();
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> Arc<FunctionSpace> {
        Arc::new(FunctionSpace::interval(4).unwrap())
    }

    #[test]
    fn homogenize_restore_and_set_value() {
        let v = space();
        let mut bc = DirichletBC::new(&v, 32.0, 1).unwrap();
        assert_eq!(bc.nodes(), &[0]);
        bc.homogenize();
        assert!(bc.is_homogeneous());
        bc.restore();
        assert_eq!(bc.value_at(0), 32.0);
        bc.set_value(7.0).unwrap();
        bc.homogenize();
        bc.restore();
        assert_eq!(bc.value(), &BcValue::Constant(7.0));
    }

    #[test]
    fn homogenize_leaves_function_untouched() {
        let v = space();
        let mut f = Function::new(&v);
        f.assign(10.0);
        let mut bc = DirichletBC::new(&v, &f, 2).unwrap();
        bc.homogenize();
        assert!(f.values().iter().all(|&x| x == 10.0));
        let mut u = vec![1.0; 5];
        bc.apply(&mut u).unwrap();
        assert_eq!(u, vec![1.0, 1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn unknown_marker_and_bad_lengths() {
        let v = space();
        assert!(matches!(DirichletBC::new(&v, 1.0, 9), Err(KError::UnknownBoundary(9))));
        assert!(DirichletBC::new(&v, BcValue::Function(vec![1.0; 2]), 1).is_err());
        let bc = DirichletBC::new(&v, 1.0, 1).unwrap();
        assert!(bc.apply(&mut [0.0; 3]).is_err());
    }

    #[test]
    fn constrained_nodes_filters_by_space() {
        let v = space();
        let q = space();
        let bcs = vec![
            DirichletBC::new(&v, 0.0, 2).unwrap(),
            DirichletBC::new(&q, 0.0, 1).unwrap(),
            DirichletBC::new(&v, 1.0, 1).unwrap(),
        ];
        assert_eq!(constrained_nodes(&bcs, &v), vec![0, 4]);
        assert_eq!(constrained_nodes(&bcs, &q), vec![0]);
    }
}
