//! Convergence tracking & tolerance checks for iterative solvers.

/// Stopping criteria: relative and absolute residual tolerances plus an iteration cap.
#[derive(Clone, Debug)]
pub struct Convergence<T> {
    pub rtol: T,
    pub atol: T,
    pub max_iters: usize,
}

#[derive(Clone, Debug)]
pub struct SolveStats<T> {
    pub iterations: usize,
    pub final_residual: T,
    pub converged: bool,
}

impl<T: Copy + num_traits::Float> Convergence<T> {
    pub fn new(rtol: T, atol: T, max_iters: usize) -> Self {
        Self { rtol, atol, max_iters }
    }

    /// Whether `res_norm` meets either tolerance relative to the initial residual `res0_norm`.
    pub fn is_converged(&self, res_norm: T, res0_norm: T) -> bool {
        res_norm <= self.atol || res_norm <= self.rtol * res0_norm
    }

    /// Returns (should_stop, stats) given current `res_norm` and iteration `i`.
    pub fn check(&self, res_norm: T, res0_norm: T, i: usize) -> (bool, SolveStats<T>) {
        let converged = self.is_converged(res_norm, res0_norm);
        (
            converged || i >= self.max_iters,
            SolveStats { iterations: i, final_residual: res_norm, converged },
        )
    }
}
