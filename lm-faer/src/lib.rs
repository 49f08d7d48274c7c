#![doc = include_str!("../README.md")]

use faer::sparse::SymbolicSparseColMat;

mod linalg;
mod solver;

pub use solver::{State, Workspace, initialize, solve};

/// A nonlinear least-squares problem with a fixed Jacobian sparsity pattern.
///
/// The engine minimizes `½‖r(x)‖²`. Implementors promise that:
/// - [`residual`](Self::residual) writes exactly `n_residuals` values,
/// - [`jacobian`](Self::jacobian) writes values consistent with
///   [`jacobian_pattern`](Self::jacobian_pattern), in CSC (column-major)
///   order,
/// - the pattern never changes for the lifetime of a
///   [`State`]/[`Workspace`] pair built from it.
pub trait LeastSquaresSystem {
    /// Number of parameters (columns of the Jacobian).
    fn n_params(&self) -> usize;

    /// Number of residuals (rows of the Jacobian).
    fn n_residuals(&self) -> usize;

    /// The fixed structural nonzeroes of the Jacobian.
    fn jacobian_pattern(&self) -> &SymbolicSparseColMat<usize>;

    /// Evaluate the residual vector at `x`, writing into `out`.
    fn residual(&self, x: &[f64], out: &mut [f64]);

    /// Evaluate the Jacobian at `x`, writing into the CSC value array.
    ///
    /// `nzval[i]` corresponds to the `i`-th structural nonzero of the
    /// pattern. Entries the system does not write must be zeroed by the
    /// implementor (the engine reuses the buffer between iterations).
    fn jacobian(&self, x: &[f64], nzval: &mut [f64]);
}

/// Tuning knobs for the Levenberg-Marquardt loop.
///
/// The defaults suit interactive geometry problems; for latency-sensitive
/// callers the main lever is [`with_max_iters`](Options::with_max_iters).
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// Iteration cap. Exhausting it is reported via
    /// [`Status::MaxIters`], not as an error.
    pub max_iters: usize,
    /// Absolute residual-norm tolerance.
    pub atol: f64,
    /// Residual-norm tolerance relative to the initial residual norm.
    pub rtol: f64,
    /// Infinity-norm gradient tolerance.
    pub gtol: f64,
    /// Terminate when the proposed step is shorter than this.
    pub step_tol: f64,
    /// Initial damping parameter λ.
    pub lambda_init: f64,
    /// Lower clamp for λ. Keeping this positive guarantees the augmented
    /// matrix has full column rank, so QR cannot break down.
    pub lambda_min: f64,
    /// Upper clamp for λ.
    pub lambda_max: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_iters: 50,
            atol: 1e-8,
            rtol: 1e-8,
            gtol: 1e-8,
            step_tol: 1e-12,
            lambda_init: 1e-3,
            lambda_min: 1e-12,
            lambda_max: 1e12,
        }
    }
}

impl Options {
    /// Cap the number of iterations (e.g. to bound per-frame latency).
    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Start damping from a different λ.
    pub fn with_lambda_init(mut self, lambda_init: f64) -> Self {
        self.lambda_init = lambda_init;
        self
    }
}

/// How a solve terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Gradient or residual tolerance met.
    Converged,
    /// The proposed step fell below `step_tol`; the previous iterate is
    /// kept. For inconsistent systems this is the usual way of landing on
    /// the least-squares minimizer.
    StepTol,
    /// Iteration budget exhausted without meeting a tolerance.
    MaxIters,
}

/// Outcome of one [`solve`] call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stats {
    /// Completed outer iterations (accepted or rejected).
    pub iters: usize,
    /// Final `½‖r‖²`.
    pub cost: f64,
    /// Final `‖Jᵀr‖∞`.
    pub grad_norm: f64,
    /// Length of the last step solved (zero if no step was attempted).
    pub step_norm: f64,
    /// Termination reason.
    pub status: Status,
}

impl Stats {
    /// The residual norm `‖r‖ = √(2·cost)`.
    pub fn residual_norm(&self) -> f64 {
        (2.0 * self.cost).sqrt()
    }
}

/// Errors from problem setup or the sparse factorization.
///
/// Numerical non-convergence is deliberately *not* represented here; it is
/// reported through [`Stats::status`] so callers can inspect residuals.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// The initial guess does not have one entry per parameter.
    #[error("the system has {expected} parameters but the initial guess has {actual}")]
    DimensionMismatch {
        /// Parameter count declared by the system.
        expected: usize,
        /// Length of the guess that was supplied.
        actual: usize,
    },
    /// A problem with zero residuals or zero parameters.
    #[error("cannot solve an empty system ({m} residuals, {n} parameters)")]
    EmptyProblem {
        /// Residual count.
        m: usize,
        /// Parameter count.
        n: usize,
    },
    /// The Jacobian pattern does not have `n_residuals × n_params` shape.
    #[error(
        "the Jacobian pattern is {pattern_rows}x{pattern_cols} but the system declares {m}x{n}"
    )]
    PatternMismatch {
        /// Pattern row count.
        pattern_rows: usize,
        /// Pattern column count.
        pattern_cols: usize,
        /// Declared residual count.
        m: usize,
        /// Declared parameter count.
        n: usize,
    },
    /// The workspace was built for a different structure than the system
    /// presented to [`solve`].
    #[error("workspace does not match the system; re-run initialize after a structural change")]
    StaleWorkspace,
    /// Faer: could not create a sparse matrix structure.
    #[error("could not create matrix: {0}")]
    Matrix(#[from] faer::sparse::CreationError),
    /// Faer: sparse QR factorization failed.
    #[error("sparse QR factorization failed")]
    Factorization(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}
