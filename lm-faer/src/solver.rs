use faer::Mat;
use faer::sparse::{Pair, SparseColMatRef, SymbolicSparseColMat};

use crate::{EngineError, LeastSquaresSystem, Options, Stats, Status, linalg::SparseQr};

/// The engine's view of the current iterate.
///
/// Callers mirror their parameter vector into [`x`](State::x) before a
/// warm-started solve and read the converged values back out afterwards.
#[derive(Debug)]
pub struct State {
    /// Current parameter estimate, updated in place by [`solve`].
    pub x: Vec<f64>,
}

/// Every buffer the LM loop touches, allocated once per structure.
///
/// Reusable across [`solve`] calls for as long as the system's Jacobian
/// pattern is unchanged; a structural change requires a fresh
/// [`initialize`].
#[derive(Debug)]
pub struct Workspace {
    /// Structure of the augmented matrix `[J; √λ·I]`, `(m+n)×n`.
    aug_sym: SymbolicSparseColMat<usize>,
    /// Value array of the augmented matrix.
    aug_vals: Vec<f64>,
    /// Position of each column's diagonal `√λ` entry in `aug_vals`.
    diag_idx: Vec<usize>,
    /// Value array of the Jacobian itself, matching the system's pattern.
    jac_vals: Vec<f64>,
    r: Vec<f64>,
    r_trial: Vec<f64>,
    /// Gradient `g = Jᵀr`.
    g: Vec<f64>,
    step: Vec<f64>,
    x_trial: Vec<f64>,
    /// Right-hand side `[−r; 0]` of length `m+n`; the QR least-squares
    /// solve leaves the step in its top `n` rows.
    rhs: Mat<f64>,
    qr: SparseQr,
}

/// Validate the system, allocate all solver buffers, and build the
/// augmented structure and its symbolic QR.
///
/// The returned pair may be reused across any number of [`solve`] calls as
/// long as the system's Jacobian pattern is unchanged.
pub fn initialize<S: LeastSquaresSystem>(
    system: &S,
    x0: &[f64],
    _options: &Options,
) -> Result<(State, Workspace), EngineError> {
    let n = system.n_params();
    let m = system.n_residuals();
    if m == 0 || n == 0 {
        return Err(EngineError::EmptyProblem { m, n });
    }
    if x0.len() != n {
        return Err(EngineError::DimensionMismatch {
            expected: n,
            actual: x0.len(),
        });
    }
    let pattern = system.jacobian_pattern();
    if pattern.nrows() != m || pattern.ncols() != n {
        return Err(EngineError::PatternMismatch {
            pattern_rows: pattern.nrows(),
            pattern_cols: pattern.ncols(),
            m,
            n,
        });
    }

    // The augmented structure is the Jacobian pattern with one extra
    // diagonal entry per column at row m+col. Row indices within a CSC
    // column are sorted and every Jacobian row index is < m, so each
    // column's diagonal entry compresses to the last slot of that column.
    let colptr = pattern.col_ptr();
    let rowval = pattern.row_idx();
    let nnz = colptr[n];
    let mut cells = Vec::with_capacity(nnz + n);
    for col in 0..n {
        for idx in colptr[col]..colptr[col + 1] {
            cells.push(Pair {
                row: rowval[idx],
                col,
            });
        }
        cells.push(Pair { row: m + col, col });
    }
    let (aug_sym, _) = SymbolicSparseColMat::try_new_from_indices(m + n, n, &cells)?;
    let diag_idx: Vec<usize> = (0..n).map(|col| aug_sym.col_ptr()[col + 1] - 1).collect();
    let aug_nnz = aug_sym.col_ptr()[n];
    let qr = SparseQr::new(&aug_sym)?;

    let state = State { x: x0.to_vec() };
    let workspace = Workspace {
        aug_sym,
        aug_vals: vec![0.0; aug_nnz],
        diag_idx,
        jac_vals: vec![0.0; nnz],
        r: vec![0.0; m],
        r_trial: vec![0.0; m],
        g: vec![0.0; n],
        step: vec![0.0; n],
        x_trial: vec![0.0; n],
        rhs: Mat::zeros(m + n, 1),
        qr,
    };
    Ok((state, workspace))
}

/// Run the damped least-squares loop until a tolerance, a vanishing step,
/// or the iteration cap. Updates `state.x` in place and reports the
/// outcome as [`Stats`]; only a factorization breakdown is an `Err`.
pub fn solve<S: LeastSquaresSystem>(
    state: &mut State,
    system: &S,
    ws: &mut Workspace,
    options: &Options,
) -> Result<Stats, EngineError> {
    let n = system.n_params();
    let m = system.n_residuals();
    let pattern = system.jacobian_pattern();
    if state.x.len() != n
        || ws.g.len() != n
        || ws.r.len() != m
        || ws.jac_vals.len() != pattern.col_ptr()[n]
    {
        return Err(EngineError::StaleWorkspace);
    }

    system.residual(&state.x, &mut ws.r);
    system.jacobian(&state.x, &mut ws.jac_vals);
    let mut cost = half_norm_squared(&ws.r);
    let r_norm_0 = (2.0 * cost).sqrt();
    gradient(pattern, &ws.jac_vals, &ws.r, &mut ws.g);
    let mut grad_norm = inf_norm(&ws.g);
    let mut lambda = options
        .lambda_init
        .max(options.lambda_min)
        .min(options.lambda_max);
    let mut iters = 0;
    let mut step_norm = 0.0;

    loop {
        if grad_norm <= options.gtol
            || (2.0 * cost).sqrt() <= options.atol + options.rtol * r_norm_0
        {
            return Ok(Stats {
                iters,
                cost,
                grad_norm,
                step_norm,
                status: Status::Converged,
            });
        }
        if iters >= options.max_iters {
            return Ok(Stats {
                iters,
                cost,
                grad_norm,
                step_norm,
                status: Status::MaxIters,
            });
        }

        // Assemble [J; √λ·I] and [−r; 0] into the fixed structure.
        let sqrt_lambda = lambda.sqrt();
        let jac_colptr = pattern.col_ptr();
        let aug_colptr = ws.aug_sym.col_ptr();
        for col in 0..n {
            let (lo, hi) = (jac_colptr[col], jac_colptr[col + 1]);
            let dst = aug_colptr[col];
            ws.aug_vals[dst..dst + (hi - lo)].copy_from_slice(&ws.jac_vals[lo..hi]);
            ws.aug_vals[ws.diag_idx[col]] = sqrt_lambda;
        }
        for (i, &ri) in ws.r.iter().enumerate() {
            ws.rhs[(i, 0)] = -ri;
        }
        for i in 0..n {
            ws.rhs[(m + i, 0)] = 0.0;
        }

        let a = SparseColMatRef::new(ws.aug_sym.as_ref(), &ws.aug_vals);
        ws.qr.solve_lstsq_in_place(a, ws.rhs.as_mut())?;
        for (i, si) in ws.step.iter_mut().enumerate() {
            *si = ws.rhs[(i, 0)];
        }
        step_norm = l2_norm(&ws.step);

        // An infinitesimal step terminates with the previous iterate intact.
        if step_norm <= options.step_tol {
            return Ok(Stats {
                iters,
                cost,
                grad_norm,
                step_norm,
                status: Status::StepTol,
            });
        }

        for ((xt, &xi), &si) in ws.x_trial.iter_mut().zip(&state.x).zip(&ws.step) {
            *xt = xi + si;
        }
        system.residual(&ws.x_trial, &mut ws.r_trial);
        let cost_trial = half_norm_squared(&ws.r_trial);

        // Quadratic model's predicted cost decrease for this step.
        let pred = 0.5
            * ws.step
                .iter()
                .zip(&ws.g)
                .map(|(&si, &gi)| si * (lambda * si - gi))
                .sum::<f64>();

        iters += 1;

        if pred <= 0.0 {
            lambda = (2.0 * lambda).min(options.lambda_max);
            continue;
        }
        let rho = (cost - cost_trial) / pred;

        if cost_trial < cost {
            // Accept: promote the trial buffers and refresh the gradient.
            std::mem::swap(&mut state.x, &mut ws.x_trial);
            std::mem::swap(&mut ws.r, &mut ws.r_trial);
            system.jacobian(&state.x, &mut ws.jac_vals);
            gradient(pattern, &ws.jac_vals, &ws.r, &mut ws.g);
            grad_norm = inf_norm(&ws.g);
            cost = cost_trial;

            if rho > 0.75 {
                lambda = (lambda / 2.0).max(options.lambda_min);
            } else if rho < 0.25 {
                lambda = (2.0 * lambda).min(options.lambda_max);
            }
        } else {
            // Equal cost rejects too; this prevents cycling on flat regions.
            lambda = (2.0 * lambda).min(options.lambda_max);
        }
    }
}

/// `g = Jᵀr` over the fixed CSC pattern.
fn gradient(pattern: &SymbolicSparseColMat<usize>, vals: &[f64], r: &[f64], g: &mut [f64]) {
    let colptr = pattern.col_ptr();
    let rowval = pattern.row_idx();
    for (col, gj) in g.iter_mut().enumerate() {
        let mut acc = 0.0;
        for idx in colptr[col]..colptr[col + 1] {
            acc += vals[idx] * r[rowval[idx]];
        }
        *gj = acc;
    }
}

fn half_norm_squared(v: &[f64]) -> f64 {
    0.5 * v.iter().map(|&x| x * x).sum::<f64>()
}

fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

fn inf_norm(v: &[f64]) -> f64 {
    v.iter().map(|&x| x.abs()).fold(0.0, f64::max)
}
