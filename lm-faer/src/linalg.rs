use faer::{
    mat::MatMut,
    prelude::SolveLstsq,
    sparse::{
        SparseColMatRef, SymbolicSparseColMat,
        linalg::solvers::{Qr, SymbolicQr},
    },
};

use crate::EngineError;

/// Sparse QR least-squares solver with an amortized symbolic analysis.
///
/// The augmented matrix `[J; √λ·I]` keeps one structure for the lifetime of
/// a workspace, so the fill-reducing ordering and elimination analysis are
/// computed once here; each call to [`solve_lstsq_in_place`] only refreshes
/// the numeric factors.
///
/// [`solve_lstsq_in_place`]: SparseQr::solve_lstsq_in_place
#[derive(Debug)]
pub(crate) struct SparseQr {
    symbolic: SymbolicQr<usize>,
}

impl SparseQr {
    pub(crate) fn new(pattern: &SymbolicSparseColMat<usize>) -> Result<Self, EngineError> {
        let symbolic = SymbolicQr::try_new(pattern.as_ref())
            .map_err(|e| EngineError::Factorization(Box::new(e)))?;
        Ok(Self { symbolic })
    }

    /// Factorize `a` numerically and overwrite `rhs` with the least-squares
    /// solution. The solution occupies the top `a.ncols()` rows of `rhs`.
    pub(crate) fn solve_lstsq_in_place(
        &self,
        a: SparseColMatRef<'_, usize, f64>,
        mut rhs: MatMut<'_, f64>,
    ) -> Result<(), EngineError> {
        let qr = Qr::try_new_with_symbolic(self.symbolic.clone(), a)
            .map_err(|e| EngineError::Factorization(Box::new(e)))?;
        qr.solve_lstsq_in_place(rhs.as_mut());
        Ok(())
    }
}
