/// All errors the sketch API can produce.
///
/// Inconsistent constraints are deliberately absent: they are a numerical
/// outcome, reported through [`Stats`](crate::Stats) and
/// [`conflicts`](crate::Sketch::conflicts), never an error.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Solving needs at least one point and one stored constraint.
    #[error("cannot solve an empty sketch; add at least one point and one constraint")]
    EmptySketch,
    /// The structure changed since the last compile, so cached residuals
    /// and row assignments are meaningless.
    #[error("the sketch structure changed since the last solve; call solve() first")]
    StructureDirty,
    /// Faer: could not create the Jacobian pattern.
    #[error("could not create the Jacobian pattern: {0}")]
    Pattern(#[from] faer::sparse::CreationError),
    /// The numerical engine failed (sparse QR breakdown or a stale
    /// workspace).
    #[error(transparent)]
    Engine(#[from] lm_faer::EngineError),
}
