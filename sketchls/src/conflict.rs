//! Conflict reporting for over- and inconsistently-constrained sketches.

use crate::id::ConstraintId;

/// One constraint whose residual exceeds the caller's tolerance.
#[derive(Clone, Copy, Debug)]
pub struct ConflictEntry {
    /// Which constraint.
    pub constraint: ConstraintId,
    /// The constraint's kind tag (e.g. `"Fixed"`, `"Distance"`).
    pub kind: &'static str,
    /// Euclidean norm of the constraint's residual rows.
    pub residual_norm: f64,
}

/// How well the current point positions satisfy the constraint system.
///
/// Produced by [`Sketch::conflicts`](crate::Sketch::conflicts). A sketch
/// that converged with `conflicted = true` is consistent only in the
/// least-squares sense: some of its constraints contradict each other, and
/// `entries` names the worst offenders.
#[derive(Clone, Debug)]
pub struct ConflictReport {
    /// Norm of the full residual vector.
    pub residual_norm: f64,
    /// Whether `residual_norm` exceeds the tolerance the report was built
    /// with.
    pub conflicted: bool,
    /// Offending constraints, worst first, capped at the caller's
    /// `max_items`.
    pub entries: Vec<ConflictEntry>,
}
