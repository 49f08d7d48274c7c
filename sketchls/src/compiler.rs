//! Lowers the sketch's constraint list into a sparse least-squares system.
//!
//! Compilation assigns every constraint a contiguous block of residual rows
//! and, for every partial derivative it will emit, a precomputed index into
//! the CSC value array. At evaluation time the Jacobian is filled with O(1)
//! writes and no searching; the sparsity pattern never changes between
//! structural edits.

use faer::sparse::{Pair, SymbolicSparseColMat};
use lm_faer::LeastSquaresSystem;

use crate::constraints::{Constraint, MAX_PARTIALS};
use crate::error::Error;
use crate::shapes::Shape;

/// Rough structural-nonzero count per residual row, for preallocation.
const NONZEROES_PER_ROW: usize = 8;

/// The compiled form of a sketch's constraint list.
///
/// Valid until the next structural edit; the sketch caches it and all the
/// engine buffers derived from it.
#[derive(Debug)]
pub(crate) struct CompiledProblem {
    pub(crate) n_residuals: usize,
    pub(crate) n_params: usize,
    /// Union of every structural nonzero any constraint may write.
    pub(crate) pattern: SymbolicSparseColMat<usize>,
    /// First residual row of each constraint (prefix sum of row counts).
    pub(crate) row_offset: Vec<usize>,
    /// For each derivative a constraint declares, in declaration order, the
    /// index of its cell in the CSC value array.
    slot: Vec<usize>,
    /// Start of each constraint's range in `slot`; length is
    /// `constraints.len() + 1`.
    slot_offset: Vec<usize>,
}

pub(crate) fn compile(
    shapes: &[Shape],
    constraints: &[Constraint],
    n_params: usize,
) -> Result<CompiledProblem, Error> {
    if n_params == 0 || constraints.is_empty() {
        return Err(Error::EmptySketch);
    }

    let mut row_offset = Vec::with_capacity(constraints.len());
    let mut n_residuals = 0;
    for constraint in constraints {
        row_offset.push(n_residuals);
        n_residuals += constraint.rows();
    }

    // Walk every constraint's declared slots once, remembering the exact
    // declaration order; the same walk happens again below to resolve each
    // declared cell to its position in the compressed pattern.
    let mut declared: Vec<(usize, usize)> = Vec::with_capacity(n_residuals * NONZEROES_PER_ROW);
    let mut slot_offset = Vec::with_capacity(constraints.len() + 1);
    let mut row0 = Vec::with_capacity(NONZEROES_PER_ROW);
    let mut row1 = Vec::with_capacity(NONZEROES_PER_ROW);
    for (i, constraint) in constraints.iter().enumerate() {
        slot_offset.push(declared.len());
        row0.clear();
        row1.clear();
        constraint.nonzeroes(shapes, &mut row0, &mut row1);
        for &col in &row0 {
            declared.push((row_offset[i], col));
        }
        for &col in &row1 {
            declared.push((row_offset[i] + 1, col));
        }
    }
    slot_offset.push(declared.len());

    // Compress the declared cells into the CSC pattern. Constraints whose
    // entities share a point declare the same cell more than once, so the
    // cell list must be deduplicated before compression; the duplicate
    // declarations then resolve to the same slot and their values sum.
    let mut cells: Vec<Pair<usize, usize>> = declared
        .iter()
        .map(|&(row, col)| Pair { row, col })
        .collect();
    cells.sort_unstable_by_key(|cell| (cell.col, cell.row));
    cells.dedup_by_key(|cell| (cell.col, cell.row));
    let (pattern, _) = SymbolicSparseColMat::try_new_from_indices(n_residuals, n_params, &cells)?;

    let colptr = pattern.col_ptr();
    let rowval = pattern.row_idx();
    let slot = declared
        .iter()
        .map(|&(row, col)| {
            let lo = colptr[col];
            let hi = colptr[col + 1];
            lo + rowval[lo..hi]
                .binary_search(&row)
                .expect("declared nonzero must exist in the compiled pattern")
        })
        .collect();

    Ok(CompiledProblem {
        n_residuals,
        n_params,
        pattern,
        row_offset,
        slot,
        slot_offset,
    })
}

impl CompiledProblem {
    /// Slot range belonging to constraint `i`.
    fn slots(&self, i: usize) -> &[usize] {
        &self.slot[self.slot_offset[i]..self.slot_offset[i + 1]]
    }
}

/// Borrowed view of a sketch presented to the engine.
///
/// The evaluators read the shape and constraint lists but never mutate
/// them; the engine owns the iteration buffers separately.
pub(crate) struct SketchSystem<'a> {
    pub(crate) shapes: &'a [Shape],
    pub(crate) constraints: &'a [Constraint],
    pub(crate) compiled: &'a CompiledProblem,
}

impl LeastSquaresSystem for SketchSystem<'_> {
    fn n_params(&self) -> usize {
        self.compiled.n_params
    }

    fn n_residuals(&self) -> usize {
        self.compiled.n_residuals
    }

    fn jacobian_pattern(&self) -> &SymbolicSparseColMat<usize> {
        &self.compiled.pattern
    }

    fn residual(&self, x: &[f64], out: &mut [f64]) {
        out.fill(0.0);
        for (i, constraint) in self.constraints.iter().enumerate() {
            let (mut r0, mut r1) = (0.0, 0.0);
            constraint.residual(self.shapes, x, &mut r0, &mut r1);
            let offset = self.compiled.row_offset[i];
            out[offset] = r0;
            if constraint.rows() == 2 {
                out[offset + 1] = r1;
            }
        }
    }

    fn jacobian(&self, x: &[f64], nzval: &mut [f64]) {
        nzval.fill(0.0);
        let mut partials = [0.0; MAX_PARTIALS];
        for (i, constraint) in self.constraints.iter().enumerate() {
            let count = constraint.partials(self.shapes, x, &mut partials);
            let slots = self.compiled.slots(i);
            debug_assert_eq!(
                count,
                slots.len(),
                "constraint {} emitted {count} derivatives for {} declared slots",
                constraint.kind(),
                slots.len(),
            );
            for (&slot, &value) in slots.iter().zip(&partials[..count]) {
                // Accumulate: entities sharing a point declare a cell twice.
                nzval[slot] += value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{LineId, PointId};
    use crate::shapes::Line;

    #[test]
    fn rows_and_pattern_have_expected_shape() {
        let (p0, p1) = (PointId(0), PointId(1));
        let shapes = vec![Shape::Line(Line { p0, p1 })];
        let constraints = vec![
            Constraint::Fixed(p0, 0.0, 0.0),
            Constraint::Horizontal(LineId(0)),
            Constraint::Distance(p0, p1, 2.0),
        ];
        let compiled = compile(&shapes, &constraints, 4).unwrap();

        assert_eq!(compiled.n_residuals, 4);
        assert_eq!(compiled.row_offset, vec![0, 2, 3]);
        assert_eq!(compiled.pattern.nrows(), 4);
        assert_eq!(compiled.pattern.ncols(), 4);
        // Fixed touches 2 cells, Horizontal 2, Distance 4.
        assert_eq!(compiled.pattern.col_ptr()[4], 8);
    }

    #[test]
    fn shared_point_cells_are_merged_in_the_pattern() {
        let (p0, p1, p2) = (PointId(0), PointId(1), PointId(2));
        let shapes = vec![
            Shape::Line(Line { p0, p1 }),
            Shape::Line(Line { p0: p1, p1: p2 }),
        ];
        let constraints = vec![Constraint::Parallel(LineId(0), LineId(1))];
        let compiled = compile(&shapes, &constraints, 6).unwrap();

        // 8 declared slots, but the shared endpoint's two cells merge.
        assert_eq!(compiled.slots(0).len(), 8);
        assert_eq!(compiled.pattern.col_ptr()[6], 6);
    }

    #[test]
    fn empty_sketch_does_not_compile() {
        let err = compile(&[], &[], 0).unwrap_err();
        assert!(matches!(err, Error::EmptySketch));

        let err = compile(&[], &[], 4).unwrap_err();
        assert!(matches!(err, Error::EmptySketch));
    }
}
