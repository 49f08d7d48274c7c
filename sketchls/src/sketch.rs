//! The sketch controller: owns the geometry, the compiled system and the
//! engine buffers, and decides on each solve whether to rebuild or reuse.

use lm_faer::{Options, State, Stats, Workspace};

use crate::compiler::{CompiledProblem, SketchSystem, compile};
use crate::conflict::{ConflictEntry, ConflictReport};
use crate::constraints::Constraint;
use crate::error::Error;
use crate::id::{ArcId, CircleId, ConstraintId, LineId, PointId, ShapeId};
use crate::shapes::{Arc, Circle, Line, Shape, line};

/// Compiled system plus the engine state and buffers derived from it.
///
/// These three lifetimes must stay in lockstep, so they live and die
/// together.
struct SolverCache {
    problem: CompiledProblem,
    state: State,
    workspace: Workspace,
}

/// An editable 2D sketch: points, shapes, constraints, and the machinery to
/// solve them.
///
/// Edits are cheap and deferred. Adding points, shapes or constraints marks
/// the *structure* dirty, so the next [`solve`](Sketch::solve) recompiles
/// the system and reallocates the solver buffers. Moving a point with
/// [`set_point`](Sketch::set_point) marks only the *values* dirty: the next
/// solve mirrors the coordinates into the cached engine state and reuses
/// everything else, allocation-free. That split is what makes dragging a
/// point through a constrained sketch cheap.
#[derive(Default)]
pub struct Sketch {
    /// Parameter vector: two consecutive slots per point.
    params: Vec<f64>,
    shapes: Vec<Shape>,
    constraints: Vec<Constraint>,
    cache: Option<Box<SolverCache>>,
    structure_dirty: bool,
    value_dirty: bool,
}

impl Sketch {
    /// An empty sketch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a point at an initial guess position.
    pub fn add_point(&mut self, x: f64, y: f64) -> PointId {
        let id = PointId(self.params.len() / 2);
        self.params.push(x);
        self.params.push(y);
        self.structure_dirty = true;
        id
    }

    /// Current position of a point.
    pub fn point(&self, p: PointId) -> (f64, f64) {
        (self.params[p.slot_x()], self.params[p.slot_y()])
    }

    /// Number of points in the sketch.
    pub fn point_count(&self) -> usize {
        self.params.len() / 2
    }

    /// Move a point to a new position.
    ///
    /// Only the parameter values change; the compiled system and all solver
    /// buffers stay valid, and this call never allocates.
    pub fn set_point(&mut self, p: PointId, x: f64, y: f64) {
        self.params[p.slot_x()] = x;
        self.params[p.slot_y()] = y;
        self.value_dirty = true;
    }

    /// Add a shape.
    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        let idx = self.shapes.len();
        self.shapes.push(shape);
        self.structure_dirty = true;
        match shape {
            Shape::Line(_) => ShapeId::Line(LineId(idx)),
            Shape::Circle(_) => ShapeId::Circle(CircleId(idx)),
            Shape::Arc(_) => ShapeId::Arc(ArcId(idx)),
        }
    }

    /// Add a line segment between two points.
    pub fn add_line(&mut self, p0: PointId, p1: PointId) -> LineId {
        let idx = self.shapes.len();
        self.shapes.push(Shape::Line(Line { p0, p1 }));
        self.structure_dirty = true;
        LineId(idx)
    }

    /// Add a circle centered at `center`, passing through `rim`.
    pub fn add_circle(&mut self, center: PointId, rim: PointId) -> CircleId {
        let idx = self.shapes.len();
        self.shapes.push(Shape::Circle(Circle { center, rim }));
        self.structure_dirty = true;
        CircleId(idx)
    }

    /// Add an arc. Arcs contribute no residuals of their own; see
    /// [`Arc`] for how to constrain one.
    pub fn add_arc(&mut self, center: PointId, start: PointId, end: PointId) -> ArcId {
        let idx = self.shapes.len();
        self.shapes.push(Shape::Arc(Arc { center, start, end }));
        self.structure_dirty = true;
        ArcId(idx)
    }

    /// Add a constraint, applying degeneracy rewrites first.
    ///
    /// Returns `None` when the rewrites drop the constraint entirely (an
    /// axis constraint on a zero-length line, or a point coinciding with
    /// itself, is already satisfied and would only add rank-deficient rows).
    pub fn add_constraint(&mut self, constraint: Constraint) -> Option<ConstraintId> {
        self.structure_dirty = true;
        let constraint = self.rewrite_degenerate(constraint)?;
        let id = ConstraintId(self.constraints.len());
        self.constraints.push(constraint);
        Some(id)
    }

    /// Degeneracy rewrites, applied before a constraint is stored.
    ///
    /// An axis or normal constraint on a zero-length line (both endpoints
    /// are the same point) downgrades to a coincidence of the endpoints; a
    /// parallel constraint with a degenerate line keeps only the
    /// degenerate-line coincidences. Every such coincidence is a
    /// self-coincidence, and `Coincident(p, p)` is dropped, so the chain
    /// bottoms out at `None`.
    fn rewrite_degenerate(&self, constraint: Constraint) -> Option<Constraint> {
        let degenerate = |l: LineId| {
            let l = line(&self.shapes, l);
            l.p0 == l.p1
        };
        match constraint {
            Constraint::Coincident(a, b) if a == b => None,
            Constraint::Horizontal(l) | Constraint::Vertical(l) | Constraint::Normal(_, l)
                if degenerate(l) =>
            {
                let l = line(&self.shapes, l);
                self.rewrite_degenerate(Constraint::Coincident(l.p0, l.p1))
            }
            Constraint::Parallel(la, lb) if degenerate(la) || degenerate(lb) => {
                // Only the degenerate line's coincidence survives, and it is
                // a self-coincidence.
                None
            }
            other => Some(other),
        }
    }

    /// Number of stored constraints (after degeneracy rewrites).
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Solve the sketch, updating every point position in place.
    ///
    /// Recompiles and reallocates only if the structure changed since the
    /// last solve; after a pure [`set_point`](Sketch::set_point) edit the
    /// compiled system, symbolic factorization and all buffers are reused.
    ///
    /// Non-convergence is not an error: inspect
    /// [`Stats::status`](lm_faer::Stats) and
    /// [`conflicts`](Sketch::conflicts).
    pub fn solve(&mut self, options: &Options) -> Result<Stats, Error> {
        if self.structure_dirty || self.cache.is_none() {
            let problem = compile(&self.shapes, &self.constraints, self.params.len())?;
            let (state, workspace) = {
                let system = SketchSystem {
                    shapes: &self.shapes,
                    constraints: &self.constraints,
                    compiled: &problem,
                };
                lm_faer::initialize(&system, &self.params, options)?
            };
            self.cache = Some(Box::new(SolverCache {
                problem,
                state,
                workspace,
            }));
            self.structure_dirty = false;
            self.value_dirty = false;
        } else if self.value_dirty {
            if let Some(cache) = self.cache.as_mut() {
                cache.state.x.copy_from_slice(&self.params);
            }
            self.value_dirty = false;
        }

        let Some(cache) = self.cache.as_deref_mut() else {
            unreachable!("solve compiles before iterating");
        };
        let system = SketchSystem {
            shapes: &self.shapes,
            constraints: &self.constraints,
            compiled: &cache.problem,
        };
        let stats = lm_faer::solve(&mut cache.state, &system, &mut cache.workspace, options)?;
        self.params.copy_from_slice(&cache.state.x);
        Ok(stats)
    }

    /// Whether the solved sketch still violates its constraints.
    pub fn has_conflict(&self, stats: &Stats, tol: f64) -> bool {
        stats.residual_norm() > tol
    }

    /// Report the constraints whose residual norm exceeds `tol`, worst
    /// first, at most `max_items` of them.
    ///
    /// Residuals are evaluated at the current point positions, so the
    /// report is valid straight after a [`set_point`](Sketch::set_point)
    /// too. Fails if the structure changed since the last solve, because
    /// constraint rows have not been assigned yet.
    pub fn conflicts(&self, tol: f64, max_items: usize) -> Result<ConflictReport, Error> {
        if self.structure_dirty || self.cache.is_none() {
            return Err(Error::StructureDirty);
        }

        let mut entries = Vec::new();
        let mut total_sq = 0.0;
        for (i, constraint) in self.constraints.iter().enumerate() {
            let (mut r0, mut r1) = (0.0, 0.0);
            constraint.residual(&self.shapes, &self.params, &mut r0, &mut r1);
            let norm_sq = if constraint.rows() == 2 {
                r0 * r0 + r1 * r1
            } else {
                r0 * r0
            };
            total_sq += norm_sq;
            let residual_norm = norm_sq.sqrt();
            if residual_norm > tol {
                entries.push(ConflictEntry {
                    constraint: ConstraintId(i),
                    kind: constraint.kind(),
                    residual_norm,
                });
            }
        }
        entries.sort_by(|a, b| b.residual_norm.total_cmp(&a.residual_norm));
        entries.truncate(max_items);

        let residual_norm = total_sq.sqrt();
        Ok(ConflictReport {
            residual_norm,
            conflicted: residual_norm > tol,
            entries,
        })
    }

    #[cfg(test)]
    pub(crate) fn flags(&self) -> (bool, bool) {
        (self.structure_dirty, self.value_dirty)
    }

    #[cfg(test)]
    pub(crate) fn compiled_addr(&self) -> Option<*const ()> {
        self.cache
            .as_ref()
            .map(|cache| &cache.problem as *const CompiledProblem as *const ())
    }
}
