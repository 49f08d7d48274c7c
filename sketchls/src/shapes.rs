//! Geometric shapes that can be constrained and solved.
//!
//! Shapes carry only point ids; all geometry lives in the sketch's
//! parameter vector.

use crate::id::{CircleId, LineId, PointId};

/// Finite segment of a line, one point at each end.
#[derive(Clone, Copy, Debug)]
pub struct Line {
    /// Point at one end of the line.
    pub p0: PointId,
    /// Point at the other end.
    pub p1: PointId,
}

/// A circle through `rim`, centered at `center`.
///
/// The radius is implicit: `‖rim − center‖`.
#[derive(Clone, Copy, Debug)]
pub struct Circle {
    /// Center of the circle.
    pub center: PointId,
    /// A point on the perimeter.
    pub rim: PointId,
}

/// Arc on the perimeter of a circle, implied by its three points.
///
/// Arcs are geometric declarations only: they contribute no residuals.
/// To keep an arc well-formed under solving, constrain its points
/// explicitly (e.g. [`Distance`](crate::Constraint::Distance) from each
/// end to the center, or [`OnCircle`](crate::Constraint::OnCircle)).
#[derive(Clone, Copy, Debug)]
pub struct Arc {
    /// Center of the arc's circle.
    pub center: PointId,
    /// Start point of the arc.
    pub start: PointId,
    /// End point of the arc.
    pub end: PointId,
}

/// Tagged shape record, stored contiguously in the sketch's shape list.
#[derive(Clone, Copy, Debug)]
pub enum Shape {
    /// A line segment.
    Line(Line),
    /// A circle.
    Circle(Circle),
    /// A circular arc.
    Arc(Arc),
}

/// Resolve a line handle.
///
/// `LineId`s are only minted for `Shape::Line` entries, so the lookup
/// cannot miss.
pub(crate) fn line(shapes: &[Shape], id: LineId) -> Line {
    match shapes[id.0] {
        Shape::Line(l) => l,
        _ => unreachable!("shape {} is not a line", id.0),
    }
}

/// Resolve a circle handle.
pub(crate) fn circle(shapes: &[Shape], id: CircleId) -> Circle {
    match shapes[id.0] {
        Shape::Circle(c) => c,
        _ => unreachable!("shape {} is not a circle", id.0),
    }
}
