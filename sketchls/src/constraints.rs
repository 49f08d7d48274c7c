//! Each kind of geometric constraint we support, and the residual and
//! Jacobian contributions it makes to the compiled system.

use crate::id::{CircleId, LineId, PointId};
use crate::shapes::{Shape, circle, line};

/// Most derivatives a single constraint emits across all its rows.
pub(crate) const MAX_PARTIALS: usize = 8;

/// A geometric constraint between sketch entities.
///
/// Each variant lowers to a fixed number of residual rows (one or two) with
/// a fixed set of structural Jacobian nonzeroes, so the whole constraint
/// list compiles to one sparse pattern that is stable until the sketch's
/// structure changes.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub enum Constraint {
    /// Pin a point to the given coordinates.
    Fixed(PointId, f64, f64),
    /// Two points at the same location.
    Coincident(PointId, PointId),
    /// The line's endpoints share a y value.
    Horizontal(LineId),
    /// The line's endpoints share an x value.
    Vertical(LineId),
    /// The two lines have parallel directions.
    Parallel(LineId, LineId),
    /// The two points are a given distance apart.
    Distance(PointId, PointId, f64),
    /// The circle has a given diameter.
    Diameter(CircleId, f64),
    /// The line is normal to the circle, i.e. its direction passes through
    /// the circle's center.
    Normal(CircleId, LineId),
    /// The point lies on the circle's perimeter.
    OnCircle(CircleId, PointId),
}

#[inline(always)]
fn xy(x: &[f64], p: PointId) -> (f64, f64) {
    (x[p.slot_x()], x[p.slot_y()])
}

impl Constraint {
    /// How many residual rows this constraint contributes.
    pub fn rows(&self) -> usize {
        match self {
            Constraint::Fixed(..) | Constraint::Coincident(..) => 2,
            Constraint::Horizontal(..)
            | Constraint::Vertical(..)
            | Constraint::Parallel(..)
            | Constraint::Distance(..)
            | Constraint::Diameter(..)
            | Constraint::Normal(..)
            | Constraint::OnCircle(..) => 1,
        }
    }

    /// Human-readable constraint name, used in conflict reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Constraint::Fixed(..) => "Fixed",
            Constraint::Coincident(..) => "Coincident",
            Constraint::Horizontal(..) => "Horizontal",
            Constraint::Vertical(..) => "Vertical",
            Constraint::Parallel(..) => "Parallel",
            Constraint::Distance(..) => "Distance",
            Constraint::Diameter(..) => "Diameter",
            Constraint::Normal(..) => "Normal",
            Constraint::OnCircle(..) => "OnCircle",
        }
    }

    /// Parameter slots each of this constraint's rows may touch.
    ///
    /// The order in which slots are appended here is a contract shared with
    /// [`partials`](Self::partials): the k-th appended slot (row 0 first,
    /// then row 1) receives the k-th emitted derivative.
    pub(crate) fn nonzeroes(
        &self,
        shapes: &[Shape],
        row0: &mut Vec<usize>,
        row1: &mut Vec<usize>,
    ) {
        match *self {
            Constraint::Fixed(p, _, _) => {
                row0.push(p.slot_x());
                row1.push(p.slot_y());
            }
            Constraint::Coincident(a, b) => {
                row0.extend([a.slot_x(), b.slot_x()]);
                row1.extend([a.slot_y(), b.slot_y()]);
            }
            Constraint::Horizontal(l) => {
                let l = line(shapes, l);
                row0.extend([l.p0.slot_y(), l.p1.slot_y()]);
            }
            Constraint::Vertical(l) => {
                let l = line(shapes, l);
                row0.extend([l.p0.slot_x(), l.p1.slot_x()]);
            }
            Constraint::Parallel(la, lb) => {
                let (la, lb) = (line(shapes, la), line(shapes, lb));
                row0.extend([
                    la.p0.slot_x(),
                    la.p0.slot_y(),
                    la.p1.slot_x(),
                    la.p1.slot_y(),
                    lb.p0.slot_x(),
                    lb.p0.slot_y(),
                    lb.p1.slot_x(),
                    lb.p1.slot_y(),
                ]);
            }
            Constraint::Distance(a, b, _) => {
                row0.extend([a.slot_x(), a.slot_y(), b.slot_x(), b.slot_y()]);
            }
            Constraint::Diameter(c, _) => {
                let c = circle(shapes, c);
                row0.extend([
                    c.center.slot_x(),
                    c.center.slot_y(),
                    c.rim.slot_x(),
                    c.rim.slot_y(),
                ]);
            }
            Constraint::Normal(c, l) => {
                let (c, l) = (circle(shapes, c), line(shapes, l));
                row0.extend([
                    l.p0.slot_x(),
                    l.p0.slot_y(),
                    l.p1.slot_x(),
                    l.p1.slot_y(),
                    c.center.slot_x(),
                    c.center.slot_y(),
                ]);
            }
            Constraint::OnCircle(c, p) => {
                let c = circle(shapes, c);
                row0.extend([
                    c.center.slot_x(),
                    c.center.slot_y(),
                    c.rim.slot_x(),
                    c.rim.slot_y(),
                    p.slot_x(),
                    p.slot_y(),
                ]);
            }
        }
    }

    /// Evaluate this constraint's residual rows at `x`.
    ///
    /// `r1` is only written by the two-row kinds ([`Fixed`](Self::Fixed)
    /// and [`Coincident`](Self::Coincident)).
    pub(crate) fn residual(&self, shapes: &[Shape], x: &[f64], r0: &mut f64, r1: &mut f64) {
        match *self {
            Constraint::Fixed(p, x0, y0) => {
                let (px, py) = xy(x, p);
                *r0 = px - x0;
                *r1 = py - y0;
            }
            Constraint::Coincident(a, b) => {
                let (ax, ay) = xy(x, a);
                let (bx, by) = xy(x, b);
                *r0 = ax - bx;
                *r1 = ay - by;
            }
            Constraint::Horizontal(l) => {
                let l = line(shapes, l);
                *r0 = x[l.p0.slot_y()] - x[l.p1.slot_y()];
            }
            Constraint::Vertical(l) => {
                let l = line(shapes, l);
                *r0 = x[l.p0.slot_x()] - x[l.p1.slot_x()];
            }
            Constraint::Parallel(la, lb) => {
                let (la, lb) = (line(shapes, la), line(shapes, lb));
                let (x1, y1) = xy(x, la.p0);
                let (x2, y2) = xy(x, la.p1);
                let (x3, y3) = xy(x, lb.p0);
                let (x4, y4) = xy(x, lb.p1);
                // Cross product of the two direction vectors.
                *r0 = (x2 - x1) * (y4 - y3) - (y2 - y1) * (x4 - x3);
            }
            Constraint::Distance(a, b, d) => {
                let (ax, ay) = xy(x, a);
                let (bx, by) = xy(x, b);
                let (dx, dy) = (ax - bx, ay - by);
                // Squared form: polynomial residual, no singular derivative
                // when the points coincide.
                *r0 = dx * dx + dy * dy - d * d;
            }
            Constraint::Diameter(c, d) => {
                let c = circle(shapes, c);
                let (ox, oy) = xy(x, c.center);
                let (mx, my) = xy(x, c.rim);
                let (dx, dy) = (ox - mx, oy - my);
                let r = d / 2.0;
                *r0 = dx * dx + dy * dy - r * r;
            }
            Constraint::Normal(c, l) => {
                let (c, l) = (circle(shapes, c), line(shapes, l));
                let (x1, y1) = xy(x, l.p0);
                let (x2, y2) = xy(x, l.p1);
                let (cx, cy) = xy(x, c.center);
                // Line direction crossed with the endpoint-to-center vector:
                // zero exactly when the line's carrier passes through the
                // center.
                *r0 = (x2 - x1) * (cy - y1) - (y2 - y1) * (cx - x1);
            }
            Constraint::OnCircle(c, p) => {
                let c = circle(shapes, c);
                let (ox, oy) = xy(x, c.center);
                let (mx, my) = xy(x, c.rim);
                let (px, py) = xy(x, p);
                let point_sq = (px - ox).powi(2) + (py - oy).powi(2);
                let radius_sq = (mx - ox).powi(2) + (my - oy).powi(2);
                *r0 = point_sq - radius_sq;
            }
        }
    }

    /// Evaluate this constraint's partial derivatives at `x`.
    ///
    /// Writes into `out` in the exact order [`nonzeroes`](Self::nonzeroes)
    /// declared the slots (row 0 first), and returns how many were written.
    pub(crate) fn partials(
        &self,
        shapes: &[Shape],
        x: &[f64],
        out: &mut [f64; MAX_PARTIALS],
    ) -> usize {
        match *self {
            Constraint::Fixed(..) => {
                // R0 = px - x0, R1 = py - y0.
                out[0] = 1.0;
                out[1] = 1.0;
                2
            }
            Constraint::Coincident(..) => {
                // R0 = ax - bx, R1 = ay - by.
                out[0] = 1.0;
                out[1] = -1.0;
                out[2] = 1.0;
                out[3] = -1.0;
                4
            }
            Constraint::Horizontal(..) | Constraint::Vertical(..) => {
                out[0] = 1.0;
                out[1] = -1.0;
                2
            }
            Constraint::Parallel(la, lb) => {
                // R = (x2-x1)(y4-y3) - (y2-y1)(x4-x3)
                let (la, lb) = (line(shapes, la), line(shapes, lb));
                let (x1, y1) = xy(x, la.p0);
                let (x2, y2) = xy(x, la.p1);
                let (x3, y3) = xy(x, lb.p0);
                let (x4, y4) = xy(x, lb.p1);
                out[0] = y3 - y4; // ∂R/∂x1
                out[1] = x4 - x3; // ∂R/∂y1
                out[2] = y4 - y3; // ∂R/∂x2
                out[3] = x3 - x4; // ∂R/∂y2
                out[4] = y2 - y1; // ∂R/∂x3
                out[5] = x1 - x2; // ∂R/∂y3
                out[6] = y1 - y2; // ∂R/∂x4
                out[7] = x2 - x1; // ∂R/∂y4
                8
            }
            Constraint::Distance(a, b, _) => {
                // R = dx² + dy² - d²  with dx = ax-bx, dy = ay-by.
                let (ax, ay) = xy(x, a);
                let (bx, by) = xy(x, b);
                let (dx, dy) = (ax - bx, ay - by);
                out[0] = 2.0 * dx;
                out[1] = 2.0 * dy;
                out[2] = -2.0 * dx;
                out[3] = -2.0 * dy;
                4
            }
            Constraint::Diameter(c, _) => {
                let c = circle(shapes, c);
                let (ox, oy) = xy(x, c.center);
                let (mx, my) = xy(x, c.rim);
                let (dx, dy) = (ox - mx, oy - my);
                out[0] = 2.0 * dx;
                out[1] = 2.0 * dy;
                out[2] = -2.0 * dx;
                out[3] = -2.0 * dy;
                4
            }
            Constraint::Normal(c, l) => {
                // R = (x2-x1)(cy-y1) - (y2-y1)(cx-x1)
                let (c, l) = (circle(shapes, c), line(shapes, l));
                let (x1, y1) = xy(x, l.p0);
                let (x2, y2) = xy(x, l.p1);
                let (cx, cy) = xy(x, c.center);
                out[0] = y2 - cy; // ∂R/∂x1
                out[1] = cx - x2; // ∂R/∂y1
                out[2] = cy - y1; // ∂R/∂x2
                out[3] = x1 - cx; // ∂R/∂y2
                out[4] = y1 - y2; // ∂R/∂cx
                out[5] = x2 - x1; // ∂R/∂cy
                6
            }
            Constraint::OnCircle(c, p) => {
                // R = (px-ox)² + (py-oy)² - (mx-ox)² - (my-oy)²
                let c = circle(shapes, c);
                let (ox, oy) = xy(x, c.center);
                let (mx, my) = xy(x, c.rim);
                let (px, py) = xy(x, p);
                out[0] = 2.0 * ((mx - ox) - (px - ox)); // ∂R/∂ox
                out[1] = 2.0 * ((my - oy) - (py - oy)); // ∂R/∂oy
                out[2] = -2.0 * (mx - ox); // ∂R/∂mx
                out[3] = -2.0 * (my - oy); // ∂R/∂my
                out[4] = 2.0 * (px - ox); // ∂R/∂px
                out[5] = 2.0 * (py - oy); // ∂R/∂py
                6
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Circle, Line};

    const H: f64 = 1e-6;

    /// Central-difference check of `partials` against `residual`, for every
    /// slot a constraint declares.
    fn check_partials(constraint: Constraint, shapes: &[Shape], x: &[f64]) {
        let (mut row0, mut row1) = (Vec::new(), Vec::new());
        constraint.nonzeroes(shapes, &mut row0, &mut row1);
        let mut out = [0.0; MAX_PARTIALS];
        let count = constraint.partials(shapes, x, &mut out);
        assert_eq!(count, row0.len() + row1.len());

        let mut x = x.to_vec();
        for (k, (&slot, local_row)) in row0
            .iter()
            .map(|s| (s, 0))
            .chain(row1.iter().map(|s| (s, 1)))
            .enumerate()
        {
            let orig = x[slot];
            x[slot] = orig + H;
            let (mut hi0, mut hi1) = (0.0, 0.0);
            constraint.residual(shapes, &x, &mut hi0, &mut hi1);
            x[slot] = orig - H;
            let (mut lo0, mut lo1) = (0.0, 0.0);
            constraint.residual(shapes, &x, &mut lo0, &mut lo1);
            x[slot] = orig;

            let numeric = if local_row == 0 {
                (hi0 - lo0) / (2.0 * H)
            } else {
                (hi1 - lo1) / (2.0 * H)
            };
            assert!(
                (out[k] - numeric).abs() < 1e-5,
                "{} slot {slot}: analytic {} vs numeric {numeric}",
                constraint.kind(),
                out[k],
            );
        }
    }

    fn four_points() -> Vec<f64> {
        // p0..p3 at scattered, non-symmetric positions.
        vec![0.3, -0.7, 2.1, 1.4, -1.2, 0.9, 3.3, -2.5]
    }

    #[test]
    fn analytic_partials_match_finite_differences() {
        let x = four_points();
        let (p0, p1, p2, p3) = (PointId(0), PointId(1), PointId(2), PointId(3));
        let shapes = vec![
            Shape::Line(Line { p0, p1 }),
            Shape::Line(Line { p0: p2, p1: p3 }),
            Shape::Circle(Circle {
                center: p0,
                rim: p1,
            }),
        ];
        let (la, lb) = (LineId(0), LineId(1));
        let c = CircleId(2);

        for constraint in [
            Constraint::Fixed(p1, 0.5, -0.5),
            Constraint::Coincident(p0, p3),
            Constraint::Horizontal(la),
            Constraint::Vertical(lb),
            Constraint::Parallel(la, lb),
            Constraint::Distance(p0, p2, 1.5),
            Constraint::Diameter(c, 3.0),
            Constraint::Normal(c, lb),
            Constraint::OnCircle(c, p2),
        ] {
            check_partials(constraint, &shapes, &x);
        }
    }

    #[test]
    fn partials_accumulate_when_lines_share_a_point() {
        // Two parallel lines with a shared endpoint: the shared slots are
        // declared twice and their derivatives must sum.
        let x = four_points();
        let (p0, p1, p2) = (PointId(0), PointId(1), PointId(2));
        let shapes = vec![
            Shape::Line(Line { p0, p1 }),
            Shape::Line(Line { p0: p1, p1: p2 }),
        ];
        let constraint = Constraint::Parallel(LineId(0), LineId(1));

        let (mut row0, mut row1) = (Vec::new(), Vec::new());
        constraint.nonzeroes(&shapes, &mut row0, &mut row1);
        let mut out = [0.0; MAX_PARTIALS];
        let count = constraint.partials(&shapes, &x, &mut out);

        // Sum duplicates per slot, then compare to finite differences.
        assert_eq!(count, row0.len());
        assert!(row1.is_empty());
        let mut per_slot: std::collections::BTreeMap<usize, f64> = Default::default();
        for (k, &slot) in row0.iter().enumerate() {
            *per_slot.entry(slot).or_insert(0.0) += out[k];
        }

        let mut x = x.clone();
        for (&slot, &analytic) in &per_slot {
            let orig = x[slot];
            x[slot] = orig + H;
            let (mut hi, mut unused) = (0.0, 0.0);
            constraint.residual(&shapes, &x, &mut hi, &mut unused);
            x[slot] = orig - H;
            let mut lo = 0.0;
            constraint.residual(&shapes, &x, &mut lo, &mut unused);
            x[slot] = orig;
            let numeric = (hi - lo) / (2.0 * H);
            assert!(
                (analytic - numeric).abs() < 1e-5,
                "slot {slot}: analytic {analytic} vs numeric {numeric}"
            );
        }
    }

    #[test]
    fn row_counts_match_nonzero_rows() {
        let (p0, p1) = (PointId(0), PointId(1));
        let shapes = vec![Shape::Line(Line { p0, p1 })];
        for constraint in [
            Constraint::Fixed(p0, 0.0, 0.0),
            Constraint::Coincident(p0, p1),
            Constraint::Horizontal(LineId(0)),
        ] {
            let (mut row0, mut row1) = (Vec::new(), Vec::new());
            constraint.nonzeroes(&shapes, &mut row0, &mut row1);
            match constraint.rows() {
                1 => assert!(!row0.is_empty() && row1.is_empty()),
                2 => assert!(!row0.is_empty() && !row1.is_empty()),
                other => panic!("unexpected row count {other}"),
            }
        }
    }
}
