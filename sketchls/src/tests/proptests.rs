use proptest::prelude::*;

use crate::{Constraint, Options, Sketch, Status};

proptest! {
    /// The axis-aligned frame from the scenario tests, with an arbitrary
    /// initial guess for the corner point. The system is linear in the
    /// corner, so the solver must land on (2, 0) from anywhere.
    #[test]
    fn axis_frame_converges_from_anywhere(
        x in -100.0f64..100.0,
        y in -100.0f64..100.0,
    ) {
        let mut sketch = Sketch::new();
        let p1 = sketch.add_point(0.0, 0.0);
        let p2 = sketch.add_point(x, y);
        let p3 = sketch.add_point(2.0, 1.0);
        let l1 = sketch.add_line(p1, p2);
        let l2 = sketch.add_line(p2, p3);
        sketch.add_constraint(Constraint::Fixed(p1, 0.0, 0.0));
        sketch.add_constraint(Constraint::Fixed(p3, 2.0, 1.0));
        sketch.add_constraint(Constraint::Horizontal(l1));
        sketch.add_constraint(Constraint::Vertical(l2));

        let stats = sketch.solve(&Options::default()).unwrap();
        prop_assert_eq!(stats.status, Status::Converged);
        let (px, py) = sketch.point(p2);
        prop_assert!((px - 2.0).abs() < 1e-6);
        prop_assert!(py.abs() < 1e-6);
    }

    /// A pinned point, a horizontal line, and an arbitrary distance target:
    /// the free point must end up exactly `d` away on the axis.
    #[test]
    fn distance_targets_are_met(
        d in 0.5f64..50.0,
        guess_x in 0.1f64..100.0,
        guess_y in -1.0f64..1.0,
    ) {
        let mut sketch = Sketch::new();
        let p1 = sketch.add_point(0.0, 0.0);
        let p2 = sketch.add_point(guess_x, guess_y);
        let l1 = sketch.add_line(p1, p2);
        sketch.add_constraint(Constraint::Fixed(p1, 0.0, 0.0));
        sketch.add_constraint(Constraint::Horizontal(l1));
        sketch.add_constraint(Constraint::Distance(p1, p2, d));

        let stats = sketch.solve(&Options::default()).unwrap();
        prop_assert_eq!(stats.status, Status::Converged);
        let (px, py) = sketch.point(p2);
        let gap = (px * px + py * py).sqrt();
        prop_assert!((gap - d).abs() < 1e-6, "gap {} target {}", gap, d);
        prop_assert!(py.abs() < 1e-6);
    }

    /// Re-solving after a random drag keeps the constraints satisfied and
    /// never rebuilds the compiled system.
    #[test]
    fn drags_never_recompile(
        drags in prop::collection::vec((-10.0f64..10.0, -10.0f64..10.0), 1..20),
    ) {
        let mut sketch = Sketch::new();
        let p1 = sketch.add_point(0.0, 0.0);
        let p2 = sketch.add_point(3.0, 0.0);
        let l1 = sketch.add_line(p1, p2);
        sketch.add_constraint(Constraint::Fixed(p1, 0.0, 0.0));
        sketch.add_constraint(Constraint::Vertical(l1));

        sketch.solve(&Options::default()).unwrap();
        let compiled = sketch.compiled_addr().unwrap();

        for (dx, dy) in drags {
            sketch.set_point(p2, dx, dy);
            let stats = sketch.solve(&Options::default()).unwrap();
            prop_assert_eq!(stats.status, Status::Converged);
            let (px, _) = sketch.point(p2);
            prop_assert!(px.abs() < 1e-6);
            prop_assert_eq!(sketch.compiled_addr().unwrap(), compiled);
        }
    }
}
