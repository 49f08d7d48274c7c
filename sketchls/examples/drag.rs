//! Drag a circle's rim around while the sketch holds its shape.
//!
//! Run with `cargo run --example drag`.

use sketchls::{Constraint, Options, Sketch};

fn main() {
    let mut sketch = Sketch::new();
    let center = sketch.add_point(0.1, 0.1);
    let rim = sketch.add_point(3.0, 0.5);
    let circle = sketch.add_circle(center, rim);
    let axis = sketch.add_line(center, rim);

    sketch.add_constraint(Constraint::Fixed(center, 0.0, 0.0));
    sketch.add_constraint(Constraint::Horizontal(axis));
    sketch.add_constraint(Constraint::Diameter(circle, 6.0));

    let options = Options::default();
    let stats = sketch.solve(&options).expect("initial solve");
    println!(
        "initial solve: {:?} after {} iterations, residual {:.2e}",
        stats.status,
        stats.iters,
        stats.residual_norm()
    );

    // Drag the rim; each frame warm-starts from the previous solution and
    // the constraints snap it back onto the horizontal diameter.
    for frame in 1..=5 {
        let t = frame as f64;
        sketch.set_point(rim, 3.0 + 0.3 * t, 0.4 * t);
        let stats = sketch.solve(&options).expect("re-solve");
        let (x, y) = sketch.point(rim);
        println!(
            "frame {frame}: rim snapped to ({x:+.4}, {y:+.4}) in {} iterations",
            stats.iters
        );
    }
}
