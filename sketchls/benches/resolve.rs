//! Benchmarks for the interactive hot path: warm-started re-solves while a
//! point is dragged through an unchanged constraint structure.

use criterion::{Criterion, criterion_group, criterion_main};
use sketchls::{Constraint, Options, PointId, Sketch};

/// A horizontal chain of `segments` links, pinned at the left end, each
/// link held at length 1. Returns the sketch and the free right end.
fn chain(segments: usize) -> (Sketch, PointId) {
    let mut sketch = Sketch::new();
    let mut prev = sketch.add_point(0.0, 0.0);
    sketch.add_constraint(Constraint::Fixed(prev, 0.0, 0.0));
    for i in 1..=segments {
        let next = sketch.add_point(i as f64, 0.0);
        let link = sketch.add_line(prev, next);
        sketch.add_constraint(Constraint::Horizontal(link));
        sketch.add_constraint(Constraint::Distance(prev, next, 1.0));
        prev = next;
    }
    (sketch, prev)
}

fn warm_resolve(c: &mut Criterion) {
    let options = Options::default();

    for segments in [10usize, 50, 200] {
        let (mut sketch, tip) = chain(segments);
        let end = segments as f64;
        // First solve compiles and allocates; everything after reuses.
        sketch.solve(&options).unwrap();

        let mut frame = 0u64;
        c.bench_function(&format!("drag_resolve/{segments}_segments"), |b| {
            b.iter(|| {
                frame += 1;
                let wobble = 0.05 * ((frame % 16) as f64 / 16.0 - 0.5);
                sketch.set_point(tip, end + wobble, wobble);
                sketch.solve(&options).unwrap()
            });
        });
    }
}

fn cold_compile(c: &mut Criterion) {
    let options = Options::default();
    c.bench_function("cold_compile/50_segments", |b| {
        b.iter(|| {
            let (mut sketch, _) = chain(50);
            sketch.solve(&options).unwrap()
        });
    });
}

criterion_group!(benches, warm_resolve, cold_compile);
criterion_main!(benches);
