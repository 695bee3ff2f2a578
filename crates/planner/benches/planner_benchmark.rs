use criterion::{black_box, criterion_group, criterion_main, Criterion};
use planner::{CartesianPoint, MotionPlanner};

fn plan_a_hundred_moves(planner: &mut MotionPlanner<32>) {
    for i in 1..=100 {
        let x = (i as f32) * 0.5;
        let y = if i % 2 == 0 { 0.2 } else { -0.2 };
        let target = CartesianPoint::new(x, y, 0.0);
        if planner.buffer_line(target, 1200.0, false).is_err() {
            // Buffer full: drain one block to keep the benchmark moving.
            planner.buffer.advance_tail();
            let _ = planner.buffer_line(target, 1200.0, false);
        }
    }
}

fn bench_lookahead(c: &mut Criterion) {
    c.bench_function("plan_100_moves_with_lookahead", |b| {
        b.iter(|| {
            let mut planner: MotionPlanner<32> =
                MotionPlanner::new([200.0, 200.0, 200.0], 36_000.0, 0.05);
            plan_a_hundred_moves(black_box(&mut planner));
        });
    });
}

criterion_group!(benches, bench_lookahead);
criterion_main!(benches);
