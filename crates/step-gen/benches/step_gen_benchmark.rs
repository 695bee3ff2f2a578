use criterion::{black_box, criterion_group, criterion_main, Criterion};
use planner::block::BlockBuffer;
use planner::{CartesianPoint, MotionPlanner};
use step_gen::{AtomicGpioPort, PulseResetTimer, StepGenerator, StepTimer};

#[derive(Default)]
struct BenchPort(u8);
impl AtomicGpioPort for BenchPort {
    fn set_and_clear_atomic(&mut self, set_mask: u8, clear_mask: u8) {
        self.0 = (self.0 | set_mask) & !clear_mask;
    }
    fn write(&mut self, mask: u8) {
        self.0 = mask;
    }
}

#[derive(Default)]
struct BenchTimer;
impl StepTimer for BenchTimer {
    fn set_reload(&mut self, _cycles: u32) {}
    fn stop(&mut self) {}
}

#[derive(Default)]
struct BenchPulseReset;
impl PulseResetTimer for BenchPulseReset {
    fn arm(&mut self, _pulse_microseconds: u16) {}
}

fn fill_buffer(planner: &mut MotionPlanner<32>) {
    for i in 1..=20 {
        let x = (i as f32) * 0.5;
        let target = CartesianPoint::new(x, 0.0, 0.0);
        let _ = planner.buffer_line(target, 1200.0, false);
    }
}

fn bench_timer_interrupt(c: &mut Criterion) {
    c.bench_function("step_generator_on_timer_interrupt", |b| {
        b.iter(|| {
            let mut planner: MotionPlanner<32> = MotionPlanner::new([200.0, 200.0, 200.0], 36_000.0, 0.05);
            fill_buffer(&mut planner);
            let mut generator = StepGenerator::new(16_000_000, 0, 0, 4);
            generator.cycle_start();
            let mut step_port = BenchPort::default();
            let mut dir_port = BenchPort::default();
            let mut pulse_reset = BenchPulseReset;
            let mut timer = BenchTimer;
            let mut position = [0i64; 3];

            while !generator.is_idle() || !planner.buffer.is_empty() {
                generator.on_timer_interrupt(
                    black_box(&mut planner.buffer),
                    &mut step_port,
                    &mut dir_port,
                    &mut pulse_reset,
                    &mut timer,
                    &mut position,
                );
            }
        });
    });
}

fn bench_buffer_reset(c: &mut Criterion) {
    c.bench_function("step_generator_reset_drains_buffer", |b| {
        b.iter(|| {
            let mut buffer: BlockBuffer<32> = BlockBuffer::new();
            let mut planner: MotionPlanner<32> = MotionPlanner::new([200.0, 200.0, 200.0], 36_000.0, 0.05);
            fill_buffer(&mut planner);
            core::mem::swap(&mut buffer, &mut planner.buffer);
            let mut generator = StepGenerator::new(16_000_000, 0, 0, 4);
            generator.reset(black_box(&mut buffer));
        });
    });
}

criterion_group!(benches, bench_timer_interrupt, bench_buffer_reset);
criterion_main!(benches);
