//! The motion front-end: `mc_line`, `mc_arc`, `mc_dwell`, `mc_go_home`.
//!
//! The primary gateway to the planner. Every motion command, including arc
//! line segments, passes through [`mc_line`] before reaching
//! [`planner::MotionPlanner::buffer_line`] — kept as a separate hop from the
//! planner itself per `original_source/motion_control.c`'s own note, so that
//! soft-limit clipping stays a concern of this layer alone.

#[cfg(not(feature = "std"))]
use libm::{atan2f, cosf, fabsf, floorf, hypotf, sinf};
#[cfg(feature = "std")]
fn atan2f(y: f32, x: f32) -> f32 {
    y.atan2(x)
}
#[cfg(feature = "std")]
fn cosf(x: f32) -> f32 {
    x.cos()
}
#[cfg(feature = "std")]
fn sinf(x: f32) -> f32 {
    x.sin()
}
#[cfg(feature = "std")]
fn fabsf(x: f32) -> f32 {
    x.abs()
}
#[cfg(feature = "std")]
fn floorf(x: f32) -> f32 {
    x.floor()
}
#[cfg(feature = "std")]
fn hypotf(x: f32, y: f32) -> f32 {
    x.hypot(y)
}

use planner::{CartesianPoint, MotionPlanner};
use settings::SettingsRecord;

use crate::runtime::{execute_runtime, RuntimeEnvironment};
use crate::sys::SystemState;

/// Segments between exact arc re-centering via `cos`/`sin`, bounding
/// single-precision round-off drift from the vector-rotation recurrence.
pub const N_ARC_CORRECTION: u16 = 25;

/// Soft-limit ranges for each axis, in millimeters, `(min, max)`.
pub type SoftLimits = [(f32, f32); 3];

fn clip_to_soft_limits(target: &mut CartesianPoint, limits: &SoftLimits) {
    target.x = target.x.clamp(limits[0].0, limits[0].1);
    target.y = target.y.clamp(limits[1].0, limits[1].1);
    target.z = target.z.clamp(limits[2].0, limits[2].1);
}

/// Executes linear motion to `target` in absolute machine coordinates
/// (millimeters). `feed_rate` is mm/min unless `invert_feed_rate` is set, in
/// which case the move must complete in `1 / feed_rate` minutes.
///
/// Blocks (cooperatively, via [`execute_runtime`]) while the buffer is full,
/// then hands the move to the planner and auto-starts the cycle unless a
/// feed hold is active.
pub fn mc_line<const N: usize, E: RuntimeEnvironment>(
    planner: &mut MotionPlanner<N>,
    state: &mut SystemState,
    settings: &SettingsRecord,
    env: &mut E,
    mut target: CartesianPoint,
    feed_rate: f32,
    invert_feed_rate: bool,
    soft_limits: Option<&SoftLimits>,
) {
    if let Some(limits) = soft_limits {
        clip_to_soft_limits(&mut target, limits);
    }

    while planner.buffer.is_full() {
        execute_runtime(state, settings, env);
        if state.abort {
            return;
        }
    }

    let _ = planner.buffer_line(target, feed_rate, invert_feed_rate);

    if state.auto_start && !state.feed_hold {
        env.cycle_start();
    }
}

/// Executes a helical arc from the planner's current position to `target`,
/// approximated by chord segments each submitted through [`mc_line`].
///
/// `axis_0`/`axis_1` select the plane the arc lies in (e.g. X/Y for `G17`);
/// `axis_linear` is the third, helical axis. `offset` is the vector from
/// `position` to the arc's center, in the same three axes as `target`.
#[allow(clippy::too_many_arguments)]
pub fn mc_arc<const N: usize, E: RuntimeEnvironment>(
    planner: &mut MotionPlanner<N>,
    state: &mut SystemState,
    settings: &SettingsRecord,
    env: &mut E,
    position: [f32; 3],
    target: [f32; 3],
    offset: [f32; 3],
    axis_0: usize,
    axis_1: usize,
    axis_linear: usize,
    mut feed_rate: f32,
    invert_feed_rate: bool,
    clockwise: bool,
    soft_limits: Option<&SoftLimits>,
) {
    let center_axis0 = position[axis_0] + offset[axis_0];
    let center_axis1 = position[axis_1] + offset[axis_1];
    let linear_travel = target[axis_linear] - position[axis_linear];
    let mut r_axis0 = -offset[axis_0];
    let mut r_axis1 = -offset[axis_1];
    let rt_axis0 = target[axis_0] - center_axis0;
    let rt_axis1 = target[axis_1] - center_axis1;

    let mut angular_travel = atan2f(r_axis0 * rt_axis1 - r_axis1 * rt_axis0, r_axis0 * rt_axis0 + r_axis1 * rt_axis1);
    // Dangling-else resolution (see design notes): clockwise and
    // non-negative travel subtracts a full turn; counter-clockwise and
    // non-positive travel adds one.
    if clockwise {
        if angular_travel >= 0.0 {
            angular_travel -= 2.0 * core::f32::consts::PI;
        }
    } else if angular_travel <= 0.0 {
        angular_travel += 2.0 * core::f32::consts::PI;
    }

    let radius = hypotf(r_axis0, r_axis1);
    let millimeters_of_travel = hypotf(angular_travel * radius, fabsf(linear_travel));
    if millimeters_of_travel == 0.0 {
        return;
    }
    let segments = floorf(millimeters_of_travel / settings.mm_per_arc_segment) as u16;
    if segments == 0 {
        mc_line(planner, state, settings, env, CartesianPoint::new(target[0], target[1], target[2]), feed_rate, invert_feed_rate, soft_limits);
        return;
    }
    if invert_feed_rate {
        feed_rate *= segments as f32;
    }

    let theta_per_segment = angular_travel / segments as f32;
    let linear_per_segment = linear_travel / segments as f32;

    // Small-angle vector rotation matrix; re-centered exactly every
    // N_ARC_CORRECTION segments to bound accumulated round-off.
    let cos_t = 1.0 - 0.5 * theta_per_segment * theta_per_segment;
    let sin_t = theta_per_segment;

    let mut arc_target = [0.0f32; 3];
    arc_target[axis_linear] = position[axis_linear];
    let mut count: u16 = 0;

    for i in 1..segments {
        if count < N_ARC_CORRECTION {
            let r_axisi = r_axis0 * sin_t + r_axis1 * cos_t;
            r_axis0 = r_axis0 * cos_t - r_axis1 * sin_t;
            r_axis1 = r_axisi;
            count += 1;
        } else {
            let angle = i as f32 * theta_per_segment;
            let cos_ti = cosf(angle);
            let sin_ti = sinf(angle);
            r_axis0 = -offset[axis_0] * cos_ti + offset[axis_1] * sin_ti;
            r_axis1 = -offset[axis_0] * sin_ti - offset[axis_1] * cos_ti;
            count = 0;
        }

        arc_target[axis_0] = center_axis0 + r_axis0;
        arc_target[axis_1] = center_axis1 + r_axis1;
        arc_target[axis_linear] += linear_per_segment;

        mc_line(
            planner,
            state,
            settings,
            env,
            CartesianPoint::new(arc_target[0], arc_target[1], arc_target[2]),
            feed_rate,
            invert_feed_rate,
            soft_limits,
        );
        if state.abort {
            return;
        }
    }

    mc_line(
        planner,
        state,
        settings,
        env,
        CartesianPoint::new(target[0], target[1], target[2]),
        feed_rate,
        invert_feed_rate,
        soft_limits,
    );
}

/// Blocks until the buffer is empty, cooperatively servicing the runtime
/// dispatcher so `RESET` is observed within one poll.
pub fn synchronize<const N: usize, E: RuntimeEnvironment>(
    planner: &mut MotionPlanner<N>,
    state: &mut SystemState,
    settings: &SettingsRecord,
    env: &mut E,
) {
    while !planner.is_idle() {
        execute_runtime(state, settings, env);
        if state.abort {
            return;
        }
    }
}

/// Granularity of the dwell poll loop, matching `original_source/config.h`'s
/// `DWELL_TIME_STEP`.
pub const DWELL_TIME_STEP_MS: u32 = 50;

/// Synchronizes the planner, then sleeps for `seconds`, polling the runtime
/// dispatcher every [`DWELL_TIME_STEP_MS`] so `RESET` interrupts the dwell.
pub fn mc_dwell<const N: usize, E: RuntimeEnvironment, C: hal::SystemClock>(
    planner: &mut MotionPlanner<N>,
    state: &mut SystemState,
    settings: &SettingsRecord,
    env: &mut E,
    clock: &mut C,
    seconds: f32,
) {
    synchronize(planner, state, settings, env);
    if state.abort {
        return;
    }

    let whole_steps = floorf(1000.0 / DWELL_TIME_STEP_MS as f32 * seconds) as u32;
    let remainder_ms = (1000.0 * seconds - whole_steps as f32 * DWELL_TIME_STEP_MS as f32) as u32;
    clock.delay_ms(remainder_ms);

    for _ in 0..whole_steps {
        execute_runtime(state, settings, env);
        if state.abort {
            return;
        }
        clock.delay_ms(DWELL_TIME_STEP_MS);
    }
}

/// External collaborator that performs the limit-switch homing cycle and
/// reports the resulting machine position, in steps.
pub trait HomingRoutine {
    fn home(&mut self) -> [i64; 3];
}

/// Runs the homing cycle and zeroes the system's position and work offset.
pub fn mc_go_home<H: HomingRoutine>(state: &mut SystemState, homing: &mut H) {
    state.position = homing.home();
    state.coord_offset = [0.0; 3];
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopEnv;
    impl RuntimeEnvironment for NoopEnv {
        fn hard_stop(&mut self) {}
        fn feed_hold(&mut self) {}
        fn cycle_reinitialize(&mut self) {}
        fn cycle_start(&mut self) {}
        fn emit_line(&mut self, _line: &str) {}
    }

    #[test]
    fn mc_line_enqueues_a_block() {
        let mut planner: MotionPlanner<8> = MotionPlanner::new([200.0, 200.0, 200.0], 36_000.0, 0.05);
        let mut state = SystemState::default();
        let settings = SettingsRecord::default();
        let mut env = NoopEnv;

        mc_line(&mut planner, &mut state, &settings, &mut env, CartesianPoint::new(10.0, 0.0, 0.0), 600.0, false, None);

        assert_eq!(planner.buffer.len(), 1);
    }

    #[test]
    fn mc_line_clips_to_soft_limits() {
        let mut planner: MotionPlanner<8> = MotionPlanner::new([200.0, 200.0, 200.0], 36_000.0, 0.05);
        let mut state = SystemState::default();
        let settings = SettingsRecord::default();
        let mut env = NoopEnv;
        let limits: SoftLimits = [(0.0, 50.0), (0.0, 50.0), (0.0, 50.0)];

        mc_line(&mut planner, &mut state, &settings, &mut env, CartesianPoint::new(999.0, 0.0, 0.0), 600.0, false, Some(&limits));

        let block = planner.buffer.peek_tail().unwrap();
        // Clipped to 50mm at 200 steps/mm.
        assert_eq!(block.steps[0], 10_000);
    }

    #[test]
    fn mc_arc_half_circle_lands_near_target() {
        let mut planner: MotionPlanner<64> = MotionPlanner::new([200.0, 200.0, 200.0], 36_000.0, 0.05);
        let mut state = SystemState::default();
        let mut settings = SettingsRecord::default();
        settings.mm_per_arc_segment = 0.1;
        let mut env = NoopEnv;

        // Half circle of radius 5, centered at (5, 0), from (0,0) to (10,0) through +Y.
        mc_arc(
            &mut planner,
            &mut state,
            &settings,
            &mut env,
            [0.0, 0.0, 0.0],
            [10.0, 0.0, 0.0],
            [5.0, 0.0, 0.0],
            0,
            1,
            2,
            600.0,
            false,
            false,
            None,
        );

        assert!(planner.buffer.len() > 100);
    }

    #[test]
    fn mc_go_home_zeroes_position_and_offset() {
        struct FixedHoming;
        impl HomingRoutine for FixedHoming {
            fn home(&mut self) -> [i64; 3] {
                [0, 0, 0]
            }
        }
        let mut state = SystemState::default();
        state.position = [1000, 2000, 3000];
        state.coord_offset = [1.0, 2.0, 3.0];
        let mut homing = FixedHoming;

        mc_go_home(&mut state, &mut homing);

        assert_eq!(state.position, [0, 0, 0]);
        assert_eq!(state.coord_offset, [0.0; 3]);
    }
}
