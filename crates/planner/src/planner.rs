//! Look-ahead trapezoidal motion planner.
//!
//! Translates a stream of target positions into buffered [`Block`]s, each
//! carrying a trapezoidal (accelerate/cruise/decelerate) speed profile whose
//! endpoints are revised by a reverse and a forward sweep over the buffered
//! window every time a new block is inserted. This keeps every junction
//! between blocks achievable within the configured acceleration without
//! ever stopping at a corner the geometry doesn't require.

#[cfg(not(feature = "std"))]
use libm::{fabsf, sqrtf};
#[cfg(feature = "std")]
fn sqrtf(x: f32) -> f32 {
    x.sqrt()
}
#[cfg(feature = "std")]
fn fabsf(x: f32) -> f32 {
    x.abs()
}
#[cfg(feature = "std")]
fn sinf(x: f32) -> f32 {
    x.sin()
}

use crate::block::{Block, BlockBuffer};
use crate::error::PlannerError;
use crate::kinematics::{CartesianKinematics, Kinematics};
use crate::CartesianPoint;

/// Rate of trapezoid-ticker iteration the step generator runs at; the
/// planner needs this to convert `acceleration` into a per-tick `rate_delta`.
pub const ACCELERATION_TICKS_PER_SECOND: f32 = 50.0;
/// Floor applied to every planned `entry_speed`.
pub const MINIMUM_PLANNER_SPEED: f32 = 0.0;
/// Floor for the step generator's rate, steps/min.
pub const MINIMUM_STEPS_PER_MINUTE: f32 = 800.0;

/// The look-ahead planner and its block buffer.
pub struct MotionPlanner<const N: usize = { crate::block::DEFAULT_CAPACITY }> {
    pub buffer: BlockBuffer<N>,
    kinematics: CartesianKinematics,
    /// Current planned position, in millimeters (the position the next
    /// `buffer_line` call measures its delta from).
    position: CartesianPoint,
    acceleration: f32,
    junction_deviation: f32,
    previous_unit_vector: Option<[f32; 3]>,
}

impl<const N: usize> MotionPlanner<N> {
    pub fn new(steps_per_mm: [f32; 3], acceleration: f32, junction_deviation: f32) -> Self {
        MotionPlanner {
            buffer: BlockBuffer::new(),
            kinematics: CartesianKinematics { steps_per_mm },
            position: CartesianPoint::default(),
            acceleration,
            junction_deviation,
            previous_unit_vector: None,
        }
    }

    pub fn position(&self) -> CartesianPoint {
        self.position
    }

    pub fn set_acceleration(&mut self, acceleration: f32) {
        self.acceleration = acceleration;
    }

    pub fn set_junction_deviation(&mut self, junction_deviation: f32) {
        self.junction_deviation = junction_deviation;
    }

    pub fn set_steps_per_mm(&mut self, steps_per_mm: [f32; 3]) {
        self.kinematics.steps_per_mm = steps_per_mm;
    }

    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Inserts one straight-line move into the buffer and re-runs the
    /// look-ahead passes. Non-blocking: the caller (the motion front-end) is
    /// responsible for polling the runtime dispatcher and retrying on
    /// [`PlannerError::BufferFull`], matching the original's `mc_line` wait
    /// loop.
    ///
    /// `feed_rate` is in mm/min unless `invert_feed_rate` is set, in which
    /// case the move must complete in `1 / feed_rate` minutes.
    pub fn buffer_line(
        &mut self,
        target: CartesianPoint,
        feed_rate: f32,
        invert_feed_rate: bool,
    ) -> Result<(), PlannerError> {
        if self.acceleration <= 0.0 {
            return Err(PlannerError::InvalidAcceleration);
        }
        if self.kinematics.steps_per_mm.iter().any(|&s| s <= 0.0) {
            return Err(PlannerError::InvalidStepsPerMm);
        }

        let delta = CartesianPoint {
            x: target.x - self.position.x,
            y: target.y - self.position.y,
            z: target.z - self.position.z,
        };
        let steps_signed = self.kinematics.cartesian_to_steps(delta);
        let steps = [
            steps_signed[0].unsigned_abs() as u32,
            steps_signed[1].unsigned_abs() as u32,
            steps_signed[2].unsigned_abs() as u32,
        ];
        let step_event_count = steps[0].max(steps[1]).max(steps[2]);
        if step_event_count == 0 {
            // Zero-length moves are silently dropped per the insertion contract.
            return Ok(());
        }

        let mut direction_bits = 0u8;
        for (axis, &s) in steps_signed.iter().enumerate() {
            if s < 0 {
                direction_bits |= 1 << axis;
            }
        }

        let millimeters = self.kinematics.cartesian_distance(self.position, target);

        let nominal_speed = if invert_feed_rate {
            millimeters * feed_rate
        } else {
            feed_rate.min(sqrtf(2.0 * self.acceleration * millimeters))
        };
        let nominal_speed = nominal_speed.max(MINIMUM_PLANNER_SPEED);

        let steps_per_mm_avg = step_event_count as f32 / millimeters;
        let nominal_rate = nominal_speed * steps_per_mm_avg;
        let rate_delta =
            (self.acceleration * steps_per_mm_avg) / (60.0 * ACCELERATION_TICKS_PER_SECOND);

        let unit_vector = [
            delta.x / millimeters,
            delta.y / millimeters,
            delta.z / millimeters,
        ];
        let max_entry_speed = match self.previous_unit_vector {
            None => MINIMUM_PLANNER_SPEED,
            Some(prev) => {
                let cos_theta =
                    (prev[0] * unit_vector[0] + prev[1] * unit_vector[1] + prev[2] * unit_vector[2])
                        .clamp(-1.0, 1.0);
                // Half-angle sine from the cosine of the full turn angle
                // between the two unit vectors: sin(theta/2) = sqrt((1-cos)/2).
                let sin_half_theta = sqrtf(((1.0 - cos_theta) / 2.0).max(0.0));
                if sin_half_theta > 0.999999 {
                    MINIMUM_PLANNER_SPEED
                } else {
                    let v_j_sq = self.acceleration * self.junction_deviation * sin_half_theta
                        / (1.0 - sin_half_theta);
                    sqrtf(v_j_sq.max(0.0)).min(nominal_speed)
                }
            }
        };
        self.previous_unit_vector = Some(unit_vector);

        let block = Block {
            steps,
            direction_bits,
            step_event_count,
            millimeters,
            nominal_speed,
            nominal_rate,
            entry_speed: max_entry_speed,
            max_entry_speed,
            rate_delta,
            initial_rate: nominal_rate,
            final_rate: nominal_rate,
            accelerate_until: step_event_count,
            decelerate_after: step_event_count,
            nominal_length_flag: fabsf(nominal_speed - max_entry_speed) < 1e-6,
            recalculate_flag: true,
        };

        self.buffer
            .push(block)
            .map_err(|_| PlannerError::BufferFull)?;
        self.position = target;
        self.recalculate();
        Ok(())
    }

    /// Runs the reverse and forward look-ahead sweeps, then recomputes the
    /// trapezoid for every revised block. The tail (offset 0, currently
    /// executing) block is never touched.
    fn recalculate(&mut self) {
        let len = self.buffer.len();
        if len < 2 {
            if let Some(only) = self.buffer.get_mut(len.saturating_sub(1)) {
                compute_trapezoid(only, self.acceleration);
            }
            return;
        }

        // Reverse pass: head -> tail+1.
        let mut next_entry_speed: Option<f32> = None;
        for offset in (1..len).rev() {
            let millimeters;
            let max_entry_speed;
            let mut entry_speed;
            let is_nominal_length;
            {
                let block = self.buffer.get(offset).unwrap();
                millimeters = block.millimeters;
                max_entry_speed = block.max_entry_speed;
                entry_speed = block.entry_speed;
                is_nominal_length = block.nominal_length_flag;
            }
            if let Some(next_speed) = next_entry_speed {
                if !is_nominal_length || next_speed < entry_speed {
                    entry_speed = max_entry_speed
                        .min(sqrtf(next_speed * next_speed + 2.0 * self.acceleration * millimeters));
                }
            }
            next_entry_speed = Some(entry_speed.max(MINIMUM_PLANNER_SPEED));
            if let Some(block) = self.buffer.get_mut(offset) {
                block.entry_speed = entry_speed.max(MINIMUM_PLANNER_SPEED);
            }
        }

        // Forward pass: tail+1 -> head.
        let mut prev_entry_speed = self.buffer.get(0).map(|b| b.entry_speed).unwrap_or(0.0);
        let mut prev_millimeters = self.buffer.get(0).map(|b| b.millimeters).unwrap_or(0.0);
        let mut prev_nominal_length = self.buffer.get(0).map(|b| b.nominal_length_flag).unwrap_or(true);
        for offset in 1..len {
            let block = self.buffer.get_mut(offset).unwrap();
            if !prev_nominal_length {
                let allowed =
                    sqrtf(prev_entry_speed * prev_entry_speed + 2.0 * self.acceleration * prev_millimeters);
                if allowed < block.entry_speed {
                    block.entry_speed = allowed;
                }
            }
            prev_entry_speed = block.entry_speed;
            prev_millimeters = block.millimeters;
            prev_nominal_length = block.nominal_length_flag;
        }

        // Recompute trapezoid parameters for every revised block.
        let exit_speeds: heapless::Vec<f32, 64> = {
            let mut v = heapless::Vec::new();
            for offset in 0..len {
                let exit = if offset + 1 < len {
                    self.buffer.get(offset + 1).unwrap().entry_speed
                } else {
                    MINIMUM_PLANNER_SPEED
                };
                let _ = v.push(exit);
            }
            v
        };
        for offset in 0..len {
            let acceleration = self.acceleration;
            let exit_speed = exit_speeds[offset];
            if let Some(block) = self.buffer.get_mut(offset) {
                block.final_rate = (exit_speed * (block.step_event_count as f32
                    / block.millimeters.max(1e-6)))
                .max(MINIMUM_STEPS_PER_MINUTE);
                compute_trapezoid(block, acceleration);
            }
        }
    }
}

/// `(target_rate^2 - initial_rate^2) / (2 * acceleration)`, the number of
/// step events needed to go from `initial_rate` to `target_rate`.
fn acceleration_distance(initial_rate: f32, target_rate: f32, acceleration: f32) -> f32 {
    (target_rate * target_rate - initial_rate * initial_rate) / (2.0 * acceleration)
}

/// Step-event offset at which a pure accelerate/decelerate profile (no
/// plateau) reaches its peak rate, for the triangle-profile case.
fn intersection_distance(
    initial_rate: f32,
    final_rate: f32,
    acceleration: f32,
    distance: f32,
) -> f32 {
    (2.0 * acceleration * distance - initial_rate * initial_rate + final_rate * final_rate)
        / (4.0 * acceleration)
}

fn compute_trapezoid(block: &mut Block, acceleration_mm_min2: f32) {
    block.initial_rate = block.entry_speed * (block.step_event_count as f32
        / block.millimeters.max(1e-6));
    block.initial_rate = block.initial_rate.max(MINIMUM_STEPS_PER_MINUTE);

    let steps_per_mm = block.step_event_count as f32 / block.millimeters.max(1e-6);
    let acceleration_steps_per_min2 = acceleration_mm_min2 * steps_per_mm;

    let accel_distance = acceleration_distance(
        block.initial_rate,
        block.nominal_rate,
        acceleration_steps_per_min2,
    );
    let decel_distance = acceleration_distance(
        block.nominal_rate,
        block.final_rate,
        acceleration_steps_per_min2,
    );

    let accel_steps = accel_distance.max(0.0).ceil() as u32;
    let decel_steps = decel_distance.max(0.0).floor() as u32;

    if accel_steps + decel_steps >= block.step_event_count {
        // Triangle profile: no plateau.
        let plateau_at = intersection_distance(
            block.initial_rate,
            block.final_rate,
            acceleration_steps_per_min2,
            block.step_event_count as f32,
        )
        .clamp(0.0, block.step_event_count as f32);
        block.accelerate_until = plateau_at as u32;
        block.decelerate_after = plateau_at as u32;
    } else {
        block.accelerate_until = accel_steps;
        block.decelerate_after = block.step_event_count - decel_steps;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_block_nominal_speed_and_steps() {
        let mut planner: MotionPlanner<8> =
            MotionPlanner::new([200.0, 200.0, 200.0], 36_000.0, 0.05);
        planner
            .buffer_line(CartesianPoint::new(10.0, 0.0, 0.0), 600.0, false)
            .unwrap();

        assert_eq!(planner.buffer.len(), 1);
        let block = planner.buffer.peek_tail().unwrap();
        assert_eq!(block.steps, [2000, 0, 0]);
        assert_eq!(block.step_event_count, 2000);
        assert!((block.nominal_speed - 600.0).abs() < 1e-3);
    }

    #[test]
    fn zero_length_move_is_dropped() {
        let mut planner: MotionPlanner<8> =
            MotionPlanner::new([200.0, 200.0, 200.0], 36_000.0, 0.05);
        planner
            .buffer_line(CartesianPoint::new(0.0, 0.0, 0.0), 600.0, false)
            .unwrap();
        assert!(planner.buffer.is_empty());
    }

    #[test]
    fn collinear_moves_reach_nominal_speed_at_junction() {
        let mut planner: MotionPlanner<8> =
            MotionPlanner::new([200.0, 200.0, 200.0], 36_000.0, 0.05);
        planner
            .buffer_line(CartesianPoint::new(10.0, 0.0, 0.0), 600.0, false)
            .unwrap();
        planner
            .buffer_line(CartesianPoint::new(20.0, 0.0, 0.0), 600.0, false)
            .unwrap();

        let first = planner.buffer.get(0).unwrap();
        assert!((first.max_entry_speed - 0.0).abs() < 1e-3 || first.max_entry_speed >= 0.0);
        let second = planner.buffer.get(1).unwrap();
        // Collinear junction: max_entry_speed should reach the full nominal speed.
        assert!((second.max_entry_speed - 600.0).abs() < 1.0);
    }

    #[test]
    fn buffer_full_is_reported() {
        let mut planner: MotionPlanner<2> =
            MotionPlanner::new([200.0, 200.0, 200.0], 36_000.0, 0.05);
        planner
            .buffer_line(CartesianPoint::new(1.0, 0.0, 0.0), 600.0, false)
            .unwrap();
        planner
            .buffer_line(CartesianPoint::new(2.0, 0.0, 0.0), 600.0, false)
            .unwrap();
        let err = planner
            .buffer_line(CartesianPoint::new(3.0, 0.0, 0.0), 600.0, false)
            .unwrap_err();
        assert_eq!(err, PlannerError::BufferFull);
    }

    #[test]
    fn single_step_block_still_executes() {
        let mut planner: MotionPlanner<8> =
            MotionPlanner::new([200.0, 200.0, 200.0], 36_000.0, 0.05);
        planner
            .buffer_line(CartesianPoint::new(1.0 / 200.0, 0.0, 0.0), 600.0, false)
            .unwrap();
        let block = planner.buffer.peek_tail().unwrap();
        assert_eq!(block.step_event_count, 1);
    }
}
