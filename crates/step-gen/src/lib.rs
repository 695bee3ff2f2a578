#![deny(clippy::all)]
#![cfg_attr(not(test), no_std)]

//! # Trapezoidal Step-Pulse Generator
//!
//! This is the hard real-time half of the controller: given the block
//! currently at the tail of the planner's [`BlockBuffer`], this module
//! drives three Bresenham counters and a trapezoid-rate ticker to emit step
//! pulses at exactly the instantaneous rate the planner computed, tick by
//! timer tick.
//!
//! ## Pipelined, Low-Latency Design
//!
//! Mirrors the pipelined architecture this lineage's stepper controller
//! uses for its step/direction outputs: direction bits are written one tick
//! *before* the step edge they govern, so direction is always stable across
//! the step edge; pulse bits staged this tick are written out at the very
//! start of the next call, before any of the heavier Bresenham/trapezoid
//! arithmetic runs. The critical path per tick is therefore just two GPIO
//! writes and one timer reschedule.
//!
//! ## Safety
//!
//! - **No heap allocations**, fully `#[no_std]`.
//! - Reads the tail [`planner::Block`] by value (`Block` is `Copy`) and
//!   never mutates the buffer except to retire the tail when a block
//!   finishes — the single-writer-per-cursor discipline the original
//!   firmware relies on.

use planner::block::BlockBuffer;
use planner::planner::ACCELERATION_TICKS_PER_SECOND;

/// Steps/min floor enforced on the trapezoid ticker's adjusted rate,
/// preventing an astronomically long timer period.
pub const MINIMUM_STEPS_PER_MINUTE: f32 = 800.0;

/// A GPIO port carrying the three step or three direction outputs, written
/// with a single atomic multi-bit operation where the hardware allows it
/// (e.g. STM32's BSRR register).
pub trait AtomicGpioPort {
    fn set_and_clear_atomic(&mut self, set_mask: u8, clear_mask: u8);
    fn write(&mut self, mask: u8);
}

/// The step-rate timer: reschedules itself for the next compare event and
/// can be stopped when the buffer runs dry.
pub trait StepTimer {
    fn set_reload(&mut self, cycles: u32);
    fn stop(&mut self);
}

/// The secondary timer that returns the step outputs to their idle level
/// `pulse_microseconds` after a pulse is emitted.
pub trait PulseResetTimer {
    fn arm(&mut self, pulse_microseconds: u16);
}

/// Runtime state machine driven by cycle-start/feed-hold/cycle-stop.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GeneratorState {
    Idle,
    Running,
    FeedHolding,
    FeedHoldComplete,
}

/// Raised to the main context so the runtime dispatcher can act on it; the
/// generator itself never touches planner/interpreter state directly.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GeneratorEvent {
    None,
    /// The buffer emptied out (or feed hold ran to completion): the
    /// equivalent of the original's `EXEC_CYCLE_STOP`.
    CycleStop,
}

struct ActiveBlock {
    block: planner::block::Block,
    counters: [i32; 3],
    step_events_completed: u32,
}

/// ISR-owned execution state: Bresenham counters, trapezoid ticker, and the
/// small amount of pipeline state needed to stage direction one tick ahead
/// of the step edge it governs.
pub struct StepGenerator {
    state: GeneratorState,
    active: Option<ActiveBlock>,
    trapezoid_tick_cycle_counter: u32,
    trapezoid_adjusted_rate: f32,
    min_safe_rate: f32,
    cycles_per_acceleration_tick: u32,
    timer_fosc: u32,
    pending_direction_bits: u8,
    pending_step_bits: u8,
    step_invert_mask: u8,
    dir_invert_mask: u8,
    pulse_microseconds: u16,
    /// True once `cycle_start` was asserted; cleared on `CycleStop`.
    auto_resume_decel: bool,
}

impl StepGenerator {
    pub fn new(timer_fosc: u32, step_invert_mask: u8, dir_invert_mask: u8, pulse_microseconds: u16) -> Self {
        StepGenerator {
            state: GeneratorState::Idle,
            active: None,
            trapezoid_tick_cycle_counter: 0,
            trapezoid_adjusted_rate: 0.0,
            min_safe_rate: 0.0,
            cycles_per_acceleration_tick: (timer_fosc as f32 / ACCELERATION_TICKS_PER_SECOND) as u32,
            timer_fosc,
            pending_direction_bits: 0,
            pending_step_bits: 0,
            step_invert_mask,
            dir_invert_mask,
            pulse_microseconds,
            auto_resume_decel: false,
        }
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, GeneratorState::Idle)
    }

    /// `st_cycle_start`: leaves `Idle`/`FeedHoldComplete` and begins
    /// consuming the buffer.
    pub fn cycle_start(&mut self) {
        if matches!(self.state, GeneratorState::Idle | GeneratorState::FeedHoldComplete) {
            self.state = GeneratorState::Running;
        }
    }

    /// `st_feed_hold`: begins controlled deceleration of the current block.
    pub fn feed_hold(&mut self) {
        if self.state == GeneratorState::Running {
            self.state = GeneratorState::FeedHolding;
        }
    }

    /// `st_reset`: hard stop, discarding any in-flight block.
    pub fn reset<const N: usize>(&mut self, buffer: &mut BlockBuffer<N>) {
        self.state = GeneratorState::Idle;
        self.active = None;
        while buffer.advance_tail().is_some() {}
    }

    fn cycles_per_step_event(&self, steps_per_minute: f32) -> u32 {
        let rate = steps_per_minute.max(MINIMUM_STEPS_PER_MINUTE);
        ((self.timer_fosc as f32) * 60.0 / rate) as u32
    }

    /// The core interrupt handler. Must be called from the step-rate timer's
    /// compare interrupt.
    #[inline(always)]
    pub fn on_timer_interrupt<const N: usize, S, D, P, T>(
        &mut self,
        buffer: &mut BlockBuffer<N>,
        step_port: &mut S,
        dir_port: &mut D,
        pulse_reset: &mut P,
        timer: &mut T,
        position: &mut [i64; 3],
    ) -> GeneratorEvent
    where
        S: AtomicGpioPort,
        D: AtomicGpioPort,
        P: PulseResetTimer,
        T: StepTimer,
    {
        // 1. Emit the direction bits staged last tick.
        dir_port.write(self.pending_direction_bits ^ self.dir_invert_mask);
        // 2. Emit the pulse bits staged last tick.
        let pulse_mask = self.pending_step_bits ^ self.step_invert_mask;
        step_port.set_and_clear_atomic(pulse_mask, pulse_mask);
        // 3. Arm the pulse-reset timer to return step lines idle.
        if self.pending_step_bits != 0 {
            pulse_reset.arm(self.pulse_microseconds);
        }
        self.pending_step_bits = 0;

        if self.state == GeneratorState::Idle {
            timer.stop();
            return GeneratorEvent::None;
        }

        // 5. Load a new block if none is active.
        if self.active.is_none() {
            match buffer.peek_tail() {
                Some(block) => {
                    let half = (block.step_event_count / 2) as i32;
                    self.active = Some(ActiveBlock {
                        block: *block,
                        counters: [-half, -half, -half],
                        step_events_completed: 0,
                    });
                    self.trapezoid_adjusted_rate = block.initial_rate;
                    self.min_safe_rate = 1.5 * block.rate_delta;
                    self.trapezoid_tick_cycle_counter = 0;
                    let rate = self.trapezoid_adjusted_rate;
                    timer.set_reload(self.cycles_per_step_event(rate));
                }
                None => {
                    self.state = GeneratorState::Idle;
                    timer.stop();
                    return GeneratorEvent::CycleStop;
                }
            }
        }

        let event = {
            let mut active = self.active.take().unwrap();
            self.pending_direction_bits = active.block.direction_bits;

            // 6. Bresenham: advance counters, stage step bits, update position.
            let mut step_bits = 0u8;
            for axis in 0..3 {
                active.counters[axis] += active.block.steps[axis] as i32;
                if active.counters[axis] > 0 {
                    active.counters[axis] -= active.block.step_event_count as i32;
                    step_bits |= 1 << axis;
                    if (active.block.direction_bits >> axis) & 1 != 0 {
                        position[axis] -= 1;
                    } else {
                        position[axis] += 1;
                    }
                }
            }
            self.pending_step_bits = step_bits;

            // 7. Count this step event; release the block once it completes.
            active.step_events_completed += 1;
            let finished = active.step_events_completed >= active.block.step_event_count;

            // 8. Trapezoid ticker.
            let rate = self.run_trapezoid_ticker(&mut active);
            timer.set_reload(self.cycles_per_step_event(rate));

            self.active = Some(active);
            finished
        };

        if event {
            self.active = None;
            buffer.advance_tail();
            if buffer.is_empty() {
                if self.state != GeneratorState::FeedHolding {
                    self.state = GeneratorState::Idle;
                    return GeneratorEvent::CycleStop;
                }
            }
        }
        GeneratorEvent::None
    }

    fn run_trapezoid_ticker(&mut self, active: &mut ActiveBlock) -> f32 {
        self.trapezoid_tick_cycle_counter += self.cycles_per_step_event(self.trapezoid_adjusted_rate);
        if self.trapezoid_tick_cycle_counter < self.cycles_per_acceleration_tick {
            return self.trapezoid_adjusted_rate;
        }

        // Entering deceleration needs finer resolution right at the transition,
        // so the first post-transition tick only waits half the usual interval.
        self.trapezoid_tick_cycle_counter = if active.step_events_completed == active.block.decelerate_after {
            self.cycles_per_acceleration_tick / 2
        } else {
            0
        };

        if self.state == GeneratorState::FeedHolding {
            if self.trapezoid_adjusted_rate <= active.block.rate_delta {
                self.state = GeneratorState::FeedHoldComplete;
            } else {
                self.trapezoid_adjusted_rate -= active.block.rate_delta;
            }
            return self.trapezoid_adjusted_rate.max(MINIMUM_STEPS_PER_MINUTE);
        }

        if active.step_events_completed < active.block.accelerate_until {
            self.trapezoid_adjusted_rate =
                (self.trapezoid_adjusted_rate + active.block.rate_delta).min(active.block.nominal_rate);
        } else if active.step_events_completed >= active.block.decelerate_after {
            if self.trapezoid_adjusted_rate > self.min_safe_rate {
                self.trapezoid_adjusted_rate =
                    (self.trapezoid_adjusted_rate - active.block.rate_delta).max(active.block.final_rate);
            } else {
                self.trapezoid_adjusted_rate = (self.trapezoid_adjusted_rate / 2.0).max(active.block.final_rate);
            }
        } else if (self.trapezoid_adjusted_rate - active.block.nominal_rate).abs() > f32::EPSILON {
            self.trapezoid_adjusted_rate = active.block.nominal_rate;
        }
        self.trapezoid_adjusted_rate.max(MINIMUM_STEPS_PER_MINUTE)
    }
}
