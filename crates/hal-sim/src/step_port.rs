//! Simulated step/direction GPIO and timers, driving [`step_gen::StepGenerator`]
//! without real hardware. A test (or the controller's simulated run loop)
//! calls [`SimTimer::fire`] in a loop, feeding `on_timer_interrupt` exactly
//! as a real compare-match ISR would.

use step_gen::{AtomicGpioPort, PulseResetTimer, StepTimer};

/// Records every write so a test can assert on the exact step/direction
/// sequence emitted.
#[derive(Debug, Default, Clone)]
pub struct SimStepPort {
    pub current: u8,
    pub history: Vec<u8>,
}

impl AtomicGpioPort for SimStepPort {
    fn set_and_clear_atomic(&mut self, set_mask: u8, clear_mask: u8) {
        self.current = (self.current | set_mask) & !clear_mask;
        self.history.push(self.current);
    }

    fn write(&mut self, mask: u8) {
        self.current = mask;
        self.history.push(self.current);
    }
}

/// The step-rate timer. `reload` is the last value the generator scheduled;
/// `stopped` latches once the generator calls `stop`, matching the ISR being
/// disabled at the peripheral.
#[derive(Debug, Default)]
pub struct SimTimer {
    pub reload: u32,
    pub stopped: bool,
    pub tick_count: u32,
}

impl StepTimer for SimTimer {
    fn set_reload(&mut self, cycles: u32) {
        self.reload = cycles;
        self.stopped = false;
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

/// The pulse-reset (one-shot) timer. Since the simulator has no real pulse
/// width to wait out, it just records the most recent arm call.
#[derive(Debug, Default)]
pub struct SimPulseReset {
    pub last_armed_us: Option<u16>,
    pub arm_count: u32,
}

impl PulseResetTimer for SimPulseReset {
    fn arm(&mut self, pulse_microseconds: u16) {
        self.last_armed_us = Some(pulse_microseconds);
        self.arm_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planner::block::{Block, BlockBuffer};
    use step_gen::StepGenerator;

    fn test_block(steps: [u32; 3]) -> Block {
        let event_count = steps.iter().copied().max().unwrap();
        Block {
            steps,
            direction_bits: 0,
            step_event_count: event_count,
            millimeters: event_count as f32 / 200.0,
            nominal_speed: 600.0,
            nominal_rate: 600.0 * 200.0,
            entry_speed: 0.0,
            max_entry_speed: 0.0,
            initial_rate: 800.0,
            final_rate: 800.0,
            rate_delta: 500.0,
            accelerate_until: event_count,
            decelerate_after: event_count,
            nominal_length_flag: false,
            recalculate_flag: false,
        }
    }

    #[test]
    fn runs_a_block_to_completion_through_the_simulated_ports() {
        let mut buffer: BlockBuffer<4> = BlockBuffer::new();
        buffer.push(test_block([5, 0, 0])).unwrap();
        let mut generator = StepGenerator::new(16_000_000, 0, 0, 4);
        generator.cycle_start();

        let mut step_port = SimStepPort::default();
        let mut dir_port = SimStepPort::default();
        let mut pulse_reset = SimPulseReset::default();
        let mut timer = SimTimer::default();
        let mut position = [0i64; 3];

        for _ in 0..20 {
            if generator.is_idle() {
                break;
            }
            generator.on_timer_interrupt(&mut buffer, &mut step_port, &mut dir_port, &mut pulse_reset, &mut timer, &mut position);
        }

        assert_eq!(position[0], 5);
        assert!(generator.is_idle());
        assert!(pulse_reset.arm_count >= 5);
    }
}
