//! In-process machine: wires the interpreter, planner, and step generator
//! together the way `mcu-firmware` does, but polled from a plain loop
//! instead of an RTIC timer ISR. Used by the `simulate` subcommand and by
//! this crate's own integration tests so they can exercise the full
//! planner/step-gen/interpreter stack without a serial cable.
//!
//! Pumping the generator only between lines (rather than interleaved with
//! the planner the way a real ISR would be) is a known simplification: a
//! single line whose moves exceed `BUFFER_CAPACITY` blocks will deadlock in
//! `mc_line`'s buffer-full wait. `BUFFER_CAPACITY` is sized generously for
//! ordinary arcs and test programs; the real interleaved behavior is
//! exercised by `step-gen`'s own unit tests and by `mcu-firmware` on target.

use gcode::{Auxiliary, CoolantState, GCodeError, Interpreter, SpindleState};
use hal::{FunctionGenerator, WaveShape};
use hal_sim::{SimClock, SimFunctionGenerator, SimPulseReset, SimStepPort, SimTimer};
use motion_control::{format_status_report, HomingRoutine, RuntimeEnvironment, SystemState};
use planner::MotionPlanner;
use settings::SettingsRecord;
use step_gen::StepGenerator;

pub const BUFFER_CAPACITY: usize = 256;

/// A `RuntimeEnvironment` that only captures the lines the dispatcher wants
/// echoed to the console; cycle/feed-hold/reset transitions are driven
/// directly by [`ControllerMachine::pump`] afterward, not from inside this
/// callback, so it carries no reference to the buffer or generator.
struct ConsoleEnvironment<'a> {
    output: &'a mut Vec<String>,
}

impl<'a> RuntimeEnvironment for ConsoleEnvironment<'a> {
    fn hard_stop(&mut self) {}
    fn feed_hold(&mut self) {}
    fn cycle_reinitialize(&mut self) {}
    fn cycle_start(&mut self) {}
    fn emit_line(&mut self, line: &str) {
        self.output.push(line.to_string());
    }
}

/// Homing simply zeroes every axis; there is no real switch to seek.
struct ZeroHoming;

impl HomingRoutine for ZeroHoming {
    fn home(&mut self) -> [i64; 3] {
        [0, 0, 0]
    }
}

/// Logs spindle/coolant transitions instead of toggling real relays.
struct LoggingAux;

impl Auxiliary for LoggingAux {
    fn set_spindle(&mut self, state: SpindleState) {
        tracing::info!(?state, "spindle");
    }

    fn set_coolant(&mut self, state: CoolantState) {
        tracing::info!(?state, "coolant");
    }
}

/// The planner, interpreter, and step generator bound together as one
/// in-process machine.
pub struct ControllerMachine {
    pub interpreter: Interpreter,
    pub planner: MotionPlanner<BUFFER_CAPACITY>,
    pub state: SystemState,
    pub settings: SettingsRecord,
    generator: StepGenerator,
    step_port: SimStepPort,
    dir_port: SimStepPort,
    pulse_reset: SimPulseReset,
    timer: SimTimer,
    position: [i64; 3],
    clock: SimClock,
    charge_pump: SimFunctionGenerator,
}

impl ControllerMachine {
    pub fn new(settings: SettingsRecord) -> Self {
        let generator = StepGenerator::new(16_000_000, 0, settings.invert_mask as u8, settings.pulse_microseconds as u16);
        ControllerMachine {
            interpreter: Interpreter::default(),
            planner: MotionPlanner::new(settings.steps_per_mm, settings.acceleration, settings.junction_deviation),
            state: SystemState::default(),
            settings,
            generator,
            step_port: SimStepPort::default(),
            dir_port: SimStepPort::default(),
            pulse_reset: SimPulseReset::default(),
            timer: SimTimer::default(),
            position: [0; 3],
            clock: SimClock::default(),
            charge_pump: SimFunctionGenerator::default(),
        }
    }

    /// `?` is a real-time query in the wire protocol, not a G-code line: the
    /// caller should intercept it before reaching [`Self::execute_line`].
    pub fn status_report(&self) -> heapless::String<128> {
        format_status_report(&self.state, self.settings.steps_per_mm)
    }

    /// Feeds one already-normalized line through the interpreter, then
    /// drains the block buffer to completion. Returns any console lines the
    /// dispatcher queued (status reports, mostly).
    pub fn execute_line(&mut self, line: &str) -> Result<Vec<String>, GCodeError> {
        let mut output = Vec::new();
        let mut env = ConsoleEnvironment { output: &mut output };
        let result = gcode::execute_line(
            &mut self.interpreter,
            line,
            &mut self.planner,
            &mut self.state,
            &self.settings,
            &mut env,
            &mut ZeroHoming,
            &mut self.clock,
            &mut LoggingAux,
            None,
        );
        self.pump();
        result.map(|()| output)
    }

    /// Runs the step generator until the buffer is empty and no block is
    /// mid-flight, mirroring what the real step-rate ISR would do while the
    /// main context was blocked inside `mc_line`'s wait loop.
    fn pump(&mut self) {
        if !self.planner.buffer.is_empty() {
            self.generator.cycle_start();
            if !self.charge_pump.is_running() {
                self.charge_pump.start(1000, 50, WaveShape::Square);
            }
        }
        while !self.generator.is_idle() || !self.planner.buffer.is_empty() {
            self.generator.on_timer_interrupt(
                &mut self.planner.buffer,
                &mut self.step_port,
                &mut self.dir_port,
                &mut self.pulse_reset,
                &mut self.timer,
                &mut self.position,
            );
        }
        self.state.position = self.position;
        if self.state.abort {
            self.charge_pump.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_straight_line_move_advances_position() {
        let mut machine = ControllerMachine::new(SettingsRecord::default());
        machine.execute_line("G1 X10 Y0 Z0 F600").unwrap();
        let pos = machine.planner.position();
        assert!((pos.x - 10.0).abs() < 0.1);
    }

    #[test]
    fn status_report_reflects_the_current_position() {
        let mut machine = ControllerMachine::new(SettingsRecord::default());
        machine.execute_line("G1 X1 F600").unwrap();
        assert!(machine.status_report().contains("MPos"));
    }

    #[test]
    fn charge_pump_runs_after_a_move_and_stops_on_abort() {
        let mut machine = ControllerMachine::new(SettingsRecord::default());
        machine.execute_line("G1 X10 F600").unwrap();
        assert!(machine.charge_pump.is_running());

        machine.state.abort = true;
        machine.execute_line("G1 X20 F600").unwrap();
        assert!(!machine.charge_pump.is_running());
    }

    #[test]
    fn an_unsupported_word_is_rejected() {
        let mut machine = ControllerMachine::new(SettingsRecord::default());
        assert!(machine.execute_line("G200").is_err());
    }
}
