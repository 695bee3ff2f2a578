//! The runtime command dispatcher: `execute_runtime`.
//!
//! Polled at every planner wait, every dwell step, and the top of every
//! parsed line. Services pending bits of [`crate::sys::ExecuteFlags`] in
//! strict priority order, exactly matching `original_source/runtime.c`.

use core::fmt::Write as _;

use crate::sys::{ExecuteFlags, SystemState};
use settings::SettingsRecord;

/// The seam between this crate's pure dispatch logic and whatever owns the
/// step generator, the serial console, and the HAL clock in the composing
/// crate (`mcu-firmware`'s RTIC resources, or the host simulation loop).
pub trait RuntimeEnvironment {
    /// Forces the step generator to a hard stop and empties the block
    /// buffer, serviced for `ExecuteFlags::RESET`.
    fn hard_stop(&mut self);
    /// Begins controlled deceleration of the current block.
    fn feed_hold(&mut self);
    /// Re-plans the buffer after a feed hold or natural cycle end.
    fn cycle_reinitialize(&mut self);
    /// Leaves `Idle`/`FeedHoldComplete` and resumes consuming the buffer.
    fn cycle_start(&mut self);
    /// Emits one line of output to the serial console.
    fn emit_line(&mut self, line: &str);
}

/// Renders the `MPos:[x,y,z],WPos:[x,y,z]\r\n` status line.
pub fn format_status_report(state: &SystemState, steps_per_mm: [f32; 3]) -> heapless::String<128> {
    let mut out = heapless::String::new();
    let _ = write!(
        out,
        "MPos:[{:.2},{:.2},{:.2}],WPos:[{:.2},{:.2},{:.2}]\r\n",
        state.machine_position_mm(0, steps_per_mm[0]),
        state.machine_position_mm(1, steps_per_mm[1]),
        state.machine_position_mm(2, steps_per_mm[2]),
        state.work_position_mm(0, steps_per_mm[0]),
        state.work_position_mm(1, steps_per_mm[1]),
        state.work_position_mm(2, steps_per_mm[2]),
    );
    out
}

/// Services every pending bit of `state.execute`, in priority order:
/// `RESET` > `STATUS_REPORT` > `FEED_HOLD` > `CYCLE_STOP` > `CYCLE_START`.
pub fn execute_runtime<E: RuntimeEnvironment>(
    state: &mut SystemState,
    settings: &SettingsRecord,
    env: &mut E,
) {
    if state.execute.is_empty() {
        return;
    }

    if state.execute.contains(ExecuteFlags::RESET) {
        state.abort = true;
        env.hard_stop();
        return;
    }

    if state.execute.contains(ExecuteFlags::STATUS_REPORT) {
        let line = format_status_report(state, settings.steps_per_mm);
        env.emit_line(&line);
        state.execute.clear(ExecuteFlags::STATUS_REPORT);
    }

    if state.execute.contains(ExecuteFlags::FEED_HOLD) {
        env.feed_hold();
        state.execute.clear(ExecuteFlags::FEED_HOLD);
    }

    if state.execute.contains(ExecuteFlags::CYCLE_STOP) {
        env.cycle_reinitialize();
        state.execute.clear(ExecuteFlags::CYCLE_STOP);
    }

    if state.execute.contains(ExecuteFlags::CYCLE_START) {
        env.cycle_start();
        state.auto_start = true;
        state.execute.clear(ExecuteFlags::CYCLE_START);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingEnv {
        hard_stopped: bool,
        feed_held: bool,
        reinitialized: bool,
        cycle_started: bool,
        lines: heapless::Vec<heapless::String<128>, 4>,
    }

    impl RuntimeEnvironment for RecordingEnv {
        fn hard_stop(&mut self) {
            self.hard_stopped = true;
        }
        fn feed_hold(&mut self) {
            self.feed_held = true;
        }
        fn cycle_reinitialize(&mut self) {
            self.reinitialized = true;
        }
        fn cycle_start(&mut self) {
            self.cycle_started = true;
        }
        fn emit_line(&mut self, line: &str) {
            let mut owned = heapless::String::new();
            let _ = owned.push_str(line);
            let _ = self.lines.push(owned);
        }
    }

    #[test]
    fn reset_short_circuits_everything_else() {
        let mut state = SystemState::default();
        state.execute.set(ExecuteFlags::RESET);
        state.execute.set(ExecuteFlags::CYCLE_START);
        let settings = SettingsRecord::default();
        let mut env = RecordingEnv::default();

        execute_runtime(&mut state, &settings, &mut env);

        assert!(state.abort);
        assert!(env.hard_stopped);
        assert!(!env.cycle_started);
        // RESET leaves its own bit and every other bit untouched on return.
        assert!(state.execute.contains(ExecuteFlags::CYCLE_START));
    }

    #[test]
    fn status_report_is_cleared_after_emission() {
        let mut state = SystemState::default();
        state.execute.set(ExecuteFlags::STATUS_REPORT);
        let settings = SettingsRecord::default();
        let mut env = RecordingEnv::default();

        execute_runtime(&mut state, &settings, &mut env);

        assert!(!state.execute.contains(ExecuteFlags::STATUS_REPORT));
        assert_eq!(env.lines.len(), 1);
        assert!(env.lines[0].starts_with("MPos:"));
    }

    #[test]
    fn all_four_non_reset_bits_service_in_priority_order() {
        let mut state = SystemState::default();
        state.execute.set(ExecuteFlags::STATUS_REPORT);
        state.execute.set(ExecuteFlags::FEED_HOLD);
        state.execute.set(ExecuteFlags::CYCLE_STOP);
        state.execute.set(ExecuteFlags::CYCLE_START);
        let settings = SettingsRecord::default();
        let mut env = RecordingEnv::default();

        execute_runtime(&mut state, &settings, &mut env);

        assert!(env.feed_held);
        assert!(env.reinitialized);
        assert!(env.cycle_started);
        assert!(state.execute.is_empty());
        assert!(state.auto_start);
    }
}
