//! Simulated relay-class GPIO (spindle/coolant enables, stepper disable) and
//! the charge-pump watchdog output.

use hal::{ConfigurablePin, FunctionGenerator, GpioPin, Level, PinDirection, WaveShape};

#[derive(Debug)]
pub struct SimGpioPin {
    level: Level,
    direction: PinDirection,
}

impl Default for SimGpioPin {
    fn default() -> Self {
        SimGpioPin { level: Level::default(), direction: PinDirection::Output }
    }
}

impl GpioPin for SimGpioPin {
    fn set(&mut self, level: Level) {
        self.level = level;
    }

    fn get(&self) -> Level {
        self.level
    }
}

impl ConfigurablePin for SimGpioPin {
    fn set_direction(&mut self, direction: PinDirection) {
        self.direction = direction;
    }
}

impl SimGpioPin {
    pub fn direction(&self) -> PinDirection {
        self.direction
    }
}

/// The charge-pump output: per the design notes, modeled as a pure
/// start/stop pair with no in-between state, started once at boot and
/// stopped only on an abort.
#[derive(Debug, Default)]
pub struct SimFunctionGenerator {
    running: bool,
    frequency_hz: u32,
    duty_percent: u8,
}

impl SimFunctionGenerator {
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl FunctionGenerator for SimFunctionGenerator {
    fn start(&mut self, frequency_hz: u32, duty_percent: u8, _shape: WaveShape) {
        self.running = true;
        self.frequency_hz = frequency_hz;
        self.duty_percent = duty_percent;
    }

    fn stop(&mut self) {
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_holds_the_last_level_written() {
        let mut pin = SimGpioPin::default();
        pin.set(Level::High);
        assert_eq!(pin.get(), Level::High);
    }

    #[test]
    fn charge_pump_starts_and_stops() {
        let mut pump = SimFunctionGenerator::default();
        pump.start(1000, 50, WaveShape::Square);
        assert!(pump.is_running());
        pump.stop();
        assert!(!pump.is_running());
    }
}
