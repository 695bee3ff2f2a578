#![cfg_attr(not(feature = "std"), no_std)]

//! Hardware-abstraction contracts for the CNC controller core.
//!
//! Every trait here is a narrow, single-concern boundary so that the exact
//! same planner/step-generator/interpreter logic can run against real
//! embedded peripherals (`mcu-firmware`) and against an in-process simulated
//! backend (`hal-sim`) used for host testing. None of these traits know
//! anything about motion control; they only describe what a pin, a timer, a
//! non-volatile store, a serial console, and a square-wave generator can do.

/// Logic level for a digital output or input pin.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl core::ops::Not for Level {
    type Output = Level;
    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// A single GPIO pin that can be driven or sampled.
///
/// This is the non-motor-path GPIO contract (spindle/coolant relays, the
/// stepper-disable line, limit switch inputs). The step generator's own
/// high-frequency step/direction outputs use the narrower, latency-critical
/// `AtomicGpioPort`/`PulseTimer` traits defined in the `step-gen` crate
/// instead, since those two concerns have very different performance
/// budgets.
pub trait GpioPin {
    fn set(&mut self, level: Level);
    fn get(&self) -> Level;
}

/// Direction of data flow for a pin that can be reconfigured at runtime.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PinDirection {
    Input,
    Output,
}

/// A pin whose direction can be switched, e.g. a limit switch input that
/// doubles as a homing-sense output on some boards.
pub trait ConfigurablePin: GpioPin {
    fn set_direction(&mut self, direction: PinDirection);
}

/// Millisecond/microsecond delay and free-running tick sources used outside
/// the step-rate ISR: dwell polling, idle-lock timeouts, settling delays.
pub trait SystemClock {
    fn delay_ms(&mut self, ms: u32);
    fn delay_us(&mut self, us: u32);

    /// Monotonic tick counter in microseconds, used to time the stepper
    /// idle-lock delay without blocking.
    fn micros(&self) -> u64;
}

/// Non-volatile settings storage. A single fixed-size record is stored and
/// fetched as a whole; the settings crate layers the signature/CRC framing
/// on top of these raw byte operations.
pub trait NonVolatileStorage {
    type Error;

    fn store(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Self::Error>;
    fn fetch(&mut self, offset: usize, bytes: &mut [u8]) -> Result<(), Self::Error>;
}

/// The serial console the line protocol runs over.
pub trait SerialPort {
    type Error;

    /// Non-blocking byte read; returns `Ok(None)` when no byte is available.
    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error>;

    /// Blocking (or buffered) byte write.
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        for &b in bytes {
            self.write_byte(b)?;
        }
        Ok(())
    }
}

/// Shape of the signal driven by `FunctionGenerator`. Grbl's charge pump is
/// a fixed-frequency square wave; the trait leaves room for other shapes
/// since the underlying PWM/timer peripheral usually supports them anyway.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WaveShape {
    Square,
}

/// The "charge pump" output: a periodic signal external servo drives or
/// safety relays use to confirm the controller's main loop is alive.
/// Per the design notes, this is a start/stop pair with no in-between state.
pub trait FunctionGenerator {
    fn start(&mut self, frequency_hz: u32, duty_percent: u8, shape: WaveShape);
    fn stop(&mut self);
}
