//! # Simulated HAL
//!
//! An in-process implementation of the [`hal`] trait contracts and the
//! `step-gen` real-time port traits, used to run the full planner/step-gen/
//! interpreter stack in host tests and the `controller` binary's
//! `--simulate` mode without any physical MCU, serial cable, or EEPROM.
//!
//! Replaces a prior revision of this crate that shelled out to a separate
//! process over a Unix socket; everything here runs in the caller's own
//! address space, deterministically, with a virtual clock.

pub mod clock;
pub mod gpio;
pub mod serial;
pub mod step_port;
pub mod storage;

pub use clock::SimClock;
pub use gpio::{SimFunctionGenerator, SimGpioPin};
pub use serial::SimSerialPort;
pub use step_port::{SimPulseReset, SimStepPort, SimTimer};
pub use storage::{SimStorage, StorageFault};
