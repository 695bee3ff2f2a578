//! # Safety Supervisor
//!
//! The hardware-level backstop beneath the RESET/feed-hold bits the runtime
//! dispatcher already services in software: an independent watchdog that
//! resets the MCU if the firmware loop hangs, and a latched emergency-stop
//! flag that the step ISR raises the instant a hard limit switch closes.

use core::sync::atomic::{AtomicBool, Ordering};
use stm32f4xx_hal::watchdog::IndependentWatchdog;

/// A specific safety-critical condition.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SafetyError {
    /// A hard limit switch closed while the axis was still commanded to move.
    HardLimitTriggered { axis: usize },
}

/// Aggregates the watchdog and the emergency-stop latch.
pub struct SafetyMonitor<'a> {
    watchdog: IndependentWatchdog<'a>,
    emergency_stop_active: AtomicBool,
}

impl<'a> SafetyMonitor<'a> {
    /// Starts the watchdog immediately; it must be fed before the device's
    /// configured timeout or the MCU resets.
    pub fn new(mut watchdog: IndependentWatchdog<'a>) -> Self {
        watchdog.unleash();
        Self { watchdog, emergency_stop_active: AtomicBool::new(false) }
    }

    /// Idempotent; only the first reason is reported.
    pub fn trigger_emergency_stop(&mut self, reason: SafetyError) {
        if !self.emergency_stop_active.swap(true, Ordering::SeqCst) {
            defmt::error!("emergency stop: {:?}", reason);
        }
    }

    pub fn clear_emergency_stop(&mut self) {
        self.emergency_stop_active.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_emergency_stop_active(&self) -> bool {
        self.emergency_stop_active.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn feed_watchdog(&mut self) {
        self.watchdog.feed();
    }
}
