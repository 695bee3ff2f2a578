//! Pin table for the 3-axis controller board.
//!
//! Per the generic-parameter-over-macro-concatenation guidance for this
//! firmware's HAL boundary: one place names which physical pin drives which
//! axis, rather than scattering `concat_idents!`-style per-pin macros
//! through the ISR and init code.

use stm32f4xx_hal::gpio::{ErasedPin, Input, Output, PushPull};
use stm32f4xx_hal::pac::{GPIOA, GPIOB, GPIOC};
use stm32f4xx_hal::prelude::*;

/// Step/direction outputs for the three axes, the charge-pump and UART
/// pins, and the three hard-limit switch inputs, type-erased so they can
/// sit in plain arrays instead of distinct generic pin types.
pub struct AxisPins {
    pub step: [ErasedPin<Output<PushPull>>; 3],
    pub direction: [ErasedPin<Output<PushPull>>; 3],
    pub charge_pump: ErasedPin<Output<PushPull>>,
    pub limit_switches: [ErasedPin<Input>; 3],
    pub uart_tx: stm32f4xx_hal::gpio::gpioa::PA9<stm32f4xx_hal::gpio::Alternate<7>>,
    pub uart_rx: stm32f4xx_hal::gpio::gpioa::PA10<stm32f4xx_hal::gpio::Alternate<7>>,
}

impl AxisPins {
    pub fn new(gpioa: GPIOA, gpiob: GPIOB, gpioc: GPIOC) -> Self {
        let gpioa = gpioa.split();
        let gpiob = gpiob.split();
        let gpioc = gpioc.split();

        AxisPins {
            step: [
                gpioa.pa2.into_push_pull_output().erase(),
                gpiob.pb5.into_push_pull_output().erase(),
                gpioc.pc5.into_push_pull_output().erase(),
            ],
            direction: [
                gpioa.pa3.into_push_pull_output().erase(),
                gpiob.pb6.into_push_pull_output().erase(),
                gpioc.pc6.into_push_pull_output().erase(),
            ],
            charge_pump: gpiob.pb0.into_push_pull_output().erase(),
            // Normally-closed switches wired to ground: triggered reads low.
            limit_switches: [
                gpioa.pa4.into_pull_up_input().erase(),
                gpiob.pb8.into_pull_up_input().erase(),
                gpioc.pc7.into_pull_up_input().erase(),
            ],
            uart_tx: gpioa.pa9.into_alternate(),
            uart_rx: gpioa.pa10.into_alternate(),
        }
    }
}
