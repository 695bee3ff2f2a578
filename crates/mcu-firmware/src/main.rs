#![no_std]
#![no_main]

use defmt_rtt as _; // global logger
use panic_probe as _;

pub mod safety;

#[path = "../boards"]
pub mod boards {
    pub mod stm32f407 {
        pub mod pins;
    }
}

mod rtic_main;
use rtic_main as _;
