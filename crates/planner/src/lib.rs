//! # Motion Planner Crate
//!
//! A deterministic look-ahead trapezoidal motion planner and block buffer,
//! usable on both host and MCU (`no_std`-friendly).
//!
//! Provides the core planning primitives used by the rest of the
//! controller:
//! - [`block`]: the `Block` record and its fixed-capacity `BlockBuffer`.
//! - [`planner`]: `MotionPlanner`, implementing junction-deviation cornering
//!   speed and the reverse/forward look-ahead sweeps.
//! - [`kinematics`]: the Cartesian-to-stepper mapping.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod block;
pub mod error;
pub mod kinematics;
pub mod planner;

pub use block::{Block, BlockBuffer};
pub use error::PlannerError;
pub use kinematics::{CartesianKinematics, Kinematics};
pub use planner::MotionPlanner;

/// A point in 3D cartesian space, in millimeters.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct CartesianPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl CartesianPoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        CartesianPoint { x, y, z }
    }
}
