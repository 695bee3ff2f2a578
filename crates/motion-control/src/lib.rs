//! # Motion Control
//!
//! The motion front-end (`mc_line`/`mc_arc`/`mc_dwell`/`mc_go_home`), the
//! process-wide [`SystemState`], and the runtime command dispatcher that
//! services asynchronous reset/feed-hold/cycle-start requests between
//! planner calls.
//!
//! Sits directly above [`planner`] and below the line-protocol interpreter:
//! every G-code motion command is translated to a call into this crate,
//! never straight into the planner, so soft-limit clipping and runtime
//! polling stay centralized here.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod motion;
pub mod runtime;
pub mod sys;

pub use motion::{mc_arc, mc_dwell, mc_go_home, mc_line, synchronize, HomingRoutine, SoftLimits, DWELL_TIME_STEP_MS, N_ARC_CORRECTION};
pub use runtime::{execute_runtime, format_status_report, RuntimeEnvironment};
pub use sys::{CoordinateSystem, ExecuteFlags, SystemState};
