//! # RS-274 line tokenizer, modal interpreter, and console protocol
//!
//! Turns raw serial bytes into complete lines ([`line`]), lines into words
//! ([`word`]), and words into planner calls against the persistent modal
//! state a controller carries between lines ([`interpreter`]).

#![cfg_attr(not(feature = "std"), no_std)]

pub mod error;
pub mod interpreter;
pub mod line;
pub mod word;

pub use error::GCodeError;
pub use interpreter::{
    Auxiliary, CoolantState, DistanceMode, FeedRateMode, Interpreter, MotionMode, Plane, SpindleState, Units,
    execute_line,
};
pub use line::{format_error, format_ok, LineEvent, LineReader, LINE_BUFFER_SIZE};
pub use word::{tokenize, Word, MAX_WORDS};
