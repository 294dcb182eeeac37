//! Rampgate - Scheduled Token-Bucket Admission Control
//!
//! This crate implements a token bucket whose refill rate follows a
//! user-defined, time-varying schedule (for example a ramp followed by a
//! steady state). Callers ask whether they may consume tokens now; the
//! answer reflects exactly what the schedule has produced since the bucket
//! was last drained, under lock-free concurrent access.

pub mod config;
pub mod error;
pub mod ratelimit;

pub use error::{RampgateError, Result};
pub use ratelimit::{RateLimiter, Schedule};
