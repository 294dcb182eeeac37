//! Fixed-duration schedule segments.

use std::sync::Arc;

use crate::error::{RampgateError, Result};

use super::pattern::RatePattern;

/// A fixed-duration slice of a schedule governed by one rate pattern.
///
/// All offsets are local to the segment, in milliseconds.
#[derive(Debug, Clone)]
pub struct Segment {
    /// The rate function for this slice
    pattern: Arc<dyn RatePattern>,
    /// Length of this slice in milliseconds
    duration_ms: u64,
}

impl Segment {
    /// Create a new segment. The duration must be positive.
    pub fn new(pattern: Arc<dyn RatePattern>, duration_ms: u64) -> Result<Self> {
        if duration_ms == 0 {
            return Err(RampgateError::InvalidSegment(format!(
                "duration must be > 0 ms ({:?})",
                pattern
            )));
        }
        Ok(Self {
            pattern,
            duration_ms,
        })
    }

    /// Length of this segment in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// The pattern driving this segment.
    pub fn pattern(&self) -> &dyn RatePattern {
        self.pattern.as_ref()
    }

    /// Tokens produced over an arbitrary sub-window.
    pub fn integrate(&self, t0: u64, t1: u64) -> f64 {
        self.pattern.integrate(t0, t1)
    }

    /// Tokens produced from `t0` to the end of the segment.
    pub fn integrate_from(&self, t0: u64) -> f64 {
        self.pattern.integrate(t0, self.duration_ms)
    }

    /// Tokens produced from the start of the segment up to `t1`.
    pub fn integrate_upto(&self, t1: u64) -> f64 {
        self.pattern.integrate(0, t1)
    }

    /// Full-segment yield.
    pub fn integrate_full(&self) -> f64 {
        self.pattern.integrate(0, self.duration_ms)
    }
}
