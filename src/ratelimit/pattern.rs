//! Rate patterns: the functions that describe how fast tokens are produced.
//!
//! A pattern maps pattern-local time (milliseconds since the start of the
//! segment that owns it) to an instantaneous rate in tokens per second. The
//! only thing the rest of the crate ever asks of a pattern is the definite
//! integral of that rate over a window, so new shapes plug in by implementing
//! [`RatePattern::integrate`].

use std::fmt;

use crate::error::{RampgateError, Result};

/// Milliseconds per second, as a float for integral scaling.
const MILLIS_PER_SECOND: f64 = 1000.0;

/// A rate-over-time function exposing a definite-integral operation.
///
/// Implementations must be pure and stateless. `integrate(t0, t1)` must be
/// non-negative, and must not decrease as `t1` grows or as `t0` shrinks.
pub trait RatePattern: fmt::Debug + Send + Sync {
    /// Tokens produced between local times `t0` and `t1` (milliseconds).
    ///
    /// # Panics
    ///
    /// Panics if `t0 > t1`. Callers inside this crate never do that.
    fn integrate(&self, t0: u64, t1: u64) -> f64;
}

/// A fixed rate, in tokens per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant {
    rate: f64,
}

impl Constant {
    /// Create a constant pattern. The rate must be finite and positive.
    pub fn new(rate: f64) -> Result<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(RampgateError::InvalidPattern(format!(
                "constant rate must be > 0, got {}",
                rate
            )));
        }
        Ok(Self { rate })
    }

    /// The configured rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl RatePattern for Constant {
    fn integrate(&self, t0: u64, t1: u64) -> f64 {
        assert!(t0 <= t1, "integration window reversed: {} > {}", t0, t1);
        (self.rate * (t1 - t0) as f64 / MILLIS_PER_SECOND).max(0.0)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "constant({}/s)", self.rate)
    }
}

/// A rate that moves linearly from `start_rate` to `end_rate` over
/// `duration_ms`, then holds at `end_rate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linear {
    start_rate: f64,
    end_rate: f64,
    duration_ms: u64,
}

impl Linear {
    /// Create a linear ramp. Both rates must be finite and non-negative.
    pub fn new(start_rate: f64, end_rate: f64, duration_ms: u64) -> Result<Self> {
        let valid = |r: f64| r.is_finite() && r >= 0.0;
        if !valid(start_rate) || !valid(end_rate) {
            return Err(RampgateError::InvalidPattern(format!(
                "linear rates must be >= 0, got start={} end={}",
                start_rate, end_rate
            )));
        }
        Ok(Self {
            start_rate,
            end_rate,
            duration_ms,
        })
    }

    /// Create a linear ramp whose duration is given in whole seconds.
    pub fn over_secs(start_rate: f64, end_rate: f64, duration_secs: u64) -> Result<Self> {
        let duration_ms = duration_secs.checked_mul(1000).ok_or_else(|| {
            RampgateError::InvalidPattern(format!(
                "linear duration of {}s overflows milliseconds",
                duration_secs
            ))
        })?;
        Self::new(start_rate, end_rate, duration_ms)
    }

    /// Rate at local time 0.
    pub fn start_rate(&self) -> f64 {
        self.start_rate
    }

    /// Rate at the end of the ramp and afterwards.
    pub fn end_rate(&self) -> f64 {
        self.end_rate
    }

    /// Length of the ramp in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

impl RatePattern for Linear {
    fn integrate(&self, t0: u64, t1: u64) -> f64 {
        assert!(t0 <= t1, "integration window reversed: {} > {}", t0, t1);

        let duration = self.duration_ms;
        let a = t0.min(duration) as f64;
        let b = t1.min(duration) as f64;

        // r(t) = start + slope * t over the ramp
        let mut tokens = 0.0;
        if duration > 0 {
            let slope = (self.end_rate - self.start_rate) / duration as f64;
            tokens = self.start_rate * (b - a) + 0.5 * slope * (b * b - a * a);
        }

        // Flat tail at end_rate for anything queried past the ramp.
        if t1 > duration {
            tokens += self.end_rate * (t1 - t0.max(duration)) as f64;
        }

        (tokens / MILLIS_PER_SECOND).max(0.0)
    }
}

impl fmt::Display for Linear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "linear({}/s -> {}/s over {}ms)",
            self.start_rate, self.end_rate, self.duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_constant_rejects_non_positive_rate() {
        assert!(Constant::new(0.0).is_err());
        assert!(Constant::new(-5.0).is_err());
        assert!(Constant::new(f64::NAN).is_err());
        assert!(Constant::new(f64::INFINITY).is_err());
        assert!(Constant::new(0.5).is_ok());
    }

    #[test]
    fn test_constant_integrate() {
        let pattern = Constant::new(10.0).unwrap();

        assert_eq!(pattern.integrate(0, 1000), 10.0);
        assert_eq!(pattern.integrate(250, 750), 5.0);
        assert_eq!(pattern.integrate(400, 400), 0.0);
    }

    #[test]
    #[should_panic(expected = "integration window reversed")]
    fn test_constant_reversed_window_panics() {
        let pattern = Constant::new(10.0).unwrap();
        pattern.integrate(10, 5);
    }

    #[test]
    fn test_linear_rejects_negative_rates() {
        assert!(Linear::new(-1.0, 10.0, 1000).is_err());
        assert!(Linear::new(1.0, -10.0, 1000).is_err());
        assert!(Linear::new(f64::NAN, 10.0, 1000).is_err());
        assert!(Linear::new(0.0, 0.0, 0).is_ok());
    }

    #[test]
    fn test_linear_over_secs() {
        let pattern = Linear::over_secs(0.0, 10.0, 3).unwrap();
        assert_eq!(pattern.duration_ms(), 3000);
        assert!(Linear::over_secs(0.0, 10.0, u64::MAX).is_err());
    }

    #[test]
    fn test_linear_full_ramp_is_triangle_area() {
        // 0 -> 10 tokens/s over one second yields half of 10
        let pattern = Linear::new(0.0, 10.0, 1000).unwrap();
        assert!(approx_eq(pattern.integrate(0, 1000), 5.0));

        // Falling ramp yields the same area
        let pattern = Linear::new(10.0, 0.0, 1000).unwrap();
        assert!(approx_eq(pattern.integrate(0, 1000), 5.0));
    }

    #[test]
    fn test_linear_partial_window() {
        // r(t) = 10 + 10t over 1s; integral 0..0.5s = 5 + 1.25
        let pattern = Linear::new(10.0, 20.0, 1000).unwrap();
        assert!(approx_eq(pattern.integrate(0, 500), 6.25));
        assert!(approx_eq(pattern.integrate(500, 1000), 8.75));
    }

    #[test]
    fn test_linear_tail_past_duration() {
        let pattern = Linear::new(0.0, 10.0, 1000).unwrap();

        // Ramp area plus one second at the end rate
        assert!(approx_eq(pattern.integrate(0, 2000), 15.0));
        // Entirely in the tail
        assert!(approx_eq(pattern.integrate(1500, 2000), 5.0));
    }

    #[test]
    fn test_linear_zero_duration_is_flat_tail() {
        let pattern = Linear::new(3.0, 7.0, 0).unwrap();
        assert!(approx_eq(pattern.integrate(0, 1000), 7.0));
        assert_eq!(pattern.integrate(0, 0), 0.0);
    }

    #[test]
    fn test_linear_monotonic_in_window() {
        let pattern = Linear::new(50.0, 5.0, 2000).unwrap();
        let mut previous = 0.0;
        for t1 in (0..=3000).step_by(100) {
            let value = pattern.integrate(0, t1);
            assert!(value >= previous);
            previous = value;
        }
    }

    #[test]
    fn test_display() {
        let constant = Constant::new(2.5).unwrap();
        assert_eq!(constant.to_string(), "constant(2.5/s)");

        let linear = Linear::new(1.0, 2.0, 500).unwrap();
        assert_eq!(linear.to_string(), "linear(1/s -> 2/s over 500ms)");
    }
}
