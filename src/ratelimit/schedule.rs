//! Piecewise refill schedules.
//!
//! A [`Schedule`] is an ordered, immutable partition of time into
//! [`Segment`]s. It answers one question: how many tokens were produced
//! between two instants, measured in milliseconds since the schedule began.
//! The answer is the sum of per-segment definite integrals over the
//! intersection of the query window with each segment.
//!
//! Production stops at the end of the last segment. Time past the schedule's
//! total duration yields nothing, no matter how far the clock advances.

use std::sync::Arc;
use tracing::debug;

use crate::error::{RampgateError, Result};

use super::pattern::RatePattern;
use super::segment::Segment;

/// Default cap on accumulated tokens.
pub const DEFAULT_MAX_TOKENS: f64 = 1_000_000.0;

/// Above this many segments, lookups switch from a linear scan to binary search.
const LINEAR_SCAN_LIMIT: usize = 64;

/// Which side of a segment seam an exact boundary hit resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    /// Resolve to the segment that begins at the seam.
    Start,
    /// Resolve to the segment that ends at the seam.
    End,
}

/// An ordered, immutable sequence of segments with precomputed offsets.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Segments in time order
    segments: Vec<Segment>,
    /// prefix[i] is the start offset of segments[i]; the last entry is the total
    prefix: Vec<u64>,
    /// Sum of all segment durations in milliseconds
    total_duration_ms: u64,
    /// Cap on accumulated tokens
    max_tokens: f64,
}

impl Schedule {
    /// Start building a new schedule.
    pub fn builder() -> ScheduleBuilder {
        ScheduleBuilder::new()
    }

    /// Tokens produced between `last_refill_ms` and `now_ms`, both measured
    /// from the start of the schedule.
    pub fn calculate_tokens(&self, last_refill_ms: u64, now_ms: u64) -> f64 {
        if last_refill_ms >= self.total_duration_ms {
            return 0.0;
        }
        let now_ms = now_ms.min(self.total_duration_ms);
        if last_refill_ms >= now_ms {
            return 0.0;
        }

        let start_idx = self.find_segment(last_refill_ms, Boundary::Start);
        let end_idx = self.find_segment(now_ms, Boundary::End);

        let start_offset = self.prefix[start_idx];
        if start_idx == end_idx {
            return self.segments[start_idx]
                .integrate(last_refill_ms - start_offset, now_ms - start_offset);
        }

        let head = self.segments[start_idx].integrate_from(last_refill_ms - start_offset);
        let body: f64 = self.segments[start_idx + 1..end_idx]
            .iter()
            .map(Segment::integrate_full)
            .sum();
        let tail = self.segments[end_idx].integrate_upto(now_ms - self.prefix[end_idx]);

        head + body + tail
    }

    /// Cap on the accumulated token balance.
    pub fn max_tokens(&self) -> f64 {
        self.max_tokens
    }

    /// Total length of the schedule in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the schedule has no segments (and so never produces tokens).
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segments in time order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Start offset of every segment followed by the total duration.
    pub fn prefix_ms(&self) -> &[u64] {
        &self.prefix
    }

    fn find_segment(&self, t: u64, boundary: Boundary) -> usize {
        if self.segments.len() <= LINEAR_SCAN_LIMIT {
            find_segment_linear(&self.prefix, t, boundary)
        } else {
            find_segment_binary(&self.prefix, t, boundary)
        }
    }
}

/// Index of the segment containing `t`, by scanning the prefix array.
///
/// Callers guarantee `0 <= t < total` for `Start` and `0 < t <= total` for `End`.
fn find_segment_linear(prefix: &[u64], t: u64, boundary: Boundary) -> usize {
    for (i, &offset) in prefix.iter().enumerate() {
        let past = match boundary {
            Boundary::Start => offset > t,
            Boundary::End => offset >= t,
        };
        if past {
            return i.saturating_sub(1);
        }
    }
    prefix.len().saturating_sub(2)
}

/// Same contract as [`find_segment_linear`], by binary search.
fn find_segment_binary(prefix: &[u64], t: u64, boundary: Boundary) -> usize {
    let after = match boundary {
        Boundary::Start => prefix.partition_point(|&offset| offset <= t),
        Boundary::End => prefix.partition_point(|&offset| offset < t),
    };
    after
        .saturating_sub(1)
        .min(prefix.len().saturating_sub(2))
}

/// Append-only builder for [`Schedule`].
///
/// Validation is deferred to [`ScheduleBuilder::build`], which reports the
/// first invalid segment.
#[derive(Debug, Clone)]
pub struct ScheduleBuilder {
    /// Patterns with their durations in milliseconds (None on overflow)
    pending: Vec<(Arc<dyn RatePattern>, Option<u64>)>,
    max_tokens: f64,
}

impl ScheduleBuilder {
    /// Create an empty builder with the default token cap.
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Append a segment lasting `duration_secs` seconds.
    pub fn segment<P>(self, pattern: P, duration_secs: u64) -> Self
    where
        P: RatePattern + 'static,
    {
        self.shared_segment(Arc::new(pattern), duration_secs)
    }

    /// Append a segment backed by an already shared pattern.
    pub fn shared_segment(mut self, pattern: Arc<dyn RatePattern>, duration_secs: u64) -> Self {
        self.pending.push((pattern, duration_secs.checked_mul(1000)));
        self
    }

    /// Append a segment lasting `duration_ms` milliseconds.
    pub fn segment_millis<P>(mut self, pattern: P, duration_ms: u64) -> Self
    where
        P: RatePattern + 'static,
    {
        self.pending.push((Arc::new(pattern), Some(duration_ms)));
        self
    }

    /// Override the cap on accumulated tokens.
    pub fn max_tokens(mut self, max_tokens: f64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Validate every segment and freeze the schedule.
    pub fn build(self) -> Result<Schedule> {
        if !self.max_tokens.is_finite() || self.max_tokens <= 0.0 {
            return Err(RampgateError::InvalidSchedule(format!(
                "max_tokens must be finite and > 0, got {}",
                self.max_tokens
            )));
        }

        let mut segments = Vec::with_capacity(self.pending.len());
        let mut prefix = Vec::with_capacity(self.pending.len() + 1);
        let mut total_duration_ms: u64 = 0;
        prefix.push(total_duration_ms);

        for (index, (pattern, duration_ms)) in self.pending.into_iter().enumerate() {
            let duration_ms = duration_ms.ok_or_else(|| {
                RampgateError::InvalidSegment(format!(
                    "segment {} duration overflows milliseconds",
                    index
                ))
            })?;
            let segment = Segment::new(pattern, duration_ms).map_err(|e| match e {
                RampgateError::InvalidSegment(msg) => {
                    RampgateError::InvalidSegment(format!("segment {}: {}", index, msg))
                }
                other => other,
            })?;

            total_duration_ms = total_duration_ms
                .checked_add(segment.duration_ms())
                .ok_or_else(|| {
                    RampgateError::InvalidSchedule("total duration overflows".to_string())
                })?;
            prefix.push(total_duration_ms);
            segments.push(segment);
        }

        debug!(
            segments = segments.len(),
            total_duration_ms = total_duration_ms,
            max_tokens = self.max_tokens,
            prefix = ?prefix,
            "Schedule built"
        );

        Ok(Schedule {
            segments,
            prefix,
            total_duration_ms,
            max_tokens: self.max_tokens,
        })
    }
}

impl Default for ScheduleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
