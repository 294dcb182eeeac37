//! Scheduled token-bucket rate limiter.
//!
//! The whole mutable state of a limiter is one immutable [`LimiterState`]
//! snapshot held in an [`ArcSwap`]. An admission check reads the snapshot,
//! refills it from the schedule, and tries to install its successor with a
//! compare-and-swap on the identity of the snapshot it read. If another
//! caller got there first the attempt is discarded and retried from a fresh
//! read, so no two grants can ever be computed from the same stale balance.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, trace};

use super::clock::{Clock, MonotonicClock};
use super::schedule::Schedule;

/// Balances this close to a whole number are snapped to it.
const SNAP_EPSILON: f64 = 1e-7;

/// An immutable snapshot of the bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterState {
    /// Tokens available, in `[0, max_tokens]`
    available_tokens: f64,
    /// Clock reading of the last committed refill
    last_refill_millis: u64,
}

impl LimiterState {
    fn new(available_tokens: f64, last_refill_millis: u64) -> Self {
        Self {
            available_tokens,
            last_refill_millis,
        }
    }

    /// Tokens available as of the last committed refill.
    pub fn available_tokens(&self) -> f64 {
        self.available_tokens
    }

    /// Clock reading (milliseconds) of the last committed refill.
    pub fn last_refill_millis(&self) -> u64 {
        self.last_refill_millis
    }
}

/// A lock-free token bucket refilled according to a [`Schedule`].
///
/// The limiter is `Sync` and meant to be shared (e.g. behind an `Arc`) by
/// any number of threads calling [`RateLimiter::try_acquire`].
pub struct RateLimiter<C = MonotonicClock> {
    /// Refill schedule, shared read-only
    schedule: Arc<Schedule>,
    /// Time source
    clock: C,
    /// Clock reading at construction; schedule time zero
    start_millis: u64,
    /// The single mutable cell
    state: ArcSwap<LimiterState>,
}

impl RateLimiter<MonotonicClock> {
    /// Create a limiter driven by the monotonic wall clock.
    ///
    /// The schedule starts now, with an empty bucket.
    pub fn new(schedule: impl Into<Arc<Schedule>>) -> Self {
        Self::with_clock(schedule, MonotonicClock::new())
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a limiter driven by the given clock.
    pub fn with_clock(schedule: impl Into<Arc<Schedule>>, clock: C) -> Self {
        let schedule = schedule.into();
        let now = clock.now_millis();

        debug!(
            segments = schedule.len(),
            total_duration_ms = schedule.total_duration_ms(),
            max_tokens = schedule.max_tokens(),
            start_millis = now,
            "Creating scheduled rate limiter"
        );

        Self {
            schedule,
            clock,
            start_millis: now,
            state: ArcSwap::from_pointee(LimiterState::new(0.0, now)),
        }
    }

    /// Try to take `requested` tokens from the bucket.
    ///
    /// Returns `true` and debits the bucket if enough tokens have been
    /// produced, otherwise returns `false` and leaves the bucket untouched.
    /// Negative or NaN requests are always denied.
    pub fn try_acquire(&self, requested: f64) -> bool {
        if requested.is_nan() || requested < 0.0 {
            debug!(requested = requested, "Rejecting malformed token request");
            return false;
        }

        loop {
            let current = self.state.load();
            let now = self.clock.now_millis();
            let available = self.refilled(&current, now);

            if available < requested {
                trace!(
                    requested = requested,
                    available = available,
                    "Not enough tokens"
                );
                return false;
            }

            let next = Arc::new(LimiterState::new(
                available - requested,
                now.max(current.last_refill_millis),
            ));
            let previous = self.state.compare_and_swap(&*current, next);
            if Arc::ptr_eq(&*previous, &*current) {
                return true;
            }

            trace!("Limiter state changed concurrently, retrying");
        }
    }

    /// Try to take a single token.
    pub fn try_acquire_one(&self) -> bool {
        self.try_acquire(1.0)
    }

    /// Tokens that would be available right now, without committing a refill.
    pub fn available_tokens(&self) -> f64 {
        let current = self.state.load();
        self.refilled(&current, self.clock.now_millis())
    }

    /// The last committed snapshot.
    pub fn state(&self) -> LimiterState {
        **self.state.load()
    }

    /// The schedule driving this limiter.
    pub fn schedule(&self) -> &Arc<Schedule> {
        &self.schedule
    }

    /// Clock reading at which the schedule started.
    pub fn start_millis(&self) -> u64 {
        self.start_millis
    }

    /// Balance of `current` after accruing everything produced up to `now`.
    fn refilled(&self, current: &LimiterState, now: u64) -> f64 {
        if now <= current.last_refill_millis {
            return current.available_tokens;
        }

        let generated = self.schedule.calculate_tokens(
            current.last_refill_millis.saturating_sub(self.start_millis),
            now.saturating_sub(self.start_millis),
        );
        let max_tokens = self.schedule.max_tokens();
        snap_to_integer((current.available_tokens + generated).min(max_tokens)).min(max_tokens)
    }
}

impl<C> std::fmt::Debug for RateLimiter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("schedule", &self.schedule)
            .field("start_millis", &self.start_millis)
            .field("state", &**self.state.load())
            .finish_non_exhaustive()
    }
}

/// Snap values within [`SNAP_EPSILON`] of a whole number onto it.
fn snap_to_integer(tokens: f64) -> f64 {
    let rounded = tokens.round();
    if (rounded - tokens).abs() < SNAP_EPSILON {
        rounded
    } else {
        tokens
    }
}
