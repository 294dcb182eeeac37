//! Scheduled token-bucket admission control.

mod clock;
mod limiter;
mod pattern;
mod schedule;
mod segment;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use limiter::{LimiterState, RateLimiter};
pub use pattern::{Constant, Linear, RatePattern};
pub use schedule::{Schedule, ScheduleBuilder, DEFAULT_MAX_TOKENS};
pub use segment::Segment;
