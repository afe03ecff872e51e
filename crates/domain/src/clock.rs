//! Time sources and the business calendar.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveTime, Offset, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to (for testing).
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Maps instants to business days in a fixed zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    offset: FixedOffset,
}

impl BusinessCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Uses the server's current local offset.
    pub fn local() -> Self {
        Self::new(Local::now().offset().fix())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Returns the first and last instant of the local day containing
    /// `instant`. Both bounds are inclusive; the end is one nanosecond before
    /// the next midnight.
    pub fn day_bounds(&self, instant: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let local_midnight = instant
            .with_timezone(&self.offset)
            .date_naive()
            .and_time(NaiveTime::MIN);
        let start = local_midnight.and_utc()
            - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        let end = start + Duration::days(1) - Duration::nanoseconds(1);
        (start, end)
    }
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self::local()
    }
}
