//! Source of "now" for date-scoped queries and date formatting.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, TimeZone};

pub trait Clock: Send + Sync {
    /// Current instant in the caller's time zone.
    fn now(&self) -> DateTime<FixedOffset>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// UTC offset the caller's time zone had at `millis` (epoch milliseconds).
    /// Zones with daylight saving answer differently on either side of a
    /// transition.
    fn offset_at(&self, millis: i64) -> FixedOffset {
        let _ = millis;
        *self.now().offset()
    }
}

/// The host's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }

    fn offset_at(&self, millis: i64) -> FixedOffset {
        match Local.timestamp_millis_opt(millis).earliest() {
            Some(instant) => instant.offset().fix(),
            None => *self.now().offset(),
        }
    }
}

/// A clock stopped at one instant, in a zone without offset changes.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
