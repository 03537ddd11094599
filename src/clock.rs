//! Source of "today" for every date comparison.
//!
//! Billing dates are calendar days; the engine never reads the wall clock
//! itself. The service asks its [`Clock`] once per operation and threads the
//! date through.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::{Arc, RwLock};

/// Trait for date/time sources.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar day (time of day truncated).
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock time in UTC.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays.
///
/// Clones share the same instant, so a test can hold one handle and move time
/// forward under a running service.
#[derive(Clone, Debug)]
pub struct FixedClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        FixedClock {
            now: Arc::new(RwLock::new(now)),
        }
    }

    /// Clock pinned to midnight UTC of `date`.
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        // a poisoned lock still holds a valid instant
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard = now;
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }

    /// Move the clock forward by whole days.
    pub fn advance_days(&self, days: i64) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard += chrono::Duration::days(days);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_fixed_clock_today() {
        let clock = FixedClock::at_date(date(2024, 1, 1));
        assert_eq!(clock.today(), date(2024, 1, 1));
    }

    #[test]
    fn test_fixed_clock_truncates_time_of_day() {
        let instant = date(2024, 3, 5).and_hms_opt(23, 59, 59).unwrap().and_utc();
        let clock = FixedClock::new(instant);
        assert_eq!(clock.today(), date(2024, 3, 5));
    }

    #[test]
    fn test_fixed_clock_shared_between_clones() {
        let clock = FixedClock::at_date(date(2024, 1, 1));
        let handle = clock.clone();
        handle.advance_days(31);
        assert_eq!(clock.today(), date(2024, 2, 1));
        handle.set_date(date(2025, 6, 30));
        assert_eq!(clock.today(), date(2025, 6, 30));
    }
}
