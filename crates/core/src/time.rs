//! Clock seam and date-window primitives.
//!
//! Time-dependent code (the notification loop, audit trails) takes a
//! [`Clock`] instead of calling `Utc::now()` directly, so tests can pin the
//! current instant.

use std::sync::Arc;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

impl<C> Clock for Arc<C>
where
    C: Clock + ?Sized,
{
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Wall-clock implementation used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.now.lock().unwrap();
        *guard += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Half-open date interval `[start, end)`.
///
/// Used by expiry queries and the notification window. An empty or inverted
/// interval contains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_is_half_open() {
        let w = DateWindow::new(date(2025, 1, 1), date(2026, 1, 1));
        assert!(w.contains(date(2025, 1, 1)));
        assert!(w.contains(date(2025, 12, 31)));
        assert!(!w.contains(date(2026, 1, 1)));
        assert!(!w.contains(date(2024, 12, 31)));
    }

    #[test]
    fn inverted_window_contains_nothing() {
        let w = DateWindow::new(date(2026, 1, 1), date(2025, 1, 1));
        assert!(!w.contains(date(2025, 6, 1)));
    }

    #[test]
    fn fixed_clock_is_settable() {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::at(t0);
        assert_eq!(clock.now(), t0);

        clock.advance(chrono::Duration::days(2));
        assert_eq!(clock.today(), date(2025, 3, 3));
    }
}
