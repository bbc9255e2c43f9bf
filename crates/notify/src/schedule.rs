//! Notifier configuration: period and window policy.

use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use col_core::DateWindow;

use crate::mailer::RecipientGroup;

/// How the expiry window is derived from "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowPolicy {
    /// From today until December 31st of the current year, inclusive.
    CalendarYearEnd,
    /// From today for a fixed number of days.
    RollingDays(u32),
}

impl WindowPolicy {
    /// The half-open window `[today, end)` for the given instant.
    pub fn window_from(&self, now: DateTime<Utc>) -> DateWindow {
        let today = now.date_naive();
        let end = match self {
            Self::CalendarYearEnd => {
                // first day of next year, so December 31st stays inside
                NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
                    .unwrap_or(NaiveDate::MAX)
            }
            Self::RollingDays(days) => today
                .checked_add_days(chrono::Days::new(u64::from(*days)))
                .unwrap_or(NaiveDate::MAX),
        };
        DateWindow::new(today, end)
    }
}

/// Static configuration of the notification loop.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub period: Duration,
    pub window: WindowPolicy,
    pub groups: Vec<RecipientGroup>,
    /// Base URL used for the per-agreement links in summaries.
    pub base_url: String,
}

impl NotifierConfig {
    pub fn new(groups: Vec<RecipientGroup>, base_url: impl Into<String>) -> Self {
        Self {
            period: Duration::from_secs(60 * 60 * 24 * 7),
            window: WindowPolicy::CalendarYearEnd,
            groups,
            base_url: base_url.into(),
        }
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn window(mut self, window: WindowPolicy) -> Self {
        self.window = window;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn calendar_year_end_window() {
        let now = Utc.with_ymd_and_hms(2025, 8, 26, 9, 0, 0).unwrap();
        let w = WindowPolicy::CalendarYearEnd.window_from(now);
        assert_eq!(w.start, NaiveDate::from_ymd_opt(2025, 8, 26).unwrap());
        assert_eq!(w.end, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert!(w.contains(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()));
        assert!(!w.contains(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
    }

    #[test]
    fn rolling_days_window() {
        let now = Utc.with_ymd_and_hms(2025, 12, 30, 9, 0, 0).unwrap();
        let w = WindowPolicy::RollingDays(30).window_from(now);
        assert_eq!(w.start, NaiveDate::from_ymd_opt(2025, 12, 30).unwrap());
        assert_eq!(w.end, NaiveDate::from_ymd_opt(2026, 1, 29).unwrap());
    }

    #[test]
    fn default_period_is_seven_days() {
        let config = NotifierConfig::new(vec![], "http://localhost");
        assert_eq!(config.period, Duration::from_secs(604_800));
    }
}
