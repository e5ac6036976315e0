// ⏰ Temporal Model - one explicit reporting window
//
// Every "last month" report goes through ReportWindow::last_month. The
// window is a rolling 30 x 24h span ending at `as_of`, both ends inclusive.
// No calendar-month arithmetic anywhere.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Length of the trailing reporting window, in days
pub const REPORTING_WINDOW_DAYS: i64 = 30;

// ============================================================================
// REPORT WINDOW
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    /// Window of `period` ending at `as_of`
    pub fn trailing(as_of: DateTime<Utc>, period: Duration) -> Self {
        ReportWindow {
            start: as_of - period,
            end: as_of,
        }
    }

    /// The reporting period used by every recency report
    pub fn last_month(as_of: DateTime<Utc>) -> Self {
        Self::trailing(as_of, Duration::days(REPORTING_WINDOW_DAYS))
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start <= time && time <= self.end
    }
}

// ============================================================================
// CLOCK
// ============================================================================

/// Source of "now" for window queries.
///
/// The service owns one; tests pin it so window boundaries are exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }
}
