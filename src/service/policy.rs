use chrono::{Datelike, NaiveDate, Weekday};
use strum_macros::{Display, EnumString};

use crate::error::{ServiceError, ServiceResult};

/// How a date span turns into chargeable leave days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DayCountPolicy {
    /// Every day in the inclusive span.
    #[default]
    Calendar,
    /// Inclusive span minus Saturdays and Sundays.
    Weekdays,
}

impl DayCountPolicy {
    pub fn count(self, start: NaiveDate, end: NaiveDate) -> i32 {
        if end < start {
            return 0;
        }
        match self {
            DayCountPolicy::Calendar => ((end - start).num_days() + 1) as i32,
            DayCountPolicy::Weekdays => start
                .iter_days()
                .take_while(|d| *d <= end)
                .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
                .count() as i32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeavePolicy {
    pub day_count: DayCountPolicy,
    /// Reject requests starting before today.
    pub require_future_dates: bool,
}

impl Default for LeavePolicy {
    fn default() -> Self {
        Self {
            day_count: DayCountPolicy::Calendar,
            require_future_dates: true,
        }
    }
}

impl LeavePolicy {
    /// Checks a requested span and returns its chargeable day count.
    pub fn validate_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    ) -> ServiceResult<i32> {
        if end < start {
            return Err(ServiceError::validation("end_date cannot be before start_date"));
        }
        if self.require_future_dates && start < today {
            return Err(ServiceError::validation("start_date cannot be in the past"));
        }
        let days = self.day_count.count(start, end);
        if days == 0 {
            return Err(ServiceError::validation(
                "Requested dates do not contain any working day",
            ));
        }
        Ok(days)
    }
}
