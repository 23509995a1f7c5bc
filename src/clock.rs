use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Source of "now" for the workflow; injected so date rules are testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn current_year(&self) -> i32 {
        self.today().year()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl FixedClock {
    pub fn at_date(year: i32, month: u32, day: u32) -> Self {
        let at = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .expect("valid fixed date")
            .and_utc();
        FixedClock(at)
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
