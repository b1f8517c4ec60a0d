use chrono::{DateTime, Local, NaiveDate, Utc};

/// Wall-clock source for calendar dates and timestamps. Delays never go
/// through here; they use the tokio clock so tests can pause time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Device-local calendar date.
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to one instant, for tests and demos.
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn on(date: NaiveDate) -> Self {
        let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc();
        Self::new(noon)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}
