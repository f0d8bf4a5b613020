use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct Year(pub i32);

impl Year {
    pub fn get(self) -> i32 {
        self.0
    }

    /// First hour of the year, `YYYY-01-01 00:00 UTC`.
    pub fn first_hour(self) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(self.0, 1, 1, 0, 0, 0).single()
    }

    /// Last hour of the year, `YYYY-12-31 23:00 UTC`.
    pub fn last_hour(self) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(self.0, 12, 31, 23, 0, 0).single()
    }

    /// Every hour of the calendar year in ascending order.
    pub fn hours(self) -> Vec<DateTime<Utc>> {
        let (Some(first), Some(last)) = (self.first_hour(), self.last_hour()) else {
            return Vec::new();
        };
        std::iter::successors(Some(first), |h| Some(*h + Duration::hours(1)))
            .take_while(|h| *h <= last)
            .collect()
    }
}

impl Display for Year {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}
