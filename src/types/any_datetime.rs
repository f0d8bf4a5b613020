use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};

/// Archive timestamp format, as used in snapshot filenames.
pub const ARCHIVE_DT_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Anything that can be resolved to a single UTC instant.
///
/// Lets callers pass `DateTime<Utc>`, naive datetimes (interpreted as UTC) or strings
/// wherever a timestamp is expected. Strings may be RFC 3339, `YYYY-mm-dd HH:MM:SS`,
/// `YYYY-mm-ddTHH:MM:SS` or the archive's `YYYYmmdd-HHMMSS`.
pub trait AnyDateTime {
    fn get_datetime(self) -> Option<DateTime<Utc>>;
}

impl AnyDateTime for DateTime<Utc> {
    fn get_datetime(self) -> Option<DateTime<Utc>> {
        Some(self)
    }
}

impl AnyDateTime for NaiveDateTime {
    fn get_datetime(self) -> Option<DateTime<Utc>> {
        Some(Utc.from_utc_datetime(&self))
    }
}

impl AnyDateTime for DateTime<FixedOffset> {
    fn get_datetime(self) -> Option<DateTime<Utc>> {
        Some(self.with_timezone(&Utc))
    }
}

impl AnyDateTime for DateTime<Local> {
    fn get_datetime(self) -> Option<DateTime<Utc>> {
        Some(self.with_timezone(&Utc))
    }
}

impl AnyDateTime for &str {
    fn get_datetime(self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = self.parse::<DateTime<Utc>>() {
            return Some(dt);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(self) {
            return dt.get_datetime();
        }
        ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", ARCHIVE_DT_FORMAT]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(self, fmt).ok())
            .and_then(AnyDateTime::get_datetime)
    }
}

impl AnyDateTime for String {
    fn get_datetime(self) -> Option<DateTime<Utc>> {
        self.as_str().get_datetime()
    }
}

impl AnyDateTime for &String {
    fn get_datetime(self) -> Option<DateTime<Utc>> {
        self.as_str().get_datetime()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_formats_agree() {
        let expected = Utc.with_ymd_and_hms(2017, 8, 1, 6, 0, 0).unwrap();
        assert_eq!("2017-08-01T06:00:00Z".get_datetime(), Some(expected));
        assert_eq!("2017-08-01T08:00:00+02:00".get_datetime(), Some(expected));
        assert_eq!("2017-08-01 06:00:00".get_datetime(), Some(expected));
        assert_eq!("20170801-060000".get_datetime(), Some(expected));
        assert_eq!("yesterday".get_datetime(), None);
    }

    #[test]
    fn test_naive_is_utc() {
        let naive = chrono::NaiveDate::from_ymd_opt(2020, 10, 13)
            .unwrap()
            .and_hms_opt(19, 0, 0)
            .unwrap();
        assert_eq!(naive.get_datetime().unwrap().naive_utc(), naive);
    }
}
