//! Reporting period resolution
//!
//! Named periods ("today", "7d", "30d", "custom") are resolved up front into
//! an absolute half-open `[start, end)` UTC range. Resolution depends only on
//! its inputs (the period, "now", and the day-boundary offset), so identical
//! inputs always produce identical ranges.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::{Error, Result};

/// Requested reporting period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodSpec {
    /// No date restriction
    All,
    Today,
    Last7Days,
    Last30Days,
    /// Inclusive calendar dates in local time
    Custom { start: NaiveDate, end: NaiveDate },
}

/// Half-open UTC range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(Error::InvalidInput(format!(
                "Empty date range: {} .. {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }

    /// The immediately preceding range of equal length
    pub fn previous(&self) -> Self {
        let length = self.length();
        Self {
            start: self.start - length,
            end: self.start,
        }
    }
}

impl PeriodSpec {
    /// Build a period from request parameters
    ///
    /// Explicit start/end dates without a period name imply "custom".
    pub fn from_query(
        period: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Self> {
        let period = period.map(str::trim).filter(|p| !p.is_empty());
        match period {
            None if start_date.is_none() && end_date.is_none() => Ok(PeriodSpec::All),
            None | Some("custom") => {
                let (start, end) = match (start_date, end_date) {
                    (Some(start), Some(end)) => (parse_date(start)?, parse_date(end)?),
                    _ => {
                        return Err(Error::InvalidInput(
                            "Custom period requires both startDate and endDate".to_string(),
                        ))
                    }
                };
                if end < start {
                    return Err(Error::InvalidInput(format!(
                        "endDate {} is before startDate {}",
                        end, start
                    )));
                }
                Ok(PeriodSpec::Custom { start, end })
            }
            Some("all") => Ok(PeriodSpec::All),
            Some("today") => Ok(PeriodSpec::Today),
            Some("7d") => Ok(PeriodSpec::Last7Days),
            Some("30d") => Ok(PeriodSpec::Last30Days),
            Some(other) => Err(Error::InvalidInput(format!("Unknown period: {}", other))),
        }
    }

    /// Resolve into an absolute range; `None` means all time
    ///
    /// Day boundaries are local midnights at `utc_offset_minutes` from UTC.
    pub fn resolve(&self, now: DateTime<Utc>, utc_offset_minutes: i32) -> Result<Option<DateRange>> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            Error::InvalidInput(format!("Invalid UTC offset: {} minutes", utc_offset_minutes))
        })?;
        let today = now.with_timezone(&offset).date_naive();

        let (first_day, last_day) = match *self {
            PeriodSpec::All => return Ok(None),
            PeriodSpec::Today => (today, today),
            PeriodSpec::Last7Days => (today - Duration::days(6), today),
            PeriodSpec::Last30Days => (today - Duration::days(29), today),
            PeriodSpec::Custom { start, end } => (start, end),
        };

        let start = local_midnight(first_day, offset);
        let end = local_midnight(last_day + Duration::days(1), offset);
        DateRange::new(start, end).map(Some)
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    (local - Duration::seconds(offset.local_minus_utc() as i64)).and_utc()
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|_| Error::InvalidInput(format!("Invalid date: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_today_in_utc() {
        let range = PeriodSpec::Today.resolve(at(2024, 5, 10, 15), 0).unwrap().unwrap();
        assert_eq!(range.start, at(2024, 5, 10, 0));
        assert_eq!(range.end, at(2024, 5, 11, 0));
    }

    #[test]
    fn test_today_with_negative_offset() {
        // 02:00 UTC on the 10th is still the 9th at UTC-3
        let range = PeriodSpec::Today.resolve(at(2024, 5, 10, 2), -180).unwrap().unwrap();
        assert_eq!(range.start, at(2024, 5, 9, 3));
        assert_eq!(range.end, at(2024, 5, 10, 3));
    }

    #[test]
    fn test_seven_days_includes_today() {
        let range = PeriodSpec::Last7Days.resolve(at(2024, 5, 10, 15), 0).unwrap().unwrap();
        assert_eq!(range.start, at(2024, 5, 4, 0));
        assert_eq!(range.end, at(2024, 5, 11, 0));
        assert_eq!(range.length(), Duration::days(7));
    }

    #[test]
    fn test_previous_period_has_equal_length() {
        let range = PeriodSpec::Last30Days.resolve(at(2024, 5, 10, 15), 0).unwrap().unwrap();
        let previous = range.previous();
        assert_eq!(previous.end, range.start);
        assert_eq!(previous.length(), range.length());
    }

    #[test]
    fn test_custom_end_date_is_inclusive() {
        let spec = PeriodSpec::from_query(None, Some("2024-05-01"), Some("2024-05-03")).unwrap();
        let range = spec.resolve(at(2024, 6, 1, 0), 0).unwrap().unwrap();
        assert_eq!(range.start, at(2024, 5, 1, 0));
        assert_eq!(range.end, at(2024, 5, 4, 0));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let now = at(2024, 5, 10, 15);
        let a = PeriodSpec::Last7Days.resolve(now, -180).unwrap();
        let b = PeriodSpec::Last7Days.resolve(now, -180).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_query_variants() {
        assert_eq!(PeriodSpec::from_query(None, None, None).unwrap(), PeriodSpec::All);
        assert_eq!(PeriodSpec::from_query(Some("7d"), None, None).unwrap(), PeriodSpec::Last7Days);
        assert!(PeriodSpec::from_query(Some("custom"), Some("2024-05-01"), None).is_err());
        assert!(PeriodSpec::from_query(Some("90d"), None, None).is_err());
        assert!(PeriodSpec::from_query(None, Some("2024-05-03"), Some("2024-05-01")).is_err());
    }

    #[test]
    fn test_all_time_has_no_range() {
        assert!(PeriodSpec::All.resolve(at(2024, 5, 10, 15), 0).unwrap().is_none());
    }
}
