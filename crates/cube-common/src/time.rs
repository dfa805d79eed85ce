//! Time handling: query ranges, dataset acquisition spans and grouping.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CubeError, CubeResult};

/// Parse an ISO 8601 / RFC 3339 timestamp, assuming UTC when no offset is given.
pub fn parse_datetime(s: &str) -> CubeResult<DateTime<Utc>> {
    let s = s.trim();

    // Try full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try without timezone (assume UTC)
    for format in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    // Try date only
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(CubeError::InvalidTime(s.to_string()))
}

/// An inclusive time range for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CubeResult<Self> {
        if end < start {
            return Err(CubeError::InvalidTime(format!(
                "range end {} is before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse "start/end" or a single timestamp.
    ///
    /// A bare date as the end of a range covers that whole day.
    pub fn parse(s: &str) -> CubeResult<Self> {
        match s.split_once('/') {
            Some((start, end)) => {
                let start_dt = parse_datetime(start)?;
                let mut end_dt = parse_datetime(end)?;
                if !end.contains('T') && !end.trim().contains(' ') {
                    end_dt = end_dt + Duration::days(1) - Duration::nanoseconds(1);
                }
                Self::new(start_dt, end_dt)
            }
            None => {
                let dt = parse_datetime(s)?;
                Self::new(dt, dt)
            }
        }
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.end
    }

    /// Whether any instant of the span falls inside this range.
    pub fn overlaps(&self, span: &TimeSpan) -> bool {
        span.end >= self.start && span.begin <= self.end
    }
}

/// Acquisition time of a dataset: an instant or an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSpan {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSpan {
    pub fn new(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if end < begin {
            Self {
                begin: end,
                end: begin,
            }
        } else {
            Self { begin, end }
        }
    }

    pub fn instant(at: DateTime<Utc>) -> Self {
        Self { begin: at, end: at }
    }

    /// Midpoint of the span.
    pub fn center(&self) -> DateTime<Utc> {
        self.begin + (self.end - self.begin) / 2
    }
}

/// How datasets are bucketed into output time slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGrouping {
    /// One slice per distinct acquisition centre time.
    #[default]
    Exact,
    /// One slice per UTC calendar day.
    Day,
    /// One slice per local solar day at the dataset's centroid longitude.
    SolarDay,
}

impl TimeGrouping {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> CubeResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "exact" | "time" => Ok(Self::Exact),
            "day" => Ok(Self::Day),
            "solar_day" | "solar-day" => Ok(Self::SolarDay),
            _ => Err(CubeError::configuration(format!(
                "unknown time grouping '{}', expected exact, day or solar_day",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Day => "day",
            Self::SolarDay => "solar_day",
        }
    }

    /// Output time coordinate for a dataset.
    ///
    /// `longitude` is only used by [`TimeGrouping::SolarDay`].
    pub fn group_key(&self, span: &TimeSpan, longitude: f64) -> DateTime<Utc> {
        let center = span.center();
        match self {
            Self::Exact => center,
            Self::Day => start_of_day(center),
            Self::SolarDay => {
                let offset = Duration::seconds((longitude / 15.0 * 3600.0).round() as i64);
                start_of_day(center + offset)
            }
        }
    }
}

impl fmt::Display for TimeGrouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn start_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    let date = dt.date_naive();
    match date.and_hms_opt(0, 0, 0) {
        Some(ndt) => Utc.from_utc_datetime(&ndt),
        None => dt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_parse_datetime_formats() {
        let dt = parse_datetime("2016-03-04T23:58:10Z").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2016, 3, 4, 23));
        assert_eq!(parse_datetime("2016-03-04T23:58:10").unwrap(), dt);
        assert_eq!(parse_datetime("2016-03-04").unwrap(), utc(2016, 3, 4, 0, 0));
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn test_parse_range() {
        let range = TimeRange::parse("2016-01-01/2016-01-31").unwrap();
        assert_eq!(range.start, utc(2016, 1, 1, 0, 0));
        assert!(range.contains(&utc(2016, 1, 31, 23, 59)));
        assert!(!range.contains(&utc(2016, 2, 1, 0, 0)));

        let single = TimeRange::parse("2016-01-05T10:00:00Z").unwrap();
        assert_eq!(single.start, single.end);

        assert!(TimeRange::parse("2016-02-01/2016-01-01").is_err());
    }

    #[test]
    fn test_range_overlaps_span() {
        let range = TimeRange::new(utc(2016, 1, 1, 0, 0), utc(2016, 1, 2, 0, 0)).unwrap();
        let inside = TimeSpan::instant(utc(2016, 1, 1, 12, 0));
        let straddling = TimeSpan::new(utc(2015, 12, 31, 23, 0), utc(2016, 1, 1, 1, 0));
        let after = TimeSpan::instant(utc(2016, 1, 3, 0, 0));
        assert!(range.overlaps(&inside));
        assert!(range.overlaps(&straddling));
        assert!(!range.overlaps(&after));
    }

    #[test]
    fn test_group_keys() {
        let span = TimeSpan::new(utc(2016, 1, 1, 23, 50), utc(2016, 1, 1, 23, 52));
        assert_eq!(TimeGrouping::Exact.group_key(&span, 0.0), utc(2016, 1, 1, 23, 51));
        assert_eq!(TimeGrouping::Day.group_key(&span, 150.0), utc(2016, 1, 1, 0, 0));
        // 150E is ten hours ahead of UTC: local time is the next morning.
        assert_eq!(
            TimeGrouping::SolarDay.group_key(&span, 150.0),
            utc(2016, 1, 2, 0, 0)
        );
        assert_eq!(
            TimeGrouping::SolarDay.group_key(&span, -30.0),
            utc(2016, 1, 1, 0, 0)
        );
    }

    #[test]
    fn test_grouping_from_str() {
        assert_eq!(TimeGrouping::parse("TIME").unwrap(), TimeGrouping::Exact);
        assert_eq!(TimeGrouping::parse("day").unwrap(), TimeGrouping::Day);
        assert_eq!(
            TimeGrouping::parse("solar_day").unwrap(),
            TimeGrouping::SolarDay
        );
        assert!(TimeGrouping::parse("week").is_err());
    }
}
