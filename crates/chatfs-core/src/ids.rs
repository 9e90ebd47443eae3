//! Composite path keys.
//!
//! Every virtual node is addressed by a colon-delimited tuple:
//! `peer`, `peer:YYYY-MM` or `peer:YYYY-MM:message`. Peer and message are
//! canonical decimal integers; the period is a calendar month.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

use crate::error::{DriveError, Result};

const SEPARATOR: char = ':';

/// A calendar month bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(DriveError::MalformedKey(format!(
                "period out of range: {year}-{month}"
            )));
        }
        Ok(Self { year, month })
    }

    /// The month containing `at`.
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First instant of the month, UTC.
    pub fn start(&self) -> DateTime<Utc> {
        // year and month are validated on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or_default()
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// `[start, next.start)` as an inclusive-exclusive range.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start(), self.next().start())
    }

    /// Every month from `self` through `last`, ascending. Empty when
    /// `last` precedes `self`.
    pub fn through(self, last: Period) -> Vec<Period> {
        let mut months = Vec::new();
        let mut current = self;
        while current <= last {
            months.push(current);
            current = current.next();
        }
        months
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || DriveError::MalformedKey(format!("invalid period token: {s:?}"));

        let (year, month) = s.split_once('-').ok_or_else(malformed)?;
        let digits = |t: &str| t.bytes().all(|b| b.is_ascii_digit());
        if year.len() != 4 || month.len() != 2 || !digits(year) || !digits(month) {
            return Err(malformed());
        }
        let year: i32 = year.parse().map_err(|_| malformed())?;
        let month: u32 = month.parse().map_err(|_| malformed())?;
        Period::new(year, month).map_err(|_| malformed())
    }
}

/// Decoded form of a node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    pub peer: i64,
    pub period: Option<Period>,
    pub message_id: Option<i32>,
}

impl CompositeKey {
    pub fn peer(peer: i64) -> Self {
        Self {
            peer,
            period: None,
            message_id: None,
        }
    }

    pub fn period(peer: i64, period: Period) -> Self {
        Self {
            peer,
            period: Some(period),
            message_id: None,
        }
    }

    pub fn message(peer: i64, period: Period, message_id: i32) -> Self {
        Self {
            peer,
            period: Some(period),
            message_id: Some(message_id),
        }
    }

    /// Number of segments: 1 (chat), 2 (period folder) or 3 (file).
    pub fn depth(&self) -> usize {
        match (self.period, self.message_id) {
            (None, _) => 1,
            (Some(_), None) => 2,
            (Some(_), Some(_)) => 3,
        }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn decode(key: &str) -> Result<Self> {
        key.parse()
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.peer)?;
        if let Some(period) = self.period {
            write!(f, "{}{}", SEPARATOR, period)?;
            if let Some(id) = self.message_id {
                write!(f, "{}{}", SEPARATOR, id)?;
            }
        }
        Ok(())
    }
}

impl FromStr for CompositeKey {
    type Err = DriveError;

    fn from_str(key: &str) -> Result<Self> {
        let segments: Vec<&str> = key.split(SEPARATOR).collect();
        if segments.len() > 3 {
            return Err(DriveError::MalformedKey(format!(
                "expected 1-3 segments, got {} in {key:?}",
                segments.len()
            )));
        }

        let peer = parse_canonical::<i64>(segments[0]).ok_or_else(|| {
            DriveError::MalformedKey(format!("invalid peer id {:?} in {key:?}", segments[0]))
        })?;
        let period = segments.get(1).map(|s| s.parse::<Period>()).transpose()?;
        let message_id = segments
            .get(2)
            .map(|s| {
                parse_canonical::<i32>(s).ok_or_else(|| {
                    DriveError::MalformedKey(format!("invalid message id {s:?} in {key:?}"))
                })
            })
            .transpose()?;

        Ok(Self {
            peer,
            period,
            message_id,
        })
    }
}

/// Parse a decimal integer that re-encodes to exactly `s`: no sign prefix,
/// no leading zeros, no whitespace.
fn parse_canonical<T: FromStr + ToString>(s: &str) -> Option<T> {
    let value = s.parse::<T>().ok()?;
    (value.to_string() == s).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_depths() {
        let nov = Period::new(2022, 11).unwrap();
        let keys = [
            CompositeKey::peer(1001),
            CompositeKey::period(1001, nov),
            CompositeKey::message(1001, nov, 42),
            CompositeKey::message(-1001, nov, 7),
        ];
        for key in keys {
            let decoded = CompositeKey::decode(&key.encode()).unwrap();
            assert_eq!(decoded, key);
        }
        assert_eq!(CompositeKey::message(1001, nov, 42).encode(), "1001:2022-11:42");
    }

    #[test]
    fn test_depths() {
        assert_eq!(CompositeKey::decode("5").unwrap().depth(), 1);
        assert_eq!(CompositeKey::decode("5:2023-01").unwrap().depth(), 2);
        assert_eq!(CompositeKey::decode("5:2023-01:9").unwrap().depth(), 3);
    }

    #[test]
    fn test_rejects_bad_segment_counts() {
        assert!(matches!(
            CompositeKey::decode("1:2022-11:3:4"),
            Err(DriveError::MalformedKey(_))
        ));
        assert!(matches!(CompositeKey::decode(""), Err(DriveError::MalformedKey(_))));
    }

    #[test]
    fn test_rejects_unparseable_segments() {
        assert!(CompositeKey::decode("1:2022-13").is_err());
        assert!(CompositeKey::decode("1:22-11").is_err());
        assert!(CompositeKey::decode("1:2022-11:abc").is_err());
        assert!(CompositeKey::decode("1:2022-11:").is_err());
    }

    #[test]
    fn test_segments_must_be_canonical_decimal() {
        for key in ["durov", "durov:2022-11:7", "01001", "+5", " 5", "1:+202-11", "1:2022-+1", "1:2022-11:007"] {
            assert!(
                matches!(CompositeKey::decode(key), Err(DriveError::MalformedKey(_))),
                "{key:?} should be rejected"
            );
        }
        let key = CompositeKey::decode("-1001:2022-11:7").unwrap();
        assert_eq!(key.peer, -1001);
        assert_eq!(key.encode(), "-1001:2022-11:7");
    }

    #[test]
    fn test_period_bounds_cross_year() {
        let dec = Period::new(2022, 12).unwrap();
        let (start, end) = dec.bounds();
        assert_eq!(start.to_rfc3339(), "2022-12-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2023-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_period_through() {
        let from = Period::new(2022, 10).unwrap();
        let to = Period::new(2023, 1).unwrap();
        let names: Vec<String> = from.through(to).iter().map(|p| p.to_string()).collect();
        assert_eq!(names, ["2022-10", "2022-11", "2022-12", "2023-01"]);
        assert!(to.through(from).is_empty());
    }
}
