//! Syslog timestamp formats

use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Timelike, Utc};
use regex::Regex;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// RFC 3164 stamps carry no year. Parsing them in a leap year lets
/// `Feb 29` through and keeps deltas between lines exact.
const REFERENCE_YEAR: i32 = 2000;

const RFC5424_PREFIX: &str = r"\d{4}-\d\d-\d\dT\d\d:\d\d:\d\d";
const RFC5424_OFFSET: &str = r"(Z|[+-]\d\d:\d\d)";

/// Timestamp layout of the input lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TimestampFormat {
    /// `Jan _2 15:04:05`
    #[default]
    Rfc3164,
    /// `2006-01-02T15:04:05Z07:00`
    Rfc5424,
    /// `2006-01-02T15:04:05.00Z07:00`
    Rfc5424TenMilli,
    /// `2006-01-02T15:04:05.000Z07:00`
    Rfc5424Milli,
    /// `2006-01-02T15:04:05.000000Z07:00`
    Rfc5424Micro,
}

impl TimestampFormat {
    pub const ALL: [TimestampFormat; 5] = [
        TimestampFormat::Rfc3164,
        TimestampFormat::Rfc5424,
        TimestampFormat::Rfc5424TenMilli,
        TimestampFormat::Rfc5424Milli,
        TimestampFormat::Rfc5424Micro,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TimestampFormat::Rfc3164 => "rfc3164",
            TimestampFormat::Rfc5424 => "rfc5424",
            TimestampFormat::Rfc5424TenMilli => "rfc5424TenMilli",
            TimestampFormat::Rfc5424Milli => "rfc5424Milli",
            TimestampFormat::Rfc5424Micro => "rfc5424Micro",
        }
    }

    /// Reference layout shown to users
    pub fn layout(&self) -> &'static str {
        match self {
            TimestampFormat::Rfc3164 => "Jan _2 15:04:05",
            TimestampFormat::Rfc5424 => "2006-01-02T15:04:05Z07:00",
            TimestampFormat::Rfc5424TenMilli => "2006-01-02T15:04:05.00Z07:00",
            TimestampFormat::Rfc5424Milli => "2006-01-02T15:04:05.000Z07:00",
            TimestampFormat::Rfc5424Micro => "2006-01-02T15:04:05.000000Z07:00",
        }
    }

    /// Number of fractional-second digits, if the layout has a fraction
    pub fn fraction_digits(&self) -> usize {
        match self {
            TimestampFormat::Rfc3164 | TimestampFormat::Rfc5424 => 0,
            TimestampFormat::Rfc5424TenMilli => 2,
            TimestampFormat::Rfc5424Milli => 3,
            TimestampFormat::Rfc5424Micro => 6,
        }
    }

    /// Regex that finds a timestamp of this layout inside a line.
    ///
    /// `\d` and `\s` are ASCII-only so digits from other scripts cannot
    /// shadow a real timestamp later in the line.
    pub fn pattern(&self) -> String {
        let body = match self {
            TimestampFormat::Rfc3164 => r"[A-Z][a-z][a-z]\s+\d+\s\d\d:\d\d:\d\d".to_string(),
            TimestampFormat::Rfc5424 => format!("{}{}", RFC5424_PREFIX, RFC5424_OFFSET),
            other => format!(
                r"{}\.\d{{{}}}{}",
                RFC5424_PREFIX,
                other.fraction_digits(),
                RFC5424_OFFSET
            ),
        };
        format!("(?-u){}", body)
    }

    /// Parse a timestamp already isolated from its line.
    pub fn parse(&self, s: &str) -> Result<DateTime<FixedOffset>> {
        let bad = || Error::Timestamp(format!("`{}` is not a valid {} timestamp", s, self.name()));

        match self {
            TimestampFormat::Rfc3164 => {
                let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
                let with_year = format!("{} {}", REFERENCE_YEAR, normalized);
                let naive = NaiveDateTime::parse_from_str(&with_year, "%Y %b %d %H:%M:%S")
                    .map_err(|_| bad())?;
                Ok(Utc.from_utc_datetime(&naive).fixed_offset())
            }
            _ => {
                let parsed = DateTime::parse_from_rfc3339(s).map_err(|_| bad())?;
                if count_fraction_digits(s) != self.fraction_digits() {
                    return Err(bad());
                }
                Ok(parsed)
            }
        }
    }

    /// Render `dt` in this layout.
    pub fn format<Tz: TimeZone>(&self, dt: &DateTime<Tz>) -> String {
        let dt = dt.fixed_offset();
        match self {
            TimestampFormat::Rfc3164 => dt.format("%b %e %H:%M:%S").to_string(),
            _ => {
                let mut out = dt.format("%Y-%m-%dT%H:%M:%S").to_string();

                let digits = self.fraction_digits();
                if digits > 0 {
                    // leap seconds are carried as nanosecond >= 1e9
                    let nanos = dt.nanosecond() % 1_000_000_000;
                    let frac = nanos / 10u32.pow(9 - digits as u32);
                    out.push_str(&format!(".{:0width$}", frac, width = digits));
                }

                if dt.offset().local_minus_utc() == 0 {
                    out.push('Z');
                } else {
                    out.push_str(&dt.format("%:z").to_string());
                }
                out
            }
        }
    }
}

fn count_fraction_digits(s: &str) -> usize {
    match s.find('.') {
        Some(dot) => s[dot + 1..].chars().take_while(|c| c.is_ascii_digit()).count(),
        None => 0,
    }
}

impl fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TimestampFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| Error::Config(format!("please specify a valid format (got `{}`)", s)))
    }
}

/// The format table printed in `--help`.
pub fn format_list() -> String {
    let mut out = String::from("Format:\n");
    for f in TimestampFormat::ALL {
        out.push_str(&format!("  {:<16}: {}\n", f.name(), f.layout()));
    }
    out
}

/// A line whose timestamp was located and parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedLine {
    pub line: String,
    /// Byte range of the timestamp within `line`
    pub span: Range<usize>,
    pub instant: DateTime<FixedOffset>,
}

impl StampedLine {
    pub fn timestamp(&self) -> &str {
        &self.line[self.span.clone()]
    }

    /// The line with its timestamp replaced by `replacement`.
    pub fn rewrite(&self, replacement: &str) -> String {
        let mut out = String::with_capacity(self.line.len() + replacement.len());
        out.push_str(&self.line[..self.span.start]);
        out.push_str(replacement);
        out.push_str(&self.line[self.span.end..]);
        out
    }
}

/// Locates timestamps of one format in input lines
#[derive(Debug, Clone)]
pub struct TimestampMatcher {
    format: TimestampFormat,
    regex: Regex,
}

impl TimestampMatcher {
    pub fn new(format: TimestampFormat) -> Result<Self> {
        let regex = Regex::new(&format.pattern())
            .map_err(|e| Error::Config(format!("bad pattern for {}: {}", format, e)))?;
        Ok(Self { format, regex })
    }

    pub fn format(&self) -> TimestampFormat {
        self.format
    }

    /// Find and parse the first timestamp in `line`.
    pub fn extract(&self, line: &str) -> Result<StampedLine> {
        let m = self.regex.find(line).ok_or_else(|| {
            Error::Timestamp(format!("no {} timestamp found", self.format.name()))
        })?;
        let instant = self.format.parse(m.as_str())?;
        Ok(StampedLine {
            line: line.to_string(),
            span: m.range(),
            instant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeDelta};

    #[test]
    fn test_from_str() {
        for f in TimestampFormat::ALL {
            assert_eq!(f.name().parse::<TimestampFormat>().unwrap(), f);
        }
        assert!(matches!(
            "RFC3164".parse::<TimestampFormat>(),
            Err(Error::Config(_))
        ));
        assert_eq!(TimestampFormat::default(), TimestampFormat::Rfc3164);
    }

    #[test]
    fn test_round_trip_canonical_forms() {
        let samples = [
            (TimestampFormat::Rfc3164, "Jan  2 15:04:05"),
            (TimestampFormat::Rfc3164, "Dec 31 23:59:59"),
            (TimestampFormat::Rfc5424, "2006-01-02T15:04:05Z"),
            (TimestampFormat::Rfc5424, "2006-01-02T15:04:05-07:00"),
            (TimestampFormat::Rfc5424TenMilli, "2006-01-02T15:04:05.12+09:00"),
            (TimestampFormat::Rfc5424Milli, "2006-01-02T15:04:05.000Z"),
            (TimestampFormat::Rfc5424Milli, "2006-01-02T15:04:05.123+05:30"),
            (TimestampFormat::Rfc5424Micro, "2006-01-02T15:04:05.000001Z"),
        ];
        for (format, s) in samples {
            let parsed = format.parse(s).unwrap();
            assert_eq!(format.format(&parsed), s, "{}", format);
        }
    }

    #[test]
    fn test_rfc3164_whitespace_and_leap_day() {
        let f = TimestampFormat::Rfc3164;
        assert_eq!(f.parse("Jan 2 15:04:05").unwrap(), f.parse("Jan  2 15:04:05").unwrap());

        let leap = f.parse("Feb 29 00:00:00").unwrap();
        assert_eq!((leap.month(), leap.day()), (2, 29));
        assert!(f.parse("Feb 30 00:00:00").is_err());
        assert!(f.parse("Foo  2 15:04:05").is_err());
    }

    #[test]
    fn test_rfc5424_fraction_must_match_layout() {
        assert!(TimestampFormat::Rfc5424Milli.parse("2006-01-02T15:04:05.123Z").is_ok());
        assert!(TimestampFormat::Rfc5424Milli.parse("2006-01-02T15:04:05.12Z").is_err());
        assert!(TimestampFormat::Rfc5424.parse("2006-01-02T15:04:05.123Z").is_err());
        assert!(TimestampFormat::Rfc5424.parse("2006-13-02T15:04:05Z").is_err());
    }

    #[test]
    fn test_format_truncates_fraction() {
        let dt = DateTime::parse_from_rfc3339("2024-03-01T10:20:30.987654321Z").unwrap();

        assert_eq!(TimestampFormat::Rfc5424.format(&dt), "2024-03-01T10:20:30Z");
        assert_eq!(TimestampFormat::Rfc5424TenMilli.format(&dt), "2024-03-01T10:20:30.98Z");
        assert_eq!(TimestampFormat::Rfc5424Milli.format(&dt), "2024-03-01T10:20:30.987Z");
        assert_eq!(TimestampFormat::Rfc5424Micro.format(&dt), "2024-03-01T10:20:30.987654Z");
        assert_eq!(TimestampFormat::Rfc3164.format(&dt), "Mar  1 10:20:30");
    }

    #[test]
    fn test_patterns() {
        let cases = [
            (TimestampFormat::Rfc3164, "<34>Oct 11 22:14:15 mymachine su: 'su root' failed"),
            (TimestampFormat::Rfc5424, "<165>1 2003-10-11T22:14:15Z host app - - msg"),
            (TimestampFormat::Rfc5424TenMilli, "<165>1 2003-10-11T22:14:15.00+02:00 host"),
            (TimestampFormat::Rfc5424Milli, "<165>1 2003-10-11T22:14:15.003Z mymachine"),
            (TimestampFormat::Rfc5424Micro, "<165>1 2003-08-24T05:14:15.000003-07:00 host"),
        ];
        for (format, line) in cases {
            let matcher = TimestampMatcher::new(format).unwrap();
            assert!(matcher.extract(line).is_ok(), "{} on {}", format, line);
        }

        let milli = TimestampMatcher::new(TimestampFormat::Rfc5424Milli).unwrap();
        assert!(milli.extract("<165>1 2003-10-11T22:14:15Z host").is_err());
    }

    #[test]
    fn test_non_ascii_digits_do_not_match() {
        let rfc3164 = TimestampMatcher::new(TimestampFormat::Rfc3164).unwrap();
        let stamped = rfc3164
            .extract("Mon \u{0662} 10:00:00 then Jan  2 15:04:05 host app: hi")
            .unwrap();
        assert_eq!(stamped.timestamp(), "Jan  2 15:04:05");

        // no-break space is not a separator
        assert!(rfc3164.extract("Jan\u{a0}2 15:04:05 host").is_err());

        let rfc5424 = TimestampMatcher::new(TimestampFormat::Rfc5424).unwrap();
        let stamped = rfc5424
            .extract("\u{0662}003-10-11T22:14:15Z 2003-10-11T22:14:16Z host")
            .unwrap();
        assert_eq!(stamped.timestamp(), "2003-10-11T22:14:16Z");
    }

    #[test]
    fn test_extract_first_match() {
        let matcher = TimestampMatcher::new(TimestampFormat::Rfc3164).unwrap();
        let stamped = matcher
            .extract("<13>Mar  5 01:02:03 host app: retry after Mar  5 01:02:09")
            .unwrap();

        assert_eq!(stamped.timestamp(), "Mar  5 01:02:03");
        assert_eq!(stamped.span, 4..19);
        assert_eq!(stamped.instant, TimestampFormat::Rfc3164.parse("Mar 5 01:02:03").unwrap());
    }

    #[test]
    fn test_extract_failures() {
        let matcher = TimestampMatcher::new(TimestampFormat::Rfc3164).unwrap();
        assert!(matches!(matcher.extract("no timestamp here"), Err(Error::Timestamp(_))));
        // matches the pattern but is not a date
        assert!(matches!(matcher.extract("Abc 12 10:00:00 x"), Err(Error::Timestamp(_))));
        assert!(matches!(matcher.extract("Jan 123 10:00:00 x"), Err(Error::Timestamp(_))));
    }

    #[test]
    fn test_rewrite() {
        let matcher = TimestampMatcher::new(TimestampFormat::Rfc5424Milli).unwrap();
        let stamped = matcher
            .extract("<165>1 2003-10-11T22:14:15.003Z host app - - 2003-10-11T22:14:15.003Z")
            .unwrap();

        assert_eq!(
            stamped.rewrite("2024-01-01T00:00:00.000Z"),
            "<165>1 2024-01-01T00:00:00.000Z host app - - 2003-10-11T22:14:15.003Z"
        );
    }

    #[test]
    fn test_delta_between_lines() {
        let f = TimestampFormat::Rfc5424Milli;
        let a = f.parse("2003-10-11T22:14:15.003Z").unwrap();
        let b = f.parse("2003-10-11T23:14:15.503+01:00").unwrap();
        assert_eq!(b - a, TimeDelta::milliseconds(500));
    }

    #[test]
    fn test_format_list() {
        let list = format_list();
        for f in TimestampFormat::ALL {
            assert!(list.contains(f.name()));
            assert!(list.contains(f.layout()));
        }
    }
}
