//! Time column resolution
//!
//! Values are first read as POSIX seconds (with optional fraction) and turned
//! into nanoseconds by digit padding, so `"1577836800"` and `"1577836800.000"`
//! resolve to the same integer. Anything else is parsed with the configured
//! strftime-style pattern in the configured time zone.

use crate::error::{ExportError, Result};
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use csvflux_core::Timestamp;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Digits of sub-second precision in a nanosecond timestamp
const NANOS_DIGITS: usize = 9;

const NANOS_PER_MILLI: i64 = 1_000_000;
const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Parses time column values into nanosecond epoch timestamps
#[derive(Debug, Clone)]
pub struct TimestampResolver {
    format: String,
    tz: Tz,
}

impl TimestampResolver {
    pub fn new(format: impl Into<String>, tz: Tz) -> Self {
        Self {
            format: format.into(),
            tz,
        }
    }

    /// Resolve a raw value, numeric first, then formatted
    ///
    /// Failing both is an error naming the value and the expected format.
    pub fn resolve(&self, raw: &str) -> Result<Timestamp> {
        parse_epoch_seconds(raw)
            .or_else(|| self.parse_formatted(raw))
            .ok_or_else(|| ExportError::Timestamp {
                value: raw.to_string(),
                format: self.format.clone(),
            })
    }

    /// Parse with the configured pattern, localized to the configured zone
    ///
    /// A wall time repeated when clocks go back resolves to its standard-time
    /// instant. One skipped when clocks go forward is read with the offset in
    /// effect before the skip.
    pub fn parse_formatted(&self, raw: &str) -> Option<Timestamp> {
        let naive = NaiveDateTime::parse_from_str(raw, &self.format)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(raw, &self.format)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })?;
        let millis = match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(t) => t.timestamp_millis(),
            LocalResult::Ambiguous(_, standard) => standard.timestamp_millis(),
            LocalResult::None => {
                let before = self
                    .tz
                    .offset_from_utc_datetime(&(naive - Duration::days(1)))
                    .fix();
                before.from_local_datetime(&naive).single()?.timestamp_millis()
            }
        };
        let nanos = millis.checked_mul(NANOS_PER_MILLI)?;
        (nanos >= 0).then_some(nanos)
    }

    /// Time value to inject for a file without a time column
    ///
    /// The value is the file's last-modified time rendered with the configured
    /// pattern; the timestamp is the same instant truncated to whole seconds.
    pub fn synthetic_from_modified(&self, path: &Path) -> Result<SyntheticTime> {
        let modified = std::fs::metadata(path)?.modified()?;
        let secs = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let local = DateTime::<Utc>::from(modified).with_timezone(&self.tz);
        Ok(SyntheticTime {
            value: local.format(&self.format).to_string(),
            timestamp: secs * NANOS_PER_SEC,
        })
    }
}

/// File-level time used when the source has no time column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticTime {
    /// Text injected into the time column of every row
    pub value: String,
    /// Timestamp of every point of the file
    pub timestamp: Timestamp,
}

/// Interpret `raw` as POSIX seconds with an optional fraction
///
/// The decimal point is removed and the digits right-padded with zeros to
/// `9 + integer digits`, i.e. nanosecond precision. Fractions finer than a
/// nanosecond are cut. Negative, non-finite and overflowing values yield `None`.
pub fn parse_epoch_seconds(raw: &str) -> Option<Timestamp> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let text = value.to_string();
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let width = NANOS_DIGITS + int_part.len();
    let mut digits = String::with_capacity(width);
    digits.push_str(int_part);
    digits.push_str(frac_part);
    if digits.len() > width {
        digits.truncate(width);
    } else {
        while digits.len() < width {
            digits.push('0');
        }
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn utc_resolver() -> TimestampResolver {
        TimestampResolver::new("%Y-%m-%d %H:%M:%S", chrono_tz::UTC)
    }

    #[test]
    fn test_numeric_is_format_stable() {
        assert_eq!(parse_epoch_seconds("1577836800"), Some(1_577_836_800_000_000_000));
        assert_eq!(parse_epoch_seconds("1577836800.000"), Some(1_577_836_800_000_000_000));
        assert_eq!(parse_epoch_seconds(" 1577836800 "), Some(1_577_836_800_000_000_000));
    }

    #[test]
    fn test_numeric_fraction() {
        assert_eq!(parse_epoch_seconds("1577836800.5"), Some(1_577_836_800_500_000_000));
        assert_eq!(parse_epoch_seconds("0.25"), Some(250_000_000));
        assert_eq!(parse_epoch_seconds("12"), Some(12_000_000_000));
    }

    #[test]
    fn test_numeric_rejects() {
        assert_eq!(parse_epoch_seconds("2020-01-01 00:00:00"), None);
        assert_eq!(parse_epoch_seconds("-5"), None);
        assert_eq!(parse_epoch_seconds("inf"), None);
        assert_eq!(parse_epoch_seconds("1e30"), None);
        assert_eq!(parse_epoch_seconds(""), None);
    }

    #[test]
    fn test_formatted_fallback() {
        let resolver = utc_resolver();
        assert_eq!(
            resolver.resolve("2020-01-01 00:00:00").unwrap(),
            1_577_836_800_000_000_000
        );
        assert_eq!(
            resolver.resolve("1577836800").unwrap(),
            1_577_836_800_000_000_000
        );
    }

    #[test]
    fn test_formatted_is_localized() {
        let resolver = TimestampResolver::new("%Y-%m-%d %H:%M:%S", chrono_tz::Asia::Shanghai);
        assert_eq!(
            resolver.resolve("2020-01-01 08:00:00").unwrap(),
            1_577_836_800_000_000_000
        );
    }

    #[test]
    fn test_repeated_wall_time_uses_standard_offset() {
        let resolver = TimestampResolver::new("%Y-%m-%d %H:%M:%S", chrono_tz::America::New_York);
        // 01:30 occurs twice on 2020-11-01; EST is UTC-5
        assert_eq!(
            resolver.resolve("2020-11-01 01:30:00").unwrap(),
            1_604_212_200_000_000_000
        );
    }

    #[test]
    fn test_skipped_wall_time_uses_offset_before_gap() {
        let resolver = TimestampResolver::new("%Y-%m-%d %H:%M:%S", chrono_tz::America::New_York);
        // 02:30 does not exist on 2020-03-08; read as EST
        assert_eq!(
            resolver.resolve("2020-03-08 02:30:00").unwrap(),
            1_583_652_600_000_000_000
        );

        let resolver = TimestampResolver::new("%Y-%m-%d %H:%M:%S", chrono_tz::Europe::Berlin);
        // 02:30 does not exist on 2020-03-29; read as CET
        assert_eq!(
            resolver.resolve("2020-03-29 02:30:00").unwrap(),
            1_585_445_400_000_000_000
        );
    }

    #[test]
    fn test_date_only_format() {
        let resolver = TimestampResolver::new("%Y/%m/%d", chrono_tz::UTC);
        assert_eq!(resolver.resolve("2020/01/01").unwrap(), 1_577_836_800_000_000_000);
    }

    #[test]
    fn test_unparseable_names_value_and_format() {
        let err = utc_resolver().resolve("yesterday").unwrap_err();
        match err {
            ExportError::Timestamp { value, format } => {
                assert_eq!(value, "yesterday");
                assert_eq!(format, "%Y-%m-%d %H:%M:%S");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_synthetic_from_modified_time() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a\n1\n").unwrap();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_577_836_800);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let synthetic = utc_resolver().synthetic_from_modified(&path).unwrap();
        assert_eq!(synthetic.value, "2020-01-01 00:00:00");
        assert_eq!(synthetic.timestamp, 1_577_836_800_000_000_000);
    }
}
