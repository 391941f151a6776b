pub mod reader;
pub mod writer;

pub use reader::read_dataset;
pub use writer::{verify_readable, write_dataset};

use crate::error::{DownsampleError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Time coordinate encoding shared by the reader and writer (ERA5 convention).
pub const TIME_UNITS: &str = "hours since 1900-01-01 00:00:00";

pub(crate) fn time_epoch() -> DateTime<Utc> {
    // Matches TIME_UNITS; both are fixed at compile time.
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .expect("valid epoch date")
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Decode a CF time-units string ("hours since 1900-01-01 00:00:00") into
/// the unit width in seconds and the epoch.
pub(crate) fn parse_time_units(units: &str) -> Result<(i64, DateTime<Utc>)> {
    let (head, tail) = units.split_once(" since ").ok_or_else(|| {
        DownsampleError::Validation(format!("unsupported time units: {}", units))
    })?;
    let unit_secs = match head.trim().to_ascii_lowercase().as_str() {
        "seconds" | "second" | "secs" => 1,
        "minutes" | "minute" | "mins" => 60,
        "hours" | "hour" | "hrs" => 3600,
        "days" | "day" => 86400,
        other => {
            return Err(DownsampleError::Validation(format!(
                "unsupported time unit: {}",
                other
            )))
        }
    };
    let tail = tail.trim();
    let epoch = NaiveDateTime::parse_from_str(tail, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(tail, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(tail, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|_| {
            DownsampleError::Validation(format!("unsupported time epoch: {}", tail))
        })?;
    Ok((unit_secs, epoch.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_units() {
        let (secs, epoch) = parse_time_units("hours since 1900-01-01 00:00:00").unwrap();
        assert_eq!(secs, 3600);
        assert_eq!(epoch, time_epoch());

        let (secs, _) = parse_time_units("days since 2000-01-01").unwrap();
        assert_eq!(secs, 86400);

        assert!(parse_time_units("fortnights since 2000-01-01").is_err());
        assert!(parse_time_units("not a units string").is_err());
    }
}
