use crate::error::Error;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

/// Source of the "current time" stamped on imported records.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub(crate) struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Converts an instant into the wall-clock time of the given IANA time zone.
pub fn convert_tz(instant: DateTime<Utc>, timezone: &str) -> Result<DateTime<Tz>, Error> {
    let tz: Tz = timezone.parse().map_err(|_| Error::InvalidTimezone {
        timezone: timezone.to_string(),
    })?;

    Ok(instant.with_timezone(&tz))
}

/// Computes the trailing `days`-day window ending today in the account's zone.
///
/// The window is exclusive of `start` and inclusive of `end`, so it covers
/// exactly `days` calendar dates.
pub fn cost_window(
    now: DateTime<Utc>,
    timezone: &str,
    days: u32,
) -> Result<(NaiveDate, NaiveDate), Error> {
    let end = convert_tz(now, timezone)?.date_naive();
    let window_start = Duration::try_days(i64::from(days))
        .and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| Error::InvalidFormat {
            field: "x_days",
            value: days.to_string(),
        })?;
    let start = convert_tz(window_start, timezone)?.date_naive();

    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_convert_tz() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 3, 30, 0).unwrap();
        let local = convert_tz(instant, "America/New_York").unwrap();
        assert_eq!(
            local.date_naive(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn test_convert_tz_unknown_zone() {
        let result = convert_tz(Utc::now(), "Mars/Olympus_Mons");
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidTimezone { timezone } if timezone == "Mars/Olympus_Mons"
        ));
    }

    #[test]
    fn test_cost_window_uses_local_dates() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 23, 0, 0).unwrap();
        let (start, end) = cost_window(now, "Asia/Tokyo", 3).unwrap();
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 5, 11).unwrap());
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 5, 8).unwrap());
    }

    #[test]
    fn test_cost_window_out_of_range_days() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 23, 0, 0).unwrap();
        let result = cost_window(now, "UTC", 100_000_000);
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidFormat { field: "x_days", value } if value == "100000000"
        ));
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        assert!(clock.now() >= first);
    }
}
