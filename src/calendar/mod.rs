//! Market calendar
//!
//! Decides whether a timestamp falls inside the exchange's regular trading
//! window. Stateless: the same timestamp always gives the same answer.

use crate::config::CalendarConfig;
use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use thiserror::Error;

/// Calendar construction errors
#[derive(Debug, Error)]
pub enum CalendarError {
    /// Session time could not be parsed as HH:MM
    #[error("Invalid session time {0:?} (expected HH:MM)")]
    InvalidTime(String),
    /// Not an IANA timezone name
    #[error("Unknown timezone {0:?}")]
    UnknownTimezone(String),
    /// Close is not after open
    #[error("Session close {close} must be after open {open}")]
    EmptySession { open: NaiveTime, close: NaiveTime },
}

/// Regular-hours trading calendar in the exchange's local timezone
///
/// Local time follows the zone's DST rules, so a 09:30 open is 14:30 UTC in
/// January and 13:30 UTC in July for `America/New_York`.
#[derive(Debug, Clone, Copy)]
pub struct MarketCalendar {
    timezone: Tz,
    open: NaiveTime,
    close: NaiveTime,
}

impl MarketCalendar {
    /// Create a calendar from an exchange timezone and session bounds
    pub fn new(timezone: Tz, open: NaiveTime, close: NaiveTime) -> Result<Self, CalendarError> {
        if close <= open {
            return Err(CalendarError::EmptySession { open, close });
        }
        Ok(Self {
            timezone,
            open,
            close,
        })
    }

    /// US equities regular session, 09:30-16:00 America/New_York
    pub fn us_equities() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            open: NaiveTime::from_hms_opt(9, 30, 0).expect("constant session time"),
            close: NaiveTime::from_hms_opt(16, 0, 0).expect("constant session time"),
        }
    }

    /// Build from configuration
    pub fn from_config(config: &CalendarConfig) -> Result<Self, CalendarError> {
        let open = parse_session_time(&config.open)?;
        let close = parse_session_time(&config.close)?;
        let timezone: Tz = config
            .timezone
            .parse()
            .map_err(|_| CalendarError::UnknownTimezone(config.timezone.clone()))?;
        Self::new(timezone, open, close)
    }

    /// Whether the market is open at `timestamp`
    ///
    /// Saturday and Sunday are always closed. On weekdays the session is
    /// `[open, close)` in exchange-local time.
    pub fn is_market_open(&self, timestamp: DateTime<Utc>) -> bool {
        let local = timestamp.with_timezone(&self.timezone);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let time = local.time();
        time >= self.open && time < self.close
    }

    /// Exchange timezone
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Session open (exchange-local)
    pub fn open(&self) -> NaiveTime {
        self.open
    }

    /// Session close (exchange-local)
    pub fn close(&self) -> NaiveTime {
        self.close
    }
}

fn parse_session_time(s: &str) -> Result<NaiveTime, CalendarError> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| CalendarError::InvalidTime(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn calendar() -> MarketCalendar {
        MarketCalendar::from_config(&CalendarConfig::default()).unwrap()
    }

    #[test]
    fn test_weekday_session() {
        let cal = calendar();
        // Wednesday 2024-01-17 15:00 UTC = 10:00 EST
        let ts = Utc.with_ymd_and_hms(2024, 1, 17, 15, 0, 0).unwrap();
        assert!(cal.is_market_open(ts));
    }

    #[test]
    fn test_before_open_and_at_close() {
        let cal = calendar();
        // 09:29 local
        let before = Utc.with_ymd_and_hms(2024, 1, 17, 14, 29, 0).unwrap();
        assert!(!cal.is_market_open(before));
        // 09:30 local, inclusive
        let open = Utc.with_ymd_and_hms(2024, 1, 17, 14, 30, 0).unwrap();
        assert!(cal.is_market_open(open));
        // 16:00 local, exclusive
        let close = Utc.with_ymd_and_hms(2024, 1, 17, 21, 0, 0).unwrap();
        assert!(!cal.is_market_open(close));
    }

    #[test]
    fn test_summer_session_follows_daylight_time() {
        let cal = calendar();
        // 2024-07-17 is EDT (UTC-4)
        let opened = Utc.with_ymd_and_hms(2024, 7, 17, 13, 30, 0).unwrap();
        assert!(cal.is_market_open(opened));
        let first_hour = Utc.with_ymd_and_hms(2024, 7, 17, 13, 45, 0).unwrap();
        assert!(cal.is_market_open(first_hour));
        let before = Utc.with_ymd_and_hms(2024, 7, 17, 13, 29, 0).unwrap();
        assert!(!cal.is_market_open(before));
        let closed = Utc.with_ymd_and_hms(2024, 7, 17, 20, 0, 0).unwrap();
        assert!(!cal.is_market_open(closed));
        let after = Utc.with_ymd_and_hms(2024, 7, 17, 20, 30, 0).unwrap();
        assert!(!cal.is_market_open(after));
    }

    #[test]
    fn test_winter_session_uses_standard_time() {
        let cal = calendar();
        // 13:45 UTC is 08:45 EST, 20:30 UTC is 15:30 EST
        let early = Utc.with_ymd_and_hms(2024, 12, 18, 13, 45, 0).unwrap();
        assert!(!cal.is_market_open(early));
        let late = Utc.with_ymd_and_hms(2024, 12, 18, 20, 30, 0).unwrap();
        assert!(cal.is_market_open(late));
    }

    #[test]
    fn test_dst_switch_week() {
        let cal = calendar();
        // DST started Sunday 2024-03-10. Friday before: 14:30 UTC opens.
        let friday = Utc.with_ymd_and_hms(2024, 3, 8, 14, 0, 0).unwrap();
        assert!(!cal.is_market_open(friday));
        // Monday after: 13:30 UTC opens.
        let monday = Utc.with_ymd_and_hms(2024, 3, 11, 14, 0, 0).unwrap();
        assert!(cal.is_market_open(monday));
    }

    #[test]
    fn test_saturday_always_closed() {
        let cal = calendar();
        for hour in 0..24 {
            let ts = Utc.with_ymd_and_hms(2024, 1, 20, hour, 0, 0).unwrap();
            assert!(!cal.is_market_open(ts), "open on Saturday at {hour}:00");
        }
    }

    #[test]
    fn test_weekday_uses_local_date() {
        let cal = calendar();
        // Saturday 02:00 UTC is Friday 21:00 local: weekday, but after close
        let ts = Utc.with_ymd_and_hms(2024, 1, 20, 2, 0, 0).unwrap();
        assert!(!cal.is_market_open(ts));
        // Monday 03:00 UTC is Sunday 22:00 local
        let ts = Utc.with_ymd_and_hms(2024, 1, 22, 3, 0, 0).unwrap();
        assert!(!cal.is_market_open(ts));
    }

    #[test]
    fn test_us_equities_matches_default_config() {
        let a = MarketCalendar::us_equities();
        let b = calendar();
        assert_eq!(a.open(), b.open());
        assert_eq!(a.close(), b.close());
        assert_eq!(a.timezone(), b.timezone());
    }

    #[test]
    fn test_invalid_config() {
        let bad_time = CalendarConfig {
            open: "9h30".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            MarketCalendar::from_config(&bad_time),
            Err(CalendarError::InvalidTime(_))
        ));

        let inverted = CalendarConfig {
            open: "16:00".to_string(),
            close: "09:30".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            MarketCalendar::from_config(&inverted),
            Err(CalendarError::EmptySession { .. })
        ));

        let bad_zone = CalendarConfig {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            MarketCalendar::from_config(&bad_zone),
            Err(CalendarError::UnknownTimezone(_))
        ));
    }
}
