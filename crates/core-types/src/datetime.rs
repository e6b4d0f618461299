//! Arrival date/time derivation policy.
//!
//! The declaration form wants a combined value shaped `YYYY-MM-DDTHH:MM`.
//! Four modes control how the date and the time halves are sourced.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("custom date mode selected but no custom date configured")]
    MissingCustomDate,
    #[error("fixed time mode selected but no fixed time configured")]
    MissingFixedTime,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateTimeMode {
    /// Today's date with a configured fixed time.
    TodayFixed,
    /// Today's date with the wall-clock time at fill.
    TodayCurrent,
    /// A configured date with a configured fixed time.
    CustomFixed,
    /// A configured date with the wall-clock time at fill.
    CustomCurrent,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DateTimePolicy {
    pub mode: DateTimeMode,
    #[serde(default)]
    pub custom_date: Option<NaiveDate>,
    #[serde(default)]
    pub fixed_time: Option<NaiveTime>,
}

impl Default for DateTimePolicy {
    fn default() -> Self {
        Self {
            mode: DateTimeMode::TodayFixed,
            custom_date: None,
            fixed_time: NaiveTime::from_hms_opt(9, 0, 0),
        }
    }
}

impl DateTimePolicy {
    /// Derive the arrival instant relative to `now`. Pure so the four
    /// modes are testable without touching the clock.
    pub fn resolve(&self, now: NaiveDateTime) -> Result<NaiveDateTime, PolicyError> {
        let date = match self.mode {
            DateTimeMode::TodayFixed | DateTimeMode::TodayCurrent => now.date(),
            DateTimeMode::CustomFixed | DateTimeMode::CustomCurrent => {
                self.custom_date.ok_or(PolicyError::MissingCustomDate)?
            }
        };
        let time = match self.mode {
            DateTimeMode::TodayFixed | DateTimeMode::CustomFixed => {
                self.fixed_time.ok_or(PolicyError::MissingFixedTime)?
            }
            DateTimeMode::TodayCurrent | DateTimeMode::CustomCurrent => now.time(),
        };
        Ok(date.and_time(time))
    }

    /// Render an instant the way the form's datetime field expects it,
    /// minute precision, no zone suffix.
    pub fn render(value: NaiveDateTime) -> String {
        value.format("%Y-%m-%dT%H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(14, 37, 52)
            .unwrap()
    }

    #[test]
    fn today_fixed_uses_configured_time() {
        let policy = DateTimePolicy {
            mode: DateTimeMode::TodayFixed,
            custom_date: None,
            fixed_time: NaiveTime::from_hms_opt(9, 30, 0),
        };
        let resolved = policy.resolve(now()).unwrap();
        assert_eq!(DateTimePolicy::render(resolved), "2024-03-15T09:30");
    }

    #[test]
    fn today_current_uses_wall_clock() {
        let policy = DateTimePolicy {
            mode: DateTimeMode::TodayCurrent,
            custom_date: None,
            fixed_time: None,
        };
        let resolved = policy.resolve(now()).unwrap();
        assert_eq!(DateTimePolicy::render(resolved), "2024-03-15T14:37");
    }

    #[test]
    fn custom_fixed_combines_both_configured_halves() {
        let policy = DateTimePolicy {
            mode: DateTimeMode::CustomFixed,
            custom_date: NaiveDate::from_ymd_opt(2024, 12, 24),
            fixed_time: NaiveTime::from_hms_opt(6, 0, 0),
        };
        let resolved = policy.resolve(now()).unwrap();
        assert_eq!(DateTimePolicy::render(resolved), "2024-12-24T06:00");
    }

    #[test]
    fn custom_current_takes_date_only() {
        let policy = DateTimePolicy {
            mode: DateTimeMode::CustomCurrent,
            custom_date: NaiveDate::from_ymd_opt(2024, 12, 24),
            fixed_time: None,
        };
        let resolved = policy.resolve(now()).unwrap();
        assert_eq!(DateTimePolicy::render(resolved), "2024-12-24T14:37");
    }

    #[test]
    fn missing_configuration_is_an_error() {
        let policy = DateTimePolicy {
            mode: DateTimeMode::CustomFixed,
            custom_date: None,
            fixed_time: None,
        };
        assert_eq!(policy.resolve(now()), Err(PolicyError::MissingCustomDate));

        let policy = DateTimePolicy {
            mode: DateTimeMode::TodayFixed,
            custom_date: None,
            fixed_time: None,
        };
        assert_eq!(policy.resolve(now()), Err(PolicyError::MissingFixedTime));
    }

    #[test]
    fn seconds_are_truncated_in_rendering() {
        let value = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 59)
            .unwrap();
        assert_eq!(DateTimePolicy::render(value), "2024-01-02T03:04");
    }
}
