//! Validation utilities for the Smart City Telemetry platform
//!
//! Pure checks with no I/O; the backend maps failures to its own error type.

use chrono::{Duration, NaiveDateTime};
use thiserror::Error;

/// Longest analysis period a report may cover
pub const MAX_REPORT_PERIOD_DAYS: i64 = 365;

/// Report period rule violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("Period start must be before period end")]
    StartNotBeforeEnd,

    #[error("Period start cannot be in the future")]
    StartInFuture,

    #[error("Period end cannot be in the future")]
    EndInFuture,

    #[error("Analysis period cannot exceed {MAX_REPORT_PERIOD_DAYS} days")]
    TooLong,
}

impl PeriodError {
    /// Field the violation is reported against
    pub fn field(&self) -> &'static str {
        match self {
            PeriodError::StartNotBeforeEnd | PeriodError::StartInFuture => "period_start",
            PeriodError::EndInFuture => "period_end",
            PeriodError::TooLong => "period",
        }
    }

    pub fn message_fr(&self) -> String {
        match self {
            PeriodError::StartNotBeforeEnd => {
                "La date de début doit être antérieure à la date de fin".to_string()
            }
            PeriodError::StartInFuture => {
                "La date de début ne peut pas être dans le futur".to_string()
            }
            PeriodError::EndInFuture => "La date de fin ne peut pas être dans le futur".to_string(),
            PeriodError::TooLong => format!(
                "La période d'analyse ne peut pas dépasser {} jours",
                MAX_REPORT_PERIOD_DAYS
            ),
        }
    }
}

/// Validate a report analysis period against the current time
pub fn validate_report_period(
    start: NaiveDateTime,
    end: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<(), PeriodError> {
    if start >= end {
        return Err(PeriodError::StartNotBeforeEnd);
    }
    if start > now {
        return Err(PeriodError::StartInFuture);
    }
    if end > now {
        return Err(PeriodError::EndInFuture);
    }
    if end - start > Duration::days(MAX_REPORT_PERIOD_DAYS) {
        return Err(PeriodError::TooLong);
    }
    Ok(())
}

/// Replace every character outside `[A-Za-z0-9.-]` with `_`
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_valid_period() {
        let now = at(2025, 6, 1);
        assert!(validate_report_period(at(2025, 1, 1), at(2025, 5, 31), now).is_ok());
    }

    #[test]
    fn test_start_must_precede_end() {
        let now = at(2025, 6, 1);
        assert_eq!(
            validate_report_period(at(2025, 3, 1), at(2025, 3, 1), now),
            Err(PeriodError::StartNotBeforeEnd)
        );
        assert_eq!(
            validate_report_period(at(2025, 3, 2), at(2025, 3, 1), now),
            Err(PeriodError::StartNotBeforeEnd)
        );
    }

    #[test]
    fn test_future_bounds_rejected() {
        let now = at(2025, 6, 1);
        assert_eq!(
            validate_report_period(at(2025, 5, 1), at(2025, 7, 1), now),
            Err(PeriodError::EndInFuture)
        );
        assert_eq!(
            validate_report_period(at(2025, 6, 2), at(2025, 7, 1), now),
            Err(PeriodError::StartInFuture)
        );
    }

    #[test]
    fn test_period_length_limit() {
        let now = at(2025, 6, 1);
        let start = at(2024, 1, 1);
        assert!(validate_report_period(start, start + Duration::days(365), now).is_ok());
        assert_eq!(
            validate_report_period(start, start + Duration::days(366), now),
            Err(PeriodError::TooLong)
        );
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("rapport été 2024.v2"), "rapport__t__2024.v2");
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
    }

    proptest! {
        #[test]
        fn test_past_period_within_limit_is_valid(
            hours_before_now in 0i64..(24 * 3650),
            length_hours in 1i64..=(24 * MAX_REPORT_PERIOD_DAYS),
        ) {
            let now = at(2025, 6, 1);
            let end = now - Duration::hours(hours_before_now);
            let start = end - Duration::hours(length_hours);
            prop_assert!(validate_report_period(start, end, now).is_ok());
        }

        #[test]
        fn test_period_over_limit_is_too_long(extra_hours in 1i64..(24 * 365)) {
            let now = at(2025, 6, 1);
            let start = now - Duration::days(MAX_REPORT_PERIOD_DAYS) - Duration::hours(extra_hours);
            prop_assert_eq!(
                validate_report_period(start, now, now),
                Err(PeriodError::TooLong)
            );
        }

        #[test]
        fn test_sanitized_names_keep_length_and_charset(name in "\\PC{0,40}") {
            let sanitized = sanitize_filename(&name);
            prop_assert_eq!(sanitized.chars().count(), name.chars().count());
            prop_assert!(sanitized
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_'));
        }
    }
}
