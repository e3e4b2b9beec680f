//! `TIME_PERIOD` normalization.
//!
//! Period names are read leniently as "year, then the first numeric run as the
//! month" and written back as `YYYY-MM`. A missing month means January, so an
//! annual `2019` becomes `2019-01`. Quarterly, semester and weekly codes are not
//! interpreted: the digit after the marker is read as a month. Callers should
//! surface [`Periodicity`] to the user when it is not monthly.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Text emitted when a period cannot be read as a year-month.
pub const INVALID_DATE: &str = "Invalid date";

static YEAR_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\D*(\d{1,4})(?:\D*(\d{1,2}))?").expect("valid period pattern"));

/// Reformat a period name as `YYYY-MM`, or [`INVALID_DATE`].
pub fn format_year_month(text: &str) -> String {
    let Some(caps) = YEAR_MONTH.captures(text.trim()) else {
        return INVALID_DATE.to_string();
    };

    let year = caps.get(1).and_then(|m| m.as_str().parse::<i32>().ok());
    let month = match caps.get(2) {
        Some(m) => m.as_str().parse::<u32>().ok(),
        None => Some(1),
    };

    match (year, month) {
        (Some(y), Some(m)) => NaiveDate::from_ymd_opt(y, m, 1)
            .map(|d| d.format("%Y-%m").to_string())
            .unwrap_or_else(|| INVALID_DATE.to_string()),
        _ => INVALID_DATE.to_string(),
    }
}

/// Periodicity guessed from a period code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Periodicity {
    Annual,
    Semester,
    Quarterly,
    Monthly,
    Weekly,
    Daily,
    Unknown,
}

impl Periodicity {
    pub fn of(text: &str) -> Self {
        let t = text.trim().to_uppercase();

        match t.split('-').collect::<Vec<_>>().as_slice() {
            [y] if y.len() == 4 && digits_only(y) => Self::Annual,
            [y, p] if digits_only(y) && p.starts_with('Q') => Self::Quarterly,
            [y, p] if digits_only(y) && (p.starts_with('S') || p.starts_with('H')) => Self::Semester,
            [y, p] if digits_only(y) && p.starts_with('W') => Self::Weekly,
            [y, m] if digits_only(y) && digits_only(m) => Self::Monthly,
            [y, m, d] if digits_only(y) && digits_only(m) && d.len() >= 2 => Self::Daily,
            _ => Self::Unknown,
        }
    }

    pub fn is_monthly(self) -> bool {
        self == Self::Monthly
    }
}

fn digits_only(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monthly() {
        assert_eq!(format_year_month("2019-03"), "2019-03");
        assert_eq!(format_year_month("2019-3"), "2019-03");
    }

    #[test]
    fn test_annual_defaults_to_january() {
        assert_eq!(format_year_month("2019"), "2019-01");
    }

    #[test]
    fn test_daily_keeps_year_month() {
        assert_eq!(format_year_month("2019-11-30"), "2019-11");
    }

    #[test]
    fn test_invalid() {
        assert_eq!(format_year_month("2019-13"), INVALID_DATE);
        assert_eq!(format_year_month("unknown"), INVALID_DATE);
        assert_eq!(format_year_month(""), INVALID_DATE);
    }

    #[test]
    fn test_periodicity() {
        assert_eq!(Periodicity::of("2019"), Periodicity::Annual);
        assert_eq!(Periodicity::of("2019-Q2"), Periodicity::Quarterly);
        assert_eq!(Periodicity::of("2019-S1"), Periodicity::Semester);
        assert_eq!(Periodicity::of("2019-W12"), Periodicity::Weekly);
        assert_eq!(Periodicity::of("2019-07"), Periodicity::Monthly);
        assert_eq!(Periodicity::of("2019-07-01"), Periodicity::Daily);
        assert!(!Periodicity::of("2019-Q2").is_monthly());
    }
}
