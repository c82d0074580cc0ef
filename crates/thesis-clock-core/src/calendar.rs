//! Calendar rules shared by the digit wheel and the clock state.
//!
//! The leap-year test is the simplified one used across the thesis
//! management front-end: every year divisible by 4 is a leap year, with no
//! century or 400-year exception. Years such as 2100 therefore get a
//! 29th of February on the wheel even though the Gregorian calendar has
//! none (see [`crate::digits::Digits::to_datetime`] for how that day is
//! reconstructed).

/// Number of months in a year.
pub const MONTHS_PER_YEAR: u8 = 12;

/// Return whether `year` is a leap year under the simplified rule.
pub const fn is_leap_year(year: u16) -> bool {
    year % 4 == 0
}

/// Return the number of days in `month` (1-based) of `year`.
///
/// Months outside `1..=12` report 31 so that callers clamping a day
/// against an in-flight month value never see a zero bound.
pub const fn days_in_month(month: u8, year: u16) -> u8 {
    match month {
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leap_years_follow_divisible_by_four() {
        assert!(is_leap_year(2024));
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(2023));
        // No century exception.
        assert!(is_leap_year(2100));
        assert!(is_leap_year(1900));
    }

    #[test]
    fn february_length_depends_on_leap_year() {
        assert_eq!(days_in_month(2, 2024), 29);
        assert_eq!(days_in_month(2, 2023), 28);
        assert_eq!(days_in_month(2, 2100), 29);
    }

    #[test]
    fn thirty_day_months() {
        for month in [4, 6, 9, 11] {
            assert_eq!(days_in_month(month, 2023), 30, "month {month}");
        }
    }

    #[test]
    fn thirty_one_day_months() {
        for month in [1, 3, 5, 7, 8, 10, 12] {
            assert_eq!(days_in_month(month, 2023), 31, "month {month}");
        }
    }
}
