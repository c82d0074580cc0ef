//! The 14-digit rolling wheel behind the virtual clock editor.
//!
//! A [`Digits`] value is the odometer view of a timestamp, read left to
//! right as `MM DD YYYY hh mm ss`:
//!
//! | Index | Field |
//! |-------|-------|
//! | 0, 1 | month tens, units |
//! | 2, 3 | day tens, units |
//! | 4..=7 | year thousands, hundreds, tens, units |
//! | 8, 9 | hour tens, units |
//! | 10, 11 | minute tens, units |
//! | 12, 13 | second tens, units |
//!
//! Each of the 14 digits can be rolled up or down independently, giving 28
//! [`WheelOp`]s. [`Digits::apply`] is total: every roll first wraps the
//! digit modulo its cycle and then corrects the result against the bounds
//! of its field (and, for the day, the current month and year). A valid
//! sequence always produces a valid sequence.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::calendar::{MONTHS_PER_YEAR, days_in_month};

/// Smallest year the four year digits can show without a leading zero.
pub const MIN_YEAR: u16 = 1000;

/// Largest year the four year digits can show.
pub const MAX_YEAR: u16 = 9999;

/// Number of digits on the wheel.
pub const DIGIT_COUNT: usize = 14;

/// Errors raised when converting to or from a digit sequence.
///
/// Rolling digits never fails; only the boundaries with timestamps and raw
/// arrays can.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigitError {
    /// The year cannot be shown on four digits without a leading zero.
    #[error("year {year} is outside {MIN_YEAR}..={MAX_YEAR}")]
    YearOutOfRange {
        /// The offending year.
        year: i32,
    },

    /// A raw digit is not a single decimal digit.
    #[error("digit at index {index} is {value}, expected 0..=9")]
    InvalidDigit {
        /// Position in the 14-digit sequence.
        index: usize,
        /// The rejected value.
        value: u8,
    },

    /// A field value violates its calendar or clock bounds.
    #[error("{field} value {value} is out of range")]
    OutOfRange {
        /// Field name (`month`, `day`, `hour`, ...).
        field: &'static str,
        /// The rejected value.
        value: u32,
    },

    /// The digits name a date chrono cannot build.
    #[error("digits {0} do not form a representable date")]
    Unrepresentable(String),

    /// A field name could not be parsed.
    #[error("unknown wheel field: {0}")]
    UnknownField(String),

    /// A direction could not be parsed.
    #[error("unknown wheel direction: {0} (expected up or down)")]
    UnknownDirection(String),
}

/// One of the 14 digits on the wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Field {
    /// Month, tens digit.
    MonthTens,
    /// Month, units digit.
    MonthUnits,
    /// Day of month, tens digit.
    DayTens,
    /// Day of month, units digit.
    DayUnits,
    /// Year, thousands digit.
    YearThousands,
    /// Year, hundreds digit.
    YearHundreds,
    /// Year, tens digit.
    YearTens,
    /// Year, units digit.
    YearUnits,
    /// Hour (24h), tens digit.
    HourTens,
    /// Hour (24h), units digit.
    HourUnits,
    /// Minute, tens digit.
    MinuteTens,
    /// Minute, units digit.
    MinuteUnits,
    /// Second, tens digit.
    SecondTens,
    /// Second, units digit.
    SecondUnits,
}

impl Field {
    /// All fields in wheel order.
    pub const ALL: [Self; DIGIT_COUNT] = [
        Self::MonthTens,
        Self::MonthUnits,
        Self::DayTens,
        Self::DayUnits,
        Self::YearThousands,
        Self::YearHundreds,
        Self::YearTens,
        Self::YearUnits,
        Self::HourTens,
        Self::HourUnits,
        Self::MinuteTens,
        Self::MinuteUnits,
        Self::SecondTens,
        Self::SecondUnits,
    ];

    /// Position of this field in the 14-digit sequence.
    pub const fn index(self) -> usize {
        match self {
            Self::MonthTens => 0,
            Self::MonthUnits => 1,
            Self::DayTens => 2,
            Self::DayUnits => 3,
            Self::YearThousands => 4,
            Self::YearHundreds => 5,
            Self::YearTens => 6,
            Self::YearUnits => 7,
            Self::HourTens => 8,
            Self::HourUnits => 9,
            Self::MinuteTens => 10,
            Self::MinuteUnits => 11,
            Self::SecondTens => 12,
            Self::SecondUnits => 13,
        }
    }

    /// Kebab-case name, as accepted by [`FromStr`].
    pub const fn name(self) -> &'static str {
        match self {
            Self::MonthTens => "month-tens",
            Self::MonthUnits => "month-units",
            Self::DayTens => "day-tens",
            Self::DayUnits => "day-units",
            Self::YearThousands => "year-thousands",
            Self::YearHundreds => "year-hundreds",
            Self::YearTens => "year-tens",
            Self::YearUnits => "year-units",
            Self::HourTens => "hour-tens",
            Self::HourUnits => "hour-units",
            Self::MinuteTens => "minute-tens",
            Self::MinuteUnits => "minute-units",
            Self::SecondTens => "second-tens",
            Self::SecondUnits => "second-units",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = DigitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|field| field.name() == wanted)
            .ok_or(DigitError::UnknownField(wanted))
    }
}

/// Which way a digit is rolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Increment.
    Up,
    /// Decrement.
    Down,
}

impl FromStr for Direction {
    type Err = DigitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" | "+" => Ok(Self::Up),
            "down" | "-" => Ok(Self::Down),
            other => Err(DigitError::UnknownDirection(other.to_owned())),
        }
    }
}

/// A single wheel operation: one field rolled in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WheelOp {
    /// The digit to roll.
    pub field: Field,
    /// The roll direction.
    pub direction: Direction,
}

impl WheelOp {
    /// Build an operation.
    pub const fn new(field: Field, direction: Direction) -> Self {
        Self { field, direction }
    }

    /// Shorthand for rolling `field` up.
    pub const fn up(field: Field) -> Self {
        Self::new(field, Direction::Up)
    }

    /// Shorthand for rolling `field` down.
    pub const fn down(field: Field) -> Self {
        Self::new(field, Direction::Down)
    }

    /// Every one of the 28 operations.
    pub fn all() -> impl Iterator<Item = Self> {
        Field::ALL
            .into_iter()
            .flat_map(|field| [Self::up(field), Self::down(field)])
    }
}

impl fmt::Display for WheelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            Direction::Up => "up",
            Direction::Down => "down",
        };
        write!(f, "{}-{dir}", self.field)
    }
}

impl FromStr for WheelOp {
    type Err = DigitError;

    /// Parse `"<field>-<direction>"`, e.g. `month-units-up`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (field, direction) = trimmed
            .rsplit_once('-')
            .ok_or_else(|| DigitError::UnknownField(trimmed.to_owned()))?;
        Ok(Self::new(field.parse()?, direction.parse()?))
    }
}

/// Odometer view of a second-precision timestamp.
///
/// The fields are stored as decimal values; the 14 individual digits are
/// derived on demand by [`Digits::digit`] and [`Digits::to_array`].
/// Serialized as the flat 14-digit array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "[u8; 14]", try_from = "[u8; 14]")]
pub struct Digits {
    month: u8,
    day: u8,
    year: u16,
    hour: u8,
    minute: u8,
    second: u8,
}

impl Digits {
    /// Build digits from field values, rejecting anything out of range.
    ///
    /// # Errors
    ///
    /// Returns [`DigitError::YearOutOfRange`] or [`DigitError::OutOfRange`]
    /// when a field violates its bounds.
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self, DigitError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(DigitError::YearOutOfRange { year: year.into() });
        }
        check_range("month", month, 1, MONTHS_PER_YEAR)?;
        check_range("day", day, 1, days_in_month(month, year))?;
        check_range("hour", hour, 0, 23)?;
        check_range("minute", minute, 0, 59)?;
        check_range("second", second, 0, 59)?;
        Ok(Self {
            month,
            day,
            year,
            hour,
            minute,
            second,
        })
    }

    /// Derive the digit view of a timestamp. Sub-second precision is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`DigitError::YearOutOfRange`] for years that do not fit on
    /// four digits.
    pub fn from_datetime(value: &NaiveDateTime) -> Result<Self, DigitError> {
        let year = u16::try_from(value.year())
            .map_err(|_err| DigitError::YearOutOfRange { year: value.year() })?;
        Self::new(
            year,
            narrow("month", value.month())?,
            narrow("day", value.day())?,
            narrow("hour", value.hour())?,
            narrow("minute", value.minute())?,
            narrow("second", value.second())?,
        )
    }

    /// Rebuild the timestamp shown on the wheel.
    ///
    /// The wheel's leap rule allows a 29th of February in century years
    /// such as 2100 which chrono rejects; that day is rebuilt as the last
    /// real day of the month.
    ///
    /// # Errors
    ///
    /// Returns [`DigitError::Unrepresentable`] if no date can be built,
    /// which does not happen for digits produced by this module.
    pub fn to_datetime(self) -> Result<NaiveDateTime, DigitError> {
        let year = i32::from(self.year);
        let month = u32::from(self.month);
        let day = u32::from(self.day);
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .or_else(|| NaiveDate::from_ymd_opt(year, month, day.saturating_sub(1)))
            .ok_or_else(|| DigitError::Unrepresentable(self.to_string()))?;
        date.and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )
        .ok_or_else(|| DigitError::Unrepresentable(self.to_string()))
    }

    /// Month (1-12).
    pub const fn month(self) -> u8 {
        self.month
    }

    /// Day of month.
    pub const fn day(self) -> u8 {
        self.day
    }

    /// Four-digit year.
    pub const fn year(self) -> u16 {
        self.year
    }

    /// Hour (0-23).
    pub const fn hour(self) -> u8 {
        self.hour
    }

    /// Minute (0-59).
    pub const fn minute(self) -> u8 {
        self.minute
    }

    /// Second (0-59).
    pub const fn second(self) -> u8 {
        self.second
    }

    /// The single decimal digit currently shown for `field`.
    pub fn digit(self, field: Field) -> u8 {
        let (thousands, hundreds, year_tens, year_units) = split_year(self.year);
        match field {
            Field::MonthTens => tens(self.month),
            Field::MonthUnits => units(self.month),
            Field::DayTens => tens(self.day),
            Field::DayUnits => units(self.day),
            Field::YearThousands => thousands,
            Field::YearHundreds => hundreds,
            Field::YearTens => year_tens,
            Field::YearUnits => year_units,
            Field::HourTens => tens(self.hour),
            Field::HourUnits => units(self.hour),
            Field::MinuteTens => tens(self.minute),
            Field::MinuteUnits => units(self.minute),
            Field::SecondTens => tens(self.second),
            Field::SecondUnits => units(self.second),
        }
    }

    /// The full 14-digit sequence in wheel order.
    pub fn to_array(self) -> [u8; DIGIT_COUNT] {
        Field::ALL.map(|field| self.digit(field))
    }

    /// Whether every calendar and clock invariant holds.
    pub fn is_valid(self) -> bool {
        Self::new(
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        )
        .is_ok()
    }

    /// Roll one digit and return the corrected sequence.
    pub fn apply(self, op: WheelOp) -> Self {
        let dir = op.direction;
        let mut next = self;
        match op.field {
            Field::MonthTens => {
                let t = cycle(tens(self.month), 2, dir);
                next.month = correct_month_tens(compose(t, units(self.month)));
                next.clamp_day();
            }
            Field::MonthUnits => {
                let u = cycle(units(self.month), 10, dir);
                next.month = correct_month_units(compose(tens(self.month), u), dir);
                next.clamp_day();
            }
            Field::DayTens => {
                let t = cycle(tens(self.day), 4, dir);
                next.day = self.correct_day(compose(t, units(self.day)), dir);
            }
            Field::DayUnits => {
                let u = cycle(units(self.day), 10, dir);
                next.day = self.correct_day(compose(tens(self.day), u), dir);
            }
            Field::YearThousands
            | Field::YearHundreds
            | Field::YearTens
            | Field::YearUnits => {
                next.year = roll_year(self.year, op.field, dir);
                next.clamp_day();
            }
            Field::HourTens => {
                let t = cycle(tens(self.hour), 3, dir);
                let u = if t == 2 {
                    units(self.hour).min(3)
                } else {
                    units(self.hour)
                };
                next.hour = compose(t, u);
            }
            Field::HourUnits => {
                let t = tens(self.hour);
                let modulus = if t == 2 { 4 } else { 10 };
                next.hour = compose(t, cycle(units(self.hour), modulus, dir));
            }
            Field::MinuteTens => {
                next.minute = compose(cycle(tens(self.minute), 6, dir), units(self.minute));
            }
            Field::MinuteUnits => {
                next.minute = compose(tens(self.minute), cycle(units(self.minute), 10, dir));
            }
            Field::SecondTens => {
                next.second = compose(cycle(tens(self.second), 6, dir), units(self.second));
            }
            Field::SecondUnits => {
                next.second = compose(tens(self.second), cycle(units(self.second), 10, dir));
            }
        }
        next
    }

    /// Largest valid day for the current month and year.
    pub const fn max_day(self) -> u8 {
        days_in_month(self.month, self.year)
    }

    /// Wrap a candidate day produced by a day roll back into range.
    const fn correct_day(self, candidate: u8, dir: Direction) -> u8 {
        let max = self.max_day();
        if candidate == 0 || candidate > max {
            match dir {
                Direction::Up => 1,
                Direction::Down => max,
            }
        } else {
            candidate
        }
    }

    /// Pull the day down after a month or year change shortened the month.
    fn clamp_day(&mut self) {
        self.day = self.day.min(self.max_day());
    }
}

impl fmt::Display for Digits {
    /// Odometer display: `MM/DD/YYYY hh:mm:ss`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}/{:02}/{:04} {:02}:{:02}:{:02}",
            self.month, self.day, self.year, self.hour, self.minute, self.second
        )
    }
}

impl From<Digits> for [u8; DIGIT_COUNT] {
    fn from(digits: Digits) -> Self {
        digits.to_array()
    }
}

impl TryFrom<[u8; DIGIT_COUNT]> for Digits {
    type Error = DigitError;

    fn try_from(raw: [u8; DIGIT_COUNT]) -> Result<Self, Self::Error> {
        for (index, value) in raw.iter().copied().enumerate() {
            if value > 9 {
                return Err(DigitError::InvalidDigit { index, value });
            }
        }
        let [mt, mu, dt, du, y0, y1, y2, y3, ht, hu, nt, nu, st, su] = raw;
        let year = [y0, y1, y2, y3]
            .into_iter()
            .fold(0_u16, |acc, d| acc.saturating_mul(10).saturating_add(u16::from(d)));
        Self::new(
            year,
            compose(mt, mu),
            compose(dt, du),
            compose(ht, hu),
            compose(nt, nu),
            compose(st, su),
        )
    }
}

/// Roll a digit within `0..modulus`.
fn cycle(digit: u8, modulus: u8, dir: Direction) -> u8 {
    match dir {
        Direction::Up => digit.saturating_add(1).checked_rem(modulus).unwrap_or(0),
        Direction::Down => {
            if digit == 0 || digit >= modulus {
                modulus.saturating_sub(1)
            } else {
                digit.saturating_sub(1)
            }
        }
    }
}

fn tens(value: u8) -> u8 {
    value.checked_div(10).unwrap_or(0)
}

fn units(value: u8) -> u8 {
    value.checked_rem(10).unwrap_or(0)
}

fn compose(tens: u8, units: u8) -> u8 {
    tens.saturating_mul(10).saturating_add(units)
}

const fn correct_month_tens(month: u8) -> u8 {
    if month == 0 {
        1
    } else if month > MONTHS_PER_YEAR {
        MONTHS_PER_YEAR
    } else {
        month
    }
}

const fn correct_month_units(month: u8, dir: Direction) -> u8 {
    if month == 0 || month > MONTHS_PER_YEAR {
        match dir {
            Direction::Up => 1,
            Direction::Down => MONTHS_PER_YEAR,
        }
    } else {
        month
    }
}

/// Split a four-digit year into (thousands, hundreds, tens, units).
fn split_year(year: u16) -> (u8, u8, u8, u8) {
    let digit = |divisor: u16| {
        let d = year
            .checked_div(divisor)
            .and_then(|v| v.checked_rem(10))
            .unwrap_or(0);
        u8::try_from(d).unwrap_or(0)
    };
    (digit(1000), digit(100), digit(10), digit(1))
}

fn join_year(thousands: u8, hundreds: u8, tens: u8, units: u8) -> u16 {
    [thousands, hundreds, tens, units]
        .into_iter()
        .fold(0_u16, |acc, d| acc.saturating_mul(10).saturating_add(u16::from(d)))
}

/// Roll one year digit. The thousands digit skips 0.
fn roll_year(year: u16, field: Field, dir: Direction) -> u16 {
    let (mut th, mut hu, mut te, mut un) = split_year(year);
    match field {
        Field::YearThousands => {
            th = match cycle(th, 10, dir) {
                0 => match dir {
                    Direction::Up => 1,
                    Direction::Down => 9,
                },
                d => d,
            };
        }
        Field::YearHundreds => hu = cycle(hu, 10, dir),
        Field::YearTens => te = cycle(te, 10, dir),
        _ => un = cycle(un, 10, dir),
    }
    join_year(th, hu, te, un)
}

fn check_range(field: &'static str, value: u8, min: u8, max: u8) -> Result<(), DigitError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(DigitError::OutOfRange {
            field,
            value: value.into(),
        })
    }
}

fn narrow(field: &'static str, value: u32) -> Result<u8, DigitError> {
    u8::try_from(value).map_err(|_err| DigitError::OutOfRange { field, value })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn digits(year: u16, month: u8, day: u8) -> Digits {
        Digits::new(year, month, day, 10, 0, 0).unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn array_follows_wheel_order() {
        let d = Digits::new(2024, 3, 10, 21, 45, 7).unwrap();
        assert_eq!(d.to_array(), [0, 3, 1, 0, 2, 0, 2, 4, 2, 1, 4, 5, 0, 7]);
        assert_eq!(d.to_string(), "03/10/2024 21:45:07");
    }

    #[test]
    fn every_op_preserves_validity() {
        let times = [(0, 0, 0), (9, 9, 9), (10, 50, 59), (19, 30, 5), (20, 5, 50), (23, 59, 59)];
        for year in [1000, 1999, 2023, 2024, 2100, 9999] {
            for month in 1..=12 {
                for day in 1..=days_in_month(month, year) {
                    for (hour, minute, second) in times {
                        let d = Digits::new(year, month, day, hour, minute, second).unwrap();
                        for op in WheelOp::all() {
                            let next = d.apply(op);
                            assert!(next.is_valid(), "{d} --{op}--> {next:?}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn there_are_28_operations() {
        assert_eq!(WheelOp::all().count(), 28);
    }

    #[test]
    fn april_day_wraps_both_ways() {
        let last = digits(2024, 4, 30);
        assert_eq!(last.apply(WheelOp::up(Field::DayUnits)).day(), 1);
        let first = digits(2024, 4, 1);
        assert_eq!(first.apply(WheelOp::down(Field::DayUnits)).day(), 30);
    }

    #[test]
    fn february_respects_leap_years() {
        let leap = digits(2024, 2, 28).apply(WheelOp::up(Field::DayUnits));
        assert_eq!(leap.day(), 29);
        let common = digits(2023, 2, 28).apply(WheelOp::up(Field::DayUnits));
        assert_eq!(common.day(), 1);
        assert_eq!(common.digit(Field::DayTens), 0);
        assert_eq!(common.digit(Field::DayUnits), 1);
    }

    #[test]
    fn day_tens_wraps_to_bounds() {
        // 28 Feb -> tens up -> 38 -> wraps to the 1st.
        assert_eq!(digits(2023, 2, 28).apply(WheelOp::up(Field::DayTens)).day(), 1);
        // 05 -> tens down -> 35 -> month maximum.
        assert_eq!(digits(2023, 1, 5).apply(WheelOp::down(Field::DayTens)).day(), 31);
        assert_eq!(digits(2023, 6, 5).apply(WheelOp::down(Field::DayTens)).day(), 30);
        assert_eq!(digits(2023, 6, 15).apply(WheelOp::up(Field::DayTens)).day(), 25);
    }

    #[test]
    fn day_units_up_from_nine_never_shows_zero() {
        assert_eq!(digits(2023, 1, 9).apply(WheelOp::up(Field::DayUnits)).day(), 1);
        assert_eq!(digits(2023, 1, 19).apply(WheelOp::up(Field::DayUnits)).day(), 10);
    }

    #[test]
    fn month_units_walks_forward() {
        let mut d = digits(2024, 3, 10);
        for expected in [4, 5, 6] {
            d = d.apply(WheelOp::up(Field::MonthUnits));
            assert_eq!(d.month(), expected);
        }
    }

    #[test]
    fn month_units_wraps_at_bounds() {
        assert_eq!(digits(2024, 12, 1).apply(WheelOp::up(Field::MonthUnits)).month(), 1);
        assert_eq!(digits(2024, 9, 1).apply(WheelOp::up(Field::MonthUnits)).month(), 1);
        assert_eq!(digits(2024, 1, 1).apply(WheelOp::down(Field::MonthUnits)).month(), 12);
        assert_eq!(digits(2024, 10, 1).apply(WheelOp::down(Field::MonthUnits)).month(), 12);
        assert_eq!(digits(2024, 11, 1).apply(WheelOp::down(Field::MonthUnits)).month(), 10);
    }

    #[test]
    fn month_tens_clamps() {
        assert_eq!(digits(2024, 5, 1).apply(WheelOp::up(Field::MonthTens)).month(), 12);
        assert_eq!(digits(2024, 10, 1).apply(WheelOp::up(Field::MonthTens)).month(), 1);
        assert_eq!(digits(2024, 11, 1).apply(WheelOp::down(Field::MonthTens)).month(), 1);
        assert_eq!(digits(2024, 2, 1).apply(WheelOp::down(Field::MonthTens)).month(), 12);
    }

    #[test]
    fn month_change_clamps_day() {
        let d = digits(2024, 1, 31).apply(WheelOp::up(Field::MonthUnits));
        assert_eq!((d.month(), d.day()), (2, 29));
        let d = digits(2023, 1, 31).apply(WheelOp::up(Field::MonthUnits));
        assert_eq!((d.month(), d.day()), (2, 28));
    }

    #[test]
    fn year_change_clamps_leap_day() {
        let d = digits(2024, 2, 29).apply(WheelOp::down(Field::YearUnits));
        assert_eq!((d.year(), d.day()), (2023, 28));
    }

    #[test]
    fn year_digits_are_independent() {
        assert_eq!(digits(2029, 1, 1).apply(WheelOp::up(Field::YearUnits)).year(), 2020);
        assert_eq!(digits(2090, 1, 1).apply(WheelOp::up(Field::YearTens)).year(), 2000);
        assert_eq!(digits(2000, 1, 1).apply(WheelOp::down(Field::YearHundreds)).year(), 2900);
    }

    #[test]
    fn year_thousands_skips_zero() {
        assert_eq!(digits(9024, 1, 1).apply(WheelOp::up(Field::YearThousands)).year(), 1024);
        assert_eq!(digits(1024, 1, 1).apply(WheelOp::down(Field::YearThousands)).year(), 9024);
        assert_eq!(digits(2024, 1, 1).apply(WheelOp::down(Field::YearThousands)).year(), 1024);
    }

    #[test]
    fn hours_stay_below_24() {
        let d = Digits::new(2024, 1, 1, 23, 0, 0).unwrap();
        assert_eq!(d.apply(WheelOp::up(Field::HourUnits)).hour(), 20);
        let d = Digits::new(2024, 1, 1, 20, 0, 0).unwrap();
        assert_eq!(d.apply(WheelOp::down(Field::HourUnits)).hour(), 23);
        let d = Digits::new(2024, 1, 1, 19, 0, 0).unwrap();
        assert_eq!(d.apply(WheelOp::up(Field::HourTens)).hour(), 23);
        let d = Digits::new(2024, 1, 1, 5, 0, 0).unwrap();
        assert_eq!(d.apply(WheelOp::down(Field::HourTens)).hour(), 23);
        let d = Digits::new(2024, 1, 1, 9, 0, 0).unwrap();
        assert_eq!(d.apply(WheelOp::up(Field::HourUnits)).hour(), 0);
    }

    #[test]
    fn minutes_and_seconds_cycle_independently() {
        let d = Digits::new(2024, 1, 1, 0, 59, 59).unwrap();
        assert_eq!(d.apply(WheelOp::up(Field::MinuteUnits)).minute(), 50);
        assert_eq!(d.apply(WheelOp::up(Field::MinuteTens)).minute(), 9);
        assert_eq!(d.apply(WheelOp::up(Field::SecondUnits)).second(), 50);
        let d = Digits::new(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(d.apply(WheelOp::down(Field::SecondTens)).second(), 50);
        assert_eq!(d.apply(WheelOp::down(Field::SecondUnits)).second(), 9);
    }

    #[test]
    fn datetime_round_trip() {
        let t = at("2024-03-10T10:00:00");
        let d = Digits::from_datetime(&t).unwrap();
        assert_eq!(d.to_datetime().unwrap(), t);
    }

    #[test]
    fn century_leap_day_rebuilds_as_last_real_day() {
        let d = digits(2100, 2, 29);
        assert!(d.is_valid());
        assert_eq!(d.to_datetime().unwrap(), at("2100-02-28T10:00:00"));
    }

    #[test]
    fn years_without_four_digits_are_rejected() {
        let t = at("0999-12-31T00:00:00");
        assert_eq!(
            Digits::from_datetime(&t),
            Err(DigitError::YearOutOfRange { year: 999 })
        );
    }

    #[test]
    fn raw_arrays_are_validated() {
        let raw = [1, 3, 0, 1, 2, 0, 2, 4, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            Digits::try_from(raw),
            Err(DigitError::OutOfRange { field: "month", .. })
        ));
        let raw = [0, 2, 3, 0, 2, 0, 2, 4, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            Digits::try_from(raw),
            Err(DigitError::OutOfRange { field: "day", .. })
        ));
        let raw = [0, 2, 1, 0, 2, 0, 2, 4, 0, 0, 0, 0, 0, 12];
        assert_eq!(
            Digits::try_from(raw),
            Err(DigitError::InvalidDigit { index: 13, value: 12 })
        );
    }

    #[test]
    fn serializes_as_flat_array() {
        let d = Digits::new(2024, 6, 10, 10, 0, 3).unwrap();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "[0,6,1,0,2,0,2,4,1,0,0,0,0,3]");
        let back: Digits = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn ops_parse_from_kebab_case() {
        let op: WheelOp = "month-units-up".parse().unwrap();
        assert_eq!(op, WheelOp::up(Field::MonthUnits));
        let op: WheelOp = "year-thousands-down".parse().unwrap();
        assert_eq!(op, WheelOp::down(Field::YearThousands));
        assert!("month-sideways".parse::<WheelOp>().is_err());
        assert!("fortnight-up".parse::<WheelOp>().is_err());
        assert_eq!(op.to_string(), "year-thousands-down");
    }
}
