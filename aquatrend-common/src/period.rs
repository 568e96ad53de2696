//! Calendar keys and period arithmetic.
//!
//! Every aggregate document is addressed by one of three keys:
//!
//! - a date, `YYYY-MM-DD`
//! - an ISO-8601 week, `YYYY-Wxx` (the year is the ISO week-numbering year)
//! - a calendar month, `YYYY-MM`
//!
//! Parsing is strict: keys that are not in canonical form are rejected
//! rather than normalised.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::PeriodError;

pub const HOURS_PER_DAY: u32 = 24;

/// Check that `s` has ASCII digits everywhere except at the given
/// separator positions.
fn digits_except(s: &str, separators: &[(usize, u8)]) -> bool {
    s.bytes().enumerate().all(|(i, b)| {
        match separators.iter().find(|(pos, _)| *pos == i) {
            Some((_, sep)) => b == *sep,
            None => b.is_ascii_digit(),
        }
    })
}

// ---------------------------------------------------------------------------
// Days and hours
// ---------------------------------------------------------------------------

/// Format a date as its `YYYY-MM-DD` key.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a `YYYY-MM-DD` key.
pub fn parse_date(key: &str) -> Result<NaiveDate, PeriodError> {
    if key.len() != 10 || !digits_except(key, &[(4, b'-'), (7, b'-')]) {
        return Err(PeriodError::InvalidDate(key.to_string()));
    }
    NaiveDate::parse_from_str(key, "%Y-%m-%d").map_err(|_| PeriodError::InvalidDate(key.to_string()))
}

/// The day before `date`.
pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date - Days::new(1)
}

/// Reject hours outside `0..=23`.
pub fn validate_hour(hour: u32) -> Result<u32, PeriodError> {
    if hour < HOURS_PER_DAY {
        Ok(hour)
    } else {
        Err(PeriodError::InvalidHour(hour.to_string()))
    }
}

/// Format an hour as its two-digit key (`00`..`23`).
pub fn hour_key(hour: u32) -> Result<String, PeriodError> {
    Ok(format!("{:02}", validate_hour(hour)?))
}

/// Parse a two-digit hour key.
pub fn parse_hour(key: &str) -> Result<u32, PeriodError> {
    if key.len() != 2 || !digits_except(key, &[]) {
        return Err(PeriodError::InvalidHour(key.to_string()));
    }
    let hour: u32 = key
        .parse()
        .map_err(|_| PeriodError::InvalidHour(key.to_string()))?;
    validate_hour(hour).map_err(|_| PeriodError::InvalidHour(key.to_string()))
}

/// Half-open bounds `[start, end)` of one hour of a day, in wall-clock time.
pub fn hour_bounds(
    date: NaiveDate,
    hour: u32,
) -> Result<(NaiveDateTime, NaiveDateTime), PeriodError> {
    let hour = validate_hour(hour)?;
    let start = date
        .and_hms_opt(hour, 0, 0)
        .ok_or_else(|| PeriodError::InvalidHour(hour.to_string()))?;
    Ok((start, start + chrono::Duration::hours(1)))
}

/// Every date in the inclusive range `from..=to`.
pub fn dates_in_range(from: NaiveDate, to: NaiveDate) -> Result<Vec<NaiveDate>, PeriodError> {
    if from > to {
        return Err(PeriodError::InvalidRange { from, to });
    }
    Ok(from.iter_days().take_while(|d| *d <= to).collect())
}

// ---------------------------------------------------------------------------
// ISO weeks
// ---------------------------------------------------------------------------

/// An ISO-8601 week, stored as its Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekKey {
    monday: NaiveDate,
}

impl WeekKey {
    /// The ISO week containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        let offset = date.weekday().num_days_from_monday();
        Self {
            monday: date - Days::new(u64::from(offset)),
        }
    }

    pub fn year(&self) -> i32 {
        self.monday.iso_week().year()
    }

    pub fn week(&self) -> u32 {
        self.monday.iso_week().week()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.monday
    }

    /// Monday through Sunday.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.monday.iter_days().take(7).collect()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }

    pub fn previous(&self) -> Self {
        Self::of(self.monday - Days::new(7))
    }

    pub fn next(&self) -> Self {
        Self::of(self.monday + Days::new(7))
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-W{:02}", self.year(), self.week())
    }
}

impl FromStr for WeekKey {
    type Err = PeriodError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let invalid = || PeriodError::InvalidWeek(key.to_string());
        if key.len() != 8 || !digits_except(key, &[(4, b'-'), (5, b'W')]) {
            return Err(invalid());
        }
        let year: i32 = key[..4].parse().map_err(|_| invalid())?;
        let week: u32 = key[6..].parse().map_err(|_| invalid())?;
        let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)?;
        Ok(Self { monday })
    }
}

// ---------------------------------------------------------------------------
// Calendar months
// ---------------------------------------------------------------------------

/// A calendar month, stored as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    first: NaiveDate,
}

impl MonthKey {
    /// The calendar month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            first: date - Days::new(u64::from(date.day0())),
        }
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn last_day(&self) -> NaiveDate {
        previous_day(self.next().first)
    }

    /// Every date of the month, in order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let month = self.first.month();
        self.first
            .iter_days()
            .take_while(|d| d.month() == month)
            .collect()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }

    pub fn previous(&self) -> Self {
        Self::of(previous_day(self.first))
    }

    pub fn next(&self) -> Self {
        // Day 32 of any month always lands in the following one.
        Self::of(self.first + Days::new(31))
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for MonthKey {
    type Err = PeriodError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let invalid = || PeriodError::InvalidMonth(key.to_string());
        if key.len() != 7 || !digits_except(key, &[(4, b'-')]) {
            return Err(invalid());
        }
        let year: i32 = key[..4].parse().map_err(|_| invalid())?;
        let month: u32 = key[5..].parse().map_err(|_| invalid())?;
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        Ok(Self { first })
    }
}

// ---------------------------------------------------------------------------
// Levels and periods
// ---------------------------------------------------------------------------

/// Aggregation level of a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodLevel {
    Daily,
    Weekly,
    Monthly,
}

impl PeriodLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for PeriodLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodLevel {
    type Err = PeriodError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(PeriodError::InvalidLevel(other.to_string())),
        }
    }
}

/// A concrete day, ISO week, or month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Day(NaiveDate),
    Week(WeekKey),
    Month(MonthKey),
}

impl Period {
    /// Parse `key` according to `level`.
    pub fn parse(level: PeriodLevel, key: &str) -> Result<Self, PeriodError> {
        Ok(match level {
            PeriodLevel::Daily => Self::Day(parse_date(key)?),
            PeriodLevel::Weekly => Self::Week(key.parse()?),
            PeriodLevel::Monthly => Self::Month(key.parse()?),
        })
    }

    pub fn level(&self) -> PeriodLevel {
        match self {
            Self::Day(_) => PeriodLevel::Daily,
            Self::Week(_) => PeriodLevel::Weekly,
            Self::Month(_) => PeriodLevel::Monthly,
        }
    }

    /// The canonical key string of this period.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// The immediately preceding period of the same level.
    pub fn previous(&self) -> Self {
        match self {
            Self::Day(date) => Self::Day(previous_day(*date)),
            Self::Week(week) => Self::Week(week.previous()),
            Self::Month(month) => Self::Month(month.previous()),
        }
    }

    /// Dates covered by the period.
    pub fn dates(&self) -> Vec<NaiveDate> {
        match self {
            Self::Day(date) => vec![*date],
            Self::Week(week) => week.dates(),
            Self::Month(month) => month.dates(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day(date) => f.write_str(&date_key(*date)),
            Self::Week(week) => week.fmt(f),
            Self::Month(month) => month.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn date_key_is_zero_padded() {
        assert_eq!(date_key(d(2024, 6, 5)), "2024-06-05");
        assert_eq!(parse_date("2024-06-05").unwrap(), d(2024, 6, 5));
    }

    #[test]
    fn parse_date_rejects_non_canonical_keys() {
        for bad in ["2024-6-05", "2024/06/05", "2024-02-30", "24-06-05", "", "2024-06-05T00"] {
            assert!(
                matches!(parse_date(bad), Err(PeriodError::InvalidDate(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn hours_are_validated() {
        assert_eq!(hour_key(7).unwrap(), "07");
        assert_eq!(parse_hour("23").unwrap(), 23);
        assert!(hour_key(24).is_err());
        assert!(parse_hour("24").is_err());
        assert!(parse_hour("7").is_err());
    }

    #[test]
    fn hour_bounds_are_half_open() {
        let (start, end) = hour_bounds(d(2024, 6, 20), 23).unwrap();
        assert_eq!(start, d(2024, 6, 20).and_hms_opt(23, 0, 0).unwrap());
        assert_eq!(end, d(2024, 6, 21).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn week_key_uses_iso_week_year() {
        assert_eq!(WeekKey::of(d(2024, 6, 20)).to_string(), "2024-W25");
        assert_eq!(WeekKey::of(d(2024, 12, 30)).to_string(), "2025-W01");
        assert_eq!(WeekKey::of(d(2021, 1, 3)).to_string(), "2020-W53");
    }

    #[test]
    fn week_dates_run_monday_to_sunday() {
        let week: WeekKey = "2024-W25".parse().unwrap();
        let dates = week.dates();
        assert_eq!(dates.len(), 7);
        assert_eq!(dates[0], d(2024, 6, 17));
        assert_eq!(dates[6], d(2024, 6, 23));
        assert!(week.contains(d(2024, 6, 20)));
        assert!(!week.contains(d(2024, 6, 24)));
    }

    #[test]
    fn previous_week_crosses_year_boundary() {
        let week: WeekKey = "2025-W01".parse().unwrap();
        assert_eq!(week.previous().to_string(), "2024-W52");
        let week: WeekKey = "2021-W01".parse().unwrap();
        assert_eq!(week.previous().to_string(), "2020-W53");
        assert_eq!(week.previous().next(), week);
    }

    #[test]
    fn week_parse_rejects_invalid_weeks() {
        assert!("2023-W53".parse::<WeekKey>().is_err());
        assert!("2020-W53".parse::<WeekKey>().is_ok());
        assert!("2024-W00".parse::<WeekKey>().is_err());
        assert!("2024-25".parse::<WeekKey>().is_err());
        assert!("2024-w25".parse::<WeekKey>().is_err());
    }

    #[test]
    fn month_arithmetic() {
        let jan: MonthKey = "2024-01".parse().unwrap();
        assert_eq!(jan.previous().to_string(), "2023-12");
        assert_eq!(jan.next().to_string(), "2024-02");
        let feb = jan.next();
        assert_eq!(feb.dates().len(), 29);
        assert_eq!(feb.last_day(), d(2024, 2, 29));
        assert_eq!(MonthKey::of(d(2024, 6, 20)).to_string(), "2024-06");
        assert!("2024-13".parse::<MonthKey>().is_err());
        assert!("2024-6".parse::<MonthKey>().is_err());
    }

    #[test]
    fn period_previous_uses_calendar_arithmetic() {
        let day = Period::parse(PeriodLevel::Daily, "2024-03-01").unwrap();
        assert_eq!(day.previous().key(), "2024-02-29");
        let month = Period::parse(PeriodLevel::Monthly, "2024-03").unwrap();
        assert_eq!(month.previous().key(), "2024-02");
        assert_eq!(month.previous().level(), PeriodLevel::Monthly);
    }

    #[test]
    fn dates_in_range_is_inclusive_and_ordered() {
        let dates = dates_in_range(d(2024, 6, 29), d(2024, 7, 1)).unwrap();
        assert_eq!(dates, vec![d(2024, 6, 29), d(2024, 6, 30), d(2024, 7, 1)]);
        assert!(matches!(
            dates_in_range(d(2024, 7, 2), d(2024, 7, 1)),
            Err(PeriodError::InvalidRange { .. })
        ));
    }

    #[test]
    fn level_round_trips_through_str() {
        for level in [PeriodLevel::Daily, PeriodLevel::Weekly, PeriodLevel::Monthly] {
            assert_eq!(level.as_str().parse::<PeriodLevel>().unwrap(), level);
        }
        assert!("hourly".parse::<PeriodLevel>().is_err());
    }
}
