//! Document paths of the aggregate collections.
//!
//! ```text
//! {owner}/hourlyRecords/{date}/hours/{HH}
//! {owner}/dailyReports/{date}
//! {owner}/weeklyReports/{YYYY-Wxx}
//! {owner}/monthlyReports/{YYYY-MM}
//! {owner}/sensorAnalytics/{daily|weekly|monthly}/{periodId}
//! ```

use aquatrend_common::period::{Period, PeriodLevel, date_key};
use chrono::NaiveDate;

use crate::error::AppError;

pub const HOURLY_RECORDS: &str = "hourlyRecords";
pub const DAILY_REPORTS: &str = "dailyReports";
pub const WEEKLY_REPORTS: &str = "weeklyReports";
pub const MONTHLY_REPORTS: &str = "monthlyReports";
pub const SENSOR_ANALYTICS: &str = "sensorAnalytics";

/// Owner ids become the first path segment, so they may not contain
/// separators.
pub fn validate_owner(owner: &str) -> Result<(), AppError> {
    if owner.is_empty() {
        return Err(AppError::Validation("owner id must not be empty".into()));
    }
    if owner.contains('/') || owner.contains(':') {
        return Err(AppError::Validation(format!(
            "owner id '{owner}' must not contain '/' or ':'"
        )));
    }
    Ok(())
}

/// `{owner}/hourlyRecords`
pub fn hourly_root(owner: &str) -> String {
    format!("{owner}/{HOURLY_RECORDS}")
}

/// `{owner}/hourlyRecords/{date}/hours`
pub fn hourly_collection(owner: &str, date: NaiveDate) -> String {
    format!("{}/{}/hours", hourly_root(owner), date_key(date))
}

/// `{owner}/hourlyRecords/{date}/hours/{HH}`. `hour` must already be valid.
pub fn hourly_bucket(owner: &str, date: NaiveDate, hour: u32) -> String {
    format!("{}/{hour:02}", hourly_collection(owner, date))
}

pub fn report_collection(owner: &str, level: PeriodLevel) -> String {
    let name = match level {
        PeriodLevel::Daily => DAILY_REPORTS,
        PeriodLevel::Weekly => WEEKLY_REPORTS,
        PeriodLevel::Monthly => MONTHLY_REPORTS,
    };
    format!("{owner}/{name}")
}

/// Aggregate report of `period`.
pub fn report(owner: &str, period: &Period) -> String {
    format!("{}/{period}", report_collection(owner, period.level()))
}

pub fn daily_report(owner: &str, date: NaiveDate) -> String {
    report(owner, &Period::Day(date))
}

pub fn analytics_collection(owner: &str, level: PeriodLevel) -> String {
    format!("{owner}/{SENSOR_ANALYTICS}/{level}")
}

/// Sensor analytics of `period`.
pub fn analytics(owner: &str, period: &Period) -> String {
    format!("{}/{period}", analytics_collection(owner, period.level()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_documented_paths() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 20).unwrap();
        assert_eq!(
            hourly_bucket("pond-1", date, 7),
            "pond-1/hourlyRecords/2024-06-20/hours/07"
        );
        assert_eq!(daily_report("pond-1", date), "pond-1/dailyReports/2024-06-20");

        let week = Period::parse(PeriodLevel::Weekly, "2024-W25").unwrap();
        assert_eq!(report("pond-1", &week), "pond-1/weeklyReports/2024-W25");
        assert_eq!(
            analytics("pond-1", &week),
            "pond-1/sensorAnalytics/weekly/2024-W25"
        );

        let month = Period::parse(PeriodLevel::Monthly, "2024-06").unwrap();
        assert_eq!(report("pond-1", &month), "pond-1/monthlyReports/2024-06");
    }

    #[test]
    fn owner_validation() {
        assert!(validate_owner("pond-1").is_ok());
        assert!(validate_owner("").is_err());
        assert!(validate_owner("a/b").is_err());
        assert!(validate_owner("a:b").is_err());
    }
}
