//! Trend verdicts against the previous period.
//!
//! Trends compare availability counters only: they say whether a sensor
//! reported more or less often, not whether the water got warmer.

use aquatrend_common::period::Period;
use aquatrend_common::{SensorAnalytics, Trend, TrendSet};
use tracing::debug;

use crate::error::AppError;

use super::{PipelineContext, paths};

pub fn compare(current: &SensorAnalytics, previous: Option<&SensorAnalytics>) -> TrendSet {
    TrendSet {
        temp_trend: Trend::between(
            Some(current.temp_availability),
            previous.map(|p| p.temp_availability),
        ),
        ph_trend: Trend::between(
            Some(current.ph_availability),
            previous.map(|p| p.ph_availability),
        ),
        both_sensors_trend: Trend::between(
            Some(current.both_sensors_availability),
            previous.map(|p| p.both_sensors_availability),
        ),
    }
}

/// Compare the analytics of `period` with those of the period before and
/// merge the verdicts onto the current document.
///
/// Only the current document is written. Returns `None` without writing
/// when the current period has no analytics yet.
pub async fn identify_trends(
    ctx: &PipelineContext,
    owner: &str,
    period: &Period,
) -> Result<Option<TrendSet>, AppError> {
    let path = paths::analytics(owner, period);
    let Some(current) = ctx.docs.get::<SensorAnalytics>(&path).await? else {
        return Ok(None);
    };
    let previous: Option<SensorAnalytics> = ctx
        .docs
        .get(&paths::analytics(owner, &period.previous()))
        .await?;

    let trends = compare(&current, previous.as_ref());
    ctx.docs.set_merge(&path, &trends).await?;
    debug!(
        owner = %owner,
        period = %period,
        temp = %trends.temp_trend,
        ph = %trends.ph_trend,
        both = %trends.both_sensors_trend,
        "trends identified"
    );
    Ok(Some(trends))
}

#[cfg(test)]
mod tests {
    use aquatrend_common::period::PeriodLevel;
    use serde_json::{Value, json};

    use super::super::testing::*;
    use super::*;

    fn both(n: u32) -> SensorAnalytics {
        SensorAnalytics {
            both_sensors_availability: n,
            ..SensorAnalytics::default()
        }
    }

    #[test]
    fn three_way_comparison() {
        assert_eq!(compare(&both(5), Some(&both(3))).both_sensors_trend, Trend::Up);
        assert_eq!(compare(&both(3), Some(&both(5))).both_sensors_trend, Trend::Down);
        assert_eq!(compare(&both(5), Some(&both(5))).both_sensors_trend, Trend::Stable);
        assert_eq!(compare(&both(5), None).both_sensors_trend, Trend::Unknown);
    }

    #[tokio::test]
    async fn writes_only_the_current_period() {
        let p = pipeline();
        let week = Period::parse(PeriodLevel::Weekly, "2024-W01").unwrap();
        let previous = Period::parse(PeriodLevel::Weekly, "2023-W52").unwrap();
        assert_eq!(week.previous(), previous);

        let prev_path = paths::analytics("pond-1", &previous);
        p.ctx
            .docs
            .set_merge(&prev_path, &json!({ "tempAvailability": 10, "bothSensorsAvailability": 3 }))
            .await
            .unwrap();
        p.ctx
            .docs
            .set_merge(
                &paths::analytics("pond-1", &week),
                &json!({ "tempAvailability": 4, "bothSensorsAvailability": 5 }),
            )
            .await
            .unwrap();
        let prev_before: Value = p.ctx.docs.get(&prev_path).await.unwrap().unwrap();

        let trends = identify_trends(&p.ctx, "pond-1", &week).await.unwrap().unwrap();
        assert_eq!(trends.temp_trend, Trend::Down);
        assert_eq!(trends.both_sensors_trend, Trend::Up);
        assert_eq!(trends.ph_trend, Trend::Stable);

        let stored: SensorAnalytics = p
            .ctx
            .docs
            .get(&paths::analytics("pond-1", &week))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.temp_trend, Trend::Down);
        assert_eq!(stored.temp_availability, 4);

        let prev_after: Value = p.ctx.docs.get(&prev_path).await.unwrap().unwrap();
        assert_eq!(prev_before, prev_after);
    }

    #[tokio::test]
    async fn missing_current_period_is_a_no_op() {
        let p = pipeline();
        let month = Period::parse(PeriodLevel::Monthly, "2024-03").unwrap();
        assert!(identify_trends(&p.ctx, "pond-1", &month).await.unwrap().is_none());
        assert!(p.ctx.docs.is_empty("pond-1").await.unwrap());
    }

    #[tokio::test]
    async fn missing_previous_period_gives_unknown() {
        let p = pipeline();
        let day = Period::Day(date("2024-03-01"));
        p.ctx
            .docs
            .set_merge(&paths::analytics("pond-1", &day), &both(2))
            .await
            .unwrap();
        let trends = identify_trends(&p.ctx, "pond-1", &day).await.unwrap().unwrap();
        assert_eq!(trends, TrendSet::default());
    }
}
