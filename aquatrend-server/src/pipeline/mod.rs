//! Hierarchical time-bucket aggregation.
//!
//! Sensor snapshots are folded into hourly buckets, hourly buckets roll up
//! into daily reports, and daily reports roll up into weekly and monthly
//! reports. Each level also gets sensor-availability analytics and a trend
//! verdict against the previous period.
//!
//! Every step below the hourly fold is a full recomputation followed by a
//! merge-write, so any number of overlapping triggers converge on the same
//! documents.

pub mod aggregate;
pub mod analytics;
pub mod backfill;
pub mod clock;
pub mod hourly;
pub mod paths;
pub mod seed;
pub mod trend;

use aquatrend_common::period::{MonthKey, Period, WeekKey, date_key};
use aquatrend_common::{AggregateResponse, DocumentSource, RefreshSummary};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::AppError;
use crate::sources::{Feedings, Sensors};
use crate::store::DocumentStore;

use self::clock::ClockZone;

/// Everything a pipeline step needs, passed explicitly.
#[derive(Clone)]
pub struct PipelineContext {
    pub docs: DocumentStore,
    pub sensors: Sensors,
    pub feedings: Feedings,
    pub clock: ClockZone,
}

impl PipelineContext {
    pub fn new(docs: DocumentStore, sensors: Sensors, feedings: Feedings, clock: ClockZone) -> Self {
        Self {
            docs,
            sensors,
            feedings,
            clock,
        }
    }
}

/// Aggregate `period`, then derive its analytics and trends.
///
/// Analytics are only produced when the period has any non-seed input;
/// otherwise `analytics` is `None`. Trends are recomputed whenever an
/// analytics document exists for the period, since the previous period may
/// have changed since they were written.
pub async fn run_period(
    ctx: &PipelineContext,
    owner: &str,
    period: Period,
    source: DocumentSource,
) -> Result<AggregateResponse, AppError> {
    paths::validate_owner(owner)?;

    let coverage = aggregate::aggregate_period(ctx, owner, &period, source).await?;
    let mut analytics = analytics::generate(ctx, owner, &period, source).await?;
    let trends = trend::identify_trends(ctx, owner, &period).await?;

    if let (Some(current), Some(trends)) = (analytics.as_mut(), trends) {
        current.temp_trend = trends.temp_trend;
        current.ph_trend = trends.ph_trend;
        current.both_sensors_trend = trends.both_sensors_trend;
    }

    debug!(owner = %owner, period = %period, ?coverage, "period processed");

    Ok(AggregateResponse {
        level: period.level(),
        period: period.key(),
        coverage,
        analytics,
    })
}

/// Re-aggregate the day, ISO week and month containing the current time.
pub async fn refresh_current(ctx: &PipelineContext, owner: &str) -> Result<RefreshSummary, AppError> {
    refresh_at(ctx, owner, Utc::now()).await
}

/// Re-aggregate the day, ISO week and month containing `now`.
///
/// The daily report is written first so the weekly and monthly rollups see
/// it.
pub async fn refresh_at(
    ctx: &PipelineContext,
    owner: &str,
    now: DateTime<Utc>,
) -> Result<RefreshSummary, AppError> {
    let today = ctx.clock.wall_clock(now).date();
    let week = WeekKey::of(today);
    let month = MonthKey::of(today);

    let source = DocumentSource::Aggregator;
    let daily = run_period(ctx, owner, Period::Day(today), source).await?;
    let weekly = run_period(ctx, owner, Period::Week(week), source).await?;
    let monthly = run_period(ctx, owner, Period::Month(month), source).await?;

    info!(
        owner = %owner,
        date = %today,
        daily = ?daily.coverage,
        weekly = ?weekly.coverage,
        monthly = ?monthly.coverage,
        "current periods refreshed"
    );

    Ok(RefreshSummary {
        date: date_key(today),
        week: week.to_string(),
        month: month.to_string(),
        daily_coverage: daily.coverage,
        weekly_coverage: weekly.coverage,
        monthly_coverage: monthly.coverage,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use aquatrend_common::{FeedingRecord, HourlyBucket, SensorReading};
    use chrono::NaiveDate;

    use super::*;
    use crate::sources::{FeedingSource, SensorSource, StoreFeedingSource, StoreSensorSource};
    use crate::store::{BoxFuture, Store};

    /// A context over a fresh in-memory store, plus direct handles to the
    /// store-backed collaborators.
    pub struct TestPipeline {
        pub ctx: PipelineContext,
        pub sensors: StoreSensorSource,
        pub feedings: StoreFeedingSource,
    }

    pub fn pipeline() -> TestPipeline {
        let store = Store::memory();
        let docs = DocumentStore::new(store.keyspace("documents").unwrap());
        let sensors = StoreSensorSource::new(store.keyspace("sensors").unwrap());
        let feedings = StoreFeedingSource::new(store.keyspace("feedings").unwrap());
        let ctx = PipelineContext::new(
            docs,
            Arc::new(sensors.clone()),
            Arc::new(feedings.clone()),
            ClockZone::Utc,
        );
        TestPipeline {
            ctx,
            sensors,
            feedings,
        }
    }

    pub fn date(s: &str) -> NaiveDate {
        aquatrend_common::period::parse_date(s).unwrap()
    }

    pub fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    pub fn reading(value: f64) -> SensorReading {
        SensorReading {
            value,
            timestamp: None,
        }
    }

    /// A real bucket holding `count` temperature samples averaging `temp`.
    pub fn temp_bucket(temp: f64, count: u32) -> HourlyBucket {
        HourlyBucket {
            temperature_sum: temp * f64::from(count),
            temperature_count: count,
            temperature_avg: Some(temp),
            source: Some(DocumentSource::Sampler),
            ..HourlyBucket::default()
        }
    }

    pub async fn put_bucket(ctx: &PipelineContext, owner: &str, day: &str, hour: u32, bucket: &HourlyBucket) {
        ctx.docs
            .set_merge(&paths::hourly_bucket(owner, date(day), hour), bucket)
            .await
            .unwrap();
    }

    /// Collaborator that fails every call.
    #[derive(Default)]
    pub struct FailingSource {
        pub calls: Mutex<u32>,
    }

    impl SensorSource for FailingSource {
        fn latest<'a>(
            &'a self,
            _owner: &'a str,
            _sensor: &'a str,
        ) -> BoxFuture<'a, Result<Option<SensorReading>, AppError>> {
            if let Ok(mut calls) = self.calls.lock() {
                *calls += 1;
            }
            Box::pin(async { Err(AppError::Store("sensor store unreachable".into())) })
        }
    }

    impl FeedingSource for FailingSource {
        fn list<'a>(&'a self, _owner: &'a str) -> BoxFuture<'a, Result<Vec<FeedingRecord>, AppError>> {
            Box::pin(async { Err(AppError::Store("feeding store unreachable".into())) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use aquatrend_common::{DailyReport, SensorAnalytics, Trend};
    use serde_json::json;

    #[tokio::test]
    async fn run_period_writes_report_analytics_and_trends() {
        let p = pipeline();
        put_bucket(&p.ctx, "pond-1", "2024-06-19", 3, &temp_bucket(27.0, 1)).await;
        put_bucket(&p.ctx, "pond-1", "2024-06-20", 3, &temp_bucket(28.0, 1)).await;
        put_bucket(&p.ctx, "pond-1", "2024-06-20", 4, &temp_bucket(29.0, 1)).await;

        let src = DocumentSource::Aggregator;
        run_period(&p.ctx, "pond-1", Period::Day(date("2024-06-19")), src)
            .await
            .unwrap();
        let resp = run_period(&p.ctx, "pond-1", Period::Day(date("2024-06-20")), src)
            .await
            .unwrap();

        assert_eq!(resp.coverage, Some(2));
        let analytics = resp.analytics.unwrap();
        assert_eq!(analytics.temp_availability, 2);
        assert_eq!(analytics.temp_trend, Trend::Up);
        assert_eq!(analytics.ph_trend, Trend::Stable);
    }

    #[tokio::test]
    async fn run_period_without_data_writes_nothing() {
        let p = pipeline();
        let resp = run_period(
            &p.ctx,
            "pond-1",
            Period::Day(date("2024-06-20")),
            DocumentSource::Aggregator,
        )
        .await
        .unwrap();
        assert_eq!(resp.coverage, None);
        assert!(resp.analytics.is_none());
        assert!(p.ctx.docs.is_empty("pond-1").await.unwrap());
    }

    #[tokio::test]
    async fn run_period_refreshes_trends_of_existing_analytics() {
        let p = pipeline();
        let day = Period::Day(date("2024-06-20"));
        let path = paths::analytics("pond-1", &day);
        p.ctx
            .docs
            .set_merge(&path, &json!({ "tempAvailability": 5, "tempTrend": "unknown" }))
            .await
            .unwrap();
        p.ctx
            .docs
            .set_merge(
                &paths::analytics("pond-1", &day.previous()),
                &json!({ "tempAvailability": 3 }),
            )
            .await
            .unwrap();

        let resp = run_period(&p.ctx, "pond-1", day, DocumentSource::Aggregator)
            .await
            .unwrap();
        assert!(resp.analytics.is_none());

        let stored: SensorAnalytics = p.ctx.docs.get(&path).await.unwrap().unwrap();
        assert_eq!(stored.temp_availability, 5);
        assert_eq!(stored.temp_trend, Trend::Up);
    }

    #[tokio::test]
    async fn run_period_rejects_bad_owner() {
        let p = pipeline();
        let result = run_period(
            &p.ctx,
            "a/b",
            Period::Day(date("2024-06-20")),
            DocumentSource::Aggregator,
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn refresh_cascades_from_daily_to_week_and_month() {
        let p = pipeline();
        put_bucket(&p.ctx, "pond-1", "2024-06-20", 9, &temp_bucket(30.0, 2)).await;

        let summary = refresh_at(&p.ctx, "pond-1", at("2024-06-20T10:00:00Z"))
            .await
            .unwrap();
        assert_eq!(summary.date, "2024-06-20");
        assert_eq!(summary.week, "2024-W25");
        assert_eq!(summary.month, "2024-06");
        assert_eq!(summary.daily_coverage, Some(1));
        assert_eq!(summary.weekly_coverage, Some(1));
        assert_eq!(summary.monthly_coverage, Some(1));

        let daily: DailyReport = p
            .ctx
            .docs
            .get(&paths::daily_report("pond-1", date("2024-06-20")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(daily.avg_temperature, Some(30.0));
    }
}
