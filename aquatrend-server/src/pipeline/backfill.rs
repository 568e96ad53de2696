//! Historical regeneration.
//!
//! Three stages, each idempotent and safe to re-run:
//!
//! - hourly: regenerate every hour of a date range
//! - daily: rebuild every date that has hourly buckets
//! - periods: rebuild every ISO week and month touched by a daily report
//!
//! A failure on one item is counted and the stage moves on.

use std::collections::BTreeSet;

use aquatrend_common::period::{
    HOURS_PER_DAY, MonthKey, Period, PeriodLevel, WeekKey, dates_in_range, parse_date,
};
use aquatrend_common::{
    BackfillRequest, BackfillStage, BackfillSummary, DocumentSource, HourlyBackfillReport,
    PeriodBackfillReport, StageReport,
};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::AppError;

use super::{PipelineContext, hourly, paths, run_period};

const SOURCE: DocumentSource = DocumentSource::Backfill;

/// Regenerate every hour of every date in `from..=to`.
pub async fn backfill_hourly(
    ctx: &PipelineContext,
    owner: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<HourlyBackfillReport, AppError> {
    paths::validate_owner(owner)?;
    let mut report = HourlyBackfillReport::default();

    for date in dates_in_range(from, to)? {
        for hour in 0..HOURS_PER_DAY {
            match hourly::regenerate_hour(ctx, owner, date, hour).await {
                Ok(Some(_)) => report.generated += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    warn!(owner = %owner, date = %date, hour, error = %e, "hour regeneration failed");
                    report.failed += 1;
                }
            }
        }
    }

    info!(
        owner = %owner,
        generated = report.generated,
        skipped = report.skipped,
        failed = report.failed,
        "hourly backfill finished"
    );
    Ok(report)
}

/// Dates that have at least one hourly bucket, in order.
pub async fn discover_hourly_dates(
    ctx: &PipelineContext,
    owner: &str,
) -> Result<Vec<NaiveDate>, AppError> {
    let dates: BTreeSet<NaiveDate> = ctx
        .docs
        .descendant_paths(&paths::hourly_root(owner))
        .await?
        .iter()
        .filter_map(|path| path.split('/').next())
        .filter_map(|key| parse_date(key).ok())
        .collect();
    Ok(dates.into_iter().collect())
}

/// ISO weeks and months touched by any daily report, in order.
pub async fn discover_report_periods(
    ctx: &PipelineContext,
    owner: &str,
) -> Result<(Vec<WeekKey>, Vec<MonthKey>), AppError> {
    let dates: Vec<NaiveDate> = ctx
        .docs
        .descendant_paths(&paths::report_collection(owner, PeriodLevel::Daily))
        .await?
        .iter()
        .filter(|id| !id.contains('/'))
        .filter_map(|id| parse_date(id).ok())
        .collect();

    let weeks: BTreeSet<WeekKey> = dates.iter().copied().map(WeekKey::of).collect();
    let months: BTreeSet<MonthKey> = dates.iter().copied().map(MonthKey::of).collect();
    Ok((weeks.into_iter().collect(), months.into_iter().collect()))
}

/// Run each period through aggregation, analytics and trends, oldest first
/// so every trend compares against an already rebuilt predecessor.
async fn regenerate_all(
    ctx: &PipelineContext,
    owner: &str,
    periods: impl IntoIterator<Item = Period>,
) -> StageReport {
    let mut report = StageReport::default();
    for period in periods {
        match run_period(ctx, owner, period, SOURCE).await {
            Ok(resp) if resp.coverage.is_some() => report.regenerated.push(period.key()),
            Ok(_) => report.skipped.push(period.key()),
            Err(e) => {
                warn!(owner = %owner, period = %period, error = %e, "period regeneration failed");
                report.failed.push(period.key());
            }
        }
    }
    report
}

/// Rebuild the daily report of every date that has hourly buckets.
pub async fn backfill_daily(ctx: &PipelineContext, owner: &str) -> Result<StageReport, AppError> {
    paths::validate_owner(owner)?;
    let dates = discover_hourly_dates(ctx, owner).await?;
    let report = regenerate_all(ctx, owner, dates.into_iter().map(Period::Day)).await;
    info!(
        owner = %owner,
        regenerated = report.regenerated.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "daily backfill finished"
    );
    Ok(report)
}

/// Rebuild every weekly and monthly report touched by a daily report.
pub async fn backfill_periods(
    ctx: &PipelineContext,
    owner: &str,
) -> Result<PeriodBackfillReport, AppError> {
    paths::validate_owner(owner)?;
    let (weeks, months) = discover_report_periods(ctx, owner).await?;
    let report = PeriodBackfillReport {
        weekly: regenerate_all(ctx, owner, weeks.into_iter().map(Period::Week)).await,
        monthly: regenerate_all(ctx, owner, months.into_iter().map(Period::Month)).await,
    };
    info!(
        owner = %owner,
        weeks = report.weekly.regenerated.len(),
        months = report.monthly.regenerated.len(),
        "weekly and monthly backfill finished"
    );
    Ok(report)
}

/// Run the requested stages, always in hourly, daily, periods order.
pub async fn run(
    ctx: &PipelineContext,
    owner: &str,
    request: &BackfillRequest,
) -> Result<BackfillSummary, AppError> {
    paths::validate_owner(owner)?;
    if request.stages.is_empty() {
        return Err(AppError::Validation(
            "backfill needs at least one stage".into(),
        ));
    }
    let wants = |stage| request.stages.contains(&stage);

    let mut summary = BackfillSummary::default();
    if wants(BackfillStage::Hourly) {
        let (Some(from), Some(to)) = (request.from, request.to) else {
            return Err(AppError::Validation(
                "the hourly stage needs both `from` and `to`".into(),
            ));
        };
        summary.hourly = Some(backfill_hourly(ctx, owner, from, to).await?);
    }
    if wants(BackfillStage::Daily) {
        summary.daily = Some(backfill_daily(ctx, owner).await?);
    }
    if wants(BackfillStage::Periods) {
        summary.periods = Some(backfill_periods(ctx, owner).await?);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use aquatrend_common::{DailyReport, PeriodReport, SensorAnalytics, Trend};

    use super::super::testing::*;
    use super::*;
    use crate::sources::{Feedings, Sensors};

    #[tokio::test]
    async fn daily_and_period_backfill_cover_only_days_with_data() {
        let p = pipeline();
        // D1 and D3 have data, D2 has none. D3 sits in the next ISO week.
        put_bucket(&p.ctx, "pond-1", "2024-06-23", 4, &temp_bucket(26.0, 1)).await;
        put_bucket(&p.ctx, "pond-1", "2024-06-25", 4, &temp_bucket(28.0, 1)).await;

        let daily = backfill_daily(&p.ctx, "pond-1").await.unwrap();
        assert_eq!(daily.regenerated, vec!["2024-06-23", "2024-06-25"]);
        assert!(daily.failed.is_empty());

        let reports = p
            .ctx
            .docs
            .collection::<DailyReport>("pond-1/dailyReports")
            .await
            .unwrap();
        assert_eq!(reports.len(), 2);

        let periods = backfill_periods(&p.ctx, "pond-1").await.unwrap();
        assert_eq!(periods.weekly.regenerated, vec!["2024-W25", "2024-W26"]);
        assert_eq!(periods.monthly.regenerated, vec!["2024-06"]);

        let weekly = p
            .ctx
            .docs
            .collection::<PeriodReport>("pond-1/weeklyReports")
            .await
            .unwrap();
        assert_eq!(weekly.len(), 2);
        let monthly: PeriodReport = p
            .ctx
            .docs
            .get("pond-1/monthlyReports/2024-06")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(monthly.coverage_days, 2);
        assert_eq!(monthly.avg_temperature, Some(27.0));
        assert_eq!(monthly.source, Some(DocumentSource::Backfill));
    }

    #[tokio::test]
    async fn daily_backfill_runs_oldest_first_so_trends_resolve() {
        let p = pipeline();
        put_bucket(&p.ctx, "pond-1", "2024-06-20", 1, &temp_bucket(26.0, 1)).await;
        put_bucket(&p.ctx, "pond-1", "2024-06-21", 1, &temp_bucket(26.0, 1)).await;
        put_bucket(&p.ctx, "pond-1", "2024-06-21", 2, &temp_bucket(26.0, 1)).await;

        backfill_daily(&p.ctx, "pond-1").await.unwrap();
        let second: SensorAnalytics = p
            .ctx
            .docs
            .get("pond-1/sensorAnalytics/daily/2024-06-21")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.temp_trend, Trend::Up);
    }

    #[tokio::test]
    async fn seed_only_days_are_skipped() {
        let p = pipeline();
        put_bucket(
            &p.ctx,
            "pond-1",
            "2024-06-20",
            1,
            &aquatrend_common::HourlyBucket::seed(at("2024-06-20T01:00:00Z")),
        )
        .await;
        let daily = backfill_daily(&p.ctx, "pond-1").await.unwrap();
        assert!(daily.regenerated.is_empty());
        assert_eq!(daily.skipped, vec!["2024-06-20"]);
    }

    #[tokio::test]
    async fn hourly_backfill_counts_generated_and_skipped() {
        let p = pipeline();
        let stamped = aquatrend_common::SensorReading {
            value: 27.0,
            timestamp: Some(at("2024-06-20T13:30:00Z")),
        };
        p.sensors
            .set_latest("pond-1", crate::sources::TEMPERATURE_SENSOR, &stamped)
            .await
            .unwrap();

        let report = backfill_hourly(&p.ctx, "pond-1", date("2024-06-20"), date("2024-06-21"))
            .await
            .unwrap();
        assert_eq!(report.generated, 1);
        assert_eq!(report.skipped, 47);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn hourly_backfill_counts_failures() {
        let mut p = pipeline();
        let failing = Arc::new(FailingSource::default());
        let sensors: Sensors = failing.clone();
        let feedings: Feedings = failing;
        p.ctx.sensors = sensors;
        p.ctx.feedings = feedings;

        let report = backfill_hourly(&p.ctx, "pond-1", date("2024-06-20"), date("2024-06-20"))
            .await
            .unwrap();
        assert_eq!(report.failed, 24);
        assert_eq!(report.generated, 0);
    }

    #[tokio::test]
    async fn hourly_backfill_rejects_reversed_range() {
        let p = pipeline();
        let result = backfill_hourly(&p.ctx, "pond-1", date("2024-06-21"), date("2024-06-20")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn run_chains_requested_stages() {
        let p = pipeline();
        p.sensors
            .set_latest("pond-1", crate::sources::TEMPERATURE_SENSOR, &reading(25.0))
            .await
            .unwrap();

        let request = BackfillRequest {
            from: Some(date("2024-06-20")),
            to: Some(date("2024-06-20")),
            stages: vec![BackfillStage::Periods, BackfillStage::Hourly, BackfillStage::Daily],
        };
        let summary = run(&p.ctx, "pond-1", &request).await.unwrap();
        assert_eq!(summary.hourly.unwrap().generated, 24);
        assert_eq!(summary.daily.unwrap().regenerated, vec!["2024-06-20"]);
        assert_eq!(summary.periods.unwrap().weekly.regenerated, vec!["2024-W25"]);

        let daily: DailyReport = p
            .ctx
            .docs
            .get("pond-1/dailyReports/2024-06-20")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(daily.coverage_hours, 24);
        assert_eq!(daily.avg_temperature, Some(25.0));
    }

    #[tokio::test]
    async fn run_validates_request() {
        let p = pipeline();
        let no_stages = BackfillRequest {
            from: None,
            to: None,
            stages: vec![],
        };
        assert!(matches!(
            run(&p.ctx, "pond-1", &no_stages).await,
            Err(AppError::Validation(_))
        ));

        let no_range = BackfillRequest {
            stages: vec![BackfillStage::Hourly],
            ..no_stages
        };
        assert!(matches!(
            run(&p.ctx, "pond-1", &no_range).await,
            Err(AppError::Validation(_))
        ));
    }
}
