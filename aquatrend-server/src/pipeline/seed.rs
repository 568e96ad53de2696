//! Placeholder documents for empty collections.
//!
//! A dashboard screen expects at least one row in each collection it reads.
//! Seeds are zero-valued, flagged `isSeed`, and ignored by every aggregator.

use aquatrend_common::period::{MonthKey, Period, PeriodLevel, WeekKey};
use aquatrend_common::{DailyReport, HourlyBucket, PeriodReport, SeedCollection, SeedReport};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AppError;

use super::{PipelineContext, hourly, paths};

/// Seed the current hour, day, week and month of `owner`.
pub async fn ensure_seeded(ctx: &PipelineContext, owner: &str) -> SeedReport {
    ensure_seeded_at(ctx, owner, Utc::now()).await
}

/// Seed every empty collection of `owner` at the periods containing `now`.
///
/// Best-effort: failures are logged and the remaining collections are still
/// attempted. The hourly collection is only seeded once a sensor has
/// reported, so an owner without sensors never gets hourly placeholders.
pub async fn ensure_seeded_at(ctx: &PipelineContext, owner: &str, now: DateTime<Utc>) -> SeedReport {
    let mut report = SeedReport::default();
    if let Err(e) = paths::validate_owner(owner) {
        warn!(owner = %owner, error = %e, "seeding skipped");
        return report;
    }

    let wall = ctx.clock.wall_clock(now);
    let today = wall.date();

    let steps = [
        SeedCollection::HourlyRecords,
        SeedCollection::DailyReports,
        SeedCollection::WeeklyReports,
        SeedCollection::MonthlyReports,
    ];
    for collection in steps {
        let result = match collection {
            SeedCollection::HourlyRecords => seed_hourly(ctx, owner, today, wall.hour(), now).await,
            SeedCollection::DailyReports => {
                seed_report(ctx, owner, Period::Day(today), &DailyReport::seed(now)).await
            }
            SeedCollection::WeeklyReports => {
                let period = Period::Week(WeekKey::of(today));
                seed_report(ctx, owner, period, &PeriodReport::seed(now)).await
            }
            SeedCollection::MonthlyReports => {
                let period = Period::Month(MonthKey::of(today));
                seed_report(ctx, owner, period, &PeriodReport::seed(now)).await
            }
        };
        match result {
            Ok(true) => report.seeded.push(collection),
            Ok(false) => {}
            Err(e) => warn!(owner = %owner, ?collection, error = %e, "seeding failed"),
        }
    }

    if !report.seeded.is_empty() {
        info!(owner = %owner, seeded = ?report.seeded, "empty collections seeded");
    }
    report
}

async fn seed_hourly(
    ctx: &PipelineContext,
    owner: &str,
    date: NaiveDate,
    hour: u32,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    if !ctx.docs.is_empty(&paths::hourly_root(owner)).await? {
        return Ok(false);
    }
    if hourly::read_snapshot(ctx, owner).await?.is_empty() {
        debug!(owner = %owner, "no sensor has reported yet, hourly seed skipped");
        return Ok(false);
    }
    ctx.docs
        .create_if_absent(&paths::hourly_bucket(owner, date, hour), &HourlyBucket::seed(now))
        .await
}

async fn seed_report<T: Serialize>(
    ctx: &PipelineContext,
    owner: &str,
    period: Period,
    doc: &T,
) -> Result<bool, AppError> {
    let level: PeriodLevel = period.level();
    if !ctx.docs.is_empty(&paths::report_collection(owner, level)).await? {
        return Ok(false);
    }
    ctx.docs.create_if_absent(&paths::report(owner, &period), doc).await
}
