//! Daily, weekly and monthly aggregators.
//!
//! Each aggregator reads the level below, drops seed placeholders, and
//! writes nothing when no real input remains. A period that once had data
//! therefore never goes back to empty.

use aquatrend_common::period::{MonthKey, Period, PeriodLevel, WeekKey, parse_date};
use aquatrend_common::{DailyReport, DocumentSource, HourlyBucket, PeriodReport};
use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use crate::error::AppError;

use super::{PipelineContext, paths};

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean of one metric over buckets, weighted by each bucket's sample count.
fn weighted_mean(parts: impl Iterator<Item = (f64, u32)>) -> Option<f64> {
    let (total, weight) = parts
        .filter(|(_, count)| *count > 0)
        .fold((0.0, 0u32), |(total, weight), (avg, count)| {
            (total + avg * f64::from(count), weight + count)
        });
    (weight > 0).then(|| round2(total / f64::from(weight)))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (total, n) = values.fold((0.0, 0u32), |(total, n), v| (total + v, n + 1));
    (n > 0).then(|| round2(total / f64::from(n)))
}

/// `None` when no child reported feed at all.
fn feed_total(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().reduce(|a, b| a + b).map(round2)
}

fn bucket_temperature(bucket: &HourlyBucket) -> (f64, u32) {
    let count = bucket.temperature_count;
    let avg = bucket
        .temperature_avg
        .unwrap_or(bucket.temperature_sum / f64::from(count.max(1)));
    (avg, count)
}

fn bucket_ph(bucket: &HourlyBucket) -> (f64, u32) {
    let count = bucket.ph_count;
    let avg = bucket.ph_avg.unwrap_or(bucket.ph_sum / f64::from(count.max(1)));
    (avg, count)
}

/// Daily rollup of one date's hourly buckets, or `None` when no non-seed
/// bucket carries a reading.
pub fn compute_daily(buckets: &[HourlyBucket], source: DocumentSource) -> Option<DailyReport> {
    let real: Vec<&HourlyBucket> = buckets.iter().filter(|b| !b.is_seed).collect();
    let coverage_hours = real.iter().filter(|b| b.has_reading()).count() as u32;
    if coverage_hours == 0 {
        return None;
    }

    Some(DailyReport {
        avg_temperature: weighted_mean(real.iter().map(|b| bucket_temperature(b))),
        avg_ph: weighted_mean(real.iter().map(|b| bucket_ph(b))),
        total_feed_kg: feed_total(real.iter().map(|b| b.feed_used_kg)),
        coverage_hours,
        is_seed: false,
        generated_at: Some(Utc::now()),
        source: Some(source),
    })
}

/// Weekly or monthly rollup of daily reports, or `None` when none of them
/// is real.
///
/// Averages are the plain mean of the daily averages; days are not
/// re-weighted by how many hours they covered.
pub fn compute_rollup(reports: &[DailyReport], source: DocumentSource) -> Option<PeriodReport> {
    let real: Vec<&DailyReport> = reports.iter().filter(|r| r.is_real()).collect();
    if real.is_empty() {
        return None;
    }

    Some(PeriodReport {
        avg_temperature: mean(real.iter().filter_map(|r| r.avg_temperature)),
        avg_ph: mean(real.iter().filter_map(|r| r.avg_ph)),
        total_feed_kg: feed_total(real.iter().map(|r| r.total_feed_kg)),
        coverage_days: real.len() as u32,
        is_seed: false,
        generated_at: Some(Utc::now()),
        source: Some(source),
    })
}

/// Rebuild the daily report of `date`. Returns its coverage in hours, or
/// `None` when nothing was written.
pub async fn aggregate_daily(
    ctx: &PipelineContext,
    owner: &str,
    date: NaiveDate,
    source: DocumentSource,
) -> Result<Option<u32>, AppError> {
    let buckets: Vec<HourlyBucket> = ctx
        .docs
        .collection(&paths::hourly_collection(owner, date))
        .await?
        .into_iter()
        .map(|(_, bucket)| bucket)
        .collect();

    let Some(report) = compute_daily(&buckets, source) else {
        debug!(owner = %owner, date = %date, "no hourly coverage, daily report left as is");
        return Ok(None);
    };

    ctx.docs
        .set_merge(&paths::daily_report(owner, date), &report)
        .await?;
    info!(
        owner = %owner,
        date = %date,
        coverage_hours = report.coverage_hours,
        "daily report written"
    );
    Ok(Some(report.coverage_hours))
}

/// Daily reports whose date falls inside `period`.
pub async fn daily_reports_in(
    ctx: &PipelineContext,
    owner: &str,
    period: &Period,
) -> Result<Vec<(NaiveDate, DailyReport)>, AppError> {
    let reports = ctx
        .docs
        .collection::<DailyReport>(&paths::report_collection(owner, PeriodLevel::Daily))
        .await?;
    Ok(reports
        .into_iter()
        .filter_map(|(id, report)| parse_date(&id).ok().map(|date| (date, report)))
        .filter(|(date, _)| period_contains(period, *date))
        .collect())
}

pub fn period_contains(period: &Period, date: NaiveDate) -> bool {
    match period {
        Period::Day(day) => *day == date,
        Period::Week(week) => week.contains(date),
        Period::Month(month) => month.contains(date),
    }
}

async fn aggregate_rollup(
    ctx: &PipelineContext,
    owner: &str,
    period: &Period,
    source: DocumentSource,
) -> Result<Option<u32>, AppError> {
    let reports: Vec<DailyReport> = daily_reports_in(ctx, owner, period)
        .await?
        .into_iter()
        .map(|(_, report)| report)
        .collect();

    let Some(report) = compute_rollup(&reports, source) else {
        debug!(owner = %owner, period = %period, "no daily coverage, report left as is");
        return Ok(None);
    };

    ctx.docs
        .set_merge(&paths::report(owner, period), &report)
        .await?;
    info!(
        owner = %owner,
        level = %period.level(),
        period = %period,
        coverage_days = report.coverage_days,
        "period report written"
    );
    Ok(Some(report.coverage_days))
}

/// Rebuild the aggregate of `period`. Returns its coverage counter, or
/// `None` when nothing was written.
pub async fn aggregate_period(
    ctx: &PipelineContext,
    owner: &str,
    period: &Period,
    source: DocumentSource,
) -> Result<Option<u32>, AppError> {
    match period {
        Period::Day(date) => aggregate_daily(ctx, owner, *date, source).await,
        Period::Week(_) | Period::Month(_) => aggregate_rollup(ctx, owner, period, source).await,
    }
}

pub async fn aggregate_weekly(
    ctx: &PipelineContext,
    owner: &str,
    week: WeekKey,
    source: DocumentSource,
) -> Result<Option<u32>, AppError> {
    aggregate_rollup(ctx, owner, &Period::Week(week), source).await
}

pub async fn aggregate_monthly(
    ctx: &PipelineContext,
    owner: &str,
    month: MonthKey,
    source: DocumentSource,
) -> Result<Option<u32>, AppError> {
    aggregate_rollup(ctx, owner, &Period::Month(month), source).await
}
