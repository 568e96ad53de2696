//! Hourly buckets: the live sampler fold and on-demand regeneration.

use aquatrend_common::period::{hour_bounds, validate_hour};
use aquatrend_common::{DocumentSource, HourlyBucket, SensorReading};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::sources::{PH_SENSOR, TEMPERATURE_SENSOR};

use super::{PipelineContext, paths};

/// Latest value of each tracked sensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorSnapshot {
    pub temperature: Option<SensorReading>,
    pub ph: Option<SensorReading>,
}

impl SensorSnapshot {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.ph.is_none()
    }
}

pub async fn read_snapshot(ctx: &PipelineContext, owner: &str) -> Result<SensorSnapshot, AppError> {
    Ok(SensorSnapshot {
        temperature: ctx.sensors.latest(owner, TEMPERATURE_SENSOR).await?,
        ph: ctx.sensors.latest(owner, PH_SENSOR).await?,
    })
}

fn average(sum: f64, count: u32) -> Option<f64> {
    (count > 0).then(|| sum / f64::from(count))
}

/// Fold one sample into the bucket of its hour.
///
/// A seed placeholder is discarded rather than folded into, so its zero
/// averages never leak into real data.
pub fn fold_sample(
    current: Option<HourlyBucket>,
    temperature: Option<f64>,
    ph: Option<f64>,
    now: DateTime<Utc>,
) -> HourlyBucket {
    let mut bucket = current.filter(|b| !b.is_seed).unwrap_or_default();

    if let Some(value) = temperature {
        bucket.temperature_sum += value;
        bucket.temperature_count += 1;
    }
    if let Some(value) = ph {
        bucket.ph_sum += value;
        bucket.ph_count += 1;
    }
    bucket.temperature_avg = average(bucket.temperature_sum, bucket.temperature_count);
    bucket.ph_avg = average(bucket.ph_sum, bucket.ph_count);
    bucket.is_seed = false;
    bucket.source = Some(DocumentSource::Sampler);
    bucket.updated_at = Some(now);
    bucket
}

/// Sample the sensors now and fold the snapshot into the current hour.
pub async fn sample(ctx: &PipelineContext, owner: &str) -> Option<HourlyBucket> {
    sample_at(ctx, owner, Utc::now()).await
}

/// Sample the sensors and fold the snapshot into the hour containing `now`.
///
/// Never fails: a missed sample is picked up by the next tick, so errors are
/// logged and dropped. Returns the bucket as written, or `None` when nothing
/// was written.
pub async fn sample_at(ctx: &PipelineContext, owner: &str, now: DateTime<Utc>) -> Option<HourlyBucket> {
    match try_sample_at(ctx, owner, now).await {
        Ok(bucket) => bucket,
        Err(e) => {
            warn!(owner = %owner, error = %e, "hourly sample failed");
            None
        }
    }
}

async fn try_sample_at(
    ctx: &PipelineContext,
    owner: &str,
    now: DateTime<Utc>,
) -> Result<Option<HourlyBucket>, AppError> {
    paths::validate_owner(owner)?;

    let snapshot = read_snapshot(ctx, owner).await?;
    if snapshot.is_empty() {
        debug!(owner = %owner, "no sensor readings, sample skipped");
        return Ok(None);
    }

    let wall = ctx.clock.wall_clock(now);
    let path = paths::hourly_bucket(owner, wall.date(), wall.hour());
    let temperature = snapshot.temperature.map(|r| r.value);
    let ph = snapshot.ph.map(|r| r.value);

    let bucket = ctx
        .docs
        .update(&path, |current| fold_sample(current, temperature, ph, now))
        .await?;

    debug!(
        owner = %owner,
        path = %path,
        temperature_count = bucket.temperature_count,
        ph_count = bucket.ph_count,
        "sample folded"
    );
    Ok(Some(bucket))
}

/// Overwrite the fields an hourly regeneration recomputed, keeping the
/// rest of `current`. A seed placeholder is discarded first, as in
/// [`fold_sample`].
pub fn apply_regenerated(
    current: Option<HourlyBucket>,
    temperature: Option<f64>,
    ph: Option<f64>,
    feed_used_kg: Option<f64>,
    now: DateTime<Utc>,
) -> HourlyBucket {
    let mut bucket = current.filter(|b| !b.is_seed).unwrap_or_default();

    if let Some(value) = temperature {
        bucket.temperature_sum = value;
        bucket.temperature_count = 1;
        bucket.temperature_avg = Some(value);
    }
    if let Some(value) = ph {
        bucket.ph_sum = value;
        bucket.ph_count = 1;
        bucket.ph_avg = Some(value);
    }
    if feed_used_kg.is_some() {
        bucket.feed_used_kg = feed_used_kg;
    }
    bucket.is_seed = false;
    bucket.source = Some(DocumentSource::HourlyGenerator);
    bucket.updated_at = Some(now);
    bucket
}

/// A reading without a timestamp applies to any hour; one with a timestamp
/// only to the hour it was taken in.
fn applies_to(
    ctx: &PipelineContext,
    reading: Option<SensorReading>,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Option<f64> {
    let reading = reading?;
    match reading.timestamp {
        None => Some(reading.value),
        Some(ts) => {
            let wall = ctx.clock.wall_clock(ts);
            (wall >= start && wall < end).then_some(reading.value)
        }
    }
}

/// Recompute the bucket of `hour` on `date` from the sensor snapshot and
/// the completed feedings scheduled inside the hour.
///
/// Returns `Ok(None)` without writing when nothing contributes to the hour.
pub async fn regenerate_hour(
    ctx: &PipelineContext,
    owner: &str,
    date: NaiveDate,
    hour: u32,
) -> Result<Option<HourlyBucket>, AppError> {
    paths::validate_owner(owner)?;
    let hour = validate_hour(hour)?;
    let (start, end) = hour_bounds(date, hour)?;

    let snapshot = read_snapshot(ctx, owner).await?;
    let temperature = applies_to(ctx, snapshot.temperature, start, end);
    let ph = applies_to(ctx, snapshot.ph, start, end);

    let feed_used_kg = ctx
        .feedings
        .list(owner)
        .await?
        .into_iter()
        .filter(|f| f.counts_as_used())
        .filter(|f| {
            let wall = ctx.clock.wall_clock(f.scheduled_time);
            wall >= start && wall < end
        })
        .map(|f| f.feed_amount)
        .reduce(|a, b| a + b);

    if temperature.is_none() && ph.is_none() && feed_used_kg.is_none() {
        return Ok(None);
    }

    let path = paths::hourly_bucket(owner, date, hour);
    let now = Utc::now();
    let bucket = ctx
        .docs
        .update(&path, |current| {
            apply_regenerated(current, temperature, ph, feed_used_kg, now)
        })
        .await?;
    debug!(owner = %owner, path = %path, "hourly bucket regenerated");

    Ok(Some(bucket))
}
